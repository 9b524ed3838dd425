mod pipeline;
mod supervisors;
mod support;
