pub mod consolidation;
pub mod cost;
pub mod error;
pub mod experts;
pub mod mapping;
pub mod mock;
pub mod pipeline;
pub mod ports;
pub mod prompts;
pub mod remap;
pub mod supervisor;
pub mod types;

pub use pipeline::ExtractionPipeline;
