pub mod file_cache;
pub mod lookup;

use std::path::{Path, PathBuf};

pub use file_cache::ContentAddressedCache;
pub use lookup::{CacheFailure, CacheLookup};

pub const EXPERTS_NAMESPACE: &str = "experts";
pub const CONSOLIDATION_NAMESPACE: &str = "supervisor_consolidation";
pub const MAPPING_NAMESPACE: &str = "supervisor_mapping";

/// Cache roots are scoped per task, so no two tasks ever share a namespace.
pub fn namespace_dir(cache_root: &Path, task_id: &str, namespace: &str) -> PathBuf {
    cache_root.join(task_id).join(namespace)
}
