use std::{
    fmt::Write as _,
    fs,
    io::ErrorKind,
    path::PathBuf,
};

use crate::cache::lookup::{CacheFailure, CacheLookup};

const CONTEXT_MARKER_SUFFIX: &str = ".ctx.hash";
const CONTENT_SUFFIX: &str = ".content";

/// Per-namespace key/value store on disk, invalidated as a whole whenever the
/// context that produced it changes.
///
/// Layout: one directory per namespace, one `<digest>.ctx.hash` marker and one
/// `<key>.content` file per entry. No TTL and no eviction.
#[derive(Debug)]
pub struct ContentAddressedCache {
    root: PathBuf,
    digest: String,
}

impl ContentAddressedCache {
    /// Opens the cache at `root` for `context`. If the marker for the context
    /// digest is missing, everything under `root` is wiped first.
    pub fn open<S: AsRef<str>>(root: impl Into<PathBuf>, context: &[S]) -> std::io::Result<Self> {
        let root = root.into();
        let digest = context_digest(context);
        let marker = root.join(format!("{digest}{CONTEXT_MARKER_SUFFIX}"));

        if !marker.exists() {
            match fs::remove_dir_all(&root) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err),
            }
            fs::create_dir_all(&root)?;
            fs::write(&marker, b"")?;
            tracing::debug!(
                target: "cache",
                root = %root.display(),
                digest = %digest,
                "cache_context_reset"
            );
        }

        Ok(Self { root, digest })
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Missing keys read as `None`, never as an error.
    pub fn get(&self, key: &str) -> std::io::Result<Option<String>> {
        match fs::read_to_string(self.entry_path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn put(&self, key: &str, content: &str) -> std::io::Result<()> {
        fs::write(self.entry_path(key), content)
    }

    /// Reads `key` and decodes it. An empty stored entry counts as a miss.
    pub fn lookup<T, E>(
        &self,
        key: &str,
        decode: impl FnOnce(&str) -> Result<T, E>,
    ) -> CacheLookup<T>
    where
        E: std::fmt::Display,
    {
        match self.get(key) {
            Ok(Some(raw)) if !raw.is_empty() => match decode(&raw) {
                Ok(value) => CacheLookup::Hit(value),
                Err(err) => CacheLookup::Failure(CacheFailure::Decode {
                    key: key.to_string(),
                    reason: err.to_string(),
                }),
            },
            Ok(_) => CacheLookup::Miss,
            Err(err) => CacheLookup::Failure(CacheFailure::Io(err)),
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}{CONTENT_SUFFIX}", escape_key(key)))
    }
}

/// MD5 over the in-order concatenation of the context literals.
pub fn context_digest<S: AsRef<str>>(context: &[S]) -> String {
    let joined: String = context.iter().map(AsRef::as_ref).collect();
    format!("{:x}", md5::compute(joined.as_bytes()))
}

// Keys embed model ids, which may carry '/' or ':'.
fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
            escaped.push(byte as char);
        } else {
            let _ = write!(escaped, "%{byte:02X}");
        }
    }
    escaped
}
