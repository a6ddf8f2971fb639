//! Named LUT resources and the parsed-table cache.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::PipelineError;
use crate::transform::lut::Lut3D;

/// Environment variable naming the directory `.cube` files are read from.
pub const LUT_DIR_ENV: &str = "FILMLAB_LUT_DIR";
/// Fallback directory when `FILMLAB_LUT_DIR` is unset.
const DEFAULT_LUT_DIR: &str = "luts";
/// File extension of LUT resources.
const CUBE_EXTENSION: &str = "cube";

/// Where cube text for a named LUT comes from.
pub trait LutSource: Send + Sync {
    /// Return the raw cube text for `name`.
    fn load(&self, name: &str) -> Result<String, PipelineError>;
}

/// Reads `<root>/<name>.cube` from disk.
#[derive(Debug, Clone)]
pub struct DirectoryLutSource {
    root: PathBuf,
}

impl DirectoryLutSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory from `FILMLAB_LUT_DIR`, or `./luts`.
    pub fn from_env() -> Self {
        let root = std::env::var_os(LUT_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LUT_DIR));
        Self::new(root)
    }

    /// Path a LUT name resolves to.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{CUBE_EXTENSION}"))
    }
}

impl LutSource for DirectoryLutSource {
    fn load(&self, name: &str) -> Result<String, PipelineError> {
        let path = self.path_for(name);
        std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                PipelineError::ResourceNotFound {
                    name: name.to_string(),
                }
            } else {
                PipelineError::Io {
                    name: name.to_string(),
                    source,
                }
            }
        })
    }
}

/// Cube text held in memory, keyed by LUT name.
#[derive(Debug, Clone, Default)]
pub struct MemoryLutSource {
    entries: HashMap<String, String>,
}

impl MemoryLutSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the text for `name`.
    pub fn insert(&mut self, name: impl Into<String>, cube_text: impl Into<String>) {
        self.entries.insert(name.into(), cube_text.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, cube_text: impl Into<String>) -> Self {
        self.insert(name, cube_text);
        self
    }
}

impl LutSource for MemoryLutSource {
    fn load(&self, name: &str) -> Result<String, PipelineError> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::ResourceNotFound {
                name: name.to_string(),
            })
    }
}

/// Resolves LUT names to parsed tables, caching each one after its first
/// successful parse. Failed lookups are not cached.
pub struct LutLibrary {
    source: Box<dyn LutSource>,
    cache: RwLock<HashMap<String, Arc<Lut3D>>>,
}

impl LutLibrary {
    pub fn new(source: impl LutSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Parsed table for `name`, loading and parsing it on first use.
    pub fn get(&self, name: &str) -> Result<Arc<Lut3D>, PipelineError> {
        if let Some(lut) = self.cache.read().get(name) {
            return Ok(Arc::clone(lut));
        }

        let text = self.source.load(name)?;
        let lut = Lut3D::parse(&text).map_err(|source| PipelineError::Parse {
            name: name.to_string(),
            source,
        })?;
        tracing::info!("LUT parsed: {name} (size {})", lut.size);

        let lut = Arc::new(lut);
        let mut cache = self.cache.write();
        // Another thread may have parsed the same LUT meanwhile; keep the first.
        let entry = cache.entry(name.to_string()).or_insert(lut);
        Ok(Arc::clone(entry))
    }

    /// Whether `name` is already parsed and cached.
    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.read().contains_key(name)
    }

    /// Drop the cached table for `name`; the next `get` reloads it.
    pub fn evict(&self, name: &str) -> bool {
        self.cache.write().remove(name).is_some()
    }

    /// Drop every cached table.
    pub fn clear(&self) {
        self.cache.write().clear();
    }
}

impl std::fmt::Debug for LutLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LutLibrary")
            .field("cached", &self.cache.read().len())
            .finish_non_exhaustive()
    }
}
