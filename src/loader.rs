//! The resource collaborator consumed by the interpreter.
//!
//! Object parsing, texture decoding and sound decoding are not part of this
//! crate. The interpreter only asks a [`ResourceLoader`] for opaque handles and
//! records them in the route model.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Text encoding of route and include files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    #[default]
    Utf8,
    /// Single-byte Western encoding used by many legacy routes.
    Latin1,
}

impl Encoding {
    /// Decode raw bytes. UTF-8 decoding is lossy so a stray byte never aborts a load.
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 => {
                let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
                String::from_utf8_lossy(bytes).into_owned()
            }
            Encoding::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    }
}

/// Opaque handle to an object produced by the loader.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectHandle {
    pub id: u32,
    pub path: PathBuf,
    /// Static objects were loaded through `load_static_object` and may be
    /// deformed by the consumer (forms, roofs, cracks).
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TextureHandle {
    pub id: u32,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SoundHandle {
    pub id: u32,
    pub path: PathBuf,
}

/// Parameters passed along with a texture registration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TextureParams {
    pub transparent_color: Option<[u8; 3]>,
    /// Repeat the texture horizontally (backgrounds).
    pub wrap_horizontal: bool,
}

/// An exceptional collaborator failure. A failed but expected lookup
/// (file missing, unreadable object) is `Ok(None)` instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoaderError {
    pub path: PathBuf,
    pub message: String,
}

impl LoaderError {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

impl std::error::Error for LoaderError {}

pub type LoadResult<T> = Result<Option<T>, LoaderError>;

pub trait ResourceLoader {
    fn load_object(&self, path: &Path, encoding: Encoding) -> LoadResult<ObjectHandle>;

    fn load_static_object(
        &self,
        path: &Path,
        encoding: Encoding,
        preserve_vertices: bool,
    ) -> LoadResult<ObjectHandle>;

    fn register_texture(&self, path: &Path, params: &TextureParams) -> LoadResult<TextureHandle>;

    fn register_sound(&self, path: &Path, radius: f64) -> LoadResult<SoundHandle>;

    fn file_exists(&self, path: &Path) -> bool;

    /// Read a text file (include files, XML resources).
    fn read_text(&self, path: &Path, encoding: Encoding) -> Result<String, LoaderError>;
}

// ── File system loader ─────────────────────────────────────────────

/// Loader backed by the local file system. It does not parse objects; it
/// checks that the file exists and hands out one stable id per distinct path,
/// which is all the interpreter needs.
#[derive(Debug, Default)]
pub struct FsLoader {
    ids: Mutex<HashMap<PathBuf, u32>>,
}

impl FsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    fn id_for(&self, path: &Path) -> u32 {
        let mut ids = self.ids.lock();
        let next = ids.len() as u32;
        *ids.entry(path.to_path_buf()).or_insert(next)
    }

    /// Number of distinct resources handed out so far.
    pub fn resource_count(&self) -> usize {
        self.ids.lock().len()
    }

    fn existing(&self, path: &Path) -> Option<(u32, PathBuf)> {
        if path.is_file() {
            Some((self.id_for(path), path.to_path_buf()))
        } else {
            None
        }
    }
}

impl ResourceLoader for FsLoader {
    fn load_object(&self, path: &Path, _encoding: Encoding) -> LoadResult<ObjectHandle> {
        Ok(self.existing(path).map(|(id, path)| ObjectHandle {
            id,
            path,
            is_static: false,
        }))
    }

    fn load_static_object(
        &self,
        path: &Path,
        _encoding: Encoding,
        _preserve_vertices: bool,
    ) -> LoadResult<ObjectHandle> {
        Ok(self.existing(path).map(|(id, path)| ObjectHandle {
            id,
            path,
            is_static: true,
        }))
    }

    fn register_texture(&self, path: &Path, _params: &TextureParams) -> LoadResult<TextureHandle> {
        Ok(self
            .existing(path)
            .map(|(id, path)| TextureHandle { id, path }))
    }

    fn register_sound(&self, path: &Path, _radius: f64) -> LoadResult<SoundHandle> {
        Ok(self.existing(path).map(|(id, path)| SoundHandle { id, path }))
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_text(&self, path: &Path, encoding: Encoding) -> Result<String, LoaderError> {
        let bytes = std::fs::read(path).map_err(|e| LoaderError::new(path, e.to_string()))?;
        Ok(encoding.decode(&bytes))
    }
}

// ── Test loader ────────────────────────────────────────────────────


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn latin1_decodes_high_bytes() {
        assert_eq!(Encoding::Latin1.decode(&[0x48, 0xE9]), "Hé");
    }

    #[test]
    fn utf8_strips_bom() {
        assert_eq!(Encoding::Utf8.decode(&[0xEF, 0xBB, 0xBF, b'A']), "A");
    }

    #[test]
    fn fs_loader_reports_missing_files_as_none() {
        let loader = FsLoader::new();
        let result = loader
            .load_object(Path::new("/definitely/not/here.csv"), Encoding::Utf8)
            .unwrap();
        assert!(result.is_none());
        assert_eq!(loader.resource_count(), 0);
    }
}
