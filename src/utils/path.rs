//! Path utilities for job files, programs and data containers

use std::fmt;
use std::path::{Path, PathBuf};

use crate::container::EXTENSION as CONTAINER_EXTENSION;
use crate::error::{NanoFactoryError, NanoResult};

/// Serialization format of a structured input file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Yaml,
    Toml,
    Json,
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileFormat::Yaml => "yaml",
            FileFormat::Toml => "toml",
            FileFormat::Json => "json",
        };
        write!(f, "{}", name)
    }
}

/// Path helpers shared by the interactors and the CLI
pub struct PathUtils;

impl PathUtils {
    /// Lower-case file extension
    pub fn get_extension(path: &Path) -> Option<String> {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    /// File stem (name without extension)
    pub fn get_stem(path: &Path) -> Option<String> {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
    }

    /// Structured file format chosen by extension
    pub fn file_format(path: &Path) -> NanoResult<FileFormat> {
        match Self::get_extension(path).as_deref() {
            Some("yaml") | Some("yml") => Ok(FileFormat::Yaml),
            Some("toml") => Ok(FileFormat::Toml),
            Some("json") => Ok(FileFormat::Json),
            _ => Err(NanoFactoryError::UnsupportedFile {
                path: path.display().to_string(),
            }),
        }
    }

    /// Give a container path the `.zdc` extension unless it has one
    pub fn container_path(path: &Path) -> PathBuf {
        match Self::get_extension(path) {
            Some(ext) if ext == CONTAINER_EXTENSION => path.to_path_buf(),
            _ => {
                let mut name = path.as_os_str().to_owned();
                name.push(".");
                name.push(CONTAINER_EXTENSION);
                PathBuf::from(name)
            }
        }
    }

    /// Resolve `path` against `base` unless it is absolute
    pub fn resolve(base: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base.join(path)
        }
    }

    /// Fail unless `path` names an existing file
    pub fn require_file(path: &Path) -> NanoResult<()> {
        if path.is_file() {
            Ok(())
        } else {
            Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File does not exist: {}", path.display()),
            )
            .into())
        }
    }
}
