//! Artifact catalog.
//!
//! A hardcoded registry of model artifacts the assistant knows how to
//! download, plus helpers for the artifacts already sitting on disk.
//!
//! Deleting the artifact the engine currently has loaded requires stopping
//! the engine first. The catalog does not know about the engine, so that
//! ordering is the caller's responsibility.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::ErrorCategory;
use crate::utils::format_size;

/// File extension shared by every artifact.
pub const ARTIFACT_EXTENSION: &str = "gguf";

/// What an artifact is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactCategory {
    Chat,
    Code,
    Embedding,
}

impl ArtifactCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Code => "code",
            Self::Embedding => "embedding",
        }
    }
}

impl std::fmt::Display for ArtifactCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static information about a model available for download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDescriptor {
    /// Unique identifier, no spaces (e.g., "qwen2.5-coder-1.5b").
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Approximate download size (e.g., "1.1 GB").
    pub size_label: &'static str,
    /// Parameter count (e.g., "1.5B").
    pub parameters: &'static str,
    pub description: &'static str,
    /// Download URL.
    pub url: &'static str,
    /// Filename to save as.
    pub filename: &'static str,
    pub category: ArtifactCategory,
}

impl ArtifactDescriptor {
    /// Where this artifact lives once downloaded into `models_dir`.
    pub fn local_path(&self, models_dir: &Path) -> PathBuf {
        models_dir.join(self.filename)
    }

    /// Whether the final (non-partial) file exists in `models_dir`.
    pub fn is_downloaded(&self, models_dir: &Path) -> bool {
        self.local_path(models_dir).is_file()
    }
}

/// A model file found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalArtifact {
    /// File name, including extension.
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Human-readable size.
    pub size_label: String,
}

/// Catalog errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CatalogError {
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::Io { .. } => ErrorCategory::FileSystem,
        }
    }

    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

static CATALOG: [ArtifactDescriptor; 6] = [
    ArtifactDescriptor {
        id: "qwen2.5-coder-1.5b",
        name: "Qwen2.5 Coder 1.5B Instruct",
        size_label: "1.1 GB",
        parameters: "1.5B",
        description: "Small and fast code model. Good for completions on 8GB machines.",
        url: "https://huggingface.co/Qwen/Qwen2.5-Coder-1.5B-Instruct-GGUF/resolve/main/qwen2.5-coder-1.5b-instruct-q4_k_m.gguf",
        filename: "qwen2.5-coder-1.5b-instruct-q4_k_m.gguf",
        category: ArtifactCategory::Code,
    },
    ArtifactDescriptor {
        id: "qwen2.5-coder-7b",
        name: "Qwen2.5 Coder 7B Instruct",
        size_label: "4.7 GB",
        parameters: "7B",
        description: "Stronger code model for refactors and explanations. Recommended for 16GB RAM.",
        url: "https://huggingface.co/Qwen/Qwen2.5-Coder-7B-Instruct-GGUF/resolve/main/qwen2.5-coder-7b-instruct-q4_k_m.gguf",
        filename: "qwen2.5-coder-7b-instruct-q4_k_m.gguf",
        category: ArtifactCategory::Code,
    },
    ArtifactDescriptor {
        id: "llama-3.2-3b",
        name: "Llama 3.2 3B Instruct",
        size_label: "2.0 GB",
        parameters: "3B",
        description: "General-purpose chat model with a good speed/quality balance.",
        url: "https://huggingface.co/bartowski/Llama-3.2-3B-Instruct-GGUF/resolve/main/Llama-3.2-3B-Instruct-Q4_K_M.gguf",
        filename: "Llama-3.2-3B-Instruct-Q4_K_M.gguf",
        category: ArtifactCategory::Chat,
    },
    ArtifactDescriptor {
        id: "phi-3.5-mini",
        name: "Phi 3.5 Mini Instruct",
        size_label: "2.4 GB",
        parameters: "3.8B",
        description: "Compact reasoning-oriented chat model with a long context window.",
        url: "https://huggingface.co/bartowski/Phi-3.5-mini-instruct-GGUF/resolve/main/Phi-3.5-mini-instruct-Q4_K_M.gguf",
        filename: "Phi-3.5-mini-instruct-Q4_K_M.gguf",
        category: ArtifactCategory::Chat,
    },
    ArtifactDescriptor {
        id: "llama-3.1-8b",
        name: "Llama 3.1 8B Instruct",
        size_label: "4.9 GB",
        parameters: "8B",
        description: "Best chat quality in the catalog. Recommended for 16GB+ RAM.",
        url: "https://huggingface.co/bartowski/Meta-Llama-3.1-8B-Instruct-GGUF/resolve/main/Meta-Llama-3.1-8B-Instruct-Q4_K_M.gguf",
        filename: "Meta-Llama-3.1-8B-Instruct-Q4_K_M.gguf",
        category: ArtifactCategory::Chat,
    },
    ArtifactDescriptor {
        id: "nomic-embed-text-v1.5",
        name: "Nomic Embed Text v1.5",
        size_label: "146 MB",
        parameters: "137M",
        description: "Embedding model for semantic search over the workspace.",
        url: "https://huggingface.co/nomic-ai/nomic-embed-text-v1.5-GGUF/resolve/main/nomic-embed-text-v1.5.Q8_0.gguf",
        filename: "nomic-embed-text-v1.5.Q8_0.gguf",
        category: ArtifactCategory::Embedding,
    },
];

/// Every artifact available for download, in display order.
pub fn list_available() -> &'static [ArtifactDescriptor] {
    &CATALOG
}

/// Look up an artifact by id.
pub fn resolve(id: &str) -> Result<&'static ArtifactDescriptor, CatalogError> {
    CATALOG
        .iter()
        .find(|entry| entry.id == id)
        .ok_or_else(|| CatalogError::NotFound(id.to_string()))
}

/// List artifact files in `dir`, sorted by name.
///
/// A directory that does not exist yields an empty list.
pub fn scan_local(dir: &Path) -> Result<Vec<LocalArtifact>, CatalogError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "Models directory does not exist yet");
            return Ok(Vec::new());
        }
        Err(e) => return Err(CatalogError::io(dir, e)),
    };

    let mut found = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();
        if !has_artifact_extension(&path) {
            continue;
        }
        let metadata = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping artifact without metadata");
                continue;
            }
        };

        let size_bytes = metadata.len();
        found.push(LocalArtifact {
            name: entry.file_name().to_string_lossy().into_owned(),
            path,
            size_bytes,
            size_label: format_size(size_bytes),
        });
    }

    found.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(found)
}

/// Delete an artifact file.
///
/// Precondition: if the engine has this artifact loaded, it must be stopped
/// before calling this.
pub fn delete(path: &Path) -> Result<(), CatalogError> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Deleted artifact");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(CatalogError::NotFound(path.display().to_string()))
        }
        Err(e) => Err(CatalogError::io(path, e)),
    }
}

fn has_artifact_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ARTIFACT_EXTENSION))
}
