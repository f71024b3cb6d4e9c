//! Artifact removal that respects the running engine.

use std::path::Path;

use sidekick_core::CatalogError;
use tracing::info;

use crate::supervisor::EngineSupervisor;

/// Delete a local artifact, stopping the engine first if it has the
/// artifact loaded.
pub async fn remove_artifact(supervisor: &EngineSupervisor, path: &Path) -> Result<(), CatalogError> {
    let loaded = supervisor
        .status()
        .model_path
        .is_some_and(|model| same_file(&model, path));

    if loaded {
        info!(path = %path.display(), "Stopping engine before deleting its model");
        supervisor.stop().await;
    }

    sidekick_core::delete(path)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::SupervisorOptions;

    #[tokio::test]
    async fn test_remove_when_engine_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.gguf");
        std::fs::write(&model, b"gguf").unwrap();
        let supervisor = EngineSupervisor::spawn(SupervisorOptions::default());

        remove_artifact(&supervisor, &model).await.unwrap();
        assert!(!model.exists());
    }

    #[tokio::test]
    async fn test_remove_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = EngineSupervisor::spawn(SupervisorOptions::default());

        let err = remove_artifact(&supervisor, &dir.path().join("nope.gguf"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
    }

    #[test]
    fn test_same_file_through_relative_segments() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.gguf");
        std::fs::write(&model, b"").unwrap();
        let indirect = dir.path().join(".").join("model.gguf");
        assert!(same_file(&model, &indirect));
    }
}
