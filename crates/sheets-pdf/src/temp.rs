//! Intermediate files that live for one export.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempPath;

/// A uniquely named file that is deleted when the export is done.
///
/// [`destroy`](Self::destroy) deletes it explicitly; dropping an artifact
/// that was never destroyed deletes it as well. Deletion errors are never
/// reported.
#[derive(Debug)]
pub struct TempArtifact {
    path: TempPath,
}

impl TempArtifact {
    /// Allocate `<prefix><random><suffix>` in `dir`, or in the platform temp
    /// directory when `dir` is None. The file exists and is empty on return.
    pub fn create(dir: Option<&Path>, prefix: &str, suffix: &str) -> io::Result<Self> {
        let dir = match dir {
            Some(dir) => std::path::absolute(dir)?,
            None => std::env::temp_dir(),
        };
        let file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(&dir)?;
        let path = file.into_temp_path();
        tracing::debug!("Allocated temporary file {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.path.to_path_buf()
    }

    /// Delete the file, logging instead of failing.
    pub fn destroy(self) {
        let shown = self.path.display().to_string();
        match self.path.close() {
            Ok(()) => tracing::debug!("Deleted temporary file {shown}"),
            Err(e) => tracing::debug!("Could not delete temporary file {shown}: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_carries_prefix_and_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = TempArtifact::create(Some(dir.path()), "SheetsPdfExporter", ".xlsx").unwrap();

        let name = artifact.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("SheetsPdfExporter"), "{name}");
        assert!(name.ends_with(".xlsx"), "{name}");
        assert!(artifact.path().is_absolute());
        assert!(artifact.path().exists());
    }

    #[test]
    fn names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let a = TempArtifact::create(Some(dir.path()), "p", ".xlsx").unwrap();
        let b = TempArtifact::create(Some(dir.path()), "p", ".xlsx").unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn destroy_deletes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = TempArtifact::create(Some(dir.path()), "p", ".xlsx").unwrap();
        let path = artifact.to_path_buf();
        std::fs::write(&path, b"data").unwrap();

        artifact.destroy();
        assert!(!path.exists());
    }

    #[test]
    fn destroy_tolerates_a_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = TempArtifact::create(Some(dir.path()), "p", ".xlsx").unwrap();
        std::fs::remove_file(artifact.path()).unwrap();

        artifact.destroy();
    }

    #[test]
    fn drop_deletes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let artifact = TempArtifact::create(Some(dir.path()), "p", ".xlsx").unwrap();
            artifact.to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(TempArtifact::create(Some(&missing), "p", ".xlsx").is_err());
    }
}
