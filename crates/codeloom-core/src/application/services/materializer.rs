//! Materializer - writes a finished run to disk.
//!
//! Files are written in the order the run recorded them. When a write fails,
//! everything written so far is rolled back: the project directory is removed
//! if the run created it, otherwise only the files that did not exist before.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::{
    application::{
        GeneratedFile, GenerationResult, GenerationSettings, OverwritePolicy, ports::Filesystem,
    },
    domain::{ArtifactKind, ArtifactTree, DomainError, FileSystemEntry},
    error::CodeloomResult,
};

enum Payload<'a> {
    Bytes(&'a [u8]),
    Copy(&'a Path),
}

enum Outcome {
    Written,
    Unchanged,
    Skipped,
}

/// Writes generated files through the [`Filesystem`] port.
pub struct Materializer {
    filesystem: Arc<dyn Filesystem>,
}

impl Materializer {
    pub fn new(filesystem: Arc<dyn Filesystem>) -> Self {
        Self { filesystem }
    }

    /// Write every file recorded in `result`. Failures and skipped files are
    /// recorded in `result` rather than returned.
    #[instrument(
        skip_all,
        fields(output = %settings.output_dir.display(), files = result.files().len())
    )]
    pub fn write(
        &self,
        tree: &ArtifactTree,
        settings: &GenerationSettings,
        result: &mut GenerationResult,
    ) {
        let files = result.files().to_vec();
        let roots = self.fresh_roots(&files, &settings.output_dir);
        let mut created = Vec::new();

        for file in &files {
            match self.write_one(tree, settings, file, &mut created) {
                Ok(Outcome::Written) => {}
                Ok(Outcome::Unchanged) => debug!(path = %file.path.display(), "Unchanged"),
                Ok(Outcome::Skipped) => result.warn(format!(
                    "{} already exists and was not overwritten",
                    file.path.display()
                )),
                Err(e) => {
                    warn!(error = %e, path = %file.path.display(), "Write failed, attempting rollback");
                    result.error(format!("failed to write {}: {}", file.path.display(), e));
                    self.rollback(&roots, &created);
                    return;
                }
            }
        }

        info!(written = created.len(), "Successfully wrote all files");
    }

    fn write_one(
        &self,
        tree: &ArtifactTree,
        settings: &GenerationSettings,
        file: &GeneratedFile,
        created: &mut Vec<PathBuf>,
    ) -> CodeloomResult<Outcome> {
        let artifact = tree
            .get(file.artifact)
            .ok_or(DomainError::ArtifactNotFound { id: file.artifact })?;
        let payload = match artifact.kind() {
            ArtifactKind::ExistingFile => Payload::Copy(
                tree.require_decorator::<FileSystemEntry>(artifact.id())?
                    .path()?,
            ),
            _ => Payload::Bytes(artifact.content().map(|c| c.as_bytes()).unwrap_or(&[])),
        };

        let dest = settings.output_dir.join(&file.path);
        let existed = self.filesystem.exists(&dest);
        if existed {
            match settings.overwrite {
                OverwritePolicy::Never => return Ok(Outcome::Skipped),
                OverwritePolicy::IfChanged => {
                    let current = self.filesystem.read_file(&dest)?;
                    let same = match payload {
                        Payload::Bytes(bytes) => current == bytes,
                        Payload::Copy(source) => current == self.filesystem.read_file(source)?,
                    };
                    if same {
                        return Ok(Outcome::Unchanged);
                    }
                }
                OverwritePolicy::Always => {}
            }
        }

        if let Some(parent) = dest.parent() {
            self.filesystem.create_dir_all(parent)?;
        }
        match payload {
            Payload::Bytes(bytes) => self.filesystem.write_file(&dest, bytes)?,
            Payload::Copy(source) => self.filesystem.copy_file(source, &dest)?,
        }
        if !existed {
            created.push(dest);
        }
        Ok(Outcome::Written)
    }

    /// Top-level directories of `files` that do not exist yet.
    fn fresh_roots(&self, files: &[GeneratedFile], output_dir: &Path) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = Vec::new();
        for file in files {
            let Some(first) = file.path.components().next() else {
                continue;
            };
            if file.path.components().count() < 2 {
                continue;
            }
            let root = output_dir.join(first);
            if !roots.contains(&root) && !self.filesystem.exists(&root) {
                roots.push(root);
            }
        }
        roots
    }

    /// Best-effort rollback on failure.
    fn rollback(&self, roots: &[PathBuf], created: &[PathBuf]) {
        for root in roots {
            if let Err(e) = self.filesystem.remove_dir_all(root) {
                warn!(error = %e, path = %root.display(), "Rollback failed");
            }
        }
        for path in created.iter().rev() {
            if roots.iter().any(|r| path.starts_with(r)) {
                continue;
            }
            if let Err(e) = self.filesystem.remove_file(path) {
                warn!(error = %e, path = %path.display(), "Rollback failed");
            }
        }
        info!("Rollback finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ApplicationError;
    use crate::application::ports::MockFilesystem;
    use crate::domain::{ArtifactContent, ArtifactDraft};
    use mockall::predicate::eq;

    fn setup() -> (ArtifactTree, GenerationResult, GenerationSettings) {
        let mut tree =
            ArtifactTree::new(ArtifactDraft::new(ArtifactKind::Project, "Shop")).unwrap();
        let models = tree.add_child(tree.root(), ArtifactDraft::folder("Models")).unwrap();
        let mut result = GenerationResult::new(false);
        for name in ["A.cs", "B.cs"] {
            let id = tree
                .add_child(
                    models,
                    ArtifactDraft::file(name, ArtifactContent::Text(format!("// {name}"))),
                )
                .unwrap();
            result.add_file(GeneratedFile {
                artifact: id,
                path: tree.path_of(id).unwrap(),
                kind: ArtifactKind::File,
                size: Some(5),
            });
        }
        let settings = GenerationSettings {
            output_dir: PathBuf::from("/out"),
            ..GenerationSettings::default()
        };
        (tree, result, settings)
    }

    #[test]
    fn writes_every_file_under_output_dir() {
        let (tree, mut result, settings) = setup();
        let mut fs = MockFilesystem::new();
        fs.expect_exists().returning(|_| false);
        fs.expect_create_dir_all()
            .with(eq(Path::new("/out/Shop/Models")))
            .times(2)
            .returning(|_| Ok(()));
        fs.expect_write_file().times(2).returning(|_, _| Ok(()));

        Materializer::new(Arc::new(fs)).write(&tree, &settings, &mut result);
        assert!(result.is_success());
    }

    #[test]
    fn never_policy_skips_existing_files_with_warning() {
        let (tree, mut result, mut settings) = setup();
        settings.overwrite = OverwritePolicy::Never;
        let mut fs = MockFilesystem::new();
        fs.expect_exists().returning(|_| true);
        fs.expect_write_file().never();

        Materializer::new(Arc::new(fs)).write(&tree, &settings, &mut result);
        assert_eq!(result.warnings().len(), 2);
        assert!(result.is_success());
    }

    #[test]
    fn if_changed_policy_skips_identical_content() {
        let (tree, mut result, mut settings) = setup();
        settings.overwrite = OverwritePolicy::IfChanged;
        let mut fs = MockFilesystem::new();
        fs.expect_exists().returning(|_| true);
        fs.expect_read_file()
            .with(eq(Path::new("/out/Shop/Models/A.cs")))
            .returning(|_| Ok(b"// A.cs".to_vec()));
        fs.expect_read_file()
            .with(eq(Path::new("/out/Shop/Models/B.cs")))
            .returning(|_| Ok(b"// old".to_vec()));
        fs.expect_create_dir_all().returning(|_| Ok(()));
        fs.expect_write_file()
            .withf(|path, _| path == Path::new("/out/Shop/Models/B.cs"))
            .times(1)
            .returning(|_, _| Ok(()));

        Materializer::new(Arc::new(fs)).write(&tree, &settings, &mut result);
        assert!(result.is_success());
        assert!(result.warnings().is_empty());
    }

    #[test]
    fn failed_write_removes_created_project_directory() {
        let (tree, mut result, settings) = setup();
        let mut fs = MockFilesystem::new();
        fs.expect_exists().returning(|_| false);
        fs.expect_create_dir_all().returning(|_| Ok(()));
        fs.expect_write_file()
            .withf(|path, _| path.ends_with("A.cs"))
            .returning(|_, _| Ok(()));
        fs.expect_write_file()
            .withf(|path, _| path.ends_with("B.cs"))
            .returning(|path, _| {
                Err(ApplicationError::FilesystemError {
                    path: path.to_path_buf(),
                    reason: "disk full".into(),
                }
                .into())
            });
        fs.expect_remove_dir_all()
            .with(eq(Path::new("/out/Shop")))
            .times(1)
            .returning(|_| Ok(()));
        fs.expect_remove_file().never();

        Materializer::new(Arc::new(fs)).write(&tree, &settings, &mut result);
        assert!(!result.is_success());
        assert!(result.errors()[0].contains("disk full"));
    }

    #[test]
    fn failed_write_into_existing_project_removes_only_new_files() {
        let (tree, mut result, settings) = setup();
        let mut fs = MockFilesystem::new();
        fs.expect_exists()
            .returning(|path| path == Path::new("/out/Shop"));
        fs.expect_create_dir_all().returning(|_| Ok(()));
        fs.expect_write_file()
            .withf(|path, _| path.ends_with("A.cs"))
            .returning(|_, _| Ok(()));
        fs.expect_write_file()
            .withf(|path, _| path.ends_with("B.cs"))
            .returning(|_, _| Err(ApplicationError::StoreLockError.into()));
        fs.expect_remove_dir_all().never();
        fs.expect_remove_file()
            .with(eq(Path::new("/out/Shop/Models/A.cs")))
            .times(1)
            .returning(|_| Ok(()));

        Materializer::new(Arc::new(fs)).write(&tree, &settings, &mut result);
        assert_eq!(result.errors().len(), 1);
    }
}
