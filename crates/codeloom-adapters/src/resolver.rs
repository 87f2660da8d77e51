//! Special-folder path resolution.
//!
//! A special-folder id `@templates/Models/Entity.cs.tera` names a folder
//! (`templates`) and a path relative to it. Each folder may be backed by a
//! user directory and a built-in directory; the user directory wins.
//!
//! # Built-in directory discovery
//!
//! [`FsPathResolver::discover`] looks for the built-in `templates` folder in
//! this order, stopping at the first directory that exists:
//!
//! 1. **`$CODELOOM_TEMPLATES_DIR`**: environment variable override.
//! 2. **`./templates`**: relative to the current working directory.
//! 3. **`<executable-dir>/templates`**: sibling to the `codeloom` binary.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use codeloom_core::{
    application::{
        ApplicationError,
        ports::{PathResolver, ResolvedTemplatePath},
    },
    error::CodeloomResult,
};

/// Environment variable naming the built-in template directory.
pub const TEMPLATES_DIR_ENV: &str = "CODELOOM_TEMPLATES_DIR";

/// Name of the special folder `discover` registers.
pub const TEMPLATES_FOLDER: &str = "templates";

/// What to do when a file exists only in the built-in directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingFilePolicy {
    /// Use the built-in file in place.
    #[default]
    UseBuiltin,
    /// Copy the built-in file into the user directory on first resolution
    /// and use the copy from then on.
    CreateDefaultIfMissing,
}

#[derive(Debug, Clone, Default)]
struct FolderRoots {
    user: Option<PathBuf>,
    builtin: Option<PathBuf>,
}

/// Maps special folders to directories on the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct FsPathResolver {
    folders: BTreeMap<String, FolderRoots>,
    policy: MissingFilePolicy,
}

impl FsPathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver for the `templates` folder with the discovered built-in
    /// directory and an optional user override directory.
    #[instrument]
    pub fn discover(user_dir: Option<PathBuf>) -> Self {
        let builtin = candidate_paths().into_iter().find(|candidate| {
            let found = candidate.is_dir();
            debug!(path = %candidate.display(), found, "Checking built-in templates path");
            found
        });
        match &builtin {
            Some(dir) => info!(path = %dir.display(), "Using built-in templates"),
            None => debug!("No built-in templates directory found"),
        }

        let mut resolver = Self::new();
        resolver.folders.insert(
            TEMPLATES_FOLDER.to_string(),
            FolderRoots {
                user: user_dir,
                builtin,
            },
        );
        resolver
    }

    /// Back `folder` with a built-in directory.
    pub fn with_builtin(mut self, folder: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.folders.entry(folder.into()).or_default().builtin = Some(dir.into());
        self
    }

    /// Back `folder` with a user directory that takes precedence.
    pub fn with_user(mut self, folder: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.folders.entry(folder.into()).or_default().user = Some(dir.into());
        self
    }

    pub fn with_policy(mut self, policy: MissingFilePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Directories backing `folder`, user first.
    pub fn roots(&self, folder: &str) -> Vec<&Path> {
        self.folders
            .get(folder)
            .map(|r| r.user.iter().chain(r.builtin.iter()).map(PathBuf::as_path).collect())
            .unwrap_or_default()
    }

    fn copy_default(&self, from: &Path, to: &Path) -> CodeloomResult<()> {
        let io_error = |path: &Path, e: std::io::Error| ApplicationError::FilesystemError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        fs::copy(from, to).map_err(|e| io_error(to, e))?;
        info!(from = %from.display(), to = %to.display(), "Created default template");
        Ok(())
    }
}

impl PathResolver for FsPathResolver {
    fn resolve(&self, folder: &str, relative: &str) -> CodeloomResult<ResolvedTemplatePath> {
        let id = format!("@{}/{}", folder, relative);
        let not_resolved = |reason: String| ApplicationError::TemplateResolution {
            id: id.clone(),
            reason,
        };

        let relative_path = Path::new(relative);
        if !relative_path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(not_resolved("path escapes its special folder".into()).into());
        }

        let roots = self
            .folders
            .get(folder)
            .ok_or_else(|| not_resolved(format!("unknown special folder '{}'", folder)))?;

        if let Some(user) = &roots.user {
            let candidate = user.join(relative_path);
            if candidate.exists() {
                return Ok(classify(candidate));
            }
        }

        if let Some(builtin) = &roots.builtin {
            let candidate = builtin.join(relative_path);
            if candidate.exists() {
                let copy_to = match (self.policy, &roots.user) {
                    (MissingFilePolicy::CreateDefaultIfMissing, Some(user)) if candidate.is_file() => {
                        Some(user.join(relative_path))
                    }
                    _ => None,
                };
                if let Some(target) = copy_to {
                    match self.copy_default(&candidate, &target) {
                        Ok(()) => return Ok(ResolvedTemplatePath::File(target)),
                        Err(e) => warn!(error = %e, "Could not create default, using built-in"),
                    }
                }
                return Ok(classify(candidate));
            }
        }

        let searched: Vec<String> = self
            .roots(folder)
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        Err(not_resolved(format!("not found in [{}]", searched.join(", "))).into())
    }

    fn folders(&self) -> Vec<String> {
        self.folders.keys().cloned().collect()
    }
}

fn classify(path: PathBuf) -> ResolvedTemplatePath {
    if path.is_dir() {
        ResolvedTemplatePath::Folder(path)
    } else {
        ResolvedTemplatePath::File(path)
    }
}

/// Ordered built-in directory candidates. Missing env var or unresolvable
/// exe paths are omitted.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(3);

    if let Ok(env_dir) = std::env::var(TEMPLATES_DIR_ENV) {
        paths.push(PathBuf::from(env_dir));
    }

    paths.push(PathBuf::from(TEMPLATES_FOLDER));

    if let Some(exe_sibling) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join(TEMPLATES_FOLDER)))
    {
        paths.push(exe_sibling);
    }

    paths
}
