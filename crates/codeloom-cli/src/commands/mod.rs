//! Command handlers plus the adapter wiring they share.

pub mod completions;
pub mod config;
pub mod generate;
pub mod init;
pub mod templates;

use std::path::PathBuf;
use std::sync::Arc;

use codeloom_adapters::resolver::TEMPLATES_FOLDER;
use codeloom_adapters::{
    DiagramEngine, FolderEngine, FsPathResolver, LegacyEngine, MissingFilePolicy, ScriptEngine,
};
use codeloom_core::application::EngineRegistry;

use crate::config::TemplateConfig;

/// Engines configured from the `[templates]` section.
pub(crate) fn engines(config: &TemplateConfig) -> EngineRegistry {
    let diagram = DiagramEngine::with_command(&config.diagram_program, &config.diagram_args);
    let folder = FolderEngine::new().with_exclusions(&config.exclusions);

    EngineRegistry::new()
        .with(Arc::new(ScriptEngine::new()))
        .with(Arc::new(LegacyEngine::new()))
        .with(Arc::new(diagram))
        .with_folder(Arc::new(folder))
}

/// Path resolver for `@templates/...`.  `user_dir` from the command line
/// wins over the configured one.
pub(crate) fn path_resolver(user_dir: Option<PathBuf>, config: &TemplateConfig) -> FsPathResolver {
    let mut resolver = match &config.builtin_dir {
        Some(dir) => FsPathResolver::new().with_builtin(TEMPLATES_FOLDER, dir),
        None => FsPathResolver::discover(None),
    };
    if let Some(dir) = user_dir.or_else(|| config.user_dir.clone()) {
        resolver = resolver.with_user(TEMPLATES_FOLDER, dir);
    }
    if config.create_missing {
        resolver = resolver.with_policy(MissingFilePolicy::CreateDefaultIfMissing);
    }
    resolver
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn command_line_templates_dir_wins_over_config() {
        let config = TemplateConfig {
            builtin_dir: Some(PathBuf::from("/opt/codeloom/templates")),
            user_dir: Some(PathBuf::from("/home/me/templates")),
            ..TemplateConfig::default()
        };
        let resolver = path_resolver(Some(PathBuf::from("./mine")), &config);
        assert_eq!(
            resolver.roots(TEMPLATES_FOLDER),
            vec![Path::new("./mine"), Path::new("/opt/codeloom/templates")]
        );
    }

    #[test]
    fn configured_engines_cover_every_extension() {
        let registry = engines(&TemplateConfig::default());
        for ext in ["tera", "tpl", "dot", "puml"] {
            assert!(registry.handles(ext), "{ext}");
        }
    }
}
