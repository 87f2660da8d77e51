//! Tera-backed scripting engine for `.tera` templates.
//!
//! `{% include %}`, `{% import %}` and `{% extends %}` name other templates
//! by template id, plain (`entity-class`) or special-folder
//! (`@templates/partials/Header.cs.tera`). The referenced templates are
//! resolved through the render scope and compiled alongside the template
//! being rendered.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tera::{Context, Tera};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use codeloom_core::application::{RenderScope, TemplateEngine};
use codeloom_core::domain::{Template, TemplateDiagnostic, TemplateId, TemplateInstance, TemplateOutput};

use super::{EngineError, MAX_INCLUDE_DEPTH, cancelled, template_text, text_output};

/// A compiled template is only reused for the same id resolving to the same
/// file, so a user override shadowing a built-in gets its own entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    id: TemplateId,
    path: Option<PathBuf>,
}

impl CacheKey {
    fn of(template: &Template) -> Self {
        Self {
            id: template.id().clone(),
            path: template.source().path().map(PathBuf::from),
        }
    }
}

/// Renders tera templates. Output is never HTML-escaped.
///
/// Compiled templates are cached when the template and everything it
/// references are marked cacheable.
#[derive(Default)]
pub struct ScriptEngine {
    cache: Mutex<HashMap<CacheKey, Arc<Tera>>>,
}

impl ScriptEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of compiled templates held in the cache.
    pub fn cached(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    async fn compiled(
        &self,
        template: &Template,
        scope: &RenderScope<'_>,
    ) -> Result<Arc<Tera>, TemplateDiagnostic> {
        let key = CacheKey::of(template);
        if template.is_cacheable() {
            let hit = self.cache.lock().ok().and_then(|c| c.get(&key).cloned());
            if let Some(tera) = hit {
                return Ok(tera);
            }
        }

        let text = template_text(template).await?;
        let (sources, cacheable) = referenced_sources(template, text, scope).await?;

        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.add_raw_templates(sources)
            .map_err(|e| diagnostic(template, &e))?;
        let tera = Arc::new(tera);

        if cacheable {
            if let Ok(mut cache) = self.cache.lock() {
                debug!(template = %template.id(), "Caching compiled template");
                cache.insert(key, tera.clone());
            }
        }
        Ok(tera)
    }
}

/// The template's own text followed by every template it references,
/// transitively, each under the name it is referenced by. The flag tells
/// whether the whole set may be cached.
async fn referenced_sources(
    root: &Template,
    text: String,
    scope: &RenderScope<'_>,
) -> Result<(Vec<(String, String)>, bool), TemplateDiagnostic> {
    let origin = |error: EngineError| {
        let diagnostic = TemplateDiagnostic::from(error);
        match root.source().path() {
            Some(path) => diagnostic.in_path(path.display().to_string()),
            None => diagnostic.in_path(root.id().to_string()),
        }
    };

    let mut cacheable = root.is_cacheable();
    let mut seen = HashSet::from([root.id().to_string()]);
    let mut queue: VecDeque<(Reference, usize)> =
        references(&text).into_iter().map(|r| (r, 1)).collect();
    let mut sources = vec![(root.id().to_string(), text)];

    while let Some((reference, depth)) = queue.pop_front() {
        if !seen.insert(reference.name.clone()) {
            continue;
        }
        if depth > MAX_INCLUDE_DEPTH {
            return Err(origin(EngineError::IncludeDepth {
                id: reference.name,
                limit: MAX_INCLUDE_DEPTH,
            }));
        }

        let resolved = TemplateId::parse(&reference.name)
            .map_err(|e| e.to_string())
            .and_then(|id| scope.resolver.resolve(&id).map_err(|e| e.to_string()));
        let template = match resolved {
            Ok(template) => template,
            Err(_) if reference.optional => {
                debug!(include = %reference.name, "Skipping missing optional include");
                continue;
            }
            Err(reason) => {
                return Err(origin(EngineError::Include {
                    id: reference.name,
                    reason,
                }));
            }
        };

        let text = template_text(&template).await?;
        debug!(include = %reference.name, depth, "Loaded referenced template");
        cacheable &= template.is_cacheable();
        queue.extend(references(&text).into_iter().map(|r| (r, depth + 1)));
        sources.push((reference.name, text));
    }
    Ok((sources, cacheable))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Reference {
    name: String,
    /// `{% include "x" ignore missing %}`
    optional: bool,
}

/// Template names named by `include`, `import` and `extends` tags, in order
/// of appearance.
fn references(text: &str) -> Vec<Reference> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("{%") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("%}") else {
            break;
        };
        let tag = after[..end].trim_matches(|c: char| c == '-' || c.is_whitespace());
        rest = &after[end + 2..];

        let (keyword, arguments) = tag.split_once(char::is_whitespace).unwrap_or((tag, ""));
        let names = match keyword {
            "include" => quoted(arguments),
            "import" | "extends" => quoted(arguments).into_iter().take(1).collect(),
            _ => continue,
        };
        let optional = keyword == "include" && arguments.contains("ignore missing");
        found.extend(names.into_iter().map(|name| Reference { name, optional }));
    }
    found
}

fn quoted(mut arguments: &str) -> Vec<String> {
    let mut names = Vec::new();
    while let Some(start) = arguments.find(['"', '\'', '`']) {
        let quote = arguments.as_bytes()[start] as char;
        let body = &arguments[start + 1..];
        let Some(len) = body.find(quote) else {
            break;
        };
        names.push(body[..len].to_string());
        arguments = &body[len + 1..];
    }
    names
}

#[async_trait]
impl TemplateEngine for ScriptEngine {
    fn name(&self) -> &'static str {
        "script"
    }

    fn extensions(&self) -> &[&'static str] {
        &["tera"]
    }

    #[instrument(skip_all, fields(template = %instance.template().id()))]
    async fn render(
        &self,
        instance: &TemplateInstance,
        scope: &RenderScope<'_>,
        cancel: &CancellationToken,
    ) -> TemplateOutput {
        if cancel.is_cancelled() {
            return cancelled();
        }

        let template = instance.template();
        let tera = match self.compiled(template, scope).await {
            Ok(tera) => tera,
            Err(diagnostic) => return TemplateOutput::failure(diagnostic),
        };

        let mut context = Context::new();
        for (name, value) in instance.parameters() {
            context.insert(name.as_str(), value);
        }

        match tera.render(template.id().as_str(), &context) {
            Ok(text) => text_output(instance, text),
            Err(e) => TemplateOutput::failure(diagnostic(template, &e)),
        }
    }
}

/// Flatten the tera error chain into one diagnostic, picking up the
/// `--> line:column` marker parse errors carry.
fn diagnostic(template: &Template, error: &tera::Error) -> TemplateDiagnostic {
    let mut messages = vec![error.to_string()];
    let mut source = std::error::Error::source(error);
    while let Some(inner) = source {
        messages.push(inner.to_string());
        source = inner.source();
    }
    let message = messages.join(": ");

    let location = location(&message);
    let mut diagnostic = TemplateDiagnostic::new(message);
    if let Some((line, column)) = location {
        diagnostic = diagnostic.at(line, column);
    }
    match template.source().path() {
        Some(path) => diagnostic.in_path(path.display().to_string()),
        None => diagnostic.in_path(template.id().to_string()),
    }
}

fn location(message: &str) -> Option<(usize, usize)> {
    let start = message.find("--> ")? + 4;
    let token = message[start..].split_whitespace().next()?;
    let (line, column) = token.split_once(':')?;
    Some((line.parse().ok()?, column.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeloom_core::application::{EngineRegistry, TemplateResolver};
    use serde_json::json;

    use codeloom_core::application::ports::TemplateStore;
    use std::fs;
    use tempfile::TempDir;

    use crate::resolver::FsPathResolver;
    use crate::template_store::InMemoryStore;

    async fn render_in(
        engine: &ScriptEngine,
        resolver: &TemplateResolver,
        instance: &TemplateInstance,
    ) -> TemplateOutput {
        let engines = EngineRegistry::new();
        let scope = RenderScope {
            resolver,
            engines: &engines,
            definitions: None,
        };
        engine.render(instance, &scope, &CancellationToken::new()).await
    }

    async fn render(engine: &ScriptEngine, instance: &TemplateInstance) -> TemplateOutput {
        let resolver = TemplateResolver::new(Arc::new(InMemoryStore::new()));
        render_in(engine, &resolver, instance).await
    }

    fn templates_folder(dir: &TempDir) -> TemplateResolver {
        TemplateResolver::new(Arc::new(InMemoryStore::new())).with_paths(Arc::new(
            FsPathResolver::new().with_builtin("templates", dir.path()),
        ))
    }

    fn inline(id: &str, text: &'static str) -> TemplateInstance {
        TemplateInstance::new(Template::inline(TemplateId::parse(id).unwrap(), "tera", text))
    }

    fn text(output: &TemplateOutput) -> &str {
        output.artifacts()[0]
            .content
            .as_ref()
            .and_then(|c| c.as_text())
            .unwrap()
    }

    #[tokio::test]
    async fn renders_parameters_without_escaping() {
        let instance = inline("greeting", "Hello <{{ name }}> & {{ items | length }}")
            .with_parameter("name", "World")
            .with_parameter("items", json!([1, 2, 3]));

        let output = render(&ScriptEngine::new(), &instance).await;
        assert!(output.is_success(), "{:?}", output.errors());
        assert_eq!(text(&output), "Hello <World> & 3");
        assert_eq!(output.artifacts()[0].file_name(), "greeting");
    }

    #[tokio::test]
    async fn syntax_errors_carry_a_location() {
        let instance = inline("broken", "line one\nHello {{ name");
        let output = render(&ScriptEngine::new(), &instance).await;

        assert!(output.is_failure());
        let error = &output.errors()[0];
        assert!(error.message.contains("Failed to parse"), "{}", error.message);
        assert!(error.location.is_some(), "{}", error.message);
    }

    #[tokio::test]
    async fn undefined_variables_fail() {
        let output = render(&ScriptEngine::new(), &inline("needs-name", "{{ name }}")).await;
        assert!(output.is_failure());
        assert!(output.errors()[0].message.contains("name"));
    }

    #[tokio::test]
    async fn only_cacheable_templates_are_cached() {
        let engine = ScriptEngine::new();
        let cached = inline("cached", "{{ n }}").with_parameter("n", 1);
        render(&engine, &cached).await;
        render(&engine, &cached.clone().with_parameter("n", 2)).await;
        assert_eq!(engine.cached(), 1);

        let owned = TemplateInstance::new(Template::owned(
            TemplateId::parse("owned").unwrap(),
            "tera",
            "{{ n }}",
        ))
        .with_parameter("n", 3);
        let output = render(&engine, &owned).await;
        assert_eq!(text(&output), "3");
        assert_eq!(engine.cached(), 1);
    }

    #[tokio::test]
    async fn blank_output_has_no_artifacts() {
        let output = render(&ScriptEngine::new(), &inline("blank", "{% if false %}x{% endif %}  \n")).await;
        assert!(output.is_success());
        assert!(output.artifacts().is_empty());
    }

    #[tokio::test]
    async fn file_templates_drop_their_engine_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("Greeting.txt.tera");
        std::fs::write(&path, "Hi {{ who }}").unwrap();

        let instance = TemplateInstance::new(Template::file(
            TemplateId::parse("@t/Greeting.txt.tera").unwrap(),
            &path,
        ))
        .with_parameter("who", "there");
        let output = render(&ScriptEngine::new(), &instance).await;
        assert_eq!(output.artifacts()[0].file_name(), "Greeting.txt");
        assert_eq!(text(&output), "Hi there");
    }

    #[tokio::test]
    async fn includes_special_folder_partials() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("partials")).unwrap();
        fs::write(
            dir.path().join("partials/Header.cs.tera"),
            "// {{ namespace }}",
        )
        .unwrap();

        let engine = ScriptEngine::new();
        let instance = inline(
            "entity",
            "{% include \"@templates/partials/Header.cs.tera\" %}\nclass {{ name }} {}",
        )
        .with_parameter("namespace", "Shop.Models")
        .with_parameter("name", "Customer");
        let output = render_in(&engine, &templates_folder(&dir), &instance).await;

        assert!(output.is_success(), "{:?}", output.errors());
        assert_eq!(text(&output), "// Shop.Models\nclass Customer {}");
        // the partial is a file on disk, so the set is compiled per render
        assert_eq!(engine.cached(), 0);
    }

    #[tokio::test]
    async fn imports_macros_by_plain_id() {
        let store = InMemoryStore::new();
        store
            .insert(Template::inline(
                TemplateId::parse("property-macros").unwrap(),
                "tera",
                "{% macro field(name) %}public int {{ name }};{% endmacro field %}",
            ))
            .unwrap();
        let resolver = TemplateResolver::new(Arc::new(store));

        let engine = ScriptEngine::new();
        let instance = inline(
            "with-macros",
            "{% import \"property-macros\" as m %}{{ m::field(name=\"Id\") }}",
        );
        let output = render_in(&engine, &resolver, &instance).await;

        assert!(output.is_success(), "{:?}", output.errors());
        assert_eq!(text(&output), "public int Id;");
        assert_eq!(engine.cached(), 1);
    }

    #[tokio::test]
    async fn unresolved_include_is_a_failure_value() {
        let dir = TempDir::new().unwrap();
        let instance = inline("needs-partial", "{% include \"@templates/missing.tera\" %}");
        let output = render_in(&ScriptEngine::new(), &templates_folder(&dir), &instance).await;

        assert!(output.is_failure());
        let message = &output.errors()[0].message;
        assert!(message.contains("cannot include '@templates/missing.tera'"), "{message}");
    }

    #[tokio::test]
    async fn optional_include_may_be_missing() {
        let dir = TempDir::new().unwrap();
        let instance = inline(
            "optional",
            "{% include \"@templates/missing.tera\" ignore missing %}body",
        );
        let output = render_in(&ScriptEngine::new(), &templates_folder(&dir), &instance).await;
        assert!(output.is_success(), "{:?}", output.errors());
        assert_eq!(text(&output), "body");
    }

    #[tokio::test]
    async fn cache_entries_follow_the_resolved_file() {
        let builtin = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        fs::write(builtin.path().join("Entity.tera"), "builtin {{ n }}").unwrap();
        fs::write(user.path().join("Entity.tera"), "user {{ n }}").unwrap();

        let id = TemplateId::parse("@templates/Entity.tera").unwrap();
        let engine = ScriptEngine::new();
        for (dir, expected) in [(&builtin, "builtin 1"), (&user, "user 1")] {
            let template = Template::file(id.clone(), dir.path().join("Entity.tera")).cacheable(true);
            let instance = TemplateInstance::new(template).with_parameter("n", 1);
            let output = render(&engine, &instance).await;
            assert_eq!(text(&output), expected);
        }
        assert_eq!(engine.cached(), 2);
    }

    #[test]
    fn references_are_read_from_tags() {
        let found = references(
            "{%- extends \"base\" -%}{% import 'macros' as m %}\
             {% include [\"a\", \"b\"] ignore missing %}{% if x %}{{ y }}{% endif %}",
        );
        let names: Vec<&str> = found.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["base", "macros", "a", "b"]);
        assert!(!found[0].optional);
        assert!(found[2].optional && found[3].optional);
    }

    #[test]
    fn location_marker_is_parsed() {
        assert_eq!(location("bad\n --> 2:15\n  |"), Some((2, 15)));
        assert_eq!(location("no marker"), None);
    }
}
