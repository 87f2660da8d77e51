//! Line-oriented preprocessor for legacy `.tpl` templates.
//!
//! Directives occupy a whole line, optionally indented:
//!
//! ```text
//! #if NAME          keep the block when parameter NAME is truthy
//! #ifnot NAME       keep the block when NAME is missing or falsy
//! #else
//! #endif
//! #include <id>     splice in another template, preprocessed with the same parameters
//! ```
//!
//! Everywhere else `$(NAME)` is replaced by the parameter value. A line
//! starting with `##` is emitted with a single `#`; `$$` is a literal `$`.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use codeloom_core::application::{RenderScope, TemplateEngine};
use codeloom_core::domain::{TemplateDiagnostic, TemplateId, TemplateInstance, TemplateOutput};

use super::{EngineError, MAX_INCLUDE_DEPTH, cancelled, template_text, text_output};

#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyEngine;

impl LegacyEngine {
    pub fn new() -> Self {
        Self
    }

    fn expand<'a>(
        &'a self,
        text: String,
        origin: String,
        instance: &'a TemplateInstance,
        scope: &'a RenderScope<'a>,
        cancel: &'a CancellationToken,
        depth: usize,
    ) -> BoxFuture<'a, Result<String, Vec<TemplateDiagnostic>>> {
        async move {
            let mut out = String::with_capacity(text.len());
            let mut errors = Vec::new();
            let mut stack: Vec<Block> = Vec::new();

            for (index, raw) in text.split_inclusive('\n').enumerate() {
                let line_no = index + 1;
                let line = raw.trim_end_matches(['\n', '\r']);
                let ending = &raw[line.len()..];
                let indent = line.len() - line.trim_start().len();
                let body = &line[indent..];
                let column = line[..indent].chars().count() + 1;
                let at = |message: String| {
                    TemplateDiagnostic::new(message)
                        .at(line_no, column)
                        .in_path(origin.clone())
                };
                let active = stack.last().is_none_or(Block::active);

                let Some(directive) = body.strip_prefix('#').filter(|d| !d.starts_with('#')) else {
                    if active {
                        let literal = match body.strip_prefix('#') {
                            Some(escaped) => format!("{}{}", &line[..indent], escaped),
                            None => line.to_string(),
                        };
                        match substitute(&literal, instance) {
                            Ok(text) => out.push_str(&text),
                            Err((col, message)) => errors.push(
                                TemplateDiagnostic::new(message)
                                    .at(line_no, col)
                                    .in_path(origin.clone()),
                            ),
                        }
                        out.push_str(ending);
                    }
                    continue;
                };

                let (keyword, argument) = match directive.split_once(char::is_whitespace) {
                    Some((keyword, argument)) => (keyword, argument.trim()),
                    None => (directive.trim(), ""),
                };

                match keyword {
                    "if" | "ifnot" => {
                        if argument.is_empty() {
                            errors.push(at(format!("#{} needs a parameter name", keyword)));
                        }
                        let truthy = instance.parameter(argument).is_some_and(is_truthy);
                        stack.push(Block {
                            line: line_no,
                            column,
                            parent_active: active,
                            taken: truthy == (keyword == "if"),
                            in_else: false,
                        });
                    }
                    "else" => match stack.last_mut() {
                        None => errors.push(at("#else without matching #if".into())),
                        Some(block) if block.in_else => errors.push(at(format!(
                            "second #else for the #if on line {}",
                            block.line
                        ))),
                        Some(block) => block.in_else = true,
                    },
                    "endif" => {
                        if stack.pop().is_none() {
                            errors.push(at("#endif without matching #if".into()));
                        }
                    }
                    "include" if !active => {}
                    "include" => {
                        let Some(id) = argument.strip_prefix('<').and_then(|a| a.strip_suffix('>'))
                        else {
                            errors.push(at("expected #include <template-id>".into()));
                            continue;
                        };
                        if depth >= MAX_INCLUDE_DEPTH {
                            errors.push(at(EngineError::IncludeDepth {
                                id: id.to_string(),
                                limit: MAX_INCLUDE_DEPTH,
                            }
                            .to_string()));
                            continue;
                        }
                        match self.include(id, instance, scope, cancel, depth).await {
                            Ok(text) => {
                                out.push_str(&text);
                                if !text.is_empty() && !text.ends_with('\n') {
                                    out.push_str(ending);
                                }
                            }
                            Err(mut nested) => errors.append(&mut nested),
                        }
                    }
                    "" => errors.push(at("empty directive".into())),
                    other => errors.push(at(format!("unknown directive '#{}'", other))),
                }
            }

            for block in stack {
                errors.push(
                    TemplateDiagnostic::new("#if without matching #endif")
                        .at(block.line, block.column)
                        .in_path(origin.clone()),
                );
            }

            if errors.is_empty() { Ok(out) } else { Err(errors) }
        }
        .boxed()
    }

    async fn include(
        &self,
        id: &str,
        instance: &TemplateInstance,
        scope: &RenderScope<'_>,
        cancel: &CancellationToken,
        depth: usize,
    ) -> Result<String, Vec<TemplateDiagnostic>> {
        if cancel.is_cancelled() {
            return Err(vec![EngineError::Cancelled.into()]);
        }
        let include_error = |reason: String| -> Vec<TemplateDiagnostic> {
            vec![
                EngineError::Include {
                    id: id.to_string(),
                    reason,
                }
                .into(),
            ]
        };

        let id = TemplateId::parse(id).map_err(|e| include_error(e.to_string()))?;
        let template = scope
            .resolver
            .resolve(&id)
            .map_err(|e| include_error(e.to_string()))?;
        let text = template_text(&template).await.map_err(|d| vec![d])?;
        debug!(include = %id, depth, "Expanding include");

        self.expand(text, id.to_string(), instance, scope, cancel, depth + 1)
            .await
    }
}

#[derive(Debug)]
struct Block {
    line: usize,
    column: usize,
    parent_active: bool,
    taken: bool,
    in_else: bool,
}

impl Block {
    fn active(&self) -> bool {
        self.parent_active && (self.taken != self.in_else)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Replace `$(NAME)` references. Errors carry the 1-based column.
fn substitute(line: &str, instance: &TemplateInstance) -> Result<String, (usize, String)> {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let column = line[..i].chars().count() + 1;
        match chars.peek() {
            Some((_, '$')) => {
                chars.next();
                out.push('$');
            }
            Some((_, '(')) => {
                let start = i + 2;
                let Some(len) = line[start..].find(')') else {
                    return Err((column, "unterminated '$(' reference".into()));
                };
                let name = line[start..start + len].trim();
                match instance.parameter(name) {
                    Some(value) => out.push_str(&display(value)),
                    None => return Err((column, format!("missing parameter '{}'", name))),
                }
                let close = start + len;
                for (j, _) in chars.by_ref() {
                    if j == close {
                        break;
                    }
                }
            }
            _ => out.push('$'),
        }
    }
    Ok(out)
}

#[async_trait]
impl TemplateEngine for LegacyEngine {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn extensions(&self) -> &[&'static str] {
        &["tpl"]
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
        let text = match template_text(template).await {
            Ok(text) => text,
            Err(diagnostic) => return TemplateOutput::failure(diagnostic),
        };
        let origin = template
            .source()
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| template.id().to_string());

        match self.expand(text, origin, instance, scope, cancel, 0).await {
            Ok(text) => text_output(instance, text),
            Err(errors) => TemplateOutput::Failure { errors },
        }
    }
}
