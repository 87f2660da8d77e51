//! Templates compiled into the binary.
//!
//! [`all_templates`] is the single entry point; [`InMemoryStore::with_builtin`]
//! loads it. The built-ins are what the bundled generators ask for by default:
//!
//! - `entity-class`: a C# class per entity (tera).
//! - `project-file`: the `.csproj` of the generated project (legacy `.tpl`).
//!
//! [`InMemoryStore::with_builtin`]: crate::template_store::InMemoryStore::with_builtin

use tracing::{debug, instrument};

use codeloom_core::{
    domain::{ParameterDefinition, Template, TemplateDefinition, TemplateId},
    error::CodeloomResult,
};

const ENTITY_CLASS: &str = r#"// <auto-generated>
//     Generated by codeloom. Changes to this file will be lost.
// </auto-generated>

namespace {{ namespace }}
{
    public class {{ entity }}
    {
{%- for p in properties %}
        public {{ p.type }} {{ p.name }} { get; set; }
{%- endfor %}
    }
}
"#;

const PROJECT_FILE: &str = r#"<Project Sdk="Microsoft.NET.Sdk">

  <PropertyGroup>
#if target_framework
    <TargetFramework>$(target_framework)</TargetFramework>
#else
    <TargetFramework>net8.0</TargetFramework>
#endif
    <RootNamespace>$(namespace)</RootNamespace>
    <AssemblyName>$(project)</AssemblyName>
    <Nullable>enable</Nullable>
  </PropertyGroup>

</Project>
"#;

/// Load every built-in template.
#[instrument]
pub fn all_templates() -> CodeloomResult<Vec<Template>> {
    let templates = vec![
        Template::inline(TemplateId::parse("entity-class")?, "tera", ENTITY_CLASS)
            .with_description("C# class with one auto-property per entity property")
            .with_definition(TemplateDefinition {
                description: None,
                parameters: vec![
                    param("entity", "string", "Class name", true),
                    param("namespace", "string", "Enclosing namespace", true),
                    param(
                        "properties",
                        "array",
                        "Objects with name, type, column, nullable and primary_key",
                        true,
                    ),
                ],
            }),
        Template::inline(TemplateId::parse("project-file")?, "tpl", PROJECT_FILE)
            .with_description("SDK-style .csproj for the generated project")
            .with_definition(TemplateDefinition {
                description: None,
                parameters: vec![
                    param("project", "string", "Assembly name", true),
                    param("namespace", "string", "Root namespace", true),
                    param("target_framework", "string", "Defaults to net8.0", false),
                ],
            }),
    ];

    debug!(count = templates.len(), "Loaded built-in templates");
    Ok(templates)
}

fn param(name: &str, type_descriptor: &str, description: &str, required: bool) -> ParameterDefinition {
    ParameterDefinition {
        name: name.to_string(),
        type_descriptor: type_descriptor.to_string(),
        description: description.to_string(),
        required,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_have_unique_plain_ids() {
        let templates = all_templates().unwrap();
        let mut ids: Vec<_> = templates.iter().map(|t| t.id().as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), templates.len());
        assert!(templates.iter().all(|t| !t.id().is_special_folder()));
        assert!(templates.iter().all(|t| t.is_cacheable()));
    }

    #[test]
    fn engine_keys_match_bundled_engines() {
        let templates = all_templates().unwrap();
        let keys: Vec<_> = templates.iter().filter_map(|t| t.engine_key()).collect();
        assert_eq!(keys, ["tera", "tpl"]);
    }
}
