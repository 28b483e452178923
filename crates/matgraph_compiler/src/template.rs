//! Stage Template Manager
//!
//! Stage headers, `main()` prologues and epilogues live in embedded GLSL
//! templates rendered with minijinja. Generated declarations and the sink
//! body are injected as line lists.
//!
//! Syntax: `{$ ... $}` blocks, `{{ ... }}` variables.

use std::borrow::Cow;
use std::sync::OnceLock;

use minijinja::{Environment, Error, ErrorKind, syntax::SyntaxConfig};
use rust_embed::RustEmbed;
use serde::Serialize;

use matgraph_core::{GraphError, Result, Stage};

/// Interpolated mesh UV, used when a UV input is unwired.
pub const DEFAULT_UV: &str = "TexCoords";

/// Engine-provided time in seconds, read by panners.
pub const TIME_UNIFORM: &str = "u_Time";

/// Names declared by the stage templates. Node identifiers may not shadow them.
pub const RESERVED_IDENTIFIERS: &[&str] = &[
    "main",
    DEFAULT_UV,
    TIME_UNIFORM,
    "FragPos",
    "TBN",
    "AlbedoOut",
    "NormalOut",
    "MaterialOut",
    "EmissiveOut",
    "Metallic",
    "Roughness",
    "AmbientOcclusion",
    "VertexOffset",
    "u_Model",
    "u_View",
    "u_Projection",
    "a_Position",
    "a_Normal",
    "a_TexCoords",
    "a_Tangent",
    "a_Bitangent",
    "worldPos",
    "T",
    "B",
    "N",
];

static STAGE_ENV: OnceLock<std::result::Result<Environment<'static>, String>> = OnceLock::new();

#[derive(RustEmbed)]
#[folder = "src/shaders"]
struct StageTemplates;

/// Shared template environment, built on first use.
pub fn get_env() -> Result<&'static Environment<'static>> {
    STAGE_ENV
        .get_or_init(build_env)
        .as_ref()
        .map_err(|e| GraphError::Template(e.clone()))
}

fn build_env() -> std::result::Result<Environment<'static>, String> {
    let mut env = Environment::new();

    let syntax = SyntaxConfig::builder()
        .block_delimiters("{$", "$}")
        .variable_delimiters("{{", "}}")
        .build()
        .map_err(|e| format!("Failed to configure template syntax: {e}"))?;

    env.set_syntax(syntax);
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
    env.set_loader(stage_loader);

    Ok(env)
}

fn stage_loader(name: &str) -> std::result::Result<Option<String>, Error> {
    let filename = if std::path::Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("glsl"))
    {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("{name}.glsl"))
    };

    let Some(file) = StageTemplates::get(&filename) else {
        return Ok(None);
    };

    match std::str::from_utf8(file.data.as_ref()) {
        Ok(source) => Ok(Some(source.to_string())),
        Err(e) => Err(Error::new(
            ErrorKind::TemplateNotFound,
            format!("Template {filename} is not UTF-8: {e}"),
        )),
    }
}

/// Values injected into a stage template.
#[derive(Debug, Serialize)]
pub(crate) struct StageContext<'a> {
    pub version: u32,
    pub declarations: &'a [String],
    pub body: &'a [String],
}

/// Renders the program for `stage`.
pub(crate) fn render_stage(stage: Stage, ctx: &StageContext<'_>) -> Result<String> {
    let env = get_env()?;

    let template = env
        .get_template(stage.template_name())
        .map_err(template_error)?;

    let mut source = template.render(ctx).map_err(template_error)?;
    if !source.ends_with('\n') {
        source.push('\n');
    }
    Ok(source)
}

fn template_error(err: Error) -> GraphError {
    GraphError::Template(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_stage_templates_are_embedded() {
        let env = get_env().unwrap();
        for stage in Stage::ALL {
            assert!(env.get_template(stage.template_name()).is_ok(), "{stage:?}");
        }
    }

    #[test]
    fn test_render_injects_lines_in_order() {
        let declarations = vec!["uniform sampler2D a;".to_string(), "float b;".to_string()];
        let body = vec!["b = 1.0;".to_string(), "Metallic = b;".to_string()];
        let source = render_stage(
            Stage::Fragment,
            &StageContext {
                version: 410,
                declarations: &declarations,
                body: &body,
            },
        )
        .unwrap();

        assert!(source.starts_with("#version 410 core\n"));
        let a = source.find("uniform sampler2D a;").unwrap();
        let b = source.find("float b;").unwrap();
        let main = source.find("void main()").unwrap();
        let assign = source.find("    b = 1.0;\n    Metallic = b;\n").unwrap();
        assert!(a < b && b < main && main < assign);
    }

    #[test]
    fn test_missing_template_is_reported() {
        let env = get_env().unwrap();
        assert!(env.get_template("material.geom").is_err());
    }
}
