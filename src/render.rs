//! Rendering contract.
//!
//! Controllers resolve an ordered list of template candidates (most specific
//! first) and ask the [`Renderer`] to render the first one it knows. Template
//! selection rules live in [`controller`](crate::controller); this module only
//! renders.

use minijinja::Environment;
use thiserror::Error;

/// Data handed to a template.
pub type RenderContext = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("none of the templates [{}] exist", .0.join(", "))]
    TemplateNotFound(Vec<String>),

    #[error("template '{name}' failed to render: {message}")]
    Template { name: String, message: String },
}

pub trait Renderer: Send + Sync {
    /// Whether any of `candidates` can be rendered
    fn has_template(&self, candidates: &[String]) -> bool;

    /// Render the first existing candidate with `context`
    fn render(&self, candidates: &[String], context: &RenderContext) -> Result<String, RenderError>;
}

/// Renderer that knows no templates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn has_template(&self, _candidates: &[String]) -> bool {
        false
    }

    fn render(&self, candidates: &[String], _context: &RenderContext) -> Result<String, RenderError> {
        Err(RenderError::TemplateNotFound(candidates.to_vec()))
    }
}

/// minijinja-backed renderer over named in-memory templates.
///
/// Templates are parsed once when added; a syntax error is reported then.
///
/// ```rust
/// use director::render::{RenderContext, Renderer, TemplateRenderer};
///
/// let renderer = TemplateRenderer::new().with_template("Page", "Hello {{ Title }}").unwrap();
/// let mut ctx = RenderContext::new();
/// ctx.insert("Title".into(), "World".into());
/// let body = renderer.render(&["Page_show".into(), "Page".into()], &ctx).unwrap();
/// assert_eq!(body, "Hello World");
/// ```
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
        }
    }

    pub fn with_template(
        mut self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<Self, RenderError> {
        self.add_template(name, source)?;
        Ok(self)
    }

    pub fn add_template(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<(), RenderError> {
        let name = name.into();
        self.env
            .add_template_owned(name.clone(), source.into())
            .map_err(|e| RenderError::Template {
                name,
                message: e.to_string(),
            })
    }
}

impl Renderer for TemplateRenderer {
    fn has_template(&self, candidates: &[String]) -> bool {
        candidates.iter().any(|c| self.env.get_template(c).is_ok())
    }

    fn render(&self, candidates: &[String], context: &RenderContext) -> Result<String, RenderError> {
        let template = candidates
            .iter()
            .find_map(|c| self.env.get_template(c).ok())
            .ok_or_else(|| RenderError::TemplateNotFound(candidates.to_vec()))?;

        template.render(context).map_err(|e| RenderError::Template {
            name: template.name().to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_existing_candidate_wins() {
        let renderer = TemplateRenderer::new()
            .with_template("Shop", "shop")
            .unwrap()
            .with_template("Shop_cart", "cart")
            .unwrap();
        let body = renderer
            .render(
                &["Shop_cart".into(), "Shop".into()],
                &RenderContext::new(),
            )
            .unwrap();
        assert_eq!(body, "cart");
    }

    #[test]
    fn missing_templates_are_reported() {
        let renderer = TemplateRenderer::new();
        let err = renderer
            .render(&["Nope".into()], &RenderContext::new())
            .unwrap_err();
        assert!(matches!(err, RenderError::TemplateNotFound(ref c) if c == &["Nope".to_string()]));
        assert!(!NullRenderer.has_template(&["Nope".into()]));
    }

    #[test]
    fn syntax_errors_surface_when_added() {
        let err = TemplateRenderer::new()
            .with_template("Broken", "{% if %}")
            .err()
            .unwrap();
        assert!(matches!(err, RenderError::Template { ref name, .. } if name == "Broken"));
    }
}
