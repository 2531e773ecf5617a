//! Template candidate lists derived from the controller ancestry.

use std::collections::HashMap;

use crate::dispatcher::INDEX_ACTION;

/// Class at which ancestry-derived template lookup stops.
pub const CONTROLLER_CLASS: &str = "Controller";

/// Explicit template choices that bypass ancestry lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateOverrides {
    /// Per-action template names (`index` doubles as the fallback)
    pub templates: HashMap<String, String>,
    /// Single template used for every action
    pub template: Option<String>,
}

impl TemplateOverrides {
    fn pick(&self, action: &str) -> Option<&str> {
        let non_empty = |s: &&String| !s.is_empty();
        self.templates
            .get(action)
            .filter(non_empty)
            .or_else(|| self.templates.get(INDEX_ACTION).filter(non_empty))
            .or_else(|| self.template.as_ref().filter(non_empty))
            .map(String::as_str)
    }
}

/// Template name for a class: everything before the first `_`.
#[must_use]
pub fn template_base(class: &str) -> &str {
    class.split('_').next().unwrap_or(class)
}

/// Candidates for rendering `action`, most specific first.
///
/// An explicit override wins outright. Otherwise every `Class_action`
/// (skipped for `index`) comes before every plain `Class`, walking from
/// the most-derived class down to and including `Controller`.
#[must_use]
pub fn viewer_candidates<'a>(
    ancestry: impl IntoIterator<Item = &'a str>,
    action: &str,
    overrides: &TemplateOverrides,
) -> Vec<String> {
    if let Some(name) = overrides.pick(action) {
        return vec![name.to_string()];
    }

    let with_action = !action.is_empty() && action != INDEX_ACTION;
    let mut action_templates = Vec::new();
    let mut class_templates = Vec::new();
    for class in controller_classes(ancestry, true) {
        let base = template_base(class);
        if with_action {
            action_templates.push(format!("{base}_{action}"));
        }
        class_templates.push(base.to_string());
    }

    let mut candidates: Vec<String> = Vec::with_capacity(action_templates.len() + class_templates.len());
    for name in action_templates.into_iter().chain(class_templates) {
        if !candidates.contains(&name) {
            candidates.push(name);
        }
    }
    candidates
}

/// `Class_action` candidates for subclasses of `Controller` only.
#[must_use]
pub fn action_template_candidates<'a>(
    ancestry: impl IntoIterator<Item = &'a str>,
    action: &str,
) -> Vec<String> {
    controller_classes(ancestry, false)
        .map(|class| format!("{}_{action}", template_base(class)))
        .collect()
}

/// Classes from most-derived down to `Controller`, optionally including it.
fn controller_classes<'a>(
    ancestry: impl IntoIterator<Item = &'a str>,
    include_controller: bool,
) -> impl Iterator<Item = &'a str> {
    let mut reached = false;
    ancestry.into_iter().filter_map(move |class| {
        if reached {
            return None;
        }
        if class == CONTROLLER_CLASS {
            reached = true;
            return include_controller.then_some(class);
        }
        Some(class)
    })
}
