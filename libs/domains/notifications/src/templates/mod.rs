//! Email template rendering engine.
//!
//! Each template is a named trio of Handlebars sources (subject, plain text and
//! an optional HTML body) plus the placeholder keys that must be present in the
//! data bag. Subjects and text bodies are rendered without HTML escaping; the
//! HTML body uses Handlebars' default escaping and the shared layout partials.

pub mod builtin;

use crate::error::{NotificationError, NotificationResult};
use crate::models::TemplateData;
use handlebars::Handlebars;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Rendered email content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    /// Single-line subject.
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

/// Source of a named template.
#[derive(Debug, Clone)]
pub struct TemplateDefinition {
    pub name: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
    pub required: Vec<String>,
}

impl TemplateDefinition {
    pub fn new(name: impl Into<String>, subject: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subject: subject.into(),
            text: text.into(),
            html: None,
            required: Vec::new(),
        }
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Declare placeholder keys that must resolve to a non-empty value.
    pub fn require(mut self, keys: &[&str]) -> Self {
        self.required.extend(keys.iter().map(|key| key.to_string()));
        self
    }
}

/// Template engine for rendering email templates.
pub struct TemplateEngine {
    plain: Handlebars<'static>,
    html: Handlebars<'static>,
    definitions: HashMap<String, TemplateDefinition>,
}

impl TemplateEngine {
    /// Engine with the built-in templates registered.
    pub fn new() -> NotificationResult<Self> {
        let mut engine = Self::empty()?;
        for definition in builtin::definitions() {
            engine.register(definition)?;
        }
        Ok(engine)
    }

    /// Engine with the layout partials but no templates.
    pub fn empty() -> NotificationResult<Self> {
        let mut plain = Handlebars::new();
        plain.register_escape_fn(handlebars::no_escape);

        let mut html = Handlebars::new();
        html.register_partial("layout_header", builtin::LAYOUT_HEADER)?;
        html.register_partial("layout_footer", builtin::LAYOUT_FOOTER)?;

        Ok(Self {
            plain,
            html,
            definitions: HashMap::new(),
        })
    }

    /// Register or replace a template.
    pub fn register(&mut self, definition: TemplateDefinition) -> NotificationResult<()> {
        let name = definition.name.clone();
        if name.trim().is_empty() {
            return Err(NotificationError::TemplateError(
                "template name must not be empty".to_string(),
            ));
        }

        self.plain
            .register_template_string(&format!("{name}_subject"), &definition.subject)
            .map_err(|e| registration_error(&name, "subject", e))?;
        self.plain
            .register_template_string(&format!("{name}_text"), &definition.text)
            .map_err(|e| registration_error(&name, "text", e))?;

        match &definition.html {
            Some(source) => self
                .html
                .register_template_string(&format!("{name}_html"), source)
                .map_err(|e| registration_error(&name, "html", e))?,
            None => self.html.unregister_template(&format!("{name}_html")),
        }

        debug!(template = %name, required = ?definition.required, "Registered email template");
        self.definitions.insert(name, definition);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Registered template names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.definitions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Render `name` against `data`.
    ///
    /// Fails with `TemplateNotFound` for an unknown name and with
    /// `MissingPlaceholder` when a required key is absent, null or blank.
    pub fn render(&self, name: &str, data: &TemplateData) -> NotificationResult<RenderedEmail> {
        let definition = self
            .definitions
            .get(name)
            .ok_or_else(|| NotificationError::TemplateNotFound(name.to_string()))?;

        if let Some(missing) = definition
            .required
            .iter()
            .find(|key| !is_present(data.get(key.as_str())))
        {
            return Err(NotificationError::MissingPlaceholder {
                template: name.to_string(),
                placeholder: missing.clone(),
            });
        }

        let subject = self.plain.render(&format!("{name}_subject"), data)?;
        let text = self.plain.render(&format!("{name}_text"), data)?;
        let html = match definition.html {
            Some(_) => Some(self.html.render(&format!("{name}_html"), data)?),
            None => None,
        };

        Ok(RenderedEmail {
            subject: single_line(&subject),
            text,
            html,
        })
    }
}

fn registration_error(name: &str, part: &str, err: handlebars::TemplateError) -> NotificationError {
    NotificationError::TemplateError(format!("Failed to register {name}_{part}: {err}"))
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

fn single_line(subject: &str) -> String {
    subject.split_whitespace().collect::<Vec<_>>().join(" ")
}
