use std::collections::HashMap;

use crate::error::NotificationError;

/// Template id of the registration confirmation email.
pub const CONFIRMATION_TEMPLATE: &str = "confirmation";

/// Rendered email content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedContent {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub id: String,
    pub subject: String,
    pub body: String,
}

/// Email templates with `{{variable}}` placeholders.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    templates: HashMap<String, Template>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// A renderer with the built-in templates registered.
    pub fn with_defaults() -> Self {
        let mut renderer = Self::new();
        renderer.register(Template {
            id: CONFIRMATION_TEMPLATE.to_string(),
            subject: "Welcome to Emporium! Please confirm your email".to_string(),
            body: "Hello, {{username}}!\n\n\
                   Thank you for signing up. Your confirmation code: {{code}}\n\n\
                   The code is valid for {{ttl_minutes}} minutes."
                .to_string(),
        });
        renderer
    }

    pub fn register(&mut self, template: Template) {
        self.templates.insert(template.id.clone(), template);
    }

    /// Renders subject and body, replacing every `{{key}}` found in `data`.
    /// Placeholders without a value are left as they are.
    pub fn render(
        &self,
        template_id: &str,
        data: &HashMap<String, serde_json::Value>,
    ) -> Result<RenderedContent, NotificationError> {
        let template = self
            .templates
            .get(template_id)
            .ok_or_else(|| NotificationError::TemplateNotFound(template_id.to_string()))?;

        Ok(RenderedContent {
            subject: substitute(&template.subject, data),
            body: substitute(&template.body, data),
        })
    }
}

fn substitute(text: &str, data: &HashMap<String, serde_json::Value>) -> String {
    data.iter().fold(text.to_string(), |acc, (key, value)| {
        let value = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };
        acc.replace(&format!("{{{{{key}}}}}"), &value)
    })
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::with_defaults()
    }
}
