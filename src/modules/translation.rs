use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{FeedError, Result};

pub const CHALLENGE_SOLVED: &str = "CHALLENGE_SOLVED";

const DEFAULT_TEMPLATES: &[(&str, &str)] = &[(
    CHALLENGE_SOLVED,
    "You successfully solved a challenge: {{challenge}} ({{description}})",
)];

#[async_trait]
pub trait Translator: Send + Sync {
    /// Resolves `key` to a localized string, substituting `{{param}}` placeholders.
    async fn get(&self, key: &str, params: &[(&str, &str)]) -> Result<String>;
}

pub struct TemplateTranslator {
    templates: BTreeMap<String, String>,
}

impl TemplateTranslator {
    pub fn new(overrides: BTreeMap<String, String>) -> Self {
        let mut templates: BTreeMap<String, String> = DEFAULT_TEMPLATES
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        templates.extend(overrides);
        Self { templates }
    }

    /// Merges a flat JSON language file (`{"KEY": "template", ...}`) over the current templates.
    pub fn load_language_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        let entries: BTreeMap<String, serde_json::Value> = serde_json::from_str(&content)?;
        for (key, value) in entries {
            // nested sections are not templates
            if let serde_json::Value::String(template) = value {
                self.templates.insert(key, template);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Translator for TemplateTranslator {
    async fn get(&self, key: &str, params: &[(&str, &str)]) -> Result<String> {
        match self.templates.get(key) {
            Some(template) => interpolate(key, template, params),
            // i18n convention: an unknown key translates to itself
            None => Ok(key.to_string()),
        }
    }
}

fn interpolate(key: &str, template: &str, params: &[(&str, &str)]) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| FeedError::Translation {
            key: key.to_string(),
            reason: "unterminated placeholder".to_string(),
        })?;
        let name = after[..end].trim();
        match params.iter().find(|(p, _)| *p == name) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}
