use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateKeyError {
    #[error("template key must not be empty")]
    Empty,
    #[error("template key must not start or end with '.'")]
    DanglingSeparator,
    #[error("template key contains invalid character '{character}'")]
    InvalidCharacter { character: char },
}

/// Opaque handle naming the template an entity is instantiated from.
///
/// Keys look like `obstacle.train` or `obstacle.car_02`. The engine never
/// resolves them; a renderer or physics collaborator maps them to assets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TemplateKey(String);

impl TemplateKey {
    pub fn new(raw: impl Into<String>) -> Result<Self, TemplateKeyError> {
        let raw = raw.into();
        validate_template_key(&raw)?;
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TemplateKey {
    type Error = TemplateKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TemplateKey> for String {
    fn from(value: TemplateKey) -> Self {
        value.0
    }
}

fn validate_template_key(key: &str) -> Result<(), TemplateKeyError> {
    if key.is_empty() {
        return Err(TemplateKeyError::Empty);
    }
    if key.starts_with('.') || key.ends_with('.') {
        return Err(TemplateKeyError::DanglingSeparator);
    }
    for ch in key.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '.' | '-') {
            continue;
        }
        return Err(TemplateKeyError::InvalidCharacter { character: ch });
    }
    Ok(())
}
