//! Source URL templates with date placeholders

use crate::config::DATA_INGESTION_DATA_SOURCE_URL;
use crate::{DateRange, DATE_FORMAT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placeholder replaced with the window's lower bound
pub const FROM_DATE_PLACEHOLDER: &str = "<fromdate>";

/// Placeholder replaced with the window's upper bound
pub const TO_DATE_PLACEHOLDER: &str = "<todate>";

/// Errors parsing a URL template
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// Template is empty
    #[error("source URL template is empty")]
    Empty,

    /// A required placeholder is absent
    #[error("source URL template is missing the {0} placeholder")]
    MissingPlaceholder(&'static str),
}

/// Parameterized source URL containing `<fromdate>` and `<todate>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceUrlTemplate(String);

impl SourceUrlTemplate {
    /// Parse a template, requiring both placeholders.
    pub fn parse(template: impl Into<String>) -> Result<Self, TemplateError> {
        let template = template.into();
        let trimmed = template.trim();

        if trimmed.is_empty() {
            return Err(TemplateError::Empty);
        }
        if !trimmed.contains(FROM_DATE_PLACEHOLDER) {
            return Err(TemplateError::MissingPlaceholder(FROM_DATE_PLACEHOLDER));
        }
        if !trimmed.contains(TO_DATE_PLACEHOLDER) {
            return Err(TemplateError::MissingPlaceholder(TO_DATE_PLACEHOLDER));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Substitute the window bounds as ISO dates.
    pub fn render(&self, window: &DateRange) -> String {
        self.0
            .replace(
                FROM_DATE_PLACEHOLDER,
                &window.from_date().format(DATE_FORMAT).to_string(),
            )
            .replace(
                TO_DATE_PLACEHOLDER,
                &window.to_date().format(DATE_FORMAT).to_string(),
            )
    }

    /// Raw template text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SourceUrlTemplate {
    fn default() -> Self {
        Self(DATA_INGESTION_DATA_SOURCE_URL.to_string())
    }
}

impl FromStr for SourceUrlTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SourceUrlTemplate {
    type Error = TemplateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<SourceUrlTemplate> for String {
    fn from(template: SourceUrlTemplate) -> Self {
        template.0
    }
}

impl fmt::Display for SourceUrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
