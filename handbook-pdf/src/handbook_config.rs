//! Handbook configuration from a handbook TOML file
//!
//! A handbook is a title block plus an ordered list of sections, each one a
//! web page that becomes a chapter of the generated PDF. The default handbook
//! is compiled into the binary; `--config` replaces it with a user file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Built-in handbook definition
const BUILTIN_HANDBOOK: &str = include_str!("handbooks/guide-to-safe-scouting.toml");

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default User-Agent sent with every request
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Handbook PDF Archiver)";

/// Main handbook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandbookConfig {
    /// Title shown on the title page and in the PDF metadata
    pub title: String,

    /// Optional subtitle shown under the title
    pub subtitle: Option<String>,

    /// Running header drawn on every body page (defaults to the title)
    pub header_text: Option<String>,

    /// PDF author metadata
    pub author: Option<String>,

    /// Address of the official online version, linked from the title page
    pub source_url: Option<String>,

    /// User-Agent header identifying the archiver
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Ordered list of sections
    pub sections: Vec<SectionDescriptor>,
}

/// One configured section: a chapter title and the page it is fetched from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDescriptor {
    /// Chapter title used for the section heading, TOC and bookmark
    pub title: String,

    /// Source page URL
    pub url: String,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl HandbookConfig {
    /// Load the handbook compiled into the binary
    ///
    /// # Returns
    /// * `Ok(HandbookConfig)` - The built-in handbook
    /// * `Err(HandbookConfigError)` - The embedded definition failed to parse or validate
    pub fn builtin() -> Result<Self, HandbookConfigError> {
        Self::from_toml(BUILTIN_HANDBOOK)
    }

    /// Load a handbook configuration from a TOML file
    ///
    /// # Parameters
    /// * `path` - Path to the handbook TOML file
    ///
    /// # Returns
    /// * `Ok(HandbookConfig)` - Successfully loaded and validated configuration
    /// * `Err(HandbookConfigError)` - Error reading, parsing or validating the file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, HandbookConfigError> {
        let content = fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a handbook definition
    pub fn from_toml(content: &str) -> Result<Self, HandbookConfigError> {
        let config: HandbookConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Header text for body pages
    pub fn running_header(&self) -> &str {
        self.header_text.as_deref().unwrap_or(&self.title)
    }

    fn validate(&self) -> Result<(), HandbookConfigError> {
        if self.title.trim().is_empty() {
            return Err(HandbookConfigError::Invalid(
                "handbook title must not be empty".to_string(),
            ));
        }
        if self.sections.is_empty() {
            return Err(HandbookConfigError::Invalid(
                "handbook must list at least one section".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(HandbookConfigError::Invalid(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        for (idx, section) in self.sections.iter().enumerate() {
            if section.title.trim().is_empty() || section.url.trim().is_empty() {
                return Err(HandbookConfigError::Invalid(format!(
                    "section {} needs both a title and a url",
                    idx + 1
                )));
            }
        }
        Ok(())
    }
}

/// Errors that can occur when loading a handbook configuration
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum HandbookConfigError {
    /// IO error when reading the file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing TOML
    #[error("TOML parse error: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Well-formed TOML describing an unusable handbook
    #[error("Invalid handbook: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_handbook() {
        let config = HandbookConfig::builtin().unwrap();

        assert_eq!(config.title, "Guide to Safe Scouting");
        assert_eq!(config.sections.len(), 16);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(
            config.user_agent,
            "Mozilla/5.0 (Scouting America Guide Archiver)"
        );
        assert_eq!(config.sections[1].title, "Preface");
        assert_eq!(
            config.sections[15].url,
            "https://www.scouting.org/health-and-safety/gss/exploring-program/"
        );
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_content = r#"
title = "Field Manual"

[[sections]]
title = "Knots"
url = "https://example.org/knots/"
"#;

        let config = HandbookConfig::from_toml(toml_content).unwrap();

        assert_eq!(config.title, "Field Manual");
        assert_eq!(config.running_header(), "Field Manual");
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(
            config.sections,
            vec![SectionDescriptor {
                title: "Knots".to_string(),
                url: "https://example.org/knots/".to_string(),
            }]
        );
    }

    #[test]
    fn test_header_text_overrides_title() {
        let toml_content = r#"
title = "Field Manual"
header_text = "FM-1"

[[sections]]
title = "Knots"
url = "https://example.org/knots/"
"#;

        let config = HandbookConfig::from_toml(toml_content).unwrap();
        assert_eq!(config.running_header(), "FM-1");
    }

    #[test]
    fn test_rejects_empty_section_list() {
        let toml_content = r#"
title = "Field Manual"
sections = []
"#;

        let err = HandbookConfig::from_toml(toml_content).unwrap_err();
        assert!(matches!(err, HandbookConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let toml_content = r#"
title = "Field Manual"
timeout_secs = 0

[[sections]]
title = "Knots"
url = "https://example.org/knots/"
"#;

        let err = HandbookConfig::from_toml(toml_content).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = HandbookConfig::from_toml("title = ").unwrap_err();
        assert!(matches!(err, HandbookConfigError::ParseError(_)));
    }
}
