use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::warn;

use crate::error::StyleError;

const DEFAULT_STYLES: &str = include_str!("default_styles.toml");

/// Named text styles a host maps to its own fonts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextStyle {
    #[default]
    Body,
    Title1,
    Title2,
    Title3,
    Headline,
    Subheadline,
    Caption,
    Footnote,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Style {
    pub font: Option<TextStyle>,
    pub color: Option<String>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

/// Styles keyed by lowercased tag name. The `root` entry is the base style
/// for the whole text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Styles {
    entries: BTreeMap<String, Style>,
}

impl Styles {
    /// The style sheet bundled with the crate (validated by the build script).
    pub fn compiled_default() -> Self {
        match Self::from_toml_str(DEFAULT_STYLES) {
            Ok(styles) => styles,
            Err(err) => {
                warn!(%err, "bundled style sheet unreadable, using body text only");
                let mut styles = Self::default();
                styles.insert("root", Style {
                    font: Some(TextStyle::Body),
                    ..Style::default()
                });
                styles
            }
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, StyleError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a style sheet from a TOML file.
    pub fn load(path: &Path) -> Result<Self, StyleError> {
        let content = fs::read_to_string(path).map_err(|source| StyleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn get(&self, tag: &str) -> Option<&Style> {
        self.entries.get(tag)
    }

    /// The base style, or plain defaults when the sheet has no `root` entry.
    pub fn root(&self) -> Style {
        self.get("root").cloned().unwrap_or_default()
    }

    pub fn insert(&mut self, tag: &str, style: Style) {
        self.entries.insert(tag.to_ascii_lowercase(), style);
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }
}
