//! Theme scales and token lookup.
//!
//! Theme color math (palette generation) lives elsewhere; a theme here is a
//! bag of named scales whose entries are either literal values or parametric
//! steps on the theme's modular `core` scale.

use crate::error::SchemaError;
use crate::properties::Properties;
use crate::property::{Dimension, ExactValue, TokenRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const BUILTIN_THEMES: &str = include_str!("../data/themes.json");

/// Theme id that resolves to the workspace's own `customTheme`
pub const CUSTOM_THEME_ID: &str = "custom";

/// Theme id stamped on new boards unless configured otherwise
pub const DEFAULT_THEME_ID: &str = "default";

pub type Scale = BTreeMap<String, ScaleEntry>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub id: String,

    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub core: CoreScale,

    /// Last-resort property values for every component under this theme
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub defaults: Properties,

    /// Named scales (`fontSize`, `swatch`, `gap`, `color`, `icon`, ...)
    #[serde(flatten)]
    pub scales: BTreeMap<String, Scale>,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            id: CUSTOM_THEME_ID.to_string(),
            label: "Custom".to_string(),
            core: CoreScale::default(),
            defaults: Properties::new(),
            scales: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreScale {
    pub ratio: f64,
    pub font_size: f64,
    pub size: f64,
}

impl Default for CoreScale {
    fn default() -> Self {
        Self {
            ratio: 1.25,
            font_size: 16.0,
            size: 8.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScaleEntry {
    /// `{ "parameters": { "step": 2 } }`
    Parametric { parameters: BTreeMap<String, f64> },
    Value(ExactValue),
}

impl Theme {
    /// Resolve a `@scale.key` token to a literal value
    pub fn token(&self, token: &TokenRef) -> Result<ExactValue, SchemaError> {
        if token.scale() == "core" {
            return match token.key() {
                "ratio" => Ok(ExactValue::Number(self.core.ratio)),
                "fontSize" => Ok(ExactValue::Dimension(Dimension::px(self.core.font_size))),
                "size" => Ok(ExactValue::Dimension(Dimension::px(self.core.size))),
                _ => Err(SchemaError::UnknownToken(token.to_string())),
            };
        }

        let entry = self
            .scales
            .get(token.scale())
            .and_then(|scale| scale.get(token.key()))
            .ok_or_else(|| SchemaError::UnknownToken(token.to_string()))?;

        Ok(self.evaluate_entry(token.scale(), entry))
    }

    fn evaluate_entry(&self, scale: &str, entry: &ScaleEntry) -> ExactValue {
        match entry {
            ScaleEntry::Value(value) => value.clone(),
            ScaleEntry::Parametric { parameters } => {
                let step = parameters.get("step").copied().unwrap_or(0.0);
                let base = parameters.get("base").copied().unwrap_or(if scale == "fontSize" {
                    self.core.font_size
                } else {
                    self.core.size
                });
                let value = base * self.core.ratio.powf(step);
                ExactValue::Dimension(Dimension::px((value * 100.0).round() / 100.0))
            }
        }
    }
}

/// Source of named themes
pub trait ThemeCatalog {
    fn theme(&self, id: &str) -> Option<&Theme>;
}

#[derive(Debug, Clone, Default)]
pub struct ThemeSet {
    themes: BTreeMap<String, Theme>,
}

impl ThemeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// `default` and `midnight`
    pub fn builtin() -> Result<Self, SchemaError> {
        Self::from_json(BUILTIN_THEMES)
    }

    pub fn from_json(source: &str) -> Result<Self, SchemaError> {
        let themes: Vec<Theme> = serde_json::from_str(source)?;
        let mut set = Self::new();
        for theme in themes {
            set.insert(theme);
        }
        Ok(set)
    }

    pub fn insert(&mut self, theme: Theme) {
        self.themes.insert(theme.id.clone(), theme);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.themes.contains_key(id)
    }
}

impl ThemeCatalog for ThemeSet {
    fn theme(&self, id: &str) -> Option<&Theme> {
        self.themes.get(id)
    }
}
