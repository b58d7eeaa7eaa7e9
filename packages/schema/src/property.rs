//! # Property Value Algebra
//!
//! Every property slot in a workspace carries a tagged value describing *how*
//! it is sourced, not only what it is:
//!
//! ```text
//! { "type": "exact",          "value": { "unit": "px", "value": 12 } }
//! { "type": "theme.ordinal",  "value": "@fontSize.medium" }
//! { "type": "computed",       "value": { "function": "auto_fit",
//!                                        "input": { "basedOn": "#parent.buttonSize" } } }
//! ```
//!
//! The set of tags is closed; resolution matches on it exhaustively.

use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single property value and the way it is sourced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Property {
    /// Unset; resolution falls through to the next layer
    #[serde(rename = "empty")]
    Empty,

    /// Literal value
    #[serde(rename = "exact")]
    Exact(ExactValue),

    /// Named constant from the property's own domain (alignment, resize mode, ...)
    #[serde(rename = "preset")]
    Preset(String),

    /// Reference into an ordered theme scale
    #[serde(rename = "theme.ordinal")]
    ThemeOrdinal(TokenRef),

    /// Reference into an unordered theme scale
    #[serde(rename = "theme.categorical")]
    ThemeCategorical(TokenRef),

    /// Derived at resolution time from another property
    #[serde(rename = "computed")]
    Computed(Computed),

    /// Taken from the nearest structural ancestor defining the same property
    #[serde(rename = "inherit")]
    Inherit,
}

impl Property {
    pub fn exact(value: impl Into<ExactValue>) -> Self {
        Property::Exact(value.into())
    }

    pub fn preset(name: impl Into<String>) -> Self {
        Property::Preset(name.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Property::Empty)
    }

    /// Wire tag of this value (`"theme.ordinal"`, `"computed"`, ...)
    pub fn kind(&self) -> &'static str {
        match self {
            Property::Empty => "empty",
            Property::Exact(_) => "exact",
            Property::Preset(_) => "preset",
            Property::ThemeOrdinal(_) => "theme.ordinal",
            Property::ThemeCategorical(_) => "theme.categorical",
            Property::Computed(_) => "computed",
            Property::Inherit => "inherit",
        }
    }
}

impl Default for Property {
    fn default() -> Self {
        Property::Empty
    }
}

/// Literal property payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExactValue {
    Bool(bool),
    Number(f64),
    Dimension(Dimension),
    Text(String),
}

impl From<&str> for ExactValue {
    fn from(value: &str) -> Self {
        ExactValue::Text(value.to_string())
    }
}

impl From<String> for ExactValue {
    fn from(value: String) -> Self {
        ExactValue::Text(value)
    }
}

impl From<f64> for ExactValue {
    fn from(value: f64) -> Self {
        ExactValue::Number(value)
    }
}

impl From<bool> for ExactValue {
    fn from(value: bool) -> Self {
        ExactValue::Bool(value)
    }
}

impl From<Dimension> for ExactValue {
    fn from(value: Dimension) -> Self {
        ExactValue::Dimension(value)
    }
}

impl fmt::Display for ExactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExactValue::Bool(b) => write!(f, "{}", b),
            ExactValue::Number(n) => write!(f, "{}", n),
            ExactValue::Dimension(d) => write!(f, "{}", d),
            ExactValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A number with an explicit unit. Units are never converted implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub unit: Unit,
    pub value: f64,
}

impl Dimension {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { unit, value }
    }

    pub fn px(value: f64) -> Self {
        Self::new(value, Unit::Px)
    }

    pub fn percent(value: f64) -> Self {
        Self::new(value, Unit::Percent)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "px")]
    Px,
    #[serde(rename = "%")]
    Percent,
    #[serde(rename = "rem")]
    Rem,
    #[serde(rename = "em")]
    Em,
    #[serde(rename = "deg")]
    Deg,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Unit::Px => "px",
            Unit::Percent => "%",
            Unit::Rem => "rem",
            Unit::Em => "em",
            Unit::Deg => "deg",
        };
        f.write_str(s)
    }
}

/// `@scale.key` reference into a theme.
///
/// The scale part may be dotted (`@color.baseColor`, `@core.ratio`); the key is
/// always the segment after the last dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenRef {
    raw: String,
    /// Byte offset of the dot separating scale and key
    dot: usize,
}

impl TokenRef {
    pub fn parse(raw: &str) -> Result<Self, SchemaError> {
        let body = raw
            .strip_prefix('@')
            .ok_or_else(|| SchemaError::InvalidToken(raw.to_string()))?;
        let dot = body
            .rfind('.')
            .ok_or_else(|| SchemaError::InvalidToken(raw.to_string()))?;
        if dot == 0 || dot + 1 == body.len() {
            return Err(SchemaError::InvalidToken(raw.to_string()));
        }
        Ok(Self {
            raw: raw.to_string(),
            dot: dot + 1,
        })
    }

    /// Scale name (`fontSize` in `@fontSize.medium`)
    pub fn scale(&self) -> &str {
        &self.raw[1..self.dot]
    }

    /// Entry name (`medium` in `@fontSize.medium`)
    pub fn key(&self) -> &str {
        &self.raw[self.dot + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl TryFrom<String> for TokenRef {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TokenRef::parse(&value)
    }
}

impl From<TokenRef> for String {
    fn from(token: TokenRef) -> Self {
        token.raw
    }
}

impl fmt::Display for TokenRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Named pure function applied to another resolved property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Computed {
    pub function: ComputedFunction,
    pub input: ComputedInput,
}

impl Computed {
    pub fn new(function: ComputedFunction, based_on: impl Into<String>) -> Self {
        Self {
            function,
            input: ComputedInput {
                based_on: based_on.into(),
                factor: None,
            },
        }
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.input.factor = Some(factor);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedInput {
    /// `#prop.path` (self) or `#parent.prop.path` (live structural parent)
    #[serde(rename = "basedOn")]
    pub based_on: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputedFunction {
    AutoFit,
    HighContrastColor,
    Match,
    OpticalPadding,
}

impl ComputedFunction {
    pub fn name(&self) -> &'static str {
        match self {
            ComputedFunction::AutoFit => "auto_fit",
            ComputedFunction::HighContrastColor => "high_contrast_color",
            ComputedFunction::Match => "match",
            ComputedFunction::OpticalPadding => "optical_padding",
        }
    }

    /// Units a dimension input may carry. `None` means the function passes
    /// any value through untouched.
    pub fn accepted_units(&self) -> Option<&'static [Unit]> {
        match self {
            ComputedFunction::AutoFit => Some(&[Unit::Px, Unit::Rem, Unit::Em]),
            ComputedFunction::OpticalPadding => Some(&[Unit::Px, Unit::Rem]),
            ComputedFunction::HighContrastColor => Some(&[]),
            ComputedFunction::Match => None,
        }
    }

    /// Factor applied when the input declares none
    pub fn default_factor(&self) -> f64 {
        match self {
            ComputedFunction::OpticalPadding => 0.5,
            _ => 1.0,
        }
    }
}

impl fmt::Display for ComputedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
