//! # Composer Schema
//!
//! Static inputs of the workspace engine:
//!
//! - **property**: the tagged property value algebra (`exact`, `theme.ordinal`, `computed`, ...)
//! - **properties**: nested property trees addressed by dotted paths
//! - **schema** / **catalog**: component schema declarations and their lookup
//! - **theme**: theme scales and token resolution
//!
//! Nothing in this crate knows about workspaces; the editor crate consumes it
//! through the [`SchemaCatalog`] and [`ThemeCatalog`] traits.

pub mod catalog;
pub mod error;
pub mod properties;
pub mod property;
pub mod schema;
pub mod theme;

pub use catalog::{Catalog, SchemaCatalog};
pub use error::SchemaError;
pub use properties::{Properties, PropertyEntry, PropertyPath};
pub use property::{
    Computed, ComputedFunction, ComputedInput, Dimension, ExactValue, Property, TokenRef, Unit,
};
pub use schema::{ChildSlot, ComponentSchema, Restrictions, Structure};
pub use theme::{
    CoreScale, Scale, ScaleEntry, Theme, ThemeCatalog, ThemeSet, CUSTOM_THEME_ID, DEFAULT_THEME_ID,
};
