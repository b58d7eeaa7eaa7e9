//! # Composer Editor
//!
//! Document engine for composer workspaces.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ schema: component catalog + themes          │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ pipeline: Validate → Reduce → Migrate →     │
//! │           Verify, plus undo/redo history    │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ mutations / instantiate / reconcile         │
//! │  - Copy-on-write tree edits                 │
//! │  - Schema-driven variant synthesis          │
//! │  - Structural matching with caches          │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ workspace: flat node store + boards         │
//! │ resolve: layered property resolution        │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Workspaces are values**: every edit returns a new workspace
//! 2. **Ids, not pointers**: nodes reference each other through `byId`
//! 3. **Restrictions are soft**: disallowed edits return the input unchanged
//! 4. **Integrity is hard**: a dispatch that breaks an invariant never lands
//!
//! ## Usage
//!
//! ```rust,ignore
//! use composer_editor::{Action, EngineConfig, Op, Pipeline};
//! use composer_schema::{Catalog, ThemeSet};
//!
//! let catalog = Catalog::builtin()?;
//! let themes = ThemeSet::builtin()?;
//! let mut pipeline = Pipeline::new(&catalog, &themes, EngineConfig::load(".")?);
//!
//! pipeline.dispatch(Action::user(Op::AddBoard { component: "button".into() }))?;
//!
//! let content = pipeline.resolver().resolve("label-1", "content")?;
//! ```

pub mod actions;
pub mod computed;
pub mod config;
pub mod context;
pub mod errors;
pub mod history;
pub mod id_generator;
pub mod instantiate;
pub mod migrations;
pub mod mutations;
pub mod pipeline;
pub mod reconcile;
pub mod resolve;
pub mod validate;
pub mod verify;
pub mod workspace;

pub use actions::{Action, NodeSource, Op, Origin, Target};
pub use config::{ConfigError, EngineConfig};
pub use context::Context;
pub use errors::EngineError;
pub use history::History;
pub use id_generator::IdGenerator;
pub use migrations::{migrate, MigrationError, CURRENT_VERSION};
pub use mutations::MutationError;
pub use pipeline::{
    standard_reducer, CoreReducer, Dispatched, Migrate, Pipeline, Reducer, StandardReducer,
    Validate, Verify,
};
pub use reconcile::{
    analyze_required_structures, create_missing_variants, reconcile, CacheStats, Reconciliation,
    ReconciliationCache, RequiredStructures,
};
pub use resolve::{Layer, ResolveError, ResolvedValue, Resolver, Value};
pub use validate::{validate, ValidationError};
pub use verify::{verify, IntegrityError, Violation};
pub use workspace::{Board, LookupError, Node, NodeKind, VariantKind, Workspace};

// Re-export schema types for convenience
pub use composer_schema as schema;
