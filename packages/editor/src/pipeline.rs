//! # Dispatch Pipeline
//!
//! Coordinates the edit lifecycle: Validate → Reduce → Migrate → Verify
//!
//! ```text
//! Validate( Verify( Migrate( CoreReducer ) ) )
//!    │         │        │          └─ Op::apply
//!    │         │        └─ set_workspace only: upgrade to CURRENT_VERSION
//!    │         └─ every invariant re-derived on the result
//!    └─ payload shape, before anything runs
//! ```
//!
//! The Pipeline owns:
//! - The authoritative workspace (replaced only by a successful dispatch)
//! - The reconciliation cache, invalidated from the before/after pair
//! - Undo/redo history

use crate::actions::{Action, Op};
use crate::config::EngineConfig;
use crate::context::Context;
use crate::errors::EngineError;
use crate::history::History;
use crate::migrations::migrate;
use crate::reconcile::{self, invalidate_changes, CacheStats, Reconciliation, ReconciliationCache};
use crate::resolve::Resolver;
use crate::validate::{validate, ValidationError};
use crate::verify::verify;
use crate::workspace::Workspace;
use composer_schema::{SchemaCatalog, ThemeCatalog};
use serde_json::Value;
use std::mem;
use tracing::{debug, info, instrument};

/// `(workspace, action) → workspace`
pub trait Reducer {
    fn reduce(
        &self,
        cx: &mut Context<'_>,
        workspace: &Workspace,
        action: &Action,
    ) -> Result<Workspace, EngineError>;
}

impl<F> Reducer for F
where
    F: Fn(&mut Context<'_>, &Workspace, &Action) -> Result<Workspace, EngineError>,
{
    fn reduce(
        &self,
        cx: &mut Context<'_>,
        workspace: &Workspace,
        action: &Action,
    ) -> Result<Workspace, EngineError> {
        self(cx, workspace, action)
    }
}

/// Dispatches on the op
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreReducer;

impl Reducer for CoreReducer {
    fn reduce(
        &self,
        cx: &mut Context<'_>,
        workspace: &Workspace,
        action: &Action,
    ) -> Result<Workspace, EngineError> {
        action.op.apply(workspace, cx)
    }
}

/// Rejects malformed payloads before the inner reducer runs
#[derive(Debug, Clone, Default)]
pub struct Validate<R>(pub R);

impl<R: Reducer> Reducer for Validate<R> {
    fn reduce(
        &self,
        cx: &mut Context<'_>,
        workspace: &Workspace,
        action: &Action,
    ) -> Result<Workspace, EngineError> {
        validate(action)?;
        self.0.reduce(cx, workspace, action)
    }
}

/// Upgrades documents loaded through `set_workspace`; other actions pass through
#[derive(Debug, Clone, Default)]
pub struct Migrate<R>(pub R);

impl<R: Reducer> Reducer for Migrate<R> {
    fn reduce(
        &self,
        cx: &mut Context<'_>,
        workspace: &Workspace,
        action: &Action,
    ) -> Result<Workspace, EngineError> {
        let next = self.0.reduce(cx, workspace, action)?;
        match action.op {
            Op::SetWorkspace(_) => Ok(migrate(next)?),
            _ => Ok(next),
        }
    }
}

/// Fails the dispatch when the result breaks an invariant
#[derive(Debug, Clone, Default)]
pub struct Verify<R>(pub R);

impl<R: Reducer> Reducer for Verify<R> {
    fn reduce(
        &self,
        cx: &mut Context<'_>,
        workspace: &Workspace,
        action: &Action,
    ) -> Result<Workspace, EngineError> {
        let next = self.0.reduce(cx, workspace, action)?;
        verify(&next)?;
        Ok(next)
    }
}

pub type StandardReducer = Validate<Verify<Migrate<CoreReducer>>>;

pub fn standard_reducer() -> StandardReducer {
    Validate(Verify(Migrate(CoreReducer)))
}

/// Result of a single dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// The workspace was replaced
    Changed,
    /// The action was accepted but left the workspace as it was
    Unchanged,
}

/// Owns the current workspace and runs every action through the reducer chain
pub struct Pipeline<'a, R: Reducer = StandardReducer> {
    catalog: &'a dyn SchemaCatalog,
    themes: &'a dyn ThemeCatalog,
    config: EngineConfig,
    cache: ReconciliationCache,
    history: History,
    workspace: Workspace,
    reducer: R,
}

impl<'a> Pipeline<'a, StandardReducer> {
    pub fn new(
        catalog: &'a dyn SchemaCatalog,
        themes: &'a dyn ThemeCatalog,
        config: EngineConfig,
    ) -> Self {
        Self::with_reducer(catalog, themes, config, standard_reducer())
    }
}

impl<'a, R: Reducer> Pipeline<'a, R> {
    pub fn with_reducer(
        catalog: &'a dyn SchemaCatalog,
        themes: &'a dyn ThemeCatalog,
        config: EngineConfig,
        reducer: R,
    ) -> Self {
        Self {
            catalog,
            themes,
            cache: ReconciliationCache::with_memoization(config.memoize_reconciliation),
            history: History::with_max_levels(config.history_limit),
            config,
            workspace: Workspace::new(),
            reducer,
        }
    }

    /// Run `action`; on failure the current workspace stays authoritative
    #[instrument(skip_all, fields(action = %action.type_name()))]
    pub fn dispatch(&mut self, action: Action) -> Result<Dispatched, EngineError> {
        let mut cx = Context::new(self.catalog, self.themes, &self.config, &mut self.cache);
        let next = self.reducer.reduce(&mut cx, &self.workspace, &action)?;

        if next == self.workspace {
            debug!("Dispatch left workspace unchanged");
            return Ok(Dispatched::Unchanged);
        }

        if let Op::SetWorkspace(_) = action.op {
            self.cache.clear();
            self.history.clear();
            self.workspace = next;
            info!(
                version = self.workspace.version,
                boards = self.workspace.boards.len(),
                nodes = self.workspace.by_id.len(),
                "Loaded workspace"
            );
            return Ok(Dispatched::Changed);
        }

        if action.op.is_structural() {
            invalidate_changes(&mut self.cache, &self.workspace, &next);
        }
        let previous = mem::replace(&mut self.workspace, next);
        self.history.record(previous, action.type_name());
        debug!(nodes = self.workspace.by_id.len(), "Dispatch applied");
        Ok(Dispatched::Changed)
    }

    /// Decode a wire action and dispatch it
    pub fn dispatch_json(&mut self, value: Value) -> Result<Dispatched, EngineError> {
        let action = Action::from_json(value)?;
        self.dispatch(action)
    }

    /// Load a persisted document through `set_workspace` (migrated and verified)
    pub fn load_json(&mut self, source: &str) -> Result<Dispatched, EngineError> {
        let workspace = Workspace::from_json(source).map_err(|err| ValidationError::Malformed {
            action: "set_workspace".to_string(),
            reason: err.to_string(),
        })?;
        self.dispatch(Action::user(Op::SetWorkspace(Box::new(workspace))))
    }

    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.history.undo(&self.workspace) else {
            return false;
        };
        invalidate_changes(&mut self.cache, &self.workspace, &previous);
        self.workspace = previous;
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(next) = self.history.redo(&self.workspace) else {
            return false;
        };
        invalidate_changes(&mut self.cache, &self.workspace, &next);
        self.workspace = next;
        true
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.workspace, self.catalog, self.themes)
    }

    /// Reconcile against the current workspace, through the pipeline's cache
    pub fn reconcile(&mut self, component: &str) -> Result<Reconciliation, EngineError> {
        reconcile::reconcile(component, &self.workspace, self.catalog, &mut self.cache)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cache_mut(&mut self) -> &mut ReconciliationCache {
        &mut self.cache
    }

    pub fn clear_caches(&mut self) {
        self.cache.clear();
    }
}
