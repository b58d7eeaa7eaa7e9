use crate::config::EngineConfig;
use crate::reconcile::ReconciliationCache;
use composer_schema::{SchemaCatalog, ThemeCatalog, CUSTOM_THEME_ID};

/// Collaborators handed to every reducer and mutation
pub struct Context<'a> {
    pub catalog: &'a dyn SchemaCatalog,
    pub themes: &'a dyn ThemeCatalog,
    pub config: &'a EngineConfig,
    pub cache: &'a mut ReconciliationCache,
}

impl<'a> Context<'a> {
    pub fn new(
        catalog: &'a dyn SchemaCatalog,
        themes: &'a dyn ThemeCatalog,
        config: &'a EngineConfig,
        cache: &'a mut ReconciliationCache,
    ) -> Self {
        Self {
            catalog,
            themes,
            config,
            cache,
        }
    }

    /// `custom` always exists; it resolves to the workspace's own theme
    pub fn theme_exists(&self, id: &str) -> bool {
        id == CUSTOM_THEME_ID || self.themes.theme(id).is_some()
    }
}
