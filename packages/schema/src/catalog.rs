//! Schema catalog lookup.
//!
//! The engine never owns schema declarations; it asks a [`SchemaCatalog`] for
//! them. [`Catalog`] is the in-memory implementation, optionally seeded with the
//! built-in component set shipped in `data/components.json`.

use crate::error::SchemaError;
use crate::schema::{ComponentSchema, Structure};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

const BUILTIN_COMPONENTS: &str = include_str!("../data/components.json");

pub trait SchemaCatalog {
    fn get(&self, id: &str) -> Option<&ComponentSchema>;

    /// Lookup that fails loudly for unknown ids
    fn component_schema(&self, id: &str) -> Result<&ComponentSchema, SchemaError> {
        self.get(id)
            .ok_or_else(|| SchemaError::UnknownComponent(id.to_string()))
    }

    /// Component-id tree a fresh default variant of `id` has
    fn required_structure(&self, id: &str) -> Result<Structure, SchemaError> {
        let mut in_progress = HashSet::new();
        required_structure_inner(self, id, &mut in_progress)
    }
}

fn required_structure_inner<C: SchemaCatalog + ?Sized>(
    catalog: &C,
    id: &str,
    in_progress: &mut HashSet<String>,
) -> Result<Structure, SchemaError> {
    if !in_progress.insert(id.to_string()) {
        return Err(SchemaError::Cycle(id.to_string()));
    }

    let schema = catalog.component_schema(id)?;
    let mut children = Vec::with_capacity(schema.slots().len());
    for slot in schema.slots() {
        children.push(required_structure_inner(catalog, &slot.component, in_progress)?);
    }

    in_progress.remove(id);
    Ok(Structure::new(id, children))
}

/// In-memory schema catalog
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    schemas: BTreeMap<String, ComponentSchema>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog seeded with the built-in component set
    pub fn builtin() -> Result<Self, SchemaError> {
        Self::from_json(BUILTIN_COMPONENTS)
    }

    /// Parse a JSON array of component schemas
    pub fn from_json(source: &str) -> Result<Self, SchemaError> {
        let schemas: Vec<ComponentSchema> = serde_json::from_str(source)?;
        let mut catalog = Self::new();
        for schema in schemas {
            catalog.insert(schema);
        }
        debug!(components = catalog.len(), "Loaded schema catalog");
        Ok(catalog)
    }

    pub fn insert(&mut self, schema: ComponentSchema) {
        self.schemas.insert(schema.id.clone(), schema);
    }

    pub fn with(mut self, schema: ComponentSchema) -> Self {
        self.insert(schema);
        self
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl SchemaCatalog for Catalog {
    fn get(&self, id: &str) -> Option<&ComponentSchema> {
        self.schemas.get(id)
    }
}
