//! # Property Resolution
//!
//! Computes the effective value of a property on a node.
//!
//! ## Layers (highest first)
//!
//! 1. **Own**: the node's own `properties`
//! 2. **Specialisation**: nodes along the `instanceOf` chain that share the
//!    node's component (an instance inherits the overrides of the variant
//!    node it specialises)
//! 3. **Board**: board-level overrides of the component's board
//! 4. **Schema**: the component schema's default
//! 5. **Theme**: the active theme's `defaults`
//!
//! The first non-`empty` layer wins. `computed` and `inherit` are evaluated
//! against the live tree, never the schema. Computed references that loop
//! back onto themselves fail with [`ResolveError::Cycle`].

use crate::computed;
use crate::workspace::{LookupError, Node, NodeId, TreeIndex, Workspace};
use composer_schema::{
    ExactValue, Property, PropertyPath, SchemaCatalog, SchemaError, Theme, ThemeCatalog, Unit,
    CUSTOM_THEME_ID, DEFAULT_THEME_ID,
};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Computed cycle at `{node}` / `{path}`")]
    Cycle { node: String, path: String },

    #[error("Invalid reference `{0}`: expected `#path` or `#parent.path`")]
    InvalidReference(String),

    #[error("Node `{0}` has no parent to reference")]
    NoParent(String),

    #[error("`{function}` does not accept unit `{unit}`")]
    UnsupportedUnit { function: &'static str, unit: Unit },

    #[error("`{function}` cannot consume `{value}`")]
    UnsupportedInput { function: &'static str, value: String },
}

/// Fully evaluated value: no tokens, computations or inheritance left
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Empty,
    Exact(ExactValue),
    Preset(String),
}

impl Value {
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn as_exact(&self) -> Option<&ExactValue> {
        match self {
            Value::Exact(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Exact(ExactValue::Text(text)) | Value::Preset(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => f.write_str("empty"),
            Value::Exact(value) => write!(f, "{}", value),
            Value::Preset(name) => write!(f, "preset:{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Own,
    Specialisation,
    Board,
    Schema,
    Theme,
    /// No layer defines the property
    Unset,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedValue {
    pub value: Value,
    /// Layer the winning raw property came from
    pub layer: Layer,
}

pub struct Resolver<'a> {
    workspace: &'a Workspace,
    catalog: &'a dyn SchemaCatalog,
    themes: &'a dyn ThemeCatalog,
    index: TreeIndex,
}

impl<'a> Resolver<'a> {
    pub fn new(
        workspace: &'a Workspace,
        catalog: &'a dyn SchemaCatalog,
        themes: &'a dyn ThemeCatalog,
    ) -> Self {
        Self {
            workspace,
            catalog,
            themes,
            index: workspace.tree_index(),
        }
    }

    /// Resolve a dotted path (`background.color`) on `node_id`
    pub fn resolve(&self, node_id: &str, path: &str) -> Result<ResolvedValue, ResolveError> {
        let path = PropertyPath::parse(path)?;
        self.resolve_path(node_id, &path)
    }

    pub fn resolve_path(
        &self,
        node_id: &str,
        path: &PropertyPath,
    ) -> Result<ResolvedValue, ResolveError> {
        let mut stack = Vec::new();
        self.resolve_inner(node_id, path, &mut stack)
    }

    /// Raw winning property and its layer, before evaluation
    pub fn lookup(&self, node_id: &str, path: &PropertyPath) -> Result<(Property, Layer), ResolveError> {
        let node = self.workspace.node(node_id)?;

        if let Some(found) = defined(node.properties.get(path)) {
            return Ok((found.clone(), Layer::Own));
        }

        let mut visited: HashSet<&str> = HashSet::from([node.id.as_str()]);
        let mut current = node;
        while let Some(target) = current.instance_of() {
            if !visited.insert(target) {
                break;
            }
            let next = self.workspace.node(target)?;
            if next.component != node.component {
                break;
            }
            if let Some(found) = defined(next.properties.get(path)) {
                return Ok((found.clone(), Layer::Specialisation));
            }
            current = next;
        }

        if let Some(board) = self.workspace.boards.get(&node.component) {
            if let Some(found) = defined(board.properties.get(path)) {
                return Ok((found.clone(), Layer::Board));
            }
        }

        if let Some(schema) = self.catalog.get(&node.component) {
            if let Some(found) = defined(schema.properties.get(path)) {
                return Ok((found.clone(), Layer::Schema));
            }
        }

        if let Some(found) = defined(self.theme_for(node)?.defaults.get(path)) {
            return Ok((found.clone(), Layer::Theme));
        }

        Ok((Property::Empty, Layer::Unset))
    }

    /// Node theme, else the owning variant's theme, else its board's theme
    pub fn theme_for(&self, node: &Node) -> Result<&'a Theme, ResolveError> {
        let workspace = self.workspace;
        let owner = workspace.by_id.get(node.owner());

        let id = node
            .theme
            .as_deref()
            .or_else(|| owner.and_then(|variant| variant.theme.as_deref()))
            .or_else(|| {
                owner
                    .and_then(|variant| workspace.boards.get(&variant.component))
                    .map(|board| board.theme.as_str())
            })
            .unwrap_or(DEFAULT_THEME_ID);

        if id == CUSTOM_THEME_ID {
            return Ok(&workspace.custom_theme);
        }
        self.themes
            .theme(id)
            .ok_or_else(|| SchemaError::UnknownTheme(id.to_string()).into())
    }

    fn resolve_inner(
        &self,
        node_id: &str,
        path: &PropertyPath,
        stack: &mut Vec<(NodeId, String)>,
    ) -> Result<ResolvedValue, ResolveError> {
        let frame = (node_id.to_string(), path.to_string());
        if stack.contains(&frame) {
            return Err(ResolveError::Cycle {
                node: frame.0,
                path: frame.1,
            });
        }

        stack.push(frame);
        let result = self.evaluate(node_id, path, stack);
        stack.pop();
        result
    }

    fn evaluate(
        &self,
        node_id: &str,
        path: &PropertyPath,
        stack: &mut Vec<(NodeId, String)>,
    ) -> Result<ResolvedValue, ResolveError> {
        let (property, layer) = self.lookup(node_id, path)?;

        let value = match property {
            Property::Empty => Value::Empty,
            Property::Exact(value) => Value::Exact(value),
            Property::Preset(name) => Value::Preset(name),
            Property::ThemeOrdinal(token) | Property::ThemeCategorical(token) => {
                let node = self.workspace.node(node_id)?;
                Value::Exact(self.theme_for(node)?.token(&token)?)
            }
            Property::Computed(expr) => {
                let (target, target_path) = self.locate(node_id, &expr.input.based_on)?;
                let base = self.resolve_inner(&target, &target_path, stack)?;
                computed::apply(&expr, base.value)?
            }
            Property::Inherit => self.inherited(node_id, path, stack)?,
        };

        Ok(ResolvedValue { value, layer })
    }

    /// Nearest live ancestor that resolves to something
    fn inherited(
        &self,
        node_id: &str,
        path: &PropertyPath,
        stack: &mut Vec<(NodeId, String)>,
    ) -> Result<Value, ResolveError> {
        for ancestor in self.index.ancestors(node_id) {
            let resolved = self.resolve_inner(ancestor, path, stack)?;
            if !resolved.value.is_empty() {
                return Ok(resolved.value);
            }
        }
        Ok(Value::Empty)
    }

    /// `#path` → self, `#parent.path` → live structural parent
    fn locate(&self, node_id: &str, reference: &str) -> Result<(NodeId, PropertyPath), ResolveError> {
        let Some(expr) = reference.strip_prefix('#') else {
            return Err(ResolveError::InvalidReference(reference.to_string()));
        };

        match expr.strip_prefix("parent.") {
            Some(rest) => {
                let parent = self
                    .index
                    .parent(node_id)
                    .ok_or_else(|| ResolveError::NoParent(node_id.to_string()))?;
                Ok((parent.to_string(), PropertyPath::parse(rest)?))
            }
            None if expr == "parent" => Err(ResolveError::InvalidReference(reference.to_string())),
            None => Ok((node_id.to_string(), PropertyPath::parse(expr)?)),
        }
    }
}

fn defined(property: Option<&Property>) -> Option<&Property> {
    property.filter(|p| !p.is_empty())
}
