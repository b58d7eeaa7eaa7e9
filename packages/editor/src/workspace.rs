//! # Workspace Document
//!
//! The persisted document: a flat node store (`byId`) plus board metadata.
//!
//! ```text
//! Workspace
//!  ├─ boards:  component id → Board { order, theme, variants: [VariantId] }
//!  └─ byId:    node id → Node (Variant | Instance)
//!                 Variant   ── children ──▶ Instance ── children ──▶ Instance
//!                    ▲                         │
//!                    └──────── variant ────────┘   (owning template root)
//! ```
//!
//! Nodes reference each other by id only. Every lookup at this boundary fails
//! with a [`LookupError`] rather than returning `None`.

use crate::migrations::CURRENT_VERSION;
use composer_schema::{Properties, Theme, DEFAULT_THEME_ID};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::convert::TryFrom;
use thiserror::Error;

pub type NodeId = String;
pub type ComponentId = String;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Board not found: {0}")]
    BoardNotFound(String),

    #[error("Node is not a variant: {0}")]
    NotAVariant(String),

    #[error("Node is not an instance: {0}")]
    NotAnInstance(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    /// Documents persisted without a version are legacy (baseline 0)
    #[serde(default)]
    pub version: u32,

    #[serde(default)]
    pub custom_theme: Theme,

    #[serde(default)]
    pub boards: BTreeMap<ComponentId, Board>,

    #[serde(default)]
    pub by_id: BTreeMap<NodeId, Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: ComponentId,

    /// Structural marker added in v2; its absence flags a legacy document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<ComponentId>,

    #[serde(default)]
    pub label: String,

    #[serde(default = "default_theme")]
    pub theme: String,

    #[serde(default)]
    pub order: u32,

    #[serde(default)]
    pub properties: Properties,

    #[serde(default)]
    pub variants: Vec<NodeId>,
}

fn default_theme() -> String {
    DEFAULT_THEME_ID.to_string()
}

impl Board {
    pub fn new(component: impl Into<String>, label: impl Into<String>, order: u32) -> Self {
        let component = component.into();
        Self {
            id: component.clone(),
            component: Some(component),
            label: label.into(),
            theme: default_theme(),
            order,
            properties: Properties::new(),
            variants: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariantKind {
    #[serde(rename = "defaultVariant")]
    Default,
    #[serde(rename = "variant")]
    Variant,
}

/// Variant-or-instance discriminant
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Template root listed in a board
    Variant { kind: VariantKind },

    /// Placed occurrence inside some variant's tree
    Instance {
        /// Root of the template tree this instance lives in
        variant: NodeId,
        /// Node this instance specialises
        instance_of: NodeId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub struct Node {
    pub id: NodeId,
    pub component: ComponentId,
    pub level: u32,
    pub theme: Option<String>,
    pub label: String,
    pub from_schema: Option<bool>,
    pub properties: Properties,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
}

impl Node {
    pub fn variant(
        id: impl Into<String>,
        component: impl Into<String>,
        kind: VariantKind,
    ) -> Self {
        Self {
            id: id.into(),
            component: component.into(),
            level: 0,
            theme: None,
            label: String::new(),
            from_schema: None,
            properties: Properties::new(),
            children: Vec::new(),
            kind: NodeKind::Variant { kind },
        }
    }

    pub fn instance(
        id: impl Into<String>,
        component: impl Into<String>,
        variant: impl Into<String>,
        instance_of: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            component: component.into(),
            level: 0,
            theme: None,
            label: String::new(),
            from_schema: None,
            properties: Properties::new(),
            children: Vec::new(),
            kind: NodeKind::Instance {
                variant: variant.into(),
                instance_of: instance_of.into(),
            },
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_children(mut self, children: Vec<NodeId>) -> Self {
        self.children = children;
        self
    }

    pub fn with_from_schema(mut self, from_schema: bool) -> Self {
        self.from_schema = Some(from_schema);
        self
    }

    pub fn is_variant(&self) -> bool {
        matches!(self.kind, NodeKind::Variant { .. })
    }

    pub fn is_default_variant(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Variant {
                kind: VariantKind::Default
            }
        )
    }

    pub fn instance_of(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Instance { instance_of, .. } => Some(instance_of),
            NodeKind::Variant { .. } => None,
        }
    }

    /// Template root this node belongs to (itself, for variants)
    pub fn owner(&self) -> &str {
        match &self.kind {
            NodeKind::Instance { variant, .. } => variant,
            NodeKind::Variant { .. } => &self.id,
        }
    }

    pub(crate) fn set_owner(&mut self, owner: &str) {
        if let NodeKind::Instance { variant, .. } = &mut self.kind {
            *variant = owner.to_string();
        }
    }

    pub(crate) fn set_instance_of(&mut self, target: &str) {
        if let NodeKind::Instance { instance_of, .. } = &mut self.kind {
            *instance_of = target.to_string();
        }
    }
}

/// Wire shape of a node: variants carry `type`, instances carry `isChild`
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNode {
    id: NodeId,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<VariantKind>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    is_child: bool,

    component: ComponentId,

    #[serde(default)]
    level: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    theme: Option<String>,

    #[serde(default)]
    label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    from_schema: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    variant: Option<NodeId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    instance_of: Option<NodeId>,

    #[serde(default)]
    properties: Properties,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<NodeId>,
}

impl TryFrom<RawNode> for Node {
    type Error = String;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        let kind = if raw.is_child {
            let variant = raw
                .variant
                .ok_or_else(|| format!("instance `{}` is missing `variant`", raw.id))?;
            let instance_of = raw
                .instance_of
                .ok_or_else(|| format!("instance `{}` is missing `instanceOf`", raw.id))?;
            NodeKind::Instance {
                variant,
                instance_of,
            }
        } else {
            NodeKind::Variant {
                kind: raw.kind.unwrap_or(VariantKind::Variant),
            }
        };

        Ok(Node {
            id: raw.id,
            component: raw.component,
            level: raw.level,
            theme: raw.theme,
            label: raw.label,
            from_schema: raw.from_schema,
            properties: raw.properties,
            children: raw.children,
            kind,
        })
    }
}

impl From<Node> for RawNode {
    fn from(node: Node) -> Self {
        let (kind, is_child, variant, instance_of) = match node.kind {
            NodeKind::Variant { kind } => (Some(kind), false, None, None),
            NodeKind::Instance {
                variant,
                instance_of,
            } => (None, true, Some(variant), Some(instance_of)),
        };

        RawNode {
            id: node.id,
            kind,
            is_child,
            component: node.component,
            level: node.level,
            theme: node.theme,
            label: node.label,
            from_schema: node.from_schema,
            variant,
            instance_of,
            properties: node.properties,
            children: node.children,
        }
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    /// Empty document at the current version
    pub fn new() -> Self {
        Self {
            version: CURRENT_VERSION,
            custom_theme: Theme::default(),
            boards: BTreeMap::new(),
            by_id: BTreeMap::new(),
        }
    }

    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Result<&Node, LookupError> {
        self.by_id
            .get(id)
            .ok_or_else(|| LookupError::NodeNotFound(id.to_string()))
    }

    pub fn node_mut(&mut self, id: &str) -> Result<&mut Node, LookupError> {
        self.by_id
            .get_mut(id)
            .ok_or_else(|| LookupError::NodeNotFound(id.to_string()))
    }

    pub fn board(&self, id: &str) -> Result<&Board, LookupError> {
        self.boards
            .get(id)
            .ok_or_else(|| LookupError::BoardNotFound(id.to_string()))
    }

    pub fn board_mut(&mut self, id: &str) -> Result<&mut Board, LookupError> {
        self.boards
            .get_mut(id)
            .ok_or_else(|| LookupError::BoardNotFound(id.to_string()))
    }

    /// Lookup that also requires the node to be a variant
    pub fn variant(&self, id: &str) -> Result<&Node, LookupError> {
        let node = self.node(id)?;
        if !node.is_variant() {
            return Err(LookupError::NotAVariant(id.to_string()));
        }
        Ok(node)
    }

    pub fn children(&self, id: &str) -> Result<Vec<&Node>, LookupError> {
        self.node(id)?
            .children
            .iter()
            .map(|child| self.node(child))
            .collect()
    }

    /// Structural parent, `None` for variants and detached instances
    pub fn parent_of(&self, id: &str) -> Result<Option<&Node>, LookupError> {
        self.node(id)?;
        Ok(self
            .by_id
            .values()
            .find(|candidate| candidate.children.iter().any(|c| c == id)))
    }

    /// Ancestors from the direct parent up to the root
    pub fn ancestors(&self, id: &str) -> Result<Vec<NodeId>, LookupError> {
        self.node(id)?;
        Ok(self
            .tree_index()
            .ancestors(id)
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    /// Pre-order descendants, excluding `id` itself
    pub fn descendants(&self, id: &str) -> Result<Vec<NodeId>, LookupError> {
        let mut subtree = self.subtree(id)?;
        subtree.remove(0);
        Ok(subtree)
    }

    /// Pre-order subtree including `id`
    pub fn subtree(&self, id: &str) -> Result<Vec<NodeId>, LookupError> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![id.to_string()];

        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            let node = self.node(&current)?;
            for child in node.children.iter().rev() {
                stack.push(child.clone());
            }
            out.push(current);
        }

        Ok(out)
    }

    /// Topmost ancestor of `id` (the variant, for attached instances)
    pub fn owning_variant(&self, id: &str) -> Result<NodeId, LookupError> {
        self.node(id)?;
        let index = self.tree_index();
        Ok(index
            .ancestors(id)
            .last()
            .map(|root| root.to_string())
            .unwrap_or_else(|| id.to_string()))
    }

    pub fn boards_in_order(&self) -> Vec<&Board> {
        let mut boards: Vec<&Board> = self.boards.values().collect();
        boards.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        boards
    }

    pub fn next_board_order(&self) -> u32 {
        self.boards
            .values()
            .map(|board| board.order + 1)
            .max()
            .unwrap_or(0)
    }

    /// Reassign `order` as 0..n following the given board id sequence
    pub(crate) fn assign_board_order(&mut self, ids: &[ComponentId]) {
        for (order, id) in ids.iter().enumerate() {
            if let Some(board) = self.boards.get_mut(id) {
                board.order = order as u32;
            }
        }
    }

    /// Child → parent index over the whole store
    pub fn tree_index(&self) -> TreeIndex {
        TreeIndex::build(self)
    }
}

/// Parent pointers derived from `children` lists
#[derive(Debug, Clone, Default)]
pub struct TreeIndex {
    parents: HashMap<NodeId, NodeId>,
    limit: usize,
}

impl TreeIndex {
    pub fn build(workspace: &Workspace) -> Self {
        let mut parents = HashMap::new();
        for node in workspace.by_id.values() {
            for child in &node.children {
                parents.entry(child.clone()).or_insert_with(|| node.id.clone());
            }
        }
        Self {
            parents,
            limit: workspace.by_id.len(),
        }
    }

    pub fn parent(&self, id: &str) -> Option<&str> {
        self.parents.get(id).map(String::as_str)
    }

    /// Parent chain, bounded by the store size so corrupt cycles terminate
    pub fn ancestors(&self, id: &str) -> Vec<&str> {
        let mut out = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            if out.len() > self.limit {
                break;
            }
            out.push(parent);
            current = parent;
        }
        out
    }

    pub fn is_ancestor(&self, ancestor: &str, of: &str) -> bool {
        self.ancestors(of).contains(&ancestor)
    }
}
