//! # Actions
//!
//! The closed set of edits a caller can dispatch. On the wire an action is
//! `{ "type": "<name>", "payload": ... }`; names prefixed with `ai_` carry the
//! same payloads and semantics but are tagged as programmatic callers.
//!
//! Unknown names decode to [`Op::Unknown`], which the reducer treats as a no-op.

use crate::context::Context;
use crate::errors::EngineError;
use crate::mutations;
use crate::reconcile::{analyze_required_structures, create_missing_variants};
use crate::validate::ValidationError;
use crate::workspace::{ComponentId, NodeId, Workspace};
use composer_schema::{Properties, PropertyPath};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};
use tracing::debug;

const AI_PREFIX: &str = "ai_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Op {
    SetWorkspace(Box<Workspace>),

    AddBoard {
        component: ComponentId,
    },

    #[serde(rename_all = "camelCase")]
    RemoveBoard {
        board_id: ComponentId,
    },

    ReorderBoard {
        from: usize,
        to: usize,
    },

    AddVariant {
        component: ComponentId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    RemoveVariant {
        variant_id: NodeId,
    },

    InsertNode {
        source: NodeSource,
        target: Target,
    },

    #[serde(rename_all = "camelCase")]
    MoveNode {
        node_id: NodeId,
        target: Target,
    },

    #[serde(rename_all = "camelCase")]
    ReorderNode {
        node_id: NodeId,
        index: usize,
    },

    #[serde(rename_all = "camelCase")]
    RemoveNode {
        node_id: NodeId,
    },

    #[serde(rename_all = "camelCase")]
    DuplicateNode {
        node_id: NodeId,
    },

    #[serde(rename_all = "camelCase")]
    SetNodeProperties {
        node_id: NodeId,
        properties: Properties,
    },

    #[serde(rename_all = "camelCase")]
    ResetNodeProperty {
        node_id: NodeId,
        path: String,
    },

    #[serde(rename_all = "camelCase")]
    SetNodeTheme {
        node_id: NodeId,
        #[serde(default)]
        theme: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    SetNodeLabel {
        node_id: NodeId,
        label: String,
    },

    #[serde(rename_all = "camelCase")]
    SetBoardProperties {
        board_id: ComponentId,
        properties: Properties,
    },

    #[serde(rename_all = "camelCase")]
    SetBoardTheme {
        board_id: ComponentId,
        theme: String,
    },

    /// Several ops applied as one step, after missing variants are synthesized
    Batch(Vec<Op>),

    /// Action name this engine does not know
    #[serde(skip)]
    Unknown(String),
}

/// What `insert_node` attaches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeSource {
    /// A detached instance already in the store
    Existing {
        #[serde(rename = "nodeId")]
        node_id: NodeId,
    },

    /// A fresh instance of `component`, reusing a matching variant if one exists
    New { component: ComponentId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub parent_id: NodeId,
    pub index: usize,
}

impl Target {
    pub fn new(parent_id: impl Into<String>, index: usize) -> Self {
        Self {
            parent_id: parent_id.into(),
            index,
        }
    }
}

impl Op {
    /// Every wire name `Op` decodes, without the `ai_` prefix
    pub const NAMES: &'static [&'static str] = &[
        "set_workspace",
        "add_board",
        "remove_board",
        "reorder_board",
        "add_variant",
        "remove_variant",
        "insert_node",
        "move_node",
        "reorder_node",
        "remove_node",
        "duplicate_node",
        "set_node_properties",
        "reset_node_property",
        "set_node_theme",
        "set_node_label",
        "set_board_properties",
        "set_board_theme",
        "batch",
    ];

    pub fn type_name(&self) -> &str {
        match self {
            Op::SetWorkspace(_) => "set_workspace",
            Op::AddBoard { .. } => "add_board",
            Op::RemoveBoard { .. } => "remove_board",
            Op::ReorderBoard { .. } => "reorder_board",
            Op::AddVariant { .. } => "add_variant",
            Op::RemoveVariant { .. } => "remove_variant",
            Op::InsertNode { .. } => "insert_node",
            Op::MoveNode { .. } => "move_node",
            Op::ReorderNode { .. } => "reorder_node",
            Op::RemoveNode { .. } => "remove_node",
            Op::DuplicateNode { .. } => "duplicate_node",
            Op::SetNodeProperties { .. } => "set_node_properties",
            Op::ResetNodeProperty { .. } => "reset_node_property",
            Op::SetNodeTheme { .. } => "set_node_theme",
            Op::SetNodeLabel { .. } => "set_node_label",
            Op::SetBoardProperties { .. } => "set_board_properties",
            Op::SetBoardTheme { .. } => "set_board_theme",
            Op::Batch(_) => "batch",
            Op::Unknown(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Op::Unknown(_))
    }

    /// Whether the op can change tree shape or the variant set
    pub fn is_structural(&self) -> bool {
        match self {
            Op::SetNodeProperties { .. }
            | Op::ResetNodeProperty { .. }
            | Op::SetNodeTheme { .. }
            | Op::SetNodeLabel { .. }
            | Op::SetBoardProperties { .. }
            | Op::SetBoardTheme { .. }
            | Op::Unknown(_) => false,
            Op::Batch(ops) => ops.iter().any(Op::is_structural),
            _ => true,
        }
    }

    pub fn apply(&self, ws: &Workspace, cx: &mut Context<'_>) -> Result<Workspace, EngineError> {
        match self {
            Op::SetWorkspace(workspace) => Ok(workspace.as_ref().clone()),
            Op::AddBoard { component } => mutations::add_board(ws, cx, component),
            Op::RemoveBoard { board_id } => mutations::remove_board(ws, board_id),
            Op::ReorderBoard { from, to } => mutations::reorder_board(ws, *from, *to),
            Op::AddVariant { component, label } => {
                mutations::add_variant(ws, cx, component, label.as_deref())
            }
            Op::RemoveVariant { variant_id } => mutations::remove_variant(ws, variant_id),
            Op::InsertNode { source, target } => mutations::insert_node(ws, cx, source, target),
            Op::MoveNode { node_id, target } => mutations::move_node(ws, cx, node_id, target),
            Op::ReorderNode { node_id, index } => mutations::reorder_node(ws, cx, node_id, *index),
            Op::RemoveNode { node_id } => mutations::remove_node(ws, node_id),
            Op::DuplicateNode { node_id } => mutations::duplicate_node(ws, cx, node_id),
            Op::SetNodeProperties {
                node_id,
                properties,
            } => mutations::set_node_properties(ws, node_id, properties),
            Op::ResetNodeProperty { node_id, path } => {
                let path = PropertyPath::parse(path)?;
                mutations::reset_node_property(ws, node_id, &path)
            }
            Op::SetNodeTheme { node_id, theme } => {
                mutations::set_node_theme(ws, cx, node_id, theme.as_deref())
            }
            Op::SetNodeLabel { node_id, label } => mutations::set_node_label(ws, node_id, label),
            Op::SetBoardProperties {
                board_id,
                properties,
            } => mutations::set_board_properties(ws, board_id, properties),
            Op::SetBoardTheme { board_id, theme } => {
                mutations::set_board_theme(ws, cx, board_id, theme)
            }
            Op::Batch(ops) => apply_batch(ws, cx, ops),
            Op::Unknown(name) => {
                debug!(action = %name, "Ignoring unknown action");
                Ok(ws.clone())
            }
        }
    }
}

fn apply_batch(ws: &Workspace, cx: &mut Context<'_>, ops: &[Op]) -> Result<Workspace, EngineError> {
    let required = analyze_required_structures(ops, cx.catalog, cx.cache)?;
    let (mut next, created) = create_missing_variants(ws, &required, cx)?;
    debug!(ops = ops.len(), created = created.len(), "Applying batch");

    for op in ops {
        next = op.apply(&next, cx)?;
    }
    Ok(next)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Origin {
    #[default]
    User,
    Ai,
}

/// An op plus the namespace it was dispatched under
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub origin: Origin,
    pub op: Op,
}

impl Action {
    pub fn user(op: Op) -> Self {
        Self {
            origin: Origin::User,
            op,
        }
    }

    pub fn ai(op: Op) -> Self {
        Self {
            origin: Origin::Ai,
            op,
        }
    }

    /// Wire name, `ai_`-prefixed for programmatic callers
    pub fn type_name(&self) -> String {
        match self.origin {
            Origin::User => self.op.type_name().to_string(),
            Origin::Ai => format!("{}{}", AI_PREFIX, self.op.type_name()),
        }
    }

    pub fn from_json(value: Value) -> Result<Self, ValidationError> {
        let raw: RawAction =
            serde_json::from_value(value).map_err(|err| ValidationError::Malformed {
                action: "<untyped>".to_string(),
                reason: err.to_string(),
            })?;
        raw.decode()
    }

    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Envelope before the payload is interpreted
#[derive(Serialize, Deserialize)]
struct RawAction {
    #[serde(rename = "type")]
    kind: String,

    #[serde(default)]
    payload: Value,
}

impl RawAction {
    fn decode(self) -> Result<Action, ValidationError> {
        let (origin, name) = match self.kind.strip_prefix(AI_PREFIX) {
            Some(name) => (Origin::Ai, name.to_string()),
            None => (Origin::User, self.kind.clone()),
        };

        if !Op::NAMES.contains(&name.as_str()) {
            return Ok(Action {
                origin,
                op: Op::Unknown(name),
            });
        }

        let op: Op = serde_json::from_value(json!({ "type": name, "payload": self.payload }))
            .map_err(|err| ValidationError::Malformed {
                action: self.kind.clone(),
                reason: err.to_string(),
            })?;
        Ok(Action { origin, op })
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let payload = match &self.op {
            Op::Unknown(_) => Value::Null,
            op => {
                let mut tagged = serde_json::to_value(op).map_err(serde::ser::Error::custom)?;
                tagged
                    .get_mut("payload")
                    .map(Value::take)
                    .unwrap_or(Value::Null)
            }
        };

        RawAction {
            kind: self.type_name(),
            payload,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawAction::deserialize(deserializer)?
            .decode()
            .map_err(serde::de::Error::custom)
    }
}
