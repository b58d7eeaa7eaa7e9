//! Payload checks run before any handler sees an action.

use crate::actions::{Action, NodeSource, Op};
use composer_schema::PropertyPath;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Malformed `{action}` action: {reason}")]
    Malformed { action: String, reason: String },

    #[error("`{action}` requires a non-empty `{field}`")]
    EmptyField { action: String, field: &'static str },

    #[error("`{action}` has an invalid property path `{path}`")]
    InvalidPath { action: String, path: String },

    #[error("`{action}` carries no properties")]
    EmptyProperties { action: String },

    #[error("`set_workspace` cannot be batched")]
    NestedSetWorkspace,
}

pub fn validate(action: &Action) -> Result<(), ValidationError> {
    validate_op(&action.type_name(), &action.op, false)
}

fn validate_op(action: &str, op: &Op, nested: bool) -> Result<(), ValidationError> {
    let require = |field: &'static str, value: &str| {
        if value.trim().is_empty() {
            Err(ValidationError::EmptyField {
                action: action.to_string(),
                field,
            })
        } else {
            Ok(())
        }
    };

    match op {
        Op::SetWorkspace(_) if nested => return Err(ValidationError::NestedSetWorkspace),
        Op::SetWorkspace(_) | Op::ReorderBoard { .. } | Op::Unknown(_) => {}
        Op::AddBoard { component } => require("component", component)?,
        Op::AddVariant { component, label } => {
            require("component", component)?;
            if let Some(label) = label {
                require("label", label)?;
            }
        }
        Op::RemoveBoard { board_id } => require("boardId", board_id)?,
        Op::RemoveVariant { variant_id } => require("variantId", variant_id)?,
        Op::InsertNode { source, target } => {
            match source {
                NodeSource::Existing { node_id } => require("nodeId", node_id)?,
                NodeSource::New { component } => require("component", component)?,
            }
            require("parentId", &target.parent_id)?;
        }
        Op::MoveNode { node_id, target } => {
            require("nodeId", node_id)?;
            require("parentId", &target.parent_id)?;
        }
        Op::ReorderNode { node_id, .. }
        | Op::RemoveNode { node_id }
        | Op::DuplicateNode { node_id }
        | Op::SetNodeLabel { node_id, .. } => require("nodeId", node_id)?,
        Op::SetNodeProperties {
            node_id,
            properties,
        } => {
            require("nodeId", node_id)?;
            if properties.is_empty() {
                return Err(ValidationError::EmptyProperties {
                    action: action.to_string(),
                });
            }
        }
        Op::ResetNodeProperty { node_id, path } => {
            require("nodeId", node_id)?;
            PropertyPath::parse(path).map_err(|_| ValidationError::InvalidPath {
                action: action.to_string(),
                path: path.clone(),
            })?;
        }
        Op::SetNodeTheme { node_id, theme } => {
            require("nodeId", node_id)?;
            if let Some(theme) = theme {
                require("theme", theme)?;
            }
        }
        Op::SetBoardProperties {
            board_id,
            properties,
        } => {
            require("boardId", board_id)?;
            if properties.is_empty() {
                return Err(ValidationError::EmptyProperties {
                    action: action.to_string(),
                });
            }
        }
        Op::SetBoardTheme { board_id, theme } => {
            require("boardId", board_id)?;
            require("theme", theme)?;
        }
        Op::Batch(ops) => {
            for op in ops {
                validate_op(action, op, true)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Target;
    use crate::workspace::Workspace;
    use composer_schema::Properties;

    #[test]
    fn test_well_formed_actions_pass() {
        let action = Action::user(Op::InsertNode {
            source: NodeSource::New {
                component: "icon".to_string(),
            },
            target: Target::new("variant-button-default", 0),
        });
        assert!(validate(&action).is_ok());
        assert!(validate(&Action::user(Op::Unknown("whatever".to_string()))).is_ok());
    }

    #[test]
    fn test_empty_ids_are_rejected() {
        let action = Action::ai(Op::RemoveNode {
            node_id: " ".to_string(),
        });
        assert_eq!(
            validate(&action),
            Err(ValidationError::EmptyField {
                action: "ai_remove_node".to_string(),
                field: "nodeId",
            })
        );
    }

    #[test]
    fn test_property_payloads() {
        let empty = Action::user(Op::SetNodeProperties {
            node_id: "label-1".to_string(),
            properties: Properties::new(),
        });
        assert!(matches!(
            validate(&empty),
            Err(ValidationError::EmptyProperties { .. })
        ));

        let bad_path = Action::user(Op::ResetNodeProperty {
            node_id: "label-1".to_string(),
            path: "border..color".to_string(),
        });
        assert!(matches!(
            validate(&bad_path),
            Err(ValidationError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_set_workspace_cannot_be_batched() {
        let batch = Action::ai(Op::Batch(vec![Op::SetWorkspace(Box::new(Workspace::new()))]));
        assert_eq!(validate(&batch), Err(ValidationError::NestedSetWorkspace));
        assert!(validate(&Action::user(Op::SetWorkspace(Box::new(Workspace::new())))).is_ok());
    }
}
