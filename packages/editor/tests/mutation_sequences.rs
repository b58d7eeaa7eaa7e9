//! Tests for longer mutation sequences
//!
//! This tests:
//! - Insert + move + remove chains
//! - Undo/redo sequences
//! - Batched actions undone as one step
//! - Workspace integrity after mixed operations

use composer_editor::schema::{Catalog, Properties, Property, ThemeSet};
use composer_editor::{
    verify, Action, Dispatched, EngineConfig, EngineError, MutationError, NodeSource, Op,
    Pipeline, Target, Workspace,
};

fn fixtures() -> (Catalog, ThemeSet) {
    (Catalog::builtin().unwrap(), ThemeSet::builtin().unwrap())
}

fn insert_new(parent: &str, index: usize, component: &str) -> Action {
    Action::user(Op::InsertNode {
        source: NodeSource::New {
            component: component.to_string(),
        },
        target: Target::new(parent, index),
    })
}

fn children(ws: &Workspace, id: &str) -> Vec<String> {
    ws.node(id).unwrap().children.clone()
}

#[test]
fn test_insert_move_remove_sequence() {
    let (catalog, themes) = fixtures();
    let mut pipeline = Pipeline::new(&catalog, &themes, EngineConfig::default());
    let root = "variant-frame-default";

    pipeline
        .dispatch(Action::user(Op::AddBoard {
            component: "frame".to_string(),
        }))
        .unwrap();
    pipeline.dispatch(insert_new(root, 0, "button")).unwrap();
    pipeline.dispatch(insert_new(root, 1, "label")).unwrap();
    pipeline.dispatch(insert_new(root, 2, "frame")).unwrap();

    let ws = pipeline.workspace();
    let top = children(ws, root);
    assert_eq!(top.len(), 3);
    let (button, label, nested) = (top[0].clone(), top[1].clone(), top[2].clone());
    assert_eq!(ws.node(&button).unwrap().instance_of(), Some("variant-button-default"));
    assert_eq!(ws.node(&button).unwrap().from_schema, Some(false));

    let boards: Vec<&str> = ws
        .boards_in_order()
        .iter()
        .map(|board| board.id.as_str())
        .collect();
    assert_eq!(boards, vec!["frame", "button", "icon", "label"]);

    // Move the label into the nested frame
    pipeline
        .dispatch(Action::user(Op::MoveNode {
            node_id: label.clone(),
            target: Target::new(nested.as_str(), 0),
        }))
        .unwrap();
    let ws = pipeline.workspace();
    assert_eq!(children(ws, root), vec![button.clone(), nested.clone()]);
    assert_eq!(children(ws, &nested), vec![label.clone()]);
    assert_eq!(ws.node(&label).unwrap().owner(), root);
    let after_move = ws.clone();

    // Removing the nested frame takes the label with it
    pipeline
        .dispatch(Action::user(Op::RemoveNode {
            node_id: nested.clone(),
        }))
        .unwrap();
    let ws = pipeline.workspace();
    assert!(!ws.contains(&nested));
    assert!(!ws.contains(&label));
    assert_eq!(children(ws, root), vec![button.clone()]);

    assert!(pipeline.undo());
    assert_eq!(pipeline.workspace(), &after_move);

    assert!(pipeline.undo());
    assert_eq!(children(pipeline.workspace(), root), vec![button, label, nested]);
}

#[test]
fn test_label_edits_with_undo_redo() {
    let (catalog, themes) = fixtures();
    let mut pipeline = Pipeline::new(&catalog, &themes, EngineConfig::default());
    pipeline
        .dispatch(Action::user(Op::AddBoard {
            component: "button".to_string(),
        }))
        .unwrap();

    for label in ["Primary", "Secondary", "Ghost"] {
        pipeline
            .dispatch(Action::user(Op::SetNodeLabel {
                node_id: "variant-button-default".to_string(),
                label: label.to_string(),
            }))
            .unwrap();
    }

    let current = |pipeline: &Pipeline<'_>| {
        pipeline
            .workspace()
            .node("variant-button-default")
            .unwrap()
            .label
            .clone()
    };

    assert_eq!(current(&pipeline), "Ghost");
    pipeline.undo();
    pipeline.undo();
    assert_eq!(current(&pipeline), "Primary");
    pipeline.redo();
    assert_eq!(current(&pipeline), "Secondary");

    // A new edit drops the remaining redo step
    pipeline
        .dispatch(Action::user(Op::SetNodeLabel {
            node_id: "variant-button-default".to_string(),
            label: "Outline".to_string(),
        }))
        .unwrap();
    assert!(!pipeline.history().can_redo());
    assert!(!pipeline.redo());
    assert_eq!(current(&pipeline), "Outline");
}

#[test]
fn test_batch_undoes_as_one_step() {
    let (catalog, themes) = fixtures();
    let mut pipeline = Pipeline::new(&catalog, &themes, EngineConfig::default());

    let gap = Properties::new().with("gap", Property::preset("none"));
    let result = pipeline
        .dispatch(Action::ai(Op::Batch(vec![
            Op::AddBoard {
                component: "bar-buttons".to_string(),
            },
            Op::SetBoardTheme {
                board_id: "bar-buttons".to_string(),
                theme: "midnight".to_string(),
            },
            Op::SetNodeProperties {
                node_id: "variant-bar-buttons-default".to_string(),
                properties: gap,
            },
        ])))
        .unwrap();
    assert_eq!(result, Dispatched::Changed);
    assert_eq!(pipeline.history().undo_levels(), 1);

    let ws = pipeline.workspace();
    assert_eq!(ws.board("bar-buttons").unwrap().theme, "midnight");
    assert_eq!(ws.board("button").unwrap().variants.len(), 1);

    assert!(pipeline.undo());
    assert_eq!(pipeline.workspace(), &Workspace::new());
}

#[test]
fn test_failing_batch_leaves_nothing_behind() {
    let (catalog, themes) = fixtures();
    let mut pipeline = Pipeline::new(&catalog, &themes, EngineConfig::default());

    let err = pipeline
        .dispatch(Action::ai(Op::Batch(vec![
            Op::AddBoard {
                component: "card-product".to_string(),
            },
            Op::ReorderBoard { from: 0, to: 42 },
        ])))
        .unwrap_err();

    assert_eq!(
        err,
        EngineError::Mutation(MutationError::IndexOutOfRange { index: 42, len: 5 })
    );
    assert_eq!(pipeline.workspace(), &Workspace::new());
    assert!(!pipeline.history().can_undo());
}

#[test]
fn test_reorder_within_parent() {
    let (catalog, themes) = fixtures();
    let mut pipeline = Pipeline::new(&catalog, &themes, EngineConfig::default());
    pipeline
        .dispatch(Action::user(Op::AddBoard {
            component: "button".to_string(),
        }))
        .unwrap();

    let before = children(pipeline.workspace(), "variant-button-default");
    pipeline
        .dispatch(Action::user(Op::ReorderNode {
            node_id: before[1].clone(),
            index: 0,
        }))
        .unwrap();
    assert_eq!(
        children(pipeline.workspace(), "variant-button-default"),
        vec![before[1].clone(), before[0].clone()]
    );

    let err = pipeline
        .dispatch(Action::user(Op::ReorderNode {
            node_id: before[1].clone(),
            index: 2,
        }))
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Mutation(MutationError::IndexOutOfRange { index: 2, len: 2 })
    );
}

#[test]
fn test_workspace_integrity_after_complex_sequence() {
    let (catalog, themes) = fixtures();
    let mut pipeline = Pipeline::new(&catalog, &themes, EngineConfig::default());

    for component in ["frame", "bar-buttons", "table"] {
        pipeline
            .dispatch(Action::user(Op::AddBoard {
                component: component.to_string(),
            }))
            .unwrap();
    }

    pipeline
        .dispatch(insert_new("variant-frame-default", 0, "card-product"))
        .unwrap();
    pipeline
        .dispatch(insert_new("variant-bar-buttons-default", 3, "button"))
        .unwrap();
    pipeline
        .dispatch(insert_new("variant-table-default", 2, "table-row"))
        .unwrap();

    let bar = children(pipeline.workspace(), "variant-bar-buttons-default");
    assert_eq!(bar.len(), 4);
    pipeline
        .dispatch(Action::user(Op::DuplicateNode {
            node_id: bar[3].clone(),
        }))
        .unwrap();
    pipeline
        .dispatch(Action::user(Op::DuplicateNode {
            node_id: "variant-table-row-default".to_string(),
        }))
        .unwrap();
    pipeline
        .dispatch(Action::user(Op::AddVariant {
            component: "button".to_string(),
            label: Some("Danger".to_string()),
        }))
        .unwrap();
    pipeline
        .dispatch(Action::user(Op::RemoveBoard {
            board_id: "icon".to_string(),
        }))
        .unwrap();
    pipeline
        .dispatch(Action::user(Op::RemoveNode {
            node_id: bar[0].clone(),
        }))
        .unwrap();

    let ws = pipeline.workspace();
    assert!(verify(ws).is_ok());
    assert_eq!(children(ws, "variant-bar-buttons-default").len(), 4);
    assert_eq!(ws.board("button").unwrap().variants.len(), 2);
    assert_eq!(ws.board("table-row").unwrap().variants.len(), 2);

    let orders: Vec<u32> = ws.boards_in_order().iter().map(|b| b.order).collect();
    assert_eq!(orders, (0..ws.boards.len() as u32).collect::<Vec<_>>());
}
