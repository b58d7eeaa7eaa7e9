//! # Verification
//!
//! Re-derives every referential invariant of a workspace from scratch. Nothing
//! is repaired here: violations are collected and reported together.

use crate::workspace::{NodeKind, Workspace};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Workspace failed verification: {}", summary(.violations))]
pub struct IntegrityError {
    pub violations: Vec<Violation>,
}

fn summary(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Violation {
    BoardKeyMismatch { key: String, id: String },
    BoardComponentMismatch { board: String, component: String },
    MissingVariant { board: String, variant: String },
    ListedNonVariant { board: String, node: String },
    VariantOnWrongBoard { board: String, variant: String, component: String },
    VariantListedTwice { variant: String },
    UnlistedVariant { variant: String },
    NodeKeyMismatch { key: String, id: String },
    MissingChild { parent: String, child: String },
    VariantUsedAsChild { parent: String, variant: String },
    MultipleParents { node: String, count: usize },
    DanglingOwner { node: String, variant: String },
    DanglingInstanceOf { node: String, target: String },
    Cycle { node: String },
    BoardOrder { orders: Vec<u32> },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::BoardKeyMismatch { key, id } => {
                write!(f, "board stored under `{}` has id `{}`", key, id)
            }
            Violation::BoardComponentMismatch { board, component } => {
                write!(f, "board `{}` declares component `{}`", board, component)
            }
            Violation::MissingVariant { board, variant } => {
                write!(f, "board `{}` lists missing variant `{}`", board, variant)
            }
            Violation::ListedNonVariant { board, node } => {
                write!(f, "board `{}` lists instance `{}` as a variant", board, node)
            }
            Violation::VariantOnWrongBoard {
                board,
                variant,
                component,
            } => write!(
                f,
                "variant `{}` of `{}` is listed on board `{}`",
                variant, component, board
            ),
            Violation::VariantListedTwice { variant } => {
                write!(f, "variant `{}` is listed more than once", variant)
            }
            Violation::UnlistedVariant { variant } => {
                write!(f, "variant `{}` belongs to no board", variant)
            }
            Violation::NodeKeyMismatch { key, id } => {
                write!(f, "node stored under `{}` has id `{}`", key, id)
            }
            Violation::MissingChild { parent, child } => {
                write!(f, "`{}` lists missing child `{}`", parent, child)
            }
            Violation::VariantUsedAsChild { parent, variant } => {
                write!(f, "`{}` lists variant `{}` as a child", parent, variant)
            }
            Violation::MultipleParents { node, count } => {
                write!(f, "`{}` is a child {} times", node, count)
            }
            Violation::DanglingOwner { node, variant } => {
                write!(f, "`{}` is owned by unknown variant `{}`", node, variant)
            }
            Violation::DanglingInstanceOf { node, target } => {
                write!(f, "`{}` is an instance of unknown node `{}`", node, target)
            }
            Violation::Cycle { node } => write!(f, "`{}` is its own ancestor", node),
            Violation::BoardOrder { orders } => {
                write!(f, "board orders {:?} are not 0..{}", orders, orders.len())
            }
        }
    }
}

pub fn verify(workspace: &Workspace) -> Result<(), IntegrityError> {
    let mut violations = Vec::new();
    check_boards(workspace, &mut violations);
    check_nodes(workspace, &mut violations);
    check_acyclic(workspace, &mut violations);

    if violations.is_empty() {
        debug!(
            boards = workspace.boards.len(),
            nodes = workspace.by_id.len(),
            "Workspace verified"
        );
        return Ok(());
    }

    violations.sort();
    violations.dedup();
    warn!(count = violations.len(), "Workspace failed verification");
    Err(IntegrityError { violations })
}

fn check_boards(ws: &Workspace, out: &mut Vec<Violation>) {
    let mut listed: BTreeMap<&str, usize> = BTreeMap::new();

    for (key, board) in &ws.boards {
        if *key != board.id {
            out.push(Violation::BoardKeyMismatch {
                key: key.clone(),
                id: board.id.clone(),
            });
        }
        if let Some(component) = &board.component {
            if *component != board.id {
                out.push(Violation::BoardComponentMismatch {
                    board: board.id.clone(),
                    component: component.clone(),
                });
            }
        }

        for variant in &board.variants {
            *listed.entry(variant).or_default() += 1;
            match ws.by_id.get(variant) {
                None => out.push(Violation::MissingVariant {
                    board: board.id.clone(),
                    variant: variant.clone(),
                }),
                Some(node) if !node.is_variant() => out.push(Violation::ListedNonVariant {
                    board: board.id.clone(),
                    node: variant.clone(),
                }),
                Some(node) if node.component != board.id => {
                    out.push(Violation::VariantOnWrongBoard {
                        board: board.id.clone(),
                        variant: variant.clone(),
                        component: node.component.clone(),
                    })
                }
                Some(_) => {}
            }
        }
    }

    for (variant, count) in &listed {
        if *count > 1 {
            out.push(Violation::VariantListedTwice {
                variant: variant.to_string(),
            });
        }
    }

    for node in ws.by_id.values().filter(|node| node.is_variant()) {
        if !listed.contains_key(node.id.as_str()) {
            out.push(Violation::UnlistedVariant {
                variant: node.id.clone(),
            });
        }
    }

    let orders: BTreeSet<u32> = ws.boards.values().map(|board| board.order).collect();
    let contiguous = orders.len() == ws.boards.len()
        && orders.iter().enumerate().all(|(i, order)| *order == i as u32);
    if !contiguous {
        let mut orders: Vec<u32> = ws.boards.values().map(|board| board.order).collect();
        orders.sort_unstable();
        out.push(Violation::BoardOrder { orders });
    }
}

fn check_nodes(ws: &Workspace, out: &mut Vec<Violation>) {
    let mut parents: HashMap<&str, usize> = HashMap::new();

    for (key, node) in &ws.by_id {
        if *key != node.id {
            out.push(Violation::NodeKeyMismatch {
                key: key.clone(),
                id: node.id.clone(),
            });
        }

        for child in &node.children {
            *parents.entry(child).or_default() += 1;
            match ws.by_id.get(child) {
                None => out.push(Violation::MissingChild {
                    parent: node.id.clone(),
                    child: child.clone(),
                }),
                Some(found) if found.is_variant() => out.push(Violation::VariantUsedAsChild {
                    parent: node.id.clone(),
                    variant: child.clone(),
                }),
                Some(_) => {}
            }
        }

        if let NodeKind::Instance {
            variant,
            instance_of,
        } = &node.kind
        {
            if !ws.by_id.get(variant).map_or(false, |owner| owner.is_variant()) {
                out.push(Violation::DanglingOwner {
                    node: node.id.clone(),
                    variant: variant.clone(),
                });
            }
            if !ws.by_id.contains_key(instance_of) {
                out.push(Violation::DanglingInstanceOf {
                    node: node.id.clone(),
                    target: instance_of.clone(),
                });
            }
        }
    }

    for (node, count) in parents {
        if count > 1 {
            out.push(Violation::MultipleParents {
                node: node.to_string(),
                count,
            });
        }
    }
}

/// Iterative three-colour DFS over `children`
fn check_acyclic(ws: &Workspace, out: &mut Vec<Violation>) {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Open,
        Done,
    }

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    for root in ws.by_id.keys() {
        if marks.contains_key(root.as_str()) {
            continue;
        }

        let mut stack: Vec<(&str, usize)> = vec![(root.as_str(), 0)];
        marks.insert(root, Mark::Open);

        while let Some((id, next_child)) = stack.pop() {
            let children = ws.by_id.get(id).map(|n| n.children.as_slice()).unwrap_or(&[]);
            let Some(child) = children.get(next_child) else {
                marks.insert(id, Mark::Done);
                continue;
            };
            stack.push((id, next_child + 1));

            match marks.get(child.as_str()) {
                Some(Mark::Open) => out.push(Violation::Cycle {
                    node: child.clone(),
                }),
                Some(Mark::Done) => {}
                None if ws.by_id.contains_key(child) => {
                    marks.insert(child, Mark::Open);
                    stack.push((child.as_str(), 0));
                }
                None => {}
            }
        }
    }
}
