//! # Tree Mutations
//!
//! Structural operations on a workspace. Every operation takes the current
//! workspace by reference and returns a new one; the input is never touched.
//!
//! ## Failure Semantics
//!
//! - **Soft**: a well-formed edit disallowed by schema restrictions
//!   (`addChildren`, `reorderChildren`, `allowedChildren`) returns a workspace
//!   equal to the input and logs the rejection at `debug`.
//! - **Hard**: unknown ids, cycles and out-of-range indices are errors.
//!
//! ### Move
//! - Same parent: needs `reorderChildren` on the parent
//! - Different parent: needs `addChildren` on the source, and the destination
//!   must accept the component
//! - A node can never move under itself or one of its descendants
//!
//! ### Remove
//! - Deletes the subtree, then every node specialising a deleted node
//!   (`instanceOf`) or owned by a deleted variant, transitively
//! - A removed variant leaves its board in place

use crate::actions::{NodeSource, Target};
use crate::context::Context;
use crate::errors::EngineError;
use crate::id_generator::IdGenerator;
use crate::instantiate::Instantiator;
use crate::reconcile::reconcile;
use crate::workspace::{ComponentId, NodeId, NodeKind, VariantKind, Workspace};
use composer_schema::{Properties, PropertyPath};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("Would create cycle: `{node}` under `{target}`")]
    CycleDetected { node: String, target: String },

    #[error("Index {index} out of range for {len} entries")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Node is already attached: {0}")]
    AlreadyAttached(String),

    #[error("Unknown theme: {0}")]
    UnknownTheme(String),
}

fn rejected(ws: &Workspace, op: &str, node: &str, restriction: &str) -> Workspace {
    debug!(op = %op, node = %node, restriction = %restriction, "Restriction rejected mutation");
    ws.clone()
}

/// Point every node of the subtree at its new owning variant
fn reassign_owner(ws: &mut Workspace, root: &str, owner: &str) -> Result<(), EngineError> {
    for id in ws.subtree(root)? {
        ws.node_mut(&id)?.set_owner(owner);
    }
    Ok(())
}

/// Attach a detached node, or a freshly materialized one, under `target`
pub fn insert_node(
    ws: &Workspace,
    cx: &mut Context<'_>,
    source: &NodeSource,
    target: &Target,
) -> Result<Workspace, EngineError> {
    let catalog = cx.catalog;
    let config = cx.config;

    let parent = ws.node(&target.parent_id)?;
    let parent_schema = catalog.component_schema(&parent.component)?;
    let component = match source {
        NodeSource::Existing { node_id } => ws.node(node_id)?.component.clone(),
        NodeSource::New { component } => {
            catalog.component_schema(component)?;
            component.clone()
        }
    };

    if !parent_schema.restrictions().add_children {
        return Ok(rejected(ws, "insert_node", &parent.id, "addChildren"));
    }
    if !parent_schema.accepts_child(&component) {
        return Ok(rejected(ws, "insert_node", &parent.id, "allowedChildren"));
    }
    if target.index > parent.children.len() {
        return Err(MutationError::IndexOutOfRange {
            index: target.index,
            len: parent.children.len(),
        }
        .into());
    }

    let owner = parent.owner().to_string();
    let mut next = ws.clone();

    let child = match source {
        NodeSource::Existing { node_id } => {
            let node = ws.node(node_id)?;
            if node.is_variant() {
                return Err(MutationError::InvalidStructure(format!(
                    "variant `{}` cannot be nested",
                    node_id
                ))
                .into());
            }

            let index = ws.tree_index();
            if index.parent(node_id).is_some() {
                return Err(MutationError::AlreadyAttached(node_id.clone()).into());
            }
            if *node_id == target.parent_id || index.is_ancestor(node_id, &target.parent_id) {
                return Err(MutationError::CycleDetected {
                    node: node_id.clone(),
                    target: target.parent_id.clone(),
                }
                .into());
            }

            reassign_owner(&mut next, node_id, &owner)?;
            node_id.clone()
        }
        NodeSource::New { component } => {
            let found = reconcile(component, &next, catalog, cx.cache)?;
            let mut instantiator = Instantiator::new(catalog, &config.default_theme);
            if found.needs_new_variant {
                instantiator.instantiate_component(
                    &mut next,
                    component,
                    &target.parent_id,
                    &owner,
                    false,
                )?
            } else {
                instantiator.instantiate_variant(
                    &mut next,
                    &found.suggested_variant_id,
                    &owner,
                    false,
                )?
            }
        }
    };

    debug!(node = %child, parent = %target.parent_id, index = target.index, "Inserted node");
    next.node_mut(&target.parent_id)?
        .children
        .insert(target.index, child);
    Ok(next)
}

/// Relocate an attached instance under a new parent/index
pub fn move_node(
    ws: &Workspace,
    cx: &Context<'_>,
    node_id: &str,
    target: &Target,
) -> Result<Workspace, EngineError> {
    let node = ws.node(node_id)?;
    if node.is_variant() {
        return Err(MutationError::InvalidStructure(format!(
            "variant `{}` cannot be moved",
            node_id
        ))
        .into());
    }

    let index = ws.tree_index();
    let Some(current_parent) = index.parent(node_id) else {
        return Err(MutationError::InvalidStructure(format!(
            "node `{}` is detached; insert it instead",
            node_id
        ))
        .into());
    };
    let destination = ws.node(&target.parent_id)?;

    if target.parent_id == node_id || index.is_ancestor(node_id, &target.parent_id) {
        return Err(MutationError::CycleDetected {
            node: node_id.to_string(),
            target: target.parent_id.clone(),
        }
        .into());
    }

    let source_parent = ws.node(current_parent)?;
    let source_schema = cx.catalog.component_schema(&source_parent.component)?;
    let same_parent = current_parent == target.parent_id;

    if same_parent {
        if !source_schema.restrictions().reorder_children {
            return Ok(rejected(ws, "move_node", node_id, "reorderChildren"));
        }
    } else {
        let destination_schema = cx.catalog.component_schema(&destination.component)?;
        if !source_schema.restrictions().add_children {
            return Ok(rejected(ws, "move_node", node_id, "addChildren"));
        }
        if !destination_schema.accepts_child(&node.component) {
            return Ok(rejected(ws, "move_node", node_id, "allowedChildren"));
        }
    }

    let len = destination.children.len() - usize::from(same_parent);
    if target.index > len {
        return Err(MutationError::IndexOutOfRange {
            index: target.index,
            len,
        }
        .into());
    }

    let current_parent = current_parent.to_string();
    let owner = destination.owner().to_string();
    let follows_parent = node.instance_of() == Some(current_parent.as_str());

    let mut next = ws.clone();
    next.node_mut(&current_parent)?
        .children
        .retain(|child| child != node_id);
    next.node_mut(&target.parent_id)?
        .children
        .insert(target.index, node_id.to_string());

    if follows_parent {
        next.node_mut(node_id)?.set_instance_of(&target.parent_id);
    }
    reassign_owner(&mut next, node_id, &owner)?;

    debug!(node = %node_id, from = %current_parent, to = %target.parent_id, "Moved node");
    Ok(next)
}

/// Reindex a node within its parent; out-of-range indices are errors
pub fn reorder_node(
    ws: &Workspace,
    cx: &Context<'_>,
    node_id: &str,
    new_index: usize,
) -> Result<Workspace, EngineError> {
    ws.node(node_id)?;
    let index = ws.tree_index();
    let Some(parent_id) = index.parent(node_id) else {
        return Err(MutationError::InvalidStructure(format!(
            "node `{}` has no parent to reorder within",
            node_id
        ))
        .into());
    };

    let parent = ws.node(parent_id)?;
    let schema = cx.catalog.component_schema(&parent.component)?;
    if !schema.restrictions().reorder_children {
        return Ok(rejected(ws, "reorder_node", node_id, "reorderChildren"));
    }

    let len = parent.children.len();
    if new_index >= len {
        return Err(MutationError::IndexOutOfRange {
            index: new_index,
            len,
        }
        .into());
    }

    let Some(position) = parent.children.iter().position(|child| child == node_id) else {
        return Ok(ws.clone());
    };
    if position == new_index {
        return Ok(ws.clone());
    }

    let parent_id = parent_id.to_string();
    let mut next = ws.clone();
    let children = &mut next.node_mut(&parent_id)?.children;
    let moved = children.remove(position);
    children.insert(new_index, moved);
    Ok(next)
}

/// Everything that has to go when `node_id` goes
fn removal_set(ws: &Workspace, node_id: &str) -> Result<HashSet<NodeId>, EngineError> {
    let mut doomed: HashSet<NodeId> = ws.subtree(node_id)?.into_iter().collect();

    loop {
        let dependents: Vec<NodeId> = ws
            .by_id
            .values()
            .filter(|node| !doomed.contains(&node.id))
            .filter(|node| match &node.kind {
                NodeKind::Instance {
                    variant,
                    instance_of,
                } => doomed.contains(variant) || doomed.contains(instance_of),
                NodeKind::Variant { .. } => false,
            })
            .map(|node| node.id.clone())
            .collect();

        if dependents.is_empty() {
            break;
        }
        for dependent in dependents {
            doomed.extend(ws.subtree(&dependent)?);
        }
    }

    Ok(doomed)
}

pub fn remove_node(ws: &Workspace, node_id: &str) -> Result<Workspace, EngineError> {
    let doomed = removal_set(ws, node_id)?;

    let mut next = ws.clone();
    next.by_id.retain(|id, _| !doomed.contains(id));
    for node in next.by_id.values_mut() {
        node.children.retain(|child| !doomed.contains(child));
    }
    for board in next.boards.values_mut() {
        board.variants.retain(|variant| !doomed.contains(variant));
    }

    info!(node = %node_id, removed = doomed.len(), "Removed node");
    Ok(next)
}

/// Deep copy with fresh ids, placed right after the original
pub fn duplicate_node(
    ws: &Workspace,
    cx: &Context<'_>,
    node_id: &str,
) -> Result<Workspace, EngineError> {
    let node = ws.node(node_id)?;
    let index = ws.tree_index();

    let parent_id = if node.is_variant() {
        None
    } else {
        let Some(parent_id) = index.parent(node_id) else {
            return Err(MutationError::InvalidStructure(format!(
                "node `{}` is detached and has no sibling position",
                node_id
            ))
            .into());
        };
        let parent = ws.node(parent_id)?;
        let schema = cx.catalog.component_schema(&parent.component)?;
        if !schema.restrictions().add_children {
            return Ok(rejected(ws, "duplicate_node", node_id, "addChildren"));
        }
        if !schema.accepts_child(&node.component) {
            return Ok(rejected(ws, "duplicate_node", node_id, "allowedChildren"));
        }
        Some(parent_id.to_string())
    };

    let subtree = ws.subtree(node_id)?;
    let mut ids = IdGenerator::new();
    let root_copy = if node.is_variant() {
        ids.fresh_id(&format!("variant-{}", node.component), ws)
    } else {
        ids.fresh_id(&node.component, ws)
    };

    let mut mapping: HashMap<&str, NodeId> = HashMap::new();
    mapping.insert(node_id, root_copy.clone());
    for id in subtree.iter().skip(1) {
        let component = &ws.node(id)?.component;
        mapping.insert(id.as_str(), ids.fresh_id(component, ws));
    }

    let owner = if node.is_variant() {
        root_copy.clone()
    } else {
        node.owner().to_string()
    };

    let mut next = ws.clone();
    for id in &subtree {
        let mut copy = ws.node(id)?.clone();
        if let Some(new_id) = mapping.get(id.as_str()) {
            copy.id = new_id.clone();
        }
        copy.children = copy
            .children
            .iter()
            .map(|child| mapping.get(child.as_str()).cloned().unwrap_or_else(|| child.clone()))
            .collect();
        if let Some(remapped) = copy.instance_of().and_then(|target| mapping.get(target)).cloned() {
            copy.set_instance_of(&remapped);
        }
        copy.set_owner(&owner);
        copy.from_schema = Some(false);
        next.by_id.insert(copy.id.clone(), copy);
    }

    match parent_id {
        Some(parent_id) => {
            let siblings = &mut next.node_mut(&parent_id)?.children;
            let position = siblings
                .iter()
                .position(|child| child == node_id)
                .map_or(siblings.len(), |p| p + 1);
            siblings.insert(position, root_copy.clone());
        }
        None => {
            let copy = next.node_mut(&root_copy)?;
            copy.kind = NodeKind::Variant {
                kind: VariantKind::Variant,
            };
            copy.label = format!("{} copy", copy.label);

            let variants = &mut next.board_mut(&node.component)?.variants;
            let position = variants
                .iter()
                .position(|variant| variant == node_id)
                .map_or(variants.len(), |p| p + 1);
            variants.insert(position, root_copy.clone());
        }
    }

    debug!(node = %node_id, copy = %root_copy, nodes = subtree.len(), "Duplicated node");
    Ok(next)
}

/// Board + default variant for `component`; no-op when the board exists
pub fn add_board(
    ws: &Workspace,
    cx: &Context<'_>,
    component: &str,
) -> Result<Workspace, EngineError> {
    let mut next = ws.clone();
    let mut instantiator = Instantiator::new(cx.catalog, &cx.config.default_theme);
    if !instantiator.add_board(&mut next, component)? {
        return Ok(ws.clone());
    }

    info!(
        component = %component,
        boards = instantiator.created_boards().len(),
        variants = instantiator.created_variants().len(),
        "Added board"
    );
    Ok(next)
}

/// Drop a board, its variants and their dependents; orders are compacted
pub fn remove_board(ws: &Workspace, board_id: &str) -> Result<Workspace, EngineError> {
    let board = ws.board(board_id)?;

    let mut next = ws.clone();
    for variant in &board.variants {
        if next.contains(variant) {
            next = remove_node(&next, variant)?;
        }
    }
    next.boards.remove(board_id);

    let order: Vec<ComponentId> = next
        .boards_in_order()
        .iter()
        .map(|board| board.id.clone())
        .collect();
    next.assign_board_order(&order);
    Ok(next)
}

/// Move the board at position `from` to position `to`, renumbering 0..n
pub fn reorder_board(ws: &Workspace, from: usize, to: usize) -> Result<Workspace, EngineError> {
    let mut order: Vec<ComponentId> = ws
        .boards_in_order()
        .iter()
        .map(|board| board.id.clone())
        .collect();

    let len = order.len();
    for index in [from, to] {
        if index >= len {
            return Err(MutationError::IndexOutOfRange { index, len }.into());
        }
    }

    let moved = order.remove(from);
    order.insert(to, moved);

    let mut next = ws.clone();
    next.assign_board_order(&order);
    Ok(next)
}

/// Another schema-shaped variant on an existing board
pub fn add_variant(
    ws: &Workspace,
    cx: &Context<'_>,
    component: &str,
    label: Option<&str>,
) -> Result<Workspace, EngineError> {
    ws.board(component)?;

    let mut next = ws.clone();
    let mut instantiator = Instantiator::new(cx.catalog, &cx.config.default_theme);
    let id = instantiator.create_variant(&mut next, component, label.map(str::to_string))?;

    info!(component = %component, variant = %id, "Added variant");
    Ok(next)
}

pub fn remove_variant(ws: &Workspace, variant_id: &str) -> Result<Workspace, EngineError> {
    ws.variant(variant_id)?;
    remove_node(ws, variant_id)
}

/// Deep-merge overrides into a node's own properties
pub fn set_node_properties(
    ws: &Workspace,
    node_id: &str,
    properties: &Properties,
) -> Result<Workspace, EngineError> {
    let mut next = ws.clone();
    next.node_mut(node_id)?.properties.merge(properties);
    Ok(next)
}

/// Drop an own override so resolution falls through to lower layers
pub fn reset_node_property(
    ws: &Workspace,
    node_id: &str,
    path: &PropertyPath,
) -> Result<Workspace, EngineError> {
    let mut next = ws.clone();
    if !next.node_mut(node_id)?.properties.remove(path) {
        debug!(node = %node_id, path = %path, "Nothing to reset");
        return Ok(ws.clone());
    }
    Ok(next)
}

pub fn set_node_theme(
    ws: &Workspace,
    cx: &Context<'_>,
    node_id: &str,
    theme: Option<&str>,
) -> Result<Workspace, EngineError> {
    if let Some(theme) = theme {
        if !cx.theme_exists(theme) {
            return Err(MutationError::UnknownTheme(theme.to_string()).into());
        }
    }

    let mut next = ws.clone();
    next.node_mut(node_id)?.theme = theme.map(str::to_string);
    Ok(next)
}

pub fn set_node_label(ws: &Workspace, node_id: &str, label: &str) -> Result<Workspace, EngineError> {
    let mut next = ws.clone();
    next.node_mut(node_id)?.label = label.to_string();
    Ok(next)
}

pub fn set_board_properties(
    ws: &Workspace,
    board_id: &str,
    properties: &Properties,
) -> Result<Workspace, EngineError> {
    let mut next = ws.clone();
    next.board_mut(board_id)?.properties.merge(properties);
    Ok(next)
}

pub fn set_board_theme(
    ws: &Workspace,
    cx: &Context<'_>,
    board_id: &str,
    theme: &str,
) -> Result<Workspace, EngineError> {
    if !cx.theme_exists(theme) {
        return Err(MutationError::UnknownTheme(theme.to_string()).into());
    }

    let mut next = ws.clone();
    next.board_mut(board_id)?.theme = theme.to_string();
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::reconcile::ReconciliationCache;
    use crate::workspace::LookupError;
    use composer_schema::{Catalog, Property, ThemeSet};

    struct Fixture {
        catalog: Catalog,
        themes: ThemeSet,
        config: EngineConfig,
        cache: ReconciliationCache,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                catalog: Catalog::builtin().unwrap(),
                themes: ThemeSet::builtin().unwrap(),
                config: EngineConfig::default(),
                cache: ReconciliationCache::new(),
            }
        }

        fn cx(&mut self) -> Context<'_> {
            Context::new(&self.catalog, &self.themes, &self.config, &mut self.cache)
        }
    }

    fn board(fx: &mut Fixture, component: &str) -> Workspace {
        add_board(&Workspace::new(), &fx.cx(), component).unwrap()
    }

    #[test]
    fn test_add_board_is_idempotent() {
        let mut fx = Fixture::new();
        let ws = board(&mut fx, "button");
        let again = add_board(&ws, &fx.cx(), "button").unwrap();
        assert_eq!(again, ws);
    }

    #[test]
    fn test_insert_under_locked_parent_is_noop() {
        let mut fx = Fixture::new();
        let ws = board(&mut fx, "button");

        let next = insert_node(
            &ws,
            &mut fx.cx(),
            &NodeSource::New {
                component: "label".to_string(),
            },
            &Target::new("variant-button-default", 0),
        )
        .unwrap();
        assert_eq!(next, ws);
    }

    #[test]
    fn test_insert_new_composite_mirrors_variant() {
        let mut fx = Fixture::new();
        let ws = board(&mut fx, "bar-buttons");
        let before = ws.by_id.len();

        let next = insert_node(
            &ws,
            &mut fx.cx(),
            &NodeSource::New {
                component: "button".to_string(),
            },
            &Target::new("variant-bar-buttons-default", 3),
        )
        .unwrap();

        assert_eq!(next.by_id.len(), before + 3);
        let bar = next.node("variant-bar-buttons-default").unwrap();
        let inserted = next.node(&bar.children[3]).unwrap();
        assert_eq!(inserted.instance_of(), Some("variant-button-default"));
        assert_eq!(inserted.owner(), "variant-bar-buttons-default");
        assert_eq!(inserted.from_schema, Some(false));
    }

    #[test]
    fn test_insert_disallowed_child_is_noop() {
        let mut fx = Fixture::new();
        let ws = board(&mut fx, "bar-buttons");

        let next = insert_node(
            &ws,
            &mut fx.cx(),
            &NodeSource::New {
                component: "label".to_string(),
            },
            &Target::new("variant-bar-buttons-default", 0),
        )
        .unwrap();
        assert_eq!(next, ws);
    }

    #[test]
    fn test_insert_index_out_of_range() {
        let mut fx = Fixture::new();
        let ws = board(&mut fx, "bar-buttons");

        let result = insert_node(
            &ws,
            &mut fx.cx(),
            &NodeSource::New {
                component: "button".to_string(),
            },
            &Target::new("variant-bar-buttons-default", 9),
        );
        assert!(matches!(
            result,
            Err(EngineError::Mutation(MutationError::IndexOutOfRange { index: 9, len: 3 }))
        ));
    }

    #[test]
    fn test_move_into_own_descendant_fails() {
        let mut fx = Fixture::new();
        let ws = board(&mut fx, "table");
        let table = ws.node("variant-table-default").unwrap().clone();
        let row = table.children[0].clone();
        let cell = ws.node(&row).unwrap().children[0].clone();

        let result = move_node(&ws, &fx.cx(), &row, &Target::new(cell.as_str(), 0));
        assert!(matches!(
            result,
            Err(EngineError::Mutation(MutationError::CycleDetected { .. }))
        ));
    }

    #[test]
    fn test_move_between_parents() {
        let mut fx = Fixture::new();
        let ws = board(&mut fx, "table");
        let table = ws.node("variant-table-default").unwrap().clone();
        let (header, body) = (table.children[0].clone(), table.children[1].clone());
        let cell = ws.node(&header).unwrap().children[1].clone();

        let next = move_node(&ws, &fx.cx(), &cell, &Target::new(body.as_str(), 0)).unwrap();
        assert_eq!(next.node(&header).unwrap().children.len(), 1);
        assert_eq!(next.node(&body).unwrap().children[0], cell);
        assert_eq!(next.parent_of(&cell).unwrap().unwrap().id, body);
    }

    #[test]
    fn test_move_out_of_locked_parent_is_noop() {
        let mut fx = Fixture::new();
        let ws = board(&mut fx, "button");
        let ws = add_board(&ws, &fx.cx(), "bar-buttons").unwrap();

        let button = ws.node("variant-button-default").unwrap().clone();
        let bar = ws.node("variant-bar-buttons-default").unwrap().clone();
        let next = move_node(&ws, &fx.cx(), &button.children[0], &Target::new(bar.id.as_str(), 0))
            .unwrap();
        assert_eq!(next, ws);
    }

    #[test]
    fn test_reorder_node() {
        let mut fx = Fixture::new();
        let ws = board(&mut fx, "button");
        let children = ws.node("variant-button-default").unwrap().children.clone();

        let next = reorder_node(&ws, &fx.cx(), &children[1], 0).unwrap();
        assert_eq!(
            next.node("variant-button-default").unwrap().children,
            vec![children[1].clone(), children[0].clone()]
        );

        let result = reorder_node(&ws, &fx.cx(), &children[1], 2);
        assert!(matches!(
            result,
            Err(EngineError::Mutation(MutationError::IndexOutOfRange { index: 2, len: 2 }))
        ));
    }

    #[test]
    fn test_remove_cascades_to_specialisations() {
        let mut fx = Fixture::new();
        let ws = board(&mut fx, "bar-buttons");
        let default_label = ws.node("variant-button-default").unwrap().children[1].clone();

        let next = remove_node(&ws, &default_label).unwrap();
        let labels = next.by_id.values().filter(|n| n.component == "label").count();
        assert_eq!(labels, 0);
        for node in next.by_id.values() {
            for child in &node.children {
                assert!(next.contains(child));
            }
        }
    }

    #[test]
    fn test_remove_last_variant_keeps_board() {
        let mut fx = Fixture::new();
        let ws = board(&mut fx, "button");

        let next = remove_variant(&ws, "variant-button-default").unwrap();
        assert!(next.board("button").unwrap().variants.is_empty());
        assert!(next.by_id.is_empty());
    }

    #[test]
    fn test_remove_variant_requires_variant() {
        let mut fx = Fixture::new();
        let ws = board(&mut fx, "button");
        let child = ws.node("variant-button-default").unwrap().children[0].clone();

        assert!(matches!(
            remove_variant(&ws, &child),
            Err(EngineError::Lookup(LookupError::NotAVariant(_)))
        ));
    }

    #[test]
    fn test_duplicate_variant() {
        let mut fx = Fixture::new();
        let ws = board(&mut fx, "button");

        let next = duplicate_node(&ws, &fx.cx(), "variant-button-default").unwrap();
        let variants = &next.board("button").unwrap().variants;
        assert_eq!(variants.len(), 2);

        let copy = next.variant(&variants[1]).unwrap();
        assert!(!copy.is_default_variant());
        assert_eq!(next.by_id.len(), 6);
        for child in &copy.children {
            assert_eq!(next.node(child).unwrap().owner(), copy.id);
        }
    }

    #[test]
    fn test_reorder_board() {
        let mut fx = Fixture::new();
        let ws = board(&mut fx, "button");

        let next = reorder_board(&ws, 2, 0).unwrap();
        let order: Vec<(&str, u32)> = next
            .boards_in_order()
            .iter()
            .map(|b| (b.id.as_str(), b.order))
            .collect();
        assert_eq!(order, vec![("label", 0), ("button", 1), ("icon", 2)]);
        assert!(reorder_board(&ws, 3, 0).is_err());
    }

    #[test]
    fn test_remove_board_compacts_order() {
        let mut fx = Fixture::new();
        let ws = board(&mut fx, "button");

        let next = remove_board(&ws, "icon").unwrap();
        let orders: Vec<u32> = next.boards_in_order().iter().map(|b| b.order).collect();
        assert_eq!(orders, vec![0, 1]);
        assert_eq!(next.board("label").unwrap().order, 1);
    }

    #[test]
    fn test_add_variant_requires_board() {
        let mut fx = Fixture::new();
        let ws = board(&mut fx, "button");

        let next = add_variant(&ws, &fx.cx(), "button", Some("Ghost")).unwrap();
        let variants = &next.board("button").unwrap().variants;
        assert_eq!(variants.len(), 2);
        assert_eq!(next.node(&variants[1]).unwrap().label, "Ghost");

        assert!(add_variant(&ws, &fx.cx(), "card-product", None).is_err());
    }

    #[test]
    fn test_property_overrides() {
        let mut fx = Fixture::new();
        let ws = board(&mut fx, "button");
        let path = PropertyPath::parse("background.color").unwrap();

        let overrides = Properties::new().with("background.color", Property::exact("#000000"));
        let next = set_node_properties(&ws, "variant-button-default", &overrides).unwrap();
        assert!(next
            .node("variant-button-default")
            .unwrap()
            .properties
            .get(&path)
            .is_some());

        let reset = reset_node_property(&next, "variant-button-default", &path).unwrap();
        assert!(reset.node("variant-button-default").unwrap().properties.is_empty());
        assert_eq!(reset_node_property(&reset, "variant-button-default", &path).unwrap(), reset);
    }

    #[test]
    fn test_unknown_theme_rejected() {
        let mut fx = Fixture::new();
        let ws = board(&mut fx, "button");

        assert!(set_board_theme(&ws, &fx.cx(), "button", "midnight").is_ok());
        assert!(set_node_theme(&ws, &fx.cx(), "variant-button-default", Some("custom")).is_ok());
        assert!(matches!(
            set_board_theme(&ws, &fx.cx(), "button", "light"),
            Err(EngineError::Mutation(MutationError::UnknownTheme(_)))
        ));
    }
}
