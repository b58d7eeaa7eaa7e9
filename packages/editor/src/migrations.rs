//! # Migrations
//!
//! Forward-only, versioned rewrites applied when a document is loaded.
//!
//! ```text
//! stated version ──▶ baseline check ──▶ always-run shape fixes ──▶ v(n+1) … v(CURRENT)
//!                    (board without `component` ⇒ version 0)
//! ```
//!
//! Shape migrations run on every upgrade regardless of version. Versioned
//! migrations run in increasing order for `current < version <= CURRENT_VERSION`
//! and each bumps `workspace.version` on success. Any failure aborts the whole
//! upgrade; no partially migrated document is ever returned.

use crate::workspace::{NodeKind, VariantKind, Workspace};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const CURRENT_VERSION: u32 = 5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MigrationError {
    #[error("Migration `{migration}` (v{version}) failed: {reason}")]
    Versioned {
        migration: &'static str,
        version: u32,
        reason: String,
    },

    #[error("Shape migration `{migration}` failed: {reason}")]
    Shape {
        migration: &'static str,
        reason: String,
    },
}

type Transform = fn(Workspace) -> Result<Workspace, String>;

pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    apply: Transform,
}

pub struct ShapeMigration {
    pub name: &'static str,
    apply: Transform,
}

/// Declared most recent first; executed in reverse
pub static ALWAYS_RUN: &[ShapeMigration] = &[
    ShapeMigration {
        name: "register_orphan_variants",
        apply: register_orphan_variants,
    },
    ShapeMigration {
        name: "normalize_board_order",
        apply: normalize_board_order,
    },
];

pub static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "rename_legacy_themes",
        apply: rename_legacy_themes,
    },
    Migration {
        version: 2,
        name: "add_board_component",
        apply: add_board_component,
    },
    Migration {
        version: 3,
        name: "add_from_schema_flag",
        apply: add_from_schema_flag,
    },
    Migration {
        version: 4,
        name: "pluralize_board_labels",
        apply: pluralize_board_labels,
    },
    Migration {
        version: 5,
        name: "rename_cell_alignment",
        apply: rename_cell_alignment,
    },
];

/// Boards missing the v2 `component` marker predate version metadata
pub fn needs_baseline(workspace: &Workspace) -> bool {
    workspace.boards.values().any(|board| board.component.is_none())
}

/// Version migrations should start from
pub fn effective_version(workspace: &Workspace) -> u32 {
    if needs_baseline(workspace) {
        0
    } else {
        workspace.version
    }
}

pub fn migrate(workspace: Workspace) -> Result<Workspace, MigrationError> {
    let current = effective_version(&workspace);
    if current >= CURRENT_VERSION {
        return Ok(workspace);
    }

    info!(
        stated = workspace.version,
        from = current,
        to = CURRENT_VERSION,
        "Migrating workspace"
    );

    let mut workspace = workspace;
    for migration in ALWAYS_RUN.iter().rev() {
        workspace = (migration.apply)(workspace).map_err(|reason| {
            warn!(migration = migration.name, reason = %reason, "Shape migration failed");
            MigrationError::Shape {
                migration: migration.name,
                reason,
            }
        })?;
        debug!(migration = migration.name, "Applied shape migration");
    }

    for migration in MIGRATIONS
        .iter()
        .filter(|m| m.version > current && m.version <= CURRENT_VERSION)
    {
        workspace = (migration.apply)(workspace).map_err(|reason| {
            warn!(
                migration = migration.name,
                version = migration.version,
                reason = %reason,
                "Migration failed"
            );
            MigrationError::Versioned {
                migration: migration.name,
                version: migration.version,
                reason,
            }
        })?;
        workspace.version = migration.version;
        debug!(migration = migration.name, version = migration.version, "Applied migration");
    }

    workspace.version = CURRENT_VERSION;
    Ok(workspace)
}

/// `Button` → `Buttons`, `Gallery` → `Galleries`; already plural stays put
pub fn pluralize(label: &str) -> String {
    if label.is_empty() || label.ends_with('s') {
        return label.to_string();
    }
    if let Some(stem) = label.strip_suffix('y') {
        let before = stem.chars().last();
        if before.map_or(false, |c| !"aeiouAEIOU".contains(c)) {
            return format!("{}ies", stem);
        }
    }
    format!("{}s", label)
}

fn normalize_board_order(mut workspace: Workspace) -> Result<Workspace, String> {
    let order: Vec<String> = workspace
        .boards_in_order()
        .iter()
        .map(|board| board.id.clone())
        .collect();
    workspace.assign_board_order(&order);
    Ok(workspace)
}

fn register_orphan_variants(mut workspace: Workspace) -> Result<Workspace, String> {
    let listed: HashSet<String> = workspace
        .boards
        .values()
        .flat_map(|board| board.variants.iter().cloned())
        .collect();

    let orphans: Vec<(String, String)> = workspace
        .by_id
        .values()
        .filter(|node| node.is_variant() && !listed.contains(&node.id))
        .map(|node| (node.id.clone(), node.component.clone()))
        .collect();

    for (variant, component) in orphans {
        if !workspace.boards.contains_key(&component) {
            let order = workspace.next_board_order();
            let board = crate::workspace::Board::new(&component, pluralize(&component), order);
            workspace.boards.insert(component.clone(), board);
        }
        if let Some(board) = workspace.boards.get_mut(&component) {
            debug!(variant = %variant, board = %component, "Registered orphan variant");
            board.variants.push(variant);
        }
    }
    Ok(workspace)
}

/// Legacy theme ids and their current names
const LEGACY_THEMES: &[(&str, &str)] = &[("light", "default"), ("dark", "midnight")];
const KNOWN_THEMES: &[&str] = &["default", "midnight", "custom"];

fn rename_theme(theme: &str, owner: &str) -> Result<String, String> {
    if let Some((_, renamed)) = LEGACY_THEMES.iter().find(|(legacy, _)| *legacy == theme) {
        return Ok(renamed.to_string());
    }
    if KNOWN_THEMES.contains(&theme) {
        return Ok(theme.to_string());
    }
    Err(format!("unsupported legacy theme `{}` on `{}`", theme, owner))
}

fn rename_legacy_themes(mut workspace: Workspace) -> Result<Workspace, String> {
    for board in workspace.boards.values_mut() {
        board.theme = rename_theme(&board.theme, &board.id)?;
    }
    for node in workspace.by_id.values_mut() {
        if let Some(theme) = &node.theme {
            node.theme = Some(rename_theme(theme, &node.id)?);
        }
    }
    Ok(workspace)
}

fn add_board_component(mut workspace: Workspace) -> Result<Workspace, String> {
    for board in workspace.boards.values_mut() {
        if board.component.is_none() {
            board.component = Some(board.id.clone());
        }
    }
    Ok(workspace)
}

/// Variants: default ones came from the schema. Instances: follow their variant.
fn add_from_schema_flag(mut workspace: Workspace) -> Result<Workspace, String> {
    let mut variant_flags: BTreeMap<String, bool> = BTreeMap::new();
    for node in workspace.by_id.values_mut() {
        if let NodeKind::Variant { kind } = node.kind {
            let flag = *node.from_schema.get_or_insert(kind == VariantKind::Default);
            variant_flags.insert(node.id.clone(), flag);
        }
    }

    for node in workspace.by_id.values_mut() {
        if node.from_schema.is_none() {
            let flag = variant_flags.get(node.owner()).copied().unwrap_or(false);
            node.from_schema = Some(flag);
        }
    }
    Ok(workspace)
}

fn pluralize_board_labels(mut workspace: Workspace) -> Result<Workspace, String> {
    for board in workspace.boards.values_mut() {
        board.label = pluralize(&board.label);
    }
    Ok(workspace)
}

fn rename_cell_alignment(mut workspace: Workspace) -> Result<Workspace, String> {
    for board in workspace.boards.values_mut() {
        board.properties.rename_key("cellAlignment", "cellAlign");
    }
    for node in workspace.by_id.values_mut() {
        node.properties.rename_key("cellAlignment", "cellAlign");
    }
    Ok(workspace)
}
