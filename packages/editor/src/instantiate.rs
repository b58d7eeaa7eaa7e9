//! # Instantiation
//!
//! Materializes schema templates into workspace nodes.
//!
//! - A **default variant** is synthesized from a schema's child slots: one
//!   instance per slot, recursively.
//! - A slot whose component is composite becomes an instance that mirrors
//!   that component's matching variant (each mirrored node specialises its
//!   source through `instanceOf`).
//! - A slot whose component is primitive becomes a bare instance; its board
//!   is created without variants.
//! - `nestedOverrides` are written onto the generated descendants. Keys are
//!   dotted role paths; a segment is a component id or its camelCase form,
//!   optionally suffixed with a 1-based index (`tableData2`).

use crate::errors::EngineError;
use crate::id_generator::{default_variant_id, IdGenerator};
use crate::migrations::pluralize;
use crate::mutations::MutationError;
use crate::reconcile::find_matching_variant;
use crate::workspace::{Board, ComponentId, LookupError, Node, NodeId, VariantKind, Workspace};
use composer_schema::{ChildSlot, Properties, SchemaCatalog, SchemaError, Structure};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub struct Instantiator<'a> {
    catalog: &'a dyn SchemaCatalog,
    default_theme: &'a str,
    ids: IdGenerator,
    in_progress: Vec<ComponentId>,
    created_variants: Vec<NodeId>,
    created_boards: Vec<ComponentId>,
}

impl<'a> Instantiator<'a> {
    pub fn new(catalog: &'a dyn SchemaCatalog, default_theme: &'a str) -> Self {
        Self {
            catalog,
            default_theme,
            ids: IdGenerator::new(),
            in_progress: Vec::new(),
            created_variants: Vec::new(),
            created_boards: Vec::new(),
        }
    }

    pub fn created_variants(&self) -> &[NodeId] {
        &self.created_variants
    }

    pub fn created_boards(&self) -> &[ComponentId] {
        &self.created_boards
    }

    /// Board plus default variant; `false` when the board already exists
    pub fn add_board(&mut self, ws: &mut Workspace, component: &str) -> Result<bool, EngineError> {
        if ws.boards.contains_key(component) {
            debug!(component = %component, "Board already exists");
            return Ok(false);
        }

        self.catalog.component_schema(component)?;
        self.ensure_board(ws, component)?;
        self.create_variant(ws, component, None)?;
        Ok(true)
    }

    /// Board without variants, appended after the current last board
    pub fn ensure_board(&mut self, ws: &mut Workspace, component: &str) -> Result<(), EngineError> {
        if ws.boards.contains_key(component) {
            return Ok(());
        }

        let schema = self.catalog.component_schema(component)?;
        let mut board = Board::new(component, pluralize(&schema.name), ws.next_board_order());
        board.theme = self.default_theme.to_string();

        debug!(component = %component, order = board.order, "Created board");
        ws.boards.insert(component.to_string(), board);
        self.created_boards.push(component.to_string());
        Ok(())
    }

    /// New variant built from the schema's slots
    pub fn create_variant(
        &mut self,
        ws: &mut Workspace,
        component: &str,
        label: Option<String>,
    ) -> Result<NodeId, EngineError> {
        let catalog = self.catalog;
        let schema = catalog.component_schema(component)?;

        let id = self.begin_variant(ws, component, schema.level, label)?;
        let mut children = Vec::with_capacity(schema.slots().len());
        for slot in schema.slots() {
            children.push(self.instantiate_slot(ws, slot, &id, &id)?);
        }
        self.finish_variant(ws, &id, children)?;
        Ok(id)
    }

    /// Variant of `component` whose live shape is `structure`, reusing one
    /// when it exists
    pub fn ensure_structure_variant(
        &mut self,
        ws: &mut Workspace,
        component: &str,
        structure: &Structure,
    ) -> Result<NodeId, EngineError> {
        if structure.component != component {
            return Err(MutationError::InvalidStructure(format!(
                "structure rooted at `{}` requested for `{}`",
                structure.component, component
            ))
            .into());
        }

        let schema_shape = self.catalog.required_structure(component)?;
        self.ensure_board(ws, component)?;

        if let Some(existing) = find_matching_variant(ws, component, structure)? {
            return Ok(existing);
        }
        if *structure == schema_shape {
            return self.create_variant(ws, component, None);
        }

        let catalog = self.catalog;
        let schema = catalog.component_schema(component)?;
        let id = self.begin_variant(ws, component, schema.level, None)?;
        let mut children = Vec::with_capacity(structure.children.len());
        for (index, shape) in structure.children.iter().enumerate() {
            let slot = schema
                .slots()
                .get(index)
                .filter(|slot| slot.component == shape.component);
            children.push(self.instantiate_structure(ws, shape, slot, &id, &id)?);
        }
        self.finish_variant(ws, &id, children)?;
        Ok(id)
    }

    /// New instance of `component` owned by `owner`.
    ///
    /// Composite components mirror their matching variant (created on
    /// demand); primitives specialise a leaf variant when one exists, else
    /// `parent`.
    pub fn instantiate_component(
        &mut self,
        ws: &mut Workspace,
        component: &str,
        parent: &str,
        owner: &str,
        from_schema: bool,
    ) -> Result<NodeId, EngineError> {
        let catalog = self.catalog;
        let schema = catalog.component_schema(component)?;

        if schema.is_primitive() {
            self.ensure_board(ws, component)?;
            let template = find_matching_variant(ws, component, &Structure::leaf(component))?;
            let instance_of = template.unwrap_or_else(|| parent.to_string());

            let id = self.ids.fresh_id(component, ws);
            let node = Node::instance(&id, component, owner, instance_of)
                .with_level(schema.level)
                .with_label(schema.name.clone())
                .with_from_schema(from_schema);
            ws.by_id.insert(id.clone(), node);
            return Ok(id);
        }

        let source = self.default_variant_for(ws, component)?;
        self.instantiate_variant(ws, &source, owner, from_schema)
    }

    /// Instance mirroring `source` and its whole subtree
    pub fn instantiate_variant(
        &mut self,
        ws: &mut Workspace,
        source: &str,
        owner: &str,
        from_schema: bool,
    ) -> Result<NodeId, EngineError> {
        let template = ws.node(source)?.clone();
        let label = self
            .catalog
            .get(&template.component)
            .map(|schema| schema.name.clone())
            .unwrap_or_else(|| template.label.clone());

        let id = self.ids.fresh_id(&template.component, ws);
        let node = Node::instance(&id, &template.component, owner, source)
            .with_level(template.level)
            .with_label(label)
            .with_from_schema(from_schema);
        ws.by_id.insert(id.clone(), node);

        let mut children = Vec::with_capacity(template.children.len());
        for child in &template.children {
            children.push(self.mirror(ws, child, owner, from_schema)?);
        }
        ws.node_mut(&id)?.children = children;
        Ok(id)
    }

    fn mirror(
        &mut self,
        ws: &mut Workspace,
        source: &str,
        owner: &str,
        from_schema: bool,
    ) -> Result<NodeId, EngineError> {
        let template = ws.node(source)?.clone();

        let id = self.ids.fresh_id(&template.component, ws);
        let node = Node::instance(&id, &template.component, owner, source)
            .with_level(template.level)
            .with_label(template.label.clone())
            .with_from_schema(from_schema);
        ws.by_id.insert(id.clone(), node);

        let mut children = Vec::with_capacity(template.children.len());
        for child in &template.children {
            children.push(self.mirror(ws, child, owner, from_schema)?);
        }
        ws.node_mut(&id)?.children = children;
        Ok(id)
    }

    fn instantiate_slot(
        &mut self,
        ws: &mut Workspace,
        slot: &ChildSlot,
        parent: &str,
        owner: &str,
    ) -> Result<NodeId, EngineError> {
        let id = self.instantiate_component(ws, &slot.component, parent, owner, true)?;
        apply_slot(ws, &id, slot)?;
        Ok(id)
    }

    fn instantiate_structure(
        &mut self,
        ws: &mut Workspace,
        shape: &Structure,
        slot: Option<&ChildSlot>,
        parent: &str,
        owner: &str,
    ) -> Result<NodeId, EngineError> {
        let catalog = self.catalog;
        let schema = catalog.component_schema(&shape.component)?;

        let id = if shape.children.is_empty() && schema.is_primitive() {
            self.instantiate_component(ws, &shape.component, parent, owner, true)?
        } else {
            let source = self.ensure_structure_variant(ws, &shape.component, shape)?;
            self.instantiate_variant(ws, &source, owner, true)?
        };

        if let Some(slot) = slot {
            apply_slot(ws, &id, slot)?;
        }
        Ok(id)
    }

    /// Variant matching the schema shape of a composite component
    fn default_variant_for(&mut self, ws: &mut Workspace, component: &str) -> Result<NodeId, EngineError> {
        if self.in_progress.iter().any(|c| c == component) {
            return Err(SchemaError::Cycle(component.to_string()).into());
        }

        let shape = self.catalog.required_structure(component)?;
        self.ensure_board(ws, component)?;

        match find_matching_variant(ws, component, &shape)? {
            Some(existing) => Ok(existing),
            None => self.create_variant(ws, component, None),
        }
    }

    /// Insert the variant root (childless) and list it on its board
    fn begin_variant(
        &mut self,
        ws: &mut Workspace,
        component: &str,
        level: u32,
        label: Option<String>,
    ) -> Result<NodeId, EngineError> {
        if self.in_progress.iter().any(|c| c == component) {
            return Err(SchemaError::Cycle(component.to_string()).into());
        }
        self.ensure_board(ws, component)?;

        let id = self.ids.variant_id(component, ws);
        let board = ws.board(component)?;
        let has_default = board.variants.iter().any(|variant| {
            ws.by_id
                .get(variant)
                .map_or(false, |node| node.is_default_variant())
        });
        let kind = if !has_default && id == default_variant_id(component) {
            VariantKind::Default
        } else {
            VariantKind::Variant
        };
        let label = label.unwrap_or_else(|| match kind {
            VariantKind::Default => "Default".to_string(),
            VariantKind::Variant => format!("Variant {}", board.variants.len() + 1),
        });

        let node = Node::variant(&id, component, kind)
            .with_level(level)
            .with_label(label)
            .with_from_schema(true);
        ws.by_id.insert(id.clone(), node);
        ws.board_mut(component)?.variants.push(id.clone());

        self.in_progress.push(component.to_string());
        Ok(id)
    }

    fn finish_variant(
        &mut self,
        ws: &mut Workspace,
        id: &str,
        children: Vec<NodeId>,
    ) -> Result<(), EngineError> {
        self.in_progress.pop();
        ws.node_mut(id)?.children = children;

        debug!(variant = %id, "Created variant");
        self.created_variants.push(id.to_string());
        Ok(())
    }
}

/// Role label, slot properties and nested overrides of a schema slot
fn apply_slot(ws: &mut Workspace, id: &str, slot: &ChildSlot) -> Result<(), LookupError> {
    let node = ws.node_mut(id)?;
    if let Some(role) = &slot.role {
        node.label = role.clone();
    }
    node.properties.merge(&slot.properties);
    apply_nested_overrides(ws, id, &slot.nested_overrides)
}

/// Merge each override onto the descendant of `root` its role key names
pub fn apply_nested_overrides(
    ws: &mut Workspace,
    root: &str,
    overrides: &BTreeMap<String, Properties>,
) -> Result<(), LookupError> {
    for (key, properties) in overrides {
        match locate_role(ws, root, key)? {
            Some(target) => ws.node_mut(&target)?.properties.merge(properties),
            None => warn!(root = %root, key = %key, "Nested override matched no descendant"),
        }
    }
    Ok(())
}

/// Follow a dotted role key from `root` down to a descendant
pub fn locate_role(ws: &Workspace, root: &str, key: &str) -> Result<Option<NodeId>, LookupError> {
    let mut current = root.to_string();
    for segment in key.split('.') {
        match child_by_role(ws, &current, segment)? {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

fn child_by_role(ws: &Workspace, parent: &str, segment: &str) -> Result<Option<NodeId>, LookupError> {
    let children = ws.children(parent)?;

    if let Some(found) = children.iter().find(|c| role_matches(segment, &c.component)) {
        return Ok(Some(found.id.clone()));
    }

    let base = segment.trim_end_matches(|ch: char| ch.is_ascii_digit());
    if base.is_empty() || base.len() == segment.len() {
        return Ok(None);
    }
    let position: usize = match segment[base.len()..].parse() {
        Ok(position) if position > 0 => position,
        _ => return Ok(None),
    };

    Ok(children
        .iter()
        .filter(|c| role_matches(base, &c.component))
        .nth(position - 1)
        .map(|c| c.id.clone()))
}

fn role_matches(key: &str, component: &str) -> bool {
    key == component || key == role_key(component)
}

/// `table-data` → `tableData`
pub fn role_key(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    let mut upper = false;
    for ch in component.chars() {
        if ch == '-' || ch == '_' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use composer_schema::{Catalog, ComponentSchema, PropertyPath};

    fn content(ws: &Workspace, id: &str) -> Option<String> {
        ws.node(id)
            .unwrap()
            .properties
            .get(&PropertyPath::parse("content").unwrap())
            .map(|p| format!("{:?}", p))
    }

    #[test]
    fn test_role_key() {
        assert_eq!(role_key("table-data"), "tableData");
        assert_eq!(role_key("label"), "label");
        assert_eq!(role_key("bar-buttons"), "barButtons");
    }

    #[test]
    fn test_add_button_board() {
        let catalog = Catalog::builtin().unwrap();
        let mut ws = Workspace::new();
        let mut inst = Instantiator::new(&catalog, "default");

        assert!(inst.add_board(&mut ws, "button").unwrap());
        assert_eq!(ws.by_id.len(), 3);

        let boards: Vec<(&str, u32)> = ws
            .boards_in_order()
            .iter()
            .map(|b| (b.id.as_str(), b.order))
            .collect();
        assert_eq!(boards, vec![("button", 0), ("icon", 1), ("label", 2)]);
        assert!(ws.board("icon").unwrap().variants.is_empty());

        let variant = ws.variant("variant-button-default").unwrap();
        assert_eq!(variant.children.len(), 2);
        let label = ws.node(&variant.children[1]).unwrap();
        assert_eq!(label.label, "Label");
        assert_eq!(label.instance_of(), Some("variant-button-default"));
        assert!(content(&ws, &variant.children[1]).unwrap().contains("Button"));

        assert!(!inst.add_board(&mut ws, "button").unwrap());
    }

    #[test]
    fn test_composite_slot_mirrors_variant() {
        let catalog = Catalog::builtin().unwrap();
        let mut ws = Workspace::new();
        let mut inst = Instantiator::new(&catalog, "default");
        inst.add_board(&mut ws, "bar-buttons").unwrap();

        let bar = ws.variant("variant-bar-buttons-default").unwrap().clone();
        assert_eq!(bar.children.len(), 3);

        let first = ws.node(&bar.children[0]).unwrap();
        assert_eq!(first.instance_of(), Some("variant-button-default"));
        assert_eq!(first.owner(), "variant-bar-buttons-default");

        let label = locate_role(&ws, &bar.children[0], "label").unwrap().unwrap();
        assert!(content(&ws, &label).unwrap().contains("Add"));
        let label = locate_role(&ws, &bar.children[2], "label").unwrap().unwrap();
        assert_eq!(content(&ws, &label), None);
    }

    #[test]
    fn test_indexed_role_keys() {
        let catalog = Catalog::builtin().unwrap();
        let mut ws = Workspace::new();
        let mut inst = Instantiator::new(&catalog, "default");
        inst.add_board(&mut ws, "table").unwrap();

        let table = ws.variant("variant-table-default").unwrap().clone();
        let header = &table.children[0];
        assert_eq!(ws.node(header).unwrap().label, "Header");

        let first = locate_role(&ws, header, "tableData.label").unwrap().unwrap();
        let second = locate_role(&ws, header, "tableData2.label").unwrap().unwrap();
        assert!(content(&ws, &first).unwrap().contains("Name"));
        assert!(content(&ws, &second).unwrap().contains("Price"));
        assert_eq!(locate_role(&ws, header, "tableData3").unwrap(), None);
    }

    #[test]
    fn test_schema_cycle_is_an_error() {
        let catalog = Catalog::new()
            .with(ComponentSchema::new("a", "A").with_children(vec![ChildSlot::new("b")]))
            .with(ComponentSchema::new("b", "B").with_children(vec![ChildSlot::new("a")]));
        let mut ws = Workspace::new();
        let mut inst = Instantiator::new(&catalog, "default");

        assert!(matches!(
            inst.add_board(&mut ws, "a"),
            Err(EngineError::Schema(SchemaError::Cycle(_)))
        ));
    }
}
