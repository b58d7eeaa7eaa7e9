//! # Schema–Workspace Reconciliation
//!
//! Decides whether a required component-tree shape already exists as a
//! variant in the workspace, or has to be synthesized.
//!
//! Matching compares the component-id tree only (ids, count and order of
//! children, recursively); property values never participate.
//!
//! ## Caching
//!
//! Results are memoized in a [`ReconciliationCache`] keyed by
//! `(component, workspace.version, fingerprint of the component's variants,
//! fingerprint of the required shape)`. The cache is an injected collaborator:
//! the pipeline owns one, tests create their own.

use crate::actions::{NodeSource, Op};
use crate::context::Context;
use crate::errors::EngineError;
use crate::id_generator::IdGenerator;
use crate::instantiate::Instantiator;
use crate::workspace::{ComponentId, LookupError, NodeId, Workspace};
use composer_schema::{SchemaCatalog, SchemaError, Structure};
use crc32fast::Hasher;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use tracing::{debug, instrument};

/// Component → shape needed by a batch of actions
pub type RequiredStructures = BTreeMap<ComponentId, Structure>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    /// Required shape is the schema's own default shape
    pub use_schema: bool,
    pub structure: Structure,
    pub needs_new_variant: bool,
    /// Matching variant, or the id a new variant would get
    pub suggested_variant_id: NodeId,
}

/// Bucket key; entries inside a bucket are confirmed against their inputs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub component: ComponentId,
    pub version: u32,
    pub variants_fingerprint: u32,
    pub required_fingerprint: u32,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    required: Structure,
    /// Live shape of every variant inspected to produce `result`
    variants: Vec<(NodeId, Structure)>,
    result: Reconciliation,
}

#[derive(Debug, Clone)]
struct AnalysisEntry {
    fingerprint: u32,
    ops: Vec<Op>,
    required: RequiredStructures,
}

/// Batches remembered by [`analyze_required_structures`]; oldest go first
pub const ANALYSIS_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub analysis_entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Clone)]
pub struct ReconciliationCache {
    entries: HashMap<CacheKey, Vec<CacheEntry>>,
    analyses: VecDeque<AnalysisEntry>,
    hits: u64,
    misses: u64,
    memoize: bool,
}

impl Default for ReconciliationCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconciliationCache {
    pub fn new() -> Self {
        Self::with_memoization(true)
    }

    /// A non-memoizing cache still counts misses
    pub fn with_memoization(memoize: bool) -> Self {
        Self {
            entries: HashMap::new(),
            analyses: VecDeque::new(),
            hits: 0,
            misses: 0,
            memoize,
        }
    }

    pub fn is_memoizing(&self) -> bool {
        self.memoize
    }

    /// Drop everything, counters included
    pub fn clear(&mut self) {
        self.entries.clear();
        self.analyses.clear();
        self.hits = 0;
        self.misses = 0;
    }

    /// Drop entries whose result depended on `variant_id`
    pub fn invalidate_variant(&mut self, variant_id: &str) -> usize {
        let before = self.len();
        for bucket in self.entries.values_mut() {
            bucket.retain(|entry| {
                entry.result.suggested_variant_id != variant_id
                    && !entry.variants.iter().any(|(v, _)| v == variant_id)
            });
        }
        self.entries.retain(|_, bucket| !bucket.is_empty());
        before - self.len()
    }

    pub fn invalidate_component(&mut self, component: &str) -> usize {
        let before = self.len();
        self.entries.retain(|key, _| key.component != component);
        before - self.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            analysis_entries: self.analyses.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }

    pub fn contains_component(&self, component: &str) -> bool {
        self.entries.keys().any(|key| key.component == component)
    }

    fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    fn lookup(
        &mut self,
        key: &CacheKey,
        required: &Structure,
        variants: &[(NodeId, Structure)],
    ) -> Option<Reconciliation> {
        let found = if self.memoize {
            self.entries.get(key).and_then(|bucket| {
                bucket
                    .iter()
                    .find(|entry| entry.required == *required && entry.variants == variants)
                    .map(|entry| entry.result.clone())
            })
        } else {
            None
        };
        match found {
            Some(_) => self.hits += 1,
            None => self.misses += 1,
        }
        found
    }

    fn store(&mut self, key: CacheKey, entry: CacheEntry) {
        if self.memoize {
            self.entries.entry(key).or_default().push(entry);
        }
    }

    fn lookup_analysis(&mut self, fingerprint: u32, ops: &[Op]) -> Option<RequiredStructures> {
        let found = if self.memoize {
            self.analyses
                .iter()
                .find(|entry| entry.fingerprint == fingerprint && entry.ops == ops)
                .map(|entry| entry.required.clone())
        } else {
            None
        };
        match found {
            Some(_) => self.hits += 1,
            None => self.misses += 1,
        }
        found
    }

    fn store_analysis(&mut self, fingerprint: u32, ops: &[Op], required: RequiredStructures) {
        if !self.memoize {
            return;
        }
        if self.analyses.len() >= ANALYSIS_CAPACITY {
            self.analyses.pop_front();
        }
        self.analyses.push_back(AnalysisEntry {
            fingerprint,
            ops: ops.to_vec(),
            required,
        });
    }
}

/// Component-id shape of a live subtree
pub fn live_structure(workspace: &Workspace, id: &str) -> Result<Structure, LookupError> {
    let mut visiting = HashSet::new();
    live_structure_inner(workspace, id, &mut visiting)
}

fn live_structure_inner(
    workspace: &Workspace,
    id: &str,
    visiting: &mut HashSet<String>,
) -> Result<Structure, LookupError> {
    let node = workspace.node(id)?;
    if !visiting.insert(id.to_string()) {
        return Ok(Structure::leaf(node.component.clone()));
    }

    let mut children = Vec::with_capacity(node.children.len());
    for child in &node.children {
        children.push(live_structure_inner(workspace, child, visiting)?);
    }

    visiting.remove(id);
    Ok(Structure::new(node.component.clone(), children))
}

pub fn fingerprint(structure: &Structure) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(structure.to_string().as_bytes());
    hasher.finalize()
}

/// Every variant of `component` with its live shape, plus a fingerprint over them
pub fn variants_fingerprint(
    workspace: &Workspace,
    component: &str,
) -> Result<(u32, Vec<(NodeId, Structure)>), LookupError> {
    let mut hasher = Hasher::new();
    let ids: &[NodeId] = match workspace.boards.get(component) {
        Some(board) => board.variants.as_slice(),
        None => &[],
    };

    let mut variants = Vec::with_capacity(ids.len());
    for variant in ids {
        let shape = live_structure(workspace, variant)?;
        hasher.update(variant.as_bytes());
        hasher.update(b"=");
        hasher.update(shape.to_string().as_bytes());
        hasher.update(b";");
        variants.push((variant.clone(), shape));
    }

    Ok((hasher.finalize(), variants))
}

/// First variant of `component` whose live shape equals `required`.
/// The default variant is preferred.
pub fn find_matching_variant(
    workspace: &Workspace,
    component: &str,
    required: &Structure,
) -> Result<Option<NodeId>, LookupError> {
    let Some(board) = workspace.boards.get(component) else {
        return Ok(None);
    };

    let mut candidates: Vec<&NodeId> = board.variants.iter().collect();
    candidates.sort_by_key(|id| {
        !workspace
            .by_id
            .get(id.as_str())
            .map_or(false, |node| node.is_default_variant())
    });

    for variant in candidates {
        if live_structure(workspace, variant)? == *required {
            return Ok(Some(variant.clone()));
        }
    }
    Ok(None)
}

/// Reconcile `component` against the shape its schema requires
pub fn reconcile(
    component: &str,
    workspace: &Workspace,
    catalog: &dyn SchemaCatalog,
    cache: &mut ReconciliationCache,
) -> Result<Reconciliation, EngineError> {
    let required = catalog.required_structure(component)?;
    reconcile_structure(component, &required, workspace, catalog, cache)
}

/// Reconcile `component` against an arbitrary required shape
#[instrument(skip(required, workspace, catalog, cache))]
pub fn reconcile_structure(
    component: &str,
    required: &Structure,
    workspace: &Workspace,
    catalog: &dyn SchemaCatalog,
    cache: &mut ReconciliationCache,
) -> Result<Reconciliation, EngineError> {
    let (variants_fingerprint, variants) = variants_fingerprint(workspace, component)?;
    let key = CacheKey {
        component: component.to_string(),
        version: workspace.version,
        variants_fingerprint,
        required_fingerprint: fingerprint(required),
    };

    if let Some(hit) = cache.lookup(&key, required, &variants) {
        debug!("Reconciliation cache hit");
        return Ok(hit);
    }

    let use_schema = catalog.required_structure(component)? == *required;
    let result = match find_matching_variant(workspace, component, required)? {
        Some(existing) => Reconciliation {
            use_schema,
            structure: required.clone(),
            needs_new_variant: false,
            suggested_variant_id: existing,
        },
        None => {
            let mut ids = IdGenerator::new();
            Reconciliation {
                use_schema,
                structure: required.clone(),
                needs_new_variant: true,
                suggested_variant_id: ids.variant_id(component, workspace),
            }
        }
    };

    debug!(
        needs_new_variant = result.needs_new_variant,
        suggested = %result.suggested_variant_id,
        "Reconciled component"
    );
    cache.store(
        key,
        CacheEntry {
            required: required.clone(),
            variants,
            result: result.clone(),
        },
    );
    Ok(result)
}

/// Minimal component → shape map a batch of ops needs in place.
///
/// Memoized by the batch content, for the last [`ANALYSIS_CAPACITY`] batches.
pub fn analyze_required_structures(
    ops: &[Op],
    catalog: &dyn SchemaCatalog,
    cache: &mut ReconciliationCache,
) -> Result<RequiredStructures, SchemaError> {
    let mut hasher = Hasher::new();
    hasher.update(format!("{:?}", ops).as_bytes());
    let key = hasher.finalize();

    if let Some(hit) = cache.lookup_analysis(key, ops) {
        return Ok(hit);
    }

    let mut required = RequiredStructures::new();
    for op in ops {
        collect_required(op, catalog, &mut required)?;
    }

    debug!(components = required.len(), "Analyzed required structures");
    cache.store_analysis(key, ops, required.clone());
    Ok(required)
}

fn collect_required(
    op: &Op,
    catalog: &dyn SchemaCatalog,
    required: &mut RequiredStructures,
) -> Result<(), SchemaError> {
    match op {
        Op::AddBoard { component } | Op::AddVariant { component, .. } => {
            let shape = catalog.required_structure(component)?;
            collect_composites(&shape, required);
            required.insert(component.clone(), shape);
        }
        Op::InsertNode {
            source: NodeSource::New { component },
            ..
        } => {
            let shape = catalog.required_structure(component)?;
            if !shape.children.is_empty() {
                collect_composites(&shape, required);
                required.insert(component.clone(), shape);
            }
        }
        Op::Batch(ops) => {
            for op in ops {
                collect_required(op, catalog, required)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn collect_composites(shape: &Structure, required: &mut RequiredStructures) {
    for child in &shape.children {
        if !child.children.is_empty() {
            required
                .entry(child.component.clone())
                .or_insert_with(|| child.clone());
            collect_composites(child, required);
        }
    }
}

/// Synthesize a variant for every required shape that no variant satisfies.
///
/// Returns the new workspace and the ids of every variant created, child
/// variants included.
pub fn create_missing_variants(
    workspace: &Workspace,
    required: &RequiredStructures,
    cx: &mut Context<'_>,
) -> Result<(Workspace, Vec<NodeId>), EngineError> {
    let catalog = cx.catalog;
    let config = cx.config;
    let mut next = workspace.clone();
    let mut created = Vec::new();

    // Larger shapes first: their synthesis usually satisfies the smaller ones
    let mut pending: Vec<(&ComponentId, &Structure)> = required.iter().collect();
    pending.sort_by(|a, b| {
        b.1.node_count()
            .cmp(&a.1.node_count())
            .then_with(|| a.0.cmp(b.0))
    });

    for (component, shape) in pending {
        let found = reconcile_structure(component, shape, &next, catalog, cx.cache)?;
        if !found.needs_new_variant {
            debug!(component = %component, "Required structure already satisfied");
            continue;
        }

        let mut instantiator = Instantiator::new(catalog, &config.default_theme);
        instantiator.ensure_structure_variant(&mut next, component, shape)?;

        let touched: BTreeSet<&str> = instantiator
            .created_variants()
            .iter()
            .filter_map(|id| next.by_id.get(id).map(|node| node.component.as_str()))
            .collect();
        for touched_component in touched {
            cx.cache.invalidate_component(touched_component);
        }
        created.extend(instantiator.created_variants().iter().cloned());
    }

    Ok((next, created))
}

/// Drop cache entries made stale by the `previous` → `next` transition
pub fn invalidate_changes(cache: &mut ReconciliationCache, previous: &Workspace, next: &Workspace) {
    if previous.version != next.version {
        cache.clear();
        return;
    }

    let components: BTreeSet<&String> = previous.boards.keys().chain(next.boards.keys()).collect();
    for component in components {
        let before = previous.boards.get(component).map(|b| &b.variants);
        let after = next.boards.get(component).map(|b| &b.variants);
        if before != after {
            cache.invalidate_component(component);
            continue;
        }

        for variant in after.into_iter().flatten() {
            let old = live_structure(previous, variant).ok();
            let new = live_structure(next, variant).ok();
            if old != new {
                cache.invalidate_variant(variant);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::instantiate::Instantiator;
    use crate::workspace::Node;
    use composer_schema::{Catalog, ThemeSet};

    fn with_button() -> (Catalog, Workspace) {
        let catalog = Catalog::builtin().unwrap();
        let mut ws = Workspace::new();
        let mut instantiator = Instantiator::new(&catalog, "default");
        instantiator.add_board(&mut ws, "button").unwrap();
        (catalog, ws)
    }

    #[test]
    fn test_reuses_matching_variant() {
        let (catalog, ws) = with_button();
        let mut cache = ReconciliationCache::new();

        let result = reconcile("button", &ws, &catalog, &mut cache).unwrap();
        assert!(result.use_schema);
        assert!(!result.needs_new_variant);
        assert_eq!(result.suggested_variant_id, "variant-button-default");
        assert_eq!(result.structure.to_string(), "button(icon,label)");
    }

    #[test]
    fn test_missing_board_needs_variant() {
        let catalog = Catalog::builtin().unwrap();
        let ws = Workspace::new();
        let mut cache = ReconciliationCache::new();

        let result = reconcile("card-product", &ws, &catalog, &mut cache).unwrap();
        assert!(result.needs_new_variant);
        assert_eq!(result.suggested_variant_id, "variant-card-product-default");
    }

    #[test]
    fn test_custom_structure_does_not_use_schema() {
        let (catalog, ws) = with_button();
        let mut cache = ReconciliationCache::new();
        let shape = Structure::new("button", vec![Structure::leaf("label")]);

        let result = reconcile_structure("button", &shape, &ws, &catalog, &mut cache).unwrap();
        assert!(!result.use_schema);
        assert!(result.needs_new_variant);
        assert_eq!(result.suggested_variant_id, "variant-button-1");
    }

    #[test]
    fn test_cache_hit_does_not_grow() {
        let (catalog, ws) = with_button();
        let mut cache = ReconciliationCache::new();

        let first = reconcile("button", &ws, &catalog, &mut cache).unwrap();
        let size = cache.stats().entries;
        let second = reconcile("button", &ws, &catalog, &mut cache).unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.stats().entries, size);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_invalidate_component() {
        let (catalog, ws) = with_button();
        let mut cache = ReconciliationCache::new();

        reconcile("button", &ws, &catalog, &mut cache).unwrap();
        reconcile("label", &ws, &catalog, &mut cache).unwrap();
        assert_eq!(cache.invalidate_component("button"), 1);
        assert!(!cache.contains_component("button"));
        assert!(cache.contains_component("label"));

        reconcile("button", &ws, &catalog, &mut cache).unwrap();
        assert_eq!(cache.stats().misses, 3);
    }

    #[test]
    fn test_invalidate_variant() {
        let (catalog, ws) = with_button();
        let mut cache = ReconciliationCache::new();

        reconcile("button", &ws, &catalog, &mut cache).unwrap();
        assert_eq!(cache.invalidate_variant("variant-button-default"), 1);
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_disabled_memoization_always_misses() {
        let (catalog, ws) = with_button();
        let mut cache = ReconciliationCache::with_memoization(false);

        reconcile("button", &ws, &catalog, &mut cache).unwrap();
        reconcile("button", &ws, &catalog, &mut cache).unwrap();
        assert_eq!(cache.stats().entries, 0);
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn test_analyze_required_structures() {
        let catalog = Catalog::builtin().unwrap();
        let mut cache = ReconciliationCache::new();
        let ops = vec![
            Op::AddBoard {
                component: "bar-buttons".to_string(),
            },
            Op::RemoveNode {
                node_id: "x".to_string(),
            },
            Op::InsertNode {
                source: NodeSource::New {
                    component: "label".to_string(),
                },
                target: crate::actions::Target::new("y", 0),
            },
        ];

        let required = analyze_required_structures(&ops, &catalog, &mut cache).unwrap();
        let components: Vec<&str> = required.keys().map(String::as_str).collect();
        assert_eq!(components, vec!["bar-buttons", "button"]);

        analyze_required_structures(&ops, &catalog, &mut cache).unwrap();
        assert_eq!(cache.stats().analysis_entries, 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_colliding_fingerprints_are_told_apart() {
        let (catalog, mut ws) = with_button();
        let present = Structure::new("button", vec![Structure::leaf("k4988229")]);
        let absent = Structure::new("button", vec![Structure::leaf("k10422002")]);
        assert_eq!(fingerprint(&present), fingerprint(&absent));

        let variant = "variant-button-default";
        for child in ws.descendants(variant).unwrap() {
            ws.by_id.remove(&child);
        }
        ws.by_id.insert(
            "k4988229-1".to_string(),
            Node::instance("k4988229-1", "k4988229", variant, variant),
        );
        ws.node_mut(variant).unwrap().children = vec!["k4988229-1".to_string()];

        let mut cache = ReconciliationCache::new();
        let first = reconcile_structure("button", &present, &ws, &catalog, &mut cache).unwrap();
        assert!(!first.needs_new_variant);
        assert_eq!(first.suggested_variant_id, variant);

        let second = reconcile_structure("button", &absent, &ws, &catalog, &mut cache).unwrap();
        assert!(second.needs_new_variant);
        assert_eq!(second.structure, absent);
        assert_eq!(second.suggested_variant_id, "variant-button-1");
        assert_eq!(cache.stats().entries, 2);
        assert_eq!(cache.stats().hits, 0);

        let again = reconcile_structure("button", &present, &ws, &catalog, &mut cache).unwrap();
        assert_eq!(again, first);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_analysis_cache_is_bounded() {
        let catalog = Catalog::builtin().unwrap();
        let mut cache = ReconciliationCache::new();
        let batch = |n: usize| {
            vec![Op::SetNodeLabel {
                node_id: format!("node-{}", n),
                label: "x".to_string(),
            }]
        };

        for n in 0..ANALYSIS_CAPACITY + 5 {
            analyze_required_structures(&batch(n), &catalog, &mut cache).unwrap();
        }
        assert_eq!(cache.stats().analysis_entries, ANALYSIS_CAPACITY);

        // The newest batch is remembered, the oldest was evicted
        let misses = cache.stats().misses;
        analyze_required_structures(&batch(ANALYSIS_CAPACITY + 4), &catalog, &mut cache).unwrap();
        assert_eq!(cache.stats().misses, misses);
        analyze_required_structures(&batch(0), &catalog, &mut cache).unwrap();
        assert_eq!(cache.stats().misses, misses + 1);
    }

    #[test]
    fn test_create_missing_variants_skips_satisfied() {
        let (catalog, ws) = with_button();
        let themes = ThemeSet::builtin().unwrap();
        let config = EngineConfig::default();
        let mut cache = ReconciliationCache::new();
        let mut cx = Context::new(&catalog, &themes, &config, &mut cache);

        let mut required = RequiredStructures::new();
        required.insert("button".to_string(), catalog.required_structure("button").unwrap());

        let (next, created) = create_missing_variants(&ws, &required, &mut cx).unwrap();
        assert!(created.is_empty());
        assert_eq!(next, ws);
    }

    #[test]
    fn test_create_missing_variants_nested_shape() {
        let catalog = Catalog::builtin().unwrap();
        let themes = ThemeSet::builtin().unwrap();
        let config = EngineConfig::default();
        let mut cache = ReconciliationCache::new();
        let mut cx = Context::new(&catalog, &themes, &config, &mut cache);

        let shape = Structure::new(
            "card-product",
            vec![Structure::new("textblock-details", vec![Structure::leaf("title")])],
        );
        let mut required = RequiredStructures::new();
        required.insert("card-product".to_string(), shape.clone());

        let (next, created) = create_missing_variants(&Workspace::new(), &required, &mut cx).unwrap();
        assert!(!created.is_empty());
        assert!(find_matching_variant(&next, "card-product", &shape)
            .unwrap()
            .is_some());

        // A second pass finds everything in place
        let (again, created) = create_missing_variants(&next, &required, &mut cx).unwrap();
        assert!(created.is_empty());
        assert_eq!(again, next);
    }
}
