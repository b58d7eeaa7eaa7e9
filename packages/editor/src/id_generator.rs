use crate::workspace::{NodeId, Workspace};
use std::collections::HashMap;

/// Sequential node ids, `<prefix>-<n>`, skipping ids already in the store.
///
/// One generator lives for the duration of a single mutation; counters only
/// move forward, so ids issued before their node is inserted never repeat.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    counts: HashMap<String, u32>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next raw id for `prefix`, without checking the store
    pub fn new_id(&mut self, prefix: &str) -> NodeId {
        let count = self.counts.entry(prefix.to_string()).or_insert(0);
        *count += 1;
        format!("{}-{}", prefix, count)
    }

    /// Next id for `prefix` that is free in `workspace`
    pub fn fresh_id(&mut self, prefix: &str, workspace: &Workspace) -> NodeId {
        loop {
            let id = self.new_id(prefix);
            if !workspace.contains(&id) {
                return id;
            }
        }
    }

    /// `variant-<component>-default` when free, else `variant-<component>-<n>`
    pub fn variant_id(&mut self, component: &str, workspace: &Workspace) -> NodeId {
        let default = default_variant_id(component);
        if !workspace.contains(&default) && !self.counts.contains_key(&default) {
            self.counts.insert(default.clone(), 0);
            return default;
        }
        self.fresh_id(&format!("variant-{}", component), workspace)
    }
}

pub fn default_variant_id(component: &str) -> NodeId {
    format!("variant-{}-default", component)
}
