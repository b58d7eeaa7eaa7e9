//! Component schema declarations.
//!
//! A schema is static data: the default property tree of a component, the
//! child slots it is born with, and the structural restrictions editors must
//! respect.

use crate::properties::Properties;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSchema {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub level: u32,

    /// Absent means "no restriction"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<Restrictions>,

    /// Absent for primitives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<ChildSlot>>,

    #[serde(default)]
    pub properties: Properties,

    /// Opaque to the engine; consumed by export layers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_config: Option<serde_json::Value>,
}

impl ComponentSchema {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            level: 0,
            restrictions: None,
            children: None,
            properties: Properties::new(),
            export_config: None,
        }
    }

    pub fn with_children(mut self, children: Vec<ChildSlot>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn with_restrictions(mut self, restrictions: Restrictions) -> Self {
        self.restrictions = Some(restrictions);
        self
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Effective restrictions (unrestricted when undeclared)
    pub fn restrictions(&self) -> Restrictions {
        self.restrictions.clone().unwrap_or_default()
    }

    pub fn slots(&self) -> &[ChildSlot] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub fn is_primitive(&self) -> bool {
        self.slots().is_empty()
    }

    /// Whether an instance of `component` may be added as a child
    pub fn accepts_child(&self, component: &str) -> bool {
        let restrictions = self.restrictions();
        restrictions.add_children
            && restrictions
                .allowed_children
                .as_ref()
                .map_or(true, |allowed| allowed.iter().any(|c| c == component))
    }
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restrictions {
    #[serde(default = "yes")]
    pub add_children: bool,

    #[serde(default = "yes")]
    pub reorder_children: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_children: Option<Vec<String>>,
}

impl Default for Restrictions {
    fn default() -> Self {
        Self {
            add_children: true,
            reorder_children: true,
            allowed_children: None,
        }
    }
}

impl Restrictions {
    pub fn locked() -> Self {
        Self {
            add_children: false,
            reorder_children: false,
            allowed_children: None,
        }
    }
}

/// A child a component is born with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildSlot {
    pub component: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Overrides written onto the generated instance itself
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,

    /// Overrides for descendants of the generated instance, keyed by role
    /// (`label`, `tableData2`, `textblockDetails.title`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nested_overrides: BTreeMap<String, Properties>,
}

impl ChildSlot {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            role: None,
            properties: Properties::new(),
            nested_overrides: BTreeMap::new(),
        }
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_nested(mut self, role: impl Into<String>, properties: Properties) -> Self {
        self.nested_overrides.insert(role.into(), properties);
        self
    }
}

/// Component-id tree shape, ignoring property values
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Structure {
    pub component: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Structure>,
}

impl Structure {
    pub fn leaf(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            children: Vec::new(),
        }
    }

    pub fn new(component: impl Into<String>, children: Vec<Structure>) -> Self {
        Self {
            component: component.into(),
            children,
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Structure::node_count).sum::<usize>()
    }
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.component)?;
        if !self.children.is_empty() {
            f.write_str("(")?;
            for (i, child) in self.children.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{}", child)?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}
