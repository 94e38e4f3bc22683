//! Hierarchy flattening
//!
//! Projects a multi-level hierarchy onto a fixed, flat list of slots. Which
//! nodes land in which slot is described by a [`Topology`] table, so a new
//! hierarchy needs a new table, not new code.

use std::collections::HashMap;

use filter_types::HierarchyNode;

use crate::clients::HierarchyApi;
use crate::error::Result;

/// Child identifier and the output slot it fills
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotBinding {
    pub child_id: String,
    pub slot: usize,
}

/// Children of `parent` that are kept, and where they go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyRule {
    pub parent: String,
    pub bindings: Vec<SlotBinding>,
}

/// Declarative description of one hierarchy's flattened shape.
///
/// Rules are applied in order. A rule's parent must be the root or a child
/// bound by an earlier rule; otherwise the rule is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub slots: usize,
    pub rules: Vec<TopologyRule>,
}

impl Topology {
    pub fn new(slots: usize) -> Self {
        Self {
            slots,
            rules: Vec::new(),
        }
    }

    pub fn rule(mut self, parent: &str, bindings: &[(&str, usize)]) -> Self {
        self.rules.push(TopologyRule {
            parent: parent.to_string(),
            bindings: bindings
                .iter()
                .map(|(child_id, slot)| SlotBinding {
                    child_id: child_id.to_string(),
                    slot: *slot,
                })
                .collect(),
        });
        self
    }

    /// UK geography: country → Great Britain / Northern Ireland →
    /// England and Wales / Scotland → England / Wales.
    ///
    /// Slots: England and Wales, England, Wales, Great Britain, Scotland,
    /// Northern Ireland.
    pub fn uk_geography() -> Self {
        Topology::new(6)
            .rule("K02000001", &[("K03000001", 3), ("N92000002", 5)])
            .rule("K03000001", &[("K04000001", 0), ("S92000003", 4)])
            .rule("K04000001", &[("E92000001", 1), ("W92000004", 2)])
    }
}

/// Fetch the hierarchy level by level and fill the topology's slots.
///
/// Returns a synthetic root labelled like the real one with exactly
/// `topology.slots` children. A node the topology expects but the service
/// does not have leaves its slot at `HierarchyNode::default()`. The first
/// failing fetch is returned as the error.
pub async fn flatten<H>(
    api: &H,
    instance_id: &str,
    dimension: &str,
    topology: &Topology,
) -> Result<HierarchyNode>
where
    H: HierarchyApi + ?Sized,
{
    let root = api.get_root(instance_id, dimension).await?;

    let mut flat = HierarchyNode {
        id: root.id.clone(),
        label: root.label.clone(),
        has_children: true,
        children: vec![HierarchyNode::default(); topology.slots],
    };

    // id -> has_children, for every node reached so far
    let mut located: HashMap<String, bool> = HashMap::new();
    located.insert(root.id.clone(), root.has_children);
    let mut root = Some(root);

    for rule in &topology.rules {
        // The root is already fetched; hand it to the first rule that asks for it
        let already_fetched = if root.as_ref().is_some_and(|n| n.id == rule.parent) {
            root.take()
        } else {
            None
        };
        let parent = match already_fetched {
            Some(node) => node,
            None => match located.get(&rule.parent) {
                Some(true) => api.get_child(instance_id, dimension, &rule.parent).await?,
                Some(false) => continue,
                None => {
                    tracing::debug!(parent = %rule.parent, "parent not present; slots left empty");
                    continue;
                }
            },
        };

        for child in &parent.children {
            let Some(binding) = rule.bindings.iter().find(|b| b.child_id == child.id) else {
                tracing::debug!(node = %child.id, parent = %parent.id, "dropping node outside topology");
                continue;
            };
            let Some(slot) = flat.children.get_mut(binding.slot) else {
                tracing::warn!(slot = binding.slot, node = %child.id, "topology slot out of range");
                continue;
            };
            *slot = HierarchyNode {
                id: child.id.clone(),
                label: child.label.clone(),
                has_children: child.has_children,
                children: Vec::new(),
            };
            located.insert(child.id.clone(), child.has_children);
        }
    }

    Ok(flat)
}
