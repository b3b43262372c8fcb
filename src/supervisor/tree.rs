//! The supervision tree: node registry, parent links, actor assignments,
//! and the escalation walk.
//!
//! This is a registry-based tree (nodes keyed by id, explicit parent map)
//! rather than a pointer structure, which keeps escalation and cleanup
//! simple and borrow-checker friendly.

// Layer 1: Standard library imports
use std::collections::HashMap;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};

// Layer 3: Internal module imports
use super::error::SupervisorError;
use super::node::{NodeDecision, SupervisorNode};
use super::strategy::SupervisionDecision;
use crate::util::{Address, SupervisorId};

/// Outcome of routing one child failure through the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureOutcome {
    /// The actor is not supervised; nothing to do.
    Unsupervised,

    /// A failure for this child is already being handled; ignore this one.
    AlreadyHandling,

    /// A node decided; the runtime applies the decision to the child.
    Apply {
        /// The node that made the decision (its restart log was consulted).
        node: SupervisorId,
        /// The node the actor is assigned to (its flag must be cleared).
        assigned: SupervisorId,
        decision: SupervisionDecision,
        exceeded_limit: bool,
        restart_delay: std::time::Duration,
    },

    /// Every node up to the root escalated; names are root-first.
    Unhandled {
        assigned: SupervisorId,
        supervisor_path: Vec<String>,
    },
}

/// Rooted tree of supervisor nodes.
pub struct SupervisionTree {
    nodes: HashMap<SupervisorId, SupervisorNode>,
    parent: HashMap<SupervisorId, SupervisorId>,
    children: HashMap<SupervisorId, Vec<SupervisorId>>,
    by_name: HashMap<String, SupervisorId>,
    assignment: HashMap<String, SupervisorId>,
    root: SupervisorId,
}

impl SupervisionTree {
    /// Create a tree with the given root node.
    pub fn new(root: SupervisorNode) -> Self {
        let root_id = root.id();
        let mut nodes = HashMap::new();
        let mut by_name = HashMap::new();
        by_name.insert(root.name().to_string(), root_id);
        nodes.insert(root_id, root);

        Self {
            nodes,
            parent: HashMap::new(),
            children: HashMap::new(),
            by_name,
            assignment: HashMap::new(),
            root: root_id,
        }
    }

    /// The root node id.
    pub fn root_id(&self) -> SupervisorId {
        self.root
    }

    /// Attach a node under a parent. Node names are unique tree-wide.
    pub fn attach_child(
        &mut self,
        parent: SupervisorId,
        node: SupervisorNode,
    ) -> Result<SupervisorId, SupervisorError> {
        if !self.nodes.contains_key(&parent) {
            return Err(SupervisorError::NodeNotFound { id: parent });
        }
        if self.by_name.contains_key(node.name()) {
            return Err(SupervisorError::DuplicateName {
                name: node.name().to_string(),
            });
        }

        let id = node.id();
        self.by_name.insert(node.name().to_string(), id);
        self.nodes.insert(id, node);
        self.parent.insert(id, parent);
        self.children.entry(parent).or_default().push(id);
        Ok(id)
    }

    /// Detach a node and its whole subtree, dropping their assignments.
    pub fn detach(&mut self, id: SupervisorId) -> Result<(), SupervisorError> {
        if id == self.root {
            return Err(SupervisorError::CannotDetachRoot);
        }
        if !self.nodes.contains_key(&id) {
            return Err(SupervisorError::NodeNotFound { id });
        }

        for node_id in self.subtree_leaves_first(id) {
            if let Some(node) = self.nodes.remove(&node_id) {
                self.by_name.remove(node.name());
                self.assignment
                    .retain(|_, assigned| *assigned != node_id);
            }
            self.children.remove(&node_id);
            self.parent.remove(&node_id);
        }
        for siblings in self.children.values_mut() {
            siblings.retain(|child| *child != id);
        }
        Ok(())
    }

    /// Look up a node id by its unique name.
    pub fn find_by_name(&self, name: &str) -> Option<SupervisorId> {
        self.by_name.get(name).copied()
    }

    pub fn node(&self, id: SupervisorId) -> Option<&SupervisorNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: SupervisorId) -> Option<&mut SupervisorNode> {
        self.nodes.get_mut(&id)
    }

    /// Put an actor under a named node's supervision.
    pub fn supervise(
        &mut self,
        node_id: SupervisorId,
        address: Address,
    ) -> Result<(), SupervisorError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(SupervisorError::NodeNotFound { id: node_id })?;
        node.supervise(address.clone());
        self.assignment
            .insert(address.path().to_string(), node_id);
        Ok(())
    }

    /// Remove an actor from supervision wherever it is assigned.
    pub fn unsupervise(&mut self, address: &Address) {
        if let Some(node_id) = self.assignment.remove(address.path()) {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.unsupervise(address);
            }
        }
    }

    /// The node an actor is assigned to.
    pub fn node_for_actor(&self, path: &str) -> Option<SupervisorId> {
        self.assignment.get(path).copied()
    }

    /// Node names from the root down to `id`, inclusive.
    pub fn path_from_root(&self, id: SupervisorId) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            if let Some(node) = self.nodes.get(&node_id) {
                chain.push(node.name().to_string());
            }
            current = self.parent.get(&node_id).copied();
        }
        chain.reverse();
        chain
    }

    /// Every node id, leaves first (children before parents), rooted at the
    /// tree root. This is the shutdown cleanup order.
    pub fn cleanup_order(&self) -> Vec<SupervisorId> {
        self.subtree_leaves_first(self.root)
    }

    /// Addresses supervised by a node, cloned out for lock-free iteration.
    pub fn supervised_by(&self, id: SupervisorId) -> Vec<Address> {
        self.nodes
            .get(&id)
            .map(|node| node.supervised().cloned().collect())
            .unwrap_or_default()
    }

    /// Route a child failure: walk from the assigned node towards the root
    /// until a non-escalate strategy decides, serializing per-child.
    pub fn decide_failure(&mut self, actor_path: &str, now: DateTime<Utc>) -> FailureOutcome {
        let Some(assigned) = self.node_for_actor(actor_path) else {
            return FailureOutcome::Unsupervised;
        };

        {
            let Some(node) = self.nodes.get_mut(&assigned) else {
                return FailureOutcome::Unsupervised;
            };
            if !node.begin_handling(actor_path) {
                return FailureOutcome::AlreadyHandling;
            }
        }

        let mut current = assigned;
        loop {
            let Some(node) = self.nodes.get_mut(&current) else {
                break;
            };
            match node.decide(actor_path, now) {
                NodeDecision::Apply {
                    decision,
                    exceeded_limit,
                } => {
                    let restart_delay = node.restart_delay();
                    return FailureOutcome::Apply {
                        node: current,
                        assigned,
                        decision,
                        exceeded_limit,
                        restart_delay,
                    };
                }
                NodeDecision::Escalate => match self.parent.get(&current) {
                    Some(parent) => current = *parent,
                    None => break,
                },
            }
        }

        FailureOutcome::Unhandled {
            assigned,
            supervisor_path: self.path_from_root(assigned),
        }
    }

    /// Record a restart decision in the deciding node's log.
    pub fn record_restart(&mut self, node_id: SupervisorId, actor_path: &str, now: DateTime<Utc>) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.record_restart(actor_path, now);
        }
    }

    /// Clear the per-child in-flight flag on the assigned node.
    pub fn end_handling(&mut self, node_id: SupervisorId, actor_path: &str) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.end_handling(actor_path);
        }
    }

    fn subtree_leaves_first(&self, id: SupervisorId) -> Vec<SupervisorId> {
        let mut order = Vec::new();
        self.collect_post_order(id, &mut order);
        order
    }

    fn collect_post_order(&self, id: SupervisorId, order: &mut Vec<SupervisorId>) {
        if let Some(children) = self.children.get(&id) {
            for child in children {
                self.collect_post_order(*child, order);
            }
        }
        order.push(id);
    }
}
