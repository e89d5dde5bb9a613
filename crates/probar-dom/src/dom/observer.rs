//! Mutation observation for a subtree.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use super::{Node, NodeId};

/// Kind of change described by a [`MutationRecord`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Children added or removed
    ChildList,
    /// Attribute set or removed
    Attributes,
    /// Text or comment data changed
    CharacterData,
}

/// A single tree change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// What changed
    pub kind: MutationKind,
    /// Node whose children, attributes or data changed
    pub target: NodeId,
    /// Attribute name for attribute records
    pub attribute_name: Option<String>,
    /// Previous attribute value or character data
    pub old_value: Option<String>,
    /// Nodes inserted under `target`
    pub added_nodes: Vec<NodeId>,
    /// Nodes removed from `target`
    pub removed_nodes: Vec<NodeId>,
}

impl MutationRecord {
    pub(crate) fn child_list(target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) -> Self {
        Self {
            kind: MutationKind::ChildList,
            target,
            attribute_name: None,
            old_value: None,
            added_nodes: added,
            removed_nodes: removed,
        }
    }

    pub(crate) fn attributes(target: NodeId, name: &str, old_value: Option<String>) -> Self {
        Self {
            kind: MutationKind::Attributes,
            target,
            attribute_name: Some(name.to_string()),
            old_value,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
        }
    }

    pub(crate) fn character_data(target: NodeId, old_value: Option<String>) -> Self {
        Self {
            kind: MutationKind::CharacterData,
            target,
            attribute_name: None,
            old_value,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
        }
    }
}

/// Which changes an observer reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MutationObserverInit {
    /// Report attribute changes
    pub attributes: bool,
    /// Report child additions and removals
    pub child_list: bool,
    /// Report text data changes
    pub character_data: bool,
    /// Extend observation to every descendant of the target
    pub subtree: bool,
}

impl Default for MutationObserverInit {
    fn default() -> Self {
        Self {
            attributes: true,
            child_list: true,
            character_data: true,
            subtree: true,
        }
    }
}

impl MutationObserverInit {
    /// Only child list changes on the target itself
    #[must_use]
    pub const fn child_list_only() -> Self {
        Self {
            attributes: false,
            child_list: true,
            character_data: false,
            subtree: false,
        }
    }

    const fn accepts_kind(&self, kind: MutationKind) -> bool {
        match kind {
            MutationKind::ChildList => self.child_list,
            MutationKind::Attributes => self.attributes,
            MutationKind::CharacterData => self.character_data,
        }
    }
}

/// Subscription to the mutations of one node (and optionally its subtree)
///
/// Dropping the observer disconnects it.
#[derive(Debug)]
pub struct MutationObserver {
    target: Node,
    init: MutationObserverInit,
    receiver: broadcast::Receiver<MutationRecord>,
}

impl MutationObserver {
    /// Start observing `target`
    #[must_use]
    pub fn observe(target: &Node, init: MutationObserverInit) -> Self {
        Self {
            target: target.clone(),
            init,
            receiver: target.document().subscribe(),
        }
    }

    /// Observed node
    #[must_use]
    pub const fn target(&self) -> &Node {
        &self.target
    }

    /// Observation options
    #[must_use]
    pub const fn init(&self) -> MutationObserverInit {
        self.init
    }

    fn accepts(&self, record: &MutationRecord) -> bool {
        if !self.init.accepts_kind(record.kind) {
            return false;
        }
        if record.target == self.target.id() {
            return true;
        }
        self.init.subtree
            && self
                .target
                .document()
                .read(|tree| tree.contains(self.target.id(), record.target))
    }

    /// Wait for the next relevant record
    ///
    /// Returns `None` when records were dropped because this observer fell
    /// behind; callers should re-check whatever they are waiting on.
    pub async fn recv(&mut self) -> Option<MutationRecord> {
        loop {
            match self.receiver.recv().await {
                Ok(record) if self.accepts(&record) => return Some(record),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::trace!(skipped, "mutation observer lagged");
                    return None;
                }
                // The target keeps the document alive, so the sender outlives us
                Err(RecvError::Closed) => std::future::pending::<()>().await,
            }
        }
    }

    /// Drain relevant records that are already queued
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        let mut records = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(record) => {
                    if self.accepts(&record) {
                        records.push(record);
                    }
                }
                Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Empty | TryRecvError::Closed) => return records,
            }
        }
    }

    /// Stop observing
    pub fn disconnect(self) {}
}
