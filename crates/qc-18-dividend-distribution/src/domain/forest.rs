//! Reference forest: an arena of account records addressed by `NodeIndex`.
//!
//! An edge `parent -> child` means the child was sponsored by the parent.
//! Every node has at most one parent. Edges that would close a cycle are
//! refused, so traversal over the forest always terminates.

use super::errors::DividendError;
use super::value_objects::{account_hex, AccountId, NodeIndex};
use std::collections::HashMap;

/// Whether a node's account entry has been seen in the snapshot yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Created from an account entry.
    Resolved,
    /// Created because a child referenced it first.
    Placeholder,
}

/// Per-account working record, owned by the round's working set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountRecord {
    pub account_id: AccountId,
    pub holding: u64,
    pub rank: u64,
    pub spread: u64,
    pub subtree_holding: u64,
    pub max_child_subtree_holding: u64,
    pub parent: Option<NodeIndex>,
    pub node: NodeIndex,
    pub kind: NodeKind,
}

impl AccountRecord {
    fn new(account_id: AccountId, holding: u64, node: NodeIndex, kind: NodeKind) -> Self {
        Self {
            account_id,
            holding,
            rank: 0,
            spread: 0,
            subtree_holding: 0,
            max_child_subtree_holding: 0,
            parent: None,
            node,
            kind,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind == NodeKind::Placeholder
    }
}

/// Index-addressed adjacency structure.
#[derive(Clone, Debug, Default)]
pub struct ReferenceForest {
    nodes: Vec<AccountRecord>,
    children: Vec<Vec<NodeIndex>>,
    by_account: HashMap<AccountId, NodeIndex>,
    edge_count: usize,
}

impl ReferenceForest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Inserting the same account twice is an invariant violation.
    pub fn insert(
        &mut self,
        account_id: AccountId,
        holding: u64,
        kind: NodeKind,
    ) -> Result<NodeIndex, DividendError> {
        if self.by_account.contains_key(&account_id) {
            return Err(DividendError::InternalGraphInvariant(format!(
                "duplicate node for account {}",
                account_hex(&account_id)
            )));
        }
        let index = NodeIndex(self.nodes.len());
        self.nodes
            .push(AccountRecord::new(account_id, holding, index, kind));
        self.children.push(Vec::new());
        self.by_account.insert(account_id, index);
        Ok(index)
    }

    /// Turn a placeholder into a resolved node once its entry is seen.
    pub fn resolve(&mut self, index: NodeIndex, holding: u64) -> Result<(), DividendError> {
        let record = self.record_mut(index)?;
        if record.kind == NodeKind::Resolved {
            return Err(DividendError::InternalGraphInvariant(format!(
                "account {} resolved twice",
                account_hex(&record.account_id)
            )));
        }
        record.kind = NodeKind::Resolved;
        record.holding = holding;
        Ok(())
    }

    /// Add `parent -> child`.
    ///
    /// Returns `Ok(false)` without modifying the forest when the edge would
    /// revisit an ancestor of `parent` (self-reference included) or when the
    /// child already has a parent.
    pub fn add_edge(&mut self, parent: NodeIndex, child: NodeIndex) -> Result<bool, DividendError> {
        self.record(parent)?;
        if self.record(child)?.parent.is_some() {
            return Ok(false);
        }
        if self.is_ancestor_or_self(child, parent)? {
            return Ok(false);
        }
        self.nodes[child.index()].parent = Some(parent);
        self.children[parent.index()].push(child);
        self.edge_count += 1;
        Ok(true)
    }

    /// Whether `ancestor` is `node` or lies on the parent chain above it.
    fn is_ancestor_or_self(
        &self,
        ancestor: NodeIndex,
        node: NodeIndex,
    ) -> Result<bool, DividendError> {
        let mut cursor = Some(node);
        let mut steps = 0usize;
        while let Some(current) = cursor {
            if current == ancestor {
                return Ok(true);
            }
            steps += 1;
            if steps > self.nodes.len() {
                return Err(DividendError::InternalGraphInvariant(
                    "parent chain longer than node count".to_string(),
                ));
            }
            cursor = self.record(current)?.parent;
        }
        Ok(false)
    }

    pub fn index_of(&self, account_id: &AccountId) -> Option<NodeIndex> {
        self.by_account.get(account_id).copied()
    }

    pub fn record(&self, index: NodeIndex) -> Result<&AccountRecord, DividendError> {
        self.nodes.get(index.index()).ok_or_else(|| {
            DividendError::InternalGraphInvariant(format!("node index {} out of range", index.0))
        })
    }

    pub fn record_mut(&mut self, index: NodeIndex) -> Result<&mut AccountRecord, DividendError> {
        self.nodes.get_mut(index.index()).ok_or_else(|| {
            DividendError::InternalGraphInvariant(format!("node index {} out of range", index.0))
        })
    }

    pub fn children(&self, index: NodeIndex) -> &[NodeIndex] {
        self.children
            .get(index.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Nodes without a parent, in ascending account-id order.
    pub fn roots(&self) -> Vec<NodeIndex> {
        let mut roots: Vec<&AccountRecord> =
            self.nodes.iter().filter(|r| r.parent.is_none()).collect();
        roots.sort_by_key(|r| r.account_id);
        roots.into_iter().map(|r| r.node).collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &AccountRecord> {
        self.nodes.iter()
    }

    /// Records sorted by account id.
    pub fn sorted_records(&self) -> Vec<&AccountRecord> {
        let mut records: Vec<&AccountRecord> = self.nodes.iter().collect();
        records.sort_by_key(|r| r.account_id);
        records
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn placeholder_count(&self) -> usize {
        self.nodes.iter().filter(|r| r.is_placeholder()).count()
    }

    /// Post-order depth-first traversal.
    ///
    /// `finish` runs for a node only after it has run for every descendant.
    /// Uses an explicit stack so deep sponsor chains cannot exhaust the
    /// thread stack.
    pub fn depth_first_finish<F, E>(&mut self, mut finish: F) -> Result<(), E>
    where
        F: FnMut(&mut ReferenceForest, NodeIndex) -> Result<(), E>,
    {
        for root in self.roots() {
            let mut stack: Vec<(NodeIndex, usize)> = vec![(root, 0)];
            while let Some(frame) = stack.last_mut() {
                let (node, next_child) = *frame;
                match self.children(node).get(next_child).copied() {
                    Some(child) => {
                        frame.1 += 1;
                        stack.push((child, 0));
                    }
                    None => {
                        stack.pop();
                        finish(self, node)?;
                    }
                }
            }
        }
        Ok(())
    }
}
