//! Undo/redo history built on graph snapshots.
//!
//! Every user-facing operation runs inside a transaction: the snapshot is
//! captured when the outermost transaction opens, and if the store moved
//! by the time it closes, one `(before, after)` pair lands on the undo
//! stack. Nested transactions flatten into the outermost one, so composite
//! operations (drag-to-create = spawn node + connect) undo as a single
//! step.
//!
//! There is no rollback: a transaction that applies only part of its
//! mutations commits whatever was applied. Callers therefore order
//! mutations so every prefix is invariant-safe (containers are inserted
//! before anything is parented to them).

use fm_core::graph::{GraphSnapshot, GraphStore};
use log::warn;

/// One undoable unit.
#[derive(Debug, Clone)]
struct HistoryEntry {
    before: GraphSnapshot,
    after: GraphSnapshot,
    label: String,
}

/// Undo/redo stacks with transaction grouping.
#[derive(Debug)]
pub struct History {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    /// Maximum undo depth; the oldest entry is trimmed beyond it.
    max_depth: usize,
    /// Transaction nesting depth (0 = not in a transaction).
    depth: usize,
    /// Snapshot captured when the outermost transaction opened.
    tx_before: Option<GraphSnapshot>,
    /// Label of the outermost transaction.
    tx_label: Option<String>,
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_depth,
            depth: 0,
            tx_before: None,
            tx_label: None,
        }
    }

    /// Open a transaction. The first (outermost) open captures the current
    /// snapshot and label; nested opens only bump the depth counter.
    pub fn begin(&mut self, store: &GraphStore, label: &str) {
        if self.depth == 0 {
            self.tx_before = Some(store.snapshot());
            self.tx_label = Some(label.to_string());
        }
        self.depth += 1;
    }

    /// Close a transaction. When the outermost one closes and the store's
    /// revision moved, push exactly one undo entry and clear the redo
    /// stack. A transaction that changed nothing leaves no trace.
    pub fn end(&mut self, store: &GraphStore) {
        if self.depth == 0 {
            warn!("transaction end without begin; ignoring");
            return;
        }
        self.depth -= 1;
        if self.depth > 0 {
            return;
        }
        let before = self.tx_before.take();
        let label = self.tx_label.take().unwrap_or_default();
        if let Some(before) = before {
            if before.revision() != store.revision() {
                self.undo_stack.push(HistoryEntry {
                    before,
                    after: store.snapshot(),
                    label,
                });
                if self.undo_stack.len() > self.max_depth {
                    self.undo_stack.remove(0);
                }
                self.redo_stack.clear();
            }
        }
    }

    /// Run `f` inside a transaction tagged `label`.
    pub fn with_transaction<R>(
        &mut self,
        store: &mut GraphStore,
        label: &str,
        f: impl FnOnce(&mut GraphStore) -> R,
    ) -> R {
        self.begin(store, label);
        let out = f(store);
        self.end(store);
        out
    }

    /// Revert the most recent transaction. Returns its label.
    pub fn undo(&mut self, store: &mut GraphStore) -> Option<String> {
        if self.depth > 0 {
            warn!("undo during an open transaction; ignoring");
            return None;
        }
        let entry = self.undo_stack.pop()?;
        store.restore(entry.before.clone());
        let label = entry.label.clone();
        self.redo_stack.push(entry);
        Some(label)
    }

    /// Re-apply the most recently undone transaction. Returns its label.
    pub fn redo(&mut self, store: &mut GraphStore) -> Option<String> {
        if self.depth > 0 {
            warn!("redo during an open transaction; ignoring");
            return None;
        }
        let entry = self.redo_stack.pop()?;
        store.restore(entry.after.clone());
        let label = entry.label.clone();
        self.undo_stack.push(entry);
        Some(label)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }
}
