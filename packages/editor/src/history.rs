//! # Undo/Redo History
//!
//! Snapshot-based history of dispatched actions.
//!
//! ## Design
//!
//! - Each successful, state-changing dispatch records the workspace it replaced
//! - Undo swaps the current workspace with the most recent snapshot
//! - Redo swaps it back
//! - New dispatches clear the redo stack
//! - Failed or no-op dispatches are never recorded

use crate::workspace::Workspace;

/// A workspace as it was before an action, plus the action's wire name
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub workspace: Workspace,
    pub description: String,
}

#[derive(Debug)]
pub struct History {
    /// Most recent last
    undo_stack: Vec<HistoryEntry>,

    /// Most recent last
    redo_stack: Vec<HistoryEntry>,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,
}

impl History {
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
        }
    }

    /// Record the workspace an action is about to replace
    pub fn record(&mut self, previous: Workspace, description: impl Into<String>) {
        self.undo_stack.push(HistoryEntry {
            workspace: previous,
            description: description.into(),
        });

        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }

        self.redo_stack.clear();
    }

    /// Snapshot to restore, if any; `current` moves to the redo stack
    pub fn undo(&mut self, current: &Workspace) -> Option<Workspace> {
        let entry = self.undo_stack.pop()?;
        self.redo_stack.push(HistoryEntry {
            workspace: current.clone(),
            description: entry.description.clone(),
        });
        Some(entry.workspace)
    }

    pub fn redo(&mut self, current: &Workspace) -> Option<Workspace> {
        let entry = self.redo_stack.pop()?;
        self.undo_stack.push(HistoryEntry {
            workspace: current.clone(),
            description: entry.description.clone(),
        });
        Some(entry.workspace)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.last().map(|entry| entry.description.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|entry| entry.description.as_str())
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::Board;

    fn with_boards(n: u32) -> Workspace {
        let mut ws = Workspace::new();
        for order in 0..n {
            let id = format!("board{}", order);
            ws.boards.insert(id.clone(), Board::new(id, "Boards", order));
        }
        ws
    }

    #[test]
    fn test_history_creation() {
        let history = History::new();
        assert_eq!(history.undo_levels(), 0);
        assert_eq!(history.redo_levels(), 0);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_undo_and_redo_swap_snapshots() {
        let mut history = History::new();
        let before = with_boards(0);
        let after = with_boards(1);

        history.record(before.clone(), "add_board");
        assert_eq!(history.undo_description(), Some("add_board"));

        let restored = history.undo(&after).unwrap();
        assert_eq!(restored, before);
        assert_eq!(history.redo_description(), Some("add_board"));

        let replayed = history.redo(&restored).unwrap();
        assert_eq!(replayed, after);
        assert_eq!(history.undo_levels(), 1);
        assert_eq!(history.redo_levels(), 0);
    }

    #[test]
    fn test_new_record_clears_redo() {
        let mut history = History::new();
        history.record(with_boards(0), "add_board");
        history.undo(&with_boards(1));
        assert_eq!(history.redo_levels(), 1);

        history.record(with_boards(0), "add_variant");
        assert_eq!(history.redo_levels(), 0);
    }

    #[test]
    fn test_max_levels_enforced() {
        let mut history = History::with_max_levels(2);
        for n in 0..3 {
            history.record(with_boards(n), format!("step {}", n));
        }

        assert_eq!(history.undo_levels(), 2);
        assert_eq!(history.undo(&with_boards(3)).unwrap(), with_boards(2));
        assert_eq!(history.undo(&with_boards(2)).unwrap(), with_boards(1));
        assert!(history.undo(&with_boards(1)).is_none());
    }
}
