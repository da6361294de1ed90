//! Per-voice linear undo/redo memory.

use crate::primitives::Note;
use crate::voice::TupletGroup;

/// One saved state: the authoritative note stream plus its tuplet table.
/// Immutable once pushed.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub notes: Vec<Note>,
    pub tuplets: Vec<TupletGroup>,
}

/// A linear history with a cursor. Pushing truncates everything after
/// the cursor, so redo states are discarded as soon as a new edit lands.
#[derive(Debug, Clone, Default)]
pub struct History {
    snapshots: Vec<Snapshot>,
    cursor: Option<usize>,
}

impl History {
    pub fn push(&mut self, snapshot: Snapshot) {
        let keep = self.cursor.map_or(0, |c| c + 1);
        self.snapshots.truncate(keep);
        self.snapshots.push(snapshot);
        self.cursor = Some(self.snapshots.len() - 1);
    }

    /// Move the cursor by `delta` and return the snapshot there.
    /// Out-of-range targets are a no-op returning `None`, not an error.
    pub fn navigate(&mut self, delta: i32) -> Option<&Snapshot> {
        let cursor = self.cursor? as i64;
        let target = cursor + delta as i64;
        if target < 0 || target >= self.snapshots.len() as i64 {
            return None;
        }
        let target = target as usize;
        self.cursor = Some(target);
        Some(&self.snapshots[target])
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }
}
