use std::collections::VecDeque;

/// What kind of edit a snapshot precedes. Scrubbed edits (shift and
/// count changes driven by a held key or drag) coalesce so one undo step
/// reverts the whole gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotLabel {
    PathCreated,
    PathRemoved,
    CutInserted,
    CutRemoved,
    CutMoved,
    PathsMerged,
    BoundaryAttached,
    LoopShift,
    PathShift,
    PathSegments,
    LoopSegments,
    Alignment,
    Smoothing,
}

impl SnapshotLabel {
    #[must_use]
    pub fn coalesces(self) -> bool {
        matches!(
            self,
            Self::LoopShift | Self::PathShift | Self::PathSegments | Self::LoopSegments
        )
    }
}

/// Bounded undo stack of labeled state snapshots.
///
/// States are pushed before an edit runs; popping yields the most recent
/// pre-edit state. Beyond the depth limit the oldest entry is evicted.
#[derive(Debug, Clone)]
pub struct UndoStack<T> {
    entries: VecDeque<(SnapshotLabel, T)>,
    depth: usize,
}

impl<T> UndoStack<T> {
    #[must_use]
    pub fn new(depth: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(depth),
            depth,
        }
    }

    /// Records a pre-edit state. A coalescing label repeated back to back
    /// keeps only the earliest state of the run.
    pub fn push(&mut self, label: SnapshotLabel, state: T) {
        if self.depth == 0 {
            return;
        }
        if label.coalesces() {
            if let Some((top, _)) = self.entries.back() {
                if *top == label {
                    return;
                }
            }
        }
        while self.entries.len() >= self.depth {
            self.entries.pop_front();
        }
        self.entries.push_back((label, state));
    }

    pub fn pop(&mut self) -> Option<(SnapshotLabel, T)> {
        self.entries.pop_back()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
