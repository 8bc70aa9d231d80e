//! Annotation undo/redo history
//!
//! Every mutation stores a full snapshot of the annotation list. `index`
//! points at the snapshot currently shown; undo and redo only move it.
//! A new mutation after an undo discards the redo branch.

use smartpdf_model::{Annotation, AnnotationId};

/// Maximum number of undo steps kept by default
pub const DEFAULT_HISTORY_DEPTH: usize = 100;

#[derive(Debug, Clone)]
pub struct AnnotationHistory {
    snapshots: Vec<Vec<Annotation>>,
    index: usize,
    max_depth: usize,
}

impl Default for AnnotationHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationHistory {
    pub fn new() -> Self {
        Self { snapshots: vec![Vec::new()], index: 0, max_depth: DEFAULT_HISTORY_DEPTH }
    }

    /// Sets how many undo steps are retained (at least 1).
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self.trim();
        self
    }

    /// Annotations as of the current history position.
    pub fn current(&self) -> &[Annotation] {
        &self.snapshots[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.snapshots.len()
    }

    pub fn add(&mut self, annotation: Annotation) {
        let mut next = self.current().to_vec();
        next.push(annotation);
        self.commit(next);
    }

    /// Removes the annotation with `id`. Returns false, without recording a
    /// step, if no such annotation exists.
    pub fn remove(&mut self, id: AnnotationId) -> bool {
        if !self.current().iter().any(|a| a.id == id) {
            return false;
        }

        let next = self.current().iter().filter(|a| a.id != id).cloned().collect();
        self.commit(next);
        true
    }

    /// Replaces the whole list as one undoable step.
    pub fn replace_all(&mut self, annotations: Vec<Annotation>) {
        self.commit(annotations);
    }

    /// Empties the list as one undoable step. No-op when already empty.
    pub fn clear(&mut self) {
        if !self.current().is_empty() {
            self.commit(Vec::new());
        }
    }

    /// Steps back one snapshot. Returns false at the oldest snapshot.
    pub fn undo(&mut self) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.index -= 1;
        true
    }

    /// Steps forward one snapshot. Returns false at the newest snapshot.
    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.index += 1;
        true
    }

    fn commit(&mut self, next: Vec<Annotation>) {
        self.snapshots.truncate(self.index + 1);
        self.snapshots.push(next);
        self.index += 1;
        self.trim();
    }

    // Keeps at most `max_depth` undo steps plus the current snapshot.
    fn trim(&mut self) {
        let limit = self.max_depth + 1;
        if self.snapshots.len() > limit {
            let excess = self.snapshots.len() - limit;
            self.snapshots.drain(..excess);
            self.index = self.index.saturating_sub(excess);
        }
    }
}
