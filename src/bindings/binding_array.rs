// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A fixed-size array of bindings with dirty tracking.

Used both for logical arrays (indexed by global slot) and physical arrays (indexed by one
stage's native register).
*/

use crate::bindings::dirty_tracking::DirtyRange;
use std::sync::Arc;

#[derive(Debug)]
pub struct BindingArray<T> {
    slots: Vec<Option<Arc<T>>>,
    dirty: DirtyRange,
    bound_count: usize,
}

fn same_binding<T>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

impl<T> BindingArray<T> {
    pub fn new(capacity: usize) -> Self {
        BindingArray {
            slots: (0..capacity).map(|_| None).collect(),
            dirty: DirtyRange::Clean,
            bound_count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<T>> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn slots(&self) -> &[Option<Arc<T>>] {
        &self.slots
    }

    /**
    Stores `value` at `index`, widening the dirty range if it differs from what is there.

    Replacing a binding drops the array's reference to the previous one. Returns whether
    anything changed.

    # Panics
    If `index` is beyond the array.
    */
    pub fn set(&mut self, index: usize, value: Option<Arc<T>>) -> bool {
        assert!(
            index < self.slots.len(),
            "binding index {index} is out of range (capacity {})",
            self.slots.len()
        );
        if same_binding(&self.slots[index], &value) {
            return false;
        }
        self.slots[index] = value;
        self.dirty.mark(index);
        true
    }

    pub fn dirty(&self) -> DirtyRange {
        self.dirty
    }

    /// The dirty span as its first index and the bindings it covers.
    pub fn dirty_slice(&self) -> Option<(usize, &[Option<Arc<T>>])> {
        self.dirty
            .span()
            .map(|span| (*span.start(), &self.slots[span]))
    }

    /// Marks every index dirty.
    pub fn mark_all_dirty(&mut self) {
        if !self.slots.is_empty() {
            self.dirty.mark_span(0, self.slots.len() - 1);
        }
    }

    /// Marks every index up to the last bound one dirty.
    pub fn mark_bound_dirty(&mut self) {
        if self.bound_count > 0 {
            self.dirty.mark_span(0, self.bound_count - 1);
        }
    }

    /// Drops every binding. Callers choose which span to mark dirty.
    pub fn release_all(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    /// One past the highest occupied index, as of the last [`Self::refresh_bound_count`].
    pub fn bound_count(&self) -> usize {
        self.bound_count
    }

    /// Recomputes the bound count, scanning up to the larger of the dirty end and the old count.
    pub fn refresh_bound_count(&mut self) {
        let dirty_end = self.dirty.span().map_or(0, |span| *span.end() + 1);
        let search_max = dirty_end.max(self.bound_count).min(self.slots.len());
        let mut bound_count = 0;
        for i in 0..search_max {
            if self.slots[i].is_some() {
                bound_count = i + 1;
            }
        }
        self.bound_count = bound_count;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }
}
