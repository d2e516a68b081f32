// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
This module implements "dirty tracking" for binding arrays.

A [`DirtyRange`] remembers the inclusive span of indices changed since the last
synchronization. It is a two-state machine:

* `Clean`, nothing to send.
* `Dirty { first, last }`, which only widens while dirty.

Synchronization consumes the span and returns the range to `Clean`. The span is a superset
of what changed: indices inside it may hold their old value, but nothing outside it changed.
*/

use std::ops::RangeInclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirtyRange {
    #[default]
    Clean,
    Dirty {
        first: usize,
        last: usize,
    },
}

impl DirtyRange {
    /// Widens the range to cover `index`.
    pub fn mark(&mut self, index: usize) {
        self.mark_span(index, index);
    }

    /// Widens the range to cover `first..=last`.
    pub fn mark_span(&mut self, first: usize, last: usize) {
        debug_assert!(first <= last);
        *self = match *self {
            DirtyRange::Clean => DirtyRange::Dirty { first, last },
            DirtyRange::Dirty { first: a, last: b } => DirtyRange::Dirty {
                first: a.min(first),
                last: b.max(last),
            },
        };
    }

    pub fn is_dirty(&self) -> bool {
        matches!(self, DirtyRange::Dirty { .. })
    }

    pub fn span(&self) -> Option<RangeInclusive<usize>> {
        match *self {
            DirtyRange::Clean => None,
            DirtyRange::Dirty { first, last } => Some(first..=last),
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.span().is_some_and(|span| span.contains(&index))
    }

    pub fn clear(&mut self) {
        *self = DirtyRange::Clean;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn starts_clean() {
        let range = DirtyRange::default();
        assert!(!range.is_dirty());
        assert_eq!(range, DirtyRange::Clean);
        assert_eq!(range.span(), None);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn widens_only() {
        let mut range = DirtyRange::Clean;
        range.mark(5);
        assert_eq!(range, DirtyRange::Dirty { first: 5, last: 5 });
        range.mark(2);
        range.mark(4);
        assert_eq!(range.span(), Some(2..=5));
        range.mark_span(9, 11);
        assert_eq!(range, DirtyRange::Dirty { first: 2, last: 11 });
        assert!(range.contains(7));
        assert!(!range.contains(1));
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn clear_returns_to_clean() {
        let mut range = DirtyRange::Clean;
        range.mark(0);
        range.clear();
        assert_eq!(range, DirtyRange::Clean);
    }
}
