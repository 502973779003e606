// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Diff-and-apply primitive: compares a desired resource set against the
//! observed live set and yields the actions closing the gap. Segment,
//! endpoint and flow reconciliation all go through this instead of
//! per-resource existence checks.

use std::collections::HashSet;
use std::hash::Hash;

/// Actions needed to make `observed` equal to `desired`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Actions<T> {
    pub create: Vec<T>,
    pub remove: Vec<T>,
}

impl<T> Actions<T> {
    pub fn is_noop(&self) -> bool {
        self.create.is_empty() && self.remove.is_empty()
    }
}

/// Computes the difference between the desired and observed sets, keeping
/// the input ordering of each side.
pub fn diff<T>(desired: &[T], observed: &[T]) -> Actions<T>
where
    T: Eq + Hash + Clone,
{
    let want: HashSet<&T> = desired.iter().collect();
    let have: HashSet<&T> = observed.iter().collect();

    Actions {
        create: desired
            .iter()
            .filter(|d| !have.contains(d))
            .cloned()
            .collect(),
        remove: observed
            .iter()
            .filter(|o| !want.contains(o))
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_disjoint_and_overlap() {
        let desired = vec!["a", "b", "c"];
        let observed = vec!["b", "x"];
        let actions = diff(&desired, &observed);
        assert_eq!(actions.create, vec!["a", "c"]);
        assert_eq!(actions.remove, vec!["x"]);
    }

    #[test]
    fn test_diff_converged_is_noop() {
        let desired = vec![1, 2, 3];
        let observed = vec![3, 2, 1];
        assert!(diff(&desired, &observed).is_noop());
    }

    #[test]
    fn test_diff_empty_desired_removes_all() {
        let actions = diff(&[], &["a".to_string(), "b".to_string()]);
        assert_eq!(actions.remove.len(), 2);
        assert!(actions.create.is_empty());
    }
}
