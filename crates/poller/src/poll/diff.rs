//! Pure snapshot comparison.

use std::collections::BTreeMap;

use shelfwatch_core::{InventorySnapshot, ProductAvailability, ProductId, SubstoreId};

/// Products that flipped from unavailable to available, per substore.
///
/// Only the off-to-on transition counts: a product available in both
/// snapshots produces nothing, as does one that went out of stock. A
/// product with no prior record counts as previously unavailable, so its
/// first available sighting is a flip. Substores with no flips are absent
/// from the result.
#[must_use]
pub fn newly_available(
    previous: &InventorySnapshot,
    current: &InventorySnapshot,
) -> BTreeMap<SubstoreId, Vec<ProductId>> {
    let mut flips = BTreeMap::new();

    for (substore_id, entries) in current {
        let before = previous.get(substore_id).map(Vec::as_slice);
        let flipped: Vec<ProductId> = entries
            .iter()
            .filter(|entry| entry.available && !was_available(before, &entry.product_id))
            .map(|entry| entry.product_id.clone())
            .collect();
        if !flipped.is_empty() {
            flips.insert(substore_id.clone(), flipped);
        }
    }

    flips
}

fn was_available(entries: Option<&[ProductAvailability]>, product_id: &ProductId) -> bool {
    entries.is_some_and(|entries| {
        entries
            .iter()
            .any(|entry| entry.product_id == *product_id && entry.available)
    })
}

/// Merge the current cycle's observations over the previous snapshot.
///
/// Substores that produced data are replaced wholesale; substores that
/// produced nothing keep their previous entry. An empty fetch never erases
/// history, so a stale-session cycle cannot make every product look newly
/// available on the cycle after.
#[must_use]
pub fn merge(previous: &InventorySnapshot, current: &InventorySnapshot) -> InventorySnapshot {
    let mut merged = previous.clone();
    for (substore_id, entries) in current {
        if !entries.is_empty() {
            merged.insert(substore_id.clone(), entries.clone());
        }
    }
    merged
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn entry(product_id: &str, available: bool) -> ProductAvailability {
        ProductAvailability::new(product_id, available)
    }

    fn snapshot(entries: &[(&str, &[ProductAvailability])]) -> InventorySnapshot {
        entries
            .iter()
            .map(|(substore_id, list)| (SubstoreId::new(*substore_id), list.to_vec()))
            .collect()
    }

    #[test]
    fn test_restock_is_reported() {
        let previous = snapshot(&[("sub_d", &[entry("p1", false), entry("p2", true)])]);
        let current = snapshot(&[("sub_d", &[entry("p1", true), entry("p2", true)])]);

        let flips = newly_available(&previous, &current);
        assert_eq!(
            flips.get(&SubstoreId::new("sub_d")),
            Some(&vec![ProductId::new("p1")])
        );
    }

    #[test]
    fn test_steady_state_is_silent() {
        let steady = snapshot(&[("sub_d", &[entry("p1", true), entry("p2", false)])]);
        assert!(newly_available(&steady, &steady).is_empty());
    }

    #[test]
    fn test_going_out_of_stock_is_silent() {
        let previous = snapshot(&[("sub_d", &[entry("p1", true)])]);
        let current = snapshot(&[("sub_d", &[entry("p1", false)])]);
        assert!(newly_available(&previous, &current).is_empty());
    }

    #[test]
    fn test_first_sighting_of_availability_counts() {
        let previous = snapshot(&[("sub_d", &[entry("p1", false)])]);
        let current = snapshot(&[("sub_d", &[entry("p1", false), entry("p2", true)])]);

        let flips = newly_available(&previous, &current);
        assert_eq!(
            flips.get(&SubstoreId::new("sub_d")),
            Some(&vec![ProductId::new("p2")])
        );
    }

    #[test]
    fn test_unknown_substore_counts_from_empty() {
        let previous = InventorySnapshot::new();
        let current = snapshot(&[("sub_new", &[entry("p1", true), entry("p2", false)])]);

        let flips = newly_available(&previous, &current);
        assert_eq!(
            flips.get(&SubstoreId::new("sub_new")),
            Some(&vec![ProductId::new("p1")])
        );
    }

    #[test]
    fn test_substores_without_flips_are_absent() {
        let previous = snapshot(&[
            ("sub_a", &[entry("p1", true)]),
            ("sub_b", &[entry("p2", false)]),
        ]);
        let current = snapshot(&[
            ("sub_a", &[entry("p1", true)]),
            ("sub_b", &[entry("p2", true)]),
        ]);

        let flips = newly_available(&previous, &current);
        assert_eq!(flips.len(), 1);
        assert!(flips.contains_key(&SubstoreId::new("sub_b")));
    }

    #[test]
    fn test_merge_replaces_observed_substores() {
        let previous = snapshot(&[("sub_d", &[entry("p1", false), entry("p2", true)])]);
        let current = snapshot(&[("sub_d", &[entry("p1", true)])]);

        let merged = merge(&previous, &current);
        assert_eq!(
            merged.get(&SubstoreId::new("sub_d")),
            Some(&vec![entry("p1", true)])
        );
    }

    #[test]
    fn test_merge_retains_unobserved_substores() {
        let previous = snapshot(&[
            ("sub_a", &[entry("p1", true)]),
            ("sub_b", &[entry("p2", false)]),
        ]);
        let current = snapshot(&[("sub_a", &[entry("p1", false)])]);

        let merged = merge(&previous, &current);
        assert_eq!(
            merged.get(&SubstoreId::new("sub_b")),
            Some(&vec![entry("p2", false)])
        );
    }

    #[test]
    fn test_merge_ignores_empty_entries() {
        let previous = snapshot(&[("sub_a", &[entry("p1", true)])]);
        let current = snapshot(&[("sub_a", &[])]);

        let merged = merge(&previous, &current);
        assert_eq!(merged, previous);
    }

    #[test]
    fn test_diff_after_merge_converges() {
        let previous = snapshot(&[("sub_a", &[entry("p1", false)])]);
        let current = snapshot(&[("sub_a", &[entry("p1", true)])]);

        let merged = merge(&previous, &current);
        assert!(newly_available(&merged, &current).is_empty());
    }
}
