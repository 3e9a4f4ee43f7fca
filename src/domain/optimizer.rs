//! Cargo optimizer: a bounded multi-quantity knapsack over a capacity axis
//! discretized at 0.01 volume units.

use std::cmp::Ordering;

use itertools::Itertools;
use tracing::debug;

use super::entities::{LoadableItem, Loadout, LoadoutEntry};

/// Above this many item types the exact DP becomes too costly and the
/// density-greedy fallback takes over.
const EXACT_MODE_MAX_ITEMS: usize = 1000;

/// DP columns per volume unit (0.01 granularity).
const VOLUME_SCALE: f64 = 100.0;

/// Greedy fill stops once remaining capacity drops below this.
const MIN_REMAINING_VOLUME: f64 = 0.01;

/// Select the value-maximizing combination of items under a volume capacity.
///
/// Item counts up to [`EXACT_MODE_MAX_ITEMS`] are solved exactly; larger
/// catalogs fall back to a greedy fill by value density. The fallback is a
/// heuristic and is not guaranteed optimal for the bounded multi-quantity
/// case: the exact DP is O(n * capacity-units), the greedy path O(n log n).
pub fn optimize(items: &[LoadableItem], capacity: f64) -> Loadout {
    if items.is_empty() || capacity <= 0.0 {
        return Loadout::default();
    }

    let entries = if items.len() <= EXACT_MODE_MAX_ITEMS {
        exact_fill(items, capacity)
    } else {
        debug!(
            item_count = items.len(),
            "catalog too large for exact DP, using density-greedy fill"
        );
        greedy_fill(items, capacity)
    };

    build_loadout(entries, capacity)
}

/// Like [`optimize`], recording how the effective capacity was reached.
pub fn optimize_with_capacity(
    items: &[LoadableItem],
    base_capacity: f64,
    bonus_pct: f64,
) -> Loadout {
    let capacity = base_capacity * (1.0 + bonus_pct / 100.0);
    let mut loadout = optimize(items, capacity);
    loadout.base_capacity = Some(base_capacity);
    loadout.bonus_pct = Some(bonus_pct);
    loadout
}

fn build_loadout(entries: Vec<LoadoutEntry>, capacity: f64) -> Loadout {
    let total_volume: f64 = entries.iter().map(|e| e.volume).sum();
    let total_value: f64 = entries.iter().map(|e| e.value).sum();
    let utilization_pct = if capacity > 0.0 {
        total_volume / capacity * 100.0
    } else {
        0.0
    };
    Loadout {
        entries,
        total_volume,
        total_value,
        utilization_pct,
        base_capacity: None,
        bonus_pct: None,
    }
}

/// Exact DP. Each cell stores the quantity chosen for the item at that row
/// in a parallel choice table, so reconstruction reads choices directly
/// instead of re-matching floating-point values.
fn exact_fill(items: &[LoadableItem], capacity: f64) -> Vec<LoadoutEntry> {
    let width = (capacity * VOLUME_SCALE) as usize;

    let mut prev = vec![0.0_f64; width + 1];
    let mut curr = vec![0.0_f64; width + 1];
    let mut choices: Vec<Vec<u32>> = Vec::with_capacity(items.len());

    for item in items {
        let unit_units = discretized_volume(item);
        let mut row = vec![0_u32; width + 1];

        match unit_units {
            // Non-positive or sub-granularity volume: unselectable, carry
            // the previous row forward.
            None => curr.copy_from_slice(&prev),
            Some(unit_units) => {
                for w in 0..=width {
                    let mut best = prev[w];
                    let mut best_q = 0_u32;
                    // q * unit_units grows monotonically, so quantities past
                    // w / unit_units cannot fit.
                    let max_q = item.quantity.min((w / unit_units) as u64);
                    for q in 1..=max_q {
                        let used = q as usize * unit_units;
                        let value = prev[w - used] + q as f64 * item.unit_value;
                        if value > best {
                            best = value;
                            best_q = q as u32;
                        }
                    }
                    curr[w] = best;
                    row[w] = best_q;
                }
            }
        }

        choices.push(row);
        std::mem::swap(&mut prev, &mut curr);
    }

    // Walk the choice table backward from the full-capacity cell.
    let mut entries = Vec::new();
    let mut w = width;
    for (item, row) in items.iter().zip(choices.iter()).rev() {
        let quantity = row[w] as u64;
        let Some(unit_units) = discretized_volume(item) else {
            continue;
        };
        if quantity == 0 {
            continue;
        }
        entries.push(LoadoutEntry {
            type_id: item.type_id,
            quantity,
            volume: quantity as f64 * item.unit_volume,
            value: quantity as f64 * item.unit_value,
        });
        w -= quantity as usize * unit_units;
    }
    entries.reverse();
    entries
}

/// Greedy fallback: fill by descending value density.
fn greedy_fill(items: &[LoadableItem], capacity: f64) -> Vec<LoadoutEntry> {
    let mut remaining = capacity;
    let mut entries = Vec::new();

    let by_density = items
        .iter()
        .filter(|item| item.unit_volume > 0.0)
        .sorted_by(|a, b| {
            b.value_density()
                .partial_cmp(&a.value_density())
                .unwrap_or(Ordering::Equal)
        });

    for item in by_density {
        if remaining < MIN_REMAINING_VOLUME {
            break;
        }
        let fits = (remaining / item.unit_volume).floor() as u64;
        let quantity = item.quantity.min(fits);
        if quantity == 0 {
            continue;
        }
        entries.push(LoadoutEntry {
            type_id: item.type_id,
            quantity,
            volume: quantity as f64 * item.unit_volume,
            value: quantity as f64 * item.unit_value,
        });
        remaining -= quantity as f64 * item.unit_volume;
    }

    entries
}

fn discretized_volume(item: &LoadableItem) -> Option<usize> {
    if item.unit_volume <= 0.0 {
        return None;
    }
    let units = (item.unit_volume * VOLUME_SCALE).round() as usize;
    (units > 0).then_some(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(type_id: u32, unit_volume: f64, unit_value: f64, quantity: u64) -> LoadableItem {
        LoadableItem {
            type_id,
            unit_volume,
            unit_value,
            quantity,
        }
    }

    fn assert_feasible(loadout: &Loadout, items: &[LoadableItem], capacity: f64) {
        assert!(loadout.total_volume <= capacity + 0.01);
        for entry in &loadout.entries {
            let source = items
                .iter()
                .find(|i| i.type_id == entry.type_id)
                .expect("entry refers to a known item");
            assert!(entry.quantity <= source.quantity);
        }
    }

    #[test]
    fn empty_inputs_yield_empty_loadout() {
        let empty = optimize(&[], 100.0);
        assert!(empty.entries.is_empty());
        assert_eq!(empty.total_value, 0.0);
        assert_eq!(empty.utilization_pct, 0.0);

        let no_capacity = optimize(&[item(1, 1.0, 10.0, 5)], 0.0);
        assert!(no_capacity.entries.is_empty());
        assert_eq!(no_capacity.utilization_pct, 0.0);
    }

    #[test]
    fn exact_mode_finds_the_dense_optimum() {
        // A has the best value density; ten of it fill the hold exactly.
        let items = vec![
            item(1, 5.0, 60.0, 10),
            item(2, 10.0, 100.0, 5),
            item(3, 20.0, 150.0, 3),
        ];
        let loadout = optimize(&items, 50.0);

        assert_eq!(loadout.entries.len(), 1);
        assert_eq!(loadout.entries[0].type_id, 1);
        assert_eq!(loadout.entries[0].quantity, 10);
        assert!((loadout.total_value - 600.0).abs() < 1e-9);
        assert!((loadout.total_volume - 50.0).abs() < 1e-9);
        assert!((loadout.utilization_pct - 100.0).abs() < 1e-9);
        assert_feasible(&loadout, &items, 50.0);
    }

    #[test]
    fn exact_mode_mixes_item_types_when_that_wins() {
        let items = vec![item(1, 2.0, 30.0, 2), item(2, 3.0, 45.0, 1)];
        let loadout = optimize(&items, 7.0);

        // 2x item 1 + 1x item 2 uses all 7 volume for 105 value.
        assert!((loadout.total_value - 105.0).abs() < 1e-9);
        assert_eq!(loadout.entries.len(), 2);
        assert_feasible(&loadout, &items, 7.0);
    }

    #[test]
    fn exact_mode_respects_quantity_bounds() {
        // Plenty of room, but only 3 units exist.
        let items = vec![item(1, 1.0, 50.0, 3)];
        let loadout = optimize(&items, 100.0);

        assert_eq!(loadout.entries[0].quantity, 3);
        assert!((loadout.total_value - 150.0).abs() < 1e-9);
        assert_feasible(&loadout, &items, 100.0);
    }

    #[test]
    fn fractional_volumes_round_trip_through_discretization() {
        let items = vec![item(1, 0.25, 5.0, 100), item(2, 0.01, 0.1, 1000)];
        let loadout = optimize(&items, 10.0);
        assert_feasible(&loadout, &items, 10.0);
        // 40 x 0.25 = 10.0 exactly beats any mix with the filler item.
        assert!((loadout.total_value - 200.0).abs() < 1e-9);
    }

    #[test]
    fn capacity_breakdown_is_recorded() {
        let items = vec![item(1, 1.0, 10.0, 200)];
        let loadout = optimize_with_capacity(&items, 100.0, 25.0);

        assert_eq!(loadout.base_capacity, Some(100.0));
        assert_eq!(loadout.bonus_pct, Some(25.0));
        // effective capacity 125 -> 125 units fit
        assert_eq!(loadout.entries[0].quantity, 125);
    }

    #[test]
    fn large_catalogs_use_the_greedy_path_and_stay_feasible() {
        let items: Vec<LoadableItem> = (0..1500)
            .map(|i| item(i, 1.0 + (i % 7) as f64 * 0.5, 10.0 + (i % 13) as f64, 4))
            .collect();
        let loadout = optimize(&items, 200.0);

        assert_feasible(&loadout, &items, 200.0);
        assert!(loadout.total_value > 0.0);
        // Chosen entries must be ordered by non-increasing density.
        let densities: Vec<f64> = loadout
            .entries
            .iter()
            .map(|e| e.value / e.volume)
            .collect();
        for pair in densities.windows(2) {
            assert!(pair[0] >= pair[1] - 1e-9);
        }
    }
}
