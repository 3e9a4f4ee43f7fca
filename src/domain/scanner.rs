//! Profitability scanner: turns a raw regional order book into a filtered
//! set of haulable opportunities.

use std::collections::HashMap;

use itertools::Itertools;
use tracing::{debug, warn};

use super::entities::{Opportunity, Order};
use super::services::ItemMasterData;

/// Spreads below this are not worth the trip.
pub const DEFAULT_MIN_SPREAD_PCT: f64 = 5.0;

/// An item must be able to fill at least this share of capacity in one tour.
const MIN_CARGO_UTILIZATION: f64 = 0.10;

/// Scan a deduplicated regional order book for two-sided spreads.
///
/// Per item: the lowest sell order is where a trader buys stock, the highest
/// buy order is where the stock is offloaded. Items missing either side have
/// no two-sided market and are dropped. The spread test runs before any
/// master-data lookup: it is cheap and prunes most items before the costlier
/// name/volume calls.
///
/// A failed master-data lookup skips that one item; it never aborts the scan.
pub async fn scan(
    orders: &[Order],
    effective_capacity: f64,
    min_spread_pct: f64,
    items: &dyn ItemMasterData,
) -> Vec<Opportunity> {
    let mut best: HashMap<u32, Sides<'_>> = HashMap::new();
    for order in orders {
        let entry = best.entry(order.type_id).or_default();
        if order.is_sell() {
            if entry.lowest_sell.map(|o| order.price < o.price).unwrap_or(true) {
                entry.lowest_sell = Some(order);
            }
        } else if entry.highest_buy.map(|o| order.price > o.price).unwrap_or(true) {
            entry.highest_buy = Some(order);
        }
    }

    let mut opportunities = Vec::new();

    for (type_id, sides) in best.into_iter().sorted_by_key(|(type_id, _)| *type_id) {
        let (Some(sell), Some(buy)) = (sides.lowest_sell, sides.highest_buy) else {
            continue; // no two-sided market
        };
        if sell.price <= 0.0 {
            continue;
        }

        let spread_pct = (buy.price - sell.price) / sell.price * 100.0;
        if spread_pct < min_spread_pct {
            continue;
        }

        let available_quantity = sell.volume_remain.min(buy.volume_remain);
        if available_quantity == 0 {
            continue;
        }

        let unit_volume = match items.item_volume(type_id).await {
            Ok(volume) if volume > 0.0 => volume,
            Ok(volume) => {
                warn!(type_id, volume, "skipping item with non-positive volume");
                continue;
            }
            Err(err) => {
                warn!(type_id, %err, "volume lookup failed, skipping item");
                continue;
            }
        };

        // Volume viability: the item must reach the minimum-utilization bar
        // within a single tour.
        let min_quantity = ((effective_capacity * MIN_CARGO_UTILIZATION / unit_volume).floor()
            as u64)
            .max(1);
        if min_quantity as f64 * unit_volume > effective_capacity {
            debug!(type_id, unit_volume, "item too bulky for minimum utilization");
            continue;
        }

        let info = match items.type_info(type_id).await {
            Ok(info) => info,
            Err(err) => {
                warn!(type_id, %err, "type lookup failed, skipping item");
                continue;
            }
        };

        opportunities.push(Opportunity {
            type_id,
            type_name: info.name,
            unit_volume,
            buy_location_id: sell.location_id,
            buy_system_id: sell.system_id,
            buy_price: sell.price,
            sell_location_id: buy.location_id,
            sell_system_id: buy.system_id,
            sell_price: buy.price,
            spread_pct,
            available_quantity,
            available_volume: available_quantity as f64 * unit_volume,
        });
    }

    opportunities
}

#[derive(Default)]
struct Sides<'a> {
    lowest_sell: Option<&'a Order>,
    highest_buy: Option<&'a Order>,
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::SystemTime;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::entities::{OrderSide, TypeInfo};
    use crate::domain::services::{ItemMasterData, ServiceError};

    struct StubMasterData {
        volumes: HashMap<u32, f64>,
    }

    impl StubMasterData {
        fn with_volumes(entries: &[(u32, f64)]) -> Self {
            Self {
                volumes: entries.iter().copied().collect(),
            }
        }
    }

    #[async_trait]
    impl ItemMasterData for StubMasterData {
        async fn type_info(&self, type_id: u32) -> Result<TypeInfo, ServiceError> {
            if self.volumes.contains_key(&type_id) {
                Ok(TypeInfo {
                    type_id,
                    name: format!("Type {type_id}"),
                })
            } else {
                Err(ServiceError::Lookup(format!("unknown type {type_id}")))
            }
        }

        async fn item_volume(&self, type_id: u32) -> Result<f64, ServiceError> {
            self.volumes
                .get(&type_id)
                .copied()
                .ok_or_else(|| ServiceError::Lookup(format!("unknown type {type_id}")))
        }
    }

    fn order(type_id: u32, side: OrderSide, price: f64, remain: u64) -> Order {
        Order {
            order_id: (type_id as u64) * 1000 + price as u64,
            type_id,
            location_id: 60_000_000 + type_id as u64,
            system_id: 30_000_000 + type_id,
            side,
            price,
            volume_total: remain,
            volume_remain: remain,
            min_volume: None,
            issued: SystemTime::now(),
            duration_days: 90,
        }
    }

    #[tokio::test]
    async fn emits_only_spreads_above_minimum() {
        let orders = vec![
            order(34, OrderSide::Sell, 100.0, 500),
            order(34, OrderSide::Buy, 110.0, 400),
            order(35, OrderSide::Sell, 100.0, 500),
            order(35, OrderSide::Buy, 103.0, 400), // 3%, below the bar
        ];
        let data = StubMasterData::with_volumes(&[(34, 0.01), (35, 0.01)]);

        let found = scan(&orders, 1000.0, DEFAULT_MIN_SPREAD_PCT, &data).await;

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].type_id, 34);
        for opp in &found {
            let expected = (opp.sell_price - opp.buy_price) / opp.buy_price * 100.0;
            assert!((opp.spread_pct - expected).abs() < 1e-9);
            assert!(opp.spread_pct >= DEFAULT_MIN_SPREAD_PCT);
        }
    }

    #[tokio::test]
    async fn drops_one_sided_markets() {
        let orders = vec![
            order(34, OrderSide::Sell, 100.0, 500),
            order(35, OrderSide::Buy, 110.0, 400),
        ];
        let data = StubMasterData::with_volumes(&[(34, 0.01), (35, 0.01)]);

        let found = scan(&orders, 1000.0, DEFAULT_MIN_SPREAD_PCT, &data).await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn bottlenecks_quantity_on_the_thinner_side() {
        let orders = vec![
            order(34, OrderSide::Sell, 100.0, 500),
            order(34, OrderSide::Buy, 120.0, 60),
        ];
        let data = StubMasterData::with_volumes(&[(34, 0.5)]);

        let found = scan(&orders, 1000.0, DEFAULT_MIN_SPREAD_PCT, &data).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].available_quantity, 60);
        assert!((found[0].available_volume - 30.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn rejects_items_that_cannot_reach_minimum_utilization() {
        // unit volume 600 against capacity 1000: one unit is already above
        // the 10% bar but min_quantity * volume still fits, so it stays;
        // unit volume 1200 cannot fit a single unit.
        let orders = vec![
            order(34, OrderSide::Sell, 100.0, 500),
            order(34, OrderSide::Buy, 120.0, 400),
            order(35, OrderSide::Sell, 100.0, 500),
            order(35, OrderSide::Buy, 120.0, 400),
        ];
        let data = StubMasterData::with_volumes(&[(34, 600.0), (35, 1200.0)]);

        let found = scan(&orders, 1000.0, DEFAULT_MIN_SPREAD_PCT, &data).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].type_id, 34);

        // Volume-viability invariant on everything emitted.
        for opp in &found {
            let min_q = (1000.0 * 0.10 / opp.unit_volume).ceil();
            assert!(opp.unit_volume * min_q <= 1000.0 + 1e-9);
        }
    }

    #[tokio::test]
    async fn lookup_failure_skips_item_without_aborting_scan() {
        let orders = vec![
            order(34, OrderSide::Sell, 100.0, 500),
            order(34, OrderSide::Buy, 120.0, 400),
            order(99, OrderSide::Sell, 10.0, 500),
            order(99, OrderSide::Buy, 20.0, 400),
        ];
        // 99 is unknown to master data.
        let data = StubMasterData::with_volumes(&[(34, 0.01)]);

        let found = scan(&orders, 1000.0, DEFAULT_MIN_SPREAD_PCT, &data).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].type_id, 34);
    }
}
