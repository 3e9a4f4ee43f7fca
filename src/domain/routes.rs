//! Tour sizing, haul timing and profitability math, plus the response
//! post-processing applied to every pipeline run.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::entities::{Opportunity, Route};

/// Planning horizon: at most this many load-and-deliver cycles per
/// opportunity.
pub const MAX_TOURS: u32 = 10;

/// Same-location hauls still spend time cycling orders; this stands in for
/// an otherwise zero-length trip.
pub const MIN_ONE_WAY_SECONDS: f64 = 300.0;

/// Result cap after ranking.
pub const MAX_RESULTS: usize = 50;

/// How many units fit per tour and how many tours the available volume asks
/// for (capped at [`MAX_TOURS`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TourPlan {
    pub quantity_per_tour: u64,
    pub tours: u32,
    pub total_quantity: u64,
}

/// Size the tours for one opportunity. `None` means not a single unit fits
/// the hold, so the opportunity is infeasible for this vehicle.
pub fn plan_tours(opportunity: &Opportunity, effective_capacity: f64) -> Option<TourPlan> {
    if opportunity.unit_volume <= 0.0 {
        return None;
    }
    let quantity_per_tour = (effective_capacity / opportunity.unit_volume).floor() as u64;
    if quantity_per_tour == 0 {
        return None;
    }

    let tours = if opportunity.available_volume > 0.0 && effective_capacity > 0.0 {
        ((opportunity.available_volume / effective_capacity).ceil() as u32).clamp(1, MAX_TOURS)
    } else {
        1
    };

    let total_quantity = opportunity
        .available_quantity
        .min(quantity_per_tour * tours as u64);

    Some(TourPlan {
        quantity_per_tour,
        tours,
        total_quantity,
    })
}

/// Travel seconds for a whole batch of tours; the final tour does not
/// return.
pub fn batch_seconds(tours: u32, one_way_seconds: f64) -> f64 {
    let round_trip = 2.0 * one_way_seconds;
    tours.saturating_sub(1) as f64 * round_trip + one_way_seconds
}

/// A zero-length leg (same system, or an empty path) is replaced by the
/// minimum interval.
pub fn effective_one_way(seconds: f64, jumps: u32) -> f64 {
    if jumps == 0 || seconds <= 0.0 {
        MIN_ONE_WAY_SECONDS
    } else {
        seconds
    }
}

/// Net profit scaled to an hourly figure. Long hauls get the proportional
/// share of the hour, not a naive per-tour extrapolation.
pub fn profit_per_hour(net_profit: f64, total_seconds: f64) -> f64 {
    if total_seconds > 0.0 {
        net_profit * (3600.0 / total_seconds)
    } else {
        0.0
    }
}

/// Optional per-request narrowing applied during post-processing, before the
/// result cap.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteFilter {
    /// Upper bound on buy-side outlay (buy price x total quantity).
    pub max_investment: Option<f64>,
    pub min_profit_per_hour: Option<f64>,
    pub max_jumps: Option<u32>,
}

impl RouteFilter {
    pub fn matches(&self, route: &Route) -> bool {
        if let Some(max) = self.max_investment {
            let investment = route.opportunity.buy_price * route.total_quantity as f64;
            if investment > max {
                return false;
            }
        }
        if let Some(min) = self.min_profit_per_hour {
            if route.profit_per_hour < min {
                return false;
            }
        }
        if let Some(max) = self.max_jumps {
            if route.jumps > max {
                return false;
            }
        }
        true
    }
}

/// Drop unprofitable routes, apply the filter, rank by profit per hour and
/// cap the list. Idempotent: running it on its own output changes nothing.
pub fn post_process(mut routes: Vec<Route>, filter: &RouteFilter) -> Vec<Route> {
    routes.retain(|r| r.net_profit > 0.0 && filter.matches(r));
    routes.sort_by(compare_routes);
    routes.truncate(MAX_RESULTS);
    routes
}

fn compare_routes(a: &Route, b: &Route) -> Ordering {
    b.profit_per_hour
        .partial_cmp(&a.profit_per_hour)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            b.net_profit
                .partial_cmp(&a.net_profit)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.opportunity.type_id.cmp(&b.opportunity.type_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opportunity(type_id: u32, unit_volume: f64, available_quantity: u64) -> Opportunity {
        Opportunity {
            type_id,
            type_name: format!("Type {type_id}"),
            unit_volume,
            buy_location_id: 60_000_001,
            buy_system_id: 30_000_001,
            buy_price: 100.0,
            sell_location_id: 60_000_002,
            sell_system_id: 30_000_002,
            sell_price: 120.0,
            spread_pct: 20.0,
            available_quantity,
            available_volume: available_quantity as f64 * unit_volume,
        }
    }

    fn route(type_id: u32, net_profit: f64, profit_per_hour: f64) -> Route {
        Route {
            opportunity: opportunity(type_id, 1.0, 100),
            tours: 1,
            quantity_per_tour: 100,
            total_quantity: 100,
            jumps: 3,
            one_way_seconds: 600.0,
            round_trip_seconds: 1200.0,
            total_seconds: 600.0,
            gross_profit: net_profit + 50.0,
            broker_fees: 40.0,
            sales_tax: 10.0,
            net_profit,
            cargo_utilization_pct: 100.0,
            profit_per_hour,
        }
    }

    #[test]
    fn tour_count_never_exceeds_the_cap() {
        // Enough volume on the market for hundreds of trips.
        let opp = opportunity(34, 1.0, 5_000_000);
        let plan = plan_tours(&opp, 1000.0).unwrap();

        assert_eq!(plan.tours, MAX_TOURS);
        assert_eq!(plan.quantity_per_tour, 1000);
        assert_eq!(plan.total_quantity, 10_000);
        assert!(plan.total_quantity <= plan.quantity_per_tour * plan.tours as u64);
    }

    #[test]
    fn single_tour_when_everything_fits() {
        let opp = opportunity(34, 2.0, 100);
        let plan = plan_tours(&opp, 1000.0).unwrap();

        assert_eq!(plan.tours, 1);
        assert_eq!(plan.total_quantity, 100);
    }

    #[test]
    fn oversized_items_are_infeasible() {
        let opp = opportunity(34, 2000.0, 10);
        assert!(plan_tours(&opp, 1000.0).is_none());
    }

    #[test]
    fn batch_time_skips_the_final_return_leg() {
        assert_eq!(batch_seconds(1, 600.0), 600.0);
        assert_eq!(batch_seconds(3, 600.0), 2.0 * 1200.0 + 600.0);
    }

    #[test]
    fn zero_length_legs_get_the_minimum_interval() {
        assert_eq!(effective_one_way(0.0, 0), MIN_ONE_WAY_SECONDS);
        assert_eq!(effective_one_way(450.0, 0), MIN_ONE_WAY_SECONDS);
        assert_eq!(effective_one_way(450.0, 2), 450.0);
    }

    #[test]
    fn hourly_profit_scales_proportionally_for_long_hauls() {
        assert!((profit_per_hour(1000.0, 7200.0) - 500.0).abs() < 1e-9);
        assert!((profit_per_hour(1000.0, 1800.0) - 2000.0).abs() < 1e-9);
        assert_eq!(profit_per_hour(1000.0, 0.0), 0.0);
    }

    #[test]
    fn post_processing_filters_sorts_and_caps() {
        let mut routes = Vec::new();
        for i in 0..60 {
            routes.push(route(i, 100.0 + i as f64, 1000.0 + i as f64));
        }
        routes.push(route(999, -5.0, 9999.0)); // unprofitable, must vanish

        let processed = post_process(routes, &RouteFilter::default());

        assert_eq!(processed.len(), MAX_RESULTS);
        assert!(processed.iter().all(|r| r.net_profit > 0.0));
        for pair in processed.windows(2) {
            assert!(pair[0].profit_per_hour >= pair[1].profit_per_hour);
        }
    }

    #[test]
    fn post_processing_is_idempotent() {
        let routes: Vec<Route> = (0..60)
            .map(|i| route(i, 50.0 + i as f64, 500.0 + (i % 7) as f64))
            .collect();
        let filter = RouteFilter {
            min_profit_per_hour: Some(501.0),
            ..RouteFilter::default()
        };

        let once = post_process(routes, &filter);
        let twice = post_process(once.clone(), &filter);

        assert_eq!(once, twice);
    }

    #[test]
    fn filter_narrows_by_investment_and_jumps() {
        let cheap = route(1, 100.0, 1000.0); // investment 100 * 100 = 10_000
        let mut far = route(2, 100.0, 1000.0);
        far.jumps = 20;

        let filter = RouteFilter {
            max_investment: Some(15_000.0),
            max_jumps: Some(10),
            ..RouteFilter::default()
        };

        assert!(filter.matches(&cheap));
        assert!(!filter.matches(&far));
    }
}
