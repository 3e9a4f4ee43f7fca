//! The route pipeline: fan-out evaluation of scanned opportunities and the
//! three-phase orchestration that serves one query.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{
    batch_seconds, effective_one_way, plan_tours, post_process, profit_per_hour, scan,
    CapacityBreakdown, CapacityResolver, FeeSchedule, ItemMasterData, Opportunity,
    OrderBookProvider, Route, RouteFilter, RunResult, ServiceError, SkillSet, TravelTimeService,
    VehicleProfile, DEFAULT_MIN_SPREAD_PCT,
};

/// Worker pool size for route evaluation.
pub const DEFAULT_WORKERS: usize = 50;

/// Per-request knobs and phase budgets. The market and route budgets nest
/// inside the overall deadline.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub min_spread_pct: f64,
    pub workers: usize,
    pub overall_deadline: Duration,
    pub market_fetch_deadline: Duration,
    pub route_calc_deadline: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_spread_pct: DEFAULT_MIN_SPREAD_PCT,
            workers: DEFAULT_WORKERS,
            overall_deadline: Duration::from_secs(30),
            market_fetch_deadline: Duration::from_secs(10),
            route_calc_deadline: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown vehicle type {vehicle_type_id}: {source}")]
    UnknownVehicle {
        vehicle_type_id: u32,
        source: ServiceError,
    },
    #[error("market data unavailable for region {region_id}: {source}")]
    MarketData {
        region_id: u32,
        source: ServiceError,
    },
    #[error("market data for region {region_id} did not arrive within the fetch budget")]
    MarketDataTimeout { region_id: u32 },
}

/// One client query.
#[derive(Clone, Debug, Default)]
pub struct RunRequest {
    pub region_id: u32,
    pub vehicle_type_id: u32,
    pub skills: SkillSet,
    pub filter: RouteFilter,
}

/// Whether the evaluation phase finished everything it was handed or was
/// cut short by its deadline.
#[derive(Debug)]
pub enum EvaluationOutcome {
    Complete(Vec<Route>),
    Partial(Vec<Route>),
}

impl EvaluationOutcome {
    pub fn into_parts(self) -> (Vec<Route>, bool) {
        match self {
            EvaluationOutcome::Complete(routes) => (routes, false),
            EvaluationOutcome::Partial(routes) => (routes, true),
        }
    }
}

/// Everything a worker needs to cost one opportunity.
struct WorkerContext {
    travel: Arc<dyn TravelTimeService>,
    fees: Arc<dyn FeeSchedule>,
    capacity: CapacityBreakdown,
    vehicle: VehicleProfile,
    skills: SkillSet,
}

/// Fan-out evaluator: a fixed pool of workers pulls opportunities from a
/// shared queue and publishes finished routes to a collector.
pub struct RouteEvaluator {
    travel: Arc<dyn TravelTimeService>,
    fees: Arc<dyn FeeSchedule>,
    workers: usize,
}

impl RouteEvaluator {
    pub fn new(travel: Arc<dyn TravelTimeService>, fees: Arc<dyn FeeSchedule>) -> Self {
        Self {
            travel,
            fees,
            workers: DEFAULT_WORKERS,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Evaluate a batch under a deadline. Workers check the cancellation
    /// token before starting an opportunity and before publishing, so a
    /// fired deadline stops the pool promptly; whatever was already
    /// collected comes back as a partial result.
    pub async fn evaluate(
        &self,
        opportunities: Vec<Opportunity>,
        capacity: CapacityBreakdown,
        vehicle: VehicleProfile,
        skills: SkillSet,
        deadline: Duration,
        cancel: CancellationToken,
    ) -> EvaluationOutcome {
        if opportunities.is_empty() {
            return EvaluationOutcome::Complete(Vec::new());
        }

        let worker_count = self.workers.min(opportunities.len());
        let (work_tx, work_rx) = mpsc::channel::<Opportunity>(opportunities.len().min(256));
        let work_rx = Arc::new(Mutex::new(work_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<Route>(64);

        let context = Arc::new(WorkerContext {
            travel: Arc::clone(&self.travel),
            fees: Arc::clone(&self.fees),
            capacity,
            vehicle,
            skills,
        });

        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            workers.push(tokio::spawn(worker_loop(
                Arc::clone(&work_rx),
                result_tx.clone(),
                Arc::clone(&context),
                cancel.clone(),
            )));
        }
        // The collector's drain loop ends when the last worker drops its
        // sender.
        drop(result_tx);

        let feeder_cancel = cancel.clone();
        let feeder = tokio::spawn(async move {
            for opportunity in opportunities {
                if feeder_cancel.is_cancelled() {
                    break;
                }
                if work_tx.send(opportunity).await.is_err() {
                    break;
                }
            }
        });

        let deadline_at = Instant::now() + deadline;
        let mut routes = Vec::new();
        let mut timed_out = false;

        loop {
            tokio::select! {
                maybe_route = result_rx.recv() => match maybe_route {
                    Some(route) => routes.push(route),
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline_at) => {
                    timed_out = true;
                    cancel.cancel();
                    break;
                }
                _ = cancel.cancelled() => {
                    timed_out = true;
                    break;
                }
            }
        }

        if timed_out {
            // Keep what already reached the channel, then stop the pool.
            while let Ok(route) = result_rx.try_recv() {
                routes.push(route);
            }
            feeder.abort();
            for worker in &workers {
                worker.abort();
            }
            debug!(collected = routes.len(), "evaluation cut short by deadline");
            EvaluationOutcome::Partial(routes)
        } else {
            EvaluationOutcome::Complete(routes)
        }
    }
}

async fn worker_loop(
    work: Arc<Mutex<mpsc::Receiver<Opportunity>>>,
    results: mpsc::Sender<Route>,
    context: Arc<WorkerContext>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }
        let next = { work.lock().await.recv().await };
        let Some(opportunity) = next else {
            return;
        };
        if cancel.is_cancelled() {
            return;
        }

        match evaluate_opportunity(&opportunity, &context).await {
            Ok(Some(route)) => {
                if cancel.is_cancelled() {
                    return;
                }
                if results.send(route).await.is_err() {
                    return;
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(
                    type_id = opportunity.type_id,
                    %err,
                    "route evaluation failed, dropping opportunity"
                );
            }
        }
    }
}

/// Cost one opportunity. `Ok(None)` means infeasible for this vehicle
/// (nothing fits the hold), which is not an error for the batch.
async fn evaluate_opportunity(
    opportunity: &Opportunity,
    context: &WorkerContext,
) -> Result<Option<Route>, ServiceError> {
    let Some(plan) = plan_tours(opportunity, context.capacity.effective) else {
        debug!(
            type_id = opportunity.type_id,
            unit_volume = opportunity.unit_volume,
            "opportunity does not fit the hold, skipping"
        );
        return Ok(None);
    };

    let travel = context
        .travel
        .travel_time(
            opportunity.buy_system_id,
            opportunity.sell_system_id,
            &context.vehicle,
        )
        .await?;
    let one_way_seconds = effective_one_way(travel.seconds, travel.jumps);
    let round_trip_seconds = 2.0 * one_way_seconds;
    let total_seconds = batch_seconds(plan.tours, one_way_seconds);

    let quantity = plan.total_quantity as f64;
    let buy_value = opportunity.buy_price * quantity;
    let sell_value = opportunity.sell_price * quantity;
    let broker_fees = context.fees.broker_fee(context.skills.broker_relations, buy_value)
        + context.fees.broker_fee(context.skills.broker_relations, sell_value);
    let sales_tax = context.fees.sales_tax(context.skills.accounting, sell_value);

    let gross_profit = (opportunity.sell_price - opportunity.buy_price) * quantity;
    let net_profit = gross_profit - broker_fees - sales_tax;

    let moved_volume = quantity * opportunity.unit_volume;
    let cargo_utilization_pct =
        moved_volume / (plan.tours as f64 * context.capacity.effective) * 100.0;

    Ok(Some(Route {
        opportunity: opportunity.clone(),
        tours: plan.tours,
        quantity_per_tour: plan.quantity_per_tour,
        total_quantity: plan.total_quantity,
        jumps: travel.jumps,
        one_way_seconds,
        round_trip_seconds,
        total_seconds,
        gross_profit,
        broker_fees,
        sales_tax,
        net_profit,
        cargo_utilization_pct,
        profit_per_hour: profit_per_hour(net_profit, total_seconds),
    }))
}

/// The three-phase pipeline behind one query: resolve capacity, scan the
/// market, evaluate routes, then filter/rank/cap.
pub struct RoutePipeline {
    orders: Arc<dyn OrderBookProvider>,
    items: Arc<dyn ItemMasterData>,
    capacity: Arc<dyn CapacityResolver>,
    travel: Arc<dyn TravelTimeService>,
    fees: Arc<dyn FeeSchedule>,
    config: PipelineConfig,
}

impl RoutePipeline {
    pub fn new(
        orders: Arc<dyn OrderBookProvider>,
        items: Arc<dyn ItemMasterData>,
        capacity: Arc<dyn CapacityResolver>,
        travel: Arc<dyn TravelTimeService>,
        fees: Arc<dyn FeeSchedule>,
    ) -> Self {
        Self {
            orders,
            items,
            capacity,
            travel,
            fees,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn run(&self, request: RunRequest) -> Result<RunResult, PipelineError> {
        let started = std::time::Instant::now();
        let run_id = Uuid::new_v4();
        let overall_deadline = Instant::now() + self.config.overall_deadline;
        let cancel = CancellationToken::new();

        // Phase 1: capacity resolution. An unknown vehicle is a bad request;
        // a failing resolver degrades to the base figure.
        let vehicle = self.capacity.vehicle(request.vehicle_type_id).map_err(|source| {
            PipelineError::UnknownVehicle {
                vehicle_type_id: request.vehicle_type_id,
                source,
            }
        })?;
        let capacity = match self
            .capacity
            .effective_capacity(request.vehicle_type_id, &request.skills)
            .await
        {
            Ok(breakdown) => breakdown,
            Err(err) => {
                warn!(
                    run_id = %run_id,
                    %err,
                    "capacity resolution failed, falling back to base capacity"
                );
                CapacityBreakdown::base_only(vehicle.base_capacity)
            }
        };

        // Phase 2: market scan. Without market data there is nothing to
        // evaluate, so a blown budget fails the request.
        let market_budget = self
            .config
            .market_fetch_deadline
            .min(remaining(overall_deadline));
        let scanned = tokio::time::timeout(market_budget, async {
            let orders = self.orders.fetch_orders(request.region_id).await?;
            debug!(run_id = %run_id, orders = orders.len(), "order book fetched");
            Ok::<_, ServiceError>(
                scan(
                    &orders,
                    capacity.effective,
                    self.config.min_spread_pct,
                    self.items.as_ref(),
                )
                .await,
            )
        })
        .await;

        let opportunities = match scanned {
            Ok(Ok(opportunities)) => opportunities,
            Ok(Err(source)) => {
                return Err(PipelineError::MarketData {
                    region_id: request.region_id,
                    source,
                })
            }
            Err(_elapsed) => {
                return Err(PipelineError::MarketDataTimeout {
                    region_id: request.region_id,
                })
            }
        };
        info!(
            run_id = %run_id,
            region_id = request.region_id,
            candidates = opportunities.len(),
            "market scan complete"
        );

        // Phase 3: route evaluation. A blown budget keeps the partial list
        // and flags the response instead of failing it.
        let route_budget = self
            .config
            .route_calc_deadline
            .min(remaining(overall_deadline));
        let evaluator = RouteEvaluator::new(Arc::clone(&self.travel), Arc::clone(&self.fees))
            .with_workers(self.config.workers);
        let outcome = evaluator
            .evaluate(
                opportunities,
                capacity,
                vehicle,
                request.skills,
                route_budget,
                cancel.child_token(),
            )
            .await;
        let (routes, timed_out) = outcome.into_parts();
        let warning = timed_out.then(|| {
            "route evaluation exceeded its time budget; results are partial".to_string()
        });

        let routes = post_process(routes, &request.filter);
        info!(
            run_id = %run_id,
            routes = routes.len(),
            partial = timed_out,
            "pipeline run finished"
        );

        Ok(RunResult {
            run_id,
            region_id: request.region_id,
            vehicle_type_id: request.vehicle_type_id,
            effective_capacity: capacity.effective,
            routes,
            elapsed_ms: started.elapsed().as_millis() as u64,
            warning,
        })
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}
