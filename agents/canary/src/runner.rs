//! The canary loop: draw, call, record, sleep.

use agent_faults::{FaultDirective, FaultKind, FaultWeights};
use rand::Rng;
use std::collections::BTreeMap;
use tokio::sync::watch;
use tracing::{info, warn};
use travel_planner::client::PlannerClient;
use travel_planner::PlanRequest;

use crate::config::CanaryConfig;
use crate::error::{CanaryError, Result};
use crate::stats::{CanaryStats, CycleOutcome};

/// Delay carried by a drawn `high_latency`
pub const HIGH_LATENCY_DELAY_MS: u64 = 3000;

/// Where a drawn fault is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultTarget {
    /// No fault field at all
    Nothing,
    Orchestrator,
    Agent(String),
}

/// Agent that serves listings, the only one `wrong_city` and `empty` change
pub const LISTINGS_AGENT: &str = "events";

/// Route a fault type to its target. `pick` chooses an index into
/// `targets` for agent-level faults.
pub fn target_for(kind: FaultKind, targets: &[String], pick: impl FnOnce(usize) -> usize) -> FaultTarget {
    match kind {
        FaultKind::None => FaultTarget::Nothing,
        FaultKind::WrongCity | FaultKind::Empty => {
            match targets.iter().find(|t| t.as_str() == LISTINGS_AGENT) {
                Some(agent) => FaultTarget::Agent(agent.clone()),
                None => FaultTarget::Nothing,
            }
        }
        FaultKind::PartialFailure | FaultKind::FanOutTimeout => FaultTarget::Orchestrator,
        FaultKind::HighLatency
        | FaultKind::ToolTimeout
        | FaultKind::ToolError
        | FaultKind::RateLimited
        | FaultKind::TokenLimitExceeded
        | FaultKind::Hallucination
        | FaultKind::WrongTool => match targets.len() {
            0 => FaultTarget::Nothing,
            n => FaultTarget::Agent(targets[pick(n).min(n - 1)].clone()),
        },
    }
}

/// Build the plan request for one draw.
pub fn plan_request(destination: &str, kind: FaultKind, target: &FaultTarget) -> PlanRequest {
    let request = PlanRequest::new(destination);
    let mut directive = FaultDirective::new(kind);
    if kind == FaultKind::HighLatency {
        directive = directive.with_delay_ms(HIGH_LATENCY_DELAY_MS);
    }

    match target {
        FaultTarget::Nothing => request,
        FaultTarget::Orchestrator => request.with_orchestrator_fault(directive),
        FaultTarget::Agent(agent) => request.with_agent_fault(agent.clone(), directive),
    }
}

/// Draw `count` fault types offline.
pub fn sample_histogram<R: Rng + ?Sized>(
    weights: &FaultWeights,
    count: usize,
    rng: &mut R,
) -> BTreeMap<FaultKind, usize> {
    let mut histogram = BTreeMap::new();
    for _ in 0..count {
        *histogram.entry(weights.draw(rng)).or_default() += 1;
    }
    histogram
}

/// One cycle's choices
#[derive(Debug, Clone)]
pub struct Draw {
    pub destination: String,
    pub fault: FaultKind,
    pub target: FaultTarget,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub draw: Draw,
    pub outcome: CycleOutcome,
    pub errors: usize,
}

pub struct Canary {
    config: CanaryConfig,
    client: PlannerClient,
    stats: CanaryStats,
    snapshot: watch::Sender<CanaryStats>,
}

impl Canary {
    pub fn new(config: CanaryConfig) -> Result<Self> {
        config.validate()?;
        let client = PlannerClient::new(&config.planner_url).with_timeout(config.request_timeout);
        let (snapshot, _) = watch::channel(CanaryStats::default());
        Ok(Self {
            config,
            client,
            stats: CanaryStats::default(),
            snapshot,
        })
    }

    pub fn config(&self) -> &CanaryConfig {
        &self.config
    }

    pub fn stats(&self) -> &CanaryStats {
        &self.stats
    }

    /// Latest counters, updated after every cycle
    pub fn subscribe(&self) -> watch::Receiver<CanaryStats> {
        self.snapshot.subscribe()
    }

    /// Poll the planner's health endpoint until it answers.
    pub async fn wait_until_healthy(&self) -> Result<()> {
        for attempt in 1..=self.config.health_attempts {
            match self.client.health().await {
                Ok(health) => {
                    info!(
                        agent_id = %health.agent_id,
                        sub_agents = ?health.sub_agents,
                        "Travel planner is healthy"
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Health check failed");
                    if attempt < self.config.health_attempts {
                        tokio::time::sleep(self.config.health_interval).await;
                    }
                }
            }
        }

        Err(CanaryError::NotReady {
            url: self.config.planner_url.clone(),
            attempts: self.config.health_attempts,
        })
    }

    /// Choose destination, fault type and target for one cycle.
    pub fn draw(&self) -> Draw {
        let mut rng = rand::thread_rng();
        let destination = self.config.destinations[rng.gen_range(0..self.config.destinations.len())].clone();
        let fault = self.config.weights.draw(&mut rng);
        let target = target_for(fault, &self.config.targets, |n| rng.gen_range(0..n));
        Draw {
            destination,
            fault,
            target,
        }
    }

    /// Run one plan call and record its outcome.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let draw = self.draw();
        let request = plan_request(&draw.destination, draw.fault, &draw.target);

        let (outcome, errors) = match self.client.plan(&request, None).await {
            Ok(response) if response.partial => (CycleOutcome::Partial, response.errors.len()),
            Ok(_) => (CycleOutcome::Success, 0),
            Err(e) => {
                warn!(destination = %draw.destination, error = %e, "Plan call failed");
                (CycleOutcome::Error, 0)
            }
        };

        self.stats.record(draw.fault, outcome);
        self.snapshot.send_replace(self.stats.clone());

        info!(
            cycle = self.stats.cycles,
            destination = %draw.destination,
            fault = draw.fault.as_str(),
            target = ?draw.target,
            outcome = outcome.as_str(),
            errors,
            success_rate = self.stats.success_rate(),
            "Cycle complete"
        );

        if self.stats.cycles % self.config.report_every == 0 {
            info!(
                cycles = self.stats.cycles,
                successes = self.stats.successes,
                partials = self.stats.partials,
                errors = self.stats.errors,
                by_fault = ?self.stats.by_fault,
                "Canary report"
            );
        }

        CycleReport {
            draw,
            outcome,
            errors,
        }
    }

    /// Run cycles until `max_cycles` is reached, or forever.
    pub async fn run(&mut self, max_cycles: Option<u64>) -> Result<()> {
        self.wait_until_healthy().await?;
        info!(
            url = %self.config.planner_url,
            interval_secs = self.config.interval.as_secs(),
            "Starting canary cycles"
        );

        loop {
            self.run_cycle().await;
            if max_cycles.is_some_and(|max| self.stats.cycles >= max) {
                return Ok(());
            }
            tokio::time::sleep(self.config.interval).await;
        }
    }
}
