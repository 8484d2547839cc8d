//! Runs one cycle end to end: config poll, position snapshot, evaluation,
//! submission, fill confirmation.

use chrono::{DateTime, Utc};
use tracing::warn;

use super::orchestrator::{CycleOutput, Orchestrator};
use crate::config::ConfigProvider;
use crate::domain::{FillRecord, IntentId, SubmissionOutcome, Tick};
use crate::gateway::OrderGateway;

#[derive(Debug, Default)]
pub struct CycleReport {
    pub output: CycleOutput,
    pub fills: Vec<FillRecord>,
    pub rejected: Vec<(IntentId, String)>,
    pub config_changed: bool,
}

pub struct Driver<G, P> {
    orchestrator: Orchestrator,
    gateway: G,
    provider: P,
}

impl<G: OrderGateway, P: ConfigProvider> Driver<G, P> {
    pub fn new(orchestrator: Orchestrator, gateway: G, provider: P) -> Self {
        Self {
            orchestrator,
            gateway,
            provider,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator {
        &mut self.orchestrator
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    /// One polling interval. A failing config poll keeps the current config.
    pub fn step(&mut self, now: DateTime<Utc>, ticks: &[Tick]) -> CycleReport {
        let mut report = CycleReport {
            config_changed: match self.orchestrator.poll_config(&mut self.provider) {
                Ok(changed) => changed,
                Err(err) => {
                    warn!(error = %err, "config poll failed, keeping current config");
                    false
                }
            },
            ..CycleReport::default()
        };

        let positions = self.gateway.positions();
        let output = self.orchestrator.run_cycle(now, ticks, &positions);

        for intent in &output.intents {
            match self.gateway.submit(intent) {
                SubmissionOutcome::Filled(fill) => {
                    if let Some(record) = self.orchestrator.confirm_fill(intent.id, fill) {
                        report.fills.push(record);
                    }
                }
                SubmissionOutcome::Rejected { reason } => {
                    self.orchestrator.reject(intent.id, &reason);
                    report.rejected.push((intent.id, reason));
                }
            }
        }
        report.output = output;
        report
    }
}
