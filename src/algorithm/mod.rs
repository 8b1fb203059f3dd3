// PAYLESS: Adaptive Flow Statistics Polling for Software-Defined Networks
// Copyright (C) 2024-2025 The Payless Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//! Monitoring strategies and the contract the monitoring framework drives them through.

use std::str::FromStr;

use crate::{
    config::{ConfigError, MonitorConfig},
    controller::{ControlChannel, ControllerEvent, FlowSample},
    stats::StatisticsAccumulator,
    FlowId, SwitchId,
};

mod flowsense;
mod multi_thread;
mod payless;
mod periodic;
mod single_thread;

pub use flowsense::FlowSense;
pub use multi_thread::PaylessMultiThread;
pub use payless::Payless;
pub use periodic::{PeriodicPolling, PollTarget};
pub use single_thread::PaylessSingleThread;

/// Capabilities every monitoring strategy provides.
///
/// All hooks may be called concurrently with each other and with the running
/// [`MonitoringAlgorithm::background`] future.
#[async_trait::async_trait]
pub trait MonitoringAlgorithm: Send + Sync {
    /// Name of the algorithm, as written to the statistics file.
    fn name(&self) -> &'static str;

    /// Time-driven behavior of the algorithm. Runs for the lifetime of the algorithm; may return
    /// immediately if the algorithm has none.
    async fn background(&self);

    /// A flow rule was installed on a switch.
    fn handle_flow_created(&self, flow_id: FlowId, switch_id: SwitchId);

    /// A flow rule expired or was deleted, with its final counters.
    fn handle_flow_removed(&self, flow_id: FlowId, total_bytes: u64, total_duration_ms: u64);

    /// A switch answered a statistics request.
    fn handle_statistics_reply(&self, samples: &[FlowSample]);

    /// The statistics collected so far.
    fn statistics(&self) -> &StatisticsAccumulator;

    /// Forward a controller event to the matching hook.
    fn handle_event(&self, event: &ControllerEvent) {
        match event {
            ControllerEvent::FlowCreated { flow_id, switch_id } => {
                self.handle_flow_created(*flow_id, *switch_id)
            }
            ControllerEvent::FlowRemoved {
                flow_id,
                total_bytes,
                total_duration_ms,
            } => self.handle_flow_removed(*flow_id, *total_bytes, *total_duration_ms),
            ControllerEvent::StatisticsReply { switch_id, samples } => {
                log::debug!("[S{switch_id}] Handling FlowStatsReply");
                self.handle_statistics_reply(samples)
            }
        }
    }
}

/// Names of the available algorithms. `payless` and `periodicpolling` are accepted as aliases.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumIter,
    strum_macros::EnumString,
)]
pub enum AlgorithmKind {
    #[strum(to_string = "flowsense")]
    FlowSense,
    #[strum(to_string = "payless-multi-thread", serialize = "payless")]
    PaylessMultiThread,
    #[strum(to_string = "payless-single-thread")]
    PaylessSingleThread,
    #[strum(to_string = "periodicpolling-flows", serialize = "periodicpolling")]
    PeriodicPollingPerFlow,
    #[strum(to_string = "periodicpolling-switches")]
    PeriodicPollingPerSwitch,
}

/// Parse an algorithm name, including aliases.
pub fn parse_algorithm(name: &str) -> Result<AlgorithmKind, ConfigError> {
    AlgorithmKind::from_str(name).map_err(|_| ConfigError::UnknownAlgorithm(name.to_string()))
}

/// The closed set of monitoring strategies.
#[derive(Debug)]
pub enum Algorithm {
    FlowSense(FlowSense),
    PaylessMultiThread(PaylessMultiThread),
    PaylessSingleThread(PaylessSingleThread),
    PeriodicPolling(PeriodicPolling),
}

macro_rules! each_variant {
    ($self:expr, $a:ident => $body:expr) => {
        match $self {
            Algorithm::FlowSense($a) => $body,
            Algorithm::PaylessMultiThread($a) => $body,
            Algorithm::PaylessSingleThread($a) => $body,
            Algorithm::PeriodicPolling($a) => $body,
        }
    };
}

impl Algorithm {
    /// Build the algorithm `kind` from the configuration. Requests are issued through `channel`.
    pub fn build(
        kind: AlgorithmKind,
        config: &MonitorConfig,
        channel: ControlChannel,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let params = config.parameters;
        Ok(match kind {
            AlgorithmKind::FlowSense => Self::FlowSense(FlowSense::new()),
            AlgorithmKind::PaylessMultiThread => Self::PaylessMultiThread(
                PaylessMultiThread::new(params, channel, config.reconcile_interval),
            ),
            AlgorithmKind::PaylessSingleThread => {
                Self::PaylessSingleThread(PaylessSingleThread::new(params, channel))
            }
            AlgorithmKind::PeriodicPollingPerFlow => Self::PeriodicPolling(PeriodicPolling::new(
                PollTarget::Flows,
                config.polling_interval,
                channel,
            )),
            AlgorithmKind::PeriodicPollingPerSwitch => Self::PeriodicPolling(
                PeriodicPolling::new(PollTarget::Switches, config.polling_interval, channel),
            ),
        })
    }

    /// The Payless core of the adaptive variants.
    pub fn payless(&self) -> Option<&Payless> {
        match self {
            Self::PaylessMultiThread(a) => Some(a.core()),
            Self::PaylessSingleThread(a) => Some(a.core()),
            Self::FlowSense(_) | Self::PeriodicPolling(_) => None,
        }
    }
}

#[async_trait::async_trait]
impl MonitoringAlgorithm for Algorithm {
    fn name(&self) -> &'static str {
        each_variant!(self, a => a.name())
    }

    async fn background(&self) {
        each_variant!(self, a => a.background().await)
    }

    fn handle_flow_created(&self, flow_id: FlowId, switch_id: SwitchId) {
        each_variant!(self, a => a.handle_flow_created(flow_id, switch_id))
    }

    fn handle_flow_removed(&self, flow_id: FlowId, total_bytes: u64, total_duration_ms: u64) {
        each_variant!(self, a => a.handle_flow_removed(flow_id, total_bytes, total_duration_ms))
    }

    fn handle_statistics_reply(&self, samples: &[FlowSample]) {
        each_variant!(self, a => a.handle_statistics_reply(samples))
    }

    fn statistics(&self) -> &StatisticsAccumulator {
        each_variant!(self, a => a.statistics())
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())?;
        if let Some(core) = self.payless() {
            let p = core.parameters();
            write!(
                f,
                " (tau_min={}, tau_max={}, alpha={}, beta={}, delta_1={}, delta_2={})",
                p.tau_min, p.tau_max, p.alpha, p.beta, p.delta_1, p.delta_2
            )?;
        }
        Ok(())
    }
}
