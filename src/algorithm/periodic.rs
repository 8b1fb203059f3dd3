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
//! Fixed-interval polling baselines.

use std::time::Duration;

use super::MonitoringAlgorithm;
use crate::{
    controller::{ControlChannel, FlowSample},
    stats::StatisticsAccumulator,
    FlowId, SwitchId,
};

/// What a periodic poller sends its requests for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollTarget {
    /// One request per active flow, to the switch the flow is installed on.
    Flows,
    /// One request per connected switch.
    Switches,
}

/// Polls at a fixed interval, regardless of the traffic.
#[derive(Debug)]
pub struct PeriodicPolling {
    target: PollTarget,
    interval: Duration,
    stats: StatisticsAccumulator,
    channel: ControlChannel,
}

impl PeriodicPolling {
    pub fn new(target: PollTarget, interval: Duration, channel: ControlChannel) -> Self {
        Self {
            target,
            interval,
            stats: StatisticsAccumulator::new(),
            channel,
        }
    }

    fn poll(&self) {
        match self.target {
            PollTarget::Flows => self.channel.request_all(
                self.channel.live_flows().into_iter().map(|f| f.switch_id),
                "active flows",
            ),
            PollTarget::Switches => self.channel.request_all(self.channel.switches(), "switches"),
        }
    }
}

#[async_trait::async_trait]
impl MonitoringAlgorithm for PeriodicPolling {
    fn name(&self) -> &'static str {
        match self.target {
            PollTarget::Flows => "periodicpolling-flows",
            PollTarget::Switches => "periodicpolling-switches",
        }
    }

    async fn background(&self) {
        loop {
            tokio::time::sleep(self.interval).await;
            self.poll();
        }
    }

    fn handle_flow_created(&self, _flow_id: FlowId, _switch_id: SwitchId) {}

    fn handle_flow_removed(&self, flow_id: FlowId, total_bytes: u64, total_duration_ms: u64) {
        self.stats.record_final(flow_id, total_bytes, total_duration_ms);
    }

    fn handle_statistics_reply(&self, samples: &[FlowSample]) {
        for s in samples {
            self.stats
                .record(s.flow_id, s.total_bytes, s.total_duration_ms);
        }
    }

    fn statistics(&self) -> &StatisticsAccumulator {
        &self.stats
    }
}
