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
//! FlowSense: zero-overhead monitoring from flow-removed messages only.

use super::MonitoringAlgorithm;
use crate::{controller::FlowSample, stats::StatisticsAccumulator, FlowId, SwitchId};

/// Never polls. Learns the total counters of each flow when it is removed, and nothing else.
#[derive(Debug, Default)]
pub struct FlowSense {
    stats: StatisticsAccumulator,
}

impl FlowSense {
    pub const NAME: &'static str = "flowsense";

    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl MonitoringAlgorithm for FlowSense {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn background(&self) {}

    fn handle_flow_created(&self, _flow_id: FlowId, _switch_id: SwitchId) {}

    fn handle_flow_removed(&self, flow_id: FlowId, total_bytes: u64, total_duration_ms: u64) {
        self.stats.record_final(flow_id, total_bytes, total_duration_ms);
    }

    fn handle_statistics_reply(&self, _samples: &[FlowSample]) {}

    fn statistics(&self) -> &StatisticsAccumulator {
        &self.stats
    }
}
