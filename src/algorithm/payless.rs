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
//! Tau adaptation of the Payless scheduler, shared by both scheduling-loop variants.

use crate::{
    config::Parameters,
    controller::{ControlChannel, FlowRef, FlowSample},
    schedule::ScheduleTable,
    stats::StatisticsAccumulator,
    FlowId, SwitchId,
};

/// State of a Payless scheduler: its parameters, the schedule table and the collected statistics.
///
/// The variants only differ in how they turn the schedule table into statistics requests.
#[derive(Debug)]
pub struct Payless {
    params: Parameters,
    table: ScheduleTable,
    stats: StatisticsAccumulator,
    channel: ControlChannel,
}

impl Payless {
    pub fn new(params: Parameters, channel: ControlChannel) -> Self {
        Self {
            params,
            table: ScheduleTable::new(),
            stats: StatisticsAccumulator::new(),
            channel,
        }
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    pub fn table(&self) -> &ScheduleTable {
        &self.table
    }

    pub fn statistics(&self) -> &StatisticsAccumulator {
        &self.stats
    }

    pub fn channel(&self) -> &ControlChannel {
        &self.channel
    }

    /// Schedule a new flow at `tau_start`.
    pub fn flow_created(&self, flow_id: FlowId, switch_id: SwitchId) {
        let tau = self.params.tau_start();
        self.table.assign(flow_id, switch_id, tau);
        log::debug!("[F{flow_id}] Scheduled on S{switch_id} with tau={tau}");
    }

    /// Record the final sample of a flow and stop polling it.
    pub fn flow_removed(&self, flow_id: FlowId, total_bytes: u64, total_duration_ms: u64) {
        self.stats.record_final(flow_id, total_bytes, total_duration_ms);
        if let Some((switch_id, tau)) = self.table.remove(flow_id) {
            log::info!("Removing flow {flow_id} (S{switch_id}, tau={tau}) from scheduling table");
        }
    }

    /// Record every sample and adapt the tau of each scheduled flow to its traffic volume.
    ///
    /// Samples of flows that are not scheduled (yet) are recorded, but leave the table alone.
    pub fn statistics_reply(&self, samples: &[FlowSample]) {
        for &FlowSample {
            flow_id,
            total_bytes,
            total_duration_ms,
        } in samples
        {
            let (bytes_delta, _) = self.stats.record(flow_id, total_bytes, total_duration_ms);

            match self
                .table
                .adjust(flow_id, |tau| self.params.next_tau(tau, bytes_delta))
            {
                Some((tau, new_tau)) if tau != new_tau => {
                    log::debug!("[F{flow_id}] tau {tau} -> {new_tau}")
                }
                Some(_) => {}
                None => log::trace!("[F{flow_id}] Not scheduled, skipping"),
            }
        }
    }

    /// Schedule all live flows that are missing in the table (e.g., proactively installed rules)
    /// at `tau_start`. Returns the added flows.
    pub fn add_missing_flows(&self) -> Vec<FlowRef> {
        let live = self.channel.live_flows();
        let added = self.table.insert_missing(live, self.params.tau_start());
        for flow in added.iter() {
            log::info!(
                "Adding missing flow rule {} (S{}) to scheduling table",
                flow.flow_id,
                flow.switch_id
            );
        }
        added
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::controller::test::RecordingController;

    fn sample(flow_id: FlowId, total_bytes: u64) -> FlowSample {
        FlowSample {
            flow_id,
            total_bytes,
            total_duration_ms: 0,
        }
    }

    fn payless(live: &[FlowRef]) -> Payless {
        Payless::new(
            Parameters::default(),
            ControlChannel::new(RecordingController::with_flows(live)),
        )
    }

    #[test]
    fn tau_follows_traffic() {
        let p = payless(&[]);
        p.flow_created(1, 9);
        assert_eq!(p.table().lookup(1), Some((9, 2750)));

        // low traffic, tau doubles up to tau_max
        p.statistics_reply(&[sample(1, 10)]);
        assert_eq!(p.table().lookup(1), Some((9, 5000)));

        // high traffic, tau is divided by beta (floor)
        p.statistics_reply(&[sample(1, 2_000_010)]);
        assert_eq!(p.table().lookup(1), Some((9, 833)));
        p.statistics_reply(&[sample(1, 4_000_010)]);
        assert_eq!(p.table().lookup(1), Some((9, 500)));

        // exactly at the thresholds, tau stays
        p.statistics_reply(&[sample(1, 5_000_010)]);
        assert_eq!(p.table().lookup(1), Some((9, 500)));
    }

    #[test]
    fn unknown_flows_are_recorded_but_not_scheduled() {
        let p = payless(&[]);
        p.flow_created(2, 1);
        p.statistics_reply(&[sample(1, 10), sample(2, 10)]);
        assert_eq!(p.table().lookup(1), None);
        assert_eq!(p.statistics().log(1).len(), 1);
        // the sample after the unknown one is still processed
        assert_eq!(p.table().lookup(2), Some((1, 5000)));
    }

    #[test]
    fn removal_records_one_sample() {
        let p = payless(&[]);
        p.flow_created(1, 3);
        p.flow_created(2, 3);
        p.statistics_reply(&[sample(1, 10)]);
        p.flow_removed(1, 50, 1000);

        assert_eq!(p.table().lookup(1), None);
        assert!(p.table().buckets().values().all(|b| !b.contains_key(&1)));
        let log = p.statistics().log(1);
        assert_eq!(log.len(), 2);
        assert_eq!((log[1].bytes, log[1].total_bytes), (40, 50));

        // removal of an unknown flow leaves the table untouched
        p.flow_removed(7, 1, 1);
        assert_eq!(p.table().len(), 1);
        assert_eq!(p.statistics().log(7).len(), 1);
    }

    #[test]
    fn untracked_removal_does_not_block_reconciliation() {
        let p = payless(&[FlowRef::new(5, 1)]);
        p.flow_removed(5, 0, 0);
        assert_eq!(p.add_missing_flows(), vec![FlowRef::new(5, 1)]);
        assert_eq!(p.table().lookup(5), Some((1, 2750)));
    }

    #[test]
    fn reconciliation() {
        let p = payless(&[FlowRef::new(1, 4), FlowRef::new(2, 5)]);
        p.flow_created(1, 4);
        p.statistics_reply(&[sample(1, 10)]);

        let added = p.add_missing_flows();
        assert_eq!(added, vec![FlowRef::new(2, 5)]);
        assert_eq!(p.table().lookup(2), Some((5, 2750)));
        // already scheduled flows keep their tau
        assert_eq!(p.table().lookup(1), Some((4, 5000)));
        assert!(p.add_missing_flows().is_empty());
    }

    #[test]
    fn recreated_flow_restarts_at_tau_start() {
        let p = payless(&[]);
        p.flow_created(1, 4);
        p.statistics_reply(&[sample(1, 10)]);
        p.flow_created(1, 4);
        assert_eq!(p.table().lookup(1), Some((4, 2750)));
        assert_eq!(p.table().len(), 1);
    }
}
