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
//! Payless driven by a single deadline loop.

use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use tokio::time::{sleep_until, Instant};

use super::{MonitoringAlgorithm, Payless};
use crate::{
    config::Parameters,
    controller::{ControlChannel, FlowSample},
    stats::StatisticsAccumulator,
    FlowId, SwitchId, Tau,
};

/// Payless scheduler that polls all buckets from one task.
///
/// The loop keeps the next deadline of every bucket. Each round it schedules missing flows,
/// requests statistics for all due buckets (each switch at most once per round), and sleeps until
/// the earliest deadline.
#[derive(Debug)]
pub struct PaylessSingleThread {
    core: Payless,
}

impl PaylessSingleThread {
    pub const NAME: &'static str = "payless-single-thread";

    pub fn new(params: Parameters, channel: ControlChannel) -> Self {
        Self {
            core: Payless::new(params, channel),
        }
    }

    pub fn core(&self) -> &Payless {
        &self.core
    }

    /// One round of the loop. Returns the switches to poll and the instant of the next wake-up.
    fn round(
        &self,
        deadlines: &mut BTreeMap<Tau, Instant>,
        now: Instant,
    ) -> (BTreeSet<SwitchId>, Instant) {
        self.core.add_missing_flows();

        let buckets = self.core.table().buckets();
        deadlines.retain(|tau, _| buckets.contains_key(tau));

        let mut to_poll = BTreeSet::new();
        for (tau, bucket) in buckets.iter() {
            let period = Duration::from_millis(*tau);
            let deadline = deadlines.entry(*tau).or_insert(now + period);
            if *deadline <= now {
                *deadline = now + period;
                to_poll.extend(bucket.values().copied());
            }
        }

        let wake_up = deadlines
            .values()
            .min()
            .copied()
            .unwrap_or_else(|| now + Duration::from_millis(self.core.parameters().tau_min));
        (to_poll, wake_up)
    }
}

#[async_trait::async_trait]
impl MonitoringAlgorithm for PaylessSingleThread {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn background(&self) {
        let mut deadlines = BTreeMap::new();
        loop {
            let (to_poll, wake_up) = self.round(&mut deadlines, Instant::now());
            self.core.channel().request_all(to_poll, "due buckets");
            sleep_until(wake_up).await;
        }
    }

    fn handle_flow_created(&self, flow_id: FlowId, switch_id: SwitchId) {
        self.core.flow_created(flow_id, switch_id)
    }

    fn handle_flow_removed(&self, flow_id: FlowId, total_bytes: u64, total_duration_ms: u64) {
        self.core
            .flow_removed(flow_id, total_bytes, total_duration_ms)
    }

    fn handle_statistics_reply(&self, samples: &[FlowSample]) {
        self.core.statistics_reply(samples)
    }

    fn statistics(&self) -> &StatisticsAccumulator {
        self.core.statistics()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::controller::{test::RecordingController, FlowRef};

    fn setup(live: &[FlowRef]) -> (Arc<RecordingController>, Arc<PaylessSingleThread>) {
        let ctrl = RecordingController::with_flows(live);
        let algo = PaylessSingleThread::new(Parameters::default(), ControlChannel::new(ctrl.clone()));
        (ctrl, Arc::new(algo))
    }

    #[test]
    fn round_deadlines() {
        let (_, algo) = setup(&[]);
        let mut deadlines = BTreeMap::new();
        let t0 = Instant::now();

        // no buckets: wake up after tau_min
        let (poll, wake) = algo.round(&mut deadlines, t0);
        assert!(poll.is_empty());
        assert_eq!(wake, t0 + Duration::from_millis(500));

        algo.handle_flow_created(1, 7);
        algo.handle_flow_created(2, 7);
        algo.handle_flow_created(3, 8);
        let (poll, wake) = algo.round(&mut deadlines, t0);
        assert!(poll.is_empty());
        assert_eq!(wake, t0 + Duration::from_millis(2750));

        // due exactly at the deadline; every switch once
        let t1 = t0 + Duration::from_millis(2750);
        let (poll, wake) = algo.round(&mut deadlines, t1);
        assert_eq!(poll, BTreeSet::from([7, 8]));
        assert_eq!(wake, t1 + Duration::from_millis(2750));

        // deadlines of vanished buckets are dropped
        for flow in 1..=3 {
            algo.handle_flow_removed(flow, 0, 0);
        }
        let (poll, wake) = algo.round(&mut deadlines, t1);
        assert!(poll.is_empty());
        assert!(deadlines.is_empty());
        assert_eq!(wake, t1 + Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn polls_each_bucket_at_its_tau() {
        let (ctrl, algo) = setup(&[]);
        algo.handle_flow_created(1, 10);
        algo.handle_flow_created(2, 11);
        // move flow 2 to the 500ms bucket
        algo.handle_statistics_reply(&[FlowSample {
            flow_id: 2,
            total_bytes: 3_000_000,
            total_duration_ms: 100,
        }]);
        assert_eq!(algo.core().table().taus(), vec![500, 2750]);

        let bg = tokio::spawn({
            let algo = algo.clone();
            async move { algo.background().await }
        });

        // until t=2900: bucket 500 fired at 500..=2500 (5 times), bucket 2750 once
        tokio::time::sleep(Duration::from_millis(2900)).await;
        let requests = ctrl.requests();
        assert_eq!(requests.iter().filter(|s| **s == 11).count(), 5);
        assert_eq!(requests.iter().filter(|s| **s == 10).count(), 1);
        assert_eq!(algo.core().channel().overhead().get(), 6);
        bg.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn reconciles_every_round() {
        let (ctrl, algo) = setup(&[FlowRef::new(3, 9)]);
        let bg = tokio::spawn({
            let algo = algo.clone();
            async move { algo.background().await }
        });
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(algo.core().table().lookup(3), Some((9, 2750)));

        tokio::time::sleep(Duration::from_millis(2800)).await;
        assert_eq!(ctrl.requests(), vec![9]);
        bg.abort();
    }
}
