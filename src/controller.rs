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
//! Contract with the controller integration layer, which owns switch connections and flows.
//!
//! Events flow from the controller into the active monitoring algorithm as [`ControllerEvent`]s;
//! statistics requests flow back through the [`ControlChannel`], which counts them.

use std::{
    net::Ipv4Addr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{FlowId, SwitchId};

/// Reference to a flow installed on a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlowRef {
    pub flow_id: FlowId,
    pub switch_id: SwitchId,
}

impl FlowRef {
    pub fn new(flow_id: FlowId, switch_id: SwitchId) -> Self {
        Self { flow_id, switch_id }
    }
}

/// Cumulative counters of one flow, as reported by a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSample {
    pub flow_id: FlowId,
    pub total_bytes: u64,
    pub total_duration_ms: u64,
}

/// IPv4 match field of a flow rule: `(address, mask)`.
pub type Ipv4Match = (Ipv4Addr, Ipv4Addr);

/// Description of a flow rule, exported alongside the statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowInfo {
    pub flow_id: FlowId,
    pub switch_id: SwitchId,
    pub ipv4_src: Option<Ipv4Match>,
    pub ipv4_dst: Option<Ipv4Match>,
}

/// Lifecycle events raised by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    FlowCreated {
        flow_id: FlowId,
        switch_id: SwitchId,
    },
    FlowRemoved {
        flow_id: FlowId,
        total_bytes: u64,
        total_duration_ms: u64,
    },
    StatisticsReply {
        switch_id: SwitchId,
        samples: Vec<FlowSample>,
    },
}

/// The controller integration layer, as seen by the monitoring algorithms.
pub trait Controller: Send + Sync {
    /// Ask a switch for the statistics of all its flows. Must not block; the reply arrives later
    /// as a [`ControllerEvent::StatisticsReply`].
    fn request_statistics(&self, switch_id: SwitchId);

    /// All flows that are currently installed.
    fn live_flows(&self) -> Vec<FlowRef>;

    /// All switches connected to the controller.
    fn switches(&self) -> Vec<SwitchId>;

    /// Description of all flows ever installed, active and removed.
    fn flow_info(&self) -> Vec<FlowInfo>;
}

/// Number of statistics requests issued so far.
#[derive(Debug, Default)]
pub struct OverheadCounter(AtomicU64);

impl OverheadCounter {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn incr(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

/// Handle on the controller used by the algorithms. Every statistics request goes through here
/// and is counted as overhead.
#[derive(Clone)]
pub struct ControlChannel {
    controller: Arc<dyn Controller>,
    overhead: Arc<OverheadCounter>,
}

impl std::fmt::Debug for ControlChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlChannel")
            .field("overhead", &self.overhead.get())
            .finish()
    }
}

impl ControlChannel {
    pub fn new(controller: Arc<dyn Controller>) -> Self {
        Self {
            controller,
            overhead: Default::default(),
        }
    }

    /// Fire-and-forget statistics request towards a switch.
    pub fn request_statistics(&self, switch_id: SwitchId) {
        log::trace!("Requesting flowstats from {switch_id}");
        self.controller.request_statistics(switch_id);
        self.overhead.incr();
    }

    /// Request statistics from each given switch, logging the batch once.
    pub fn request_all<I: IntoIterator<Item = SwitchId>>(&self, switches: I, reason: &str) {
        let switches = switches.into_iter().collect_vec();
        if switches.is_empty() {
            return;
        }
        log::info!("Sending stat requests to {switches:?} ({reason})");
        for switch_id in switches {
            self.request_statistics(switch_id);
        }
    }

    pub fn live_flows(&self) -> Vec<FlowRef> {
        self.controller.live_flows()
    }

    pub fn switches(&self) -> Vec<SwitchId> {
        self.controller.switches()
    }

    pub fn flow_info(&self) -> Vec<FlowInfo> {
        self.controller.flow_info()
    }

    pub fn overhead(&self) -> &Arc<OverheadCounter> {
        &self.overhead
    }
}

/// Convert a switch-reported flow duration to whole milliseconds.
pub fn duration_ms(duration_sec: u32, duration_nsec: u32) -> u64 {
    u64::from(duration_sec) * 1000 + u64::from(duration_nsec) / 1_000_000
}

#[cfg(test)]
pub(crate) mod test {
    use std::sync::Mutex;

    use super::*;

    /// Controller that records every request and serves a fixed set of flows.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingController {
        pub requests: Mutex<Vec<SwitchId>>,
        pub flows: Mutex<Vec<FlowRef>>,
        pub switches: Vec<SwitchId>,
    }

    impl RecordingController {
        pub fn with_flows(flows: &[FlowRef]) -> Arc<Self> {
            Arc::new(Self {
                flows: Mutex::new(flows.to_vec()),
                switches: flows.iter().map(|f| f.switch_id).sorted().dedup().collect(),
                ..Default::default()
            })
        }

        pub fn requests(&self) -> Vec<SwitchId> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Controller for RecordingController {
        fn request_statistics(&self, switch_id: SwitchId) {
            self.requests.lock().unwrap().push(switch_id);
        }

        fn live_flows(&self) -> Vec<FlowRef> {
            self.flows.lock().unwrap().clone()
        }

        fn switches(&self) -> Vec<SwitchId> {
            self.switches.clone()
        }

        fn flow_info(&self) -> Vec<FlowInfo> {
            self.live_flows()
                .into_iter()
                .map(|f| FlowInfo {
                    flow_id: f.flow_id,
                    switch_id: f.switch_id,
                    ipv4_src: None,
                    ipv4_dst: None,
                })
                .collect()
        }
    }

    #[test]
    fn requests_are_counted() {
        let ctrl = RecordingController::with_flows(&[FlowRef::new(1, 7)]);
        let channel = ControlChannel::new(ctrl.clone());
        channel.request_statistics(7);
        channel.request_all([7, 8], "test");
        channel.request_all([], "nothing");
        assert_eq!(channel.overhead().get(), 3);
        assert_eq!(ctrl.requests(), vec![7, 7, 8]);

        // clones share the counter
        channel.clone().request_statistics(9);
        assert_eq!(channel.overhead().get(), 4);
    }

    #[test]
    fn durations() {
        assert_eq!(duration_ms(0, 0), 0);
        assert_eq!(duration_ms(2, 500_000_000), 2500);
        assert_eq!(duration_ms(1, 999_999), 1000);
    }

    #[test]
    fn flow_info_format() {
        let info = FlowInfo {
            flow_id: 3,
            switch_id: 1,
            ipv4_src: Some((
                Ipv4Addr::new(10, 0, 0, 0),
                Ipv4Addr::new(255, 255, 255, 0),
            )),
            ipv4_dst: None,
        };
        assert_eq!(
            serde_json::to_string(&info).unwrap(),
            r#"{"flow_id":3,"switch_id":1,"ipv4_src":["10.0.0.0","255.255.255.0"],"ipv4_dst":null}"#
        );
    }
}
