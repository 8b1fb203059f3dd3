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
//! Payless with one polling task per tau bucket.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::task::JoinHandle;

use super::{MonitoringAlgorithm, Payless};
use crate::{
    config::Parameters,
    controller::{ControlChannel, FlowSample},
    stats::StatisticsAccumulator,
    FlowId, SwitchId, Tau,
};

type Pollers = Arc<Mutex<HashMap<Tau, JoinHandle<()>>>>;

/// Payless scheduler where every bucket is polled by its own task.
///
/// A supervisor wakes up every `reconcile_interval`, schedules missing flows and spawns a poller
/// for each bucket that has none. A poller sleeps `tau` ms, then requests statistics from every
/// switch owning a flow of its bucket. When it wakes up and finds its bucket gone, it deregisters
/// and exits; the supervisor starts a new one should the bucket come back.
#[derive(Debug)]
pub struct PaylessMultiThread {
    core: Arc<Payless>,
    reconcile_interval: Duration,
    pollers: Pollers,
}

impl PaylessMultiThread {
    pub const NAME: &'static str = "payless-multi-thread";

    pub fn new(params: Parameters, channel: ControlChannel, reconcile_interval: Duration) -> Self {
        Self {
            core: Arc::new(Payless::new(params, channel)),
            reconcile_interval,
            pollers: Default::default(),
        }
    }

    pub fn core(&self) -> &Payless {
        &self.core
    }

    /// Taus of the buckets that currently have a poller.
    pub fn active_pollers(&self) -> Vec<Tau> {
        let pollers = self.pollers.lock().unwrap_or_else(PoisonError::into_inner);
        let mut taus: Vec<Tau> = pollers.keys().copied().collect();
        taus.sort_unstable();
        taus
    }

    /// Spawn a poller for every bucket without one. Must be called within a tokio runtime.
    fn spawn_missing_pollers(&self) {
        let mut pollers = self.pollers.lock().unwrap_or_else(PoisonError::into_inner);
        for tau in self.core.table().taus() {
            if pollers.contains_key(&tau) {
                continue;
            }
            let handle = tokio::spawn(poll_bucket(self.core.clone(), self.pollers.clone(), tau));
            pollers.insert(tau, handle);
        }
    }
}

async fn poll_bucket(core: Arc<Payless>, pollers: Pollers, tau: Tau) {
    log::info!("Starting monitoring task for tau={tau}");
    loop {
        tokio::time::sleep(Duration::from_millis(tau)).await;

        // check and deregister under the registry lock, so the supervisor never sees a bucket
        // with a registered but exiting poller
        let switches = {
            let mut pollers = pollers.lock().unwrap_or_else(PoisonError::into_inner);
            let switches = core.table().switches(tau);
            if switches.is_empty() {
                pollers.remove(&tau);
                break;
            }
            switches
        };

        core.channel().request_all(switches, &format!("tau={tau}"));
    }
    log::info!("Stopping monitoring task for tau={tau}, bucket is empty");
}

#[async_trait::async_trait]
impl MonitoringAlgorithm for PaylessMultiThread {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn background(&self) {
        loop {
            tokio::time::sleep(self.reconcile_interval).await;
            self.core.add_missing_flows();
            self.spawn_missing_pollers();
        }
    }

    fn handle_flow_created(&self, flow_id: FlowId, switch_id: SwitchId) {
        self.core.flow_created(flow_id, switch_id)
    }

    fn handle_flow_removed(&self, flow_id: FlowId, total_bytes: u64, total_duration_ms: u64) {
        self.core.flow_removed(flow_id, total_bytes, total_duration_ms)
    }

    fn handle_statistics_reply(&self, samples: &[FlowSample]) {
        self.core.statistics_reply(samples)
    }

    fn statistics(&self) -> &StatisticsAccumulator {
        self.core.statistics()
    }
}
