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
//! Simulated network, used to run the monitoring algorithms without switches.
//!
//! A [`Scenario`] describes switches and flows with a constant rate. The [`SimulatedNetwork`]
//! installs and removes the flows along the scenario timeline, raising the same events a real
//! controller would, and answers statistics requests with the counters at the time of the request.

use std::{
    collections::BTreeMap,
    fs,
    path::Path,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use itertools::Itertools;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    time::{sleep_until, Instant},
};

use crate::{
    controller::{
        duration_ms, Controller, ControllerEvent, FlowInfo, FlowRef, FlowSample, Ipv4Match,
    },
    FlowId, SwitchId,
};

/// Flow of a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSpec {
    pub switch_id: SwitchId,
    /// Installation time, relative to the start of the scenario.
    #[serde(default)]
    pub start_ms: u64,
    pub duration_ms: u64,
    /// Bytes per second.
    pub rate: f64,
    /// Standard deviation of the relative rate error. Zero means an exact rate.
    #[serde(default)]
    pub jitter: f64,
    #[serde(default)]
    pub ipv4_src: Option<Ipv4Match>,
    #[serde(default)]
    pub ipv4_dst: Option<Ipv4Match>,
    /// Installed without notifying the monitoring application.
    #[serde(default)]
    pub proactive: bool,
}

/// Switches and flows of an experiment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub seed: u64,
    pub switches: Vec<SwitchId>,
    pub flows: Vec<FlowSpec>,
}

impl Scenario {
    /// Read and validate a scenario file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let scenario: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        for (i, flow) in self.flows.iter().enumerate() {
            if !self.switches.contains(&flow.switch_id) {
                return Err(ScenarioError::UnknownSwitch(i, flow.switch_id));
            }
            if !flow.rate.is_finite() || flow.rate < 0.0 {
                return Err(ScenarioError::InvalidRate(i));
            }
            if !flow.jitter.is_finite() || flow.jitter < 0.0 {
                return Err(ScenarioError::InvalidJitter(i));
            }
        }
        Ok(())
    }

    /// Time until the last flow is removed.
    pub fn duration(&self) -> Duration {
        let end = self
            .flows
            .iter()
            .map(|f| f.start_ms + f.duration_ms)
            .max()
            .unwrap_or_default();
        Duration::from_millis(end)
    }
}

/// Error thrown when a scenario cannot be loaded.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),
    /// A flow is placed on a switch that is not part of the scenario.
    #[error("Flow {0} is placed on unknown switch {1}")]
    UnknownSwitch(usize, SwitchId),
    #[error("Flow {0} has an invalid rate")]
    InvalidRate(usize),
    #[error("Flow {0} has an invalid jitter")]
    InvalidJitter(usize),
}

#[derive(Debug)]
struct SimFlow {
    spec: FlowSpec,
    info: FlowInfo,
    installed: Instant,
    noise: Option<Normal<f64>>,
    total_bytes: u64,
}

impl SimFlow {
    /// Advance the counters to `now` and return them.
    fn observe(&mut self, now: Instant, rng: &mut StdRng) -> FlowSample {
        let elapsed = now
            .saturating_duration_since(self.installed)
            .min(Duration::from_millis(self.spec.duration_ms));
        let mut bytes = self.spec.rate * elapsed.as_secs_f64();
        if let Some(noise) = self.noise {
            bytes *= (1.0 + noise.sample(rng)).max(0.0);
        }
        // counters never go backwards
        self.total_bytes = self.total_bytes.max(bytes as u64);
        FlowSample {
            flow_id: self.info.flow_id,
            total_bytes: self.total_bytes,
            // switches report the duration as seconds plus nanoseconds
            total_duration_ms: duration_ms(elapsed.as_secs() as u32, elapsed.subsec_nanos()),
        }
    }
}

#[derive(Debug)]
struct SimState {
    next_id: FlowId,
    active: BTreeMap<FlowId, SimFlow>,
    removed: Vec<FlowInfo>,
    /// flow id of each installed scenario flow, by index
    installed: BTreeMap<usize, FlowId>,
    rng: StdRng,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Action {
    // removals first, such that a flow ending at time t is gone before the next one starts
    Remove(usize),
    Install(usize),
}

/// Controller backed by a [`Scenario`].
#[derive(Debug)]
pub struct SimulatedNetwork {
    scenario: Scenario,
    events: UnboundedSender<ControllerEvent>,
    state: Mutex<SimState>,
}

impl SimulatedNetwork {
    /// Create the network. Events are delivered through the returned receiver.
    pub fn new(
        scenario: Scenario,
    ) -> Result<(Arc<Self>, UnboundedReceiver<ControllerEvent>), ScenarioError> {
        scenario.validate()?;
        let (events, rx) = mpsc::unbounded_channel();
        let state = SimState {
            next_id: 1,
            active: BTreeMap::new(),
            removed: Vec::new(),
            installed: BTreeMap::new(),
            rng: StdRng::seed_from_u64(scenario.seed),
        };
        Ok((
            Arc::new(Self {
                scenario,
                events,
                state: Mutex::new(state),
            }),
            rx,
        ))
    }

    /// Play the scenario timeline, returning once the last flow was removed.
    pub async fn play(&self) {
        let timeline: Vec<(u64, Action)> = self
            .scenario
            .flows
            .iter()
            .enumerate()
            .flat_map(|(i, f)| {
                [
                    (f.start_ms, Action::Install(i)),
                    (f.start_ms + f.duration_ms, Action::Remove(i)),
                ]
            })
            .sorted()
            .collect();

        let start = Instant::now();
        for (time, action) in timeline {
            sleep_until(start + Duration::from_millis(time)).await;
            match action {
                Action::Install(i) => self.install(i),
                Action::Remove(i) => self.remove(i),
            }
        }
        log::info!("Scenario finished");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn install(&self, index: usize) {
        let spec = self.scenario.flows[index].clone();
        let mut state = self.lock();
        let flow_id = state.next_id;
        state.next_id += 1;
        state.installed.insert(index, flow_id);

        let info = FlowInfo {
            flow_id,
            switch_id: spec.switch_id,
            ipv4_src: spec.ipv4_src,
            ipv4_dst: spec.ipv4_dst,
        };
        let noise = (spec.jitter > 0.0)
            .then(|| Normal::new(0.0, spec.jitter).ok())
            .flatten();
        let proactive = spec.proactive;
        state.active.insert(
            flow_id,
            SimFlow {
                spec,
                info: info.clone(),
                installed: Instant::now(),
                noise,
                total_bytes: 0,
            },
        );
        drop(state);

        if proactive {
            log::debug!("[F{flow_id}] Installed proactively on S{}", info.switch_id);
        } else {
            self.send(ControllerEvent::FlowCreated {
                flow_id,
                switch_id: info.switch_id,
            });
        }
    }

    fn remove(&self, index: usize) {
        let mut state = self.lock();
        let Some(mut flow) = state
            .installed
            .get(&index)
            .copied()
            .and_then(|id| state.active.remove(&id))
        else {
            return;
        };
        let SimState { rng, removed, .. } = &mut *state;
        let end = flow.installed + Duration::from_millis(flow.spec.duration_ms);
        let sample = flow.observe(end, rng);
        removed.push(flow.info);
        drop(state);

        self.send(ControllerEvent::FlowRemoved {
            flow_id: sample.flow_id,
            total_bytes: sample.total_bytes,
            total_duration_ms: sample.total_duration_ms,
        });
    }

    fn send(&self, event: ControllerEvent) {
        if self.events.send(event).is_err() {
            log::warn!("Nobody listens to controller events");
        }
    }
}

impl Controller for SimulatedNetwork {
    fn request_statistics(&self, switch_id: SwitchId) {
        let now = Instant::now();
        let mut state = self.lock();
        let SimState { active, rng, .. } = &mut *state;
        let samples = active
            .values_mut()
            .filter(|f| f.info.switch_id == switch_id)
            .map(|f| f.observe(now, rng))
            .collect();
        drop(state);
        self.send(ControllerEvent::StatisticsReply { switch_id, samples });
    }

    fn live_flows(&self) -> Vec<FlowRef> {
        self.lock()
            .active
            .values()
            .map(|f| FlowRef::new(f.info.flow_id, f.info.switch_id))
            .collect()
    }

    fn switches(&self) -> Vec<SwitchId> {
        self.scenario.switches.clone()
    }

    fn flow_info(&self) -> Vec<FlowInfo> {
        let state = self.lock();
        state
            .active
            .values()
            .map(|f| f.info.clone())
            .chain(state.removed.iter().cloned())
            .sorted_by_key(|info| info.flow_id)
            .collect()
    }
}
