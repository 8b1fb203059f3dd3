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
//! Runs a monitoring algorithm against a controller and records the results.

use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::{sync::mpsc::UnboundedReceiver, task::JoinHandle, time::Instant};

use payless_utils::other::unix_timestamp;

use crate::{
    algorithm::{Algorithm, AlgorithmKind, MonitoringAlgorithm},
    config::{ConfigError, MonitorConfig},
    controller::{ControlChannel, Controller, ControllerEvent},
    export::{ExportError, FlowSeries, StatsSnapshot},
};

#[derive(Debug)]
struct Shared {
    algorithm: Algorithm,
    channel: ControlChannel,
    config: MonitorConfig,
    overhead: Mutex<Vec<(f64, u64)>>,
    started: (f64, Instant),
}

impl Shared {
    /// Unix time derived from the runtime clock.
    fn now(&self) -> f64 {
        let (wall, instant) = self.started;
        wall + instant.elapsed().as_secs_f64()
    }

    fn track_overhead(&self) {
        let point = (self.now(), self.channel.overhead().get());
        self.overhead
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(point);
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            algorithm: self.algorithm.name().to_string(),
            flow_info: self
                .channel
                .flow_info()
                .into_iter()
                .map(|info| (info.flow_id, info))
                .collect(),
            flow_stats: self
                .algorithm
                .statistics()
                .snapshot()
                .into_iter()
                .map(|(flow_id, samples)| (flow_id, FlowSeries::from(samples)))
                .collect(),
            overhead: self
                .overhead
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    fn write_statistics(&self) -> Result<(), ExportError> {
        self.snapshot().write(&self.config.stats_file)?;
        log::info!("Wrote stats to {:?}", self.config.stats_file);
        Ok(())
    }
}

/// Drives one monitoring algorithm: runs its background task, forwards controller events to it,
/// keeps track of the overhead and periodically writes the statistics file.
#[derive(Debug, Clone)]
pub struct MonitoringFramework {
    shared: Arc<Shared>,
}

impl MonitoringFramework {
    pub fn new(
        kind: AlgorithmKind,
        config: MonitorConfig,
        controller: Arc<dyn Controller>,
    ) -> Result<Self, ConfigError> {
        let channel = ControlChannel::new(controller);
        let algorithm = Algorithm::build(kind, &config, channel.clone())?;
        Ok(Self {
            shared: Arc::new(Shared {
                algorithm,
                channel,
                config,
                overhead: Default::default(),
                started: (unix_timestamp(), Instant::now()),
            }),
        })
    }

    pub fn algorithm(&self) -> &Algorithm {
        &self.shared.algorithm
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.shared.config
    }

    /// Number of statistics requests issued so far.
    pub fn overhead(&self) -> u64 {
        self.shared.channel.overhead().get()
    }

    /// Current content of the statistics file.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.shared.snapshot()
    }

    /// Write the statistics file now.
    pub fn write_statistics(&self) -> Result<(), ExportError> {
        self.shared.write_statistics()
    }

    /// Monitor until `until` completes or the controller closes the event channel.
    ///
    /// The background task of the algorithm is not stopped when this returns; it lives as long
    /// as the runtime. The statistics file is written one last time before returning.
    pub async fn run<F>(&self, mut events: UnboundedReceiver<ControllerEvent>, until: F)
    where
        F: Future<Output = ()>,
    {
        log::info!("Using algorithm: {}", self.shared.algorithm);

        let shared = self.shared.clone();
        tokio::spawn(async move { shared.algorithm.background().await });
        let helpers = [self.spawn_overhead_tracker(), self.spawn_writer()];

        tokio::pin!(until);
        loop {
            tokio::select! {
                biased;
                _ = &mut until => break,
                event = events.recv() => match event {
                    Some(event) => self.shared.algorithm.handle_event(&event),
                    None => {
                        log::warn!("Controller closed the event channel");
                        break;
                    }
                },
            }
        }

        for helper in helpers {
            helper.abort();
        }
        self.shared.track_overhead();
        if let Err(e) = self.shared.write_statistics() {
            log::error!("Could not write stats: {e}");
        }
    }

    fn spawn_overhead_tracker(&self) -> JoinHandle<()> {
        let shared = self.shared.clone();
        tokio::spawn(async move {
            loop {
                shared.track_overhead();
                tokio::time::sleep(shared.config.overhead_interval).await;
            }
        })
    }

    fn spawn_writer(&self) -> JoinHandle<()> {
        let shared = self.shared.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(shared.config.write_interval).await;
                if let Err(e) = shared.write_statistics() {
                    log::error!("Could not write stats: {e}");
                }
            }
        })
    }
}
