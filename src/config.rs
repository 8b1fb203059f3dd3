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
//! Parameters of the monitoring strategies.

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Tau;

/// Parameters of the adaptive Payless scheduler. Immutable for a scheduler instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters {
    /// Smallest polling interval in milliseconds.
    pub tau_min: Tau,
    /// Largest polling interval in milliseconds.
    pub tau_max: Tau,
    /// Factor by which tau grows when a flow carries little traffic.
    pub alpha: u64,
    /// Divisor by which tau shrinks when a flow carries a lot of traffic.
    pub beta: u64,
    /// Low-traffic threshold in bytes per polling interval.
    pub delta_1: u64,
    /// High-traffic threshold in bytes per polling interval.
    pub delta_2: u64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            tau_min: 500,
            tau_max: 5000,
            alpha: 2,
            beta: 6,
            delta_1: 1_000_000,
            delta_2: 1_000_000,
        }
    }
}

impl Parameters {
    /// Initial tau of every newly scheduled flow, the (floored) middle of `[tau_min, tau_max]`.
    pub fn tau_start(&self) -> Tau {
        ((u128::from(self.tau_min) + u128::from(self.tau_max)) / 2) as Tau
    }

    /// Compute the next tau of a flow currently polled every `tau` ms that transferred
    /// `bytes_delta` bytes since the last sample.
    ///
    /// - `bytes_delta < delta_1`: `min(tau * alpha, tau_max)`
    /// - `bytes_delta > delta_2`: `max(tau / beta, tau_min)` (floor division)
    /// - otherwise `tau` is kept.
    pub fn next_tau(&self, tau: Tau, bytes_delta: i64) -> Tau {
        let delta = i128::from(bytes_delta);
        if delta < i128::from(self.delta_1) {
            tau.saturating_mul(self.alpha).min(self.tau_max)
        } else if delta > i128::from(self.delta_2) {
            (tau / self.beta).max(self.tau_min)
        } else {
            tau
        }
    }

    /// Check that the parameters describe a usable scheduler.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tau_min == 0 {
            return Err(ConfigError::ZeroTauMin);
        }
        if self.tau_min > self.tau_max {
            return Err(ConfigError::TauRange(self.tau_min, self.tau_max));
        }
        if self.alpha == 0 || self.beta == 0 {
            return Err(ConfigError::ZeroFactor);
        }
        if self.delta_1 > self.delta_2 {
            return Err(ConfigError::Thresholds(self.delta_1, self.delta_2));
        }
        Ok(())
    }
}

/// Configuration of a monitoring run.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Payless parameters (ignored by the baselines).
    pub parameters: Parameters,
    /// Interval of the periodic polling baselines.
    pub polling_interval: Duration,
    /// Tick of the Payless supervisor and reconciliation pass.
    pub reconcile_interval: Duration,
    /// How often the overhead counter is sampled.
    pub overhead_interval: Duration,
    /// How often the statistics file is rewritten.
    pub write_interval: Duration,
    /// Where the statistics are written to.
    pub stats_file: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            parameters: Parameters::default(),
            polling_interval: Duration::from_secs(1),
            reconcile_interval: Duration::from_secs(1),
            overhead_interval: Duration::from_secs(1),
            write_interval: Duration::from_secs(10),
            stats_file: PathBuf::from("stats.json"),
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parameters.validate()?;
        for (name, d) in [
            ("polling_interval", self.polling_interval),
            ("reconcile_interval", self.reconcile_interval),
            ("overhead_interval", self.overhead_interval),
            ("write_interval", self.write_interval),
        ] {
            if d.is_zero() {
                return Err(ConfigError::ZeroInterval(name));
            }
        }
        Ok(())
    }
}

/// Error thrown when the monitoring configuration is not usable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown monitoring algorithm: {0}")]
    UnknownAlgorithm(String),
    #[error("tau_min must be positive")]
    ZeroTauMin,
    #[error("tau_min ({0}) must not exceed tau_max ({1})")]
    TauRange(Tau, Tau),
    #[error("alpha and beta must be positive")]
    ZeroFactor,
    #[error("delta_1 ({0}) must not exceed delta_2 ({1})")]
    Thresholds(u64, u64),
    #[error("{0} must be positive")]
    ZeroInterval(&'static str),
}
