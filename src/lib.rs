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
//! Library for adaptive polling of flow statistics in software-defined networks.
//!
//! The monitoring strategies live in [`algorithm`]; the adaptive Payless scheduler is built on
//! the [`schedule::ScheduleTable`] and the [`stats::StatisticsAccumulator`].

/// Identifier of a flow rule, assigned by the controller.
pub type FlowId = u64;
/// Identifier of a switch (datapath id).
pub type SwitchId = u64;
/// Polling interval in milliseconds.
pub type Tau = u64;

pub mod algorithm;
pub mod config;
pub mod controller;
pub mod export;
pub mod framework;
pub mod schedule;
pub mod sim;
pub mod stats;
pub mod util;

#[cfg(test)]
mod test;

pub mod prelude {
    pub use super::{
        algorithm::{Algorithm, AlgorithmKind, MonitoringAlgorithm},
        config::{MonitorConfig, Parameters},
        controller::{ControlChannel, Controller, ControllerEvent, FlowInfo, FlowRef},
        framework::MonitoringFramework,
        schedule::ScheduleTable,
        stats::StatisticsAccumulator,
        FlowId, SwitchId, Tau,
    };
}
