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
//! The statistics file written during a monitoring run.
//!
//! ```json
//! {
//!   "algorithm": "payless-multi-thread",
//!   "flow_info": { "<flow_id>": { "flow_id", "switch_id", "ipv4_src", "ipv4_dst" } },
//!   "flow_stats": { "<flow_id>": { "<unix_timestamp>": {
//!       "bytes", "duration", "total_bytes", "total_duration" } } },
//!   "overhead": { "<unix_timestamp>": count }
//! }
//! ```

use std::{
    collections::BTreeMap,
    fs,
    io::{BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{controller::FlowInfo, stats::Sample, FlowId};

/// Samples of one flow, keyed by the time they were taken.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowSeries(#[serde(with = "payless_utils::serde::timestamp_map")] pub Vec<(f64, Sample)>);

impl FlowSeries {
    /// Samples in time order, with their timestamps restored from the keys.
    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.0.iter().map(|(timestamp, s)| Sample {
            timestamp: *timestamp,
            ..*s
        })
    }
}

impl From<Vec<Sample>> for FlowSeries {
    fn from(samples: Vec<Sample>) -> Self {
        Self(samples.into_iter().map(|s| (s.timestamp, s)).collect())
    }
}

/// Content of a statistics file. Fields are in alphabetical order, maps are ordered by flow id
/// or time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub algorithm: String,
    pub flow_info: BTreeMap<FlowId, FlowInfo>,
    pub flow_stats: BTreeMap<FlowId, FlowSeries>,
    #[serde(with = "payless_utils::serde::timestamp_map")]
    pub overhead: Vec<(f64, u64)>,
}

impl StatsSnapshot {
    /// Write the snapshot as pretty-printed JSON, creating parent directories as needed.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let mut writer = BufWriter::new(fs::File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a statistics file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ExportError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Sum of all byte deltas of a flow, i.e., the last known total.
    pub fn total_bytes(&self, flow_id: FlowId) -> i64 {
        self.flow_stats
            .get(&flow_id)
            .map(|series| series.samples().map(|s| s.bytes).sum())
            .unwrap_or_default()
    }

    /// Number of statistics requests at the end of the run.
    pub fn final_overhead(&self) -> u64 {
        self.overhead.last().map(|(_, c)| *c).unwrap_or_default()
    }

    /// Overhead per whole second since the first datapoint. Datapoints rounding to the same second
    /// are merged, keeping the latest one.
    pub fn overhead_series(&self, mode: OverheadMode) -> Vec<(u64, u64)> {
        let Some((t0, _)) = self.overhead.first() else {
            return Vec::new();
        };
        let mut series: Vec<(u64, u64)> = Vec::with_capacity(self.overhead.len());
        for (t, count) in self.overhead.iter() {
            let second = (t - t0).max(0.0).round() as u64;
            match series.last_mut() {
                Some(last) if last.0 == second => last.1 = *count,
                _ => series.push((second, *count)),
            }
        }
        if mode == OverheadMode::Relative {
            let mut prev = 0;
            for point in series.iter_mut() {
                (point.1, prev) = (point.1.saturating_sub(prev), point.1);
            }
        }
        series
    }
}

/// How to report the overhead over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum_macros::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum OverheadMode {
    /// Total number of requests so far.
    Cumulative,
    /// Requests since the previous datapoint.
    Relative,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
