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
//! Per-flow running totals and the append-only statistics log.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, PoisonError},
};

use serde::{Deserialize, Serialize};

use payless_utils::other::unix_timestamp;

use crate::FlowId;

/// Last cumulative counters seen for a flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowState {
    pub total_bytes: u64,
    pub total_duration_ms: u64,
}

/// One entry of the statistics log of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unix timestamp (seconds) at which the sample was recorded.
    #[serde(skip)]
    pub timestamp: f64,
    /// Bytes since the previous sample. Negative after a counter reset.
    pub bytes: i64,
    /// Milliseconds since the previous sample.
    pub duration: i64,
    /// Cumulative byte counter reported by the switch.
    pub total_bytes: u64,
    /// Cumulative duration reported by the switch, in milliseconds.
    pub total_duration: u64,
}

#[derive(Debug, Default)]
struct FlowRecord {
    /// `None` before the first sample and after the final one.
    state: Option<FlowState>,
    log: Vec<Sample>,
}

/// Turns successive cumulative samples into deltas and keeps every sample in a per-flow log.
///
/// Safe to share between tasks; all flows live behind a single lock, which is only held for the
/// duration of one `record`.
#[derive(Debug, Default)]
pub struct StatisticsAccumulator {
    flows: Mutex<HashMap<FlowId, FlowRecord>>,
}

impl StatisticsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample taken now. Returns `(bytes_delta, duration_delta)`.
    pub fn record(&self, flow_id: FlowId, total_bytes: u64, total_duration_ms: u64) -> (i64, i64) {
        self.record_at(flow_id, total_bytes, total_duration_ms, unix_timestamp())
    }

    /// Record the last sample of a removed flow. The log is kept, but the running totals are
    /// dropped, so a later flow with the same id starts again from `(0, 0)`.
    pub fn record_final(
        &self,
        flow_id: FlowId,
        total_bytes: u64,
        total_duration_ms: u64,
    ) -> (i64, i64) {
        self.append(flow_id, total_bytes, total_duration_ms, unix_timestamp(), true)
    }

    /// Record a sample with an explicit timestamp.
    ///
    /// The first sample of a flow is compared against `(0, 0)`, so its delta equals the raw
    /// counters. Decreasing counters yield negative deltas, which are stored as they are.
    pub fn record_at(
        &self,
        flow_id: FlowId,
        total_bytes: u64,
        total_duration_ms: u64,
        timestamp: f64,
    ) -> (i64, i64) {
        self.append(flow_id, total_bytes, total_duration_ms, timestamp, false)
    }

    fn append(
        &self,
        flow_id: FlowId,
        total_bytes: u64,
        total_duration_ms: u64,
        timestamp: f64,
        last: bool,
    ) -> (i64, i64) {
        let mut flows = self.flows.lock().unwrap_or_else(PoisonError::into_inner);
        let record = flows.entry(flow_id).or_default();

        let prev = record.state.unwrap_or_default();
        let bytes = delta(total_bytes, prev.total_bytes);
        let duration = delta(total_duration_ms, prev.total_duration_ms);

        record.state = (!last).then_some(FlowState {
            total_bytes,
            total_duration_ms,
        });
        record.log.push(Sample {
            timestamp,
            bytes,
            duration,
            total_bytes,
            total_duration: total_duration_ms,
        });

        log::debug!("[F{flow_id}] Stats: bytes={bytes}, duration={duration}");
        (bytes, duration)
    }

    /// Last counters seen for a live flow. `None` if no sample was recorded yet or the flow was
    /// removed.
    pub fn state(&self, flow_id: FlowId) -> Option<FlowState> {
        let flows = self.flows.lock().unwrap_or_else(PoisonError::into_inner);
        flows.get(&flow_id).and_then(|r| r.state)
    }

    /// Copy of the statistics log of a flow, in insertion order.
    pub fn log(&self, flow_id: FlowId) -> Vec<Sample> {
        let flows = self.flows.lock().unwrap_or_else(PoisonError::into_inner);
        flows.get(&flow_id).map(|r| r.log.clone()).unwrap_or_default()
    }

    /// Copy of all statistics logs, ordered by flow id.
    pub fn snapshot(&self) -> BTreeMap<FlowId, Vec<Sample>> {
        let flows = self.flows.lock().unwrap_or_else(PoisonError::into_inner);
        flows
            .iter()
            .map(|(id, r)| (*id, r.log.clone()))
            .collect()
    }

    /// Number of flows with at least one sample.
    pub fn num_flows(&self) -> usize {
        self.flows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn delta(current: u64, previous: u64) -> i64 {
    (i128::from(current) - i128::from(previous)).clamp(i64::MIN.into(), i64::MAX.into()) as i64
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn deltas() {
        let acc = StatisticsAccumulator::new();
        assert_eq!(acc.record_at(7, 1000, 200, 1.0), (1000, 200));
        assert_eq!(acc.record_at(7, 1500, 250, 2.0), (500, 50));
        assert_eq!(
            acc.state(7),
            Some(FlowState {
                total_bytes: 1500,
                total_duration_ms: 250
            })
        );

        let log = acc.log(7);
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].timestamp, 2.0);
        assert_eq!((log[1].bytes, log[1].duration), (500, 50));
        assert_eq!((log[1].total_bytes, log[1].total_duration), (1500, 250));
    }

    #[test]
    fn counter_reset_is_negative() {
        let acc = StatisticsAccumulator::new();
        acc.record_at(1, 5000, 100, 1.0);
        assert_eq!(acc.record_at(1, 300, 10, 2.0), (-4700, -90));
        assert_eq!(acc.log(1)[1].bytes, -4700);
    }

    #[test]
    fn removal_drops_running_totals() {
        let acc = StatisticsAccumulator::new();
        acc.record_at(3, 800, 100, 1.0);
        assert_eq!(acc.record_final(3, 1000, 400), (200, 300));
        assert_eq!(acc.state(3), None);
        assert_eq!(acc.log(3).len(), 2);

        // a reused id counts from zero again, the log keeps growing
        assert_eq!(acc.record_at(3, 50, 10, 5.0), (50, 10));
        assert_eq!(acc.log(3).len(), 3);
    }

    #[test]
    fn flows_are_independent() {
        let acc = StatisticsAccumulator::new();
        acc.record_at(1, 100, 1, 1.0);
        assert_eq!(acc.record_at(2, 40, 1, 1.0), (40, 1));
        assert_eq!(acc.num_flows(), 2);
        assert!(acc.log(3).is_empty());
        assert_eq!(acc.state(3), None);
        assert_eq!(acc.snapshot().keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn concurrent_records_keep_every_sample() {
        let acc = Arc::new(StatisticsAccumulator::new());
        let handles = (0..8)
            .map(|t| {
                let acc = acc.clone();
                thread::spawn(move || {
                    for i in 1..=100u64 {
                        acc.record_at(t % 2, i * 10, i, i as f64);
                    }
                })
            })
            .collect::<Vec<_>>();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(acc.log(0).len() + acc.log(1).len(), 800);
        // deltas of a flow always sum up to the last cumulative counter
        for flow in [0, 1] {
            let log = acc.log(flow);
            let sum: i64 = log.iter().map(|s| s.bytes).sum();
            assert_eq!(sum, log.last().unwrap().total_bytes as i64);
        }
    }

    #[test]
    fn serialized_fields() {
        let s = Sample {
            timestamp: 3.5,
            bytes: 10,
            duration: 2,
            total_bytes: 110,
            total_duration: 20,
        };
        assert_eq!(
            serde_json::to_string(&s).unwrap(),
            r#"{"bytes":10,"duration":2,"total_bytes":110,"total_duration":20}"#
        );
    }
}
