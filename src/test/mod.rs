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
//! Scenario tests spanning multiple modules.
//!
//! Time-driven tests run on a paused tokio clock, so they finish instantly and are deterministic.

use crate::{config::Parameters, schedule::ScheduleTable};

/// Every scheduled flow sits in exactly one bucket, and every bucket is within the bounds.
pub fn check_table(table: &ScheduleTable, params: &Parameters) {
    let buckets = table.buckets();
    let mut seen = std::collections::HashSet::new();
    for (tau, bucket) in buckets.iter() {
        assert!(!bucket.is_empty(), "empty bucket {tau}");
        assert!(
            (params.tau_min..=params.tau_max).contains(tau),
            "tau {tau} out of bounds"
        );
        for flow_id in bucket.keys() {
            assert!(seen.insert(*flow_id), "flow {flow_id} in two buckets");
            assert_eq!(table.lookup(*flow_id).map(|(_, t)| t), Some(*tau));
        }
    }
    assert_eq!(seen.len(), table.len());
}

mod adaptation;
