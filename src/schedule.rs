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
//! The schedule table: which flows are polled at which interval.
//!
//! Every flow is in at most one bucket. All reads and writes go through one lock, and a move
//! between buckets happens inside a single critical section, so no observer can see a flow in two
//! buckets or in none while it is still scheduled.

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::{controller::FlowRef, FlowId, SwitchId, Tau};

/// Flows of a bucket, mapped to the switch they are installed on.
pub type Bucket = BTreeMap<FlowId, SwitchId>;

#[derive(Debug, Default)]
struct Table {
    buckets: BTreeMap<Tau, Bucket>,
    /// Flows that were explicitly removed. Reconciliation does not bring them back.
    retired: HashSet<FlowId>,
}

impl Table {
    fn find(&self, flow_id: FlowId) -> Option<(SwitchId, Tau)> {
        self.buckets
            .iter()
            .find_map(|(tau, bucket)| bucket.get(&flow_id).map(|switch| (*switch, *tau)))
    }

    fn detach(&mut self, flow_id: FlowId) -> Option<(SwitchId, Tau)> {
        let (switch_id, tau) = self.find(flow_id)?;
        if let Some(bucket) = self.buckets.get_mut(&tau) {
            bucket.remove(&flow_id);
            if bucket.is_empty() {
                self.buckets.remove(&tau);
            }
        }
        Some((switch_id, tau))
    }

    fn insert(&mut self, flow_id: FlowId, switch_id: SwitchId, tau: Tau) {
        self.buckets
            .entry(tau)
            .or_default()
            .insert(flow_id, switch_id);
    }
}

/// Authoritative mapping from tau to the flows polled at that interval.
#[derive(Debug, Default)]
pub struct ScheduleTable {
    inner: Mutex<Table>,
}

impl ScheduleTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put a flow into bucket `tau`, taking it out of its previous bucket first.
    pub fn assign(&self, flow_id: FlowId, switch_id: SwitchId, tau: Tau) {
        let mut table = self.lock();
        table.retired.remove(&flow_id);
        table.detach(flow_id);
        table.insert(flow_id, switch_id, tau);
    }

    /// Remove a flow from whichever bucket holds it. Empty buckets are pruned. Returns the
    /// previous `(switch_id, tau)`, or `None` if the flow was not scheduled.
    ///
    /// A scheduled flow is remembered as removed, so that [`ScheduleTable::insert_missing`] does not
    /// schedule it again until it is explicitly assigned.
    pub fn remove(&self, flow_id: FlowId) -> Option<(SwitchId, Tau)> {
        let mut table = self.lock();
        let prev = table.detach(flow_id);
        if prev.is_some() {
            table.retired.insert(flow_id);
        }
        prev
    }

    /// Current `(switch_id, tau)` of a flow. Linear in the number of buckets.
    pub fn lookup(&self, flow_id: FlowId) -> Option<(SwitchId, Tau)> {
        self.lock().find(flow_id)
    }

    /// Read the tau of a flow, compute a new one and move the flow, all in one critical section.
    ///
    /// Returns `(old_tau, new_tau)`, or `None` if the flow is not scheduled (in which case `f` is
    /// not called).
    pub fn adjust<F>(&self, flow_id: FlowId, f: F) -> Option<(Tau, Tau)>
    where
        F: FnOnce(Tau) -> Tau,
    {
        let mut table = self.lock();
        let (switch_id, tau) = table.find(flow_id)?;
        let new_tau = f(tau);
        if new_tau != tau {
            table.detach(flow_id);
            table.insert(flow_id, switch_id, new_tau);
        }
        Some((tau, new_tau))
    }

    /// Schedule every given flow that is not yet in the table (and was not removed) at `tau`.
    /// Returns the flows that were added.
    ///
    /// `flows` is the complete list of live flows. Removed flows that no longer appear in it are
    /// forgotten, which requires successive calls to pass successively newer lists.
    pub fn insert_missing<I>(&self, flows: I, tau: Tau) -> Vec<FlowRef>
    where
        I: IntoIterator<Item = FlowRef>,
    {
        let flows: Vec<FlowRef> = flows.into_iter().collect();
        let mut table = self.lock();
        let scheduled: HashSet<FlowId> = table
            .buckets
            .values()
            .flat_map(|bucket| bucket.keys().copied())
            .collect();

        let mut added = Vec::new();
        for flow in flows.iter() {
            if scheduled.contains(&flow.flow_id)
                || table.retired.contains(&flow.flow_id)
                || added.iter().any(|f: &FlowRef| f.flow_id == flow.flow_id)
            {
                continue;
            }
            table.insert(flow.flow_id, flow.switch_id, tau);
            added.push(*flow);
        }

        let live: HashSet<FlowId> = flows.iter().map(|f| f.flow_id).collect();
        table.retired.retain(|flow_id| live.contains(flow_id));
        added
    }

    /// Snapshot of all buckets.
    pub fn buckets(&self) -> BTreeMap<Tau, Bucket> {
        self.lock().buckets.clone()
    }

    /// Taus of all non-empty buckets, in ascending order.
    pub fn taus(&self) -> Vec<Tau> {
        self.lock().buckets.keys().copied().collect()
    }

    /// Switches that own at least one flow of bucket `tau`. Empty if there is no such bucket.
    pub fn switches(&self, tau: Tau) -> BTreeSet<SwitchId> {
        self.lock()
            .buckets
            .get(&tau)
            .map(|bucket| bucket.values().copied().collect())
            .unwrap_or_default()
    }

    pub fn contains_bucket(&self, tau: Tau) -> bool {
        self.lock().buckets.contains_key(&tau)
    }

    /// Number of scheduled flows.
    pub fn len(&self) -> usize {
        self.lock().buckets.values().map(|b| b.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().buckets.is_empty()
    }
}
