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
//! Adaptation of the polling interval to the observed traffic.

use std::{sync::Arc, thread};

use rand::prelude::*;

use crate::{
    algorithm::{Algorithm, AlgorithmKind, MonitoringAlgorithm},
    config::{MonitorConfig, Parameters},
    controller::{test::RecordingController, ControlChannel, ControllerEvent, FlowRef, FlowSample},
};

use super::check_table;

fn build(kind: AlgorithmKind, flows: &[FlowRef]) -> (Algorithm, Arc<RecordingController>) {
    let ctrl = RecordingController::with_flows(flows);
    let algo = Algorithm::build(
        kind,
        &MonitorConfig::default(),
        ControlChannel::new(ctrl.clone()),
    )
    .unwrap();
    (algo, ctrl)
}

fn reply(flow_id: u64, switch_id: u64, total_bytes: u64, total_duration_ms: u64) -> ControllerEvent {
    ControllerEvent::StatisticsReply {
        switch_id,
        samples: vec![FlowSample {
            flow_id,
            total_bytes,
            total_duration_ms,
        }],
    }
}

#[test]
fn quiet_then_busy_flow() {
    for kind in [
        AlgorithmKind::PaylessMultiThread,
        AlgorithmKind::PaylessSingleThread,
    ] {
        let (algo, _) = build(kind, &[]);
        let table = algo.payless().unwrap().table();

        algo.handle_event(&ControllerEvent::FlowCreated {
            flow_id: 1,
            switch_id: 10,
        });
        assert_eq!(table.lookup(1), Some((10, 2750)));

        algo.handle_event(&reply(1, 10, 100, 1000));
        assert_eq!(table.lookup(1), Some((10, 5000)));

        algo.handle_event(&reply(1, 10, 5_000_100, 2000));
        assert_eq!(table.lookup(1), Some((10, 833)));

        // within the thresholds
        algo.handle_event(&reply(1, 10, 6_000_100, 3000));
        assert_eq!(table.lookup(1), Some((10, 833)));

        algo.handle_event(&reply(1, 10, 6_000_100, 4000));
        assert_eq!(table.lookup(1), Some((10, 1666)));

        let log = algo.statistics().log(1);
        assert_eq!(
            log.iter().map(|s| s.bytes).collect::<Vec<_>>(),
            vec![100, 5_000_000, 1_000_000, 0]
        );

        algo.handle_event(&ControllerEvent::FlowRemoved {
            flow_id: 1,
            total_bytes: 6_000_200,
            total_duration_ms: 4100,
        });
        assert!(table.is_empty());
        assert_eq!(algo.statistics().log(1).len(), 5);
    }
}

#[test]
fn random_traffic_stays_in_bounds() {
    let flows: Vec<FlowRef> = (0..50).map(|i| FlowRef::new(i, i % 4)).collect();
    let (algo, _) = build(AlgorithmKind::PaylessSingleThread, &[]);
    let core = algo.payless().unwrap();
    let params = *core.parameters();
    for f in &flows {
        algo.handle_flow_created(f.flow_id, f.switch_id);
    }

    let mut rng = StdRng::seed_from_u64(7);
    let mut totals = vec![0u64; flows.len()];
    for round in 1..=2000u64 {
        let f = flows[rng.gen_range(0..flows.len())];
        let total = &mut totals[f.flow_id as usize];
        *total += rng.gen_range(0..3_000_000);
        let before = core.table().lookup(f.flow_id).unwrap().1;
        let delta = algo.statistics().state(f.flow_id).map(|s| s.total_bytes).unwrap_or(0);
        let delta = *total as i64 - delta as i64;

        algo.handle_event(&reply(f.flow_id, f.switch_id, *total, round));

        let after = core.table().lookup(f.flow_id).unwrap().1;
        assert_eq!(after, params.next_tau(before, delta));
        if round % 100 == 0 {
            check_table(core.table(), &params);
        }
    }
    assert_eq!(core.table().len(), flows.len());
}

#[test]
fn concurrent_replies_and_removals() {
    let (algo, _) = build(AlgorithmKind::PaylessMultiThread, &[]);
    let algo = Arc::new(algo);
    for i in 0..40 {
        algo.handle_flow_created(i, i % 4);
    }

    let workers: Vec<_> = (0..4u64)
        .map(|w| {
            let algo = algo.clone();
            thread::spawn(move || {
                for round in 1..=200u64 {
                    for flow_id in (w..40).step_by(4) {
                        let bytes = if round % 3 == 0 { round * 2_000_000 } else { round };
                        algo.handle_statistics_reply(&[FlowSample {
                            flow_id,
                            total_bytes: bytes,
                            total_duration_ms: round,
                        }]);
                    }
                }
            })
        })
        .collect();
    let remover = {
        let algo = algo.clone();
        thread::spawn(move || {
            for flow_id in 0..10 {
                algo.handle_flow_removed(flow_id, 0, 0);
            }
        })
    };
    for w in workers {
        w.join().unwrap();
    }
    remover.join().unwrap();

    let core = algo.payless().unwrap();
    check_table(core.table(), core.parameters());
    assert_eq!(core.table().len(), 30);
    assert!((0..10).all(|f| core.table().lookup(f).is_none()));
}

#[test]
fn reconciliation_adds_flows_once() {
    let flows = [FlowRef::new(1, 10), FlowRef::new(2, 11)];
    let (algo, ctrl) = build(AlgorithmKind::PaylessSingleThread, &flows);
    let core = algo.payless().unwrap();

    algo.handle_flow_created(1, 10);
    algo.handle_event(&reply(1, 10, 10, 1000));
    assert_eq!(core.add_missing_flows(), vec![FlowRef::new(2, 11)]);
    assert!(core.add_missing_flows().is_empty());
    assert_eq!(core.table().lookup(1), Some((10, 5000)));
    assert_eq!(core.table().lookup(2), Some((11, 2750)));

    // removed but still listed by the controller
    algo.handle_flow_removed(2, 20, 2000);
    assert!(core.add_missing_flows().is_empty());
    assert!(ctrl.requests().is_empty());
}
