// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const ALL_STATES: [WorkerState; 5] = [
    WorkerState::Stopped,
    WorkerState::Starting,
    WorkerState::Running,
    WorkerState::Stopping,
    WorkerState::Error,
];

#[test]
fn only_table_edges_are_legal() {
    let legal = [
        (WorkerState::Stopped, WorkerState::Starting),
        (WorkerState::Starting, WorkerState::Running),
        (WorkerState::Starting, WorkerState::Error),
        (WorkerState::Running, WorkerState::Stopping),
        (WorkerState::Running, WorkerState::Error),
        (WorkerState::Stopping, WorkerState::Stopped),
        (WorkerState::Error, WorkerState::Starting),
    ];

    for from in ALL_STATES {
        for to in ALL_STATES {
            let expected = legal.contains(&(from, to));
            assert_eq!(
                from.can_transition_to(to),
                expected,
                "transition {from:?} -> {to:?} expected {expected}"
            );
        }
    }
}

#[test]
fn pid_validity_matches_running_and_stopping_only() {
    assert!(!WorkerState::Stopped.holds_pid());
    assert!(!WorkerState::Starting.holds_pid());
    assert!(WorkerState::Running.holds_pid());
    assert!(WorkerState::Stopping.holds_pid());
    assert!(!WorkerState::Error.holds_pid());
}

#[test]
fn worker_id_display_round_trips_through_uuid() {
    let id = WorkerId::new();
    let text = id.to_string();
    assert_eq!(text, id.0.to_string());
}
