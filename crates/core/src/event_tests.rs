// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn record_wire_shape() {
    let record = EventRecord {
        ts: "2026-02-11T09:30:00.123Z".into(),
        run_id: RunId::new("run-abc"),
        task_id: Some("7".into()),
        attempt: Some(1),
        event: Event::ContainerStart { container_id: "deadbeef".into() },
    };
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["ts"], "2026-02-11T09:30:00.123Z");
    assert_eq!(json["run_id"], "run-abc");
    assert_eq!(json["task_id"], "7");
    assert_eq!(json["attempt"], 1);
    assert_eq!(json["type"], "container.start");
    assert_eq!(json["payload"]["container_id"], "deadbeef");
}

#[test]
fn optional_envelope_fields_are_omitted() {
    let record = EventRecord {
        ts: "2026-02-11T09:30:00.000Z".into(),
        run_id: RunId::new("run-abc"),
        task_id: None,
        attempt: None,
        event: Event::RunStart { max_parallel: 4, task_count: 9 },
    };
    let json = serde_json::to_value(&record).unwrap();
    assert!(json.get("task_id").is_none());
    assert!(json.get("attempt").is_none());
}

#[test]
fn event_type_matches_serde_tag() {
    let events = vec![
        Event::RunStop {
            signal: "SIGINT".into(),
            containers: "left_running".into(),
            stop_containers_requested: false,
        },
        Event::DoctorCanarySkipped {},
        Event::BatchMergeRecovered { batch_id: "bat-1".into() },
        Event::CodexThreadResumed { thread_id: "t-1".into() },
    ];
    for event in events {
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.event_type(), "tag mismatch for {event:?}");
    }
}

#[test]
fn round_trips_through_json() {
    let event = Event::BootstrapCmdFail {
        index: 2,
        exit_code: 127,
        stdout: String::new(),
        stderr: "sh: not found".into(),
    };
    let json = serde_json::to_string(&event).unwrap();
    let back: Event = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}

#[test]
fn log_summary_carries_failure_detail() {
    let event = Event::TaskFailed { code: "GIT_ERROR".into(), error: "merge failed".into() };
    assert_eq!(event.log_summary(), "task.failed GIT_ERROR: merge failed");
}
