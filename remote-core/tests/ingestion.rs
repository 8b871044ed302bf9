mod common;

use common::Bench;
use remote_core::command::{CommandParseError, IngestRejection, PowerIntent};
use remote_core::context::EventDisposition;
use remote_core::orchestrator::LifecycleState;
use remote_core::telemetry::TelemetryEventKind;

#[test]
fn malformed_payloads_are_dropped_silently() {
    let mut bench = Bench::new();
    bench.tick();

    for payload in ["", "POWER", "onoff", "1"] {
        assert_eq!(
            bench.command(payload),
            EventDisposition::Command(Err(IngestRejection::Malformed(
                CommandParseError::Unrecognized
            )))
        );
    }
    bench.tick();

    assert_eq!(bench.lifecycle(), LifecycleState::Standby);
    assert_eq!(bench.broker().published.len(), 1);
}

#[test]
fn own_status_echo_is_redundant() {
    let mut bench = Bench::new();
    bench.tick();
    assert_eq!(
        bench.command("OFF"),
        EventDisposition::Command(Err(IngestRejection::Redundant))
    );

    let mut bench = Bench::connected();
    assert_eq!(
        bench.command("ON"),
        EventDisposition::Command(Err(IngestRejection::Redundant))
    );
    bench.tick();
    assert_eq!(bench.lifecycle(), LifecycleState::Connected);
}

#[test]
fn commands_are_case_insensitive() {
    let mut bench = Bench::new();
    assert_eq!(
        bench.command("tOgGlE"),
        EventDisposition::Command(Ok(PowerIntent::WakeRequested))
    );
}

#[test]
fn every_command_is_dropped_while_waking() {
    let mut bench = Bench::new();
    bench.command("ON");
    bench.tick();
    assert_eq!(bench.lifecycle(), LifecycleState::WakingUp);

    for payload in ["ON", "OFF", "TOGGLE"] {
        assert_eq!(
            bench.command(payload),
            EventDisposition::Command(Err(IngestRejection::Busy))
        );
    }
}

#[test]
fn drops_are_recorded_in_telemetry() {
    let mut bench = Bench::new();
    bench.command("ON");
    bench.command("TOGGLE");

    let events: Vec<TelemetryEventKind> = bench
        .context
        .telemetry()
        .oldest_first()
        .map(|record| record.event)
        .collect();
    assert_eq!(
        events,
        vec![
            TelemetryEventKind::CommandAccepted(PowerIntent::WakeRequested),
            TelemetryEventKind::CommandDropped(IngestRejection::Duplicate),
        ]
    );
}
