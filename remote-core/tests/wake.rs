mod common;

use common::{Bench, RECEIVER};
use remote_core::beacon::AdvertisingPayload;
use remote_core::command::{IngestRejection, PowerIntent};
use remote_core::context::EventDisposition;
use remote_core::orchestrator::LifecycleState;
use remote_core::reconciler::{PowerStatus, SyncOutcome};
use remote_core::toggle::ExpectedTransition;

#[test]
fn wake_window_expires_back_to_standby_without_connection() {
    let mut bench = Bench::new();
    bench.tick();
    assert_eq!(bench.broker().statuses(), vec![PowerStatus::Off]);

    assert_eq!(
        bench.command("ON"),
        EventDisposition::Command(Ok(PowerIntent::WakeRequested))
    );
    bench.tick();
    assert_eq!(bench.lifecycle(), LifecycleState::WakingUp);
    assert_eq!(bench.radio().payload, Some(AdvertisingPayload::WakeSignal));

    bench.ticks(99);
    assert_eq!(bench.lifecycle(), LifecycleState::WakingUp);

    let last = bench.tick();
    assert!(last.report.changed());
    assert_eq!(bench.lifecycle(), LifecycleState::Standby);
    assert_eq!(bench.radio().payload, Some(AdvertisingPayload::DeviceName));
    assert!(bench.radio().advertising);
    assert_eq!(bench.broker().statuses(), vec![PowerStatus::Off]);
}

#[test]
fn connection_preempts_remaining_wake_window() {
    let mut bench = Bench::new();
    bench.tick();
    bench.command("on");
    bench.tick();
    bench.ticks(40);

    bench.connect(RECEIVER);
    let result = bench.tick();

    assert_eq!(result.report.previous, LifecycleState::WakingUp);
    assert_eq!(bench.lifecycle(), LifecycleState::Connected);
    assert!(!bench.radio().advertising);
    assert_eq!(
        bench.broker().statuses(),
        vec![PowerStatus::Off, PowerStatus::On]
    );
    assert!(!bench.context.orchestrator().operation_in_flight());
}

#[test]
fn late_connection_within_confirmation_window_is_confirmed() {
    let mut bench = Bench::new();
    bench.tick();
    bench.command("TOGGLE");
    bench.ticks(101);
    assert_eq!(bench.lifecycle(), LifecycleState::Standby);
    assert_eq!(
        bench.context.orchestrator().awaiting(),
        Some(ExpectedTransition::Connect)
    );

    // Still waiting for the receiver, so further commands are dropped.
    assert_eq!(
        bench.command("ON"),
        EventDisposition::Command(Err(IngestRejection::Busy))
    );

    bench.ticks(100);
    bench.connect(RECEIVER);
    let result = bench.tick();

    assert_eq!(result.report.confirmed, Some(ExpectedTransition::Connect));
    assert_eq!(bench.lifecycle(), LifecycleState::Connected);
    assert_eq!(bench.context.orchestrator().awaiting(), None);
}

#[test]
fn unanswered_wake_republishes_off_after_confirmation_timeout() {
    let mut bench = Bench::new();
    bench.tick();
    bench.command("ON");
    bench.ticks(101);

    // 30 s confirmation window is 600 ticks after the beacon stopped.
    bench.ticks(599);
    assert_eq!(
        bench.context.orchestrator().awaiting(),
        Some(ExpectedTransition::Connect)
    );

    let result = bench.tick();
    assert_eq!(result.report.failed, Some(ExpectedTransition::Connect));
    assert_eq!(
        result.sync,
        SyncOutcome::Published {
            status: PowerStatus::Off,
            forced: true
        }
    );
    assert_eq!(bench.lifecycle(), LifecycleState::Standby);

    // The remote is idle again and accepts a retry.
    assert_eq!(
        bench.command("ON"),
        EventDisposition::Command(Ok(PowerIntent::WakeRequested))
    );
}

#[test]
fn each_wake_request_emits_a_single_bounded_window() {
    let mut bench = Bench::new();
    bench.tick();
    bench.command("ON");
    bench.ticks(101);

    assert_eq!(bench.radio().wake_windows, 1);
    assert!(!bench.context.orchestrator().is_waking());
}
