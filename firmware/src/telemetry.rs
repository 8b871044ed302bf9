#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Forwards the core telemetry ring to the log.

use remote_core::telemetry::{EventId, TelemetryPayload, TelemetryRecord, TelemetryRecorder};

use crate::clock::FirmwareInstant;

/// Remembers how far the ring has been forwarded.
pub struct TelemetryForwarder {
    next: EventId,
}

impl TelemetryForwarder {
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Logs every record added since the previous call and returns how many
    /// were written. Records overwritten before they could be forwarded are
    /// reported as a gap.
    pub fn forward<const CAP: usize>(
        &mut self,
        recorder: &TelemetryRecorder<FirmwareInstant, CAP>,
    ) -> usize {
        let head = recorder.next_id();
        if head == self.next {
            return 0;
        }

        let first = self.next;
        if let Some(oldest) = recorder.oldest_first().next().filter(|r| r.id > first) {
            log_gap(oldest.id - self.next);
        }

        let mut written = 0;
        for record in recorder.since(self.next) {
            log_record(record);
            written += 1;
        }
        self.next = head;
        written
    }
}

impl Default for TelemetryForwarder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "none")]
fn log_record(record: &TelemetryRecord<FirmwareInstant>) {
    let at = record.timestamp.as_millis();
    match record.details {
        TelemetryPayload::Lifecycle(details) => match details.dwell {
            Some(dwell) => defmt::info!(
                "telemetry #{} t={}ms {} (from {} after {}ms)",
                record.id,
                at,
                defmt::Display2Format(&record.event),
                defmt::Display2Format(&details.from),
                u64::try_from(dwell.as_millis()).unwrap_or(u64::MAX)
            ),
            None => defmt::info!(
                "telemetry #{} t={}ms {} (from {})",
                record.id,
                at,
                defmt::Display2Format(&record.event),
                defmt::Display2Format(&details.from)
            ),
        },
        TelemetryPayload::Publish(details) => defmt::info!(
            "telemetry #{} t={}ms {} forced={}",
            record.id,
            at,
            defmt::Display2Format(&record.event),
            details.forced
        ),
        TelemetryPayload::None => defmt::info!(
            "telemetry #{} t={}ms {}",
            record.id,
            at,
            defmt::Display2Format(&record.event)
        ),
    }
}

#[cfg(not(target_os = "none"))]
fn log_record(record: &TelemetryRecord<FirmwareInstant>) {
    let at = record.timestamp.as_millis();
    match record.details {
        TelemetryPayload::Lifecycle(details) => match details.dwell {
            Some(dwell) => println!(
                "telemetry #{} t={}ms {} (from {} after {}ms)",
                record.id,
                at,
                record.event,
                details.from,
                dwell.as_millis()
            ),
            None => println!(
                "telemetry #{} t={}ms {} (from {})",
                record.id, at, record.event, details.from
            ),
        },
        TelemetryPayload::Publish(details) => println!(
            "telemetry #{} t={}ms {} forced={}",
            record.id, at, record.event, details.forced
        ),
        TelemetryPayload::None => {
            println!("telemetry #{} t={}ms {}", record.id, at, record.event);
        }
    }
}

#[cfg(target_os = "none")]
fn log_gap(lost: EventId) {
    defmt::warn!("telemetry: {} records overwritten before forwarding", lost);
}

#[cfg(not(target_os = "none"))]
fn log_gap(lost: EventId) {
    println!("telemetry: {lost} records overwritten before forwarding");
}

#[cfg(test)]
mod tests {
    use embassy_time::Instant;
    use remote_core::telemetry::TelemetryEventKind;

    use super::*;

    fn millis(value: u64) -> FirmwareInstant {
        FirmwareInstant::from(Instant::from_millis(value))
    }

    #[test]
    fn forwards_each_record_once() {
        let mut recorder = TelemetryRecorder::<FirmwareInstant, 8>::new();
        let mut forwarder = TelemetryForwarder::new();

        assert_eq!(forwarder.forward(&recorder), 0);

        recorder.record_event(TelemetryEventKind::PowerKeyDown, millis(0));
        recorder.record_event(TelemetryEventKind::PowerKeyUp, millis(750));
        assert_eq!(forwarder.forward(&recorder), 2);
        assert_eq!(forwarder.forward(&recorder), 0);

        recorder.record_event(TelemetryEventKind::PowerKeyDown, millis(2_000));
        assert_eq!(forwarder.forward(&recorder), 1);
    }

    #[test]
    fn overflowed_ring_forwards_what_survived() {
        let mut recorder = TelemetryRecorder::<FirmwareInstant, 4>::new();
        let mut forwarder = TelemetryForwarder::new();

        for tick in 0..10 {
            recorder.record_event(TelemetryEventKind::PowerKeyDown, millis(tick));
        }

        assert_eq!(forwarder.forward(&recorder), 4);
        assert_eq!(forwarder.forward(&recorder), 0);
    }
}
