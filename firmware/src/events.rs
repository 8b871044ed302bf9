#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Queues connecting the BLE and MQTT tasks with the orchestration task.
//!
//! Stack callbacks never touch orchestration state. They post a
//! [`RemoteEvent`] and the single consumer applies it on its next tick.

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender, TrySendError};
use remote_core::context::RemoteEvent;

/// Depth of the event queue drained by the orchestration task.
pub const EVENT_QUEUE_DEPTH: usize = 8;

#[cfg(target_os = "none")]
pub type RemoteMutex = CriticalSectionRawMutex;
#[cfg(not(target_os = "none"))]
pub type RemoteMutex = NoopRawMutex;

/// Queue of events awaiting the orchestration task.
pub type EventQueue = Channel<RemoteMutex, RemoteEvent, EVENT_QUEUE_DEPTH>;

pub type EventSender<'a> = Sender<'a, RemoteMutex, RemoteEvent, EVENT_QUEUE_DEPTH>;

pub type EventReceiver<'a> = Receiver<'a, RemoteMutex, RemoteEvent, EVENT_QUEUE_DEPTH>;

/// Posts an event without waiting, logging when the queue is full.
///
/// Only used for inbound commands; link events are sent with back-pressure so
/// a disconnect is never lost.
pub fn post(sender: &EventSender<'_>, event: RemoteEvent) -> bool {
    match sender.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            log_event_dropped();
            false
        }
    }
}

#[cfg(target_os = "none")]
fn log_event_dropped() {
    defmt::warn!("events: queue full, inbound command dropped");
}

#[cfg(not(target_os = "none"))]
fn log_event_dropped() {
    println!("events: queue full, inbound command dropped");
}
