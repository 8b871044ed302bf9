#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! Lightweight atomics track WiFi and the lifecycle so the indicator task
//! can drive its LEDs without touching orchestration state.

use portable_atomic::{AtomicBool, AtomicU8, Ordering};
use remote_core::orchestrator::LifecycleState;
use remote_core::reconciler::PowerStatus;

static WIFI_UP: AtomicBool = AtomicBool::new(false);
/// Encoded [`LifecycleState`] of the last orchestrator tick.
static LIFECYCLE: AtomicU8 = AtomicU8::new(encode_lifecycle(LifecycleState::Standby));

const fn encode_lifecycle(state: LifecycleState) -> u8 {
    match state {
        LifecycleState::Standby => 0,
        LifecycleState::WakingUp => 1,
        LifecycleState::Connected => 2,
        LifecycleState::ShuttingDown => 3,
    }
}

const fn decode_lifecycle(raw: u8) -> LifecycleState {
    match raw {
        1 => LifecycleState::WakingUp,
        2 => LifecycleState::Connected,
        3 => LifecycleState::ShuttingDown,
        _ => LifecycleState::Standby,
    }
}

pub fn record_wifi_up(up: bool) {
    WIFI_UP.store(up, Ordering::Relaxed);
}

pub fn record_lifecycle(state: LifecycleState) {
    LIFECYCLE.store(encode_lifecycle(state), Ordering::Relaxed);
}

pub fn lifecycle() -> LifecycleState {
    decode_lifecycle(LIFECYCLE.load(Ordering::Relaxed))
}

/// Levels for the two indicator LEDs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IndicatorLevels {
    /// Lit while the projector is reported on.
    pub receiver: bool,
    /// Lit while WiFi is down.
    pub wifi_down: bool,
}

impl IndicatorLevels {
    pub const fn from_state(lifecycle: LifecycleState, wifi_up: bool) -> Self {
        Self {
            receiver: matches!(PowerStatus::from_lifecycle(lifecycle), PowerStatus::On),
            wifi_down: !wifi_up,
        }
    }
}

/// Current indicator levels.
pub fn indicators() -> IndicatorLevels {
    IndicatorLevels::from_state(lifecycle(), WIFI_UP.load(Ordering::Relaxed))
}
