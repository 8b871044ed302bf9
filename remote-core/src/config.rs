//! Timing configuration for the power-state orchestrator.
//!
//! Every constant here encodes receiver behaviour (minimum press length,
//! typical wake latency) rather than part of the algorithm, so the values are
//! gathered into one [`OrchestratorConfig`] that firmware and emulator can
//! tune independently.

use core::time::Duration;

/// Period of one orchestration tick.
pub const TICK_PERIOD: Duration = Duration::from_millis(50);

/// How long the wake beacon advertises before reverting (100 ticks).
pub const WAKE_WINDOW: Duration = Duration::from_secs(5);

/// Hold interval between key-down and key-up of the power button (15 ticks).
pub const PRESS_HOLD: Duration = Duration::from_millis(750);

/// Time allowed for the receiver to drop the link after a power-off press.
pub const SHUTDOWN_CONFIRMATION: Duration = Duration::from_secs(10);

/// Time allowed for the receiver to connect after a wake window closes.
pub const WAKE_CONFIRMATION: Duration = Duration::from_secs(30);

/// Cadence of forced status republishes (600 ticks).
pub const FORCE_SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Tunable timing knobs consumed by the orchestrator and reconciler.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OrchestratorConfig {
    tick_period: Duration,
    wake_window: Duration,
    press_hold: Duration,
    shutdown_confirmation: Duration,
    wake_confirmation: Duration,
    force_sync_interval: Duration,
}

impl OrchestratorConfig {
    /// Creates a configuration populated with the default receiver timings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tick_period: TICK_PERIOD,
            wake_window: WAKE_WINDOW,
            press_hold: PRESS_HOLD,
            shutdown_confirmation: SHUTDOWN_CONFIRMATION,
            wake_confirmation: WAKE_CONFIRMATION,
            force_sync_interval: FORCE_SYNC_INTERVAL,
        }
    }

    #[must_use]
    pub const fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    #[must_use]
    pub const fn with_wake_window(mut self, window: Duration) -> Self {
        self.wake_window = window;
        self
    }

    #[must_use]
    pub const fn with_press_hold(mut self, hold: Duration) -> Self {
        self.press_hold = hold;
        self
    }

    #[must_use]
    pub const fn with_shutdown_confirmation(mut self, timeout: Duration) -> Self {
        self.shutdown_confirmation = timeout;
        self
    }

    #[must_use]
    pub const fn with_wake_confirmation(mut self, timeout: Duration) -> Self {
        self.wake_confirmation = timeout;
        self
    }

    #[must_use]
    pub const fn with_force_sync_interval(mut self, interval: Duration) -> Self {
        self.force_sync_interval = interval;
        self
    }

    #[must_use]
    pub const fn tick_period(&self) -> Duration {
        self.tick_period
    }

    #[must_use]
    pub const fn wake_window(&self) -> Duration {
        self.wake_window
    }

    #[must_use]
    pub const fn press_hold(&self) -> Duration {
        self.press_hold
    }

    #[must_use]
    pub const fn shutdown_confirmation(&self) -> Duration {
        self.shutdown_confirmation
    }

    #[must_use]
    pub const fn wake_confirmation(&self) -> Duration {
        self.wake_confirmation
    }

    #[must_use]
    pub const fn force_sync_interval(&self) -> Duration {
        self.force_sync_interval
    }

    /// Expresses `duration` in whole ticks, rounding down.
    ///
    /// Returns zero when the tick period is zero.
    #[must_use]
    pub fn ticks(&self, duration: Duration) -> u32 {
        let period = self.tick_period.as_micros();
        if period == 0 {
            return 0;
        }
        u32::try_from(duration.as_micros() / period).unwrap_or(u32::MAX)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timings_match_tick_counts() {
        let config = OrchestratorConfig::default();

        assert_eq!(config.ticks(config.wake_window()), 100);
        assert_eq!(config.ticks(config.press_hold()), 15);
        assert_eq!(config.ticks(config.force_sync_interval()), 600);
        assert_eq!(config.ticks(config.shutdown_confirmation()), 200);
        assert_eq!(config.ticks(config.wake_confirmation()), 600);
    }

    #[test]
    fn builders_override_individual_fields() {
        let config = OrchestratorConfig::new()
            .with_press_hold(Duration::from_millis(700))
            .with_wake_window(Duration::from_secs(2));

        assert_eq!(config.press_hold(), Duration::from_millis(700));
        assert_eq!(config.wake_window(), Duration::from_secs(2));
        assert_eq!(config.tick_period(), TICK_PERIOD);
        assert_eq!(config.force_sync_interval(), FORCE_SYNC_INTERVAL);
    }

    #[test]
    fn zero_tick_period_reports_zero_ticks() {
        let config = OrchestratorConfig::new().with_tick_period(Duration::ZERO);
        assert_eq!(config.ticks(Duration::from_secs(1)), 0);
    }
}
