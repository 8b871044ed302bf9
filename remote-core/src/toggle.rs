//! Power-button press sequencing and outcome evaluation.
//!
//! A power toggle is a key-down report, a hold interval, then an all-zero
//! key-up report. The sequencer does not decide whether the toggle worked:
//! an [`OutcomeWatch`] armed afterwards compares the link state against the
//! transition the toggle should have caused.

use core::{fmt, ops::Add, time::Duration};

use crate::hid::{HidReport, HidReportSink, HidSendError};

/// Progress reported by [`PowerToggleSequencer::poll`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PressProgress {
    /// No press is in progress.
    Idle,
    /// Key-down was sent and the hold interval is running.
    Holding,
    /// Hold elapsed; key-up was attempted with the attached result.
    Released(Result<(), HidSendError>),
}

/// Emits the timed key-down/key-up pair of a long power-button press.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PowerToggleSequencer<TInstant> {
    hold: Duration,
    release_at: Option<TInstant>,
}

impl<TInstant> PowerToggleSequencer<TInstant>
where
    TInstant: Copy + Ord + Add<Duration, Output = TInstant>,
{
    #[must_use]
    pub const fn new(hold: Duration) -> Self {
        Self {
            hold,
            release_at: None,
        }
    }

    #[must_use]
    pub const fn is_pressing(&self) -> bool {
        self.release_at.is_some()
    }

    /// Deadline at which key-up will be sent, if pressing.
    #[must_use]
    pub const fn release_at(&self) -> Option<TInstant> {
        self.release_at
    }

    /// Sends key-down and arms the release deadline.
    ///
    /// Nothing is armed when the report cannot be delivered.
    pub fn press<S>(&mut self, now: TInstant, sink: &mut S) -> Result<(), HidSendError>
    where
        S: HidReportSink,
    {
        sink.send_report(&HidReport::power_key_down())?;
        self.release_at = Some(now + self.hold);
        Ok(())
    }

    /// Sends key-up once the hold interval has elapsed.
    pub fn poll<S>(&mut self, now: TInstant, sink: &mut S) -> PressProgress
    where
        S: HidReportSink,
    {
        match self.release_at {
            None => PressProgress::Idle,
            Some(deadline) if now >= deadline => {
                self.release_at = None;
                PressProgress::Released(sink.send_report(&HidReport::released()))
            }
            Some(_) => PressProgress::Holding,
        }
    }

    /// Ends a press early, attempting key-up. Returns `true` if a press was active.
    pub fn abort<S>(&mut self, sink: &mut S) -> bool
    where
        S: HidReportSink,
    {
        if self.release_at.take().is_some() {
            // The link is usually gone by now; key-up is best effort.
            let _ = sink.send_report(&HidReport::released());
            true
        } else {
            false
        }
    }
}

/// Link transition a completed operation is expected to cause.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExpectedTransition {
    /// Power-off: the receiver should drop the link.
    Disconnect,
    /// Power-on: the receiver should connect.
    Connect,
}

impl ExpectedTransition {
    #[must_use]
    pub const fn satisfied_by(self, peer_connected: bool) -> bool {
        match self {
            ExpectedTransition::Disconnect => !peer_connected,
            ExpectedTransition::Connect => peer_connected,
        }
    }
}

impl fmt::Display for ExpectedTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedTransition::Disconnect => f.write_str("disconnect"),
            ExpectedTransition::Connect => f.write_str("connect"),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutcomeVerdict {
    Pending,
    Confirmed,
    TimedOut,
}

/// Deadline-bound expectation on the link state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OutcomeWatch<TInstant> {
    expected: ExpectedTransition,
    deadline: TInstant,
}

impl<TInstant> OutcomeWatch<TInstant>
where
    TInstant: Copy + Ord + Add<Duration, Output = TInstant>,
{
    #[must_use]
    pub fn arm(expected: ExpectedTransition, now: TInstant, timeout: Duration) -> Self {
        Self {
            expected,
            deadline: now + timeout,
        }
    }

    #[must_use]
    pub const fn expected(&self) -> ExpectedTransition {
        self.expected
    }

    #[must_use]
    pub const fn deadline(&self) -> TInstant {
        self.deadline
    }

    /// Judges the watch; a satisfied expectation wins over an expired deadline.
    #[must_use]
    pub fn evaluate(&self, now: TInstant, peer_connected: bool) -> OutcomeVerdict {
        if self.expected.satisfied_by(peer_connected) {
            OutcomeVerdict::Confirmed
        } else if now >= self.deadline {
            OutcomeVerdict::TimedOut
        } else {
            OutcomeVerdict::Pending
        }
    }
}
