//! HID input reports sent to the receiver.

use core::fmt;

/// Length of the keyboard input report declared by the report map.
pub const HID_REPORT_LEN: usize = 7;

/// Key code the receiver interprets as the power button.
pub const POWER_KEY_CODE: u8 = 0x66;

/// Offset of the key code within the report.
const KEY_CODE_OFFSET: usize = 2;

/// Fixed-size input report.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct HidReport([u8; HID_REPORT_LEN]);

impl HidReport {
    #[must_use]
    pub const fn new(bytes: [u8; HID_REPORT_LEN]) -> Self {
        Self(bytes)
    }

    /// Report with the power key held down.
    #[must_use]
    pub const fn power_key_down() -> Self {
        let mut bytes = [0; HID_REPORT_LEN];
        bytes[KEY_CODE_OFFSET] = POWER_KEY_CODE;
        Self(bytes)
    }

    /// All-zero report: every key released. Also served on report reads.
    #[must_use]
    pub const fn released() -> Self {
        Self([0; HID_REPORT_LEN])
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; HID_REPORT_LEN] {
        &self.0
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.0.iter().all(|byte| *byte == 0)
    }
}

impl fmt::Display for HidReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, byte) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Failure delivering a report over the notify characteristic.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HidSendError {
    /// No receiver is connected.
    NotConnected,
    /// The radio task could not accept the report.
    Unavailable,
}

impl fmt::Display for HidSendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HidSendError::NotConnected => f.write_str("no receiver connected"),
            HidSendError::Unavailable => f.write_str("HID transport unavailable"),
        }
    }
}

/// Destination for HID input reports.
pub trait HidReportSink {
    fn send_report(&mut self, report: &HidReport) -> Result<(), HidSendError>;
}
