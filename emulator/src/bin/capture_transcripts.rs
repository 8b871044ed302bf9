use std::io;
use std::path::Path;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::Session;

const RECEIVER: &str = "38:c8:04:69:c1:fa";

#[derive(Clone, Copy, Debug)]
enum Scenario {
    WakeTimeout,
    WakeConnect,
    PowerOff,
    PowerOffTimeout,
    DuplicateToggle,
}

impl Scenario {
    const ALL: [Scenario; 5] = [
        Scenario::WakeTimeout,
        Scenario::WakeConnect,
        Scenario::PowerOff,
        Scenario::PowerOffTimeout,
        Scenario::DuplicateToggle,
    ];

    fn log_path(self) -> &'static str {
        match self {
            Scenario::WakeTimeout => "transcripts/wake-timeout.log",
            Scenario::WakeConnect => "transcripts/wake-connect.log",
            Scenario::PowerOff => "transcripts/power-off.log",
            Scenario::PowerOffTimeout => "transcripts/power-off-timeout.log",
            Scenario::DuplicateToggle => "transcripts/duplicate-toggle.log",
        }
    }

    fn header(self) -> &'static str {
        match self {
            Scenario::WakeTimeout => "Wake window expires with no receiver",
            Scenario::WakeConnect => "Receiver connects during the wake window",
            Scenario::PowerOff => "Power off confirmed by a disconnect",
            Scenario::PowerOffTimeout => "Power off never confirmed",
            Scenario::DuplicateToggle => "Second toggle dropped while the first runs",
        }
    }

    fn script(self) -> &'static [&'static str] {
        match self {
            Scenario::WakeTimeout => &["tick", "mqtt ON", "tick 101", "status", "events"],
            Scenario::WakeConnect => &[
                "tick",
                "mqtt on",
                "tick 40",
                "connect 38:c8:04:69:c1:fa",
                "tick",
                "status",
            ],
            Scenario::PowerOff => &[
                "mqtt OFF",
                "tick",
                "advance 800ms",
                "disconnect",
                "tick",
                "status",
                "events",
            ],
            Scenario::PowerOffTimeout => &["mqtt OFF", "advance 12s", "status", "events"],
            Scenario::DuplicateToggle => &["mqtt TOGGLE", "mqtt TOGGLE", "tick", "status"],
        }
    }

    /// Scenarios that start from a bonded, connected receiver.
    fn starts_connected(self) -> bool {
        matches!(
            self,
            Scenario::PowerOff | Scenario::PowerOffTimeout | Scenario::DuplicateToggle
        )
    }
}

fn main() -> io::Result<()> {
    for scenario in Scenario::ALL {
        record(scenario)?;
    }
    Ok(())
}

fn record(scenario: Scenario) -> io::Result<()> {
    let mut session = Session::new(Some((Path::new(scenario.log_path()), scenario.header())))?;
    session.start()?;
    if scenario.starts_connected() {
        session.handle_command(&format!("connect {RECEIVER}"))?;
        session.handle_command("tick")?;
    }
    for line in scenario.script() {
        session.handle_command(line)?;
    }
    Ok(())
}
