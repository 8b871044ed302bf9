use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::ops::Add;
use std::path::Path;
use std::time::Duration;

use remote_core::beacon::{AdvertisingControl, AdvertisingError, AdvertisingPayload};
use remote_core::config::OrchestratorConfig;
use remote_core::context::{ContextTick, EventDisposition, RemoteContext, RemoteEvent};
use remote_core::hid::{HidReport, HidReportSink, HidSendError};
use remote_core::link::{LinkEvent, LinkUpdate, PeerAddress};
use remote_core::reconciler::{PowerStatus, PublishError, StatusPublisher, SyncOutcome};
use remote_core::telemetry::{EventId, TelemetryInstant, TelemetryPayload};
use winnow::ascii::{Caseless, dec_uint, space1};
use winnow::combinator::{alt, empty, opt, preceded, separated};
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::stream::AsChar;
use winnow::token::{rest, take_while};

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "mqtt",
        "mqtt <payload>             - deliver a payload on the command topic",
    ),
    (
        "connect",
        "connect <aa:bb:cc:dd:ee:ff> - a receiver connects from the given address",
    ),
    (
        "disconnect",
        "disconnect                 - the connected receiver drops the link",
    ),
    (
        "tick",
        "tick [count]               - run orchestrator ticks (default 1)",
    ),
    (
        "advance",
        "advance <duration>         - tick until the duration (ms or s) has elapsed",
    ),
    (
        "fail-publish",
        "fail-publish on|off        - make the broker reject publishes",
    ),
    (
        "status",
        "status                     - display orchestrator and reconciler state",
    ),
    (
        "events",
        "events                     - show telemetry recorded since the last call",
    ),
    (
        "help",
        "help [topic]               - show help for a command",
    ),
];

/// Millisecond instant on the emulator's virtual clock.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct VirtualInstant(u64);

impl VirtualInstant {
    pub const fn as_millis(self) -> u64 {
        self.0
    }
}

impl Add<Duration> for VirtualInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let millis = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
        VirtualInstant(self.0.saturating_add(millis))
    }
}

impl TelemetryInstant for VirtualInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for VirtualInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}ms", self.0)
    }
}

/// Parsed emulator command line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EmulatorCommand<'a> {
    Mqtt(&'a str),
    Connect(PeerAddress),
    Disconnect,
    Tick(u32),
    Advance(Duration),
    FailPublish(bool),
    Status,
    Events,
    Help(Option<&'a str>),
}

impl<'a> EmulatorCommand<'a> {
    pub fn parse(line: &'a str) -> Result<Self, String> {
        emulator_command
            .parse(line.trim())
            .map_err(|err| format!("at column {}: `{}`", err.offset() + 1, line.trim()))
    }
}

fn emulator_command<'a>(input: &mut &'a str) -> Result<EmulatorCommand<'a>, ContextError> {
    alt((
        preceded(
            Caseless("mqtt"),
            alt((preceded(space1, rest), empty.value(""))),
        )
        .map(EmulatorCommand::Mqtt),
        preceded((Caseless("connect"), space1), peer_address).map(EmulatorCommand::Connect),
        Caseless("disconnect").value(EmulatorCommand::Disconnect),
        preceded(Caseless("tick"), opt(preceded(space1, dec_uint)))
            .map(|count: Option<u32>| EmulatorCommand::Tick(count.unwrap_or(1))),
        preceded((Caseless("advance"), space1), duration).map(EmulatorCommand::Advance),
        preceded(
            (Caseless("fail-publish"), space1),
            alt((Caseless("on").value(true), Caseless("off").value(false))),
        )
        .map(EmulatorCommand::FailPublish),
        Caseless("status").value(EmulatorCommand::Status),
        Caseless("events").value(EmulatorCommand::Events),
        preceded(Caseless("help"), opt(preceded(space1, help_topic))).map(EmulatorCommand::Help),
    ))
    .parse_next(input)
}

fn peer_address(input: &mut &str) -> Result<PeerAddress, ContextError> {
    separated(6, hex_octet, ':')
        .verify_map(|octets: Vec<u8>| <[u8; 6]>::try_from(octets).ok())
        .map(PeerAddress::new)
        .parse_next(input)
}

fn hex_octet(input: &mut &str) -> Result<u8, ContextError> {
    take_while(2, AsChar::is_hex_digit)
        .try_map(|digits| u8::from_str_radix(digits, 16))
        .parse_next(input)
}

fn duration(input: &mut &str) -> Result<Duration, ContextError> {
    (
        dec_uint,
        opt(alt((Caseless("ms").value(1_u64), Caseless("s").value(1_000_u64)))),
    )
        .map(|(value, unit): (u64, Option<u64>)| {
            Duration::from_millis(value.saturating_mul(unit.unwrap_or(1)))
        })
        .parse_next(input)
}

fn help_topic<'a>(input: &mut &'a str) -> Result<&'a str, ContextError> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-').parse_next(input)
}

/// Something a simulated collaborator was asked to do.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Activity {
    AdvertisingStarted,
    AdvertisingStopped,
    Payload(AdvertisingPayload),
    Restricted(PeerAddress),
    Report(HidReport),
    Published(PowerStatus),
    PublishRejected(PublishError),
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::AdvertisingStarted => f.write_str("ble advertising started"),
            Activity::AdvertisingStopped => f.write_str("ble advertising stopped"),
            Activity::Payload(payload) => write!(f, "ble payload {payload}"),
            Activity::Restricted(peer) => write!(f, "ble restricted to {peer}"),
            Activity::Report(report) => write!(f, "hid report [{report}]"),
            Activity::Published(status) => write!(f, "mqtt publish {status}"),
            Activity::PublishRejected(err) => write!(f, "mqtt publish rejected ({err})"),
        }
    }
}

#[derive(Debug, Default)]
pub struct SimRadio {
    activity: Vec<Activity>,
}

impl AdvertisingControl for SimRadio {
    fn start_advertising(&mut self) -> Result<(), AdvertisingError> {
        self.activity.push(Activity::AdvertisingStarted);
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), AdvertisingError> {
        self.activity.push(Activity::AdvertisingStopped);
        Ok(())
    }

    fn set_payload(&mut self, payload: AdvertisingPayload) -> Result<(), AdvertisingError> {
        self.activity.push(Activity::Payload(payload));
        Ok(())
    }

    fn restrict_to(&mut self, peer: PeerAddress) -> Result<(), AdvertisingError> {
        self.activity.push(Activity::Restricted(peer));
        Ok(())
    }
}

/// Report sink that only accepts reports while a receiver is connected.
#[derive(Debug, Default)]
pub struct SimHid {
    connected: bool,
    activity: Vec<Activity>,
}

impl HidReportSink for SimHid {
    fn send_report(&mut self, report: &HidReport) -> Result<(), HidSendError> {
        if !self.connected {
            return Err(HidSendError::NotConnected);
        }
        self.activity.push(Activity::Report(*report));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SimBroker {
    rejecting: bool,
    activity: Vec<Activity>,
}

impl StatusPublisher for SimBroker {
    fn publish(&mut self, status: PowerStatus) -> Result<(), PublishError> {
        if self.rejecting {
            self.activity
                .push(Activity::PublishRejected(PublishError::NotConnected));
            return Err(PublishError::NotConnected);
        }
        self.activity.push(Activity::Published(status));
        Ok(())
    }
}

type EmulatedContext = RemoteContext<VirtualInstant, SimRadio, SimHid, SimBroker>;

pub struct Session {
    context: EmulatedContext,
    now: VirtualInstant,
    tick_period: Duration,
    next_event: EventId,
    transcript: Option<TranscriptLogger>,
}

impl Session {
    pub fn new(transcript: Option<(&Path, &str)>) -> io::Result<Self> {
        let transcript = transcript
            .map(|(path, header)| TranscriptLogger::new(path, header))
            .transpose()?;
        let config = OrchestratorConfig::new();
        let context = RemoteContext::new(
            config,
            SimRadio::default(),
            SimHid::default(),
            SimBroker::default(),
        );

        Ok(Self {
            context,
            now: VirtualInstant::default(),
            tick_period: config.tick_period(),
            next_event: 0,
            transcript,
        })
    }

    /// Starts normal advertising and returns what the radio was asked to do.
    pub fn start(&mut self) -> io::Result<Vec<String>> {
        let mut lines = Vec::new();
        if let Err(err) = self.context.start() {
            lines.push(format!("ERR advertising {err}"));
        }
        self.collect_activity(&mut lines);
        self.record_output(&lines)?;
        Ok(lines)
    }

    #[cfg(test)]
    pub fn context(&self) -> &EmulatedContext {
        &self.context
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.append_line(self.now, TranscriptRole::Host, trimmed)?;
        }

        let lines = match EmulatorCommand::parse(trimmed) {
            Ok(command) => self.execute(command),
            Err(detail) => vec![format!("ERR syntax {detail}")],
        };
        self.record_output(&lines)?;
        Ok(lines)
    }

    fn execute(&mut self, command: EmulatorCommand<'_>) -> Vec<String> {
        let mut lines = Vec::new();
        match command {
            EmulatorCommand::Mqtt(payload) => {
                let event = RemoteEvent::from_payload(payload.as_bytes());
                let disposition = self.context.handle(event, self.now);
                lines.push(describe_disposition(disposition));
            }
            EmulatorCommand::Connect(peer) => {
                let disposition = self
                    .context
                    .handle(RemoteEvent::Link(LinkEvent::Connected(peer)), self.now);
                self.sync_link();
                lines.push(describe_disposition(disposition));
            }
            EmulatorCommand::Disconnect => {
                let disposition = self
                    .context
                    .handle(RemoteEvent::Link(LinkEvent::Disconnected), self.now);
                self.sync_link();
                lines.push(describe_disposition(disposition));
            }
            EmulatorCommand::Tick(count) => {
                for _ in 0..count {
                    self.tick(&mut lines);
                }
                lines.push(format!("OK {} {}", self.now, self.context.snapshot()));
            }
            EmulatorCommand::Advance(span) => {
                let until = self.now + span;
                while self.now < until {
                    self.tick(&mut lines);
                }
                lines.push(format!("OK {} {}", self.now, self.context.snapshot()));
            }
            EmulatorCommand::FailPublish(rejecting) => {
                self.context.publisher_mut().rejecting = rejecting;
                lines.push(format!(
                    "OK broker {}",
                    if rejecting { "rejecting publishes" } else { "accepting publishes" }
                ));
            }
            EmulatorCommand::Status => {
                let snapshot = self.context.snapshot();
                lines.push(format!("{} {snapshot}", self.now));
                lines.push(format!(
                    "busy={} next-forced-publish={}",
                    snapshot.busy(),
                    self.context
                        .reconciler()
                        .next_forced_at()
                        .map_or_else(|| "none".to_string(), |at| at.to_string())
                ));
            }
            EmulatorCommand::Events => self.describe_events(&mut lines),
            EmulatorCommand::Help(topic) => describe_help(topic, &mut lines),
        }

        self.collect_activity(&mut lines);
        lines
    }

    fn tick(&mut self, lines: &mut Vec<String>) {
        let tick = self.context.tick(self.now);
        self.collect_activity(lines);
        describe_tick(self.now, &tick, lines);
        self.now = self.now + self.tick_period;
    }

    /// The HID sink follows the link so reports fail once the receiver leaves.
    fn sync_link(&mut self) {
        let connected = self.context.orchestrator().is_peer_connected();
        self.context.orchestrator_mut().hid_mut().connected = connected;
    }

    fn collect_activity(&mut self, lines: &mut Vec<String>) {
        let now = self.now;
        let orchestrator = self.context.orchestrator_mut();
        let radio = std::mem::take(&mut orchestrator.advertiser_mut().activity);
        let hid = std::mem::take(&mut orchestrator.hid_mut().activity);
        let broker = std::mem::take(&mut self.context.publisher_mut().activity);
        for activity in radio.iter().chain(&hid).chain(&broker) {
            lines.push(format!("{now} {activity}"));
        }
    }

    fn describe_events(&mut self, lines: &mut Vec<String>) {
        let telemetry = self.context.telemetry();
        let mut written = 0;
        for record in telemetry.since(self.next_event) {
            let mut line = format!(
                "#{} t={}ms {}",
                record.id,
                record.timestamp.as_millis(),
                record.event
            );
            match record.details {
                TelemetryPayload::Lifecycle(details) => {
                    line.push_str(&format!(" (from {}", details.from));
                    if let Some(dwell) = details.dwell {
                        line.push_str(&format!(" after {}ms", dwell.as_millis()));
                    }
                    line.push(')');
                }
                TelemetryPayload::Publish(details) if details.forced => {
                    line.push_str(" (forced)");
                }
                TelemetryPayload::Publish(_) | TelemetryPayload::None => {}
            }
            lines.push(line);
            written += 1;
        }
        if written == 0 {
            lines.push("no new events".to_string());
        }
        self.next_event = telemetry.next_id();
    }

    fn record_output(&mut self, lines: &[String]) -> io::Result<()> {
        if let Some(transcript) = self.transcript.as_mut() {
            for line in lines {
                transcript.append_line(self.now, TranscriptRole::Emulator, line)?;
            }
        }
        Ok(())
    }
}

fn describe_disposition(disposition: EventDisposition) -> String {
    match disposition {
        EventDisposition::Link(update) => match update {
            LinkUpdate::Bonded(peer) => format!("OK link bonded {peer}"),
            LinkUpdate::Reconnected(peer) => format!("OK link reconnected {peer}"),
            LinkUpdate::Rejected(peer) => format!("OK link rejected {peer} (not bonded)"),
            LinkUpdate::Lost => "OK link lost".to_string(),
            LinkUpdate::Unchanged => "OK link unchanged".to_string(),
        },
        EventDisposition::Command(Ok(intent)) => format!("OK command accepted {intent}"),
        EventDisposition::Command(Err(reason)) => format!("DROP command {reason}"),
        EventDisposition::StatusInvalidated => "OK status invalidated".to_string(),
    }
}

fn describe_tick(now: VirtualInstant, tick: &ContextTick, lines: &mut Vec<String>) {
    let report = tick.report;
    if report.changed() {
        lines.push(format!(
            "{now} state {} -> {}",
            report.previous, report.lifecycle
        ));
    }
    if let Some(expected) = report.confirmed {
        lines.push(format!("{now} outcome confirmed {expected}"));
    }
    if let Some(expected) = report.failed {
        lines.push(format!("{now} outcome failed {expected}, republishing"));
    }
    if let SyncOutcome::Published { forced: true, .. } = tick.sync {
        lines.push(format!("{now} forced republish"));
    }
}

fn describe_help(topic: Option<&str>, lines: &mut Vec<String>) {
    match topic {
        Some(target) => {
            if let Some((_, detail)) = HELP_TOPICS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(target))
            {
                lines.push((*detail).to_string());
            } else {
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        None => {
            lines.push("Available commands:".to_string());
            for (_, detail) in HELP_TOPICS {
                lines.push(format!("  {detail}"));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
}

fn help_topic_list() -> String {
    HELP_TOPICS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

struct TranscriptLogger {
    writer: BufWriter<fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path, header: &str) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        logger.write_header(header)?;
        Ok(logger)
    }

    fn write_header(&mut self, header: &str) -> io::Result<()> {
        writeln!(self.writer, "# {header}")?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds on the virtual clock"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        at: VirtualInstant,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            at.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
