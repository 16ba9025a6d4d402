use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use knitlink_proto::{ChecksumStatus, Decoded, Inbound, Message};
use knitlink_session::SessionStats;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    kind: &'static str,
    crc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a Message>,
    raw: String,
}

/// `OK` / `NOK` as the controller tools print it; `-` when not checked.
pub fn crc_label(status: ChecksumStatus) -> &'static str {
    match status {
        ChecksumStatus::Valid => "OK",
        ChecksumStatus::Mismatch { .. } => "NOK",
        ChecksumStatus::Unchecked => "-",
    }
}

pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn kind_name(decoded: &Decoded) -> &'static str {
    decoded.kind().map(|kind| kind.name()).unwrap_or("unknown")
}

/// Field/value pairs shown for a decoded message.
pub fn field_rows(decoded: &Decoded) -> Vec<(&'static str, String)> {
    let message = match &decoded.inbound {
        Inbound::Known(message) => message,
        Inbound::Unknown(raw) => return vec![("raw", hex(raw))],
    };

    match message {
        Message::IndicateState(s) => vec![
            ("error", s.error.to_string()),
            ("state", s.state.to_string()),
            ("position", s.position.to_string()),
            ("carriage", s.carriage.label().to_string()),
            ("belt-shift", s.belt_shift.label().to_string()),
            ("direction", s.direction.label().to_string()),
            ("hall-active", s.hall_active.label().to_string()),
            ("hall-left", s.hall_left.to_string()),
            ("hall-right", s.hall_right.to_string()),
        ],
        Message::ConfirmInit(c) | Message::ConfirmStart(c) => vec![("error", c.error.to_string())],
        Message::ConfirmInfo(info) => vec![
            ("api", info.api_version.to_string()),
            ("firmware", info.version_triple()),
            ("version", info.fw_version.as_str()),
        ],
        Message::RequestLine(line) => vec![
            ("row", line.row.to_string()),
            ("error", line.error.to_string()),
        ],
        Message::DebugPeekConfirm(peek) => vec![("value", format!("0x{:02x}", peek.value))],
        _ => vec![("raw", hex(&decoded.raw))],
    }
}

/// One-line summary in the style of the controller's serial log.
pub fn summary_line(decoded: &Decoded) -> String {
    let crc = match decoded.crc_byte() {
        Some(byte) => format!("[{byte:02x} {}]", crc_label(decoded.checksum)),
        None => String::new(),
    };

    match &decoded.inbound {
        Inbound::Unknown(raw) => format!("UNKNOWN: {}", hex(raw)),
        Inbound::Known(Message::IndicateState(s)) => format!(
            "IndState: {:1} {:1} {:3} {:4}({:11},{:5}) Hall:{:5} ({:5}, {:5}) {crc}",
            s.error,
            s.state,
            s.position,
            s.carriage.label(),
            s.belt_shift.label(),
            s.direction.label(),
            s.hall_active.label(),
            s.hall_left,
            s.hall_right,
        ),
        Inbound::Known(Message::ConfirmInit(c)) => format!("Confirm init: {} {crc}", c.error),
        Inbound::Known(Message::ConfirmStart(c)) => format!("Confirm start: {} {crc}", c.error),
        Inbound::Known(Message::ConfirmInfo(info)) => format!(
            "Confirm Info: API {}, FW {} {}{crc}",
            info.api_version,
            info.version_triple(),
            info.fw_version,
        ),
        Inbound::Known(Message::RequestLine(line)) => {
            format!("Pattern request for line: {} {crc}", line.row)
        }
        Inbound::Known(Message::DebugPeekConfirm(peek)) => {
            format!("Peek value: 0x{:02x} {crc}", peek.value)
        }
        Inbound::Known(other) => format!("{}: {} {crc}", other.kind(), hex(&decoded.raw)),
    }
}

pub fn print_message(decoded: &Decoded, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                kind: kind_name(decoded),
                crc: crc_label(decoded.checksum),
                fields: decoded.message(),
                raw: hex(&decoded.raw),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![kind_name(decoded).to_uppercase(), String::new()]);
            for (field, value) in field_rows(decoded) {
                table.add_row(vec![field.to_string(), value]);
            }
            table.add_row(vec!["crc".to_string(), crc_label(decoded.checksum).to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", summary_line(decoded)),
    }
}

#[derive(Serialize)]
struct SentOutput<'a> {
    sent: &'static str,
    port: &'a str,
}

/// Acknowledge a fire-and-forget request.
pub fn print_sent(message: &Message, port: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = SentOutput {
                sent: message.kind().name(),
                port,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("sent {} to {port}", message.kind());
        }
    }
}

#[derive(Serialize)]
struct StatsOutput {
    frames_received: u64,
    messages_delivered: u64,
    rejected: u64,
    checksum_failures: u64,
    frame_anomalies: u64,
    bytes_read: u64,
    bytes_written: u64,
}

pub fn print_stats(stats: &SessionStats, format: OutputFormat) {
    let out = StatsOutput {
        frames_received: stats.frames_received,
        messages_delivered: stats.messages_delivered,
        rejected: stats.rejected,
        checksum_failures: stats.checksum_failures,
        frame_anomalies: stats.frame_anomalies,
        bytes_read: stats.bytes_read,
        bytes_written: stats.bytes_written,
    };
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["STAT", "COUNT"])
                .add_row(vec!["frames received".to_string(), out.frames_received.to_string()])
                .add_row(vec!["messages delivered".to_string(), out.messages_delivered.to_string()])
                .add_row(vec!["rejected".to_string(), out.rejected.to_string()])
                .add_row(vec!["checksum failures".to_string(), out.checksum_failures.to_string()])
                .add_row(vec!["frame anomalies".to_string(), out.frame_anomalies.to_string()])
                .add_row(vec!["bytes read".to_string(), out.bytes_read.to_string()])
                .add_row(vec!["bytes written".to_string(), out.bytes_written.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "frames={} delivered={} rejected={} crc_failures={} anomalies={} read={}B written={}B",
                out.frames_received,
                out.messages_delivered,
                out.rejected,
                out.checksum_failures,
                out.frame_anomalies,
                out.bytes_read,
                out.bytes_written
            );
        }
    }
}
