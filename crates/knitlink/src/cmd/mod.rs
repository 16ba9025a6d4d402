use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use knitlink_proto::{Decoded, MachineType, MessageKind, NeedleSelection, WireVariant};
use knitlink_session::{Session, SessionConfig};
use knitlink_transport::SerialConfig;

use crate::exit::{session_error, CliError, CliResult, TIMEOUT, USAGE};
use crate::output::OutputFormat;

pub mod control;
pub mod debug;
pub mod line;
pub mod monitor;
pub mod query;
pub mod version;

/// Sleep between empty polls while waiting for a reply.
const REPLY_IDLE: Duration = Duration::from_millis(5);

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print every message the controller sends.
    Monitor(MonitorArgs),
    /// Ask for API and firmware versions.
    Info(WaitArgs),
    /// Ask for the carriage and sensor state.
    State(WaitArgs),
    /// Reset the controller.
    Reset,
    /// Select the machine model.
    Init(InitArgs),
    /// Start knitting between two needles.
    Start(StartArgs),
    /// Send the needle selection for one row.
    Line(LineArgs),
    /// Read one byte of controller memory.
    Peek(PeekArgs),
    /// Write one byte of controller memory.
    Poke(PokeArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Connection settings shared by all subcommands.
#[derive(Debug, Clone)]
pub struct Context {
    pub port: PathBuf,
    pub baud_rate: u32,
    pub variant: WireVariant,
    pub format: OutputFormat,
}

impl Context {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            variant: self.variant,
            serial: SerialConfig {
                baud_rate: self.baud_rate,
                ..SerialConfig::default()
            },
            ..SessionConfig::default()
        }
    }

    pub fn open_session(&self) -> CliResult<Session> {
        let mut session = Session::new(self.session_config());
        session
            .open(&self.port)
            .map_err(|err| session_error("open failed", err))?;
        Ok(session)
    }
}

pub fn run(command: Command, ctx: &Context) -> CliResult<i32> {
    match command {
        Command::Monitor(args) => monitor::run(args, ctx),
        Command::Info(args) => query::info(args, ctx),
        Command::State(args) => query::state(args, ctx),
        Command::Reset => control::reset(ctx),
        Command::Init(args) => control::init(args, ctx),
        Command::Start(args) => control::start(args, ctx),
        Command::Line(args) => line::run(args, ctx),
        Command::Peek(args) => debug::peek(args, ctx),
        Command::Poke(args) => debug::poke(args, ctx),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Sleep between empty polls, in milliseconds.
    #[arg(long, default_value = "10")]
    pub idle_ms: u64,
    /// Only print these kinds (comma-separated, e.g. indicate-state,request-line).
    #[arg(long, value_delimiter = ',', value_parser = parse_kind)]
    pub kinds: Option<Vec<MessageKind>>,
    /// Request state once the port is open.
    #[arg(long)]
    pub request_state: bool,
    /// Print link statistics on exit.
    #[arg(long)]
    pub stats: bool,
}

#[derive(Args, Debug)]
pub struct WaitArgs {
    /// How long to wait for the reply (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub timeout: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MachineArg {
    Kh910,
    Kh930,
    Kh270,
}

impl From<MachineArg> for MachineType {
    fn from(arg: MachineArg) -> Self {
        match arg {
            MachineArg::Kh910 => MachineType::Kh910,
            MachineArg::Kh930 => MachineType::Kh930,
            MachineArg::Kh270 => MachineType::Kh270,
        }
    }
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Machine model.
    #[arg(long, value_enum)]
    pub machine: MachineArg,
    #[command(flatten)]
    pub wait: WaitArgs,
}

#[derive(Args, Debug)]
pub struct StartArgs {
    /// First needle of the knitting range.
    #[arg(long, default_value = "70")]
    pub start_needle: u8,
    /// Last needle of the knitting range.
    #[arg(long, default_value = "129")]
    pub stop_needle: u8,
    /// Ask the controller to report state continuously.
    #[arg(long)]
    pub continuous: bool,
    /// Machine model (older firmware only).
    #[arg(long, value_enum, default_value = "kh910")]
    pub machine: MachineArg,
    #[command(flatten)]
    pub wait: WaitArgs,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PatternArg {
    Odd,
    Even,
    All,
    None,
}

impl PatternArg {
    pub fn selection(self) -> NeedleSelection {
        match self {
            PatternArg::Odd => NeedleSelection::odd(),
            PatternArg::Even => NeedleSelection::even(),
            PatternArg::All => NeedleSelection::all(),
            PatternArg::None => NeedleSelection::new(),
        }
    }
}

#[derive(Args, Debug)]
pub struct LineArgs {
    /// Row number being answered.
    #[arg(long)]
    pub line_number: u8,
    /// Needles to select (comma-separated, 0-199).
    #[arg(
        long,
        value_delimiter = ',',
        conflicts_with = "pattern",
        required_unless_present = "pattern"
    )]
    pub needles: Option<Vec<usize>>,
    /// Predefined needle pattern.
    #[arg(long, value_enum)]
    pub pattern: Option<PatternArg>,
    /// Mark this as the last line of the pattern.
    #[arg(long)]
    pub last: bool,
    /// Yarn color (older firmware only).
    #[arg(long, default_value = "0")]
    pub color: u8,
}

#[derive(Args, Debug)]
pub struct PeekArgs {
    /// Memory address (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_u16)]
    pub address: u16,
    #[command(flatten)]
    pub wait: WaitArgs,
}

#[derive(Args, Debug)]
pub struct PokeArgs {
    /// Memory address (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_u16)]
    pub address: u16,
    /// Byte to write (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_u8)]
    pub value: u8,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Wait for one reply of `kind`, mapping a timeout to the TIMEOUT exit code.
pub fn await_reply(
    session: &mut Session,
    kind: MessageKind,
    timeout: Duration,
) -> CliResult<Decoded> {
    session
        .wait_for(kind, timeout, REPLY_IDLE)
        .map_err(|err| session_error("receive failed", err))?
        .ok_or_else(|| CliError::new(TIMEOUT, format!("no {kind} within {timeout:?}")))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}

fn parse_number(input: &str) -> Result<u64, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| format!("invalid number: {input}"))
}

pub fn parse_u16(input: &str) -> Result<u16, String> {
    let value = parse_number(input)?;
    u16::try_from(value).map_err(|_| format!("{input} does not fit in 16 bits"))
}

pub fn parse_u8(input: &str) -> Result<u8, String> {
    let value = parse_number(input)?;
    u8::try_from(value).map_err(|_| format!("{input} does not fit in 8 bits"))
}

pub fn parse_kind(input: &str) -> Result<MessageKind, String> {
    MessageKind::from_name(input.trim()).ok_or_else(|| format!("unknown message kind: {input}"))
}
