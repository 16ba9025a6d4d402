mod cmd;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;
use knitlink_proto::WireVariant;

use crate::cmd::{Command, Context};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "knitlink", version, about = "AYAB knitting controller link tool")]
struct Cli {
    /// Serial device of the controller.
    #[arg(
        long,
        short = 'p',
        value_name = "PATH",
        env = "KNITLINK_PORT",
        default_value = "/dev/ttyACM0",
        global = true
    )]
    port: PathBuf,

    /// Line speed.
    #[arg(long, value_name = "BAUD", default_value_t = 115_200, global = true)]
    baud: u32,

    /// Use the message layouts of older firmware.
    #[arg(long, global = true)]
    legacy: bool,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn context(&self) -> Context {
        Context {
            port: self.port.clone(),
            baud_rate: self.baud,
            variant: if self.legacy {
                WireVariant::Legacy
            } else {
                WireVariant::Current
            },
            format: self.format.unwrap_or_else(OutputFormat::default_for_stdout),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let ctx = cli.context();
    match cmd::run(cli.command, &ctx) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
