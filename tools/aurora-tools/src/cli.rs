use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::output::OutputFormat;
use crate::persist::DEFAULT_OUT;

/// Build the minimal /init ELF image for Aurora.
///
/// With no subcommand, `mkinit` builds the image (same as `mkinit build`).
#[derive(Parser, Debug)]
#[command(name = "mkinit", version, about)]
pub struct MkinitCli {
    #[command(subcommand)]
    pub command: Option<MkinitCommand>,

    #[command(flatten)]
    pub build: BuildArgs,

    /// Output format for all subcommands.
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub output: OutputFormat,

    /// Log more to stderr (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl MkinitCli {
    /// The subcommand to run, defaulting to a build with the top-level flags.
    pub fn into_command(self) -> MkinitCommand {
        self.command.unwrap_or(MkinitCommand::Build(self.build))
    }
}

#[derive(Subcommand, Debug)]
pub enum MkinitCommand {
    /// Build the image and write it to disk.
    Build(BuildArgs),

    /// Decode an image's headers and check that they agree.
    Inspect(InspectArgs),
}

// ── build ────────────────────────────────────────────────────────────

#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct BuildArgs {
    /// Output ELF path.
    #[arg(long, default_value = DEFAULT_OUT)]
    pub out: PathBuf,

    /// TOML file overriding the built-in layout.
    #[arg(long)]
    pub layout: Option<PathBuf>,

    /// Raw machine-code file to use instead of the built-in /init code.
    #[arg(long)]
    pub payload: Option<PathBuf>,
}

// ── inspect ──────────────────────────────────────────────────────────

#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct InspectArgs {
    /// Image to read.
    pub path: PathBuf,
}

// ── net-perf ─────────────────────────────────────────────────────────

/// Send a TCP stream for the net perf baseline.
#[derive(Parser, Debug)]
#[command(name = "net-perf", version, about)]
pub struct NetPerfCli {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, default_value_t = 15201)]
    pub port: u16,

    /// Payload bytes to send after the 8-byte length header.
    #[arg(long, default_value_t = 1024 * 1024)]
    pub bytes: u64,

    /// Largest single write, in bytes.
    #[arg(long, default_value_t = 64 * 1024)]
    pub chunk: usize,

    /// Seconds to keep retrying the connection.
    #[arg(long, default_value_t = 5.0)]
    pub connect_timeout: f64,

    #[arg(long, value_enum, default_value = "human")]
    pub output: OutputFormat,

    /// Log more to stderr (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}
