use clap::{ArgGroup, Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use rpclog_recorder::DEFAULT_FILE_NAME_PATTERN;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod record;
pub mod show;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode and print a transcript.
    Show(ShowArgs),
    /// Append one exchange to a transcript from payload files.
    Record(RecordArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Show(args) => show::run(args, format),
        Command::Record(args) => record::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum DecodeMode {
    /// Payload bytes as recorded.
    #[default]
    Raw,
    /// Payloads must be UTF-8 text.
    Utf8,
    /// Payloads must be JSON documents.
    Json,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Transcript file, or `-` for stdin.
    pub file: PathBuf,
    /// How to decode payloads.
    #[arg(long, value_enum, default_value_t = DecodeMode::Raw)]
    pub decode: DecodeMode,
    /// Fractional digits shown for timestamps and durations.
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(0..=9))]
    pub precision: u8,
    /// Print only entries that failed to decode.
    #[arg(long)]
    pub errors_only: bool,
    /// Stop with exit code 60 at the first entry that failed to decode.
    #[arg(long)]
    pub fail_on_error: bool,
}

#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("payloads")
        .required(true)
        .multiple(true)
        .args(["request", "response"])
))]
pub struct RecordArgs {
    /// File holding the request payload.
    #[arg(long, value_name = "FILE")]
    pub request: Option<PathBuf>,
    /// File holding the response payload.
    #[arg(long, value_name = "FILE")]
    pub response: Option<PathBuf>,
    /// Transcript directory (default: the system temp directory).
    #[arg(long, value_name = "DIR", env = "RPCLOG_DIR")]
    pub dir: Option<PathBuf>,
    /// strftime pattern for the transcript file name.
    #[arg(long, env = "RPCLOG_FILE_PATTERN", default_value = DEFAULT_FILE_NAME_PATTERN)]
    pub pattern: String,
    /// Client identifier stamped on the record.
    #[arg(long, env = "RPCLOG_CLIENT_ID", default_value = "")]
    pub client_id: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
