use std::io::Read;
use std::path::Path;

use rpclog_codec::{JsonPayload, LogReader, PayloadDecoder, RawPayload, Utf8Payload};

use crate::cmd::{DecodeMode, ShowArgs};
use crate::exit::{codec_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{EntryPrinter, OutputFormat, RenderPayload};

pub fn run(args: ShowArgs, format: OutputFormat) -> CliResult<i32> {
    match args.decode {
        DecodeMode::Raw => show_with(&args, format, RawPayload),
        DecodeMode::Utf8 => show_with(&args, format, Utf8Payload),
        DecodeMode::Json => show_with(&args, format, JsonPayload),
    }
}

fn show_with<D>(args: &ShowArgs, format: OutputFormat, decoder: D) -> CliResult<i32>
where
    D: PayloadDecoder,
    D::Output: RenderPayload,
{
    if args.file == Path::new("-") {
        let stdin = std::io::stdin().lock();
        print_entries(LogReader::with_handle("<stdin>", stdin, decoder), args, format)
    } else {
        let reader = LogReader::open(&args.file, decoder)
            .map_err(|err| codec_error("failed to open transcript", err))?;
        print_entries(reader, args, format)
    }
}

fn print_entries<R, D>(
    reader: LogReader<R, D>,
    args: &ShowArgs,
    format: OutputFormat,
) -> CliResult<i32>
where
    R: Read,
    D: PayloadDecoder,
    D::Output: RenderPayload,
{
    let mut printer = EntryPrinter::new(format, usize::from(args.precision));
    let mut damaged = 0u64;
    let mut outcome = Ok(SUCCESS);

    for entry in reader {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                outcome = Err(codec_error("failed reading transcript", err));
                break;
            }
        };

        if let Some(error) = entry.error() {
            damaged += 1;
            if args.fail_on_error {
                let message = format!("line {}: {error}", entry.line_number());
                printer.print(&entry);
                outcome = Err(CliError::new(DATA_INVALID, message));
                break;
            }
        } else if args.errors_only {
            continue;
        }
        printer.print(&entry);
    }

    // Whatever was decoded before a fatal error is still shown.
    printer.finish();
    if damaged > 0 {
        tracing::info!(damaged, "transcript contains damaged entries");
    }
    outcome
}
