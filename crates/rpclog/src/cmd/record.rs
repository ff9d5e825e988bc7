use std::fs;
use std::path::Path;

use bytes::Bytes;
use rpclog_codec::RecordType;
use rpclog_recorder::{Recorder, RecorderConfig};

use crate::cmd::RecordArgs;
use crate::exit::{io_error, recorder_error, CliResult, SUCCESS};
use crate::output::{print_recorded, OutputFormat};

pub fn run(args: RecordArgs, format: OutputFormat) -> CliResult<i32> {
    let request = args.request.as_deref().map(read_payload).transpose()?;
    let response = args.response.as_deref().map(read_payload).transpose()?;

    let mut config = RecorderConfig::default()
        .with_file_name_pattern(args.pattern)
        .with_client_identifier(args.client_id.into_bytes());
    if let Some(dir) = args.dir {
        config = config.with_dir(dir);
    }
    let mut recorder =
        Recorder::new(config).map_err(|err| recorder_error("failed to start recorder", err))?;

    let record_type = match (&request, &response) {
        (Some(_), Some(_)) => RecordType::Transaction,
        (Some(_), None) => RecordType::Request,
        _ => RecordType::Response,
    };

    let path = recorder
        .current_path()
        .map_err(|err| recorder_error("failed to resolve transcript path", err))?;

    if let Some(request) = request {
        recorder
            .on_request(request)
            .map_err(|err| recorder_error("failed to record request", err))?;
    }
    if let Some(response) = response {
        recorder
            .on_response(response)
            .map_err(|err| recorder_error("failed to record response", err))?;
    }
    let path = recorder
        .flush_pending()
        .map_err(|err| recorder_error("failed to record request", err))?
        .unwrap_or(path);

    print_recorded(&path, record_type, format);
    Ok(SUCCESS)
}

fn read_payload(path: &Path) -> CliResult<Bytes> {
    fs::read(path)
        .map(Bytes::from)
        .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))
}
