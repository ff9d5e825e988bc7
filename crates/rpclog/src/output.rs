use std::borrow::Cow;
use std::fmt::Write as _;
use std::io::{IsTerminal, Write};
use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Local};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rpclog_codec::{Elapsed, Entry, EntryError, Payload, RecordType, SEQUENCE_UNKNOWN};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
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

/// How a decoded payload is shown in each output format.
pub trait RenderPayload {
    fn text(&self) -> String;
    fn json(&self) -> serde_json::Value;
    fn raw(&self) -> Cow<'_, [u8]>;
}

impl RenderPayload for Bytes {
    fn text(&self) -> String {
        payload_preview(self)
    }

    fn json(&self) -> serde_json::Value {
        match std::str::from_utf8(self) {
            Ok(text) => serde_json::Value::String(text.to_string()),
            Err(_) => serde_json::Value::String(self.escape_ascii().to_string()),
        }
    }

    fn raw(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_ref())
    }
}

impl RenderPayload for String {
    fn text(&self) -> String {
        self.clone()
    }

    fn json(&self) -> serde_json::Value {
        serde_json::Value::String(self.clone())
    }

    fn raw(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }
}

impl RenderPayload for serde_json::Value {
    fn text(&self) -> String {
        self.to_string()
    }

    fn json(&self) -> serde_json::Value {
        self.clone()
    }

    fn raw(&self) -> Cow<'_, [u8]> {
        Cow::Owned(self.to_string().into_bytes())
    }
}

/// Display form of one entry, shared by every output format.
pub struct EntryView<'a, P> {
    pub line: u64,
    pub time: String,
    pub unix_time: Option<f64>,
    pub duration: String,
    pub sequence: String,
    pub type_name: String,
    pub client: String,
    pub payload: Option<&'a Payload<P>>,
    pub error: Option<&'a EntryError>,
}

impl<'a, P> EntryView<'a, P> {
    pub fn new(entry: &'a Entry<P>, precision: usize) -> Self {
        match entry {
            Entry::Valid(entry) => Self {
                line: entry.line_number,
                time: format_timestamp(entry.timestamp, precision),
                unix_time: Some(entry.timestamp),
                duration: format_duration(entry.duration, precision),
                sequence: entry
                    .sequence
                    .map_or_else(|| SEQUENCE_UNKNOWN.to_string(), |seq| seq.to_string()),
                type_name: entry.record_type.name().to_string(),
                client: display_bytes(&entry.client_identifier),
                payload: Some(&entry.payload),
                error: None,
            },
            Entry::Damaged(entry) => {
                let unix_time = entry.header.timestamp.parse::<f64>().ok();
                Self {
                    line: entry.line_number,
                    time: unix_time
                        .map(|ts| format_timestamp(ts, precision))
                        .unwrap_or_else(|| entry.header.timestamp.clone()),
                    unix_time,
                    duration: entry.header.duration.clone(),
                    sequence: entry.header.sequence.clone(),
                    type_name: entry.header.record_type.name().into_owned(),
                    client: entry
                        .client_identifier
                        .as_deref()
                        .map(display_bytes)
                        .unwrap_or_default(),
                    payload: None,
                    error: Some(&entry.error),
                }
            }
        }
    }

    /// `2013-04-05 14:30:00.1235 0.0123 #7 Transaction cookie [error]`
    pub fn header_line(&self) -> String {
        let mut line = format!(
            "{} {} #{} {} {}",
            self.time, self.duration, self.sequence, self.type_name, self.client
        );
        if let Some(error) = self.error {
            let _ = write!(line, " [{error}]");
        }
        line
    }
}

#[derive(Serialize)]
struct EntryOutput {
    line: u64,
    valid: bool,
    time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    unix_time: Option<f64>,
    duration: String,
    sequence: String,
    #[serde(rename = "type")]
    type_name: String,
    client_identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Prints entries in the chosen format. Table output is buffered until
/// [`EntryPrinter::finish`].
pub struct EntryPrinter {
    format: OutputFormat,
    precision: usize,
    table: Option<Table>,
}

impl EntryPrinter {
    pub fn new(format: OutputFormat, precision: usize) -> Self {
        let table = (format == OutputFormat::Table).then(|| {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "LINE", "TIME", "DURATION", "SEQ", "TYPE", "CLIENT", "PAYLOAD", "ERROR",
                ]);
            table
        });
        Self {
            format,
            precision,
            table,
        }
    }

    pub fn print<P: RenderPayload>(&mut self, entry: &Entry<P>) {
        let view = EntryView::new(entry, self.precision);
        match self.format {
            OutputFormat::Json => {
                let (payload, request, response) = match view.payload {
                    Some(Payload::Single(payload)) => (Some(payload.json()), None, None),
                    Some(Payload::Pair { request, response }) => {
                        (None, Some(request.json()), Some(response.json()))
                    }
                    None => (None, None, None),
                };
                let out = EntryOutput {
                    line: view.line,
                    valid: entry.is_valid(),
                    time: view.time,
                    unix_time: view.unix_time,
                    duration: view.duration,
                    sequence: view.sequence,
                    type_name: view.type_name,
                    client_identifier: view.client,
                    payload,
                    request,
                    response,
                    error: view.error.map(ToString::to_string),
                };
                println!(
                    "{}",
                    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
                );
            }
            OutputFormat::Table => {
                let payload = match view.payload {
                    Some(Payload::Single(payload)) => payload.text(),
                    Some(Payload::Pair { request, response }) => {
                        format!("> {}\n< {}", request.text(), response.text())
                    }
                    None => String::new(),
                };
                if let Some(table) = self.table.as_mut() {
                    table.add_row(vec![
                        view.line.to_string(),
                        view.time,
                        view.duration,
                        view.sequence,
                        view.type_name,
                        view.client,
                        payload,
                        view.error.map(ToString::to_string).unwrap_or_default(),
                    ]);
                }
            }
            OutputFormat::Pretty => {
                println!("{}", view.header_line());
                match view.payload {
                    Some(Payload::Single(payload)) => println!("  {}", payload.text()),
                    Some(Payload::Pair { request, response }) => {
                        println!("  > {}", request.text());
                        println!("  < {}", response.text());
                    }
                    None => {}
                }
            }
            OutputFormat::Raw => match view.payload {
                Some(Payload::Single(payload)) => print_raw_line(&payload.raw()),
                Some(Payload::Pair { request, response }) => {
                    print_raw_line(&request.raw());
                    print_raw_line(&response.raw());
                }
                None => {}
            },
        }
    }

    pub fn finish(self) {
        if let Some(table) = self.table {
            println!("{table}");
        }
    }
}

#[derive(Serialize)]
struct RecordedOutput<'a> {
    path: String,
    #[serde(rename = "type")]
    type_name: &'a str,
}

pub fn print_recorded(path: &Path, record_type: RecordType, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = RecordedOutput {
                path: path.display().to_string(),
                type_name: record_type.name(),
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
                .set_header(vec!["TYPE", "PATH"])
                .add_row(vec![
                    record_type.name().to_string(),
                    path.display().to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("wrote {} record to {}", record_type.name(), path.display());
        }
        OutputFormat::Raw => {
            println!("{}", path.display());
        }
    }
}

/// Payload bytes followed by a newline, unmodified.
pub fn print_raw_line(data: &[u8]) {
    let mut out = std::io::stdout().lock();
    let _ = out.write_all(data);
    let _ = out.write_all(b"\n");
    let _ = out.flush();
}

/// Local wall-clock time with `precision` fractional digits (at most 9).
pub fn format_timestamp(timestamp: f64, precision: usize) -> String {
    let precision = precision.min(9);
    if !timestamp.is_finite() {
        return timestamp.to_string();
    }

    let scale = 10i64.pow(precision as u32);
    // Round once on the scaled value so 59.99996 carries into the next second.
    let scaled = (timestamp * scale as f64).round() as i64;
    let secs = scaled.div_euclid(scale);
    let frac = scaled.rem_euclid(scale);

    let Some(utc) = DateTime::from_timestamp(secs, 0) else {
        return format!("{timestamp:.precision$}");
    };
    let mut out = utc
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();
    if precision > 0 {
        let _ = write!(out, ".{frac:0precision$}");
    }
    out
}

pub fn format_duration(duration: Elapsed, precision: usize) -> String {
    match duration.as_secs_f64() {
        Some(secs) if secs.is_finite() => format!("{:.precision$}", secs.max(0.0)),
        _ => Elapsed::Unknown.to_string(),
    }
}

/// Printable form of an opaque identifier.
pub fn display_bytes(bytes: &[u8]) -> String {
    bytes.escape_ascii().to_string()
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

#[cfg(test)]
mod tests {
    use rpclog_codec::{decode_line, RawPayload};

    use super::*;

    #[test]
    fn timestamp_fraction_is_rounded() {
        let shown = format_timestamp(1365172200.123456, 4);
        assert!(shown.ends_with(".1235"), "{shown}");
        assert_eq!(shown.len(), "2013-04-05 14:30:00.1235".len());
    }

    #[test]
    fn timestamp_without_fraction() {
        let shown = format_timestamp(1365172200.9, 0);
        assert!(!shown.contains('.'), "{shown}");
        assert!(shown.ends_with(":01"), "{shown}");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Elapsed::Seconds(0.5), 2), "0.50");
        assert_eq!(format_duration(Elapsed::Seconds(0.012345), 4), "0.0123");
        assert_eq!(format_duration(Elapsed::Unknown, 4), "-");
    }

    #[test]
    fn identifiers_are_escaped_for_display() {
        assert_eq!(display_bytes(b"cookie"), "cookie");
        assert_eq!(display_bytes(b"a\nb\x01"), "a\\nb\\x01");
    }

    #[test]
    fn binary_payload_preview() {
        assert_eq!(Bytes::from_static(b"hi").text(), "hi");
        assert_eq!(Bytes::from_static(b"\xff\x00").text(), "<binary 2 bytes>");
    }

    #[test]
    fn header_line_for_valid_entry() {
        let entry = decode_line(
            b"1365172200.5 2 D=0.25 #7 TRN 6 cookie 1 \x1ea\x1eb\n",
            "t",
            1,
            &RawPayload,
        )
        .unwrap();
        let view = EntryView::new(&entry, 2);
        let line = view.header_line();
        assert!(line.ends_with(".50 0.25 #7 Transaction cookie"), "{line}");
    }

    #[test]
    fn header_line_for_damaged_entry() {
        let entry = decode_line(b"1.5 3 RQT 0  1 \x1ea\n", "t", 4, &RawPayload).unwrap();
        let view = EntryView::new(&entry, 4);
        assert_eq!(view.line, 4);
        assert_eq!(view.sequence, "?");
        assert_eq!(view.duration, "-");
        let line = view.header_line();
        assert!(line.contains(" - #? Request "), "{line}");
        assert!(line.ends_with("[logfile version 3 > 2]"), "{line}");
    }
}
