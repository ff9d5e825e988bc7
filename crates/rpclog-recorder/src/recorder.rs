use std::path::{Path, PathBuf};
use std::time::Instant;

use bytes::Bytes;
use chrono::{DateTime, Local};
use rpclog_codec::{Body, Elapsed, Record};

use crate::config::RecorderConfig;
use crate::destination::Destination;
use crate::error::Result;

/// A request still waiting for its response.
#[derive(Debug)]
struct PendingRequest {
    payload: Bytes,
    started: Instant,
    sequence: u64,
}

/// Pairs observed requests with their responses and appends one
/// transcript line per logical event.
///
/// A request followed by a response becomes a single `TRN` record with the
/// round-trip duration. A response with no request before it becomes a
/// standalone `RPT` record. A request that is superseded by another
/// request, or still pending when the recorder is flushed or dropped,
/// becomes a standalone `RQT` record, so no request is ever lost.
///
/// The pending slot is plain mutable state: use one recorder per thread,
/// or [`SharedRecorder`](crate::SharedRecorder) to serialise access.
#[derive(Debug)]
pub struct Recorder {
    destination: Destination,
    client_identifier: Bytes,
    pending: Option<PendingRequest>,
    request_count: u64,
}

impl Recorder {
    /// Create a recorder, validating the directory and file-name pattern.
    pub fn new(config: RecorderConfig) -> Result<Self> {
        let destination = Destination::new(config.dir, config.file_name_pattern)?;
        tracing::debug!(
            dir = %destination.dir().display(),
            pattern = destination.pattern(),
            "recorder ready"
        );
        Ok(Self {
            destination,
            client_identifier: config.client_identifier,
            pending: None,
            request_count: 0,
        })
    }

    /// Observe an outbound request. Returns the payload unchanged.
    ///
    /// A request still pending is written as a standalone record first.
    /// If that write fails the error is returned and the older request
    /// stays pending; the new one is not registered.
    pub fn on_request(&mut self, payload: Bytes) -> Result<Bytes> {
        if let Some(stale) = &self.pending {
            tracing::warn!(
                sequence = stale.sequence,
                "request superseded before a response arrived; logging it alone"
            );
            self.emit(
                Body::Request(&stale.payload),
                Elapsed::Unknown,
                Some(stale.sequence),
            )?;
            self.pending = None;
        }

        self.request_count += 1;
        self.pending = Some(PendingRequest {
            payload: payload.clone(),
            started: Instant::now(),
            sequence: self.request_count,
        });
        tracing::trace!(sequence = self.request_count, "request pending");
        Ok(payload)
    }

    /// Observe an inbound response. Returns the payload unchanged.
    ///
    /// The pending request is released only once its transaction record
    /// has been written.
    pub fn on_response(&mut self, payload: Bytes) -> Result<Bytes> {
        if let Some(pending) = &self.pending {
            let duration = Elapsed::from_duration(pending.started.elapsed());
            tracing::trace!(sequence = pending.sequence, "request paired");
            self.emit(
                Body::Transaction {
                    request: &pending.payload,
                    response: &payload,
                },
                duration,
                Some(pending.sequence),
            )?;
            self.pending = None;
        } else {
            self.emit(Body::Response(&payload), Elapsed::Unknown, None)?;
        }
        Ok(payload)
    }

    /// Write a still-pending request as a standalone record.
    ///
    /// Returns the file written to, or `None` if nothing was pending. On
    /// failure the request stays pending.
    pub fn flush_pending(&mut self) -> Result<Option<PathBuf>> {
        let Some(pending) = &self.pending else {
            return Ok(None);
        };
        tracing::debug!(sequence = pending.sequence, "flushing unanswered request");
        let path = self.emit(
            Body::Request(&pending.payload),
            Elapsed::Unknown,
            Some(pending.sequence),
        )?;
        self.pending = None;
        Ok(Some(path))
    }

    /// Append one record, bypassing the pairing logic.
    pub fn emit(
        &self,
        body: Body<'_>,
        duration: Elapsed,
        sequence: Option<u64>,
    ) -> Result<PathBuf> {
        let record = Record::new(body, &self.client_identifier)
            .with_duration(duration)
            .with_sequence(sequence);
        let path = self.destination.append(&record)?;
        tracing::debug!(
            path = %path.display(),
            record_type = %record.record_type(),
            sequence = ?sequence,
            "appended record"
        );
        Ok(path)
    }

    pub fn dir(&self) -> &Path {
        self.destination.dir()
    }

    pub fn file_name_pattern(&self) -> &str {
        self.destination.pattern()
    }

    pub fn client_identifier(&self) -> &Bytes {
        &self.client_identifier
    }

    pub fn set_client_identifier(&mut self, client_identifier: impl Into<Bytes>) {
        self.client_identifier = client_identifier.into();
    }

    /// Requests observed so far; also the last sequence number assigned.
    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// File the next record would be written to.
    pub fn current_path(&self) -> Result<PathBuf> {
        self.destination.current_path()
    }

    /// File a record written at `when` would go to.
    pub fn path_at(&self, when: DateTime<Local>) -> Result<PathBuf> {
        self.destination.path_at(when)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Err(err) = self.flush_pending() {
            tracing::warn!(error = %err, "failed to flush pending request on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rpclog_codec::{Entry, LogReader, RawPayload, RecordType};

    use super::*;

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn config(&self) -> RecorderConfig {
            RecorderConfig::default()
                .with_dir(self.dir.path())
                .with_file_name_pattern("recorder-test.txt")
        }

        fn recorder(&self, client: &'static [u8]) -> Recorder {
            Recorder::new(self.config().with_client_identifier(client)).unwrap()
        }

        fn path(&self) -> PathBuf {
            self.dir.path().join("recorder-test.txt")
        }

        fn entries(&self) -> Vec<Entry<Bytes>> {
            LogReader::open(self.path(), RawPayload)
                .unwrap()
                .collect::<rpclog_codec::Result<_>>()
                .unwrap()
        }
    }

    #[test]
    fn constructor_keeps_settings() {
        let fx = Fixture::new();
        let recorder = fx.recorder(b"\x01\x02\n\t ID here\n");
        assert_eq!(recorder.dir(), fx.dir.path());
        assert_eq!(recorder.file_name_pattern(), "recorder-test.txt");
        assert_eq!(
            recorder.client_identifier().as_ref(),
            b"\x01\x02\n\t ID here\n"
        );
        assert_eq!(recorder.current_path().unwrap(), fx.path());
    }

    #[test]
    fn constructor_rejects_missing_directory() {
        let err = Recorder::new(RecorderConfig::default().with_dir("/no/such/directory/"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "log directory '/no/such/directory/' does not exist or is not a directory"
        );
    }

    #[test]
    fn request_then_response_is_one_transaction() {
        let fx = Fixture::new();
        let mut recorder = fx.recorder(b"MyCookie");

        let request = Bytes::from_static(b"First Request\n\x1e");
        let response = Bytes::from_static(b"First Response\x01");

        let passed = recorder.on_request(request.clone()).unwrap();
        assert_eq!(passed, request);
        assert!(recorder.has_pending());
        std::thread::sleep(Duration::from_millis(25));
        let passed = recorder.on_response(response.clone()).unwrap();
        assert_eq!(passed, response);
        assert!(!recorder.has_pending());

        let entries = fx.entries();
        assert_eq!(entries.len(), 1);
        let entry = entries.into_iter().next().unwrap().valid().unwrap();
        assert_eq!(entry.record_type, RecordType::Transaction);
        assert_eq!(entry.sequence, Some(1));
        assert_eq!(entry.client_identifier.as_ref(), b"MyCookie");
        let secs = entry.duration.as_secs_f64().unwrap();
        assert!(secs >= 0.025, "duration {secs} shorter than the sleep");
        assert!(secs < 5.0, "duration {secs} implausibly long");
        let (rq, rp) = entry.payload.pair().unwrap();
        assert_eq!(rq, &request);
        assert_eq!(rp, &response);
    }

    #[test]
    fn sequence_numbers_increase_per_exchange() {
        let fx = Fixture::new();
        let mut recorder = fx.recorder(b"MyCookie");

        for input in ["First", "Second"] {
            recorder
                .on_request(Bytes::from(format!("{input} Request")))
                .unwrap();
            recorder
                .on_response(Bytes::from(format!("{input} Response")))
                .unwrap();
        }

        let sequences: Vec<_> = fx
            .entries()
            .into_iter()
            .map(|entry| entry.valid().unwrap().sequence)
            .collect();
        assert_eq!(sequences, vec![Some(1), Some(2)]);
        assert_eq!(recorder.request_count(), 2);
    }

    #[test]
    fn orphan_response_is_standalone() {
        let fx = Fixture::new();
        let mut recorder = fx.recorder(b"");

        recorder
            .on_response(Bytes::from_static(b"unsolicited"))
            .unwrap();

        let entries = fx.entries();
        assert_eq!(entries.len(), 1);
        let entry = entries.into_iter().next().unwrap().valid().unwrap();
        assert_eq!(entry.record_type, RecordType::Response);
        assert_eq!(entry.duration, Elapsed::Unknown);
        assert_eq!(entry.sequence, None);
        assert_eq!(entry.payload.single().unwrap().as_ref(), b"unsolicited");
    }

    #[test]
    fn back_to_back_requests_flush_the_stale_one() {
        let fx = Fixture::new();
        let mut recorder = fx.recorder(b"id");

        recorder.on_request(Bytes::from_static(b"A")).unwrap();
        recorder.on_request(Bytes::from_static(b"B")).unwrap();
        assert_eq!(fx.entries().len(), 1);

        recorder.on_response(Bytes::from_static(b"B reply")).unwrap();

        let entries: Vec<_> = fx
            .entries()
            .into_iter()
            .map(|entry| entry.valid().unwrap())
            .collect();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].record_type, RecordType::Request);
        assert_eq!(entries[0].duration, Elapsed::Unknown);
        assert_eq!(entries[0].sequence, Some(1));
        assert_eq!(entries[0].payload.single().unwrap().as_ref(), b"A");

        assert_eq!(entries[1].record_type, RecordType::Transaction);
        assert_eq!(entries[1].sequence, Some(2));
        let (rq, rp) = entries[1].payload.pair().unwrap();
        assert_eq!(rq.as_ref(), b"B");
        assert_eq!(rp.as_ref(), b"B reply");
    }

    #[test]
    fn flush_pending_writes_unanswered_request() {
        let fx = Fixture::new();
        let mut recorder = fx.recorder(b"");

        assert!(recorder.flush_pending().unwrap().is_none());
        recorder.on_request(Bytes::from_static(b"lonely")).unwrap();
        assert_eq!(recorder.flush_pending().unwrap(), Some(fx.path()));
        assert!(!recorder.has_pending());
        assert!(recorder.flush_pending().unwrap().is_none());

        let entries = fx.entries();
        assert_eq!(entries.len(), 1);
        let entry = entries.into_iter().next().unwrap().valid().unwrap();
        assert_eq!(entry.record_type, RecordType::Request);
        assert_eq!(entry.sequence, Some(1));
    }

    #[test]
    fn drop_flushes_pending_request() {
        let fx = Fixture::new();
        {
            let mut recorder = fx.recorder(b"");
            recorder.on_request(Bytes::from_static(b"at exit")).unwrap();
        }
        let entries = fx.entries();
        assert_eq!(entries.len(), 1);
        let entry = entries.into_iter().next().unwrap().valid().unwrap();
        assert_eq!(entry.record_type, RecordType::Request);
        assert_eq!(entry.payload.single().unwrap().as_ref(), b"at exit");
    }

    #[test]
    fn emit_writes_requested_shape() {
        let fx = Fixture::new();
        let recorder = fx.recorder(b"");

        recorder
            .emit(
                Body::Request(b"\x00\x01\x02\x81\n\n\t Other Random Data"),
                Elapsed::Seconds(0.0),
                Some(0),
            )
            .unwrap();
        recorder
            .emit(Body::Response(b""), Elapsed::Seconds(0.01), Some(0))
            .unwrap();

        let raw = std::fs::read(fx.path()).unwrap();
        let lines: Vec<&[u8]> = raw.split_inclusive(|&b| b == b'\n').collect();
        assert_eq!(lines.len(), 2);
        let head = String::from_utf8_lossy(&lines[0][..lines[0].len().min(60)]).into_owned();
        assert!(head.contains(" 2 D=0.000000 #0 RQT 0 "), "{head}");
        assert!(lines[0].ends_with(b"Other Random Data\n"));
        let head = String::from_utf8_lossy(&lines[1][..lines[1].len().min(60)]).into_owned();
        assert!(head.contains(" 2 D=0.010000 #0 RPT 0 "), "{head}");
    }

    #[test]
    fn client_identifier_can_change() {
        let fx = Fixture::new();
        let mut recorder = fx.recorder(b"old");
        recorder.set_client_identifier(&b"Random\nString"[..]);
        recorder.on_response(Bytes::from_static(b"x")).unwrap();

        let entry = fx.entries().into_iter().next().unwrap().valid().unwrap();
        assert_eq!(entry.client_identifier.as_ref(), b"Random\nString");
    }

    #[test]
    fn failed_stale_flush_keeps_the_older_request() {
        let fx = Fixture::new();
        let mut recorder = fx.recorder(b"");

        // Occupy the transcript path with a directory so appends fail.
        std::fs::create_dir(fx.path()).unwrap();
        assert!(recorder.on_response(Bytes::from_static(b"x")).is_err());

        recorder.on_request(Bytes::from_static(b"A")).unwrap();
        assert!(recorder.on_request(Bytes::from_static(b"B")).is_err());
        assert!(recorder.has_pending());
        assert_eq!(recorder.request_count(), 1);
        assert!(recorder.on_response(Bytes::from_static(b"lost?")).is_err());
        assert!(recorder.flush_pending().is_err());
        assert!(recorder.has_pending());

        std::fs::remove_dir(fx.path()).unwrap();
        recorder.on_response(Bytes::from_static(b"R")).unwrap();

        let entries = fx.entries();
        assert_eq!(entries.len(), 1);
        let entry = entries.into_iter().next().unwrap().valid().unwrap();
        assert_eq!(entry.record_type, RecordType::Transaction);
        assert_eq!(entry.sequence, Some(1));
        let (rq, rp) = entry.payload.pair().unwrap();
        assert_eq!(rq.as_ref(), b"A");
        assert_eq!(rp.as_ref(), b"R");
    }
}
