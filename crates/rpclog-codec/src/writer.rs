use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::encode_record;
use crate::error::{CodecError, Result};
use crate::record::Record;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete transcript lines to any `Write` sink.
///
/// Each record is encoded in full before anything is written, then handed
/// to the sink in one buffer, so two records never share a write.
pub struct TranscriptWriter<T> {
    inner: T,
    buf: BytesMut,
    records_written: u64,
}

impl<T: Write> TranscriptWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            records_written: 0,
        }
    }

    /// Encode and write one record, then flush.
    ///
    /// If the sink fails after accepting part of the line, those bytes stay
    /// in the sink. Callers that own a file should cut it back to its length
    /// from before the call.
    pub fn write_record(&mut self, record: &Record<'_>) -> Result<()> {
        self.buf.clear();
        encode_record(record, &mut self.buf);

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(CodecError::Io(ErrorKind::WriteZero.into())),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(CodecError::Io(err)),
            }
        }

        self.flush()?;
        self.records_written += 1;
        tracing::debug!(
            record_type = %record.record_type(),
            bytes = self.buf.len(),
            "wrote transcript record"
        );
        Ok(())
    }

    /// Flush the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(CodecError::Io(err)),
            }
        }
    }

    /// Records written through this writer.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::decode::RawPayload;
    use crate::reader::LogReader;
    use crate::record::{Body, Elapsed, RecordType};

    #[test]
    fn writes_one_line_per_record() {
        let mut writer = TranscriptWriter::new(Vec::new());
        writer
            .write_record(&Record::new(Body::Request(b"\n\none"), b"c"))
            .unwrap();
        writer
            .write_record(&Record::new(Body::Response(b"two\n"), b"c"))
            .unwrap();
        assert_eq!(writer.records_written(), 2);

        let bytes = writer.into_inner();
        assert_eq!(bytes.iter().filter(|&&b| b == b'\n').count(), 2);
    }

    #[test]
    fn written_lines_decode() {
        let mut writer = TranscriptWriter::new(Cursor::new(Vec::new()));
        let record = Record::new(
            Body::Transaction {
                request: b"req",
                response: b"resp",
            },
            b"cookie",
        )
        .with_duration(Elapsed::Seconds(0.5))
        .with_sequence(Some(9));
        writer.write_record(&record).unwrap();

        let wire = writer.into_inner().into_inner();
        let mut reader = LogReader::with_handle("memory", Cursor::new(wire), RawPayload);
        let entry = reader.read_entry().unwrap().unwrap().valid().unwrap();
        assert_eq!(entry.record_type, RecordType::Transaction);
        assert_eq!(entry.sequence, Some(9));
        assert_eq!(entry.duration, Elapsed::Seconds(0.5));
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = TranscriptWriter::new(sink);

        writer
            .write_record(&Record::new(Body::Request(b"x"), b""))
            .unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_write_and_flush() {
        let sink = InterruptedWriteThenFlush {
            wrote_once: false,
            flush_interrupted: false,
            data: Vec::new(),
        };

        let mut writer = TranscriptWriter::new(sink);
        writer
            .write_record(&Record::new(Body::Request(b"retry"), b""))
            .unwrap();

        let inner = writer.into_inner();
        assert!(inner.data.ends_with(b"retry\n"));
    }

    #[test]
    fn short_writes_are_completed() {
        let mut writer = TranscriptWriter::new(OneByteWriter::default());
        writer
            .write_record(&Record::new(Body::Request(b"slow"), b""))
            .unwrap();
        assert!(writer.get_ref().data.ends_with(b"\x1eslow\n"));
    }

    #[test]
    fn write_returning_zero_is_an_error() {
        let mut writer = TranscriptWriter::new(ZeroWriter);
        let err = writer
            .write_record(&Record::new(Body::Request(b"x"), b""))
            .unwrap_err();
        assert!(matches!(err, CodecError::Io(e) if e.kind() == ErrorKind::WriteZero));
        assert_eq!(writer.records_written(), 0);
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut writer = TranscriptWriter::new(Vec::<u8>::new());

        let _ = writer.get_ref();
        let _ = writer.get_mut();
        let _inner = writer.into_inner();
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct InterruptedWriteThenFlush {
        wrote_once: bool,
        flush_interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedWriteThenFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_interrupted {
                self.flush_interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct OneByteWriter {
        data: Vec<u8>,
    }

    impl Write for OneByteWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            match buf.first() {
                Some(&b) => {
                    self.data.push(b);
                    Ok(1)
                }
                None => Ok(0),
            }
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
