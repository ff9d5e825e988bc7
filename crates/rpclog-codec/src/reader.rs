use std::fs::File;
use std::io::{self, BufRead, BufReader, ErrorKind, Read};
use std::path::Path;

use crate::codec::decode_line;
use crate::decode::PayloadDecoder;
use crate::entry::Entry;
use crate::error::{CodecError, Result};

/// Reads transcript entries one line at a time, strictly forward.
///
/// A reader built with [`LogReader::open`] owns its file, buffers it, and
/// drops it as soon as end-of-stream is reached. A reader built with
/// [`LogReader::with_handle`] keeps the handle until it is dropped or
/// handed back by [`LogReader::into_inner`], and never consumes more than
/// the line it is decoding, so the handle stays positioned on the next
/// line. The name is only used in error messages. That form suits
/// pipelines (`stdin`, a child's stdout); wrap slow handles in a
/// `BufReader` yourself if nothing else reads from them.
///
/// Once a stream-fatal format error has been returned the reader is
/// exhausted.
enum Source<R> {
    /// Owned file: read-ahead is invisible to anyone else.
    Buffered(BufReader<R>),
    /// Caller's handle: consumed exactly up to the end of each line.
    Direct(R),
}

impl<R: Read> Source<R> {
    fn read_line(&mut self, line: &mut Vec<u8>) -> io::Result<usize> {
        match self {
            Source::Buffered(inner) => inner.read_until(b'\n', line),
            Source::Direct(inner) => read_line_unbuffered(inner, line),
        }
    }

    fn into_inner(self) -> R {
        match self {
            Source::Buffered(inner) => inner.into_inner(),
            Source::Direct(inner) => inner,
        }
    }
}

/// `read_until(b'\n')` without read-ahead.
fn read_line_unbuffered<R: Read>(inner: &mut R, line: &mut Vec<u8>) -> io::Result<usize> {
    let mut byte = [0u8; 1];
    let mut read = 0;
    loop {
        match inner.read(&mut byte) {
            Ok(0) => return Ok(read),
            Ok(_) => {
                read += 1;
                line.push(byte[0]);
                if byte[0] == b'\n' {
                    return Ok(read);
                }
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}

pub struct LogReader<R, D> {
    name: String,
    inner: Option<Source<R>>,
    close_on_eof: bool,
    decoder: D,
    line: Vec<u8>,
    line_number: u64,
    failed: bool,
}

impl<D: PayloadDecoder> LogReader<File, D> {
    /// Open a transcript file for reading.
    pub fn open(path: impl AsRef<Path>, decoder: D) -> Result<Self> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let file = File::open(path).map_err(|source| CodecError::Open {
            name: name.clone(),
            source,
        })?;
        tracing::debug!(transcript = %name, "opened transcript for reading");

        Ok(Self::from_source(
            name,
            Source::Buffered(BufReader::new(file)),
            true,
            decoder,
        ))
    }
}

impl<R: Read, D: PayloadDecoder> LogReader<R, D> {
    /// Read from a caller-supplied handle.
    pub fn with_handle(name: impl Into<String>, handle: R, decoder: D) -> Self {
        Self::from_source(name.into(), Source::Direct(handle), false, decoder)
    }

    fn from_source(name: String, source: Source<R>, close_on_eof: bool, decoder: D) -> Self {
        Self {
            name,
            inner: Some(source),
            close_on_eof,
            decoder,
            line: Vec::new(),
            line_number: 0,
            failed: false,
        }
    }

    /// Read and decode the next line.
    ///
    /// Returns `Ok(None)` at end-of-stream. Per-line content problems come
    /// back as [`Entry::Damaged`]; `Err` means the stream cannot be read
    /// further.
    pub fn read_entry(&mut self) -> Result<Option<Entry<D::Output>>> {
        if self.failed {
            return Ok(None);
        }
        let Some(inner) = self.inner.as_mut() else {
            return Ok(None);
        };

        self.line.clear();
        let read = match inner.read_line(&mut self.line) {
            Ok(n) => n,
            Err(err) => {
                self.failed = true;
                return Err(CodecError::Io(err));
            }
        };
        if read == 0 {
            if self.close_on_eof {
                self.inner = None;
                tracing::debug!(transcript = %self.name, "closed transcript at end of stream");
            }
            return Ok(None);
        }
        self.line_number += 1;

        match decode_line(&self.line, &self.name, self.line_number, &self.decoder) {
            Ok(entry) => Ok(Some(entry)),
            Err(err) => {
                self.failed = true;
                Err(err)
            }
        }
    }

    /// Name used in error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of lines read so far.
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// True once an owned file has been closed at end-of-stream.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Hand back the underlying handle, if the reader still holds it.
    ///
    /// A handle given to [`LogReader::with_handle`] comes back positioned
    /// at the start of the first undecoded line.
    pub fn into_inner(self) -> Option<R> {
        self.inner.map(Source::into_inner)
    }
}

impl<R: Read, D: PayloadDecoder> Iterator for LogReader<R, D> {
    type Item = Result<Entry<D::Output>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_entry().transpose()
    }
}
