use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use crate::error::Result;
use crate::recorder::Recorder;

/// Interception points a gateway calls around each upstream exchange.
///
/// Both methods hand the payload back unchanged so the hook can sit inline
/// in the gateway's data path.
pub trait GatewayHook {
    fn on_request(&mut self, raw: Bytes) -> Result<Bytes>;
    fn on_response(&mut self, raw: Bytes) -> Result<Bytes>;
}

impl GatewayHook for Recorder {
    fn on_request(&mut self, raw: Bytes) -> Result<Bytes> {
        Recorder::on_request(self, raw)
    }

    fn on_response(&mut self, raw: Bytes) -> Result<Bytes> {
        Recorder::on_response(self, raw)
    }
}

/// A cloneable handle to one [`Recorder`] shared between threads.
///
/// Each hook call takes the lock for its own duration only. Hosts that run
/// exchanges concurrently should hold [`SharedRecorder::lock`] across the
/// request and its response so the pairing stays intact.
#[derive(Debug, Clone)]
pub struct SharedRecorder {
    inner: Arc<Mutex<Recorder>>,
}

impl SharedRecorder {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            inner: Arc::new(Mutex::new(recorder)),
        }
    }

    /// Lock the recorder. A poisoned lock is recovered, since the pending
    /// slot is always left in a consistent state.
    pub fn lock(&self) -> MutexGuard<'_, Recorder> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one request/response exchange under a single lock.
    ///
    /// `upstream` receives the request payload and returns the response.
    pub fn exchange<E: std::error::Error + 'static>(
        &self,
        request: Bytes,
        upstream: impl FnOnce(Bytes) -> std::result::Result<Bytes, E>,
    ) -> std::result::Result<Bytes, ExchangeError<E>> {
        let mut recorder = self.lock();
        let request = recorder.on_request(request)?;
        let response = upstream(request).map_err(ExchangeError::Upstream)?;
        Ok(recorder.on_response(response)?)
    }
}

impl GatewayHook for SharedRecorder {
    fn on_request(&mut self, raw: Bytes) -> Result<Bytes> {
        self.lock().on_request(raw)
    }

    fn on_response(&mut self, raw: Bytes) -> Result<Bytes> {
        self.lock().on_response(raw)
    }
}

/// Failure of a [`SharedRecorder::exchange`].
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError<E: std::error::Error + 'static> {
    #[error(transparent)]
    Record(#[from] crate::error::RecorderError),

    #[error("upstream call failed: {0}")]
    Upstream(#[source] E),
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::thread;

    use rpclog_codec::{LogReader, RawPayload, RecordType};

    use super::*;
    use crate::config::RecorderConfig;

    fn recorder_in(dir: &tempfile::TempDir) -> Recorder {
        Recorder::new(
            RecorderConfig::default()
                .with_dir(dir.path())
                .with_file_name_pattern("hook.log"),
        )
        .unwrap()
    }

    fn record_through(hook: &mut impl GatewayHook) {
        let rq = hook.on_request(Bytes::from_static(b"ping")).unwrap();
        assert_eq!(rq.as_ref(), b"ping");
        let rp = hook.on_response(Bytes::from_static(b"pong")).unwrap();
        assert_eq!(rp.as_ref(), b"pong");
    }

    #[test]
    fn recorder_works_as_hook() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = recorder_in(&dir);
        record_through(&mut recorder);
        assert_eq!(recorder.request_count(), 1);
        assert!(!recorder.has_pending());
    }

    #[test]
    fn shared_recorder_works_as_hook() {
        let dir = tempfile::tempdir().unwrap();
        let mut shared = SharedRecorder::new(recorder_in(&dir));
        record_through(&mut shared);
        assert_eq!(shared.lock().request_count(), 1);
    }

    #[test]
    fn exchange_propagates_upstream_failure() {
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedRecorder::new(recorder_in(&dir));

        let err = shared
            .exchange(Bytes::from_static(b"req"), |_| {
                Err::<Bytes, _>(std::io::Error::other("refused"))
            })
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Upstream(_)));
        assert_eq!(err.to_string(), "upstream call failed: refused");
        assert!(shared.lock().has_pending());
    }

    #[test]
    fn concurrent_exchanges_stay_paired() {
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedRecorder::new(recorder_in(&dir));

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for round in 0..10 {
                        let request = Bytes::from(format!("{worker}:{round}"));
                        shared
                            .exchange(request, |rq| {
                                let mut reply = b"re ".to_vec();
                                reply.extend_from_slice(&rq);
                                Ok::<_, std::convert::Infallible>(Bytes::from(reply))
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        drop(shared);

        let mut sequences = BTreeSet::new();
        for entry in LogReader::open(dir.path().join("hook.log"), RawPayload).unwrap() {
            let entry = entry.unwrap().valid().unwrap();
            assert_eq!(entry.record_type, RecordType::Transaction);
            let (rq, rp) = entry.payload.pair().unwrap();
            assert_eq!(&rp[3..], &rq[..]);
            sequences.insert(entry.sequence.unwrap());
        }
        assert_eq!(sequences, (1..=40).collect());
    }
}
