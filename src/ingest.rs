//! Ingestion loop: reads lines from the serial link into the series store.
//!
//! The loop runs on its own thread and owns the link exclusively. Each read
//! is bounded by the link's read timeout, so a stop request is observed
//! within one timeout even when the device is silent. Dropping the link at
//! thread exit closes the port; [`Ingestion::stop`] joins the thread, so it
//! returns only once the port is closed.

use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::ConnectionError;
use crate::events::{EventController, EventKind, PlotterEvent};
use crate::parser::LineParser;
use crate::serial::{ConnectionConfig, Connector, SerialLink};
use crate::store::{now_secs, SeriesStore};

/// Lines longer than this without a newline are discarded.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Upper bound on the pause after a non-timeout read error.
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// What the reader thread needs besides the link.
#[derive(Clone)]
pub struct IngestContext {
    pub parser: LineParser,
    pub store: SeriesStore,
    pub events: Option<EventController>,
    pub read_timeout: Duration,
}

/// Handle to a running reader thread.
pub struct Ingestion {
    port: String,
    stop: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Ingestion {
    /// Open `config` through `connector` and start reading.
    ///
    /// Nothing is spawned when the port cannot be opened.
    pub fn start(
        connector: &dyn Connector,
        config: &ConnectionConfig,
        ctx: IngestContext,
    ) -> Result<Self, ConnectionError> {
        let link = connector.open(config, ctx.read_timeout)?;
        Self::spawn(link, config.port.clone(), ctx)
    }

    /// Start reading from an already opened link.
    pub fn spawn(link: SerialLink, port: String, ctx: IngestContext) -> Result<Self, ConnectionError> {
        let stop = Arc::new(AtomicBool::new(false));
        let reader = Reader {
            link: BufReader::new(link),
            line: Vec::with_capacity(256),
            skip_to_newline: false,
            port: port.clone(),
            stop: stop.clone(),
            ctx,
        };
        let handle = std::thread::Builder::new()
            .name(format!("serial-reader {port}"))
            .spawn(move || reader.run())
            .map_err(ConnectionError::Spawn)?;
        Ok(Self {
            port,
            stop,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    /// `false` once the thread has exited, whether stopped or not.
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Ask the reader to exit without waiting for it.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Ask the reader to exit and wait until it has closed the port.
    ///
    /// Safe to call from any thread and more than once. The wait is bounded
    /// by the read timeout.
    pub fn stop(&self) -> Result<(), ConnectionError> {
        self.request_stop();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match handle {
            Some(h) => h.join().map_err(|_| ConnectionError::ReaderPanicked),
            None => Ok(()),
        }
    }
}

impl Drop for Ingestion {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::error!(port = %self.port, error = %e, "serial reader did not shut down cleanly");
        }
    }
}

/// Why the read loop ended.
enum Exit {
    Stopped,
    LinkClosed(String),
}

struct Reader {
    link: BufReader<SerialLink>,
    /// Bytes of the current line, kept across timeouts.
    line: Vec<u8>,
    skip_to_newline: bool,
    port: String,
    stop: Arc<AtomicBool>,
    ctx: IngestContext,
}

impl Reader {
    fn run(mut self) {
        tracing::debug!(port = %self.port, "serial reader started");
        match self.read_loop() {
            Exit::Stopped => tracing::debug!(port = %self.port, "serial reader stopped"),
            Exit::LinkClosed(reason) => {
                tracing::error!(port = %self.port, %reason, "serial connection lost");
                if let Some(events) = &self.ctx.events {
                    let mut evt = PlotterEvent::new(EventKind::DISCONNECTED | EventKind::ERROR);
                    evt.message = Some(format!("Connection to {} lost: {reason}", self.port));
                    events.emit(evt);
                }
            }
        }
        // `self.link` drops here, closing the port before `stop()` returns.
    }

    fn read_loop(&mut self) -> Exit {
        loop {
            if self.stop.load(Ordering::Acquire) {
                return Exit::Stopped;
            }
            if self.line.len() > MAX_LINE_BYTES {
                tracing::warn!(port = %self.port, bytes = self.line.len(), "discarding overlong line");
                self.line.clear();
                self.skip_to_newline = true;
            }
            // Never buffer more than one byte past the limit, so a device
            // that never sends a newline cannot grow the buffer.
            let room = (MAX_LINE_BYTES + 1 - self.line.len()) as u64;
            match (&mut self.link).take(room).read_until(b'\n', &mut self.line) {
                Ok(0) => {
                    if !self.line.is_empty() {
                        self.commit_line();
                    }
                    return Exit::LinkClosed("end of stream".into());
                }
                Ok(_) => {
                    if self.line.ends_with(b"\n") {
                        self.commit_line();
                    }
                }
                Err(e) => match e.kind() {
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted => {}
                    ErrorKind::BrokenPipe
                    | ErrorKind::NotConnected
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::ConnectionReset
                    | ErrorKind::UnexpectedEof => return Exit::LinkClosed(e.to_string()),
                    _ => {
                        tracing::warn!(port = %self.port, error = %e, "serial read error");
                        std::thread::sleep(self.ctx.read_timeout.min(ERROR_BACKOFF));
                    }
                },
            }
        }
    }

    fn commit_line(&mut self) {
        if self.skip_to_newline {
            // Tail of a line that was already discarded.
            self.skip_to_newline = false;
            self.line.clear();
            return;
        }
        let bytes = std::mem::take(&mut self.line);
        ingest_line(&bytes, &self.ctx.parser, &self.ctx.store);
        // Reuse the allocation for the next line.
        self.line = bytes;
        self.line.clear();
    }
}

/// Decode, parse and record one raw line. Returns the number of pairs parsed.
///
/// A line that is not valid UTF-8 is dropped as a whole.
pub fn ingest_line(raw: &[u8], parser: &LineParser, store: &SeriesStore) -> usize {
    let text = match std::str::from_utf8(raw) {
        Ok(t) => t.trim_end_matches(['\n', '\r']),
        Err(e) => {
            tracing::debug!(error = %e, len = raw.len(), "discarding non-UTF-8 line");
            return 0;
        }
    };
    let samples = parser.parse(text);
    if samples.is_empty() {
        tracing::trace!(line = text, "no samples in line");
    }
    for s in &samples {
        store.record(&s.label, s.value, now_secs());
    }
    samples.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    use std::time::Instant;

    use crate::events::EventFilter;
    use crate::parser::Grammar;

    /// Replays scripted reads; once exhausted it either reports end of
    /// stream or keeps timing out like an idle port.
    struct ScriptedLink {
        steps: VecDeque<io::Result<Vec<u8>>>,
        idle_forever: bool,
        timeout: Duration,
    }

    impl Read for ScriptedLink {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.steps.pop_front() {
                Some(Ok(mut bytes)) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    if n < bytes.len() {
                        self.steps.push_front(Ok(bytes.split_off(n)));
                    }
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None if self.idle_forever => {
                    std::thread::sleep(self.timeout);
                    Err(io::Error::new(ErrorKind::TimedOut, "timed out"))
                }
                None => Ok(0),
            }
        }
    }

    fn link(steps: Vec<io::Result<Vec<u8>>>, idle_forever: bool) -> SerialLink {
        Box::new(ScriptedLink {
            steps: steps.into(),
            idle_forever,
            timeout: Duration::from_millis(20),
        })
    }

    fn ctx(store: &SeriesStore, events: Option<EventController>) -> IngestContext {
        IngestContext {
            parser: LineParser::new(Grammar::Tagged),
            store: store.clone(),
            events,
            read_timeout: Duration::from_millis(20),
        }
    }

    fn timeout() -> io::Result<Vec<u8>> {
        Err(io::Error::new(ErrorKind::TimedOut, "timed out"))
    }

    #[test]
    fn ingest_line_records_all_tags() {
        let store = SeriesStore::default();
        let n = ingest_line(b">temp: 21.5 >hum: 60\r\n", &LineParser::default(), &store);
        assert_eq!(n, 2);
        assert_eq!(store.all_labels(), vec!["temp", "hum"]);
    }

    #[test]
    fn ingest_line_drops_invalid_utf8() {
        let store = SeriesStore::default();
        let n = ingest_line(b">temp: 1 \xff\xfe\n", &LineParser::default(), &store);
        assert_eq!(n, 0);
        assert!(store.is_empty());
    }

    #[test]
    fn lines_split_across_timeouts_are_reassembled() {
        let store = SeriesStore::default();
        let steps = vec![
            Ok(b">te".to_vec()),
            timeout(),
            Ok(b"mp: 4".to_vec()),
            timeout(),
            Ok(b"2\ngarbage\n>temp: 43\n".to_vec()),
        ];
        let ingestion = Ingestion::spawn(link(steps, false), "fake".into(), ctx(&store, None))
            .expect("spawn");
        // End of stream ends the loop on its own.
        ingestion.stop().expect("stop");

        let snap = store.snapshot("temp").expect("series");
        let values: Vec<f64> = snap.samples.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![42.0, 43.0]);
    }

    #[test]
    fn transient_errors_do_not_stop_the_loop() {
        let store = SeriesStore::default();
        let steps = vec![
            Ok(b">a: 1\n".to_vec()),
            Err(io::Error::new(ErrorKind::Other, "framing error")),
            Ok(b">a: 2\n".to_vec()),
        ];
        let ingestion = Ingestion::spawn(link(steps, false), "fake".into(), ctx(&store, None))
            .expect("spawn");
        ingestion.stop().expect("stop");
        assert_eq!(store.snapshot("a").map(|s| s.samples.len()), Some(2));
    }

    #[test]
    fn unexpected_end_emits_disconnect_error() {
        let store = SeriesStore::default();
        let events = EventController::new();
        let rx = events.subscribe(EventFilter::only(EventKind::DISCONNECTED));
        let steps = vec![Ok(b">a: 1\n".to_vec()), Err(io::Error::new(ErrorKind::BrokenPipe, "gone"))];
        let ingestion = Ingestion::spawn(link(steps, false), "fake".into(), ctx(&store, Some(events)))
            .expect("spawn");
        ingestion.stop().expect("stop");

        let evt = rx.try_recv().expect("disconnect event");
        assert!(evt.kinds.contains(EventKind::ERROR));
        assert!(evt.message.expect("message").contains("fake"));
        assert!(!ingestion.is_running());
    }

    #[test]
    fn stop_is_bounded_by_read_timeout() {
        let store = SeriesStore::default();
        let ingestion = Ingestion::spawn(link(vec![], true), "idle".into(), ctx(&store, None))
            .expect("spawn");
        assert!(ingestion.is_running());

        let started = Instant::now();
        ingestion.stop().expect("stop");
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!ingestion.is_running());
        // Second stop is a no-op.
        ingestion.stop().expect("stop again");
    }

    #[test]
    fn stop_from_another_thread() {
        let store = SeriesStore::default();
        let ingestion = Arc::new(
            Ingestion::spawn(link(vec![], true), "idle".into(), ctx(&store, None)).expect("spawn"),
        );
        let remote = ingestion.clone();
        std::thread::spawn(move || remote.stop())
            .join()
            .expect("join")
            .expect("stop");
        assert!(!ingestion.is_running());
    }

    #[test]
    fn overlong_line_is_discarded() {
        let store = SeriesStore::default();
        let mut junk = vec![b'x'; MAX_LINE_BYTES + 10];
        junk.extend_from_slice(b">a: 5\n>b: 6\n");
        let ingestion = Ingestion::spawn(link(vec![Ok(junk)], false), "fake".into(), ctx(&store, None))
            .expect("spawn");
        ingestion.stop().expect("stop");
        assert_eq!(store.all_labels(), vec!["b"]);
    }
}
