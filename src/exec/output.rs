/// Bounded stdout/stderr capture for child processes.
///
/// Each stream is drained by its own thread for as long as the pipe stays
/// open, so a child never blocks on a full pipe. Bytes past the per-stream
/// limit are read and discarded. Collection waits at most a grace period
/// after the process terminates; a stream still held open by an escaped
/// descendant is returned as captured so far and flagged incomplete.
use std::io::Read;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Default per-stream capture limit
pub const DEFAULT_STREAM_LIMIT: usize = 8 * 1024 * 1024;

#[derive(Debug, Default)]
struct StreamBuffer {
    bytes: Vec<u8>,
    truncated: bool,
}

/// Output captured from one process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Both streams reached end-of-file within the grace period
    pub complete: bool,
    /// At least one stream exceeded the capture limit
    pub truncated: bool,
}

/// Reader threads for a child's stdout and stderr
pub struct OutputCollector {
    stdout: Arc<Mutex<StreamBuffer>>,
    stderr: Arc<Mutex<StreamBuffer>>,
    pending: usize,
    done_rx: Receiver<()>,
}

impl OutputCollector {
    /// Start draining both streams; a `None` stream counts as already closed
    pub fn start<O, E>(stdout: Option<O>, stderr: Option<E>, limit: usize) -> Self
    where
        O: Read + Send + 'static,
        E: Read + Send + 'static,
    {
        let (done_tx, done_rx) = channel();
        let stdout_buf = Arc::new(Mutex::new(StreamBuffer::default()));
        let stderr_buf = Arc::new(Mutex::new(StreamBuffer::default()));

        let mut pending = 0;
        if let Some(stream) = stdout {
            spawn_reader(stream, limit, Arc::clone(&stdout_buf), done_tx.clone());
            pending += 1;
        }
        if let Some(stream) = stderr {
            spawn_reader(stream, limit, Arc::clone(&stderr_buf), done_tx);
            pending += 1;
        }

        Self {
            stdout: stdout_buf,
            stderr: stderr_buf,
            pending,
            done_rx,
        }
    }

    /// Wait up to `grace` for both readers, then take what was captured
    pub fn finish(self, grace: Duration) -> CapturedOutput {
        let deadline = Instant::now() + grace;
        let mut finished = 0;

        while finished < self.pending {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.done_rx.recv_timeout(remaining) {
                Ok(()) => finished += 1,
                Err(RecvTimeoutError::Timeout) => {
                    log::warn!(
                        "output collection gave up after {:?} with {} stream(s) still open",
                        grace,
                        self.pending - finished
                    );
                    break;
                }
                // A reader thread panicked; treat its stream as closed
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let (stdout, stdout_truncated) = take_buffer(&self.stdout);
        let (stderr, stderr_truncated) = take_buffer(&self.stderr);
        CapturedOutput {
            stdout,
            stderr,
            complete: finished == self.pending,
            truncated: stdout_truncated || stderr_truncated,
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    stream: R,
    limit: usize,
    buffer: Arc<Mutex<StreamBuffer>>,
    done: Sender<()>,
) {
    // Not reclaimed if a descendant that left the group keeps the pipe open
    thread::spawn(move || {
        drain_stream(stream, limit, &buffer);
        let _ = done.send(());
    });
}

fn drain_stream<R: Read>(mut stream: R, limit: usize, buffer: &Mutex<StreamBuffer>) {
    let mut chunk = [0u8; 8192];
    loop {
        let n = match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::debug!("output stream closed with error: {}", e);
                break;
            }
        };

        let Ok(mut buf) = buffer.lock() else { break };
        let room = limit.saturating_sub(buf.bytes.len());
        if n > room {
            buf.truncated = true;
        }
        let keep = n.min(room);
        buf.bytes.extend_from_slice(&chunk[..keep]);
    }
}

fn take_buffer(buffer: &Mutex<StreamBuffer>) -> (Vec<u8>, bool) {
    match buffer.lock() {
        Ok(mut buf) => (std::mem::take(&mut buf.bytes), buf.truncated),
        Err(poisoned) => {
            let buf = poisoned.into_inner();
            (buf.bytes.clone(), buf.truncated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// A reader that never reaches end-of-file
    struct Endless;

    impl Read for Endless {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            thread::sleep(Duration::from_secs(3600));
            Ok(0)
        }
    }

    #[test]
    fn test_collects_both_streams() {
        let collector = OutputCollector::start(
            Some(Cursor::new(b"out".to_vec())),
            Some(Cursor::new(b"err".to_vec())),
            1024,
        );
        let output = collector.finish(Duration::from_secs(5));
        assert_eq!(output.stdout, b"out");
        assert_eq!(output.stderr, b"err");
        assert!(output.complete);
        assert!(!output.truncated);
    }

    #[test]
    fn test_limit_discards_excess() {
        let collector = OutputCollector::start(
            Some(Cursor::new(vec![b'x'; 10_000])),
            None::<Cursor<Vec<u8>>>,
            100,
        );
        let output = collector.finish(Duration::from_secs(5));
        assert_eq!(output.stdout.len(), 100);
        assert!(output.stderr.is_empty());
        assert!(output.complete);
        assert!(output.truncated);
    }

    #[test]
    fn test_open_stream_is_incomplete_after_grace() {
        let collector = OutputCollector::start(
            Some(Cursor::new(b"partial".to_vec())),
            Some(Endless),
            1024,
        );
        let started = Instant::now();
        let output = collector.finish(Duration::from_millis(200));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(output.stdout, b"partial");
        assert!(!output.complete);
    }

    #[test]
    fn test_no_streams() {
        let output = OutputCollector::start(None::<Cursor<Vec<u8>>>, None::<Cursor<Vec<u8>>>, 16)
            .finish(Duration::from_millis(10));
        assert!(output.complete);
        assert!(output.stdout.is_empty());
    }
}
