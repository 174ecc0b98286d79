use crate::config::types::{GradeError, Result};
use crate::exec::output::{OutputCollector, DEFAULT_STREAM_LIMIT};
use crate::exec::process_group::{enter_new_session, kill_group};
use nix::unistd::Pid;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Upper bound on the completion poll interval
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Result of one bounded command run. Only produced after the process and
/// its group are gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedRun {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, absent when the shell was killed by a signal
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    /// The time limit expired and the process group was killed
    pub timed_out: bool,
    pub wall_time: Duration,
    /// Both output streams reached end-of-file
    pub output_complete: bool,
    /// Output past the capture limit was discarded
    pub output_truncated: bool,
}

impl TimedRun {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Runs shell command lines in their own process group under a time limit
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    shell: PathBuf,
    poll_interval: Duration,
    drain_grace: Duration,
    output_limit: usize,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            shell: PathBuf::from("/bin/sh"),
            poll_interval: Duration::from_millis(100),
            drain_grace: Duration::from_secs(2),
            output_limit: DEFAULT_STREAM_LIMIT,
        }
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completion poll interval, clamped to (0, 1s]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.clamp(Duration::from_millis(1), MAX_POLL_INTERVAL);
        self
    }

    /// How long to keep reading output after the process group is gone
    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    /// Per-stream capture limit in bytes
    pub fn with_output_limit(mut self, limit: usize) -> Self {
        self.output_limit = limit;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Run `command_line` through the shell in `workdir`.
    ///
    /// The shell leads a new process group. If `timeout` expires the whole
    /// group is killed and the result is marked `timed_out`; after a normal
    /// exit the group is swept as well, so nothing the command started in
    /// the background survives the call.
    pub fn run(&self, command_line: &str, workdir: &Path, timeout: Duration) -> Result<TimedRun> {
        if timeout.is_zero() {
            return Err(GradeError::Config(format!(
                "Timeout for '{}' must be positive",
                command_line
            )));
        }

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command_line)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        unsafe {
            cmd.pre_exec(enter_new_session);
        }

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|e| {
            GradeError::Process(format!(
                "Failed to spawn {} for '{}' in {}: {}",
                self.shell.display(),
                command_line,
                workdir.display(),
                e
            ))
        })?;
        let pgid = Pid::from_raw(child.id() as i32);
        log::debug!("started '{}' as pgid {}", command_line, pgid);

        let collector =
            OutputCollector::start(child.stdout.take(), child.stderr.take(), self.output_limit);

        let (status, timed_out) = loop {
            if let Some(status) = child.try_wait()? {
                break (status, false);
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                log::debug!("'{}' exceeded {:?}; killing group {}", command_line, timeout, pgid);
                kill_group(pgid)?;
                break (child.wait()?, true);
            }
            thread::sleep(self.poll_interval.min(timeout - elapsed));
        };

        // Descendants left in the group must not outlive the run
        if kill_group(pgid)? {
            log::debug!("swept leftover members of group {}", pgid);
        }
        let wall_time = start.elapsed();

        let output = collector.finish(self.drain_grace);
        if !output.complete {
            log::warn!(
                "'{}' left output streams open; returning partial output",
                command_line
            );
        }

        Ok(TimedRun {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: status.code(),
            signal: status.signal(),
            timed_out,
            wall_time,
            output_complete: output.complete,
            output_truncated: output.truncated,
        })
    }
}
