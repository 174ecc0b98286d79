use crate::exec::TimedRun;
use regex::Regex;
use std::sync::OnceLock;

/// Marker a verifier prints once per passing problem
pub const CORRECT_MARKER: &str = r"Problem \d+ is correct\.";

fn correct_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(CORRECT_MARKER).expect("marker pattern is valid"))
}

/// Count non-overlapping success markers. Repeats count every time.
pub fn count_correct(output: &str) -> u32 {
    correct_marker().find_iter(output).count() as u32
}

/// A compile command failed if it did not exit cleanly or if either stream
/// mentions `error` (case-sensitive, so `Error` and `warning` do not count).
pub fn compile_failed(run: &TimedRun) -> bool {
    !run.success() || run.stdout.contains("error") || run.stderr.contains("error")
}
