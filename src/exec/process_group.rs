/// Process group ownership for spawned commands
use crate::config::types::{GradeError, Result};
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;

/// Make the calling process the leader of a new session and process group.
///
/// Runs in the child between fork and exec, so it only issues the syscall.
pub fn enter_new_session() -> std::io::Result<()> {
    nix::unistd::setsid()
        .map(|_| ())
        .map_err(std::io::Error::from)
}

/// SIGKILL every member of process group `pgid`.
///
/// Returns `false` when the group no longer has members.
pub fn kill_group(pgid: Pid) -> Result<bool> {
    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(e) => Err(GradeError::Process(format!(
            "Failed to kill process group {}: {}",
            pgid, e
        ))),
    }
}

/// Whether `pid` names a live process. Zombies count as gone.
pub fn process_is_running(pid: i32) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) else {
        return false;
    };
    // The command name is parenthesised and may itself contain ')'
    let state = stat
        .rfind(')')
        .and_then(|end| stat[end + 1..].split_whitespace().next());
    !matches!(state, None | Some("Z") | Some("X"))
}
