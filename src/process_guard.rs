//! Interrupt handling for spawned tools
//!
//! Downloads and environment solves can run for minutes. Each curl, micromamba
//! or pip child runs as the leader of its own process group, so a Ctrl+C at the
//! terminal reaches it only through the installer.
//!
//! On SIGINT, SIGTERM or SIGHUP the handler thread records the signal, stops
//! every tracked group (SIGTERM, then SIGKILL after a grace period) and leaves
//! the exit to the main thread: the runner sees [`interrupted`] and reports
//! `InstallerError::Interrupted`, which the binary turns into `128 + signal`.
//! When no tool is running the handler exits with that code itself.

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

/// How long stopped tools get to exit before they are killed.
const STOP_GRACE: Duration = Duration::from_secs(3);

/// Signal number received by the installer, or 0.
static INTERRUPTED: AtomicI32 = AtomicI32::new(0);

static RUNNING: OnceLock<Mutex<ChildGroups>> = OnceLock::new();

/// The signal that interrupted the installer, if any.
pub fn interrupted() -> Option<i32> {
    match INTERRUPTED.load(Ordering::SeqCst) {
        0 => None,
        sig => Some(sig),
    }
}

/// Shell convention for a process ended by `signal`.
pub fn exit_status_for(signal: i32) -> i32 {
    128 + signal
}

/// Process groups of the tools currently running.
#[derive(Debug, Default)]
pub struct ChildGroups {
    leaders: HashSet<u32>,
    stopping: bool,
}

impl ChildGroups {
    /// Groups started by [`SystemRunner`](crate::runner::SystemRunner).
    pub fn global() -> &'static Mutex<ChildGroups> {
        RUNNING.get_or_init(|| Mutex::new(ChildGroups::default()))
    }

    /// Track a freshly spawned group leader.
    ///
    /// A group started after shutdown began is stopped right away.
    pub fn track(&mut self, pid: u32) {
        if self.stopping {
            tracing::debug!("Shutdown in progress, stopping PID {} immediately", pid);
            signal_groups(&[pid], Signal::SIGTERM);
            return;
        }
        self.leaders.insert(pid);
        tracing::debug!("Tracking process group {}", pid);
    }

    pub fn release(&mut self, pid: u32) {
        self.leaders.remove(&pid);
    }

    pub fn len(&self) -> usize {
        self.leaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaders.is_empty()
    }

    /// Stop every tracked group: SIGTERM, wait up to `grace`, then SIGKILL.
    /// Only the first call does anything.
    pub fn stop_all(&mut self, grace: Duration) {
        if std::mem::replace(&mut self.stopping, true) {
            return;
        }
        let leaders: Vec<u32> = self.leaders.drain().collect();
        if leaders.is_empty() {
            return;
        }

        tracing::info!("Stopping {} running tool(s)", leaders.len());
        signal_groups(&leaders, Signal::SIGTERM);

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline && leaders.iter().any(|&pid| is_running(pid)) {
            std::thread::sleep(Duration::from_millis(50));
        }

        let stubborn: Vec<u32> = leaders.into_iter().filter(|&pid| is_running(pid)).collect();
        if !stubborn.is_empty() {
            tracing::warn!("Killing process group(s) {:?} after {:?}", stubborn, grace);
            signal_groups(&stubborn, Signal::SIGKILL);
        }
    }
}

/// Signal whole groups so grandchildren (pip under `micromamba run`) are
/// reached too. Falls back to the leader alone if the group is gone.
fn signal_groups(leaders: &[u32], sig: Signal) {
    for &pid in leaders {
        let pid = Pid::from_raw(pid as i32);
        if let Err(e) = signal::killpg(pid, sig) {
            tracing::debug!("killpg({}, {}) failed: {}", pid, sig, e);
            let _ = signal::kill(pid, sig);
        }
    }
}

/// Alive and not a zombie.
fn is_running(pid: u32) -> bool {
    if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }
    // Field 3 of /proc/<pid>/stat is the state
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => !matches!(stat.split_whitespace().nth(2), Some("Z" | "X")),
        Err(_) => true,
    }
}

/// Install the SIGINT/SIGTERM/SIGHUP handler. Call once at program start.
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    std::thread::spawn(move || {
        let Some(sig) = signals.forever().next() else {
            return;
        };
        INTERRUPTED.store(sig, Ordering::SeqCst);
        tracing::warn!("Received signal {}, stopping", sig);

        let idle = match ChildGroups::global().lock() {
            Ok(mut groups) => {
                let idle = groups.is_empty();
                groups.stop_all(STOP_GRACE);
                idle
            }
            Err(_) => true,
        };

        // A running tool's runner reports the interruption; this exit is the
        // fallback if the main thread never gets there.
        if !idle {
            std::thread::sleep(STOP_GRACE);
        }
        std::process::exit(exit_status_for(sig));
    });

    Ok(())
}

/// Extension trait for std::process::Command to set up process groups
pub trait CommandProcessGroup {
    /// Run the command as leader of its own process group
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        // SAFETY: the closure only calls async-signal-safe syscalls.
        unsafe {
            self.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(std::io::Error::other)?;

                // Child dies with the installer on Linux
                #[cfg(target_os = "linux")]
                {
                    if nix::libc::prctl(nix::libc::PR_SET_PDEATHSIG, nix::libc::SIGTERM) == -1 {
                        return Err(std::io::Error::last_os_error());
                    }
                }

                Ok(())
            });
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn spawn_sleeper() -> std::process::Child {
        Command::new("sh")
            .args(["-c", "sleep 60"])
            .in_new_process_group()
            .spawn()
            .expect("Failed to spawn sleep process")
    }

    #[test]
    fn test_track_and_release() {
        let mut groups = ChildGroups::default();
        groups.track(1234);
        groups.track(5678);
        assert_eq!(groups.len(), 2);

        groups.release(1234);
        groups.release(5678);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_stop_all_ends_the_group() {
        let mut child = spawn_sleeper();
        let mut groups = ChildGroups::default();
        groups.track(child.id());

        groups.stop_all(Duration::from_millis(500));

        let status = child.wait().unwrap();
        assert!(!status.success());
        assert!(groups.is_empty());
    }

    #[test]
    fn test_group_started_during_shutdown_is_stopped() {
        let mut groups = ChildGroups::default();
        groups.stop_all(Duration::from_millis(10));

        let mut child = spawn_sleeper();
        groups.track(child.id());

        assert!(groups.is_empty());
        assert!(!child.wait().unwrap().success());
    }

    #[test]
    fn test_stop_all_runs_once() {
        let mut groups = ChildGroups::default();
        groups.stop_all(Duration::from_millis(10));
        assert!(groups.stopping);

        groups.track(999_999);
        groups.stop_all(Duration::from_millis(10));
        assert!(groups.is_empty());
    }

    #[test]
    fn test_exit_status_follows_shell_convention() {
        assert_eq!(exit_status_for(2), 130);
        assert_eq!(exit_status_for(15), 143);
    }

    #[test]
    fn test_is_running_nonexistent() {
        assert!(!is_running(999_999));
    }
}
