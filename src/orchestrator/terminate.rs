//! Graceful-then-forceful shutdown of a child process.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;
use tracing::{debug, warn};

/// How a stopped child actually went away.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Termination {
    pub status: ExitStatus,
    pub forced: bool,
}

/// Ask the child to exit, wait up to `grace`, then kill it.
///
/// The bounded wait races `child.wait()` against a timer; when the timer wins the wait
/// future is dropped before the kill is sent, so only the final reap produces a status.
/// `on_escalate` runs once, right before the forceful kill.
pub(crate) async fn terminate(
    child: &mut Child,
    grace: Duration,
    on_escalate: impl FnOnce(),
) -> io::Result<Termination> {
    if let Some(status) = child.try_wait()? {
        return Ok(Termination {
            status,
            forced: false,
        });
    }

    let pid = child.id();
    request_graceful(child)?;
    debug!(?pid, grace_ms = grace.as_millis() as u64, "sent graceful termination");

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => Ok(Termination {
            status: status?,
            forced: false,
        }),
        Err(_elapsed) => {
            warn!(?pid, "child ignored graceful termination, killing");
            on_escalate();
            if let Err(err) = child.start_kill() {
                // Exited between the deadline and the kill.
                if child.try_wait()?.is_none() {
                    return Err(err);
                }
            }
            let status = child.wait().await?;
            Ok(Termination {
                status,
                forced: true,
            })
        }
    }
}

#[cfg(unix)]
fn request_graceful(child: &mut Child) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return Ok(());
    };
    let pid = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

// No cooperative signal to send; the grace wait then only covers the kill itself.
#[cfg(not(unix))]
fn request_graceful(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}
