use std::ffi::OsString;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;

const TRUNCATION_MARKER: &str = "\n[output truncated]";
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Bounds applied to one supervised child process
#[derive(Debug, Clone)]
pub struct ExecLimits {
    pub timeout: Duration,
    pub kill_grace: Duration,
    pub max_output_bytes: usize,
}

/// How a supervised child ended. Exactly one of these is produced per spawn.
#[derive(Debug)]
pub enum ExecOutcome {
    Exited {
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
    TimedOut,
}

/// Runs `command` to completion or until `limits.timeout` elapses
///
/// The child gets a null stdin, a cleared environment (plus `env`) and its own
/// process group. Child exit and the deadline race inside a single `select!`,
/// so only one of them decides the outcome. On deadline the whole group gets
/// SIGTERM, then SIGKILL once the grace period is over.
///
/// The group leader is only reaped after the group has been signalled, so the
/// group id cannot have been recycled by then. Output still open past
/// `timeout + kill_grace` (a descendant that left the group) counts as a
/// timeout.
pub async fn supervise(
    command: &[String],
    cwd: &Path,
    env: &[(String, OsString)],
    limits: &ExecLimits,
) -> Result<ExecOutcome> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| anyhow!("Empty command"))?;

    let mut std_cmd = std::process::Command::new(program);
    std_cmd
        .args(args)
        .current_dir(cwd)
        .env_clear()
        .envs(env.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);
    let mut cmd = Command::from(std_cmd);
    cmd.kill_on_drop(true);

    let deadline = Instant::now() + limits.timeout;
    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn {program}"))?;
    let pgid = child
        .id()
        .and_then(|pid| libc::pid_t::try_from(pid).ok())
        .ok_or_else(|| anyhow!("Spawned {program} has no pid"))?;
    let mut group = GroupGuard::new(pgid);

    let stdout = child
        .stdout
        .take()
        .map(|pipe| tokio::spawn(read_capped(pipe, limits.max_output_bytes)));
    let stderr = child
        .stderr
        .take()
        .map(|pipe| tokio::spawn(read_capped(pipe, limits.max_output_bytes)));
    let readers: Vec<AbortHandle> = [&stdout, &stderr]
        .into_iter()
        .flatten()
        .map(|handle| handle.abort_handle())
        .collect();

    let exited = tokio::select! {
        res = wait_for_exit(pgid) => {
            res.context("Failed to wait for child")?;
            true
        }
        _ = tokio::time::sleep_until(deadline) => false,
    };

    if !exited {
        log::debug!("{program} exceeded {:?}, terminating", limits.timeout);
        signal_group(pgid, libc::SIGTERM);
        let _ = tokio::time::timeout(limits.kill_grace, wait_for_exit(pgid)).await;
    }

    // Leader is still unreaped here, alive or zombie
    signal_group(pgid, libc::SIGKILL);
    group.disarm();
    let status = child.wait().await.context("Failed to reap child")?;

    if !exited {
        abort_all(&readers);
        return Ok(ExecOutcome::TimedOut);
    }

    let collected = tokio::time::timeout_at(deadline + limits.kill_grace, async {
        Ok::<_, anyhow::Error>((collect(stdout).await?, collect(stderr).await?))
    })
    .await;

    match collected {
        Ok(res) => {
            let (stdout, stderr) = res?;
            Ok(ExecOutcome::Exited {
                status,
                stdout,
                stderr,
            })
        }
        Err(_) => {
            log::debug!("{program} left output open past its deadline");
            abort_all(&readers);
            Ok(ExecOutcome::TimedOut)
        }
    }
}

/// Sends SIGKILL to the group if the supervising future is dropped early
struct GroupGuard {
    pgid: libc::pid_t,
    armed: bool,
}

impl GroupGuard {
    fn new(pgid: libc::pid_t) -> Self {
        Self { pgid, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if self.armed {
            signal_group(self.pgid, libc::SIGKILL);
        }
    }
}

/// Resolves once `pid` has exited, without reaping it
async fn wait_for_exit(pid: libc::pid_t) -> std::io::Result<()> {
    let mut sigchld = signal(SignalKind::child())?;
    loop {
        if exited_unreaped(pid)? {
            return Ok(());
        }
        // SIGCHLD deliveries coalesce, so poll as well
        tokio::select! {
            _ = sigchld.recv() => {}
            _ = tokio::time::sleep(EXIT_POLL_INTERVAL) => {}
        }
    }
}

fn exited_unreaped(pid: libc::pid_t) -> std::io::Result<bool> {
    // SAFETY: siginfo_t is plain old data; waitid only writes into it.
    let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
    // SAFETY: `info` is a valid, writable siginfo_t; WNOWAIT leaves the child
    // waitable so tokio still reaps it.
    let rc = unsafe {
        libc::waitid(
            libc::P_PID,
            pid as libc::id_t,
            &mut info,
            libc::WEXITED | libc::WNOHANG | libc::WNOWAIT,
        )
    };
    if rc == -1 {
        return Err(std::io::Error::last_os_error());
    }
    // SAFETY: waitid filled the structure for a child-state change, or left it zeroed.
    Ok(unsafe { info.si_pid() } != 0)
}

fn signal_group(pgid: libc::pid_t, signal: libc::c_int) {
    // SAFETY: kill(2) has no memory-safety preconditions; a negative pid
    // addresses the process group created for this child.
    unsafe {
        libc::kill(-pgid, signal);
    }
}

fn abort_all(readers: &[AbortHandle]) {
    for reader in readers {
        reader.abort();
    }
}

/// Reads at most `limit` bytes, then keeps draining so the writer never blocks
async fn read_capped<R: AsyncRead + Unpin>(
    mut reader: R,
    limit: usize,
) -> std::io::Result<(Vec<u8>, bool)> {
    let mut buf = Vec::new();
    (&mut reader)
        .take(limit as u64 + 1)
        .read_to_end(&mut buf)
        .await?;
    let truncated = buf.len() > limit;
    buf.truncate(limit);
    tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
    Ok((buf, truncated))
}

async fn collect(reader: Option<JoinHandle<std::io::Result<(Vec<u8>, bool)>>>) -> Result<String> {
    let Some(reader) = reader else {
        return Ok(String::new());
    };
    let (bytes, truncated) = reader.await.context("Output reader panicked")??;
    let mut text = String::from_utf8_lossy(&bytes).into_owned();
    if truncated {
        text.push_str(TRUNCATION_MARKER);
    }
    Ok(text)
}
