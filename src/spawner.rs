//! Singleton Spawner (C8): ensures at most one broker runs on this host,
//! even when multiple tool-server processes race to start one.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use nix::fcntl::{Flock, FlockArg};
use nix::sys::signal::kill;
use nix::unistd::Pid;
use thiserror::Error;

use crate::config::{Config, DISCOVERY_IDENTIFIER};

#[derive(Debug, Clone)]
pub struct SpawnerPaths {
    pub lock_file: PathBuf,
    pub pid_file: PathBuf,
    pub stdout_log: PathBuf,
    pub stderr_log: PathBuf,
}

impl SpawnerPaths {
    pub fn new() -> Self {
        Self::under(&std::env::temp_dir())
    }

    pub fn under(dir: &std::path::Path) -> Self {
        Self {
            lock_file: dir.join("console-bridge-broker.lock"),
            pid_file: dir.join("console-bridge-broker.pid"),
            stdout_log: dir.join("console-bridge-broker.stdout.log"),
            stderr_log: dir.join("console-bridge-broker.stderr.log"),
        }
    }
}

impl Default for SpawnerPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum SpawnerError {
    #[error("timed out acquiring the broker startup lock")]
    LockTimeout,
    #[error("failed to spawn broker process: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("broker did not become ready within the readiness timeout")]
    ReadinessTimeout,
}

/// Run the full protocol from spec §4.7: probe, lock, re-probe, spawn, poll.
/// Returns the running broker's `serverId`.
pub async fn ensure_running(config: &Config, paths: &SpawnerPaths) -> Result<String, SpawnerError> {
    if let Some(server_id) = probe(config, Duration::from_secs(1)).await {
        return Ok(server_id);
    }

    let lock_timeout = config.lock_timeout;
    let paths_owned = paths.clone();
    let lock = tokio::task::spawn_blocking(move || acquire_lock(&paths_owned, lock_timeout))
        .await
        .expect("lock acquisition task panicked")?;

    // Someone may have won the race and started a broker between our first
    // probe and acquiring the lock.
    if let Some(server_id) = probe(config, Duration::from_secs(1)).await {
        drop(lock);
        return Ok(server_id);
    }

    spawn_detached(paths)?;

    // Hold the lock through the readiness poll (spec §4.7 step 5: "poll
    // /discover ... release the lock") so a concurrent caller can't
    // re-acquire it mid-startup and spawn a second broker racing for the
    // same ports and log files.
    let deadline = Instant::now() + config.readiness_timeout;
    loop {
        if let Some(server_id) = probe(config, Duration::from_millis(500)).await {
            drop(lock);
            return Ok(server_id);
        }
        if Instant::now() >= deadline {
            drop(lock);
            return Err(SpawnerError::ReadinessTimeout);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

async fn probe(config: &Config, timeout: Duration) -> Option<String> {
    let client = reqwest::Client::builder().timeout(timeout).build().ok()?;
    let resp = client.get(config.discover_url()).send().await.ok()?;
    let body: serde_json::Value = resp.json().await.ok()?;
    if body.get("identifier")?.as_str()? != DISCOVERY_IDENTIFIER {
        return None;
    }
    body.get("serverId")?.as_str().map(str::to_string)
}

/// Acquire the exclusive lock, reclaiming it if the holder's PID is dead.
/// Blocking: must run off the async executor (see `spawn_blocking` above).
fn acquire_lock(paths: &SpawnerPaths, timeout: Duration) -> Result<Flock<File>, SpawnerError> {
    let deadline = Instant::now() + timeout;
    loop {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&paths.lock_file)
            .map_err(SpawnerError::Spawn)?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(mut locked) => {
                let _ = locked.set_len(0);
                let _ = locked.write_all(std::process::id().to_string().as_bytes());
                let _ = locked.flush();
                return Ok(locked);
            }
            Err((_file, _errno)) => {
                if let Some(pid) = read_lock_holder(paths) {
                    if !process_alive(pid) {
                        let _ = fs::remove_file(&paths.lock_file);
                        continue;
                    }
                }
                if Instant::now() >= deadline {
                    return Err(SpawnerError::LockTimeout);
                }
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }
}

fn read_lock_holder(paths: &SpawnerPaths) -> Option<i32> {
    let mut buf = String::new();
    File::open(&paths.lock_file).ok()?.read_to_string(&mut buf).ok()?;
    buf.trim().parse().ok()
}

fn process_alive(pid: i32) -> bool {
    kill(Pid::from_raw(pid), None).is_ok()
}

/// Start the broker binary (expected alongside this one) fully detached:
/// new session, redirected stdio, PID file owned by the child itself.
fn spawn_detached(paths: &SpawnerPaths) -> Result<(), SpawnerError> {
    let exe = std::env::current_exe()?;
    let broker_exe = exe.with_file_name("console-bridge-broker");

    let stdout = File::create(&paths.stdout_log)?;
    let stderr = File::create(&paths.stderr_log)?;

    let mut cmd = std::process::Command::new(broker_exe);
    cmd.env("CONSOLE_BRIDGE_PID_FILE", &paths.pid_file)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));

    // Safety: `setsid` is async-signal-safe and this closure does nothing
    // else between fork and exec.
    unsafe {
        cmd.pre_exec(|| {
            nix::unistd::setsid().map_err(|_| std::io::Error::last_os_error())?;
            Ok(())
        });
    }

    cmd.spawn()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        assert!(process_alive(std::process::id() as i32));
    }

    #[test]
    fn implausible_pid_is_not_alive() {
        assert!(!process_alive(i32::MAX));
    }

    #[test]
    fn lock_round_trips_holder_pid() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SpawnerPaths::under(dir.path());
        let lock = acquire_lock(&paths, Duration::from_secs(1)).unwrap();
        assert_eq!(read_lock_holder(&paths), Some(std::process::id() as i32));
        drop(lock);
    }

    #[test]
    fn second_exclusive_lock_on_same_file_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contend.lock");

        let first = OpenOptions::new().create(true).write(true).open(&path).unwrap();
        let _held = Flock::lock(first, FlockArg::LockExclusiveNonblock).unwrap();

        let second = OpenOptions::new().create(true).write(true).open(&path).unwrap();
        assert!(Flock::lock(second, FlockArg::LockExclusiveNonblock).is_err());
    }
}
