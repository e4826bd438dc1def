use crate::config::ProbeConfig;
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use regex::Regex;
use std::process::{ExitStatus, Stdio};
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;

/// Arguments tried against an executable to make it print its version.
pub const VERSION_FLAGS: [&str; 3] = ["version", "-version", "--version"];

/// How long output is still collected after the child has exited.
const OUTPUT_DRAIN: Duration = Duration::from_millis(100);

static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+(?:\.\d+)?").expect("valid version regex"));

/// First dotted version number in `text`, e.g. `3.11` out of `python3.11`.
pub fn regex_version(text: &str) -> Option<String> {
    VERSION_PATTERN.find(text).map(|m| m.as_str().to_string())
}

#[derive(Debug, Error)]
enum ProbeError {
    #[error("failed to launch: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed while waiting: {0}")]
    Wait(#[source] std::io::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("exited with {0}")]
    Failed(ExitStatus),
    #[error("no version number in output")]
    NoMatch,
}

pub struct ProbeOutput {
    pub status: ExitStatus,
    /// stdout followed by stderr.
    pub text: String,
}

pub struct VersionProber {
    timeout: Duration,
    kill_grace: Duration,
}

impl VersionProber {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            timeout: config.timeout(),
            kill_grace: config.kill_grace(),
        }
    }

    /// Runs every version flag concurrently and returns the version from
    /// whichever successful run finishes first. Failures fold into `None`.
    pub async fn probe_version(&self, executable: &str) -> Option<String> {
        let mut probes: FuturesUnordered<_> = VERSION_FLAGS
            .iter()
            .map(|flag| async move { (*flag, self.probe_one(executable, flag).await) })
            .collect();

        while let Some((flag, result)) = probes.next().await {
            match result {
                Ok(version) => {
                    info!("{} {}: version {}", executable, flag, version);
                    return Some(version);
                }
                Err(e) => debug!("{} {}: {}", executable, flag, e),
            }
        }
        None
    }

    async fn probe_one(&self, executable: &str, flag: &str) -> Result<String, ProbeError> {
        let output = self.run(executable, &[flag]).await?;
        debug!("{} {} output: {}", executable, flag, output.text.trim());
        if !output.status.success() {
            return Err(ProbeError::Failed(output.status));
        }
        regex_version(&output.text).ok_or(ProbeError::NoMatch)
    }

    /// Runs `program args...` with captured output, bounded by the probe timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<ProbeOutput, ProbeError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ProbeError::Spawn)?;

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let mut out = Vec::new();
        let mut err = Vec::new();

        let finished = {
            let mut drained = false;
            let reading = async {
                tokio::join!(
                    read_into(stdout.as_mut(), &mut out),
                    read_into(stderr.as_mut(), &mut err)
                );
            };
            tokio::pin!(reading);

            // Only the child itself is bounded by the probe timeout.
            let finished = timeout(self.timeout, async {
                tokio::select! {
                    status = child.wait() => status,
                    _ = &mut reading => {
                        drained = true;
                        child.wait().await
                    }
                }
            })
            .await;

            // A background process may hold the pipes open after the child exits.
            if !drained && matches!(finished, Ok(Ok(_))) {
                let _ = timeout(OUTPUT_DRAIN, &mut reading).await;
            }
            finished
        };

        match finished {
            Ok(Ok(status)) => {
                let mut text = String::from_utf8_lossy(&out).into_owned();
                text.push_str(&String::from_utf8_lossy(&err));
                Ok(ProbeOutput { status, text })
            }
            Ok(Err(e)) => Err(ProbeError::Wait(e)),
            Err(_) => {
                self.terminate(&mut child).await;
                Err(ProbeError::Timeout(self.timeout))
            }
        }
    }

    /// SIGTERM, then SIGKILL if the child outlives the grace period.
    async fn terminate(&self, child: &mut Child) {
        if let Some(id) = child.id() {
            let _ = signal::kill(Pid::from_raw(id as i32), Signal::SIGTERM);
            if timeout(self.kill_grace, child.wait()).await.is_ok() {
                return;
            }
        }
        let _ = child.kill().await;
    }
}

/// Appends everything read from `pipe` to `buf`. Bytes already read stay in
/// `buf` if the future is dropped.
async fn read_into<R: AsyncRead + Unpin>(pipe: Option<&mut R>, buf: &mut Vec<u8>) {
    let Some(pipe) = pipe else { return };
    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

/// Serializes tests that write executables and spawn processes, so a fork
/// never inherits a script still open for writing.
#[cfg(test)]
pub(crate) static PROCESS_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

#[cfg(test)]
pub(crate) fn write_script(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn prober(timeout_ms: u64) -> VersionProber {
        VersionProber::new(&ProbeConfig {
            timeout_ms,
            kill_grace_ms: 200,
        })
    }

    #[test]
    fn regex_picks_first_dotted_number() {
        assert_eq!(regex_version("foo version 1.2.3 (build 4.5)"), Some("1.2.3".into()));
        assert_eq!(regex_version("python3.11"), Some("3.11".into()));
        assert_eq!(regex_version("v10.0.22631.1"), Some("10.0.22631".into()));
        assert_eq!(regex_version("no numbers 42 here"), None);
    }

    #[tokio::test]
    async fn missing_executable_has_no_version() {
        let _guard = PROCESS_LOCK.lock().await;
        let version = prober(2000)
            .probe_version("/nonexistent/desktop-gen-missing-target")
            .await;
        assert_eq!(version, None);
    }

    #[tokio::test]
    async fn only_successful_runs_count() {
        let _guard = PROCESS_LOCK.lock().await;
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            "tool",
            r#"if [ "$1" = "--version" ]; then echo "tool 4.5.6"; exit 0; fi
echo "unknown option 9.9" >&2
exit 2"#,
        );

        let version = prober(2000).probe_version(script.to_str().unwrap()).await;
        assert_eq!(version, Some("4.5.6".into()));
    }

    #[tokio::test]
    async fn version_on_stderr_is_found() {
        let _guard = PROCESS_LOCK.lock().await;
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            "java-like",
            r#"if [ "$1" = "-version" ]; then echo 'openjdk version "21.0.2"' >&2; exit 0; fi
exit 1"#,
        );

        let version = prober(2000).probe_version(script.to_str().unwrap()).await;
        assert_eq!(version, Some("21.0.2".into()));
    }

    #[tokio::test]
    async fn silent_success_has_no_version() {
        let _guard = PROCESS_LOCK.lock().await;
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "quiet", "echo hello");

        let version = prober(2000).probe_version(script.to_str().unwrap()).await;
        assert_eq!(version, None);
    }

    #[tokio::test]
    async fn hanging_child_is_cut_off() {
        let _guard = PROCESS_LOCK.lock().await;
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "hang", "exec sleep 30");

        let started = Instant::now();
        let version = prober(300).probe_version(script.to_str().unwrap()).await;
        assert_eq!(version, None);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn term_ignoring_child_is_killed() {
        let _guard = PROCESS_LOCK.lock().await;
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            "stubborn",
            "trap '' TERM\nwhile true; do sleep 0.1; done",
        );

        let started = Instant::now();
        let version = prober(300).probe_version(script.to_str().unwrap()).await;
        assert_eq!(version, None);
        // timeout plus the full grace period, so SIGTERM alone did not end it
        assert!(started.elapsed() >= Duration::from_millis(450));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn background_process_holding_stdout_does_not_hide_version() {
        let _guard = PROCESS_LOCK.lock().await;
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            "spawner",
            "echo \"spawner 1.2.3\"\nsleep 5 &\nexit 0",
        );

        let started = Instant::now();
        let version = prober(1000).probe_version(script.to_str().unwrap()).await;
        assert_eq!(version, Some("1.2.3".into()));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn first_to_finish_wins() {
        let _guard = PROCESS_LOCK.lock().await;
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            "racer",
            r#"case "$1" in
  version) sleep 1; echo "1.0.0" ;;
  -version) sleep 1; echo "2.0.0" ;;
  --version) echo "3.0.0" ;;
esac
exit 0"#,
        );

        let version = prober(5000).probe_version(script.to_str().unwrap()).await;
        assert_eq!(version, Some("3.0.0".into()));
    }
}
