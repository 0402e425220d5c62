// ABOUTME: ArtifactBuilder: runs an external image-build CLI against a context.
// ABOUTME: The digest comes from the --iidfile the tool writes, never from its log.

use super::context::BuildContext;
use super::error::{BuildError, BuildStage};
use super::Builder;
use crate::types::{ArtifactReference, Digest};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// Lines of combined output kept for diagnostics.
pub const LOG_TAIL_LINES: usize = 40;

/// Builds images with a docker-compatible CLI (`docker`, `podman`, `buildah bud`).
#[derive(Debug, Clone)]
pub struct ArtifactBuilder {
    tool: PathBuf,
    subcommand: Vec<String>,
    timeout: Duration,
}

impl ArtifactBuilder {
    pub fn new(tool: impl Into<PathBuf>) -> Self {
        let tool = tool.into();
        let subcommand = match tool.file_name().and_then(|n| n.to_str()) {
            Some("buildah") => vec!["bud".to_string()],
            _ => vec!["build".to_string()],
        };
        Self {
            tool,
            subcommand,
            timeout: Duration::from_secs(30 * 60),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, context: &BuildContext, target: &str, iidfile: &std::path::Path) -> Command {
        let mut cmd = Command::new(&self.tool);
        cmd.args(&self.subcommand)
            .arg("--file")
            .arg(context.recipe_path())
            .arg("--tag")
            .arg(target)
            .arg("--iidfile")
            .arg(iidfile);
        for (key, value) in context.build_args() {
            cmd.arg("--build-arg").arg(format!("{}={}", key, value));
        }
        cmd.arg(context.root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Bounded ring of the most recent output lines.
#[derive(Default)]
struct LogTail {
    lines: Mutex<VecDeque<String>>,
}

impl LogTail {
    fn push(&self, line: String) {
        let mut lines = self.lines.lock();
        if lines.len() == LOG_TAIL_LINES {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    fn snapshot(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }
}

async fn drain(reader: impl AsyncRead + Unpin, tail: &LogTail) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(target: "hoist::build::log", "{}", line);
        tail.push(line);
    }
}

fn iidfile_path() -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("hoist-iid-{}-{}", std::process::id(), n))
}

/// Removes the iidfile however the build ends.
struct TempFile(PathBuf);

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[async_trait]
impl Builder for ArtifactBuilder {
    async fn build(&self, context: BuildContext) -> Result<ArtifactReference, BuildError> {
        context.check()?;
        let target = context.target()?;
        let iidfile = TempFile(iidfile_path());

        tracing::info!(tool = %self.tool.display(), image = %target, "build started");

        let mut child = self
            .command(&context, &target.to_string(), &iidfile.0)
            .spawn()
            .map_err(|e| {
                BuildError::prepare(format!("cannot run {}: {}", self.tool.display(), e))
            })?;

        let tail = LogTail::default();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let run = async {
            let out = async {
                if let Some(s) = stdout {
                    drain(s, &tail).await;
                }
            };
            let err = async {
                if let Some(s) = stderr {
                    drain(s, &tail).await;
                }
            };
            tokio::join!(out, err);
            child.wait().await
        };

        let status = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(BuildError {
                    stage: BuildStage::Build,
                    exit_code: None,
                    message: format!("waiting for {} failed: {}", self.tool.display(), e),
                    log_tail: tail.snapshot(),
                });
            }
            Err(_) => {
                return Err(BuildError {
                    stage: BuildStage::Build,
                    exit_code: None,
                    message: format!("timed out after {:?}", self.timeout),
                    log_tail: tail.snapshot(),
                });
            }
        };

        if !status.success() {
            return Err(BuildError {
                stage: BuildStage::Build,
                exit_code: status.code(),
                message: format!("{} exited unsuccessfully", self.tool.display()),
                log_tail: tail.snapshot(),
            });
        }

        let raw = tokio::fs::read_to_string(&iidfile.0).await.map_err(|e| {
            BuildError::digest(format!("image id file unreadable: {}", e), tail.snapshot())
        })?;
        let digest = Digest::parse(&raw)
            .map_err(|e| BuildError::digest(e.to_string(), tail.snapshot()))?;

        tracing::info!(image = %target, %digest, "build finished");
        Ok(ArtifactReference::new(context.image(), context.tag(), digest))
    }
}
