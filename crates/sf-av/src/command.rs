//! Builder for running external tools, either to completion with a timeout
//! or as a long-lived process in its own process group.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};

/// Default timeout for run-to-completion invocations: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use sf_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> sf_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "quiet", "-print_format", "json", "-show_streams"])
///     .arg("/media/show/episode.mkv")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time for [`ToolCommand::execute`].
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// The arguments collected so far.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Short tool name used in error messages.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    /// Execute the command to completion, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`sf_core::Error::Spawn`] if the process cannot be started.
    /// - [`sf_core::Error::Tool`] if the process times out or exits with a
    ///   non-zero status (message includes stderr).
    pub async fn execute(&self) -> sf_core::Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = self.command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| sf_core::Error::spawn(&program_name, e))?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let tool_output = ToolOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if !output.status.success() {
                    return Err(sf_core::Error::tool(
                        program_name,
                        format!(
                            "exited with status {}: {}",
                            output.status,
                            tool_output.stderr.trim()
                        ),
                    ));
                }

                Ok(tool_output)
            }
            Ok(Err(e)) => Err(sf_core::Error::tool(
                program_name,
                format!("I/O error waiting for process: {e}"),
            )),
            // The dropped future drops the child, and kill_on_drop reaps it.
            Err(_elapsed) => Err(sf_core::Error::tool(
                program_name,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }

    /// Start the command as the leader of a new process group and return
    /// immediately.
    ///
    /// Output goes to `/dev/null`: encoders write their results to files and
    /// a full stderr pipe would stall them. The caller owns the returned
    /// [`Child`] and is responsible for waiting on it.
    pub fn spawn_group_leader(&self) -> sf_core::Result<Child> {
        let mut cmd = self.command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
        #[cfg(unix)]
        cmd.process_group(0);

        cmd.spawn()
            .map_err(|e| sf_core::Error::spawn(self.program_name(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_captures_stdout() {
        let output = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo keyframe"])
            .execute()
            .await
            .unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout.trim(), "keyframe");
    }

    #[tokio::test]
    async fn nonexistent_tool_is_spawn_error() {
        let err = ToolCommand::new(PathBuf::from("nonexistent_tool_xyz_12345"))
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, sf_core::Error::Spawn { .. }), "got {err}");
    }

    #[tokio::test]
    async fn non_zero_exit_includes_stderr() {
        let err = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo broken >&2; exit 3"])
            .execute()
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("broken"), "unexpected error: {msg}");
    }

    #[tokio::test]
    async fn timeout_fires() {
        let err = ToolCommand::new(PathBuf::from("sleep"))
            .arg("10")
            .timeout(Duration::from_millis(100))
            .execute()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"), "unexpected error: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn group_leader_gets_own_process_group() {
        let mut child = ToolCommand::new(PathBuf::from("sleep"))
            .arg("5")
            .spawn_group_leader()
            .unwrap();
        let pid = child.id().unwrap() as i32;
        let pgid = nix::unistd::getpgid(Some(nix::unistd::Pid::from_raw(pid))).unwrap();
        assert_eq!(pgid.as_raw(), pid);
        child.kill().await.unwrap();
    }
}
