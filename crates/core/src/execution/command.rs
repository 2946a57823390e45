//! Command execution utilities
//!
//! This module provides the [`CommandRunner`] seam used by every pipeline stage and
//! dispatcher action, plus [`ShellRunner`], which runs a shell line locally or on a
//! remote host over ssh while echoing its output to the operator console.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use colored::*;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::types::LaunchResult;

/// Process exit code; `0` is success, anything else is failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitStatus(i32);

impl ExitStatus {
    pub const SUCCESS: ExitStatus = ExitStatus(0);

    pub fn from_code(code: i32) -> Self {
        Self(code)
    }

    pub fn code(self) -> i32 {
        self.0
    }

    pub fn success(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A shell line to run, optionally in a directory and/or on a remote host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub line: String,
    pub current_dir: Option<PathBuf>,
    pub host: Option<String>,
}

impl CommandSpec {
    pub fn shell(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            current_dir: None,
            host: None,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn on_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// The line handed to the shell. Remote commands carry their working
    /// directory as a `cd` prefix since ssh has no notion of one.
    pub fn shell_line(&self) -> String {
        match (&self.host, &self.current_dir) {
            (Some(_), Some(dir)) => format!(
                "cd {} && {}",
                shell_quote(&dir.to_string_lossy()),
                self.line
            ),
            _ => self.line.clone(),
        }
    }

    /// The line as the operator sees it on the console
    pub fn display_line(&self) -> String {
        match &self.host {
            Some(host) => format!("ssh {} {}", host, self.shell_line()),
            None => self.line.clone(),
        }
    }
}

/// Everything a finished command produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn from_status(status: ExitStatus) -> Self {
        Self {
            status,
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// Runs one command to completion and reports exactly one exit status.
/// Implementations never retry.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &CommandSpec) -> LaunchResult<CommandOutput>;
}

#[derive(Debug, Clone, Copy)]
enum OutputStream {
    Stdout,
    Stderr,
}

/// Runs commands through `sh -c` locally, or through `ssh <host>` remotely
#[derive(Debug, Default, Clone)]
pub struct ShellRunner {
    quiet: bool,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A runner that captures output without echoing it
    pub fn quiet() -> Self {
        Self { quiet: true }
    }

    fn build(&self, command: &CommandSpec) -> Command {
        let mut process = match &command.host {
            Some(host) => {
                let mut process = Command::new("ssh");
                process
                    .args(["-o", "BatchMode=yes"])
                    .arg(host)
                    .arg(command.shell_line());
                process
            }
            None => {
                let mut process = Command::new("sh");
                process.arg("-c").arg(&command.line);
                if let Some(dir) = &command.current_dir {
                    process.current_dir(dir);
                }
                process
            }
        };
        process
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        process
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &CommandSpec) -> LaunchResult<CommandOutput> {
        if !self.quiet {
            println!("\n  {}", format!("$ {}", command.display_line()).blue());
        }

        let mut child = self.build(command).spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("stderr was not captured"))?;

        let (status, stdout, stderr) = tokio::join!(
            child.wait(),
            pump(stdout, OutputStream::Stdout, self.quiet),
            pump(stderr, OutputStream::Stderr, self.quiet),
        );

        let status = ExitStatus::from_code(status?.code().unwrap_or(-1));
        debug!(command = %command.display_line(), code = status.code(), "command finished");

        Ok(CommandOutput {
            status,
            stdout: stdout?,
            stderr: stderr?,
        })
    }
}

async fn pump<R>(reader: R, stream: OutputStream, quiet: bool) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut chunk = Vec::new();
    let mut captured = String::new();

    // Output is decoded lossily; bytes that are not UTF-8 never fail the command
    while reader.read_until(b'\n', &mut chunk).await? > 0 {
        let text = String::from_utf8_lossy(&chunk);
        let line = text.trim_end_matches(['\n', '\r']);
        if !quiet {
            match stream {
                OutputStream::Stdout => println!("    {}", line.bright_black()),
                OutputStream::Stderr => println!("    {}", line.red()),
            }
        }
        captured.push_str(line);
        captured.push('\n');
        chunk.clear();
    }

    Ok(captured)
}

/// Quote a value for a POSIX shell. Plain words pass through untouched.
pub fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@+,%".contains(c));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "'\\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_command_captures_stdout() {
        let output = ShellRunner::quiet()
            .run(&CommandSpec::shell("echo hello"))
            .await
            .unwrap();

        assert!(output.status.success());
        assert_eq!(output.stdout, "hello\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit_code_is_reported() {
        let output = ShellRunner::quiet()
            .run(&CommandSpec::shell("echo oops >&2; exit 3"))
            .await
            .unwrap();

        assert_eq!(output.status.code(), 3);
        assert!(!output.status.success());
        assert_eq!(output.stderr, "oops\n");
    }

    #[tokio::test]
    async fn test_non_utf8_output_does_not_fail_command() {
        let output = ShellRunner::quiet()
            .run(&CommandSpec::shell("printf 'caf\\351\\n'; printf 'x\\377' >&2; exit 0"))
            .await
            .unwrap();

        assert!(output.status.success());
        assert_eq!(output.stdout, "caf\u{FFFD}\n");
        assert_eq!(output.stderr, "x\u{FFFD}\n");
    }

    #[tokio::test]
    async fn test_command_runs_in_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("marker.txt"), "x").unwrap();

        let output = ShellRunner::quiet()
            .run(&CommandSpec::shell("ls").in_dir(temp_dir.path()))
            .await
            .unwrap();

        assert!(output.stdout.contains("marker.txt"));
    }

    #[test]
    fn test_remote_line_carries_directory() {
        let command = CommandSpec::shell("jake install")
            .in_dir("/srv/app")
            .on_host("deploy@web1");

        assert_eq!(command.shell_line(), "cd /srv/app && jake install");
        assert_eq!(
            command.display_line(),
            "ssh deploy@web1 cd /srv/app && jake install"
        );
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/srv/node/app.4b6f"), "/srv/node/app.4b6f");
        assert_eq!(shell_quote("my dir"), "'my dir'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote("a;rm -rf /"), "'a;rm -rf /'");
        assert_eq!(shell_quote(""), "''");
    }
}
