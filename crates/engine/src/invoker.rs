//! Child process invocation of extensions.
//!
//! An extension prints its manifest when run without arguments and handles
//! a command when given a payload, either as its single argument or on
//! stdin. Children run in the extension's directory with `LUMEN=1` set.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use lumen_types::{CommandMode, Payload, PayloadTransport};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::codec::{encode_payload, page_from_value};
use crate::error::{Result, RuntimeError};

/// Environment variable set for every child process.
pub const HOST_ENV: &str = "LUMEN";

/// Raw result of a finished child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
    /// `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl InvocationOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Converts a non-zero exit into [`RuntimeError::ExtensionExit`].
    pub fn into_result(self, command: &str) -> Result<Vec<u8>> {
        if self.success() {
            return Ok(self.stdout);
        }
        Err(RuntimeError::ExtensionExit {
            command: command.to_string(),
            code: self.exit_code,
            stderr: self.stderr,
        })
    }
}

/// One prepared child process.
struct Spawn<'a> {
    program: &'a OsStr,
    args: Vec<&'a OsStr>,
    cwd: &'a Path,
    stdin: Option<Vec<u8>>,
    operation: &'a str,
}

#[derive(Debug)]
pub struct ExtensionInvoker {
    timeout: Duration,
    /// Conventions learned by probing, per extension path.
    transports: Mutex<HashMap<PathBuf, PayloadTransport>>,
}

impl ExtensionInvoker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            transports: Mutex::new(HashMap::new()),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Convention remembered for `entrypoint`, if one was learned.
    pub fn learned_transport(&self, entrypoint: &Path) -> Option<PayloadTransport> {
        self.transports.lock().expect("transport lock poisoned").get(entrypoint).copied()
    }

    fn remember_transport(&self, entrypoint: &Path, transport: PayloadTransport) {
        self.transports
            .lock()
            .expect("transport lock poisoned")
            .insert(entrypoint.to_path_buf(), transport);
    }

    /// Runs the extension without arguments.
    pub async fn query_manifest(&self, entrypoint: &Path, cancel: &CancellationToken) -> Result<InvocationOutput> {
        debug!(extension = %entrypoint.display(), "querying manifest");
        self.spawn(
            Spawn {
                program: entrypoint.as_os_str(),
                args: Vec::new(),
                cwd: extension_dir(entrypoint),
                stdin: None,
                operation: "manifest query",
            },
            cancel,
        )
        .await
    }

    /// Runs one command and returns its stdout.
    ///
    /// `declared` is the convention configured or declared in the manifest.
    /// Without one, a page-mode command that fails with empty stdout under the
    /// argument convention is retried once on stdin. Stdin is only adopted
    /// when the retry prints a page; an extension that ignores stdin answers
    /// the argument-less retry with its manifest, and then the original
    /// failure is reported and nothing is learned.
    pub async fn invoke(
        &self,
        entrypoint: &Path,
        mode: CommandMode,
        payload: &Payload,
        declared: Option<PayloadTransport>,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        if mode == CommandMode::Tty {
            self.run_tty(entrypoint, payload).await?;
            return Ok(Vec::new());
        }

        let known = declared.or_else(|| self.learned_transport(entrypoint));
        let transport = known.unwrap_or_default();
        let output = self.invoke_with(entrypoint, payload, transport, cancel).await?;

        if known.is_none() && mode.is_page_mode() {
            if output.success() {
                self.remember_transport(entrypoint, PayloadTransport::Argument);
            } else if output.stdout.iter().all(u8::is_ascii_whitespace) {
                debug!(extension = %entrypoint.display(), command = %payload.command, "retrying with payload on stdin");
                let retry = self.invoke_with(entrypoint, payload, PayloadTransport::Stdin, cancel).await?;
                if retry.success() && prints_page(&retry.stdout) {
                    self.remember_transport(entrypoint, PayloadTransport::Stdin);
                    return Ok(retry.stdout);
                }
                debug!(extension = %entrypoint.display(), command = %payload.command, "stdin retry printed no page; keeping first failure");
            }
        }

        let stdout = output.into_result(&payload.command)?;
        if mode.is_page_mode() { Ok(stdout) } else { Ok(Vec::new()) }
    }

    async fn invoke_with(
        &self,
        entrypoint: &Path,
        payload: &Payload,
        transport: PayloadTransport,
        cancel: &CancellationToken,
    ) -> Result<InvocationOutput> {
        let encoded = encode_payload(payload)?;
        debug!(
            extension = %entrypoint.display(),
            command = %payload.command,
            ?transport,
            payload_bytes = encoded.len(),
            "invoking extension"
        );

        let (args, stdin) = match transport {
            PayloadTransport::Argument => (vec![OsStr::new(encoded.as_str())], None),
            PayloadTransport::Stdin => (Vec::new(), Some(encoded.clone().into_bytes())),
        };
        self.spawn(
            Spawn {
                program: entrypoint.as_os_str(),
                args,
                cwd: extension_dir(entrypoint),
                stdin,
                operation: &payload.command,
            },
            cancel,
        )
        .await
    }

    /// Runs a literal shell command line through `sh -c`.
    pub async fn run_shell(&self, command_line: &str, cwd: &Path, cancel: &CancellationToken) -> Result<Vec<u8>> {
        debug!(cwd = %cwd.display(), "running shell command");
        let output = self
            .spawn(
                Spawn {
                    program: OsStr::new("sh"),
                    args: vec![OsStr::new("-c"), OsStr::new(command_line)],
                    cwd,
                    stdin: None,
                    operation: command_line,
                },
                cancel,
            )
            .await?;
        output.into_result(command_line)
    }

    /// Hands the terminal to the extension and waits for it to exit. Not
    /// bounded by the timeout.
    pub async fn run_tty(&self, entrypoint: &Path, payload: &Payload) -> Result<()> {
        let encoded = encode_payload(payload)?;
        debug!(extension = %entrypoint.display(), command = %payload.command, "running tty command");
        let status = Command::new(entrypoint)
            .arg(encoded)
            .current_dir(extension_dir(entrypoint))
            .env(HOST_ENV, "1")
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| RuntimeError::Io {
                program: entrypoint.display().to_string(),
                source,
            })?;

        if status.success() {
            return Ok(());
        }
        Err(RuntimeError::ExtensionExit {
            command: payload.command.clone(),
            code: status.code(),
            stderr: String::new(),
        })
    }

    async fn spawn(&self, spawn: Spawn<'_>, cancel: &CancellationToken) -> Result<InvocationOutput> {
        let mut command = Command::new(spawn.program);
        command
            .args(&spawn.args)
            .current_dir(spawn.cwd)
            .env(HOST_ENV, "1")
            .stdin(if spawn.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let program = Path::new(spawn.program).display().to_string();
        let mut child = command.spawn().map_err(|source| RuntimeError::Io {
            program: program.clone(),
            source,
        })?;

        if let Some(input) = spawn.stdin
            && let Some(mut stdin) = child.stdin.take()
        {
            tokio::spawn(async move {
                if let Err(error) = stdin.write_all(&input).await {
                    debug!(%error, "child closed stdin early");
                }
            });
        }

        let output = tokio::select! {
            output = child.wait_with_output() => output.map_err(|source| RuntimeError::Io { program, source })?,
            _ = tokio::time::sleep(self.timeout) => {
                warn!(operation = spawn.operation, timeout_ms = self.timeout.as_millis() as u64, "invocation timed out; child killed");
                return Err(RuntimeError::timeout(spawn.operation, self.timeout.as_millis() as u64));
            }
            _ = cancel.cancelled() => {
                debug!(operation = spawn.operation, "invocation cancelled; child killed");
                return Err(RuntimeError::cancelled(spawn.operation));
            }
        };

        let result = InvocationOutput {
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        };
        debug!(
            operation = spawn.operation,
            exit_code = ?result.exit_code,
            stdout_bytes = result.stdout.len(),
            stderr_bytes = result.stderr.len(),
            "child exited"
        );
        Ok(result)
    }
}

/// Whether a stdin retry produced a page rather than a manifest or noise.
fn prints_page(stdout: &[u8]) -> bool {
    let Ok(Value::Object(document)) = serde_json::from_slice::<Value>(stdout) else {
        return false;
    };
    if document.contains_key("commands") || document.contains_key("root") {
        return false;
    }
    page_from_value(Value::Object(document)).is_ok()
}

/// Directory children run in.
fn extension_dir(entrypoint: &Path) -> &Path {
    match entrypoint.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn invoker() -> ExtensionInvoker {
        ExtensionInvoker::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn argument_transport_passes_payload_as_first_argument() {
        let dir = tempfile::tempdir().unwrap();
        let extension = script(dir.path(), "echo.sh", r#"printf '%s' "$1""#);
        let payload = Payload::new("show").with_cwd("/work");

        let stdout = invoker()
            .invoke(&extension, CommandMode::Detail, &payload, Some(PayloadTransport::Argument), &CancellationToken::new())
            .await
            .expect("invoke");
        let echoed: Payload = serde_json::from_slice(&stdout).expect("payload echoed back");
        assert_eq!(echoed, payload);
    }

    #[tokio::test]
    async fn stdin_transport_writes_payload_to_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let extension = script(dir.path(), "cat.sh", "cat");
        let payload = Payload::new("show");

        let stdout = invoker()
            .invoke(&extension, CommandMode::Detail, &payload, Some(PayloadTransport::Stdin), &CancellationToken::new())
            .await
            .expect("invoke");
        assert_eq!(serde_json::from_slice::<Payload>(&stdout).unwrap(), payload);
    }

    #[tokio::test]
    async fn children_run_in_extension_dir_with_host_variable() {
        let dir = tempfile::tempdir().unwrap();
        let extension = script(dir.path(), "env.sh", r#"printf '%s:%s' "$LUMEN" "$(pwd)""#);
        let output = invoker()
            .query_manifest(&extension, &CancellationToken::new())
            .await
            .expect("run");
        let text = String::from_utf8(output.stdout).unwrap();
        let expected_dir = dir.path().canonicalize().unwrap();
        assert_eq!(text, format!("1:{}", expected_dir.display()));
    }

    #[tokio::test]
    async fn argument_failure_falls_back_to_stdin_and_remembers_it() {
        let dir = tempfile::tempdir().unwrap();
        let extension = script(
            dir.path(),
            "stdin_only.sh",
            r#"if [ $# -gt 0 ]; then echo "unexpected argument" >&2; exit 2; fi
payload=$(cat)
case "$payload" in
  *'"command":"list"'*) echo '{"items": [{"title": "from stdin"}]}' ;;
  *) echo '{"title": "Stdin", "commands": [{"name": "list", "mode": "list"}]}' ;;
esac"#,
        );
        let invoker = invoker();

        let stdout = invoker
            .invoke(&extension, CommandMode::List, &Payload::new("list"), None, &CancellationToken::new())
            .await
            .expect("retry succeeds via stdin");
        assert!(String::from_utf8(stdout).unwrap().contains("from stdin"));
        assert_eq!(invoker.learned_transport(&extension), Some(PayloadTransport::Stdin));
    }

    #[tokio::test]
    async fn failing_argument_extension_keeps_its_error_and_learns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let extension = script(
            dir.path(),
            "files.sh",
            r#"if [ $# -eq 0 ]; then echo '{"title": "Files", "commands": [{"name": "ls", "mode": "list"}]}'; exit 0; fi
echo "disk full" >&2
exit 1"#,
        );
        let invoker = invoker();

        for _ in 0..2 {
            let error = invoker
                .invoke(&extension, CommandMode::List, &Payload::new("ls"), None, &CancellationToken::new())
                .await
                .expect_err("ls fails");
            assert!(matches!(error, RuntimeError::ExtensionExit { code: Some(1), .. }));
            assert_eq!(error.to_string(), "disk full");
            assert_eq!(invoker.learned_transport(&extension), None);
        }
    }

    #[test]
    fn only_pages_count_as_stdin_output() {
        assert!(prints_page(br#"{"items": []}"#));
        assert!(prints_page(br#"{"type": "detail", "text": "hi"}"#));
        assert!(!prints_page(br#"{"title": "Files", "commands": []}"#));
        assert!(!prints_page(br#"{"title": "Files", "root": [{"command": "ls"}]}"#));
        assert!(!prints_page(b"usage: files <payload>"));
        assert!(!prints_page(b""));
    }

    #[tokio::test]
    async fn page_mode_failure_surfaces_stderr_regardless_of_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let extension = script(dir.path(), "fail.sh", r#"echo '{"type":"detail","text":"x"}'; echo "disk full" >&2; exit 1"#);

        let error = invoker()
            .invoke(&extension, CommandMode::Detail, &Payload::new("ls"), None, &CancellationToken::new())
            .await
            .expect_err("non-zero exit");
        assert_eq!(error.to_string(), "disk full");
    }

    #[tokio::test]
    async fn silent_mode_ignores_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let extension = script(dir.path(), "silent.sh", "echo 'not json'");
        let stdout = invoker()
            .invoke(&extension, CommandMode::Silent, &Payload::new("touch"), None, &CancellationToken::new())
            .await
            .expect("silent success");
        assert!(stdout.is_empty());
    }

    #[tokio::test]
    async fn slow_child_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let extension = script(dir.path(), "slow.sh", "sleep 5");
        let invoker = ExtensionInvoker::new(Duration::from_millis(100));

        let error = invoker
            .invoke(&extension, CommandMode::List, &Payload::new("ls"), Some(PayloadTransport::Argument), &CancellationToken::new())
            .await
            .expect_err("timeout");
        assert!(matches!(error, RuntimeError::InvocationTimeout { timeout_ms: 100, .. }));
    }

    #[tokio::test]
    async fn cancelled_invocation_reports_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let extension = script(dir.path(), "slow.sh", "sleep 5");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let error = invoker()
            .invoke(&extension, CommandMode::List, &Payload::new("ls"), Some(PayloadTransport::Argument), &cancel)
            .await
            .expect_err("cancelled");
        assert!(matches!(error, RuntimeError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn shell_commands_run_in_the_given_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();
        let stdout = invoker()
            .run_shell("ls", dir.path(), &CancellationToken::new())
            .await
            .expect("ls");
        assert_eq!(String::from_utf8(stdout).unwrap().trim(), "a.txt");
    }
}
