//! Collaborators backed by the operating system.

use std::env;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use lumen_engine::{Clipboard, Collaborators, Editor, HttpTransport, Opener, Prompter, Reader};
use lumen_types::{FetchAction, Input, InputKind};
use lumen_util::split_command_line;
use reqwest::Method;
use tracing::debug;

/// Builds the collaborators of an interactive session.
pub fn interactive_collaborators(editor_override: Option<&str>) -> Collaborators {
    Collaborators::unavailable()
        .with_clipboard(Arc::new(SystemClipboard))
        .with_opener(Arc::new(SystemOpener))
        .with_editor(Arc::new(TerminalEditor::new(editor_override)))
        .with_reader(Arc::new(Pager::from_env()))
        .with_http(Arc::new(ReqwestTransport::default()))
        .with_prompter(Arc::new(StdinPrompter))
}

pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn copy(&self, text: &str) -> Result<()> {
        arboard::Clipboard::new()
            .and_then(|mut clipboard| clipboard.set_text(text.to_string()))
            .context("clipboard unavailable")
    }
}

pub struct SystemOpener;

impl Opener for SystemOpener {
    fn open(&self, target: &str, app: Option<&str>) -> Result<()> {
        let mut command = opener_command(target, app)?;
        command.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
        debug!(?app, "opening target");
        command.spawn().with_context(|| format!("failed to open {target}"))?;
        Ok(())
    }
}

fn opener_command(target: &str, app: Option<&str>) -> Result<std::process::Command> {
    if cfg!(target_os = "macos") {
        let mut command = std::process::Command::new("open");
        if let Some(app) = app {
            command.args(["-a", app]);
        }
        command.arg(target);
        return Ok(command);
    }
    if cfg!(target_os = "windows") {
        let mut command = std::process::Command::new("cmd");
        command.args(["/C", "start", ""]);
        if let Some(app) = app {
            command.arg(app);
        }
        command.arg(target);
        return Ok(command);
    }
    if cfg!(unix) {
        let mut command = std::process::Command::new(app.unwrap_or("xdg-open"));
        command.arg(target);
        return Ok(command);
    }
    bail!("opening files is not supported on this platform")
}

/// Runs `$VISUAL`/`$EDITOR` on the terminal.
pub struct TerminalEditor {
    command: String,
}

impl TerminalEditor {
    pub fn new(editor_override: Option<&str>) -> Self {
        let command = editor_override
            .map(str::to_string)
            .or_else(|| env::var("VISUAL").ok())
            .or_else(|| env::var("EDITOR").ok())
            .filter(|command| !command.trim().is_empty())
            .unwrap_or_else(|| "vi".to_string());
        Self { command }
    }
}

#[async_trait]
impl Editor for TerminalEditor {
    async fn edit(&self, path: &Path) -> Result<()> {
        run_on_terminal(&self.command, path).await
    }
}

/// Shows files through `$PAGER`.
pub struct Pager {
    command: String,
}

impl Pager {
    pub fn from_env() -> Self {
        let command = env::var("PAGER")
            .ok()
            .filter(|command| !command.trim().is_empty())
            .unwrap_or_else(|| "less".to_string());
        Self { command }
    }
}

#[async_trait]
impl Reader for Pager {
    async fn read(&self, path: &Path) -> Result<()> {
        run_on_terminal(&self.command, path).await
    }
}

/// Runs a command line such as `code --wait` with `path` appended and the
/// terminal inherited. Quoted words stay together.
async fn run_on_terminal(command_line: &str, path: &Path) -> Result<()> {
    let mut words = split_command_line(command_line).into_iter();
    let program = words.next().ok_or_else(|| anyhow!("empty command"))?;
    let status = tokio::process::Command::new(&program)
        .args(words)
        .arg(path)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .with_context(|| format!("failed to start {program}"))?;
    if !status.success() {
        bail!("{program} exited with {status}");
    }
    Ok(())
}

#[derive(Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    fn build_request(&self, request: &FetchAction) -> Result<reqwest::Request> {
        let method = Method::from_bytes(request.method.to_uppercase().as_bytes())
            .with_context(|| format!("invalid HTTP method {}", request.method))?;
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        builder.build().with_context(|| format!("invalid request to {}", request.url))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn fetch(&self, request: &FetchAction) -> Result<Vec<u8>> {
        let built = self.build_request(request)?;
        let response = self
            .client
            .execute(built)
            .await
            .with_context(|| format!("request to {} failed", request.url))?;
        let status = response.status();
        if !status.is_success() {
            bail!("{} returned {status}", request.url);
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Reads input values line by line from the terminal. Password answers are
/// read in raw mode and never echoed.
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn prompt(&self, input: &Input) -> Result<Option<String>> {
        let mut stderr = io::stderr();
        write!(stderr, "{}", prompt_label(input))?;
        stderr.flush()?;

        let answer = if input.is_secret() && io::stdin().is_terminal() {
            let answer = read_hidden_line()?;
            writeln!(stderr)?;
            answer
        } else {
            read_visible_line()?
        };
        Ok(answer.filter(|answer| !answer.is_empty()))
    }
}

fn read_visible_line() -> Result<Option<String>> {
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Restores cooked mode when dropped, including on early return.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(error) = disable_raw_mode() {
            debug!(%error, "failed to leave raw mode");
        }
    }
}

fn read_hidden_line() -> Result<Option<String>> {
    let _raw = RawModeGuard::enable().context("cannot disable terminal echo")?;
    let mut answer = String::new();
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        match apply_key(&mut answer, key) {
            KeyOutcome::Continue => {}
            KeyOutcome::Submit => return Ok(Some(answer)),
            KeyOutcome::Cancel => return Ok(None),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum KeyOutcome {
    Continue,
    Submit,
    Cancel,
}

fn apply_key(answer: &mut String, key: KeyEvent) -> KeyOutcome {
    if key.kind == KeyEventKind::Release {
        return KeyOutcome::Continue;
    }
    match key.code {
        KeyCode::Enter => KeyOutcome::Submit,
        KeyCode::Esc => KeyOutcome::Cancel,
        KeyCode::Char('c' | 'd') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyOutcome::Cancel,
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            answer.clear();
            KeyOutcome::Continue
        }
        KeyCode::Backspace => {
            answer.pop();
            KeyOutcome::Continue
        }
        KeyCode::Char(c) => {
            answer.push(c);
            KeyOutcome::Continue
        }
        _ => KeyOutcome::Continue,
    }
}

fn prompt_label(input: &Input) -> String {
    let hint = match &input.kind {
        InputKind::Checkbox(_) => " [true/false]".to_string(),
        InputKind::Number(number) => match (number.min, number.max) {
            (Some(min), Some(max)) => format!(" [{min}..{max}]"),
            _ => " [number]".to_string(),
        },
        InputKind::Dropdown(dropdown) if !dropdown.choices.is_empty() => {
            let values: Vec<&str> = dropdown.choices.iter().map(|choice| choice.value.as_str()).collect();
            format!(" [{}]", values.join("/"))
        }
        _ => String::new(),
    };
    format!("{}{hint}: ", input.display_title())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_types::{DropdownChoice, DropdownInput, NumberInput};

    #[test]
    fn editor_prefers_override_then_visual_then_editor() {
        temp_env::with_vars([("VISUAL", Some("nvim")), ("EDITOR", Some("nano"))], || {
            assert_eq!(TerminalEditor::new(Some("code --wait")).command, "code --wait");
            assert_eq!(TerminalEditor::new(None).command, "nvim");
        });
        temp_env::with_vars([("VISUAL", None::<&str>), ("EDITOR", None)], || {
            assert_eq!(TerminalEditor::new(None).command, "vi");
        });
    }

    #[test]
    fn pager_defaults_to_less() {
        temp_env::with_var("PAGER", None::<&str>, || {
            assert_eq!(Pager::from_env().command, "less");
        });
    }

    #[test]
    fn prompt_labels_describe_expected_values() {
        let dropdown = Input {
            name: "env".into(),
            title: "Environment".into(),
            optional: false,
            kind: InputKind::Dropdown(DropdownInput {
                choices: vec![
                    DropdownChoice {
                        title: "Dev".into(),
                        value: "dev".into(),
                    },
                    DropdownChoice {
                        title: "Prod".into(),
                        value: "prod".into(),
                    },
                ],
                ..Default::default()
            }),
        };
        assert_eq!(prompt_label(&dropdown), "Environment [dev/prod]: ");

        let number = Input {
            name: "count".into(),
            title: String::new(),
            optional: false,
            kind: InputKind::Number(NumberInput {
                min: Some(1),
                max: Some(3),
                ..Default::default()
            }),
        };
        assert_eq!(prompt_label(&number), "count [1..3]: ");
    }

    #[test]
    fn password_labels_carry_no_hint() {
        let password = Input {
            name: "token".into(),
            title: "API token".into(),
            optional: false,
            kind: InputKind::Password(Default::default()),
        };
        assert_eq!(prompt_label(&password), "API token: ");
    }

    #[test]
    fn hidden_answers_are_edited_by_key_events() {
        let mut answer = String::new();
        let press = |code| KeyEvent::new(code, KeyModifiers::NONE);

        for c in "s3cret".chars() {
            assert_eq!(apply_key(&mut answer, press(KeyCode::Char(c))), KeyOutcome::Continue);
        }
        assert_eq!(apply_key(&mut answer, press(KeyCode::Backspace)), KeyOutcome::Continue);
        assert_eq!(answer, "s3cre");
        assert_eq!(apply_key(&mut answer, press(KeyCode::Enter)), KeyOutcome::Submit);

        let ctrl_u = KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL);
        assert_eq!(apply_key(&mut answer, ctrl_u), KeyOutcome::Continue);
        assert!(answer.is_empty());

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(apply_key(&mut answer, ctrl_c), KeyOutcome::Cancel);
        assert_eq!(apply_key(&mut answer, press(KeyCode::Esc)), KeyOutcome::Cancel);
    }

    #[test]
    fn https_fetches_build_with_method_headers_and_body() {
        let transport = ReqwestTransport::default();
        let fetch: FetchAction = serde_json::from_value(serde_json::json!({
            "url": "https://api.example.com/items?page=2",
            "method": "post",
            "headers": {"x-token": "abc"},
            "body": {"name": "lumen"}
        }))
        .expect("fetch action");

        let request = transport.build_request(&fetch).expect("request builds");
        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.url().scheme(), "https");
        assert_eq!(request.url().query(), Some("page=2"));
        assert_eq!(request.headers()["x-token"], "abc");
        let body = request.body().and_then(|body| body.as_bytes()).expect("json body");
        assert_eq!(body, br#"{"name":"lumen"}"#);
    }

    #[test]
    fn invalid_methods_are_rejected_before_sending() {
        let fetch: FetchAction = serde_json::from_value(serde_json::json!({"url": "https://example.com", "method": "NOT A METHOD"}))
            .expect("fetch action");
        assert!(ReqwestTransport::default().build_request(&fetch).is_err());
    }
}
