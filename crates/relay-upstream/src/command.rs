use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use relay_core::device::{AppConfig, DeviceCredentials, Registration};
use relay_core::upstream::{DeviceRegistrar, PushListener};
use relay_core::{NotificationEvent, UpstreamError};

/// A helper program and its arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a command line on whitespace. No shell quoting.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(String::from);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    fn spawn(&self) -> Result<Child, UpstreamError> {
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| UpstreamError::Spawn {
                program: self.program.clone(),
                reason: e.to_string(),
            })
    }
}

/// Write `input` to the child's stdin and close it.
async fn feed_stdin(child: &mut Child, input: &[u8]) -> Result<(), UpstreamError> {
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input).await?;
        stdin.shutdown().await?;
    }
    Ok(())
}

#[derive(Deserialize)]
struct RegistrarOutput {
    credentials: DeviceCredentials,
    token: String,
}

/// Runs a registration helper: app config JSON on stdin,
/// `{"credentials": ..., "token": "..."}` on stdout.
pub struct CommandRegistrar {
    spec: CommandSpec,
}

impl CommandRegistrar {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl DeviceRegistrar for CommandRegistrar {
    fn name(&self) -> &str {
        &self.spec.program
    }

    async fn register(&self, app: &AppConfig) -> Result<Registration, UpstreamError> {
        let input = serde_json::to_vec(app).map_err(|e| UpstreamError::InvalidOutput(e.to_string()))?;

        let mut child = self.spec.spawn()?;
        feed_stdin(&mut child, &input).await?;
        let output = child.wait_with_output().await?;

        if !output.status.success() {
            return Err(UpstreamError::Exited {
                program: self.spec.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let parsed: RegistrarOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| UpstreamError::InvalidOutput(e.to_string()))?;
        if parsed.token.is_empty() {
            return Err(UpstreamError::Rejected("empty push token".into()));
        }

        tracing::info!(registrar = %self.spec.program, "Device registered");
        Ok(Registration::new(parsed.credentials, parsed.token))
    }
}

#[derive(Serialize)]
struct ListenerInput<'a> {
    app: &'a AppConfig,
    credentials: &'a DeviceCredentials,
}

/// Runs a long-lived listener helper: `{"app": ..., "credentials": ...}` on
/// stdin, one notification JSON object per stdout line.
pub struct CommandListener {
    spec: CommandSpec,
}

impl CommandListener {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl PushListener for CommandListener {
    fn name(&self) -> &str {
        &self.spec.program
    }

    async fn connect(
        &self,
        app: &AppConfig,
        credentials: &DeviceCredentials,
        events: mpsc::Sender<NotificationEvent>,
    ) -> Result<(), UpstreamError> {
        let input = serde_json::to_vec(&ListenerInput { app, credentials })
            .map_err(|e| UpstreamError::InvalidOutput(e.to_string()))?;

        let mut child = self.spec.spawn()?;
        feed_stdin(&mut child, &input).await?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| UpstreamError::Io("listener stdout unavailable".into()))?;

        let program = self.spec.program.clone();
        if let Some(stderr) = child.stderr.take() {
            let program = program.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::warn!(listener = %program, "{line}");
                }
            });
        }

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<NotificationEvent>(line) {
                            Ok(event) => {
                                if events.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::warn!(listener = %program, error = %e, "Skipping malformed listener line");
                            }
                        }
                    }
                    Ok(None) => {
                        tracing::warn!(listener = %program, "Push listener stream ended");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(listener = %program, error = %e, "Push listener read failed");
                        break;
                    }
                }
            }
            let _ = child.kill().await;
        });

        tracing::info!(listener = %self.spec.program, "Listening for messages");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh", vec!["-c".into(), script.into()])
    }

    #[test]
    fn parse_command_line() {
        let spec = CommandSpec::parse("node fcm-listen.js --verbose").unwrap();
        assert_eq!(spec.program, "node");
        assert_eq!(spec.args, vec!["fcm-listen.js", "--verbose"]);
        assert!(CommandSpec::parse("   ").is_none());
    }

    #[tokio::test]
    async fn registrar_parses_helper_output() {
        let registrar = CommandRegistrar::new(sh(
            r#"cat > /dev/null; echo '{"credentials":{"androidId":1},"token":"tok"}'"#,
        ));
        let reg = registrar.register(&AppConfig::default()).await.unwrap();
        assert_eq!(reg.token(), "tok");
        assert_eq!(reg.credentials.0["androidId"], 1);
    }

    #[tokio::test]
    async fn registrar_receives_app_config_on_stdin() {
        // Echo the package id back as the token.
        let registrar = CommandRegistrar::new(sh(
            r#"id=$(cat | sed 's/.*"packageId":"\([^"]*\)".*/\1/'); echo "{\"credentials\":{},\"token\":\"$id\"}""#,
        ));
        let app = AppConfig(serde_json::json!({"packageId": "com.example"}));
        let reg = registrar.register(&app).await.unwrap();
        assert_eq!(reg.token(), "com.example");
    }

    #[tokio::test]
    async fn registrar_nonzero_exit() {
        let registrar = CommandRegistrar::new(sh("cat > /dev/null; echo checkin failed >&2; exit 3"));
        let err = registrar.register(&AppConfig::default()).await.unwrap_err();
        match err {
            UpstreamError::Exited { stderr, .. } => assert_eq!(stderr, "checkin failed"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn registrar_invalid_output() {
        let registrar = CommandRegistrar::new(sh("cat > /dev/null; echo nope"));
        let err = registrar.register(&AppConfig::default()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidOutput(_)));
    }

    #[tokio::test]
    async fn registrar_empty_token_rejected() {
        let registrar = CommandRegistrar::new(sh(
            r#"cat > /dev/null; echo '{"credentials":{},"token":""}'"#,
        ));
        let err = registrar.register(&AppConfig::default()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Rejected(_)));
    }

    #[tokio::test]
    async fn registrar_missing_program() {
        let registrar = CommandRegistrar::new(CommandSpec::new("/definitely/not/here", vec![]));
        let err = registrar.register(&AppConfig::default()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Spawn { .. }));
    }

    #[tokio::test]
    async fn listener_emits_events_and_skips_junk() {
        let listener = CommandListener::new(sh(
            r#"cat > /dev/null; echo '{"persistentId":"p1","data":{"k":"v"}}'; echo junk; echo; echo '{"persistentId":"p2"}'"#,
        ));
        let (tx, mut rx) = mpsc::channel(8);
        listener
            .connect(&AppConfig::default(), &DeviceCredentials(serde_json::json!({})), tx)
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.persistent_id.as_str(), "p1");
        assert_eq!(first.data.get("k").map(String::as_str), Some("v"));

        let second = rx.recv().await.unwrap();
        assert_eq!(second.persistent_id.as_str(), "p2");

        // Helper exited, so the channel closes.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn listener_keeps_reading_after_noisy_stderr() {
        let listener = CommandListener::new(sh(
            r#"cat > /dev/null; yes noise | head -n 20000 >&2; echo '{"persistentId":"p1"}'"#,
        ));
        let (tx, mut rx) = mpsc::channel(8);
        listener
            .connect(&AppConfig::default(), &DeviceCredentials(serde_json::json!({})), tx)
            .await
            .unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.persistent_id.as_str(), "p1");
    }

    #[tokio::test]
    async fn listener_missing_program() {
        let listener = CommandListener::new(CommandSpec::new("/definitely/not/here", vec![]));
        let (tx, _rx) = mpsc::channel(1);
        let err = listener
            .connect(&AppConfig::default(), &DeviceCredentials(serde_json::json!({})), tx)
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Spawn { .. }));
    }
}
