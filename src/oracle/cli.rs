use super::{InlineImage, StrategyOracle, non_empty_response, with_heartbeat};
use crate::error::OracleError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Oracle backed by a command-line model client.
///
/// Runs `command [args..] <prompt_flag> <prompt>` and reads the answer from
/// stdout. Images are not supported by this transport and are dropped.
#[derive(Debug, Clone)]
pub struct CliOracle {
    command: String,
    args: Vec<String>,
    prompt_flag: String,
    timeout: Duration,
}

impl CliOracle {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            prompt_flag: "-p".to_string(),
            timeout,
        }
    }

    /// Arguments placed before the prompt flag
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_prompt_flag(mut self, flag: impl Into<String>) -> Self {
        self.prompt_flag = flag.into();
        self
    }

    fn build_command(&self, prompt: &str) -> Command {
        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .arg(&self.prompt_flag)
            .arg(prompt)
            .env("CI", "true")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl StrategyOracle for CliOracle {
    async fn ask(&self, prompt: &str, image: Option<&InlineImage>) -> Result<String, OracleError> {
        if self.command.trim().is_empty() {
            return Err(OracleError::NotConfigured("no oracle command set".to_string()));
        }
        if image.is_some() {
            ::log::debug!("CLI oracle ignores the attached image");
        }

        ::log::info!("Asking strategy oracle via {}", self.command);
        let output = with_heartbeat(tokio::time::timeout(
            self.timeout,
            self.build_command(prompt).output(),
        ))
        .await
        .map_err(|_| OracleError::Timeout(self.timeout.as_secs()))?
        .map_err(|e| OracleError::Transport(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OracleError::Rejected(format!(
                "exit {}: {}",
                output.status.code().unwrap_or(-1),
                crate::utils::truncate_chars(stderr.trim(), 200)
            )));
        }

        let text = non_empty_response(String::from_utf8_lossy(&output.stdout).into_owned())?;
        ::log::info!("Strategy oracle answered with {} characters", text.chars().count());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_command() {
        let oracle = CliOracle::new("  ", Duration::from_secs(1));
        assert!(matches!(
            oracle.ask("prompt", None).await,
            Err(OracleError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_is_transport_error() {
        let oracle = CliOracle::new("/nonexistent/oracle-binary", Duration::from_secs(5));
        assert!(matches!(
            oracle.ask("prompt", None).await,
            Err(OracleError::Transport(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdout_is_the_answer() {
        // `echo -p <prompt>` prints the flag and the prompt back
        let oracle = CliOracle::new("echo", Duration::from_secs(5));
        let answer = oracle.ask("{\"page_type\": \"news\"}", None).await.unwrap();
        assert_eq!(answer, "-p {\"page_type\": \"news\"}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_rejected() {
        let oracle = CliOracle::new("false", Duration::from_secs(5)).with_prompt_flag("--");
        assert!(matches!(
            oracle.ask("prompt", None).await,
            Err(OracleError::Rejected(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_empty_output_is_empty() {
        let oracle = CliOracle::new("true", Duration::from_secs(5));
        assert!(matches!(oracle.ask("prompt", None).await, Err(OracleError::Empty)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout() {
        // Runs `sleep 5 5`
        let oracle = CliOracle::new("sleep", Duration::from_millis(100)).with_prompt_flag("5");
        assert!(matches!(
            oracle.ask("5", None).await,
            Err(OracleError::Timeout(_))
        ));
    }
}
