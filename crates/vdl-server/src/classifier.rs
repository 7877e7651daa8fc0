use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};
use vdl_types::{Confidence, Label, Verdict};

use crate::config::ClassifierConfig;
use crate::error::{ServerError, ServerResult};

/// Turns an uploaded clip into a verdict.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, audio: &[u8]) -> ServerResult<Verdict>;
}

/// Runs an external program per clip.
///
/// The clip bytes go to the program's stdin; the first non-empty stdout line
/// must be `REAL` or `FAKE`, optionally followed by a confidence in `[0, 1]`.
/// Without a confidence the binary mapping applies: `REAL` → 1, `FAKE` → 0.
/// The child is killed if it outlives the timeout.
#[derive(Clone, Debug)]
pub struct CommandClassifier {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandClassifier {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone(), config.timeout())
    }

    async fn run(&self, audio: &[u8]) -> std::io::Result<std::process::Output> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(audio).await {
                // The program may decide without reading the whole clip.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                other => other?,
            }
        }
        child.wait_with_output().await
    }
}

#[async_trait]
impl Classifier for CommandClassifier {
    async fn classify(&self, audio: &[u8]) -> ServerResult<Verdict> {
        let output = tokio::time::timeout(self.timeout, self.run(audio))
            .await
            .map_err(|_| {
                warn!(program = %self.program, timeout = ?self.timeout, "classifier timed out");
                ServerError::ClassifierTimeout(self.timeout)
            })?
            .map_err(|e| ServerError::Classifier(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ServerError::Classifier(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let verdict = parse_prediction(&stdout)?;
        debug!(bytes = audio.len(), %verdict, "clip classified");
        Ok(verdict)
    }
}

/// Parse `REAL|FAKE [confidence]` from classifier output.
pub fn parse_prediction(output: &str) -> ServerResult<Verdict> {
    let line = output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| ServerError::Classifier("classifier produced no output".into()))?;

    let mut tokens = line.split_whitespace();
    let invalid = |e: vdl_types::TypeError| ServerError::Classifier(format!("{e} in {line:?}"));

    let label: Label = tokens.next().unwrap_or_default().parse().map_err(invalid)?;
    let confidence = match tokens.next() {
        Some(raw) => raw.parse::<Confidence>().map_err(invalid)?,
        None => Confidence::from_flag(label == Label::Real),
    };
    Verdict::new(label, confidence).map_err(invalid)
}
