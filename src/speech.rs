//! Text-to-speech rendering of persisted summaries.
//!
//! Rendering is delegated to an external synthesizer. The default [`CommandSynthesizer`] pipes
//! the text into a command-line engine (`espeak` unless configured otherwise) and asks it to
//! write the audio file directly.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Errors raised while rendering audio.
#[derive(Debug, Error)]
pub enum SpeechError {
    /// The synthesizer process could not be started or fed.
    #[error("failed to run speech command '{command}': {source}")]
    Spawn {
        /// Command that was attempted.
        command: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The synthesizer exited unsuccessfully.
    #[error("speech command exited with {status}: {stderr}")]
    Failed {
        /// Exit status description.
        status: String,
        /// Captured standard error.
        stderr: String,
    },
}

/// Renders text to an audio file.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Render `text` into `output`.
    async fn synthesize(&self, text: &str, output: &Path) -> Result<(), SpeechError>;
}

/// Synthesizer backed by an external `espeak`-compatible command.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    command: String,
    rate: u32,
}

impl CommandSynthesizer {
    /// Use `command` speaking at `rate` words per minute.
    pub fn new(command: impl Into<String>, rate: u32) -> Self {
        Self {
            command: command.into(),
            rate,
        }
    }

    fn arguments(&self, output: &Path) -> Vec<String> {
        vec![
            "-s".into(),
            self.rate.to_string(),
            "-w".into(),
            output.display().to_string(),
            "--stdin".into(),
        ]
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    async fn synthesize(&self, text: &str, output: &Path) -> Result<(), SpeechError> {
        let spawn_error = |source: std::io::Error| SpeechError::Spawn {
            command: self.command.clone(),
            source,
        };

        let mut child = Command::new(&self.command)
            .args(self.arguments(output))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await.map_err(spawn_error)?;
        }

        let result = child.wait_with_output().await.map_err(spawn_error)?;
        if !result.status.success() {
            return Err(SpeechError::Failed {
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        tracing::info!(output = %output.display(), "Audio rendered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_carry_rate_and_output() {
        let synth = CommandSynthesizer::new("espeak", 150);
        let args = synth.arguments(Path::new("uploads/book_audiobook.mp3"));
        assert_eq!(
            args,
            vec!["-s", "150", "-w", "uploads/book_audiobook.mp3", "--stdin"]
        );
    }

    #[tokio::test]
    async fn missing_command_is_a_spawn_error() {
        let synth = CommandSynthesizer::new("booksum-no-such-tts-binary", 150);
        let error = synth
            .synthesize("hello", Path::new("out.mp3"))
            .await
            .expect_err("spawn failure");
        assert!(matches!(error, SpeechError::Spawn { .. }));
    }
}
