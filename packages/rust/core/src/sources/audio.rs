//! Audio transcription through a configured external command.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, instrument};

use siphon_shared::{RawContent, Result, SiphonError, SourceIdentity, SourceType};

use super::command;
use super::file::file_metadata;
use crate::strategy::Extractor;

/// Extractor for `file-audio` sources.
///
/// Runs `audio_command` with `{input}` replaced by the file path; its stdout
/// is the transcript.
pub struct AudioExtractor {
    command: Vec<String>,
}

impl AudioExtractor {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl Extractor for AudioExtractor {
    fn source_type(&self) -> SourceType {
        SourceType::FileAudio
    }

    #[instrument(skip_all, fields(uri = %identity.canonical_uri))]
    async fn extract(&self, identity: &SourceIdentity) -> Result<RawContent> {
        if self.command.is_empty() {
            return Err(SiphonError::extraction(
                &identity.canonical_uri,
                "no transcription.audio_command configured",
            ));
        }

        let path = PathBuf::from(identity.original_input.trim());
        let input = path.to_string_lossy().into_owned();
        let argv = command::substitute(&self.command, &[("input", input.as_str())]);

        info!(program = %argv[0], "transcribing audio");
        let transcript = command::run(&argv).await?;
        if transcript.is_empty() {
            return Err(SiphonError::extraction(
                &identity.canonical_uri,
                "transcriber produced no text",
            ));
        }

        let mut content = RawContent::new(SourceType::FileAudio, transcript);
        content.metadata = file_metadata(&path, identity)?;
        content
            .metadata
            .insert("transcriber".into(), self.command[0].clone().into());
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::file::FileParser;
    use crate::strategy::SourceParser;

    fn audio_identity() -> SourceIdentity {
        let dir = std::env::temp_dir().join(format!("siphon-audio-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("memo.wav");
        std::fs::write(&path, b"RIFF....WAVE").unwrap();
        FileParser::audio()
            .canonicalize(&path.to_string_lossy())
            .unwrap()
    }

    #[tokio::test]
    async fn transcript_comes_from_command_stdout() {
        let identity = audio_identity();
        let extractor = AudioExtractor::new(vec![
            "sh".into(),
            "-c".into(),
            "echo \"transcript of $(basename \"$0\")\"".into(),
            "{input}".into(),
        ]);

        let content = extractor.extract(&identity).await.unwrap();
        assert_eq!(content.text, "transcript of memo.wav");
        assert_eq!(content.meta_str("transcriber"), Some("sh"));
        assert_eq!(content.meta_str("mime_type"), Some("audio/wav"));
    }

    #[tokio::test]
    async fn unconfigured_command_fails() {
        let identity = audio_identity();
        let err = AudioExtractor::new(Vec::new())
            .extract(&identity)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("audio_command"));
    }
}
