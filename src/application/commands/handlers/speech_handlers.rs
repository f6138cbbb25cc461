//! Speech Command Handlers

use std::sync::Arc;

use crate::application::commands::speech_commands::*;
use crate::application::error::ApplicationError;
use crate::application::ports::{AudioClip, SpeechSynthesizerPort, SynthesisRequest};
use crate::domain::project::VoiceParams;

/// GenerateSpeech Handler - 文本直接合成为音频，不落盘
pub struct GenerateSpeechHandler {
    synthesizer: Arc<dyn SpeechSynthesizerPort>,
    default_voice: String,
}

impl GenerateSpeechHandler {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizerPort>, default_voice: String) -> Self {
        Self {
            synthesizer,
            default_voice,
        }
    }

    pub async fn handle(&self, cmd: GenerateSpeech) -> Result<AudioClip, ApplicationError> {
        let voice = VoiceParams::new(
            cmd.voice.unwrap_or_else(|| self.default_voice.clone()),
            cmd.rate,
            cmd.pitch,
            cmd.volume,
        )?;
        if cmd.text.trim().is_empty() {
            return Err(ApplicationError::config("text cannot be empty"));
        }

        let clip = self
            .synthesizer
            .synthesize(SynthesisRequest {
                text: cmd.text,
                voice,
            })
            .await?;

        tracing::debug!(bytes = clip.data.len(), "Speech generated");
        Ok(clip)
    }
}
