//! Audio Combiner Adapters
//!
//! 按格式分派到 WAV / MP3 拼接实现

mod mp3;
mod wav;

pub use wav::{encode_wav, silent_wav, WavFormat};

use crate::application::ports::{AudioClip, AudioCombinerPort, AudioFormat, CombineError};

/// 按片段格式选择拼接方式
#[derive(Debug, Default, Clone, Copy)]
pub struct AudioCombiner;

impl AudioCombiner {
    pub fn new() -> Self {
        Self
    }
}

impl AudioCombinerPort for AudioCombiner {
    fn combine(&self, clips: &[AudioClip]) -> Result<AudioClip, CombineError> {
        let first = clips.first().ok_or(CombineError::Empty)?;
        if let Some(other) = clips.iter().find(|c| c.format != first.format) {
            return Err(CombineError::MixedFormats(first.format, other.format));
        }

        let combined = match first.format {
            AudioFormat::Wav => wav::concat_wav(clips)?,
            AudioFormat::Mp3 => mp3::concat_mp3(clips)?,
        };

        tracing::debug!(
            clips = clips.len(),
            format = %combined.format,
            size = combined.data.len(),
            "Combined audio clips"
        );
        Ok(combined)
    }
}
