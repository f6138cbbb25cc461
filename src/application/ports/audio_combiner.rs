//! Audio Combiner Port - 批次音频合并
//!
//! 把按章节顺序排列的音频片段拼接为一个音频文件，不重新编码

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 合并错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CombineError {
    #[error("No input clips")]
    Empty,

    #[error("Mixed audio formats: {0} and {1}")]
    MixedFormats(AudioFormat, AudioFormat),

    #[error("Incompatible audio parameters: {0}")]
    IncompatibleParameters(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// 音频格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Wav,
    Mp3,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Mp3 => "audio/mpeg",
        }
    }

    /// 根据文件头识别格式
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE" {
            return Some(AudioFormat::Wav);
        }
        if data.starts_with(b"ID3") || (data.len() >= 2 && data[0] == 0xFF && data[1] & 0xE0 == 0xE0) {
            return Some(AudioFormat::Mp3);
        }
        None
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "wav" => Some(AudioFormat::Wav),
            "mp3" => Some(AudioFormat::Mp3),
            _ => None,
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = CombineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| CombineError::InvalidInput(format!("unknown format: {}", s)))
    }
}

/// 一段完整的音频文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub format: AudioFormat,
    pub data: Vec<u8>,
}

impl AudioClip {
    pub fn new(format: AudioFormat, data: Vec<u8>) -> Self {
        Self { format, data }
    }
}

/// Audio Combiner Port
///
/// CPU 密集的同步操作，调用方负责放到阻塞线程池执行
pub trait AudioCombinerPort: Send + Sync {
    fn combine(&self, clips: &[AudioClip]) -> Result<AudioClip, CombineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_formats() {
        let mut wav = b"RIFF\0\0\0\0WAVEfmt ".to_vec();
        wav.extend_from_slice(&[0; 4]);
        assert_eq!(AudioFormat::sniff(&wav), Some(AudioFormat::Wav));
        assert_eq!(AudioFormat::sniff(b"ID3\x04\0"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::sniff(&[0xFF, 0xFB, 0x90, 0x00]), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::sniff(b"<html>"), None);
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("MP3".parse::<AudioFormat>().unwrap(), AudioFormat::Mp3);
        assert!("ogg".parse::<AudioFormat>().is_err());
    }
}
