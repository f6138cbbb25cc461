//! Speech Synthesizer Port - 语音合成抽象
//!
//! 定义文本转语音的接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AudioClip;
use crate::domain::project::VoiceParams;

/// 合成错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Empty text")]
    EmptyText,
}

impl SynthesisError {
    /// 是否值得重试
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SynthesisError::NetworkError(_) | SynthesisError::Timeout | SynthesisError::ServiceError(_)
        )
    }
}

/// 合成请求
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    /// 章节正文
    pub text: String,
    /// 音色与韵律参数
    pub voice: VoiceParams,
}

/// TTS 服务提供的音色
///
/// 兼容 edge-tts 风格的字段名（ShortName / Locale / Gender）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
    #[serde(alias = "ShortName")]
    pub short_name: String,
    #[serde(alias = "Locale")]
    pub locale: String,
    #[serde(default, alias = "Gender")]
    pub gender: Option<String>,
    #[serde(default, alias = "FriendlyName")]
    pub friendly_name: Option<String>,
}

impl VoiceInfo {
    /// `en`、`en-US`、`en-GB` 匹配所有英语音色，其他 locale 精确匹配
    pub fn matches_locale(&self, locale: &str) -> bool {
        match locale {
            "en" | "en-US" | "en-GB" => self.locale.starts_with("en-"),
            other => self.locale == other,
        }
    }
}

/// Speech Synthesizer Port
///
/// 外部 TTS 服务的抽象接口，返回完整的音频文件字节
#[async_trait]
pub trait SpeechSynthesizerPort: Send + Sync {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<AudioClip, SynthesisError>;

    /// 列出可用音色
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, SynthesisError>;

    /// 检查 TTS 服务是否可用
    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(short_name: &str, locale: &str) -> VoiceInfo {
        VoiceInfo {
            short_name: short_name.to_string(),
            locale: locale.to_string(),
            gender: None,
            friendly_name: None,
        }
    }

    #[test]
    fn test_english_filters_match_all_english_locales() {
        let gb = voice("en-GB-SoniaNeural", "en-GB");
        let de = voice("de-DE-KatjaNeural", "de-DE");
        assert!(gb.matches_locale("en-US"));
        assert!(gb.matches_locale("en"));
        assert!(!de.matches_locale("en"));
        assert!(de.matches_locale("de-DE"));
        assert!(!de.matches_locale("de"));
    }

    #[test]
    fn test_deserializes_engine_field_names() {
        let json = r#"{"ShortName": "en-US-AndrewNeural", "Locale": "en-US", "Gender": "Male"}"#;
        let parsed: VoiceInfo = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.short_name, "en-US-AndrewNeural");
        assert_eq!(parsed.gender.as_deref(), Some("Male"));
        assert_eq!(parsed.friendly_name, None);
    }
}
