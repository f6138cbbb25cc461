//! Fake TTS Client - 用于测试的 TTS 客户端
//!
//! 每次调用返回一段静音 WAV，不实际调用 TTS 服务

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::application::ports::{
    AudioClip, AudioFormat, SpeechSynthesizerPort, SynthesisError, SynthesisRequest, VoiceInfo,
};
use crate::infrastructure::adapters::{silent_wav, WavFormat};

/// Fake TTS Client 配置
#[derive(Debug, Clone)]
pub struct FakeTtsClientConfig {
    /// 每段返回音频的时长（毫秒）
    pub duration_ms: u32,
    /// 采样率
    pub sample_rate: u32,
    /// 模拟合成延迟
    pub latency: Duration,
}

impl Default for FakeTtsClientConfig {
    fn default() -> Self {
        Self {
            duration_ms: 50,
            sample_rate: 16000,
            latency: Duration::ZERO,
        }
    }
}

/// Fake TTS Client
///
/// 文本中包含某个失败标记时返回 ServiceError
pub struct FakeTtsClient {
    config: FakeTtsClientConfig,
    audio_data: Vec<u8>,
    calls: AtomicUsize,
    fail_markers: Mutex<HashSet<String>>,
    voices: Vec<VoiceInfo>,
}

fn builtin_voices() -> Vec<VoiceInfo> {
    [
        ("en-US-AndrewNeural", "en-US", "Male"),
        ("en-US-AriaNeural", "en-US", "Female"),
        ("en-GB-SoniaNeural", "en-GB", "Female"),
        ("de-DE-KatjaNeural", "de-DE", "Female"),
    ]
    .into_iter()
    .map(|(short_name, locale, gender)| VoiceInfo {
        short_name: short_name.to_string(),
        locale: locale.to_string(),
        gender: Some(gender.to_string()),
        friendly_name: None,
    })
    .collect()
}

impl FakeTtsClient {
    pub fn new(config: FakeTtsClientConfig) -> Self {
        let audio_data = silent_wav(WavFormat::pcm16(1, config.sample_rate), config.duration_ms);
        Self {
            config,
            audio_data,
            calls: AtomicUsize::new(0),
            fail_markers: Mutex::new(HashSet::new()),
            voices: builtin_voices(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(FakeTtsClientConfig::default())
    }

    /// 让包含 `marker` 的文本合成失败
    pub fn fail_on(&self, marker: impl Into<String>) {
        self.markers().insert(marker.into());
    }

    pub fn clear_failures(&self) {
        self.markers().clear();
    }

    /// 已收到的合成调用次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn markers(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.fail_markers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SpeechSynthesizerPort for FakeTtsClient {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<AudioClip, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            text_len = request.text.len(),
            voice = %request.voice.voice_id(),
            "FakeTtsClient: returning silent audio"
        );

        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }
        if request.text.trim().is_empty() {
            return Err(SynthesisError::EmptyText);
        }
        let failing = self
            .markers()
            .iter()
            .any(|marker| request.text.contains(marker.as_str()));
        if failing {
            return Err(SynthesisError::ServiceError("injected failure".to_string()));
        }

        Ok(AudioClip::new(AudioFormat::Wav, self.audio_data.clone()))
    }

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, SynthesisError> {
        Ok(self.voices.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::project::VoiceParams;

    fn request(text: &str) -> SynthesisRequest {
        SynthesisRequest {
            text: text.to_string(),
            voice: VoiceParams::new("v", 0, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_returns_wav_and_counts_calls() {
        let tts = FakeTtsClient::with_defaults();
        let clip = tts.synthesize(request("hello")).await.unwrap();
        assert_eq!(clip.format, AudioFormat::Wav);
        assert_eq!(AudioFormat::sniff(&clip.data), Some(AudioFormat::Wav));

        tts.fail_on("boom");
        assert!(tts.synthesize(request("a boom b")).await.is_err());
        tts.clear_failures();
        assert!(tts.synthesize(request("a boom b")).await.is_ok());
        assert_eq!(tts.calls(), 3);
    }
}
