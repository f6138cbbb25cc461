//! HTTP TTS Client - 调用外部 TTS HTTP 服务
//!
//! 实现 SpeechSynthesizerPort trait，通过 HTTP 调用外部 TTS 服务
//!
//! 外部 TTS API:
//! POST {base_url}/api/tts
//! Request: {"text": "<speak>...</speak> 或纯文本", "voice": "en-US-AndrewNeural", "format": "mp3"}  (JSON)
//! Response: 音频二进制，格式由 Content-Type 给出
//!
//! GET {base_url}/api/voices
//! Response: [{"ShortName": "...", "Locale": "en-US", "Gender": "Male", ...}]

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client};
use serde::Serialize;
use std::time::Duration;

use crate::application::ports::{
    AudioClip, AudioFormat, SpeechSynthesizerPort, SynthesisError, SynthesisRequest, VoiceInfo,
};
use crate::infrastructure::adapters::RetryPolicy;

/// TTS 合成请求体 (JSON)
#[derive(Debug, Serialize)]
struct TtsHttpRequest<'a> {
    /// SSML 或纯文本
    text: String,
    voice: &'a str,
    /// 期望的输出格式
    format: AudioFormat,
}

/// HTTP TTS 客户端配置
#[derive(Debug, Clone)]
pub struct HttpTtsClientConfig {
    /// TTS 服务基础 URL
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
    /// 重试次数
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    /// 请求的输出格式，服务未声明格式时也按此解析
    pub output_format: AudioFormat,
}

impl Default for HttpTtsClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5050".to_string(),
            timeout_secs: 120,
            max_retries: 2,
            retry_base_delay_ms: 1000,
            output_format: AudioFormat::Mp3,
        }
    }
}

impl HttpTtsClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, base_delay_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay_ms = base_delay_ms;
        self
    }
}

/// HTTP TTS 客户端
pub struct HttpTtsClient {
    client: Client,
    config: HttpTtsClientConfig,
    retry: RetryPolicy,
}

impl HttpTtsClient {
    pub fn new(config: HttpTtsClientConfig) -> Result<Self, SynthesisError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SynthesisError::NetworkError(e.to_string()))?;
        let retry = RetryPolicy::new(config.max_retries, config.retry_base_delay_ms);

        Ok(Self {
            client,
            config,
            retry,
        })
    }

    fn synthesize_url(&self) -> String {
        format!("{}/api/tts", self.config.base_url.trim_end_matches('/'))
    }

    fn voices_url(&self) -> String {
        format!("{}/api/voices", self.config.base_url.trim_end_matches('/'))
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.config.base_url.trim_end_matches('/'))
    }

    /// 韵律参数非零时正文以 SSML 发送
    fn request_body<'a>(&self, request: &'a SynthesisRequest) -> TtsHttpRequest<'a> {
        TtsHttpRequest {
            text: request.voice.to_ssml(&request.text),
            voice: request.voice.voice_id(),
            format: self.config.output_format,
        }
    }

    async fn fetch_voices_once(&self) -> Result<Vec<VoiceInfo>, SynthesisError> {
        let response = self
            .client
            .get(self.voices_url())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SynthesisError::Timeout
                } else {
                    SynthesisError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("HTTP {} from voice list", status);
            return Err(if status.is_server_error() {
                SynthesisError::ServiceError(message)
            } else {
                SynthesisError::InvalidResponse(message)
            });
        }

        response
            .json::<Vec<VoiceInfo>>()
            .await
            .map_err(|e| SynthesisError::InvalidResponse(format!("Invalid voice list: {}", e)))
    }

    /// 单次请求，不含重试
    async fn send_once(&self, body: &TtsHttpRequest<'_>) -> Result<AudioClip, SynthesisError> {
        let response = self
            .client
            .post(self.synthesize_url())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SynthesisError::Timeout
                } else if e.is_connect() {
                    SynthesisError::NetworkError(format!("Cannot connect to TTS service: {}", e))
                } else {
                    SynthesisError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = format!("HTTP {}: {}", status, error_text);
            // 4xx 重试无意义
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                SynthesisError::ServiceError(message)
            } else {
                SynthesisError::InvalidResponse(message)
            });
        }

        let declared = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(format_from_content_type);

        let data = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::NetworkError(format!("Failed to read audio: {}", e)))?
            .to_vec();

        if data.is_empty() {
            return Err(SynthesisError::InvalidResponse("empty audio body".to_string()));
        }

        let format = declared
            .or_else(|| AudioFormat::sniff(&data))
            .unwrap_or(self.config.output_format);

        Ok(AudioClip::new(format, data))
    }
}

fn format_from_content_type(value: &str) -> Option<AudioFormat> {
    let mime = value.split(';').next()?.trim().to_ascii_lowercase();
    match mime.as_str() {
        "audio/mpeg" | "audio/mp3" => Some(AudioFormat::Mp3),
        "audio/wav" | "audio/wave" | "audio/x-wav" => Some(AudioFormat::Wav),
        _ => None,
    }
}

#[async_trait]
impl SpeechSynthesizerPort for HttpTtsClient {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<AudioClip, SynthesisError> {
        if request.text.trim().is_empty() {
            return Err(SynthesisError::EmptyText);
        }

        let body = self.request_body(&request);

        tracing::debug!(
            url = %self.synthesize_url(),
            text_len = request.text.len(),
            voice = %body.voice,
            ssml = !request.voice.is_neutral(),
            "Sending TTS request"
        );

        let clip = self
            .retry
            .run("tts", SynthesisError::is_transient, || self.send_once(&body))
            .await?;

        tracing::info!(
            format = %clip.format,
            audio_size = clip.data.len(),
            "TTS synthesis completed"
        );
        Ok(clip)
    }

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, SynthesisError> {
        let voices = self
            .retry
            .run("tts-voices", SynthesisError::is_transient, || self.fetch_voices_once())
            .await?;
        tracing::debug!(count = voices.len(), "Voice list fetched");
        Ok(voices)
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(self.health_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = HttpTtsClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:5050");
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.output_format, AudioFormat::Mp3);
    }

    #[test]
    fn test_config_builder() {
        let config = HttpTtsClientConfig::new("http://example.com:9000/")
            .with_timeout(60)
            .with_retries(0, 10);
        let client = HttpTtsClient::new(config).unwrap();
        assert_eq!(client.synthesize_url(), "http://example.com:9000/api/tts");
        assert_eq!(client.config.timeout_secs, 60);
        assert_eq!(client.retry.max_retries, 0);
    }

    #[test]
    fn test_format_from_content_type() {
        assert_eq!(format_from_content_type("audio/mpeg"), Some(AudioFormat::Mp3));
        assert_eq!(
            format_from_content_type("audio/wav; codecs=1"),
            Some(AudioFormat::Wav)
        );
        assert_eq!(format_from_content_type("application/json"), None);
    }

    #[test]
    fn test_request_body_carries_voice_and_format() {
        let mut config = HttpTtsClientConfig::new("http://127.0.0.1:9");
        config.output_format = AudioFormat::Wav;
        let client = HttpTtsClient::new(config).unwrap();
        let request = SynthesisRequest {
            text: "Tom & Jerry".to_string(),
            voice: crate::domain::project::VoiceParams::new("en-US-AriaNeural", 10, 0, 0).unwrap(),
        };

        let json = serde_json::to_value(client.request_body(&request)).unwrap();

        assert_eq!(json["voice"], "en-US-AriaNeural");
        assert_eq!(json["format"], "wav");
        let text = json["text"].as_str().unwrap();
        assert!(text.starts_with("<speak><prosody rate=\"+10%\""));
        assert!(text.contains("Tom &amp; Jerry"));
    }

    #[tokio::test]
    async fn test_empty_text_rejected_without_request() {
        let client = HttpTtsClient::new(HttpTtsClientConfig::new("http://127.0.0.1:9")).unwrap();
        let request = SynthesisRequest {
            text: "   ".to_string(),
            voice: crate::domain::project::VoiceParams::new("v", 0, 0, 0).unwrap(),
        };
        assert_eq!(client.synthesize(request).await, Err(SynthesisError::EmptyText));
    }
}
