//! Voice Queries - TTS 音色查询

/// 列出可用音色，可按 locale 过滤
#[derive(Debug, Clone, Default)]
pub struct ListVoices {
    pub locale: Option<String>,
}
