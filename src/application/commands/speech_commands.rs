//! Speech Commands - 单段文本合成

/// 合成一段文本（不创建项目）
#[derive(Debug, Clone)]
pub struct GenerateSpeech {
    pub text: String,
    /// 未指定时使用配置默认音色
    pub voice: Option<String>,
    pub rate: i32,
    pub pitch: i32,
    pub volume: i32,
}
