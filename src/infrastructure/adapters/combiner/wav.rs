//! WAV 拼接
//!
//! 解析 RIFF 头，校验参数一致后直接拼接 PCM 数据块

use crate::application::ports::{AudioClip, AudioFormat, CombineError};

const HEADER_LEN: usize = 44;

/// fmt chunk 中与拼接相关的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub audio_format: u16,
    pub num_channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl WavFormat {
    /// 16-bit PCM
    pub fn pcm16(num_channels: u16, sample_rate: u32) -> Self {
        Self {
            audio_format: 1,
            num_channels,
            sample_rate,
            bits_per_sample: 16,
        }
    }

    fn block_align(&self) -> u16 {
        self.num_channels * (self.bits_per_sample / 8)
    }

    fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }
}

/// 解析结果：格式和 PCM 数据的位置
#[derive(Debug)]
struct WavLayout {
    format: WavFormat,
    data_start: usize,
    data_size: usize,
}

fn read_u16(data: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes([data[pos], data[pos + 1]])
}

fn read_u32(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

fn parse_wav_header(data: &[u8]) -> Result<WavLayout, CombineError> {
    if data.len() < HEADER_LEN {
        return Err(CombineError::InvalidInput("WAV data too short".to_string()));
    }
    if &data[0..4] != b"RIFF" {
        return Err(CombineError::InvalidInput(
            "Invalid WAV: missing RIFF header".to_string(),
        ));
    }
    if &data[8..12] != b"WAVE" {
        return Err(CombineError::InvalidInput(
            "Invalid WAV: missing WAVE identifier".to_string(),
        ));
    }

    let mut pos = 12;
    let mut format: Option<WavFormat> = None;

    while pos + 8 <= data.len() {
        let chunk_id = &data[pos..pos + 4];
        let chunk_size = read_u32(data, pos + 4) as usize;
        let body = pos + 8;

        match chunk_id {
            b"fmt " => {
                if chunk_size < 16 || body + 16 > data.len() {
                    return Err(CombineError::InvalidInput(
                        "Invalid fmt chunk size".to_string(),
                    ));
                }
                format = Some(WavFormat {
                    audio_format: read_u16(data, body),
                    num_channels: read_u16(data, body + 2),
                    sample_rate: read_u32(data, body + 4),
                    bits_per_sample: read_u16(data, body + 14),
                });
            }
            b"data" => {
                let format = format.ok_or_else(|| {
                    CombineError::InvalidInput("Invalid WAV: missing fmt chunk".to_string())
                })?;
                // 流式输出的 WAV 可能写入占位长度，按实际剩余字节截断
                let data_size = chunk_size.min(data.len() - body);
                return Ok(WavLayout {
                    format,
                    data_start: body,
                    data_size,
                });
            }
            _ => {}
        }

        pos = body.saturating_add(chunk_size);
        // 对齐到偶数字节
        if chunk_size % 2 != 0 {
            pos = pos.saturating_add(1);
        }
    }

    Err(CombineError::InvalidInput(
        "Invalid WAV: missing data chunk".to_string(),
    ))
}

/// 写出标准 44 字节头的 WAV
pub fn encode_wav(format: WavFormat, pcm: &[u8]) -> Vec<u8> {
    let data_size = pcm.len() as u32;
    let mut wav = Vec::with_capacity(HEADER_LEN + pcm.len());

    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_size).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&format.audio_format.to_le_bytes());
    wav.extend_from_slice(&format.num_channels.to_le_bytes());
    wav.extend_from_slice(&format.sample_rate.to_le_bytes());
    wav.extend_from_slice(&format.byte_rate().to_le_bytes());
    wav.extend_from_slice(&format.block_align().to_le_bytes());
    wav.extend_from_slice(&format.bits_per_sample.to_le_bytes());

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_size.to_le_bytes());
    wav.extend_from_slice(pcm);

    wav
}

/// 生成指定时长的静音 WAV
pub fn silent_wav(format: WavFormat, duration_ms: u32) -> Vec<u8> {
    let frames = format.sample_rate as u64 * duration_ms as u64 / 1000;
    let pcm = vec![0u8; frames as usize * format.block_align() as usize];
    encode_wav(format, &pcm)
}

/// 拼接多个 WAV，要求采样参数一致
pub fn concat_wav(clips: &[AudioClip]) -> Result<AudioClip, CombineError> {
    let mut expected: Option<WavFormat> = None;
    let mut pcm = Vec::new();

    for (i, clip) in clips.iter().enumerate() {
        let layout = parse_wav_header(&clip.data)
            .map_err(|e| CombineError::InvalidInput(format!("clip {}: {}", i, e)))?;

        match expected {
            None => expected = Some(layout.format),
            Some(fmt) if fmt != layout.format => {
                return Err(CombineError::IncompatibleParameters(format!(
                    "clip {} has {} Hz / {} ch / {} bit, expected {} Hz / {} ch / {} bit",
                    i,
                    layout.format.sample_rate,
                    layout.format.num_channels,
                    layout.format.bits_per_sample,
                    fmt.sample_rate,
                    fmt.num_channels,
                    fmt.bits_per_sample,
                )));
            }
            Some(_) => {}
        }

        pcm.extend_from_slice(&clip.data[layout.data_start..layout.data_start + layout.data_size]);
    }

    let format = expected.ok_or(CombineError::Empty)?;
    if pcm.len() > u32::MAX as usize - 36 {
        return Err(CombineError::InvalidInput(
            "Combined WAV exceeds 4 GiB".to_string(),
        ));
    }

    Ok(AudioClip::new(AudioFormat::Wav, encode_wav(format, &pcm)))
}
