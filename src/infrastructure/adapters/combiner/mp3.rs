//! MP3 拼接
//!
//! MP3 帧可以直接首尾相接，只需去掉中间片段的 ID3 标签

use crate::application::ports::{AudioClip, AudioFormat, CombineError};

const ID3V1_LEN: usize = 128;

/// ID3v2 标签长度（含头和可选尾部）
fn id3v2_len(data: &[u8]) -> usize {
    if data.len() < 10 || &data[0..3] != b"ID3" {
        return 0;
    }
    // 同步安全整数，每字节 7 位
    let size = data[6..10]
        .iter()
        .fold(0usize, |acc, b| (acc << 7) | (*b as usize & 0x7F));
    let footer = if data[5] & 0x10 != 0 { 10 } else { 0 };
    (10 + size + footer).min(data.len())
}

fn has_id3v1(data: &[u8]) -> bool {
    data.len() >= ID3V1_LEN && &data[data.len() - ID3V1_LEN..data.len() - ID3V1_LEN + 3] == b"TAG"
}

/// 拼接 MP3：保留首段的 ID3v2 和末段的 ID3v1
pub fn concat_mp3(clips: &[AudioClip]) -> Result<AudioClip, CombineError> {
    if clips.is_empty() {
        return Err(CombineError::Empty);
    }

    let last = clips.len() - 1;
    let mut out = Vec::with_capacity(clips.iter().map(|c| c.data.len()).sum());

    for (i, clip) in clips.iter().enumerate() {
        let data = clip.data.as_slice();
        let start = if i == 0 { 0 } else { id3v2_len(data) };
        let end = if i != last && has_id3v1(data) {
            data.len() - ID3V1_LEN
        } else {
            data.len()
        };
        if start < end {
            out.extend_from_slice(&data[start..end]);
        }
    }

    Ok(AudioClip::new(AudioFormat::Mp3, out))
}
