//! 纹理解码
//!
//! - 像素统一转换为 RGBA8（无论原始通道数）
//! - has_alpha 基于原始通道数判断：仅 4 通道视为带透明
//! - 不做垂直翻转，纹理坐标原点在左上

use std::path::Path;

use image::{DynamicImage, ImageDecoder, ImageReader};

use crate::{MmdError, Result};

/// 解码后的 RGBA8 图像
#[derive(Clone, Debug)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    /// 原始通道数
    pub channels: u8,
    /// 按行紧密排列的 RGBA8 像素
    pub rgba: Vec<u8>,
}

impl TextureImage {
    pub fn has_alpha(&self) -> bool {
        self.channels == 4
    }

    pub fn bytes_per_row(&self) -> u32 {
        self.width * 4
    }
}

/// 只读取文件头：返回 (宽, 高, 通道数)
pub fn probe<P: AsRef<Path>>(path: P) -> Result<(u32, u32, u8)> {
    let path = path.as_ref();
    let decoder = ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()
        .map_err(|e| MmdError::Texture(format!("Failed to probe {}: {}", path.display(), e)))?;
    let (width, height) = decoder.dimensions();
    Ok((width, height, decoder.color_type().channel_count()))
}

/// 从文件解码纹理
///
/// 格式按文件内容猜测，因此 `.sph`/`.spa`（实际为 BMP）也能正常读取。
pub fn decode_rgba<P: AsRef<Path>>(path: P) -> Result<TextureImage> {
    let path = path.as_ref();
    let img = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| MmdError::Texture(format!("Failed to decode {}: {}", path.display(), e)))?;

    Ok(from_dynamic(img))
}

fn from_dynamic(img: DynamicImage) -> TextureImage {
    let channels = img.color().channel_count();
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    TextureImage {
        width,
        height,
        channels,
        rgba: rgba.into_raw(),
    }
}
