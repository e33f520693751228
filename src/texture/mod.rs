//! 纹理加载和管理
//!
//! `TextureCache` 按路径缓存已上传的纹理，同一路径只解码、上传一次。
//! 加载失败不缓存，记录警告后返回 `None`，调用方改用占位纹理。

mod loader;

pub use loader::{decode_rgba, probe, TextureImage};

use std::collections::HashMap;
use std::sync::Arc;

use crate::{MmdError, Result};

/// 已上传的纹理
#[derive(Debug)]
pub struct Texture<I> {
    /// 图形后端的纹理对象
    pub image: I,
    pub width: u32,
    pub height: u32,
    /// 原始图像为 4 通道时为 true
    pub has_alpha: bool,
}

/// 将解码后的图像上传到图形后端
pub trait TextureFactory {
    type Image;

    fn create_texture(&self, label: &str, image: &TextureImage) -> Result<Self::Image>;
}

/// 路径 -> 纹理 缓存
pub struct TextureCache<F: TextureFactory> {
    factory: F,
    textures: HashMap<String, Arc<Texture<F::Image>>>,
}

impl<F: TextureFactory> TextureCache<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            textures: HashMap::new(),
        }
    }

    /// 获取纹理，不存在时加载并缓存
    ///
    /// 路径原样作为键，不做规范化。
    pub fn get_texture(&mut self, path: &str) -> Option<Arc<Texture<F::Image>>> {
        if let Some(texture) = self.textures.get(path) {
            return Some(Arc::clone(texture));
        }

        match self.load(path) {
            Ok(texture) => {
                let texture = Arc::new(texture);
                self.textures.insert(path.to_string(), Arc::clone(&texture));
                Some(texture)
            }
            Err(e) => {
                log::warn!("Texture unavailable, using dummy: {} ({})", path, e);
                None
            }
        }
    }

    fn load(&self, path: &str) -> Result<Texture<F::Image>> {
        let (width, height, channels) = probe(path)?;
        if width == 0 || height == 0 {
            return Err(MmdError::Texture(format!("Empty image: {}", path)));
        }
        let decoded = decode_rgba(path)?;
        let image = self.factory.create_texture(path, &decoded)?;
        log::debug!(
            "Texture loaded: {} ({}x{}, {} channels)",
            path,
            width,
            height,
            channels
        );

        Ok(Texture {
            image,
            width: decoded.width,
            height: decoded.height,
            has_alpha: decoded.has_alpha(),
        })
    }

    /// 已缓存纹理数量
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }
}
