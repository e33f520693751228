//! MMD Viewer - 基于 wgpu 的 MMD 模型查看器
//!
//! 加载 PMD/PMX 模型与 VMD 动作，在窗口中实时渲染蒙皮、贴图后的网格：
//! - PMX/PMD 模型加载
//! - VMD 骨骼/相机动画播放
//! - 骨骼层级与顶点蒙皮
//! - 纹理缓存与材质绑定
//! - 逐帧顶点缓冲更新与按子网格绘制

pub mod animation;
pub mod app;
pub mod cli;
pub mod config;
pub mod model;
pub mod render;
pub mod skeleton;
pub mod skinning;
pub mod texture;

pub use animation::{VmdAnimation, VmdCameraAnimation, VmdFile};
pub use cli::ModelInput;
pub use config::ViewerConfig;
pub use model::{MmdModel, ModelFormat};
pub use skeleton::{Bone, BoneManager};
pub use texture::{Texture, TextureCache};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MmdError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PMX parse error: {0}")]
    PmxParse(String),

    #[error("PMD parse error: {0}")]
    PmdParse(String),

    #[error("VMD parse error: {0}")]
    VmdParse(String),

    #[error("Animation error: {0}")]
    Animation(String),

    #[error("Texture error: {0}")]
    Texture(String),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("{0}")]
    Usage(String),

    #[error("Unsupported model format: {0}")]
    UnsupportedFormat(String),

    #[error("Unsupported index size: {0} bytes")]
    UnsupportedIndexSize(usize),
}

pub type Result<T> = std::result::Result<T, MmdError>;
