//! 查看器配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。
//! 共享 toon 贴图目录可通过环境变量 `MMD_VIEWER_RESOURCE_DIR` 覆盖。

use glam::Vec3;
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// 覆盖资源目录的环境变量名
pub const RESOURCE_DIR_ENV: &str = "MMD_VIEWER_RESOURCE_DIR";

/// 查看器配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    // ========== 窗口 ==========
    /// 初始客户区宽度，默认 1280
    pub window_width: u32,
    /// 初始客户区高度，默认 800
    pub window_height: u32,
    /// 窗口标题
    pub window_title: String,

    // ========== 清屏 ==========
    /// 每帧清屏颜色 (RGBA)，默认 (1.0, 0.8, 0.75, 1.0)
    pub clear_color: [f64; 4],

    // ========== 光照 ==========
    /// 光源颜色，默认白色
    pub light_color: Vec3,
    /// 光源方向（世界空间），默认 (-0.5, -1.0, -0.5)
    pub light_direction: Vec3,

    // ========== 默认相机 ==========
    /// 没有相机动画时的视点
    pub camera_eye: Vec3,
    /// 没有相机动画时的注视点
    pub camera_center: Vec3,
    pub camera_up: Vec3,
    /// 垂直视场角（度），默认 30
    pub camera_fov_degrees: f32,
    pub camera_near: f32,
    pub camera_far: f32,

    // ========== 动画时钟 ==========
    /// 单帧最大推进时间（秒），默认 1/30
    pub max_frame_delta: f32,
    /// 动画帧率，VMD 固定为 30
    pub animation_fps: f32,

    // ========== 资源 ==========
    /// 共享 toon 贴图 (toon01.bmp ~ toon10.bmp) 所在目录
    pub resource_dir: PathBuf,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 800,
            window_title: "Simple MMD Viewer".to_string(),

            clear_color: [1.0, 0.8, 0.75, 1.0],

            light_color: Vec3::ONE,
            light_direction: Vec3::new(-0.5, -1.0, -0.5),

            camera_eye: Vec3::new(0.0, 10.0, 50.0),
            camera_center: Vec3::new(0.0, 10.0, 0.0),
            camera_up: Vec3::Y,
            camera_fov_degrees: 30.0,
            camera_near: 1.0,
            camera_far: 10000.0,

            max_frame_delta: 1.0 / 30.0,
            animation_fps: 30.0,

            resource_dir: resolve_resource_dir(
                std::env::var(RESOURCE_DIR_ENV).ok().as_deref(),
                std::env::current_exe().ok().as_deref(),
            ),
        }
    }
}

/// 计算资源目录：环境变量优先，否则为 `<exe 所在目录>/resource/mmd`
pub fn resolve_resource_dir(env_override: Option<&str>, exe_path: Option<&Path>) -> PathBuf {
    if let Some(dir) = env_override.filter(|s| !s.is_empty()) {
        return PathBuf::from(dir);
    }
    exe_path
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_default()
        .join("resource")
        .join("mmd")
}

/// 全局配置
static VIEWER_CONFIG: Lazy<RwLock<ViewerConfig>> = Lazy::new(|| RwLock::new(ViewerConfig::default()));

/// 获取当前配置（克隆）
pub fn get_config() -> ViewerConfig {
    VIEWER_CONFIG
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// 手动设置配置
pub fn set_config(config: ViewerConfig) {
    *VIEWER_CONFIG
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    set_config(ViewerConfig::default());
}
