//! MMD 模型（PMD/PMX）加载与运行时

mod loader;
mod material;
mod pmd;
mod runtime;
mod submesh;

pub use loader::{load_model, load_pmx, pmx_index_size, ModelFormat};
pub use material::{MmdMaterial, SphereMode};
pub use pmd::load_pmd;
pub use runtime::MmdModel;
pub use submesh::{find_out_of_range, split_submeshes, SubMesh};

use glam::{Vec2, Vec3};
use std::path::{Path, PathBuf};

/// 运行时顶点数据
#[derive(Clone, Debug)]
pub struct RuntimeVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

/// 模型顶点骨骼权重
#[derive(Clone, Debug)]
pub enum VertexWeight {
    Bdef1 { bone: i32 },
    Bdef2 { bones: [i32; 2], weight: f32 },
    Bdef4 { bones: [i32; 4], weights: [f32; 4] },
    Sdef { bones: [i32; 2], weight: f32, c: Vec3, r0: Vec3, r1: Vec3 },
    Qdef { bones: [i32; 4], weights: [f32; 4] },
}

impl Default for VertexWeight {
    fn default() -> Self {
        VertexWeight::Bdef1 { bone: 0 }
    }
}

/// 规范化路径（统一使用正斜杠）
pub(crate) fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// 模型文件中的相对贴图名与模型目录组合
pub(crate) fn resolve_texture_path(model_dir: &Path, name: &str) -> String {
    normalize_path(&model_dir.join(name.replace('\\', "/")))
}

/// 共享 toon 贴图路径：`<resource_dir>/toonNN.bmp`，`index` 从 0 开始
pub(crate) fn shared_toon_path(resource_dir: &Path, index: usize) -> String {
    let path: PathBuf = resource_dir.join(format!("toon{:02}.bmp", index + 1));
    normalize_path(&path)
}
