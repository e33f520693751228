//! wgpu 渲染后端
//!
//! - `context`: 实例、表面、设备与深度缓冲
//! - `pipeline`: 绑定组布局、两条管线（背面剔除 / 双面）、采样器与占位纹理
//! - `material`: 材质贴图槽解析与绑定组
//! - `mesh`: 顶点/索引/uniform 缓冲
//! - `renderer`: 子网格规划与绘制编码

mod context;
mod material;
mod mesh;
mod pipeline;
mod renderer;
mod texture;
mod uniforms;

pub use context::{FrameAcquire, GpuContext};
pub use material::{create_material_bind_group, Material, TextureSlot};
pub use mesh::{align_up, fill_vertices, pack_indices, pixel_uniform_stride, IndexElement, MeshBuffers, Vertex, VertexUpload};
pub use pipeline::{Culling, RenderResources, Samplers, DEPTH_FORMAT};
pub use renderer::{clear_frame, plan_submesh, FrameContext, ModelRenderer, SubmeshDraw};
pub use texture::{GpuImage, GpuTexture, GpuTextureFactory};
pub use uniforms::{PixelUniforms, TextureModes, VertexUniforms};
