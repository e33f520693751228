//! 网格缓冲管理
//!
//! 每个模型持有顶点缓冲、索引缓冲、顶点 uniform 缓冲与按子网格分槽的像素 uniform 缓冲。
//! 顶点缓冲每帧由 CPU 端暂存区整体写入一次。

use bytemuck::{Pod, Zeroable};

use crate::model::MmdModel;
use crate::{MmdError, Result};

use super::texture::with_error_scope;
use super::uniforms::{PixelUniforms, VertexUniforms};

/// GPU 顶点：位置、法线、UV
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub const STRIDE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::STRIDE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// 模型索引的逻辑元素类型
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexElement {
    U8,
    U16,
    U32,
}

impl IndexElement {
    pub fn from_size(size: usize) -> Result<Self> {
        match size {
            1 => Ok(IndexElement::U8),
            2 => Ok(IndexElement::U16),
            4 => Ok(IndexElement::U32),
            other => Err(MmdError::UnsupportedIndexSize(other)),
        }
    }

    /// GPU 索引格式；8 位索引上传时扩展为 16 位
    pub fn format(self) -> wgpu::IndexFormat {
        match self {
            IndexElement::U8 | IndexElement::U16 => wgpu::IndexFormat::Uint16,
            IndexElement::U32 => wgpu::IndexFormat::Uint32,
        }
    }
}

/// 按上传格式打包索引
pub fn pack_indices(indices: &[u32], element: IndexElement) -> Vec<u8> {
    match element.format() {
        wgpu::IndexFormat::Uint16 => {
            let narrow: Vec<u16> = indices.iter().map(|&i| i as u16).collect();
            let mut bytes: Vec<u8> = bytemuck::cast_slice::<u16, u8>(&narrow).to_vec();
            // write_buffer 要求 4 字节对齐
            bytes.resize(align_up(bytes.len() as u64, wgpu::COPY_BUFFER_ALIGNMENT) as usize, 0);
            bytes
        }
        wgpu::IndexFormat::Uint32 => bytemuck::cast_slice::<u32, u8>(indices).to_vec(),
    }
}

/// 向上对齐到 `alignment`（必须为 2 的幂）
pub fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// 像素 uniform 槽步长
pub fn pixel_uniform_stride(min_alignment: u64) -> u64 {
    align_up(PixelUniforms::SIZE, min_alignment.max(1))
}

/// 把模型的蒙皮结果写入暂存顶点
pub fn fill_vertices(model: &MmdModel, staging: &mut Vec<Vertex>) {
    let positions = model.update_positions();
    let normals = model.update_normals();
    let uvs = model.update_uvs();

    staging.clear();
    staging.extend(
        positions
            .iter()
            .zip(normals)
            .zip(uvs)
            .map(|((p, n), uv)| Vertex {
                position: p.to_array(),
                normal: n.to_array(),
                uv: uv.to_array(),
            }),
    );
}

/// 本帧顶点已上传的凭证，`draw` 消费它
#[must_use]
#[derive(Debug)]
pub struct VertexUpload(());

/// 模型的 GPU 缓冲
pub struct MeshBuffers {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_element: IndexElement,
    pub index_count: u32,
    pub vertex_uniform_buffer: wgpu::Buffer,
    pub pixel_uniform_buffer: wgpu::Buffer,
    /// 每个子网格一个槽
    pub pixel_uniform_stride: u64,
    staging: Vec<Vertex>,
}

impl MeshBuffers {
    pub fn setup(device: &wgpu::Device, queue: &wgpu::Queue, model: &MmdModel, uniform_alignment: u64) -> Result<Self> {
        let index_element = IndexElement::from_size(model.index_element_size())?;
        let vertex_count = model.vertex_count().max(1) as u64;
        let index_bytes = pack_indices(model.indices(), index_element);
        let stride = pixel_uniform_stride(uniform_alignment);
        let slot_count = model.submesh_count().max(1) as u64;

        let buffers = with_error_scope(device, "mesh buffers", || {
            let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("mmd_vertex_buffer"),
                size: vertex_count * Vertex::STRIDE,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let index_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("mmd_index_buffer"),
                size: (index_bytes.len() as u64).max(wgpu::COPY_BUFFER_ALIGNMENT),
                usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let vertex_uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("mmd_vertex_uniforms"),
                size: std::mem::size_of::<VertexUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let pixel_uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("mmd_pixel_uniforms"),
                size: stride * slot_count,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            (vertex_buffer, index_buffer, vertex_uniform_buffer, pixel_uniform_buffer)
        })?;
        let (vertex_buffer, index_buffer, vertex_uniform_buffer, pixel_uniform_buffer) = buffers;

        if !index_bytes.is_empty() {
            queue.write_buffer(&index_buffer, 0, &index_bytes);
        }

        log::debug!(
            "Mesh buffers created: vertices={}, indices={} ({:?}), uniform slots={}",
            model.vertex_count(),
            model.index_count(),
            index_element,
            slot_count
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_element,
            index_count: model.index_count() as u32,
            vertex_uniform_buffer,
            pixel_uniform_buffer,
            pixel_uniform_stride: stride,
            staging: Vec::with_capacity(model.vertex_count()),
        })
    }

    /// 复制蒙皮结果并整体写入顶点缓冲
    pub fn update(&mut self, queue: &wgpu::Queue, model: &MmdModel) -> VertexUpload {
        fill_vertices(model, &mut self.staging);
        if !self.staging.is_empty() {
            queue.write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&self.staging));
        }
        VertexUpload(())
    }

    /// 第 `slot` 个子网格的动态偏移
    pub fn pixel_uniform_offset(&self, slot: usize) -> u32 {
        (self.pixel_uniform_stride * slot as u64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelFormat, RuntimeVertex};
    use glam::{Vec2, Vec3};

    #[test]
    fn test_vertex_layout() {
        assert_eq!(Vertex::STRIDE, 32);
        let layout = Vertex::layout();
        assert_eq!(layout.attributes.len(), 3);
        assert_eq!(layout.attributes[1].offset, 12);
        assert_eq!(layout.attributes[2].offset, 24);
    }

    #[test]
    fn test_index_element_from_size() {
        assert_eq!(IndexElement::from_size(1).unwrap(), IndexElement::U8);
        assert_eq!(IndexElement::from_size(2).unwrap(), IndexElement::U16);
        assert_eq!(IndexElement::from_size(4).unwrap(), IndexElement::U32);
        assert!(matches!(
            IndexElement::from_size(3),
            Err(MmdError::UnsupportedIndexSize(3))
        ));
        assert_eq!(IndexElement::U8.format(), wgpu::IndexFormat::Uint16);
    }

    #[test]
    fn test_pack_u8_indices_widened() {
        let bytes = pack_indices(&[0, 1, 255], IndexElement::U8);
        // 3 个 u16 = 6 字节，补齐到 8
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..6], &[0, 0, 1, 0, 255, 0]);
    }

    #[test]
    fn test_pack_u32_indices() {
        let bytes = pack_indices(&[70000, 1, 2], IndexElement::U32);
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[..4], &70000u32.to_le_bytes());
    }

    #[test]
    fn test_pixel_uniform_stride() {
        assert_eq!(align_up(192, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(pixel_uniform_stride(256), 256);
        assert_eq!(pixel_uniform_stride(64), 192);
    }

    #[test]
    fn test_fill_vertices_from_model() {
        let mut model = MmdModel::new(ModelFormat::Pmx);
        model.vertices = vec![
            RuntimeVertex {
                position: Vec3::new(1.0, 2.0, 3.0),
                normal: Vec3::Y,
                uv: Vec2::new(0.25, 0.75),
            },
            RuntimeVertex {
                position: Vec3::ZERO,
                normal: Vec3::Z,
                uv: Vec2::ZERO,
            },
        ];
        model.finish_loading();

        let mut staging = vec![Vertex::default(); 5];
        fill_vertices(&model, &mut staging);

        assert_eq!(staging.len(), 2);
        assert_eq!(staging[0].position, [1.0, 2.0, 3.0]);
        assert_eq!(staging[0].normal, [0.0, 1.0, 0.0]);
        assert_eq!(staging[0].uv, [0.25, 0.75]);
        assert_eq!(staging[1].normal, [0.0, 0.0, 1.0]);
    }
}
