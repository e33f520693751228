//! 帧渲染
//!
//! 每个子网格先规划（纯计算，可测试），再编码为绘制命令。
//! alpha 恰为 0 的子网格不产生任何绘制。

use std::num::NonZeroU64;
use std::ops::Range;

use glam::{Mat3, Mat4, Vec3};

use crate::model::{MmdMaterial, MmdModel, SubMesh};
use crate::texture::TextureCache;
use crate::Result;

use super::material::{create_material_bind_group, Material};
use super::mesh::{MeshBuffers, VertexUpload};
use super::pipeline::{Culling, RenderResources};
use super::texture::{GpuImage, GpuTextureFactory};
use super::uniforms::{PixelUniforms, VertexUniforms};

/// 本帧的全局渲染状态
#[derive(Clone, Copy, Debug)]
pub struct FrameContext {
    pub view: Mat4,
    pub projection: Mat4,
    pub light_color: Vec3,
    /// 世界空间光源方向
    pub light_dir: Vec3,
    pub width: u32,
    pub height: u32,
}

impl FrameContext {
    /// 光源方向变换到视图空间（仅旋转部分）
    pub fn light_dir_view(&self) -> Vec3 {
        Mat3::from_mat4(self.view) * self.light_dir
    }
}

/// 单个子网格的绘制计划
#[derive(Clone, Debug, PartialEq)]
pub struct SubmeshDraw {
    pub index_range: Range<u32>,
    pub cull: Culling,
    pub pixel: PixelUniforms,
    pub material_index: usize,
}

/// 规划子网格绘制；材质 alpha 恰为 0 时返回 `None`
pub fn plan_submesh<I>(
    submesh: &SubMesh,
    material: &Material<I>,
    source: &MmdMaterial,
    frame: &FrameContext,
) -> Option<SubmeshDraw> {
    if source.alpha == 0.0 {
        return None;
    }

    let cull = if source.both_face { Culling::None } else { Culling::Back };
    Some(SubmeshDraw {
        index_range: submesh.index_range(),
        cull,
        pixel: PixelUniforms::new(source, material.texture_modes(), frame.light_color, frame.light_dir_view()),
        material_index: material.material_index,
    })
}

/// 清屏：颜色、深度 1、模板 0
pub fn clear_frame(
    device: &wgpu::Device,
    color_view: &wgpu::TextureView,
    depth_view: &wgpu::TextureView,
    clear_color: [f64; 4],
) -> wgpu::CommandBuffer {
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("mmd_clear_encoder"),
    });
    {
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("mmd_clear_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: clear_color[0],
                        g: clear_color[1],
                        b: clear_color[2],
                        a: clear_color[3],
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(0),
                    store: wgpu::StoreOp::Store,
                }),
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }
    encoder.finish()
}

/// 单个模型的渲染器
pub struct ModelRenderer {
    mesh: MeshBuffers,
    materials: Vec<Material<GpuImage>>,
    material_bind_groups: Vec<wgpu::BindGroup>,
    uniform_bind_group: wgpu::BindGroup,
    pixel_staging: Vec<u8>,
}

impl ModelRenderer {
    pub fn setup(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        resources: &RenderResources,
        model: &MmdModel,
        cache: &mut TextureCache<GpuTextureFactory>,
        uniform_alignment: u64,
    ) -> Result<Self> {
        let mesh = MeshBuffers::setup(device, queue, model, uniform_alignment)?;

        let materials: Vec<Material<GpuImage>> = model
            .materials
            .iter()
            .enumerate()
            .map(|(index, source)| Material::bind(index, source, cache))
            .collect();
        let material_bind_groups = materials
            .iter()
            .map(|material| create_material_bind_group(device, resources, material))
            .collect();

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("mmd_uniform_bind_group"),
            layout: &resources.uniform_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: mesh.vertex_uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &mesh.pixel_uniform_buffer,
                        offset: 0,
                        size: NonZeroU64::new(PixelUniforms::SIZE),
                    }),
                },
            ],
        });

        log::info!(
            "Model renderer ready: {} ({} materials, {} textures cached)",
            model.name,
            materials.len(),
            cache.len()
        );

        Ok(Self {
            mesh,
            materials,
            material_bind_groups,
            uniform_bind_group,
            pixel_staging: Vec::new(),
        })
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// 上传本帧蒙皮后的顶点
    pub fn update(&mut self, queue: &wgpu::Queue, model: &MmdModel) -> VertexUpload {
        self.mesh.update(queue, model)
    }

    /// 写入 uniform 并编码本模型所有子网格的绘制
    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        resources: &RenderResources,
        model: &MmdModel,
        frame: &FrameContext,
        color_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
        _upload: VertexUpload,
    ) -> wgpu::CommandBuffer {
        let stride = self.mesh.pixel_uniform_stride as usize;
        let draws: Vec<(usize, SubmeshDraw)> = model
            .submeshes
            .iter()
            .enumerate()
            .filter_map(|(slot, submesh)| {
                let material = self.materials.get(submesh.material_id)?;
                let source = model.materials.get(submesh.material_id)?;
                plan_submesh(submesh, material, source, frame).map(|draw| (slot, draw))
            })
            .collect();

        queue.write_buffer(
            &self.mesh.vertex_uniform_buffer,
            0,
            bytemuck::bytes_of(&VertexUniforms::new(frame.view, frame.projection)),
        );

        if !draws.is_empty() {
            self.pixel_staging.clear();
            self.pixel_staging.resize(stride * model.submesh_count().max(1), 0);
            for (slot, draw) in &draws {
                let offset = slot * stride;
                self.pixel_staging[offset..offset + PixelUniforms::SIZE as usize]
                    .copy_from_slice(bytemuck::bytes_of(&draw.pixel));
            }
            queue.write_buffer(&self.mesh.pixel_uniform_buffer, 0, &self.pixel_staging);
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("mmd_model_encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("mmd_model_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_viewport(0.0, 0.0, frame.width as f32, frame.height as f32, 0.0, 1.0);
            pass.set_vertex_buffer(0, self.mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(self.mesh.index_buffer.slice(..), self.mesh.index_element.format());

            for (slot, draw) in &draws {
                pass.set_pipeline(resources.pipeline(draw.cull));
                pass.set_bind_group(0, &self.uniform_bind_group, &[self.mesh.pixel_uniform_offset(*slot)]);
                pass.set_bind_group(1, &self.material_bind_groups[draw.material_index], &[]);
                pass.draw_indexed(draw.index_range.clone(), 0, 0..1);
            }
        }
        encoder.finish()
    }
}
