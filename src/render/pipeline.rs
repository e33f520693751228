//! 渲染管线与共享资源
//!
//! 所有模型共用一套布局、管线、采样器与占位纹理。
//! - group 0: 顶点 uniform + 像素 uniform（动态偏移，每个子网格一个槽）
//! - group 1: 材质贴图（diffuse / toon / sphere 各一对 view + sampler）

use std::num::NonZeroU64;

use crate::texture::TextureImage;
use crate::Result;

use super::mesh::Vertex;
use super::texture::{upload_rgba8, with_error_scope, GpuImage};
use super::uniforms::{PixelUniforms, VertexUniforms};

/// 深度/模板格式
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

/// 按面剔除方式选择管线
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Culling {
    /// 剔除背面
    Back,
    /// 双面绘制
    None,
}

/// 材质采样器
pub struct Samplers {
    pub diffuse: wgpu::Sampler,
    pub toon: wgpu::Sampler,
    pub sphere: wgpu::Sampler,
    pub dummy: wgpu::Sampler,
}

/// 共享渲染资源
pub struct RenderResources {
    pub uniform_layout: wgpu::BindGroupLayout,
    pub material_layout: wgpu::BindGroupLayout,
    pub samplers: Samplers,
    /// 1x1 白色占位纹理
    pub dummy: GpuImage,
    cull_back: wgpu::RenderPipeline,
    cull_none: wgpu::RenderPipeline,
}

impl RenderResources {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, color_format: wgpu::TextureFormat) -> Result<Self> {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mmd_uniform_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(std::mem::size_of::<VertexUniforms>() as u64),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(PixelUniforms::SIZE),
                    },
                    count: None,
                },
            ],
        });

        let material_entries: Vec<wgpu::BindGroupLayoutEntry> = (0..3u32)
            .flat_map(|slot| {
                [
                    wgpu::BindGroupLayoutEntry {
                        binding: slot * 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: slot * 2 + 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ]
            })
            .collect();
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mmd_material_layout"),
            entries: &material_entries,
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mmd_pipeline_layout"),
            bind_group_layouts: &[&uniform_layout, &material_layout],
            push_constant_ranges: &[],
        });

        let shader = device.create_shader_module(wgpu::include_wgsl!("shader.wgsl"));

        let (cull_back, cull_none) = with_error_scope(device, "mmd pipelines", || {
            (
                create_pipeline(device, &layout, &shader, color_format, Culling::Back),
                create_pipeline(device, &layout, &shader, color_format, Culling::None),
            )
        })?;

        let samplers = Samplers {
            diffuse: create_sampler(device, "diffuse_sampler", wgpu::AddressMode::Repeat),
            toon: create_sampler(device, "toon_sampler", wgpu::AddressMode::ClampToEdge),
            sphere: create_sampler(device, "sphere_sampler", wgpu::AddressMode::Repeat),
            dummy: create_sampler(device, "dummy_sampler", wgpu::AddressMode::Repeat),
        };

        let white = TextureImage {
            width: 1,
            height: 1,
            channels: 4,
            rgba: vec![255; 4],
        };
        let dummy = with_error_scope(device, "dummy texture", || upload_rgba8(device, queue, "dummy_texture", &white))?;

        log::info!("Render pipelines created (color format {:?})", color_format);

        Ok(Self {
            uniform_layout,
            material_layout,
            samplers,
            dummy,
            cull_back,
            cull_none,
        })
    }

    pub fn pipeline(&self, culling: Culling) -> &wgpu::RenderPipeline {
        match culling {
            Culling::Back => &self.cull_back,
            Culling::None => &self.cull_none,
        }
    }
}

fn create_sampler(device: &wgpu::Device, label: &str, address_mode: wgpu::AddressMode) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    color_format: wgpu::TextureFormat,
    culling: Culling,
) -> wgpu::RenderPipeline {
    let blend_component = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    };
    let (label, cull_mode) = match culling {
        Culling::Back => ("mmd_pipeline_cull_back", Some(wgpu::Face::Back)),
        Culling::None => ("mmd_pipeline_cull_none", None),
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[Vertex::layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(wgpu::BlendState {
                    color: blend_component,
                    alpha: blend_component,
                }),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
