//! 材质绑定
//!
//! 每个材质解析 diffuse / toon / sphere 三个贴图槽：命中缓存时共享纹理，
//! 缺失或加载失败时使用占位纹理，着色器永远不会拿到空资源。

use std::sync::Arc;

use crate::model::{MmdMaterial, SphereMode};
use crate::texture::{Texture, TextureCache, TextureFactory};

use super::pipeline::RenderResources;
use super::texture::GpuImage;
use super::uniforms::TextureModes;

/// 贴图槽
#[derive(Debug)]
pub enum TextureSlot<I> {
    Bound(Arc<Texture<I>>),
    Dummy,
}

impl<I> TextureSlot<I> {
    fn resolve<F>(path: Option<&str>, cache: &mut TextureCache<F>) -> Self
    where
        F: TextureFactory<Image = I>,
    {
        path.and_then(|p| cache.get_texture(p))
            .map(TextureSlot::Bound)
            .unwrap_or(TextureSlot::Dummy)
    }

    pub fn texture(&self) -> Option<&Arc<Texture<I>>> {
        match self {
            TextureSlot::Bound(texture) => Some(texture),
            TextureSlot::Dummy => None,
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, TextureSlot::Bound(_))
    }
}

/// 渲染侧材质，建立后不再修改
#[derive(Debug)]
pub struct Material<I> {
    /// 模型材质表中的下标
    pub material_index: usize,
    pub diffuse: TextureSlot<I>,
    pub toon: TextureSlot<I>,
    pub sphere: TextureSlot<I>,
    sphere_mode: SphereMode,
}

impl<I> Material<I> {
    pub fn bind<F>(material_index: usize, source: &MmdMaterial, cache: &mut TextureCache<F>) -> Self
    where
        F: TextureFactory<Image = I>,
    {
        Self {
            material_index,
            diffuse: TextureSlot::resolve(source.texture.as_deref(), cache),
            toon: TextureSlot::resolve(source.toon_texture.as_deref(), cache),
            sphere: TextureSlot::resolve(source.sphere_texture.as_deref(), cache),
            sphere_mode: source.sphere_mode,
        }
    }

    pub fn texture_modes(&self) -> TextureModes {
        let diffuse = match self.diffuse.texture() {
            None => 0,
            Some(texture) if texture.has_alpha => 2,
            Some(_) => 1,
        };
        let toon = i32::from(self.toon.is_bound());
        let sphere = match (&self.sphere, self.sphere_mode) {
            (TextureSlot::Dummy, _) | (_, SphereMode::None) => 0,
            (TextureSlot::Bound(_), SphereMode::Multiply) => 1,
            (TextureSlot::Bound(_), SphereMode::Add) => 2,
        };
        TextureModes { diffuse, toon, sphere }
    }
}

/// 为材质创建 group 1 绑定组
pub fn create_material_bind_group(
    device: &wgpu::Device,
    resources: &RenderResources,
    material: &Material<GpuImage>,
) -> wgpu::BindGroup {
    let samplers = &resources.samplers;
    let (diffuse_view, diffuse_sampler) = slot_resources(resources, &material.diffuse, &samplers.diffuse);
    let (toon_view, toon_sampler) = slot_resources(resources, &material.toon, &samplers.toon);
    let (sphere_view, sphere_sampler) = slot_resources(resources, &material.sphere, &samplers.sphere);

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("mmd_material_bind_group"),
        layout: &resources.material_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(diffuse_view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(diffuse_sampler),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(toon_view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Sampler(toon_sampler),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::TextureView(sphere_view),
            },
            wgpu::BindGroupEntry {
                binding: 5,
                resource: wgpu::BindingResource::Sampler(sphere_sampler),
            },
        ],
    })
}

fn slot_resources<'a>(
    resources: &'a RenderResources,
    slot: &'a TextureSlot<GpuImage>,
    sampler: &'a wgpu::Sampler,
) -> (&'a wgpu::TextureView, &'a wgpu::Sampler) {
    match slot {
        TextureSlot::Bound(texture) => (&texture.image.view, sampler),
        TextureSlot::Dummy => (&resources.dummy.view, &resources.samplers.dummy),
    }
}
