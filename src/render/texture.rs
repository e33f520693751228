//! GPU 纹理上传

use crate::texture::{Texture, TextureFactory, TextureImage};
use crate::{MmdError, Result};

/// GPU 端纹理与视图
#[derive(Debug)]
pub struct GpuImage {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

/// 缓存中的 GPU 纹理
pub type GpuTexture = Texture<GpuImage>;

/// 将 RGBA8 图像上传为 `Rgba8Unorm` 纹理（单 mip）
#[derive(Clone)]
pub struct GpuTextureFactory {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl GpuTextureFactory {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self { device, queue }
    }
}

impl TextureFactory for GpuTextureFactory {
    type Image = GpuImage;

    fn create_texture(&self, label: &str, image: &TextureImage) -> Result<GpuImage> {
        with_error_scope(&self.device, label, || upload_rgba8(&self.device, &self.queue, label, image))
    }
}

/// 创建纹理并写入像素
pub(crate) fn upload_rgba8(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    image: &TextureImage,
) -> GpuImage {
    let size = wgpu::Extent3d {
        width: image.width.max(1),
        height: image.height.max(1),
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    if image.width > 0 && image.height > 0 {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(image.bytes_per_row()),
                rows_per_image: Some(image.height),
            },
            size,
        );
    }

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuImage { texture, view }
}

/// 在错误作用域内执行 GPU 资源创建，捕获显存不足与校验错误
pub(crate) fn with_error_scope<T>(device: &wgpu::Device, label: &str, create: impl FnOnce() -> T) -> Result<T> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());

    match out_of_memory.or(validation) {
        Some(err) => Err(MmdError::Gpu(format!("Failed to create {}: {}", label, err))),
        None => Ok(value),
    }
}
