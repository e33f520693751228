//! 着色器 uniform 块
//!
//! 布局与 `shader.wgsl` 中的结构体逐字段对应：vec3 后紧跟一个标量填满 16 字节。

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use crate::model::MmdMaterial;

/// 顶点阶段 uniform
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct VertexUniforms {
    /// world * view
    pub wv: [[f32; 4]; 4],
    /// world * view * projection
    pub wvp: [[f32; 4]; 4],
}

impl VertexUniforms {
    /// 世界矩阵固定为单位矩阵
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        let world = Mat4::IDENTITY;
        Self {
            wv: (view * world).to_cols_array_2d(),
            wvp: (projection * view * world).to_cols_array_2d(),
        }
    }
}

/// 贴图槽模式
///
/// - diffuse: 0 = 无贴图，1 = 仅材质 alpha，2 = 材质 alpha * 贴图 alpha
/// - toon: 0 = 无贴图，1 = 有贴图
/// - sphere: 0 = 无贴图，1 = 乘算，2 = 加算
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextureModes {
    pub diffuse: i32,
    pub toon: i32,
    pub sphere: i32,
}

impl TextureModes {
    pub fn to_array(self) -> [i32; 4] {
        [self.diffuse, self.toon, self.sphere, 0]
    }
}

/// 像素阶段 uniform
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PixelUniforms {
    pub diffuse: [f32; 3],
    pub alpha: f32,
    pub ambient: [f32; 3],
    pub _pad0: f32,
    pub specular: [f32; 3],
    pub specular_power: f32,
    pub light_color: [f32; 3],
    pub _pad1: f32,
    /// 视图空间光源方向
    pub light_dir: [f32; 3],
    pub _pad2: f32,

    pub texture_mul_factor: [f32; 4],
    pub texture_add_factor: [f32; 4],
    pub toon_mul_factor: [f32; 4],
    pub toon_add_factor: [f32; 4],
    pub sphere_mul_factor: [f32; 4],
    pub sphere_add_factor: [f32; 4],

    pub texture_modes: [i32; 4],
}

impl PixelUniforms {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// 由材质与光源填充；贴图系数只在对应槽有贴图时使用材质值
    pub fn new(material: &MmdMaterial, modes: TextureModes, light_color: Vec3, light_dir_view: Vec3) -> Self {
        let factors = |present: bool, mul: Vec4, add: Vec4| {
            if present {
                (mul.to_array(), add.to_array())
            } else {
                (Vec4::ONE.to_array(), Vec4::ZERO.to_array())
            }
        };
        let (texture_mul_factor, texture_add_factor) =
            factors(modes.diffuse != 0, material.texture_mul_factor, material.texture_add_factor);
        let (toon_mul_factor, toon_add_factor) =
            factors(modes.toon != 0, material.toon_mul_factor, material.toon_add_factor);
        let (sphere_mul_factor, sphere_add_factor) =
            factors(modes.sphere != 0, material.sphere_mul_factor, material.sphere_add_factor);

        Self {
            diffuse: material.diffuse.to_array(),
            alpha: material.alpha,
            ambient: material.ambient.to_array(),
            _pad0: 0.0,
            specular: material.specular.to_array(),
            specular_power: material.specular_power,
            light_color: light_color.to_array(),
            _pad1: 0.0,
            light_dir: light_dir_view.to_array(),
            _pad2: 0.0,
            texture_mul_factor,
            texture_add_factor,
            toon_mul_factor,
            toon_add_factor,
            sphere_mul_factor,
            sphere_add_factor,
            texture_modes: modes.to_array(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sizes_match_shader_layout() {
        assert_eq!(std::mem::size_of::<VertexUniforms>(), 128);
        assert_eq!(std::mem::size_of::<PixelUniforms>(), 192);
        assert_eq!(PixelUniforms::SIZE % 16, 0);
    }

    #[test]
    fn test_vertex_uniforms_identity_world() {
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        let proj = Mat4::perspective_rh(1.0, 1.5, 1.0, 100.0);
        let u = VertexUniforms::new(view, proj);
        assert_eq!(u.wv, view.to_cols_array_2d());
        assert_eq!(u.wvp, (proj * view).to_cols_array_2d());
    }

    #[test]
    fn test_factors_default_for_absent_slots() {
        let material = MmdMaterial {
            texture_mul_factor: Vec4::splat(0.5),
            toon_add_factor: Vec4::splat(0.25),
            ..MmdMaterial::default()
        };
        let modes = TextureModes { diffuse: 1, toon: 0, sphere: 0 };
        let u = PixelUniforms::new(&material, modes, Vec3::ONE, Vec3::NEG_Y);

        assert_eq!(u.texture_mul_factor, [0.5; 4]);
        assert_eq!(u.toon_add_factor, [0.0; 4]);
        assert_eq!(u.texture_modes, [1, 0, 0, 0]);
        assert_eq!(u.light_dir, [0.0, -1.0, 0.0]);
    }
}
