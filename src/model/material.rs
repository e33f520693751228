//! MMD 材质定义

use glam::{Vec3, Vec4};

/// 球面贴图混合方式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SphereMode {
    #[default]
    None,
    Multiply,
    Add,
}

impl SphereMode {
    /// 按扩展名推断：`.spa` 为加算，其余为乘算
    pub fn from_texture_path(path: &str) -> Self {
        let is_add = path
            .rsplit_once('.')
            .map(|(_, ext)| ext.eq_ignore_ascii_case("spa"))
            .unwrap_or(false);
        if is_add {
            SphereMode::Add
        } else {
            SphereMode::Multiply
        }
    }
}

/// MMD 材质
#[derive(Clone, Debug)]
pub struct MmdMaterial {
    pub name: String,
    pub diffuse: Vec3,
    pub alpha: f32,
    pub specular: Vec3,
    pub specular_power: f32,
    pub ambient: Vec3,

    // 贴图路径（已与模型目录组合）
    pub texture: Option<String>,
    pub sphere_texture: Option<String>,
    pub sphere_mode: SphereMode,
    pub toon_texture: Option<String>,

    // 贴图系数（材质 Morph 使用，默认 mul=(1,1,1,1)、add=0）
    pub texture_mul_factor: Vec4,
    pub texture_add_factor: Vec4,
    pub toon_mul_factor: Vec4,
    pub toon_add_factor: Vec4,
    pub sphere_mul_factor: Vec4,
    pub sphere_add_factor: Vec4,

    pub both_face: bool,
}

impl Default for MmdMaterial {
    fn default() -> Self {
        Self {
            name: String::new(),
            diffuse: Vec3::ONE,
            alpha: 1.0,
            specular: Vec3::ZERO,
            specular_power: 1.0,
            ambient: Vec3::splat(0.2),
            texture: None,
            sphere_texture: None,
            sphere_mode: SphereMode::None,
            toon_texture: None,
            texture_mul_factor: Vec4::ONE,
            texture_add_factor: Vec4::ZERO,
            toon_mul_factor: Vec4::ONE,
            toon_add_factor: Vec4::ZERO,
            sphere_mul_factor: Vec4::ONE,
            sphere_add_factor: Vec4::ZERO,
            both_face: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_mode_from_extension() {
        assert_eq!(SphereMode::from_texture_path("a/env.spa"), SphereMode::Add);
        assert_eq!(SphereMode::from_texture_path("a/env.SPA"), SphereMode::Add);
        assert_eq!(SphereMode::from_texture_path("a/env.sph"), SphereMode::Multiply);
        assert_eq!(SphereMode::from_texture_path("a/env"), SphereMode::Multiply);
    }
}
