//! 每帧相机矩阵

use glam::Mat4;

use crate::animation::{LookAtCamera, VmdCameraAnimation};
use crate::config::ViewerConfig;

/// 视图与投影矩阵
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub projection: Mat4,
}

/// 计算本帧相机：有相机动画时按动画帧求值，否则使用配置中的默认相机
pub fn camera_matrices(
    config: &ViewerConfig,
    camera_animation: Option<&VmdCameraAnimation>,
    frame: f32,
    width: u32,
    height: u32,
) -> CameraMatrices {
    let aspect = width.max(1) as f32 / height.max(1) as f32;

    let (look_at, fov) = match camera_animation {
        Some(animation) => {
            let camera = animation.evaluate(frame);
            (LookAtCamera::from(&camera), camera.fov)
        }
        None => (
            LookAtCamera::new(config.camera_eye, config.camera_center, config.camera_up),
            config.camera_fov_degrees.to_radians(),
        ),
    };

    CameraMatrices {
        view: look_at.view_matrix(),
        projection: Mat4::perspective_rh(fov, aspect, config.camera_near, config.camera_far),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::test_support;
    use crate::animation::VmdFile;
    use glam::Vec3;

    fn config() -> ViewerConfig {
        ViewerConfig::default()
    }

    #[test]
    fn test_default_camera() {
        let config = config();
        let m = camera_matrices(&config, None, 0.0, 1280, 800);

        let expected_view = Mat4::look_at_rh(Vec3::new(0.0, 10.0, 50.0), Vec3::new(0.0, 10.0, 0.0), Vec3::Y);
        let expected_proj = Mat4::perspective_rh(30f32.to_radians(), 1.6, 1.0, 10000.0);
        assert!(m.view.abs_diff_eq(expected_view, 1e-5));
        assert!(m.projection.abs_diff_eq(expected_proj, 1e-5));
    }

    #[test]
    fn test_zero_height_does_not_divide_by_zero() {
        let m = camera_matrices(&config(), None, 0.0, 1280, 0);
        assert!(m.projection.is_finite());
    }

    #[test]
    fn test_animated_camera_uses_keyframe_fov() {
        let mut bytes = Vec::new();
        test_support::header(&mut bytes);
        bytes.extend_from_slice(&0u32.to_le_bytes()); // 骨骼
        bytes.extend_from_slice(&0u32.to_le_bytes()); // 表情
        bytes.extend_from_slice(&1u32.to_le_bytes()); // 相机
        test_support::camera_key(&mut bytes, 0, -20.0, [0.0, 10.0, 0.0], [0.0, 0.0, 0.0], 45);
        let vmd = VmdFile::load_from_bytes(&bytes).unwrap();
        let animation = VmdCameraAnimation::create(&vmd).unwrap();

        let m = camera_matrices(&config(), Some(&animation), 0.0, 100, 100);

        let expected_proj = Mat4::perspective_rh(45f32.to_radians(), 1.0, 1.0, 10000.0);
        assert!(m.projection.abs_diff_eq(expected_proj, 1e-5));
        // 相机在注视点前方 20 单位处
        let eye = m.view.inverse().transform_point3(Vec3::ZERO);
        assert!((eye - Vec3::new(0.0, 10.0, 20.0)).length() < 1e-3);
    }
}
