//! VMD 相机动画

use glam::{Mat4, Quat, Vec3};

use super::{CameraMotionTrack, VmdFile};
use crate::{MmdError, Result};

/// 相机动画求值结果（MMD 相机参数）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MmdCamera {
    /// 注视点
    pub interest: Vec3,
    /// 欧拉角（弧度）
    pub rotate: Vec3,
    /// 注视点到相机的距离
    pub distance: f32,
    /// 垂直视场角（弧度）
    pub fov: f32,
}

impl MmdCamera {
    pub(crate) fn from_keyframe(key: &super::CameraKeyframe) -> Self {
        Self {
            interest: key.interest,
            rotate: key.rotation,
            distance: key.distance,
            fov: key.fov.to_radians(),
        }
    }
}

/// 视点 / 注视点 / 上方向
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LookAtCamera {
    pub eye: Vec3,
    pub center: Vec3,
    pub up: Vec3,
}

impl LookAtCamera {
    pub fn new(eye: Vec3, center: Vec3, up: Vec3) -> Self {
        Self { eye, center, up }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.center, self.up)
    }
}

impl From<&MmdCamera> for LookAtCamera {
    /// 相机位于注视点沿旋转后 +Z 方向 `distance` 处，朝向 -Z
    fn from(camera: &MmdCamera) -> Self {
        let rotation = Quat::from_rotation_y(camera.rotate.y)
            * Quat::from_rotation_x(camera.rotate.x)
            * Quat::from_rotation_z(camera.rotate.z);

        let eye = camera.interest + rotation * Vec3::new(0.0, 0.0, camera.distance.abs());
        Self {
            eye,
            center: eye + rotation * Vec3::NEG_Z,
            up: rotation * Vec3::Y,
        }
    }
}

/// 相机动画求值器
#[derive(Clone, Debug)]
pub struct VmdCameraAnimation {
    track: CameraMotionTrack,
}

impl VmdCameraAnimation {
    /// 从 VMD 的相机关键帧创建；没有相机关键帧时返回错误
    pub fn create(vmd: &VmdFile) -> Result<Self> {
        if vmd.camera_keyframes.is_empty() {
            return Err(MmdError::Animation("VMD has no camera keyframes".to_string()));
        }

        let mut track = CameraMotionTrack::new();
        for keyframe in &vmd.camera_keyframes {
            track.insert_keyframe(keyframe.clone());
        }
        Ok(Self { track })
    }

    pub fn keyframe_count(&self) -> usize {
        self.track.keyframes.len()
    }

    pub fn max_frame(&self) -> u32 {
        self.track.max_frame()
    }

    /// 求值指定帧（浮点帧号）
    pub fn evaluate(&self, frame: f32) -> MmdCamera {
        self.track.sample(frame).unwrap_or(MmdCamera {
            interest: Vec3::new(0.0, 10.0, 0.0),
            rotate: Vec3::ZERO,
            distance: 45.0,
            fov: 30f32.to_radians(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::CameraKeyframe;

    fn camera_vmd() -> VmdFile {
        let mut a = CameraKeyframe::new(0);
        a.interest = Vec3::new(0.0, 10.0, 0.0);
        a.distance = 45.0;
        a.fov = 30.0;
        let mut b = a.clone();
        b.frame = 30;
        b.distance = 15.0;

        VmdFile {
            camera_keyframes: vec![a, b],
            ..Default::default()
        }
    }

    #[test]
    fn test_create_requires_camera_keys() {
        assert!(VmdCameraAnimation::create(&VmdFile::default()).is_err());
        assert_eq!(VmdCameraAnimation::create(&camera_vmd()).unwrap().keyframe_count(), 2);
    }

    #[test]
    fn test_look_at_without_rotation() {
        let animation = VmdCameraAnimation::create(&camera_vmd()).unwrap();
        let look = LookAtCamera::from(&animation.evaluate(0.0));

        assert!(look.eye.abs_diff_eq(Vec3::new(0.0, 10.0, 45.0), 1e-5));
        assert!(look.center.abs_diff_eq(Vec3::new(0.0, 10.0, 44.0), 1e-5));
        assert!(look.up.abs_diff_eq(Vec3::Y, 1e-5));
    }

    #[test]
    fn test_distance_animates() {
        let animation = VmdCameraAnimation::create(&camera_vmd()).unwrap();
        let look = LookAtCamera::from(&animation.evaluate(15.0));
        assert!((look.eye.z - 30.0).abs() < 1e-2);
    }

    #[test]
    fn test_yaw_orbits_around_interest() {
        let camera = MmdCamera {
            interest: Vec3::ZERO,
            rotate: Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0),
            distance: 10.0,
            fov: 0.5,
        };
        let look = LookAtCamera::from(&camera);
        assert!(look.eye.abs_diff_eq(Vec3::new(10.0, 0.0, 0.0), 1e-4));
        // 视线仍指向注视点
        let forward = (look.center - look.eye).normalize();
        assert!(forward.abs_diff_eq((camera.interest - look.eye).normalize(), 1e-4));
    }
}
