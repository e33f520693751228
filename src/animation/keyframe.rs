//! 动画关键帧

use glam::{Quat, Vec3};

use super::BezierCurve;

/// 骨骼关键帧
#[derive(Clone, Debug)]
pub struct BoneKeyframe {
    pub frame: u32,
    pub translation: Vec3,
    pub rotation: Quat,
    pub interp_x: BezierCurve,
    pub interp_y: BezierCurve,
    pub interp_z: BezierCurve,
    pub interp_rotation: BezierCurve,
}

impl BoneKeyframe {
    pub fn new(frame: u32) -> Self {
        Self {
            frame,
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            interp_x: BezierCurve::linear(),
            interp_y: BezierCurve::linear(),
            interp_z: BezierCurve::linear(),
            interp_rotation: BezierCurve::linear(),
        }
    }

    /// 解析 64 字节插值表：每条曲线取第一行的 [i, i+4, i+8, i+12]
    pub fn set_interpolation(&mut self, table: &[u8; 64]) {
        let curve = |i: usize| BezierCurve::from_vmd_bytes(table[i], table[i + 4], table[i + 8], table[i + 12]);
        self.interp_x = curve(0);
        self.interp_y = curve(1);
        self.interp_z = curve(2);
        self.interp_rotation = curve(3);
    }
}

/// 相机关键帧（已转换为右手坐标系）
#[derive(Clone, Debug)]
pub struct CameraKeyframe {
    pub frame: u32,
    /// 注视点
    pub interest: Vec3,
    /// 欧拉角（弧度）
    pub rotation: Vec3,
    /// 注视点到相机的距离
    pub distance: f32,
    /// 垂直视场角（度）
    pub fov: f32,
    pub perspective: bool,
    pub interp_x: BezierCurve,
    pub interp_y: BezierCurve,
    pub interp_z: BezierCurve,
    pub interp_rotation: BezierCurve,
    pub interp_distance: BezierCurve,
    pub interp_fov: BezierCurve,
}

impl CameraKeyframe {
    pub fn new(frame: u32) -> Self {
        Self {
            frame,
            interest: Vec3::ZERO,
            rotation: Vec3::ZERO,
            distance: 45.0,
            fov: 30.0,
            perspective: true,
            interp_x: BezierCurve::linear(),
            interp_y: BezierCurve::linear(),
            interp_z: BezierCurve::linear(),
            interp_rotation: BezierCurve::linear(),
            interp_distance: BezierCurve::linear(),
            interp_fov: BezierCurve::linear(),
        }
    }

    /// 解析 24 字节插值表：6 条曲线，每条按 x1, x2, y1, y2 排列
    pub fn set_interpolation(&mut self, table: &[u8; 24]) {
        let curve = |i: usize| {
            let b = &table[i * 4..i * 4 + 4];
            BezierCurve::from_vmd_bytes(b[0], b[2], b[1], b[3])
        };
        self.interp_x = curve(0);
        self.interp_y = curve(1);
        self.interp_z = curve(2);
        self.interp_rotation = curve(3);
        self.interp_distance = curve(4);
        self.interp_fov = curve(5);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bone_interpolation_columns() {
        let mut table = [0u8; 64];
        table[0] = 10;
        table[4] = 20;
        table[8] = 30;
        table[12] = 40;
        table[3] = 127;

        let mut key = BoneKeyframe::new(0);
        key.set_interpolation(&table);
        assert_eq!(key.interp_x, BezierCurve::from_vmd_bytes(10, 20, 30, 40));
        assert_eq!(key.interp_rotation.x1, 1.0);
    }

    #[test]
    fn test_camera_interpolation_order() {
        let mut table = [0u8; 24];
        table[4..8].copy_from_slice(&[1, 2, 3, 4]);

        let mut key = CameraKeyframe::new(0);
        key.set_interpolation(&table);
        assert_eq!(key.interp_y, BezierCurve::from_vmd_bytes(1, 3, 2, 4));
    }
}
