//! 骨骼节点

use glam::{Mat4, Quat, Vec3};
use mmd::pmx::bone as pmx_bone;
use mmd::pmx::types::DefaultConfig;

/// 骨骼节点
///
/// 本地变换 = 平移(父骨骼到本骨骼的偏移 + 姿势平移) * 旋转(姿势旋转)。
#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,
    /// 父骨骼；`None` 为根骨骼
    pub parent: Option<usize>,
    /// 根骨骼按此层级排序
    pub transform_level: i32,

    /// 绑定姿势下的模型空间位置（右手坐标系）
    pub bind_position: Vec3,
    pub bone_offset: Vec3,
    pub inverse_bind_matrix: Mat4,

    // 当前帧姿势
    pub pose_translation: Vec3,
    pub pose_rotation: Quat,

    pub local_transform: Mat4,
    pub global_transform: Mat4,
}

impl Bone {
    pub fn new(name: String) -> Self {
        Self {
            name,
            parent: None,
            transform_level: 0,
            bind_position: Vec3::ZERO,
            bone_offset: Vec3::ZERO,
            inverse_bind_matrix: Mat4::IDENTITY,
            pose_translation: Vec3::ZERO,
            pose_rotation: Quat::IDENTITY,
            local_transform: Mat4::IDENTITY,
            global_transform: Mat4::IDENTITY,
        }
    }

    /// 文件中的父索引（负数表示无父骨骼）
    pub fn with_parent_index(mut self, parent: i32) -> Self {
        self.parent = usize::try_from(parent).ok();
        self
    }

    /// 从 PMX 骨骼创建，Z 轴翻转到右手坐标系
    pub fn from_pmx_bone(pmx: &pmx_bone::Bone<DefaultConfig>) -> Self {
        let mut bone = Self::new(pmx.local_name.clone()).with_parent_index(pmx.parent);
        bone.transform_level = pmx.transform_level;
        bone.bind_position = Vec3::new(pmx.position[0], pmx.position[1], -pmx.position[2]);
        bone
    }

    pub fn reset_pose(&mut self) {
        self.pose_translation = Vec3::ZERO;
        self.pose_rotation = Quat::IDENTITY;
    }

    pub fn update_local_transform(&mut self) {
        let translate = self.bone_offset + self.pose_translation;
        self.local_transform = Mat4::from_rotation_translation(self.pose_rotation, translate);
    }

    /// 蒙皮矩阵 = 全局变换 * 逆绑定矩阵
    pub fn skinning_matrix(&self) -> Mat4 {
        self.global_transform * self.inverse_bind_matrix
    }
}

impl Default for Bone {
    fn default() -> Self {
        Self::new(String::new())
    }
}
