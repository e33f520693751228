//! 骨骼管理器

use glam::{Mat4, Quat, Vec3};
use std::collections::HashMap;

use super::Bone;

/// 骨骼管理器
pub struct BoneManager {
    bones: Vec<Bone>,
    name_to_index: HashMap<String, usize>,
    /// 按变换层级排序的根骨骼
    sorted_roots: Vec<usize>,
    children: Vec<Vec<usize>>,
    skinning_matrices: Vec<Mat4>,
}

impl BoneManager {
    pub fn new() -> Self {
        Self {
            bones: Vec::new(),
            name_to_index: HashMap::new(),
            sorted_roots: Vec::new(),
            children: Vec::new(),
            skinning_matrices: Vec::new(),
        }
    }

    /// 添加骨骼，同名骨骼以第一个为准
    pub fn add_bone(&mut self, bone: Bone) {
        let index = self.bones.len();
        self.name_to_index.entry(bone.name.clone()).or_insert(index);
        self.bones.push(bone);
    }

    /// 构建骨骼层级并计算逆绑定矩阵
    ///
    /// 父索引越界或指向自身的骨骼视为根骨骼。
    pub fn build_hierarchy(&mut self) {
        let bone_count = self.bones.len();
        self.children = vec![Vec::new(); bone_count];
        self.sorted_roots.clear();

        for i in 0..bone_count {
            match self.valid_parent(i) {
                Some(parent) => self.children[parent].push(i),
                None => self.sorted_roots.push(i),
            }
        }
        let bones = &self.bones;
        self.sorted_roots
            .sort_by_key(|&i| bones[i].transform_level);

        for i in 0..bone_count {
            let pos = self.bones[i].bind_position;
            let offset = match self.valid_parent(i) {
                Some(parent) => pos - self.bones[parent].bind_position,
                None => pos,
            };

            let bone = &mut self.bones[i];
            bone.bone_offset = offset;
            bone.global_transform = Mat4::from_translation(pos);
            bone.inverse_bind_matrix = bone.global_transform.inverse();
            bone.local_transform = Mat4::from_translation(offset);
        }

        // 初始状态下：skinning_matrix = global * inverse_bind = I
        self.skinning_matrices = vec![Mat4::IDENTITY; bone_count];
    }

    fn valid_parent(&self, index: usize) -> Option<usize> {
        self.bones[index]
            .parent
            .filter(|&parent| parent < self.bones.len() && parent != index)
    }

    /// 通过名称查找骨骼
    pub fn find_bone_by_name(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn get_bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    /// 开始更新：清空上一帧的动画状态
    pub fn begin_update(&mut self) {
        for bone in &mut self.bones {
            bone.reset_pose();
        }
    }

    /// 更新骨骼变换：先算本地变换，再从根骨骼向下传播全局变换
    pub fn update_transforms(&mut self) {
        for bone in &mut self.bones {
            bone.update_local_transform();
        }

        let mut stack: Vec<usize> = self.sorted_roots.iter().rev().copied().collect();
        while let Some(index) = stack.pop() {
            let global = match self.valid_parent(index) {
                Some(parent) => self.bones[parent].global_transform * self.bones[index].local_transform,
                None => self.bones[index].local_transform,
            };
            self.bones[index].global_transform = global;
            stack.extend(self.children[index].iter().rev());
        }
    }

    /// 结束更新：计算蒙皮矩阵
    pub fn end_update(&mut self) {
        for (matrix, bone) in self.skinning_matrices.iter_mut().zip(&self.bones) {
            *matrix = bone.skinning_matrix();
        }
    }

    pub fn set_bone_translation(&mut self, index: usize, translation: Vec3) {
        if let Some(bone) = self.bones.get_mut(index) {
            bone.pose_translation = translation;
        }
    }

    pub fn set_bone_rotation(&mut self, index: usize, rotation: Quat) {
        if let Some(bone) = self.bones.get_mut(index) {
            bone.pose_rotation = rotation;
        }
    }

    pub fn get_global_transform(&self, index: usize) -> Mat4 {
        self.bones
            .get(index)
            .map(|b| b.global_transform)
            .unwrap_or(Mat4::IDENTITY)
    }

    /// 获取所有蒙皮矩阵
    pub fn get_skinning_matrices(&self) -> &[Mat4] {
        &self.skinning_matrices
    }
}

impl Default for BoneManager {
    fn default() -> Self {
        Self::new()
    }
}
