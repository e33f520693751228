//! MMD 模型运行时管理

use glam::{Vec2, Vec3};

use crate::skeleton::BoneManager;
use crate::skinning::{skin_vertices, SkinningInput};

use super::{MmdMaterial, ModelFormat, RuntimeVertex, SubMesh, VertexWeight};

/// MMD 运行时模型
pub struct MmdModel {
    // 静态数据
    pub name: String,
    pub format: ModelFormat,
    pub vertices: Vec<RuntimeVertex>,
    pub weights: Vec<VertexWeight>,
    pub(crate) indices: Vec<u32>,
    /// 文件中的索引元素字节数（1/2/4）
    pub(crate) index_element_size: usize,
    pub materials: Vec<MmdMaterial>,
    pub submeshes: Vec<SubMesh>,

    // 子系统
    pub bone_manager: BoneManager,

    // 运行时数据（蒙皮结果）
    update_positions: Vec<Vec3>,
    update_normals: Vec<Vec3>,
    update_uvs: Vec<Vec2>,
    // 原始顶点的 SoA 拷贝，供蒙皮并行读取
    base_positions: Vec<Vec3>,
    base_normals: Vec<Vec3>,
}

impl MmdModel {
    /// 创建空模型
    pub fn new(format: ModelFormat) -> Self {
        Self {
            name: String::new(),
            format,
            vertices: Vec::new(),
            weights: Vec::new(),
            indices: Vec::new(),
            index_element_size: 4,
            materials: Vec::new(),
            submeshes: Vec::new(),
            bone_manager: BoneManager::new(),
            update_positions: Vec::new(),
            update_normals: Vec::new(),
            update_uvs: Vec::new(),
            base_positions: Vec::new(),
            base_normals: Vec::new(),
        }
    }

    /// 设置索引数据
    pub fn set_indices(&mut self, indices: Vec<u32>, element_size: usize) {
        self.indices = indices;
        self.index_element_size = element_size;
    }

    /// 加载完成后准备运行时缓冲区，蒙皮输出初始化为绑定姿势
    pub fn finish_loading(&mut self) {
        self.base_positions = self.vertices.iter().map(|v| v.position).collect();
        self.base_normals = self.vertices.iter().map(|v| v.normal).collect();
        self.update_positions = self.base_positions.clone();
        self.update_normals = self.base_normals.clone();
        self.update_uvs = self.vertices.iter().map(|v| v.uv).collect();
        if self.weights.len() != self.vertices.len() {
            self.weights.resize(self.vertices.len(), VertexWeight::default());
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn index_element_size(&self) -> usize {
        self.index_element_size
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn submesh_count(&self) -> usize {
        self.submeshes.len()
    }

    // ========== 动画 ==========

    /// 初始化动画状态
    pub fn initialize_animation(&mut self) {
        self.bone_manager.begin_update();
        self.bone_manager.update_transforms();
        self.bone_manager.end_update();
    }

    /// 开始动画帧
    pub fn begin_animation(&mut self) {
        self.bone_manager.begin_update();
    }

    /// 更新骨骼动画（正向运动学）
    pub fn update_animation(&mut self) {
        self.bone_manager.update_transforms();
    }

    /// 结束动画帧：计算蒙皮矩阵
    pub fn end_animation(&mut self) {
        self.bone_manager.end_update();
    }

    /// 物理更新：不做刚体模拟，骨骼状态保持不变
    pub fn update_physics(&mut self, _elapsed: f32) {}

    /// 更新顶点（蒙皮计算）- 使用 rayon 并行加速
    pub fn update(&mut self) {
        let input = SkinningInput {
            positions: &self.base_positions,
            normals: &self.base_normals,
            weights: &self.weights,
            bone_matrices: self.bone_manager.get_skinning_matrices(),
        };
        skin_vertices(&input, &mut self.update_positions, &mut self.update_normals);
    }

    pub fn update_positions(&self) -> &[Vec3] {
        &self.update_positions
    }

    pub fn update_normals(&self) -> &[Vec3] {
        &self.update_normals
    }

    pub fn update_uvs(&self) -> &[Vec2] {
        &self.update_uvs
    }
}
