//! 顶点蒙皮计算

mod skinning;

pub use skinning::{skin_vertex, skin_vertices};

use glam::{Mat4, Vec3};

use crate::model::VertexWeight;

/// 蒙皮输入数据
pub struct SkinningInput<'a> {
    /// 原始顶点位置
    pub positions: &'a [Vec3],
    /// 原始顶点法线
    pub normals: &'a [Vec3],
    /// 顶点权重
    pub weights: &'a [VertexWeight],
    /// 骨骼变换矩阵（已乘以逆绑定矩阵）
    pub bone_matrices: &'a [Mat4],
}
