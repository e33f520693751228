//! 线性混合蒙皮（rayon 并行）

use glam::{Mat4, Quat, Vec3};
use rayon::prelude::*;

use super::SkinningInput;
use crate::model::VertexWeight;

/// 对所有顶点做蒙皮，结果写入输出切片
///
/// 输出切片长度须与输入顶点数一致，多余部分保持不变。
pub fn skin_vertices(input: &SkinningInput, positions_out: &mut [Vec3], normals_out: &mut [Vec3]) {
    positions_out
        .par_iter_mut()
        .zip(normals_out.par_iter_mut())
        .zip(input.positions.par_iter())
        .zip(input.normals.par_iter())
        .zip(input.weights.par_iter())
        .for_each(|((((pos_out, norm_out), &position), &normal), weight)| {
            let (pos, norm) = skin_vertex(position, normal, weight, input.bone_matrices);
            *pos_out = pos;
            *norm_out = norm;
        });
}

/// 计算单个顶点的蒙皮
pub fn skin_vertex(position: Vec3, normal: Vec3, weight: &VertexWeight, matrices: &[Mat4]) -> (Vec3, Vec3) {
    match weight {
        VertexWeight::Bdef1 { bone } => {
            let m = get_matrix(matrices, *bone);
            (m.transform_point3(position), m.transform_vector3(normal).normalize_or_zero())
        }
        VertexWeight::Bdef2 { bones, weight } => blend(
            position,
            normal,
            [(bones[0], *weight), (bones[1], 1.0 - *weight)].into_iter(),
            matrices,
        ),
        VertexWeight::Bdef4 { bones, weights } | VertexWeight::Qdef { bones, weights } => blend(
            position,
            normal,
            bones.iter().copied().zip(weights.iter().copied()),
            matrices,
        ),
        VertexWeight::Sdef { bones, weight, c, .. } => {
            // SDEF 简化：中心点线性混合，偏移按骨骼旋转球面插值
            let m0 = get_matrix(matrices, bones[0]);
            let m1 = get_matrix(matrices, bones[1]);
            let w0 = *weight;
            let w1 = 1.0 - w0;

            let center = m0.transform_point3(*c) * w0 + m1.transform_point3(*c) * w1;
            let q = Quat::from_mat4(&m0).slerp(Quat::from_mat4(&m1), w1);
            let pos = center + q * (position - *c);
            let norm = (m0.transform_vector3(normal) * w0 + m1.transform_vector3(normal) * w1).normalize_or_zero();
            (pos, norm)
        }
    }
}

fn blend(
    position: Vec3,
    normal: Vec3,
    influences: impl Iterator<Item = (i32, f32)>,
    matrices: &[Mat4],
) -> (Vec3, Vec3) {
    let mut pos = Vec3::ZERO;
    let mut norm = Vec3::ZERO;
    for (bone, w) in influences {
        if w == 0.0 {
            continue;
        }
        let m = get_matrix(matrices, bone);
        pos += m.transform_point3(position) * w;
        norm += m.transform_vector3(normal) * w;
    }
    (pos, norm.normalize_or_zero())
}

fn get_matrix(matrices: &[Mat4], index: i32) -> Mat4 {
    if index < 0 {
        return Mat4::IDENTITY;
    }
    matrices.get(index as usize).copied().unwrap_or(Mat4::IDENTITY)
}
