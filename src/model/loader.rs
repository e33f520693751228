//! 模型加载入口与 PMX 加载器

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use glam::{Vec2, Vec3};
use mmd::pmx::material::Toon;
use mmd::pmx::types::DefaultConfig;
use mmd::pmx::weight_deform::WeightDeform;
use mmd::{BoneReader, HeaderReader, MaterialReader, SurfaceReader, TextureReader, VertexReader};

use crate::skeleton::{Bone, BoneManager};
use crate::{MmdError, Result};

use super::{
    find_out_of_range, resolve_texture_path, shared_toon_path, split_submeshes, MmdMaterial,
    MmdModel, RuntimeVertex, SphereMode, SubMesh, VertexWeight,
};

/// 模型文件格式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelFormat {
    Pmd,
    Pmx,
}

impl ModelFormat {
    /// 按扩展名判断格式（不区分大小写）
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("pmd") => Ok(ModelFormat::Pmd),
            Some("pmx") => Ok(ModelFormat::Pmx),
            _ => Err(MmdError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// 加载 PMD/PMX 模型
///
/// `resource_dir` 为共享 toon 贴图所在目录。
pub fn load_model<P: AsRef<Path>>(path: P, resource_dir: &Path) -> Result<MmdModel> {
    let path = path.as_ref();
    let model = match ModelFormat::from_path(path)? {
        ModelFormat::Pmd => super::load_pmd(path, resource_dir)?,
        ModelFormat::Pmx => load_pmx(path, resource_dir)?,
    };

    log::info!(
        "Model loaded: {} ({:?}, vertices={}, indices={}, materials={}, bones={})",
        path.display(),
        model.format,
        model.vertex_count(),
        model.index_count(),
        model.material_count(),
        model.bone_manager.bone_count()
    );
    Ok(model)
}

/// PMX 顶点索引字节数：能容纳顶点数的最小宽度
pub fn pmx_index_size(vertex_count: usize) -> usize {
    if vertex_count <= u8::MAX as usize + 1 {
        1
    } else if vertex_count <= u16::MAX as usize + 1 {
        2
    } else {
        4
    }
}

/// 从 PMX 文件加载模型
pub fn load_pmx<P: AsRef<Path>>(path: P, resource_dir: &Path) -> Result<MmdModel> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let model_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

    // 读取头部
    let header_reader = HeaderReader::new(&mut reader)
        .map_err(pmx_err("header"))?;
    let model_name = header_reader.model_local_name.clone();

    // 读取顶点
    let mut vertex_reader = VertexReader::new(header_reader)
        .map_err(pmx_err("vertex reader"))?;

    let mut vertices = Vec::new();
    let mut weights = Vec::new();
    while let Some(v) = vertex_reader
        .next::<DefaultConfig>()
        .map_err(pmx_err("vertex"))?
    {
        // MMD使用左手坐标系，翻转Z轴转换为右手坐标系
        vertices.push(RuntimeVertex {
            position: Vec3::new(v.position[0], v.position[1], -v.position[2]),
            normal: Vec3::new(v.normal[0], v.normal[1], -v.normal[2]),
            uv: Vec2::new(v.uv[0], v.uv[1]),
        });
        weights.push(convert_weight_deform(v.weight_deform));
    }

    // 读取面
    let mut surface_reader = SurfaceReader::new(vertex_reader)
        .map_err(pmx_err("surface reader"))?;

    let mut indices: Vec<u32> = Vec::new();
    while let Some(triangle) = surface_reader
        .next::<DefaultConfig>()
        .map_err(pmx_err("surface"))?
    {
        // 翻转Z轴后反转三角形顺序以保持正面朝向
        indices.push(triangle[2] as u32);
        indices.push(triangle[1] as u32);
        indices.push(triangle[0] as u32);
    }

    // 读取纹理
    let mut texture_reader = TextureReader::new(surface_reader)
        .map_err(pmx_err("texture reader"))?;

    let mut texture_paths = Vec::new();
    while let Some(tex_path) = texture_reader
        .next()
        .map_err(pmx_err("texture"))?
    {
        texture_paths.push(resolve_texture_path(&model_dir, &tex_path));
    }
    let texture_at = |index: i32| -> Option<String> {
        usize::try_from(index)
            .ok()
            .and_then(|i| texture_paths.get(i))
            .cloned()
    };

    // 读取材质
    let mut material_reader = MaterialReader::new(texture_reader)
        .map_err(pmx_err("material reader"))?;

    let mut materials = Vec::new();
    let mut surface_counts = Vec::new();
    while let Some(mat) = material_reader
        .next::<DefaultConfig>()
        .map_err(pmx_err("material"))?
    {
        surface_counts.push(mat.surface_count);

        let sphere_texture = texture_at(mat.environment_index);
        let sphere_mode = sphere_texture
            .as_deref()
            .map(SphereMode::from_texture_path)
            .unwrap_or_default();
        let toon_texture = match mat.toon {
            Toon::Texture(idx) => texture_at(idx),
            Toon::Internal(idx) => Some(shared_toon_path(resource_dir, idx as usize)),
        };

        materials.push(MmdMaterial {
            name: mat.local_name.clone(),
            diffuse: Vec3::new(mat.diffuse_color[0], mat.diffuse_color[1], mat.diffuse_color[2]),
            alpha: mat.diffuse_color[3],
            specular: vec3_from_arr(mat.specular_color),
            specular_power: mat.specular_strength,
            ambient: vec3_from_arr(mat.ambient_color),
            texture: texture_at(mat.texture_index),
            sphere_texture,
            sphere_mode,
            toon_texture,
            both_face: mat.draw_flags.bits() & 0x01 != 0,
            ..MmdMaterial::default()
        });
    }

    let submeshes = pmx_submeshes(&surface_counts, indices.len())?;

    // 读取骨骼
    let mut bone_reader = BoneReader::new(material_reader)
        .map_err(pmx_err("bone reader"))?;

    let mut bone_manager = BoneManager::new();
    while let Some(bone) = bone_reader
        .next::<DefaultConfig>()
        .map_err(pmx_err("bone"))?
    {
        bone_manager.add_bone(Bone::from_pmx_bone(&bone));
    }
    bone_manager.build_hierarchy();

    // Morph / 刚体 / 关节不参与显示，不再继续读取
    let mut model = MmdModel::new(ModelFormat::Pmx);
    model.name = model_name;
    let index_size = pmx_index_size(vertices.len());
    model.vertices = vertices;
    model.weights = weights;
    model.set_indices(indices, index_size);
    model.submeshes = submeshes;
    model.materials = materials;
    model.bone_manager = bone_manager;
    model.finish_loading();

    Ok(model)
}

/// 由各材质的面索引数构建子网格，负数或越界的索引数视为解析错误
fn pmx_submeshes(surface_counts: &[i32], index_len: usize) -> Result<Vec<SubMesh>> {
    let mut counts = Vec::with_capacity(surface_counts.len());
    for (material_id, &count) in surface_counts.iter().enumerate() {
        let count = u32::try_from(count).map_err(|_| {
            MmdError::PmxParse(format!("Material {} has negative index count {}", material_id, count))
        })?;
        counts.push(count);
    }

    let submeshes = split_submeshes(counts);
    if let Some(bad) = find_out_of_range(&submeshes, index_len) {
        return Err(MmdError::PmxParse(format!(
            "Material {} indices {:?} exceed index count {}",
            bad.material_id,
            bad.index_range(),
            index_len
        )));
    }
    Ok(submeshes)
}

fn pmx_err<E: std::fmt::Debug>(stage: &'static str) -> impl Fn(E) -> MmdError {
    move |e| MmdError::PmxParse(format!("Failed to read {}: {:?}", stage, e))
}

fn vec3_from_arr(v: [f32; 3]) -> Vec3 {
    Vec3::new(v[0], v[1], v[2])
}

fn convert_weight_deform(wd: WeightDeform<DefaultConfig>) -> VertexWeight {
    match wd {
        WeightDeform::Bdef1(bdef1) => VertexWeight::Bdef1 {
            bone: bdef1.bone_index,
        },
        WeightDeform::Bdef2(bdef2) => VertexWeight::Bdef2 {
            bones: [bdef2.bone_1_index, bdef2.bone_2_index],
            weight: bdef2.bone_1_weight,
        },
        WeightDeform::Bdef4(bdef4) => VertexWeight::Bdef4 {
            bones: [bdef4.bone_1_index, bdef4.bone_2_index, bdef4.bone_3_index, bdef4.bone_4_index],
            weights: [bdef4.bone_1_weight, bdef4.bone_2_weight, bdef4.bone_3_weight, bdef4.bone_4_weight],
        },
        WeightDeform::Sdef(sdef) => VertexWeight::Sdef {
            bones: [sdef.bone_1_index, sdef.bone_2_index],
            weight: sdef.bone_1_weight,
            c: vec3_from_arr(sdef.c),
            r0: vec3_from_arr(sdef.r0),
            r1: vec3_from_arr(sdef.r1),
        },
        WeightDeform::Qdef(qdef) => VertexWeight::Qdef {
            bones: [qdef.bone_1_index, qdef.bone_2_index, qdef.bone_3_index, qdef.bone_4_index],
            weights: [qdef.bone_1_weight, qdef.bone_2_weight, qdef.bone_3_weight, qdef.bone_4_weight],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ModelFormat::from_path("a/b.PMX").unwrap(), ModelFormat::Pmx);
        assert_eq!(ModelFormat::from_path("a/b.pmd").unwrap(), ModelFormat::Pmd);
        assert!(matches!(
            ModelFormat::from_path("a/b.obj"),
            Err(MmdError::UnsupportedFormat(_))
        ));
        assert!(ModelFormat::from_path("noext").is_err());
    }

    #[test]
    fn test_pmx_index_size_is_smallest_fitting_width() {
        assert_eq!(pmx_index_size(3), 1);
        assert_eq!(pmx_index_size(256), 1);
        assert_eq!(pmx_index_size(257), 2);
        assert_eq!(pmx_index_size(65536), 2);
        assert_eq!(pmx_index_size(65537), 4);
    }

    #[test]
    fn test_unsupported_format_is_rejected_before_io() {
        let result = load_model("/nonexistent/model.x", Path::new("."));
        assert!(matches!(result, Err(MmdError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_pmx_submeshes_follow_surface_counts() {
        let submeshes = pmx_submeshes(&[6, 0, 3], 9).unwrap();
        assert_eq!(submeshes.len(), 3);
        assert_eq!(submeshes[2].index_range(), 6..9);
    }

    #[test]
    fn test_pmx_negative_surface_count_is_parse_error() {
        assert!(matches!(pmx_submeshes(&[3, -3], 6), Err(MmdError::PmxParse(_))));
    }

    #[test]
    fn test_pmx_surface_count_beyond_indices_is_parse_error() {
        assert!(matches!(pmx_submeshes(&[3, 300], 6), Err(MmdError::PmxParse(_))));
        assert!(matches!(pmx_submeshes(&[i32::MAX, i32::MAX, 2], 6), Err(MmdError::PmxParse(_))));
    }
}
