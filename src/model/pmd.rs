//! PMD 模型加载器
//!
//! PMD 为固定布局的小端二进制格式，名称为 Shift-JIS 定长字符串。
//! 读取头部、顶点、面、材质、骨骼；IK/表情/显示枠只跳过，
//! 末尾的英文名与 toon 贴图名扩展段存在时读取 toon 名。

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use encoding_rs::SHIFT_JIS;
use glam::{Vec2, Vec3};

use crate::skeleton::{Bone, BoneManager};
use crate::{MmdError, Result};

use super::{
    find_out_of_range, normalize_path, resolve_texture_path, shared_toon_path, split_submeshes,
    MmdMaterial, MmdModel, ModelFormat, RuntimeVertex, SphereMode, VertexWeight,
};

const TOON_COUNT: usize = 10;
/// 预分配上限，计数字段不可信
const MAX_PREALLOC: usize = 1 << 20;

/// 从 PMD 文件加载模型
pub fn load_pmd<P: AsRef<Path>>(path: P, resource_dir: &Path) -> Result<MmdModel> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    let model_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    read_pmd(&mut reader, &model_dir, resource_dir)
}

fn pmd_err(what: &'static str) -> impl FnOnce(io::Error) -> MmdError {
    move |e| MmdError::PmdParse(format!("Failed to read {}: {}", what, e))
}

/// 从读取器解析 PMD
pub fn read_pmd<R: Read>(reader: &mut R, model_dir: &Path, resource_dir: &Path) -> Result<MmdModel> {
    // ========== 头部 ==========
    let mut magic = [0u8; 3];
    reader.read_exact(&mut magic).map_err(pmd_err("magic"))?;
    if &magic != b"Pmd" {
        return Err(MmdError::PmdParse("Invalid PMD magic".to_string()));
    }
    let _version = reader.read_f32::<LittleEndian>().map_err(pmd_err("version"))?;
    let name = read_sjis(reader, 20).map_err(pmd_err("model name"))?;
    let _comment = read_sjis(reader, 256).map_err(pmd_err("comment"))?;

    // ========== 顶点 ==========
    let vertex_count = reader.read_u32::<LittleEndian>().map_err(pmd_err("vertex count"))? as usize;
    let mut vertices = Vec::with_capacity(vertex_count.min(MAX_PREALLOC));
    let mut weights = Vec::with_capacity(vertex_count.min(MAX_PREALLOC));
    for _ in 0..vertex_count {
        let position = read_vec3(reader).map_err(pmd_err("vertex position"))?;
        let normal = read_vec3(reader).map_err(pmd_err("vertex normal"))?;
        let u = reader.read_f32::<LittleEndian>().map_err(pmd_err("vertex uv"))?;
        let v = reader.read_f32::<LittleEndian>().map_err(pmd_err("vertex uv"))?;
        let bone0 = reader.read_u16::<LittleEndian>().map_err(pmd_err("vertex bone"))?;
        let bone1 = reader.read_u16::<LittleEndian>().map_err(pmd_err("vertex bone"))?;
        let weight = reader.read_u8().map_err(pmd_err("vertex weight"))?;
        let _edge = reader.read_u8().map_err(pmd_err("vertex edge flag"))?;

        vertices.push(RuntimeVertex {
            position: flip_z(position),
            normal: flip_z(normal),
            uv: Vec2::new(u, v),
        });
        weights.push(VertexWeight::Bdef2 {
            bones: [bone0 as i32, bone1 as i32],
            weight: weight as f32 / 100.0,
        });
    }

    // ========== 面 ==========
    let index_count = reader.read_u32::<LittleEndian>().map_err(pmd_err("index count"))? as usize;
    let mut raw_indices = Vec::with_capacity(index_count.min(MAX_PREALLOC));
    for _ in 0..index_count {
        raw_indices.push(reader.read_u16::<LittleEndian>().map_err(pmd_err("index"))? as u32);
    }
    // 翻转Z轴后反转三角形顺序以保持正面朝向
    let indices: Vec<u32> = raw_indices
        .chunks(3)
        .flat_map(|tri| tri.iter().rev().copied())
        .collect();

    // ========== 材质 ==========
    let material_count = reader.read_u32::<LittleEndian>().map_err(pmd_err("material count"))? as usize;
    let mut raw_materials = Vec::with_capacity(material_count.min(MAX_PREALLOC));
    for _ in 0..material_count {
        raw_materials.push(PmdMaterial::read(reader).map_err(pmd_err("material"))?);
    }

    // ========== 骨骼 ==========
    let bone_count = reader.read_u16::<LittleEndian>().map_err(pmd_err("bone count"))? as usize;
    let mut bone_manager = BoneManager::new();
    for _ in 0..bone_count {
        let bone_name = read_sjis(reader, 20).map_err(pmd_err("bone name"))?;
        let parent = reader.read_u16::<LittleEndian>().map_err(pmd_err("bone parent"))?;
        let _tail = reader.read_u16::<LittleEndian>().map_err(pmd_err("bone tail"))?;
        let _kind = reader.read_u8().map_err(pmd_err("bone type"))?;
        let _ik_parent = reader.read_u16::<LittleEndian>().map_err(pmd_err("bone ik parent"))?;
        let position = read_vec3(reader).map_err(pmd_err("bone position"))?;

        let mut bone = Bone::new(bone_name);
        bone.parent = (parent != u16::MAX).then_some(parent as usize);
        bone.bind_position = flip_z(position);
        bone_manager.add_bone(bone);
    }
    bone_manager.build_hierarchy();

    // ========== 跳过 IK / 表情 / 显示枠 ==========
    let ik_count = reader.read_u16::<LittleEndian>().map_err(pmd_err("ik count"))?;
    for _ in 0..ik_count {
        skip(reader, 2 + 2).map_err(pmd_err("ik"))?;
        let chain_len = reader.read_u8().map_err(pmd_err("ik chain"))? as u64;
        skip(reader, 2 + 4 + chain_len * 2).map_err(pmd_err("ik chain"))?;
    }

    let morph_count = reader.read_u16::<LittleEndian>().map_err(pmd_err("morph count"))? as u64;
    for _ in 0..morph_count {
        skip(reader, 20).map_err(pmd_err("morph name"))?;
        let morph_vertices = reader.read_u32::<LittleEndian>().map_err(pmd_err("morph"))? as u64;
        skip(reader, 1 + morph_vertices * 16).map_err(pmd_err("morph vertices"))?;
    }

    let morph_display = reader.read_u8().map_err(pmd_err("morph display"))? as u64;
    skip(reader, morph_display * 2).map_err(pmd_err("morph display"))?;
    let bone_display_names = reader.read_u8().map_err(pmd_err("bone display names"))? as u64;
    skip(reader, bone_display_names * 50).map_err(pmd_err("bone display names"))?;
    let bone_display = reader.read_u32::<LittleEndian>().map_err(pmd_err("bone display"))? as u64;
    skip(reader, bone_display * 3).map_err(pmd_err("bone display"))?;

    // ========== 扩展段（可选）==========
    let toon_names = read_extension(
        reader,
        bone_count as u64,
        morph_count,
        bone_display_names,
    )?;

    let toon_paths: Vec<String> = toon_names
        .iter()
        .enumerate()
        .map(|(i, name)| resolve_toon(model_dir, resource_dir, i, name))
        .collect();

    let materials: Vec<MmdMaterial> = raw_materials
        .iter()
        .map(|m| m.to_material(model_dir, &toon_paths))
        .collect();

    let submeshes = split_submeshes(raw_materials.iter().map(|m| m.index_count));
    if let Some(bad) = find_out_of_range(&submeshes, indices.len()) {
        return Err(MmdError::PmdParse(format!(
            "Material {} indices {:?} exceed index count {}",
            bad.material_id,
            bad.index_range(),
            indices.len()
        )));
    }

    let mut model = MmdModel::new(ModelFormat::Pmd);
    model.name = name;
    model.vertices = vertices;
    model.weights = weights;
    model.set_indices(indices, 2);
    model.submeshes = submeshes;
    model.materials = materials;
    model.bone_manager = bone_manager;
    model.finish_loading();

    Ok(model)
}

/// PMD 材质原始数据
struct PmdMaterial {
    diffuse: Vec3,
    alpha: f32,
    specular_power: f32,
    specular: Vec3,
    ambient: Vec3,
    toon_index: u8,
    index_count: u32,
    texture_name: String,
}

impl PmdMaterial {
    fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        let diffuse = read_vec3(reader)?;
        let alpha = reader.read_f32::<LittleEndian>()?;
        let specular_power = reader.read_f32::<LittleEndian>()?;
        let specular = read_vec3(reader)?;
        let ambient = read_vec3(reader)?;
        let toon_index = reader.read_u8()?;
        let _edge_flag = reader.read_u8()?;
        let index_count = reader.read_u32::<LittleEndian>()?;
        let texture_name = read_sjis(reader, 20)?;

        Ok(Self {
            diffuse,
            alpha,
            specular_power,
            specular,
            ambient,
            toon_index,
            index_count,
            texture_name,
        })
    }

    fn to_material(&self, model_dir: &Path, toon_paths: &[String]) -> MmdMaterial {
        let (texture, sphere) = split_texture_name(&self.texture_name);
        let sphere_texture = sphere.map(|s| resolve_texture_path(model_dir, s));
        let sphere_mode = sphere_texture
            .as_deref()
            .map(SphereMode::from_texture_path)
            .unwrap_or_default();

        MmdMaterial {
            diffuse: self.diffuse,
            alpha: self.alpha,
            specular: self.specular,
            specular_power: self.specular_power,
            ambient: self.ambient,
            texture: texture.map(|t| resolve_texture_path(model_dir, t)),
            sphere_texture,
            sphere_mode,
            toon_texture: toon_paths.get(self.toon_index as usize).cloned(),
            // PMD 没有双面标志，半透明材质按双面绘制
            both_face: self.alpha < 1.0,
            ..MmdMaterial::default()
        }
    }
}

/// 拆分 `tex.bmp*sphere.sph` 形式的贴图名，返回 (普通贴图, 球面贴图)
pub(crate) fn split_texture_name(name: &str) -> (Option<&str>, Option<&str>) {
    let is_sphere = |s: &str| {
        let lower = s.to_ascii_lowercase();
        lower.ends_with(".sph") || lower.ends_with(".spa")
    };
    match name.split_once('*') {
        Some((tex, sphere)) => (non_empty(tex), non_empty(sphere)),
        None if is_sphere(name) => (None, non_empty(name)),
        None => (non_empty(name), None),
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// 读取扩展段，返回 10 个 toon 贴图名（缺省为 toon01.bmp ~ toon10.bmp）
fn read_extension<R: Read>(
    reader: &mut R,
    bone_count: u64,
    morph_count: u64,
    bone_display_names: u64,
) -> Result<Vec<String>> {
    let mut names: Vec<String> = (1..=TOON_COUNT).map(|i| format!("toon{:02}.bmp", i)).collect();

    let has_english = match reader.read_u8() {
        Ok(flag) => flag != 0,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(names),
        Err(e) => return Err(pmd_err("english flag")(e)),
    };
    if has_english {
        let morph_names = morph_count.saturating_sub(1);
        skip(reader, 20 + 256 + bone_count * 20 + morph_names * 20 + bone_display_names * 50)
            .map_err(pmd_err("english names"))?;
    }

    for name in names.iter_mut() {
        match read_sjis(reader, 100) {
            Ok(toon) if !toon.is_empty() => *name = toon,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(pmd_err("toon names")(e)),
        }
    }
    Ok(names)
}

/// toon 贴图优先在模型目录查找，其次在共享资源目录
fn resolve_toon(model_dir: &Path, resource_dir: &Path, index: usize, name: &str) -> String {
    let local = model_dir.join(name);
    if local.is_file() {
        return normalize_path(&local);
    }
    if name.eq_ignore_ascii_case(&format!("toon{:02}.bmp", index + 1)) {
        return shared_toon_path(resource_dir, index);
    }
    normalize_path(&resource_dir.join(name))
}

fn flip_z(v: Vec3) -> Vec3 {
    Vec3::new(v.x, v.y, -v.z)
}

fn read_vec3<R: Read>(reader: &mut R) -> io::Result<Vec3> {
    Ok(Vec3::new(
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
    ))
}

/// 读取定长 Shift-JIS 字符串（截断到第一个 NUL）
pub(crate) fn read_sjis<R: Read>(reader: &mut R, len: usize) -> io::Result<String> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(len);
    let (text, _, _) = SHIFT_JIS.decode(&buf[..end]);
    Ok(text.trim_end().to_string())
}

fn skip<R: Read>(reader: &mut R, count: u64) -> io::Result<()> {
    let skipped = io::copy(&mut reader.by_ref().take(count), &mut io::sink())?;
    if skipped < count {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected end of file"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::{Cursor, Write};

    fn write_fixed(out: &mut Vec<u8>, text: &str, len: usize) {
        let mut buf = text.as_bytes().to_vec();
        buf.resize(len, 0);
        out.write_all(&buf).unwrap();
    }

    fn write_vec3(out: &mut Vec<u8>, v: [f32; 3]) {
        for c in v {
            out.write_f32::<LittleEndian>(c).unwrap();
        }
    }

    /// 一个三角形、一个材质、一个骨骼的最小 PMD
    fn tiny_pmd(texture_name: &str, toon_index: u8, alpha: f32) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_all(b"Pmd").unwrap();
        out.write_f32::<LittleEndian>(1.0).unwrap();
        write_fixed(&mut out, "tiny", 20);
        write_fixed(&mut out, "", 256);

        out.write_u32::<LittleEndian>(3).unwrap();
        for p in [[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 1.0]] {
            write_vec3(&mut out, p);
            write_vec3(&mut out, [0.0, 0.0, -1.0]);
            out.write_f32::<LittleEndian>(0.5).unwrap();
            out.write_f32::<LittleEndian>(0.25).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u8(100).unwrap();
            out.write_u8(0).unwrap();
        }

        out.write_u32::<LittleEndian>(3).unwrap();
        for i in [0u16, 1, 2] {
            out.write_u16::<LittleEndian>(i).unwrap();
        }

        out.write_u32::<LittleEndian>(1).unwrap();
        write_vec3(&mut out, [0.8, 0.8, 0.8]);
        out.write_f32::<LittleEndian>(alpha).unwrap();
        out.write_f32::<LittleEndian>(5.0).unwrap();
        write_vec3(&mut out, [0.1, 0.1, 0.1]);
        write_vec3(&mut out, [0.4, 0.4, 0.4]);
        out.write_u8(toon_index).unwrap();
        out.write_u8(1).unwrap();
        out.write_u32::<LittleEndian>(3).unwrap();
        write_fixed(&mut out, texture_name, 20);

        out.write_u16::<LittleEndian>(1).unwrap();
        write_fixed(&mut out, "center", 20);
        out.write_u16::<LittleEndian>(u16::MAX).unwrap();
        out.write_u16::<LittleEndian>(u16::MAX).unwrap();
        out.write_u8(0).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        write_vec3(&mut out, [0.0, 1.0, 2.0]);

        out.write_u16::<LittleEndian>(0).unwrap(); // ik
        out.write_u16::<LittleEndian>(0).unwrap(); // morph
        out.write_u8(0).unwrap(); // morph display
        out.write_u8(0).unwrap(); // bone display names
        out.write_u32::<LittleEndian>(0).unwrap(); // bone display
        out
    }

    #[test]
    fn test_read_minimal_pmd() {
        let data = tiny_pmd("body.bmp*env.spa", 0, 1.0);
        let model = read_pmd(&mut Cursor::new(data), Path::new("models"), Path::new("res")).unwrap();

        assert_eq!(model.name, "tiny");
        assert_eq!(model.format, ModelFormat::Pmd);
        assert_eq!(model.vertex_count(), 3);
        assert_eq!(model.index_element_size(), 2);
        // 绕序反转
        assert_eq!(model.indices(), &[2, 1, 0]);
        // Z 翻转
        assert_eq!(model.vertices[0].position, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(model.vertices[0].uv, Vec2::new(0.5, 0.25));

        assert_eq!(model.submeshes.len(), 1);
        assert_eq!(model.submeshes[0].index_range(), 0..3);

        let mat = &model.materials[0];
        assert_eq!(mat.texture.as_deref(), Some("models/body.bmp"));
        assert_eq!(mat.sphere_texture.as_deref(), Some("models/env.spa"));
        assert_eq!(mat.sphere_mode, SphereMode::Add);
        assert_eq!(mat.toon_texture.as_deref(), Some("res/toon01.bmp"));
        assert!(!mat.both_face);

        let bone = model.bone_manager.get_bone(0).unwrap();
        assert_eq!(bone.parent, None);
        assert_eq!(bone.bind_position, Vec3::new(0.0, 1.0, -2.0));
    }

    #[test]
    fn test_no_toon_and_translucent_material() {
        let data = tiny_pmd("", 255, 0.5);
        let model = read_pmd(&mut Cursor::new(data), Path::new("m"), Path::new("r")).unwrap();
        let mat = &model.materials[0];
        assert!(mat.texture.is_none());
        assert!(mat.toon_texture.is_none());
        assert_eq!(mat.sphere_mode, SphereMode::None);
        assert!(mat.both_face);
    }

    #[test]
    fn test_toon_names_from_extension() {
        let mut data = tiny_pmd("a.png", 2, 1.0);
        data.write_u8(0).unwrap(); // 无英文名
        for i in 0..TOON_COUNT {
            let name = if i == 2 { "custom.bmp".to_string() } else { format!("toon{:02}.bmp", i + 1) };
            write_fixed(&mut data, &name, 100);
        }

        let model = read_pmd(&mut Cursor::new(data), Path::new("m"), Path::new("r")).unwrap();
        assert_eq!(model.materials[0].toon_texture.as_deref(), Some("r/custom.bmp"));
    }

    #[test]
    fn test_bad_magic_is_parse_error() {
        let result = read_pmd(&mut Cursor::new(b"Pmx0000".to_vec()), Path::new("."), Path::new("."));
        assert!(matches!(result, Err(MmdError::PmdParse(_))));
    }

    #[test]
    fn test_huge_vertex_count_fails_without_allocating() {
        let mut data = tiny_pmd("a.bmp", 0, 1.0);
        // 头部 3 + 4 + 20 + 256 字节后为顶点数
        data[283..287].copy_from_slice(&u32::MAX.to_le_bytes());
        let result = read_pmd(&mut Cursor::new(data), Path::new("."), Path::new("."));
        assert!(matches!(result, Err(MmdError::PmdParse(_))));
    }

    #[test]
    fn test_material_index_count_beyond_indices() {
        let mut data = tiny_pmd("a.bmp", 0, 1.0);
        // 3 个顶点 (38 字节) 与 3 个索引之后，材质数 4 字节，材质前 46 字节后为索引数
        let offset = 283 + 4 + 3 * 38 + 4 + 3 * 2 + 4 + 46;
        assert_eq!(&data[offset..offset + 4], &3u32.to_le_bytes());
        data[offset..offset + 4].copy_from_slice(&300u32.to_le_bytes());
        let result = read_pmd(&mut Cursor::new(data), Path::new("."), Path::new("."));
        assert!(matches!(result, Err(MmdError::PmdParse(_))));
    }

    #[test]
    fn test_truncated_file_is_parse_error() {
        let mut data = tiny_pmd("a.bmp", 0, 1.0);
        data.truncate(200);
        assert!(read_pmd(&mut Cursor::new(data), Path::new("."), Path::new(".")).is_err());
    }

    #[test]
    fn test_split_texture_name() {
        assert_eq!(split_texture_name("a.bmp*b.sph"), (Some("a.bmp"), Some("b.sph")));
        assert_eq!(split_texture_name("b.SPA"), (None, Some("b.SPA")));
        assert_eq!(split_texture_name("a.bmp"), (Some("a.bmp"), None));
        assert_eq!(split_texture_name(""), (None, None));
    }
}
