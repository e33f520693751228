//! VMD 文件解析
//!
//! 读取骨骼关键帧与相机关键帧；表情关键帧只跳过。
//! 相机段在较老的文件中可能不存在。

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use encoding_rs::SHIFT_JIS;
use glam::{Quat, Vec3};

use super::{BoneKeyframe, CameraKeyframe};
use crate::{MmdError, Result};

/// VMD 头部 (两个版本前 25 字节不同，整体 30 字节)
const VMD_HEADER_V1: &[u8] = b"Vocaloid Motion Data file";
const VMD_HEADER_V2: &[u8] = b"Vocaloid Motion Data 0002";

/// 表情关键帧大小：名称 15 + 帧 4 + 权重 4
const MORPH_KEYFRAME_SIZE: u64 = 23;

/// VMD 文件数据
#[derive(Clone, Debug, Default)]
pub struct VmdFile {
    pub model_name: String,
    pub bone_keyframes: Vec<(String, BoneKeyframe)>,
    pub camera_keyframes: Vec<CameraKeyframe>,
}

impl VmdFile {
    /// 从文件加载 VMD
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let vmd = Self::load_from_reader(&mut reader)?;
        log::debug!(
            "VMD loaded: {} (bone keys={}, camera keys={})",
            path.display(),
            vmd.bone_keyframes.len(),
            vmd.camera_keyframes.len()
        );
        Ok(vmd)
    }

    /// 从字节切片加载 VMD
    pub fn load_from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::load_from_reader(&mut io::Cursor::new(bytes))
    }

    /// 从 Reader 加载 VMD
    pub fn load_from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut header = [0u8; 30];
        reader.read_exact(&mut header).map_err(vmd_err("header"))?;
        if header[..25] != VMD_HEADER_V1[..] && header[..25] != VMD_HEADER_V2[..] {
            return Err(MmdError::VmdParse("Invalid VMD header".to_string()));
        }

        let model_name = read_sjis(reader, 20).map_err(vmd_err("model name"))?;

        let bone_count = reader.read_u32::<LittleEndian>().map_err(vmd_err("bone keyframe count"))?;
        let mut bone_keyframes = Vec::with_capacity(bone_count.min(1 << 20) as usize);
        for _ in 0..bone_count {
            bone_keyframes.push(read_bone_keyframe(reader)?);
        }

        let morph_count = reader.read_u32::<LittleEndian>().map_err(vmd_err("morph keyframe count"))?;
        let to_skip = morph_count as u64 * MORPH_KEYFRAME_SIZE;
        let skipped = io::copy(&mut reader.by_ref().take(to_skip), &mut io::sink()).map_err(vmd_err("morph keyframes"))?;
        if skipped < to_skip {
            return Err(MmdError::VmdParse("Failed to read morph keyframes: unexpected end of file".to_string()));
        }

        // 相机段可选
        let camera_count = match reader.read_u32::<LittleEndian>() {
            Ok(count) => count,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => 0,
            Err(e) => return Err(vmd_err("camera keyframe count")(e)),
        };
        let mut camera_keyframes = Vec::with_capacity(camera_count.min(1 << 20) as usize);
        for _ in 0..camera_count {
            camera_keyframes.push(read_camera_keyframe(reader)?);
        }

        Ok(Self {
            model_name,
            bone_keyframes,
            camera_keyframes,
        })
    }

    /// 最大关键帧号
    pub fn max_frame(&self) -> u32 {
        let bones = self.bone_keyframes.iter().map(|(_, k)| k.frame);
        let cameras = self.camera_keyframes.iter().map(|k| k.frame);
        bones.chain(cameras).max().unwrap_or(0)
    }
}

fn vmd_err(what: &'static str) -> impl FnOnce(io::Error) -> MmdError {
    move |e| MmdError::VmdParse(format!("Failed to read {}: {}", what, e))
}

/// 读取骨骼关键帧 (111 字节)
fn read_bone_keyframe<R: Read>(reader: &mut R) -> Result<(String, BoneKeyframe)> {
    let name = read_sjis(reader, 15).map_err(vmd_err("bone name"))?;
    let frame = reader.read_u32::<LittleEndian>().map_err(vmd_err("frame index"))?;
    let [tx, ty, tz] = read_f32s(reader).map_err(vmd_err("translation"))?;
    let [rx, ry, rz, rw] = read_f32s(reader).map_err(vmd_err("rotation"))?;

    let mut table = [0u8; 64];
    reader.read_exact(&mut table).map_err(vmd_err("interpolation"))?;

    // 坐标系转换：Z 轴反转
    let mut keyframe = BoneKeyframe::new(frame);
    keyframe.translation = Vec3::new(tx, ty, -tz);
    let rotation = Quat::from_xyzw(rx, ry, -rz, -rw);
    keyframe.rotation = if rotation.length_squared() > 0.0 {
        rotation.normalize()
    } else {
        Quat::IDENTITY
    };
    keyframe.set_interpolation(&table);

    Ok((name, keyframe))
}

/// 读取相机关键帧 (61 字节)
///   frame (u32) / distance (f32) / interest (Vec3) / angle (Vec3)
///   interpolation (24B) / fov (u32) / perspective (u8, 0 = 透视)
fn read_camera_keyframe<R: Read>(reader: &mut R) -> Result<CameraKeyframe> {
    let frame = reader.read_u32::<LittleEndian>().map_err(vmd_err("camera frame index"))?;
    let distance = reader.read_f32::<LittleEndian>().map_err(vmd_err("camera distance"))?;
    let [lx, ly, lz] = read_f32s(reader).map_err(vmd_err("camera interest"))?;
    let [ax, ay, az] = read_f32s(reader).map_err(vmd_err("camera angle"))?;

    let mut table = [0u8; 24];
    reader.read_exact(&mut table).map_err(vmd_err("camera interpolation"))?;

    let fov = reader.read_u32::<LittleEndian>().map_err(vmd_err("camera fov"))?;
    let perspective = reader.read_u8().map_err(vmd_err("camera perspective flag"))? == 0;

    // 坐标系转换：Z 轴反转（与骨骼一致）
    let mut keyframe = CameraKeyframe::new(frame);
    keyframe.interest = Vec3::new(lx, ly, -lz);
    keyframe.rotation = Vec3::new(-ax, -ay, az);
    keyframe.distance = -distance;
    keyframe.fov = fov as f32;
    keyframe.perspective = perspective;
    keyframe.set_interpolation(&table);

    Ok(keyframe)
}

fn read_f32s<R: Read, const N: usize>(reader: &mut R) -> io::Result<[f32; N]> {
    let mut values = [0.0f32; N];
    reader.read_f32_into::<LittleEndian>(&mut values)?;
    Ok(values)
}

/// 读取定长 Shift-JIS 字符串
fn read_sjis<R: Read>(reader: &mut R, len: usize) -> io::Result<String> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(len);
    let (decoded, _, _) = SHIFT_JIS.decode(&buf[..end]);
    Ok(decoded.into_owned())
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use byteorder::WriteBytesExt;

    #[test]
    fn test_parse_bone_and_camera_keys() {
        let mut data = Vec::new();
        header(&mut data);
        data.write_u32::<LittleEndian>(1).unwrap();
        bone_key(&mut data, "センター", 10, [1.0, 2.0, 3.0], [0.0, 0.0, 0.0, 1.0]);
        data.write_u32::<LittleEndian>(1).unwrap();
        write_fixed(&mut data, "まばたき", 15);
        data.write_u32::<LittleEndian>(0).unwrap();
        data.write_f32::<LittleEndian>(1.0).unwrap();
        data.write_u32::<LittleEndian>(1).unwrap();
        camera_key(&mut data, 5, -45.0, [0.0, 10.0, 1.0], [0.1, 0.2, 0.3], 40);

        let vmd = VmdFile::load_from_bytes(&data).unwrap();
        assert_eq!(vmd.model_name, "model");
        assert_eq!(vmd.bone_keyframes.len(), 1);

        let (name, key) = &vmd.bone_keyframes[0];
        assert_eq!(name, "センター");
        assert_eq!(key.frame, 10);
        assert_eq!(key.translation, Vec3::new(1.0, 2.0, -3.0));
        assert!((key.interp_x.evaluate(0.5) - 0.5).abs() < 1e-4);

        let cam = &vmd.camera_keyframes[0];
        assert_eq!(cam.frame, 5);
        assert_eq!(cam.distance, 45.0);
        assert_eq!(cam.interest, Vec3::new(0.0, 10.0, -1.0));
        assert_eq!(cam.rotation, Vec3::new(-0.1, -0.2, 0.3));
        assert_eq!(cam.fov, 40.0);
        assert!(cam.perspective);
        assert_eq!(vmd.max_frame(), 10);
    }

    #[test]
    fn test_missing_camera_section_is_allowed() {
        let mut data = Vec::new();
        header(&mut data);
        data.write_u32::<LittleEndian>(0).unwrap();
        data.write_u32::<LittleEndian>(0).unwrap();

        let vmd = VmdFile::load_from_bytes(&data).unwrap();
        assert!(vmd.bone_keyframes.is_empty());
        assert!(vmd.camera_keyframes.is_empty());
    }

    #[test]
    fn test_old_header_is_accepted() {
        let mut data = Vec::new();
        write_fixed(&mut data, "Vocaloid Motion Data file", 30);
        write_fixed(&mut data, "", 20);
        data.write_u32::<LittleEndian>(0).unwrap();
        data.write_u32::<LittleEndian>(0).unwrap();
        assert!(VmdFile::load_from_bytes(&data).is_ok());
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        let err = VmdFile::load_from_bytes(&[0u8; 64]).unwrap_err();
        assert!(matches!(err, MmdError::VmdParse(_)));
    }

    #[test]
    fn test_truncated_bone_section_is_error() {
        let mut data = Vec::new();
        header(&mut data);
        data.write_u32::<LittleEndian>(2).unwrap();
        bone_key(&mut data, "a", 0, [0.0; 3], [0.0, 0.0, 0.0, 1.0]);
        assert!(matches!(VmdFile::load_from_bytes(&data), Err(MmdError::VmdParse(_))));
    }
}
