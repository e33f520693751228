//! VMD 骨骼动画求值器
//!
//! 创建时记录模型的骨骼名表；追加 VMD 时按骨骼名合并关键帧，
//! 模型中不存在的骨骼被忽略。

use std::collections::{BTreeMap, HashMap};

use super::{BoneMotionTrack, VmdFile};
use crate::model::MmdModel;

/// 骨骼动画求值器
#[derive(Clone, Debug, Default)]
pub struct VmdAnimation {
    bone_indices: HashMap<String, usize>,
    /// 骨骼索引 -> 轨道
    tracks: BTreeMap<usize, BoneMotionTrack>,
}

impl VmdAnimation {
    /// 为模型创建空的求值器
    pub fn create(model: &MmdModel) -> Self {
        let manager = &model.bone_manager;
        let bone_indices = (0..manager.bone_count())
            .filter_map(|i| manager.get_bone(i).map(|b| (b.name.clone(), i)))
            .rev()
            .collect();

        Self {
            bone_indices,
            tracks: BTreeMap::new(),
        }
    }

    /// 追加一个 VMD 的骨骼关键帧，返回被采用的关键帧数
    ///
    /// 同一骨骼的同帧关键帧由后追加者覆盖。
    pub fn add(&mut self, vmd: &VmdFile) -> usize {
        let mut bound = 0;
        let mut unknown = 0;
        for (name, keyframe) in &vmd.bone_keyframes {
            match self.bone_indices.get(name) {
                Some(&index) => {
                    self.tracks.entry(index).or_default().insert_keyframe(keyframe.clone());
                    bound += 1;
                }
                None => unknown += 1,
            }
        }
        if unknown > 0 {
            log::debug!("VMD '{}': {} keyframes target bones missing from the model", vmd.model_name, unknown);
        }
        bound
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn max_frame(&self) -> u32 {
        self.tracks.values().map(BoneMotionTrack::max_frame).max().unwrap_or(0)
    }

    /// 将指定帧的骨骼姿势写入模型
    ///
    /// 须在 `begin_animation` 与 `update_animation` 之间调用。
    pub fn evaluate(&self, frame: f32, model: &mut MmdModel) {
        for (&index, track) in &self.tracks {
            if let Some((translation, rotation)) = track.sample(frame) {
                model.bone_manager.set_bone_translation(index, translation);
                model.bone_manager.set_bone_rotation(index, rotation);
            }
        }
    }

    /// 将模型整体同步到指定帧的姿势
    ///
    /// 没有刚体模拟，只完成一次完整的骨骼更新与蒙皮矩阵计算。
    pub fn sync_physics(&self, frame: f32, model: &mut MmdModel) {
        model.begin_animation();
        self.evaluate(frame, model);
        model.update_animation();
        model.end_animation();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::BoneKeyframe;
    use crate::model::ModelFormat;
    use crate::skeleton::Bone;
    use glam::{Quat, Vec3};

    fn model_with_bones(names: &[&str]) -> MmdModel {
        let mut model = MmdModel::new(ModelFormat::Pmx);
        for name in names {
            model.bone_manager.add_bone(Bone::new(name.to_string()));
        }
        model.bone_manager.build_hierarchy();
        model.finish_loading();
        model
    }

    fn vmd(keys: &[(&str, u32, f32)]) -> VmdFile {
        VmdFile {
            bone_keyframes: keys
                .iter()
                .map(|&(name, frame, x)| {
                    let mut key = BoneKeyframe::new(frame);
                    key.translation = Vec3::new(x, 0.0, 0.0);
                    (name.to_string(), key)
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_unknown_bones_are_ignored() {
        let model = model_with_bones(&["センター"]);
        let mut animation = VmdAnimation::create(&model);
        let bound = animation.add(&vmd(&[("センター", 0, 1.0), ("左足", 0, 1.0)]));
        assert_eq!(bound, 1);
        assert_eq!(animation.track_count(), 1);
    }

    #[test]
    fn test_later_file_overrides_same_frame() {
        let mut model = model_with_bones(&["センター"]);
        let mut animation = VmdAnimation::create(&model);
        animation.add(&vmd(&[("センター", 0, 1.0), ("センター", 10, 1.0)]));
        animation.add(&vmd(&[("センター", 0, 5.0), ("センター", 20, 9.0)]));
        assert_eq!(animation.max_frame(), 20);

        model.begin_animation();
        animation.evaluate(0.0, &mut model);
        assert_eq!(model.bone_manager.get_bone(0).unwrap().pose_translation.x, 5.0);

        model.begin_animation();
        animation.evaluate(10.0, &mut model);
        assert_eq!(model.bone_manager.get_bone(0).unwrap().pose_translation.x, 1.0);
    }

    #[test]
    fn test_sync_physics_poses_model() {
        let mut model = model_with_bones(&["センター"]);
        let mut animation = VmdAnimation::create(&model);
        let mut file = vmd(&[("センター", 0, 2.0)]);
        file.bone_keyframes[0].1.rotation = Quat::IDENTITY;
        animation.add(&file);

        animation.sync_physics(0.0, &mut model);
        let origin = model.bone_manager.get_global_transform(0).transform_point3(Vec3::ZERO);
        assert!(origin.abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn test_empty_animation_keeps_bind_pose() {
        let mut model = model_with_bones(&["センター"]);
        let animation = VmdAnimation::create(&model);
        model.begin_animation();
        animation.evaluate(100.0, &mut model);
        assert_eq!(model.bone_manager.get_bone(0).unwrap().pose_translation, Vec3::ZERO);
    }
}
