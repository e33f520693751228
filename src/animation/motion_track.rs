//! 关键帧轨道与插值求值
//!
//! 轨道以帧号为键保存关键帧，同一帧号后写入者覆盖先写入者。
//! 求值时间为浮点帧号，可落在两帧之间。

use std::collections::BTreeMap;

use glam::{Quat, Vec3};

use super::{BoneKeyframe, CameraKeyframe, MmdCamera};

/// 求值位置相对于关键帧的关系
enum Span<'a, K> {
    /// 只有一侧有关键帧，或恰好落在关键帧上
    Hold(&'a K),
    /// 位于两关键帧之间
    Blend {
        prev: &'a K,
        next: &'a K,
        interval: u32,
        coef: f32,
    },
}

fn locate<K>(keyframes: &BTreeMap<u32, K>, time: f32) -> Option<Span<'_, K>> {
    let time = time.max(0.0);
    let floor = time.floor() as u32;
    let prev = keyframes.range(..=floor).next_back();
    let next = keyframes.range(floor.saturating_add(1)..).next();

    match (prev, next) {
        (Some((&f0, prev)), Some((&f1, next))) => {
            let interval = f1 - f0;
            let coef = ((time - f0 as f32) / interval as f32).clamp(0.0, 1.0);
            Some(if coef == 0.0 {
                Span::Hold(prev)
            } else {
                Span::Blend { prev, next, interval, coef }
            })
        }
        (Some((_, key)), None) | (None, Some((_, key))) => Some(Span::Hold(key)),
        (None, None) => None,
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// 骨骼轨道
#[derive(Clone, Debug, Default)]
pub struct BoneMotionTrack {
    pub keyframes: BTreeMap<u32, BoneKeyframe>,
}

impl BoneMotionTrack {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入关键帧，返回被替换的同帧关键帧
    pub fn insert_keyframe(&mut self, keyframe: BoneKeyframe) -> Option<BoneKeyframe> {
        self.keyframes.insert(keyframe.frame, keyframe)
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    pub fn max_frame(&self) -> u32 {
        self.keyframes.keys().next_back().copied().unwrap_or(0)
    }

    /// 求值：返回 (平移, 旋转)，插值曲线取后一关键帧的
    pub fn sample(&self, time: f32) -> Option<(Vec3, Quat)> {
        let span = locate(&self.keyframes, time)?;
        Some(match span {
            Span::Hold(key) => (key.translation, key.rotation),
            Span::Blend { prev, next, coef, .. } => {
                let tx = next.interp_x.evaluate(coef);
                let ty = next.interp_y.evaluate(coef);
                let tz = next.interp_z.evaluate(coef);
                let tr = next.interp_rotation.evaluate(coef);

                let translation = Vec3::new(
                    lerp(prev.translation.x, next.translation.x, tx),
                    lerp(prev.translation.y, next.translation.y, ty),
                    lerp(prev.translation.z, next.translation.z, tz),
                );
                (translation, prev.rotation.slerp(next.rotation, tr))
            }
        })
    }
}

/// 相机轨道
#[derive(Clone, Debug, Default)]
pub struct CameraMotionTrack {
    pub keyframes: BTreeMap<u32, CameraKeyframe>,
}

impl CameraMotionTrack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_keyframe(&mut self, keyframe: CameraKeyframe) -> Option<CameraKeyframe> {
        self.keyframes.insert(keyframe.frame, keyframe)
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    pub fn max_frame(&self) -> u32 {
        self.keyframes.keys().next_back().copied().unwrap_or(0)
    }

    /// 求值；相邻帧号的两个关键帧之间视为镜头切换，不插值
    pub fn sample(&self, time: f32) -> Option<MmdCamera> {
        let span = locate(&self.keyframes, time)?;
        Some(match span {
            Span::Hold(key) | Span::Blend { prev: key, interval: 1, .. } => MmdCamera::from_keyframe(key),
            Span::Blend { prev, next, coef, .. } => {
                let tx = next.interp_x.evaluate(coef);
                let ty = next.interp_y.evaluate(coef);
                let tz = next.interp_z.evaluate(coef);
                let tr = next.interp_rotation.evaluate(coef);
                let td = next.interp_distance.evaluate(coef);
                let tf = next.interp_fov.evaluate(coef);

                MmdCamera {
                    interest: Vec3::new(
                        lerp(prev.interest.x, next.interest.x, tx),
                        lerp(prev.interest.y, next.interest.y, ty),
                        lerp(prev.interest.z, next.interest.z, tz),
                    ),
                    rotate: prev.rotation.lerp(next.rotation, tr),
                    distance: lerp(prev.distance, next.distance, td),
                    fov: lerp(prev.fov, next.fov, tf).to_radians(),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bone_key(frame: u32, x: f32) -> BoneKeyframe {
        let mut key = BoneKeyframe::new(frame);
        key.translation = Vec3::new(x, 0.0, 0.0);
        key
    }

    #[test]
    fn test_bone_track_interpolates_between_keys() {
        let mut track = BoneMotionTrack::new();
        track.insert_keyframe(bone_key(0, 0.0));
        track.insert_keyframe(bone_key(10, 10.0));

        let (t, r) = track.sample(5.0).unwrap();
        assert!((t.x - 5.0).abs() < 1e-3);
        assert_eq!(r, Quat::IDENTITY);

        let (t, _) = track.sample(2.5).unwrap();
        assert!((t.x - 2.5).abs() < 1e-3);
    }

    #[test]
    fn test_bone_track_holds_outside_range() {
        let mut track = BoneMotionTrack::new();
        track.insert_keyframe(bone_key(5, 1.0));
        track.insert_keyframe(bone_key(10, 2.0));

        assert_eq!(track.sample(0.0).unwrap().0.x, 1.0);
        assert_eq!(track.sample(100.0).unwrap().0.x, 2.0);
        assert_eq!(track.max_frame(), 10);
    }

    #[test]
    fn test_same_frame_is_replaced() {
        let mut track = BoneMotionTrack::new();
        assert!(track.insert_keyframe(bone_key(3, 1.0)).is_none());
        assert!(track.insert_keyframe(bone_key(3, 7.0)).is_some());
        assert_eq!(track.len(), 1);
        assert_eq!(track.sample(3.0).unwrap().0.x, 7.0);
    }

    #[test]
    fn test_empty_track_yields_nothing() {
        assert!(BoneMotionTrack::new().sample(1.0).is_none());
        assert!(CameraMotionTrack::new().sample(1.0).is_none());
    }

    #[test]
    fn test_camera_cut_between_adjacent_frames() {
        let mut track = CameraMotionTrack::new();
        let mut a = CameraKeyframe::new(10);
        a.distance = 10.0;
        let mut b = CameraKeyframe::new(11);
        b.distance = 50.0;
        track.insert_keyframe(a);
        track.insert_keyframe(b);

        assert_eq!(track.sample(10.5).unwrap().distance, 10.0);
        assert_eq!(track.sample(11.0).unwrap().distance, 50.0);
    }

    #[test]
    fn test_camera_interpolates_distance_and_fov() {
        let mut track = CameraMotionTrack::new();
        let mut a = CameraKeyframe::new(0);
        a.distance = 10.0;
        a.fov = 20.0;
        let mut b = CameraKeyframe::new(10);
        b.distance = 30.0;
        b.fov = 40.0;
        track.insert_keyframe(a);
        track.insert_keyframe(b);

        let cam = track.sample(5.0).unwrap();
        assert!((cam.distance - 20.0).abs() < 1e-3);
        assert!((cam.fov - 30f32.to_radians()).abs() < 1e-4);
    }
}
