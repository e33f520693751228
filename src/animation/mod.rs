//! 动画系统
//!
//! 提供 VMD 解析、贝塞尔关键帧插值、骨骼动画与相机动画求值。

mod bezier;
mod camera;
mod keyframe;
mod motion_track;
mod vmd_animation;
mod vmd_file;

pub use bezier::BezierCurve;
pub use camera::{LookAtCamera, MmdCamera, VmdCameraAnimation};
pub use keyframe::{BoneKeyframe, CameraKeyframe};
pub use motion_track::{BoneMotionTrack, CameraMotionTrack};
pub use vmd_animation::VmdAnimation;
pub use vmd_file::VmdFile;

#[cfg(test)]
pub(crate) use vmd_file::test_support;
