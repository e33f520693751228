//! 骨骼系统（正向运动学）

mod bone;
mod manager;

pub use bone::Bone;
pub use manager::BoneManager;
