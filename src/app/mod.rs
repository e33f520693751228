//! 查看器应用：窗口、渲染线程与逐帧循环

mod camera;
mod clock;
mod viewer;
mod window;

pub use camera::{camera_matrices, CameraMatrices};
pub use clock::{FpsCounter, FrameClock};
pub use viewer::{apply_vmd, load_scene_model, resize_target, FrameStatus, LoopExit, SceneModel, Viewer};
pub use window::{SharedState, ViewerApp, ViewerEvent};

use std::process::ExitCode;

use winit::event_loop::{ControlFlow, EventLoop};

use crate::cli::ModelInput;
use crate::config::get_config;
use crate::{MmdError, Result};

/// 打开窗口并运行到窗口关闭
///
/// 正常关闭返回 0；模型加载或 GPU 初始化失败时窗口不会显示，返回 1。
pub fn run(inputs: Vec<ModelInput>) -> Result<ExitCode> {
    let config = get_config();
    log::info!(
        "Starting viewer: {} model(s), resource dir {}",
        inputs.len(),
        config.resource_dir.display()
    );

    let event_loop = EventLoop::<ViewerEvent>::with_user_event()
        .build()
        .map_err(|e| MmdError::Gpu(format!("Failed to create event loop: {}", e)))?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = ViewerApp::new(config, inputs, event_loop.create_proxy());
    event_loop
        .run_app(&mut app)
        .map_err(|e| MmdError::Gpu(format!("Event loop error: {}", e)))?;

    Ok(ExitCode::from(app.exit_code()))
}
