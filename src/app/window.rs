//! 窗口事件处理
//!
//! 主线程只负责窗口消息：转发尺寸、在关闭时清除运行标志并等待渲染线程结束。

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoopProxy};
use winit::window::{Window, WindowId};

use crate::cli::ModelInput;
use crate::config::ViewerConfig;

use super::viewer::{LoopExit, Viewer};

/// 渲染线程发给事件循环的通知
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewerEvent {
    /// 渲染循环因错误提前结束
    RenderFailed,
}

/// 两个线程共享的状态，读写都不加锁
#[derive(Debug)]
pub struct SharedState {
    running: AtomicBool,
    width: AtomicU32,
    height: AtomicU32,
}

impl SharedState {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            running: AtomicBool::new(true),
            width: AtomicU32::new(width),
            height: AtomicU32::new(height),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width.load(Ordering::Relaxed), self.height.load(Ordering::Relaxed))
    }

    pub fn set_size(&self, width: u32, height: u32) {
        self.width.store(width, Ordering::Relaxed);
        self.height.store(height, Ordering::Relaxed);
    }
}

/// winit 应用
pub struct ViewerApp {
    config: ViewerConfig,
    inputs: Vec<ModelInput>,
    proxy: EventLoopProxy<ViewerEvent>,
    window: Option<Arc<Window>>,
    shared: Arc<SharedState>,
    render_thread: Option<JoinHandle<LoopExit>>,
    exit_code: Option<u8>,
}

impl ViewerApp {
    pub fn new(config: ViewerConfig, inputs: Vec<ModelInput>, proxy: EventLoopProxy<ViewerEvent>) -> Self {
        let shared = Arc::new(SharedState::new(config.window_width, config.window_height));
        Self {
            config,
            inputs,
            proxy,
            window: None,
            shared,
            render_thread: None,
            exit_code: None,
        }
    }

    /// 事件循环结束后的退出码；窗口从未创建时视为失败
    pub fn exit_code(&self) -> u8 {
        self.exit_code.unwrap_or(1)
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, message: &str) {
        log::error!("{}", message);
        self.exit_code = Some(1);
        event_loop.exit();
    }

    /// 清除运行标志并等待渲染线程，返回其结束原因
    fn stop_render_thread(&mut self) -> LoopExit {
        self.shared.stop();
        match self.render_thread.take().map(JoinHandle::join) {
            Some(Ok(exit)) => exit,
            Some(Err(_)) => {
                log::error!("Render thread panicked");
                LoopExit::Failed
            }
            None => LoopExit::Closed,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> crate::Result<()> {
        let attributes = Window::default_attributes()
            .with_title(self.config.window_title.clone())
            .with_inner_size(PhysicalSize::new(self.config.window_width, self.config.window_height))
            .with_visible(false);
        let window = event_loop
            .create_window(attributes)
            .map_err(|e| crate::MmdError::Gpu(format!("Failed to create window: {}", e)))?;
        let window = Arc::new(window);
        self.window = Some(Arc::clone(&window));

        let size = window.inner_size();
        self.shared.set_size(size.width, size.height);

        let viewer = Viewer::new(self.config.clone(), Arc::clone(&window), &self.inputs)?;
        window.set_visible(true);

        let shared = Arc::clone(&self.shared);
        let proxy = self.proxy.clone();
        let handle = std::thread::Builder::new()
            .name("mmd-render".to_string())
            .spawn(move || {
                let exit = viewer.run(&shared);
                if exit == LoopExit::Failed {
                    let _ = proxy.send_event(ViewerEvent::RenderFailed);
                }
                exit
            })?;
        self.render_thread = Some(handle);

        log::info!("Render thread started");
        Ok(())
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        if let Err(e) = self.start(event_loop) {
            self.fail(event_loop, &format!("Viewer initialization failed: {}", e));
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                let exit = self.stop_render_thread();
                self.exit_code = Some(match exit {
                    LoopExit::Closed => 0,
                    LoopExit::Failed => 1,
                });
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                self.shared.set_size(size.width, size.height);
            }
            _ => {}
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::RenderFailed => {
                self.stop_render_thread();
                self.fail(event_loop, "Rendering stopped, closing the viewer");
            }
        }
    }
}
