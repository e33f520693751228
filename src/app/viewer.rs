//! 模型加载与渲染循环
//!
//! 整个循环（计时、动画求值、缓冲更新、绘制、提交、呈现）都在渲染线程上顺序执行。

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use winit::window::Window;

use crate::animation::{VmdAnimation, VmdCameraAnimation, VmdFile};
use crate::cli::ModelInput;
use crate::config::ViewerConfig;
use crate::model::{load_model, MmdModel};
use crate::render::{
    clear_frame, FrameAcquire, FrameContext, GpuContext, GpuTextureFactory, ModelRenderer, RenderResources,
};
use crate::texture::TextureCache;
use crate::Result;

use super::camera::camera_matrices;
use super::clock::{FpsCounter, FrameClock};
use super::window::SharedState;

/// 最小化时的等待间隔
const IDLE_WAIT: Duration = Duration::from_millis(10);

/// 单帧结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    Skipped,
    /// 不可恢复的 GPU 错误
    Fatal,
}

/// 循环结束原因
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopExit {
    /// 窗口关闭
    Closed,
    /// GPU 错误中止
    Failed,
}

/// 模型及其 CPU 端动画状态
pub struct SceneModel {
    pub model: MmdModel,
    pub animation: VmdAnimation,
}

/// 把一个 VMD 合并进模型动画；含相机关键帧时替换当前相机动画
///
/// 返回合并的骨骼关键帧数。
pub fn apply_vmd(
    animation: &mut VmdAnimation,
    camera: &mut Option<VmdCameraAnimation>,
    vmd: &VmdFile,
    source: &Path,
) -> Result<usize> {
    let bound = animation.add(vmd);

    if !vmd.camera_keyframes.is_empty() {
        let camera_animation = VmdCameraAnimation::create(vmd)?;
        if camera.is_some() {
            log::warn!("Camera animation replaced by {}", source.display());
        }
        log::info!(
            "Camera animation installed from {} ({} keyframes)",
            source.display(),
            camera_animation.keyframe_count()
        );
        *camera = Some(camera_animation);
    }

    Ok(bound)
}

/// 加载一个模型组：模型文件 + 其后所有 VMD
pub fn load_scene_model(
    input: &ModelInput,
    resource_dir: &Path,
    camera: &mut Option<VmdCameraAnimation>,
) -> Result<SceneModel> {
    let mut model = load_model(&input.model_path, resource_dir)?;
    model.initialize_animation();

    let mut animation = VmdAnimation::create(&model);
    for vmd_path in &input.vmd_paths {
        let vmd = VmdFile::load(vmd_path)?;
        let bound = apply_vmd(&mut animation, camera, &vmd, vmd_path)?;
        log::info!("Motion loaded: {} ({} bone keyframes bound)", vmd_path.display(), bound);
    }

    animation.sync_physics(0.0, &mut model);
    model.update();

    Ok(SceneModel { model, animation })
}

struct ViewerModel {
    scene: SceneModel,
    renderer: ModelRenderer,
}

/// 渲染线程拥有的全部状态
pub struct Viewer {
    config: ViewerConfig,
    context: GpuContext,
    resources: RenderResources,
    textures: TextureCache<GpuTextureFactory>,
    models: Vec<ViewerModel>,
    camera: Option<VmdCameraAnimation>,
}

impl Viewer {
    /// 创建 GPU 上下文并加载所有模型组；任一失败都返回错误
    pub fn new(config: ViewerConfig, window: Arc<Window>, inputs: &[ModelInput]) -> Result<Self> {
        let size = window.inner_size();
        let context = GpuContext::new(window, size.width, size.height)?;
        let resources = RenderResources::new(&context.device, &context.queue, context.color_format())?;
        let mut textures = TextureCache::new(context.texture_factory());

        let mut camera = None;
        let mut models = Vec::with_capacity(inputs.len());
        for input in inputs {
            let scene = load_scene_model(input, &config.resource_dir, &mut camera)?;
            let renderer = ModelRenderer::setup(
                &context.device,
                &context.queue,
                &resources,
                &scene.model,
                &mut textures,
                context.uniform_alignment(),
            )?;
            models.push(ViewerModel { scene, renderer });
        }

        log::info!("Viewer ready: {} models, {} textures", models.len(), textures.len());

        Ok(Self {
            config,
            context,
            resources,
            textures,
            models,
            camera,
        })
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// 渲染循环，运行标志清除或发生致命错误时返回
    pub fn run(mut self, shared: &SharedState) -> LoopExit {
        let start = Instant::now();
        let mut clock = FrameClock::new(start, self.config.max_frame_delta, self.config.animation_fps);
        let mut fps = FpsCounter::new(start);

        while shared.is_running() {
            let requested = shared.size();
            if requested.0 == 0 || requested.1 == 0 {
                std::thread::sleep(IDLE_WAIT);
                continue;
            }
            if let Some((width, height)) = resize_target(self.context.size(), requested) {
                self.context.resize(width, height);
            }

            let now = Instant::now();
            let elapsed = clock.tick(now);
            match self.render_frame(clock.frame(), elapsed) {
                FrameStatus::Presented => {
                    fps.frame(now);
                }
                FrameStatus::Skipped => {}
                FrameStatus::Fatal => {
                    log::error!("Render loop stopped by a fatal GPU error");
                    return LoopExit::Failed;
                }
            }
        }

        log::info!("Render loop finished");
        LoopExit::Closed
    }

    /// 渲染一帧：清屏，逐模型推进动画、上传顶点、绘制并提交，最后呈现
    pub fn render_frame(&mut self, frame: f32, elapsed: f32) -> FrameStatus {
        let surface_texture = match self.context.acquire_frame() {
            FrameAcquire::Ready(texture) => texture,
            FrameAcquire::Skip => return FrameStatus::Skipped,
            FrameAcquire::Fatal => return FrameStatus::Fatal,
        };
        let color_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let (width, height) = self.context.size();
        let camera = camera_matrices(&self.config, self.camera.as_ref(), frame, width, height);
        let frame_context = FrameContext {
            view: camera.view,
            projection: camera.projection,
            light_color: self.config.light_color,
            light_dir: self.config.light_direction,
            width,
            height,
        };

        let device = &self.context.device;
        let queue = &self.context.queue;
        let depth_view = self.context.depth_view();

        queue.submit(Some(clear_frame(device, &color_view, depth_view, self.config.clear_color)));

        for entry in &mut self.models {
            let SceneModel { model, animation } = &mut entry.scene;
            model.begin_animation();
            animation.evaluate(frame, model);
            model.update_animation();
            model.end_animation();
            model.update_physics(elapsed);
            model.update();

            let upload = entry.renderer.update(queue, model);
            let commands = entry.renderer.draw(
                device,
                queue,
                &self.resources,
                model,
                &frame_context,
                &color_view,
                depth_view,
                upload,
            );
            queue.submit(Some(commands));
        }

        surface_texture.present();
        FrameStatus::Presented
    }
}

/// 窗口尺寸与当前表面不同且非零时返回新尺寸
pub fn resize_target(current: (u32, u32), requested: (u32, u32)) -> Option<(u32, u32)> {
    if requested.0 == 0 || requested.1 == 0 || requested == current {
        None
    } else {
        Some(requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::test_support;
    use crate::model::ModelFormat;
    use crate::skeleton::Bone;
    use std::path::PathBuf;

    fn camera_vmd(distance: f32) -> VmdFile {
        let mut bytes = Vec::new();
        test_support::header(&mut bytes);
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        test_support::camera_key(&mut bytes, 0, distance, [0.0, 10.0, 0.0], [0.0, 0.0, 0.0], 30);
        VmdFile::load_from_bytes(&bytes).unwrap()
    }

    fn bone_vmd(name: &str) -> VmdFile {
        let mut bytes = Vec::new();
        test_support::header(&mut bytes);
        bytes.extend_from_slice(&1u32.to_le_bytes());
        test_support::bone_key(&mut bytes, name, 0, [1.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]);
        bytes.extend_from_slice(&0u32.to_le_bytes());
        VmdFile::load_from_bytes(&bytes).unwrap()
    }

    fn model() -> MmdModel {
        let mut model = MmdModel::new(ModelFormat::Pmx);
        model.bone_manager.add_bone(Bone::new("センター".to_string()));
        model.bone_manager.build_hierarchy();
        model.finish_loading();
        model
    }

    #[test]
    fn test_last_camera_wins() {
        let model = model();
        let mut animation = VmdAnimation::create(&model);
        let mut camera = None;

        apply_vmd(&mut animation, &mut camera, &camera_vmd(-20.0), &PathBuf::from("a.vmd")).unwrap();
        apply_vmd(&mut animation, &mut camera, &camera_vmd(-80.0), &PathBuf::from("b.vmd")).unwrap();

        let evaluated = camera.unwrap().evaluate(0.0);
        assert!((evaluated.distance - 80.0).abs() < 1e-5);
    }

    #[test]
    fn test_bone_only_vmd_keeps_camera() {
        let model = model();
        let mut animation = VmdAnimation::create(&model);
        let mut camera = None;

        apply_vmd(&mut animation, &mut camera, &camera_vmd(-20.0), &PathBuf::from("cam.vmd")).unwrap();
        let bound = apply_vmd(&mut animation, &mut camera, &bone_vmd("センター"), &PathBuf::from("dance.vmd")).unwrap();

        assert_eq!(bound, 1);
        assert_eq!(animation.track_count(), 1);
        assert!(camera.is_some());
    }

    #[test]
    fn test_load_scene_model_rejects_unknown_extension() {
        let input = ModelInput {
            model_path: PathBuf::from("model.obj"),
            vmd_paths: Vec::new(),
        };
        let mut camera = None;

        let result = load_scene_model(&input, Path::new("."), &mut camera);
        assert!(matches!(result, Err(crate::MmdError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_resize_target() {
        assert_eq!(resize_target((1280, 800), (1280, 800)), None);
        assert_eq!(resize_target((1280, 800), (0, 600)), None);
        assert_eq!(resize_target((1280, 800), (640, 480)), Some((640, 480)));
    }
}
