//! 帧时钟与 FPS 统计

use std::time::{Duration, Instant};

/// 动画时钟
///
/// 单帧推进时间被限制在 `max_delta` 以内，卡顿后动画不会跳帧。
#[derive(Debug)]
pub struct FrameClock {
    last: Instant,
    max_delta: f32,
    animation_fps: f32,
    anim_time: f32,
}

impl FrameClock {
    pub fn new(start: Instant, max_delta: f32, animation_fps: f32) -> Self {
        Self {
            last: start,
            max_delta,
            animation_fps,
            anim_time: 0.0,
        }
    }

    /// 推进时钟，返回本帧经过的秒数（已限幅）
    pub fn tick(&mut self, now: Instant) -> f32 {
        let delta = now.saturating_duration_since(self.last).as_secs_f32();
        self.last = now;
        let elapsed = delta.min(self.max_delta);
        self.anim_time += elapsed;
        elapsed
    }

    pub fn anim_time(&self) -> f32 {
        self.anim_time
    }

    /// 当前动画帧号
    pub fn frame(&self) -> f32 {
        self.anim_time * self.animation_fps
    }
}

/// 每秒输出一次帧率
#[derive(Debug)]
pub struct FpsCounter {
    window_start: Instant,
    frames: u32,
}

impl FpsCounter {
    const INTERVAL: Duration = Duration::from_secs(1);

    pub fn new(start: Instant) -> Self {
        Self {
            window_start: start,
            frames: 0,
        }
    }

    /// 记录一帧；满一秒时返回该区间的帧率
    pub fn frame(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        let span = now.saturating_duration_since(self.window_start);
        if span < Self::INTERVAL {
            return None;
        }
        let fps = self.frames as f32 / span.as_secs_f32();
        self.frames = 0;
        self.window_start = now;
        log::info!("{:.1} fps", fps);
        Some(fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_clamps_long_frames() {
        let start = Instant::now();
        let mut clock = FrameClock::new(start, 1.0 / 30.0, 30.0);

        let elapsed = clock.tick(start + Duration::from_millis(500));
        assert!((elapsed - 1.0 / 30.0).abs() < 1e-6);
        assert!((clock.frame() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_tick_accumulates_short_frames() {
        let start = Instant::now();
        let mut clock = FrameClock::new(start, 1.0 / 30.0, 30.0);

        clock.tick(start + Duration::from_millis(10));
        clock.tick(start + Duration::from_millis(20));
        assert!((clock.anim_time() - 0.02).abs() < 1e-5);
        assert!((clock.frame() - 0.6).abs() < 1e-3);
    }

    #[test]
    fn test_fps_counter_reports_once_per_second() {
        let start = Instant::now();
        let mut counter = FpsCounter::new(start);

        for i in 1..60 {
            assert!(counter.frame(start + Duration::from_millis(i * 16)).is_none());
        }
        let fps = counter.frame(start + Duration::from_secs(1)).unwrap();
        assert!((fps - 60.0).abs() < 1e-3);
        assert!(counter.frame(start + Duration::from_millis(1010)).is_none());
    }
}
