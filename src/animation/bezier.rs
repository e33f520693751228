//! 贝塞尔曲线插值
//!
//! VMD 插值曲线为 (0,0)-(x1,y1)-(x2,y2)-(1,1) 的三次贝塞尔曲线，
//! 控制点以 0..=127 的字节存储。

/// 贝塞尔曲线（用于 VMD 动画插值）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BezierCurve {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BezierCurve {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// 线性插值
    pub fn linear() -> Self {
        Self::new(20.0 / 127.0, 20.0 / 127.0, 107.0 / 127.0, 107.0 / 127.0)
    }

    /// 从 VMD 控制点字节创建，参数顺序为 x1, y1, x2, y2
    pub fn from_vmd_bytes(x1: u8, y1: u8, x2: u8, y2: u8) -> Self {
        Self::new(
            x1 as f32 / 127.0,
            y1 as f32 / 127.0,
            x2 as f32 / 127.0,
            y2 as f32 / 127.0,
        )
    }

    /// 求曲线在 x = t 处的 y 值
    pub fn evaluate(&self, t: f32) -> f32 {
        if t <= 0.0 {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }
        if self.x1 == self.y1 && self.x2 == self.y2 {
            return t;
        }

        // 牛顿法求解 x(s) = t，导数过小时退回二分
        let mut s = t;
        for _ in 0..16 {
            let err = cubic(self.x1, self.x2, s) - t;
            if err.abs() < 1e-6 {
                return cubic(self.y1, self.y2, s);
            }
            let slope = cubic_slope(self.x1, self.x2, s);
            if slope.abs() < 1e-6 {
                break;
            }
            s = (s - err / slope).clamp(0.0, 1.0);
        }

        let (mut lo, mut hi) = (0.0f32, 1.0f32);
        for _ in 0..32 {
            s = 0.5 * (lo + hi);
            if cubic(self.x1, self.x2, s) < t {
                lo = s;
            } else {
                hi = s;
            }
        }
        cubic(self.y1, self.y2, s)
    }
}

impl Default for BezierCurve {
    fn default() -> Self {
        Self::linear()
    }
}

/// 端点为 0 和 1 的三次贝塞尔分量
fn cubic(p1: f32, p2: f32, s: f32) -> f32 {
    let inv = 1.0 - s;
    3.0 * inv * inv * s * p1 + 3.0 * inv * s * s * p2 + s * s * s
}

fn cubic_slope(p1: f32, p2: f32, s: f32) -> f32 {
    let inv = 1.0 - s;
    3.0 * inv * inv * p1 + 6.0 * inv * s * (p2 - p1) + 3.0 * s * s * (1.0 - p2)
}
