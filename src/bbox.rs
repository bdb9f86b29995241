// 该文件是 AIDog 项目的一部分。
// src/bbox.rs - 边界框与坐标系转换
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 AIDog Contributors

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::frame::SIM_FRAME_SIZE;

/// 生成式模型使用的归一化坐标范围
pub const BOX_2D_EXTENT: f64 = 1000.0;
/// 模拟器像素坐标范围
pub const SIM_EXTENT: f64 = SIM_FRAME_SIZE as f64;

/// 生成式模型返回的边界框 `[ymin, xmin, ymax, xmax]`，坐标范围 0..1000
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Box2d {
  pub ymin: f64,
  pub xmin: f64,
  pub ymax: f64,
  pub xmax: f64,
}

impl From<[f64; 4]> for Box2d {
  fn from([ymin, xmin, ymax, xmax]: [f64; 4]) -> Self {
    Self {
      ymin,
      xmin,
      ymax,
      xmax,
    }
  }
}

impl From<Box2d> for [f64; 4] {
  fn from(b: Box2d) -> Self {
    [b.ymin, b.xmin, b.ymax, b.xmax]
  }
}

/// 本地检测器输出的归一化角点 `[x_min, y_min, x_max, y_max]`，坐标范围 0..1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedCorners(pub [f32; 4]);

/// 模拟器坐标系中的边界框 `[x, y, width, height]`，坐标范围 0..512
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct SimBounds {
  pub x: u32,
  pub y: u32,
  pub width: u32,
  pub height: u32,
}

impl From<[u32; 4]> for SimBounds {
  fn from([x, y, width, height]: [u32; 4]) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }
}

impl From<SimBounds> for [u32; 4] {
  fn from(b: SimBounds) -> Self {
    [b.x, b.y, b.width, b.height]
  }
}

impl fmt::Display for SimBounds {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "[{}, {}, {}, {}]",
      self.x, self.y, self.width, self.height
    )
  }
}

// 宽高在缩放前求差，负值饱和为 0
fn scale(value: f64, factor: f64) -> u32 {
  (value * factor).round().max(0.0) as u32
}

impl From<Box2d> for SimBounds {
  fn from(b: Box2d) -> Self {
    let factor = SIM_EXTENT / BOX_2D_EXTENT;
    SimBounds {
      x: scale(b.xmin, factor),
      y: scale(b.ymin, factor),
      width: scale(b.xmax - b.xmin, factor),
      height: scale(b.ymax - b.ymin, factor),
    }
  }
}

impl From<NormalizedCorners> for SimBounds {
  fn from(NormalizedCorners([x_min, y_min, x_max, y_max]): NormalizedCorners) -> Self {
    let (x_min, y_min) = (f64::from(x_min), f64::from(y_min));
    let (x_max, y_max) = (f64::from(x_max), f64::from(y_max));
    SimBounds {
      x: scale(x_min, SIM_EXTENT),
      y: scale(y_min, SIM_EXTENT),
      width: scale(x_max - x_min, SIM_EXTENT),
      height: scale(y_max - y_min, SIM_EXTENT),
    }
  }
}

impl SimBounds {
  /// 归一化角点，用于在任意尺寸的图像上绘制
  pub fn to_normalized_corners(&self) -> NormalizedCorners {
    let extent = SIM_EXTENT as f32;
    NormalizedCorners([
      self.x as f32 / extent,
      self.y as f32 / extent,
      (self.x + self.width) as f32 / extent,
      (self.y + self.height) as f32 / extent,
    ])
  }
}
