// 该文件是 AIDog 项目的一部分。
// src/output/draw.rs - 定位结果可视化
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

use std::path::Path;

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::{
  frame::{Frame, FrameError},
  locator::Detection,
};

const BOX_THICKNESS: i32 = 2;
const BOX_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色

pub struct Draw {
  thickness: i32,
  color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      thickness: BOX_THICKNESS,
      color: BOX_COLOR,
    }
  }
}

impl Draw {
  /// 在图像上绘制边框，边界框按模拟器坐标系缩放到图像尺寸
  pub fn draw_bbox(&self, image: &mut RgbImage, detection: &Detection) {
    let (w, h) = (image.width() as f32, image.height() as f32);
    let [x_min, y_min, x_max, y_max] = detection.bounds.to_normalized_corners().0;

    let x_min = ((x_min * w).floor() as i32).clamp(0, w as i32 - 1);
    let y_min = ((y_min * h).floor() as i32).clamp(0, h as i32 - 1);
    let x_max = ((x_max * w).ceil() as i32).clamp(0, w as i32 - 1);
    let y_max = ((y_max * h).ceil() as i32).clamp(0, h as i32 - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    for t in 0..self.thickness {
      let width = x_max - x_min - 2 * t;
      let height = y_max - y_min - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32 + 1, height as u32 + 1);
      draw_hollow_rect_mut(image, rect, Rgb(self.color));
    }
  }

  pub fn draw_detection(
    &self,
    frame: &Frame,
    detection: Option<&Detection>,
  ) -> Result<RgbImage, FrameError> {
    let mut image = frame.to_rgb_image()?;
    if let Some(detection) = detection {
      self.draw_bbox(&mut image, detection);
    }
    Ok(image)
  }
}

pub struct Record;

impl Record {
  /// 在图像旁写入同名 `.txt`，每行 `名称, 置信度, x, y, 宽, 高`
  pub fn record(&self, detection: Option<&Detection>, path: &Path) -> Result<(), std::io::Error> {
    let line = match detection {
      Some(d) => format!(
        "{}, {:.4}, {}, {}, {}, {}",
        d.object_name,
        d.confidence.unwrap_or(1.0),
        d.bounds.x,
        d.bounds.y,
        d.bounds.width,
        d.bounds.height
      ),
      None => String::new(),
    };
    std::fs::write(path.with_extension("txt"), line)
  }
}
