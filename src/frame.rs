// 该文件是 AIDog 项目的一部分。
// src/frame.rs - 模拟器帧定义
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

use std::io::Cursor;

use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};
use thiserror::Error;

const RGB_CHANNELS: usize = 3;

/// 模拟器相机的固定分辨率
pub const SIM_FRAME_SIZE: u32 = 512;

pub type SimFrame = RgbNhwcFrame<SIM_FRAME_SIZE, SIM_FRAME_SIZE>;

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("图像尺寸不匹配: 期望 {expected_w}x{expected_h}, 实际 {actual_w}x{actual_h}")]
  SizeMismatch {
    expected_w: u32,
    expected_h: u32,
    actual_w: u32,
    actual_h: u32,
  },
  #[error("图像编解码错误: {0}")]
  Codec(#[from] image::ImageError),
}

/// 行优先的 RGB 原始像素帧（NHWC，N = 1）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbNhwcFrame<const W: u32, const H: u32> {
  data: Box<[u8]>,
}

impl<const W: u32, const H: u32> TryFrom<Vec<u8>> for RgbNhwcFrame<W, H> {
  type Error = FrameError;

  fn try_from(data: Vec<u8>) -> Result<Self, Self::Error> {
    let expected = RGB_CHANNELS * W as usize * H as usize;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }
}

impl<const W: u32, const H: u32> Default for RgbNhwcFrame<W, H> {
  fn default() -> Self {
    let size = RGB_CHANNELS * (W as usize) * (H as usize);
    let data = vec![0u8; size].into_boxed_slice();
    Self { data }
  }
}

impl<const W: u32, const H: u32> RgbNhwcFrame<W, H> {
  pub fn as_nhwc(&self) -> &[u8] {
    &self.data
  }

  pub fn to_rgb_image(&self) -> RgbImage {
    let width = W;
    let data = &self.data;

    ImageBuffer::from_fn(W, H, |x, y| {
      let idx = ((y * width + x) as usize) * RGB_CHANNELS;
      Rgb([data[idx], data[idx + 1], data[idx + 2]])
    })
  }

  pub fn from_rgb_image(image: &RgbImage) -> Result<Self, FrameError> {
    let (actual_w, actual_h) = image.dimensions();
    if actual_w != W || actual_h != H {
      return Err(FrameError::SizeMismatch {
        expected_w: W,
        expected_h: H,
        actual_w,
        actual_h,
      });
    }
    Self::try_from(image.as_raw().clone())
  }
}

impl<const W: u32, const H: u32> AsMut<[u8]> for RgbNhwcFrame<W, H> {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

/// 模拟器返回的一帧图像：PNG 编码或原始像素
#[derive(Debug, Clone)]
pub enum Frame {
  Png(Vec<u8>),
  Raw(SimFrame),
}

impl Frame {
  /// 转为 PNG 编码字节，PNG 帧直接复制
  pub fn to_png(&self) -> Result<Vec<u8>, FrameError> {
    match self {
      Frame::Png(data) => Ok(data.clone()),
      Frame::Raw(raw) => encode_png(&raw.to_rgb_image()),
    }
  }

  pub fn to_rgb_image(&self) -> Result<RgbImage, FrameError> {
    match self {
      Frame::Png(data) => {
        let image = image::load_from_memory_with_format(data, ImageFormat::Png)?;
        Ok(image.to_rgb8())
      }
      Frame::Raw(raw) => Ok(raw.to_rgb_image()),
    }
  }
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, FrameError> {
  let mut buffer = Cursor::new(Vec::new());
  image.write_to(&mut buffer, ImageFormat::Png)?;
  Ok(buffer.into_inner())
}
