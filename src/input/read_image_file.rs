// 该文件是 AIDog 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::ImageReader;
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, FrameError, SIM_FRAME_SIZE, SimFrame, encode_png},
  input::FrameSource,
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI scheme mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("Frame error: {0}")]
  FrameError(#[from] FrameError),
}

/// 从本地图片文件读取帧，每次调用都重新读取
///
/// 512x512 的图片直接作为原始像素帧，其余尺寸编码为 PNG。
pub struct ImageFileInput {
  path: PathBuf,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    Ok(Self::new(url.path()))
  }
}

impl ImageFileInput {
  pub fn new(path: impl AsRef<Path>) -> Self {
    Self {
      path: path.as_ref().to_path_buf(),
    }
  }

  pub fn read_frame(&self) -> Result<Frame, ImageFileInputError> {
    let image = ImageReader::open(&self.path)?
      .with_guessed_format()?
      .decode()?
      .to_rgb8();
    debug!(
      "读取图片 {}: {}x{}",
      self.path.display(),
      image.width(),
      image.height()
    );

    if image.dimensions() == (SIM_FRAME_SIZE, SIM_FRAME_SIZE) {
      Ok(Frame::Raw(SimFrame::from_rgb_image(&image)?))
    } else {
      Ok(Frame::Png(encode_png(&image)?))
    }
  }
}

#[async_trait]
impl FrameSource for ImageFileInput {
  type Error = ImageFileInputError;

  async fn next_frame(&self, _object_name: Option<&str>) -> Result<Option<Frame>, Self::Error> {
    self.read_frame().map(Some)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sim_sized_image_becomes_raw_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    image::RgbImage::new(SIM_FRAME_SIZE, SIM_FRAME_SIZE)
      .save(&path)
      .unwrap();

    let frame = ImageFileInput::new(&path).read_frame().unwrap();
    assert!(matches!(frame, Frame::Raw(_)));
  }

  #[test]
  fn other_sizes_stay_png() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("small.png");
    image::RgbImage::new(32, 16).save(&path).unwrap();

    let frame = ImageFileInput::new(&path).read_frame().unwrap();
    let Frame::Png(data) = frame else {
      panic!("expected a PNG frame");
    };
    let decoded = image::load_from_memory(&data).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (32, 16));
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("http://localhost/frame.png").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::SchemaMismatch)
    ));
  }

  #[test]
  fn missing_file_is_io_error() {
    let err = ImageFileInput::new("/nonexistent/aidog.png")
      .read_frame()
      .unwrap_err();
    assert!(matches!(err, ImageFileInputError::IoError(_)));
  }
}
