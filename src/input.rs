// 该文件是 AIDog 项目的一部分。
// src/input.rs - 图像输入
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

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  bridge::{BridgeError, SimulatorBridge},
  frame::Frame,
};

mod read_image_file;
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

/// 帧来源；`None` 表示当前没有可用图像
#[async_trait]
pub trait FrameSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  async fn next_frame(&self, object_name: Option<&str>) -> Result<Option<Frame>, Self::Error>;
}

#[async_trait]
impl FrameSource for SimulatorBridge {
  type Error = BridgeError;

  async fn next_frame(&self, object_name: Option<&str>) -> Result<Option<Frame>, Self::Error> {
    self.fetch_frame(object_name).await
  }
}

#[derive(Error, Debug)]
pub enum InputError {
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("Simulator input error: {0}")]
  SimulatorError(#[from] BridgeError),
  #[error("URI scheme mismatch: {0}")]
  SchemeMismatch(String),
}

pub enum InputWrapper {
  Simulator(SimulatorBridge),
  ImageFile(ImageFileInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ImageFileInput::SCHEME => Ok(InputWrapper::ImageFile(ImageFileInput::from_url(url)?)),
      "http" | "https" => Ok(InputWrapper::Simulator(SimulatorBridge::from_url(url)?)),
      other => Err(InputError::SchemeMismatch(other.to_string())),
    }
  }
}

#[async_trait]
impl FrameSource for InputWrapper {
  type Error = InputError;

  async fn next_frame(&self, object_name: Option<&str>) -> Result<Option<Frame>, Self::Error> {
    match self {
      InputWrapper::Simulator(bridge) => Ok(bridge.next_frame(object_name).await?),
      InputWrapper::ImageFile(file) => Ok(file.next_frame(object_name).await?),
    }
  }
}
