// 该文件是 AIDog 项目的一部分。
// src/output.rs - 输出定义
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
  bridge::BridgeError,
  frame::{Frame, FrameError},
  locator::Detection,
};

#[async_trait]
pub trait Render: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  async fn render_result(
    &self,
    frame: &Frame,
    result: Option<&Detection>,
  ) -> Result<(), Self::Error>;
}

pub mod draw;

mod directory_record;
mod save_image_file;
mod simulator_output;

pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};
pub use self::simulator_output::SimulatorOutput;

const MAX_FILE_STEM_LEN: usize = 64;

/// 把任意文本整理成安全的文件名（不含扩展名）
///
/// 空白替换为 `_`，只保留字母、数字、`_` 与 `-`。
pub fn sanitize_file_stem(text: &str) -> Option<String> {
  let text = text.trim();
  let text = text
    .strip_suffix(".png")
    .or_else(|| text.strip_suffix(".PNG"))
    .unwrap_or(text);

  let stem: String = text
    .chars()
    .filter_map(|c| match c {
      c if c.is_whitespace() => Some('_'),
      c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => Some(c),
      _ => None,
    })
    .take(MAX_FILE_STEM_LEN)
    .collect();

  if stem.is_empty() || stem.chars().all(|c| c == '_') {
    None
  } else {
    Some(stem)
  }
}

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("模拟器输出错误: {0}")]
  SimulatorError(#[from] BridgeError),
  #[error("帧错误: {0}")]
  FrameError(#[from] FrameError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  SaveImageFileOutput(SaveImageFileOutput),
  DirectoryRecordOutput(DirectoryRecordOutput),
  SimulatorOutput(SimulatorOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      SaveImageFileOutput::SCHEME => Ok(OutputWrapper::SaveImageFileOutput(
        SaveImageFileOutput::from_url(url)?,
      )),
      DirectoryRecordOutput::SCHEME => Ok(OutputWrapper::DirectoryRecordOutput(
        DirectoryRecordOutput::from_url(url)?,
      )),
      "http" | "https" => Ok(OutputWrapper::SimulatorOutput(SimulatorOutput::from_url(
        url,
      )?)),
      other => Err(OutputError::SchemeMismatch(other.to_string())),
    }
  }
}

#[async_trait]
impl Render for OutputWrapper {
  type Error = OutputError;

  async fn render_result(
    &self,
    frame: &Frame,
    result: Option<&Detection>,
  ) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(frame, result)
        .await
        .map_err(OutputError::from),
      OutputWrapper::DirectoryRecordOutput(output) => output
        .render_result(frame, result)
        .await
        .map_err(OutputError::from),
      OutputWrapper::SimulatorOutput(output) => output
        .render_result(frame, result)
        .await
        .map_err(OutputError::from),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn file_stem_replaces_spaces() {
    assert_eq!(
      sanitize_file_stem("find the red ball").as_deref(),
      Some("find_the_red_ball")
    );
  }

  #[test]
  fn file_stem_drops_path_characters() {
    assert_eq!(
      sanitize_file_stem("../etc/passwd").as_deref(),
      Some("etcpasswd")
    );
    assert_eq!(sanitize_file_stem("red_ball.png").as_deref(), Some("red_ball"));
  }

  #[test]
  fn empty_file_stem_is_none() {
    assert_eq!(sanitize_file_stem("  ?? "), None);
    assert_eq!(sanitize_file_stem(""), None);
  }

  #[test]
  fn output_scheme_selects_writer() {
    let url = Url::parse("http://localhost:5000").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Ok(OutputWrapper::SimulatorOutput(_))
    ));

    let url = Url::parse("image:///tmp/out.png").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Ok(OutputWrapper::SaveImageFileOutput(_))
    ));

    let url = Url::parse("rtsp://localhost/stream").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::SchemeMismatch(_))
    ));
  }
}
