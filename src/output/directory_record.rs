// 该文件是 AIDog 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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
use std::sync::atomic::{AtomicU16, Ordering};

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, FrameError},
  locator::Detection,
  output::{
    Render,
    draw::{Draw, Record},
  },
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("帧错误: {0}")]
  FrameError(#[from] FrameError),
}

pub enum DrawWrapper {
  Draw(Draw),
  Record(Record),
}

impl DrawWrapper {
  pub fn save_result(
    &self,
    path: &Path,
    frame: &Frame,
    result: Option<&Detection>,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      DrawWrapper::Draw(draw) => {
        draw.draw_detection(frame, result)?.save(path)?;
      }
      DrawWrapper::Record(record) => {
        frame.to_rgb_image()?.save(path)?;
        record.record(result, path)?;
      }
    };

    Ok(())
  }
}

/// 按日期分目录保存每一帧：`<dir>/YYYY/MM/DD/HH-MM-SS-XXXX.png`
///
/// `folder:///dir?record` 保存原图并写入同名文本记录；
/// `always` 表示未找到目标时也保存。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: DrawWrapper,
  frame_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let draw = if uri.query_pairs().any(|(k, _)| k == "record") {
      DrawWrapper::Record(Record)
    } else {
      DrawWrapper::Draw(Draw::default())
    };
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      draw,
      frame_counter: AtomicU16::new(0),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

#[async_trait]
impl Render for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  async fn render_result(
    &self,
    frame: &Frame,
    result: Option<&Detection>,
  ) -> Result<(), Self::Error> {
    if !self.always && result.is_none() {
      debug!("未找到目标, 跳过保存");
      return Ok(());
    }
    let path = self.frame_path()?;
    self.draw.save_result(&path, frame, result)?;
    debug!("帧已保存: {}", path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{bbox::SimBounds, frame::SimFrame};

  fn files_with_extension(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
      for entry in std::fs::read_dir(d).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          stack.push(path);
        } else if path.extension().is_some_and(|e| e == ext) {
          found.push(path);
        }
      }
    }
    found
  }

  #[tokio::test]
  async fn record_mode_writes_image_and_text() {
    let dir = tempfile::tempdir().unwrap();
    let url = url::Url::from_directory_path(dir.path()).unwrap();
    let url = url::Url::parse(&format!("folder://{}?record", url.path())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();

    let detection = Detection {
      object_name: "box".into(),
      bounds: SimBounds::from([1, 2, 3, 4]),
      confidence: Some(0.75),
    };
    output
      .render_result(&Frame::Raw(SimFrame::default()), Some(&detection))
      .await
      .unwrap();

    assert_eq!(files_with_extension(dir.path(), "png").len(), 1);
    let records = files_with_extension(dir.path(), "txt");
    assert_eq!(records.len(), 1);
    let text = std::fs::read_to_string(&records[0]).unwrap();
    assert_eq!(text, "box, 0.7500, 1, 2, 3, 4");
  }

  #[tokio::test]
  async fn skips_misses_unless_always() {
    let dir = tempfile::tempdir().unwrap();
    let base = url::Url::from_directory_path(dir.path()).unwrap();

    let url = url::Url::parse(&format!("folder://{}", base.path())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    output
      .render_result(&Frame::Raw(SimFrame::default()), None)
      .await
      .unwrap();
    assert!(files_with_extension(dir.path(), "png").is_empty());

    let url = url::Url::parse(&format!("folder://{}?always", base.path())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    output
      .render_result(&Frame::Raw(SimFrame::default()), None)
      .await
      .unwrap();
    assert_eq!(files_with_extension(dir.path(), "png").len(), 1);
  }
}
