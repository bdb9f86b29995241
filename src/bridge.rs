// 该文件是 AIDog 项目的一部分。
// src/bridge.rs - 模拟器 HTTP 连接
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

use std::time::Duration;

use reqwest::{StatusCode, header::CONTENT_TYPE};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::{
  FromUrl,
  bbox::SimBounds,
  frame::{Frame, FrameError, SimFrame},
};

pub const CONTENT_TYPE_PNG: &str = "image/png";
pub const CONTENT_TYPE_RAW: &str = "application/octet-stream";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum BridgeError {
  #[error("URI scheme mismatch: {0}")]
  SchemeMismatch(String),
  #[error("HTTP request failed: {0}")]
  Request(#[from] reqwest::Error),
  #[error("Simulator returned status {0}")]
  Status(StatusCode),
  #[error("Invalid frame: {0}")]
  Frame(#[from] FrameError),
  #[error("Invalid URL: {0}")]
  Url(#[from] url::ParseError),
}

#[derive(Serialize)]
struct BoundsPayload<'a> {
  object_name: &'a str,
  bounding_box: SimBounds,
}

/// 模拟器连接：获取相机帧，回传边界框
#[derive(Debug, Clone)]
pub struct SimulatorBridge {
  client: reqwest::Client,
  base_url: Url,
}

impl FromUrl for SimulatorBridge {
  type Error = BridgeError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    Self::with_timeout(url, DEFAULT_TIMEOUT)
  }
}

impl SimulatorBridge {
  pub fn with_timeout(url: &Url, timeout: Duration) -> Result<Self, BridgeError> {
    if url.scheme() != "http" && url.scheme() != "https" {
      return Err(BridgeError::SchemeMismatch(url.scheme().to_string()));
    }

    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self::with_client(client, url.clone()))
  }

  pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
    Self { client, base_url }
  }

  fn endpoint(&self, path: &str) -> Result<Url, BridgeError> {
    let mut base = self.base_url.clone();
    if !base.path().ends_with('/') {
      let path = format!("{}/", base.path());
      base.set_path(&path);
    }
    Ok(base.join(path)?)
  }

  /// 请求一帧新图像
  ///
  /// 非 200 状态码或未知的 Content-Type 返回 `Ok(None)`。
  pub async fn fetch_frame(&self, object_name: Option<&str>) -> Result<Option<Frame>, BridgeError> {
    let mut url = self.endpoint("image_from_unity")?;
    if let Some(name) = object_name {
      url.query_pairs_mut().append_pair("object_name", name);
    }

    let response = self.client.get(url).send().await?;
    let status = response.status();
    debug!("image_from_unity 响应状态: {}", status);

    if status != StatusCode::OK {
      warn!("模拟器未返回图像, 状态码: {}", status);
      return Ok(None);
    }

    let content_type = response
      .headers()
      .get(CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase());

    match content_type.as_deref() {
      Some(CONTENT_TYPE_PNG) => {
        let data = response.bytes().await?;
        debug!("收到 PNG 图像, {} 字节", data.len());
        Ok(Some(Frame::Png(data.to_vec())))
      }
      Some(CONTENT_TYPE_RAW) => {
        let data = response.bytes().await?;
        debug!("收到原始像素, {} 字节", data.len());
        let raw = SimFrame::try_from(data.to_vec())?;
        Ok(Some(Frame::Raw(raw)))
      }
      other => {
        warn!("未知的图像类型: {:?}", other);
        Ok(None)
      }
    }
  }

  /// 将边界框发送给模拟器
  pub async fn send_bounds(&self, object_name: &str, bounds: SimBounds) -> Result<(), BridgeError> {
    let url = self.endpoint("bounds_to_unity")?;
    let payload = BoundsPayload {
      object_name,
      bounding_box: bounds,
    };

    let response = self.client.post(url).json(&payload).send().await?;
    let status = response.status();
    if !status.is_success() {
      warn!("发送边界框失败, 状态码: {}", status);
      return Err(BridgeError::Status(status));
    }

    debug!("边界框已发送: {} {}", object_name, bounds);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_non_http_scheme() {
    let url = Url::parse("image:///tmp/a.png").unwrap();
    assert!(matches!(
      SimulatorBridge::from_url(&url),
      Err(BridgeError::SchemeMismatch(_))
    ));
  }

  #[test]
  fn endpoints_keep_base_path() {
    let url = Url::parse("http://localhost:5000/unity").unwrap();
    let bridge = SimulatorBridge::from_url(&url).unwrap();
    assert_eq!(
      bridge.endpoint("image_from_unity").unwrap().as_str(),
      "http://localhost:5000/unity/image_from_unity"
    );

    let url = Url::parse("http://localhost:5000").unwrap();
    let bridge = SimulatorBridge::from_url(&url).unwrap();
    assert_eq!(
      bridge.endpoint("bounds_to_unity").unwrap().as_str(),
      "http://localhost:5000/bounds_to_unity"
    );
  }
}
