// 该文件是 AIDog 项目的一部分。
// src/locator.rs - 目标定位
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
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  bbox::{NormalizedCorners, SimBounds},
  frame::{Frame, FrameError},
};

mod fixed;
mod gemini;
mod local;
#[cfg(feature = "model_yolo26")]
mod yolo26;

pub use self::fixed::FixedLocator;
pub use self::gemini::{
  BOUNDING_BOX_SYSTEM_INSTRUCTIONS, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, GeminiClient,
  GeminiClientBuilder, GeminiError, GeminiLocator, LabeledBox, parse_labeled_boxes,
};
pub use self::local::{DEFAULT_CONFIDENCE_THRESHOLD, LabelTable, LocalLocator};
#[cfg(feature = "model_yolo26")]
pub use self::yolo26::{Yolo26, Yolo26Builder, Yolo26Error};

/// 定位请求：固定词表中的标签，或自由文本提示
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectQuery {
  Label(String),
  Prompt(String),
}

impl ObjectQuery {
  pub fn text(&self) -> &str {
    match self {
      ObjectQuery::Label(s) | ObjectQuery::Prompt(s) => s,
    }
  }

  /// 发送给生成式模型的指令
  pub fn instruction(&self) -> String {
    match self {
      ObjectQuery::Label(label) => format!("Find the {label} in the image."),
      ObjectQuery::Prompt(prompt) => prompt.clone(),
    }
  }
}

/// 一次定位的结果，坐标已换算到模拟器坐标系
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  pub object_name: String,
  #[serde(rename = "bbox")]
  pub bounds: SimBounds,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub confidence: Option<f32>,
}

#[async_trait]
pub trait Locator: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  async fn locate(
    &self,
    frame: &Frame,
    query: &ObjectQuery,
  ) -> Result<Option<Detection>, Self::Error>;
}

/// 本地检测器的单个原始预测
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
  pub class_id: u32,
  pub score: f32,
  pub bbox: NormalizedCorners,
}

/// 本地预训练检测器，按模型输出顺序返回预测
pub trait Detector: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn detect(&self, frame: &Frame) -> Result<Vec<Prediction>, Self::Error>;
}

#[derive(Error, Debug)]
pub enum LocatorError {
  #[error("Gemini error: {0}")]
  Gemini(#[from] GeminiError),
  #[error("Detector error: {0}")]
  Detector(Box<dyn std::error::Error + Send + Sync>),
  #[error("Frame error: {0}")]
  Frame(#[from] FrameError),
  #[error("Invalid locator URL: {0}")]
  InvalidUrl(String),
  #[error("URI scheme mismatch: {0}")]
  SchemeMismatch(String),
}

impl LocatorError {
  /// 生成式模型返回了无法解析的 JSON
  pub fn is_malformed_response(&self) -> bool {
    matches!(self, LocatorError::Gemini(GeminiError::MalformedResponse(_)))
  }
}

pub enum LocatorWrapper {
  Gemini(GeminiLocator),
  Fixed(FixedLocator),
  #[cfg(feature = "model_yolo26")]
  Yolo26(LocalLocator<Yolo26>),
}

impl std::fmt::Debug for LocatorWrapper {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let kind = match self {
      LocatorWrapper::Gemini(_) => "gemini",
      LocatorWrapper::Fixed(_) => "fixed",
      #[cfg(feature = "model_yolo26")]
      LocatorWrapper::Yolo26(_) => "yolo26",
    };
    f.debug_tuple("LocatorWrapper").field(&kind).finish()
  }
}

impl FromUrl for LocatorWrapper {
  type Error = LocatorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      GeminiClientBuilder::SCHEME => {
        let client = GeminiClientBuilder::from_url(url)?.build()?;
        Ok(LocatorWrapper::Gemini(GeminiLocator::new(client)))
      }
      FixedLocator::SCHEME => Ok(LocatorWrapper::Fixed(FixedLocator::from_url(url)?)),
      #[cfg(feature = "model_yolo26")]
      Yolo26Builder::SCHEME => {
        let detector = Yolo26Builder::from_url(url)
          .and_then(|b| b.build())
          .map_err(|e| LocatorError::Detector(Box::new(e)))?;
        Ok(LocatorWrapper::Yolo26(LocalLocator::from_query(detector, url)?))
      }
      other => Err(LocatorError::SchemeMismatch(other.to_string())),
    }
  }
}

impl LocatorWrapper {
  /// Gemini 客户端，用于提示词生成文件名等附加功能
  pub fn gemini_client(&self) -> Option<&GeminiClient> {
    match self {
      LocatorWrapper::Gemini(locator) => Some(locator.client()),
      _ => None,
    }
  }
}

#[async_trait]
impl Locator for LocatorWrapper {
  type Error = LocatorError;

  async fn locate(
    &self,
    frame: &Frame,
    query: &ObjectQuery,
  ) -> Result<Option<Detection>, Self::Error> {
    match self {
      LocatorWrapper::Gemini(locator) => Ok(locator.locate(frame, query).await?),
      LocatorWrapper::Fixed(locator) => locator.locate(frame, query).await,
      #[cfg(feature = "model_yolo26")]
      LocatorWrapper::Yolo26(locator) => locator.locate(frame, query).await,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn label_query_gets_an_instruction() {
    let query = ObjectQuery::Label("ball".into());
    assert_eq!(query.instruction(), "Find the ball in the image.");
    assert_eq!(query.text(), "ball");

    let query = ObjectQuery::Prompt("find the red dog".into());
    assert_eq!(query.instruction(), "find the red dog");
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("onnx:///tmp/model.onnx").unwrap();
    assert!(matches!(
      LocatorWrapper::from_url(&url),
      Err(LocatorError::SchemeMismatch(s)) if s == "onnx"
    ));
  }

  #[test]
  fn fixed_scheme_builds_fixed_locator() {
    let url = Url::parse("fixed://test_object").unwrap();
    let locator = LocatorWrapper::from_url(&url).unwrap();
    assert!(matches!(locator, LocatorWrapper::Fixed(_)));
    assert!(locator.gemini_client().is_none());
  }

  #[test]
  fn detection_serializes_with_bbox_array() {
    let detection = Detection {
      object_name: "ball".into(),
      bounds: SimBounds::from([1, 2, 3, 4]),
      confidence: None,
    };
    let value = serde_json::to_value(&detection).unwrap();
    assert_eq!(
      value,
      serde_json::json!({"object_name": "ball", "bbox": [1, 2, 3, 4]})
    );
  }
}
