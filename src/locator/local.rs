// 该文件是 AIDog 项目的一部分。
// src/locator/local.rs - 本地检测器定位
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

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::{
  bbox::SimBounds,
  frame::Frame,
  locator::{Detection, Detector, Locator, LocatorError, ObjectQuery},
};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const UNKNOWN_LABEL: &str = "unknown";

/// 类别编号到物体名称的映射
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
  labels: BTreeMap<u32, String>,
}

impl Default for LabelTable {
  fn default() -> Self {
    Self {
      labels: BTreeMap::from([(1, "ball".to_string()), (2, "box".to_string())]),
    }
  }
}

impl LabelTable {
  /// 解析 `1:ball,2:box` 形式的标签表
  pub fn parse(spec: &str) -> Result<Self, LocatorError> {
    let mut labels = BTreeMap::new();
    for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
      let (id, name) = entry
        .split_once(':')
        .ok_or_else(|| LocatorError::InvalidUrl(format!("标签项格式错误: {entry}")))?;
      let id: u32 = id
        .trim()
        .parse()
        .map_err(|_| LocatorError::InvalidUrl(format!("标签编号无效: {id}")))?;
      labels.insert(id, name.trim().to_string());
    }
    Ok(Self { labels })
  }

  pub fn label(&self, class_id: u32) -> &str {
    self
      .labels
      .get(&class_id)
      .map(String::as_str)
      .unwrap_or(UNKNOWN_LABEL)
  }
}

/// 固定词表的本地定位器
///
/// 只保留置信度严格大于阈值的预测，按模型输出顺序返回第一个标签匹配的框。
/// 推理在阻塞线程池中执行。
pub struct LocalLocator<D> {
  detector: Arc<D>,
  labels: LabelTable,
  threshold: f32,
}

impl<D: Detector + 'static> LocalLocator<D> {
  pub fn new(detector: D) -> Self {
    Self {
      detector: Arc::new(detector),
      labels: LabelTable::default(),
      threshold: DEFAULT_CONFIDENCE_THRESHOLD,
    }
  }

  /// 从 URL 查询参数读取 `labels` 与 `threshold`
  pub fn from_query(detector: D, url: &Url) -> Result<Self, LocatorError> {
    let mut locator = Self::new(detector);
    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        "labels" => locator.labels = LabelTable::parse(&v)?,
        "threshold" => {
          locator.threshold = v
            .parse()
            .map_err(|_| LocatorError::InvalidUrl(format!("阈值无效: {v}")))?
        }
        _ => {}
      }
    }
    Ok(locator)
  }
}

#[async_trait]
impl<D: Detector + 'static> Locator for LocalLocator<D> {
  type Error = LocatorError;

  async fn locate(
    &self,
    frame: &Frame,
    query: &ObjectQuery,
  ) -> Result<Option<Detection>, Self::Error> {
    let detector = self.detector.clone();
    let frame = frame.clone();
    let predictions = tokio::task::spawn_blocking(move || detector.detect(&frame))
      .await
      .map_err(|e| LocatorError::Detector(Box::new(e)))?
      .map_err(|e| LocatorError::Detector(Box::new(e)))?;
    debug!("检测器返回 {} 个预测", predictions.len());

    let target = query.text();
    let found = predictions
      .into_iter()
      .filter(|p| p.score > self.threshold)
      .find(|p| self.labels.label(p.class_id) == target);

    Ok(found.map(|p| Detection {
      object_name: target.to_string(),
      bounds: SimBounds::from(p.bbox),
      confidence: Some(p.score),
    }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{bbox::NormalizedCorners, frame::SimFrame, locator::Prediction};

  struct ScriptedDetector(Vec<Prediction>);

  impl Detector for ScriptedDetector {
    type Error = std::io::Error;

    fn detect(&self, _frame: &Frame) -> Result<Vec<Prediction>, Self::Error> {
      Ok(self.0.clone())
    }
  }

  struct BrokenDetector;

  impl Detector for BrokenDetector {
    type Error = std::io::Error;

    fn detect(&self, _frame: &Frame) -> Result<Vec<Prediction>, Self::Error> {
      Err(std::io::Error::other("npu offline"))
    }
  }

  /// 等待另一个异步任务的信号后才返回
  struct WaitingDetector(std::sync::Mutex<std::sync::mpsc::Receiver<()>>);

  impl Detector for WaitingDetector {
    type Error = std::io::Error;

    fn detect(&self, _frame: &Frame) -> Result<Vec<Prediction>, Self::Error> {
      let receiver = self.0.lock().map_err(|e| std::io::Error::other(e.to_string()))?;
      receiver
        .recv_timeout(std::time::Duration::from_secs(5))
        .map_err(std::io::Error::other)?;
      Ok(vec![prediction(1, 0.9, 0.0)])
    }
  }

  fn prediction(class_id: u32, score: f32, x: f32) -> Prediction {
    Prediction {
      class_id,
      score,
      bbox: NormalizedCorners([x, 0.0, x + 0.25, 0.5]),
    }
  }

  fn frame() -> Frame {
    Frame::Raw(SimFrame::default())
  }

  #[tokio::test]
  async fn score_at_threshold_is_excluded() {
    let locator = LocalLocator::new(ScriptedDetector(vec![prediction(1, 0.5, 0.0)]));
    let result = locator
      .locate(&frame(), &ObjectQuery::Label("ball".into()))
      .await
      .unwrap();
    assert!(result.is_none());
  }

  #[tokio::test]
  async fn first_confident_match_wins() {
    let locator = LocalLocator::new(ScriptedDetector(vec![
      prediction(1, 0.4, 0.0),
      prediction(2, 0.9, 0.25),
      prediction(1, 0.6, 0.5),
      prediction(1, 0.99, 0.75),
    ]));
    let result = locator
      .locate(&frame(), &ObjectQuery::Label("ball".into()))
      .await
      .unwrap()
      .unwrap();
    assert_eq!(result.object_name, "ball");
    assert_eq!(result.bounds, SimBounds::from([256, 0, 128, 256]));
    assert_eq!(result.confidence, Some(0.6));
  }

  #[tokio::test]
  async fn unknown_classes_map_to_unknown_label() {
    let locator = LocalLocator::new(ScriptedDetector(vec![prediction(7, 0.9, 0.0)]));
    let result = locator
      .locate(&frame(), &ObjectQuery::Label("unknown".into()))
      .await
      .unwrap();
    assert!(result.is_some());

    let result = locator
      .locate(&frame(), &ObjectQuery::Label("ball".into()))
      .await
      .unwrap();
    assert!(result.is_none());
  }

  #[tokio::test]
  async fn detector_failure_is_propagated() {
    let locator = LocalLocator::new(BrokenDetector);
    let err = locator
      .locate(&frame(), &ObjectQuery::Label("ball".into()))
      .await
      .unwrap_err();
    assert!(matches!(err, LocatorError::Detector(_)));
  }

  #[tokio::test]
  async fn detection_leaves_the_runtime_free() {
    let (tx, rx) = std::sync::mpsc::channel();
    let locator = LocalLocator::new(WaitingDetector(std::sync::Mutex::new(rx)));

    // 单线程运行时下，只有推理不占用该线程时这个任务才能运行
    let signal = tokio::spawn(async move { tx.send(()).unwrap() });

    let result = locator
      .locate(&frame(), &ObjectQuery::Label("ball".into()))
      .await
      .unwrap();
    assert!(result.is_some());
    signal.await.unwrap();
  }

  #[test]
  fn label_table_parses_pairs() {
    let table = LabelTable::parse("1:ball, 3:dog").unwrap();
    assert_eq!(table.label(3), "dog");
    assert_eq!(table.label(2), "unknown");
    assert!(LabelTable::parse("ball").is_err());
  }

  #[test]
  fn query_overrides_labels_and_threshold() {
    let url = Url::parse("yolo26:///model.rknn?labels=0:person&threshold=0.7").unwrap();
    let locator = LocalLocator::from_query(ScriptedDetector(vec![]), &url).unwrap();
    assert_eq!(locator.labels.label(0), "person");
    assert_eq!(locator.threshold, 0.7);
  }
}
