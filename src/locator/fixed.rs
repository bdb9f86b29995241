// 该文件是 AIDog 项目的一部分。
// src/locator/fixed.rs - 固定结果定位器（离线调试用）
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
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  bbox::{Box2d, SimBounds},
  frame::Frame,
  locator::{Detection, Locator, LocatorError, ObjectQuery},
};

const DEFAULT_OBJECT_NAME: &str = "test_object";
const DEFAULT_BOX_2D: [f64; 4] = [469.0, 638.0, 585.0, 765.0];

/// 不调用任何模型，始终返回同一个框
#[derive(Debug, Clone)]
pub struct FixedLocator {
  object_name: String,
  box_2d: Box2d,
}

impl Default for FixedLocator {
  fn default() -> Self {
    Self {
      object_name: DEFAULT_OBJECT_NAME.to_string(),
      box_2d: Box2d::from(DEFAULT_BOX_2D),
    }
  }
}

impl FromUrlWithScheme for FixedLocator {
  const SCHEME: &'static str = "fixed";
}

impl FromUrl for FixedLocator {
  type Error = LocatorError;

  /// `fixed://<object name>?box=ymin,xmin,ymax,xmax`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(LocatorError::SchemeMismatch(url.scheme().to_string()));
    }

    let mut locator = Self::default();
    if let Some(name) = url.host_str().filter(|h| !h.is_empty()) {
      locator.object_name = urlencoding::decode(name)
        .map(|n| n.into_owned())
        .unwrap_or_else(|_| name.to_string());
    }

    if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "box") {
      let values = v
        .split(',')
        .map(|n| n.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| LocatorError::InvalidUrl(format!("边界框无效: {v}")))?;
      let values: [f64; 4] = values
        .try_into()
        .map_err(|_| LocatorError::InvalidUrl(format!("边界框需要 4 个数值: {v}")))?;
      locator.box_2d = Box2d::from(values);
    }

    Ok(locator)
  }
}

#[async_trait]
impl Locator for FixedLocator {
  type Error = LocatorError;

  async fn locate(
    &self,
    _frame: &Frame,
    _query: &ObjectQuery,
  ) -> Result<Option<Detection>, Self::Error> {
    Ok(Some(Detection {
      object_name: self.object_name.clone(),
      bounds: SimBounds::from(self.box_2d),
      confidence: None,
    }))
  }
}
