// 该文件是 AIDog 项目的一部分。
// src/output/simulator_output.rs - 回传模拟器输出
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
use tracing::debug;
use url::Url;

use crate::{
  FromUrl,
  bridge::{BridgeError, SimulatorBridge},
  frame::Frame,
  locator::Detection,
  output::Render,
};

/// 把找到的边界框发回模拟器；未找到时不发送
pub struct SimulatorOutput {
  bridge: SimulatorBridge,
  object_name: Option<String>,
}

impl SimulatorOutput {
  pub fn new(bridge: SimulatorBridge) -> Self {
    Self {
      bridge,
      object_name: None,
    }
  }

  /// 以请求的物体名称回报，而不是定位器给出的标签
  pub fn with_object_name(mut self, object_name: impl Into<String>) -> Self {
    self.object_name = Some(object_name.into());
    self
  }
}

impl FromUrl for SimulatorOutput {
  type Error = BridgeError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    Ok(Self::new(SimulatorBridge::from_url(url)?))
  }
}

#[async_trait]
impl Render for SimulatorOutput {
  type Error = BridgeError;

  async fn render_result(
    &self,
    _frame: &Frame,
    result: Option<&Detection>,
  ) -> Result<(), Self::Error> {
    match result {
      Some(detection) => {
        self
          .bridge
          .send_bounds(
            self.object_name.as_deref().unwrap_or(&detection.object_name),
            detection.bounds,
          )
          .await
      }
      None => {
        debug!("没有边界框需要发送");
        Ok(())
      }
    }
  }
}
