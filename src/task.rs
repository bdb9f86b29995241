// 该文件是 AIDog 项目的一部分。
// src/task.rs - 定位任务编排
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

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
  input::FrameSource,
  locator::{Detection, Locator, ObjectQuery},
  output::Render,
};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// 一次任务的结局
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
  Found(Detection),
  /// 输入端没有给出图像
  NoImage,
  NotFound,
}

#[async_trait]
pub trait Task<I, L, O>: Sized {
  type Error;

  async fn run_task(
    self,
    input: &I,
    locator: &L,
    output: &O,
    query: &ObjectQuery,
  ) -> Result<TaskOutcome, Self::Error>;
}

/// 取一帧、定位一次、渲染一次；未找到时也交给输出端
pub struct OneShotTask;

#[async_trait]
impl<I, L, O> Task<I, L, O> for OneShotTask
where
  I: FrameSource,
  L: Locator,
  O: Render,
{
  type Error = anyhow::Error;

  async fn run_task(
    self,
    input: &I,
    locator: &L,
    output: &O,
    query: &ObjectQuery,
  ) -> Result<TaskOutcome, Self::Error> {
    info!("开始任务...");
    let Some(frame) = input.next_frame(Some(query.text())).await? else {
      warn!("没有输入帧");
      return Ok(TaskOutcome::NoImage);
    };
    info!("输入帧获取成功，开始定位...");
    let now = std::time::Instant::now();
    let result = locator.locate(&frame, query).await?;
    info!("定位完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, result.as_ref()).await?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(match result {
      Some(detection) => TaskOutcome::Found(detection),
      None => TaskOutcome::NotFound,
    })
  }
}

/// 反复取帧定位，直到找到目标、没有图像或用完尝试次数
///
/// 只有找到目标的那一帧会交给输出端。
#[derive(Debug, Clone)]
pub struct PollUntilFoundTask {
  max_attempts: u32,
  interval: Duration,
}

impl Default for PollUntilFoundTask {
  fn default() -> Self {
    Self {
      max_attempts: DEFAULT_MAX_ATTEMPTS,
      interval: DEFAULT_POLL_INTERVAL,
    }
  }
}

impl PollUntilFoundTask {
  pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
    self.max_attempts = max_attempts;
    self
  }

  pub fn with_interval(mut self, interval: Duration) -> Self {
    self.interval = interval;
    self
  }
}

#[async_trait]
impl<I, L, O> Task<I, L, O> for PollUntilFoundTask
where
  I: FrameSource,
  L: Locator,
  O: Render,
{
  type Error = anyhow::Error;

  async fn run_task(
    self,
    input: &I,
    locator: &L,
    output: &O,
    query: &ObjectQuery,
  ) -> Result<TaskOutcome, Self::Error> {
    info!("开始轮询 {}, 最多 {} 次", query.text(), self.max_attempts);
    for attempt in 1..=self.max_attempts {
      let Some(frame) = input.next_frame(Some(query.text())).await? else {
        warn!("({}) 没有输入帧, 停止轮询", attempt);
        return Ok(TaskOutcome::NoImage);
      };

      if let Some(detection) = locator.locate(&frame, query).await? {
        info!("({}) 找到目标: {} {}", attempt, detection.object_name, detection.bounds);
        output.render_result(&frame, Some(&detection)).await?;
        return Ok(TaskOutcome::Found(detection));
      }

      info!("({}) 未找到目标", attempt);
      if attempt < self.max_attempts {
        tokio::time::sleep(self.interval).await;
      }
    }

    warn!("尝试 {} 次后仍未找到目标", self.max_attempts);
    Ok(TaskOutcome::NotFound)
  }
}
