// 该文件是 AIDog 项目的一部分。
// src/bin/find_object.rs - 单次定位工具
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use aidog::{
  FromUrl,
  input::InputWrapper,
  locator::{LocatorWrapper, ObjectQuery},
  output::OutputWrapper,
  task::{OneShotTask, PollUntilFoundTask, Task, TaskOutcome},
};

/// 从模拟器或图片中定位一个物体
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源 (http://模拟器 或 image:///file.png)
  #[arg(long, value_name = "SOURCE", default_value = "http://localhost:5000")]
  pub input: Url,
  /// 定位器
  #[arg(
    long,
    env = "AIDOG_LOCATOR",
    value_name = "LOCATOR",
    default_value = "gemini://gemini-2.5-pro-exp-03-25"
  )]
  pub locator: Url,
  /// 输出 (http://模拟器、image:///out.png 或 folder:///dir)
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 要查找的物体
  #[arg(long, value_name = "NAME")]
  pub object: String,
  /// 把物体名称当作自由文本提示
  #[arg(long)]
  pub prompt: bool,
  /// 轮询直到找到物体
  #[arg(long)]
  pub poll: bool,
  /// 轮询的最大尝试次数
  #[arg(long, default_value = "10")]
  pub max_attempts: u32,
  /// 轮询间隔（毫秒）
  #[arg(long, default_value = "500")]
  pub interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
  dotenvy::dotenv().ok();
  aidog::init_tracing();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("定位器: {}", args.locator);
  info!("输出路径: {}", args.output);

  let input = InputWrapper::from_url(&args.input)?;
  let locator = LocatorWrapper::from_url(&args.locator)?;
  let output = OutputWrapper::from_url(&args.output)?;
  let query = if args.prompt {
    ObjectQuery::Prompt(args.object.clone())
  } else {
    ObjectQuery::Label(args.object.clone())
  };

  let outcome = if args.poll {
    PollUntilFoundTask::default()
      .with_max_attempts(args.max_attempts)
      .with_interval(Duration::from_millis(args.interval_ms))
      .run_task(&input, &locator, &output, &query)
      .await?
  } else {
    OneShotTask
      .run_task(&input, &locator, &output, &query)
      .await?
  };

  match outcome {
    TaskOutcome::Found(detection) => {
      info!("Found object: {} {}", detection.object_name, detection.bounds)
    }
    TaskOutcome::NoImage => anyhow::bail!("Failed to get image from Unity."),
    TaskOutcome::NotFound => info!("No objects found."),
  }

  Ok(())
}
