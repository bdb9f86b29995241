// 该文件是 AIDog 项目的一部分。
// src/main.rs - 项目主程序
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

use anyhow::Result;
use clap::Parser;
use tracing::info;

use aidog::{
  args::Args,
  server::{self, AppState},
};

#[tokio::main]
async fn main() -> Result<()> {
  dotenvy::dotenv().ok();
  aidog::init_tracing();

  let args = Args::parse();

  info!("AIDog 模拟器物体定位服务");
  info!("模拟器地址: {}", args.simulator);
  info!("定位器: {}", args.locator);
  info!("静态文件目录: {}", args.static_dir.display());
  info!(
    "轮询: 最多 {} 次, 间隔 {:?}",
    args.max_attempts,
    args.poll_interval()
  );

  let state = AppState::from_args(&args)?;
  server::serve(args.agent_addr, args.unity_addr, state).await?;

  info!("服务已退出");
  Ok(())
}
