// 该文件是 AIDog 项目的一部分。
// src/args.rs - 服务参数配置
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

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use url::Url;

/// AIDog 服务参数配置
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 工具服务监听地址 (JSON-RPC `/mcp`)
  #[arg(long, env = "AIDOG_AGENT_ADDR", default_value = "127.0.0.1:8000")]
  pub agent_addr: SocketAddr,

  /// Unity 连接服务监听地址
  #[arg(long, env = "AIDOG_UNITY_ADDR", default_value = "127.0.0.1:5001")]
  pub unity_addr: SocketAddr,

  /// 模拟器地址
  #[arg(long, env = "AIDOG_SIMULATOR", default_value = "http://localhost:5000")]
  pub simulator: Url,

  /// 定位器
  /// 支持格式:
  /// - gemini://<model>?temperature=0.5
  /// - fixed://<name>?box=ymin,xmin,ymax,xmax
  /// - yolo26:///path/to/model.rknn?labels=1:ball,2:box&threshold=0.5
  #[arg(
    long,
    env = "AIDOG_LOCATOR",
    default_value = "gemini://gemini-2.5-pro-exp-03-25"
  )]
  pub locator: Url,

  /// 保存图像并对外提供 `/static` 的目录
  #[arg(long, env = "AIDOG_STATIC_DIR", default_value = "static")]
  pub static_dir: PathBuf,

  /// `capture_image` 工具保存图像的目录
  #[arg(long, env = "AIDOG_CAPTURE_DIR", default_value = "captures")]
  pub capture_dir: PathBuf,

  /// 轮询的最大尝试次数
  #[arg(long, env = "AIDOG_MAX_ATTEMPTS", default_value = "10")]
  pub max_attempts: u32,

  /// 轮询间隔（毫秒）
  #[arg(long, env = "AIDOG_POLL_INTERVAL_MS", default_value = "500")]
  pub poll_interval_ms: u64,

  /// 访问模拟器的请求超时（秒）
  #[arg(long, env = "AIDOG_REQUEST_TIMEOUT", default_value = "30")]
  pub request_timeout: u64,
}

impl Args {
  pub fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.poll_interval_ms)
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout)
  }
}
