// 该文件是 AIDog 项目的一部分。
// src/server.rs - HTTP 服务入口
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
use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use dashmap::DashMap;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;

use crate::{
  FromUrl,
  args::Args,
  bridge::SimulatorBridge,
  locator::{LocatorError, LocatorWrapper},
  task::PollUntilFoundTask,
};

pub mod error;
mod session;
mod tools;
mod unity;

pub use self::error::{ServerError, ServerResult};
pub use self::session::SessionEntry;

/// 两个监听器共享的状态；只有会话结果可变
#[derive(Clone)]
pub struct AppState {
  pub bridge: SimulatorBridge,
  pub locator: Arc<LocatorWrapper>,
  pub sessions: Arc<DashMap<String, Vec<SessionEntry>>>,
  pub static_dir: PathBuf,
  pub capture_dir: PathBuf,
  pub poll: PollUntilFoundTask,
}

impl AppState {
  pub fn new(bridge: SimulatorBridge, locator: LocatorWrapper) -> Self {
    Self {
      bridge,
      locator: Arc::new(locator),
      sessions: Arc::new(DashMap::new()),
      static_dir: PathBuf::from("static"),
      capture_dir: PathBuf::from("captures"),
      poll: PollUntilFoundTask::default(),
    }
  }

  pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.static_dir = dir.into();
    self
  }

  pub fn with_capture_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.capture_dir = dir.into();
    self
  }

  pub fn with_poll(mut self, poll: PollUntilFoundTask) -> Self {
    self.poll = poll;
    self
  }

  pub fn from_args(args: &Args) -> Result<Self, StartupError> {
    let bridge = SimulatorBridge::with_timeout(&args.simulator, args.request_timeout())?;
    let locator = LocatorWrapper::from_url(&args.locator)?;
    info!("定位器: {:?}", locator);

    Ok(
      Self::new(bridge, locator)
        .with_static_dir(&args.static_dir)
        .with_capture_dir(&args.capture_dir)
        .with_poll(
          PollUntilFoundTask::default()
            .with_max_attempts(args.max_attempts)
            .with_interval(args.poll_interval()),
        ),
    )
  }
}

#[derive(thiserror::Error, Debug)]
pub enum StartupError {
  #[error("Simulator error: {0}")]
  Bridge(#[from] crate::bridge::BridgeError),
  #[error("Locator error: {0}")]
  Locator(#[from] LocatorError),
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Server task failed: {0}")]
  Join(#[from] tokio::task::JoinError),
}

/// Unity 连接服务：图像中转、边界框回传、命令入口、会话与静态文件
pub fn unity_router(state: AppState) -> Router {
  let static_files = ServeDir::new(&state.static_dir);

  Router::new()
    .route("/ping", get(unity::ping))
    .route("/image_from_unity", get(unity::image_from_unity))
    .route("/bounds_to_unity", post(unity::bounds_to_unity))
    .route("/submit_command", post(unity::submit_command))
    .route("/start_object_request", post(session::start_object_request))
    .route("/send_image", post(session::send_image))
    .route("/get_bounds", get(session::get_bounds))
    .nest_service("/static", static_files)
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// 工具服务：`POST /mcp` 上的 JSON-RPC 2.0
pub fn tool_router(state: AppState) -> Router {
  Router::new()
    .route("/mcp", post(tools::handle_rpc))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

async fn run(
  name: &'static str,
  addr: SocketAddr,
  router: Router,
  mut shutdown: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
  let listener = TcpListener::bind(addr).await?;
  info!("{} 监听于 {}", name, listener.local_addr()?);

  axum::serve(listener, router)
    .with_graceful_shutdown(async move {
      let _ = shutdown.wait_for(|stop| *stop).await;
    })
    .await?;

  info!("{} 已停止", name);
  Ok(())
}

/// 同时运行工具服务与 Unity 连接服务，收到 Ctrl-C 后优雅退出
pub async fn serve(
  agent_addr: SocketAddr,
  unity_addr: SocketAddr,
  state: AppState,
) -> Result<(), StartupError> {
  tokio::fs::create_dir_all(&state.static_dir).await?;

  let (tx, rx) = watch::channel(false);
  let unity = tokio::spawn(run(
    "Unity 连接服务",
    unity_addr,
    unity_router(state.clone()),
    rx.clone(),
  ));
  let agent = tokio::spawn(run("工具服务", agent_addr, tool_router(state), rx));

  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(true);
    }
  });

  let (unity, agent) = tokio::join!(unity, agent);
  unity??;
  agent??;
  Ok(())
}
