// 该文件是 AIDog 项目的一部分。
// tests/common/mod.rs - 测试用模拟器与 Gemini 替身
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

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
  Json, Router,
  body::Body,
  extract::{Query, State},
  http::{HeaderMap, Response, StatusCode, header::CONTENT_TYPE},
  response::IntoResponse,
  routing::{get, post},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use url::Url;

use aidog::frame::{SIM_FRAME_SIZE, encode_png};

pub async fn spawn(router: Router) -> SocketAddr {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move {
    axum::serve(listener, router).await.unwrap();
  });
  addr
}

pub fn url_for(addr: SocketAddr) -> Url {
  Url::parse(&format!("http://{addr}")).unwrap()
}

/// 模拟器 `/image_from_unity` 的应答方式
#[derive(Clone, Copy, Debug)]
pub enum FrameMode {
  Png,
  Raw,
  /// 长度错误的原始像素
  ShortRaw,
  Missing,
  Text,
}

#[derive(Clone)]
pub struct MockSimulator {
  pub frame_mode: Arc<Mutex<FrameMode>>,
  pub bounds_status: Arc<Mutex<StatusCode>>,
  pub image_requests: Arc<Mutex<Vec<Option<String>>>>,
  pub posted_bounds: Arc<Mutex<Vec<Value>>>,
}

impl MockSimulator {
  pub fn new(frame_mode: FrameMode) -> Self {
    Self {
      frame_mode: Arc::new(Mutex::new(frame_mode)),
      bounds_status: Arc::new(Mutex::new(StatusCode::OK)),
      image_requests: Arc::new(Mutex::new(Vec::new())),
      posted_bounds: Arc::new(Mutex::new(Vec::new())),
    }
  }

  pub fn reject_bounds(&self, status: StatusCode) {
    *self.bounds_status.lock().unwrap() = status;
  }

  pub fn image_request_count(&self) -> usize {
    self.image_requests.lock().unwrap().len()
  }

  pub fn posted_bounds(&self) -> Vec<Value> {
    self.posted_bounds.lock().unwrap().clone()
  }

  pub async fn start(&self) -> Url {
    let router = Router::new()
      .route("/image_from_unity", get(image_from_unity))
      .route("/bounds_to_unity", post(bounds_to_unity))
      .with_state(self.clone());
    url_for(spawn(router).await)
  }
}

pub fn sim_png() -> Vec<u8> {
  let image = image::RgbImage::from_pixel(SIM_FRAME_SIZE, SIM_FRAME_SIZE, image::Rgb([40, 80, 120]));
  encode_png(&image).unwrap()
}

pub fn sim_raw() -> Vec<u8> {
  vec![7u8; (SIM_FRAME_SIZE * SIM_FRAME_SIZE * 3) as usize]
}

async fn image_from_unity(
  State(sim): State<MockSimulator>,
  Query(query): Query<HashMap<String, String>>,
) -> Response<Body> {
  sim
    .image_requests
    .lock()
    .unwrap()
    .push(query.get("object_name").cloned());

  let mode = *sim.frame_mode.lock().unwrap();
  match mode {
    FrameMode::Png => ([(CONTENT_TYPE, "image/png")], sim_png()).into_response(),
    FrameMode::Raw => ([(CONTENT_TYPE, "application/octet-stream")], sim_raw()).into_response(),
    FrameMode::ShortRaw => {
      ([(CONTENT_TYPE, "application/octet-stream")], vec![0u8; 99]).into_response()
    }
    FrameMode::Missing => StatusCode::NOT_FOUND.into_response(),
    FrameMode::Text => ([(CONTENT_TYPE, "text/plain")], "hello").into_response(),
  }
}

async fn bounds_to_unity(State(sim): State<MockSimulator>, Json(body): Json<Value>) -> StatusCode {
  sim.posted_bounds.lock().unwrap().push(body);
  *sim.bounds_status.lock().unwrap()
}

/// Gemini `generateContent` 替身，始终返回预设文本
#[derive(Clone)]
pub struct MockGemini {
  pub reply: Arc<Mutex<String>>,
  pub status: Arc<Mutex<StatusCode>>,
  pub requests: Arc<Mutex<Vec<(HeaderMap, Value)>>>,
}

impl MockGemini {
  pub fn replying(text: &str) -> Self {
    Self {
      reply: Arc::new(Mutex::new(text.to_string())),
      status: Arc::new(Mutex::new(StatusCode::OK)),
      requests: Arc::new(Mutex::new(Vec::new())),
    }
  }

  pub fn fail_with(&self, status: StatusCode) {
    *self.status.lock().unwrap() = status;
  }

  pub fn requests(&self) -> Vec<(HeaderMap, Value)> {
    self.requests.lock().unwrap().clone()
  }

  /// 返回客户端使用的 base url
  pub async fn start(&self) -> String {
    let router = Router::new()
      .route("/models/{action}", post(generate_content))
      .with_state(self.clone());
    format!("http://{}", spawn(router).await)
  }
}

async fn generate_content(
  State(gemini): State<MockGemini>,
  headers: HeaderMap,
  Json(body): Json<Value>,
) -> Response<Body> {
  gemini.requests.lock().unwrap().push((headers, body));

  let status = *gemini.status.lock().unwrap();
  if !status.is_success() {
    return (status, "quota exceeded").into_response();
  }

  let text = gemini.reply.lock().unwrap().clone();
  Json(json!({
    "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
  }))
  .into_response()
}
