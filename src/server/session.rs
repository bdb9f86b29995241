// 该文件是 AIDog 项目的一部分。
// src/server/session.rs - 物体搜索会话
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

use axum::{
  Json,
  extract::{Query, State},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::{
  bbox::SimBounds,
  frame::{Frame, SimFrame},
  locator::{Locator, ObjectQuery},
  server::{
    AppState,
    error::{INVALID_OBJECT_NAME, JsonBody, OBJECT_NAME_REQUIRED, ServerError, ServerResult},
    unity::ObjectNameQuery,
  },
};

const FAILED_TO_PROCESS_IMAGE: &str = "Failed to process image";
/// 每个会话保留的最近结果数
pub const MAX_SESSION_RESULTS: usize = 64;

/// 会话中一帧的处理结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SessionEntry {
  Found { bounding_box: SimBounds },
  Failed { error: String },
}

#[derive(Deserialize)]
pub struct StartRequest {
  object_name: Option<String>,
}

pub async fn start_object_request(
  State(state): State<AppState>,
  JsonBody(request): JsonBody<StartRequest>,
) -> ServerResult<Json<Value>> {
  let name = request
    .object_name
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
    .ok_or(ServerError::BadRequest(OBJECT_NAME_REQUIRED))?;

  info!("开始搜索会话: {}", name);
  state.sessions.insert(name, Vec::new());
  Ok(Json(json!({ "message": "Object request started" })))
}

#[derive(Deserialize)]
pub struct SendImageRequest {
  object_name: Option<String>,
  /// base64 编码的 512x512 RGB24 原始像素
  raw_image: String,
}

#[derive(Serialize, Debug)]
pub struct SendImageResponse {
  success: bool,
  object_name: String,
  bounding_box: Option<SimBounds>,
}

fn decode_raw_image(raw_image: &str) -> Option<Frame> {
  let data = STANDARD
    .decode(raw_image)
    .inspect_err(|e| warn!("图像不是合法的 base64: {}", e))
    .ok()?;
  SimFrame::try_from(data)
    .inspect_err(|e| warn!("图像尺寸错误: {}", e))
    .ok()
    .map(Frame::Raw)
}

fn push_entry(entries: &mut Vec<SessionEntry>, entry: SessionEntry) {
  if entries.len() >= MAX_SESSION_RESULTS {
    let excess = entries.len() + 1 - MAX_SESSION_RESULTS;
    entries.drain(..excess);
  }
  entries.push(entry);
}

pub async fn send_image(
  State(state): State<AppState>,
  JsonBody(request): JsonBody<SendImageRequest>,
) -> ServerResult<Json<SendImageResponse>> {
  let name = request
    .object_name
    .map(|s| s.trim().to_string())
    .filter(|name| state.sessions.contains_key(name))
    .ok_or(ServerError::BadRequest(INVALID_OBJECT_NAME))?;

  let located = match decode_raw_image(&request.raw_image) {
    Some(frame) => {
      let query = ObjectQuery::Label(name.clone());
      state
        .locator
        .locate(&frame, &query)
        .await
        .inspect_err(|e| warn!("定位失败: {}", e))
        .ok()
    }
    None => None,
  };

  let (entry, bounds) = match located {
    Some(Some(detection)) => (
      Some(SessionEntry::Found {
        bounding_box: detection.bounds,
      }),
      Some(detection.bounds),
    ),
    Some(None) => (None, None),
    None => (
      Some(SessionEntry::Failed {
        error: FAILED_TO_PROCESS_IMAGE.to_string(),
      }),
      None,
    ),
  };

  if let Some(entry) = entry {
    match state.sessions.get_mut(&name) {
      Some(mut entries) => push_entry(&mut entries, entry),
      None => debug!("会话 {} 已被移除", name),
    }
  }

  Ok(Json(SendImageResponse {
    success: bounds.is_some(),
    object_name: name,
    bounding_box: bounds,
  }))
}

pub async fn get_bounds(
  State(state): State<AppState>,
  Query(query): Query<ObjectNameQuery>,
) -> ServerResult<Json<Value>> {
  let entries = query
    .name()
    .and_then(|name| state.sessions.get(name))
    .map(|entries| entries.clone())
    .ok_or(ServerError::BadRequest(INVALID_OBJECT_NAME))?;

  Ok(Json(json!({ "results": entries })))
}
