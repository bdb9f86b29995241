// 该文件是 AIDog 项目的一部分。
// src/server/unity.rs - Unity 连接服务处理器
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

use std::path::Path;

use axum::{
  Form, Json,
  extract::{FromRequest, Query, Request, State},
  http::header::CONTENT_TYPE,
  response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::{
  bbox::SimBounds,
  bridge::{BridgeError, CONTENT_TYPE_PNG},
  frame::{Frame, encode_png},
  locator::{Detection, GeminiError, Locator, LocatorError, ObjectQuery},
  output::{draw::Draw, sanitize_file_stem},
  server::{
    AppState,
    error::{JsonBody, OBJECT_NAME_REQUIRED, ServerError, ServerResult},
  },
};

#[derive(Deserialize)]
pub struct ObjectNameQuery {
  object_name: Option<String>,
}

impl ObjectNameQuery {
  /// 去掉首尾空白后非空的物体名称
  pub fn name(&self) -> Option<&str> {
    self
      .object_name
      .as_deref()
      .map(str::trim)
      .filter(|s| !s.is_empty())
  }
}

pub async fn ping() -> Json<Value> {
  Json(json!({ "message": "pong" }))
}

pub async fn image_from_unity(
  State(state): State<AppState>,
  Query(query): Query<ObjectNameQuery>,
) -> ServerResult<Response> {
  let name = query
    .name()
    .ok_or(ServerError::BadRequest(OBJECT_NAME_REQUIRED))?;

  let frame = match state.bridge.fetch_frame(Some(name)).await {
    Ok(Some(frame)) => frame,
    Ok(None) => return Err(ServerError::NoImage),
    Err(e) => {
      warn!("从模拟器获取图像失败: {}", e);
      return Err(ServerError::NoImage);
    }
  };

  Ok(([(CONTENT_TYPE, CONTENT_TYPE_PNG)], frame.to_png()?).into_response())
}

#[derive(Deserialize)]
pub struct BoundsRequest {
  object_name: Option<String>,
  bounding_box: SimBounds,
}

pub async fn bounds_to_unity(
  State(state): State<AppState>,
  JsonBody(request): JsonBody<BoundsRequest>,
) -> ServerResult<Json<Value>> {
  let name = request
    .object_name
    .as_deref()
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .ok_or(ServerError::BadRequest(OBJECT_NAME_REQUIRED))?;

  match state.bridge.send_bounds(name, request.bounding_box).await {
    Ok(()) => Ok(Json(json!({ "message": "Bounding box sent successfully" }))),
    Err(BridgeError::Status(status)) => Err(ServerError::SendBounds(Some(status))),
    Err(e) => {
      warn!("发送边界框失败: {}", e);
      Err(ServerError::SendBounds(None))
    }
  }
}

#[derive(Deserialize, Default)]
pub struct CommandForm {
  command: Option<String>,
}

/// 表单或 JSON 中的 `command` 字段；无法解析时视为缺失
pub struct CommandInput(Option<String>);

impl<S: Send + Sync> FromRequest<S> for CommandInput {
  type Rejection = std::convert::Infallible;

  async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
    let is_json = req
      .headers()
      .get(CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .is_some_and(|v| v.starts_with("application/json"));

    let form = if is_json {
      Json::<CommandForm>::from_request(req, state)
        .await
        .map(|Json(form)| form)
        .map_err(|e| e.body_text())
    } else {
      Form::<CommandForm>::from_request(req, state)
        .await
        .map(|Form(form)| form)
        .map_err(|e| e.body_text())
    };

    let command = form
      .unwrap_or_else(|e| {
        debug!("无法解析命令: {}", e);
        CommandForm::default()
      })
      .command
      .map(|c| c.trim().to_string())
      .filter(|c| !c.is_empty());
    Ok(CommandInput(command))
  }
}

#[derive(Serialize, Debug, Default)]
pub struct SubmitResponse {
  status_line: String,
  object_name: Option<String>,
  bounding_box: Option<SimBounds>,
  image_url: Option<String>,
  annotated_image_url: Option<String>,
}

impl SubmitResponse {
  fn status(status_line: impl Into<String>) -> Self {
    Self {
      status_line: status_line.into(),
      ..Default::default()
    }
  }
}

async fn save_png(path: &Path, data: &[u8]) -> Result<(), std::io::Error> {
  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent).await?;
  }
  tokio::fs::write(path, data).await
}

/// 命令保存的文件名：优先由 Gemini 生成，否则由命令本身整理得到
async fn file_stem_for_command(state: &AppState, command: &str) -> String {
  if let Some(client) = state.locator.gemini_client() {
    match client.filename_for_prompt(command).await {
      Ok(Some(stem)) => return stem,
      Ok(None) => debug!("Gemini 未给出文件名"),
      Err(e) => warn!("生成文件名失败: {}", e),
    }
  }
  sanitize_file_stem(command).unwrap_or_else(|| "capture".to_string())
}

pub async fn submit_command(
  State(state): State<AppState>,
  CommandInput(command): CommandInput,
) -> ServerResult<Json<SubmitResponse>> {
  let Some(command) = command else {
    return Ok(Json(SubmitResponse::status("No command provided.")));
  };
  info!("收到命令: {}", command);

  let frame = match state.bridge.fetch_frame(None).await {
    Ok(Some(frame)) => frame,
    Ok(None) => return Ok(Json(SubmitResponse::status("Failed to get image from Unity."))),
    Err(e) => {
      warn!("从模拟器获取图像失败: {}", e);
      return Ok(Json(SubmitResponse::status("Failed to get image from Unity.")));
    }
  };

  let stem = file_stem_for_command(&state, &command).await;
  let file_name = format!("{stem}.png");
  save_png(&state.static_dir.join(&file_name), &frame.to_png()?).await?;
  let image_url = Some(format!("/static/{file_name}"));

  let query = ObjectQuery::Prompt(command);
  let detection = match state.locator.locate(&frame, &query).await {
    Ok(Some(detection)) => detection,
    Ok(None) => {
      return Ok(Json(SubmitResponse {
        image_url,
        ..SubmitResponse::status("No objects found.")
      }));
    }
    Err(LocatorError::Gemini(GeminiError::MalformedResponse(e))) => {
      return Ok(Json(SubmitResponse {
        image_url,
        ..SubmitResponse::status(format!("Failed to parse Gemini response. {e}"))
      }));
    }
    Err(e) => return Err(e.into()),
  };

  if let Err(e) = state
    .bridge
    .send_bounds(&detection.object_name, detection.bounds)
    .await
  {
    warn!("发送边界框失败: {}", e);
  }

  let annotated_name = format!("{stem}_bbox.png");
  save_annotated(&state.static_dir.join(&annotated_name), &frame, &detection).await?;

  Ok(Json(SubmitResponse {
    status_line: format!("Found object: {} {}", detection.object_name, detection.bounds),
    object_name: Some(detection.object_name),
    bounding_box: Some(detection.bounds),
    image_url,
    annotated_image_url: Some(format!("/static/{annotated_name}")),
  }))
}

async fn save_annotated(path: &Path, frame: &Frame, detection: &Detection) -> ServerResult<()> {
  let image = Draw::default().draw_detection(frame, Some(detection))?;
  let png = encode_png(&image)?;
  save_png(path, &png).await?;
  debug!("标注图像已保存: {}", path.display());
  Ok(())
}
