// 该文件是 AIDog 项目的一部分。
// src/server/error.rs - HTTP 错误响应
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
  extract::{FromRequest, rejection::JsonRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{bridge::BridgeError, frame::FrameError, locator::LocatorError};

pub const OBJECT_NAME_REQUIRED: &str = "Object name is required";
pub const FAILED_TO_GET_IMAGE: &str = "Failed to get image from Unity";
pub const FAILED_TO_SEND_BOUNDS: &str = "Failed to send bounding box to Unity";
pub const INVALID_OBJECT_NAME: &str = "Invalid object name";
pub const OBJECT_NOT_FOUND: &str = "Object not found";

/// 处理器错误，统一响应为 `{"error": ...}`
#[derive(Error, Debug)]
pub enum ServerError {
  #[error("{0}")]
  BadRequest(&'static str),
  /// 请求体不是合法的 JSON，或缺少必需字段
  #[error("{}", .0.body_text())]
  InvalidBody(#[from] JsonRejection),
  #[error("Failed to get image from Unity")]
  NoImage,
  /// 模拟器拒绝边界框时沿用其状态码，传输失败时为 `None`
  #[error("Failed to send bounding box to Unity")]
  SendBounds(Option<StatusCode>),
  #[error("Simulator error: {0}")]
  Bridge(#[from] BridgeError),
  #[error("Locator error: {0}")]
  Locator(#[from] LocatorError),
  #[error("Frame error: {0}")]
  Frame(#[from] FrameError),
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// JSON 请求体，解析失败时同样以 `{"error": ...}` 响应
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ServerError))]
pub struct JsonBody<T>(pub T);

impl IntoResponse for ServerError {
  fn into_response(self) -> Response {
    let status = match &self {
      ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ServerError::InvalidBody(rejection) => rejection.status(),
      ServerError::NoImage => StatusCode::BAD_GATEWAY,
      ServerError::SendBounds(status) => status.unwrap_or(StatusCode::BAD_GATEWAY),
      ServerError::Bridge(_) | ServerError::Locator(_) => {
        error!("上游调用失败: {}", self);
        StatusCode::BAD_GATEWAY
      }
      ServerError::Frame(_) | ServerError::Io(_) => {
        error!("内部错误: {}", self);
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };

    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
