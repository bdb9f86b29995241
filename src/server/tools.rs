// 该文件是 AIDog 项目的一部分。
// src/server/tools.rs - 远程工具服务 (JSON-RPC 2.0)
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
  body::Bytes,
  extract::State,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::{
  frame::Frame,
  locator::{Locator, ObjectQuery},
  output::{SimulatorOutput, sanitize_file_stem},
  server::{
    AppState,
    error::{FAILED_TO_GET_IMAGE, OBJECT_NAME_REQUIRED, OBJECT_NOT_FOUND},
  },
  task::{Task, TaskOutcome},
};

pub const SERVER_NAME: &str = "Unity AIDog Server";
pub const PROTOCOL_VERSION: &str = "2025-03-26";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

#[derive(Deserialize, Debug)]
pub struct RpcRequest {
  jsonrpc: Option<String>,
  /// 缺失表示通知；显式的 `null` 仍需应答
  #[serde(default, deserialize_with = "present")]
  id: Option<Value>,
  method: String,
  #[serde(default)]
  params: Value,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
  Value::deserialize(deserializer).map(Some)
}

#[derive(Serialize, Debug)]
pub struct RpcError {
  code: i64,
  message: String,
}

#[derive(Serialize, Debug)]
pub struct RpcResponse {
  jsonrpc: &'static str,
  id: Value,
  #[serde(skip_serializing_if = "Option::is_none")]
  result: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  error: Option<RpcError>,
}

impl RpcResponse {
  fn result(id: Value, result: Value) -> Self {
    Self {
      jsonrpc: "2.0",
      id,
      result: Some(result),
      error: None,
    }
  }

  fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
    Self {
      jsonrpc: "2.0",
      id,
      result: None,
      error: Some(RpcError {
        code,
        message: message.into(),
      }),
    }
  }
}

/// 工具描述，`inputSchema` 为 JSON Schema
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
  name: &'static str,
  description: &'static str,
  input_schema: Value,
}

fn string_schema(fields: &[(&str, &str)]) -> Value {
  let properties: serde_json::Map<String, Value> = fields
    .iter()
    .map(|(name, description)| {
      (
        name.to_string(),
        json!({ "type": "string", "description": description }),
      )
    })
    .collect();
  let required: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
  json!({ "type": "object", "properties": properties, "required": required })
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
  vec![
    ToolDefinition {
      name: "find_object",
      description: "Find a named object in the scene and highlight it in Unity.",
      input_schema: string_schema(&[("object_name", "Name of the object to look for")]),
    },
    ToolDefinition {
      name: "capture_image",
      description: "Capture an image of what the robot sees.",
      input_schema: string_schema(&[("filename", "Name of the PNG file to save")]),
    },
    ToolDefinition {
      name: "find_object_in_image",
      description: "Find the name and bounding box of a designated object in an image.",
      input_schema: string_schema(&[
        ("prompt", "What to look for"),
        ("image", "Base64 encoded PNG image"),
      ]),
    },
    ToolDefinition {
      name: "generate_filename_from_prompt",
      description: "Generate the name of a file based on the user's prompt.",
      input_schema: string_schema(&[("prompt", "User's text prompt")]),
    },
  ]
}

/// 工具调用结果：负载以 JSON 文本形式放入 `content`
#[derive(Debug)]
pub struct ToolOutput {
  payload: Value,
  is_error: bool,
}

impl ToolOutput {
  fn ok(payload: Value) -> Self {
    Self {
      payload,
      is_error: false,
    }
  }

  fn error(message: impl Into<String>) -> Self {
    Self {
      payload: json!({ "error": message.into() }),
      is_error: true,
    }
  }

  fn into_value(self) -> Value {
    let text = match self.payload {
      Value::String(s) => s,
      other => other.to_string(),
    };
    json!({
      "content": [{ "type": "text", "text": text }],
      "isError": self.is_error,
    })
  }
}

fn string_arg<'a>(arguments: &'a Value, key: &str) -> &'a str {
  arguments
    .get(key)
    .and_then(Value::as_str)
    .map(str::trim)
    .unwrap_or_default()
}

async fn find_object(state: &AppState, object_name: &str) -> ToolOutput {
  if object_name.is_empty() {
    return ToolOutput::error(OBJECT_NAME_REQUIRED);
  }

  let output = SimulatorOutput::new(state.bridge.clone()).with_object_name(object_name);
  let query = ObjectQuery::Label(object_name.to_string());
  let outcome = state
    .poll
    .clone()
    .run_task(&state.bridge, state.locator.as_ref(), &output, &query)
    .await;

  match outcome {
    Ok(TaskOutcome::Found(detection)) => {
      info!("找到 {}: {}", detection.object_name, detection.bounds);
      ToolOutput::ok(json!({ "message": "Object found" }))
    }
    Ok(TaskOutcome::NoImage) => ToolOutput::error(FAILED_TO_GET_IMAGE),
    Ok(TaskOutcome::NotFound) => ToolOutput::error(OBJECT_NOT_FOUND),
    Err(e) => {
      warn!("find_object 失败: {:#}", e);
      ToolOutput::error(format!("{e:#}"))
    }
  }
}

async fn capture_image(state: &AppState, filename: &str) -> ToolOutput {
  // 只保留文件名本身
  let Some(stem) = filename
    .rsplit(['/', '\\'])
    .next()
    .and_then(sanitize_file_stem)
  else {
    return ToolOutput::error("Invalid filename");
  };

  let frame = match state.bridge.fetch_frame(None).await {
    Ok(Some(frame)) => frame,
    Ok(None) => return ToolOutput::error(FAILED_TO_GET_IMAGE),
    Err(e) => {
      warn!("从模拟器获取图像失败: {}", e);
      return ToolOutput::error(FAILED_TO_GET_IMAGE);
    }
  };

  let file_name = format!("{stem}.png");
  let path = state.capture_dir.join(&file_name);
  let saved = async {
    let png = frame.to_png().map_err(std::io::Error::other)?;
    tokio::fs::create_dir_all(&state.capture_dir).await?;
    tokio::fs::write(&path, png).await
  };
  match saved.await {
    Ok(()) => {
      info!("capture_image: 图像已保存到 {}", path.display());
      ToolOutput::ok(Value::String(file_name))
    }
    Err(e) => ToolOutput::error(format!("Failed to save image: {e}")),
  }
}

async fn find_object_in_image(state: &AppState, prompt: &str, image: &str) -> ToolOutput {
  let Ok(png) = STANDARD.decode(image) else {
    return ToolOutput::error("Invalid image data");
  };

  let query = ObjectQuery::Prompt(prompt.to_string());
  match state.locator.locate(&Frame::Png(png), &query).await {
    Ok(Some(detection)) => ToolOutput::ok(json!(detection)),
    Ok(None) => ToolOutput::ok(Value::Null),
    Err(e) => {
      warn!("find_object_in_image 失败: {}", e);
      ToolOutput::error(e.to_string())
    }
  }
}

async fn generate_filename_from_prompt(state: &AppState, prompt: &str) -> ToolOutput {
  let stem = match state.locator.gemini_client() {
    Some(client) => client.filename_for_prompt(prompt).await.unwrap_or_else(|e| {
      warn!("生成文件名失败: {}", e);
      None
    }),
    None => sanitize_file_stem(prompt),
  };
  ToolOutput::ok(stem.map_or(Value::Null, Value::String))
}

async fn call_tool(state: &AppState, params: &Value) -> Result<ToolOutput, RpcError> {
  let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
  let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
  debug!("调用工具 {}: {}", name, arguments);

  Ok(match name {
    "find_object" => find_object(state, string_arg(&arguments, "object_name")).await,
    "capture_image" => capture_image(state, string_arg(&arguments, "filename")).await,
    "find_object_in_image" => {
      find_object_in_image(
        state,
        string_arg(&arguments, "prompt"),
        string_arg(&arguments, "image"),
      )
      .await
    }
    "generate_filename_from_prompt" => {
      generate_filename_from_prompt(state, string_arg(&arguments, "prompt")).await
    }
    other => {
      return Err(RpcError {
        code: INVALID_PARAMS,
        message: format!("Unknown tool: {other}"),
      });
    }
  })
}

async fn dispatch(state: &AppState, request: RpcRequest) -> Result<Value, RpcError> {
  match request.method.as_str() {
    "initialize" => {
      let version = request
        .params
        .get("protocolVersion")
        .and_then(Value::as_str)
        .unwrap_or(PROTOCOL_VERSION);
      Ok(json!({
        "protocolVersion": version,
        "capabilities": { "tools": {} },
        "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
      }))
    }
    "ping" => Ok(json!({})),
    "tools/list" => Ok(json!({ "tools": tool_definitions() })),
    "tools/call" => call_tool(state, &request.params)
      .await
      .map(ToolOutput::into_value),
    other => Err(RpcError {
      code: METHOD_NOT_FOUND,
      message: format!("Method not found: {other}"),
    }),
  }
}

pub async fn handle_rpc(State(state): State<AppState>, body: Bytes) -> Response {
  let request: RpcRequest = match serde_json::from_slice(&body) {
    Ok(request) => request,
    Err(e) => {
      return Json(RpcResponse::error(Value::Null, PARSE_ERROR, e.to_string())).into_response();
    }
  };

  let Some(id) = request.id.clone() else {
    debug!("收到通知: {}", request.method);
    return StatusCode::ACCEPTED.into_response();
  };

  if request.jsonrpc.as_deref() != Some("2.0") {
    return Json(RpcResponse::error(id, INVALID_REQUEST, "jsonrpc must be \"2.0\"")).into_response();
  }

  let response = match dispatch(&state, request).await {
    Ok(result) => RpcResponse::result(id, result),
    Err(RpcError { code, message }) => RpcResponse::error(id, code, message),
  };
  Json(response).into_response()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tool_output_wraps_payload_as_text() {
    let value = ToolOutput::error(OBJECT_NOT_FOUND).into_value();
    assert_eq!(value["isError"], true);
    assert_eq!(value["content"][0]["type"], "text");
    assert_eq!(value["content"][0]["text"], r#"{"error":"Object not found"}"#);

    let value = ToolOutput::ok(Value::String("ball.png".into())).into_value();
    assert_eq!(value["isError"], false);
    assert_eq!(value["content"][0]["text"], "ball.png");
  }

  #[test]
  fn every_tool_requires_its_arguments() {
    let tools = serde_json::to_value(tool_definitions()).unwrap();
    let names: Vec<&str> = tools
      .as_array()
      .unwrap()
      .iter()
      .map(|t| t["name"].as_str().unwrap())
      .collect();
    assert_eq!(
      names,
      [
        "find_object",
        "capture_image",
        "find_object_in_image",
        "generate_filename_from_prompt"
      ]
    );
    assert_eq!(tools[2]["inputSchema"]["required"], json!(["prompt", "image"]));
  }

  #[test]
  fn notification_has_no_id() {
    let request: RpcRequest =
      serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
    assert!(request.id.is_none());
    assert_eq!(request.params, Value::Null);
  }

  #[test]
  fn null_id_is_not_a_notification() {
    let request: RpcRequest =
      serde_json::from_str(r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#).unwrap();
    assert_eq!(request.id, Some(Value::Null));
  }
}
