// 该文件是 AIDog 项目的一部分。
// src/locator/gemini.rs - Gemini 生成式模型定位
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

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  bbox::{Box2d, SimBounds},
  frame::{Frame, FrameError},
  locator::{Detection, Locator, ObjectQuery},
  output::sanitize_file_stem,
};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-pro-exp-03-25";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

pub const BOUNDING_BOX_SYSTEM_INSTRUCTIONS: &str = "\
Return bounding boxes as a JSON array with labels. Never return masks or code fencing. Limit to 25 objects.
If an object is present multiple times, name them according to their unique characteristic (colors, size, position, unique characteristics, etc..).";

const DEFAULT_TEMPERATURE: f32 = 0.5;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Error, Debug)]
pub enum GeminiError {
  #[error("GEMINI_API_KEY environment variable not set.")]
  MissingApiKey,
  #[error("HTTP request failed: {0}")]
  Request(#[from] reqwest::Error),
  #[error("Gemini API error ({status}): {body}")]
  Api { status: u16, body: String },
  #[error("Gemini returned no text")]
  EmptyResponse,
  #[error("{0}")]
  MalformedResponse(#[from] serde_json::Error),
  #[error("Frame error: {0}")]
  Frame(#[from] FrameError),
  #[error("URI scheme mismatch: {0}")]
  SchemeMismatch(String),
  #[error("Invalid parameter {0}: {1}")]
  InvalidParameter(&'static str, String),
}

/// 模型返回的单个带标签边界框
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabeledBox {
  pub label: String,
  pub box_2d: Box2d,
}

/// 解析模型输出的 JSON 数组，容忍 markdown 代码围栏
pub fn parse_labeled_boxes(text: &str) -> Result<Vec<LabeledBox>, GeminiError> {
  let trimmed = text.trim();
  let body = match trimmed.strip_prefix("```") {
    Some(rest) => {
      let rest = rest.split_once('\n').map(|(_, r)| r).unwrap_or(rest);
      rest.rsplit_once("```").map(|(r, _)| r).unwrap_or(rest)
    }
    None => trimmed,
  };
  Ok(serde_json::from_str(body)?)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
  #[serde(skip_serializing_if = "Option::is_none")]
  system_instruction: Option<Content<'a>>,
  contents: Vec<Content<'a>>,
  generation_config: GenerationConfig,
  safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize)]
struct Content<'a> {
  #[serde(skip_serializing_if = "Option::is_none")]
  role: Option<&'static str>,
  parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
enum Part<'a> {
  Text(&'a str),
  InlineData { mime_type: &'static str, data: String },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_mime_type: Option<&'static str>,
}

#[derive(Serialize)]
struct SafetySetting {
  category: &'static str,
  threshold: &'static str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
  content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
  #[serde(default)]
  parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
  text: Option<String>,
}

impl GenerateContentResponse {
  fn text(self) -> Option<String> {
    let content = self.candidates.into_iter().next()?.content?;
    let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
    if text.is_empty() { None } else { Some(text) }
  }
}

/// Gemini REST 客户端
#[derive(Debug, Clone)]
pub struct GeminiClient {
  client: reqwest::Client,
  base_url: String,
  model: String,
  api_key: String,
  temperature: f32,
}

pub struct GeminiClientBuilder {
  base_url: String,
  model: String,
  api_key: Option<String>,
  temperature: f32,
  timeout: Duration,
}

impl Default for GeminiClientBuilder {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
      model: DEFAULT_GEMINI_MODEL.to_string(),
      api_key: None,
      temperature: DEFAULT_TEMPERATURE,
      timeout: DEFAULT_TIMEOUT,
    }
  }
}

impl FromUrlWithScheme for GeminiClientBuilder {
  const SCHEME: &'static str = "gemini";
}

impl FromUrl for GeminiClientBuilder {
  type Error = GeminiError;

  /// `gemini://<model>?temperature=0.5&endpoint=<base url>&timeout=120`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(GeminiError::SchemeMismatch(url.scheme().to_string()));
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();

    let mut builder = Self::default();
    if let Some(model) = url.host_str().filter(|h| !h.is_empty()) {
      builder.model = model.to_string();
    }
    if let Some(t) = query.get("temperature") {
      builder.temperature = t
        .parse()
        .map_err(|_| GeminiError::InvalidParameter("temperature", t.clone()))?;
    }
    if let Some(endpoint) = query.get("endpoint") {
      builder.base_url = endpoint.clone();
    }
    if let Some(secs) = query.get("timeout") {
      let secs: u64 = secs
        .parse()
        .map_err(|_| GeminiError::InvalidParameter("timeout", secs.clone()))?;
      builder.timeout = Duration::from_secs(secs);
    }
    Ok(builder)
  }
}

impl GeminiClientBuilder {
  pub fn model(mut self, model: impl Into<String>) -> Self {
    self.model = model.into();
    self
  }

  pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into();
    self
  }

  pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
    self.api_key = Some(api_key.into());
    self
  }

  pub fn temperature(mut self, temperature: f32) -> Self {
    self.temperature = temperature;
    self
  }

  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// 未显式设置密钥时读取 `GEMINI_API_KEY`
  pub fn build(self) -> Result<GeminiClient, GeminiError> {
    let api_key = match self.api_key {
      Some(key) => key,
      None => std::env::var(GEMINI_API_KEY_ENV).map_err(|_| GeminiError::MissingApiKey)?,
    };
    if api_key.is_empty() {
      return Err(GeminiError::MissingApiKey);
    }

    info!("Gemini 模型: {}, 端点: {}", self.model, self.base_url);
    let client = reqwest::Client::builder().timeout(self.timeout).build()?;
    Ok(GeminiClient {
      client,
      base_url: self.base_url.trim_end_matches('/').to_string(),
      model: self.model,
      api_key,
      temperature: self.temperature,
    })
  }
}

impl GeminiClient {
  pub fn model(&self) -> &str {
    &self.model
  }

  async fn generate(&self, request: &GenerateContentRequest<'_>) -> Result<String, GeminiError> {
    let url = format!(
      "{}/models/{}:generateContent",
      self.base_url,
      urlencoding::encode(&self.model)
    );

    let response = self
      .client
      .post(url)
      .header("x-goog-api-key", &self.api_key)
      .json(request)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
      warn!("Gemini 请求失败: {} {}", status, body);
      return Err(GeminiError::Api {
        status: status.as_u16(),
        body,
      });
    }

    let response: GenerateContentResponse = response.json().await?;
    response.text().ok_or(GeminiError::EmptyResponse)
  }

  /// 在 PNG 图像中查找提示描述的物体，返回模型的原始 JSON 文本
  pub async fn find_objects_in_image(&self, prompt: &str, png: &[u8]) -> Result<String, GeminiError> {
    let request = GenerateContentRequest {
      system_instruction: Some(Content {
        role: None,
        parts: vec![Part::Text(BOUNDING_BOX_SYSTEM_INSTRUCTIONS)],
      }),
      contents: vec![Content {
        role: Some("user"),
        parts: vec![
          Part::Text(prompt),
          Part::InlineData {
            mime_type: "image/png",
            data: STANDARD.encode(png),
          },
        ],
      }],
      generation_config: GenerationConfig {
        temperature: self.temperature,
        response_mime_type: Some("application/json"),
      },
      safety_settings: vec![SafetySetting {
        category: "HARM_CATEGORY_DANGEROUS_CONTENT",
        threshold: "BLOCK_ONLY_HIGH",
      }],
    };

    let text = self.generate(&request).await?;
    debug!("Gemini 响应: {}", text);
    Ok(text)
  }

  /// 由提示词生成文件名（不含扩展名）
  pub async fn filename_for_prompt(&self, prompt: &str) -> Result<Option<String>, GeminiError> {
    let instruction = format!(
      "Convert the following request into a short file name. \
       Use lowercase letters, digits and underscores only. \
       Reply with the file name only, without an extension.\n\nRequest: {prompt}"
    );
    let request = GenerateContentRequest {
      system_instruction: None,
      contents: vec![Content {
        role: Some("user"),
        parts: vec![Part::Text(&instruction)],
      }],
      generation_config: GenerationConfig {
        temperature: self.temperature,
        response_mime_type: None,
      },
      safety_settings: vec![],
    };

    let text = self.generate(&request).await?;
    Ok(sanitize_file_stem(text.lines().next().unwrap_or_default()))
  }
}

/// 使用 Gemini 的开放词表定位器，取返回数组的第一项
#[derive(Debug, Clone)]
pub struct GeminiLocator {
  client: GeminiClient,
}

impl GeminiLocator {
  pub fn new(client: GeminiClient) -> Self {
    Self { client }
  }

  pub fn client(&self) -> &GeminiClient {
    &self.client
  }
}

#[async_trait]
impl Locator for GeminiLocator {
  type Error = GeminiError;

  async fn locate(
    &self,
    frame: &Frame,
    query: &ObjectQuery,
  ) -> Result<Option<Detection>, Self::Error> {
    let png = frame.to_png()?;
    let text = self
      .client
      .find_objects_in_image(&query.instruction(), &png)
      .await?;
    let boxes = parse_labeled_boxes(&text)?;
    debug!("Gemini 返回 {} 个边界框", boxes.len());

    Ok(boxes.into_iter().next().map(|b| Detection {
      object_name: b.label,
      bounds: SimBounds::from(b.box_2d),
      confidence: None,
    }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_plain_json_array() {
    let boxes =
      parse_labeled_boxes(r#"[{"label": "red ball", "box_2d": [469, 638, 585, 765]}]"#).unwrap();
    assert_eq!(boxes.len(), 1);
    assert_eq!(boxes[0].label, "red ball");
    assert_eq!(
      SimBounds::from(boxes[0].box_2d),
      SimBounds::from([327, 240, 65, 59])
    );
  }

  #[test]
  fn parses_fenced_json_array() {
    let text = "```json\n[{\"label\": \"box\", \"box_2d\": [0, 0, 10, 10]}]\n```";
    let boxes = parse_labeled_boxes(text).unwrap();
    assert_eq!(boxes[0].label, "box");
  }

  #[test]
  fn empty_array_parses_to_nothing() {
    assert!(parse_labeled_boxes("[]").unwrap().is_empty());
  }

  #[test]
  fn malformed_json_is_reported() {
    let err = parse_labeled_boxes("I found a ball at the top left").unwrap_err();
    assert!(matches!(err, GeminiError::MalformedResponse(_)));
  }

  #[test]
  fn builder_reads_model_and_query() {
    let url =
      Url::parse("gemini://gemini-2.0-flash?temperature=0.2&endpoint=http://127.0.0.1:9/v1beta")
        .unwrap();
    let client = GeminiClientBuilder::from_url(&url)
      .unwrap()
      .api_key("secret")
      .build()
      .unwrap();
    assert_eq!(client.model(), "gemini-2.0-flash");
    assert_eq!(client.base_url, "http://127.0.0.1:9/v1beta");
    assert_eq!(client.temperature, 0.2);
  }

  #[test]
  fn builder_rejects_bad_temperature() {
    let url = Url::parse("gemini://m?temperature=hot").unwrap();
    assert!(matches!(
      GeminiClientBuilder::from_url(&url),
      Err(GeminiError::InvalidParameter("temperature", _))
    ));
  }

  #[test]
  fn empty_api_key_is_rejected() {
    let result = GeminiClientBuilder::default().api_key("").build();
    assert!(matches!(result, Err(GeminiError::MissingApiKey)));
  }

  #[test]
  fn request_uses_gemini_field_names() {
    let request = GenerateContentRequest {
      system_instruction: None,
      contents: vec![Content {
        role: Some("user"),
        parts: vec![
          Part::Text("find"),
          Part::InlineData {
            mime_type: "image/png",
            data: "AAAA".into(),
          },
        ],
      }],
      generation_config: GenerationConfig {
        temperature: 0.5,
        response_mime_type: Some("application/json"),
      },
      safety_settings: vec![],
    };
    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(value["contents"][0]["parts"][0]["text"], "find");
    assert_eq!(
      value["contents"][0]["parts"][1]["inlineData"]["mimeType"],
      "image/png"
    );
    assert_eq!(
      value["generationConfig"]["responseMimeType"],
      "application/json"
    );
    assert!(value.get("systemInstruction").is_none());
  }
}
