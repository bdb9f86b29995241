// 该文件是 AIDog 项目的一部分。
// tests/bridge.rs - 模拟器连接测试
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

mod common;

use axum::http::StatusCode;
use serde_json::json;

use aidog::{
  FromUrl,
  bbox::SimBounds,
  bridge::{BridgeError, SimulatorBridge},
  frame::{Frame, FrameError},
};
use common::{FrameMode, MockSimulator};

async fn bridge_for(sim: &MockSimulator) -> SimulatorBridge {
  SimulatorBridge::from_url(&sim.start().await).unwrap()
}

#[tokio::test]
async fn png_frames_are_passed_through() {
  let sim = MockSimulator::new(FrameMode::Png);
  let bridge = bridge_for(&sim).await;

  let frame = bridge.fetch_frame(Some("ball")).await.unwrap();
  match frame {
    Some(Frame::Png(data)) => assert_eq!(data, common::sim_png()),
    other => panic!("expected a PNG frame, got {other:?}"),
  }
  assert_eq!(
    *sim.image_requests.lock().unwrap(),
    vec![Some("ball".to_string())]
  );
}

#[tokio::test]
async fn octet_stream_is_a_raw_frame() {
  let sim = MockSimulator::new(FrameMode::Raw);
  let bridge = bridge_for(&sim).await;

  let Some(Frame::Raw(raw)) = bridge.fetch_frame(None).await.unwrap() else {
    panic!("expected a raw frame");
  };
  assert_eq!(raw.as_nhwc(), common::sim_raw().as_slice());
  assert_eq!(*sim.image_requests.lock().unwrap(), vec![None]);
}

#[tokio::test]
async fn short_raw_frame_is_an_error() {
  let sim = MockSimulator::new(FrameMode::ShortRaw);
  let bridge = bridge_for(&sim).await;

  let err = bridge.fetch_frame(None).await.unwrap_err();
  assert!(matches!(
    err,
    BridgeError::Frame(FrameError::LengthMismatch { actual: 99, .. })
  ));
}

#[tokio::test]
async fn non_200_means_no_frame() {
  let sim = MockSimulator::new(FrameMode::Missing);
  let bridge = bridge_for(&sim).await;
  assert!(bridge.fetch_frame(None).await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_content_type_means_no_frame() {
  let sim = MockSimulator::new(FrameMode::Text);
  let bridge = bridge_for(&sim).await;
  assert!(bridge.fetch_frame(None).await.unwrap().is_none());
}

#[tokio::test]
async fn bounds_are_posted_as_json() {
  let sim = MockSimulator::new(FrameMode::Png);
  let bridge = bridge_for(&sim).await;

  bridge
    .send_bounds("ball", SimBounds::from([327, 240, 65, 59]))
    .await
    .unwrap();

  assert_eq!(
    sim.posted_bounds(),
    vec![json!({ "object_name": "ball", "bounding_box": [327, 240, 65, 59] })]
  );
}

#[tokio::test]
async fn rejected_bounds_report_the_status() {
  let sim = MockSimulator::new(FrameMode::Png);
  sim.reject_bounds(StatusCode::INTERNAL_SERVER_ERROR);
  let bridge = bridge_for(&sim).await;

  let err = bridge
    .send_bounds("ball", SimBounds::from([0, 0, 1, 1]))
    .await
    .unwrap_err();
  assert!(matches!(err, BridgeError::Status(s) if s == StatusCode::INTERNAL_SERVER_ERROR));
}

#[tokio::test]
async fn unreachable_simulator_is_a_request_error() {
  let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
  let url = common::url_for(listener.local_addr().unwrap());
  drop(listener);

  let bridge = SimulatorBridge::from_url(&url).unwrap();
  let err = bridge.fetch_frame(None).await.unwrap_err();
  assert!(matches!(err, BridgeError::Request(_)));
}

#[tokio::test]
async fn base_path_is_kept() {
  let sim = MockSimulator::new(FrameMode::Png);
  let url = sim.start().await;
  let bridge = SimulatorBridge::from_url(&url.join("unity/").unwrap()).unwrap();

  // 模拟器只在根路径下提供接口
  assert!(bridge.fetch_frame(None).await.unwrap().is_none());
  assert_eq!(sim.image_request_count(), 0);
}
