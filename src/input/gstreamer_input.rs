// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 视频文件解码
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

//! # GStreamer 视频文件解码
//!
//! 使用 `decodebin` 解码本地视频文件（mp4 / mov / avi 等），统一转换为 RGB
//! 后从 `appsink` 逐帧拉取。与实时流不同，这里不允许丢帧，采样步长才有意义。
//!
//! ## 系统依赖
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```
//!
//! 在 `Cargo.toml` 中启用 `gstreamer_input` 特性。

use std::{
  path::Path,
  time::{Duration, Instant},
};

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
  frame::Frame,
  input::{FrameIter, InputError, VideoDecoder},
};

/// GStreamer 输入错误类型
#[derive(Error, Debug)]
pub enum GStreamerInputError {
  /// GStreamer 库错误
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  /// GStreamer 布尔操作错误
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  /// 无法获取 appsink 元素
  #[error("Failed to get appsink element")]
  AppSinkNotFound,
  /// 无法转换元素为 appsink
  #[error("Failed to convert element to appsink")]
  AppSinkConversionFailed,
  /// 无法从 caps 获取视频信息
  #[error("Failed to get video info from caps")]
  VideoInfoError,
  /// 不支持的视频格式
  #[error("Unsupported video format")]
  UnsupportedFormat,
  /// 管道错误
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  /// 缓冲区大小不匹配
  #[error("Buffer size mismatch: expected {expected} bytes, got {actual} bytes")]
  BufferSizeMismatch { expected: usize, actual: usize },
  /// 状态改变错误
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
}

const PULL_INTERVAL: Duration = Duration::from_millis(100);

/// 基于 GStreamer 的视频文件解码器
#[derive(Debug, Clone)]
pub struct GStreamerFileDecoder {
  max_buffers: u32,
  /// 既没有新帧也没有结束或错误消息，超过该时间视为管道卡死
  stall_timeout: Duration,
}

impl Default for GStreamerFileDecoder {
  fn default() -> Self {
    Self {
      max_buffers: 4,
      stall_timeout: Duration::from_secs(30),
    }
  }
}

impl GStreamerFileDecoder {
  fn pipeline_description(&self, path: &Path) -> String {
    let location = path.display().to_string().replace('"', "\\\"");
    format!(
      "filesrc location=\"{}\" ! decodebin ! videoconvert ! video/x-raw,format=RGB ! \
       appsink name=sink sync=false max-buffers={} drop=false",
      location, self.max_buffers
    )
  }

  fn launch(&self, path: &Path) -> Result<GStreamerFileInput, GStreamerInputError> {
    gst::init()?;

    let description = self.pipeline_description(path);
    info!("GStreamer pipeline description: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::PipelineError("Failed to create pipeline".to_string()))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerInputError::AppSinkConversionFailed)?;

    pipeline.set_state(gst::State::Playing)?;

    Ok(GStreamerFileInput {
      pipeline,
      appsink,
      stall_timeout: self.stall_timeout,
      position: 0,
      finished: false,
    })
  }
}

impl VideoDecoder for GStreamerFileDecoder {
  fn open(&self, path: &Path) -> Result<FrameIter, InputError> {
    let input = self.launch(path)?;
    Ok(Box::new(input))
  }
}

/// 打开的视频文件，逐帧产生 RGB 图像
pub struct GStreamerFileInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  stall_timeout: Duration,
  position: u64,
  finished: bool,
}

impl Drop for GStreamerFileInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer pipeline: {}", e);
    }
  }
}

impl GStreamerFileInput {
  fn bus_error(&self) -> Option<String> {
    let bus = self.pipeline.bus()?;
    let message = bus.pop_filtered(&[gst::MessageType::Error])?;
    match message.view() {
      gst::MessageView::Error(err) => Some(match err.debug() {
        Some(debug) => format!("{} ({})", err.error(), debug),
        None => err.error().to_string(),
      }),
      _ => None,
    }
  }

  fn fail(&mut self, reason: String) -> Option<Result<Frame, InputError>> {
    self.finished = true;
    error!("视频解码失败: {}", reason);
    Some(Err(GStreamerInputError::PipelineError(reason).into()))
  }
}

impl Iterator for GStreamerFileInput {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.finished {
      return None;
    }

    // 解码出错时 appsink 收不到 EOS，阻塞拉取会一直等下去
    let started = Instant::now();
    loop {
      let timeout = gst::ClockTime::from_mseconds(PULL_INTERVAL.as_millis() as u64);
      if let Some(sample) = self.appsink.try_pull_sample(timeout) {
        self.position += 1;
        return match convert_sample_to_rgb(sample) {
          Ok(image) => Some(Ok(Frame::new(self.position, image))),
          Err(e) => {
            error!("Failed to convert sample {}: {}", self.position, e);
            self.finished = true;
            Some(Err(e.into()))
          }
        };
      }

      if let Some(reason) = self.bus_error() {
        return self.fail(reason);
      }
      if self.appsink.is_eos() {
        self.finished = true;
        info!("视频解码结束，共 {} 帧", self.position);
        return None;
      }
      if started.elapsed() >= self.stall_timeout {
        let reason = format!("{:?} 内没有收到新帧", self.stall_timeout);
        return self.fail(reason);
      }
    }
  }
}

fn convert_sample_to_rgb(sample: gst::Sample) -> Result<RgbImage, GStreamerInputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| GStreamerInputError::PipelineError("No buffer in sample".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| GStreamerInputError::PipelineError("No caps in sample".to_string()))?;

  let video_info =
    gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;
  if video_info.format() != gst_video::VideoFormat::Rgb {
    return Err(GStreamerInputError::UnsupportedFormat);
  }

  let width = video_info.width() as usize;
  let height = video_info.height() as usize;
  let stride = video_info.stride()[0] as usize;

  let map = buffer.map_readable().map_err(|e| {
    GStreamerInputError::PipelineError(format!("Failed to map buffer for reading: {}", e))
  })?;
  let data = map.as_slice();

  let expected_size = stride * height.saturating_sub(1) + width * 3;
  if data.len() < expected_size {
    return Err(GStreamerInputError::BufferSizeMismatch {
      expected: expected_size,
      actual: data.len(),
    });
  }

  // 行按 stride 对齐，逐行拷贝
  let mut pixels = Vec::with_capacity(width * height * 3);
  for row in 0..height {
    let start = row * stride;
    pixels.extend_from_slice(&data[start..start + width * 3]);
  }

  RgbImage::from_raw(width as u32, height as u32, pixels)
    .ok_or_else(|| GStreamerInputError::PipelineError("无法创建 RGB 图像".to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn corrupt_video_fails_instead_of_hanging() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.mp4");
    std::fs::write(&path, b"this is not a video container at all").unwrap();

    let decoder = GStreamerFileDecoder {
      stall_timeout: Duration::from_secs(5),
      ..Default::default()
    };
    // 启动管道时就可能失败；否则第一帧必须是错误
    if let Ok(mut frames) = decoder.open(&path) {
      assert!(matches!(frames.next(), Some(Err(_))));
      assert!(frames.next().is_none());
    }
  }

  #[test]
  fn location_quotes_are_escaped() {
    let decoder = GStreamerFileDecoder::default();
    let description = decoder.pipeline_description(Path::new("/tmp/a\"b.mp4"));
    assert!(description.contains("location=\"/tmp/a\\\"b.mp4\""));
  }
}
