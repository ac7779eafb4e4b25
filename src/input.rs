// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::frame::Frame;

mod read_image_file;
pub use self::read_image_file::ImageFileInput;

mod sampler;
pub use self::sampler::FrameSampler;

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{GStreamerFileDecoder, GStreamerInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("未启用视频解码支持，无法处理: {0}")]
  VideoUnsupported(PathBuf),
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer input error: {0}")]
  GStreamerInputError(#[from] GStreamerInputError),
}

/// 视频帧的惰性迭代器，只能遍历一次
pub type FrameIter = Box<dyn Iterator<Item = Result<Frame, InputError>>>;

/// 视频解码器：打开视频文件并按顺序产生帧
pub trait VideoDecoder {
  fn open(&self, path: &Path) -> Result<FrameIter, InputError>;
}

/// 未启用任何视频后端时使用，所有视频都会失败
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedVideoDecoder;

impl VideoDecoder for UnsupportedVideoDecoder {
  fn open(&self, path: &Path) -> Result<FrameIter, InputError> {
    Err(InputError::VideoUnsupported(path.to_path_buf()))
  }
}

/// 根据启用的特性选择视频解码器
pub fn default_video_decoder() -> Box<dyn VideoDecoder> {
  #[cfg(feature = "gstreamer_input")]
  {
    Box::new(GStreamerFileDecoder::default())
  }
  #[cfg(not(feature = "gstreamer_input"))]
  {
    Box::new(UnsupportedVideoDecoder)
  }
}
