// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/model.rs - 模型
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

use image::RgbImage;
use thiserror::Error;
use url::Url;

use crate::FromUrl;

pub trait Model {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 对一张图片推理，只保留得分不低于 `confidence` 的目标
  fn infer(&mut self, image: &RgbImage, confidence: f32) -> Result<DetectResult, Self::Error>;
}

impl<M: Model + ?Sized> Model for Box<M> {
  type Error = M::Error;

  fn infer(&mut self, image: &RgbImage, confidence: f32) -> Result<DetectResult, Self::Error> {
    (**self).infer(image, confidence)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub score: f32,
  pub bbox: [f32; 4], // 归一化坐标 [x_min, y_min, x_max, y_max]
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &DetectItem> {
    self.items.iter()
  }
}

impl From<Vec<DetectItem>> for DetectResult {
  fn from(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

pub mod yolo;
pub use self::yolo::YoloDecodeError;

#[cfg(feature = "model_yolo_onnx")]
mod yolo_onnx;
#[cfg(feature = "model_yolo_onnx")]
pub use self::yolo_onnx::{YoloOnnx, YoloOnnxBuilder, YoloOnnxError};

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("不支持的模型地址: {0}")]
  SchemeMismatch(String),
  #[error("模型输出解析错误: {0}")]
  DecodeError(#[from] YoloDecodeError),
  #[cfg(feature = "model_yolo_onnx")]
  #[error("ONNX 模型错误: {0}")]
  YoloOnnxError(#[from] YoloOnnxError),
}

/// 按地址方案选择的模型后端，例如 `onnx:///models/pothole_guard.onnx`
pub enum ModelWrapper {
  #[cfg(feature = "model_yolo_onnx")]
  YoloOnnx(YoloOnnx),
}

impl FromUrl for ModelWrapper {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "model_yolo_onnx")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == YoloOnnxBuilder::SCHEME {
        let model = YoloOnnxBuilder::from_url(url)?.build()?;
        return Ok(ModelWrapper::YoloOnnx(model));
      }
    }
    Err(ModelError::SchemeMismatch(url.to_string()))
  }
}

impl Model for ModelWrapper {
  type Error = ModelError;

  fn infer(&mut self, image: &RgbImage, confidence: f32) -> Result<DetectResult, Self::Error> {
    match *self {
      #[cfg(feature = "model_yolo_onnx")]
      ModelWrapper::YoloOnnx(ref mut model) => {
        model.infer(image, confidence).map_err(ModelError::from)
      }
    }
  }
}
