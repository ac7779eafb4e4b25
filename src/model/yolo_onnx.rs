// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/model/yolo_onnx.rs - ONNX Runtime 上的 YOLO 坑洼检测模型
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
use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::Tensor,
};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbNchwTensor,
  model::{
    DetectResult, Model,
    yolo::{self, YOLO_INPUT_SIZE, YoloDecodeError},
  },
};

#[derive(Error, Debug)]
pub enum YoloOnnxError {
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型加载错误: {0}")]
  ModelLoadError(String),
  #[error("推理错误: {0}")]
  InferenceError(String),
  #[error("输出解析错误: {0}")]
  DecodeError(#[from] YoloDecodeError),
}

pub struct YoloOnnxBuilder {
  model_path: String,
  intra_threads: usize,
}

impl FromUrlWithScheme for YoloOnnxBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for YoloOnnxBuilder {
  type Error = YoloOnnxError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(YoloOnnxError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let intra_threads = url
      .query_pairs()
      .find(|(k, _)| k == "threads")
      .and_then(|(_, v)| v.parse::<usize>().ok())
      .unwrap_or(4);

    Ok(YoloOnnxBuilder {
      model_path: url.path().to_string(),
      intra_threads,
    })
  }
}

impl YoloOnnxBuilder {
  pub fn build(self) -> Result<YoloOnnx, YoloOnnxError> {
    info!("加载模型文件: {}", self.model_path);

    let session = Session::builder()
      .map_err(|e| YoloOnnxError::ModelLoadError(e.to_string()))?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(|e| YoloOnnxError::ModelLoadError(e.to_string()))?
      .with_intra_threads(self.intra_threads)
      .map_err(|e| YoloOnnxError::ModelLoadError(e.to_string()))?
      .commit_from_file(&self.model_path)
      .map_err(|e| YoloOnnxError::ModelLoadError(e.to_string()))?;

    info!("模型加载完成");
    Ok(YoloOnnx { session })
  }
}

pub struct YoloOnnx {
  session: Session,
}

impl Model for YoloOnnx {
  type Error = YoloOnnxError;

  fn infer(&mut self, image: &RgbImage, confidence: f32) -> Result<DetectResult, Self::Error> {
    let (tensor, letterbox) = RgbNchwTensor::letterbox(image, YOLO_INPUT_SIZE);
    let shape = tensor.shape();

    debug!("设置模型输入: {:?}", shape);
    let input = Tensor::from_array((shape, tensor.into_vec()))
      .map_err(|e| YoloOnnxError::InferenceError(e.to_string()))?;

    debug!("执行模型推理");
    let outputs = self
      .session
      .run(ort::inputs![input])
      .map_err(|e| YoloOnnxError::InferenceError(e.to_string()))?;

    let (output_shape, data) = outputs[0]
      .try_extract_tensor::<f32>()
      .map_err(|e| YoloOnnxError::InferenceError(e.to_string()))?;
    let output_shape: Vec<i64> = output_shape.iter().copied().collect();
    debug!("模型输出维度: {:?}", output_shape);

    let items = yolo::decode(data, &output_shape, confidence, &letterbox)?;
    debug!("检测到 {} 个坑洼", items.len());

    Ok(DetectResult::from(items))
  }
}
