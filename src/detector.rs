// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/detector.rs - 坑洼检测适配器
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
use tracing::debug;

use crate::{
  model::{DetectResult, Model},
  output::draw::Draw,
};

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("模型推理失败: {0}")]
  ModelError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// 一次检测的结果：检测框与据此绘制的标注图像
#[derive(Debug, Clone)]
pub struct DetectionResult {
  pub boxes: DetectResult,
  pub annotated: RgbImage,
}

impl DetectionResult {
  pub fn count(&self) -> u64 {
    self.boxes.len() as u64
  }
}

pub struct Detector<M: Model> {
  model: M,
  confidence: f32,
  draw: Draw,
}

impl<M: Model> Detector<M> {
  pub fn new(model: M, confidence: f32, draw: Draw) -> Self {
    Self {
      model,
      confidence,
      draw,
    }
  }

  pub fn confidence(&self) -> f32 {
    self.confidence
  }

  /// 推理并绘制结果。没有检测到目标时返回空结果，标注图像即原图。
  pub fn detect(&mut self, image: &RgbImage) -> Result<DetectionResult, DetectorError> {
    let now = std::time::Instant::now();
    let boxes = self
      .model
      .infer(image, self.confidence)
      .map_err(|e| DetectorError::ModelError(Box::new(e)))?;
    debug!("推理完成，{} 个目标，耗时: {:.2?}", boxes.len(), now.elapsed());

    let annotated = self.draw.annotate(image, &boxes);
    Ok(DetectionResult { boxes, annotated })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::DetectItem;
  use image::Rgb;

  struct FixedModel(Vec<DetectItem>);

  #[derive(Error, Debug)]
  #[error("模型损坏")]
  struct BrokenModelError;

  impl Model for FixedModel {
    type Error = BrokenModelError;

    fn infer(&mut self, _image: &RgbImage, confidence: f32) -> Result<DetectResult, Self::Error> {
      Ok(DetectResult::from(
        self
          .0
          .iter()
          .filter(|item| item.score >= confidence)
          .cloned()
          .collect::<Vec<_>>(),
      ))
    }
  }

  struct BrokenModel;

  impl Model for BrokenModel {
    type Error = BrokenModelError;

    fn infer(&mut self, _image: &RgbImage, _confidence: f32) -> Result<DetectResult, Self::Error> {
      Err(BrokenModelError)
    }
  }

  #[test]
  fn threshold_is_passed_to_model() {
    let items = vec![
      DetectItem {
        class_id: 0,
        score: 0.9,
        bbox: [0.25, 0.25, 0.75, 0.75],
      },
      DetectItem {
        class_id: 0,
        score: 0.1,
        bbox: [0.0, 0.0, 0.5, 0.5],
      },
    ];
    let mut detector = Detector::new(FixedModel(items), 0.25, Draw::default());
    let image = RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]));

    let result = detector.detect(&image).unwrap();
    assert_eq!(result.count(), 1);
    assert_ne!(result.annotated, image);
  }

  #[test]
  fn empty_result_keeps_image() {
    let mut detector = Detector::new(FixedModel(vec![]), 0.25, Draw::default());
    let image = RgbImage::from_pixel(8, 8, Rgb([1, 2, 3]));

    let result = detector.detect(&image).unwrap();
    assert_eq!(result.count(), 0);
    assert_eq!(result.annotated, image);
  }

  #[test]
  fn model_error_propagates() {
    let mut detector = Detector::new(BrokenModel, 0.25, Draw::default());
    let image = RgbImage::new(4, 4);
    assert!(matches!(
      detector.detect(&image),
      Err(DetectorError::ModelError(_))
    ));
  }
}
