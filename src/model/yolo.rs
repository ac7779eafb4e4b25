// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/model/yolo.rs - YOLO 输出解码与 NMS
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

use thiserror::Error;
use tracing::debug;

use crate::{frame::Letterbox, model::DetectItem};

pub const YOLO_INPUT_SIZE: u32 = 640;
pub const YOLO_NMS_THRESHOLD: f32 = 0.45;

#[derive(Error, Debug, PartialEq)]
pub enum YoloDecodeError {
  #[error("输出张量维度应为 [1, 4 + 类别数, 候选数], 实际为 {0:?}")]
  UnexpectedShape(Vec<i64>),
  #[error("输出数据长度不匹配: 期望 {expected}, 实际 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 解析 YOLOv8 风格的输出 `[1, 4 + nc, n]`。
///
/// 每个候选框为中心点格式 `[cx, cy, w, h]`（模型输入像素坐标），之后是各类别得分。
/// 返回经过按类别 NMS 的结果，坐标已映射回原图并归一化，按得分降序排列。
pub fn decode(
  output: &[f32],
  shape: &[i64],
  confidence: f32,
  letterbox: &Letterbox,
) -> Result<Vec<DetectItem>, YoloDecodeError> {
  let (rows, candidates) = match shape {
    [1, rows, candidates] if *rows > 4 && *candidates >= 0 => {
      (*rows as usize, *candidates as usize)
    }
    _ => return Err(YoloDecodeError::UnexpectedShape(shape.to_vec())),
  };

  let expected = rows * candidates;
  if output.len() != expected {
    return Err(YoloDecodeError::LengthMismatch {
      expected,
      actual: output.len(),
    });
  }

  let mut items = Vec::new();
  for i in 0..candidates {
    let (class_id, score) = (4..rows)
      .map(|row| (row - 4, output[row * candidates + i]))
      .fold((0usize, f32::MIN), |best, (c, s)| {
        if s > best.1 { (c, s) } else { best }
      });

    if score < confidence {
      continue;
    }

    let cx = output[i];
    let cy = output[candidates + i];
    let w = output[2 * candidates + i];
    let h = output[3 * candidates + i];

    let bbox = letterbox.unmap([cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0]);
    if bbox[0] >= bbox[2] || bbox[1] >= bbox[3] {
      continue;
    }

    items.push(DetectItem {
      class_id: class_id as u32,
      score,
      bbox,
    });
  }

  debug!("置信度过滤后候选数: {}", items.len());
  Ok(nms(items, YOLO_NMS_THRESHOLD))
}

/// 按类别做非极大值抑制
pub fn nms(mut items: Vec<DetectItem>, iou_threshold: f32) -> Vec<DetectItem> {
  items.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut kept: Vec<DetectItem> = Vec::with_capacity(items.len());
  for item in items {
    let suppressed = kept
      .iter()
      .any(|k| k.class_id == item.class_id && iou(&k.bbox, &item.bbox) >= iou_threshold);
    if !suppressed {
      kept.push(item);
    }
  }
  kept
}

/// 计算两个边界框的 IoU
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]) * (a[3] - a[1]);
  let area_b = (b[2] - b[0]) * (b[3] - b[1]);
  let union = area_a + area_b - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn identity() -> Letterbox {
    Letterbox {
      scale: 1.0,
      pad_x: 0.0,
      pad_y: 0.0,
      source_width: 100,
      source_height: 100,
    }
  }

  /// 单类别输出，每列一个候选
  fn single_class(candidates: &[[f32; 5]]) -> (Vec<f32>, Vec<i64>) {
    let n = candidates.len();
    let mut data = vec![0.0; 5 * n];
    for (i, c) in candidates.iter().enumerate() {
      for row in 0..5 {
        data[row * n + i] = c[row];
      }
    }
    (data, vec![1, 5, n as i64])
  }

  #[test]
  fn filters_by_confidence_and_suppresses_overlaps() {
    let (data, shape) = single_class(&[
      [50.0, 50.0, 20.0, 20.0, 0.9],
      [51.0, 50.0, 20.0, 20.0, 0.8], // 与第一个高度重叠
      [10.0, 10.0, 10.0, 10.0, 0.3],
      [80.0, 80.0, 10.0, 10.0, 0.1], // 低于阈值
    ]);
    let items = decode(&data, &shape, 0.25, &identity()).unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].score, 0.9);
    assert_eq!(items[0].bbox, [0.4, 0.4, 0.6, 0.6]);
    assert_eq!(items[1].score, 0.3);
  }

  #[test]
  fn picks_best_class() {
    // 2 个类别，1 个候选
    let data = vec![50.0, 50.0, 10.0, 10.0, 0.2, 0.7];
    let items = decode(&data, &[1, 6, 1], 0.25, &identity()).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].class_id, 1);
  }

  #[test]
  fn rejects_bad_shapes() {
    assert!(matches!(
      decode(&[0.0; 4], &[1, 4, 1], 0.25, &identity()),
      Err(YoloDecodeError::UnexpectedShape(_))
    ));
    assert_eq!(
      decode(&[0.0; 9], &[1, 5, 2], 0.25, &identity()),
      Err(YoloDecodeError::LengthMismatch {
        expected: 10,
        actual: 9
      })
    );
  }

  #[test]
  fn iou_of_disjoint_boxes_is_zero() {
    assert_eq!(iou(&[0.0, 0.0, 0.1, 0.1], &[0.5, 0.5, 0.6, 0.6]), 0.0);
    assert!((iou(&[0.0, 0.0, 0.2, 0.2], &[0.0, 0.0, 0.2, 0.2]) - 1.0).abs() < 1e-6);
  }
}
