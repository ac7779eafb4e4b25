// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/output/draw.rs - 检测结果标注
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use tracing::{debug, info};

use crate::{
  model::{DetectItem, DetectResult},
  output::OutputError,
};

const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;
const BOX_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const TEXT_COLOR: [u8; 3] = [255, 255, 255];

pub const POTHOLE_LABELS: &[&str] = &["pothole"];

/// 在图像上绘制检测框。没有字体时只画框，不画标签文字。
pub struct Draw {
  font: Option<FontArc>,
  labels: Vec<String>,
  font_size: f32,
  color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font: None,
      labels: POTHOLE_LABELS.iter().map(|s| s.to_string()).collect(),
      font_size: LABEL_FONT_SIZE,
      color: BOX_COLOR,
    }
  }
}

impl Draw {
  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = Some(font);
    self
  }

  pub fn with_labels<S: Into<String>>(mut self, labels: impl IntoIterator<Item = S>) -> Self {
    self.labels = labels.into_iter().map(Into::into).collect();
    self
  }

  /// 从 TTF/OTF 文件加载标签字体
  pub fn load_font(path: &Path) -> Result<FontArc, OutputError> {
    let data = std::fs::read(path)?;
    let font = FontArc::try_from_vec(data)
      .map_err(|_| OutputError::InvalidFont(path.display().to_string()))?;
    info!("加载标签字体: {}", path.display());
    Ok(font)
  }

  /// 配置了字体路径时加载字体，否则只画框
  pub fn from_font_path(path: Option<&Path>) -> Result<Self, OutputError> {
    let draw = Draw::default();
    match path {
      Some(path) => Ok(draw.with_font(Self::load_font(path)?)),
      None => Ok(draw),
    }
  }

  pub fn label_of(&self, class_id: u32) -> String {
    self
      .labels
      .get(class_id as usize)
      .cloned()
      .unwrap_or_else(|| format!("class{}", class_id))
  }

  /// 返回标注后的新图像，原图不变
  pub fn annotate(&self, image: &RgbImage, result: &DetectResult) -> RgbImage {
    let mut canvas = image.clone();
    self.draw_detections(&mut canvas, result);
    canvas
  }

  pub fn draw_detections(&self, image: &mut RgbImage, result: &DetectResult) {
    for item in result.iter() {
      self.draw_item(image, item);
    }
    debug!("绘制 {} 个检测框", result.len());
  }

  fn draw_item(&self, image: &mut RgbImage, item: &DetectItem) {
    let Some((x_min, y_min, x_max, y_max)) = pixel_box(image, &item.bbox) else {
      return;
    };

    for t in 0..BOX_THICKNESS {
      let (w, h) = (x_max - x_min - 2 * t, y_max - y_min - 2 * t);
      if w < 0 || h < 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(w as u32 + 1, h as u32 + 1);
      draw_hollow_rect_mut(image, rect, Rgb(self.color));
    }

    let Some(font) = &self.font else {
      return;
    };

    let label = format!("{} {:.2}", self.label_of(item.class_id), item.score);
    let scale = PxScale::from(self.font_size);
    let (text_w, text_h) = text_size(scale, font, &label);
    let label_h = text_h as i32 + 2 * LABEL_TEXT_VERTICAL_PADDING;

    // 标签放在框上方，空间不够时贴着图像上边
    let label_x = x_min;
    let label_y = (y_min - label_h).max(0);
    let label_w = (text_w as i32).min(image.width() as i32 - label_x);
    if label_w <= 0 || label_h <= 0 {
      return;
    }

    let background = Rect::at(label_x, label_y).of_size(label_w as u32, label_h as u32);
    draw_filled_rect_mut(image, background, Rgb(self.color));
    draw_text_mut(
      image,
      Rgb(TEXT_COLOR),
      label_x,
      label_y + LABEL_TEXT_VERTICAL_PADDING,
      scale,
      font,
      &label,
    );
  }
}

/// 归一化坐标转为图像内的像素坐标。
///
/// 被计数的框都要画出来：缩到不足一个像素的框至少占一个像素，只有空图像返回 `None`。
fn pixel_box(image: &RgbImage, bbox: &[f32; 4]) -> Option<(i32, i32, i32, i32)> {
  let (w, h) = (image.width() as f32, image.height() as f32);
  if w < 1.0 || h < 1.0 {
    return None;
  }
  let max_x = w as i32 - 1;
  let max_y = h as i32 - 1;

  let x_min = ((bbox[0] * w).floor() as i32).clamp(0, max_x);
  let y_min = ((bbox[1] * h).floor() as i32).clamp(0, max_y);
  let x_max = ((bbox[2] * w).ceil() as i32).clamp(x_min, max_x);
  let y_max = ((bbox[3] * h).ceil() as i32).clamp(y_min, max_y);

  Some((x_min, y_min, x_max, y_max))
}
