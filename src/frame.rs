// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/frame.rs - 帧与 NCHW 张量定义
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

use image::{Rgb, RgbImage, imageops};

const RGB_CHANNELS: usize = 3;
const LETTERBOX_FILL: u8 = 114;

/// 解码得到的一帧图像，`position` 为从 1 开始的帧序号
#[derive(Debug, Clone)]
pub struct Frame {
  pub position: u64,
  pub image: RgbImage,
}

impl Frame {
  pub fn new(position: u64, image: RgbImage) -> Self {
    Self { position, image }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}

/// 信箱缩放参数，用于把模型坐标映射回原图
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  pub scale: f32,
  pub pad_x: f32,
  pub pad_y: f32,
  pub source_width: u32,
  pub source_height: u32,
}

impl Letterbox {
  /// 模型输入像素坐标 [x_min, y_min, x_max, y_max] 转为原图归一化坐标
  pub fn unmap(&self, bbox: [f32; 4]) -> [f32; 4] {
    let w = self.source_width as f32;
    let h = self.source_height as f32;
    [
      (((bbox[0] - self.pad_x) / self.scale) / w).clamp(0.0, 1.0),
      (((bbox[1] - self.pad_y) / self.scale) / h).clamp(0.0, 1.0),
      (((bbox[2] - self.pad_x) / self.scale) / w).clamp(0.0, 1.0),
      (((bbox[3] - self.pad_y) / self.scale) / h).clamp(0.0, 1.0),
    ]
  }
}

/// 归一化到 [0, 1] 的 NCHW 浮点张量，批大小为 1
#[derive(Debug, Clone)]
pub struct RgbNchwTensor {
  data: Box<[f32]>,
  size: usize,
}

impl RgbNchwTensor {
  /// 等比缩放到 `size`x`size` 并以灰色填充边缘
  pub fn letterbox(image: &RgbImage, size: u32) -> (Self, Letterbox) {
    let (src_w, src_h) = image.dimensions();
    let scale = (size as f32 / src_w as f32).min(size as f32 / src_h as f32);
    let scaled_w = ((src_w as f32 * scale) as u32).clamp(1, size);
    let scaled_h = ((src_h as f32 * scale) as u32).clamp(1, size);
    let pad_x = (size - scaled_w) / 2;
    let pad_y = (size - scaled_h) / 2;

    let resized = imageops::resize(image, scaled_w, scaled_h, imageops::FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([LETTERBOX_FILL; 3]));
    imageops::overlay(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    let size = size as usize;
    let mut data = vec![0f32; RGB_CHANNELS * size * size];
    for (x, y, pixel) in canvas.enumerate_pixels() {
      let (x, y) = (x as usize, y as usize);
      for c in 0..RGB_CHANNELS {
        data[c * size * size + y * size + x] = pixel[c] as f32 / 255.0;
      }
    }

    let letterbox = Letterbox {
      scale,
      pad_x: pad_x as f32,
      pad_y: pad_y as f32,
      source_width: src_w,
      source_height: src_h,
    };
    (
      Self {
        data: data.into_boxed_slice(),
        size,
      },
      letterbox,
    )
  }

  pub fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, self.size, self.size]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn into_vec(self) -> Vec<f32> {
    self.data.into_vec()
  }
}
