// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/output/result_directory.rs - 保存标注结果图像
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

use image::RgbImage;
use tracing::info;
use uuid::Uuid;

use crate::output::OutputError;

const IMAGE_RESULT_PREFIX: &str = "r_";
const FRAME_RESULT_PREFIX: &str = "v_";

/// 结果目录，文件名 `r_<上传 id>.jpg`（图片）或 `v_<新 id>.jpg`（视频帧）
#[derive(Debug, Clone)]
pub struct ResultDirectory {
  directory: PathBuf,
}

impl ResultDirectory {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
    }
  }

  pub fn path(&self) -> &Path {
    &self.directory
  }

  /// 结果文件名对应的完整路径
  pub fn resolve(&self, name: &str) -> PathBuf {
    self.directory.join(name)
  }

  /// 保存图片单元的结果，返回文件名
  pub fn save_image_result(&self, unit_id: &str, image: &RgbImage) -> Result<String, OutputError> {
    let name = format!("{}{}.jpg", IMAGE_RESULT_PREFIX, unit_id);
    self.save(&name, image)?;
    Ok(name)
  }

  /// 保存视频采样帧的结果，每帧使用新的 id
  pub fn save_frame_result(&self, image: &RgbImage) -> Result<String, OutputError> {
    let name = format!(
      "{}{}.jpg",
      FRAME_RESULT_PREFIX,
      Uuid::new_v4().simple()
    );
    self.save(&name, image)?;
    Ok(name)
  }

  fn save(&self, name: &str, image: &RgbImage) -> Result<(), OutputError> {
    if !self.directory.as_os_str().is_empty() {
      std::fs::create_dir_all(&self.directory)?;
    }

    let path = self.resolve(name);
    image.save(&path)?;
    info!("保存结果图像: {}", path.display());
    Ok(())
  }
}
