// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/payload.rs - GHMC 投诉载荷
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

//! # 投诉载荷
//!
//! 检测流程与提交自动化之间唯一的交接文件。载荷以 2 空格缩进的 JSON
//! 写入，非 ASCII 字符原样保留；图片为结果目录下的绝对路径。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::PipelineConfig;

#[derive(Error, Debug)]
pub enum PayloadError {
  #[error("载荷文件不存在: {0}")]
  NotFound(PathBuf),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 来自结果页面的暂存请求，所有字段都可以缺失
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StageRequest {
  pub potholes: Option<u64>,
  pub address: Option<String>,
  #[serde(deserialize_with = "string_or_number")]
  pub lat: Option<String>,
  #[serde(deserialize_with = "string_or_number")]
  pub lon: Option<String>,
  pub message: Option<String>,
  pub date: Option<String>,
  /// 结果目录下的文件名，例如 `r_<id>.jpg`
  pub all_images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintPayload {
  pub potholes: Option<u64>,
  pub address: Option<String>,
  #[serde(default, deserialize_with = "string_or_number")]
  pub lat: Option<String>,
  #[serde(default, deserialize_with = "string_or_number")]
  pub lon: Option<String>,
  pub message: Option<String>,
  pub date: Option<String>,
  #[serde(default)]
  pub images: Vec<PathBuf>,
}

impl ComplaintPayload {
  pub fn load(path: impl AsRef<Path>) -> Result<Self, PayloadError> {
    let path = path.as_ref();
    if !path.is_file() {
      return Err(PayloadError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
  }

  pub fn to_pretty_json(&self) -> Result<String, PayloadError> {
    Ok(serde_json::to_string_pretty(self)?)
  }
}

/// 暂存成功后的回执
#[derive(Debug, Clone, Serialize)]
pub struct StageReceipt {
  pub status: &'static str,
  pub path: PathBuf,
}

pub struct PayloadStager {
  results_dir: PathBuf,
  payload_path: PathBuf,
}

impl PayloadStager {
  pub fn new(config: &PipelineConfig) -> Result<Self, PayloadError> {
    Ok(Self {
      results_dir: std::path::absolute(&config.results_dir)?,
      payload_path: std::path::absolute(&config.payload_path)?,
    })
  }

  pub fn payload_path(&self) -> &Path {
    &self.payload_path
  }

  /// 结果文件名转为结果目录下的绝对路径
  pub fn image_path(&self, name: &str) -> PathBuf {
    self.results_dir.join(name)
  }

  pub fn build(&self, request: &StageRequest) -> ComplaintPayload {
    ComplaintPayload {
      potholes: request.potholes,
      address: request.address.clone(),
      lat: request.lat.clone(),
      lon: request.lon.clone(),
      message: request.message.clone(),
      date: request.date.clone(),
      images: request.all_images.iter().map(|name| self.image_path(name)).collect(),
    }
  }

  /// 写入载荷文件（覆盖已有文件），返回其绝对路径
  pub fn stage(&self, request: &StageRequest) -> Result<StageReceipt, PayloadError> {
    let payload = self.build(request);
    if let Some(parent) = self.payload_path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    std::fs::write(&self.payload_path, payload.to_pretty_json()?)?;
    info!(
      "已写入投诉载荷 {}（{} 张图片）",
      self.payload_path.display(),
      payload.images.len()
    );

    Ok(StageReceipt {
      status: "ok",
      path: self.payload_path.clone(),
    })
  }
}

/// 坐标可能以字符串或数字提交
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Raw {
    Text(String),
    Number(serde_json::Number),
  }

  Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
    Raw::Text(text) => text,
    Raw::Number(number) => number.to_string(),
  }))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn request_fields_are_optional() {
    let request: StageRequest = serde_json::from_str("{}").unwrap();
    assert_eq!(request.potholes, None);
    assert!(request.all_images.is_empty());

    let request: StageRequest =
      serde_json::from_str(r#"{"lat": 17.385, "lon": "78.4867", "potholes": 2}"#).unwrap();
    assert_eq!(request.lat.as_deref(), Some("17.385"));
    assert_eq!(request.lon.as_deref(), Some("78.4867"));
    assert_eq!(request.potholes, Some(2));
  }

  #[test]
  fn missing_text_fields_serialize_as_null() {
    let payload = ComplaintPayload {
      potholes: None,
      address: None,
      lat: None,
      lon: None,
      message: None,
      date: None,
      images: vec![],
    };
    let json = payload.to_pretty_json().unwrap();
    assert!(json.contains("\"address\": null"));
    assert!(json.contains("\"images\": []"));
  }

  #[test]
  fn non_ascii_is_kept_verbatim() {
    let payload = ComplaintPayload {
      potholes: Some(1),
      address: Some("హైదరాబాద్".to_string()),
      lat: None,
      lon: None,
      message: Some("गड्ढा".to_string()),
      date: None,
      images: vec![],
    };
    let json = payload.to_pretty_json().unwrap();
    assert!(json.contains("హైదరాబాద్"));
    assert!(json.contains("गड्ढा"));
  }
}
