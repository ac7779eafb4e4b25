// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/media.rs - 上传文件分类
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
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;

#[derive(Error, Debug)]
pub enum MediaError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("文件名无效: {0}")]
  InvalidFileName(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
  Image,
  Video,
}

impl MediaKind {
  /// 根据小写扩展名判断类型，不在视频扩展名列表中的一律按图片处理
  pub fn from_extension(extension: &str, video_extensions: &[String]) -> Self {
    if video_extensions.iter().any(|v| v == extension) {
      MediaKind::Video
    } else {
      MediaKind::Image
    }
  }

  pub fn from_filename(filename: &str, video_extensions: &[String]) -> Self {
    Self::from_extension(&extension_of(filename), video_extensions)
  }

  /// 扩展名只作为提示，文件内容能识别时以内容为准
  pub fn resolve(hint: MediaKind, sniffed: Option<MediaKind>) -> MediaKind {
    match sniffed {
      Some(kind) if kind != hint => {
        warn!("扩展名指示 {:?}，但文件内容为 {:?}，按内容处理", hint, kind);
        kind
      }
      Some(kind) => kind,
      None => hint,
    }
  }
}

/// 取最后一个 `.` 之后的部分并转为小写；没有 `.` 时返回整个文件名
pub fn extension_of(filename: &str) -> String {
  filename
    .rsplit('.')
    .next()
    .unwrap_or(filename)
    .to_lowercase()
}

/// 通过文件头识别容器或图片格式
pub fn sniff(data: &[u8]) -> Option<MediaKind> {
  if data.len() >= 12 {
    // ISO-BMFF（mp4 / mov），HEIF/AVIF 图片同样使用 ftyp
    if &data[4..8] == b"ftyp" {
      return match &data[8..12] {
        b"heic" | b"heix" | b"mif1" | b"avif" => Some(MediaKind::Image),
        _ => Some(MediaKind::Video),
      };
    }
    if matches!(&data[4..8], b"moov" | b"mdat" | b"wide" | b"free") {
      return Some(MediaKind::Video);
    }
    if &data[0..4] == b"RIFF" && &data[8..12] == b"AVI " {
      return Some(MediaKind::Video);
    }
  }
  image::guess_format(data).ok().map(|_| MediaKind::Image)
}

/// 请求中提交的一个文件
#[derive(Debug, Clone, Default)]
pub struct UploadFile {
  pub filename: String,
  pub data: Vec<u8>,
}

impl UploadFile {
  pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
    Self {
      filename: filename.into(),
      data: data.into(),
    }
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, MediaError> {
    let path = path.as_ref();
    let filename = path
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .ok_or_else(|| MediaError::InvalidFileName(path.display().to_string()))?;
    let data = std::fs::read(path)?;
    Ok(Self { filename, data })
  }

  /// 没有文件名的条目视为空条目
  pub fn is_blank(&self) -> bool {
    self.filename.trim().is_empty()
  }
}

/// 已保存到上传目录的文件
#[derive(Debug, Clone)]
pub struct UploadUnit {
  pub id: String,
  pub extension: String,
  pub kind: MediaKind,
  pub path: PathBuf,
}

impl UploadUnit {
  pub fn persist(file: &UploadFile, config: &PipelineConfig) -> Result<Self, MediaError> {
    let id = Uuid::new_v4().simple().to_string();
    let extension = extension_of(&file.filename);
    let hint = MediaKind::from_extension(&extension, &config.video_extensions);
    let kind = if config.sniff_content {
      MediaKind::resolve(hint, sniff(&file.data))
    } else {
      hint
    };

    std::fs::create_dir_all(&config.upload_dir)?;
    let path = config.upload_dir.join(format!("{}.{}", id, extension));
    std::fs::write(&path, &file.data)?;
    debug!("保存上传文件 {} -> {}", file.filename, path.display());

    Ok(Self {
      id,
      extension,
      kind,
      path,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn videos() -> Vec<String> {
    vec!["mp4".into(), "mov".into(), "avi".into()]
  }

  #[test]
  fn classifies_by_lowercased_extension() {
    assert_eq!(MediaKind::from_filename("road.MP4", &videos()), MediaKind::Video);
    assert_eq!(MediaKind::from_filename("clip.mov", &videos()), MediaKind::Video);
    assert_eq!(MediaKind::from_filename("a.b.AVI", &videos()), MediaKind::Video);
    assert_eq!(MediaKind::from_filename("road.jpg", &videos()), MediaKind::Image);
    assert_eq!(MediaKind::from_filename("road.mkv", &videos()), MediaKind::Image);
    assert_eq!(MediaKind::from_filename("noext", &videos()), MediaKind::Image);
  }

  #[test]
  fn extension_without_dot_is_whole_name() {
    assert_eq!(extension_of("README"), "readme");
    assert_eq!(extension_of("x.tar.GZ"), "gz");
  }

  #[test]
  fn sniffs_containers_and_images() {
    let mut mp4 = vec![0, 0, 0, 0x20];
    mp4.extend_from_slice(b"ftypisom\0\0\0\0");
    assert_eq!(sniff(&mp4), Some(MediaKind::Video));

    let mut avi = b"RIFF".to_vec();
    avi.extend_from_slice(&[0, 0, 0, 0]);
    avi.extend_from_slice(b"AVI LIST");
    assert_eq!(sniff(&avi), Some(MediaKind::Video));

    let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    assert_eq!(sniff(png), Some(MediaKind::Image));

    assert_eq!(sniff(b"plain text, nothing here"), None);
  }

  #[test]
  fn content_overrides_spoofed_extension() {
    assert_eq!(
      MediaKind::resolve(MediaKind::Video, Some(MediaKind::Image)),
      MediaKind::Image
    );
    assert_eq!(MediaKind::resolve(MediaKind::Video, None), MediaKind::Video);
  }

  #[test]
  fn blank_upload_is_detected() {
    assert!(UploadFile::default().is_blank());
    assert!(UploadFile::new("  ", vec![1, 2, 3]).is_blank());
    assert!(!UploadFile::new("a.jpg", Vec::new()).is_blank());
  }

  #[test]
  fn persist_writes_under_fresh_id() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::with_base_dir(dir.path());
    let file = UploadFile::new("Road.JPG", b"not really a jpeg".to_vec());

    let unit = UploadUnit::persist(&file, &config).unwrap();
    assert_eq!(unit.extension, "jpg");
    assert_eq!(unit.kind, MediaKind::Image);
    assert_eq!(unit.id.len(), 32);
    assert_eq!(unit.path, config.upload_dir.join(format!("{}.jpg", unit.id)));
    assert_eq!(std::fs::read(&unit.path).unwrap(), b"not really a jpeg");

    let other = UploadUnit::persist(&file, &config).unwrap();
    assert_ne!(unit.id, other.id);
  }
}
