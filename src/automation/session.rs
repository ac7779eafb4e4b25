// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/automation/session.rs - 可恢复的会话令牌
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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::automation::AutomationState;

#[derive(Error, Debug)]
pub enum SessionError {
  #[error("会话令牌不存在: {0}")]
  NotFound(PathBuf),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("会话令牌格式错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 在检查点挂起时保存的浏览器会话，供 `--resume` 重新连接
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionToken {
  pub webdriver_url: String,
  pub session_id: String,
  /// 恢复后从该状态继续
  pub resume_at: AutomationState,
  pub payload_path: PathBuf,
  pub saved_at: DateTime<Utc>,
}

impl SessionToken {
  pub fn new(
    webdriver_url: impl Into<String>,
    session_id: impl Into<String>,
    resume_at: AutomationState,
    payload_path: impl Into<PathBuf>,
  ) -> Self {
    Self {
      webdriver_url: webdriver_url.into(),
      session_id: session_id.into(),
      resume_at,
      payload_path: payload_path.into(),
      saved_at: Utc::now(),
    }
  }

  pub fn save(&self, path: &Path) -> Result<(), SessionError> {
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(self)?)?;
    debug!("保存会话令牌 {} -> {}", self.session_id, path.display());
    Ok(())
  }

  pub fn load(path: &Path) -> Result<Self, SessionError> {
    if !path.is_file() {
      return Err(SessionError::NotFound(path.to_path_buf()));
    }
    let token: SessionToken = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    info!(
      "读取会话令牌 {}（保存于 {}），从 {:?} 继续",
      token.session_id,
      token.saved_at.to_rfc3339(),
      token.resume_at
    );
    Ok(token)
  }

  /// 流程结束后删除令牌，文件不存在不算错误
  pub fn remove(path: &Path) -> Result<(), SessionError> {
    match std::fs::remove_file(path) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }
}
