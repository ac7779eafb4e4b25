// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/config.rs - 运行配置
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

//! 检测流水线与投诉自动填写的配置。
//!
//! 所有组件在构造时接收各自的配置，不读取任何全局状态。配置可以从 JSON
//! 文件加载，缺省字段使用默认值：
//!
//! ```json
//! {
//!   "pipeline": { "sampling_stride": 15, "confidence": 0.3 },
//!   "automation": { "webdriver_url": "http://localhost:4444" }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// 未提供定位时使用的默认纬度（海得拉巴）
pub const DEFAULT_LAT: &str = "17.3850";
/// 未提供定位时使用的默认经度（海得拉巴）
pub const DEFAULT_LON: &str = "78.4867";
/// 视频采样步长：每 30 帧推理一次
pub const DEFAULT_SAMPLING_STRIDE: u64 = 30;
pub const DEFAULT_CONFIDENCE: f32 = 0.25;
pub const PAYLOAD_FILE_NAME: &str = "ghmc_payload.json";
pub const SCRATCH_FRAME_NAME: &str = "frame.jpg";

pub const GHMC_OTP_URL: &str = "https://igs.ghmc.gov.in/operator/send_otp_mobile";
pub const GHMC_GRIEVANCE_URL: &str = "https://igs.ghmc.gov.in/Grievance/GrievanceEntry";

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("配置文件解析错误: {0}")]
  Parse(#[from] serde_json::Error),
  #[error("采样步长必须大于 0")]
  ZeroStride,
  #[error("置信度阈值超出范围 [0, 1]: {0}")]
  ConfidenceOutOfRange(f32),
  #[error("视频扩展名列表为空")]
  NoVideoExtensions,
}

/// 批处理中单个文件失败时的处理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
  /// 第一个失败即终止整个批次
  #[default]
  Abort,
  /// 记录失败并继续处理剩余文件
  Isolate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
  pub endpoint: String,
  pub user_agent: String,
  pub timeout_secs: u64,
}

impl Default for GeocoderConfig {
  fn default() -> Self {
    Self {
      endpoint: "https://nominatim.openstreetmap.org".to_string(),
      user_agent: "air_pothole_v8_final".to_string(),
      timeout_secs: 5,
    }
  }
}

impl GeocoderConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// 上传文件保存目录
  pub upload_dir: PathBuf,
  /// 标注结果图片保存目录
  pub results_dir: PathBuf,
  /// 投诉载荷文件路径
  pub payload_path: PathBuf,
  pub default_lat: String,
  pub default_lon: String,
  pub sampling_stride: u64,
  pub confidence: f32,
  /// 按视频处理的扩展名（小写）
  pub video_extensions: Vec<String>,
  /// 是否根据文件内容校验扩展名给出的类型
  pub sniff_content: bool,
  pub failure_policy: FailurePolicy,
  /// 标注文字使用的 TTF 字体，未设置时只绘制边框
  pub label_font: Option<PathBuf>,
  pub geocoder: GeocoderConfig,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self::with_base_dir(".")
  }
}

impl PipelineConfig {
  /// 以 `base` 为根目录派生上传目录、结果目录和载荷文件路径
  pub fn with_base_dir(base: impl AsRef<Path>) -> Self {
    let base = base.as_ref();
    Self {
      upload_dir: base.join("uploads"),
      results_dir: base.join("static").join("results"),
      payload_path: base.join(PAYLOAD_FILE_NAME),
      default_lat: DEFAULT_LAT.to_string(),
      default_lon: DEFAULT_LON.to_string(),
      sampling_stride: DEFAULT_SAMPLING_STRIDE,
      confidence: DEFAULT_CONFIDENCE,
      video_extensions: vec!["mp4".to_string(), "mov".to_string(), "avi".to_string()],
      sniff_content: true,
      failure_policy: FailurePolicy::Abort,
      label_font: None,
      geocoder: GeocoderConfig::default(),
    }
  }

  /// 视频采样帧的临时文件，每次采样覆盖
  pub fn scratch_frame_path(&self) -> PathBuf {
    self.upload_dir.join(SCRATCH_FRAME_NAME)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.sampling_stride == 0 {
      return Err(ConfigError::ZeroStride);
    }
    if !(0.0..=1.0).contains(&self.confidence) {
      return Err(ConfigError::ConfidenceOutOfRange(self.confidence));
    }
    if self.video_extensions.is_empty() {
      return Err(ConfigError::NoVideoExtensions);
    }
    Ok(())
  }

  pub fn ensure_dirs(&self) -> Result<(), ConfigError> {
    std::fs::create_dir_all(&self.upload_dir)?;
    std::fs::create_dir_all(&self.results_dir)?;
    Ok(())
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
  /// WebDriver 服务地址（chromedriver / geckodriver）
  pub webdriver_url: String,
  pub otp_url: String,
  pub grievance_url: String,
  pub navigation_timeout_secs: u64,
  /// 打开投诉页面后等待页面稳定的时间
  pub settle_delay_ms: u64,
  pub window_width: u32,
  pub window_height: u32,
  pub headless: bool,
  /// 会话令牌文件，用于在人工检查点挂起后恢复
  pub session_token: Option<PathBuf>,
}

impl Default for AutomationConfig {
  fn default() -> Self {
    Self {
      webdriver_url: "http://localhost:9515".to_string(),
      otp_url: GHMC_OTP_URL.to_string(),
      grievance_url: GHMC_GRIEVANCE_URL.to_string(),
      navigation_timeout_secs: 60,
      settle_delay_ms: 1000,
      window_width: 1200,
      window_height: 900,
      headless: false,
      session_token: None,
    }
  }
}

impl AutomationConfig {
  pub fn navigation_timeout(&self) -> Duration {
    Duration::from_secs(self.navigation_timeout_secs)
  }

  pub fn settle_delay(&self) -> Duration {
    Duration::from_millis(self.settle_delay_ms)
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub pipeline: PipelineConfig,
  pub automation: AutomationConfig,
}

impl Config {
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    info!("加载配置文件: {}", path.display());
    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    config.pipeline.validate()?;
    Ok(config)
  }

  /// 指定了配置文件则加载，否则使用默认配置
  pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
    match path {
      Some(path) => Self::load(path),
      None => Ok(Self::default()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn base_dir_layout_matches_web_app() {
    let config = PipelineConfig::with_base_dir("/srv/app");
    assert_eq!(config.upload_dir, PathBuf::from("/srv/app/uploads"));
    assert_eq!(config.results_dir, PathBuf::from("/srv/app/static/results"));
    assert_eq!(
      config.payload_path,
      PathBuf::from("/srv/app/ghmc_payload.json")
    );
    assert_eq!(
      config.scratch_frame_path(),
      PathBuf::from("/srv/app/uploads/frame.jpg")
    );
  }

  #[test]
  fn partial_json_keeps_defaults() {
    let config: Config =
      serde_json::from_str(r#"{"pipeline": {"sampling_stride": 15}}"#).unwrap();
    assert_eq!(config.pipeline.sampling_stride, 15);
    assert_eq!(config.pipeline.confidence, DEFAULT_CONFIDENCE);
    assert_eq!(config.pipeline.default_lat, DEFAULT_LAT);
    assert_eq!(config.automation.otp_url, GHMC_OTP_URL);
    assert_eq!(config.pipeline.failure_policy, FailurePolicy::Abort);
  }

  #[test]
  fn failure_policy_uses_snake_case() {
    let config: PipelineConfig =
      serde_json::from_str(r#"{"failure_policy": "isolate"}"#).unwrap();
    assert_eq!(config.failure_policy, FailurePolicy::Isolate);
  }

  #[test]
  fn validate_rejects_bad_values() {
    let mut config = PipelineConfig::default();
    assert!(config.validate().is_ok());

    config.sampling_stride = 0;
    assert!(matches!(config.validate(), Err(ConfigError::ZeroStride)));

    config.sampling_stride = 30;
    config.confidence = 1.5;
    assert!(matches!(
      config.validate(),
      Err(ConfigError::ConfidenceOutOfRange(_))
    ));
  }
}
