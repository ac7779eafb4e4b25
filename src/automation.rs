// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/automation.rs - GHMC 投诉表单引导填写
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

//! # 投诉提交自动化
//!
//! 读取投诉载荷，打开 GHMC 登录页与投诉页并尽量自动填写。两处需要人工：
//! 验证码登录与最终提交。程序从不替操作员点击提交。
//!
//! 字段填写都是尽力而为，找不到控件只记录在报告里；
//! 只有两个页面打不开才是致命错误。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  config::AutomationConfig,
  payload::{ComplaintPayload, PayloadError},
};

pub mod browser;
pub mod checkpoint;
pub mod selector;
pub mod session;
mod webdriver;

pub use self::browser::{Browser, BrowserError, ElementHandle, Locator};
pub use self::checkpoint::{Acknowledgement, Checkpoint, CheckpointError, ConsoleCheckpoint};
pub use self::session::{SessionError, SessionToken};
pub use self::webdriver::WebDriverBrowser;

use self::selector::{
  COORDINATE_SCRIPT, address_chain, description_chain, file_input_chain, generic_address_chain,
  phone_chain, send_otp_chain,
};

const LOGIN_PROMPT: &str = "人工步骤：请在浏览器中完成验证码登录。
登录后按回车继续填写投诉表单（Ctrl-C 挂起，可用 --resume 恢复）。";

const SUBMIT_PROMPT: &str = "完成：投诉表单已预先填写。请核对各字段后在浏览器中手动点击提交。
完成后按回车关闭浏览器并退出。";

#[derive(Error, Debug)]
pub enum AutomationError {
  #[error("载荷文件不存在: {0}")]
  PayloadMissing(PathBuf),
  #[error("载荷读取失败: {0}")]
  PayloadError(PayloadError),
  #[error("浏览器错误: {0}")]
  BrowserError(#[from] BrowserError),
  #[error("检查点错误: {0}")]
  CheckpointError(#[from] CheckpointError),
  #[error("会话令牌错误: {0}")]
  SessionError(#[from] SessionError),
}

impl From<PayloadError> for AutomationError {
  fn from(e: PayloadError) -> Self {
    match e {
      PayloadError::NotFound(path) => AutomationError::PayloadMissing(path),
      e => AutomationError::PayloadError(e),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationState {
  Start,
  OtpPage,
  AutoSendOtp,
  AwaitManualLogin,
  GrievanceForm,
  FillAddress,
  FillCoordinates,
  FillDescription,
  AttachImages,
  AwaitManualSubmit,
  End,
  /// 在登录检查点中断，浏览器保持打开，可凭会话令牌恢复
  Suspended,
}

impl AutomationState {
  /// 需要操作员确认的状态
  pub fn is_checkpoint(self) -> bool {
    matches!(
      self,
      AutomationState::AwaitManualLogin | AutomationState::AwaitManualSubmit
    )
  }

  /// 自动执行的状态，Ctrl-C 在这些状态之间生效
  pub fn is_interruptible(self) -> bool {
    !self.is_checkpoint() && !matches!(self, AutomationState::End | AutomationState::Suspended)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum FieldOutcome {
  /// 未执行到该步骤
  Skipped,
  /// 已填写，附命中的选择器
  Filled(String),
  NotFound,
  Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum AttachmentOutcome {
  Skipped,
  Attached(usize),
  NoValidImages,
  NoFileInput,
  Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct AutomationReport {
  pub final_state: AutomationState,
  pub session_id: String,
  pub missing_images: Vec<PathBuf>,
  pub phone: FieldOutcome,
  pub otp_sent: bool,
  pub address: FieldOutcome,
  pub coordinates: FieldOutcome,
  pub description: FieldOutcome,
  pub attachments: AttachmentOutcome,
  /// 操作员在检查点之外按了 Ctrl-C，流程提前结束
  pub interrupted: bool,
}

impl AutomationReport {
  fn new(session_id: &str) -> Self {
    Self {
      final_state: AutomationState::Start,
      session_id: session_id.to_string(),
      missing_images: Vec::new(),
      phone: FieldOutcome::Skipped,
      otp_sent: false,
      address: FieldOutcome::Skipped,
      coordinates: FieldOutcome::Skipped,
      description: FieldOutcome::Skipped,
      attachments: AttachmentOutcome::Skipped,
      interrupted: false,
    }
  }
}

pub struct Automator<B: Browser, C: Checkpoint> {
  browser: B,
  checkpoint: C,
  config: AutomationConfig,
  phone: Option<String>,
}

impl<B: Browser, C: Checkpoint> Automator<B, C> {
  pub fn new(browser: B, checkpoint: C, config: AutomationConfig) -> Self {
    Self {
      browser,
      checkpoint,
      config,
      phone: None,
    }
  }

  pub fn with_phone(mut self, phone: Option<String>) -> Self {
    self.phone = phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
    self
  }

  pub fn browser(&self) -> &B {
    &self.browser
  }

  pub fn into_browser(self) -> B {
    self.browser
  }

  /// 从头开始整个流程
  pub fn run(&mut self, payload_path: &Path) -> Result<AutomationReport, AutomationError> {
    self.run_from(payload_path, AutomationState::Start)
  }

  /// 按会话令牌记录的状态继续
  pub fn resume(
    &mut self,
    payload_path: &Path,
    token: &SessionToken,
  ) -> Result<AutomationReport, AutomationError> {
    info!("从 {:?} 恢复会话 {}", token.resume_at, token.session_id);
    self.run_from(payload_path, token.resume_at)
  }

  /// 出错时关闭浏览器，避免 WebDriver 会话残留
  fn run_from(
    &mut self,
    payload_path: &Path,
    start: AutomationState,
  ) -> Result<AutomationReport, AutomationError> {
    self.drive(payload_path, start).inspect_err(|e| {
      warn!("自动化失败，关闭浏览器: {}", e);
      if let Err(e) = self.shutdown() {
        warn!("清理会话令牌失败: {}", e);
      }
    })
  }

  fn drive(
    &mut self,
    payload_path: &Path,
    start: AutomationState,
  ) -> Result<AutomationReport, AutomationError> {
    let payload = ComplaintPayload::load(payload_path)?;
    let pretty = payload.to_pretty_json()?;
    debug!("已加载投诉载荷 {}", payload_path.display());
    println!("已加载投诉载荷:\n{}", pretty);

    let mut report = AutomationReport::new(self.browser.session_id());
    for image in &payload.images {
      if !image.exists() {
        warn!("image not found: {}", image.display());
        report.missing_images.push(image.clone());
      }
    }

    let mut state = start;
    loop {
      debug!("进入状态 {:?}", state);
      if state.is_interruptible() && self.checkpoint.interrupted() {
        warn!("在 {:?} 收到中断，结束流程", state);
        println!("\n已中断，关闭浏览器。");
        report.interrupted = true;
        state = AutomationState::End;
      }
      report.final_state = state;
      state = match state {
        AutomationState::Start => AutomationState::OtpPage,
        AutomationState::OtpPage => {
          self.browser.goto(&self.config.otp_url)?;
          println!("已在浏览器中打开 GHMC 验证码登录页。");
          if self.phone.is_some() {
            AutomationState::AutoSendOtp
          } else {
            AutomationState::AwaitManualLogin
          }
        }
        AutomationState::AutoSendOtp => {
          self.send_otp(&mut report);
          AutomationState::AwaitManualLogin
        }
        AutomationState::AwaitManualLogin => {
          // 恢复后直接进入投诉页
          self.save_token(payload_path, AutomationState::GrievanceForm)?;
          match self.checkpoint.wait(state, LOGIN_PROMPT)? {
            Acknowledgement::Continue => AutomationState::GrievanceForm,
            Acknowledgement::Cancel => {
              self.report_suspended();
              report.final_state = AutomationState::Suspended;
              return Ok(report);
            }
          }
        }
        AutomationState::GrievanceForm => {
          self.browser.goto(&self.config.grievance_url)?;
          std::thread::sleep(self.config.settle_delay());
          AutomationState::FillAddress
        }
        AutomationState::FillAddress => {
          println!("\n正在填写地址 / 位置...");
          report.address = self.fill_address(payload.address.as_deref().unwrap_or_default());
          AutomationState::FillCoordinates
        }
        AutomationState::FillCoordinates => {
          report.coordinates = self.fill_coordinates(
            payload.lat.as_deref().unwrap_or_default(),
            payload.lon.as_deref().unwrap_or_default(),
          );
          AutomationState::FillDescription
        }
        AutomationState::FillDescription => {
          println!("\n正在填写问题描述...");
          let message = payload.message.as_deref().unwrap_or_default();
          report.description = self.fill_description(message);
          AutomationState::AttachImages
        }
        AutomationState::AttachImages => {
          println!("\n正在上传图片...");
          let images = self.existing_images(&payload.images, &mut report);
          report.attachments = self.attach_images(&images);
          AutomationState::AwaitManualSubmit
        }
        AutomationState::AwaitManualSubmit => {
          self.save_token(payload_path, AutomationState::AwaitManualSubmit)?;
          // 在这里中断与确认效果相同
          if self.checkpoint.wait(state, SUBMIT_PROMPT)? == Acknowledgement::Cancel {
            info!("最终检查点被中断，照常结束");
          }
          AutomationState::End
        }
        AutomationState::End => {
          self.shutdown()?;
          return Ok(report);
        }
        AutomationState::Suspended => return Ok(report),
      };
    }
  }

  fn shutdown(&mut self) -> Result<(), SessionError> {
    if let Err(e) = self.browser.close() {
      warn!("关闭浏览器失败: {}", e);
    }
    match &self.config.session_token {
      Some(path) => SessionToken::remove(path),
      None => Ok(()),
    }
  }

  /// 上传前重新检查图片，登录可能耗时很久。路径统一转为绝对路径。
  fn existing_images(&self, images: &[PathBuf], report: &mut AutomationReport) -> Vec<PathBuf> {
    let mut existing = Vec::new();
    for image in images {
      if image.exists() {
        match std::path::absolute(image) {
          Ok(path) => existing.push(path),
          Err(e) => warn!("无法解析图片路径 {}: {}", image.display(), e),
        }
      } else if !report.missing_images.contains(image) {
        warn!("image not found: {}", image.display());
        report.missing_images.push(image.clone());
      }
    }
    existing
  }

  fn save_token(
    &self,
    payload_path: &Path,
    resume_at: AutomationState,
  ) -> Result<(), AutomationError> {
    let Some(path) = &self.config.session_token else {
      return Ok(());
    };
    let payload_path = std::path::absolute(payload_path).map_err(SessionError::from)?;
    SessionToken::new(
      self.config.webdriver_url.clone(),
      self.browser.session_id(),
      resume_at,
      payload_path,
    )
    .save(path)?;
    Ok(())
  }

  fn report_suspended(&self) {
    match &self.config.session_token {
      Some(path) => {
        warn!("流程已挂起，会话令牌: {}", path.display());
        println!("\n已挂起。浏览器保持打开，登录后使用 --resume 继续（令牌 {}）。", path.display());
      }
      None => {
        warn!("流程已挂起，但未配置会话令牌，无法恢复");
        println!("\n已挂起。未配置 --session-token，无法自动恢复。");
      }
    }
  }

  fn send_otp(&mut self, report: &mut AutomationReport) {
    let Some(phone) = self.phone.clone() else {
      return;
    };

    match phone_chain().fill_first(&mut self.browser, &phone) {
      Some(descriptor) => report.phone = FieldOutcome::Filled(descriptor.to_string()),
      None => {
        warn!("未找到手机号输入框");
        println!("无法自动填写手机号，请在页面中手动输入。");
        report.phone = FieldOutcome::NotFound;
        return;
      }
    }

    // 找不到发送按钮时静默跳过，操作员可以手动点击
    if let Some(descriptor) = send_otp_chain().click_first(&mut self.browser) {
      info!("已点击发送验证码 ({})", descriptor);
      println!("已发送验证码。");
      report.otp_sent = true;
    } else {
      debug!("未找到发送验证码按钮");
    }
  }

  fn fill_address(&mut self, address: &str) -> FieldOutcome {
    if let Some(descriptor) = address_chain().fill_first(&mut self.browser, address) {
      println!("已填写 {} -> {}", descriptor, address);
      return FieldOutcome::Filled(descriptor.to_string());
    }
    if let Some(descriptor) = generic_address_chain().fill_first(&mut self.browser, address) {
      println!("已将通用输入框 {} 填写为地址", descriptor);
      return FieldOutcome::Filled(descriptor.to_string());
    }
    warn!("未找到地址输入框");
    FieldOutcome::NotFound
  }

  fn fill_coordinates(&mut self, lat: &str, lon: &str) -> FieldOutcome {
    let args = vec![Value::from(lat), Value::from(lon)];
    match self.browser.execute(COORDINATE_SCRIPT, args) {
      Ok(found) => {
        let flags: Vec<bool> = found
          .as_array()
          .map(|a| a.iter().map(|v| v.as_bool().unwrap_or(false)).collect())
          .unwrap_or_default();
        println!("已设置页面中存在的经纬度字段。");
        if flags.iter().any(|f| *f) {
          FieldOutcome::Filled("input[name*=lat], input[name*=lon]".to_string())
        } else {
          FieldOutcome::NotFound
        }
      }
      Err(e) => {
        warn!("设置经纬度失败: {}", e);
        FieldOutcome::Failed(e.to_string())
      }
    }
  }

  fn fill_description(&mut self, message: &str) -> FieldOutcome {
    match description_chain().fill_first(&mut self.browser, message) {
      Some(descriptor) => {
        println!("已填写 {} -> {}", descriptor, message);
        FieldOutcome::Filled(descriptor.to_string())
      }
      None => {
        warn!("未找到描述输入框");
        println!("警告：未找到问题描述输入框，请手动粘贴。");
        FieldOutcome::NotFound
      }
    }
  }

  fn attach_images(&mut self, images: &[PathBuf]) -> AttachmentOutcome {
    let chain = file_input_chain();
    let Some((_, element)) = chain.first_match(&mut self.browser) else {
      println!("表单中没有文件上传控件，请手动上传图片。");
      return AttachmentOutcome::NoFileInput;
    };

    if images.is_empty() {
      println!("没有可上传的图片（文件缺失）。");
      return AttachmentOutcome::NoValidImages;
    }

    match self.browser.attach_files(&element, images) {
      Ok(()) => {
        println!("已上传 {} 张图片。", images.len());
        AttachmentOutcome::Attached(images.len())
      }
      Err(e) => {
        warn!("上传图片失败: {}", e);
        AttachmentOutcome::Failed(e.to_string())
      }
    }
  }
}
