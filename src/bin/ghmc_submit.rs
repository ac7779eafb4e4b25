// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/bin/ghmc_submit.rs - GHMC 投诉提交助手
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use kengwa::{
  automation::{Automator, Browser, ConsoleCheckpoint, SessionToken, WebDriverBrowser},
  config::Config,
};

/// 打开 GHMC 投诉页面并按载荷预先填写，验证码与提交由人工完成
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 投诉载荷文件，默认使用配置中的路径
  #[arg(long, value_name = "PATH")]
  pub payload: Option<PathBuf>,

  /// 自动填写并发送验证码的手机号
  #[arg(long, value_name = "PHONE")]
  pub phone: Option<String>,

  /// WebDriver 服务地址
  #[arg(long, value_name = "URL")]
  pub webdriver: Option<String>,

  /// 会话令牌文件，挂起时写入，--resume 时读取
  #[arg(long, value_name = "PATH")]
  pub session_token: Option<PathBuf>,

  /// 重新连接挂起的浏览器会话并继续
  #[arg(long, requires = "session_token")]
  pub resume: bool,

  /// JSON 配置文件
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let config = Config::load_or_default(args.config.as_deref())?;
  let mut automation = config.automation;
  if let Some(url) = args.webdriver {
    automation.webdriver_url = url;
  }
  if args.session_token.is_some() {
    automation.session_token = args.session_token.clone();
  }

  let token = match (&automation.session_token, args.resume) {
    (Some(path), true) => Some(SessionToken::load(path)?),
    _ => None,
  };

  let payload_path = args
    .payload
    .or_else(|| token.as_ref().map(|t| t.payload_path.clone()))
    .unwrap_or_else(|| config.pipeline.payload_path.clone());

  // 载荷缺失时不启动浏览器
  if !payload_path.is_file() {
    println!(
      "Payload file not found: {}\nRun the web app and click 'Lodge on GHMC' to create it.",
      payload_path.display()
    );
    std::process::exit(1);
  }

  let browser = match &token {
    Some(token) => {
      if token.webdriver_url != automation.webdriver_url {
        info!("使用令牌中的 WebDriver 地址 {}", token.webdriver_url);
        automation.webdriver_url = token.webdriver_url.clone();
      }
      WebDriverBrowser::attach(&automation, &token.session_id)?
    }
    None => WebDriverBrowser::launch(&automation)?,
  };
  info!("浏览器会话: {}", browser.session_id());

  let checkpoint = ConsoleCheckpoint::new()?;
  let mut automator = Automator::new(browser, checkpoint, automation).with_phone(args.phone);

  let report = match &token {
    Some(token) => automator.resume(&payload_path, token)?,
    None => automator.run(&payload_path)?,
  };

  info!("自动化结束于 {:?}", report.final_state);
  println!("{}", serde_json::to_string_pretty(&report)?);
  Ok(())
}
