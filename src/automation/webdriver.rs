// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/automation/webdriver.rs - W3C WebDriver 客户端
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

//! # WebDriver 浏览器
//!
//! 通过阻塞 HTTP 调用 chromedriver / geckodriver 暴露的 W3C WebDriver 接口。
//! 会话由驱动进程持有，客户端退出后浏览器保持打开，
//! 因此可以凭会话 id 重新连接并继续流程。
//!
//! 使用前先启动驱动，例如：
//! ```bash
//! chromedriver --port=9515
//! ```

use std::{path::PathBuf, time::Duration};

use reqwest::{Method, blocking::Client};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::{
  automation::browser::{Browser, BrowserError, ElementHandle, Locator},
  config::AutomationConfig,
};

/// W3C 规定的元素引用键
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const NO_SUCH_ELEMENT: &str = "no such element";
const HTTP_TIMEOUT_MARGIN: Duration = Duration::from_secs(30);

pub struct WebDriverBrowser {
  client: Client,
  endpoint: String,
  session_id: String,
  closed: bool,
}

impl WebDriverBrowser {
  fn client(config: &AutomationConfig) -> Result<Client, BrowserError> {
    Ok(
      Client::builder()
        .timeout(config.navigation_timeout() + HTTP_TIMEOUT_MARGIN)
        .build()?,
    )
  }

  /// 新建浏览器会话并设置窗口大小与页面加载超时
  pub fn launch(config: &AutomationConfig) -> Result<Self, BrowserError> {
    let client = Self::client(config)?;
    let endpoint = config.webdriver_url.trim_end_matches('/').to_string();

    let mut args = vec![format!(
      "--window-size={},{}",
      config.window_width, config.window_height
    )];
    let mut firefox_args = Vec::new();
    if config.headless {
      args.push("--headless=new".to_string());
      firefox_args.push("-headless".to_string());
    }
    let capabilities = json!({
      "capabilities": {
        "alwaysMatch": {
          "goog:chromeOptions": { "args": args },
          "moz:firefoxOptions": { "args": firefox_args },
        }
      }
    });

    let value = send(&client, Method::POST, &format!("{}/session", endpoint), Some(capabilities))?;
    let session_id = value
      .get("sessionId")
      .and_then(Value::as_str)
      .ok_or_else(|| BrowserError::MalformedResponse(format!("缺少 sessionId: {}", value)))?
      .to_string();
    info!("WebDriver 会话已创建: {}", session_id);

    let browser = Self {
      client,
      endpoint,
      session_id,
      closed: false,
    };
    browser.command(
      Method::POST,
      "window/rect",
      Some(json!({ "width": config.window_width, "height": config.window_height })),
    )?;
    browser.command(
      Method::POST,
      "timeouts",
      Some(json!({
        "pageLoad": config.navigation_timeout().as_millis() as u64,
        "implicit": 0,
      })),
    )?;
    Ok(browser)
  }

  /// 连接到已存在的会话，会话失效时返回错误
  pub fn attach(config: &AutomationConfig, session_id: &str) -> Result<Self, BrowserError> {
    let browser = Self {
      client: Self::client(config)?,
      endpoint: config.webdriver_url.trim_end_matches('/').to_string(),
      session_id: session_id.to_string(),
      closed: false,
    };
    let url = browser.command(Method::GET, "url", None)?;
    info!("已重新连接 WebDriver 会话 {}，当前页面 {}", session_id, url);
    Ok(browser)
  }

  fn session_url(&self, path: &str) -> String {
    if path.is_empty() {
      format!("{}/session/{}", self.endpoint, self.session_id)
    } else {
      format!("{}/session/{}/{}", self.endpoint, self.session_id, path)
    }
  }

  fn command(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
  ) -> Result<Value, BrowserError> {
    if self.closed {
      return Err(BrowserError::Closed);
    }
    send(&self.client, method, &self.session_url(path), body)
  }

  fn element_command(
    &self,
    element: &ElementHandle,
    action: &str,
    body: Value,
  ) -> Result<Value, BrowserError> {
    self.command(
      Method::POST,
      &format!("element/{}/{}", element.0, action),
      Some(body),
    )
  }
}

impl Browser for WebDriverBrowser {
  fn session_id(&self) -> &str {
    &self.session_id
  }

  fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
    info!("打开页面: {}", url);
    self.command(Method::POST, "url", Some(json!({ "url": url })))?;
    Ok(())
  }

  fn find(&mut self, locator: &Locator) -> Result<Option<ElementHandle>, BrowserError> {
    let body = json!({ "using": locator.strategy(), "value": locator.value() });
    match self.command(Method::POST, "element", Some(body)) {
      Ok(value) => element_from(&value).map(Some),
      Err(BrowserError::WebDriverError { error, .. }) if error == NO_SUCH_ELEMENT => Ok(None),
      Err(e) => Err(e),
    }
  }

  fn fill(&mut self, element: &ElementHandle, text: &str) -> Result<(), BrowserError> {
    self.element_command(element, "clear", json!({}))?;
    self.element_command(element, "value", json!({ "text": text }))?;
    Ok(())
  }

  fn click(&mut self, element: &ElementHandle) -> Result<(), BrowserError> {
    self.element_command(element, "click", json!({}))?;
    Ok(())
  }

  fn execute(&mut self, script: &str, args: Vec<Value>) -> Result<Value, BrowserError> {
    self.command(
      Method::POST,
      "execute/sync",
      Some(json!({ "script": script, "args": args })),
    )
  }

  fn attach_files(
    &mut self,
    element: &ElementHandle,
    files: &[PathBuf],
  ) -> Result<(), BrowserError> {
    // 多个文件以换行分隔一次发送
    let text = files
      .iter()
      .map(|path| path.display().to_string())
      .collect::<Vec<_>>()
      .join("\n");
    self.element_command(element, "value", json!({ "text": text }))?;
    Ok(())
  }

  fn close(&mut self) -> Result<(), BrowserError> {
    if self.closed {
      return Ok(());
    }
    self.command(Method::DELETE, "", None)?;
    self.closed = true;
    info!("浏览器会话已关闭");
    Ok(())
  }
}

fn send(
  client: &Client,
  method: Method,
  url: &str,
  body: Option<Value>,
) -> Result<Value, BrowserError> {
  debug!("WebDriver {} {}", method, url);
  let mut request = client.request(method, url);
  if let Some(body) = body {
    request = request.json(&body);
  }

  let response = request.send()?;
  let status = response.status();
  let payload: Value = response.json()?;
  let value = payload.get("value").cloned().unwrap_or(Value::Null);

  if !status.is_success() {
    return Err(error_from(&value, status.as_u16()));
  }
  Ok(value)
}

fn error_from(value: &Value, status: u16) -> BrowserError {
  let error = value
    .get("error")
    .and_then(Value::as_str)
    .map(str::to_string)
    .unwrap_or_else(|| format!("HTTP {}", status));
  let message = value
    .get("message")
    .and_then(Value::as_str)
    .unwrap_or_default()
    .to_string();
  if error != NO_SUCH_ELEMENT {
    warn!("WebDriver 返回错误 {}: {}", error, message);
  }
  BrowserError::WebDriverError { error, message }
}

fn element_from(value: &Value) -> Result<ElementHandle, BrowserError> {
  value
    .get(ELEMENT_KEY)
    .and_then(Value::as_str)
    .map(|id| ElementHandle(id.to_string()))
    .ok_or_else(|| BrowserError::MalformedResponse(format!("缺少元素引用: {}", value)))
}
