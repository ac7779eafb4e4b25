// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/automation/browser.rs - 浏览器抽象
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

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
  #[error("HTTP 请求失败: {0}")]
  HttpError(#[from] reqwest::Error),
  #[error("WebDriver 错误 {error}: {message}")]
  WebDriverError { error: String, message: String },
  #[error("WebDriver 响应格式错误: {0}")]
  MalformedResponse(String),
  #[error("元素不可交互: {0}")]
  NotInteractable(String),
  #[error("浏览器会话已关闭")]
  Closed,
}

/// 元素定位方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
  Css(String),
  XPath(String),
}

impl Locator {
  pub fn css(selector: impl Into<String>) -> Self {
    Locator::Css(selector.into())
  }

  pub fn xpath(expression: impl Into<String>) -> Self {
    Locator::XPath(expression.into())
  }

  /// W3C WebDriver 的定位策略名
  pub fn strategy(&self) -> &'static str {
    match self {
      Locator::Css(_) => "css selector",
      Locator::XPath(_) => "xpath",
    }
  }

  pub fn value(&self) -> &str {
    match self {
      Locator::Css(value) | Locator::XPath(value) => value,
    }
  }
}

/// 页面上的元素引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle(pub String);

/// 自动化流程所需的浏览器操作
pub trait Browser {
  /// 当前会话标识，用于挂起后重新连接
  fn session_id(&self) -> &str;

  fn goto(&mut self, url: &str) -> Result<(), BrowserError>;

  /// 查找第一个匹配的元素，不存在时返回 `Ok(None)`
  fn find(&mut self, locator: &Locator) -> Result<Option<ElementHandle>, BrowserError>;

  /// 清空后输入文本
  fn fill(&mut self, element: &ElementHandle, text: &str) -> Result<(), BrowserError>;

  fn click(&mut self, element: &ElementHandle) -> Result<(), BrowserError>;

  fn execute(&mut self, script: &str, args: Vec<Value>) -> Result<Value, BrowserError>;

  /// 一次性设置文件输入框的所有文件
  fn attach_files(
    &mut self,
    element: &ElementHandle,
    files: &[PathBuf],
  ) -> Result<(), BrowserError>;

  fn close(&mut self) -> Result<(), BrowserError>;
}

impl<B: Browser + ?Sized> Browser for Box<B> {
  fn session_id(&self) -> &str {
    (**self).session_id()
  }

  fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
    (**self).goto(url)
  }

  fn find(&mut self, locator: &Locator) -> Result<Option<ElementHandle>, BrowserError> {
    (**self).find(locator)
  }

  fn fill(&mut self, element: &ElementHandle, text: &str) -> Result<(), BrowserError> {
    (**self).fill(element, text)
  }

  fn click(&mut self, element: &ElementHandle) -> Result<(), BrowserError> {
    (**self).click(element)
  }

  fn execute(&mut self, script: &str, args: Vec<Value>) -> Result<Value, BrowserError> {
    (**self).execute(script, args)
  }

  fn attach_files(
    &mut self,
    element: &ElementHandle,
    files: &[PathBuf],
  ) -> Result<(), BrowserError> {
    (**self).attach_files(element, files)
  }

  fn close(&mut self) -> Result<(), BrowserError> {
    (**self).close()
  }
}
