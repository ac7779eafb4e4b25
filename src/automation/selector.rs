// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/automation/selector.rs - 有序的选择器候选链
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

use tracing::{debug, info};

use crate::automation::browser::{Browser, BrowserError, ElementHandle, Locator};

#[derive(Debug, Clone)]
pub struct Candidate {
  pub descriptor: &'static str,
  pub locator: Locator,
}

impl Candidate {
  pub fn css(selector: &'static str) -> Self {
    Self {
      descriptor: selector,
      locator: Locator::css(selector),
    }
  }

  pub fn xpath(descriptor: &'static str, expression: &'static str) -> Self {
    Self {
      descriptor,
      locator: Locator::xpath(expression),
    }
  }
}

/// 按顺序尝试的候选选择器，第一个可用的生效
#[derive(Debug, Clone, Default)]
pub struct SelectorChain {
  candidates: Vec<Candidate>,
}

impl SelectorChain {
  pub fn new(candidates: Vec<Candidate>) -> Self {
    Self { candidates }
  }

  pub fn candidates(&self) -> &[Candidate] {
    &self.candidates
  }

  pub fn is_empty(&self) -> bool {
    self.candidates.is_empty()
  }

  /// 返回第一个存在的元素。查找本身出错的候选被跳过。
  pub fn first_match<B: Browser + ?Sized>(
    &self,
    browser: &mut B,
  ) -> Option<(&Candidate, ElementHandle)> {
    for candidate in &self.candidates {
      match browser.find(&candidate.locator) {
        Ok(Some(element)) => return Some((candidate, element)),
        Ok(None) => {}
        Err(e) => debug!("查找 {} 出错: {}", candidate.descriptor, e),
      }
    }
    None
  }

  /// 填写第一个存在且可填写的元素，返回命中的候选描述
  pub fn fill_first<B: Browser + ?Sized>(
    &self,
    browser: &mut B,
    text: &str,
  ) -> Option<&'static str> {
    self.act_first(browser, |browser, element| browser.fill(element, text))
  }

  /// 点击第一个存在且可点击的元素
  pub fn click_first<B: Browser + ?Sized>(&self, browser: &mut B) -> Option<&'static str> {
    self.act_first(browser, |browser, element| browser.click(element))
  }

  fn act_first<B, F>(&self, browser: &mut B, mut action: F) -> Option<&'static str>
  where
    B: Browser + ?Sized,
    F: FnMut(&mut B, &ElementHandle) -> Result<(), BrowserError>,
  {
    for candidate in &self.candidates {
      let element = match browser.find(&candidate.locator) {
        Ok(Some(element)) => element,
        Ok(None) => continue,
        Err(e) => {
          debug!("查找 {} 出错: {}", candidate.descriptor, e);
          continue;
        }
      };

      match action(&mut *browser, &element) {
        Ok(()) => {
          info!("命中选择器 {}", candidate.descriptor);
          return Some(candidate.descriptor);
        }
        Err(e) => debug!("{} 操作失败，尝试下一个: {}", candidate.descriptor, e),
      }
    }
    None
  }
}

/// 登录页的手机号输入框
pub fn phone_chain() -> SelectorChain {
  SelectorChain::new(vec![
    Candidate::css("#mbno"),
    Candidate::css("input[type=\"tel\"]"),
    Candidate::css("input[name*=\"mobile\" i]"),
  ])
}

/// 发送验证码按钮
pub fn send_otp_chain() -> SelectorChain {
  SelectorChain::new(vec![
    Candidate::xpath(
      "text=Send OTP",
      "//*[text()[contains(normalize-space(.), 'Send OTP')]]",
    ),
    Candidate::xpath("text=Send", "//*[text()[contains(normalize-space(.), 'Send')]]"),
    Candidate::xpath(
      "button:has-text(\"Send OTP\")",
      "//button[contains(normalize-space(.), 'Send OTP')]",
    ),
    Candidate::xpath(
      "button:has-text(\"Send\")",
      "//button[contains(normalize-space(.), 'Send')]",
    ),
  ])
}

/// 明确指向地址或位置的输入框
pub fn address_chain() -> SelectorChain {
  SelectorChain::new(vec![
    Candidate::css("input[name*=\"Address\" i]"),
    Candidate::css("input[id*=\"address\" i]"),
    Candidate::css("input[placeholder*=\"Address\" i]"),
    Candidate::css("input[name*=\"location\" i]"),
    Candidate::css("input[id*=\"location\" i]"),
    Candidate::css("input[placeholder*=\"Location\" i]"),
  ])
}

/// 找不到地址框时退而使用第一个文本框
pub fn generic_address_chain() -> SelectorChain {
  SelectorChain::new(vec![
    Candidate::css("input[type=\"text\"]"),
    Candidate::css("textarea"),
  ])
}

pub fn description_chain() -> SelectorChain {
  SelectorChain::new(vec![
    Candidate::css("textarea[name*=\"Grievance\" i]"),
    Candidate::css("textarea[name*=\"Description\" i]"),
    Candidate::css("textarea[name*=\"details\" i]"),
    Candidate::css("textarea"),
    Candidate::css("input[name*=\"description\" i]"),
  ])
}

pub fn file_input_chain() -> SelectorChain {
  SelectorChain::new(vec![Candidate::css("input[type=\"file\"]")])
}

/// 按名称或 id 匹配的纬度、经度输入框，在页面中以脚本赋值
pub const COORDINATE_SCRIPT: &str = "\
const la = document.querySelector('input[name*=lat], input[id*=lat]');
const lo = document.querySelector('input[name*=lon], input[id*=lon]');
if (la) { la.value = arguments[0]; }
if (lo) { lo.value = arguments[1]; }
return [!!la, !!lo];";
