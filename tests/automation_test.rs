//! 提交自动化测试
//!
//! 用记录调用的假浏览器和脚本化的检查点驱动整个状态机

use std::{
  collections::{HashMap, HashSet, VecDeque},
  path::{Path, PathBuf},
};

use serde_json::{Value, json};
use tempfile::tempdir;

use kengwa::{
  automation::{
    Acknowledgement, AttachmentOutcome, AutomationError, AutomationState, Automator, Browser,
    BrowserError, Checkpoint, CheckpointError, ElementHandle, FieldOutcome, Locator, SessionToken,
  },
  config::AutomationConfig,
};

const OTP_URL: &str = "https://grievance.test/send_otp";
const GRIEVANCE_URL: &str = "https://grievance.test/entry";

/// 只认识预先登记的选择器的浏览器
#[derive(Default)]
struct FakeBrowser {
  elements: HashMap<String, ElementHandle>,
  broken: HashSet<String>,
  script_result: Value,
  /// 打开该地址时报错
  unreachable: Option<String>,
  calls: Vec<String>,
  attached: Vec<PathBuf>,
  closed: bool,
}

impl FakeBrowser {
  fn with(selectors: &[&str]) -> Self {
    let mut browser = FakeBrowser {
      script_result: json!([true, true]),
      ..Default::default()
    };
    for selector in selectors {
      browser
        .elements
        .insert(selector.to_string(), ElementHandle(format!("el:{}", selector)));
    }
    browser
  }

  /// 填写该元素时报错
  fn broken(mut self, selector: &str) -> Self {
    self.broken.insert(format!("el:{}", selector));
    self
  }

  fn called(&self, prefix: &str) -> Vec<&str> {
    self
      .calls
      .iter()
      .filter(|c| c.starts_with(prefix))
      .map(String::as_str)
      .collect()
  }
}

impl Browser for FakeBrowser {
  fn session_id(&self) -> &str {
    "fake-session"
  }

  fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
    self.calls.push(format!("goto {}", url));
    if self.unreachable.as_deref() == Some(url) {
      return Err(BrowserError::WebDriverError {
        error: "unknown error".to_string(),
        message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
      });
    }
    Ok(())
  }

  fn find(&mut self, locator: &Locator) -> Result<Option<ElementHandle>, BrowserError> {
    Ok(self.elements.get(locator.value()).cloned())
  }

  fn fill(&mut self, element: &ElementHandle, text: &str) -> Result<(), BrowserError> {
    if self.broken.contains(&element.0) {
      return Err(BrowserError::NotInteractable(element.0.clone()));
    }
    self.calls.push(format!("fill {} {}", element.0, text));
    Ok(())
  }

  fn click(&mut self, element: &ElementHandle) -> Result<(), BrowserError> {
    self.calls.push(format!("click {}", element.0));
    Ok(())
  }

  fn execute(&mut self, _script: &str, args: Vec<Value>) -> Result<Value, BrowserError> {
    self.calls.push(format!("execute {:?}", args));
    Ok(self.script_result.clone())
  }

  fn attach_files(
    &mut self,
    element: &ElementHandle,
    files: &[PathBuf],
  ) -> Result<(), BrowserError> {
    self
      .calls
      .push(format!("attach {} {}", element.0, files.len()));
    self.attached.extend_from_slice(files);
    Ok(())
  }

  fn close(&mut self) -> Result<(), BrowserError> {
    self.closed = true;
    Ok(())
  }
}

/// 按顺序给出预设回答
#[derive(Default)]
struct ScriptedCheckpoint {
  answers: VecDeque<Acknowledgement>,
  /// 第 N 次查询中断时报告 Ctrl-C（从 0 计数）
  interrupt_on: Option<usize>,
  interrupt_queries: usize,
  /// 操作员登录期间被删除的文件
  remove_on_wait: Option<PathBuf>,
}

impl ScriptedCheckpoint {
  fn new(answers: &[Acknowledgement]) -> Self {
    Self {
      answers: answers.iter().copied().collect(),
      ..Default::default()
    }
  }
}

impl Checkpoint for ScriptedCheckpoint {
  fn wait(
    &mut self,
    _state: AutomationState,
    _prompt: &str,
  ) -> Result<Acknowledgement, CheckpointError> {
    if let Some(path) = self.remove_on_wait.take() {
      std::fs::remove_file(path).unwrap();
    }
    self.answers.pop_front().ok_or(CheckpointError::Disconnected)
  }

  fn interrupted(&mut self) -> bool {
    let query = self.interrupt_queries;
    self.interrupt_queries += 1;
    self.interrupt_on == Some(query)
  }
}

fn config(token: Option<PathBuf>) -> AutomationConfig {
  AutomationConfig {
    otp_url: OTP_URL.to_string(),
    grievance_url: GRIEVANCE_URL.to_string(),
    settle_delay_ms: 0,
    session_token: token,
    ..Default::default()
  }
}

fn write_payload(dir: &Path, images: &[PathBuf]) -> PathBuf {
  let path = dir.join("ghmc_payload.json");
  let payload = json!({
    "potholes": 3,
    "address": "Road No. 12, Banjara Hills, Hyderabad",
    "lat": "17.4126",
    "lon": "78.4392",
    "message": "Large pothole near the junction",
    "date": "2026-10-16",
    "images": images,
  });
  std::fs::write(&path, serde_json::to_string_pretty(&payload).unwrap()).unwrap();
  path
}

const FULL_FORM: &[&str] = &[
  "#mbno",
  "//*[text()[contains(normalize-space(.), 'Send OTP')]]",
  "input[name*=\"Address\" i]",
  "textarea[name*=\"Grievance\" i]",
  "input[type=\"file\"]",
];

/// 完整流程：登录后填写所有字段并上传存在的图片
#[test]
fn test_full_run_prefills_form() {
  let dir = tempdir().expect("Failed to create temp dir");
  let image = dir.path().join("r_abc.jpg");
  std::fs::write(&image, b"jpeg").unwrap();
  let payload = write_payload(dir.path(), &[image]);

  let checkpoint = ScriptedCheckpoint::new(&[Acknowledgement::Continue, Acknowledgement::Continue]);
  let mut automator = Automator::new(FakeBrowser::with(FULL_FORM), checkpoint, config(None))
    .with_phone(Some("9876543210".to_string()));

  let report = automator.run(&payload).expect("自动化失败");
  assert_eq!(report.final_state, AutomationState::End);
  assert!(report.missing_images.is_empty());
  assert_eq!(report.phone, FieldOutcome::Filled("#mbno".to_string()));
  assert!(report.otp_sent);
  assert!(matches!(report.address, FieldOutcome::Filled(_)));
  assert!(matches!(report.coordinates, FieldOutcome::Filled(_)));
  assert!(matches!(report.description, FieldOutcome::Filled(_)));
  assert_eq!(report.attachments, AttachmentOutcome::Attached(1));

  let browser = automator.into_browser();
  assert_eq!(
    browser.called("goto"),
    vec![
      format!("goto {}", OTP_URL).as_str(),
      format!("goto {}", GRIEVANCE_URL).as_str()
    ]
  );
  assert!(browser.calls.contains(&"fill el:#mbno 9876543210".to_string()));
  assert_eq!(browser.called("click").len(), 1);
  assert!(browser.closed);
}

/// 图片缺失只发出警告，登录页仍然先打开
#[test]
fn test_missing_image_is_reported() {
  let dir = tempdir().expect("Failed to create temp dir");
  let payload = write_payload(dir.path(), &[dir.path().join("gone.jpg")]);

  let checkpoint = ScriptedCheckpoint::new(&[Acknowledgement::Continue, Acknowledgement::Continue]);
  let mut automator = Automator::new(FakeBrowser::with(FULL_FORM), checkpoint, config(None));

  let report = automator.run(&payload).expect("自动化失败");
  assert_eq!(report.missing_images.len(), 1);
  assert_eq!(report.attachments, AttachmentOutcome::NoValidImages);
  assert_eq!(report.phone, FieldOutcome::Skipped);
  assert!(!report.otp_sent);

  let browser = automator.into_browser();
  assert_eq!(browser.calls[0], format!("goto {}", OTP_URL));
  assert!(browser.called("attach").is_empty());
}

/// 地址回退到通用输入框，描述框不存在，填写失败的候选被跳过
#[test]
fn test_selector_fallbacks() {
  let dir = tempdir().expect("Failed to create temp dir");
  let payload = write_payload(dir.path(), &[]);

  let browser = FakeBrowser::with(&["input[type=\"tel\"]", "#mbno", "input[type=\"text\"]"])
    .broken("#mbno");
  let checkpoint = ScriptedCheckpoint::new(&[Acknowledgement::Continue, Acknowledgement::Continue]);
  let mut automator = Automator::new(browser, checkpoint, config(None))
    .with_phone(Some(" 9876543210 ".to_string()));

  let report = automator.run(&payload).expect("自动化失败");
  assert_eq!(report.phone, FieldOutcome::Filled("input[type=\"tel\"]".to_string()));
  assert!(!report.otp_sent);
  assert_eq!(report.address, FieldOutcome::Filled("input[type=\"text\"]".to_string()));
  assert_eq!(report.description, FieldOutcome::NotFound);
  assert_eq!(report.attachments, AttachmentOutcome::NoFileInput);
  assert_eq!(report.final_state, AutomationState::End);
}

/// 页面上没有经纬度字段
#[test]
fn test_coordinates_not_present() {
  let dir = tempdir().expect("Failed to create temp dir");
  let payload = write_payload(dir.path(), &[]);

  let mut browser = FakeBrowser::with(FULL_FORM);
  browser.script_result = json!([false, false]);
  let checkpoint = ScriptedCheckpoint::new(&[Acknowledgement::Continue, Acknowledgement::Continue]);
  let mut automator = Automator::new(browser, checkpoint, config(None));

  let report = automator.run(&payload).expect("自动化失败");
  assert_eq!(report.coordinates, FieldOutcome::NotFound);

  let browser = automator.into_browser();
  assert_eq!(
    browser.called("execute"),
    vec!["execute [String(\"17.4126\"), String(\"78.4392\")]"]
  );
}

/// 登录检查点中断后挂起，凭令牌恢复直到结束
#[test]
fn test_suspend_and_resume() {
  let dir = tempdir().expect("Failed to create temp dir");
  let payload = write_payload(dir.path(), &[]);
  let token_path = dir.path().join("session.json");

  let checkpoint = ScriptedCheckpoint::new(&[Acknowledgement::Cancel]);
  let mut automator = Automator::new(
    FakeBrowser::with(FULL_FORM),
    checkpoint,
    config(Some(token_path.clone())),
  );

  let report = automator.run(&payload).expect("自动化失败");
  assert_eq!(report.final_state, AutomationState::Suspended);
  assert_eq!(report.address, FieldOutcome::Skipped);

  let browser = automator.into_browser();
  assert!(!browser.closed);
  assert_eq!(browser.called("goto").len(), 1);

  let token = SessionToken::load(&token_path).expect("令牌未保存");
  assert_eq!(token.session_id, "fake-session");
  assert_eq!(token.resume_at, AutomationState::GrievanceForm);
  assert!(token.payload_path.is_absolute());

  let checkpoint = ScriptedCheckpoint::new(&[Acknowledgement::Continue]);
  let mut automator = Automator::new(
    FakeBrowser::with(FULL_FORM),
    checkpoint,
    config(Some(token_path.clone())),
  );
  let report = automator.resume(&token.payload_path, &token).expect("恢复失败");
  assert_eq!(report.final_state, AutomationState::End);
  assert!(matches!(report.address, FieldOutcome::Filled(_)));
  assert!(!token_path.exists());

  let browser = automator.into_browser();
  assert_eq!(browser.called("goto"), vec![format!("goto {}", GRIEVANCE_URL).as_str()]);
  assert!(browser.closed);
}

/// 最终检查点中断与确认效果相同
#[test]
fn test_cancel_at_submit_still_ends() {
  let dir = tempdir().expect("Failed to create temp dir");
  let payload = write_payload(dir.path(), &[]);

  let checkpoint = ScriptedCheckpoint::new(&[Acknowledgement::Continue, Acknowledgement::Cancel]);
  let mut automator = Automator::new(FakeBrowser::with(FULL_FORM), checkpoint, config(None));

  let report = automator.run(&payload).expect("自动化失败");
  assert_eq!(report.final_state, AutomationState::End);
  assert!(automator.into_browser().closed);
}

/// 载荷缺失时不触碰浏览器
#[test]
fn test_missing_payload() {
  let dir = tempdir().expect("Failed to create temp dir");
  let checkpoint = ScriptedCheckpoint::new(&[]);
  let mut automator = Automator::new(FakeBrowser::with(FULL_FORM), checkpoint, config(None));

  let result = automator.run(&dir.path().join("ghmc_payload.json"));
  assert!(matches!(result, Err(AutomationError::PayloadMissing(_))));
  assert!(automator.into_browser().calls.is_empty());
}

/// 投诉页打不开是致命错误，但浏览器会话必须关闭
#[test]
fn test_navigation_failure_closes_browser() {
  let dir = tempdir().expect("Failed to create temp dir");
  let payload = write_payload(dir.path(), &[]);
  let token_path = dir.path().join("session.json");

  let mut browser = FakeBrowser::with(FULL_FORM);
  browser.unreachable = Some(GRIEVANCE_URL.to_string());
  let checkpoint = ScriptedCheckpoint::new(&[Acknowledgement::Continue]);
  let mut automator = Automator::new(browser, checkpoint, config(Some(token_path.clone())));

  let result = automator.run(&payload);
  assert!(matches!(result, Err(AutomationError::BrowserError(_))));
  assert!(automator.into_browser().closed);
  assert!(!token_path.exists());
}

/// 检查点之外的 Ctrl-C 结束流程并关闭浏览器
#[test]
fn test_interrupt_between_states_ends_run() {
  let dir = tempdir().expect("Failed to create temp dir");
  let payload = write_payload(dir.path(), &[]);

  // 查询顺序：Start、OtpPage、GrievanceForm、FillAddress
  let checkpoint = ScriptedCheckpoint {
    interrupt_on: Some(3),
    ..ScriptedCheckpoint::new(&[Acknowledgement::Continue])
  };
  let mut automator = Automator::new(FakeBrowser::with(FULL_FORM), checkpoint, config(None));

  let report = automator.run(&payload).expect("自动化失败");
  assert!(report.interrupted);
  assert_eq!(report.final_state, AutomationState::End);
  assert_eq!(report.address, FieldOutcome::Skipped);
  assert_eq!(report.attachments, AttachmentOutcome::Skipped);

  let browser = automator.into_browser();
  assert!(browser.called("fill").is_empty());
  assert!(browser.closed);
}

/// 相对路径的图片以绝对路径上传
#[test]
fn test_relative_images_are_attached_as_absolute() {
  let cwd = std::env::current_dir().unwrap();
  let dir = tempfile::tempdir_in(&cwd).expect("Failed to create temp dir");
  let image = dir.path().join("r_rel.jpg");
  std::fs::write(&image, b"jpeg").unwrap();
  let relative = image.strip_prefix(&cwd).unwrap().to_path_buf();
  assert!(relative.is_relative());
  let payload = write_payload(dir.path(), &[relative]);

  let checkpoint = ScriptedCheckpoint::new(&[Acknowledgement::Continue, Acknowledgement::Continue]);
  let mut automator = Automator::new(FakeBrowser::with(FULL_FORM), checkpoint, config(None));

  let report = automator.run(&payload).expect("自动化失败");
  assert_eq!(report.attachments, AttachmentOutcome::Attached(1));
  assert_eq!(automator.into_browser().attached, vec![image]);
}

/// 登录期间被删除的图片不会上传，只警告一次
#[test]
fn test_images_are_rechecked_before_attaching() {
  let dir = tempdir().expect("Failed to create temp dir");
  let image = dir.path().join("r_gone.jpg");
  std::fs::write(&image, b"jpeg").unwrap();
  let payload = write_payload(dir.path(), &[image.clone()]);

  let checkpoint = ScriptedCheckpoint {
    remove_on_wait: Some(image.clone()),
    ..ScriptedCheckpoint::new(&[Acknowledgement::Continue, Acknowledgement::Continue])
  };
  let mut automator = Automator::new(FakeBrowser::with(FULL_FORM), checkpoint, config(None));

  let report = automator.run(&payload).expect("自动化失败");
  assert_eq!(report.missing_images, vec![image]);
  assert_eq!(report.attachments, AttachmentOutcome::NoValidImages);
  assert!(automator.into_browser().called("attach").is_empty());
}
