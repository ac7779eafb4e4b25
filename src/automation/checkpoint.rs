// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/automation/checkpoint.rs - 人工确认检查点
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

use std::{
  io::{BufRead, Write},
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Receiver, Sender},
  },
  thread,
};

use thiserror::Error;
use tracing::{info, warn};

use crate::automation::AutomationState;

#[derive(Error, Debug)]
pub enum CheckpointError {
  #[error("无法设置 Ctrl-C 处理器: {0}")]
  SignalHandlerError(#[from] ctrlc::Error),
  #[error("输入通道已断开")]
  Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
  /// 操作员已完成人工步骤
  Continue,
  /// 操作员中断等待
  Cancel,
}

/// 等待操作员完成人工步骤（输入验证码、点击提交）
pub trait Checkpoint {
  fn wait(
    &mut self,
    state: AutomationState,
    prompt: &str,
  ) -> Result<Acknowledgement, CheckpointError>;

  /// 两个检查点之间是否收到了中断请求，读取后清除
  fn interrupted(&mut self) -> bool {
    false
  }
}

impl<C: Checkpoint + ?Sized> Checkpoint for Box<C> {
  fn wait(
    &mut self,
    state: AutomationState,
    prompt: &str,
  ) -> Result<Acknowledgement, CheckpointError> {
    (**self).wait(state, prompt)
  }

  fn interrupted(&mut self) -> bool {
    (**self).interrupted()
  }
}

#[derive(Debug)]
enum ConsoleEvent {
  Line,
  Eof,
  Interrupt,
}

/// 终端检查点：回车继续，Ctrl-C 或标准输入关闭视为取消。
///
/// 检查点之外收到的 Ctrl-C 由 [`Checkpoint::interrupted`] 报告；
/// 上一次中断还未被处理时再按 Ctrl-C，进程直接退出。
pub struct ConsoleCheckpoint {
  tx: Sender<ConsoleEvent>,
  rx: Receiver<ConsoleEvent>,
  /// 已发送但尚未被处理的中断
  pending_interrupt: Arc<AtomicBool>,
  reader_started: bool,
  /// 标准输入关闭后不会再有输入，之后的检查点立即取消
  eof_seen: bool,
}

impl ConsoleCheckpoint {
  /// 注册 Ctrl-C 处理器，每个进程只能创建一次
  pub fn new() -> Result<Self, CheckpointError> {
    let (tx, rx) = mpsc::channel();
    let pending_interrupt = Arc::new(AtomicBool::new(false));

    let interrupt = tx.clone();
    let pending = pending_interrupt.clone();
    ctrlc::set_handler(move || {
      if pending.swap(true, Ordering::SeqCst) {
        eprintln!("\n再次收到中断信号，立即退出。");
        std::process::exit(130);
      }
      info!("收到中断信号");
      let _ = interrupt.send(ConsoleEvent::Interrupt);
    })?;

    Ok(Self::with_channel(tx, rx, pending_interrupt))
  }

  fn with_channel(
    tx: Sender<ConsoleEvent>,
    rx: Receiver<ConsoleEvent>,
    pending_interrupt: Arc<AtomicBool>,
  ) -> Self {
    Self {
      tx,
      rx,
      pending_interrupt,
      reader_started: false,
      eof_seen: false,
    }
  }

  /// 标准输入由一个常驻线程读取，避免多次等待时线程互相争抢
  fn ensure_reader(&mut self) {
    if self.reader_started {
      return;
    }
    self.reader_started = true;

    let tx = self.tx.clone();
    thread::spawn(move || {
      let stdin = std::io::stdin();
      let mut line = String::new();
      loop {
        line.clear();
        let event = match stdin.lock().read_line(&mut line) {
          Ok(0) | Err(_) => ConsoleEvent::Eof,
          Ok(_) => ConsoleEvent::Line,
        };
        let eof = matches!(event, ConsoleEvent::Eof);
        if tx.send(event).is_err() || eof {
          break;
        }
      }
    });
  }

  /// 取出已到达的事件：丢弃残留的输入行，记住标准输入已关闭，返回期间是否有中断
  fn drain(&mut self) -> bool {
    let mut interrupted = false;
    while let Ok(event) = self.rx.try_recv() {
      match event {
        ConsoleEvent::Line => {}
        ConsoleEvent::Eof => self.eof_seen = true,
        ConsoleEvent::Interrupt => interrupted = true,
      }
    }
    if interrupted {
      self.pending_interrupt.store(false, Ordering::SeqCst);
    }
    interrupted
  }
}

impl Checkpoint for ConsoleCheckpoint {
  fn wait(
    &mut self,
    state: AutomationState,
    prompt: &str,
  ) -> Result<Acknowledgement, CheckpointError> {
    if self.drain() {
      warn!("进入检查点 {:?} 前已收到中断", state);
      return Ok(Acknowledgement::Cancel);
    }
    if self.eof_seen {
      warn!("标准输入已关闭，检查点 {:?} 视为取消", state);
      return Ok(Acknowledgement::Cancel);
    }
    self.ensure_reader();

    println!("\n{}", prompt);
    print!("> ");
    let _ = std::io::stdout().flush();

    match self.rx.recv().map_err(|_| CheckpointError::Disconnected)? {
      ConsoleEvent::Line => {
        info!("检查点 {:?} 已确认", state);
        Ok(Acknowledgement::Continue)
      }
      ConsoleEvent::Interrupt => {
        self.pending_interrupt.store(false, Ordering::SeqCst);
        warn!("检查点 {:?} 被中断", state);
        Ok(Acknowledgement::Cancel)
      }
      ConsoleEvent::Eof => {
        self.eof_seen = true;
        warn!("标准输入已关闭，检查点 {:?} 视为取消", state);
        Ok(Acknowledgement::Cancel)
      }
    }
  }

  fn interrupted(&mut self) -> bool {
    self.drain()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  /// 不读标准输入、不注册信号处理器的检查点，事件由测试直接发送
  fn detached() -> (ConsoleCheckpoint, Sender<ConsoleEvent>, Arc<AtomicBool>) {
    let (tx, rx) = mpsc::channel();
    let pending = Arc::new(AtomicBool::new(false));
    let mut checkpoint = ConsoleCheckpoint::with_channel(tx.clone(), rx, pending.clone());
    checkpoint.reader_started = true;
    (checkpoint, tx, pending)
  }

  #[test]
  fn closed_stdin_cancels_every_later_checkpoint() {
    let (mut checkpoint, tx, _) = detached();
    tx.send(ConsoleEvent::Line).unwrap();
    tx.send(ConsoleEvent::Eof).unwrap();

    // 残留的输入行被丢弃，关闭状态保留
    let first = checkpoint.wait(AutomationState::AwaitManualLogin, "login").unwrap();
    assert_eq!(first, Acknowledgement::Cancel);
    let second = checkpoint.wait(AutomationState::AwaitManualSubmit, "submit").unwrap();
    assert_eq!(second, Acknowledgement::Cancel);
  }

  #[test]
  fn eof_during_wait_is_remembered() {
    let (mut checkpoint, tx, _) = detached();
    let sender = thread::spawn(move || {
      thread::sleep(Duration::from_millis(50));
      tx.send(ConsoleEvent::Line).unwrap();
      thread::sleep(Duration::from_millis(50));
      tx.send(ConsoleEvent::Eof).unwrap();
    });

    let first = checkpoint.wait(AutomationState::AwaitManualLogin, "login").unwrap();
    assert_eq!(first, Acknowledgement::Continue);
    sender.join().unwrap();

    let second = checkpoint.wait(AutomationState::AwaitManualSubmit, "submit").unwrap();
    assert_eq!(second, Acknowledgement::Cancel);
  }

  #[test]
  fn interrupt_between_checkpoints_is_reported_once() {
    let (mut checkpoint, tx, pending) = detached();
    assert!(!checkpoint.interrupted());

    pending.store(true, Ordering::SeqCst);
    tx.send(ConsoleEvent::Line).unwrap();
    tx.send(ConsoleEvent::Interrupt).unwrap();

    assert!(checkpoint.interrupted());
    assert!(!pending.load(Ordering::SeqCst));
    assert!(!checkpoint.interrupted());
  }

  #[test]
  fn interrupt_before_wait_cancels() {
    let (mut checkpoint, tx, _) = detached();
    tx.send(ConsoleEvent::Interrupt).unwrap();
    let ack = checkpoint.wait(AutomationState::AwaitManualLogin, "login").unwrap();
    assert_eq!(ack, Acknowledgement::Cancel);
  }
}
