// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/input/sampler.rs - 视频帧采样
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

use tracing::trace;

/// 每 `stride` 帧取一帧：第 K、2K、3K… 帧（从 1 计数）。
///
/// 其余帧照常解码后丢弃，`F` 帧的视频共产生 `⌊F/K⌋` 帧。解码错误原样传出。
pub struct FrameSampler<I> {
  inner: I,
  stride: u64,
  decoded: u64,
}

impl<I> FrameSampler<I> {
  pub fn new(inner: I, stride: u64) -> Self {
    Self {
      inner,
      stride: stride.max(1),
      decoded: 0,
    }
  }

  /// 已解码（包括被丢弃）的帧数
  pub fn decoded(&self) -> u64 {
    self.decoded
  }
}

impl<I, T, E> Iterator for FrameSampler<I>
where
  I: Iterator<Item = Result<T, E>>,
{
  type Item = Result<T, E>;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      match self.inner.next()? {
        Ok(frame) => {
          self.decoded += 1;
          if self.decoded % self.stride == 0 {
            trace!("采样第 {} 帧", self.decoded);
            return Some(Ok(frame));
          }
        }
        Err(e) => return Some(Err(e)),
      }
    }
  }
}
