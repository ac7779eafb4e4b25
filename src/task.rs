// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/task.rs - 批量检测任务
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

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  config::{FailurePolicy, PipelineConfig},
  detector::{Detector, DetectorError},
  input::{FrameSampler, ImageFileInput, InputError, VideoDecoder},
  media::{MediaError, MediaKind, UploadFile, UploadUnit},
  model::Model,
  output::{OutputError, ResultDirectory},
};

#[derive(Error, Debug)]
pub enum BatchError {
  #[error("保存上传文件失败: {0}")]
  MediaError(#[from] MediaError),
  #[error("读取输入失败: {0}")]
  InputError(#[from] InputError),
  #[error("检测失败: {0}")]
  DetectorError(#[from] DetectorError),
  #[error("保存结果失败: {0}")]
  OutputError(#[from] OutputError),
  #[error("写入临时帧失败: {0}")]
  ScratchFrameError(#[from] image::ImageError),
  #[error("图片无法解码: {0}")]
  EmptyImage(String),
}

/// 隔离模式下记录的失败单元
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UnitFailure {
  pub filename: String,
  pub reason: String,
}

/// 一批文件的汇总结果，输出按文件顺序、帧顺序排列
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchAggregate {
  pub total_count: u64,
  pub outputs: Vec<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub failures: Vec<UnitFailure>,
}

#[derive(Debug, Default)]
struct UnitOutcome {
  count: u64,
  outputs: Vec<String>,
}

pub struct BatchTask<M: Model> {
  config: PipelineConfig,
  detector: Detector<M>,
  decoder: Box<dyn VideoDecoder>,
  results: ResultDirectory,
}

impl<M: Model> BatchTask<M> {
  pub fn new(
    config: PipelineConfig,
    detector: Detector<M>,
    decoder: Box<dyn VideoDecoder>,
  ) -> Self {
    let results = ResultDirectory::new(config.results_dir.clone());
    Self {
      config,
      detector,
      decoder,
      results,
    }
  }

  pub fn results(&self) -> &ResultDirectory {
    &self.results
  }

  /// 依次处理每个提交的文件。`None` 与空文件名的条目直接跳过。
  pub fn run<I>(&mut self, files: I) -> Result<BatchAggregate, BatchError>
  where
    I: IntoIterator<Item = Option<UploadFile>>,
  {
    info!("开始批量检测...");
    let now = std::time::Instant::now();
    let mut aggregate = BatchAggregate::default();

    for file in files.into_iter().flatten() {
      if file.is_blank() {
        debug!("跳过空条目");
        continue;
      }

      match self.process(&file) {
        Ok(outcome) => {
          aggregate.total_count += outcome.count;
          aggregate.outputs.extend(outcome.outputs);
        }
        Err(e) => match self.config.failure_policy {
          FailurePolicy::Abort => {
            error!("处理 {} 失败，终止本批: {}", file.filename, e);
            return Err(e);
          }
          FailurePolicy::Isolate => {
            warn!("处理 {} 失败，跳过: {}", file.filename, e);
            aggregate.failures.push(UnitFailure {
              filename: file.filename.clone(),
              reason: e.to_string(),
            });
          }
        },
      }
    }

    info!(
      "批量检测完成，共 {} 个坑洼，{} 张结果图，耗时: {:.2?}",
      aggregate.total_count,
      aggregate.outputs.len(),
      now.elapsed()
    );
    Ok(aggregate)
  }

  fn process(&mut self, file: &UploadFile) -> Result<UnitOutcome, BatchError> {
    let unit = UploadUnit::persist(file, &self.config)?;
    info!("处理文件 {} ({:?})", file.filename, unit.kind);

    match unit.kind {
      MediaKind::Video => self.process_video(&unit),
      MediaKind::Image => self.process_image(&unit),
    }
  }

  fn process_video(&mut self, unit: &UploadUnit) -> Result<UnitOutcome, BatchError> {
    let frames = self.decoder.open(&unit.path)?;
    let scratch = self.config.scratch_frame_path();
    let mut outcome = UnitOutcome::default();

    for frame in FrameSampler::new(frames, self.config.sampling_stride) {
      let frame = frame?;
      frame.image.save(&scratch)?;

      let result = self.detector.detect(&frame.image)?;
      debug!("第 {} 帧检测到 {} 个坑洼", frame.position, result.count());
      outcome.count += result.count();
      outcome.outputs.push(self.results.save_frame_result(&result.annotated)?);
    }

    info!("视频 {} 采样 {} 帧", unit.id, outcome.outputs.len());
    Ok(outcome)
  }

  fn process_image(&mut self, unit: &UploadUnit) -> Result<UnitOutcome, BatchError> {
    let image = ImageFileInput::open(&unit.path)?
      .into_image()
      .ok_or_else(|| BatchError::EmptyImage(unit.path.display().to_string()))?;

    let result = self.detector.detect(&image)?;
    let name = self.results.save_image_result(&unit.id, &result.annotated)?;
    Ok(UnitOutcome {
      count: result.count(),
      outputs: vec![name],
    })
  }
}
