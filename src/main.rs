// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;

use kengwa::{
  FromUrl,
  config::{Config, FailurePolicy, PipelineConfig},
  detector::Detector,
  input::default_video_decoder,
  location::{LocationResolver, LocationResult, NominatimGeocoder},
  media::UploadFile,
  model::ModelWrapper,
  output::draw::Draw,
  payload::{PayloadStager, StageReceipt, StageRequest},
  task::{BatchAggregate, BatchTask},
};

use args::{Args, Command, DetectArgs, StageArgs};

#[derive(Serialize)]
struct DetectSummary {
  potholes: u64,
  #[serde(flatten)]
  batch: BatchAggregate,
  #[serde(flatten)]
  location: LocationResult,
  #[serde(skip_serializing_if = "Option::is_none")]
  payload: Option<StageReceipt>,
}

fn load_config(args: &Args) -> Result<Config> {
  let mut config = Config::load_or_default(args.config.as_deref())?;
  if let Some(base) = &args.base_dir {
    let layout = PipelineConfig::with_base_dir(base);
    config.pipeline.upload_dir = layout.upload_dir;
    config.pipeline.results_dir = layout.results_dir;
    config.pipeline.payload_path = layout.payload_path;
  }
  Ok(config)
}

fn today() -> String {
  chrono::Local::now().format("%Y-%m-%d").to_string()
}

fn detect(mut config: PipelineConfig, args: DetectArgs) -> Result<()> {
  if let Some(confidence) = args.confidence {
    config.confidence = confidence;
  }
  if let Some(stride) = args.stride {
    config.sampling_stride = stride;
  }
  if args.isolate {
    config.failure_policy = FailurePolicy::Isolate;
  }
  config.validate()?;
  config.ensure_dirs()?;

  info!("模型地址: {}", args.model);
  info!("上传目录: {}", config.upload_dir.display());
  info!("结果目录: {}", config.results_dir.display());
  info!("置信度阈值: {}，采样步长: {}", config.confidence, config.sampling_stride);

  let model = ModelWrapper::from_url(&args.model).context("无法加载模型")?;
  let draw = Draw::from_font_path(config.label_font.as_deref())?;
  let detector = Detector::new(model, config.confidence, draw);

  let files = args
    .files
    .iter()
    .map(|path| UploadFile::from_path(path).with_context(|| format!("无法读取 {}", path.display())))
    .collect::<Result<Vec<_>>>()?;

  let mut task = BatchTask::new(config.clone(), detector, default_video_decoder());
  let batch = task.run(files.into_iter().map(Some))?;

  let geocoder = NominatimGeocoder::new(&config.geocoder)?;
  let location = LocationResolver::from_config(geocoder, &config)
    .resolve(args.lat.as_deref(), args.lon.as_deref());

  let payload = if args.stage {
    let request = StageRequest {
      potholes: Some(batch.total_count),
      address: Some(location.address.clone()),
      lat: Some(location.lat.clone()),
      lon: Some(location.lon.clone()),
      message: args.message,
      date: Some(args.date.unwrap_or_else(today)),
      all_images: batch.outputs.clone(),
    };
    Some(PayloadStager::new(&config)?.stage(&request)?)
  } else {
    None
  };

  let summary = DetectSummary {
    potholes: batch.total_count,
    batch,
    location,
    payload,
  };
  println!("{}", serde_json::to_string_pretty(&summary)?);
  Ok(())
}

fn stage(config: PipelineConfig, args: StageArgs) -> Result<()> {
  let request = StageRequest {
    potholes: args.potholes,
    address: args.address,
    lat: args.lat,
    lon: args.lon,
    message: args.message,
    date: args.date,
    all_images: args.images,
  };
  let receipt = PayloadStager::new(&config)?.stage(&request)?;
  println!("{}", serde_json::to_string_pretty(&receipt)?);
  Ok(())
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let config = load_config(&args)?;

  match args.command {
    Command::Detect(detect_args) => detect(config.pipeline, detect_args),
    Command::Stage(stage_args) => stage(config.pipeline, stage_args),
  }
}
