// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/args.rs - 命令行参数
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

use clap::{Args as ClapArgs, Parser, Subcommand};
use url::Url;

/// Kengwa 道路坑洼检测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// JSON 配置文件
  #[arg(long, global = true, value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// 工作目录，派生 uploads/、static/results/ 与 ghmc_payload.json
  #[arg(long, global = true, value_name = "DIR")]
  pub base_dir: Option<PathBuf>,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// 检测一批图片或视频，输出汇总 JSON
  Detect(DetectArgs),
  /// 直接暂存投诉载荷
  Stage(StageArgs),
}

#[derive(ClapArgs, Debug)]
pub struct DetectArgs {
  /// 模型地址，例如 onnx:///models/pothole.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 纬度，缺失时使用默认坐标
  #[arg(long, value_name = "LAT")]
  pub lat: Option<String>,

  /// 经度，缺失时使用默认坐标
  #[arg(long, value_name = "LON")]
  pub lon: Option<String>,

  /// 置信度阈值 (0.0 - 1.0)，覆盖配置文件
  #[arg(long, value_name = "THRESHOLD")]
  pub confidence: Option<f32>,

  /// 视频采样步长，覆盖配置文件
  #[arg(long, value_name = "FRAMES")]
  pub stride: Option<u64>,

  /// 单个文件失败时继续处理其余文件
  #[arg(long)]
  pub isolate: bool,

  /// 检测完成后暂存投诉载荷
  #[arg(long)]
  pub stage: bool,

  /// 投诉描述（配合 --stage）
  #[arg(long, value_name = "TEXT")]
  pub message: Option<String>,

  /// 投诉日期 YYYY-MM-DD（配合 --stage，默认今天）
  #[arg(long, value_name = "DATE")]
  pub date: Option<String>,

  /// 待检测的图片或视频文件
  #[arg(value_name = "FILES", required = true)]
  pub files: Vec<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct StageArgs {
  #[arg(long, value_name = "COUNT")]
  pub potholes: Option<u64>,

  #[arg(long, value_name = "ADDRESS")]
  pub address: Option<String>,

  #[arg(long, value_name = "LAT")]
  pub lat: Option<String>,

  #[arg(long, value_name = "LON")]
  pub lon: Option<String>,

  #[arg(long, value_name = "TEXT")]
  pub message: Option<String>,

  #[arg(long, value_name = "DATE")]
  pub date: Option<String>,

  /// 结果目录下的图片文件名，可重复
  #[arg(long = "image", value_name = "NAME")]
  pub images: Vec<String>,
}
