// 该文件是 Artos 项目的一部分。
// src/bin/batch.rs - 批量检测目录中的图像
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use artos::{
  FromUrl,
  catalog::ModelList,
  detector::{DEFAULT_LIMIT, Detector},
  ffi::LibArtos,
  input::{ImageFileSample, Sample},
  output::DirectoryRecordOutput,
};

/// 对目录中的每幅图像运行检测，写出标注图像与 JSON 记录
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图像目录
  #[arg(long, value_name = "DIR")]
  pub input: PathBuf,
  /// 输出位置，例如 folder:///tmp/out?always
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 模型列表文件
  #[arg(long, value_name = "FILE")]
  pub list: PathBuf,
  /// libartos 动态库路径
  #[arg(long, value_name = "FILE")]
  pub library: Option<PathBuf>,
  /// 非极大值抑制的最小重叠率
  #[arg(long, default_value = "0.5", value_name = "RATIO")]
  pub overlap: f64,
  /// 每个八度的金字塔层数
  #[arg(long, default_value = "10", value_name = "LEVELS")]
  pub interval: i32,
}

fn is_image(path: &Path) -> bool {
  path.is_file() && image::ImageFormat::from_path(path).is_ok()
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入目录: {}", args.input.display());
  info!("输出路径: {}", args.output);
  info!("模型列表: {}", args.list.display());

  let backend = Arc::new(LibArtos::load(args.library.as_deref())?);
  let mut detector = Detector::new(backend, args.overlap, args.interval, false)?;
  let list = ModelList::load(&args.list)?;
  let added = detector.add_model_list(&list)?;
  info!("已添加 {} 个模型", added);
  let output = DirectoryRecordOutput::from_url(&args.output)?;

  let mut files = std::fs::read_dir(&args.input)
    .with_context(|| format!("无法读取目录 {}", args.input.display()))?
    .filter_map(|e| e.ok().map(|e| e.path()))
    .filter(|p| is_image(p))
    .collect::<Vec<_>>();
  files.sort();
  info!("共 {} 幅图像", files.len());

  let now = std::time::Instant::now();
  let (mut written, mut total_detections) = (0usize, 0usize);
  for path in &files {
    let pixels = match ImageFileSample::open(path, false) {
      Ok(sample) => sample.into_pixels(),
      Err(e) => {
        warn!("跳过 {}: {}", path.display(), e);
        continue;
      }
    };
    let image = pixels.to_rgb_image();
    let detections = detector.detect(&Sample::from(pixels), DEFAULT_LIMIT)?;
    info!("{}: 检测到 {} 个目标", path.display(), detections.len());
    total_detections += detections.len();
    if output.save(path, &image, &detections)?.is_some() {
      written += 1;
    }
  }

  info!("处理完成，耗时: {:.2?}", now.elapsed());
  info!("总检测数: {}", total_detections);
  info!("写出 {} 幅图像到 {}", written, output.directory().display());
  Ok(())
}
