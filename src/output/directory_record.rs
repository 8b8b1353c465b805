// 该文件是 Artos 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  detector::Detection,
  input::{InputError, url_path},
  output::{DetectionRecord, Draw, DrawError, RecordError},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("记录错误: {0}")]
  Record(#[from] RecordError),
  #[error("字体错误: {0}")]
  Draw(#[from] DrawError),
  #[error("输出目录无效: {0}")]
  InvalidPath(#[from] InputError),
}

/// 每幅图像写出一张标注后的 PNG 与一个同名 JSON 记录
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Draw,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

/// `folder:///out?always&font=/usr/share/fonts/x.ttf`
impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }
    let always = uri.query_pairs().any(|(k, _)| k == "always");
    let draw = match uri.query_pairs().find(|(k, _)| k == "font") {
      Some((_, font)) => Draw::with_font_file(font.into_owned())?,
      None => Draw::default(),
    };
    Ok(DirectoryRecordOutput::new(url_path(uri)?, draw).with_always(always))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>, draw: Draw) -> Self {
    DirectoryRecordOutput {
      directory: directory.into(),
      draw,
      always: false,
    }
  }

  /// 没有检测结果时也写出
  pub fn with_always(mut self, always: bool) -> Self {
    self.always = always;
    self
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  /// 以源图像的文件名为输出命名
  pub fn output_paths(&self, source: &Path) -> (PathBuf, PathBuf) {
    let stem = source
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| "image".into());
    (
      self.directory.join(format!("{}.png", stem)),
      self.directory.join(format!("{}.json", stem)),
    )
  }

  /// 返回写出的图像与记录路径；没有检测结果且未设置 `always` 时不写出
  pub fn save(
    &self,
    source: &Path,
    image: &RgbImage,
    detections: &[Detection],
  ) -> Result<Option<(PathBuf, PathBuf)>, DirectoryRecordOutputError> {
    if !self.always && detections.is_empty() {
      debug!("{}: 没有检测结果，跳过", source.display());
      return Ok(None);
    }
    std::fs::create_dir_all(&self.directory)?;
    let (image_path, record_path) = self.output_paths(source);

    let mut annotated = image.clone();
    self.draw.draw_detections(&mut annotated, detections);
    annotated.save(&image_path)?;

    DetectionRecord::new(
      source.to_string_lossy(),
      image.width(),
      image.height(),
      detections.to_vec(),
    )
    .save(&record_path)?;
    debug!("写出 {} 与 {}", image_path.display(), record_path.display());
    Ok(Some((image_path, record_path)))
  }
}
