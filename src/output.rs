// 该文件是 Artos 项目的一部分。
// src/output.rs - 检测结果输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detector::Detection;

#[cfg(feature = "save_image_file")]
mod draw;
#[cfg(feature = "save_image_file")]
pub use self::draw::{Draw, DrawError};

#[cfg(feature = "save_image_file")]
mod directory_record;
#[cfg(feature = "save_image_file")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[derive(Error, Debug)]
pub enum RecordError {
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  Json(#[from] serde_json::Error),
}

/// 一幅图像的检测记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
  pub image: String,
  pub width: u32,
  pub height: u32,
  /// RFC 3339 格式的生成时间
  pub created: String,
  pub detections: Vec<Detection>,
}

impl DetectionRecord {
  pub fn new(image: impl Into<String>, width: u32, height: u32, detections: Vec<Detection>) -> Self {
    DetectionRecord {
      image: image.into(),
      width,
      height,
      created: Utc::now().to_rfc3339(),
      detections,
    }
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RecordError> {
    let text = serde_json::to_string_pretty(self)?;
    std::fs::write(path, text + "\n")?;
    Ok(())
  }

  pub fn load(path: impl AsRef<Path>) -> Result<Self, RecordError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
  }
}
