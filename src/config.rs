// 该文件是 Artos 项目的一部分。
// src/config.rs - 配置文件
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  detector::DEFAULT_LIMIT,
  evaluator::{DEFAULT_EQ_OVERLAP, DEFAULT_GRANULARITY},
  learner::{LearnOptions, ThresholdOptimization},
};

/// 工作目录中的默认配置文件
pub const CONFIG_FILE: &str = "artos.json";

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("无法读写配置文件 {path}: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("配置文件 {path} 格式错误: {source}")]
  Json {
    path: PathBuf,
    source: serde_json::Error,
  },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
  /// 非极大值抑制的最小重叠率
  pub overlap: f64,
  /// 每个八度的金字塔层数
  pub interval: i32,
  pub limit: usize,
}

impl Default for DetectorSettings {
  fn default() -> Self {
    DetectorSettings {
      overlap: 0.5,
      interval: 10,
      limit: DEFAULT_LIMIT,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerSettings {
  pub max_aspect_clusters: u32,
  pub max_who_clusters: u32,
  pub th_opt_num_positive: u32,
  pub th_opt_num_negative: u32,
  pub loocv: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub background_file: Option<PathBuf>,
}

impl Default for LearnerSettings {
  fn default() -> Self {
    LearnerSettings {
      max_aspect_clusters: 2,
      max_who_clusters: 3,
      th_opt_num_positive: 0,
      th_opt_num_negative: 0,
      loocv: true,
      background_file: None,
    }
  }
}

impl LearnerSettings {
  pub fn learn_options(&self, add: bool) -> LearnOptions {
    LearnOptions {
      add,
      max_aspect_clusters: self.max_aspect_clusters,
      max_who_clusters: self.max_who_clusters,
      th_opt_num_positive: self.th_opt_num_positive,
      th_opt_num_negative: self.th_opt_num_negative,
      th_opt: if self.loocv {
        ThresholdOptimization::Loocv
      } else {
        ThresholdOptimization::Overlapping
      },
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorSettings {
  pub granularity: u32,
  pub eq_overlap: f64,
}

impl Default for EvaluatorSettings {
  fn default() -> Self {
    EvaluatorSettings {
      granularity: DEFAULT_GRANULARITY,
      eq_overlap: DEFAULT_EQ_OVERLAP,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtosConfig {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub library_path: Option<PathBuf>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub model_dir: Option<PathBuf>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub repository_directory: Option<PathBuf>,
  pub debug: bool,
  pub detector: DetectorSettings,
  pub learner: LearnerSettings,
  pub evaluator: EvaluatorSettings,
}

impl ArtosConfig {
  /// 文件不存在时返回默认配置
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let text = match std::fs::read_to_string(path) {
      Ok(text) => text,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        debug!("配置文件 {} 不存在，使用默认配置", path.display());
        return Ok(ArtosConfig::default());
      }
      Err(source) => {
        return Err(ConfigError::Io {
          path: path.to_path_buf(),
          source,
        });
      }
    };
    let config = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
      path: path.to_path_buf(),
      source,
    })?;
    info!("读取配置文件 {}", path.display());
    Ok(config)
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let text = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
      path: path.to_path_buf(),
      source,
    })?;
    std::fs::write(path, text + "\n").map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    info!("配置已写入 {}", path.display());
    Ok(())
  }

  /// 配置中的模型目录，未设置时搜索默认位置
  pub fn model_dir(&self) -> Option<PathBuf> {
    self.model_dir.clone().or_else(find_model_dir)
  }
}

/// 依次查找工作目录下的 `models` 与上一级的 `models`
pub fn find_model_dir() -> Option<PathBuf> {
  find_model_dir_in(Path::new("."))
}

fn find_model_dir_in(base: &Path) -> Option<PathBuf> {
  [base.join("models"), base.join("..").join("models")]
    .into_iter()
    .find(|p| p.is_dir())
    .map(|p| p.canonicalize().unwrap_or(p))
}
