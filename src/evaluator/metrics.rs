// 该文件是 Artos 项目的一部分。
// src/evaluator/metrics.rs - 由原始评估结果计算的指标与 CSV 读写
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  fs::File,
  io::{BufRead, BufReader, BufWriter, Write},
  path::Path,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::ffi::RawTestResult;

pub const CSV_DELIMITER: &str = ";";

#[derive(Error, Debug)]
pub enum MetricsError {
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("CSV 内容为空")]
  Empty,
  #[error("CSV 表头缺少字段 {0}")]
  MissingColumn(&'static str),
  #[error("CSV 第 {line} 行无效: {message}")]
  Row { line: usize, message: String },
}

/// 某个阈值下的检测统计
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
  pub threshold: f64,
  /// 真阳性
  pub tp: u32,
  /// 假阳性
  pub fp: u32,
  /// 标注的目标总数
  pub np: u32,
}

impl TestResult {
  /// 没有任何检测时为 1
  pub fn precision(&self) -> f64 {
    let detected = self.tp as u64 + self.fp as u64;
    if detected == 0 {
      1.0
    } else {
      self.tp as f64 / detected as f64
    }
  }

  pub fn recall(&self) -> f64 {
    if self.np == 0 {
      0.0
    } else {
      self.tp as f64 / self.np as f64
    }
  }

  /// F1 值，等价于 `2tp / (tp + fp + np)`
  pub fn fmeasure(&self) -> f64 {
    let denom = self.tp as u64 + self.fp as u64 + self.np as u64;
    if denom == 0 {
      0.0
    } else {
      2.0 * self.tp as f64 / denom as f64
    }
  }
}

impl From<&RawTestResult> for TestResult {
  fn from(raw: &RawTestResult) -> Self {
    TestResult {
      threshold: raw.threshold,
      tp: raw.tp,
      fp: raw.fp,
      np: raw.np,
    }
  }
}

/// 精确率、召回率与 F 值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointMetrics {
  pub threshold: f64,
  pub precision: f64,
  pub recall: f64,
  pub fmeasure: f64,
}

impl From<&TestResult> for PointMetrics {
  fn from(r: &TestResult) -> Self {
    PointMetrics {
      threshold: r.threshold,
      precision: r.precision(),
      recall: r.recall(),
      fmeasure: r.fmeasure(),
    }
  }
}

/// 一个模型的汇总指标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
  pub average_precision: f64,
  /// 最大 F 值及其阈值，所有 F 值均为 0 时为 `None`
  pub max_fmeasure: Option<(f64, f64)>,
  /// 第一个不小于 0 的阈值处的指标
  pub at_zero: Option<PointMetrics>,
}

fn ascending(results: &[TestResult]) -> Vec<TestResult> {
  let mut sorted = results.to_vec();
  sorted.sort_by(|a, b| a.threshold.total_cmp(&b.threshold));
  sorted
}

/// 插值后的 (召回率, 精确率) 序列。
///
/// 按阈值升序遍历，精确率取到目前为止的最大值；召回率与上一个点相同时
/// 只更新上一个点的精确率。
pub fn interpolated_curve(results: &[TestResult]) -> Vec<(f64, f64)> {
  let mut curve: Vec<(f64, f64)> = Vec::new();
  let mut max_precision = 0.0f64;
  for r in ascending(results) {
    max_precision = max_precision.max(r.precision());
    let recall = r.recall();
    match curve.last_mut() {
      Some(last) if last.0 == recall => last.1 = max_precision,
      _ => curve.push((recall, max_precision)),
    }
  }
  curve
}

/// 对插值曲线积分
pub fn average_precision(results: &[TestResult]) -> f64 {
  let curve = interpolated_curve(results);
  let Some(&(last_recall, last_precision)) = curve.last() else {
    return 0.0;
  };
  let mut ap = last_recall * last_precision;
  for pair in curve.windows(2) {
    ap += (pair[0].0 - pair[1].0) * pair[1].1;
  }
  ap
}

/// 最大 F 值与对应阈值。相同时取阈值较小者。
pub fn max_fmeasure(results: &[TestResult]) -> Option<(f64, f64)> {
  let mut best: Option<(f64, f64)> = None;
  for r in ascending(results) {
    let f = r.fmeasure();
    if f > best.map_or(0.0, |b| b.0) {
      best = Some((f, r.threshold));
    }
  }
  best
}

pub fn at_threshold_zero(results: &[TestResult]) -> Option<PointMetrics> {
  ascending(results)
    .iter()
    .find(|r| r.threshold >= 0.0)
    .map(PointMetrics::from)
}

pub fn summarize(results: &[TestResult]) -> Summary {
  Summary {
    average_precision: average_precision(results),
    max_fmeasure: max_fmeasure(results),
    at_zero: at_threshold_zero(results),
  }
}

/// 按模型分组的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResults {
  pub model: String,
  pub results: Vec<TestResult>,
}

/// 写出 CSV。仅在多于一个模型时加入 `Model` 列。
pub fn write_csv_to(mut out: impl Write, models: &[ModelResults]) -> Result<(), MetricsError> {
  let with_model = models.len() > 1;
  let mut header = Vec::with_capacity(8);
  if with_model {
    header.push("Model");
  }
  header.extend(["Threshold", "TP", "FP", "NP", "Precision", "Recall", "F-Measure"]);
  writeln!(out, "{}", header.join(CSV_DELIMITER))?;

  for m in models {
    for r in &m.results {
      if with_model {
        write!(out, "{}{}", m.model, CSV_DELIMITER)?;
      }
      writeln!(
        out,
        "{threshold}{d}{tp}{d}{fp}{d}{np}{d}{p:.6}{d}{r:.6}{d}{f:.6}",
        threshold = r.threshold,
        tp = r.tp,
        fp = r.fp,
        np = r.np,
        p = r.precision(),
        r = r.recall(),
        f = r.fmeasure(),
        d = CSV_DELIMITER,
      )?;
    }
  }
  out.flush()?;
  Ok(())
}

pub fn write_csv(path: impl AsRef<Path>, models: &[ModelResults]) -> Result<(), MetricsError> {
  let path = path.as_ref();
  write_csv_to(BufWriter::new(File::create(path)?), models)?;
  info!("评估结果已导出到 {}", path.display());
  Ok(())
}

/// 读回 CSV。表头不区分大小写；没有 `Model` 列时所有行归入 `default_model`。
pub fn read_csv_from(input: impl BufRead, default_model: &str) -> Result<Vec<ModelResults>, MetricsError> {
  let mut lines = input.lines().enumerate();
  let header = loop {
    match lines.next() {
      Some((_, line)) => {
        let line = line?;
        if !line.trim().is_empty() {
          break line;
        }
      }
      None => return Err(MetricsError::Empty),
    }
  };
  let columns: Vec<String> = header
    .split(CSV_DELIMITER)
    .map(|c| c.trim().to_lowercase())
    .collect();
  let find = |name: &'static str| {
    columns
      .iter()
      .position(|c| c == name)
      .ok_or(MetricsError::MissingColumn(name))
  };
  let model_col = columns.iter().position(|c| c == "model");
  let th_col = find("threshold")?;
  let tp_col = find("tp")?;
  let fp_col = find("fp")?;
  let np_col = find("np")?;

  let mut models: Vec<ModelResults> = Vec::new();
  for (index, line) in lines {
    let line = line?;
    if line.trim().is_empty() {
      continue;
    }
    let lineno = index + 1;
    let fields: Vec<&str> = line.split(CSV_DELIMITER).map(str::trim).collect();
    let field = |col: usize| {
      fields.get(col).copied().ok_or_else(|| MetricsError::Row {
        line: lineno,
        message: format!("缺少第 {} 列", col + 1),
      })
    };
    let count = |col: usize| -> Result<u32, MetricsError> {
      let text = field(col)?;
      text.parse().map_err(|_| MetricsError::Row {
        line: lineno,
        message: format!("不是非负整数: {:?}", text),
      })
    };
    let th_text = field(th_col)?;
    let result = TestResult {
      threshold: th_text.parse().map_err(|_| MetricsError::Row {
        line: lineno,
        message: format!("阈值无效: {:?}", th_text),
      })?,
      tp: count(tp_col)?,
      fp: count(fp_col)?,
      np: count(np_col)?,
    };
    let model = match model_col {
      Some(col) => field(col)?,
      None => default_model,
    };
    match models.iter_mut().find(|m| m.model == model) {
      Some(m) => m.results.push(result),
      None => models.push(ModelResults {
        model: model.to_string(),
        results: vec![result],
      }),
    }
  }
  Ok(models)
}

/// 从文件读取，没有 `Model` 列时以文件名（不含扩展名）作为模型名
pub fn read_csv(path: impl AsRef<Path>) -> Result<Vec<ModelResults>, MetricsError> {
  let path = path.as_ref();
  let name = path
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_default();
  let models = read_csv_from(BufReader::new(File::open(path)?), &name)?;
  info!("从 {} 读取了 {} 个模型的评估结果", path.display(), models.len());
  Ok(models)
}
