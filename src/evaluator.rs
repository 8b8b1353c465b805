// 该文件是 Artos 项目的一部分。
// src/evaluator.rs - 评估会话
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{path::Path, sync::Arc};

use tracing::{debug, info, warn};

use crate::{
  bbox::BoundingBox,
  catalog::ModelList,
  detector::{DEFAULT_LIMIT, Detection, Detector},
  ffi::{ArtosError, Backend, LibArtos, ProgressFn, c_path, c_string, check, query_buffer},
  input::Sample,
  learner::Learner,
  model::Mixture,
  session::{CancelWatch, Outcome, SessionError, flat_boxes, outcome},
};

mod metrics;
pub use metrics::{
  CSV_DELIMITER, MetricsError, ModelResults, PointMetrics, Summary, TestResult, at_threshold_zero,
  average_precision, interpolated_curve, max_fmeasure, read_csv, read_csv_from, summarize,
  write_csv, write_csv_to,
};

/// 默认的阈值刻度数
pub const DEFAULT_GRANULARITY: u32 = 100;
/// 判定真阳性的默认最小重叠率
pub const DEFAULT_EQ_OVERLAP: f64 = 0.5;

/// 评估会话。内部持有一个检测器，并记录注册模型的名称，
/// 按模型取结果时以此为准而不是试探越界。
pub struct Evaluator<B: Backend = LibArtos> {
  detector: Detector<B>,
  model_names: Vec<String>,
  evaluated: bool,
}

impl<B: Backend> Evaluator<B> {
  /// 参数同 [`Detector::new`]，`overlap` 只用于非极大值抑制
  pub fn new(backend: Arc<B>, overlap: f64, interval: i32, debug: bool) -> Result<Self, SessionError> {
    Ok(Evaluator {
      detector: Detector::new(backend, overlap, interval, debug)?,
      model_names: Vec::new(),
      evaluated: false,
    })
  }

  pub fn model_names(&self) -> &[String] {
    &self.model_names
  }

  pub fn num_models(&self) -> usize {
    self.model_names.len()
  }

  pub fn is_alive(&self) -> bool {
    self.detector.is_alive()
  }

  /// 在评估前先试跑检测
  pub fn detect(&self, sample: &Sample) -> Result<Vec<Detection>, SessionError> {
    self.detector.detect(sample, DEFAULT_LIMIT)
  }

  pub fn add_model(
    &mut self,
    classname: &str,
    model_file: impl AsRef<Path>,
    threshold: f64,
    synset_id: Option<&str>,
  ) -> Result<(), SessionError> {
    self
      .detector
      .add_model(classname, model_file, threshold, synset_id)?;
    self.model_names.push(classname.to_string());
    Ok(())
  }

  pub fn add_mixture(
    &mut self,
    classname: &str,
    mixture: &Mixture,
    threshold: f64,
    synset_id: Option<&str>,
  ) -> Result<(), SessionError> {
    self
      .detector
      .add_mixture(classname, mixture, threshold, synset_id)?;
    self.model_names.push(classname.to_string());
    Ok(())
  }

  pub fn add_model_from_learner(
    &mut self,
    classname: &str,
    learner: &Learner<B>,
    threshold: f64,
    synset_id: Option<&str>,
  ) -> Result<(), SessionError> {
    self
      .detector
      .add_model_from_learner(classname, learner, threshold, synset_id)?;
    self.model_names.push(classname.to_string());
    Ok(())
  }

  /// 读取模型列表文件并逐个注册未禁用的条目。
  /// 与库自身的批量读取一致，无法加载的模型被跳过，模型名只记录成功注册的条目。
  pub fn add_models(&mut self, list_file: impl AsRef<Path>) -> Result<usize, SessionError> {
    let list_file = list_file.as_ref();
    if !list_file.is_file() {
      return Err(SessionError::Artos(ArtosError::InvalidModelListFile));
    }
    let list = ModelList::load(list_file).map_err(|e| {
      debug!("无法解析模型列表 {}: {}", list_file.display(), e);
      SessionError::Artos(ArtosError::InvalidModelListFile)
    })?;
    let mut added = 0;
    for (index, entry) in list.entries().iter().enumerate() {
      if entry.disabled {
        continue;
      }
      let path = list
        .model_path(index)
        .map_err(|e| SessionError::InvalidArgument(e.to_string()))?;
      match self.add_model(&entry.classname, &path, entry.threshold, entry.synset_id.as_deref()) {
        Ok(()) => added += 1,
        Err(SessionError::Artos(e)) => warn!("跳过模型 {} ({}): {}", entry.classname, path.display(), e),
        Err(e) => return Err(e),
      }
    }
    info!("从 {} 添加了 {} 个模型", list_file.display(), added);
    Ok(added)
  }

  pub fn add_model_list(&mut self, list: &ModelList) -> Result<usize, SessionError> {
    let mut added = 0;
    for (index, entry) in list.entries().iter().enumerate() {
      if entry.disabled {
        continue;
      }
      let path = list
        .model_path(index)
        .map_err(|e| SessionError::InvalidArgument(e.to_string()))?;
      self.add_model(
        &entry.classname,
        path,
        entry.threshold,
        entry.synset_id.as_deref(),
      )?;
      added += 1;
    }
    Ok(added)
  }

  /// 从图像仓库添加同义词集的全部正样本，另从其他同义词集抽取 `num_negative` 个负样本
  pub fn add_samples_from_synset(
    &mut self,
    repo_directory: impl AsRef<Path>,
    synset_id: &str,
    num_negative: u32,
  ) -> Result<(), SessionError> {
    let handle = self.detector.raw_handle()?;
    let repo_directory = repo_directory.as_ref();
    check(self.detector.backend().evaluator_add_samples_from_synset(
      handle,
      &c_path(repo_directory)?,
      &c_string(synset_id)?,
      num_negative,
    ))?;
    info!(
      "从 {} 添加同义词集 {} 的评估样本 ({} 个负样本)",
      repo_directory.display(),
      synset_id,
      num_negative
    );
    Ok(())
  }

  /// 添加正样本，`boxes` 为空时整幅图像视为目标
  pub fn add_positive(&mut self, sample: &Sample, boxes: &[BoundingBox]) -> Result<(), SessionError> {
    let handle = self.detector.raw_handle()?;
    let flat = flat_boxes(boxes)?;
    let backend = self.detector.backend();
    let code = match sample {
      Sample::JpegFile(path) => backend.evaluator_add_positive_file_jpeg(handle, &c_path(path)?, &flat),
      Sample::Raw(pixels) => backend.evaluator_add_positive_raw(handle, pixels.as_raw(), &flat),
    };
    check(code)?;
    debug!("添加评估正样本 {} ({} 个边界框)", sample.describe(), boxes.len());
    Ok(())
  }

  /// 以 ImageNet 格式的标注文件给出边界框，图像必须是文件
  pub fn add_positive_annotated(
    &mut self,
    image_file: impl AsRef<Path>,
    annotation_file: impl AsRef<Path>,
  ) -> Result<(), SessionError> {
    let handle = self.detector.raw_handle()?;
    let image_file = image_file.as_ref();
    let annotation_file = annotation_file.as_ref();
    check(self.detector.backend().evaluator_add_positive_file(
      handle,
      &c_path(image_file)?,
      &c_path(annotation_file)?,
    ))?;
    debug!(
      "添加评估正样本 {} (标注 {})",
      image_file.display(),
      annotation_file.display()
    );
    Ok(())
  }

  pub fn add_negative(&mut self, sample: &Sample) -> Result<(), SessionError> {
    let handle = self.detector.raw_handle()?;
    let backend = self.detector.backend();
    let code = match sample {
      Sample::JpegFile(path) => backend.evaluator_add_negative_file_jpeg(handle, &c_path(path)?),
      Sample::Raw(pixels) => backend.evaluator_add_negative_raw(handle, pixels.as_raw()),
    };
    check(code)?;
    debug!("添加评估负样本 {}", sample.describe());
    Ok(())
  }

  /// 在所有样本上运行检测器，统计 `granularity` 个阈值下的结果。
  /// `eq_overlap` 用于区分真假阳性，与构造时的非极大值抑制重叠率无关。
  pub fn run(
    &mut self,
    granularity: u32,
    eq_overlap: f64,
    progress: Option<&mut ProgressFn<'_>>,
  ) -> Result<Outcome, SessionError> {
    if granularity == 0 {
      return Err(SessionError::InvalidArgument("阈值刻度数必须为正".into()));
    }
    if !(eq_overlap > 0.0 && eq_overlap <= 1.0) {
      return Err(SessionError::InvalidArgument(format!(
        "重叠率必须位于 (0, 1]: {}",
        eq_overlap
      )));
    }
    let handle = self.detector.raw_handle()?;
    let mut watch = CancelWatch::new(progress);
    let with_cb = watch.is_set();
    let mut forward = |c: u32, t: u32| watch.call(c, t);
    let code = self.detector.backend().evaluator_run(
      handle,
      granularity,
      eq_overlap,
      if with_cb { Some(&mut forward) } else { None },
    );
    let result = outcome("评估", code, watch.cancelled())?;
    self.evaluated = result == Outcome::Completed;
    if self.evaluated {
      info!(
        "评估完成: {} 个模型, {} 个阈值",
        self.model_names.len(),
        granularity
      );
    }
    Ok(result)
  }

  pub fn is_evaluated(&self) -> bool {
    self.evaluated
  }

  fn model_index(&self, index: usize) -> Result<u32, SessionError> {
    if index >= self.model_names.len() {
      return Err(ArtosError::IndexOutOfBounds.into());
    }
    Ok(index as u32)
  }

  /// 某个模型的原始结果，按阈值升序
  pub fn raw_results(&self, index: usize) -> Result<Vec<TestResult>, SessionError> {
    let mi = self.model_index(index)?;
    let handle = self.detector.raw_handle()?;
    let backend = self.detector.backend();
    let raw = query_buffer(|buf, count| backend.evaluator_get_raw_results(handle, buf, count, mi))?;
    let mut results: Vec<TestResult> = raw.iter().map(TestResult::from).collect();
    results.sort_by(|a, b| a.threshold.total_cmp(&b.threshold));
    Ok(results)
  }

  /// 每个注册模型一组结果
  pub fn all_raw_results(&self) -> Result<Vec<ModelResults>, SessionError> {
    (0..self.model_names.len())
      .map(|i| {
        Ok(ModelResults {
          model: self.model_names[i].clone(),
          results: self.raw_results(i)?,
        })
      })
      .collect()
  }

  /// 由原始结果计算的汇总指标
  pub fn summaries(&self) -> Result<Vec<(String, Summary)>, SessionError> {
    Ok(
      self
        .all_raw_results()?
        .into_iter()
        .map(|m| {
          let summary = summarize(&m.results);
          (m.model, summary)
        })
        .collect(),
    )
  }

  /// 库计算的平均精确率
  pub fn average_precision(&self, index: usize) -> Result<f32, SessionError> {
    let mi = self.model_index(index)?;
    let handle = self.detector.raw_handle()?;
    let mut ap = 0.0;
    check(self.detector.backend().evaluator_get_ap(handle, &mut ap, mi))?;
    Ok(ap)
  }

  /// 库计算的最大 F 值及对应阈值
  pub fn max_fmeasure(&self, index: usize) -> Result<(f32, f32), SessionError> {
    let mi = self.model_index(index)?;
    let handle = self.detector.raw_handle()?;
    let (mut f, mut threshold) = (0.0, 0.0);
    check(
      self
        .detector
        .backend()
        .evaluator_get_max_fmeasure(handle, &mut f, &mut threshold, mi),
    )?;
    Ok((f, threshold))
  }

  pub fn fmeasure_at(&self, threshold: f32, index: usize) -> Result<f32, SessionError> {
    let mi = self.model_index(index)?;
    let handle = self.detector.raw_handle()?;
    let mut f = 0.0;
    check(
      self
        .detector
        .backend()
        .evaluator_get_fmeasure_at(handle, threshold, &mut f, mi),
    )?;
    Ok(f)
  }

  /// 由库写出结果
  pub fn dump_results(&self, dump_file: impl AsRef<Path>) -> Result<(), SessionError> {
    let handle = self.detector.raw_handle()?;
    let dump_file = dump_file.as_ref();
    check(
      self
        .detector
        .backend()
        .evaluator_dump_results(handle, &c_path(dump_file)?),
    )?;
    info!("评估结果已写入 {}", dump_file.display());
    Ok(())
  }

  /// 以带模型名的格式导出全部结果
  pub fn export_csv(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
    let models = self.all_raw_results()?;
    write_csv(path, &models).map_err(|e| match e {
      MetricsError::Io(e) => SessionError::Io(e),
      e => SessionError::InvalidArgument(e.to_string()),
    })
  }

  pub fn destroy(&mut self) {
    self.detector.destroy();
    self.evaluated = false;
  }
}
