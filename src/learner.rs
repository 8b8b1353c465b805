// 该文件是 Artos 项目的一部分。
// src/learner.rs - 学习会话
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  ffi::{CString, c_uint},
  path::{Path, PathBuf},
  sync::Arc,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
  bbox::BoundingBox,
  detector::temp_model_path,
  ffi::{
    ArtosError, Backend, FlatBoundingBox, Handle, LearnParams, LibArtos, OverallProgressFn,
    ProgressFn, THOPT_LOOCV, THOPT_NONE, THOPT_OVERLAPPING, c_path, c_string, check,
  },
  input::Sample,
  model::{CodecError, Mixture},
  session::{CancelWatch, NativeHandle, Outcome, SessionError, flat_boxes, outcome},
};

/// 自相关函数的默认最大偏移
pub const DEFAULT_MAX_OFFSET: u32 = 19;

/// 一次性学习时的阈值优化方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdOptimization {
  /// 使用估计的阈值
  None,
  /// 样本同时用于学习与阈值优化
  Overlapping,
  /// 留一交叉验证
  #[default]
  Loocv,
}

impl ThresholdOptimization {
  fn mode(self) -> c_uint {
    match self {
      ThresholdOptimization::None => THOPT_NONE,
      ThresholdOptimization::Overlapping => THOPT_OVERLAPPING,
      ThresholdOptimization::Loocv => THOPT_LOOCV,
    }
  }
}

/// 一次性学习函数的选项
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearnOptions {
  /// 模型文件已存在时追加分量，否则覆盖
  pub add: bool,
  pub max_aspect_clusters: u32,
  pub max_who_clusters: u32,
  /// 0 表示使用全部正样本
  pub th_opt_num_positive: u32,
  pub th_opt_num_negative: u32,
  pub th_opt: ThresholdOptimization,
}

impl Default for LearnOptions {
  fn default() -> Self {
    LearnOptions {
      add: true,
      max_aspect_clusters: 2,
      max_who_clusters: 3,
      th_opt_num_positive: 0,
      th_opt_num_negative: 0,
      th_opt: ThresholdOptimization::Loocv,
    }
  }
}

impl From<&LearnOptions> for LearnParams {
  fn from(o: &LearnOptions) -> Self {
    LearnParams {
      add: o.add,
      max_aspect_clusters: o.max_aspect_clusters,
      max_who_clusters: o.max_who_clusters,
      th_opt_num_positive: o.th_opt_num_positive,
      th_opt_num_negative: o.th_opt_num_negative,
      th_opt_mode: o.th_opt.mode(),
    }
  }
}

fn check_clusters(max_aspect_clusters: u32, max_who_clusters: u32) -> Result<(), SessionError> {
  if max_aspect_clusters == 0 || max_who_clusters == 0 {
    return Err(SessionError::InvalidArgument(format!(
      "聚类数必须为正: {} x {}",
      max_aspect_clusters, max_who_clusters
    )));
  }
  Ok(())
}

fn repo_c_string(repo: Option<&Path>) -> Result<CString, SessionError> {
  match repo {
    Some(dir) => Ok(c_path(dir)?),
    None => Ok(CString::default()),
  }
}

/// 学习会话，独占一个原生学习器句柄
pub struct Learner<B: Backend = LibArtos> {
  handle: NativeHandle<B>,
  samples: usize,
  trained: bool,
  loocv: bool,
}

impl<B: Backend> Learner<B> {
  /// 背景统计文件无效时返回 [`ArtosError::InvalidBackgroundFile`]。
  /// 使用 ImageNet 相关操作时需要给出图像仓库目录。
  pub fn new(
    backend: Arc<B>,
    bg_file: impl AsRef<Path>,
    repo_directory: Option<&Path>,
    loocv: bool,
    debug: bool,
  ) -> Result<Self, SessionError> {
    let bg_file = bg_file.as_ref();
    let raw = backend.create_learner(
      &c_path(bg_file)?,
      &repo_c_string(repo_directory)?,
      loocv,
      debug,
    );
    let handle = NativeHandle::acquire(
      backend,
      "学习器",
      raw,
      B::destroy_learner,
      ArtosError::InvalidBackgroundFile,
    )?;
    debug!("背景统计: {}", bg_file.display());
    Ok(Learner {
      handle,
      samples: 0,
      trained: false,
      loocv,
    })
  }

  pub(crate) fn raw_handle(&self) -> Result<Handle, SessionError> {
    self.handle.get()
  }

  /// 成功调用添加样本的次数
  pub fn num_sample_calls(&self) -> usize {
    self.samples
  }

  pub fn is_trained(&self) -> bool {
    self.trained
  }

  pub fn uses_loocv(&self) -> bool {
    self.loocv
  }

  pub fn is_alive(&self) -> bool {
    self.handle.is_alive()
  }

  /// 添加正样本。`boxes` 为空时整幅图像作为目标。
  pub fn add_positive_sample(
    &mut self,
    sample: &Sample,
    boxes: &[BoundingBox],
  ) -> Result<(), SessionError> {
    let handle = self.handle.get()?;
    let flat = flat_boxes(boxes)?;
    let backend = self.handle.backend();
    let code = match sample {
      Sample::JpegFile(path) => backend.learner_add_file_jpeg(handle, &c_path(path)?, &flat),
      Sample::Raw(pixels) => backend.learner_add_raw(handle, pixels.as_raw(), &flat),
    };
    check(code)?;
    self.samples += 1;
    debug!("添加正样本 {} ({} 个边界框)", sample.describe(), boxes.len());
    Ok(())
  }

  /// 从图像仓库的同义词集中抽取样本，`max_samples` 为 0 时抽取全部
  pub fn add_positive_samples_from_synset(
    &mut self,
    synset_id: &str,
    max_samples: u32,
  ) -> Result<(), SessionError> {
    let handle = self.handle.get()?;
    check(
      self
        .handle
        .backend()
        .learner_add_synset(handle, &c_string(synset_id)?, max_samples),
    )?;
    self.samples += 1;
    info!("从同义词集 {} 添加正样本", synset_id);
    Ok(())
  }

  /// 先按长宽比、再按 WHO 特征聚类，每个簇学习一个分量。
  /// 回调返回 false 时在子步骤之间取消。
  pub fn learn(
    &mut self,
    max_aspect_clusters: u32,
    max_who_clusters: u32,
    progress: Option<&mut ProgressFn<'_>>,
  ) -> Result<Outcome, SessionError> {
    check_clusters(max_aspect_clusters, max_who_clusters)?;
    let handle = self.handle.get()?;
    let mut watch = CancelWatch::new(progress);
    let with_cb = watch.is_set();
    let mut forward = |c: u32, t: u32| watch.call(c, t);
    let code = self.handle.backend().learner_run(
      handle,
      max_aspect_clusters,
      max_who_clusters,
      if with_cb { Some(&mut forward) } else { None },
    );
    let result = outcome("学习", code, watch.cancelled())?;
    if result == Outcome::Completed {
      self.trained = true;
      info!(
        "学习完成: 至多 {} 个分量",
        max_aspect_clusters * max_who_clusters
      );
    }
    Ok(result)
  }

  /// 为学到的分量寻找阈值，需先调用 [`Learner::learn`]
  pub fn optimize_threshold(
    &mut self,
    max_positive: u32,
    num_negative: u32,
    progress: Option<&mut ProgressFn<'_>>,
  ) -> Result<Outcome, SessionError> {
    let handle = self.handle.get()?;
    let mut watch = CancelWatch::new(progress);
    let with_cb = watch.is_set();
    let mut forward = |c: u32, t: u32| watch.call(c, t);
    let code = self.handle.backend().learner_optimize_th(
      handle,
      max_positive,
      num_negative,
      if with_cb { Some(&mut forward) } else { None },
    );
    let result = outcome("阈值优化", code, watch.cancelled())?;
    if result == Outcome::Completed {
      info!("阈值优化完成");
    }
    Ok(result)
  }

  /// 学到的模型，不写入目标文件
  pub fn learned_model(&self) -> Result<Mixture, SessionError> {
    let handle = self.handle.get()?;
    let temp = temp_model_path();
    let code = self
      .handle
      .backend()
      .learner_save(handle, &c_path(&temp)?, false);
    let result = check(code).map_err(SessionError::from).and_then(|_| Ok(Mixture::load(&temp)?));
    if temp.exists()
      && let Err(e) = std::fs::remove_file(&temp)
    {
      warn!("删除临时模型文件失败 {}: {}", temp.display(), e);
    }
    result
  }

  /// 写入模型文件。`add` 为真且文件已存在时追加分量，否则覆盖。返回写入的模型。
  pub fn save(&self, model_file: impl AsRef<Path>, add: bool) -> Result<Mixture, SessionError> {
    let model_file = model_file.as_ref();
    let learned = self.learned_model()?;
    let mixture = if add {
      match Mixture::load(model_file) {
        Ok(mut existing) => {
          existing.merge(learned)?;
          existing
        }
        Err(CodecError::NotFound(_)) => learned,
        Err(e) => return Err(e.into()),
      }
    } else {
      learned
    };
    mixture.save(model_file)?;
    info!(
      "保存模型 {}: {} 个分量",
      model_file.display(),
      mixture.num_components()
    );
    Ok(mixture)
  }

  /// 清除样本与学到的模型
  pub fn reset(&mut self) -> Result<(), SessionError> {
    let handle = self.handle.get()?;
    check(self.handle.backend().learner_reset(handle))?;
    self.samples = 0;
    self.trained = false;
    debug!("学习器已重置");
    Ok(())
  }

  pub fn destroy(&mut self) {
    self.handle.release();
  }
}

fn run_overall(
  what: &str,
  progress: Option<&mut OverallProgressFn<'_>>,
  call: impl FnOnce(Option<&mut OverallProgressFn<'_>>) -> i32,
) -> Result<Outcome, SessionError> {
  let mut watch = CancelWatch::new(progress);
  let with_cb = watch.is_set();
  let mut forward = |a: u32, b: u32, c: u32, d: u32| watch.call_overall(a, b, c, d);
  let code = call(if with_cb { Some(&mut forward) } else { None });
  outcome(what, code, watch.cancelled())
}

/// 从图像仓库的同义词集学习模型并写入 `model_file`
#[allow(clippy::too_many_arguments)]
pub fn learn_from_synset<B: Backend>(
  backend: &B,
  repo_directory: &Path,
  synset_id: &str,
  bg_file: &Path,
  model_file: &Path,
  options: &LearnOptions,
  progress: Option<&mut OverallProgressFn<'_>>,
  debug: bool,
) -> Result<Outcome, SessionError> {
  check_clusters(options.max_aspect_clusters, options.max_who_clusters)?;
  let repo = c_path(repo_directory)?;
  let synset = c_string(synset_id)?;
  let bg = c_path(bg_file)?;
  let model = c_path(model_file)?;
  let params = LearnParams::from(options);
  let result = run_overall("学习", progress, |cb| {
    backend.learn_imagenet(&repo, &synset, &bg, &model, &params, cb, debug)
  })?;
  if result == Outcome::Completed {
    info!("从同义词集 {} 学习模型: {}", synset_id, model_file.display());
  }
  Ok(result)
}

/// 从 JPEG 文件学习模型。`boxes` 为空，或与 `image_files` 一一对应，
/// 其中 `None` 表示整幅图像。
#[allow(clippy::too_many_arguments)]
pub fn learn_from_files<B: Backend>(
  backend: &B,
  image_files: &[PathBuf],
  boxes: &[Option<BoundingBox>],
  bg_file: &Path,
  model_file: &Path,
  options: &LearnOptions,
  progress: Option<&mut OverallProgressFn<'_>>,
  debug: bool,
) -> Result<Outcome, SessionError> {
  if !boxes.is_empty() && boxes.len() != image_files.len() {
    return Err(SessionError::InvalidArgument(format!(
      "边界框数 ({}) 与图像数 ({}) 不一致",
      boxes.len(),
      image_files.len()
    )));
  }
  check_clusters(options.max_aspect_clusters, options.max_who_clusters)?;

  let files = image_files
    .iter()
    .map(|f| c_path(f))
    .collect::<Result<Vec<_>, _>>()?;
  let file_refs: Vec<&std::ffi::CStr> = files.iter().map(CString::as_c_str).collect();
  let flat = boxes
    .iter()
    .map(|b| match b {
      Some(b) => b.to_flat(),
      None => Ok(FlatBoundingBox::default()),
    })
    .collect::<Result<Vec<_>, _>>()?;
  let bg = c_path(bg_file)?;
  let model = c_path(model_file)?;
  let params = LearnParams::from(options);

  let result = run_overall("学习", progress, |cb| {
    backend.learn_files_jpeg(&file_refs, &flat, &bg, &model, &params, cb, debug)
  })?;
  if result == Outcome::Completed {
    info!(
      "从 {} 个文件学习模型: {}",
      image_files.len(),
      model_file.display()
    );
  }
  Ok(result)
}

/// 从图像仓库学习背景统计（负样本均值与自相关函数）
pub fn learn_background<B: Backend>(
  backend: &B,
  repo_directory: &Path,
  bg_file: &Path,
  num_images: u32,
  max_offset: u32,
  accurate_autocorrelation: bool,
  progress: Option<&mut OverallProgressFn<'_>>,
) -> Result<Outcome, SessionError> {
  if num_images == 0 {
    return Err(SessionError::InvalidArgument("图像数必须为正".into()));
  }
  let repo = c_path(repo_directory)?;
  let bg = c_path(bg_file)?;
  let result = run_overall("背景统计学习", progress, |cb| {
    backend.learn_bg(&repo, &bg, num_images, max_offset, cb, accurate_autocorrelation)
  })?;
  if result == Outcome::Completed {
    info!(
      "背景统计已写入 {} ({} 张图像)",
      bg_file.display(),
      num_images
    );
  }
  Ok(result)
}
