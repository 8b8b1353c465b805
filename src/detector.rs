// 该文件是 Artos 项目的一部分。
// src/detector.rs - 检测会话
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
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
  bbox::BoundingBox,
  catalog::ModelList,
  ffi::{ArtosError, Backend, FlatDetection, Handle, LibArtos, c_path, c_string, check, fixed_to_string},
  input::Sample,
  learner::Learner,
  model::Mixture,
  session::{NativeHandle, SessionError},
};

/// 单次检测默认返回的最大结果数
pub const DEFAULT_LIMIT: usize = 100;

/// 单次检测允许的最大结果数，结果缓冲区按 `limit` 预先分配
pub const MAX_LIMIT: usize = 65_536;

/// 一个检测结果，坐标位于送入检测的图像上
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  pub classname: String,
  pub synset_id: Option<String>,
  pub score: f32,
  pub bbox: BoundingBox,
}

impl From<&FlatDetection> for Detection {
  fn from(flat: &FlatDetection) -> Self {
    let synset_id = fixed_to_string(&flat.synset_id);
    Detection {
      classname: fixed_to_string(&flat.classname),
      synset_id: (!synset_id.is_empty()).then_some(synset_id),
      score: flat.score,
      bbox: BoundingBox::from_edges(flat.left, flat.top, flat.right, flat.bottom),
    }
  }
}

fn check_threshold(threshold: f64) -> Result<(), SessionError> {
  if threshold.is_finite() {
    Ok(())
  } else {
    Err(SessionError::InvalidArgument(format!("阈值无效: {}", threshold)))
  }
}

fn optional_c_string(s: Option<&str>) -> Result<Option<CString>, SessionError> {
  Ok(s.filter(|s| !s.is_empty()).map(c_string).transpose()?)
}

static TEMP_MODELS: AtomicUsize = AtomicUsize::new(0);

/// 内存中的模型经临时文件交给库
pub(crate) fn temp_model_path() -> PathBuf {
  let n = TEMP_MODELS.fetch_add(1, Ordering::Relaxed);
  std::env::temp_dir().join(format!("artos-model-{}-{}.txt", std::process::id(), n))
}

/// 检测会话，独占一个原生检测器句柄
pub struct Detector<B: Backend = LibArtos> {
  handle: NativeHandle<B>,
  num_models: usize,
}

impl<B: Backend> Detector<B> {
  /// `overlap` 为非极大值抑制的最小重叠率，`interval` 为每个八度的金字塔层数
  pub fn new(backend: Arc<B>, overlap: f64, interval: i32, debug: bool) -> Result<Self, SessionError> {
    if !(overlap > 0.0 && overlap <= 1.0) {
      return Err(SessionError::InvalidArgument(format!(
        "重叠率必须位于 (0, 1]: {}",
        overlap
      )));
    }
    if interval < 1 {
      return Err(SessionError::InvalidArgument(format!(
        "金字塔层数必须为正: {}",
        interval
      )));
    }
    let raw = backend.create_detector(overlap, interval, debug);
    let handle = NativeHandle::acquire(
      backend,
      "检测器",
      raw,
      B::destroy_detector,
      ArtosError::OutOfMemory,
    )?;
    Ok(Detector {
      handle,
      num_models: 0,
    })
  }

  pub(crate) fn raw_handle(&self) -> Result<Handle, SessionError> {
    self.handle.get()
  }

  pub(crate) fn backend(&self) -> &Arc<B> {
    self.handle.backend()
  }

  /// 已注册的模型数
  pub fn num_models(&self) -> usize {
    self.num_models
  }

  pub fn is_alive(&self) -> bool {
    self.handle.is_alive()
  }

  pub fn add_model(
    &mut self,
    classname: &str,
    model_file: impl AsRef<Path>,
    threshold: f64,
    synset_id: Option<&str>,
  ) -> Result<(), SessionError> {
    check_threshold(threshold)?;
    let handle = self.handle.get()?;
    let model_file = model_file.as_ref();
    let classname_c = c_string(classname)?;
    let synset = optional_c_string(synset_id)?;
    check(self.handle.backend().add_model(
      handle,
      &classname_c,
      &c_path(model_file)?,
      threshold,
      synset.as_deref(),
    ))?;
    self.num_models += 1;
    info!(
      "添加模型 {} (阈值 {}): {}",
      classname,
      threshold,
      model_file.display()
    );
    Ok(())
  }

  /// 注册内存中的模型
  pub fn add_mixture(
    &mut self,
    classname: &str,
    mixture: &Mixture,
    threshold: f64,
    synset_id: Option<&str>,
  ) -> Result<(), SessionError> {
    let path = temp_model_path();
    mixture.save(&path)?;
    let result = self.add_model(classname, &path, threshold, synset_id);
    if let Err(e) = std::fs::remove_file(&path) {
      warn!("删除临时模型文件失败 {}: {}", path.display(), e);
    }
    result
  }

  /// 由库读取模型列表文件，返回成功添加的模型数
  pub fn add_models(&mut self, list_file: impl AsRef<Path>) -> Result<usize, SessionError> {
    let handle = self.handle.get()?;
    let list_file = list_file.as_ref();
    let added = check(
      self
        .handle
        .backend()
        .add_models(handle, &c_path(list_file)?),
    )? as usize;
    self.num_models += added;
    info!("从 {} 添加了 {} 个模型", list_file.display(), added);
    Ok(added)
  }

  /// 逐个注册列表中未禁用的模型
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

  /// 使用学习会话中刚学到的模型
  pub fn add_model_from_learner(
    &mut self,
    classname: &str,
    learner: &Learner<B>,
    threshold: f64,
    synset_id: Option<&str>,
  ) -> Result<(), SessionError> {
    check_threshold(threshold)?;
    let handle = self.handle.get()?;
    let synset = optional_c_string(synset_id)?;
    check(self.handle.backend().add_model_from_learner(
      handle,
      &c_string(classname)?,
      learner.raw_handle()?,
      threshold,
      synset.as_deref(),
    ))?;
    self.num_models += 1;
    info!("从学习会话添加模型 {} (阈值 {})", classname, threshold);
    Ok(())
  }

  pub fn num_feature_extractors(&self) -> Result<usize, SessionError> {
    let handle = self.handle.get()?;
    Ok(check(self.handle.backend().num_feature_extractors_in_detector(handle))? as usize)
  }

  /// 检测并返回至多 `limit` 个结果，顺序由库决定
  pub fn detect(&self, sample: &Sample, limit: usize) -> Result<Vec<Detection>, SessionError> {
    let handle = self.handle.get()?;
    let backend = self.handle.backend();
    let results = collect(limit, |buf, count| match sample {
      Sample::JpegFile(path) => Ok(backend.detect_file_jpeg(handle, &c_path(path)?, buf, count)),
      Sample::Raw(pixels) => Ok(backend.detect_raw(handle, pixels.as_raw(), buf, count)),
    })?;
    debug!("{}: 检测到 {} 个目标", sample.describe(), results.len());
    Ok(results)
  }

  /// 在预先提取的特征文件上检测
  pub fn detect_feature_dump(
    &self,
    dump_file: impl AsRef<Path>,
    width: u32,
    height: u32,
    limit: usize,
  ) -> Result<Vec<Detection>, SessionError> {
    let handle = self.handle.get()?;
    let dump_file = dump_file.as_ref();
    let path = c_path(dump_file)?;
    let backend = self.handle.backend();
    let results = collect(limit, |buf, count| {
      backend
        .detect_file_featuredump(handle, &path, width, height, buf, count)
        .ok_or(SessionError::Artos(ArtosError::Unsupported("detect_file_featuredump")))
    })?;
    debug!("{}: 检测到 {} 个目标", dump_file.display(), results.len());
    Ok(results)
  }

  /// 释放原生句柄。可重复调用，之后的操作返回 [`SessionError::Destroyed`]。
  pub fn destroy(&mut self) {
    self.handle.release();
  }
}

/// 按 `limit` 分配缓冲区，并把结果数截断到缓冲区长度。
/// `limit` 为 0 时不调用库。
fn collect(
  limit: usize,
  call: impl FnOnce(&mut [FlatDetection], &mut c_uint) -> Result<i32, SessionError>,
) -> Result<Vec<Detection>, SessionError> {
  if limit > MAX_LIMIT {
    return Err(SessionError::InvalidArgument(format!(
      "结果数上限 {} 超过 {}",
      limit, MAX_LIMIT
    )));
  }
  if limit == 0 {
    return Ok(Vec::new());
  }
  let mut buf = vec![FlatDetection::default(); limit];
  let mut count = limit as c_uint;
  check(call(&mut buf, &mut count)?)?;
  let n = (count as usize).min(limit);
  Ok(buf[..n].iter().map(Detection::from).collect())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    catalog::MODEL_LIST_FILE,
    ffi::{mock::MockBackend, string_to_fixed},
    input::RawPixels,
    model::tests::sample_mixture,
  };
  use std::fs;

  fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("artos-detector-{}-{}", name, std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
  }

  fn detector(backend: &Arc<MockBackend>) -> Detector<MockBackend> {
    Detector::new(backend.clone(), 0.5, 10, false).unwrap()
  }

  #[test]
  fn flat_detection_converts() {
    let mut flat = FlatDetection::default();
    string_to_fixed("bicycle", &mut flat.classname);
    flat.score = 0.75;
    flat.left = 30;
    flat.top = 40;
    flat.right = 10;
    flat.bottom = 50;
    let d = Detection::from(&flat);
    assert_eq!(d.classname, "bicycle");
    assert_eq!(d.synset_id, None);
    assert_eq!(d.bbox.coords(), [10, 40, 30, 50]);
  }

  #[test]
  fn detecting_without_models_fails() {
    let backend = Arc::new(MockBackend::new());
    let det = detector(&backend);
    let err = det.detect(&Sample::JpegFile("a.jpg".into()), 10).unwrap_err();
    assert!(matches!(err, SessionError::Artos(ArtosError::NoModels)));
  }

  #[test]
  fn limit_is_a_hard_cap() {
    let dir = scratch("limit");
    let model = dir.join("car.txt");
    fs::write(&model, "1\n").unwrap();

    let backend = Arc::new(MockBackend::new());
    let mut det = detector(&backend);
    det.add_model("car", &model, -0.5, Some("n02958343")).unwrap();
    assert_eq!(det.num_models(), 1);

    let sample = Sample::Raw(RawPixels::new(vec![0; 4 * 4 * 3], 4, 4, false).unwrap());
    let all = det.detect(&sample, DEFAULT_LIMIT).unwrap();
    assert_eq!(all.len(), 5);
    assert_eq!(all[0].classname, "car");
    assert_eq!(all[0].synset_id.as_deref(), Some("n02958343"));

    let two = det.detect(&sample, 2).unwrap();
    assert_eq!(two.len(), 2);
    assert!(det.detect(&sample, 0).unwrap().is_empty());
    assert_eq!(backend.state().detect_calls, 2);
    assert!(matches!(
      det.detect(&sample, MAX_LIMIT + 1),
      Err(SessionError::InvalidArgument(_))
    ));
    assert_eq!(det.detect(&sample, MAX_LIMIT).unwrap().len(), 5);
    fs::remove_dir_all(&dir).ok();
  }

  #[test]
  fn invalid_model_file_is_surfaced() {
    let backend = Arc::new(MockBackend::new());
    let mut det = detector(&backend);
    let err = det.add_model("car", "/nonexistent/car.txt", 0.0, None).unwrap_err();
    assert!(matches!(err, SessionError::Artos(ArtosError::InvalidModelFile)));
    assert_eq!(det.num_models(), 0);
    assert!(det.add_model("car", "x", f64::NAN, None).is_err());
  }

  #[test]
  fn mixtures_go_through_temporary_file() {
    let backend = Arc::new(MockBackend::new());
    let mut det = detector(&backend);
    det.add_mixture("fox", &sample_mixture(1), 0.0, None).unwrap();
    assert_eq!(det.num_models(), 1);
  }

  #[test]
  fn model_lists_skip_disabled() {
    let dir = scratch("list");
    fs::write(dir.join("a.txt"), "1\n").unwrap();
    fs::write(dir.join("b.txt"), "1\n").unwrap();
    let list_path = dir.join(MODEL_LIST_FILE);
    fs::write(&list_path, "a a.txt 0.0\n#b b.txt 0.0\n").unwrap();

    let backend = Arc::new(MockBackend::new());
    let mut det = detector(&backend);
    let list = ModelList::load(&list_path).unwrap();
    assert_eq!(det.add_model_list(&list).unwrap(), 1);
    assert_eq!(det.add_models(&list_path).unwrap(), 1);
    assert_eq!(det.num_models(), 2);
    fs::remove_dir_all(&dir).ok();
  }

  #[test]
  fn feature_dump_requires_symbol() {
    let backend = Arc::new(MockBackend::new());
    let dir = scratch("dump");
    fs::write(dir.join("a.txt"), "1\n").unwrap();
    let mut det = detector(&backend);
    det.add_model("a", dir.join("a.txt"), 0.0, None).unwrap();
    assert_eq!(det.detect_feature_dump("f.dump", 64, 48, 3).unwrap().len(), 3);

    backend.state().feature_dump_supported = false;
    assert!(matches!(
      det.detect_feature_dump("f.dump", 64, 48, 3),
      Err(SessionError::Artos(ArtosError::Unsupported(_)))
    ));
    fs::remove_dir_all(&dir).ok();
  }

  #[test]
  fn destroy_is_idempotent() {
    let backend = Arc::new(MockBackend::new());
    let mut det = detector(&backend);
    det.destroy();
    det.destroy();
    assert!(!det.is_alive());
    assert!(matches!(
      det.detect(&Sample::JpegFile("a.jpg".into()), 1),
      Err(SessionError::Destroyed)
    ));
    drop(det);
    assert_eq!(backend.state().destroyed.values().sum::<usize>(), 1);
  }

  #[test]
  fn creation_failure_is_out_of_memory() {
    let backend = Arc::new(MockBackend::new());
    backend.state().fail_create = true;
    assert!(matches!(
      Detector::new(backend.clone(), 0.5, 10, false),
      Err(SessionError::Artos(ArtosError::OutOfMemory))
    ));
    assert!(Detector::new(backend.clone(), 1.5, 10, false).is_err());
    assert_eq!(backend.state().stray_destroys, 0);
  }
}
