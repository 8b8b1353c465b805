// 该文件是 Artos 项目的一部分。
// src/ffi/mock.rs - 单元测试用的进程内 libartos
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  collections::HashMap,
  ffi::{CStr, CString, c_int, c_uint},
  path::Path,
  sync::{Mutex, MutexGuard},
};

use super::{
  Backend, LearnParams, RawImage,
  progress::{OverallProgressFn, ProgressFn},
  status::*,
  types::*,
};

/// 学习结果写出的模型：一个分量，一个 1x1 的 HOG 部件
pub const LEARNED_MODEL: &str = "HOG\ncellSizeX 8 cellSizeY 8\n\n1\n1 -0.5\n1 1 32 0 0 0 0 0 0\n0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 1 0.5 0 0 0 0 0 0 0 0 0 0 0 0\n\n";

#[derive(Debug, Default)]
pub struct MockDetector {
  pub models: Vec<String>,
  pub positives: usize,
  pub negatives: usize,
  pub evaluated: bool,
}

#[derive(Debug, Default)]
pub struct MockLearner {
  pub samples: usize,
  pub learned: bool,
  pub loocv: bool,
}

#[derive(Debug)]
pub struct MockState {
  next_handle: Handle,
  pub detectors: HashMap<Handle, MockDetector>,
  pub learners: HashMap<Handle, MockLearner>,
  /// 每个句柄被销毁的次数
  pub destroyed: HashMap<Handle, usize>,
  /// 对未知句柄的销毁调用
  pub stray_destroys: usize,
  pub fail_create: bool,
  /// 每张图像报告的检测数
  pub detections: usize,
  pub detect_calls: usize,
  pub progress_steps: u32,
  /// 按模型给出的原始结果，按阈值降序存放
  pub raw_results: Vec<RawTestResult>,
  pub feature_dump_supported: bool,
  pub current_extractor: String,
  pub int_params: HashMap<String, i32>,
  pub string_params: HashMap<String, CString>,
}

impl Default for MockState {
  fn default() -> Self {
    MockState {
      next_handle: 0,
      detectors: HashMap::new(),
      learners: HashMap::new(),
      destroyed: HashMap::new(),
      stray_destroys: 0,
      fail_create: false,
      detections: 5,
      detect_calls: 0,
      progress_steps: 3,
      raw_results: vec![
        RawTestResult { threshold: 0.9, tp: 1, fp: 0, np: 2 },
        RawTestResult { threshold: 0.5, tp: 2, fp: 0, np: 2 },
        RawTestResult { threshold: 0.1, tp: 2, fp: 1, np: 2 },
      ],
      feature_dump_supported: true,
      current_extractor: "HOG".into(),
      int_params: HashMap::from([("cellSizeX".into(), 8), ("cellSizeY".into(), 8)]),
      string_params: HashMap::new(),
    }
  }
}

#[derive(Debug, Default)]
pub struct MockBackend {
  state: Mutex<MockState>,
}

impl MockBackend {
  pub fn new() -> MockBackend {
    MockBackend::default()
  }

  pub fn state(&self) -> MutexGuard<'_, MockState> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn next_handle(&self) -> Option<Handle> {
    let mut state = self.state();
    if state.fail_create {
      return None;
    }
    state.next_handle += 1;
    Some(state.next_handle)
  }

  fn destroy(&self, handle: Handle, detector: bool) {
    let mut state = self.state();
    let removed = if detector {
      state.detectors.remove(&handle).is_some()
    } else {
      state.learners.remove(&handle).is_some()
    };
    if removed {
      *state.destroyed.entry(handle).or_default() += 1;
    } else {
      state.stray_destroys += 1;
    }
  }

  fn detect(&self, detector: Handle, buf: &mut [FlatDetection], count: &mut c_uint) -> c_int {
    let total = {
      let mut state = self.state();
      state.detect_calls += 1;
      let Some(det) = state.detectors.get(&detector) else {
        return RES_INVALID_HANDLE;
      };
      if det.models.is_empty() {
        return DETECT_RES_NO_MODELS;
      }
      for (i, slot) in buf.iter_mut().take(state.detections).enumerate() {
        let name = &det.models[i % det.models.len()];
        string_to_fixed(name, &mut slot.classname);
        string_to_fixed("n02958343", &mut slot.synset_id);
        slot.score = 1.0 - i as f32 * 0.1;
        slot.left = 10 * i as c_int;
        slot.top = 5;
        slot.right = 10 * i as c_int + 40;
        slot.bottom = 45;
      }
      state.detections
    };
    // 故意报告全部数量，调用方必须按缓冲区长度截断
    *count = total as c_uint;
    RES_OK
  }

  fn run_steps(&self, progress: Option<&mut ProgressFn<'_>>) -> bool {
    let steps = self.state().progress_steps;
    if let Some(cb) = progress {
      for i in 1..=steps {
        if !cb(i, steps) {
          return false;
        }
      }
    }
    true
  }

  fn run_overall_steps(&self, progress: Option<&mut OverallProgressFn<'_>>) -> bool {
    let steps = self.state().progress_steps;
    if let Some(cb) = progress {
      for i in 1..=steps {
        if !cb(i, steps, 1, 1) {
          return false;
        }
      }
    }
    true
  }

  fn with_detector(&self, detector: Handle, f: impl FnOnce(&mut MockDetector) -> c_int) -> c_int {
    match self.state().detectors.get_mut(&detector) {
      Some(det) => f(det),
      None => RES_INVALID_HANDLE,
    }
  }

  fn with_learner(&self, learner: Handle, f: impl FnOnce(&mut MockLearner) -> c_int) -> c_int {
    match self.state().learners.get_mut(&learner) {
      Some(l) => f(l),
      None => RES_INVALID_HANDLE,
    }
  }
}

fn valid_image(image: &RawImage<'_>) -> bool {
  let channels = if image.grayscale { 1 } else { 3 };
  image.width > 0
    && image.height > 0
    && image.data.len() == (image.width * image.height) as usize * channels
}

fn path_of(s: &CStr) -> &Path {
  Path::new(s.to_str().unwrap_or_default())
}

fn write_model(modelfile: &CStr) -> c_int {
  match std::fs::write(path_of(modelfile), LEARNED_MODEL) {
    Ok(()) => RES_OK,
    Err(_) => RES_FILE_ACCESS_DENIED,
  }
}

fn fill_infos(buf: Option<&mut [FeatureExtractorInfo]>, count: &mut c_uint) {
  let all = [("HOG", "Histogram of Oriented Gradients"), ("Caffe", "Caffe CNN")];
  match buf {
    None => *count = all.len() as c_uint,
    Some(buf) => {
      let n = buf.len().min(all.len());
      for (slot, (ty, name)) in buf.iter_mut().zip(all.iter()) {
        string_to_fixed(ty, &mut slot.type_);
        string_to_fixed(name, &mut slot.name);
      }
      *count = n as c_uint;
    }
  }
}

impl Backend for MockBackend {
  fn create_detector(&self, _overlap: f64, _interval: i32, _debug: bool) -> Handle {
    match self.next_handle() {
      Some(h) => {
        self.state().detectors.insert(h, MockDetector::default());
        h
      }
      None => 0,
    }
  }

  fn destroy_detector(&self, detector: Handle) {
    self.destroy(detector, true);
  }

  fn add_model(
    &self,
    detector: Handle,
    classname: &CStr,
    modelfile: &CStr,
    _threshold: f64,
    _synset_id: Option<&CStr>,
  ) -> c_int {
    if !path_of(modelfile).is_file() {
      return DETECT_RES_INVALID_MODEL_FILE;
    }
    let name = classname.to_string_lossy().into_owned();
    self.with_detector(detector, |det| {
      det.models.push(name);
      RES_OK
    })
  }

  fn add_models(&self, detector: Handle, listfile: &CStr) -> c_int {
    let Ok(text) = std::fs::read_to_string(path_of(listfile)) else {
      return DETECT_RES_INVALID_MODEL_LIST_FILE;
    };
    let names: Vec<String> = text
      .lines()
      .filter(|l| !l.trim().is_empty() && !l.starts_with('#'))
      .filter_map(|l| l.split_whitespace().next().map(|s| s.trim_matches('"').to_string()))
      .collect();
    self.with_detector(detector, |det| {
      let n = names.len() as c_int;
      det.models.extend(names);
      n
    })
  }

  fn add_model_from_learner(
    &self,
    detector: Handle,
    classname: &CStr,
    learner: Handle,
    _threshold: f64,
    _synset_id: Option<&CStr>,
  ) -> c_int {
    let learned = match self.state().learners.get(&learner) {
      Some(l) => l.learned,
      None => return RES_INVALID_HANDLE,
    };
    if !learned {
      return LEARN_RES_MODEL_NOT_LEARNED;
    }
    let name = classname.to_string_lossy().into_owned();
    self.with_detector(detector, |det| {
      det.models.push(name);
      RES_OK
    })
  }

  fn num_feature_extractors_in_detector(&self, detector: Handle) -> c_int {
    self.with_detector(detector, |det| det.models.len().min(1) as c_int)
  }

  fn detect_file_jpeg(
    &self,
    detector: Handle,
    imagefile: &CStr,
    buf: &mut [FlatDetection],
    count: &mut c_uint,
  ) -> c_int {
    if imagefile.to_bytes().is_empty() {
      return DETECT_RES_INVALID_IMG_DATA;
    }
    self.detect(detector, buf, count)
  }

  fn detect_raw(
    &self,
    detector: Handle,
    image: RawImage<'_>,
    buf: &mut [FlatDetection],
    count: &mut c_uint,
  ) -> c_int {
    if !valid_image(&image) {
      return DETECT_RES_INVALID_IMG_DATA;
    }
    self.detect(detector, buf, count)
  }

  fn detect_file_featuredump(
    &self,
    detector: Handle,
    _dumpfile: &CStr,
    _width: u32,
    _height: u32,
    buf: &mut [FlatDetection],
    count: &mut c_uint,
  ) -> Option<c_int> {
    if !self.state().feature_dump_supported {
      return None;
    }
    Some(self.detect(detector, buf, count))
  }

  fn learn_imagenet(
    &self,
    _repo_directory: &CStr,
    _synset_id: &CStr,
    bg_file: &CStr,
    modelfile: &CStr,
    _params: &LearnParams,
    progress: Option<&mut OverallProgressFn<'_>>,
    _debug: bool,
  ) -> c_int {
    if !path_of(bg_file).is_file() {
      return LEARN_RES_INVALID_BG_FILE;
    }
    if !self.run_overall_steps(progress) {
      return RES_ABORTED;
    }
    write_model(modelfile)
  }

  fn learn_files_jpeg(
    &self,
    imagefiles: &[&CStr],
    _bboxes: &[FlatBoundingBox],
    bg_file: &CStr,
    modelfile: &CStr,
    _params: &LearnParams,
    progress: Option<&mut OverallProgressFn<'_>>,
    _debug: bool,
  ) -> c_int {
    if !path_of(bg_file).is_file() {
      return LEARN_RES_INVALID_BG_FILE;
    }
    if imagefiles.is_empty() {
      return LEARN_RES_NO_SAMPLES;
    }
    if !self.run_overall_steps(progress) {
      return RES_ABORTED;
    }
    write_model(modelfile)
  }

  fn create_learner(
    &self,
    bg_file: &CStr,
    _repo_directory: &CStr,
    loocv: bool,
    _debug: bool,
  ) -> Handle {
    if !path_of(bg_file).is_file() {
      return 0;
    }
    match self.next_handle() {
      Some(h) => {
        self.state().learners.insert(
          h,
          MockLearner {
            loocv,
            ..Default::default()
          },
        );
        h
      }
      None => 0,
    }
  }

  fn destroy_learner(&self, learner: Handle) {
    self.destroy(learner, false);
  }

  fn learner_add_synset(&self, learner: Handle, synset_id: &CStr, max_samples: u32) -> c_int {
    if synset_id.to_bytes().is_empty() {
      return IMGREPO_RES_SYNSET_NOT_FOUND;
    }
    self.with_learner(learner, |l| {
      l.samples += if max_samples == 0 { 10 } else { max_samples as usize };
      RES_OK
    })
  }

  fn learner_add_file_jpeg(
    &self,
    learner: Handle,
    imagefile: &CStr,
    bboxes: &[FlatBoundingBox],
  ) -> c_int {
    if !path_of(imagefile).is_file() {
      return LEARN_RES_INVALID_IMG_DATA;
    }
    self.with_learner(learner, |l| {
      l.samples += bboxes.len().max(1);
      RES_OK
    })
  }

  fn learner_add_raw(
    &self,
    learner: Handle,
    image: RawImage<'_>,
    bboxes: &[FlatBoundingBox],
  ) -> c_int {
    if !valid_image(&image) {
      return LEARN_RES_INVALID_IMG_DATA;
    }
    self.with_learner(learner, |l| {
      l.samples += bboxes.len().max(1);
      RES_OK
    })
  }

  fn learner_run(
    &self,
    learner: Handle,
    _max_aspect_clusters: u32,
    _max_who_clusters: u32,
    progress: Option<&mut ProgressFn<'_>>,
  ) -> c_int {
    let samples = match self.state().learners.get(&learner) {
      Some(l) => l.samples,
      None => return RES_INVALID_HANDLE,
    };
    if samples == 0 {
      return LEARN_RES_NO_SAMPLES;
    }
    if !self.run_steps(progress) {
      return RES_ABORTED;
    }
    self.with_learner(learner, |l| {
      l.learned = true;
      RES_OK
    })
  }

  fn learner_optimize_th(
    &self,
    learner: Handle,
    _max_positive: u32,
    _num_negative: u32,
    progress: Option<&mut ProgressFn<'_>>,
  ) -> c_int {
    let learned = match self.state().learners.get(&learner) {
      Some(l) => l.learned,
      None => return RES_INVALID_HANDLE,
    };
    if !learned {
      return LEARN_RES_MODEL_NOT_LEARNED;
    }
    if !self.run_steps(progress) {
      return RES_ABORTED;
    }
    RES_OK
  }

  fn learner_save(&self, learner: Handle, modelfile: &CStr, _add: bool) -> c_int {
    let learned = match self.state().learners.get(&learner) {
      Some(l) => l.learned,
      None => return RES_INVALID_HANDLE,
    };
    if !learned {
      return LEARN_RES_MODEL_NOT_LEARNED;
    }
    write_model(modelfile)
  }

  fn learner_reset(&self, learner: Handle) -> c_int {
    self.with_learner(learner, |l| {
      l.samples = 0;
      l.learned = false;
      RES_OK
    })
  }

  fn learn_bg(
    &self,
    repo_directory: &CStr,
    bg_file: &CStr,
    _num_images: u32,
    _max_offset: u32,
    progress: Option<&mut OverallProgressFn<'_>>,
    _accurate_autocorrelation: bool,
  ) -> c_int {
    if !path_of(repo_directory).is_dir() {
      return IMGREPO_RES_INVALID_REPOSITORY;
    }
    if !self.run_overall_steps(progress) {
      return RES_ABORTED;
    }
    match std::fs::write(path_of(bg_file), b"bg") {
      Ok(()) => RES_OK,
      Err(_) => RES_FILE_ACCESS_DENIED,
    }
  }

  fn evaluator_add_samples_from_synset(
    &self,
    detector: Handle,
    repo_directory: &CStr,
    _synset_id: &CStr,
    num_negative: u32,
  ) -> c_int {
    if !path_of(repo_directory).is_dir() {
      return IMGREPO_RES_INVALID_REPOSITORY;
    }
    self.with_detector(detector, |det| {
      det.positives += 10;
      det.negatives += num_negative as usize;
      RES_OK
    })
  }

  fn evaluator_add_positive_file(
    &self,
    detector: Handle,
    imagefile: &CStr,
    annotation_file: &CStr,
  ) -> c_int {
    if !path_of(annotation_file).is_file() {
      return DETECT_RES_INVALID_ANNOTATIONS;
    }
    if !path_of(imagefile).is_file() {
      return DETECT_RES_INVALID_IMG_DATA;
    }
    self.with_detector(detector, |det| {
      det.positives += 1;
      RES_OK
    })
  }

  fn evaluator_add_positive_file_jpeg(
    &self,
    detector: Handle,
    imagefile: &CStr,
    _bboxes: &[FlatBoundingBox],
  ) -> c_int {
    if !path_of(imagefile).is_file() {
      return DETECT_RES_INVALID_IMG_DATA;
    }
    self.with_detector(detector, |det| {
      det.positives += 1;
      RES_OK
    })
  }

  fn evaluator_add_positive_raw(
    &self,
    detector: Handle,
    image: RawImage<'_>,
    _bboxes: &[FlatBoundingBox],
  ) -> c_int {
    if !valid_image(&image) {
      return DETECT_RES_INVALID_IMG_DATA;
    }
    self.with_detector(detector, |det| {
      det.positives += 1;
      RES_OK
    })
  }

  fn evaluator_add_negative_file_jpeg(&self, detector: Handle, imagefile: &CStr) -> c_int {
    if !path_of(imagefile).is_file() {
      return DETECT_RES_INVALID_IMG_DATA;
    }
    self.with_detector(detector, |det| {
      det.negatives += 1;
      RES_OK
    })
  }

  fn evaluator_add_negative_raw(&self, detector: Handle, image: RawImage<'_>) -> c_int {
    if !valid_image(&image) {
      return DETECT_RES_INVALID_IMG_DATA;
    }
    self.with_detector(detector, |det| {
      det.negatives += 1;
      RES_OK
    })
  }

  fn evaluator_run(
    &self,
    detector: Handle,
    _granularity: u32,
    _eq_overlap: f64,
    progress: Option<&mut ProgressFn<'_>>,
  ) -> c_int {
    {
      let state = self.state();
      let Some(det) = state.detectors.get(&detector) else {
        return RES_INVALID_HANDLE;
      };
      if det.models.is_empty() {
        return DETECT_RES_NO_MODELS;
      }
      if det.positives + det.negatives == 0 {
        return DETECT_RES_NO_IMAGES;
      }
    }
    // 与库一致：用户中止时仍返回 OK
    let completed = self.run_steps(progress);
    self.with_detector(detector, |det| {
      det.evaluated = completed;
      RES_OK
    })
  }

  fn evaluator_get_raw_results(
    &self,
    detector: Handle,
    buf: Option<&mut [RawTestResult]>,
    count: &mut c_uint,
    model_index: u32,
  ) -> c_int {
    let state = self.state();
    let Some(det) = state.detectors.get(&detector) else {
      return RES_INVALID_HANDLE;
    };
    if !det.evaluated {
      return DETECT_RES_NO_RESULTS;
    }
    if model_index as usize >= det.models.len() {
      return RES_INDEX_OUT_OF_BOUNDS;
    }
    match buf {
      None => *count = state.raw_results.len() as c_uint,
      Some(buf) => {
        let n = buf.len().min(state.raw_results.len());
        buf[..n].copy_from_slice(&state.raw_results[..n]);
        *count = n as c_uint;
      }
    }
    RES_OK
  }

  fn evaluator_get_max_fmeasure(
    &self,
    detector: Handle,
    fmeasure: &mut f32,
    threshold: &mut f32,
    model_index: u32,
  ) -> c_int {
    self.with_detector(detector, |det| {
      if !det.evaluated {
        return DETECT_RES_NO_RESULTS;
      }
      if model_index as usize >= det.models.len() {
        return RES_INDEX_OUT_OF_BOUNDS;
      }
      *fmeasure = 1.0;
      *threshold = 0.5;
      RES_OK
    })
  }

  fn evaluator_get_fmeasure_at(
    &self,
    detector: Handle,
    _threshold: f32,
    fmeasure: &mut f32,
    model_index: u32,
  ) -> c_int {
    self.with_detector(detector, |det| {
      if !det.evaluated {
        return DETECT_RES_NO_RESULTS;
      }
      if model_index as usize >= det.models.len() {
        return RES_INDEX_OUT_OF_BOUNDS;
      }
      *fmeasure = 0.8;
      RES_OK
    })
  }

  fn evaluator_get_ap(&self, detector: Handle, ap: &mut f32, model_index: u32) -> c_int {
    self.with_detector(detector, |det| {
      if !det.evaluated {
        return DETECT_RES_NO_RESULTS;
      }
      if model_index as usize >= det.models.len() {
        return RES_INDEX_OUT_OF_BOUNDS;
      }
      *ap = 1.0;
      RES_OK
    })
  }

  fn evaluator_dump_results(&self, detector: Handle, dump_file: &CStr) -> c_int {
    let evaluated = match self.state().detectors.get(&detector) {
      Some(det) => det.evaluated,
      None => return RES_INVALID_HANDLE,
    };
    if !evaluated {
      return DETECT_RES_NO_RESULTS;
    }
    match std::fs::write(path_of(dump_file), "Threshold;TP;FP;NP\n") {
      Ok(()) => RES_OK,
      Err(_) => RES_FILE_ACCESS_DENIED,
    }
  }

  fn change_feature_extractor(&self, type_: &CStr) -> c_int {
    let ty = type_.to_string_lossy();
    if ty != "HOG" && ty != "Caffe" {
      return SETTINGS_RES_UNKNOWN_FEATURE_EXTRACTOR;
    }
    self.state().current_extractor = ty.into_owned();
    RES_OK
  }

  fn feature_extractor_get_info(&self, info: &mut FeatureExtractorInfo) -> c_int {
    let current = self.state().current_extractor.clone();
    let mut all = [FeatureExtractorInfo::default(); 2];
    let mut n = 2;
    fill_infos(Some(&mut all), &mut n);
    match all.iter().find(|i| fixed_to_string(&i.type_) == current) {
      Some(found) => {
        *info = *found;
        RES_OK
      }
      None => RES_INTERNAL_ERROR,
    }
  }

  fn list_feature_extractors(
    &self,
    buf: Option<&mut [FeatureExtractorInfo]>,
    count: &mut c_uint,
  ) -> c_int {
    fill_infos(buf, count);
    RES_OK
  }

  fn list_feature_extractor_params(
    &self,
    type_: &CStr,
    buf: Option<&mut [FeatureExtractorParameter]>,
    count: &mut c_uint,
  ) -> c_int {
    let names: &[&str] = match type_.to_bytes() {
      b"HOG" => &["cellSizeX", "cellSizeY"],
      b"Caffe" => &[],
      _ => return SETTINGS_RES_UNKNOWN_FEATURE_EXTRACTOR,
    };
    match buf {
      None => *count = names.len() as c_uint,
      Some(buf) => {
        for (slot, name) in buf.iter_mut().zip(names.iter()) {
          string_to_fixed(name, &mut slot.name);
          slot.type_ = PARAM_TYPE_INT;
          slot.val.int_val = 8;
        }
        *count = buf.len().min(names.len()) as c_uint;
      }
    }
    RES_OK
  }

  fn feature_extractor_list_params(
    &self,
    buf: Option<&mut [FeatureExtractorParameter]>,
    count: &mut c_uint,
  ) -> c_int {
    let state = self.state();
    let mut ints: Vec<(&String, &i32)> = state.int_params.iter().collect();
    ints.sort();
    let mut strings: Vec<(&String, &CString)> = state.string_params.iter().collect();
    strings.sort();
    let total = ints.len() + strings.len();
    match buf {
      None => *count = total as c_uint,
      Some(buf) => {
        let mut slots = buf.iter_mut();
        for ((name, value), slot) in ints.iter().zip(&mut slots) {
          string_to_fixed(name, &mut slot.name);
          slot.type_ = PARAM_TYPE_INT;
          slot.val.int_val = **value;
        }
        for ((name, value), slot) in strings.iter().zip(&mut slots) {
          string_to_fixed(name, &mut slot.name);
          slot.type_ = PARAM_TYPE_STRING;
          slot.val.string_val = value.as_ptr();
        }
        *count = buf.len().min(total) as c_uint;
      }
    }
    RES_OK
  }

  fn feature_extractor_set_int_param(&self, name: &CStr, value: i32) -> c_int {
    let mut state = self.state();
    let name = name.to_string_lossy().into_owned();
    if !state.int_params.contains_key(&name) {
      return SETTINGS_RES_UNKNOWN_PARAMETER;
    }
    if value <= 0 {
      return SETTINGS_RES_INVALID_PARAMETER_VALUE;
    }
    state.int_params.insert(name, value);
    RES_OK
  }

  fn feature_extractor_set_scalar_param(&self, _name: &CStr, _value: f32) -> c_int {
    SETTINGS_RES_UNKNOWN_PARAMETER
  }

  fn feature_extractor_set_string_param(&self, name: &CStr, value: &CStr) -> c_int {
    let mut state = self.state();
    state
      .string_params
      .insert(name.to_string_lossy().into_owned(), value.to_owned());
    RES_OK
  }

  fn get_image_repository_type(&self) -> String {
    "ImageNet".into()
  }

  fn check_repository_directory(&self, repo_directory: &CStr) -> Result<(), String> {
    if path_of(repo_directory).is_dir() {
      Ok(())
    } else {
      Err("The specified directory could not be found.".into())
    }
  }

  fn list_synsets(
    &self,
    repo_directory: &CStr,
    buf: Option<&mut [SynsetSearchResult]>,
    count: &mut c_uint,
  ) -> c_int {
    if !path_of(repo_directory).is_dir() {
      return IMGREPO_RES_INVALID_REPOSITORY;
    }
    let all = [("n02119789", "kit fox, Vulpes macrotis"), ("n02958343", "car, auto")];
    match buf {
      None => *count = all.len() as c_uint,
      Some(buf) => {
        for (slot, (id, descr)) in buf.iter_mut().zip(all.iter()) {
          string_to_fixed(id, &mut slot.synset_id);
          string_to_fixed(descr, &mut slot.description);
        }
        *count = buf.len().min(all.len()) as c_uint;
      }
    }
    RES_OK
  }

  fn search_synsets(
    &self,
    repo_directory: &CStr,
    phrase: &CStr,
    buf: &mut [SynsetSearchResult],
    count: &mut c_uint,
  ) -> c_int {
    if !path_of(repo_directory).is_dir() {
      return IMGREPO_RES_INVALID_REPOSITORY;
    }
    let phrase = phrase.to_string_lossy();
    let all = [("n02119789", "kit fox, Vulpes macrotis"), ("n02958343", "car, auto")];
    let mut n = 0;
    for (id, descr) in all.iter().filter(|(_, d)| d.contains(phrase.as_ref())) {
      if n >= buf.len() {
        break;
      }
      string_to_fixed(id, &mut buf[n].synset_id);
      string_to_fixed(descr, &mut buf[n].description);
      buf[n].score = 1.0;
      n += 1;
    }
    *count = n as c_uint;
    RES_OK
  }

  fn extract_images_from_synset(
    &self,
    repo_directory: &CStr,
    _synset_id: &CStr,
    out_directory: &CStr,
    num_images: &mut c_uint,
  ) -> c_int {
    if !path_of(repo_directory).is_dir() {
      return IMGREPO_RES_INVALID_REPOSITORY;
    }
    if !path_of(out_directory).is_dir() {
      return RES_DIRECTORY_NOT_FOUND;
    }
    *num_images = (*num_images).min(4);
    RES_OK
  }

  fn extract_samples_from_synset(
    &self,
    repo_directory: &CStr,
    synset_id: &CStr,
    out_directory: &CStr,
    num_samples: &mut c_uint,
  ) -> c_int {
    self.extract_images_from_synset(repo_directory, synset_id, out_directory, num_samples)
  }

  fn extract_mixed_images(
    &self,
    repo_directory: &CStr,
    out_directory: &CStr,
    _num_images: u32,
    _per_synset: u32,
  ) -> c_int {
    if !path_of(repo_directory).is_dir() {
      return IMGREPO_RES_INVALID_REPOSITORY;
    }
    if !path_of(out_directory).is_dir() {
      return RES_DIRECTORY_NOT_FOUND;
    }
    RES_OK
  }
}
