// 该文件是 Artos 项目的一部分。
// src/ffi/library.rs - 动态加载 libartos
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  ffi::{CStr, c_char, c_float, c_int, c_uint},
  path::{Path, PathBuf},
  ptr,
};

use libloading::Library;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{
  Backend, LearnParams, RawImage,
  progress::{OverallProgressFn, ProgressFn, with_overall_progress, with_progress},
  types::*,
};

#[derive(Error, Debug)]
pub enum LoadError {
  #[error("找不到 libartos，已尝试: {tried:?}")]
  NotFound { tried: Vec<PathBuf> },
  #[error("加载 {path} 失败: {source}")]
  Library {
    path: PathBuf,
    source: libloading::Error,
  },
}

type Str = *const c_char;

macro_rules! api {
  ($($name:ident: fn($($arg:ty),*) $(-> $ret:ty)?;)*) => {
    struct Api {
      $($name: unsafe extern "C" fn($($arg),*) $(-> $ret)?,)*
    }

    impl Api {
      unsafe fn load(lib: &Library) -> Result<Api, libloading::Error> {
        unsafe {
          Ok(Api {
            $($name: *lib.get::<unsafe extern "C" fn($($arg),*) $(-> $ret)?>(
              concat!(stringify!($name), "\0").as_bytes(),
            )?,)*
          })
        }
      }
    }
  };
}

api! {
  create_detector: fn(f64, c_int, bool) -> c_uint;
  destroy_detector: fn(c_uint);
  add_model: fn(c_uint, Str, Str, f64, Str) -> c_int;
  add_models: fn(c_uint, Str) -> c_int;
  add_model_from_learner: fn(c_uint, Str, c_uint, f64, Str) -> c_int;
  num_feature_extractors_in_detector: fn(c_uint) -> c_int;
  detect_file_jpeg: fn(c_uint, Str, *mut FlatDetection, *mut c_uint) -> c_int;
  detect_raw: fn(c_uint, *const u8, c_uint, c_uint, bool, *mut FlatDetection, *mut c_uint) -> c_int;
  learn_imagenet: fn(Str, Str, Str, Str, bool, c_uint, c_uint, c_uint, c_uint, c_uint, Option<OverallProgressCallback>, bool) -> c_int;
  learn_files_jpeg: fn(*const Str, c_uint, *const FlatBoundingBox, Str, Str, bool, c_uint, c_uint, c_uint, Option<OverallProgressCallback>, bool) -> c_int;
  create_learner: fn(Str, Str, bool, bool) -> c_uint;
  destroy_learner: fn(c_uint);
  learner_add_synset: fn(c_uint, Str, c_uint) -> c_int;
  learner_add_file_jpeg: fn(c_uint, Str, *const FlatBoundingBox, c_uint) -> c_int;
  learner_add_raw: fn(c_uint, *const u8, c_uint, c_uint, bool, *const FlatBoundingBox, c_uint) -> c_int;
  learner_run: fn(c_uint, c_uint, c_uint, Option<ProgressCallback>) -> c_int;
  learner_optimize_th: fn(c_uint, c_uint, c_uint, Option<ProgressCallback>) -> c_int;
  learner_save: fn(c_uint, Str, bool) -> c_int;
  learner_reset: fn(c_uint) -> c_int;
  learn_bg: fn(Str, Str, c_uint, c_uint, Option<OverallProgressCallback>, bool) -> c_int;
  evaluator_add_samples_from_synset: fn(c_uint, Str, Str, c_uint) -> c_int;
  evaluator_add_positive_file: fn(c_uint, Str, Str) -> c_int;
  evaluator_add_positive_file_jpeg: fn(c_uint, Str, *const FlatBoundingBox, c_uint) -> c_int;
  evaluator_add_positive_raw: fn(c_uint, *const u8, c_uint, c_uint, bool, *const FlatBoundingBox, c_uint) -> c_int;
  evaluator_add_negative_file_jpeg: fn(c_uint, Str) -> c_int;
  evaluator_add_negative_raw: fn(c_uint, *const u8, c_uint, c_uint, bool) -> c_int;
  evaluator_run: fn(c_uint, c_uint, f64, Option<ProgressCallback>) -> c_int;
  evaluator_get_raw_results: fn(c_uint, *mut RawTestResult, *mut c_uint, c_uint) -> c_int;
  evaluator_get_max_fmeasure: fn(c_uint, *mut c_float, *mut c_float, c_uint) -> c_int;
  evaluator_get_fmeasure_at: fn(c_uint, c_float, *mut c_float, c_uint) -> c_int;
  evaluator_get_ap: fn(c_uint, *mut c_float, c_uint) -> c_int;
  evaluator_dump_results: fn(c_uint, Str) -> c_int;
  change_feature_extractor: fn(Str) -> c_int;
  feature_extractor_get_info: fn(*mut FeatureExtractorInfo) -> c_int;
  list_feature_extractors: fn(*mut FeatureExtractorInfo, *mut c_uint) -> c_int;
  list_feature_extractor_params: fn(Str, *mut FeatureExtractorParameter, *mut c_uint) -> c_int;
  feature_extractor_list_params: fn(*mut FeatureExtractorParameter, *mut c_uint) -> c_int;
  feature_extractor_set_int_param: fn(Str, c_int) -> c_int;
  feature_extractor_set_scalar_param: fn(Str, c_float) -> c_int;
  feature_extractor_set_string_param: fn(Str, Str) -> c_int;
  get_image_repository_type: fn() -> Str;
  check_repository_directory: fn(Str, *mut Str) -> bool;
  list_synsets: fn(Str, *mut SynsetSearchResult, *mut c_uint) -> c_int;
  search_synsets: fn(Str, Str, *mut SynsetSearchResult, *mut c_uint) -> c_int;
  extract_images_from_synset: fn(Str, Str, Str, *mut c_uint) -> c_int;
  extract_samples_from_synset: fn(Str, Str, Str, *mut c_uint) -> c_int;
  extract_mixed_images: fn(Str, Str, c_uint, c_uint) -> c_int;
}

type DetectFeatureDumpFn =
  unsafe extern "C" fn(c_uint, Str, c_uint, c_uint, *mut FlatDetection, *mut c_uint) -> c_int;

/// 已加载的 libartos。函数指针在 `_lib` 存活期间有效。
pub struct LibArtos {
  api: Api,
  detect_file_featuredump: Option<DetectFeatureDumpFn>,
  path: PathBuf,
  _lib: Library,
}

// libartos 以句柄为单位管理状态，单个句柄上的调用由会话串行化
unsafe impl Send for LibArtos {}
unsafe impl Sync for LibArtos {}

/// 依次尝试的库位置
pub fn search_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
  let mut paths = Vec::new();
  if let Some(path) = explicit {
    paths.push(path.to_path_buf());
  }
  paths.push(PathBuf::from("./libartos.so"));
  paths.push(PathBuf::from("./bin/libartos.so"));
  if let Ok(exe) = std::env::current_exe()
    && let Some(dir) = exe.parent()
  {
    paths.push(dir.join("libartos.so"));
  }
  paths.push(PathBuf::from(libloading::library_filename("artos")));
  paths
}

impl LibArtos {
  /// 加载 libartos，`path` 优先于默认搜索位置
  pub fn load(path: Option<&Path>) -> Result<LibArtos, LoadError> {
    let tried = search_paths(path);
    for candidate in tried.iter() {
      debug!("尝试加载 libartos: {}", candidate.display());
      match Self::open(candidate) {
        Ok(lib) => {
          info!("已加载 libartos: {}", candidate.display());
          return Ok(lib);
        }
        Err(err) => debug!("加载失败: {}", err),
      }
    }
    Err(LoadError::NotFound { tried })
  }

  /// 打开指定文件，并解析所有必需的符号
  pub fn open(path: &Path) -> Result<LibArtos, LoadError> {
    let wrap = |source| LoadError::Library {
      path: path.to_path_buf(),
      source,
    };
    let lib = unsafe { Library::new(path.as_os_str()) }.map_err(wrap)?;
    let api = unsafe { Api::load(&lib) }.map_err(wrap)?;
    let detect_file_featuredump =
      unsafe { lib.get::<DetectFeatureDumpFn>(b"detect_file_featuredump\0") }
        .ok()
        .map(|sym| *sym);
    if detect_file_featuredump.is_none() {
      warn!("libartos 未导出 detect_file_featuredump，特征文件检测不可用");
    }
    Ok(LibArtos {
      api,
      detect_file_featuredump,
      path: path.to_path_buf(),
      _lib: lib,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

fn opt_ptr(s: Option<&CStr>) -> Str {
  s.map_or(ptr::null(), CStr::as_ptr)
}

fn boxes_ptr(bboxes: &[FlatBoundingBox]) -> *const FlatBoundingBox {
  if bboxes.is_empty() {
    ptr::null()
  } else {
    bboxes.as_ptr()
  }
}

fn buf_ptr<T>(buf: Option<&mut [T]>, count: &mut c_uint) -> *mut T {
  match buf {
    Some(buf) => {
      *count = buf.len() as c_uint;
      buf.as_mut_ptr()
    }
    None => ptr::null_mut(),
  }
}

impl Backend for LibArtos {
  fn create_detector(&self, overlap: f64, interval: i32, debug: bool) -> Handle {
    unsafe { (self.api.create_detector)(overlap, interval, debug) }
  }

  fn destroy_detector(&self, detector: Handle) {
    unsafe { (self.api.destroy_detector)(detector) }
  }

  fn add_model(
    &self,
    detector: Handle,
    classname: &CStr,
    modelfile: &CStr,
    threshold: f64,
    synset_id: Option<&CStr>,
  ) -> c_int {
    unsafe {
      (self.api.add_model)(
        detector,
        classname.as_ptr(),
        modelfile.as_ptr(),
        threshold,
        opt_ptr(synset_id),
      )
    }
  }

  fn add_models(&self, detector: Handle, listfile: &CStr) -> c_int {
    unsafe { (self.api.add_models)(detector, listfile.as_ptr()) }
  }

  fn add_model_from_learner(
    &self,
    detector: Handle,
    classname: &CStr,
    learner: Handle,
    threshold: f64,
    synset_id: Option<&CStr>,
  ) -> c_int {
    unsafe {
      (self.api.add_model_from_learner)(
        detector,
        classname.as_ptr(),
        learner,
        threshold,
        opt_ptr(synset_id),
      )
    }
  }

  fn num_feature_extractors_in_detector(&self, detector: Handle) -> c_int {
    unsafe { (self.api.num_feature_extractors_in_detector)(detector) }
  }

  fn detect_file_jpeg(
    &self,
    detector: Handle,
    imagefile: &CStr,
    buf: &mut [FlatDetection],
    count: &mut c_uint,
  ) -> c_int {
    let ptr = buf_ptr(Some(buf), count);
    unsafe { (self.api.detect_file_jpeg)(detector, imagefile.as_ptr(), ptr, count) }
  }

  fn detect_raw(
    &self,
    detector: Handle,
    image: RawImage<'_>,
    buf: &mut [FlatDetection],
    count: &mut c_uint,
  ) -> c_int {
    let ptr = buf_ptr(Some(buf), count);
    unsafe {
      (self.api.detect_raw)(
        detector,
        image.data.as_ptr(),
        image.width,
        image.height,
        image.grayscale,
        ptr,
        count,
      )
    }
  }

  fn detect_file_featuredump(
    &self,
    detector: Handle,
    dumpfile: &CStr,
    width: u32,
    height: u32,
    buf: &mut [FlatDetection],
    count: &mut c_uint,
  ) -> Option<c_int> {
    let func = self.detect_file_featuredump?;
    let ptr = buf_ptr(Some(buf), count);
    Some(unsafe { func(detector, dumpfile.as_ptr(), width, height, ptr, count) })
  }

  fn learn_imagenet(
    &self,
    repo_directory: &CStr,
    synset_id: &CStr,
    bg_file: &CStr,
    modelfile: &CStr,
    params: &LearnParams,
    progress: Option<&mut OverallProgressFn<'_>>,
    debug: bool,
  ) -> c_int {
    with_overall_progress(progress, |cb| unsafe {
      (self.api.learn_imagenet)(
        repo_directory.as_ptr(),
        synset_id.as_ptr(),
        bg_file.as_ptr(),
        modelfile.as_ptr(),
        params.add,
        params.max_aspect_clusters,
        params.max_who_clusters,
        params.th_opt_num_positive,
        params.th_opt_num_negative,
        params.th_opt_mode,
        cb,
        debug,
      )
    })
  }

  fn learn_files_jpeg(
    &self,
    imagefiles: &[&CStr],
    bboxes: &[FlatBoundingBox],
    bg_file: &CStr,
    modelfile: &CStr,
    params: &LearnParams,
    progress: Option<&mut OverallProgressFn<'_>>,
    debug: bool,
  ) -> c_int {
    let files: Vec<Str> = imagefiles.iter().map(|f| f.as_ptr()).collect();
    with_overall_progress(progress, |cb| unsafe {
      (self.api.learn_files_jpeg)(
        files.as_ptr(),
        files.len() as c_uint,
        boxes_ptr(bboxes),
        bg_file.as_ptr(),
        modelfile.as_ptr(),
        params.add,
        params.max_aspect_clusters,
        params.max_who_clusters,
        params.th_opt_mode,
        cb,
        debug,
      )
    })
  }

  fn create_learner(
    &self,
    bg_file: &CStr,
    repo_directory: &CStr,
    loocv: bool,
    debug: bool,
  ) -> Handle {
    unsafe { (self.api.create_learner)(bg_file.as_ptr(), repo_directory.as_ptr(), loocv, debug) }
  }

  fn destroy_learner(&self, learner: Handle) {
    unsafe { (self.api.destroy_learner)(learner) }
  }

  fn learner_add_synset(&self, learner: Handle, synset_id: &CStr, max_samples: u32) -> c_int {
    unsafe { (self.api.learner_add_synset)(learner, synset_id.as_ptr(), max_samples) }
  }

  fn learner_add_file_jpeg(
    &self,
    learner: Handle,
    imagefile: &CStr,
    bboxes: &[FlatBoundingBox],
  ) -> c_int {
    unsafe {
      (self.api.learner_add_file_jpeg)(
        learner,
        imagefile.as_ptr(),
        boxes_ptr(bboxes),
        bboxes.len() as c_uint,
      )
    }
  }

  fn learner_add_raw(
    &self,
    learner: Handle,
    image: RawImage<'_>,
    bboxes: &[FlatBoundingBox],
  ) -> c_int {
    unsafe {
      (self.api.learner_add_raw)(
        learner,
        image.data.as_ptr(),
        image.width,
        image.height,
        image.grayscale,
        boxes_ptr(bboxes),
        bboxes.len() as c_uint,
      )
    }
  }

  fn learner_run(
    &self,
    learner: Handle,
    max_aspect_clusters: u32,
    max_who_clusters: u32,
    progress: Option<&mut ProgressFn<'_>>,
  ) -> c_int {
    with_progress(progress, |cb| unsafe {
      (self.api.learner_run)(learner, max_aspect_clusters, max_who_clusters, cb)
    })
  }

  fn learner_optimize_th(
    &self,
    learner: Handle,
    max_positive: u32,
    num_negative: u32,
    progress: Option<&mut ProgressFn<'_>>,
  ) -> c_int {
    with_progress(progress, |cb| unsafe {
      (self.api.learner_optimize_th)(learner, max_positive, num_negative, cb)
    })
  }

  fn learner_save(&self, learner: Handle, modelfile: &CStr, add: bool) -> c_int {
    unsafe { (self.api.learner_save)(learner, modelfile.as_ptr(), add) }
  }

  fn learner_reset(&self, learner: Handle) -> c_int {
    unsafe { (self.api.learner_reset)(learner) }
  }

  fn learn_bg(
    &self,
    repo_directory: &CStr,
    bg_file: &CStr,
    num_images: u32,
    max_offset: u32,
    progress: Option<&mut OverallProgressFn<'_>>,
    accurate_autocorrelation: bool,
  ) -> c_int {
    with_overall_progress(progress, |cb| unsafe {
      (self.api.learn_bg)(
        repo_directory.as_ptr(),
        bg_file.as_ptr(),
        num_images,
        max_offset,
        cb,
        accurate_autocorrelation,
      )
    })
  }

  fn evaluator_add_samples_from_synset(
    &self,
    detector: Handle,
    repo_directory: &CStr,
    synset_id: &CStr,
    num_negative: u32,
  ) -> c_int {
    unsafe {
      (self.api.evaluator_add_samples_from_synset)(
        detector,
        repo_directory.as_ptr(),
        synset_id.as_ptr(),
        num_negative,
      )
    }
  }

  fn evaluator_add_positive_file(
    &self,
    detector: Handle,
    imagefile: &CStr,
    annotation_file: &CStr,
  ) -> c_int {
    unsafe {
      (self.api.evaluator_add_positive_file)(detector, imagefile.as_ptr(), annotation_file.as_ptr())
    }
  }

  fn evaluator_add_positive_file_jpeg(
    &self,
    detector: Handle,
    imagefile: &CStr,
    bboxes: &[FlatBoundingBox],
  ) -> c_int {
    unsafe {
      (self.api.evaluator_add_positive_file_jpeg)(
        detector,
        imagefile.as_ptr(),
        boxes_ptr(bboxes),
        bboxes.len() as c_uint,
      )
    }
  }

  fn evaluator_add_positive_raw(
    &self,
    detector: Handle,
    image: RawImage<'_>,
    bboxes: &[FlatBoundingBox],
  ) -> c_int {
    unsafe {
      (self.api.evaluator_add_positive_raw)(
        detector,
        image.data.as_ptr(),
        image.width,
        image.height,
        image.grayscale,
        boxes_ptr(bboxes),
        bboxes.len() as c_uint,
      )
    }
  }

  fn evaluator_add_negative_file_jpeg(&self, detector: Handle, imagefile: &CStr) -> c_int {
    unsafe { (self.api.evaluator_add_negative_file_jpeg)(detector, imagefile.as_ptr()) }
  }

  fn evaluator_add_negative_raw(&self, detector: Handle, image: RawImage<'_>) -> c_int {
    unsafe {
      (self.api.evaluator_add_negative_raw)(
        detector,
        image.data.as_ptr(),
        image.width,
        image.height,
        image.grayscale,
      )
    }
  }

  fn evaluator_run(
    &self,
    detector: Handle,
    granularity: u32,
    eq_overlap: f64,
    progress: Option<&mut ProgressFn<'_>>,
  ) -> c_int {
    with_progress(progress, |cb| unsafe {
      (self.api.evaluator_run)(detector, granularity, eq_overlap, cb)
    })
  }

  fn evaluator_get_raw_results(
    &self,
    detector: Handle,
    buf: Option<&mut [RawTestResult]>,
    count: &mut c_uint,
    model_index: u32,
  ) -> c_int {
    let ptr = buf_ptr(buf, count);
    unsafe { (self.api.evaluator_get_raw_results)(detector, ptr, count, model_index) }
  }

  fn evaluator_get_max_fmeasure(
    &self,
    detector: Handle,
    fmeasure: &mut f32,
    threshold: &mut f32,
    model_index: u32,
  ) -> c_int {
    unsafe { (self.api.evaluator_get_max_fmeasure)(detector, fmeasure, threshold, model_index) }
  }

  fn evaluator_get_fmeasure_at(
    &self,
    detector: Handle,
    threshold: f32,
    fmeasure: &mut f32,
    model_index: u32,
  ) -> c_int {
    unsafe { (self.api.evaluator_get_fmeasure_at)(detector, threshold, fmeasure, model_index) }
  }

  fn evaluator_get_ap(&self, detector: Handle, ap: &mut f32, model_index: u32) -> c_int {
    unsafe { (self.api.evaluator_get_ap)(detector, ap, model_index) }
  }

  fn evaluator_dump_results(&self, detector: Handle, dump_file: &CStr) -> c_int {
    unsafe { (self.api.evaluator_dump_results)(detector, dump_file.as_ptr()) }
  }

  fn change_feature_extractor(&self, type_: &CStr) -> c_int {
    unsafe { (self.api.change_feature_extractor)(type_.as_ptr()) }
  }

  fn feature_extractor_get_info(&self, info: &mut FeatureExtractorInfo) -> c_int {
    unsafe { (self.api.feature_extractor_get_info)(info) }
  }

  fn list_feature_extractors(
    &self,
    buf: Option<&mut [FeatureExtractorInfo]>,
    count: &mut c_uint,
  ) -> c_int {
    let ptr = buf_ptr(buf, count);
    unsafe { (self.api.list_feature_extractors)(ptr, count) }
  }

  fn list_feature_extractor_params(
    &self,
    type_: &CStr,
    buf: Option<&mut [FeatureExtractorParameter]>,
    count: &mut c_uint,
  ) -> c_int {
    let ptr = buf_ptr(buf, count);
    unsafe { (self.api.list_feature_extractor_params)(type_.as_ptr(), ptr, count) }
  }

  fn feature_extractor_list_params(
    &self,
    buf: Option<&mut [FeatureExtractorParameter]>,
    count: &mut c_uint,
  ) -> c_int {
    let ptr = buf_ptr(buf, count);
    unsafe { (self.api.feature_extractor_list_params)(ptr, count) }
  }

  fn feature_extractor_set_int_param(&self, name: &CStr, value: i32) -> c_int {
    unsafe { (self.api.feature_extractor_set_int_param)(name.as_ptr(), value) }
  }

  fn feature_extractor_set_scalar_param(&self, name: &CStr, value: f32) -> c_int {
    unsafe { (self.api.feature_extractor_set_scalar_param)(name.as_ptr(), value) }
  }

  fn feature_extractor_set_string_param(&self, name: &CStr, value: &CStr) -> c_int {
    unsafe { (self.api.feature_extractor_set_string_param)(name.as_ptr(), value.as_ptr()) }
  }

  fn get_image_repository_type(&self) -> String {
    let ptr = unsafe { (self.api.get_image_repository_type)() };
    if ptr.is_null() {
      return String::new();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
  }

  fn check_repository_directory(&self, repo_directory: &CStr) -> Result<(), String> {
    let mut msg: Str = ptr::null();
    let ok = unsafe { (self.api.check_repository_directory)(repo_directory.as_ptr(), &mut msg) };
    if ok {
      return Ok(());
    }
    if msg.is_null() {
      Err(String::new())
    } else {
      Err(unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned())
    }
  }

  fn list_synsets(
    &self,
    repo_directory: &CStr,
    buf: Option<&mut [SynsetSearchResult]>,
    count: &mut c_uint,
  ) -> c_int {
    let ptr = buf_ptr(buf, count);
    unsafe { (self.api.list_synsets)(repo_directory.as_ptr(), ptr, count) }
  }

  fn search_synsets(
    &self,
    repo_directory: &CStr,
    phrase: &CStr,
    buf: &mut [SynsetSearchResult],
    count: &mut c_uint,
  ) -> c_int {
    let ptr = buf_ptr(Some(buf), count);
    unsafe { (self.api.search_synsets)(repo_directory.as_ptr(), phrase.as_ptr(), ptr, count) }
  }

  fn extract_images_from_synset(
    &self,
    repo_directory: &CStr,
    synset_id: &CStr,
    out_directory: &CStr,
    num_images: &mut c_uint,
  ) -> c_int {
    unsafe {
      (self.api.extract_images_from_synset)(
        repo_directory.as_ptr(),
        synset_id.as_ptr(),
        out_directory.as_ptr(),
        num_images,
      )
    }
  }

  fn extract_samples_from_synset(
    &self,
    repo_directory: &CStr,
    synset_id: &CStr,
    out_directory: &CStr,
    num_samples: &mut c_uint,
  ) -> c_int {
    unsafe {
      (self.api.extract_samples_from_synset)(
        repo_directory.as_ptr(),
        synset_id.as_ptr(),
        out_directory.as_ptr(),
        num_samples,
      )
    }
  }

  fn extract_mixed_images(
    &self,
    repo_directory: &CStr,
    out_directory: &CStr,
    num_images: u32,
    per_synset: u32,
  ) -> c_int {
    unsafe {
      (self.api.extract_mixed_images)(
        repo_directory.as_ptr(),
        out_directory.as_ptr(),
        num_images,
        per_synset,
      )
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn explicit_path_is_tried_first() {
    let paths = search_paths(Some(Path::new("/opt/artos/libartos.so")));
    assert_eq!(paths[0], PathBuf::from("/opt/artos/libartos.so"));
    assert!(paths.len() > 1);
  }

  #[test]
  fn missing_explicit_library_reports_it() {
    let path = std::env::temp_dir().join("artos-missing-library-xyz.so");
    let err = LibArtos::open(&path).err().unwrap();
    assert!(matches!(err, LoadError::Library { .. }));
  }
}
