// 该文件是 Artos 项目的一部分。
// src/ffi.rs - libartos 的 C 接口
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! 原生库边界。`Backend` 是 libartos 导出函数的安全镜像：字符串以 `&CStr`
//! 传入，缓冲区以切片传入，回调以闭包传入。会话类型对 `Backend` 泛型，
//! 运行时使用动态加载的 [`LibArtos`]。

use std::{
  ffi::{CStr, CString, c_int, c_uint},
  path::{Path, PathBuf},
};

use thiserror::Error;

mod library;
pub mod progress;
pub mod status;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use self::{
  library::{LibArtos, LoadError},
  progress::{OverallProgressFn, ProgressFn},
  status::{ArtosError, check},
  types::*,
};

/// 原始像素数据，按行存储，RGB 或灰度
#[derive(Debug, Clone, Copy)]
pub struct RawImage<'a> {
  pub data: &'a [u8],
  pub width: u32,
  pub height: u32,
  pub grayscale: bool,
}

/// 一次性学习函数的参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearnParams {
  pub add: bool,
  pub max_aspect_clusters: u32,
  pub max_who_clusters: u32,
  pub th_opt_num_positive: u32,
  pub th_opt_num_negative: u32,
  pub th_opt_mode: c_uint,
}

impl Default for LearnParams {
  fn default() -> Self {
    LearnParams {
      add: true,
      max_aspect_clusters: 2,
      max_who_clusters: 3,
      th_opt_num_positive: 0,
      th_opt_num_negative: 0,
      th_opt_mode: THOPT_LOOCV,
    }
  }
}

/// libartos 导出函数。返回 `c_int` 的方法遵循库的状态码约定；
/// 带 `buf` 与 `count` 的方法遵循“先以空缓冲区查询容量、再填充”的约定，
/// 实现必须在调用前把 `count` 设为切片长度。
pub trait Backend: Send + Sync {
  // 检测
  fn create_detector(&self, overlap: f64, interval: i32, debug: bool) -> Handle;
  fn destroy_detector(&self, detector: Handle);
  fn add_model(
    &self,
    detector: Handle,
    classname: &CStr,
    modelfile: &CStr,
    threshold: f64,
    synset_id: Option<&CStr>,
  ) -> c_int;
  fn add_models(&self, detector: Handle, listfile: &CStr) -> c_int;
  fn add_model_from_learner(
    &self,
    detector: Handle,
    classname: &CStr,
    learner: Handle,
    threshold: f64,
    synset_id: Option<&CStr>,
  ) -> c_int;
  fn num_feature_extractors_in_detector(&self, detector: Handle) -> c_int;
  fn detect_file_jpeg(
    &self,
    detector: Handle,
    imagefile: &CStr,
    buf: &mut [FlatDetection],
    count: &mut c_uint,
  ) -> c_int;
  fn detect_raw(
    &self,
    detector: Handle,
    image: RawImage<'_>,
    buf: &mut [FlatDetection],
    count: &mut c_uint,
  ) -> c_int;
  /// 旧版本库没有该函数时返回 `None`
  fn detect_file_featuredump(
    &self,
    detector: Handle,
    dumpfile: &CStr,
    width: u32,
    height: u32,
    buf: &mut [FlatDetection],
    count: &mut c_uint,
  ) -> Option<c_int>;

  // 学习
  fn learn_imagenet(
    &self,
    repo_directory: &CStr,
    synset_id: &CStr,
    bg_file: &CStr,
    modelfile: &CStr,
    params: &LearnParams,
    progress: Option<&mut OverallProgressFn<'_>>,
    debug: bool,
  ) -> c_int;
  /// `bboxes` 为空或与 `imagefiles` 等长
  fn learn_files_jpeg(
    &self,
    imagefiles: &[&CStr],
    bboxes: &[FlatBoundingBox],
    bg_file: &CStr,
    modelfile: &CStr,
    params: &LearnParams,
    progress: Option<&mut OverallProgressFn<'_>>,
    debug: bool,
  ) -> c_int;
  fn create_learner(&self, bg_file: &CStr, repo_directory: &CStr, loocv: bool, debug: bool)
  -> Handle;
  fn destroy_learner(&self, learner: Handle);
  fn learner_add_synset(&self, learner: Handle, synset_id: &CStr, max_samples: u32) -> c_int;
  fn learner_add_file_jpeg(
    &self,
    learner: Handle,
    imagefile: &CStr,
    bboxes: &[FlatBoundingBox],
  ) -> c_int;
  fn learner_add_raw(&self, learner: Handle, image: RawImage<'_>, bboxes: &[FlatBoundingBox])
  -> c_int;
  fn learner_run(
    &self,
    learner: Handle,
    max_aspect_clusters: u32,
    max_who_clusters: u32,
    progress: Option<&mut ProgressFn<'_>>,
  ) -> c_int;
  fn learner_optimize_th(
    &self,
    learner: Handle,
    max_positive: u32,
    num_negative: u32,
    progress: Option<&mut ProgressFn<'_>>,
  ) -> c_int;
  fn learner_save(&self, learner: Handle, modelfile: &CStr, add: bool) -> c_int;
  fn learner_reset(&self, learner: Handle) -> c_int;
  fn learn_bg(
    &self,
    repo_directory: &CStr,
    bg_file: &CStr,
    num_images: u32,
    max_offset: u32,
    progress: Option<&mut OverallProgressFn<'_>>,
    accurate_autocorrelation: bool,
  ) -> c_int;

  // 评估
  fn evaluator_add_samples_from_synset(
    &self,
    detector: Handle,
    repo_directory: &CStr,
    synset_id: &CStr,
    num_negative: u32,
  ) -> c_int;
  fn evaluator_add_positive_file(
    &self,
    detector: Handle,
    imagefile: &CStr,
    annotation_file: &CStr,
  ) -> c_int;
  fn evaluator_add_positive_file_jpeg(
    &self,
    detector: Handle,
    imagefile: &CStr,
    bboxes: &[FlatBoundingBox],
  ) -> c_int;
  fn evaluator_add_positive_raw(
    &self,
    detector: Handle,
    image: RawImage<'_>,
    bboxes: &[FlatBoundingBox],
  ) -> c_int;
  fn evaluator_add_negative_file_jpeg(&self, detector: Handle, imagefile: &CStr) -> c_int;
  fn evaluator_add_negative_raw(&self, detector: Handle, image: RawImage<'_>) -> c_int;
  fn evaluator_run(
    &self,
    detector: Handle,
    granularity: u32,
    eq_overlap: f64,
    progress: Option<&mut ProgressFn<'_>>,
  ) -> c_int;
  fn evaluator_get_raw_results(
    &self,
    detector: Handle,
    buf: Option<&mut [RawTestResult]>,
    count: &mut c_uint,
    model_index: u32,
  ) -> c_int;
  fn evaluator_get_max_fmeasure(
    &self,
    detector: Handle,
    fmeasure: &mut f32,
    threshold: &mut f32,
    model_index: u32,
  ) -> c_int;
  fn evaluator_get_fmeasure_at(
    &self,
    detector: Handle,
    threshold: f32,
    fmeasure: &mut f32,
    model_index: u32,
  ) -> c_int;
  fn evaluator_get_ap(&self, detector: Handle, ap: &mut f32, model_index: u32) -> c_int;
  fn evaluator_dump_results(&self, detector: Handle, dump_file: &CStr) -> c_int;

  // 特征提取器
  fn change_feature_extractor(&self, type_: &CStr) -> c_int;
  fn feature_extractor_get_info(&self, info: &mut FeatureExtractorInfo) -> c_int;
  fn list_feature_extractors(
    &self,
    buf: Option<&mut [FeatureExtractorInfo]>,
    count: &mut c_uint,
  ) -> c_int;
  fn list_feature_extractor_params(
    &self,
    type_: &CStr,
    buf: Option<&mut [FeatureExtractorParameter]>,
    count: &mut c_uint,
  ) -> c_int;
  fn feature_extractor_list_params(
    &self,
    buf: Option<&mut [FeatureExtractorParameter]>,
    count: &mut c_uint,
  ) -> c_int;
  fn feature_extractor_set_int_param(&self, name: &CStr, value: i32) -> c_int;
  fn feature_extractor_set_scalar_param(&self, name: &CStr, value: f32) -> c_int;
  fn feature_extractor_set_string_param(&self, name: &CStr, value: &CStr) -> c_int;

  // 图像仓库
  fn get_image_repository_type(&self) -> String;
  /// 检查失败时返回库给出的说明
  fn check_repository_directory(&self, repo_directory: &CStr) -> Result<(), String>;
  fn list_synsets(
    &self,
    repo_directory: &CStr,
    buf: Option<&mut [SynsetSearchResult]>,
    count: &mut c_uint,
  ) -> c_int;
  fn search_synsets(
    &self,
    repo_directory: &CStr,
    phrase: &CStr,
    buf: &mut [SynsetSearchResult],
    count: &mut c_uint,
  ) -> c_int;
  fn extract_images_from_synset(
    &self,
    repo_directory: &CStr,
    synset_id: &CStr,
    out_directory: &CStr,
    num_images: &mut c_uint,
  ) -> c_int;
  fn extract_samples_from_synset(
    &self,
    repo_directory: &CStr,
    synset_id: &CStr,
    out_directory: &CStr,
    num_samples: &mut c_uint,
  ) -> c_int;
  fn extract_mixed_images(
    &self,
    repo_directory: &CStr,
    out_directory: &CStr,
    num_images: u32,
    per_synset: u32,
  ) -> c_int;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
  #[error("字符串中包含 NUL 字符: {0:?}")]
  InteriorNul(String),
  #[error("路径不是合法的 UTF-8: {0}")]
  NonUtf8Path(PathBuf),
}

pub fn c_string(s: &str) -> Result<CString, ArgumentError> {
  CString::new(s).map_err(|_| ArgumentError::InteriorNul(s.to_string()))
}

pub fn c_path(path: &Path) -> Result<CString, ArgumentError> {
  let s = path
    .to_str()
    .ok_or_else(|| ArgumentError::NonUtf8Path(path.to_path_buf()))?;
  c_string(s)
}

/// 先以空缓冲区询问容量，再分配并填充。返回的长度不会超过分配的容量。
pub fn query_buffer<T: Default + Clone>(
  mut call: impl FnMut(Option<&mut [T]>, &mut c_uint) -> c_int,
) -> Result<Vec<T>, ArtosError> {
  let mut capacity: c_uint = 0;
  check(call(None, &mut capacity))?;
  let mut buf = vec![T::default(); capacity as usize];
  if buf.is_empty() {
    return Ok(buf);
  }
  let mut written = capacity;
  check(call(Some(&mut buf), &mut written))?;
  buf.truncate((written as usize).min(capacity as usize));
  Ok(buf)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn query_buffer_sizes_then_fills() {
    let mut calls = 0;
    let values = query_buffer::<u32>(|buf, count| {
      calls += 1;
      match buf {
        None => *count = 3,
        Some(buf) => {
          assert_eq!(buf.len(), 3);
          buf.copy_from_slice(&[7, 8, 9]);
          *count = 3;
        }
      }
      0
    })
    .unwrap();
    assert_eq!(values, vec![7, 8, 9]);
    assert_eq!(calls, 2);
  }

  #[test]
  fn query_buffer_never_exceeds_capacity() {
    let values = query_buffer::<u32>(|buf, count| {
      match buf {
        None => *count = 2,
        Some(_) => *count = 10,
      }
      0
    })
    .unwrap();
    assert_eq!(values.len(), 2);
  }

  #[test]
  fn query_buffer_skips_fill_when_empty() {
    let mut calls = 0;
    let values = query_buffer::<u32>(|_, count| {
      calls += 1;
      *count = 0;
      0
    })
    .unwrap();
    assert!(values.is_empty());
    assert_eq!(calls, 1);
  }

  #[test]
  fn query_buffer_reports_status() {
    let err = query_buffer::<u32>(|_, _| status::DETECT_RES_NO_RESULTS).unwrap_err();
    assert_eq!(err, ArtosError::NoResults);
  }

  #[test]
  fn c_strings_reject_interior_nul() {
    assert!(c_string("a\0b").is_err());
    assert_eq!(c_string("bicycle").unwrap().as_bytes(), b"bicycle");
  }
}
