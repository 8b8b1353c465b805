// 该文件是 Artos 项目的一部分。
// src/ffi/types.rs - libartos 的 C 结构体布局
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::ffi::{CStr, c_char, c_float, c_int, c_uint};

/// 会话句柄，0 表示无效
pub type Handle = c_uint;

pub type ProgressCallback = extern "C" fn(c_uint, c_uint) -> bool;
pub type OverallProgressCallback = extern "C" fn(c_uint, c_uint, c_uint, c_uint) -> bool;

pub const PARAM_TYPE_INT: c_uint = 0;
pub const PARAM_TYPE_SCALAR: c_uint = 1;
pub const PARAM_TYPE_STRING: c_uint = 2;

pub const THOPT_NONE: c_uint = 0;
pub const THOPT_OVERLAPPING: c_uint = 1;
pub const THOPT_LOOCV: c_uint = 2;

/// 单个检测结果，`right`/`bottom` 位于框外
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FlatDetection {
  pub classname: [c_char; 44],
  pub synset_id: [c_char; 16],
  pub score: c_float,
  pub left: c_int,
  pub top: c_int,
  pub right: c_int,
  pub bottom: c_int,
}

impl Default for FlatDetection {
  fn default() -> Self {
    FlatDetection {
      classname: [0; 44],
      synset_id: [0; 16],
      score: 0.0,
      left: 0,
      top: 0,
      right: 0,
      bottom: 0,
    }
  }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlatBoundingBox {
  pub left: c_uint,
  pub top: c_uint,
  pub width: c_uint,
  pub height: c_uint,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RawTestResult {
  pub threshold: f64,
  pub tp: c_uint,
  pub fp: c_uint,
  pub np: c_uint,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractorInfo {
  pub type_: [c_char; 28],
  pub name: [c_char; 100],
}

impl Default for FeatureExtractorInfo {
  fn default() -> Self {
    FeatureExtractorInfo {
      type_: [0; 28],
      name: [0; 100],
    }
  }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union FeatureExtractorParameterValue {
  pub int_val: c_int,
  pub scalar_val: c_float,
  pub string_val: *const c_char,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct FeatureExtractorParameter {
  pub name: [c_char; 52],
  pub type_: c_uint,
  pub val: FeatureExtractorParameterValue,
}

impl Default for FeatureExtractorParameter {
  fn default() -> Self {
    FeatureExtractorParameter {
      name: [0; 52],
      type_: PARAM_TYPE_INT,
      val: FeatureExtractorParameterValue { int_val: 0 },
    }
  }
}

/// 从库中读出的参数值
#[derive(Debug, Clone, PartialEq)]
pub enum RawParamValue {
  Int(i32),
  Scalar(f32),
  String(String),
}

impl FeatureExtractorParameter {
  pub fn name(&self) -> String {
    fixed_to_string(&self.name)
  }

  /// 按 `type_` 解释联合体。字符串指针归库所有，仅在下一次库调用前有效，
  /// 因此这里立即拷贝。
  pub fn value(&self) -> Option<RawParamValue> {
    match self.type_ {
      PARAM_TYPE_INT => Some(RawParamValue::Int(unsafe { self.val.int_val })),
      PARAM_TYPE_SCALAR => Some(RawParamValue::Scalar(unsafe { self.val.scalar_val })),
      PARAM_TYPE_STRING => {
        let ptr = unsafe { self.val.string_val };
        if ptr.is_null() {
          return None;
        }
        let s = unsafe { CStr::from_ptr(ptr) };
        Some(RawParamValue::String(s.to_string_lossy().into_owned()))
      }
      _ => None,
    }
  }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SynsetSearchResult {
  pub synset_id: [c_char; 32],
  pub description: [c_char; 220],
  pub score: c_float,
}

impl Default for SynsetSearchResult {
  fn default() -> Self {
    SynsetSearchResult {
      synset_id: [0; 32],
      description: [0; 220],
      score: 0.0,
    }
  }
}

/// 定长 C 字符数组转字符串，遇到第一个 NUL 截断
pub fn fixed_to_string(buf: &[c_char]) -> String {
  let bytes: Vec<u8> = buf.iter().take_while(|&&c| c != 0).map(|&c| c as u8).collect();
  String::from_utf8_lossy(&bytes).into_owned()
}

/// 字符串写入定长 C 字符数组，保留结尾 NUL
pub fn string_to_fixed(s: &str, buf: &mut [c_char]) {
  buf.fill(0);
  let n = s.len().min(buf.len().saturating_sub(1));
  for (dst, src) in buf.iter_mut().zip(s.as_bytes()[..n].iter()) {
    *dst = *src as c_char;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fixed_strings_stop_at_nul() {
    let mut buf = [0 as c_char; 16];
    string_to_fixed("n02119789", &mut buf);
    assert_eq!(fixed_to_string(&buf), "n02119789");
  }

  #[test]
  fn fixed_strings_are_truncated_to_capacity() {
    let mut buf = [0 as c_char; 4];
    string_to_fixed("abcdef", &mut buf);
    assert_eq!(fixed_to_string(&buf), "abc");
    assert_eq!(buf[3], 0);
  }

  #[test]
  fn parameter_value_follows_type_tag() {
    let mut param = FeatureExtractorParameter::default();
    string_to_fixed("cellSizeX", &mut param.name);
    param.val.int_val = 8;
    assert_eq!(param.name(), "cellSizeX");
    assert_eq!(param.value(), Some(RawParamValue::Int(8)));

    param.type_ = PARAM_TYPE_STRING;
    param.val.string_val = c"pool5".as_ptr();
    assert_eq!(param.value(), Some(RawParamValue::String("pool5".into())));

    param.val.string_val = std::ptr::null();
    assert_eq!(param.value(), None);
  }
}
