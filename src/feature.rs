// 该文件是 Artos 项目的一部分。
// src/feature.rs - 特征提取器设置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! 默认特征提取器是库的进程级状态，新建的检测器与学习器都会使用它。

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
  ffi::{
    ArtosError, Backend, FeatureExtractorInfo, FeatureExtractorParameter, LibArtos, RawParamValue,
    c_string, check, fixed_to_string, query_buffer,
  },
  model::ParamValue,
  session::SessionError,
};

impl From<RawParamValue> for ParamValue {
  fn from(raw: RawParamValue) -> Self {
    match raw {
      RawParamValue::Int(v) => ParamValue::Int(v as i64),
      RawParamValue::Scalar(v) => ParamValue::Scalar(v as f64),
      RawParamValue::String(v) => ParamValue::String(v),
    }
  }
}

/// 列出库提供的全部特征提取器，返回 (类型, 名称)
pub fn list<B: Backend>(backend: &B) -> Result<Vec<(String, String)>, SessionError> {
  let infos: Vec<FeatureExtractorInfo> =
    query_buffer(|buf, count| backend.list_feature_extractors(buf, count))?;
  Ok(
    infos
      .iter()
      .map(|i| (fixed_to_string(&i.type_), fixed_to_string(&i.name)))
      .collect(),
  )
}

fn current_type<B: Backend>(backend: &B) -> Result<(String, String), SessionError> {
  let mut info = FeatureExtractorInfo::default();
  check(backend.feature_extractor_get_info(&mut info))?;
  Ok((fixed_to_string(&info.type_), fixed_to_string(&info.name)))
}

/// 某种特征提取器及其参数。
///
/// 参数在第一次读取时缓存；对非默认提取器设置的参数只记录在缓存中，
/// 在 [`FeatureExtractor::set_as_default`] 时一并写入库。
pub struct FeatureExtractor<B: Backend = LibArtos> {
  backend: Arc<B>,
  type_: String,
  name: String,
  params: Option<Vec<(String, ParamValue)>>,
}

impl<B: Backend> FeatureExtractor<B> {
  /// 当前的默认特征提取器
  pub fn current(backend: Arc<B>) -> Result<Self, SessionError> {
    let (type_, name) = current_type(backend.as_ref())?;
    Ok(FeatureExtractor {
      backend,
      type_,
      name,
      params: None,
    })
  }

  pub fn of_type(backend: Arc<B>, type_: &str) -> Result<Self, SessionError> {
    let (type_, name) = list(backend.as_ref())?
      .into_iter()
      .find(|(t, _)| t == type_)
      .ok_or(ArtosError::UnknownFeatureExtractor)?;
    Ok(FeatureExtractor {
      backend,
      type_,
      name,
      params: None,
    })
  }

  /// 类型标识，例如 `HOG`
  pub fn type_name(&self) -> &str {
    &self.type_
  }

  /// 可读的名称
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn is_default(&self) -> Result<bool, SessionError> {
    Ok(current_type(self.backend.as_ref())?.0 == self.type_)
  }

  /// 设为默认特征提取器，并写入缓存中的参数
  pub fn set_as_default(&mut self) -> Result<(), SessionError> {
    check(self.backend.change_feature_extractor(&c_string(&self.type_)?))?;
    info!("默认特征提取器切换为 {}", self.type_);
    if let Some(params) = self.params.clone() {
      for (name, value) in &params {
        self.apply(name, value)?;
      }
    }
    Ok(())
  }

  /// 默认提取器给出当前值，否则给出默认值
  pub fn params(&mut self) -> Result<&[(String, ParamValue)], SessionError> {
    if self.params.is_none() {
      let raw: Vec<FeatureExtractorParameter> = if self.is_default()? {
        query_buffer(|buf, count| self.backend.feature_extractor_list_params(buf, count))?
      } else {
        let type_ = c_string(&self.type_)?;
        query_buffer(|buf, count| {
          self
            .backend
            .list_feature_extractor_params(&type_, buf, count)
        })?
      };
      let mut params = Vec::with_capacity(raw.len());
      for p in &raw {
        match p.value() {
          Some(value) => params.push((p.name(), value.into())),
          None => debug!("无法读取参数 {} 的值", p.name()),
        }
      }
      self.params = Some(params);
    }
    Ok(self.params.as_deref().unwrap_or_default())
  }

  pub fn param(&mut self, name: &str) -> Result<Option<ParamValue>, SessionError> {
    Ok(
      self
        .params()?
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.clone()),
    )
  }

  /// 设置参数，类型由值决定
  pub fn set_param(&mut self, name: &str, value: ParamValue) -> Result<(), SessionError> {
    if self.is_default()? {
      self.apply(name, &value)?;
    }
    self.params()?;
    if let Some(params) = self.params.as_mut() {
      match params.iter_mut().find(|(n, _)| n == name) {
        Some(slot) => slot.1 = value,
        None => params.push((name.to_string(), value)),
      }
    }
    Ok(())
  }

  fn apply(&self, name: &str, value: &ParamValue) -> Result<(), SessionError> {
    let name_c = c_string(name)?;
    let code = match value {
      ParamValue::Int(v) => {
        let v = i32::try_from(*v)
          .map_err(|_| SessionError::InvalidArgument(format!("参数 {} 超出范围: {}", name, v)))?;
        self.backend.feature_extractor_set_int_param(&name_c, v)
      }
      ParamValue::Scalar(v) => self
        .backend
        .feature_extractor_set_scalar_param(&name_c, *v as f32),
      ParamValue::String(v) => self
        .backend
        .feature_extractor_set_string_param(&name_c, &c_string(v)?),
    };
    check(code)?;
    debug!("{}: {} = {}", self.type_, name, value);
    Ok(())
  }
}
