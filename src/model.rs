// 该文件是 Artos 项目的一部分。
// src/model.rs - 混合模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{fmt, path::Path};

mod codec;
pub use self::codec::{CodecError, parse, serialize};

#[cfg(feature = "visualize")]
mod hog;
#[cfg(feature = "visualize")]
pub use self::hog::{HOG_UNSIGNED_BINS, hog_image};

/// HOG 特征的维数
pub const HOG_FEATURES: usize = 32;

/// 模型文件格式版本。v1 没有文件头，隐含 8x8 单元的 HOG 特征。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatVersion {
  V1,
  #[default]
  V2,
}

/// 特征提取器参数值
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
  Int(i64),
  Scalar(f64),
  String(String),
}

impl ParamValue {
  /// 依次尝试整数、浮点数，否则作为字符串
  pub fn infer(token: &str) -> ParamValue {
    if let Ok(v) = token.parse::<i64>() {
      ParamValue::Int(v)
    } else if let Ok(v) = token.parse::<f64>() {
      ParamValue::Scalar(v)
    } else {
      ParamValue::String(token.to_string())
    }
  }
}

impl fmt::Display for ParamValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ParamValue::Int(v) => write!(f, "{}", v),
      // 保留小数点，重新读取时仍为浮点数
      ParamValue::Scalar(v) => write!(f, "{:?}", v),
      ParamValue::String(v) => write!(f, "{}", v),
    }
  }
}

/// 分量中的一个部件，权重按 行、列、特征 的顺序平铺存放
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
  rows: usize,
  cols: usize,
  features: usize,
  data: Vec<f64>,
  pub offset: (i32, i32),
  pub deformation: [f64; 4],
}

impl Part {
  pub fn new(
    rows: usize,
    cols: usize,
    features: usize,
    data: Vec<f64>,
    offset: (i32, i32),
    deformation: [f64; 4],
  ) -> Result<Part, CodecError> {
    if rows == 0 || cols == 0 || features == 0 {
      return Err(CodecError::Invalid(format!(
        "部件尺寸不能为零: {}x{}x{}",
        rows, cols, features
      )));
    }
    let expected = rows.checked_mul(cols).and_then(|n| n.checked_mul(features));
    if expected != Some(data.len()) {
      return Err(CodecError::Invalid(format!(
        "部件数据长度 {} 与尺寸 {}x{}x{} 不符",
        data.len(),
        rows,
        cols,
        features
      )));
    }
    Ok(Part {
      rows,
      cols,
      features,
      data,
      offset,
      deformation,
    })
  }

  pub fn rows(&self) -> usize {
    self.rows
  }

  pub fn cols(&self) -> usize {
    self.cols
  }

  pub fn features(&self) -> usize {
    self.features
  }

  pub fn data(&self) -> &[f64] {
    &self.data
  }

  /// 单元 `(row, col)` 的特征向量
  pub fn cell(&self, row: usize, col: usize) -> &[f64] {
    let start = (row * self.cols + col) * self.features;
    &self.data[start..start + self.features]
  }

  pub fn row(&self, row: usize) -> &[f64] {
    let len = self.cols * self.features;
    &self.data[row * len..(row + 1) * len]
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Component {
  pub bias: f64,
  pub parts: Vec<Part>,
}

impl Component {
  /// 第一个部件为根部件
  pub fn root(&self) -> Option<&Part> {
    self.parts.first()
  }
}

/// 由若干分量组成的混合模型
#[derive(Debug, Clone, PartialEq)]
pub struct Mixture {
  pub feature_type: String,
  pub parameters: Vec<(String, ParamValue)>,
  components: Vec<Component>,
  pub format: FormatVersion,
}

impl Mixture {
  /// 校验分量与部件的数量，以及同一分量内特征维数一致
  pub fn new(
    feature_type: impl Into<String>,
    parameters: Vec<(String, ParamValue)>,
    components: Vec<Component>,
  ) -> Result<Mixture, CodecError> {
    let feature_type = feature_type.into();
    if feature_type.trim().is_empty() || feature_type.contains(char::is_whitespace) {
      return Err(CodecError::Invalid(format!(
        "特征提取器类型无效: {:?}",
        feature_type
      )));
    }
    if components.is_empty() {
      return Err(CodecError::Invalid("模型至少需要一个分量".into()));
    }
    for (i, comp) in components.iter().enumerate() {
      let Some(root) = comp.root() else {
        return Err(CodecError::Invalid(format!("分量 {} 没有部件", i)));
      };
      if let Some(p) = comp.parts.iter().position(|p| p.features != root.features) {
        return Err(CodecError::Invalid(format!(
          "分量 {} 的部件 {} 特征维数与根部件不一致",
          i, p
        )));
      }
    }
    Ok(Mixture {
      feature_type,
      parameters,
      components,
      format: FormatVersion::V2,
    })
  }

  /// v1 格式隐含的 HOG 参数
  pub fn v1_parameters() -> Vec<(String, ParamValue)> {
    vec![
      ("cellSizeX".to_string(), ParamValue::Int(8)),
      ("cellSizeY".to_string(), ParamValue::Int(8)),
    ]
  }

  pub fn load(path: impl AsRef<Path>) -> Result<Mixture, CodecError> {
    codec::read_file(path.as_ref())
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CodecError> {
    codec::write_file(path.as_ref(), self)
  }

  pub fn components(&self) -> &[Component] {
    &self.components
  }

  pub fn num_components(&self) -> usize {
    self.components.len()
  }

  pub fn parameter(&self, name: &str) -> Option<&ParamValue> {
    self
      .parameters
      .iter()
      .find(|(k, _)| k == name)
      .map(|(_, v)| v)
  }

  pub fn set_component_bias(&mut self, index: usize, bias: f64) -> Result<(), CodecError> {
    let len = self.components.len();
    let comp = self
      .components
      .get_mut(index)
      .ok_or(CodecError::IndexOutOfRange { index, len })?;
    comp.bias = bias;
    Ok(())
  }

  /// 移除一个分量。模型不能没有分量，因此最后一个分量不可移除。
  pub fn remove_component(&mut self, index: usize) -> Result<Component, CodecError> {
    let len = self.components.len();
    if index >= len {
      return Err(CodecError::IndexOutOfRange { index, len });
    }
    if len == 1 {
      return Err(CodecError::LastComponent);
    }
    Ok(self.components.remove(index))
  }

  /// 追加另一个同类型模型的全部分量
  pub fn merge(&mut self, other: Mixture) -> Result<(), CodecError> {
    if other.feature_type != self.feature_type {
      return Err(CodecError::TypeMismatch(
        self.feature_type.clone(),
        other.feature_type,
      ));
    }
    self.components.extend(other.components);
    Ok(())
  }
}

impl std::str::FromStr for Mixture {
  type Err = CodecError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    parse(s)
  }
}

impl fmt::Display for Mixture {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&serialize(self))
  }
}
