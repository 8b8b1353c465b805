// 该文件是 Artos 项目的一部分。
// src/input.rs - 送入会话的图像样本
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, ffi::RawImage};

#[cfg(feature = "read_image_file")]
mod image_file;
#[cfg(feature = "read_image_file")]
pub use self::image_file::{ImageFileError, ImageFileSample};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("图像文件错误: {0}")]
  ImageFile(#[from] ImageFileError),
  #[error("像素数据长度 {len} 与尺寸 {width}x{height} ({channels} 通道) 不符")]
  InvalidDimensions {
    len: usize,
    width: u32,
    height: u32,
    channels: usize,
  },
  #[error("不支持的图像格式: {0}")]
  UnsupportedFormat(PathBuf),
  #[error("URL 路径无效: {0}")]
  InvalidPath(String),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 按行存储的 RGB 或灰度像素
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPixels {
  data: Vec<u8>,
  width: u32,
  height: u32,
  grayscale: bool,
}

impl RawPixels {
  pub fn new(data: Vec<u8>, width: u32, height: u32, grayscale: bool) -> Result<Self, InputError> {
    let channels = if grayscale { 1 } else { 3 };
    if width == 0 || height == 0 || data.len() != width as usize * height as usize * channels {
      return Err(InputError::InvalidDimensions {
        len: data.len(),
        width,
        height,
        channels,
      });
    }
    Ok(RawPixels {
      data,
      width,
      height,
      grayscale,
    })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn is_grayscale(&self) -> bool {
    self.grayscale
  }

  pub fn data(&self) -> &[u8] {
    &self.data
  }

  pub fn as_raw(&self) -> RawImage<'_> {
    RawImage {
      data: &self.data,
      width: self.width,
      height: self.height,
      grayscale: self.grayscale,
    }
  }
}

/// 交给检测、学习或评估会话的一张图像
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sample {
  /// JPEG 文件，由库直接解码
  JpegFile(PathBuf),
  Raw(RawPixels),
}

const JPEG_SCHEME: &str = "jpeg";

pub fn is_jpeg(path: &Path) -> bool {
  path
    .extension()
    .and_then(|e| e.to_str())
    .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
}

/// URL 路径按百分号编码解码
pub(crate) fn url_path(url: &Url) -> Result<PathBuf, InputError> {
  urlencoding::decode(url.path())
    .map(|p| PathBuf::from(p.into_owned()))
    .map_err(|_| InputError::InvalidPath(url.path().to_string()))
}

impl Sample {
  /// JPEG 文件走库的快速路径，其余格式先解码为像素
  pub fn open(path: impl AsRef<Path>) -> Result<Sample, InputError> {
    let path = path.as_ref();
    if is_jpeg(path) {
      return Ok(Sample::JpegFile(path.to_path_buf()));
    }
    #[cfg(feature = "read_image_file")]
    {
      Ok(Sample::Raw(ImageFileSample::open(path, false)?.into_pixels()))
    }
    #[cfg(not(feature = "read_image_file"))]
    {
      Err(InputError::UnsupportedFormat(path.to_path_buf()))
    }
  }

  pub fn describe(&self) -> String {
    match self {
      Sample::JpegFile(path) => path.display().to_string(),
      Sample::Raw(p) => format!(
        "{}x{} {}",
        p.width,
        p.height,
        if p.grayscale { "灰度图像" } else { "RGB 图像" }
      ),
    }
  }
}

impl From<RawPixels> for Sample {
  fn from(pixels: RawPixels) -> Self {
    Sample::Raw(pixels)
  }
}

impl FromUrl for Sample {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      JPEG_SCHEME => Ok(Sample::JpegFile(url_path(url)?)),
      #[cfg(feature = "read_image_file")]
      ImageFileSample::SCHEME => Ok(Sample::Raw(ImageFileSample::from_url(url)?.into_pixels())),
      other => {
        error!("不支持的样本 URI 方案: {}", other);
        Err(InputError::SchemeMismatch)
      }
    }
  }
}

impl FromUrlWithScheme for Sample {
  const SCHEME: &'static str = JPEG_SCHEME;
}
