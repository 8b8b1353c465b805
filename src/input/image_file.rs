// 该文件是 Artos 项目的一部分。
// src/input/image_file.rs - 图像文件输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use image::{ColorType, DynamicImage, GrayImage, ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use super::{InputError, RawPixels, url_path};
use crate::{FromUrl, FromUrlWithScheme};

#[derive(Error, Debug)]
pub enum ImageFileError {
  #[error("URI 方案不匹配")]
  SchemaMismatch,
  #[error("I/O 错误: {0}")]
  IoError(std::io::Error),
  #[error("图像解码错误: {0}")]
  ImageLoadError(image::ImageError),
  #[error("{0}")]
  Pixels(String),
}

impl From<std::io::Error> for ImageFileError {
  fn from(err: std::io::Error) -> Self {
    ImageFileError::IoError(err)
  }
}

impl From<image::ImageError> for ImageFileError {
  fn from(err: image::ImageError) -> Self {
    ImageFileError::ImageLoadError(err)
  }
}

impl From<InputError> for ImageFileError {
  fn from(err: InputError) -> Self {
    ImageFileError::Pixels(err.to_string())
  }
}

const READ_IMAGE_FILE_SCHEME: &str = "image";

/// 解码后的图像文件。`image:///path?gray` 解码为灰度图像。
pub struct ImageFileSample {
  pixels: RawPixels,
}

impl ImageFileSample {
  pub fn open(path: &Path, grayscale: bool) -> Result<Self, ImageFileError> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    let pixels = if grayscale {
      RawPixels::from(image.to_luma8())
    } else {
      RawPixels::from(image)
    };
    debug!(
      "解码图像 {}: {}x{}",
      path.display(),
      pixels.width(),
      pixels.height()
    );
    Ok(ImageFileSample { pixels })
  }

  pub fn into_pixels(self) -> RawPixels {
    self.pixels
  }
}

impl FromUrl for ImageFileSample {
  type Error = ImageFileError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != READ_IMAGE_FILE_SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        READ_IMAGE_FILE_SCHEME,
        url.scheme()
      );
      return Err(ImageFileError::SchemaMismatch);
    }
    let grayscale = url.query_pairs().any(|(k, _)| k == "gray");
    ImageFileSample::open(&url_path(url)?, grayscale)
  }
}

impl FromUrlWithScheme for ImageFileSample {
  const SCHEME: &'static str = READ_IMAGE_FILE_SCHEME;
}

impl From<RgbImage> for RawPixels {
  fn from(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    RawPixels {
      data: image.into_raw(),
      width,
      height,
      grayscale: false,
    }
  }
}

impl From<GrayImage> for RawPixels {
  fn from(image: GrayImage) -> Self {
    let (width, height) = image.dimensions();
    RawPixels {
      data: image.into_raw(),
      width,
      height,
      grayscale: true,
    }
  }
}

/// 灰度图保持单通道，其余转换为 RGB
impl From<DynamicImage> for RawPixels {
  fn from(image: DynamicImage) -> Self {
    match image.color() {
      ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16 => {
        RawPixels::from(image.to_luma8())
      }
      _ => RawPixels::from(image.to_rgb8()),
    }
  }
}

impl RawPixels {
  /// 用于绘制，灰度图展开为三通道
  pub fn to_rgb_image(&self) -> RgbImage {
    if self.grayscale {
      let rgb = self.data.iter().flat_map(|&v| [v, v, v]).collect();
      RgbImage::from_raw(self.width, self.height, rgb).unwrap_or_default()
    } else {
      RgbImage::from_raw(self.width, self.height, self.data.clone()).unwrap_or_default()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::input::Sample;

  #[test]
  fn gray_images_stay_single_channel() {
    let gray = GrayImage::from_pixel(3, 2, image::Luma([7]));
    let pixels = RawPixels::from(DynamicImage::ImageLuma8(gray));
    assert!(pixels.is_grayscale());
    assert_eq!(pixels.data().len(), 6);
    assert_eq!(pixels.to_rgb_image().get_pixel(2, 1).0, [7, 7, 7]);
  }

  #[test]
  fn png_url_is_decoded() {
    let path = std::env::temp_dir().join(format!("artos-input-{}.png", std::process::id()));
    RgbImage::from_pixel(4, 3, image::Rgb([1, 2, 3])).save(&path).unwrap();

    let url = Url::from_file_path(&path).unwrap();
    let url = Url::parse(&url.as_str().replacen("file:", "image:", 1)).unwrap();
    let sample = Sample::from_url(&url).unwrap();
    match &sample {
      Sample::Raw(p) => {
        assert_eq!((p.width(), p.height(), p.is_grayscale()), (4, 3, false));
        assert_eq!(&p.data()[..3], &[1, 2, 3]);
      }
      other => panic!("unexpected {:?}", other),
    }

    let gray = Url::parse(&format!("{}?gray", url)).unwrap();
    let sample = ImageFileSample::from_url(&gray).unwrap().into_pixels();
    assert!(sample.is_grayscale());

    // 非 JPEG 文件经解码后送入
    assert!(matches!(Sample::open(&path).unwrap(), Sample::Raw(_)));
    std::fs::remove_file(&path).ok();
  }
}
