// 该文件是 Artos 项目的一部分。
// src/model/hog.rs - HOG 模型可视化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{f64::consts::PI, ops::Range};

use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::drawing::draw_line_segment_mut;
use tracing::debug;

use super::{CodecError, Mixture, Part};

/// 对比度不敏感的 9 个方向通道
pub const HOG_UNSIGNED_BINS: Range<usize> = 18..27;

fn bins(part: &Part, row: usize, col: usize, neg: bool) -> [f64; 9] {
  let mut out = [0.0; 9];
  for (o, &x) in out.iter_mut().zip(&part.cell(row, col)[HOG_UNSIGNED_BINS]) {
    *o = if neg { (-x).max(0.0) } else { x.max(0.0) };
  }
  out
}

/// 以星形线段绘制部件每个单元的方向权重。`neg` 为真时绘制负权重。
pub fn hog_image(part: &Part, cs: u32, neg: bool) -> Result<GrayImage, CodecError> {
  if part.features() < HOG_UNSIGNED_BINS.end {
    return Err(CodecError::Invalid(format!(
      "HOG 可视化至少需要 {} 维特征，实际 {} 维",
      HOG_UNSIGNED_BINS.end,
      part.features()
    )));
  }

  let mut img = GrayImage::new(part.cols() as u32 * cs, part.rows() as u32 * cs);
  let max_intensity = (0..part.rows())
    .flat_map(|r| (0..part.cols()).map(move |c| (r, c)))
    .flat_map(|(r, c)| part.cell(r, c)[HOG_UNSIGNED_BINS].to_vec())
    .map(|x| if neg { -x } else { x })
    .fold(f64::NEG_INFINITY, f64::max);

  let half = (cs / 2) as f64;
  for row in 0..part.rows() {
    for col in 0..part.cols() {
      let center = (
        (col as u32 * cs + cs / 2) as f64,
        (row as u32 * cs + cs / 2) as f64,
      );
      let feats = bins(part, row, col, neg);
      let max_feat = feats.iter().copied().fold(0.0, f64::max);
      if max_feat <= 0.0 {
        continue;
      }
      for (i, &feat) in feats.iter().enumerate() {
        let angle = PI / 2.0 - (i as f64 / 9.0) * PI;
        let intensity = ((feat / max_intensity).powf(0.4) * 255.0).round_ties_even();
        let length = (feat / max_feat * half).round_ties_even();
        let start = (
          (center.0 + angle.cos() * length).round_ties_even() as f32,
          (center.1 - angle.sin() * length).round_ties_even() as f32,
        );
        let end = (
          (center.0 + (angle + PI).cos() * length).round_ties_even() as f32,
          (center.1 - (angle + PI).sin() * length).round_ties_even() as f32,
        );
        draw_line_segment_mut(&mut img, start, end, Luma([intensity.clamp(0.0, 255.0) as u8]));
      }
    }
  }
  Ok(img)
}

fn paste(canvas: &mut RgbaImage, src: &GrayImage, x: u32, y: u32) {
  for (sx, sy, &Luma([v])) in src.enumerate_pixels() {
    if x + sx < canvas.width() && y + sy < canvas.height() {
      canvas.put_pixel(x + sx, y + sy, Rgba([v, v, v, 255]));
    }
  }
}

impl Mixture {
  /// 每个分量一行，左侧为正权重图，右侧为负权重图，背景透明
  pub fn visualize(&self, cs: u32, padding: u32) -> Result<RgbaImage, CodecError> {
    if self.feature_type != "HOG" {
      return Err(CodecError::UnsupportedType(self.feature_type.clone()));
    }

    let images = self
      .components()
      .iter()
      .map(|comp| {
        let root = &comp.parts[0];
        Ok((hog_image(root, cs, false)?, hog_image(root, cs, true)?))
      })
      .collect::<Result<Vec<_>, CodecError>>()?;

    let max_width = images
      .iter()
      .map(|(p, n)| p.width() + n.width())
      .max()
      .unwrap_or(0);
    let height: u32 = images.iter().map(|(p, _)| p.height()).sum();
    let gaps = images.len().saturating_sub(1) as u32 * padding * 2;
    let mut canvas = RgbaImage::from_pixel(max_width + padding, height + gaps, Rgba([255, 255, 255, 0]));
    debug!(
      "可视化模型: {} 个分量, 画布 {}x{}",
      images.len(),
      canvas.width(),
      canvas.height()
    );

    let mut y = 0;
    for (p, n) in &images {
      let x = (max_width - p.width() - n.width()) / 2;
      paste(&mut canvas, p, x, y);
      paste(&mut canvas, n, x + p.width() + padding, y);
      y += p.height() + padding * 2;
    }
    Ok(canvas)
  }
}
