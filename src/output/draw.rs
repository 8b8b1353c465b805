// 该文件是 Artos 项目的一部分。
// src/output/draw.rs - 检测结果可视化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;

use crate::detector::Detection;

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;
const LABEL_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法读取字体文件 {path}: {source}")]
  FontFile {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("字体文件无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 在图像上画出检测框。设置了字体时在框上方标注类名与得分。
pub struct Draw {
  font: Option<FontVec>,
  font_size: f32,
  color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    Draw {
      font: None,
      font_size: LABEL_FONT_SIZE,
      color: LABEL_COLOR,
    }
  }
}

impl Draw {
  pub fn with_font_file(path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| DrawError::FontFile {
      path: path.to_path_buf(),
      source,
    })?;
    Ok(Draw {
      font: Some(FontVec::try_from_vec(data)?),
      ..Draw::default()
    })
  }

  pub fn with_color(mut self, color: [u8; 3]) -> Self {
    self.color = color;
    self
  }

  pub fn has_labels(&self) -> bool {
    self.font.is_some()
  }

  pub fn draw_detections(&self, image: &mut RgbImage, detections: &[Detection]) {
    for det in detections {
      self.draw_bbox_with_label(image, det);
    }
  }

  fn draw_bbox_with_label(&self, image: &mut RgbImage, det: &Detection) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    // 框的右/下边界在框外
    let x_min = det.bbox.left().clamp(0, w - 1);
    let y_min = det.bbox.top().clamp(0, h - 1);
    let x_max = (det.bbox.right() - 1).clamp(0, w - 1);
    let y_max = (det.bbox.bottom() - 1).clamp(0, h - 1);
    if x_min >= x_max || y_min >= y_max {
      return;
    }

    // 边框向内加粗
    for t in 0..BOX_THICKNESS {
      let (x0, y0, x1, y1) = (x_min + t, y_min + t, x_max - t, y_max - t);
      if x0 >= x1 || y0 >= y1 {
        break;
      }
      let rect = Rect::at(x0, y0).of_size((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);
      draw_hollow_rect_mut(image, rect, Rgb(self.color));
    }

    let Some(font) = &self.font else {
      return;
    };
    let label = format!("{} {:.2}", det.classname, det.score);
    let scale = PxScale::from(self.font_size);
    let (text_width, text_height) = text_size(scale, font, &label);
    let label_height = text_height as i32 + 2 * LABEL_TEXT_VERTICAL_PADDING;

    // 标签放在边框上方，超出顶部时贴边
    let label_x = x_min;
    let label_y = (y_min - label_height).max(0);
    let label_width = (text_width as i32).min(w - label_x);
    if label_width <= 0 || label_height <= 0 {
      return;
    }

    let rect = Rect::at(label_x, label_y).of_size(label_width as u32, label_height as u32);
    draw_filled_rect_mut(image, rect, Rgb(self.color));
    draw_text_mut(
      image,
      Rgb([255u8, 255u8, 255u8]),
      label_x,
      label_y + LABEL_TEXT_VERTICAL_PADDING,
      scale,
      font,
      &label,
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bbox::BoundingBox;

  fn detection(left: i32, top: i32, right: i32, bottom: i32) -> Detection {
    Detection {
      classname: "car".into(),
      synset_id: None,
      score: 0.5,
      bbox: BoundingBox::new(left, top, right, bottom).unwrap(),
    }
  }

  #[test]
  fn box_outline_is_drawn_inside_edges() {
    let mut image = RgbImage::new(20, 20);
    Draw::default().draw_detections(&mut image, &[detection(2, 3, 12, 15)]);
    assert_eq!(image.get_pixel(2, 3).0, LABEL_COLOR);
    assert_eq!(image.get_pixel(3, 4).0, LABEL_COLOR);
    assert_eq!(image.get_pixel(11, 14).0, LABEL_COLOR);
    assert_eq!(image.get_pixel(12, 15).0, [0, 0, 0]);
    assert_eq!(image.get_pixel(7, 9).0, [0, 0, 0]);
  }

  #[test]
  fn boxes_are_clipped_to_image() {
    let mut image = RgbImage::new(10, 10);
    let draw = Draw::default().with_color([255, 0, 0]);
    draw.draw_detections(&mut image, &[detection(-5, -5, 30, 30), detection(40, 40, 50, 50)]);
    assert_eq!(image.get_pixel(0, 0).0, [255, 0, 0]);
    assert_eq!(image.get_pixel(9, 9).0, [255, 0, 0]);
    assert_eq!(image.get_pixel(5, 5).0, [0, 0, 0]);
  }

  #[test]
  fn missing_font_file_is_reported() {
    let err = Draw::with_font_file("/nonexistent/font.ttf").err().unwrap();
    assert!(matches!(err, DrawError::FontFile { .. }));
    assert!(!Draw::default().has_labels());
  }
}
