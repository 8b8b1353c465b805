// 该文件是 Artos 项目的一部分。
// src/bbox.rs - 边界框
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ffi::FlatBoundingBox;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoxError {
  #[error("右/下边界不能小于左/上边界: ({left}, {top}, {right}, {bottom})")]
  InvalidOrder {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
  },
  #[error("缩放比例必须为非负有限数: {0}")]
  InvalidRatio(f64),
  #[error("边界框位于图像之外: ({left}, {top})")]
  Negative { left: i32, top: i32 },
}

/// 由四条边确定的矩形，`left`/`top` 在框内，`right`/`bottom` 在框外，
/// 因此宽度为 `right - left`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[i32; 4]", into = "[i32; 4]")]
pub struct BoundingBox {
  left: i32,
  top: i32,
  right: i32,
  bottom: i32,
}

impl BoundingBox {
  pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Result<Self, BoxError> {
    if right < left || bottom < top {
      return Err(BoxError::InvalidOrder {
        left,
        top,
        right,
        bottom,
      });
    }
    Ok(BoundingBox {
      left,
      top,
      right,
      bottom,
    })
  }

  /// 由原点和尺寸构造
  pub fn with_size(x: i32, y: i32, width: u32, height: u32) -> Self {
    BoundingBox {
      left: x,
      top: y,
      right: x.saturating_add_unsigned(width),
      bottom: y.saturating_add_unsigned(height),
    }
  }

  /// 由任意顺序的两组边构造
  pub fn from_edges(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
    BoundingBox {
      left: x1.min(x2),
      top: y1.min(y2),
      right: x1.max(x2),
      bottom: y1.max(y2),
    }
  }

  pub fn left(&self) -> i32 {
    self.left
  }

  pub fn top(&self) -> i32 {
    self.top
  }

  pub fn right(&self) -> i32 {
    self.right
  }

  pub fn bottom(&self) -> i32 {
    self.bottom
  }

  pub fn x(&self) -> i32 {
    self.left
  }

  pub fn y(&self) -> i32 {
    self.top
  }

  pub fn width(&self) -> u32 {
    self.right.abs_diff(self.left)
  }

  pub fn height(&self) -> u32 {
    self.bottom.abs_diff(self.top)
  }

  pub fn area(&self) -> u64 {
    self.width() as u64 * self.height() as u64
  }

  pub fn coords(&self) -> [i32; 4] {
    [self.left, self.top, self.right, self.bottom]
  }

  /// 一次性替换四条边
  pub fn set_coords(&mut self, left: i32, top: i32, right: i32, bottom: i32) -> Result<(), BoxError> {
    *self = BoundingBox::new(left, top, right, bottom)?;
    Ok(())
  }

  /// 平移到新的横坐标，保持尺寸
  pub fn set_x(&mut self, x: i32) {
    let width = self.width();
    self.left = x;
    self.right = x.saturating_add_unsigned(width);
  }

  pub fn set_y(&mut self, y: i32) {
    let height = self.height();
    self.top = y;
    self.bottom = y.saturating_add_unsigned(height);
  }

  pub fn set_width(&mut self, width: u32) {
    self.right = self.left.saturating_add_unsigned(width);
  }

  pub fn set_height(&mut self, height: u32) {
    self.bottom = self.top.saturating_add_unsigned(height);
  }

  /// 按比例缩放，每个坐标分别取整
  pub fn scale(&self, ratio: f64) -> Result<BoundingBox, BoxError> {
    if !ratio.is_finite() || ratio < 0.0 {
      return Err(BoxError::InvalidRatio(ratio));
    }
    let s = |v: i32| (v as f64 * ratio).round() as i32;
    BoundingBox::new(s(self.left), s(self.top), s(self.right), s(self.bottom))
  }

  /// 两个框的交并比
  pub fn overlap(&self, other: &BoundingBox) -> f64 {
    let l = self.left.max(other.left);
    let t = self.top.max(other.top);
    let r = self.right.min(other.right);
    let b = self.bottom.min(other.bottom);
    if r <= l || b <= t {
      return 0.0;
    }
    let inter = (r - l) as f64 * (b - t) as f64;
    inter / (self.area() as f64 + other.area() as f64 - inter)
  }

  pub fn to_flat(&self) -> Result<FlatBoundingBox, BoxError> {
    if self.left < 0 || self.top < 0 {
      return Err(BoxError::Negative {
        left: self.left,
        top: self.top,
      });
    }
    Ok(FlatBoundingBox {
      left: self.left as u32,
      top: self.top as u32,
      width: self.width(),
      height: self.height(),
    })
  }
}

impl From<FlatBoundingBox> for BoundingBox {
  fn from(flat: FlatBoundingBox) -> Self {
    let clamp = |v: u32| v.min(i32::MAX as u32) as i32;
    BoundingBox::with_size(clamp(flat.left), clamp(flat.top), flat.width, flat.height)
  }
}

impl TryFrom<[i32; 4]> for BoundingBox {
  type Error = BoxError;

  fn try_from([left, top, right, bottom]: [i32; 4]) -> Result<Self, Self::Error> {
    BoundingBox::new(left, top, right, bottom)
  }
}

impl From<BoundingBox> for [i32; 4] {
  fn from(bbox: BoundingBox) -> Self {
    bbox.coords()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn derived_size_follows_edges() {
    let b = BoundingBox::new(10, 20, 50, 100).unwrap();
    assert_eq!(b.width(), 40);
    assert_eq!(b.height(), 80);
    assert_eq!(b.area(), 3200);
  }

  #[test]
  fn violated_order_is_rejected() {
    assert!(BoundingBox::new(10, 0, 5, 10).is_err());
    assert!(BoundingBox::new(0, 10, 10, 5).is_err());
    // 空框合法
    assert!(BoundingBox::new(3, 3, 3, 3).is_ok());
  }

  #[test]
  fn moving_keeps_size() {
    let mut b = BoundingBox::new(10, 20, 50, 100).unwrap();
    b.set_x(-5);
    b.set_y(0);
    assert_eq!(b.coords(), [-5, 0, 35, 80]);
  }

  #[test]
  fn resizing_moves_far_edges() {
    let mut b = BoundingBox::new(10, 20, 50, 100).unwrap();
    b.set_width(5);
    b.set_height(7);
    assert_eq!(b.coords(), [10, 20, 15, 27]);
  }

  #[test]
  fn scaling_round_trips_within_rounding() {
    let b = BoundingBox::new(13, 27, 101, 257).unwrap();
    for ratio in [0.5, 0.25, 1.5, 3.0] {
      let back = b.scale(ratio).unwrap().scale(1.0 / ratio).unwrap();
      for (orig, restored) in b.coords().iter().zip(back.coords().iter()) {
        assert!((orig - restored).abs() as f64 <= 0.5 / ratio + 1.0);
      }
    }
  }

  #[test]
  fn scaling_rounds_each_coordinate() {
    let b = BoundingBox::new(1, 3, 5, 7).unwrap();
    assert_eq!(b.scale(0.5).unwrap().coords(), [1, 2, 3, 4]);
    assert_eq!(b.scale(-1.0), Err(BoxError::InvalidRatio(-1.0)));
  }

  #[test]
  fn flat_box_uses_width_and_height() {
    let b = BoundingBox::new(4, 6, 10, 20).unwrap();
    let flat = b.to_flat().unwrap();
    assert_eq!(
      flat,
      FlatBoundingBox {
        left: 4,
        top: 6,
        width: 6,
        height: 14
      }
    );
    assert_eq!(BoundingBox::from(flat), b);
    assert!(BoundingBox::new(-1, 0, 3, 3).unwrap().to_flat().is_err());
  }

  #[test]
  fn overlap_is_intersection_over_union() {
    let a = BoundingBox::new(0, 0, 10, 10).unwrap();
    let b = BoundingBox::new(5, 0, 15, 10).unwrap();
    assert!((a.overlap(&b) - 50.0 / 150.0).abs() < 1e-12);
    let c = BoundingBox::new(20, 20, 30, 30).unwrap();
    assert_eq!(a.overlap(&c), 0.0);
  }

  #[test]
  fn serde_rejects_invalid_order() {
    let b: BoundingBox = serde_json::from_str("[1, 2, 3, 4]").unwrap();
    assert_eq!(b.coords(), [1, 2, 3, 4]);
    assert!(serde_json::from_str::<BoundingBox>("[5, 2, 3, 4]").is_err());
  }
}
