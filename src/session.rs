// 该文件是 Artos 项目的一部分。
// src/session.rs - 会话公共部分
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{ffi::c_int, sync::Arc};

use thiserror::Error;
use tracing::{debug, info};

use crate::{
  bbox::{BoundingBox, BoxError},
  ffi::{ArgumentError, ArtosError, Backend, FlatBoundingBox, Handle, check},
  model::CodecError,
};

#[derive(Error, Debug)]
pub enum SessionError {
  #[error("libartos 错误: {0}")]
  Artos(#[from] ArtosError),
  #[error(transparent)]
  Codec(#[from] CodecError),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("参数无效: {0}")]
  InvalidArgument(String),
  #[error("会话已销毁")]
  Destroyed,
}

impl From<ArgumentError> for SessionError {
  fn from(err: ArgumentError) -> Self {
    SessionError::InvalidArgument(err.to_string())
  }
}

impl From<BoxError> for SessionError {
  fn from(err: BoxError) -> Self {
    SessionError::InvalidArgument(err.to_string())
  }
}

/// 可取消的长时间操作的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  Completed,
  Cancelled,
}

impl Outcome {
  pub fn is_cancelled(self) -> bool {
    self == Outcome::Cancelled
  }
}

/// 合并库的状态码与回调记录的取消请求。
/// 部分函数在用户中止后仍返回 OK，因此两者都要看。
pub(crate) fn outcome(what: &str, code: c_int, cancelled: bool) -> Result<Outcome, SessionError> {
  match check(code) {
    Ok(_) if !cancelled => Ok(Outcome::Completed),
    Ok(_) | Err(ArtosError::Aborted) => {
      info!("{}已被用户取消", what);
      Ok(Outcome::Cancelled)
    }
    Err(e) => Err(e.into()),
  }
}

/// 包装进度回调，记录回调是否请求了中止
pub(crate) struct CancelWatch<F> {
  inner: Option<F>,
  cancelled: bool,
}

impl<F> CancelWatch<F> {
  pub fn new(inner: Option<F>) -> Self {
    CancelWatch {
      inner,
      cancelled: false,
    }
  }

  pub fn is_set(&self) -> bool {
    self.inner.is_some()
  }

  pub fn cancelled(&self) -> bool {
    self.cancelled
  }
}

impl<F: FnMut(u32, u32) -> bool> CancelWatch<F> {
  pub fn call(&mut self, current: u32, total: u32) -> bool {
    let go_on = self.inner.as_mut().is_none_or(|f| f(current, total));
    self.cancelled |= !go_on;
    go_on
  }
}

impl<F: FnMut(u32, u32, u32, u32) -> bool> CancelWatch<F> {
  pub fn call_overall(&mut self, current: u32, total: u32, sub: u32, sub_total: u32) -> bool {
    let go_on = self
      .inner
      .as_mut()
      .is_none_or(|f| f(current, total, sub, sub_total));
    self.cancelled |= !go_on;
    go_on
  }
}

/// 会话独占的原生句柄，恰好释放一次
pub(crate) struct NativeHandle<B: Backend> {
  backend: Arc<B>,
  handle: Option<Handle>,
  release: fn(&B, Handle),
  kind: &'static str,
}

impl<B: Backend> NativeHandle<B> {
  /// 句柄 0 表示创建失败，此时返回 `on_failure`，不会调用释放函数
  pub fn acquire(
    backend: Arc<B>,
    kind: &'static str,
    handle: Handle,
    release: fn(&B, Handle),
    on_failure: ArtosError,
  ) -> Result<Self, SessionError> {
    if handle == 0 {
      return Err(on_failure.into());
    }
    debug!("创建{}: 句柄 {}", kind, handle);
    Ok(NativeHandle {
      backend,
      handle: Some(handle),
      release,
      kind,
    })
  }

  pub fn backend(&self) -> &Arc<B> {
    &self.backend
  }

  pub fn get(&self) -> Result<Handle, SessionError> {
    self.handle.ok_or(SessionError::Destroyed)
  }

  pub fn is_alive(&self) -> bool {
    self.handle.is_some()
  }

  pub fn release(&mut self) {
    if let Some(handle) = self.handle.take() {
      (self.release)(&self.backend, handle);
      debug!("销毁{}: 句柄 {}", self.kind, handle);
    }
  }
}

impl<B: Backend> Drop for NativeHandle<B> {
  fn drop(&mut self) {
    self.release();
  }
}

/// 转换为库使用的边界框。空列表表示整幅图像。
pub(crate) fn flat_boxes(boxes: &[BoundingBox]) -> Result<Vec<FlatBoundingBox>, SessionError> {
  Ok(
    boxes
      .iter()
      .map(BoundingBox::to_flat)
      .collect::<Result<Vec<_>, _>>()?,
  )
}
