// 该文件是 Artos 项目的一部分。
// src/ffi/progress.rs - 进度回调跳板
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! libartos 的回调不带用户数据指针，因此闭包在调用期间暂存于线程局部槽位，
//! 由 `extern "C"` 跳板转发。回调只会在发起调用的线程上执行。

use std::{
  cell::Cell,
  ffi::c_uint,
  panic::{AssertUnwindSafe, catch_unwind},
  ptr::NonNull,
};

use tracing::error;

use super::types::{OverallProgressCallback, ProgressCallback};

pub type ProgressFn<'a> = dyn FnMut(u32, u32) -> bool + 'a;
pub type OverallProgressFn<'a> = dyn FnMut(u32, u32, u32, u32) -> bool + 'a;

thread_local! {
  static PROGRESS: Cell<Option<NonNull<ProgressFn<'static>>>> = const { Cell::new(None) };
  static OVERALL: Cell<Option<NonNull<OverallProgressFn<'static>>>> = const { Cell::new(None) };
}

/// 调用结束时恢复之前的槽位，支持嵌套调用
struct Restore<T: Copy + 'static> {
  key: &'static std::thread::LocalKey<Cell<Option<T>>>,
  previous: Option<T>,
}

impl<T: Copy + 'static> Drop for Restore<T> {
  fn drop(&mut self) {
    self.key.with(|slot| slot.set(self.previous));
  }
}

extern "C" fn progress_trampoline(current: c_uint, total: c_uint) -> bool {
  let Some(mut ptr) = PROGRESS.with(Cell::get) else {
    return true;
  };
  // 槽位中的指针只在 `with_progress` 的作用域内存在
  let cb = unsafe { ptr.as_mut() };
  catch_unwind(AssertUnwindSafe(|| cb(current, total))).unwrap_or_else(|_| {
    error!("进度回调发生 panic，请求中止");
    false
  })
}

extern "C" fn overall_trampoline(
  overall_current: c_uint,
  overall_total: c_uint,
  sub_current: c_uint,
  sub_total: c_uint,
) -> bool {
  let Some(mut ptr) = OVERALL.with(Cell::get) else {
    return true;
  };
  let cb = unsafe { ptr.as_mut() };
  catch_unwind(AssertUnwindSafe(|| {
    cb(overall_current, overall_total, sub_current, sub_total)
  }))
  .unwrap_or_else(|_| {
    error!("进度回调发生 panic，请求中止");
    false
  })
}

/// 在 `call` 执行期间安装 `cb`，并把对应的 C 函数指针交给 `call`
pub fn with_progress<R>(
  cb: Option<&mut ProgressFn<'_>>,
  call: impl FnOnce(Option<ProgressCallback>) -> R,
) -> R {
  let Some(cb) = cb else {
    return call(None);
  };
  let ptr: NonNull<ProgressFn<'_>> = NonNull::from(cb);
  // 擦除生命周期，`Restore` 保证指针不会逃出本函数
  let ptr: NonNull<ProgressFn<'static>> = unsafe { std::mem::transmute(ptr) };
  let _restore = Restore {
    key: &PROGRESS,
    previous: PROGRESS.with(|slot| slot.replace(Some(ptr))),
  };
  call(Some(progress_trampoline))
}

pub fn with_overall_progress<R>(
  cb: Option<&mut OverallProgressFn<'_>>,
  call: impl FnOnce(Option<OverallProgressCallback>) -> R,
) -> R {
  let Some(cb) = cb else {
    return call(None);
  };
  let ptr: NonNull<OverallProgressFn<'_>> = NonNull::from(cb);
  let ptr: NonNull<OverallProgressFn<'static>> = unsafe { std::mem::transmute(ptr) };
  let _restore = Restore {
    key: &OVERALL,
    previous: OVERALL.with(|slot| slot.replace(Some(ptr))),
  };
  call(Some(overall_trampoline))
}
