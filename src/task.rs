// 该文件是 Artos 项目的一部分。
// src/task.rs - 后台执行的长时间操作
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicU32, Ordering},
  },
  thread::{self, JoinHandle},
  time::Duration,
};

use thiserror::Error;
use tracing::{info, warn};

/// 第一次中断后等待操作自行结束的时间
pub const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("无法创建工作线程: {0}")]
  Spawn(#[from] std::io::Error),
  #[error("工作线程异常退出: {0}")]
  Panicked(String),
}

/// 会话在线程间共享时加锁，保证同一句柄上同时只有一个调用
pub type Shared<S> = Arc<Mutex<S>>;

pub fn shared<S>(session: S) -> Shared<S> {
  Arc::new(Mutex::new(session))
}

/// 工作线程一侧的进度与取消状态
#[derive(Debug, Default)]
pub struct TaskState {
  current: AtomicU32,
  total: AtomicU32,
  sub_current: AtomicU32,
  sub_total: AtomicU32,
  cancel: Arc<AtomicBool>,
}

impl TaskState {
  fn with_cancel(cancel: Arc<AtomicBool>) -> Self {
    TaskState {
      cancel,
      ..TaskState::default()
    }
  }

  /// 记录进度，返回值可直接作为进度回调的返回值
  pub fn report(&self, current: u32, total: u32) -> bool {
    self.current.store(current, Ordering::Relaxed);
    self.total.store(total, Ordering::Relaxed);
    !self.is_cancelled()
  }

  pub fn report_overall(&self, current: u32, total: u32, sub: u32, sub_total: u32) -> bool {
    self.sub_current.store(sub, Ordering::Relaxed);
    self.sub_total.store(sub_total, Ordering::Relaxed);
    self.report(current, total)
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancel.load(Ordering::Relaxed)
  }

  pub fn progress(&self) -> (u32, u32) {
    (
      self.current.load(Ordering::Relaxed),
      self.total.load(Ordering::Relaxed),
    )
  }

  pub fn sub_progress(&self) -> (u32, u32) {
    (
      self.sub_current.load(Ordering::Relaxed),
      self.sub_total.load(Ordering::Relaxed),
    )
  }
}

/// 在独立线程上运行一个操作
pub struct Worker<T> {
  name: String,
  state: Arc<TaskState>,
  handle: JoinHandle<T>,
}

impl<T: Send + 'static> Worker<T> {
  pub fn spawn<F>(name: &str, job: F) -> Result<Self, TaskError>
  where
    F: FnOnce(&TaskState) -> T + Send + 'static,
  {
    Self::spawn_with_cancel(name, Arc::new(AtomicBool::new(false)), job)
  }

  /// 使用外部的取消标志，例如 [`install_interrupt`] 安装的标志
  pub fn spawn_with_cancel<F>(name: &str, cancel: Arc<AtomicBool>, job: F) -> Result<Self, TaskError>
  where
    F: FnOnce(&TaskState) -> T + Send + 'static,
  {
    let state = Arc::new(TaskState::with_cancel(cancel));
    let worker_state = state.clone();
    let handle = thread::Builder::new()
      .name(name.to_string())
      .spawn(move || job(&worker_state))?;
    info!("开始任务 {}", name);
    Ok(Worker {
      name: name.to_string(),
      state,
      handle,
    })
  }

  pub fn progress(&self) -> (u32, u32) {
    self.state.progress()
  }

  pub fn sub_progress(&self) -> (u32, u32) {
    self.state.sub_progress()
  }

  /// 请求取消，操作在下一次进度回调时停止
  pub fn cancel(&self) {
    if !self.state.cancel.swap(true, Ordering::Relaxed) {
      info!("请求取消任务 {}", self.name);
    }
  }

  pub fn is_cancelled(&self) -> bool {
    self.state.is_cancelled()
  }

  pub fn is_finished(&self) -> bool {
    self.handle.is_finished()
  }

  pub fn join(self) -> Result<T, TaskError> {
    let name = self.name;
    self.handle.join().map_err(|e| {
      let message = e
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| e.downcast_ref::<String>().cloned())
        .unwrap_or_default();
      TaskError::Panicked(format!("{}: {}", name, message))
    })
  }
}

/// Ctrl-C 时设置取消标志。若操作在 [`FORCE_EXIT_AFTER`] 内没有结束则强制退出。
pub fn install_interrupt(cancel: Arc<AtomicBool>) -> Result<(), ctrlc::Error> {
  ctrlc::set_handler(move || {
    if cancel.swap(true, Ordering::Relaxed) {
      return;
    }
    info!("收到中断信号，等待当前步骤结束...");
    thread::spawn(|| {
      thread::sleep(FORCE_EXIT_AFTER);
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::mpsc;

  #[test]
  fn worker_returns_result() {
    let worker = Worker::spawn("sum", |state| {
      for i in 1..=4 {
        state.report(i, 4);
      }
      10
    })
    .unwrap();
    assert_eq!(worker.join().unwrap(), 10);
  }

  #[test]
  fn cancel_stops_at_next_report() {
    let (tx, rx) = mpsc::channel();
    let (go_tx, go_rx) = mpsc::channel::<()>();
    let worker = Worker::spawn("cancel", move |state| {
      let mut steps = 0;
      while state.report(steps, 1000) {
        steps += 1;
        if steps == 3 {
          tx.send(()).unwrap();
          go_rx.recv().unwrap();
        }
      }
      steps
    })
    .unwrap();
    rx.recv().unwrap();
    assert_eq!(worker.progress(), (2, 1000));
    worker.cancel();
    go_tx.send(()).unwrap();
    assert!(worker.is_cancelled());
    assert_eq!(worker.join().unwrap(), 3);
  }

  #[test]
  fn overall_progress_tracks_sub_steps() {
    let state = TaskState::default();
    assert!(state.report_overall(1, 3, 5, 10));
    assert_eq!(state.progress(), (1, 3));
    assert_eq!(state.sub_progress(), (5, 10));
  }

  #[test]
  fn panics_become_errors() {
    let worker = Worker::spawn("boom", |_| -> u32 { panic!("失败") }).unwrap();
    match worker.join() {
      Err(TaskError::Panicked(message)) => assert!(message.contains("失败")),
      other => panic!("unexpected {:?}", other.map(|_| ())),
    }
  }

  #[test]
  fn shared_sessions_serialize_calls() {
    let counter = shared(0u32);
    let workers: Vec<_> = (0..4)
      .map(|i| {
        let counter = counter.clone();
        Worker::spawn(&format!("w{}", i), move |_| {
          *counter.lock().unwrap() += 1;
        })
        .unwrap()
      })
      .collect();
    for w in workers {
      w.join().unwrap();
    }
    assert_eq!(*counter.lock().unwrap(), 4);
  }
}
