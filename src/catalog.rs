// 该文件是 Artos 项目的一部分。
// src/catalog.rs - 模型列表文件
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! 模型列表文件每行描述一个模型:
//!
//! ```text
//! classname modelfile threshold [synset-id]
//! ```
//!
//! 含空白的字段用双引号包围。以 `#` 开头且其余部分仍是合法记录的行表示被禁用的模型，
//! 其余以 `#` 开头的行为普通注释。

use std::{
  fs,
  io::ErrorKind,
  path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::model::{CodecError, Mixture};

/// 默认的模型列表文件名
pub const MODEL_LIST_FILE: &str = "models.list";

#[derive(Debug, Error)]
pub enum CatalogError {
  #[error("模型列表读写错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("模型列表第 {line} 行无效: {content}")]
  Parse { line: usize, content: String },
  #[error("模型索引越界: {index}，共 {len} 个模型")]
  IndexOutOfRange { index: usize, len: usize },
  #[error("阈值无效: {0}")]
  InvalidThreshold(f64),
  #[error("类名不能为空")]
  EmptyClassname,
  #[error(transparent)]
  Codec(#[from] CodecError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelListEntry {
  pub classname: String,
  /// 相对路径相对于列表文件所在目录
  pub model_file: String,
  pub threshold: f64,
  pub synset_id: Option<String>,
  pub disabled: bool,
}

impl ModelListEntry {
  fn to_line(&self) -> String {
    let mut line = String::new();
    if self.disabled {
      line.push('#');
    }
    line.push_str(&quote(&self.classname));
    line.push(' ');
    line.push_str(&quote(&self.model_file));
    line.push(' ');
    line.push_str(&threshold_text(self.threshold));
    if let Some(synset) = &self.synset_id
      && !synset.is_empty()
    {
      line.push(' ');
      line.push_str(synset);
    }
    line
  }
}

fn quote(field: &str) -> String {
  if field.contains(char::is_whitespace) {
    format!("\"{}\"", field)
  } else {
    field.to_string()
  }
}

/// 始终带小数点，且不使用指数记法
fn threshold_text(t: f64) -> String {
  let s = format!("{}", t);
  if s.contains('.') { s } else { format!("{}.0", s) }
}

/// 取出一个字段: 引号包围的非空文本，或连续的非空白字符
fn take_field(s: &str) -> Option<(&str, &str)> {
  if s.is_empty() {
    return None;
  }
  if let Some(body) = s.strip_prefix('"')
    && let Some(end) = body.find('"')
    && end > 0
  {
    let (field, rest) = s.split_at(end + 2);
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
      return Some((field, rest));
    }
  }
  let end = s.find(char::is_whitespace).unwrap_or(s.len());
  Some(s.split_at(end))
}

/// 取出 `-?[0-9]+(\.[0-9]+)?` 形式的数字前缀
fn take_number(s: &str) -> Option<(&str, &str)> {
  let bytes = s.as_bytes();
  let mut i = usize::from(bytes.first() == Some(&b'-'));
  let digits = |from: usize| bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count();
  let int = digits(i);
  if int == 0 {
    return None;
  }
  i += int;
  if bytes.get(i) == Some(&b'.') {
    let frac = digits(i + 1);
    if frac > 0 {
      i += 1 + frac;
    }
  }
  Some(s.split_at(i))
}

fn separated(rest: &str) -> Option<&str> {
  let trimmed = rest.trim_start();
  (trimmed.len() < rest.len()).then_some(trimmed)
}

/// 匹配一条记录。记录之后的多余文本被忽略。
fn parse_record(line: &str) -> Option<ModelListEntry> {
  let (classname, rest) = take_field(line)?;
  let (model_file, rest) = take_field(separated(rest)?)?;
  let (threshold, rest) = take_number(separated(rest)?)?;
  let synset_id = separated(rest)
    .map(|s| {
      let end = s
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(s.len());
      &s[..end]
    })
    .filter(|s| !s.is_empty())
    .map(str::to_string);

  Some(ModelListEntry {
    classname: classname.trim_matches('"').to_string(),
    model_file: model_file.trim_matches('"').to_string(),
    threshold: threshold.parse().ok()?,
    synset_id,
    disabled: false,
  })
}

/// 模型列表，条目顺序即模型在列表中的编号
#[derive(Debug, Clone)]
pub struct ModelList {
  path: PathBuf,
  entries: Vec<ModelListEntry>,
}

impl ModelList {
  /// 绑定到 `path` 的空列表，不读取文件
  pub fn new(path: impl AsRef<Path>) -> Result<ModelList, CatalogError> {
    Ok(ModelList {
      path: std::path::absolute(path.as_ref())?,
      entries: Vec::new(),
    })
  }

  /// 读取列表文件。文件不存在时得到空列表。
  pub fn load(path: impl AsRef<Path>) -> Result<ModelList, CatalogError> {
    let mut list = ModelList::new(path)?;
    let text = match fs::read_to_string(&list.path) {
      Ok(t) => t,
      Err(e) if e.kind() == ErrorKind::NotFound => {
        debug!("模型列表不存在，使用空列表: {}", list.path.display());
        return Ok(list);
      }
      Err(e) => return Err(e.into()),
    };

    for (i, raw) in text.lines().enumerate() {
      let line = raw.trim();
      if line.is_empty() {
        continue;
      }
      if let Some(comment) = line.strip_prefix('#') {
        if let Some(mut entry) = parse_record(comment.trim()) {
          entry.disabled = true;
          list.entries.push(entry);
        }
        continue;
      }
      let entry = parse_record(line).ok_or_else(|| CatalogError::Parse {
        line: i + 1,
        content: raw.to_string(),
      })?;
      list.entries.push(entry);
    }
    info!(
      "加载模型列表: {} ({} 个模型)",
      list.path.display(),
      list.entries.len()
    );
    Ok(list)
  }

  pub fn save(&self) -> Result<(), CatalogError> {
    let mut text = String::new();
    for entry in &self.entries {
      text.push_str(&entry.to_line());
      text.push('\n');
    }
    fs::write(&self.path, text)?;
    debug!("保存模型列表: {}", self.path.display());
    Ok(())
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// 列表文件所在目录
  pub fn directory(&self) -> &Path {
    self.path.parent().unwrap_or(Path::new("/"))
  }

  pub fn entries(&self) -> &[ModelListEntry] {
    &self.entries
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn enabled(&self) -> impl Iterator<Item = &ModelListEntry> {
    self.entries.iter().filter(|e| !e.disabled)
  }

  pub fn get(&self, index: usize) -> Result<&ModelListEntry, CatalogError> {
    self.entries.get(index).ok_or(CatalogError::IndexOutOfRange {
      index,
      len: self.entries.len(),
    })
  }

  fn get_mut(&mut self, index: usize) -> Result<&mut ModelListEntry, CatalogError> {
    let len = self.entries.len();
    self
      .entries
      .get_mut(index)
      .ok_or(CatalogError::IndexOutOfRange { index, len })
  }

  /// 追加一条记录，返回其编号。位于列表目录之下的模型文件记为相对路径。
  /// 需要显式调用 [`ModelList::save`] 才会写入文件。
  pub fn add_entry(
    &mut self,
    model_file: impl AsRef<Path>,
    classname: &str,
    threshold: f64,
    synset_id: Option<&str>,
    disabled: bool,
  ) -> Result<usize, CatalogError> {
    let classname = classname.trim();
    if classname.is_empty() {
      return Err(CatalogError::EmptyClassname);
    }
    if !threshold.is_finite() {
      return Err(CatalogError::InvalidThreshold(threshold));
    }

    let absolute = std::path::absolute(model_file.as_ref())?;
    let model_file = match absolute.strip_prefix(self.directory()) {
      Ok(relative) => relative.to_path_buf(),
      Err(_) => model_file.as_ref().to_path_buf(),
    };
    self.entries.push(ModelListEntry {
      classname: classname.to_string(),
      model_file: model_file.to_string_lossy().into_owned(),
      threshold,
      synset_id: synset_id.filter(|s| !s.is_empty()).map(str::to_string),
      disabled,
    });
    debug!("添加模型 {}: {}", classname, model_file.display());
    Ok(self.entries.len() - 1)
  }

  fn resolve(&self, entry: &ModelListEntry) -> PathBuf {
    let file = Path::new(&entry.model_file);
    if file.is_absolute() {
      file.to_path_buf()
    } else {
      self.directory().join(file)
    }
  }

  /// 模型文件的完整路径
  pub fn model_path(&self, index: usize) -> Result<PathBuf, CatalogError> {
    Ok(self.resolve(self.get(index)?))
  }

  pub fn read_model(&self, index: usize) -> Result<Mixture, CatalogError> {
    Ok(Mixture::load(self.model_path(index)?)?)
  }

  /// 删除记录及其模型文件并保存列表。保存失败时恢复模型文件和记录。
  pub fn delete_entry(&mut self, index: usize) -> Result<ModelListEntry, CatalogError> {
    let path = self.model_path(index)?;
    let backup = match fs::read(&path) {
      Ok(bytes) => Some(bytes),
      Err(e) if e.kind() == ErrorKind::NotFound => {
        warn!("模型文件不存在，仅删除记录: {}", path.display());
        None
      }
      Err(e) => return Err(e.into()),
    };
    if backup.is_some() {
      fs::remove_file(&path)?;
    }

    let entry = self.entries.remove(index);
    if let Err(e) = self.save() {
      if let Some(bytes) = backup
        && let Err(restore) = fs::write(&path, bytes)
      {
        error!("恢复模型文件失败 {}: {}", path.display(), restore);
      }
      self.entries.insert(index, entry);
      return Err(e);
    }
    info!("删除模型 {}: {}", entry.classname, path.display());
    Ok(entry)
  }

  pub fn rename(&mut self, index: usize, classname: &str) -> Result<(), CatalogError> {
    let classname = classname.trim();
    if classname.is_empty() {
      return Err(CatalogError::EmptyClassname);
    }
    self.get_mut(index)?.classname = classname.to_string();
    Ok(())
  }

  pub fn set_threshold(&mut self, index: usize, threshold: f64) -> Result<(), CatalogError> {
    if !threshold.is_finite() {
      return Err(CatalogError::InvalidThreshold(threshold));
    }
    self.get_mut(index)?.threshold = threshold;
    Ok(())
  }

  pub fn set_disabled(&mut self, index: usize, disabled: bool) -> Result<(), CatalogError> {
    self.get_mut(index)?.disabled = disabled;
    Ok(())
  }
}
