// 该文件是 Artos 项目的一部分。
// src/repository.rs - ImageNet 格式的图像仓库
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  ffi::c_uint,
  path::{Path, PathBuf},
  sync::Arc,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::ffi::{
  ArgumentError, ArtosError, Backend, LibArtos, SynsetSearchResult, c_path, c_string, check,
  fixed_to_string, query_buffer,
};

pub const SYNSET_LIST_FILE: &str = "synset_wordlist.txt";
pub const IMAGES_DIR: &str = "Images";
pub const ANNOTATION_DIR: &str = "Annotation";

/// 目录不像图像仓库的原因
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureProblem {
  #[error("The specified directory could not be found.")]
  DirectoryNotFound,
  #[error("Could not find synset_wordlist.txt")]
  NoSynsetList,
  #[error("Could not find \"Images\" subdirectory.")]
  NoImagesDirectory,
  #[error("Could not find \"Annotation\" subdirectory.")]
  NoAnnotationDirectory,
  #[error("Could not find any synset image archive.")]
  NoArchive,
}

#[derive(Error, Debug)]
pub enum RepositoryError {
  #[error("图像仓库无效: {0}")]
  Structure(#[from] StructureProblem),
  #[error("libartos 拒绝该仓库: {0}")]
  Rejected(String),
  #[error("libartos 错误: {0}")]
  Artos(#[from] ArtosError),
  #[error("参数无效: {0}")]
  Argument(#[from] ArgumentError),
}

/// 按顺序检查仓库结构，返回遇到的第一个问题
pub fn check_structure(dir: impl AsRef<Path>) -> Result<(), StructureProblem> {
  let dir = dir.as_ref();
  if !dir.is_dir() {
    return Err(StructureProblem::DirectoryNotFound);
  }
  if !dir.join(SYNSET_LIST_FILE).is_file() {
    return Err(StructureProblem::NoSynsetList);
  }
  let images = dir.join(IMAGES_DIR);
  if !images.is_dir() {
    return Err(StructureProblem::NoImagesDirectory);
  }
  if !dir.join(ANNOTATION_DIR).is_dir() {
    return Err(StructureProblem::NoAnnotationDirectory);
  }
  let has_archive = std::fs::read_dir(&images)
    .map_err(|_| StructureProblem::NoImagesDirectory)?
    .filter_map(Result::ok)
    .any(|e| {
      let path = e.path();
      path.is_file() && path.extension().is_some_and(|ext| ext == "tar")
    });
  if !has_archive {
    return Err(StructureProblem::NoArchive);
  }
  Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synset {
  pub id: String,
  pub description: String,
  /// 仅在搜索结果中有意义
  pub score: f32,
}

impl From<&SynsetSearchResult> for Synset {
  fn from(r: &SynsetSearchResult) -> Self {
    Synset {
      id: fixed_to_string(&r.synset_id),
      description: fixed_to_string(&r.description),
      score: r.score,
    }
  }
}

pub struct ImageRepository<B: Backend = LibArtos> {
  backend: Arc<B>,
  directory: PathBuf,
}

impl<B: Backend> ImageRepository<B> {
  pub fn new(backend: Arc<B>, directory: impl Into<PathBuf>) -> Self {
    ImageRepository {
      backend,
      directory: directory.into(),
    }
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  /// 某个同义词集的图像归档
  pub fn synset_archive(&self, synset_id: &str) -> PathBuf {
    self
      .directory
      .join(IMAGES_DIR)
      .join(format!("{}.tar", synset_id))
  }

  pub fn check_structure(&self) -> Result<(), StructureProblem> {
    check_structure(&self.directory)
  }

  /// 库支持的仓库类型
  pub fn repository_type(&self) -> String {
    self.backend.get_image_repository_type()
  }

  /// 由库检查目录
  pub fn check_native(&self) -> Result<(), RepositoryError> {
    self
      .backend
      .check_repository_directory(&c_path(&self.directory)?)
      .map_err(RepositoryError::Rejected)
  }

  pub fn synsets(&self) -> Result<Vec<Synset>, RepositoryError> {
    let dir = c_path(&self.directory)?;
    let raw = query_buffer(|buf, count| self.backend.list_synsets(&dir, buf, count))?;
    debug!("{}: {} 个同义词集", self.directory.display(), raw.len());
    Ok(raw.iter().map(Synset::from).collect())
  }

  /// 按得分降序返回至多 `limit` 个结果
  pub fn search(&self, phrase: &str, limit: usize) -> Result<Vec<Synset>, RepositoryError> {
    let limit = limit.min(c_uint::MAX as usize);
    if limit == 0 {
      return Ok(Vec::new());
    }
    let mut buf = vec![SynsetSearchResult::default(); limit];
    let mut count = limit as c_uint;
    check(self.backend.search_synsets(
      &c_path(&self.directory)?,
      &c_string(phrase)?,
      &mut buf,
      &mut count,
    ))?;
    buf.truncate((count as usize).min(limit));
    Ok(buf.iter().map(Synset::from).collect())
  }

  /// 解压同义词集中前 `num` 张图像，返回实际解压的数量
  pub fn extract_images(
    &self,
    synset_id: &str,
    out_directory: impl AsRef<Path>,
    num: u32,
  ) -> Result<u32, RepositoryError> {
    let out_directory = out_directory.as_ref();
    let mut n = num;
    check(self.backend.extract_images_from_synset(
      &c_path(&self.directory)?,
      &c_string(synset_id)?,
      &c_path(out_directory)?,
      &mut n,
    ))?;
    info!(
      "从 {} 解压了 {} 张图像到 {}",
      synset_id,
      n,
      out_directory.display()
    );
    Ok(n)
  }

  /// 按标注裁剪出目标，返回样本数
  pub fn extract_samples(
    &self,
    synset_id: &str,
    out_directory: impl AsRef<Path>,
    num: u32,
  ) -> Result<u32, RepositoryError> {
    let out_directory = out_directory.as_ref();
    let mut n = num;
    check(self.backend.extract_samples_from_synset(
      &c_path(&self.directory)?,
      &c_string(synset_id)?,
      &c_path(out_directory)?,
      &mut n,
    ))?;
    info!(
      "从 {} 裁剪了 {} 个样本到 {}",
      synset_id,
      n,
      out_directory.display()
    );
    Ok(n)
  }

  /// 从不同同义词集各取 `per_synset` 张，共 `num` 张
  pub fn extract_mixed_images(
    &self,
    out_directory: impl AsRef<Path>,
    num: u32,
    per_synset: u32,
  ) -> Result<(), RepositoryError> {
    let out_directory = out_directory.as_ref();
    check(self.backend.extract_mixed_images(
      &c_path(&self.directory)?,
      &c_path(out_directory)?,
      num,
      per_synset,
    ))?;
    info!("解压了 {} 张混合图像到 {}", num, out_directory.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ffi::mock::MockBackend;
  use std::fs;

  fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("artos-repo-{}-{}", name, std::process::id()));
    fs::remove_dir_all(&dir).ok();
    fs::create_dir_all(&dir).unwrap();
    dir
  }

  #[test]
  fn structure_problems_are_reported_in_order() {
    let dir = scratch("structure");
    assert_eq!(
      check_structure(dir.join("missing")),
      Err(StructureProblem::DirectoryNotFound)
    );
    assert_eq!(check_structure(&dir), Err(StructureProblem::NoSynsetList));
    fs::write(dir.join(SYNSET_LIST_FILE), "n02119789 kit fox\n").unwrap();
    assert_eq!(check_structure(&dir), Err(StructureProblem::NoImagesDirectory));
    fs::create_dir(dir.join(IMAGES_DIR)).unwrap();
    assert_eq!(
      check_structure(&dir),
      Err(StructureProblem::NoAnnotationDirectory)
    );
    fs::create_dir(dir.join(ANNOTATION_DIR)).unwrap();
    assert_eq!(check_structure(&dir), Err(StructureProblem::NoArchive));
    fs::write(dir.join(IMAGES_DIR).join("n02119789.tar"), b"").unwrap();
    assert_eq!(check_structure(&dir), Ok(()));
    assert_eq!(
      StructureProblem::NoImagesDirectory.to_string(),
      "Could not find \"Images\" subdirectory."
    );
    fs::remove_dir_all(&dir).ok();
  }

  #[test]
  fn synsets_and_search() {
    let dir = scratch("synsets");
    let repo = ImageRepository::new(Arc::new(MockBackend::new()), &dir);
    assert_eq!(repo.repository_type(), "ImageNet");
    repo.check_native().unwrap();

    let all = repo.synsets().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, "n02119789");

    let found = repo.search("fox", 10).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].description, "kit fox, Vulpes macrotis");
    assert!(repo.search("a", 1).unwrap().len() <= 1);
    assert!(repo.search("fox", 0).unwrap().is_empty());
    fs::remove_dir_all(&dir).ok();
  }

  #[test]
  fn missing_repository_is_rejected() {
    let repo = ImageRepository::new(Arc::new(MockBackend::new()), "/nonexistent/repo");
    assert!(matches!(repo.check_native(), Err(RepositoryError::Rejected(_))));
    assert!(matches!(
      repo.synsets(),
      Err(RepositoryError::Artos(ArtosError::InvalidRepository))
    ));
  }

  #[test]
  fn extraction_reports_count() {
    let dir = scratch("extract");
    let out = dir.join("out");
    fs::create_dir(&out).unwrap();
    let repo = ImageRepository::new(Arc::new(MockBackend::new()), &dir);
    assert_eq!(repo.extract_images("n02119789", &out, 10).unwrap(), 4);
    assert_eq!(repo.extract_samples("n02119789", &out, 2).unwrap(), 2);
    repo.extract_mixed_images(&out, 10, 2).unwrap();
    assert!(matches!(
      repo.extract_images("n02119789", dir.join("nope"), 1),
      Err(RepositoryError::Artos(ArtosError::DirectoryNotFound))
    ));
    assert_eq!(
      repo.synset_archive("n02119789"),
      dir.join("Images").join("n02119789.tar")
    );
    fs::remove_dir_all(&dir).ok();
  }
}
