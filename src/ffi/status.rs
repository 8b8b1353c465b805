// 该文件是 Artos 项目的一部分。
// src/ffi/status.rs - libartos 状态码
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::ffi::c_int;

use thiserror::Error;

pub const RES_OK: c_int = 0;
pub const RES_INVALID_HANDLE: c_int = -1;
pub const RES_DIRECTORY_NOT_FOUND: c_int = -2;
pub const RES_FILE_NOT_FOUND: c_int = -3;
pub const RES_FILE_ACCESS_DENIED: c_int = -4;
pub const RES_ABORTED: c_int = -5;
pub const RES_INDEX_OUT_OF_BOUNDS: c_int = -6;
pub const RES_INTERNAL_ERROR: c_int = -999;

pub const DETECT_RES_INVALID_IMG_DATA: c_int = -101;
pub const DETECT_RES_INVALID_MODEL_FILE: c_int = -102;
pub const DETECT_RES_INVALID_MODEL_LIST_FILE: c_int = -103;
pub const DETECT_RES_NO_MODELS: c_int = -104;
pub const DETECT_RES_INVALID_IMAGE: c_int = -105;
pub const DETECT_RES_NO_IMAGES: c_int = -106;
pub const DETECT_RES_NO_RESULTS: c_int = -107;
pub const DETECT_RES_INVALID_ANNOTATIONS: c_int = -108;

pub const LEARN_RES_FAILED: c_int = -201;
pub const LEARN_RES_INVALID_BG_FILE: c_int = -202;
pub const LEARN_RES_INVALID_IMG_DATA: c_int = -203;
pub const LEARN_RES_NO_SAMPLES: c_int = -204;
pub const LEARN_RES_MODEL_NOT_LEARNED: c_int = -205;
pub const LEARN_RES_FEATURE_EXTRACTOR_NOT_READY: c_int = -206;

pub const IMGREPO_RES_INVALID_REPOSITORY: c_int = -301;
pub const IMGREPO_RES_SYNSET_NOT_FOUND: c_int = -302;
pub const IMGREPO_RES_EXTRACTION_FAILED: c_int = -303;

pub const SETTINGS_RES_UNKNOWN_FEATURE_EXTRACTOR: c_int = -401;
pub const SETTINGS_RES_UNKNOWN_PARAMETER: c_int = -402;
pub const SETTINGS_RES_INVALID_PARAMETER_VALUE: c_int = -403;

/// libartos 返回的错误
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtosError {
  #[error("Invalid handle given")]
  InvalidHandle,
  #[error("Could not find the given directory")]
  DirectoryNotFound,
  #[error("File not found")]
  FileNotFound,
  #[error("Access to file denied")]
  FileAccessDenied,
  #[error("Operation aborted by user")]
  Aborted,
  #[error("Index out of bounds")]
  IndexOutOfBounds,
  #[error("Internal error")]
  InternalError,
  #[error("Could not allocate a new detector instance")]
  OutOfMemory,
  #[error("Invalid image")]
  InvalidImageData,
  #[error("Model file could not be read or parsed")]
  InvalidModelFile,
  #[error("Model list file could not be read or parsed")]
  InvalidModelListFile,
  #[error("Models must be added to the detector before detecting")]
  NoModels,
  #[error("Image could not be processed")]
  InvalidImage,
  #[error("No test samples have been added yet")]
  NoImages,
  #[error("The evaluator has not been run yet")]
  NoResults,
  #[error("Annotation file could not be read or parsed")]
  InvalidAnnotations,
  #[error("Learning the model failed for some reason")]
  LearnFailed,
  #[error("Given background statistics file is invalid")]
  InvalidBackgroundFile,
  #[error("Invalid image")]
  LearnInvalidImageData,
  #[error("No positive sample has been added yet")]
  NoSamples,
  #[error("No model has been learned yet")]
  ModelNotLearned,
  #[error("The feature extractor has not been configured properly")]
  FeatureExtractorNotReady,
  #[error("Given path doesn't point to a valid image repository")]
  InvalidRepository,
  #[error("Synset not found")]
  SynsetNotFound,
  #[error(
    "Could not extract images from synset. Please check your image repository and make sure, that the synset contains images"
  )]
  ExtractionFailed,
  #[error("Unknown feature extractor")]
  UnknownFeatureExtractor,
  #[error("Unknown feature extractor parameter")]
  UnknownParameter,
  #[error("Invalid value for feature extractor parameter")]
  InvalidParameterValue,
  #[error("This version of libartos does not provide {0}")]
  Unsupported(&'static str),
  #[error("Unknown error (code {0})")]
  Unknown(c_int),
}

impl ArtosError {
  pub fn from_code(code: c_int) -> Option<ArtosError> {
    let err = match code {
      RES_OK => return None,
      RES_INVALID_HANDLE => ArtosError::InvalidHandle,
      RES_DIRECTORY_NOT_FOUND => ArtosError::DirectoryNotFound,
      RES_FILE_NOT_FOUND => ArtosError::FileNotFound,
      RES_FILE_ACCESS_DENIED => ArtosError::FileAccessDenied,
      RES_ABORTED => ArtosError::Aborted,
      RES_INDEX_OUT_OF_BOUNDS => ArtosError::IndexOutOfBounds,
      RES_INTERNAL_ERROR => ArtosError::InternalError,
      DETECT_RES_INVALID_IMG_DATA => ArtosError::InvalidImageData,
      DETECT_RES_INVALID_MODEL_FILE => ArtosError::InvalidModelFile,
      DETECT_RES_INVALID_MODEL_LIST_FILE => ArtosError::InvalidModelListFile,
      DETECT_RES_NO_MODELS => ArtosError::NoModels,
      DETECT_RES_INVALID_IMAGE => ArtosError::InvalidImage,
      DETECT_RES_NO_IMAGES => ArtosError::NoImages,
      DETECT_RES_NO_RESULTS => ArtosError::NoResults,
      DETECT_RES_INVALID_ANNOTATIONS => ArtosError::InvalidAnnotations,
      LEARN_RES_FAILED => ArtosError::LearnFailed,
      LEARN_RES_INVALID_BG_FILE => ArtosError::InvalidBackgroundFile,
      LEARN_RES_INVALID_IMG_DATA => ArtosError::LearnInvalidImageData,
      LEARN_RES_NO_SAMPLES => ArtosError::NoSamples,
      LEARN_RES_MODEL_NOT_LEARNED => ArtosError::ModelNotLearned,
      LEARN_RES_FEATURE_EXTRACTOR_NOT_READY => ArtosError::FeatureExtractorNotReady,
      IMGREPO_RES_INVALID_REPOSITORY => ArtosError::InvalidRepository,
      IMGREPO_RES_SYNSET_NOT_FOUND => ArtosError::SynsetNotFound,
      IMGREPO_RES_EXTRACTION_FAILED => ArtosError::ExtractionFailed,
      SETTINGS_RES_UNKNOWN_FEATURE_EXTRACTOR => ArtosError::UnknownFeatureExtractor,
      SETTINGS_RES_UNKNOWN_PARAMETER => ArtosError::UnknownParameter,
      SETTINGS_RES_INVALID_PARAMETER_VALUE => ArtosError::InvalidParameterValue,
      other => ArtosError::Unknown(other),
    };
    Some(err)
  }

  /// 对应的原始状态码，库之外产生的错误返回 `None`
  pub fn code(&self) -> Option<c_int> {
    let code = match self {
      ArtosError::InvalidHandle => RES_INVALID_HANDLE,
      ArtosError::DirectoryNotFound => RES_DIRECTORY_NOT_FOUND,
      ArtosError::FileNotFound => RES_FILE_NOT_FOUND,
      ArtosError::FileAccessDenied => RES_FILE_ACCESS_DENIED,
      ArtosError::Aborted => RES_ABORTED,
      ArtosError::IndexOutOfBounds => RES_INDEX_OUT_OF_BOUNDS,
      ArtosError::InternalError => RES_INTERNAL_ERROR,
      ArtosError::InvalidImageData => DETECT_RES_INVALID_IMG_DATA,
      ArtosError::InvalidModelFile => DETECT_RES_INVALID_MODEL_FILE,
      ArtosError::InvalidModelListFile => DETECT_RES_INVALID_MODEL_LIST_FILE,
      ArtosError::NoModels => DETECT_RES_NO_MODELS,
      ArtosError::InvalidImage => DETECT_RES_INVALID_IMAGE,
      ArtosError::NoImages => DETECT_RES_NO_IMAGES,
      ArtosError::NoResults => DETECT_RES_NO_RESULTS,
      ArtosError::InvalidAnnotations => DETECT_RES_INVALID_ANNOTATIONS,
      ArtosError::LearnFailed => LEARN_RES_FAILED,
      ArtosError::InvalidBackgroundFile => LEARN_RES_INVALID_BG_FILE,
      ArtosError::LearnInvalidImageData => LEARN_RES_INVALID_IMG_DATA,
      ArtosError::NoSamples => LEARN_RES_NO_SAMPLES,
      ArtosError::ModelNotLearned => LEARN_RES_MODEL_NOT_LEARNED,
      ArtosError::FeatureExtractorNotReady => LEARN_RES_FEATURE_EXTRACTOR_NOT_READY,
      ArtosError::InvalidRepository => IMGREPO_RES_INVALID_REPOSITORY,
      ArtosError::SynsetNotFound => IMGREPO_RES_SYNSET_NOT_FOUND,
      ArtosError::ExtractionFailed => IMGREPO_RES_EXTRACTION_FAILED,
      ArtosError::UnknownFeatureExtractor => SETTINGS_RES_UNKNOWN_FEATURE_EXTRACTOR,
      ArtosError::UnknownParameter => SETTINGS_RES_UNKNOWN_PARAMETER,
      ArtosError::InvalidParameterValue => SETTINGS_RES_INVALID_PARAMETER_VALUE,
      ArtosError::Unknown(code) => *code,
      ArtosError::OutOfMemory | ArtosError::Unsupported(_) => return None,
    };
    Some(code)
  }
}

/// 非负状态码视为成功
pub fn check(code: c_int) -> Result<c_int, ArtosError> {
  if code >= RES_OK {
    Ok(code)
  } else {
    Err(ArtosError::from_code(code).unwrap_or(ArtosError::Unknown(code)))
  }
}
