// 该文件是 Artos 项目的一部分。
// src/main.rs - 命令行程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use std::{
  path::{Path, PathBuf},
  sync::{Arc, atomic::AtomicBool},
  thread,
  time::Duration,
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{Level, info, warn};

use artos::{
  Outcome,
  catalog::{MODEL_LIST_FILE, ModelList},
  config::ArtosConfig,
  detector::{Detection, Detector},
  evaluator::Evaluator,
  feature::{self, FeatureExtractor},
  ffi::LibArtos,
  input::Sample,
  learner::{learn_background, learn_from_files, learn_from_synset},
  model::{Mixture, ParamValue},
  output::DetectionRecord,
  repository::{self, ImageRepository},
  task::{Worker, install_interrupt},
};

use args::{
  Args, BgArgs, Command, ConfigCommand, DetectArgs, EvaluateArgs, FeaturesCommand, LearnArgs,
  ModelCommand, ModelSelection, ModelsCommand, RepoCommand,
};

const DEFAULT_BACKGROUND_FILE: &str = "bg.dat";

fn main() -> Result<()> {
  let args = Args::parse();

  let mut config = ArtosConfig::load(&args.config)?;
  config.debug |= args.debug;
  if let Some(dir) = &args.model_dir {
    config.model_dir = Some(dir.clone());
  }
  if let Some(library) = &args.library {
    config.library_path = Some(library.clone());
  }

  tracing_subscriber::fmt()
    .with_max_level(if config.debug {
      Level::DEBUG
    } else {
      Level::INFO
    })
    .init();

  match args.command {
    Command::Detect(a) => detect(&config, a),
    Command::Learn(a) => learn(&config, a),
    Command::Bg(a) => background(&config, a),
    Command::Evaluate(a) => evaluate(&config, a),
    Command::Models(c) => models(&config, c),
    Command::Model(c) => model(c),
    Command::Features(c) => features(&config, c),
    Command::Repo(c) => repo(&config, c),
    Command::Config(c) => config_command(&config, &args.config, c),
  }
}

fn load_backend(config: &ArtosConfig) -> Result<Arc<LibArtos>> {
  let lib = LibArtos::load(config.library_path.as_deref()).context("无法加载 libartos")?;
  Ok(Arc::new(lib))
}

fn list_path(config: &ArtosConfig, explicit: Option<&Path>) -> Result<PathBuf> {
  if let Some(path) = explicit {
    return Ok(path.to_path_buf());
  }
  let dir = config
    .model_dir()
    .context("找不到模型目录，请使用 --model-dir 指定")?;
  Ok(dir.join(MODEL_LIST_FILE))
}

fn repo_dir(config: &ArtosConfig, explicit: Option<&Path>) -> Result<PathBuf> {
  explicit
    .map(Path::to_path_buf)
    .or_else(|| config.repository_directory.clone())
    .context("未指定图像仓库目录，请使用 --repo 或在配置文件中设置 repository_directory")
}

/// 单个模型时构造只含一条记录的内存列表
fn selected_models(config: &ArtosConfig, selection: &ModelSelection) -> Result<ModelList> {
  let list = match &selection.model {
    Some(file) => {
      let mut list = ModelList::new(MODEL_LIST_FILE)?;
      list.add_entry(
        file,
        &selection.classname,
        selection.threshold,
        selection.synset.as_deref(),
        false,
      )?;
      list
    }
    None => ModelList::load(list_path(config, selection.list.as_deref())?)?,
  };
  if list.enabled().next().is_none() {
    bail!("没有可用的模型");
  }
  Ok(list)
}

/// 等待后台任务结束，期间输出进度
fn wait<T: Send + 'static>(worker: Worker<T>) -> Result<T> {
  let mut last = None;
  while !worker.is_finished() {
    thread::sleep(Duration::from_millis(500));
    let progress = (worker.progress(), worker.sub_progress());
    let ((current, total), (sub, sub_total)) = progress;
    if total == 0 || last == Some(progress) {
      continue;
    }
    if sub_total > 0 {
      info!("进度 {}/{} ({}/{})", current, total, sub, sub_total);
    } else {
      info!("进度 {}/{}", current, total);
    }
    last = Some(progress);
  }
  Ok(worker.join()?)
}

fn print_detections(detections: &[Detection]) {
  if detections.is_empty() {
    println!("未检测到目标");
    return;
  }
  for det in detections {
    println!(
      "  - {} ({}): {:.4} at [{}, {}, {}, {}]",
      det.classname,
      det.synset_id.as_deref().unwrap_or("-"),
      det.score,
      det.bbox.left(),
      det.bbox.top(),
      det.bbox.right(),
      det.bbox.bottom()
    );
  }
}

fn detect(config: &ArtosConfig, args: DetectArgs) -> Result<()> {
  let settings = &config.detector;
  let mut detector = Detector::new(
    load_backend(config)?,
    args.overlap.unwrap_or(settings.overlap),
    args.interval.unwrap_or(settings.interval),
    config.debug,
  )?;
  let list = selected_models(config, &args.models)?;
  let added = detector.add_model_list(&list)?;
  info!("已添加 {} 个模型", added);

  let limit = args.limit.unwrap_or(settings.limit);
  let now = std::time::Instant::now();
  let (detections, size) = match args.feature_dump {
    Some((width, height)) => (
      detector.detect_feature_dump(&args.input, width, height, limit)?,
      (width, height),
    ),
    None => {
      let sample = Sample::open(&args.input)
        .with_context(|| format!("无法读取 {}", args.input.display()))?;
      (detector.detect(&sample, limit)?, image_size(&args.input)?)
    }
  };
  info!("检测完成，耗时: {:.2?}", now.elapsed());
  print_detections(&detections);

  if let Some(output) = &args.output {
    if args.feature_dump.is_some() {
      bail!("特征文件没有可标注的图像");
    }
    write_annotated(&args.input, output, args.font.as_deref(), &detections)?;
    info!("标注图像已写入 {}", output.display());
  }
  if let Some(record) = &args.record {
    DetectionRecord::new(args.input.to_string_lossy(), size.0, size.1, detections).save(record)?;
    info!("检测记录已写入 {}", record.display());
  }
  Ok(())
}

#[cfg(feature = "read_image_file")]
fn image_size(path: &Path) -> Result<(u32, u32)> {
  Ok(image::image_dimensions(path)?)
}

#[cfg(not(feature = "read_image_file"))]
fn image_size(_path: &Path) -> Result<(u32, u32)> {
  Ok((0, 0))
}

#[cfg(feature = "save_image_file")]
fn write_annotated(
  input: &Path,
  output: &Path,
  font: Option<&Path>,
  detections: &[Detection],
) -> Result<()> {
  use artos::output::Draw;

  let draw = match font {
    Some(font) => Draw::with_font_file(font)?,
    None => Draw::default(),
  };
  let mut image = image::open(input)?.to_rgb8();
  draw.draw_detections(&mut image, detections);
  image.save(output)?;
  Ok(())
}

#[cfg(not(feature = "save_image_file"))]
fn write_annotated(_: &Path, _: &Path, _: Option<&Path>, _: &[Detection]) -> Result<()> {
  bail!("未启用 save_image_file 功能，无法写出标注图像")
}

fn learn(config: &ArtosConfig, args: LearnArgs) -> Result<()> {
  let backend = load_backend(config)?;
  let bg = args
    .bg
    .clone()
    .or_else(|| config.learner.background_file.clone())
    .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKGROUND_FILE));

  let mut settings = config.learner.clone();
  if let Some(n) = args.max_aspect_clusters {
    settings.max_aspect_clusters = n;
  }
  if let Some(n) = args.max_who_clusters {
    settings.max_who_clusters = n;
  }
  if args.no_loocv {
    settings.loocv = false;
  }
  let options = settings.learn_options(args.add);

  let cancel = Arc::new(AtomicBool::new(false));
  install_interrupt(cancel.clone())?;

  let debug = config.debug;
  let model_file = args.output.clone();
  let worker = match args.synset.clone() {
    Some(synset) => {
      let repo = repo_dir(config, args.repo.as_deref())?;
      Worker::spawn_with_cancel("learn", cancel, move |state| {
        let mut cb = |c: u32, t: u32, s: u32, st: u32| state.report_overall(c, t, s, st);
        learn_from_synset(
          backend.as_ref(),
          &repo,
          &synset,
          &bg,
          &model_file,
          &options,
          Some(&mut cb),
          debug,
        )
      })?
    }
    None => {
      let images = args.images.clone();
      let boxes = args.boxes.clone();
      Worker::spawn_with_cancel("learn", cancel, move |state| {
        let mut cb = |c: u32, t: u32, s: u32, st: u32| state.report_overall(c, t, s, st);
        learn_from_files(
          backend.as_ref(),
          &images,
          &boxes,
          &bg,
          &model_file,
          &options,
          Some(&mut cb),
          debug,
        )
      })?
    }
  };

  if wait(worker)?? == Outcome::Cancelled {
    warn!("学习已取消");
    return Ok(());
  }
  println!("模型已写入 {}", args.output.display());

  if let Some(classname) = &args.register {
    let mut list = ModelList::load(list_path(config, None)?)?;
    let index = list.add_entry(&args.output, classname, 0.0, args.synset.as_deref(), false)?;
    list.save()?;
    println!("已加入模型列表，编号 {}", index);
  }
  Ok(())
}

fn background(config: &ArtosConfig, args: BgArgs) -> Result<()> {
  let backend = load_backend(config)?;
  let repo = repo_dir(config, args.repo.as_deref())?;
  let bg = args
    .output
    .or_else(|| config.learner.background_file.clone())
    .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKGROUND_FILE));

  let cancel = Arc::new(AtomicBool::new(false));
  install_interrupt(cancel.clone())?;

  let target = bg.clone();
  let worker = Worker::spawn_with_cancel("background", cancel, move |state| {
    let mut cb = |c: u32, t: u32, s: u32, st: u32| state.report_overall(c, t, s, st);
    learn_background(
      backend.as_ref(),
      &repo,
      &target,
      args.num_images,
      args.max_offset,
      args.accurate,
      Some(&mut cb),
    )
  })?;

  match wait(worker)?? {
    Outcome::Completed => println!("背景统计已写入 {}", bg.display()),
    Outcome::Cancelled => warn!("背景统计学习已取消"),
  }
  Ok(())
}

fn evaluate(config: &ArtosConfig, args: EvaluateArgs) -> Result<()> {
  let mut evaluator = Evaluator::new(
    load_backend(config)?,
    config.detector.overlap,
    config.detector.interval,
    config.debug,
  )?;
  evaluator.add_model_list(&selected_models(config, &args.models)?)?;

  if args.from_synset.is_none() && args.positives.is_empty() {
    bail!("没有正样本，请使用 --from-synset 或 --positive");
  }
  if let Some(synset) = &args.from_synset {
    let repo = repo_dir(config, args.repo.as_deref())?;
    evaluator.add_samples_from_synset(&repo, synset, args.num_negative)?;
  }
  for (image, annotation) in &args.positives {
    evaluator.add_positive_annotated(image, annotation)?;
  }
  for negative in &args.negatives {
    let sample =
      Sample::open(negative).with_context(|| format!("无法读取 {}", negative.display()))?;
    evaluator.add_negative(&sample)?;
  }

  let granularity = args.granularity.unwrap_or(config.evaluator.granularity);
  let eq_overlap = args.eq_overlap.unwrap_or(config.evaluator.eq_overlap);

  let cancel = Arc::new(AtomicBool::new(false));
  install_interrupt(cancel.clone())?;

  let worker = Worker::spawn_with_cancel("evaluate", cancel, move |state| {
    let mut cb = |c: u32, t: u32| state.report(c, t);
    let result = evaluator.run(granularity, eq_overlap, Some(&mut cb));
    (evaluator, result)
  })?;
  let (evaluator, result) = wait(worker)?;
  if result? == Outcome::Cancelled {
    warn!("评估已取消");
    return Ok(());
  }

  for (name, summary) in evaluator.summaries()? {
    println!("{}:", name);
    println!("  平均精度: {:.4}", summary.average_precision);
    match summary.max_fmeasure {
      Some((f, threshold)) => println!("  最大 F 值: {:.4} (阈值 {})", f, threshold),
      None => println!("  最大 F 值: -"),
    }
    if let Some(p) = summary.at_zero {
      println!(
        "  阈值 {}: 精确率 {:.4}, 召回率 {:.4}, F 值 {:.4}",
        p.threshold, p.precision, p.recall, p.fmeasure
      );
    }
  }

  if let Some(csv) = &args.csv {
    evaluator.export_csv(csv)?;
    info!("原始结果已导出到 {}", csv.display());
  }
  if let Some(dump) = &args.dump {
    evaluator.dump_results(dump)?;
    info!("结果文件已写入 {}", dump.display());
  }
  Ok(())
}

fn models(config: &ArtosConfig, command: ModelsCommand) -> Result<()> {
  let mut list = ModelList::load(list_path(config, None)?)?;
  match command {
    ModelsCommand::List => {
      for (index, entry) in list.entries().iter().enumerate() {
        println!(
          "{:>3} {} {:<24} {:>10.4} {:<10} {}",
          index,
          if entry.disabled { "-" } else { "+" },
          entry.classname,
          entry.threshold,
          entry.synset_id.as_deref().unwrap_or("-"),
          entry.model_file
        );
      }
      return Ok(());
    }
    ModelsCommand::Enable { index } => list.set_disabled(index, false)?,
    ModelsCommand::Disable { index } => list.set_disabled(index, true)?,
    ModelsCommand::Delete { index } => {
      list.delete_entry(index)?;
      return Ok(());
    }
    ModelsCommand::Rename { index, classname } => list.rename(index, &classname)?,
    ModelsCommand::Threshold { index, threshold } => list.set_threshold(index, threshold)?,
  }
  list.save()?;
  Ok(())
}

fn model(command: ModelCommand) -> Result<()> {
  match command {
    ModelCommand::Info { file } => {
      let mixture = Mixture::load(&file)?;
      println!("特征类型: {}", mixture.feature_type);
      for (name, value) in &mixture.parameters {
        println!("  {} = {}", name, value);
      }
      for (i, component) in mixture.components().iter().enumerate() {
        println!(
          "分量 {}: 偏置 {:.6}, {} 个部件",
          i,
          component.bias,
          component.parts.len()
        );
        for (j, part) in component.parts.iter().enumerate() {
          println!(
            "  部件 {}: {}x{}x{}, 偏移 ({}, {}), 形变 {:?}",
            j,
            part.rows(),
            part.cols(),
            part.features(),
            part.offset.0,
            part.offset.1,
            part.deformation
          );
        }
      }
    }
    ModelCommand::RemoveComponent { file, index } => {
      let mut mixture = Mixture::load(&file)?;
      mixture.remove_component(index)?;
      mixture.save(&file)?;
      println!(
        "已删除分量 {}，剩余 {} 个",
        index,
        mixture.num_components()
      );
    }
    ModelCommand::Visualize {
      file,
      output,
      cell_size,
      padding,
    } => visualize(&file, &output, cell_size, padding)?,
  }
  Ok(())
}

#[cfg(feature = "visualize")]
fn visualize(file: &Path, output: &Path, cell_size: u32, padding: u32) -> Result<()> {
  let image = Mixture::load(file)?.visualize(cell_size, padding)?;
  image.save(output)?;
  info!("模型图像已写入 {}", output.display());
  Ok(())
}

#[cfg(not(feature = "visualize"))]
fn visualize(_: &Path, _: &Path, _: u32, _: u32) -> Result<()> {
  bail!("未启用 visualize 功能")
}

fn features(config: &ArtosConfig, command: FeaturesCommand) -> Result<()> {
  let backend = load_backend(config)?;
  match command {
    FeaturesCommand::List => {
      let current = FeatureExtractor::current(backend.clone())?;
      for (type_, name) in feature::list(backend.as_ref())? {
        let mark = if type_ == current.type_name() { "*" } else { " " };
        println!("{} {:<12} {}", mark, type_, name);
      }
    }
    FeaturesCommand::Params { type_ } => {
      let mut extractor = match type_ {
        Some(t) => FeatureExtractor::of_type(backend, &t)?,
        None => FeatureExtractor::current(backend)?,
      };
      println!("{} ({})", extractor.type_name(), extractor.name());
      for (name, value) in extractor.params()? {
        println!("  {} = {}", name, value);
      }
    }
    FeaturesCommand::Set { name, value, type_ } => {
      let mut extractor = match type_ {
        Some(t) => {
          let mut extractor = FeatureExtractor::of_type(backend, &t)?;
          extractor.set_as_default()?;
          extractor
        }
        None => FeatureExtractor::current(backend)?,
      };
      extractor.set_param(&name, ParamValue::infer(&value))?;
      let current = extractor.param(&name)?;
      println!(
        "{}.{} = {}",
        extractor.type_name(),
        name,
        current.map(|v| v.to_string()).unwrap_or_default()
      );
    }
  }
  Ok(())
}

fn repo(config: &ArtosConfig, command: RepoCommand) -> Result<()> {
  match command {
    RepoCommand::Check { dir } => {
      let dir = repo_dir(config, dir.as_deref())?;
      repository::check_structure(&dir)?;
      match load_backend(config) {
        Ok(backend) => {
          let repo = ImageRepository::new(backend, &dir);
          repo.check_native()?;
          println!("{}: {} 仓库有效", dir.display(), repo.repository_type());
        }
        Err(e) => {
          warn!("跳过 libartos 检查: {:#}", e);
          println!("{}: 目录结构有效", dir.display());
        }
      }
    }
    RepoCommand::Search {
      phrase,
      limit,
      repo,
    } => {
      let repo = ImageRepository::new(load_backend(config)?, repo_dir(config, repo.as_deref())?);
      for synset in repo.search(&phrase, limit)? {
        println!("{} {:>6.3} {}", synset.id, synset.score, synset.description);
      }
    }
    RepoCommand::Extract {
      synset,
      output,
      num,
      samples,
      per_synset,
      repo,
    } => {
      let repo = ImageRepository::new(load_backend(config)?, repo_dir(config, repo.as_deref())?);
      std::fs::create_dir_all(&output)
        .with_context(|| format!("无法创建输出目录 {}", output.display()))?;
      match synset {
        Some(id) if samples => {
          let n = repo.extract_samples(&id, &output, num)?;
          println!("已提取 {} 个样本到 {}", n, output.display());
        }
        Some(id) => {
          let n = repo.extract_images(&id, &output, num)?;
          println!("已提取 {} 张图像到 {}", n, output.display());
        }
        None => {
          repo.extract_mixed_images(&output, num, per_synset)?;
          println!("已提取混合图像到 {}", output.display());
        }
      }
    }
  }
  Ok(())
}

fn config_command(config: &ArtosConfig, path: &Path, command: ConfigCommand) -> Result<()> {
  match command {
    ConfigCommand::Show => println!("{}", serde_json::to_string_pretty(config)?),
    ConfigCommand::Init { force } => {
      if path.exists() && !force {
        bail!("{} 已存在，使用 --force 覆盖", path.display());
      }
      ArtosConfig::default().save(path)?;
    }
  }
  Ok(())
}
