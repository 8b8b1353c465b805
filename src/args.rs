// 该文件是 Artos 项目的一部分。
// src/args.rs - 命令行参数
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use artos::{bbox::BoundingBox, config::CONFIG_FILE};

/// Artos 自适应实时目标检测工具
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 配置文件路径，不存在时使用默认配置
  #[arg(long, global = true, default_value = CONFIG_FILE, value_name = "FILE")]
  pub config: PathBuf,

  /// libartos 动态库路径
  #[arg(long, global = true, value_name = "FILE")]
  pub library: Option<PathBuf>,

  /// 模型目录，模型列表为其中的 models.list
  #[arg(long, global = true, value_name = "DIR")]
  pub model_dir: Option<PathBuf>,

  /// 输出调试信息
  #[arg(long, global = true)]
  pub debug: bool,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// 在图像或特征文件上检测目标
  Detect(DetectArgs),
  /// 学习新模型
  Learn(LearnArgs),
  /// 学习背景统计
  Bg(BgArgs),
  /// 评估模型并导出结果
  Evaluate(EvaluateArgs),
  /// 管理模型列表
  #[command(subcommand)]
  Models(ModelsCommand),
  /// 查看与编辑单个模型文件
  #[command(subcommand)]
  Model(ModelCommand),
  /// 特征提取器
  #[command(subcommand)]
  Features(FeaturesCommand),
  /// 图像仓库
  #[command(subcommand)]
  Repo(RepoCommand),
  /// 配置文件
  #[command(subcommand)]
  Config(ConfigCommand),
}

/// 使用哪些模型。未指定 `--model` 时使用模型列表。
#[derive(ClapArgs, Debug)]
pub struct ModelSelection {
  /// 单个模型文件
  #[arg(long, value_name = "FILE")]
  pub model: Option<PathBuf>,

  /// 单个模型的类名
  #[arg(long, default_value = "object")]
  pub classname: String,

  /// 单个模型的阈值
  #[arg(long, default_value = "0")]
  pub threshold: f64,

  /// 单个模型的同义词集 ID
  #[arg(long, value_name = "ID", requires = "model")]
  pub synset: Option<String>,

  /// 模型列表文件，默认为模型目录中的 models.list
  #[arg(long, value_name = "FILE", conflicts_with = "model")]
  pub list: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct DetectArgs {
  /// 输入图像（JPEG 由库直接解码）或特征文件
  #[arg(value_name = "INPUT")]
  pub input: PathBuf,

  #[command(flatten)]
  pub models: ModelSelection,

  /// 输入为预先提取的特征文件，需要给出原图尺寸 WIDTHxHEIGHT
  #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
  pub feature_dump: Option<(u32, u32)>,

  /// 最多返回的结果数
  #[arg(long, value_name = "COUNT")]
  pub limit: Option<usize>,

  /// 非极大值抑制的最小重叠率
  #[arg(long, value_name = "RATIO")]
  pub overlap: Option<f64>,

  /// 每个八度的金字塔层数
  #[arg(long, value_name = "LEVELS")]
  pub interval: Option<i32>,

  /// 写出标注后的图像
  #[arg(long, value_name = "FILE")]
  pub output: Option<PathBuf>,

  /// 写出 JSON 检测记录
  #[arg(long, value_name = "FILE")]
  pub record: Option<PathBuf>,

  /// 标注所用的字体文件
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct LearnArgs {
  /// 正样本图像（JPEG），与 `--synset` 二选一
  #[arg(value_name = "IMAGE", required_unless_present = "synset")]
  pub images: Vec<PathBuf>,

  /// 与图像一一对应的边界框 left,top,right,bottom；`-` 表示整幅图像
  #[arg(long = "bbox", value_name = "BOX", value_parser = parse_optional_bbox)]
  pub boxes: Vec<Option<BoundingBox>>,

  /// 从图像仓库的同义词集学习
  #[arg(long, value_name = "ID", conflicts_with = "images")]
  pub synset: Option<String>,

  /// 图像仓库目录
  #[arg(long, value_name = "DIR")]
  pub repo: Option<PathBuf>,

  /// 背景统计文件
  #[arg(long, value_name = "FILE")]
  pub bg: Option<PathBuf>,

  /// 输出模型文件
  #[arg(long, short, value_name = "FILE")]
  pub output: PathBuf,

  /// 追加到已有模型，而不是覆盖
  #[arg(long)]
  pub add: bool,

  /// 宽高比聚类的最大数目
  #[arg(long, value_name = "COUNT")]
  pub max_aspect_clusters: Option<u32>,

  /// WHO 聚类的最大数目
  #[arg(long, value_name = "COUNT")]
  pub max_who_clusters: Option<u32>,

  /// 阈值优化不使用留一交叉验证
  #[arg(long)]
  pub no_loocv: bool,

  /// 学习完成后以此类名加入模型列表
  #[arg(long, value_name = "CLASSNAME")]
  pub register: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct BgArgs {
  /// 图像仓库目录
  #[arg(long, value_name = "DIR")]
  pub repo: Option<PathBuf>,

  /// 输出的背景统计文件
  #[arg(long, short, value_name = "FILE")]
  pub output: Option<PathBuf>,

  /// 使用的负样本图像数
  #[arg(long, default_value = "1000", value_name = "COUNT")]
  pub num_images: u32,

  /// 自相关函数的最大偏移
  #[arg(long, default_value_t = artos::learner::DEFAULT_MAX_OFFSET, value_name = "CELLS")]
  pub max_offset: u32,

  /// 精确计算自相关函数（较慢）
  #[arg(long)]
  pub accurate: bool,
}

#[derive(ClapArgs, Debug)]
pub struct EvaluateArgs {
  #[command(flatten)]
  pub models: ModelSelection,

  /// 以图像仓库中的同义词集为正样本
  #[arg(long = "from-synset", value_name = "ID")]
  pub from_synset: Option<String>,

  /// 图像仓库目录
  #[arg(long, value_name = "DIR")]
  pub repo: Option<PathBuf>,

  /// 从其他同义词集抽取的负样本数
  #[arg(long, default_value = "0", value_name = "COUNT")]
  pub num_negative: u32,

  /// 带标注的正样本 IMAGE=ANNOTATION
  #[arg(long = "positive", value_name = "IMAGE=ANNOTATION", value_parser = parse_pair)]
  pub positives: Vec<(PathBuf, PathBuf)>,

  /// 负样本图像
  #[arg(long = "negative", value_name = "IMAGE")]
  pub negatives: Vec<PathBuf>,

  /// 阈值采样数
  #[arg(long, value_name = "COUNT")]
  pub granularity: Option<u32>,

  /// 判定为正确检测的最小重叠率
  #[arg(long, value_name = "RATIO")]
  pub eq_overlap: Option<f64>,

  /// 导出原始结果为 CSV
  #[arg(long, value_name = "FILE")]
  pub csv: Option<PathBuf>,

  /// 由库写出结果文件
  #[arg(long, value_name = "FILE")]
  pub dump: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
  /// 列出模型
  List,
  /// 启用模型
  Enable { index: usize },
  /// 禁用模型
  Disable { index: usize },
  /// 删除模型及其文件
  Delete { index: usize },
  /// 修改类名
  Rename { index: usize, classname: String },
  /// 修改阈值
  Threshold { index: usize, threshold: f64 },
}

#[derive(Subcommand, Debug)]
pub enum ModelCommand {
  /// 显示模型结构
  Info {
    #[arg(value_name = "FILE")]
    file: PathBuf,
  },
  /// 删除一个分量
  RemoveComponent {
    #[arg(value_name = "FILE")]
    file: PathBuf,
    index: usize,
  },
  /// 将 HOG 模型渲染为图像
  Visualize {
    #[arg(value_name = "FILE")]
    file: PathBuf,
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,
    /// 每个单元的像素数
    #[arg(long, default_value = "20", value_name = "PIXELS")]
    cell_size: u32,
    /// 分量之间的间距
    #[arg(long, default_value = "10", value_name = "PIXELS")]
    padding: u32,
  },
}

#[derive(Subcommand, Debug)]
pub enum FeaturesCommand {
  /// 列出可用的特征提取器
  List,
  /// 列出特征提取器的参数，默认为当前提取器
  Params {
    #[arg(value_name = "TYPE")]
    type_: Option<String>,
  },
  /// 设置参数
  Set {
    name: String,
    value: String,
    /// 先切换到该提取器
    #[arg(long = "type", value_name = "TYPE")]
    type_: Option<String>,
  },
}

#[derive(Subcommand, Debug)]
pub enum RepoCommand {
  /// 检查仓库结构
  Check {
    #[arg(value_name = "DIR")]
    dir: Option<PathBuf>,
  },
  /// 按描述搜索同义词集
  Search {
    phrase: String,
    #[arg(long, default_value = "10", value_name = "COUNT")]
    limit: usize,
    #[arg(long, value_name = "DIR")]
    repo: Option<PathBuf>,
  },
  /// 从同义词集提取图像或样本
  Extract {
    /// 同义词集 ID；省略时从所有同义词集混合提取
    #[arg(value_name = "ID")]
    synset: Option<String>,
    #[arg(long, short, value_name = "DIR")]
    output: PathBuf,
    #[arg(long, default_value = "10", value_name = "COUNT")]
    num: u32,
    /// 按标注裁剪出样本，而不是整幅图像
    #[arg(long, requires = "synset")]
    samples: bool,
    /// 混合提取时每个同义词集的图像数
    #[arg(long, default_value = "1", value_name = "COUNT")]
    per_synset: u32,
    #[arg(long, value_name = "DIR")]
    repo: Option<PathBuf>,
  },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
  /// 显示生效的配置
  Show,
  /// 写出默认配置
  Init {
    /// 覆盖已有文件
    #[arg(long)]
    force: bool,
  },
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
  let (w, h) = s
    .split_once(['x', 'X'])
    .ok_or_else(|| format!("尺寸应为 WIDTHxHEIGHT: {}", s))?;
  let parse = |v: &str| v.trim().parse::<u32>().map_err(|e| format!("{}: {}", v, e));
  Ok((parse(w)?, parse(h)?))
}

fn parse_optional_bbox(s: &str) -> Result<Option<BoundingBox>, String> {
  if s.trim() == "-" {
    return Ok(None);
  }
  let coords = s
    .split(',')
    .map(|v| v.trim().parse::<i32>().map_err(|e| format!("{}: {}", v, e)))
    .collect::<Result<Vec<_>, _>>()?;
  let [left, top, right, bottom] = coords[..] else {
    return Err(format!("边界框应为 left,top,right,bottom: {}", s));
  };
  BoundingBox::new(left, top, right, bottom)
    .map(Some)
    .map_err(|e| e.to_string())
}

fn parse_pair(s: &str) -> Result<(PathBuf, PathBuf), String> {
  let (image, annotation) = s
    .split_once('=')
    .ok_or_else(|| format!("应为 IMAGE=ANNOTATION: {}", s))?;
  Ok((PathBuf::from(image), PathBuf::from(annotation)))
}
