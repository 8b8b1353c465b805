// 该文件是 Artos 项目的一部分。
// src/model/codec.rs - 模型文件的读写
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  fmt::Write as _,
  fs,
  io::ErrorKind,
  path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, info};

use super::{Component, FormatVersion, Mixture, ParamValue, Part};

const STR_OPEN: &str = "{str{";
const STR_CLOSE: &str = "}str}";

#[derive(Debug, Error)]
pub enum CodecError {
  #[error("模型文件不存在: {0}")]
  NotFound(PathBuf),
  #[error("模型文件读写错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("模型文件第 {line} 行解析失败{}: {message}", location(.component, .part))]
  Parse {
    line: usize,
    component: Option<usize>,
    part: Option<usize>,
    message: String,
  },
  #[error("特征提取器参数行无效: {0}")]
  Parameters(String),
  #[error("仅支持 HOG 模型，当前类型: {0}")]
  UnsupportedType(String),
  #[error("分量索引越界: {index}，共 {len} 个分量")]
  IndexOutOfRange { index: usize, len: usize },
  #[error("不能移除模型的最后一个分量")]
  LastComponent,
  #[error("特征类型不一致: {0} 与 {1}")]
  TypeMismatch(String, String),
  #[error("模型无效: {0}")]
  Invalid(String),
}

fn location(component: &Option<usize>, part: &Option<usize>) -> String {
  match (component, part) {
    (Some(c), Some(p)) => format!(" (分量 {}, 部件 {})", c, p),
    (Some(c), None) => format!(" (分量 {})", c),
    _ => String::new(),
  }
}

/// 逐行读取，记录行号与当前位置
struct Cursor<'a> {
  lines: std::iter::Enumerate<std::str::Lines<'a>>,
  line: usize,
  component: Option<usize>,
  part: Option<usize>,
}

impl<'a> Cursor<'a> {
  fn new(text: &'a str) -> Self {
    Cursor {
      lines: text.lines().enumerate(),
      line: 0,
      component: None,
      part: None,
    }
  }

  fn error(&self, message: impl Into<String>) -> CodecError {
    CodecError::Parse {
      line: self.line,
      component: self.component,
      part: self.part,
      message: message.into(),
    }
  }

  fn next_line(&mut self) -> Result<&'a str, CodecError> {
    match self.lines.next() {
      Some((i, l)) => {
        self.line = i + 1;
        Ok(l.trim())
      }
      None => {
        self.line += 1;
        Err(self.error("文件意外结束"))
      }
    }
  }

  fn next_non_empty(&mut self) -> Result<&'a str, CodecError> {
    loop {
      let line = self.next_line()?;
      if !line.is_empty() {
        return Ok(line);
      }
    }
  }

  fn number<T: std::str::FromStr>(&self, token: Option<&str>, what: &str) -> Result<T, CodecError> {
    let token = token.ok_or_else(|| self.error(format!("缺少{}", what)))?;
    token
      .parse()
      .map_err(|_| self.error(format!("{}无效: {:?}", what, token)))
  }
}

/// 解析模型文件内容
pub fn parse(text: &str) -> Result<Mixture, CodecError> {
  let mut cur = Cursor::new(text);
  let first = cur.next_non_empty()?;

  let (format, feature_type, parameters, count) = match first.parse::<i64>() {
    Ok(count) => (FormatVersion::V1, "HOG".to_string(), Mixture::v1_parameters(), count),
    Err(_) => {
      let params = parse_parameters(cur.next_line()?)?;
      let count_line = cur.next_non_empty()?;
      let count = cur.number::<i64>(Some(count_line), "分量数")?;
      (FormatVersion::V2, first.to_string(), params, count)
    }
  };
  if count < 1 {
    return Err(cur.error(format!("分量数必须为正: {}", count)));
  }

  // 计数来自文件，不据此预分配
  let mut components = Vec::new();
  for c in 0..count as usize {
    cur.component = Some(c);
    cur.part = None;
    components.push(parse_component(&mut cur)?);
  }

  debug!(
    "解析模型: 类型 {}, {} 个参数, {} 个分量",
    feature_type,
    parameters.len(),
    components.len()
  );
  let mut mixture = Mixture::new(feature_type, parameters, components)?;
  mixture.format = format;
  Ok(mixture)
}

fn parse_component(cur: &mut Cursor<'_>) -> Result<Component, CodecError> {
  let header = cur.next_non_empty()?;
  let mut tok = header.split_whitespace();
  let parts: i64 = cur.number(tok.next(), "部件数")?;
  let bias: f64 = cur.number(tok.next(), "偏置")?;
  if parts < 1 {
    return Err(cur.error(format!("部件数必须为正: {}", parts)));
  }

  let mut component = Component {
    bias,
    parts: Vec::new(),
  };
  for p in 0..parts as usize {
    cur.part = Some(p);
    let part = parse_part(cur)?;
    if let Some(root) = component.root()
      && root.features != part.features
    {
      return Err(cur.error(format!(
        "特征维数 {} 与根部件的 {} 不一致",
        part.features, root.features
      )));
    }
    component.parts.push(part);
  }
  Ok(component)
}

fn parse_part(cur: &mut Cursor<'_>) -> Result<Part, CodecError> {
  let header = cur.next_non_empty()?;
  let tok: Vec<&str> = header.split_whitespace().collect();
  if tok.len() != 9 {
    return Err(cur.error(format!("部件头应有 9 个字段，实际 {} 个", tok.len())));
  }
  let rows: usize = cur.number(Some(tok[0]), "行数")?;
  let cols: usize = cur.number(Some(tok[1]), "列数")?;
  let features: usize = cur.number(Some(tok[2]), "特征维数")?;
  if rows == 0 || cols == 0 || features == 0 {
    return Err(cur.error(format!("部件尺寸不能为零: {}x{}x{}", rows, cols, features)));
  }
  let offset = (
    cur.number::<i32>(Some(tok[3]), "偏移")?,
    cur.number::<i32>(Some(tok[4]), "偏移")?,
  );
  let mut deformation = [0.0; 4];
  for (d, t) in deformation.iter_mut().zip(&tok[5..]) {
    *d = cur.number(Some(t), "形变系数")?;
  }

  let per_row = cols
    .checked_mul(features)
    .filter(|n| n.checked_mul(rows).is_some())
    .ok_or_else(|| cur.error(format!("部件尺寸溢出: {}x{}x{}", rows, cols, features)))?;
  let mut data = Vec::new();
  for _ in 0..rows {
    let line = cur.next_line()?;
    let before = data.len();
    for t in line.split_whitespace() {
      data.push(cur.number::<f64>(Some(t), "权重")?);
    }
    let got = data.len() - before;
    if got != per_row {
      return Err(cur.error(format!("该行应有 {} 个权重，实际 {} 个", per_row, got)));
    }
  }

  Part::new(rows, cols, features, data, offset, deformation)
}

/// 解析参数行。`{str{`...`}str}` 包围的若干记号合并为一个字符串值，
/// 合并时丢弃记号间的空白。
pub(crate) fn parse_parameters(line: &str) -> Result<Vec<(String, ParamValue)>, CodecError> {
  let mut tokens: Vec<(String, bool)> = Vec::new();
  let mut open: Option<String> = None;
  for t in line.split_whitespace() {
    let merged = match open.take() {
      Some(mut s) => {
        s.push_str(t);
        s
      }
      None if t.starts_with(STR_OPEN) => t.to_string(),
      None => {
        tokens.push((t.to_string(), false));
        continue;
      }
    };
    if merged.len() >= STR_OPEN.len() + STR_CLOSE.len() && merged.ends_with(STR_CLOSE) {
      let inner = &merged[STR_OPEN.len()..merged.len() - STR_CLOSE.len()];
      tokens.push((inner.to_string(), true));
    } else {
      open = Some(merged);
    }
  }
  if let Some(s) = open {
    return Err(CodecError::Parameters(format!("字符串未闭合: {}", s)));
  }
  if tokens.len() % 2 != 0 {
    return Err(CodecError::Parameters(format!(
      "记号数为奇数 ({}): {}",
      tokens.len(),
      line
    )));
  }

  Ok(
    tokens
      .chunks(2)
      .map(|kv| {
        let (key, _) = &kv[0];
        let (value, quoted) = &kv[1];
        let value = if *quoted {
          ParamValue::String(value.clone())
        } else {
          ParamValue::infer(value)
        };
        (key.clone(), value)
      })
      .collect(),
  )
}

/// 整数值的权重写为整数，其余按最短可还原的十进制表示写出
fn number(v: f64) -> String {
  if v.is_finite() && v.trunc() == v && v.abs() < 1e15 {
    format!("{}", v as i64)
  } else {
    format!("{}", v)
  }
}

fn parameter_line(params: &[(String, ParamValue)]) -> String {
  params
    .iter()
    .map(|(k, v)| match v {
      ParamValue::String(s) => format!("{} {}{}{}", k, STR_OPEN, s, STR_CLOSE),
      v => format!("{} {}", k, v),
    })
    .collect::<Vec<_>>()
    .join(" ")
}

/// 序列化为模型文件内容。v1 模型不写文件头。
pub fn serialize(mixture: &Mixture) -> String {
  let mut out = String::new();
  if mixture.format == FormatVersion::V2 {
    let _ = writeln!(out, "{}", mixture.feature_type);
    let _ = writeln!(out, "{}", parameter_line(&mixture.parameters));
    out.push('\n');
  }
  let _ = writeln!(out, "{}", mixture.components.len());
  for comp in &mixture.components {
    let _ = writeln!(out, "{} {}", comp.parts.len(), number(comp.bias));
    for part in &comp.parts {
      let _ = write!(
        out,
        "{} {} {} {} {}",
        part.rows, part.cols, part.features, part.offset.0, part.offset.1
      );
      for d in part.deformation {
        let _ = write!(out, " {}", number(d));
      }
      out.push('\n');
      for r in 0..part.rows {
        let row: Vec<String> = part.row(r).iter().map(|&w| number(w)).collect();
        let _ = writeln!(out, "{}", row.join(" "));
      }
    }
    out.push('\n');
  }
  out
}

pub(crate) fn read_file(path: &Path) -> Result<Mixture, CodecError> {
  let text = match fs::read_to_string(path) {
    Ok(t) => t,
    Err(e) if e.kind() == ErrorKind::NotFound => {
      return Err(CodecError::NotFound(path.to_path_buf()));
    }
    Err(e) => return Err(e.into()),
  };
  info!("加载模型文件: {}", path.display());
  parse(&text)
}

pub(crate) fn write_file(path: &Path, mixture: &Mixture) -> Result<(), CodecError> {
  fs::write(path, serialize(mixture))?;
  info!(
    "保存模型文件: {} ({} 个分量)",
    path.display(),
    mixture.num_components()
  );
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::tests::sample_mixture;

  const V1: &str = "1\n\
    2 -0.75\n\
    1 2 2 0 0 0 0 0 0\n\
    1 0.5 -1 2\n\
    1 1 2 1 0 0.01 0 0.02 0\n\
    3 4\n\
    \n";

  #[test]
  fn v1_implies_hog() {
    let m = parse(V1).unwrap();
    assert_eq!(m.format, FormatVersion::V1);
    assert_eq!(m.feature_type, "HOG");
    assert_eq!(m.parameter("cellSizeX"), Some(&ParamValue::Int(8)));
    assert_eq!(m.parameter("cellSizeY"), Some(&ParamValue::Int(8)));
    let comp = &m.components()[0];
    assert_eq!(comp.bias, -0.75);
    assert_eq!(comp.parts[0].cell(0, 1), &[-1.0, 2.0]);
    assert_eq!(comp.parts[1].offset, (1, 0));
    assert_eq!(comp.parts[1].deformation, [0.01, 0.0, 0.02, 0.0]);
    // v1 原样写回，不添加文件头
    assert_eq!(serialize(&m).lines().next(), Some("1"));
  }

  #[test]
  fn v2_string_parameters_are_merged() {
    let text = "Caffe\n\
      protoFile {str{/models/a b.prototxt}str} layer {str{pool5}str} scale 0.5 count 3 tag {str{8}str}\n\
      \n\
      1\n\
      1 1.5\n\
      1 1 3 0 0 0 0 0 0\n\
      0.25 0.5 1\n";
    let m = parse(text).unwrap();
    assert_eq!(m.feature_type, "Caffe");
    assert_eq!(
      m.parameter("protoFile"),
      Some(&ParamValue::String("/models/ab.prototxt".into()))
    );
    assert_eq!(m.parameter("layer"), Some(&ParamValue::String("pool5".into())));
    assert_eq!(m.parameter("scale"), Some(&ParamValue::Scalar(0.5)));
    assert_eq!(m.parameter("count"), Some(&ParamValue::Int(3)));
    // 带标记的字符串不会被推断为整数
    assert_eq!(m.parameter("tag"), Some(&ParamValue::String("8".into())));
    assert_eq!(m.format, FormatVersion::V2);
  }

  #[test]
  fn odd_parameter_tokens_fail() {
    assert!(matches!(
      parse_parameters("cellSizeX 8 cellSizeY"),
      Err(CodecError::Parameters(_))
    ));
    assert!(matches!(
      parse_parameters("name {str{never closed"),
      Err(CodecError::Parameters(_))
    ));
    assert!(parse_parameters("").unwrap().is_empty());
  }

  #[test]
  fn serialize_then_parse_keeps_model() {
    let m = sample_mixture(2);
    let text = serialize(&m);
    assert!(text.starts_with("HOG\ncellSizeX 8 cellSizeY 8\n\n2\n"));
    assert_eq!(parse(&text).unwrap(), m);
  }

  #[test]
  fn integral_weights_are_written_bare() {
    assert_eq!(number(3.0), "3");
    assert_eq!(number(-0.0), "0");
    assert_eq!(number(-2.5), "-2.5");
    assert_eq!(number(0.1), "0.1");
  }

  #[test]
  fn row_length_mismatch_reports_location() {
    let text = "HOG\ncellSizeX 8\n\n1\n1 0\n2 1 2 0 0 0 0 0 0\n1 2\n3\n";
    match parse(text) {
      Err(CodecError::Parse {
        line,
        component,
        part,
        ..
      }) => {
        assert_eq!(line, 8);
        assert_eq!(component, Some(0));
        assert_eq!(part, Some(0));
      }
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn truncated_file_fails() {
    let text = "HOG\n\n\n2\n1 0\n1 1 1 0 0 0 0 0 0\n1\n";
    assert!(matches!(parse(text), Err(CodecError::Parse { .. })));
    assert!(matches!(parse(""), Err(CodecError::Parse { .. })));
  }

  #[test]
  fn oversized_counts_are_parse_errors() {
    assert!(matches!(
      parse("HOG\n\n\n99999999999999\n1 0\n"),
      Err(CodecError::Parse { .. })
    ));
    assert!(matches!(
      parse("1\n99999999999999 0\n1 1 1 0 0 0 0 0 0\n1\n"),
      Err(CodecError::Parse { .. })
    ));
    assert!(matches!(
      parse("1\n1 0\n4294967296 4294967296 32 0 0 0 0 0 0\n1\n"),
      Err(CodecError::Parse { .. })
    ));
    assert!(matches!(
      parse("1\n1 0\n100000000 100000000 32 0 0 0 0 0 0\n1\n"),
      Err(CodecError::Parse { .. })
    ));
  }

  #[test]
  fn missing_file_is_not_found() {
    let path = std::env::temp_dir().join("artos-codec-missing-7f3a.txt");
    assert!(matches!(read_file(&path), Err(CodecError::NotFound(_))));
  }

  #[test]
  fn file_round_trip() {
    let path = std::env::temp_dir().join(format!("artos-codec-{}.txt", std::process::id()));
    let m = sample_mixture(3);
    write_file(&path, &m).unwrap();
    let back = read_file(&path).unwrap();
    fs::remove_file(&path).ok();
    assert_eq!(back, m);
  }
}
