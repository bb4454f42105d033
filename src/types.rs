//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

use crate::error::MarkMergeError;

/// セルの値を表す列挙型
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// 数値（f64）
    Number(f64),

    /// 文字列
    String(String),

    /// 論理値
    Bool(bool),

    /// 日時
    DateTime(NaiveDateTime),

    /// エラー値（例: #DIV/0!）
    Error(String),

    /// 空セル
    Empty,
}

impl CellValue {
    /// 値が空かどうかを判定
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// 値を文字列として取得（日付はISO 8601）
    ///
    /// 小数部のない数値は小数点なしで出力します（`1234567.0` → `"1234567"`）。
    pub fn to_text(&self) -> String {
        crate::formatter::CellFormatter::new().format(self, &crate::api::DateFormat::Iso8601)
    }

    /// 点数として数値に変換する
    ///
    /// 数値セルはそのまま、文字列セルは前後の空白を除いてから解析します。
    ///
    /// # 戻り値
    ///
    /// * `Err(MarkMergeError::InvalidMark)` - 数値として解釈できない場合（空セル、NaNを含む）
    pub fn as_mark(&self) -> Result<f64, MarkMergeError> {
        let mark = match self {
            CellValue::Number(n) => Some(*n),
            CellValue::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        match mark {
            Some(m) if !m.is_nan() => Ok(m),
            _ => Err(MarkMergeError::InvalidMark {
                value: self.to_text(),
            }),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                serializer.serialize_i64(*n as i64)
            }
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::String(s) => serializer.serialize_str(s),
            CellValue::Bool(b) => serializer.serialize_bool(*b),
            CellValue::DateTime(dt) => dt.serialize(serializer),
            CellValue::Error(e) => serializer.serialize_str(e),
            CellValue::Empty => serializer.serialize_none(),
        }
    }
}

/// ワークシート（稠密な2次元グリッド）
///
/// 行・列のインデックスはスプレッドシート上の絶対位置（A1 = (0, 0)）です。
/// すべての行は同じ長さに揃えられています。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Worksheet {
    /// シート名
    name: String,
    /// セル値（行 × 列）
    rows: Vec<Vec<CellValue>>,
}

impl Worksheet {
    /// 行データからワークシートを生成する
    ///
    /// 長さの異なる行は、最長の行に合わせて空セルで埋められます。
    ///
    /// ```rust
    /// use markmerge::{CellValue, Worksheet};
    ///
    /// let sheet = Worksheet::from_rows(
    ///     "marks",
    ///     vec![
    ///         vec!["NAME".into(), "STUDENTID".into()],
    ///         vec!["Ada".into()],
    ///     ],
    /// );
    /// assert_eq!(sheet.width(), 2);
    /// assert_eq!(sheet.rows()[1][1], CellValue::Empty);
    /// ```
    pub fn from_rows(name: impl Into<String>, mut rows: Vec<Vec<CellValue>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, CellValue::Empty);
        }
        Self {
            name: name.into(),
            rows,
        }
    }

    /// シート名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// すべての行
    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// 行数
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// 列数
    pub fn width(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    /// セル値を取得（範囲外は`None`）
    pub fn cell(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(col))
    }
}

/// 1行分のデータ（フィールド名 → セル値）
///
/// 列が見つかったフィールドのみを含みます。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RowData {
    values: BTreeMap<String, CellValue>,
}

impl RowData {
    /// 空の行データを生成
    pub fn new() -> Self {
        Self::default()
    }

    /// フィールドの値を設定（ビルダー形式）
    pub fn with(mut self, field: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.insert(field, value);
        self
    }

    /// フィールドの値を設定
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<CellValue>) {
        self.values.insert(field.into(), value.into());
    }

    /// フィールドの値を取得
    pub fn get(&self, field: &str) -> Option<&CellValue> {
        self.values.get(field)
    }

    /// フィールドが存在するか
    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// フィールド数
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// フィールドが1つもないか
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// フィールド名と値のイテレーター（名前順）
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<CellValue>> FromIterator<(K, V)> for RowData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = RowData::new();
        for (field, value) in iter {
            row.insert(field, value);
        }
        row
    }
}
