//! Public API Types
//!
//! 公開APIで使用する列挙型と設定値を定義するモジュール。

use std::fmt;
use std::str::FromStr;

use crate::error::MarkMergeError;
use crate::types::CellValue;

/// 日付の出力形式
///
/// 日付セルをテンプレートへ渡す際の文字列形式を指定します。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum DateFormat {
    /// ISO 8601形式（デフォルト）
    ///
    /// 時刻成分がない場合は `2025-11-20`、ある場合は `2025-11-20 13:45:00`
    #[default]
    Iso8601,

    /// カスタム形式（chrono互換フォーマット文字列）
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use markmerge::{DateFormat, GeneratorBuilder};
    ///
    /// # fn main() -> Result<(), markmerge::MarkMergeError> {
    /// let generator = GeneratorBuilder::new()
    ///     .with_date_format(DateFormat::Custom("%d/%m/%Y".to_string()))
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    Custom(String),
}

/// 成績カテゴリ
///
/// 点数から導出される6段階のラベルです。上位から順に宣言されており、
/// `Ord`の順序は「良い成績ほど小さい」になります。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    /// 80点以上
    Outstanding,
    /// 70点以上80点未満
    Distinction,
    /// 60点以上70点未満
    Good,
    /// 50点以上60点未満
    Pass,
    /// 40点以上50点未満
    Marginal,
    /// 40点未満
    Fail,
}

impl Category {
    /// 上位から順に並べた全カテゴリ
    pub const ALL: [Category; 6] = [
        Category::Outstanding,
        Category::Distinction,
        Category::Good,
        Category::Pass,
        Category::Marginal,
        Category::Fail,
    ];

    /// 点数からカテゴリを導出する
    ///
    /// 標準の帯域表（[`GradeBands::standard`]）を使用します。
    ///
    /// ```rust
    /// use markmerge::Category;
    ///
    /// assert_eq!(Category::from_mark(80.0), Category::Outstanding);
    /// assert_eq!(Category::from_mark(79.9), Category::Distinction);
    /// assert_eq!(Category::from_mark(0.0), Category::Fail);
    /// ```
    pub fn from_mark(mark: f64) -> Self {
        let index = GradeBands::standard().band_index(mark);
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    /// セル値（数値、または数値として解釈できる文字列）からカテゴリを導出する
    ///
    /// # 戻り値
    ///
    /// * `Err(MarkMergeError::InvalidMark)` - 数値に変換できない場合
    pub fn from_cell(value: &CellValue) -> Result<Self, MarkMergeError> {
        value.as_mark().map(Self::from_mark)
    }

    /// ラベル文字列（例: `"OUTSTANDING"`）
    pub fn label(&self) -> &'static str {
        match self {
            Category::Outstanding => "OUTSTANDING",
            Category::Distinction => "DISTINCTION",
            Category::Good => "GOOD",
            Category::Pass => "PASS",
            Category::Marginal => "MARGINAL",
            Category::Fail => "FAIL",
        }
    }

    /// 上位からの順位（0始まり）
    pub fn rank(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = ();

    /// ラベル文字列と完全一致する場合のみ成功する（大文字小文字は区別する）
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|category| category.label() == s)
            .ok_or(())
    }
}

/// 点数の帯域表
///
/// 降順に並んだ閾値のリストです。各帯域は下限を含み上限を含みません。
/// 最も低い閾値を下回る点数は最下位の帯域（インデックス = 閾値の個数）になります。
#[derive(Debug, Clone, PartialEq)]
pub struct GradeBands {
    thresholds: Vec<f64>,
}

impl GradeBands {
    /// 降順の閾値リストから帯域表を生成する
    ///
    /// # 戻り値
    ///
    /// * `Err(MarkMergeError::Config)` - 閾値が厳密な降順でない、またはNaNを含む場合
    pub fn new(thresholds: Vec<f64>) -> Result<Self, MarkMergeError> {
        if thresholds.iter().any(|t| t.is_nan()) {
            return Err(MarkMergeError::Config(
                "Grade band thresholds must not be NaN".to_string(),
            ));
        }
        if thresholds.windows(2).any(|pair| pair[0] <= pair[1]) {
            return Err(MarkMergeError::Config(format!(
                "Grade band thresholds must be strictly descending: {:?}",
                thresholds
            )));
        }
        Ok(Self { thresholds })
    }

    /// 標準の6段階帯域表（80 / 70 / 60 / 50 / 40）
    pub fn standard() -> Self {
        Self {
            thresholds: vec![80.0, 70.0, 60.0, 50.0, 40.0],
        }
    }

    /// 7段階帯域表（80 / 70 / 60 / 50 / 40 / 30）
    ///
    /// 列方向レイアウトのフィードバック表で使用されます。
    pub fn extended() -> Self {
        Self {
            thresholds: vec![80.0, 70.0, 60.0, 50.0, 40.0, 30.0],
        }
    }

    /// 帯域の数（閾値の個数 + 1）
    pub fn band_count(&self) -> usize {
        self.thresholds.len() + 1
    }

    /// 点数が属する帯域のインデックス（0 = 最上位）
    pub fn band_index(&self, mark: f64) -> usize {
        self.thresholds
            .iter()
            .position(|threshold| mark >= *threshold)
            .unwrap_or(self.thresholds.len())
    }
}

impl Default for GradeBands {
    fn default() -> Self {
        Self::standard()
    }
}

/// 行方向フィードバック表のレイアウト
///
/// 1行あたりのセル数と、コメントセル・カテゴリセルの位置を定義します。
/// カテゴリセルはコメントセルの直後から上位順に6つ並びます。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    /// 1行あたりのセル数
    pub cells_per_row: usize,
    /// コメントセルのインデックス（0始まり）
    pub comments_index: usize,
}

impl GridLayout {
    /// 詳細列ありのレイアウト（9セル、コメントはインデックス2）
    pub const WITH_DETAIL: GridLayout = GridLayout {
        cells_per_row: 9,
        comments_index: 2,
    };

    /// 詳細列なしのレイアウト（8セル、コメントはインデックス1）
    pub const COMPACT: GridLayout = GridLayout {
        cells_per_row: 8,
        comments_index: 1,
    };

    /// カテゴリに対応するセルのインデックス
    pub fn category_index(&self, category: Category) -> usize {
        self.comments_index + 1 + category.rank()
    }

    /// レイアウトが自己矛盾していないか（カテゴリセルが行内に収まるか）
    pub(crate) fn is_consistent(&self) -> bool {
        self.comments_index + Category::ALL.len() < self.cells_per_row
    }
}

/// 強調表示の色
///
/// Wordの`<w:highlight w:val="..."/>`に書き込まれる値です。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum HighlightColor {
    /// 黄色（デフォルト）
    #[default]
    Yellow,
    /// 明るい緑
    BrightGreen,
    /// 水色
    Cyan,
    /// マゼンタ
    Magenta,
    /// 薄い灰色
    LightGray,
}

impl HighlightColor {
    /// OOXMLの`ST_HighlightColor`値
    pub fn as_ooxml(&self) -> &'static str {
        match self {
            HighlightColor::Yellow => "yellow",
            HighlightColor::BrightGreen => "green",
            HighlightColor::Cyan => "cyan",
            HighlightColor::Magenta => "magenta",
            HighlightColor::LightGray => "lightGray",
        }
    }
}
