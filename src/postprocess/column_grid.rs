//! Column-wise Feedback Grid
//!
//! 評価項目が列、点数帯が行に並ぶ（転置された）表で、
//! 各項目の点数が属する帯のセルを強調表示する。

use std::path::Path;

use crate::api::{GradeBands, HighlightColor};
use crate::error::MarkMergeError;
use crate::postprocess::highlight::highlight_document;
use crate::postprocess::PostProcess;
use crate::types::RowData;

/// 列方向フィードバック表の強調表示
///
/// 行数が`rows_per_table`と一致するトップレベルの表について、
/// 設定された`(フィールド名, 列)`ごとに行データから点数を読み取り、
/// 帯域表で求めた帯`b`に対応するセル`(b + 1, 列)`を強調表示します（1行目は見出し行）。
///
/// 点数のフィールドは文書テンプレートから参照されないことが多いため、
/// [`fields()`](Self::fields)を`GeneratorBuilder::with_extra_fields`に渡して
/// 列を探す対象に含めてください。
///
/// # 使用例
///
/// ```rust
/// use markmerge::{ColumnGridHighlighter, GeneratorBuilder};
///
/// # fn main() -> Result<(), markmerge::MarkMergeError> {
/// let highlighter = ColumnGridHighlighter::new([("LO2", 1), ("LO3", 2), ("LO4", 3), ("LO5", 4)]);
/// let generator = GeneratorBuilder::new()
///     .with_extra_fields(highlighter.fields())
///     .with_post_processor(highlighter)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnGridHighlighter {
    /// 対象の表の行数
    rows_per_table: usize,
    /// フィールド名と列インデックス
    fields: Vec<(String, usize)>,
    /// 点数の帯域表
    bands: GradeBands,
    /// 強調表示の色
    color: HighlightColor,
}

impl ColumnGridHighlighter {
    /// 9行の表、7段階の帯域表（[`GradeBands::extended`]）で生成
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        Self {
            rows_per_table: 9,
            fields: fields
                .into_iter()
                .map(|(name, col)| (name.into(), col))
                .collect(),
            bands: GradeBands::extended(),
            color: HighlightColor::default(),
        }
    }

    /// 対象とする表の行数を指定する
    pub fn with_rows_per_table(mut self, rows: usize) -> Self {
        self.rows_per_table = rows;
        self
    }

    /// 帯域表を指定する
    pub fn with_bands(mut self, bands: GradeBands) -> Self {
        self.bands = bands;
        self
    }

    /// 強調表示の色を指定する
    pub fn with_color(mut self, color: HighlightColor) -> Self {
        self.color = color;
        self
    }

    /// 点数を読み取るフィールド名
    pub fn fields(&self) -> Vec<String> {
        self.fields.iter().map(|(name, _)| name.clone()).collect()
    }

    /// 行データから強調表示するセル（行, 列）を求める
    fn positions(&self, row: &RowData) -> Result<Vec<(usize, usize)>, MarkMergeError> {
        self.fields
            .iter()
            .map(|(field, col)| {
                let value = row.get(field).ok_or_else(|| {
                    MarkMergeError::Config(format!(
                        "Field '{}' is not in the row data; declare it as an extra field",
                        field
                    ))
                })?;
                let band = self.bands.band_index(value.as_mark()?);
                Ok((band + 1, *col))
            })
            .collect()
    }
}

impl PostProcess for ColumnGridHighlighter {
    fn process(&self, row: &RowData, path: &Path) -> Result<(), MarkMergeError> {
        let positions = self.positions(row)?;
        highlight_document(path, self.color, |table| {
            if table.len() == self.rows_per_table {
                Ok(positions.clone())
            } else {
                Ok(Vec::new())
            }
        })?;
        Ok(())
    }
}
