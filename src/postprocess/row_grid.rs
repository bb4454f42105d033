//! Row-wise Feedback Grid
//!
//! 1行に「コメント」セルと6つのカテゴリセルが並ぶ表で、
//! コメントの最後の単語が示すカテゴリのセルを強調表示する。

use std::path::Path;

use tracing::debug;

use crate::api::{Category, GridLayout, HighlightColor};
use crate::error::MarkMergeError;
use crate::postprocess::highlight::highlight_document;
use crate::postprocess::table::Table;
use crate::postprocess::PostProcess;
use crate::types::RowData;

/// コメントの最後の単語をカテゴリとして解釈する
///
/// 6つのラベルのいずれかと完全一致しない場合は`None`です。
pub(crate) fn category_from_comments(text: &str) -> Option<Category> {
    text.split_whitespace().last()?.parse().ok()
}

/// 行方向フィードバック表の強調表示（デフォルトの後処理）
///
/// 生成された文書のトップレベルの表を行ごとに調べ、セル数がいずれかの
/// [`GridLayout`]と一致する行について、コメントセルの最後の単語が示す
/// カテゴリのセルを強調表示します。
///
/// - レイアウトに一致しない行は無視されます
/// - 最後の単語がカテゴリラベルでない行（空のコメントを含む）は無視されます
/// - 既に強調表示されている文書に再度適用しても結果は変わりません
///
/// # 使用例
///
/// ```rust,no_run
/// use markmerge::{GridLayout, HighlightColor, PostProcess, RowData, RowGridHighlighter};
/// use std::path::Path;
///
/// # fn main() -> Result<(), markmerge::MarkMergeError> {
/// let highlighter = RowGridHighlighter::new()
///     .with_layouts([GridLayout::COMPACT])?
///     .with_color(HighlightColor::BrightGreen);
/// highlighter.process(&RowData::new(), Path::new("feedback/feedback_1234567.docx"))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RowGridHighlighter {
    /// 受け付けるレイアウト（先に一致したものを使用）
    layouts: Vec<GridLayout>,
    /// 強調表示の色
    color: HighlightColor,
}

impl Default for RowGridHighlighter {
    fn default() -> Self {
        Self {
            layouts: vec![GridLayout::WITH_DETAIL, GridLayout::COMPACT],
            color: HighlightColor::default(),
        }
    }
}

impl RowGridHighlighter {
    /// 両方のレイアウトを受け付ける強調表示を生成
    pub fn new() -> Self {
        Self::default()
    }

    /// 受け付けるレイアウトを指定する
    ///
    /// # 戻り値
    ///
    /// * `Err(MarkMergeError::Config)` - レイアウトが空、またはカテゴリセルが行に収まらない場合
    pub fn with_layouts<I>(mut self, layouts: I) -> Result<Self, MarkMergeError>
    where
        I: IntoIterator<Item = GridLayout>,
    {
        let layouts: Vec<GridLayout> = layouts.into_iter().collect();
        if layouts.is_empty() {
            return Err(MarkMergeError::Config(
                "At least one grid layout is required".to_string(),
            ));
        }
        if let Some(layout) = layouts.iter().find(|layout| !layout.is_consistent()) {
            return Err(MarkMergeError::Config(format!(
                "Grid layout {:?} cannot hold the six category cells",
                layout
            )));
        }
        self.layouts = layouts;
        Ok(self)
    }

    /// 強調表示の色を指定する
    pub fn with_color(mut self, color: HighlightColor) -> Self {
        self.color = color;
        self
    }

    /// 受け付けるレイアウト
    pub fn layouts(&self) -> &[GridLayout] {
        &self.layouts
    }

    /// 表の中で強調表示するセル（行, グリッド列）
    fn select(&self, table: &Table) -> Vec<(usize, usize)> {
        let mut positions = Vec::new();

        for (row_idx, row) in table.rows.iter().enumerate() {
            let width = row.width();
            let Some(layout) = self.layouts.iter().find(|l| l.cells_per_row == width) else {
                continue;
            };
            let Some(comments) = row.cell_at(layout.comments_index) else {
                continue;
            };

            match category_from_comments(&comments.text) {
                Some(category) => positions.push((row_idx, layout.category_index(category))),
                None => debug!(row = row_idx, "no category label in comments cell"),
            }
        }

        positions
    }
}

impl PostProcess for RowGridHighlighter {
    fn process(&self, _row: &RowData, path: &Path) -> Result<(), MarkMergeError> {
        highlight_document(path, self.color, |table| Ok(self.select(table)))?;
        Ok(())
    }
}
