//! markmerge - Pure-Rust spreadsheet-to-DOCX merge for per-student feedback documents
//!
//! This crate reads mark data from a spreadsheet, locates the columns a DOCX
//! template refers to by their header text, validates each row, and writes one
//! filled-in document per valid row. Generated documents can be post-processed,
//! e.g. to highlight the grade category cell of a feedback table.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Worksheet "marks", output "feedback/feedback_{{STUDENTID}}.docx",
//!     // STUDENTID validation and category highlighting
//!     markmerge::generate("marks.xlsx", "feedback_template.docx")?;
//!     Ok(())
//! }
//! ```
//!
//! # Custom Configuration
//!
//! ```rust,no_run
//! use markmerge::{CellValue, GeneratorBuilder, GridLayout, RowGridHighlighter, Validators};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let generator = GeneratorBuilder::new()
//!         .with_worksheet("PMA")
//!         .with_output_pattern("PMA/PMA_feedback_{{STUDENTID}}_{{MARKER}}.docx")
//!         .with_validators(Validators::default().with("TOTAL", |v: &CellValue| v.as_mark().is_ok()))
//!         .with_post_processor(RowGridHighlighter::new().with_layouts([GridLayout::COMPACT])?)
//!         .build()?;
//!
//!     generator.generate("marks.xlsx", "feedback_template.docx")?;
//!     Ok(())
//! }
//! ```
//!
//! # Templates
//!
//! Placeholders use the `{{ NAME }}` syntax of [MiniJinja](https://docs.rs/minijinja),
//! where `NAME` is the header text of a spreadsheet column. The `mark_category`
//! filter converts a numeric mark into its category label:
//!
//! ```text
//! Overall mark: {{ TOTAL }} ({{ TOTAL | mark_category }})
//! ```

mod api;
mod builder;
mod error;
mod formatter;
mod package;
mod parser;
mod postprocess;
mod security;
mod template;
mod types;
mod validate;

use std::path::Path;

// 公開API
pub use api::{Category, DateFormat, GradeBands, GridLayout, HighlightColor};
pub use builder::{FeedbackGenerator, GeneratorBuilder};
pub use error::MarkMergeError;
pub use parser::ColumnMapping;
pub use postprocess::{ColumnGridHighlighter, PostProcess, RowGridHighlighter};
pub use template::{
    default_environment, expected_fields, render_filename, template_variables, DocxTemplate,
};
pub use types::{CellValue, RowData, Worksheet};
pub use validate::{extract_row, ValidRows, Validator, Validators, STUDENT_ID_FIELD};

/// すべてデフォルト設定でフィードバック文書を生成する
///
/// `GeneratorBuilder::new().build()?.generate(xlsx, template)`と同じです。
///
/// # 引数
///
/// * `xlsx` - スプレッドシートのパス（ワークシート`marks`を読み込みます）
/// * `template` - DOCXテンプレートのパス
pub fn generate<P, Q>(xlsx: P, template: Q) -> Result<(), MarkMergeError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    GeneratorBuilder::new().build()?.generate(xlsx, template)
}

/// ワークブックのシート名を取得する
///
/// # 使用例
///
/// ```rust,no_run
/// # fn main() -> Result<(), markmerge::MarkMergeError> {
/// for name in markmerge::list_worksheets("marks.xlsx")? {
///     println!("{}", name);
/// }
/// # Ok(())
/// # }
/// ```
pub fn list_worksheets<P: AsRef<Path>>(path: P) -> Result<Vec<String>, MarkMergeError> {
    Ok(parser::WorkbookParser::open(path)?.sheet_names())
}
