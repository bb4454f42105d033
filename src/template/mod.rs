//! Template Module
//!
//! 出力ファイル名とDOCX文書のテンプレート展開。
//! どちらも同じMiniJinja環境で評価されるため、フィルターや`{% %}`構文を共通に使用できます。

mod docx;
mod engine;
mod patch;

pub use docx::DocxTemplate;
pub use engine::{default_environment, expected_fields, render_filename, template_variables};
