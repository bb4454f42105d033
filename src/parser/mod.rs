//! Parser Module
//!
//! calamineを使用したスプレッドシート解析と、見出しセルによる列の特定。

mod columns;
mod workbook;

pub use columns::ColumnMapping;
pub(crate) use workbook::WorkbookParser;
