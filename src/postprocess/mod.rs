//! Post-Processing Module
//!
//! 保存済みの文書に対して行ごとに実行される後処理。
//! デフォルトは行方向フィードバック表のカテゴリセルの強調表示です。

mod column_grid;
mod highlight;
mod row_grid;
mod table;

use std::path::Path;

use crate::error::MarkMergeError;
use crate::types::RowData;

pub use column_grid::ColumnGridHighlighter;
pub use row_grid::RowGridHighlighter;

/// 文書の後処理
///
/// 文書が保存された後、その行のデータと出力先のパスを受け取って呼び出されます。
/// `Fn(&RowData, &Path) -> Result<(), MarkMergeError>`のクロージャもそのまま使用できます。
///
/// # 使用例
///
/// ```rust
/// use markmerge::{GeneratorBuilder, MarkMergeError, RowData};
/// use std::path::Path;
///
/// # fn main() -> Result<(), MarkMergeError> {
/// let generator = GeneratorBuilder::new()
///     .with_post_processor(|row: &RowData, path: &Path| {
///         println!("{:?} -> {}", row.get("STUDENTID"), path.display());
///         Ok::<(), MarkMergeError>(())
///     })
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub trait PostProcess {
    /// 保存済みの文書を処理する
    fn process(&self, row: &RowData, path: &Path) -> Result<(), MarkMergeError>;
}

impl<F> PostProcess for F
where
    F: Fn(&RowData, &Path) -> Result<(), MarkMergeError>,
{
    fn process(&self, row: &RowData, path: &Path) -> Result<(), MarkMergeError> {
        self(row, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{GridLayout, HighlightColor};
    use crate::package::tests::minimal_docx;
    use crate::package::{DocxPackage, DOCUMENT_PART};
    use std::cell::Cell;

    fn feedback_document(comments: &str) -> String {
        format!(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            table::tests::table_xml(&[&[
                "Structure",
                "Logical flow",
                comments,
                "OUTSTANDING",
                "DISTINCTION",
                "GOOD",
                "PASS",
                "MARGINAL",
                "FAIL",
            ]])
        )
    }

    fn write_document(dir: &tempfile::TempDir, xml: &str) -> std::path::PathBuf {
        let path = dir.path().join("feedback.docx");
        std::fs::write(&path, minimal_docx(xml, &[])).unwrap();
        path
    }

    fn document_xml(path: &Path) -> String {
        DocxPackage::open(path)
            .unwrap()
            .read_part(DOCUMENT_PART)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_closure_post_processor() {
        let calls = Cell::new(0);
        let step = |row: &RowData, _path: &Path| {
            assert!(row.contains("STUDENTID"));
            calls.set(calls.get() + 1);
            Ok::<(), MarkMergeError>(())
        };

        let row = RowData::new().with("STUDENTID", "1234567");
        step.process(&row, Path::new("unused.docx")).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_row_grid_highlighter_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_document(&dir, &feedback_document("Well organised. GOOD"));
        let highlighter = RowGridHighlighter::default();
        let row = RowData::new();

        highlighter.process(&row, &path).unwrap();
        let once = document_xml(&path);
        assert_eq!(once.matches("<w:highlight w:val=\"yellow\"/>").count(), 1);
        assert!(once.contains(
            "<w:r><w:rPr><w:highlight w:val=\"yellow\"/></w:rPr><w:t>GOOD</w:t></w:r>"
        ));

        highlighter.process(&row, &path).unwrap();
        assert_eq!(document_xml(&path), once);
    }

    #[test]
    fn test_row_grid_highlighter_without_label_leaves_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_document(&dir, &feedback_document("See comments above"));
        let before = std::fs::read(&path).unwrap();

        RowGridHighlighter::default()
            .process(&RowData::new(), &path)
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_row_grid_highlighter_color_and_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_document(&dir, &feedback_document("Excellent. OUTSTANDING"));

        RowGridHighlighter::new()
            .with_layouts([GridLayout::COMPACT])
            .unwrap()
            .process(&RowData::new(), &path)
            .unwrap();
        assert!(!document_xml(&path).contains("w:highlight"));

        RowGridHighlighter::new()
            .with_color(HighlightColor::Cyan)
            .process(&RowData::new(), &path)
            .unwrap();
        assert!(document_xml(&path).contains(
            "<w:r><w:rPr><w:highlight w:val=\"cyan\"/></w:rPr><w:t>OUTSTANDING</w:t></w:r>"
        ));
    }

    #[test]
    fn test_column_grid_highlighter() {
        let bands = ["Band", "80+", "70-79", "60-69", "50-59", "40-49", "30-39", "0-29", "Notes"];
        let rows: Vec<[String; 5]> = bands
            .iter()
            .enumerate()
            .map(|(r, band)| {
                [
                    band.to_string(),
                    format!("r{}c1", r),
                    format!("r{}c2", r),
                    format!("r{}c3", r),
                    format!("r{}c4", r),
                ]
            })
            .collect();
        let row_refs: Vec<Vec<&str>> = rows
            .iter()
            .map(|row| row.iter().map(String::as_str).collect())
            .collect();
        let table_rows: Vec<&[&str]> = row_refs.iter().map(Vec::as_slice).collect();
        let xml = format!(
            "<w:document><w:body>{}</w:body></w:document>",
            table::tests::table_xml(&table_rows)
        );

        let dir = tempfile::tempdir().unwrap();
        let path = write_document(&dir, &xml);
        let row = RowData::new()
            .with("LO2", 81.0)
            .with("LO3", 65.0)
            .with("LO4", 35.0)
            .with("LO5", 10.0);

        ColumnGridHighlighter::new([("LO2", 1), ("LO3", 2), ("LO4", 3), ("LO5", 4)])
            .process(&row, &path)
            .unwrap();

        let output = document_xml(&path);
        assert_eq!(output.matches("w:highlight").count(), 4);
        for cell in ["r1c1", "r3c2", "r6c3", "r7c4"] {
            assert!(output.contains(&format!(
                "<w:r><w:rPr><w:highlight w:val=\"yellow\"/></w:rPr><w:t>{}</w:t></w:r>",
                cell
            )));
        }
    }

    #[test]
    fn test_column_grid_highlighter_skips_other_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_document(&dir, &feedback_document("GOOD"));
        let before = std::fs::read(&path).unwrap();

        ColumnGridHighlighter::new([("LO2", 1)])
            .process(&RowData::new().with("LO2", 90.0), &path)
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }
}
