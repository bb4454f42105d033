//! Column Locator
//!
//! ワークシートから見出しセルを探し、フィールド名と列インデックスの対応を構築する。

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::types::Worksheet;

/// 列マッピング（フィールド名 → 列インデックス）
///
/// 生成処理ごとに一度だけ構築され、構築後は変更されません。
/// 見つからなかったフィールドは含まれません。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    columns: BTreeMap<String, usize>,
}

impl ColumnMapping {
    /// ワークシートから期待されるフィールド名の列を探す
    ///
    /// 行を上から順に、各行のセルを左から順に走査し、前後の空白を除いた
    /// セルの文字列表現がまだ見つかっていないフィールド名と一致した場合に
    /// その列インデックスを記録します。同じ名前が複数回現れる場合は
    /// 最初の位置のみが記録されます。すべての名前が見つかった時点で走査を終了します。
    ///
    /// ```rust
    /// use markmerge::{ColumnMapping, Worksheet};
    ///
    /// let sheet = Worksheet::from_rows(
    ///     "marks",
    ///     vec![vec!["".into(), "".into(), "STUDENTID".into()]],
    /// );
    /// let mapping = ColumnMapping::locate(&sheet, ["STUDENTID", "MISSING"]);
    /// assert_eq!(mapping.get("STUDENTID"), Some(2));
    /// assert_eq!(mapping.get("MISSING"), None);
    /// ```
    pub fn locate<I, S>(sheet: &Worksheet, expected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut missing: BTreeSet<String> = expected
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect();
        let mut columns = BTreeMap::new();

        'rows: for row in sheet.rows() {
            // すべての列が見つかったら走査を終了
            if missing.is_empty() {
                break 'rows;
            }

            for (idx, cell) in row.iter().enumerate() {
                let text = cell.to_text();
                let text = text.trim();
                if missing.remove(text) {
                    columns.insert(text.to_string(), idx);
                    if missing.is_empty() {
                        break 'rows;
                    }
                }
            }
        }

        debug!(sheet = sheet.name(), ?columns, "located columns");
        if !missing.is_empty() {
            debug!(sheet = sheet.name(), ?missing, "columns not found");
        }

        Self { columns }
    }

    /// フィールドの列インデックスを取得
    pub fn get(&self, field: &str) -> Option<usize> {
        self.columns.get(field).copied()
    }

    /// 見つかった列の数
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// 1つも列が見つかっていないか
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// フィールド名と列インデックスのイテレーター（名前順）
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellValue;

    fn sheet(rows: Vec<Vec<&str>>) -> Worksheet {
        Worksheet::from_rows(
            "marks",
            rows.into_iter()
                .map(|row| row.into_iter().map(CellValue::from).collect())
                .collect(),
        )
    }

    #[test]
    fn test_locate_header_in_first_row() {
        let sheet = sheet(vec![vec!["NAME", "MARK", "STUDENTID"]]);
        let mapping = ColumnMapping::locate(&sheet, ["STUDENTID"]);
        assert_eq!(mapping.get("STUDENTID"), Some(2));
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn test_locate_omits_absent_names() {
        let sheet = sheet(vec![vec!["STUDENTID"], vec!["1234567"]]);
        let mapping = ColumnMapping::locate(&sheet, ["STUDENTID", "MARKER"]);
        assert_eq!(mapping.get("STUDENTID"), Some(0));
        assert_eq!(mapping.get("MARKER"), None);
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn test_locate_keeps_first_occurrence() {
        let sheet = sheet(vec![
            vec!["", "TOTAL", "TOTAL"],
            vec!["TOTAL", "", ""],
        ]);
        let mapping = ColumnMapping::locate(&sheet, ["TOTAL"]);
        assert_eq!(mapping.get("TOTAL"), Some(1));
    }

    #[test]
    fn test_locate_headers_across_rows() {
        let sheet = sheet(vec![
            vec!["Module feedback", "", ""],
            vec!["", "COMPONENT", ""],
            vec!["STUDENTID", "", "MARKER"],
        ]);
        let mapping = ColumnMapping::locate(&sheet, ["STUDENTID", "COMPONENT", "MARKER"]);
        assert_eq!(mapping.get("COMPONENT"), Some(1));
        assert_eq!(mapping.get("STUDENTID"), Some(0));
        assert_eq!(mapping.get("MARKER"), Some(2));
    }

    #[test]
    fn test_locate_trims_cell_text() {
        let sheet = sheet(vec![vec!["  NAME  ", "\tSTUDENTID\n"]]);
        let mapping = ColumnMapping::locate(&sheet, ["NAME", "STUDENTID"]);
        assert_eq!(mapping.get("NAME"), Some(0));
        assert_eq!(mapping.get("STUDENTID"), Some(1));
    }

    #[test]
    fn test_locate_numeric_header_matches_as_text() {
        let sheet = Worksheet::from_rows(
            "marks",
            vec![vec![CellValue::Number(2024.0), CellValue::Number(1.5)]],
        );
        let mapping = ColumnMapping::locate(&sheet, ["2024", "1.5"]);
        assert_eq!(mapping.get("2024"), Some(0));
        assert_eq!(mapping.get("1.5"), Some(1));
    }

    #[test]
    fn test_locate_empty_expected_set() {
        let sheet = sheet(vec![vec!["STUDENTID"]]);
        let mapping = ColumnMapping::locate(&sheet, Vec::<String>::new());
        assert!(mapping.is_empty());
    }

    #[test]
    fn test_locate_empty_sheet() {
        let sheet = Worksheet::default();
        let mapping = ColumnMapping::locate(&sheet, ["STUDENTID"]);
        assert!(mapping.is_empty());
    }
}
