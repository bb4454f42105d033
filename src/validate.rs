//! Row Validation Module
//!
//! 列マッピングを使って各行から行データを抽出し、フィールドごとの述語関数で検証する。
//! 検証に失敗した行はログに記録してスキップされます。

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::warn;

use crate::error::MarkMergeError;
use crate::parser::ColumnMapping;
use crate::types::{CellValue, RowData, Worksheet};

/// 学籍番号のフィールド名
pub const STUDENT_ID_FIELD: &str = "STUDENTID";

/// 単一フィールドの述語関数
///
/// `true`を返した場合のみ検証に合格します。
#[derive(Clone)]
pub struct Validator(Arc<dyn Fn(&CellValue) -> bool + Send + Sync>);

impl Validator {
    /// 述語関数からバリデーターを生成
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&CellValue) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    /// 7桁の数字で始まる学籍番号
    ///
    /// セルの文字列表現の前後の空白を除いてから判定します。
    pub fn student_id() -> Self {
        Self::new(|value| student_id_pattern().is_match(value.to_text().trim()))
    }

    /// 値を検証する
    pub fn check(&self, value: &CellValue) -> bool {
        (self.0)(value)
    }
}

fn student_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{7}").expect("hardcoded regex pattern"))
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator(..)")
    }
}

/// バリデーターの集合（フィールド名 → 述語関数）
///
/// デフォルトは学籍番号（`STUDENTID`）の検証のみを含みます。
/// 生成処理はこの集合を読み取るだけで、変更することはありません。
///
/// ```rust
/// use markmerge::{CellValue, Validators};
///
/// let validators = Validators::default()
///     .with("TOTAL", |value: &CellValue| {
///         value.as_mark().map(|m| (0.0..=100.0).contains(&m)).unwrap_or(false)
///     });
/// assert_eq!(validators.keys().collect::<Vec<_>>(), vec!["STUDENTID", "TOTAL"]);
/// ```
#[derive(Debug, Clone)]
pub struct Validators {
    validators: BTreeMap<String, Validator>,
}

impl Validators {
    /// 空の集合（検証なし）
    pub fn empty() -> Self {
        Self {
            validators: BTreeMap::new(),
        }
    }

    /// バリデーターを追加（同名のものは置き換え）
    pub fn with<F>(mut self, field: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&CellValue) -> bool + Send + Sync + 'static,
    {
        self.insert(field, Validator::new(predicate));
        self
    }

    /// バリデーターを追加（同名のものは置き換え）
    pub fn insert(&mut self, field: impl Into<String>, validator: Validator) {
        self.validators.insert(field.into(), validator);
    }

    /// 対象フィールド名（名前順）
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.validators.keys().map(String::as_str)
    }

    /// バリデーター数
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// 空かどうか
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// 行データを検証する
    ///
    /// # 戻り値
    ///
    /// * `Ok(true)` - すべてのバリデーターが`true`を返した場合
    /// * `Ok(false)` - いずれかのバリデーターが`false`を返した場合
    /// * `Err(MarkMergeError::MissingValidatorField)` - バリデーターのキーが行データに存在しない場合
    pub fn validate(&self, row: &RowData) -> Result<bool, MarkMergeError> {
        for (field, validator) in &self.validators {
            let value = row
                .get(field)
                .ok_or_else(|| MarkMergeError::MissingValidatorField {
                    field: field.clone(),
                })?;

            if !validator.check(value) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Default for Validators {
    fn default() -> Self {
        let mut validators = Self::empty();
        validators.insert(STUDENT_ID_FIELD, Validator::student_id());
        validators
    }
}

/// 1行分のセルから行データを抽出する
///
/// 列が見つかったフィールドのみを含めます。
pub fn extract_row(row: &[CellValue], mapping: &ColumnMapping) -> RowData {
    mapping
        .iter()
        .map(|(field, idx)| (field, row.get(idx).cloned().unwrap_or(CellValue::Empty)))
        .collect()
}

/// 検証に合格した行のみを返す遅延イテレーター
///
/// 見出し行も含めてすべての行を対象とします（見出し行は通常、検証で除外されます）。
/// 設定エラー（バリデーターのキーが存在しない）は`Err`として返され、
/// 呼び出し側で処理を中断することを想定しています。
pub struct ValidRows<'a> {
    rows: std::iter::Enumerate<std::slice::Iter<'a, Vec<CellValue>>>,
    mapping: &'a ColumnMapping,
    validators: &'a Validators,
}

impl<'a> ValidRows<'a> {
    /// ワークシートの先頭から走査するイテレーターを生成
    pub fn new(sheet: &'a Worksheet, mapping: &'a ColumnMapping, validators: &'a Validators) -> Self {
        Self {
            rows: sheet.rows().iter().enumerate(),
            mapping,
            validators,
        }
    }
}

impl Iterator for ValidRows<'_> {
    type Item = Result<RowData, MarkMergeError>;

    fn next(&mut self) -> Option<Self::Item> {
        for (idx, row) in self.rows.by_ref() {
            let row_data = extract_row(row, self.mapping);
            match self.validators.validate(&row_data) {
                Ok(true) => return Some(Ok(row_data)),
                Ok(false) => {
                    let rendered = serde_json::to_string(&row_data)
                        .unwrap_or_else(|_| format!("{:?}", row_data));
                    warn!(row = idx + 1, data = %rendered, "row did not pass validation");
                }
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validator_accepts_seven_digit_id() {
        let row = RowData::new().with(STUDENT_ID_FIELD, "1234567");
        assert!(Validators::default().validate(&row).unwrap());
    }

    #[test]
    fn test_default_validator_rejects_short_id() {
        let row = RowData::new().with(STUDENT_ID_FIELD, "123");
        assert!(!Validators::default().validate(&row).unwrap());
    }

    #[test]
    fn test_default_validator_numeric_cell() {
        let row = RowData::new().with(STUDENT_ID_FIELD, 1234567.0);
        assert!(Validators::default().validate(&row).unwrap());

        let row = RowData::new().with(STUDENT_ID_FIELD, CellValue::Empty);
        assert!(!Validators::default().validate(&row).unwrap());

        let row = RowData::new().with(STUDENT_ID_FIELD, " 7654321 ");
        assert!(Validators::default().validate(&row).unwrap());
    }

    #[test]
    fn test_student_id_pattern_compiled_once() {
        assert!(std::ptr::eq(student_id_pattern(), student_id_pattern()));

        let first = Validator::student_id();
        let second = Validator::student_id();
        assert!(first.check(&CellValue::from("1234567")));
        assert!(!second.check(&CellValue::from("12a4567")));
    }

    #[test]
    fn test_missing_validator_field_is_fatal() {
        let row = RowData::new().with("OTHER", "value");
        match Validators::default().validate(&row) {
            Err(MarkMergeError::MissingValidatorField { field }) => {
                assert_eq!(field, STUDENT_ID_FIELD);
            }
            other => panic!("Expected MissingValidatorField, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_validators_accept_everything() {
        let row = RowData::new();
        assert!(Validators::empty().validate(&row).unwrap());
    }

    #[test]
    fn test_all_validators_must_pass() {
        let validators = Validators::default().with("TOTAL", |v: &CellValue| v.as_mark().is_ok());
        let row = RowData::new()
            .with(STUDENT_ID_FIELD, "1234567")
            .with("TOTAL", "absent");
        assert!(!validators.validate(&row).unwrap());

        let row = RowData::new()
            .with(STUDENT_ID_FIELD, "1234567")
            .with("TOTAL", 64.0);
        assert!(validators.validate(&row).unwrap());
    }

    #[test]
    fn test_extract_row_uses_mapping() {
        let sheet = Worksheet::from_rows(
            "marks",
            vec![vec!["NAME".into(), "STUDENTID".into()]],
        );
        let mapping = ColumnMapping::locate(&sheet, ["STUDENTID", "MISSING"]);

        let row = extract_row(&["Ada".into(), "1234567".into()], &mapping);
        assert_eq!(row.len(), 1);
        assert_eq!(row.get("STUDENTID"), Some(&CellValue::from("1234567")));
        assert!(!row.contains("MISSING"));
    }

    #[test]
    fn test_valid_rows_skips_invalid_rows() {
        let sheet = Worksheet::from_rows(
            "marks",
            vec![
                vec!["NAME".into(), "STUDENTID".into()],
                vec!["Ada".into(), "1234567".into()],
                vec!["Bob".into(), "12".into()],
                vec!["Cy".into(), 7654321.0.into()],
            ],
        );
        let mapping = ColumnMapping::locate(&sheet, ["NAME", "STUDENTID"]);
        let validators = Validators::default();

        let names: Vec<String> = ValidRows::new(&sheet, &mapping, &validators)
            .map(|row| row.unwrap().get("NAME").unwrap().to_text())
            .collect();
        assert_eq!(names, vec!["Ada", "Cy"]);

        // 再度呼び出すと先頭から走査し直す
        let again = ValidRows::new(&sheet, &mapping, &validators).count();
        assert_eq!(again, 2);
    }

    #[test]
    fn test_valid_rows_reports_missing_column() {
        let sheet = Worksheet::from_rows("marks", vec![vec!["NAME".into()], vec!["Ada".into()]]);
        let mapping = ColumnMapping::locate(&sheet, ["NAME", "STUDENTID"]);
        let validators = Validators::default();

        let mut rows = ValidRows::new(&sheet, &mapping, &validators);
        assert!(matches!(
            rows.next(),
            Some(Err(MarkMergeError::MissingValidatorField { .. }))
        ));
    }
}
