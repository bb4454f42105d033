//! Formatter Module
//!
//! セル値を文字列、およびテンプレートエンジンに渡す値へ変換するモジュール。

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Timelike};
use minijinja::Value;

use crate::api::DateFormat;
use crate::types::{CellValue, RowData};

/// セルフォーマッター
///
/// セル値のフォーマット処理のファサードとして機能します。
#[derive(Debug, Default)]
pub(crate) struct CellFormatter {
    /// 日付フォーマッター
    date_formatter: DateFormatter,

    /// 数値フォーマッター
    number_formatter: NumberFormatter,
}

impl CellFormatter {
    /// 新しいCellFormatterインスタンスを生成
    pub fn new() -> Self {
        Self {
            date_formatter: DateFormatter,
            number_formatter: NumberFormatter,
        }
    }

    /// セル値を文字列に変換
    ///
    /// 列の照合、ファイル名、ログ出力で共通に使われる表現です。
    pub fn format(&self, value: &CellValue, date_format: &DateFormat) -> String {
        match value {
            CellValue::Number(n) => self.number_formatter.format(*n),
            CellValue::String(s) => s.clone(),
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::DateTime(dt) => self.date_formatter.format(dt, date_format),
            CellValue::Error(e) => e.clone(),
            CellValue::Empty => String::new(),
        }
    }

    /// セル値をテンプレート用の値に変換
    ///
    /// 数値・論理値は型を保ったまま渡し、テンプレート内での比較や
    /// フィルター（`mark_category`など）に使えるようにします。
    /// 空セルは空文字列になります。
    pub fn to_value(&self, value: &CellValue, date_format: &DateFormat) -> Value {
        match value {
            CellValue::Number(n) if self.number_formatter.is_integral(*n) => Value::from(*n as i64),
            CellValue::Number(n) => Value::from(*n),
            CellValue::Bool(b) => Value::from(*b),
            CellValue::String(s) => Value::from(s.as_str()),
            CellValue::DateTime(_) | CellValue::Error(_) | CellValue::Empty => {
                Value::from(self.format(value, date_format))
            }
        }
    }

    /// 行データをテンプレートのコンテキストに変換
    pub fn to_context(&self, row: &RowData, date_format: &DateFormat) -> Value {
        let context: BTreeMap<String, Value> = row
            .iter()
            .map(|(field, value)| (field.to_string(), self.to_value(value, date_format)))
            .collect();
        Value::from(context)
    }
}

/// 日付フォーマッター
#[derive(Debug, Default)]
pub(crate) struct DateFormatter;

impl DateFormatter {
    /// 日時をフォーマット
    ///
    /// ISO 8601の場合、時刻成分が0時0分0秒なら日付のみを出力します。
    pub fn format(&self, value: &NaiveDateTime, date_format: &DateFormat) -> String {
        match date_format {
            DateFormat::Iso8601 => {
                if value.num_seconds_from_midnight() == 0 {
                    value.format("%Y-%m-%d").to_string()
                } else {
                    value.format("%Y-%m-%d %H:%M:%S").to_string()
                }
            }
            DateFormat::Custom(format_str) => value.format(format_str).to_string(),
        }
    }
}

/// 数値フォーマッター
#[derive(Debug, Default)]
pub(crate) struct NumberFormatter;

impl NumberFormatter {
    /// 整数として扱える範囲の上限（f64で正確に表現できる範囲内）
    const MAX_INTEGRAL: f64 = 1e15;

    /// 数値をフォーマット
    ///
    /// 小数部のない数値は小数点なしで出力します。
    pub fn format(&self, value: f64) -> String {
        if self.is_integral(value) {
            (value as i64).to_string()
        } else {
            value.to_string()
        }
    }

    /// 小数部がなく、i64として正確に表現できるか
    pub fn is_integral(&self, value: f64) -> bool {
        value.is_finite() && value.fract() == 0.0 && value.abs() < Self::MAX_INTEGRAL
    }
}
