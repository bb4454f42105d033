//! Workbook Reader
//!
//! calamineを使用してワークブックを開き、ワークシートを稠密なグリッドとして取り出す。
//! 数式セルはキャッシュされた計算結果の値として読み込まれます。

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader, Sheets};

use crate::error::MarkMergeError;
use crate::security::SecurityConfig;
use crate::types::{CellValue, Worksheet};

/// ワークブックパーサー
///
/// calamineのラッパーとして、ワークブックレベルの操作を提供します。
/// XLSX / XLSM / XLSB / XLS / ODS に対応します。
pub(crate) struct WorkbookParser {
    /// calamineのワークブック（形式自動判定）
    workbook: Sheets<Cursor<Vec<u8>>>,
}

impl WorkbookParser {
    /// ファイルパスからワークブックを開く
    ///
    /// ファイルが存在しない場合などのI/Oエラーは`MarkMergeError::Io`として
    /// そのまま返されます。
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MarkMergeError> {
        let buffer = std::fs::read(path.as_ref())?;
        Self::from_bytes(buffer)
    }

    /// メモリ上のバイト列からワークブックを開く
    pub fn from_bytes(buffer: Vec<u8>) -> Result<Self, MarkMergeError> {
        SecurityConfig::default().check_input_size(buffer.len() as u64)?;

        let workbook = open_workbook_auto_from_rs(Cursor::new(buffer))?;
        Ok(Self { workbook })
    }

    /// すべてのシート名を取得
    pub fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names()
    }

    /// 名前を指定してワークシートを読み込む
    ///
    /// # 戻り値
    ///
    /// * `Ok(Worksheet)` - 絶対座標のグリッド
    /// * `Err(MarkMergeError::WorksheetNotFound)` - シートが存在しない場合
    pub fn worksheet(&mut self, name: &str) -> Result<Worksheet, MarkMergeError> {
        if !self.sheet_names().iter().any(|sheet| sheet == name) {
            return Err(MarkMergeError::WorksheetNotFound(name.to_string()));
        }

        let range = self.workbook.worksheet_range(name)?;
        Ok(grid_from_range(name, &range))
    }
}

/// calamineの範囲を絶対座標のグリッドに変換
///
/// calamineの`Range`は使用範囲の左上から始まるため、その位置まで空セルで埋めて
/// 列インデックスがスプレッドシート上の列（A = 0）と一致するようにします。
fn grid_from_range(name: &str, range: &Range<Data>) -> Worksheet {
    let (start_row, start_col) = match range.start() {
        Some((row, col)) => (row as usize, col as usize),
        None => return Worksheet::from_rows(name, Vec::new()),
    };

    let mut rows = vec![Vec::new(); start_row];
    for row in range.rows() {
        let mut cells = vec![CellValue::Empty; start_col];
        cells.extend(row.iter().map(convert_cell));
        rows.push(cells);
    }

    Worksheet::from_rows(name, rows)
}

/// calamineのセルデータを`CellValue`に変換
fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::String(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => CellValue::DateTime(datetime),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::Error(e.to_string()),
        Data::Empty => CellValue::Empty,
    }
}
