//! Table Scanner
//!
//! 本文XMLからトップレベルの表（`<w:tbl>`）をイベント列として切り出し、
//! 行・セルの構造とセルのテキストを解析する。

use quick_xml::events::Event;
use quick_xml::{Reader, Writer};

use crate::error::MarkMergeError;

/// XMLエラーを変換
pub(crate) fn xml_error(e: quick_xml::Error) -> MarkMergeError {
    MarkMergeError::Xml(format!("{}", e))
}

/// 表のセル
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TableCell {
    /// `<w:tc>`開始イベントの位置
    pub start: usize,
    /// `</w:tc>`終了イベントの位置
    pub end: usize,
    /// 行内のグリッド列の開始位置
    pub grid_col: usize,
    /// 結合している列数（`w:gridSpan`）
    pub span: usize,
    /// セルのテキスト（段落は改行で区切る）
    pub text: String,
}

/// 表の行
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct TableRow {
    pub cells: Vec<TableCell>,
}

impl TableRow {
    /// グリッド列数（結合セルは結合した列数で数える）
    pub fn width(&self) -> usize {
        self.cells.iter().map(|cell| cell.span).sum()
    }

    /// グリッド列を含むセル
    pub fn cell_at(&self, grid_col: usize) -> Option<&TableCell> {
        self.cells
            .iter()
            .find(|cell| grid_col >= cell.grid_col && grid_col < cell.grid_col + cell.span)
    }
}

/// トップレベルの表の構造
///
/// 入れ子の表の行・セルは含みません（入れ子の表のテキストは外側のセルのテキストに含まれます）。
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Table {
    pub rows: Vec<TableRow>,
}

impl Table {
    /// `<w:tbl>`から`</w:tbl>`までのイベント列を解析する
    pub fn parse(events: &[Event<'static>]) -> Self {
        let mut rows: Vec<TableRow> = Vec::new();
        let mut depth = 0usize;
        let mut current: Option<TableCell> = None;
        let mut in_text = false;

        for (idx, event) in events.iter().enumerate() {
            match event {
                Event::Start(e) => match e.name().as_ref() {
                    b"w:tbl" => depth += 1,
                    b"w:tr" if depth == 1 => rows.push(TableRow::default()),
                    b"w:tc" if depth == 1 => {
                        let grid_col = rows.last().map(TableRow::width).unwrap_or(0);
                        current = Some(TableCell {
                            start: idx,
                            end: idx,
                            grid_col,
                            span: 1,
                            text: String::new(),
                        });
                    }
                    b"w:t" => in_text = true,
                    _ => {}
                },
                Event::Empty(e) => match e.name().as_ref() {
                    b"w:gridSpan" if depth == 1 => {
                        if let Some(cell) = current.as_mut() {
                            cell.span = grid_span(e).unwrap_or(1).max(1);
                        }
                    }
                    b"w:tab" | b"w:br" | b"w:cr" => {
                        if let Some(cell) = current.as_mut() {
                            cell.text.push(' ');
                        }
                    }
                    _ => {}
                },
                Event::Text(e) if in_text => {
                    if let Some(cell) = current.as_mut() {
                        match e.unescape() {
                            Ok(text) => cell.text.push_str(&text),
                            Err(_) => cell.text.push_str(&String::from_utf8_lossy(e)),
                        }
                    }
                }
                Event::End(e) => match e.name().as_ref() {
                    b"w:tbl" => depth = depth.saturating_sub(1),
                    b"w:t" => in_text = false,
                    b"w:p" => {
                        if let Some(cell) = current.as_mut() {
                            cell.text.push('\n');
                        }
                    }
                    b"w:tc" if depth == 1 => {
                        if let (Some(mut cell), Some(row)) = (current.take(), rows.last_mut()) {
                            cell.end = idx;
                            row.cells.push(cell);
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        Self { rows }
    }

    /// 行数
    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// `<w:gridSpan w:val="n"/>`の値
fn grid_span(e: &quick_xml::events::BytesStart<'_>) -> Option<usize> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == b"w:val")
        .and_then(|attr| std::str::from_utf8(&attr.value).ok()?.trim().parse().ok())
}

/// トップレベルの表ごとにイベント列を書き換える
///
/// 表の外側のイベントはそのまま書き出します。`rewrite`は表1つ分のイベント列
/// （`<w:tbl>`から`</w:tbl>`まで）を受け取り、書き出すイベント列を返します。
pub(crate) fn rewrite_tables<F>(xml: &str, mut rewrite: F) -> Result<String, MarkMergeError>
where
    F: FnMut(Vec<Event<'static>>) -> Vec<Event<'static>>,
{
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());
    let mut table: Vec<Event<'static>> = Vec::new();
    let mut depth = 0usize;

    loop {
        let event = reader.read_event().map_err(|e| {
            MarkMergeError::Xml(format!(
                "Error at position {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        let (opens, closes) = match &event {
            Event::Eof => break,
            Event::Start(e) => (e.name().as_ref() == b"w:tbl", false),
            Event::End(e) => (false, e.name().as_ref() == b"w:tbl"),
            _ => (false, false),
        };

        if opens {
            depth += 1;
        } else if closes && depth > 0 {
            depth -= 1;
            if depth == 0 {
                table.push(event.into_owned());
                for rewritten in rewrite(std::mem::take(&mut table)) {
                    writer.write_event(rewritten).map_err(xml_error)?;
                }
                continue;
            }
        }

        if depth > 0 {
            table.push(event.into_owned());
        } else {
            writer.write_event(event).map_err(xml_error)?;
        }
    }

    if depth > 0 {
        return Err(MarkMergeError::Xml("Unclosed <w:tbl> element".to_string()));
    }

    String::from_utf8(writer.into_inner()).map_err(|e| MarkMergeError::Xml(format!("{}", e)))
}
