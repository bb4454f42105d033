//! Run Highlighting
//!
//! 表セル内のすべてのラン（`<w:r>`）に`<w:highlight>`を設定し、保存済みの文書を書き換える。

use std::collections::BTreeMap;
use std::path::Path;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use tracing::debug;

use crate::api::HighlightColor;
use crate::error::MarkMergeError;
use crate::package::{DocxPackage, DOCUMENT_PART};
use crate::postprocess::table::{rewrite_tables, Table, TableCell};

/// `w:rPr`内で`w:highlight`より後に置かれる要素
const AFTER_HIGHLIGHT: &[&[u8]] = &[
    b"w:u",
    b"w:effect",
    b"w:bdr",
    b"w:shd",
    b"w:fitText",
    b"w:vertAlign",
    b"w:rtl",
    b"w:cs",
    b"w:em",
    b"w:lang",
    b"w:eastAsianLayout",
    b"w:specVanish",
    b"w:oMath",
    b"w:rPrChange",
];

fn highlight_element(color: HighlightColor) -> BytesStart<'static> {
    BytesStart::new("w:highlight").with_attributes([("w:val", color.as_ooxml())])
}

/// 要素の種類と名前
enum Tag {
    Open(Vec<u8>),
    Empty(Vec<u8>),
    Close(Vec<u8>),
    Other,
}

impl Tag {
    fn of(event: &Event<'_>) -> Self {
        match event {
            Event::Start(e) => Tag::Open(e.name().as_ref().to_vec()),
            Event::Empty(e) => Tag::Empty(e.name().as_ref().to_vec()),
            Event::End(e) => Tag::Close(e.name().as_ref().to_vec()),
            _ => Tag::Other,
        }
    }
}

/// `<w:rPr>`の中身を書き換える状態
enum RunProps {
    /// `<w:rPr>`の外側
    Outside,
    /// 対象の`<w:rPr>`内（子要素の深さ、設定済みか）
    Inside { depth: usize, done: bool },
}

/// 強調表示のみを持つ`<w:rPr>`
fn run_properties(color: HighlightColor) -> [Event<'static>; 3] {
    [
        Event::Start(BytesStart::new("w:rPr")),
        Event::Empty(highlight_element(color)),
        Event::End(BytesEnd::new("w:rPr")),
    ]
}

/// 表のイベント列のうち、指定したセルのランを強調表示する
///
/// 既に`<w:highlight>`がある場合は色を置き換えるため、同じ処理を繰り返しても結果は変わりません。
pub(crate) fn highlight_cells(
    events: Vec<Event<'static>>,
    cells: &[&TableCell],
    color: HighlightColor,
) -> Vec<Event<'static>> {
    if cells.is_empty() {
        return events;
    }

    let selected = |idx: usize| cells.iter().any(|cell| idx > cell.start && idx < cell.end);
    let mut output = Vec::with_capacity(events.len() + cells.len() * 3);
    let mut props = RunProps::Outside;
    let mut pending_run = false;

    for (idx, event) in events.into_iter().enumerate() {
        if !selected(idx) {
            output.push(event);
            continue;
        }
        let tag = Tag::of(&event);

        // <w:r>の最初の子要素が<w:rPr>かどうか（空白のみのテキストとコメントは読み飛ばす）
        if pending_run {
            let skipped = match &event {
                Event::Text(text) => text.iter().all(u8::is_ascii_whitespace),
                Event::Comment(_) => true,
                _ => false,
            };
            if skipped {
                output.push(event);
                continue;
            }
            pending_run = false;
            match &tag {
                Tag::Open(name) if name == b"w:rPr" => {
                    output.push(event);
                    props = RunProps::Inside {
                        depth: 0,
                        done: false,
                    };
                    continue;
                }
                Tag::Empty(name) if name == b"w:rPr" => {
                    output.extend(run_properties(color));
                    continue;
                }
                _ => output.extend(run_properties(color)),
            }
        }

        if let RunProps::Inside { depth, done } = &mut props {
            match &tag {
                Tag::Open(name) | Tag::Empty(name) if *depth == 0 => {
                    let is_open = matches!(tag, Tag::Open(_));
                    if name == b"w:highlight" {
                        *done = true;
                        let replaced = highlight_element(color);
                        if is_open {
                            *depth += 1;
                            output.push(Event::Start(replaced));
                        } else {
                            output.push(Event::Empty(replaced));
                        }
                        continue;
                    }
                    if !*done && AFTER_HIGHLIGHT.contains(&name.as_slice()) {
                        output.push(Event::Empty(highlight_element(color)));
                        *done = true;
                    }
                    if is_open {
                        *depth += 1;
                    }
                }
                Tag::Open(_) => *depth += 1,
                Tag::Close(name) if *depth == 0 && name == b"w:rPr" => {
                    if !*done {
                        output.push(Event::Empty(highlight_element(color)));
                    }
                    output.push(event);
                    props = RunProps::Outside;
                    continue;
                }
                Tag::Close(_) => *depth = depth.saturating_sub(1),
                _ => {}
            }
            output.push(event);
            continue;
        }

        if let Tag::Open(name) = &tag {
            pending_run = name == b"w:r";
        }
        output.push(event);
    }

    output
}

/// 保存済みの文書の表を書き換えて強調表示する
///
/// `select`はトップレベルの表ごとに呼ばれ、強調表示するセルを返します。
/// 1つもセルが選ばれなかった場合、ファイルは書き換えません。
///
/// # 戻り値
///
/// 強調表示したセルの数
pub(crate) fn highlight_document<F>(
    path: &Path,
    color: HighlightColor,
    mut select: F,
) -> Result<usize, MarkMergeError>
where
    F: FnMut(&Table) -> Result<Vec<(usize, usize)>, MarkMergeError>,
{
    let package = DocxPackage::open(path)?;
    let xml = package.read_part(DOCUMENT_PART)?.ok_or_else(|| {
        MarkMergeError::Zip(format!("Not a DOCX package: '{}' is missing", DOCUMENT_PART))
    })?;

    let mut highlighted = 0usize;
    let mut failure: Option<MarkMergeError> = None;
    let rewritten = rewrite_tables(&xml, |events| {
        if failure.is_some() {
            return events;
        }

        let table = Table::parse(&events);
        let positions = match select(&table) {
            Ok(positions) => positions,
            Err(e) => {
                failure = Some(e);
                return events;
            }
        };

        let cells: Vec<&TableCell> = positions
            .iter()
            .filter_map(|&(row, col)| table.rows.get(row).and_then(|r| r.cell_at(col)))
            .collect();
        for &(row, col) in &positions {
            debug!(path = %path.display(), row, col, "highlighting table cell");
        }
        highlighted += cells.len();
        highlight_cells(events, &cells, color)
    })?;

    if let Some(e) = failure {
        return Err(e);
    }

    if highlighted > 0 {
        let mut parts = BTreeMap::new();
        parts.insert(DOCUMENT_PART.to_string(), rewritten);
        std::fs::write(path, package.with_parts(&parts)?)?;
    }

    Ok(highlighted)
}
