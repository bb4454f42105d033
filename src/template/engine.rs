//! Template Engine
//!
//! MiniJinjaの環境構築、テンプレートが参照する変数名の収集、出力ファイル名の展開。

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt::Write;

use minijinja::value::ValueKind;
use minijinja::{
    escape_formatter, AutoEscape, Environment, Error, ErrorKind, Output, State, UndefinedBehavior,
    Value,
};
use quick_xml::escape::escape;

use crate::api::{Category, DateFormat};
use crate::error::MarkMergeError;
use crate::formatter::CellFormatter;
use crate::types::{CellValue, RowData};

/// XMLパートとして描画するテンプレート用の自動エスケープ名
const XML_ESCAPE: &str = "xml";

/// デフォルトのテンプレート環境を生成する
///
/// - 未定義変数の参照はエラー（`UndefinedBehavior::Strict`）
/// - `mark_category`フィルター（点数 → カテゴリラベル）
/// - 拡張子`.xml`の名前で描画されるテンプレート（DOCXのXMLパート）では、
///   値をXMLとしてエスケープ（`<`、`>`、`&`、`'`、`"`のみ）
///
/// ```rust
/// use markmerge::default_environment;
/// use minijinja::context;
///
/// let env = default_environment();
/// let label = env.render_str("{{ 72 | mark_category }}", ()).unwrap();
/// assert_eq!(label, "DISTINCTION");
///
/// let xml = env
///     .render_named_str("word/document.xml", "{{ DATE }} {{ NAME }}", context! {
///         DATE => "20/11/2025",
///         NAME => "Ada & Co",
///     })
///     .unwrap();
/// assert_eq!(xml, "20/11/2025 Ada &amp; Co");
/// ```
pub fn default_environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_auto_escape_callback(|name| {
        if name.ends_with(".xml") {
            AutoEscape::Custom(XML_ESCAPE)
        } else {
            AutoEscape::None
        }
    });
    env.set_formatter(xml_formatter);
    env.add_filter("mark_category", mark_category);
    env
}

/// XMLパートでは値をXMLエスケープして出力する
fn xml_formatter(out: &mut Output<'_>, state: &State<'_, '_>, value: &Value) -> Result<(), Error> {
    match state.auto_escape() {
        AutoEscape::Custom(XML_ESCAPE) => {
            if value.is_undefined() {
                return Ok(());
            }
            let text = value.to_string();
            let text = if value.is_safe() {
                Cow::Borrowed(text.as_str())
            } else {
                escape(text.as_str())
            };
            out.write_str(&text).map_err(Error::from)
        }
        _ => escape_formatter(out, state, value),
    }
}

/// 点数をカテゴリラベルに変換するフィルター
fn mark_category(value: Value) -> Result<String, Error> {
    let cell = match value.kind() {
        ValueKind::Number => f64::try_from(value.clone())
            .map(CellValue::Number)
            .unwrap_or(CellValue::Empty),
        ValueKind::String => CellValue::String(value.as_str().unwrap_or_default().to_string()),
        _ => CellValue::String(value.to_string()),
    };

    Category::from_cell(&cell)
        .map(|category| category.label().to_string())
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))
}

/// テンプレートが参照するトップレベルの変数名を取得
///
/// ループ変数など、テンプレート内で宣言される名前は含まれません。
///
/// # 戻り値
///
/// * `Err(MarkMergeError::Template)` - テンプレートの構文エラー
pub fn template_variables(
    env: &Environment<'_>,
    source: &str,
) -> Result<BTreeSet<String>, MarkMergeError> {
    let template = env.template_from_str(source)?;
    Ok(template.undeclared_variables(false).into_iter().collect())
}

/// 出力ファイル名テンプレートを1行分のデータで展開する
///
/// 日付セルはISO 8601形式で展開されます。
///
/// # 使用例
///
/// ```rust
/// use markmerge::{default_environment, render_filename, RowData};
///
/// let env = default_environment();
/// let row = RowData::new().with("STUDENTID", "1234567");
/// let name = render_filename(&env, "feedback_{{STUDENTID}}.docx", &row).unwrap();
/// assert_eq!(name, "feedback_1234567.docx");
/// ```
pub fn render_filename(
    env: &Environment<'_>,
    pattern: &str,
    row: &RowData,
) -> Result<String, MarkMergeError> {
    let context = CellFormatter::new().to_context(row, &DateFormat::Iso8601);
    render_text(env, pattern, &context)
}

/// テキストテンプレートを展開（自動エスケープなし）
fn render_text(
    env: &Environment<'_>,
    source: &str,
    context: &Value,
) -> Result<String, MarkMergeError> {
    Ok(env.render_str(source, context)?)
}

/// 列として探すフィールド名の集合を求める
///
/// 文書テンプレートの参照名、出力ファイル名テンプレートの参照名、
/// バリデーターのキーの和集合です。
///
/// ```rust
/// use markmerge::expected_fields;
///
/// let fields = expected_fields(["NAME", "TOTAL"], ["STUDENTID"], ["STUDENTID"]);
/// assert_eq!(fields.into_iter().collect::<Vec<_>>(), vec!["NAME", "STUDENTID", "TOTAL"]);
/// ```
pub fn expected_fields<A, B, C>(template_refs: A, filename_refs: B, validator_keys: C) -> BTreeSet<String>
where
    A: IntoIterator,
    A::Item: AsRef<str>,
    B: IntoIterator,
    B::Item: AsRef<str>,
    C: IntoIterator,
    C::Item: AsRef<str>,
{
    let mut fields = BTreeSet::new();
    fields.extend(template_refs.into_iter().map(|name| name.as_ref().to_string()));
    fields.extend(filename_refs.into_iter().map(|name| name.as_ref().to_string()));
    fields.extend(validator_keys.into_iter().map(|name| name.as_ref().to_string()));
    fields
}
