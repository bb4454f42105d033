//! DOCX Template
//!
//! DOCXパッケージ内のXMLパートをテンプレートとして展開し、書き出す。

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use minijinja::{Environment, Value};
use tracing::debug;

use crate::error::MarkMergeError;
use crate::package::{DocxPackage, DOCUMENT_PART};
use crate::template::engine::template_variables;
use crate::template::patch::PlaceholderPatcher;

/// テンプレートとして展開するパートか
///
/// 本文、ヘッダー、フッター、脚注、文末脚注が対象です。
fn is_template_part(name: &str) -> bool {
    if name == DOCUMENT_PART || name == "word/footnotes.xml" || name == "word/endnotes.xml" {
        return true;
    }
    name.strip_prefix("word/")
        .map(|rest| {
            (rest.starts_with("header") || rest.starts_with("footer"))
                && rest.ends_with(".xml")
                && !rest.contains('/')
        })
        .unwrap_or(false)
}

/// DOCXテンプレート
///
/// 一度開いたテンプレートを行ごとに繰り返し展開できます。
/// `render()`は前回の展開結果を破棄してから展開するため、行をまたいで値が残ることはありません。
///
/// # 使用例
///
/// ```rust,no_run
/// use markmerge::{default_environment, DocxTemplate};
/// use minijinja::context;
///
/// # fn main() -> Result<(), markmerge::MarkMergeError> {
/// let env = default_environment();
/// let mut template = DocxTemplate::open("feedback_template.docx")?;
/// template.render(&env, &context! { STUDENTID => "1234567" })?;
/// template.save("feedback_1234567.docx")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DocxTemplate {
    /// 元のパッケージ
    package: DocxPackage,
    /// テンプレートパート（パート名, 整形済みのソース）
    parts: Vec<(String, String)>,
    /// 直近の展開結果（パート名 → XML）
    rendered: BTreeMap<String, String>,
}

impl DocxTemplate {
    /// ファイルパスからテンプレートを開く
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MarkMergeError> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(bytes)
    }

    /// メモリ上のバイト列からテンプレートを開く
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, MarkMergeError> {
        let package = DocxPackage::from_bytes(bytes)?;
        let patcher = PlaceholderPatcher::new();

        let mut parts = Vec::new();
        for name in package.part_names()? {
            if !is_template_part(&name) {
                continue;
            }
            if let Some(xml) = package.read_part(&name)? {
                let source = patcher.patch(&xml).into_owned();
                parts.push((name, source));
            }
        }

        debug!(
            parts = ?parts.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
            "opened document template"
        );

        Ok(Self {
            package,
            parts,
            rendered: BTreeMap::new(),
        })
    }

    /// テンプレート全体が参照する変数名
    ///
    /// # 戻り値
    ///
    /// * `Err(MarkMergeError::Template)` - いずれかのパートに構文エラーがある場合
    pub fn undeclared_variables(
        &self,
        env: &Environment<'_>,
    ) -> Result<BTreeSet<String>, MarkMergeError> {
        let mut names = BTreeSet::new();
        for (_, source) in &self.parts {
            names.extend(template_variables(env, source)?);
        }
        Ok(names)
    }

    /// 前回の展開結果を破棄する
    pub fn reset_replacements(&mut self) {
        self.rendered.clear();
    }

    /// 全テンプレートパートを展開する
    ///
    /// パート名（`.xml`）で描画するため、値はXMLとしてエスケープされます。
    /// いずれかのパートでエラーが発生した場合、展開結果は残りません。
    pub fn render(&mut self, env: &Environment<'_>, context: &Value) -> Result<(), MarkMergeError> {
        self.reset_replacements();

        let mut rendered = BTreeMap::new();
        for (name, source) in &self.parts {
            let xml = env.render_named_str(name, source, context)?;
            rendered.insert(name.clone(), xml);
        }

        self.rendered = rendered;
        Ok(())
    }

    /// 展開結果を反映したパッケージのバイト列
    ///
    /// 未展開の場合は元のテンプレートと同じ内容になります。
    pub fn to_bytes(&self) -> Result<Vec<u8>, MarkMergeError> {
        self.package.with_parts(&self.rendered)
    }

    /// 展開結果をファイルに書き出す
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), MarkMergeError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path.as_ref(), bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::tests::minimal_docx;
    use crate::template::engine::default_environment;
    use minijinja::context;

    fn document(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        )
    }

    fn rendered_document(template: &DocxTemplate) -> String {
        let package = DocxPackage::from_bytes(template.to_bytes().unwrap()).unwrap();
        package.read_part(DOCUMENT_PART).unwrap().unwrap()
    }

    #[test]
    fn test_is_template_part() {
        assert!(is_template_part("word/document.xml"));
        assert!(is_template_part("word/header1.xml"));
        assert!(is_template_part("word/footer2.xml"));
        assert!(is_template_part("word/footnotes.xml"));
        assert!(!is_template_part("word/_rels/header1.xml.rels"));
        assert!(!is_template_part("word/styles.xml"));
        assert!(!is_template_part("docProps/core.xml"));
    }

    #[test]
    fn test_render_replaces_placeholders() {
        let bytes = minimal_docx(
            &document("<w:p><w:r><w:t>Student {{ STUDENTID }}</w:t></w:r></w:p>"),
            &[],
        );
        let mut template = DocxTemplate::from_bytes(bytes).unwrap();
        let env = default_environment();

        template
            .render(&env, &context! { STUDENTID => "1234567" })
            .unwrap();
        assert!(rendered_document(&template).contains("<w:t>Student 1234567</w:t>"));
    }

    #[test]
    fn test_render_escapes_values() {
        let bytes = minimal_docx(
            &document("<w:p><w:r><w:t>{{ COMMENTS }}</w:t></w:r></w:p>"),
            &[],
        );
        let mut template = DocxTemplate::from_bytes(bytes).unwrap();
        let env = default_environment();

        template
            .render(&env, &context! { COMMENTS => "A & B <ok>" })
            .unwrap();
        let xml = rendered_document(&template);
        assert!(xml.contains("A &amp; B &lt;ok&gt;"));
    }

    #[test]
    fn test_render_is_reusable_across_rows() {
        let bytes = minimal_docx(
            &document("<w:p><w:r><w:t>{{ NAME }}</w:t></w:r></w:p>"),
            &[],
        );
        let mut template = DocxTemplate::from_bytes(bytes).unwrap();
        let env = default_environment();

        template.render(&env, &context! { NAME => "Ada" }).unwrap();
        assert!(rendered_document(&template).contains("<w:t>Ada</w:t>"));

        template.render(&env, &context! { NAME => "Bob" }).unwrap();
        let xml = rendered_document(&template);
        assert!(xml.contains("<w:t>Bob</w:t>"));
        assert!(!xml.contains("Ada"));
    }

    #[test]
    fn test_render_headers_and_footers() {
        let bytes = minimal_docx(
            &document("<w:p/>"),
            &[
                ("word/header1.xml", "<w:hdr><w:t>{{ MODULE }}</w:t></w:hdr>"),
                ("word/footer1.xml", "<w:ftr><w:t>{{ MARKER }}</w:t></w:ftr>"),
            ],
        );
        let mut template = DocxTemplate::from_bytes(bytes).unwrap();
        let env = default_environment();

        assert_eq!(
            template
                .undeclared_variables(&env)
                .unwrap()
                .into_iter()
                .collect::<Vec<_>>(),
            vec!["MARKER", "MODULE"]
        );

        template
            .render(&env, &context! { MODULE => "CS101", MARKER => "DrCroft" })
            .unwrap();
        let package = DocxPackage::from_bytes(template.to_bytes().unwrap()).unwrap();
        assert_eq!(
            package.read_part("word/header1.xml").unwrap().as_deref(),
            Some("<w:hdr><w:t>CS101</w:t></w:hdr>")
        );
        assert_eq!(
            package.read_part("word/footer1.xml").unwrap().as_deref(),
            Some("<w:ftr><w:t>DrCroft</w:t></w:ftr>")
        );
    }

    #[test]
    fn test_render_split_placeholder() {
        let bytes = minimal_docx(
            &document(
                "<w:p><w:r><w:t>{{ STUDENT</w:t></w:r><w:r><w:t>ID }}</w:t></w:r></w:p>",
            ),
            &[],
        );
        let mut template = DocxTemplate::from_bytes(bytes).unwrap();
        let env = default_environment();

        assert!(template
            .undeclared_variables(&env)
            .unwrap()
            .contains("STUDENTID"));

        template
            .render(&env, &context! { STUDENTID => "7654321" })
            .unwrap();
        assert!(rendered_document(&template).contains("<w:t>7654321</w:t>"));
    }

    #[test]
    fn test_render_undefined_placeholder_fails() {
        let bytes = minimal_docx(
            &document("<w:p><w:r><w:t>{{ MISSING }}</w:t></w:r></w:p>"),
            &[],
        );
        let mut template = DocxTemplate::from_bytes(bytes).unwrap();
        let env = default_environment();

        let result = template.render(&env, &context! { NAME => "Ada" });
        assert!(matches!(result, Err(MarkMergeError::Template(_))));
        // 失敗した展開結果は残らない
        assert!(rendered_document(&template).contains("{{ MISSING }}"));
    }

    #[test]
    fn test_save_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.docx");
        let bytes = minimal_docx(
            &document("<w:p><w:r><w:t>{{ NAME }}</w:t></w:r></w:p>"),
            &[],
        );
        let mut template = DocxTemplate::from_bytes(bytes).unwrap();
        template
            .render(&default_environment(), &context! { NAME => "Ada" })
            .unwrap();
        template.save(&path).unwrap();

        let package = DocxPackage::open(&path).unwrap();
        assert!(package
            .read_part(DOCUMENT_PART)
            .unwrap()
            .unwrap()
            .contains("<w:t>Ada</w:t>"));
    }
}
