//! Placeholder Patching
//!
//! Wordはプレースホルダーを複数のラン（`<w:r>`）に分割して保存することがあるため、
//! テンプレートとして解釈する前にXMLを整形し、`{{ … }}`などの区切りを連続したテキストに戻す。

use std::borrow::Cow;
use std::sync::OnceLock;

use quick_xml::escape::unescape;
use regex::{Captures, Regex};

/// 整形に使う正規表現（プロセス内で一度だけコンパイル）
#[derive(Debug)]
struct Patterns {
    open_split: Regex,
    close_split: Regex,
    delimited: Regex,
    tag: Regex,
}

impl Patterns {
    fn get() -> &'static Self {
        static PATTERNS: OnceLock<Patterns> = OnceLock::new();
        PATTERNS.get_or_init(|| Self {
            open_split: Regex::new(r"\{(?:<[^>]*>)+([{%#])").expect("hardcoded regex pattern"),
            close_split: Regex::new(r"([}%#])(?:<[^>]*>)+\}").expect("hardcoded regex pattern"),
            delimited: Regex::new(r"(?s)\{\{.*?\}\}|\{%.*?%\}|\{#.*?#\}")
                .expect("hardcoded regex pattern"),
            tag: Regex::new(r"<[^>]*>").expect("hardcoded regex pattern"),
        })
    }
}

/// XMLパートをテンプレートとして解釈できる形に整形するパッチャー
///
/// 1. `{`と`{`（または`%`、`#`）の間に挟まったタグを取り除く
/// 2. `{{ … }}`、`{% … %}`、`{# … #}`の内側にあるタグを取り除く
/// 3. 内側のXMLエンティティを元の文字に戻し、typographic quoteをASCIIに置き換える
#[derive(Debug, Clone, Copy)]
pub(crate) struct PlaceholderPatcher {
    patterns: &'static Patterns,
}

impl PlaceholderPatcher {
    pub fn new() -> Self {
        Self {
            patterns: Patterns::get(),
        }
    }

    /// XMLパートを整形する
    pub fn patch<'a>(&self, xml: &'a str) -> Cow<'a, str> {
        if !xml.contains('{') {
            return Cow::Borrowed(xml);
        }

        let joined = self.patterns.open_split.replace_all(xml, "{$1");
        let joined = self.patterns.close_split.replace_all(&joined, "$1}").into_owned();

        let patched = self
            .patterns
            .delimited
            .replace_all(&joined, |caps: &Captures| self.clean(&caps[0]))
            .into_owned();
        Cow::Owned(patched)
    }

    /// 区切りの内側を整形
    fn clean(&self, expression: &str) -> String {
        let stripped = self.patterns.tag.replace_all(expression, "");
        let unescaped = match unescape(&stripped) {
            Ok(text) => text.into_owned(),
            Err(_) => stripped.into_owned(),
        };
        unescaped
            .replace(['\u{2018}', '\u{2019}'], "'")
            .replace(['\u{201C}', '\u{201D}'], "\"")
    }
}

impl Default for PlaceholderPatcher {
    fn default() -> Self {
        Self::new()
    }
}
