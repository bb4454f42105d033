//! Builder Module
//!
//! Fluent Builder APIを提供し、`FeedbackGenerator`インスタンスを段階的に構築する。

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use minijinja::Environment;
use tracing::{debug, info};

use crate::api::DateFormat;
use crate::error::MarkMergeError;
use crate::formatter::CellFormatter;
use crate::parser::{ColumnMapping, WorkbookParser};
use crate::postprocess::{PostProcess, RowGridHighlighter};
use crate::template::{
    default_environment, expected_fields, render_filename, template_variables, DocxTemplate,
};
use crate::types::RowData;
use crate::validate::{ValidRows, Validators};

/// 生成処理の設定を保持する内部構造体
#[derive(Debug, Clone)]
pub(crate) struct GenerationConfig {
    /// 読み込むワークシート名
    pub worksheet: String,

    /// 出力ファイル名テンプレート
    pub output_pattern: String,

    /// 行の検証に使うバリデーター
    pub validators: Validators,

    /// テンプレートから参照されないが列を探すフィールド名
    pub extra_fields: BTreeSet<String>,

    /// 日付形式
    pub date_format: DateFormat,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            worksheet: "marks".to_string(),
            output_pattern: "feedback/feedback_{{STUDENTID}}.docx".to_string(),
            validators: Validators::default(),
            extra_fields: BTreeSet::new(),
            date_format: DateFormat::Iso8601,
        }
    }
}

/// Fluent Builder APIを提供する構造体
///
/// `FeedbackGenerator`インスタンスを段階的に構築するためのビルダーです。
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use markmerge::GeneratorBuilder;
///
/// # fn main() -> Result<(), markmerge::MarkMergeError> {
/// let generator = GeneratorBuilder::new()
///     .with_worksheet("PMA")
///     .with_output_pattern("PMA_feedback_{{STUDENTID}}_{{MARKER}}.docx")
///     .build()?;
/// generator.generate("marks.xlsx", "feedback_template.docx")?;
/// # Ok(())
/// # }
/// ```
pub struct GeneratorBuilder {
    /// 内部設定（構築中）
    config: GenerationConfig,

    /// 式の評価環境（Noneの場合はデフォルト）
    environment: Option<Environment<'static>>,

    /// 後処理
    post_processor: Option<Box<dyn PostProcess>>,
}

impl fmt::Debug for GeneratorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorBuilder")
            .field("config", &self.config)
            .field("environment", &self.environment.is_some())
            .field("post_processor", &self.post_processor.is_some())
            .finish()
    }
}

impl Default for GeneratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneratorBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - ワークシート: `marks`
    /// - 出力ファイル名: `feedback/feedback_{{STUDENTID}}.docx`
    /// - バリデーター: `STUDENTID`が7桁の数字で始まること
    /// - 後処理: 行方向フィードバック表の強調表示（[`RowGridHighlighter`]）
    /// - 日付形式: ISO 8601 (YYYY-MM-DD)
    pub fn new() -> Self {
        Self {
            config: GenerationConfig::default(),
            environment: None,
            post_processor: Some(Box::new(RowGridHighlighter::default())),
        }
    }

    /// 読み込むワークシートを指定する
    ///
    /// # 引数
    ///
    /// * `name`: ワークシート名（完全一致）
    pub fn with_worksheet(mut self, name: impl Into<String>) -> Self {
        self.config.worksheet = name.into();
        self
    }

    /// 出力ファイル名テンプレートを指定する
    ///
    /// 展開結果は現在のディレクトリからの相対パス、または絶対パスとして扱われ、
    /// 親ディレクトリは必要に応じて作成されます。
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use markmerge::GeneratorBuilder;
    ///
    /// let builder = GeneratorBuilder::new()
    ///     .with_output_pattern("out/{{ COHORT | lower }}/{{STUDENTID}}.docx");
    /// ```
    pub fn with_output_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.output_pattern = pattern.into();
        self
    }

    /// 行の検証に使うバリデーターを指定する
    ///
    /// バリデーターのキーは列を探すフィールド名にも含まれます。
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use markmerge::{CellValue, GeneratorBuilder, Validators};
    ///
    /// let validators = Validators::default()
    ///     .with("TOTAL", |value: &CellValue| value.as_mark().is_ok());
    /// let builder = GeneratorBuilder::new().with_validators(validators);
    /// ```
    pub fn with_validators(mut self, validators: Validators) -> Self {
        self.config.validators = validators;
        self
    }

    /// 保存後に実行する後処理を指定する
    pub fn with_post_processor<P>(mut self, post_processor: P) -> Self
    where
        P: PostProcess + 'static,
    {
        self.post_processor = Some(Box::new(post_processor));
        self
    }

    /// 後処理を無効にする
    pub fn without_post_processor(mut self) -> Self {
        self.post_processor = None;
        self
    }

    /// テンプレートから参照されないが、列を探して行データに含めるフィールド名を追加する
    pub fn with_extra_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.extra_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// 式の評価環境を指定する
    ///
    /// 独自のフィルターや関数を登録した環境を使う場合に指定します。
    /// 文書テンプレートと出力ファイル名テンプレートの両方に使われます。
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use markmerge::{default_environment, GeneratorBuilder};
    ///
    /// let mut env = default_environment();
    /// env.add_filter("initials", |name: String| {
    ///     name.split_whitespace().filter_map(|w| w.chars().next()).collect::<String>()
    /// });
    /// let builder = GeneratorBuilder::new().with_environment(env);
    /// ```
    pub fn with_environment(mut self, environment: Environment<'static>) -> Self {
        self.environment = Some(environment);
        self
    }

    /// 文書に展開する日付の形式を指定する
    ///
    /// 出力ファイル名の日付は常にISO 8601形式です。
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use markmerge::{DateFormat, GeneratorBuilder};
    ///
    /// let builder = GeneratorBuilder::new()
    ///     .with_date_format(DateFormat::Custom("%d/%m/%Y".to_string()));
    /// ```
    pub fn with_date_format(mut self, format: DateFormat) -> Self {
        self.config.date_format = format;
        self
    }

    /// 設定を検証して`FeedbackGenerator`を構築する
    ///
    /// # 戻り値
    ///
    /// * `Ok(FeedbackGenerator)` - 設定が有効な場合
    /// * `Err(MarkMergeError::Config)` - 以下のいずれかの場合
    ///   * ワークシート名が空
    ///   * 出力ファイル名テンプレートが空、または構文エラー
    ///   * カスタム日付形式が不正な書式文字列
    pub fn build(self) -> Result<FeedbackGenerator, MarkMergeError> {
        // 1. ワークシート名の検証
        if self.config.worksheet.trim().is_empty() {
            return Err(MarkMergeError::Config(
                "Worksheet name must not be empty".to_string(),
            ));
        }

        // 2. 出力ファイル名テンプレートの検証
        if self.config.output_pattern.trim().is_empty() {
            return Err(MarkMergeError::Config(
                "Output filename pattern must not be empty".to_string(),
            ));
        }
        let environment = self.environment.unwrap_or_else(default_environment);
        if let Err(e) = environment.template_from_str(&self.config.output_pattern) {
            return Err(MarkMergeError::Config(format!(
                "Invalid output filename pattern '{}': {}",
                self.config.output_pattern, e
            )));
        }

        // 3. カスタム日付形式の検証
        if let DateFormat::Custom(ref format_str) = self.config.date_format {
            let invalid = format_str.is_empty()
                || StrftimeItems::new(format_str).any(|item| matches!(item, Item::Error));
            if invalid {
                return Err(MarkMergeError::Config(format!(
                    "Invalid date format string: '{}'",
                    format_str
                )));
            }
        }

        Ok(FeedbackGenerator {
            config: self.config,
            environment,
            post_processor: self.post_processor,
            formatter: CellFormatter::new(),
        })
    }
}

/// フィードバック文書生成のファサード
///
/// スプレッドシートの有効な行ごとに文書テンプレートを展開して保存し、
/// 後処理を実行します。行は1つずつ順番に処理されます。
///
/// # 使用例
///
/// ```rust,no_run
/// use markmerge::GeneratorBuilder;
///
/// # fn main() -> Result<(), markmerge::MarkMergeError> {
/// let generator = GeneratorBuilder::new().without_post_processor().build()?;
/// generator.generate("marks.xlsx", "feedback_template.docx")?;
/// # Ok(())
/// # }
/// ```
pub struct FeedbackGenerator {
    /// 生成設定
    config: GenerationConfig,

    /// 式の評価環境
    environment: Environment<'static>,

    /// 後処理
    post_processor: Option<Box<dyn PostProcess>>,

    /// セルフォーマッター
    formatter: CellFormatter,
}

impl fmt::Debug for FeedbackGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedbackGenerator")
            .field("config", &self.config)
            .field("post_processor", &self.post_processor.is_some())
            .finish()
    }
}

impl FeedbackGenerator {
    /// 列を探すフィールド名を求める
    fn expected_fields(&self, template: &DocxTemplate) -> Result<BTreeSet<String>, MarkMergeError> {
        let template_refs = template.undeclared_variables(&self.environment)?;
        let filename_refs = template_variables(&self.environment, &self.config.output_pattern)?;

        let mut fields = expected_fields(
            &template_refs,
            &filename_refs,
            self.config.validators.keys(),
        );
        fields.extend(self.config.extra_fields.iter().cloned());
        Ok(fields)
    }

    /// 行の出力先パス（日付は文書の形式によらずISO 8601で展開）
    fn output_path(&self, row: &RowData) -> Result<PathBuf, MarkMergeError> {
        render_filename(&self.environment, &self.config.output_pattern, row).map(PathBuf::from)
    }

    /// スプレッドシートの有効な行ごとにフィードバック文書を生成する
    ///
    /// # 引数
    ///
    /// * `xlsx` - スプレッドシートのパス
    /// * `template` - DOCXテンプレートのパス
    ///
    /// # 戻り値
    ///
    /// * `Ok(())` - すべての有効な行について文書を書き出した場合
    /// * `Err(MarkMergeError)` - エラーが発生した場合（それまでに書き出した文書は残ります）
    ///
    /// # 処理フロー
    ///
    /// 1. テンプレートを開き、列を探すフィールド名を求める
    /// 2. ワークシートを読み込み、列を特定する
    /// 3. 有効な行ごとに処理（ループ）
    ///    - 出力ファイル名の展開と親ディレクトリの作成
    ///    - テンプレートの展開と保存
    ///    - 後処理
    pub fn generate<P, Q>(&self, xlsx: P, template: Q) -> Result<(), MarkMergeError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        // 1. フィールドの検出
        let mut template = DocxTemplate::open(template)?;
        let fields = self.expected_fields(&template)?;
        debug!(?fields, "expected fields");

        // 2. ワークシートの読み込み
        let mut workbook = WorkbookParser::open(xlsx)?;
        let sheet = workbook.worksheet(&self.config.worksheet)?;

        // 3. 列の特定
        let mapping = ColumnMapping::locate(&sheet, &fields);

        // 4. 行ごとの生成
        let mut written = 0usize;
        for row in ValidRows::new(&sheet, &mapping, &self.config.validators) {
            let row = row?;
            let context = self.formatter.to_context(&row, &self.config.date_format);

            let path = self.output_path(&row)?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }

            template.render(&self.environment, &context)?;
            template.save(&path)?;

            if let Some(post_processor) = &self.post_processor {
                post_processor.process(&row, &path)?;
            }

            info!(path = %path.display(), "wrote feedback document");
            written += 1;
        }

        info!(
            worksheet = %self.config.worksheet,
            documents = written,
            "feedback generation finished"
        );
        Ok(())
    }
}
