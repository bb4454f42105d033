//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use thiserror::Error;

/// markmergeクレート全体で使用するエラー型
///
/// スプレッドシートの読み込み、テンプレートの展開、文書の書き出し、
/// 後処理の各段階で発生するエラーを統一的に扱います。
///
/// # エラーの分類
///
/// - 設定エラー（`MissingValidatorField`, `Config`, `WorksheetNotFound`）:
///   シートとテンプレートの不整合を示すため、生成処理全体を中断します。
/// - レンダリングエラー（`Template`）: 未定義のプレースホルダーや構文エラー。
/// - I/Oエラー（`Io`, `Spreadsheet`, `Zip`, `Xml`）: 呼び出し元へそのまま伝播します。
///
/// 行単位の検証失敗はエラーではありません（ログに記録してスキップされます）。
///
/// # 使用例
///
/// ```rust,no_run
/// use markmerge::MarkMergeError;
///
/// fn read_template(path: &str) -> Result<Vec<u8>, MarkMergeError> {
///     let bytes = std::fs::read(path)?;  // Ioエラーが自動的に変換される
///     Ok(bytes)
/// }
/// ```
#[derive(Error, Debug)]
pub enum MarkMergeError {
    /// I/O操作中に発生したエラー
    ///
    /// 入力ファイルが存在しない、出力先に書き込めないなどの場合に使用されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// スプレッドシートの解析中に発生したエラー（calamine由来）
    #[error("Failed to read spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// 指定されたワークシートがワークブックに存在しない
    #[error("Worksheet '{0}' not found")]
    WorksheetNotFound(String),

    /// ZIPアーカイブ（DOCXパッケージ）の解析・書き出しエラー
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// DOCXパッケージ内のXMLパートの解析エラー
    #[error("XML error: {0}")]
    Xml(String),

    /// テンプレートエンジンのエラー
    ///
    /// テンプレートの構文エラーや、行データに存在しない名前を参照した場合
    /// （未定義変数）に発生します。
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    /// バリデーターのキーが行データに存在しない
    ///
    /// 期待された列がシートのどこにも見つからなかったことを意味します。
    /// 行単位のスキップではなく、生成処理全体を中断する設定エラーです。
    ///
    /// # 例
    ///
    /// ```rust
    /// use markmerge::MarkMergeError;
    ///
    /// let error = MarkMergeError::MissingValidatorField {
    ///     field: "STUDENTID".to_string(),
    /// };
    /// assert_eq!(error.to_string(), "Validator 'STUDENTID' not found in columns");
    /// ```
    #[error("Validator '{field}' not found in columns")]
    MissingValidatorField {
        /// 見つからなかったフィールド名
        field: String,
    },

    /// 点数を数値に変換できない
    #[error("Invalid mark: '{value}' is not a number")]
    InvalidMark {
        /// 変換に失敗した値（文字列表現）
        value: String,
    },

    /// 設定の検証に失敗したエラー
    ///
    /// `GeneratorBuilder::build()`時に設定を検証し、無効な設定が検出された
    /// 場合に発生します（空のワークシート名、不正な出力ファイル名テンプレートなど）。
    #[error("Configuration error: {0}")]
    Config(String),

    /// セキュリティ制限に違反したエラー
    ///
    /// ZIP bomb、パストラバーサル、サイズ制限違反などを検出した場合に発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    // Ioエラーのテスト
    #[test]
    fn test_io_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error: MarkMergeError = io_err.into();

        match error {
            MarkMergeError::Io(e) => {
                assert_eq!(e.kind(), io::ErrorKind::NotFound);
                assert_eq!(e.to_string(), "File not found");
            }
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_spreadsheet_error_display() {
        let error: MarkMergeError = calamine::Error::Msg("Corrupted file").into();

        let error_msg = error.to_string();
        assert!(error_msg.contains("Failed to read spreadsheet"));
        assert!(error_msg.contains("Corrupted file"));
    }

    #[test]
    fn test_template_error_conversion() {
        let template_err = minijinja::Error::new(
            minijinja::ErrorKind::UndefinedError,
            "STUDENTID is undefined",
        );
        let error: MarkMergeError = template_err.into();

        match error {
            MarkMergeError::Template(e) => {
                assert_eq!(e.kind(), minijinja::ErrorKind::UndefinedError);
            }
            _ => panic!("Expected Template error"),
        }
    }

    #[test]
    fn test_missing_validator_field_display() {
        let error = MarkMergeError::MissingValidatorField {
            field: "STUDENTID".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Validator 'STUDENTID' not found in columns"
        );
    }

    #[test]
    fn test_invalid_mark_display() {
        let error = MarkMergeError::InvalidMark {
            value: "abc".to_string(),
        };
        assert!(error.to_string().contains("'abc' is not a number"));
    }

    // エラー変換のテスト（?演算子の動作確認）
    #[test]
    fn test_error_conversion_with_question_mark() {
        fn io_operation() -> Result<(), MarkMergeError> {
            let _file = std::fs::File::open("nonexistent_template.docx")?;
            Ok(())
        }

        match io_operation() {
            Err(MarkMergeError::Io(_)) => {}
            _ => panic!("Expected Io error from ? operator"),
        }
    }

    // エラーメッセージのフォーマット確認
    #[test]
    fn test_all_error_formats() {
        let config_err = MarkMergeError::Config("test config".to_string());
        assert!(config_err.to_string().starts_with("Configuration error"));

        let sheet_err = MarkMergeError::WorksheetNotFound("marks".to_string());
        assert_eq!(sheet_err.to_string(), "Worksheet 'marks' not found");

        let zip_err = MarkMergeError::Zip("bad header".to_string());
        assert!(zip_err.to_string().starts_with("ZIP archive error"));

        let xml_err = MarkMergeError::Xml("unexpected eof".to_string());
        assert!(xml_err.to_string().starts_with("XML error"));

        let security_err = MarkMergeError::SecurityViolation("too many files".to_string());
        assert!(security_err.to_string().starts_with("Security violation"));
    }
}
