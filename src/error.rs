//! Error Types Module
//!
//! パイプライン全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。
//!
//! エラーは契約ごとに分かれています。
//!
//! - [`SecurityViolation`]: セキュリティゲートのポリシー違反
//! - [`ParseFailure`]: コンテナ解析の失敗
//! - [`GenerationFailure`]: スライド生成の失敗
//! - [`PipelineError`]: 上記を集約したオーケストレーター境界のエラー

use thiserror::Error;

/// セキュリティゲートのポリシー違反
///
/// ファイル内容に一切触れずに判定されるため、常にローカルで発生し、
/// 自動リトライされることはありません。メッセージはそのままユーザーに表示できます。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecurityViolation {
    /// 宣言されたMIMEタイプが許可リストに含まれていない
    #[error("Invalid file type. Allowed types: {}", join_types(.allowed))]
    InvalidType {
        /// 宣言されたMIMEタイプ
        declared: String,
        /// 許可されているMIMEタイプ
        allowed: Vec<String>,
    },

    /// ファイルサイズが上限を超えている
    ///
    /// メッセージには設定された上限（MB単位）が含まれます。
    #[error("File too large. Maximum size: {}MB", mebibytes(.limit))]
    TooLarge {
        /// 実際のサイズ（バイト）
        size: u64,
        /// 設定された上限（バイト）
        limit: u64,
    },

    /// ファイル名にパストラバーサルやパス区切り文字が含まれている
    #[error("Invalid file name detected")]
    InvalidName {
        /// 宣言されたファイル名
        name: String,
    },
}

impl SecurityViolation {
    /// 機械可読なエラーコード
    pub fn code(&self) -> &'static str {
        match self {
            SecurityViolation::InvalidType { .. } => "INVALID_FILE_TYPE",
            SecurityViolation::TooLarge { .. } => "FILE_TOO_LARGE",
            SecurityViolation::InvalidName { .. } => "INVALID_FILE_NAME",
        }
    }
}

/// コンテナ解析の失敗
///
/// すべての失敗はその実行にとって終端的であり、部分的な`ParsedWorkbook`が
/// 返されることはありません。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// 解析前のセキュリティゲートで拒否された
    #[error(transparent)]
    Security(#[from] SecurityViolation),

    /// 全シート合計の行数が上限を超えた
    #[error("File contains too many rows (max: {})", row_limit(.limit))]
    TooManyRows {
        /// 設定された行数上限
        limit: usize,
    },

    /// コンテナの解読に失敗した（ZIP破損、XML不正、アーカイブ制限超過など）
    #[error("Failed to parse Excel file: {0}")]
    MalformedContainer(String),
}

impl ParseFailure {
    /// 機械可読なエラーコード
    pub fn code(&self) -> &'static str {
        match self {
            ParseFailure::Security(violation) => violation.code(),
            ParseFailure::TooManyRows { .. } => "TOO_MANY_ROWS",
            ParseFailure::MalformedContainer(_) => "MALFORMED_CONTAINER",
        }
    }
}

impl From<calamine::XlsxError> for ParseFailure {
    fn from(err: calamine::XlsxError) -> Self {
        ParseFailure::MalformedContainer(err.to_string())
    }
}

impl From<zip::result::ZipError> for ParseFailure {
    fn from(err: zip::result::ZipError) -> Self {
        ParseFailure::MalformedContainer(format!("ZIP archive error: {}", err))
    }
}

/// スライド生成の失敗
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationFailure {
    /// 分類を通過したシートが1つもない
    #[error("No sheet could be converted into a slide")]
    EmptyInput,

    /// 出力コンテナのシリアライズに失敗した（非圧縮での再試行後も失敗）
    #[error("Failed to serialize presentation: {0}")]
    SerializationFailure(String),

    /// 自己検証に失敗した
    ///
    /// シンセサイザー自身のチェックが失敗したことを示し、警告に格下げしてはいけません。
    #[error("Generated presentation failed self-validation: {0}")]
    CorruptOutput(String),

    /// 生成中にキャンセルが観測された
    ///
    /// ユーザー向けのエラーではありません。オーケストレーターは
    /// これを失敗ではなく`Cancelled`結果に変換します。
    #[error("Generation was cancelled")]
    Cancelled,
}

impl GenerationFailure {
    /// 機械可読なエラーコード
    pub fn code(&self) -> &'static str {
        match self {
            GenerationFailure::EmptyInput => "EMPTY_INPUT",
            GenerationFailure::SerializationFailure(_) => "SERIALIZATION_FAILED",
            GenerationFailure::CorruptOutput(_) => "CORRUPT_OUTPUT",
            GenerationFailure::Cancelled => "CANCELLED",
        }
    }
}

/// オーケストレーター境界で扱うエラー
///
/// `Processor`の公開契約からエラーが漏れることはなく、
/// このエラーは`ProcessingFailure`の一部として返されます。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// ポリシー違反
    #[error("Security Error: {0}")]
    Security(#[from] SecurityViolation),

    /// 解析失敗
    #[error(transparent)]
    Parse(ParseFailure),

    /// 生成失敗
    #[error(transparent)]
    Generation(#[from] GenerationFailure),

    /// 設定の検証に失敗したエラー
    ///
    /// `ProcessorBuilder::build()`時、または実行ごとのテーマ上書きの検証時に発生します。
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<ParseFailure> for PipelineError {
    fn from(err: ParseFailure) -> Self {
        // ゲート由来の違反は解析失敗ではなくポリシー違反として扱う
        match err {
            ParseFailure::Security(violation) => PipelineError::Security(violation),
            other => PipelineError::Parse(other),
        }
    }
}

impl PipelineError {
    /// 機械可読なエラーコード
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Security(violation) => violation.code(),
            PipelineError::Parse(failure) => failure.code(),
            PipelineError::Generation(failure) => failure.code(),
            PipelineError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// ポリシー違反（`InvalidType`, `TooLarge`, `InvalidName`）かどうか
    pub fn is_policy_violation(&self) -> bool {
        matches!(self, PipelineError::Security(_))
    }
}

fn mebibytes(bytes: &u64) -> u64 {
    bytes / 1024 / 1024
}

fn join_types(types: &[String]) -> String {
    types.join(", ")
}

fn row_limit(limit: &usize) -> String {
    group_thousands(*limit as u64)
}

/// 3桁区切りの数値文字列を生成（例: 50000 -> "50,000"）
pub(crate) fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
