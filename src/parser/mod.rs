//! Parser Module
//!
//! calamineを使用したXLSXコンテナの解析。
//! セキュリティゲート、アーカイブ検査、デコード、サニタイズを順に適用し、
//! `ParsedWorkbook`を生成します。

mod archive;
mod workbook;

pub use workbook::{ContainerParser, WorkbookParser};

use crate::api::SecurityPolicy;
use crate::error::ParseFailure;
use crate::security::{self, LOG_TARGET};
use crate::types::{ParsedWorkbook, RawFile};

/// セキュリティゲートを通した上でワークブックを解析
///
/// # 引数
///
/// * `file` - アップロードされたファイル
/// * `policy` - 適用するセキュリティポリシー
///
/// # 戻り値
///
/// * `Ok(ParsedWorkbook)` - 解析に成功した場合
/// * `Err(ParseFailure)` - ゲートでの拒否、行数上限超過、コンテナ破損のいずれか
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxdeck::{parse_workbook, RawFile, SecurityPolicy, XLSX_MIME_TYPE};
///
/// let bytes = std::fs::read("model.xlsx").unwrap();
/// let file = RawFile::new("model.xlsx", XLSX_MIME_TYPE, bytes);
/// let workbook = parse_workbook(&file, &SecurityPolicy::default()).unwrap();
/// println!("{} sheets", workbook.metadata.sheet_count);
/// ```
pub fn parse_workbook(
    file: &RawFile,
    policy: &SecurityPolicy,
) -> Result<ParsedWorkbook, ParseFailure> {
    parse_with(&WorkbookParser, file, policy)
}

/// 任意のパーサー実装でワークブックを解析
///
/// ゲートで拒否された場合、`parser`は呼び出されません。
pub fn parse_with(
    parser: &dyn ContainerParser,
    file: &RawFile,
    policy: &SecurityPolicy,
) -> Result<ParsedWorkbook, ParseFailure> {
    let result = security::validate(file, policy)
        .map_err(ParseFailure::from)
        .and_then(|()| {
            log::info!(
                target: LOG_TARGET,
                "FILE_UPLOAD file_name={} file_size={}",
                file.name(),
                file.size()
            );
            parser.parse(file, policy)
        });

    match &result {
        Ok(workbook) => log::info!(
            target: LOG_TARGET,
            "FILE_PARSED file_name={} sheet_count={} parse_time_ms={}",
            file.name(),
            workbook.metadata.sheet_count,
            workbook.metadata.parse_duration_ms
        ),
        Err(err) => log::info!(
            target: LOG_TARGET,
            "PARSE_ERROR file_name={} code={} error={}",
            file.name(),
            err.code(),
            err
        ),
    }

    result
}
