//! Workbook Parser Module
//!
//! calamineを使用したXLSXコンテナの解析。
//! 各シートを0始まりの行優先マトリクスに変換し、サニタイズと行数上限を適用します。

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use chrono::Utc;
use std::collections::BTreeMap;
use std::io::Cursor;

use crate::api::SecurityPolicy;
use crate::error::ParseFailure;
use crate::parser::archive;
use crate::sanitize::sanitize;
use crate::security::LOG_TARGET;
use crate::types::{CellValue, ParsedWorkbook, Row, Sheet, ValidationReport, WorkbookMetadata};

/// 財務モデルらしいシート名のパターン（大文字小文字を区別しない部分一致）
const FINANCIAL_SHEET_PATTERNS: [&str; 5] = ["dcf", "valuation", "model", "analysis", "comps"];

pub(crate) const NO_FINANCIAL_SHEETS_WARNING: &str =
    "No obvious financial model sheets detected. Ensure your model follows standard naming conventions.";
pub(crate) const MANY_SHEETS_WARNING: &str =
    "Large number of sheets detected. Consider consolidating for better performance.";
pub(crate) const MACROS_WARNING: &str = "Embedded macros were discarded";

/// コンテナパーサーのインターフェース
///
/// セキュリティゲートを通過したファイルを`ParsedWorkbook`に変換します。
/// 失敗はすべてその実行にとって終端的であり、部分的な結果は返しません。
pub trait ContainerParser: Send + Sync {
    /// ファイルを解析
    ///
    /// # 引数
    ///
    /// * `file` - セキュリティゲートを通過したファイル
    /// * `policy` - 行数上限やアーカイブ制限を含むポリシー
    fn parse(
        &self,
        file: &crate::types::RawFile,
        policy: &SecurityPolicy,
    ) -> Result<ParsedWorkbook, ParseFailure>;
}

/// calamineベースのXLSXパーサー
///
/// 数式は評価せず、キャッシュされた値のみを読み込みます。
/// VBAプロジェクトやActiveXパーツは検出のみ行い、内容は読み込みません。
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkbookParser;

impl ContainerParser for WorkbookParser {
    fn parse(
        &self,
        file: &crate::types::RawFile,
        policy: &SecurityPolicy,
    ) -> Result<ParsedWorkbook, ParseFailure> {
        let started = Utc::now();

        // 1. デコード前のアーカイブ検査（ZIP bomb、パストラバーサル、マクロ）
        let archive_report = archive::inspect(Cursor::new(file.bytes()), policy)?;
        if archive_report.has_macros() {
            log::info!(
                target: LOG_TARGET,
                "MACROS_STRIPPED file_name={} parts={}",
                file.name(),
                archive_report.macro_parts.len()
            );
        }

        // 2. calamineでワークブックを開く
        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(file.bytes()))?;
        let sheet_names = workbook.sheet_names().to_vec();

        // 3. 各シートを行優先マトリクスに変換（行数上限で即時中断）
        let mut sheets = Vec::with_capacity(sheet_names.len());
        let mut total_rows = 0usize;
        for sheet_name in &sheet_names {
            let range = workbook.worksheet_range(sheet_name)?;
            let rows = collect_rows(range.rows(), &mut total_rows, policy.max_rows)?;
            let rows = sanitize(&rows)
                .map_err(|e| {
                    ParseFailure::MalformedContainer(format!(
                        "Failed to sanitize sheet '{}': {}",
                        sheet_name, e
                    ))
                })?
                .value;
            log::debug!("Decoded sheet '{}' ({} rows)", sheet_name, rows.len());
            sheets.push(Sheet::new(sheet_name.clone(), rows));
        }

        // 4. 名前付き範囲（参照文字列は評価しない）
        let raw_names: BTreeMap<String, String> = workbook
            .defined_names()
            .iter()
            .map(|(name, reference)| (name.clone(), reference.clone()))
            .collect();
        let named = sanitize(&raw_names).map_err(|e| {
            ParseFailure::MalformedContainer(format!("Failed to sanitize named ranges: {}", e))
        })?;

        // 5. 検証サマリー
        let found_sheets: Vec<String> = sheets.iter().map(|sheet| sheet.name.clone()).collect();
        let mut warnings = heuristic_warnings(&found_sheets, policy.max_sheets);
        for key in &named.removed_keys {
            warnings.push(format!("Named range '{}' was discarded", key));
        }
        if archive_report.has_macros() {
            warnings.push(MACROS_WARNING.to_string());
        }

        let parse_duration_ms = (Utc::now() - started).num_milliseconds().max(0) as u64;

        Ok(ParsedWorkbook {
            metadata: WorkbookMetadata {
                file_name: file.name().to_string(),
                file_size: file.size(),
                sheet_count: sheets.len(),
                total_row_count: total_rows,
                parse_duration_ms,
            },
            validation: ValidationReport {
                is_valid: true,
                found_named_ranges: named.value.keys().cloned().collect(),
                found_sheets,
                missing_elements: Vec::new(),
                warnings,
                macros_stripped: archive_report.has_macros(),
            },
            named_ranges: named.value,
            sheets,
        })
    }
}

/// calamineの行イテレーターから行データを生成
///
/// 末尾の空行は除去し、途中の空行はnullの行として保持します。
/// 保持した行数を`total_rows`に加算し、上限を超えた時点でエラーを返します。
fn collect_rows<'a, I>(
    source: I,
    total_rows: &mut usize,
    max_rows: usize,
) -> Result<Vec<Row>, ParseFailure>
where
    I: Iterator<Item = &'a [Data]>,
{
    let mut rows = Vec::new();
    let mut pending_blank = 0usize;

    for cells in source {
        let row: Row = cells.iter().map(to_cell_value).collect();
        if row.iter().all(CellValue::is_null) {
            pending_blank += 1;
            continue;
        }

        *total_rows += pending_blank + 1;
        if *total_rows > max_rows {
            return Err(ParseFailure::TooManyRows { limit: max_rows });
        }

        let width = row.len();
        rows.extend((0..pending_blank).map(|_| vec![CellValue::Null; width]));
        pending_blank = 0;
        rows.push(row);
    }

    Ok(rows)
}

/// calamineのセル値を変換
fn to_cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::String(s.clone()),
        Data::Bool(b) => CellValue::String(if *b { "TRUE" } else { "FALSE" }.to_string()),
        // 日付はシリアル値として扱う
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::String(e.to_string()),
        Data::Empty => CellValue::Null,
    }
}

/// シート名に基づくヒューリスティックな警告を生成
fn heuristic_warnings(sheet_names: &[String], max_sheets: usize) -> Vec<String> {
    let mut warnings = Vec::new();

    let has_financial_sheet = sheet_names.iter().any(|name| {
        let lower = name.to_lowercase();
        FINANCIAL_SHEET_PATTERNS
            .iter()
            .any(|pattern| lower.contains(pattern))
    });
    if !has_financial_sheet {
        warnings.push(NO_FINANCIAL_SHEETS_WARNING.to_string());
    }

    if sheet_names.len() > max_sheets {
        warnings.push(MANY_SHEETS_WARNING.to_string());
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_to_cell_value_mapping() {
        assert_eq!(to_cell_value(&Data::Int(7)), CellValue::Number(7.0));
        assert_eq!(to_cell_value(&Data::Float(1.5)), CellValue::Number(1.5));
        assert_eq!(
            to_cell_value(&Data::Bool(true)),
            CellValue::String("TRUE".to_string())
        );
        assert_eq!(
            to_cell_value(&Data::Error(calamine::CellErrorType::Div0)),
            CellValue::String("#DIV/0!".to_string())
        );
        assert_eq!(to_cell_value(&Data::Empty), CellValue::Null);
    }

    #[test]
    fn test_collect_rows_drops_only_trailing_blank_rows() {
        let data = vec![
            vec![Data::String("Year".into()), Data::String("Revenue".into())],
            vec![Data::Empty, Data::Empty],
            vec![Data::Int(2023), Data::Float(100.0)],
            vec![Data::Empty, Data::Empty],
            vec![Data::Empty, Data::Empty],
        ];
        let mut total = 0;
        let rows = collect_rows(data.iter().map(|r| r.as_slice()), &mut total, 100).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(total, 3);
        assert_eq!(rows[1], vec![CellValue::Null, CellValue::Null]);
        assert_eq!(rows[2][0], CellValue::Number(2023.0));
    }

    #[test]
    fn test_collect_rows_fails_fast_on_row_cap() {
        let data: Vec<Vec<Data>> = (0..10).map(|i| vec![Data::Int(i)]).collect();
        let mut total = 5;
        let result = collect_rows(data.iter().map(|r| r.as_slice()), &mut total, 8);
        assert_eq!(result, Err(ParseFailure::TooManyRows { limit: 8 }));
        assert_eq!(total, 9);
    }

    #[test]
    fn test_heuristic_warnings_financial_pattern() {
        assert!(heuristic_warnings(&names(&["DCF_Summary"]), 20).is_empty());
        assert!(heuristic_warnings(&names(&["Trading Comps"]), 20).is_empty());
        assert_eq!(
            heuristic_warnings(&names(&["Sheet1"]), 20),
            vec![NO_FINANCIAL_SHEETS_WARNING.to_string()]
        );
    }

    #[test]
    fn test_heuristic_warnings_sheet_count() {
        let many: Vec<String> = (0..21).map(|i| format!("Model {}", i)).collect();
        assert_eq!(
            heuristic_warnings(&many, 20),
            vec![MANY_SHEETS_WARNING.to_string()]
        );
        assert!(heuristic_warnings(&many[..20], 20).is_empty());
    }
}
