//! Metrics Module
//!
//! 解析済みシートから代表的な財務指標を抽出するモジュール。
//!
//! 抽出はベストエフォートのヒューリスティックであり、網羅性は保証しません。
//! 判定ロジックは[`MetricHeuristic`]として差し替え可能です。

use crate::types::{CellValue, MetricKey, MetricsMap, ParsedWorkbook};

/// 指標抽出の判定戦略
pub trait MetricHeuristic: Send + Sync {
    /// 指標を探索する対象のシートかどうか
    fn is_metric_sheet(&self, sheet_name: &str) -> bool;

    /// 小文字化済みのラベルを指標キーに分類
    fn classify_label(&self, label: &str) -> Option<MetricKey>;

    /// シートごとに探索する最大行数
    fn scan_limit(&self) -> usize {
        100
    }
}

/// キーワードの部分一致による既定の判定戦略
///
/// - シート名に`valuation`、`summary`、`dcf`のいずれかを含むシートを対象とする
/// - ラベルの判定は`enterprise`+`value`、`equity`+`value`、`irr`、
///   `multiple`/`moic`の順に行い、最初に一致したものを採用する
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordHeuristic;

impl MetricHeuristic for KeywordHeuristic {
    fn is_metric_sheet(&self, sheet_name: &str) -> bool {
        let lower = sheet_name.to_lowercase();
        ["valuation", "summary", "dcf"]
            .iter()
            .any(|pattern| lower.contains(pattern))
    }

    fn classify_label(&self, label: &str) -> Option<MetricKey> {
        if label.contains("enterprise") && label.contains("value") {
            Some(MetricKey::EnterpriseValue)
        } else if label.contains("equity") && label.contains("value") {
            Some(MetricKey::EquityValue)
        } else if label.contains("irr") {
            Some(MetricKey::Irr)
        } else if label.contains("multiple") || label.contains("moic") {
            Some(MetricKey::Multiple)
        } else {
            None
        }
    }
}

/// 既定の判定戦略で財務指標を抽出
///
/// 失敗することはありません。見つからない指標はマップに含まれません。
pub fn extract(workbook: &ParsedWorkbook) -> MetricsMap {
    extract_with(workbook, &KeywordHeuristic)
}

/// 指定した判定戦略で財務指標を抽出
///
/// 同じキーが複数回見つかった場合は最後に見つかった値を採用します。
///
/// # 引数
///
/// * `workbook` - 解析済みワークブック
/// * `heuristic` - シートとラベルの判定戦略
pub fn extract_with(workbook: &ParsedWorkbook, heuristic: &dyn MetricHeuristic) -> MetricsMap {
    let mut metrics = MetricsMap::new();

    for sheet in workbook
        .sheets
        .iter()
        .filter(|sheet| heuristic.is_metric_sheet(&sheet.name))
    {
        for row in sheet.rows.iter().take(heuristic.scan_limit()) {
            if row.len() < 2 {
                continue;
            }
            let Some(value) = row[1].as_number() else {
                continue;
            };
            let label = label_text(&row[0]);
            if let Some(key) = heuristic.classify_label(&label) {
                log::debug!("Found {} on sheet '{}'", key.as_str(), sheet.name);
                metrics.insert(key, value);
            }
        }
    }

    metrics
}

fn label_text(cell: &CellValue) -> String {
    cell.to_string().to_lowercase()
}
