//! Sheet Classification Module
//!
//! シートの形状（表・グラフ化可能）を判定し、グラフの系列データを組み立てるモジュール。
//!
//! 判定はベストエフォートのヒューリスティックであり、[`SheetClassifier`]として差し替え可能です。

use crate::types::{CellValue, Row};

/// シートの形状
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SheetShape {
    /// 表スライドを生成する
    pub tabular: bool,
    /// グラフスライドを生成する
    pub chartable: bool,
}

impl SheetShape {
    /// どちらの形状にも当てはまらない（スライドを生成しない）
    pub fn is_skipped(&self) -> bool {
        !self.tabular && !self.chartable
    }
}

/// シート分類の判定戦略
pub trait SheetClassifier: Send + Sync {
    /// 切り詰め済みの行（先頭はヘッダー行）から形状を判定
    fn classify(&self, rows: &[Row]) -> SheetShape;
}

/// ヘッダー行と数値セルに基づく既定の判定戦略
///
/// - 表: ヘッダー行のすべてのセルが文字列またはnull
/// - グラフ: 3行以上あり、ヘッダー以外の行に有限の数値セルがある
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderHeuristic;

impl SheetClassifier for HeaderHeuristic {
    fn classify(&self, rows: &[Row]) -> SheetShape {
        let Some(header) = rows.first() else {
            return SheetShape::default();
        };

        let tabular = header
            .iter()
            .all(|cell| matches!(cell, CellValue::String(_) | CellValue::Null));
        let chartable = rows.len() >= 3
            && rows[1..]
                .iter()
                .any(|row| row.iter().any(|cell| cell.as_number().is_some()));

        SheetShape { tabular, chartable }
    }
}

/// ヘッダー行と最大`max_data_rows`行のデータ行に切り詰める
pub(crate) fn truncate(rows: &[Row], max_data_rows: usize) -> &[Row] {
    let end = rows.len().min(max_data_rows.saturating_add(1));
    &rows[..end]
}

/// グラフの1系列
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub name: String,
    pub values: Vec<f64>,
}

/// グラフのカテゴリと系列
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChartData {
    pub categories: Vec<String>,
    pub series: Vec<ChartSeries>,
}

impl ChartData {
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// 棒グラフのデータを組み立てる
///
/// ラベル列（先頭列）以降で数値を含む列を系列とし、数値でないセルは0として扱います。
/// すべての値が0の系列を除外した上で、先頭から最大`max_series`系列を採用します。
///
/// # 引数
///
/// * `rows` - 切り詰め済みの行（先頭はヘッダー行）
/// * `max_series` - 系列の最大数
pub(crate) fn bar_chart_data(rows: &[Row], max_series: usize) -> ChartData {
    let Some((header, data)) = rows.split_first() else {
        return ChartData::default();
    };

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let series = (1..width)
        .filter(|&col| {
            data.iter()
                .any(|row| row.get(col).and_then(CellValue::as_number).is_some())
        })
        .map(|col| ChartSeries {
            name: series_name(header.get(col), col),
            values: data
                .iter()
                .map(|row| row.get(col).and_then(CellValue::as_number).unwrap_or(0.0))
                .collect(),
        })
        .filter(|series| series.values.iter().any(|value| *value != 0.0))
        .take(max_series)
        .collect();

    ChartData {
        categories: categories(data),
        series,
    }
}

/// 複合グラフ（面 + 折れ線）のデータを組み立てる
///
/// 棒グラフの最初の系列のみを使用します。
pub(crate) fn combo_chart_data(bar: &ChartData) -> ChartData {
    ChartData {
        categories: bar.categories.clone(),
        series: bar.series.iter().take(1).cloned().collect(),
    }
}

/// ドーナツグラフのデータを組み立てる
///
/// 先頭列をラベル、2列目を値とし、正の値を持つ行のみを使用します。
pub(crate) fn pie_chart_data(rows: &[Row]) -> ChartData {
    let Some((header, data)) = rows.split_first() else {
        return ChartData::default();
    };

    let mut categories = Vec::new();
    let mut values = Vec::new();
    for (index, row) in data.iter().enumerate() {
        let Some(value) = row.get(1).and_then(CellValue::as_number) else {
            continue;
        };
        if value > 0.0 {
            categories.push(category_label(row.first(), index));
            values.push(value);
        }
    }

    if values.is_empty() {
        return ChartData::default();
    }

    ChartData {
        categories,
        series: vec![ChartSeries {
            name: series_name(header.get(1), 1),
            values,
        }],
    }
}

fn categories(data: &[Row]) -> Vec<String> {
    data.iter()
        .enumerate()
        .map(|(index, row)| category_label(row.first(), index))
        .collect()
}

fn category_label(cell: Option<&CellValue>, index: usize) -> String {
    match cell.map(ToString::to_string) {
        Some(label) if !label.is_empty() => label,
        _ => format!("Row {}", index + 1),
    }
}

fn series_name(cell: Option<&CellValue>, col: usize) -> String {
    match cell.map(ToString::to_string) {
        Some(name) if !name.is_empty() => name,
        _ => format!("Series {}", col),
    }
}
