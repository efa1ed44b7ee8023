//! Types Module
//!
//! パイプライン全体で使用する共通データ型を定義するモジュール。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// アップロードされたファイル
///
/// バイト列、宣言されたMIMEタイプ、宣言されたファイル名を保持します。
/// セキュリティゲートの検証を通過するまでは内容に触れてはいけません。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    name: String,
    media_type: String,
    bytes: Vec<u8>,
}

impl RawFile {
    /// 新しいファイルを生成
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// 宣言されたファイル名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 宣言されたMIMEタイプ
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// ファイルサイズ（バイト）
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// ファイル内容
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// セルの値
///
/// 文字列、数値、またはnullのいずれかです。欠損セルは常に`Null`になります。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// 数値（f64）
    Number(f64),

    /// 文字列
    String(String),

    /// 空セル
    Null,
}

impl CellValue {
    /// 値が空かどうかを判定
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// 有限の数値であればその値を返す
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    /// 文字列であればその値を返す
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => f.write_str(&format_number(*n)),
            CellValue::String(s) => f.write_str(s),
            CellValue::Null => Ok(()),
        }
    }
}

/// 数値を表示用の文字列に変換
///
/// 整数値は小数点なし、それ以外は小数第4位までに丸めて末尾の0を除去します。
pub(crate) fn format_number(n: f64) -> String {
    if !n.is_finite() {
        return String::new();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    let formatted = format!("{:.4}", n);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// 1行分のセル
pub type Row = Vec<CellValue>;

/// 1シート分のデータ（0始まりの行優先マトリクス）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    /// シート名
    pub name: String,
    /// 行データ（末尾の空行は除去済み）
    pub rows: Vec<Row>,
}

impl Sheet {
    /// 新しいシートを生成
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

/// ワークブックのメタデータ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbookMetadata {
    pub file_name: String,
    pub file_size: u64,
    pub sheet_count: usize,
    pub total_row_count: usize,
    pub parse_duration_ms: u64,
}

/// 解析結果の検証サマリー
///
/// ステータスバナー等の外部コラボレーターにそのまま渡されます。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub found_sheets: Vec<String>,
    pub found_named_ranges: Vec<String>,
    pub missing_elements: Vec<String>,
    pub warnings: Vec<String>,
    /// マクロを含むパーツが検出され、破棄されたかどうか
    pub macros_stripped: bool,
}

/// 解析済みワークブック
///
/// アップロードごとに一度だけ生成され、生成後は変更されません。
/// 1回の処理実行が終わると破棄されます。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedWorkbook {
    /// シート（ワークブック内の順序を保持）
    pub sheets: Vec<Sheet>,
    /// 名前付き範囲（名前 -> 未評価の参照文字列）
    pub named_ranges: BTreeMap<String, String>,
    pub metadata: WorkbookMetadata,
    pub validation: ValidationReport,
}

impl ParsedWorkbook {
    /// シート名でシートを検索
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }
}

/// 抽出対象の財務指標キー
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricKey {
    EnterpriseValue,
    EquityValue,
    Irr,
    Multiple,
}

impl MetricKey {
    /// 正規化されたキー名
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::EnterpriseValue => "enterpriseValue",
            MetricKey::EquityValue => "equityValue",
            MetricKey::Irr => "irr",
            MetricKey::Multiple => "multiple",
        }
    }

    /// スライド表示用のラベル
    pub fn label(&self) -> &'static str {
        match self {
            MetricKey::EnterpriseValue => "Enterprise Value",
            MetricKey::EquityValue => "Equity Value",
            MetricKey::Irr => "IRR",
            MetricKey::Multiple => "Multiple (MOIC)",
        }
    }
}

/// 財務指標のフラットなマップ
///
/// 実行ごとに再構築され、永続化されません。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricsMap(BTreeMap<MetricKey, f64>);

impl MetricsMap {
    /// 空のマップを生成
    pub fn new() -> Self {
        Self::default()
    }

    /// 値を記録（同じキーは後勝ち）
    pub fn insert(&mut self, key: MetricKey, value: f64) {
        self.0.insert(key, value);
    }

    pub fn get(&self, key: MetricKey) -> Option<f64> {
        self.0.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricKey, f64)> + '_ {
        self.0.iter().map(|(key, value)| (*key, *value))
    }
}

/// スライドの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlideKind {
    Title,
    Summary,
    Table,
    /// 棒グラフ
    Chart,
    /// 面グラフ + 折れ線の複合グラフ
    Combo,
    /// ドーナツグラフ
    Pie,
}

/// 生成されたスライドの概要
///
/// 1回の実行内で追記のみされ、生成後に変更されることはありません。
/// `id`は1から始まり、連続して増加します。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    pub id: u32,
    pub title: String,
    pub kind: SlideKind,
    /// プレビュー用の短い説明
    pub preview: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_as_number() {
        assert_eq!(CellValue::Number(1.5).as_number(), Some(1.5));
        assert_eq!(CellValue::Number(f64::NAN).as_number(), None);
        assert_eq!(CellValue::String("1".into()).as_number(), None);
        assert_eq!(CellValue::Null.as_number(), None);
    }

    #[test]
    fn test_cell_value_display() {
        assert_eq!(CellValue::Number(2023.0).to_string(), "2023");
        assert_eq!(CellValue::Number(0.125).to_string(), "0.125");
        assert_eq!(CellValue::Number(1.0 / 3.0).to_string(), "0.3333");
        assert_eq!(CellValue::String("Revenue".into()).to_string(), "Revenue");
        assert_eq!(CellValue::Null.to_string(), "");
    }

    #[test]
    fn test_cell_value_serde_shape() {
        let row = vec![
            CellValue::String("a".into()),
            CellValue::Number(2.0),
            CellValue::Null,
        ];
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"["a",2.0,null]"#);
        let back: Row = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn test_metrics_map_last_write_wins() {
        let mut metrics = MetricsMap::new();
        metrics.insert(MetricKey::Irr, 0.1);
        metrics.insert(MetricKey::Irr, 0.2);
        assert_eq!(metrics.get(MetricKey::Irr), Some(0.2));
        assert_eq!(metrics.len(), 1);
    }

    #[test]
    fn test_metrics_map_serializes_canonical_keys() {
        let mut metrics = MetricsMap::new();
        metrics.insert(MetricKey::EnterpriseValue, 125_000_000.0);
        let json = serde_json::to_string(&metrics).unwrap();
        assert_eq!(json, r#"{"enterpriseValue":125000000.0}"#);
    }

    #[test]
    fn test_raw_file_size() {
        let file = RawFile::new("model.xlsx", "text/plain", vec![0; 10]);
        assert_eq!(file.size(), 10);
        assert_eq!(file.name(), "model.xlsx");
    }
}
