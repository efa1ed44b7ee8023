//! Public API Types
//!
//! 公開APIで使用する設定型を定義するモジュール。
//!
//! すべての設定型はドキュメント化されたデフォルト値を持ち、
//! 呼び出し側は必要なフィールドのみを上書きできます。

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// XLSX（Office Open XML）のMIMEタイプ
pub const XLSX_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// 旧Excel形式のMIMEタイプ
pub const XLS_MIME_TYPE: &str = "application/vnd.ms-excel";

/// セキュリティポリシー
///
/// セキュリティゲートとコンテナパーサーが適用する制限を定義します。
///
/// # デフォルト値
///
/// - 最大ファイルサイズ: 100 MiB
/// - 最大行数（全シート合計）: 50,000
/// - シート数の警告しきい値: 20
/// - 許可されるMIMEタイプ: XLSX / XLS
/// - ZIPアーカイブ内の最大エントリ数: 10,000
/// - 単一エントリの最大展開サイズ: 100 MiB
/// - 展開後の合計最大サイズ: 1 GiB
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPolicy {
    /// 入力ファイルの最大サイズ（バイト）
    pub max_file_size: u64,
    /// 全シート合計の最大行数
    pub max_rows: usize,
    /// これを超えるシート数で警告を出す（エラーにはならない）
    pub max_sheets: usize,
    /// 許可されるMIMEタイプ
    pub allowed_types: Vec<String>,
    /// ZIPアーカイブ内の最大エントリ数
    pub max_archive_entries: usize,
    /// 単一エントリの最大展開サイズ（バイト）
    pub max_entry_size: u64,
    /// 展開後の合計最大サイズ（バイト）
    pub max_decompressed_size: u64,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            max_file_size: 100 * 1024 * 1024, // 100MB
            max_rows: 50_000,
            max_sheets: 20,
            allowed_types: vec![XLSX_MIME_TYPE.to_string(), XLS_MIME_TYPE.to_string()],
            max_archive_entries: 10_000,
            max_entry_size: 104_857_600,         // 100MB
            max_decompressed_size: 1_073_741_824, // 1GB
        }
    }
}

impl SecurityPolicy {
    /// 設定値を検証
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.max_file_size == 0 {
            return Err("max_file_size must be greater than 0".to_string());
        }
        if self.max_rows == 0 {
            return Err("max_rows must be greater than 0".to_string());
        }
        if self.allowed_types.is_empty() {
            return Err("allowed_types must not be empty".to_string());
        }
        if self.max_archive_entries == 0 {
            return Err("max_archive_entries must be greater than 0".to_string());
        }
        if self.max_entry_size > self.max_decompressed_size {
            return Err(format!(
                "max_entry_size ({}) exceeds max_decompressed_size ({})",
                self.max_entry_size, self.max_decompressed_size
            ));
        }
        Ok(())
    }
}

/// デッキのテーマ
///
/// マスタースライド（ヘッダー/フッター帯、フッター文字列）と
/// 表・グラフの配色に使用されます。色は`#`なしの6桁の16進数で保持します。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub company_name: String,
    pub primary_color: String,
    pub secondary_color: String,
    pub accent_color: String,
    pub font_family: String,
    /// ロゴ画像のURL
    ///
    /// ネットワークアクセスを行わないため、現在はスライドに描画されません。
    pub logo_url: Option<String>,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            company_name: "Financial Analysis".to_string(),
            primary_color: "1F4E79".to_string(),
            secondary_color: "2E75B6".to_string(),
            accent_color: "C9A227".to_string(),
            font_family: "Calibri".to_string(),
            logo_url: None,
        }
    }
}

impl Theme {
    /// 上書き設定をフィールド単位でマージした新しいテーマを返す
    ///
    /// # 引数
    ///
    /// * `overrides` - 部分的な上書き設定（`None`のフィールドは現在の値を維持）
    ///
    /// # 戻り値
    ///
    /// * `Ok(Theme)` - マージ後のテーマ（色は正規化済み）
    /// * `Err(String)` - 色の形式が不正、または必須フィールドが空の場合
    pub fn merged(&self, overrides: &ThemeOverrides) -> Result<Theme, String> {
        let merged = Theme {
            company_name: overrides
                .company_name
                .clone()
                .unwrap_or_else(|| self.company_name.clone()),
            primary_color: overrides
                .primary_color
                .clone()
                .unwrap_or_else(|| self.primary_color.clone()),
            secondary_color: overrides
                .secondary_color
                .clone()
                .unwrap_or_else(|| self.secondary_color.clone()),
            accent_color: overrides
                .accent_color
                .clone()
                .unwrap_or_else(|| self.accent_color.clone()),
            font_family: overrides
                .font_family
                .clone()
                .unwrap_or_else(|| self.font_family.clone()),
            logo_url: overrides.logo_url.clone().or_else(|| self.logo_url.clone()),
        };
        merged.normalized()
    }

    /// 色を正規化し、設定値を検証したテーマを返す
    pub fn normalized(&self) -> Result<Theme, String> {
        if self.company_name.trim().is_empty() {
            return Err("Theme companyName must not be empty".to_string());
        }
        if self.font_family.trim().is_empty() {
            return Err("Theme fontFamily must not be empty".to_string());
        }
        Ok(Theme {
            company_name: self.company_name.clone(),
            primary_color: normalize_color("primaryColor", &self.primary_color)?,
            secondary_color: normalize_color("secondaryColor", &self.secondary_color)?,
            accent_color: normalize_color("accentColor", &self.accent_color)?,
            font_family: self.font_family.clone(),
            logo_url: self.logo_url.clone(),
        })
    }
}

/// テーマの部分的な上書き設定
///
/// 認識されないフィールドはデシリアライズ時にエラーになります。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ThemeOverrides {
    pub company_name: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub accent_color: Option<String>,
    pub font_family: Option<String>,
    pub logo_url: Option<String>,
}

/// 色文字列を`RRGGBB`（大文字）に正規化
///
/// 先頭の`#`は許容されます。
fn normalize_color(field: &str, value: &str) -> Result<String, String> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!(
            "Theme {} must be a 6-digit hex color, got '{}'",
            field, value
        ));
    }
    Ok(hex.to_ascii_uppercase())
}

/// スライド生成のオプション
///
/// # デフォルト値
///
/// - 1スライドあたりの最大データ行数: 50
/// - グラフの最大系列数: 4
/// - 複合グラフ（面 + 折れ線）: 無効
/// - ドーナツグラフ: 無効
/// - 圧縮のタイムアウト: 5秒
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOptions {
    /// ヘッダー行を除く、1スライドあたりの最大データ行数
    pub max_rows_per_slide: usize,
    /// 棒グラフに含める数値列の最大数
    pub max_chart_series: usize,
    /// 最初の系列から複合グラフを追加するか
    pub include_combo_charts: bool,
    /// 最初の2列からドーナツグラフを追加するか
    pub include_pie_charts: bool,
    /// 圧縮ありのシリアライズがこれを超えた場合、非圧縮で再試行する
    pub compression_timeout: Duration,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            max_rows_per_slide: 50,
            max_chart_series: 4,
            include_combo_charts: false,
            include_pie_charts: false,
            compression_timeout: Duration::from_secs(5),
        }
    }
}

impl SynthesisOptions {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.max_rows_per_slide == 0 {
            return Err("max_rows_per_slide must be greater than 0".to_string());
        }
        if self.max_chart_series == 0 {
            return Err("max_chart_series must be greater than 0".to_string());
        }
        Ok(())
    }
}
