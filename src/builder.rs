//! Builder Module
//!
//! Fluent Builder APIを提供し、`Processor`インスタンスを段階的に構築する。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::api::{SecurityPolicy, SynthesisOptions, Theme, ThemeOverrides};
use crate::deck::{HeaderHeuristic, SheetClassifier};
use crate::error::PipelineError;
use crate::metrics::{KeywordHeuristic, MetricHeuristic};
use crate::parser::{ContainerParser, WorkbookParser};
use crate::pipeline::Processor;

/// 処理の設定を保持する内部構造体
#[derive(Clone)]
pub(crate) struct ProcessorConfig {
    /// セキュリティポリシー
    pub policy: SecurityPolicy,

    /// デッキのテーマ（正規化済み）
    pub theme: Theme,

    /// スライド生成のオプション
    pub options: SynthesisOptions,

    /// 指標抽出の判定戦略
    pub metric_heuristic: Arc<dyn MetricHeuristic>,

    /// シート分類の判定戦略
    pub sheet_classifier: Arc<dyn SheetClassifier>,

    /// コンテナパーサー
    pub container_parser: Arc<dyn ContainerParser>,

    /// ステップ間の待機時間
    pub step_pacing: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            policy: SecurityPolicy::default(),
            theme: Theme::default(),
            options: SynthesisOptions::default(),
            metric_heuristic: Arc::new(KeywordHeuristic),
            sheet_classifier: Arc::new(HeaderHeuristic),
            container_parser: Arc::new(WorkbookParser),
            step_pacing: Duration::ZERO,
        }
    }
}

impl fmt::Debug for ProcessorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorConfig")
            .field("policy", &self.policy)
            .field("theme", &self.theme)
            .field("options", &self.options)
            .field("step_pacing", &self.step_pacing)
            .finish_non_exhaustive()
    }
}

/// Fluent Builder APIを提供する構造体
///
/// `Processor`インスタンスを段階的に構築するためのビルダーです。
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxdeck::{ProcessorBuilder, SynthesisOptions, ThemeOverrides};
///
/// # fn main() -> Result<(), xlsxdeck::PipelineError> {
/// let processor = ProcessorBuilder::new()
///     .with_theme_overrides(ThemeOverrides {
///         company_name: Some("Acme Capital".to_string()),
///         primary_color: Some("#0B3D2E".to_string()),
///         ..ThemeOverrides::default()
///     })
///     .with_synthesis_options(SynthesisOptions {
///         include_combo_charts: true,
///         ..SynthesisOptions::default()
///     })
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ProcessorBuilder {
    /// 内部設定（構築中）
    config: ProcessorConfig,

    /// `build()`時にマージするテーマの上書き設定
    overrides: Vec<ThemeOverrides>,
}

impl ProcessorBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - セキュリティポリシー: 100MB、50,000行、20シートで警告
    /// - テーマ: `Financial Analysis`、ネイビー（`1F4E79`）基調、Calibri
    /// - 指標抽出: キーワードの部分一致
    /// - シート分類: ヘッダー行と数値セルによる判定
    /// - ステップ間の待機: なし
    pub fn new() -> Self {
        Self::default()
    }

    /// セキュリティポリシーを指定する
    pub fn with_security_policy(mut self, policy: SecurityPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    /// テーマ全体を置き換える
    ///
    /// それまでに指定した上書き設定は破棄されます。
    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.config.theme = theme;
        self.overrides.clear();
        self
    }

    /// テーマの一部を上書きする
    ///
    /// 複数回呼び出した場合は、指定した順にフィールド単位でマージされます。
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use xlsxdeck::{ProcessorBuilder, ThemeOverrides};
    ///
    /// let overrides: ThemeOverrides = serde_json::from_str(r#"{"companyName": "Acme"}"#).unwrap();
    /// let builder = ProcessorBuilder::new().with_theme_overrides(overrides);
    /// ```
    pub fn with_theme_overrides(mut self, overrides: ThemeOverrides) -> Self {
        self.overrides.push(overrides);
        self
    }

    /// スライド生成のオプションを指定する
    pub fn with_synthesis_options(mut self, options: SynthesisOptions) -> Self {
        self.config.options = options;
        self
    }

    /// 指標抽出の判定戦略を差し替える
    pub fn with_metric_heuristic(mut self, heuristic: Arc<dyn MetricHeuristic>) -> Self {
        self.config.metric_heuristic = heuristic;
        self
    }

    /// シート分類の判定戦略を差し替える
    pub fn with_sheet_classifier(mut self, classifier: Arc<dyn SheetClassifier>) -> Self {
        self.config.sheet_classifier = classifier;
        self
    }

    /// コンテナパーサーを差し替える
    ///
    /// セキュリティゲートは常にパーサーより先に実行されるため、
    /// 計測用のパーサーでゲートの動作を確認できます。
    pub fn with_container_parser(mut self, parser: Arc<dyn ContainerParser>) -> Self {
        self.config.container_parser = parser;
        self
    }

    /// アップロード後と完了前に挿入する待機時間を指定する
    ///
    /// 待機の前後でキャンセルが確認されます。
    /// `wasm32`ではスレッドをスリープできないため、0のままにしてください。
    pub fn with_step_pacing(mut self, pacing: Duration) -> Self {
        self.config.step_pacing = pacing;
        self
    }

    /// 設定を検証し、`Processor`インスタンスを生成する
    ///
    /// # 戻り値
    ///
    /// * `Ok(Processor)`: 設定が有効な場合
    /// * `Err(PipelineError::Config)`: 設定が無効な場合
    ///
    /// # 発生し得るエラー
    ///
    /// * `PipelineError::Config(String)`
    ///   * テーマの色が6桁の16進数でない、会社名やフォント名が空
    ///   * セキュリティポリシーの上限が0、許可するMIMEタイプが空
    ///   * 1スライドあたりの行数やグラフの系列数が0
    pub fn build(self) -> Result<Processor, PipelineError> {
        let mut config = self.config;

        // 1. テーマの上書きと正規化
        let mut theme = config.theme.normalized().map_err(PipelineError::Config)?;
        for overrides in &self.overrides {
            theme = theme.merged(overrides).map_err(PipelineError::Config)?;
        }
        config.theme = theme;

        // 2. セキュリティポリシーの検証
        config.policy.validate().map_err(PipelineError::Config)?;

        // 3. 生成オプションの検証
        config.options.validate().map_err(PipelineError::Config)?;

        // 4. Processorインスタンス生成
        Ok(Processor::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_with_defaults() {
        let builder = ProcessorBuilder::new();
        assert_eq!(builder.config.theme, Theme::default());
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_theme_overrides_are_merged_in_order() {
        let builder = ProcessorBuilder::new()
            .with_theme_overrides(ThemeOverrides {
                company_name: Some("First".to_string()),
                accent_color: Some("#abcdef".to_string()),
                ..ThemeOverrides::default()
            })
            .with_theme_overrides(ThemeOverrides {
                company_name: Some("Second".to_string()),
                ..ThemeOverrides::default()
            });

        let mut config = builder.config.clone();
        for overrides in &builder.overrides {
            config.theme = config.theme.merged(overrides).unwrap();
        }
        assert_eq!(config.theme.company_name, "Second");
        assert_eq!(config.theme.accent_color, "ABCDEF");
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_with_theme_discards_earlier_overrides() {
        let builder = ProcessorBuilder::new()
            .with_theme_overrides(ThemeOverrides {
                primary_color: Some("not-a-color".to_string()),
                ..ThemeOverrides::default()
            })
            .with_theme(Theme::default());
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_build_rejects_invalid_color() {
        let result = ProcessorBuilder::new()
            .with_theme_overrides(ThemeOverrides {
                primary_color: Some("blue".to_string()),
                ..ThemeOverrides::default()
            })
            .build();
        match result {
            Err(PipelineError::Config(msg)) => assert!(msg.contains("primaryColor")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_build_rejects_zero_rows_per_slide() {
        let result = ProcessorBuilder::new()
            .with_synthesis_options(SynthesisOptions {
                max_rows_per_slide: 0,
                ..SynthesisOptions::default()
            })
            .build();
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_build_rejects_empty_allow_list() {
        let result = ProcessorBuilder::new()
            .with_security_policy(SecurityPolicy {
                allowed_types: Vec::new(),
                ..SecurityPolicy::default()
            })
            .build();
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }
}
