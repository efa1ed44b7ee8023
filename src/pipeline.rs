//! Pipeline Module
//!
//! アップロード、検証、抽出、生成、完了の5ステップを順に進める
//! 処理オーケストレーター（有限状態機械）を提供するモジュール。
//!
//! 各ステップは`pending → processing → {completed | error}`と前方にのみ遷移し、
//! 失敗したステップが実行内で再試行されることはありません。

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::api::ThemeOverrides;
use crate::builder::ProcessorConfig;
use crate::deck::Synthesizer;
use crate::error::{GenerationFailure, PipelineError};
use crate::metrics::extract_with;
use crate::parser::parse_with;
use crate::progress::{CancellationToken, ProgressSink};
use crate::types::{MetricsMap, RawFile, Slide, ValidationReport, WorkbookMetadata};

/// 処理ステップの識別子（固定順）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepId {
    Upload,
    Validation,
    Extraction,
    Generation,
    Complete,
}

impl StepId {
    /// すべてのステップ（実行順）
    pub const ALL: [StepId; 5] = [
        StepId::Upload,
        StepId::Validation,
        StepId::Extraction,
        StepId::Generation,
        StepId::Complete,
    ];

    /// 表示名
    pub fn name(&self) -> &'static str {
        match self {
            StepId::Upload => "File Upload",
            StepId::Validation => "Security Validation",
            StepId::Extraction => "Data Extraction",
            StepId::Generation => "Slide Generation",
            StepId::Complete => "Presentation Ready",
        }
    }

    fn index(&self) -> usize {
        match self {
            StepId::Upload => 0,
            StepId::Validation => 1,
            StepId::Extraction => 2,
            StepId::Generation => 3,
            StepId::Complete => 4,
        }
    }

    /// このステップが受け持つ進捗範囲の開始位置（各ステップ20%）
    fn base_progress(&self) -> f64 {
        self.index() as f64 * STEP_WEIGHT
    }
}

const STEP_WEIGHT: f64 = 100.0 / StepId::ALL.len() as f64;

/// ステップの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

/// 処理ステップ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStep {
    pub id: StepId,
    pub name: String,
    pub status: StepStatus,
    pub message: Option<String>,
}

impl ProcessingStep {
    fn pending(id: StepId) -> Self {
        Self {
            id,
            name: id.name().to_string(),
            status: StepStatus::Pending,
            message: None,
        }
    }
}

/// アップロード中のファイルがどのマイルストーンを通過したか
///
/// ファイルが処理対象である間だけ存在し、新しい実行の開始時に作り直されます。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingSession {
    pub file_name: String,
    pub completed: bool,
    pub has_validation: bool,
    pub has_generation: bool,
}

/// 成功した実行の結果
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingReport {
    /// スライドの概要（プレビュー用）
    pub slides: Vec<Slide>,
    /// PPTXコンテナのバイト列
    pub document: Vec<u8>,
    /// 検証サマリー（ステータスバナー用）
    pub validation: ValidationReport,
    pub metrics: MetricsMap,
    pub metadata: WorkbookMetadata,
}

/// 失敗した実行の結果
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingFailure {
    /// 失敗したステップ
    pub step: StepId,
    /// 型付きのエラー
    pub error: PipelineError,
    /// 人間が読めるメッセージ（ステップのメッセージと同じ）
    pub message: String,
}

/// 1回の実行の終端結果
///
/// キャンセルは失敗とは区別されます。
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingOutcome {
    Completed(ProcessingReport),
    Failed(ProcessingFailure),
    Cancelled,
}

impl ProcessingOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ProcessingOutcome::Completed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProcessingOutcome::Cancelled)
    }

    pub fn report(&self) -> Option<&ProcessingReport> {
        match self {
            ProcessingOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&ProcessingFailure> {
        match self {
            ProcessingOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct ProcessingState {
    steps: Vec<ProcessingStep>,
    progress: f64,
    session: Option<ProcessingSession>,
    is_processing: bool,
}

impl Default for ProcessingState {
    fn default() -> Self {
        Self {
            steps: StepId::ALL.iter().copied().map(ProcessingStep::pending).collect(),
            progress: 0.0,
            session: None,
            is_processing: false,
        }
    }
}

/// 実行の中断理由
enum Halt {
    Cancelled,
    Failed(StepId, PipelineError),
}

/// 現在の実行をキャンセルするためのハンドル
///
/// 別スレッドに渡すことができます。キャンセルされるのはその時点で
/// 実行中（または直近）の実行のみで、後から開始された実行には影響しません。
#[derive(Debug, Clone)]
pub struct CancelHandle {
    current: Arc<Mutex<CancellationToken>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        lock(&self.current).cancel();
    }
}

/// 処理オーケストレーター
///
/// `ProcessorBuilder`で構築します。同じ`Processor`で複数の実行を並行させることは
/// 想定していません（ファイルごとに別の`Processor`を使用してください）。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxdeck::{ProcessingOutcome, ProcessorBuilder, RawFile, XLSX_MIME_TYPE};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let processor = ProcessorBuilder::new().build()?;
/// let bytes = std::fs::read("model.xlsx")?;
/// let file = RawFile::new("model.xlsx", XLSX_MIME_TYPE, bytes);
///
/// let progress = |percent: f64, message: &str| println!("{:>3.0}% {}", percent, message);
/// match processor.process(file, None, &progress) {
///     ProcessingOutcome::Completed(report) => std::fs::write("model.pptx", &report.document)?,
///     ProcessingOutcome::Failed(failure) => eprintln!("{}", failure.message),
///     ProcessingOutcome::Cancelled => {}
/// }
/// # Ok(())
/// # }
/// ```
pub struct Processor {
    config: ProcessorConfig,
    state: Mutex<ProcessingState>,
    current: Arc<Mutex<CancellationToken>>,
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("config", &self.config)
            .field("state", &*lock(&self.state))
            .finish_non_exhaustive()
    }
}

impl Processor {
    pub(crate) fn new(config: ProcessorConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ProcessingState::default()),
            current: Arc::new(Mutex::new(CancellationToken::new())),
        }
    }

    /// ファイルを処理してデッキを生成
    ///
    /// エラーがこのメソッドの外に漏れることはなく、すべての失敗は
    /// `ProcessingOutcome::Failed`として返されます。
    ///
    /// # 引数
    ///
    /// * `file` - アップロードされたファイル
    /// * `theme_overrides` - この実行でのみ適用するテーマの上書き設定
    /// * `progress` - 0〜100の単調非減少な進捗を受け取るシンク
    pub fn process(
        &self,
        file: RawFile,
        theme_overrides: Option<&ThemeOverrides>,
        progress: &dyn ProgressSink,
    ) -> ProcessingOutcome {
        let token = self.start_run(file.name());
        let run = Run {
            processor: self,
            progress,
            token,
        };

        match self.execute(&run, &file, theme_overrides) {
            Ok(report) => {
                let mut state = lock(&self.state);
                state.is_processing = false;
                if let Some(session) = state.session.as_mut() {
                    session.completed = true;
                }
                ProcessingOutcome::Completed(report)
            }
            Err(Halt::Cancelled) => {
                log::debug!("Processing of '{}' was cancelled", file.name());
                lock(&self.state).is_processing = false;
                ProcessingOutcome::Cancelled
            }
            Err(Halt::Failed(step, error)) => {
                let message = failure_message(step, &error);
                log::debug!("Step {:?} failed ({})", step, error.code());
                run.set_step(step, StepStatus::Error, Some(message.clone()));
                lock(&self.state).is_processing = false;
                ProcessingOutcome::Failed(ProcessingFailure {
                    step,
                    error,
                    message,
                })
            }
        }
    }

    /// 現在の実行にキャンセルを要求
    pub fn cancel(&self) {
        lock(&self.current).cancel();
    }

    /// 別スレッドからキャンセルするためのハンドルを取得
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            current: Arc::clone(&self.current),
        }
    }

    /// 実行中の処理をキャンセルし、ステップ・進捗・セッションを初期状態に戻す
    pub fn reset(&self) {
        self.cancel();
        *lock(&self.state) = ProcessingState::default();
    }

    /// ステップの状態（固定順）
    pub fn steps(&self) -> Vec<ProcessingStep> {
        lock(&self.state).steps.clone()
    }

    /// 全体の進捗（0〜100）
    pub fn progress(&self) -> f64 {
        lock(&self.state).progress
    }

    /// 現在のセッション
    pub fn session(&self) -> Option<ProcessingSession> {
        lock(&self.state).session.clone()
    }

    pub fn is_processing(&self) -> bool {
        lock(&self.state).is_processing
    }

    /// 状態を初期化し、新しいキャンセルトークンを発行
    fn start_run(&self, file_name: &str) -> CancellationToken {
        let token = CancellationToken::new();
        *lock(&self.current) = token.clone();

        let mut state = lock(&self.state);
        *state = ProcessingState {
            session: Some(ProcessingSession {
                file_name: file_name.to_string(),
                completed: false,
                has_validation: false,
                has_generation: false,
            }),
            is_processing: true,
            ..ProcessingState::default()
        };
        token
    }

    fn execute(
        &self,
        run: &Run<'_>,
        file: &RawFile,
        theme_overrides: Option<&ThemeOverrides>,
    ) -> Result<ProcessingReport, Halt> {
        // 1. アップロード
        run.check()?;
        run.begin(StepId::Upload);
        run.report(StepId::Upload.base_progress() + STEP_WEIGHT / 2.0, "Uploading file");
        run.pause()?;
        run.complete(StepId::Upload, "File uploaded successfully".to_string());

        // 2. セキュリティ検証と解析
        run.begin(StepId::Validation);
        let workbook = parse_with(
            self.config.container_parser.as_ref(),
            file,
            &self.config.policy,
        )
        .map_err(|e| Halt::Failed(StepId::Validation, e.into()))?;
        run.check()?;
        let message = if workbook.validation.macros_stripped {
            format!("Validated {} sheets, macros stripped", workbook.metadata.sheet_count)
        } else {
            format!("Validated {} sheets", workbook.metadata.sheet_count)
        };
        run.complete(StepId::Validation, message);
        run.update_session(|session| session.has_validation = true);

        // 3. 指標抽出
        run.begin(StepId::Extraction);
        let metrics = extract_with(&workbook, self.config.metric_heuristic.as_ref());
        run.check()?;
        run.complete(
            StepId::Extraction,
            "Financial metrics and data extracted".to_string(),
        );

        // 4. スライド生成
        run.begin(StepId::Generation);
        run.check()?;
        let theme = match theme_overrides {
            Some(overrides) => self
                .config
                .theme
                .merged(overrides)
                .map_err(|e| Halt::Failed(StepId::Generation, PipelineError::Config(e)))?,
            None => self.config.theme.clone(),
        };
        let base = StepId::Generation.base_progress();
        let generation_progress = |percent: f64, message: &str| {
            run.report(base + percent.clamp(0.0, 100.0) / 100.0 * STEP_WEIGHT, message);
            run.set_step(StepId::Generation, StepStatus::Processing, Some(message.to_string()));
        };
        let deck = Synthesizer::new(&theme)
            .with_options(self.config.options.clone())
            .with_classifier(self.config.sheet_classifier.as_ref())
            .synthesize(&workbook, &metrics, &generation_progress, &run.token)
            .map_err(|e| match e {
                GenerationFailure::Cancelled => Halt::Cancelled,
                other => Halt::Failed(StepId::Generation, other.into()),
            })?;
        run.check()?;
        run.complete(
            StepId::Generation,
            format!("Generated {} slides", deck.slides.len()),
        );
        run.update_session(|session| session.has_generation = true);

        // 5. 完了
        run.begin(StepId::Complete);
        run.pause()?;
        run.complete(StepId::Complete, "Ready for download".to_string());

        Ok(ProcessingReport {
            slides: deck.slides,
            document: deck.document,
            validation: workbook.validation,
            metrics,
            metadata: workbook.metadata,
        })
    }
}

/// 1回の実行の文脈
struct Run<'p> {
    processor: &'p Processor,
    progress: &'p dyn ProgressSink,
    token: CancellationToken,
}

impl Run<'_> {
    fn check(&self) -> Result<(), Halt> {
        if self.token.is_cancelled() {
            Err(Halt::Cancelled)
        } else {
            Ok(())
        }
    }

    /// ステップ間の待機（前後でキャンセルを確認）
    fn pause(&self) -> Result<(), Halt> {
        self.check()?;
        let pacing = self.processor.config.step_pacing;
        if !pacing.is_zero() {
            std::thread::sleep(pacing);
        }
        self.check()
    }

    fn begin(&self, step: StepId) {
        log::debug!("Step {:?} started", step);
        self.set_step(step, StepStatus::Processing, None);
    }

    fn complete(&self, step: StepId, message: String) {
        log::debug!("Step {:?} completed: {}", step, message);
        let percent = step.base_progress() + STEP_WEIGHT;
        self.set_step(step, StepStatus::Completed, Some(message.clone()));
        self.report(percent, &message);
    }

    fn set_step(&self, step: StepId, status: StepStatus, message: Option<String>) {
        let mut state = lock(&self.processor.state);
        if let Some(entry) = state.steps.get_mut(step.index()) {
            entry.status = status;
            entry.message = message;
        }
    }

    fn update_session(&self, update: impl FnOnce(&mut ProcessingSession)) {
        if let Some(session) = lock(&self.processor.state).session.as_mut() {
            update(session);
        }
    }

    /// 進捗を通知（後退する値は現在値に切り上げる）
    fn report(&self, percent: f64, message: &str) {
        let percent = {
            let mut state = lock(&self.processor.state);
            let percent = percent.clamp(0.0, 100.0).max(state.progress);
            state.progress = percent;
            percent
        };
        self.progress.report(percent, message);
    }
}

fn failure_message(step: StepId, error: &PipelineError) -> String {
    match (step, error) {
        (_, PipelineError::Security(violation)) => {
            format!("Security validation failed: {}", violation)
        }
        (StepId::Validation, other) => format!("File validation failed: {}", other),
        (StepId::Generation, other) => format!("Presentation generation failed: {}", other),
        (_, other) => other.to_string(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
