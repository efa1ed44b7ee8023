//! Progress Module
//!
//! 進捗通知のオブザーバーと、協調的キャンセルのためのトークンを定義するモジュール。
//!
//! キャンセルには`tokio_util`の[`CancellationToken`]を使用します。
//! `cancel()`と`is_cancelled()`は同期的に動作し、非同期ランタイムを必要としません。

pub use tokio_util::sync::CancellationToken;

/// 進捗通知を受け取るオブザーバー
///
/// 処理スレッドから呼び出されるため、`Send + Sync`である必要があり、
/// パイプラインをブロックしてはいけません。
///
/// クロージャ`Fn(f64, &str)`はそのまま`ProgressSink`として使用できます。
///
/// ```rust
/// use xlsxdeck::ProgressSink;
///
/// let sink = |percent: f64, message: &str| println!("{:>5.1}% {}", percent, message);
/// sink.report(50.0, "Halfway");
/// ```
pub trait ProgressSink: Send + Sync {
    /// 進捗を通知
    ///
    /// # 引数
    ///
    /// * `percent` - 0〜100の進捗率
    /// * `message` - 人間が読める説明
    fn report(&self, percent: f64, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(f64, &str) + Send + Sync,
{
    fn report(&self, percent: f64, message: &str) {
        self(percent, message)
    }
}

/// 何もしない`ProgressSink`
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: f64, _message: &str) {}
}
