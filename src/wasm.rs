//! WASM Binding Module
//!
//! ブラウザ内でパイプラインを実行するための`wasm-bindgen`エントリーポイント。
//! ワークブックがサーバーに送信されることはありません。

use wasm_bindgen::prelude::*;

use crate::api::ThemeOverrides;
use crate::builder::ProcessorBuilder;
use crate::pipeline::ProcessingOutcome;
use crate::progress::NoProgress;
use crate::types::RawFile;

/// ワークブックをPPTXに変換
///
/// # 引数
///
/// * `bytes` - アップロードされたファイルの内容
/// * `name` - 宣言されたファイル名
/// * `media_type` - 宣言されたMIMEタイプ
/// * `theme_json` - テーマの上書き設定（JSON、省略可）
///
/// # 戻り値
///
/// * `Ok(Vec<u8>)` - PPTXのバイト列
/// * `Err(String)` - ユーザーに表示できるエラーメッセージ
#[wasm_bindgen]
pub fn convert_workbook(
    bytes: Vec<u8>,
    name: String,
    media_type: String,
    theme_json: Option<String>,
) -> Result<Vec<u8>, String> {
    let overrides: Option<ThemeOverrides> = theme_json
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| format!("Invalid theme: {}", e))?;

    let processor = ProcessorBuilder::new()
        .build()
        .map_err(|e| e.to_string())?;

    match processor.process(
        RawFile::new(name, media_type, bytes),
        overrides.as_ref(),
        &NoProgress,
    ) {
        ProcessingOutcome::Completed(report) => Ok(report.document),
        ProcessingOutcome::Failed(failure) => Err(failure.message),
        ProcessingOutcome::Cancelled => Err("Processing was cancelled".to_string()),
    }
}
