//! パフォーマンステスト
//!
//! このモジュールは、メモリ使用量と処理速度の目安を確認するテストを提供します。
//!
//! 実装するテスト:
//! - TC-P-001: Row Cap Workbook Memory Usage（ピークメモリの目安 ≤ 200MB）
//! - TC-P-010: Typical Model Processing Speed（< 1秒）
//! - TC-P-011: Batch Processing Throughput（20ファイルを10秒以内）
//!
//! フィクスチャはすべてrust_xlsxwriterでメモリ上に生成します。
//! 注意: メモリ使用量の正確な測定には、valgrindやheaptrackなどの外部ツールが必要です。

use rust_xlsxwriter::{Workbook, XlsxError};
use xlsxdeck::{NoProgress, ProcessingOutcome, ProcessorBuilder, RawFile, XLSX_MIME_TYPE};

/// 財務モデル風のワークブックを生成
///
/// `sheets`枚のシートに、それぞれ`rows`行×6列の数値を書き込みます。
fn generate_model(sheets: usize, rows: u32) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    for s in 0..sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(format!("Model {}", s + 1))?;
        for (col, header) in ["Period", "Revenue", "COGS", "EBITDA", "Capex", "FCF"]
            .iter()
            .enumerate()
        {
            worksheet.write_string(0, col as u16, *header)?;
        }
        for row in 1..=rows {
            worksheet.write_number(row, 0, row as f64)?;
            for col in 1..6u16 {
                worksheet.write_number(row, col, (row as f64) * (col as f64) * 1.07)?;
            }
        }
    }
    Ok(workbook.save_to_buffer()?)
}

fn process(bytes: Vec<u8>) -> Vec<u8> {
    let processor = ProcessorBuilder::new().build().unwrap();
    match processor.process(RawFile::new("model.xlsx", XLSX_MIME_TYPE, bytes), None, &NoProgress) {
        ProcessingOutcome::Completed(report) => report.document,
        other => panic!("Expected a completed run, got {:?}", other),
    }
}

/// TC-P-001: Row Cap Workbook Memory Usage
///
/// 行数上限ぎりぎりのワークブックを処理した際のメモリ増加量を表示します。
///
/// 注意: このテストは基本的なメモリ使用量の目安を提供します。
#[test]
#[ignore] // 手動実行用
fn test_row_cap_memory_usage() {
    let bytes = generate_model(5, 9_999).unwrap();

    let before_memory = get_memory_usage();
    let output = process(bytes);
    let after_memory = get_memory_usage();
    let memory_delta = after_memory.saturating_sub(before_memory);

    println!("Memory delta: {} MB", memory_delta / 1024 / 1024);
    println!("Output size: {} bytes", output.len());

    if memory_delta > 200 * 1024 * 1024 {
        eprintln!(
            "Warning: Memory delta ({:.2} MB) exceeds target (200 MB). \
            Use valgrind or heaptrack for accurate measurement.",
            memory_delta as f64 / 1024.0 / 1024.0
        );
    }
}

/// 現在のプロセスのメモリ使用量を取得（概算）
fn get_memory_usage() -> usize {
    // Linuxの場合、/proc/self/statusから取得
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    if let Some(value) = line.split_whitespace().nth(1) {
                        if let Ok(kb) = value.parse::<usize>() {
                            return kb * 1024;
                        }
                    }
                }
            }
        }
    }

    0
}

/// TC-P-010: Typical Model Processing Speed
///
/// 10シート×500行のワークブックを1秒以内に処理することを確認します。
#[test]
#[ignore] // 手動実行用
fn test_typical_model_processing_speed() {
    let bytes = generate_model(10, 500).unwrap();

    let start = std::time::Instant::now();
    let output = process(bytes);
    let duration = start.elapsed();

    println!("Processing time: {:?}", duration);
    println!("Output size: {} bytes", output.len());

    assert!(
        duration.as_secs() < 1,
        "Processing took too long: {:?} (target: < 1 second)",
        duration
    );
}

/// TC-P-011: Batch Processing Throughput
///
/// 20ファイルを同じ`Processor`で順に処理し、10秒以内に終わることを確認します。
#[test]
#[ignore] // 手動実行用（時間がかかる）
fn test_batch_processing_throughput() {
    let batch_files: Vec<Vec<u8>> = (0..20)
        .map(|i| generate_model(3, 200 + i * 10).unwrap())
        .collect();
    let processor = ProcessorBuilder::new().build().unwrap();

    let start = std::time::Instant::now();
    for (i, file_data) in batch_files.iter().enumerate() {
        let file = RawFile::new(format!("batch_{:02}.xlsx", i), XLSX_MIME_TYPE, file_data.clone());
        assert!(processor.process(file, None, &NoProgress).is_completed());
    }
    let duration = start.elapsed();

    println!("Processed {} files in {:?}", batch_files.len(), duration);
    println!(
        "Throughput: {:.2} files/second",
        batch_files.len() as f64 / duration.as_secs_f64()
    );

    assert!(
        duration.as_secs() < 10,
        "Batch processing took too long: {:?} (target: < 10 seconds for {} files)",
        duration,
        batch_files.len()
    );
}
