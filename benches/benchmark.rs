//! パフォーマンスベンチマーク
//!
//! このモジュールは、xlsxdeckクレートの各段階の処理時間を測定するためのベンチマークを提供します。
//!
//! 実装するベンチマーク:
//! - 解析（`parse_workbook`）
//! - 指標抽出（`extract`）
//! - スライド生成（`synthesize`）
//! - パイプライン全体（`Processor::process`）
//!
//! ワークブックはrust_xlsxwriterでメモリ上に生成します。

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rust_xlsxwriter::{Workbook, XlsxError};
use xlsxdeck::{
    extract, parse_workbook, synthesize, NoProgress, ProcessorBuilder, RawFile, SecurityPolicy,
    Theme, XLSX_MIME_TYPE,
};

/// DCFサマリーと`sheets`枚の予測シート（各`rows`行）を持つワークブックを生成
fn generate_model(sheets: usize, rows: u32) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();

    let summary = workbook.add_worksheet();
    summary.set_name("DCF_Summary")?;
    summary.write_string(0, 0, "Metric")?;
    summary.write_string(0, 1, "Value")?;
    for (row, (label, value)) in [
        ("Enterprise Value", 125_000_000.0),
        ("Equity Value", 98_000_000.0),
        ("IRR", 0.215),
        ("MOIC", 2.4),
    ]
    .iter()
    .enumerate()
    {
        summary.write_string(row as u32 + 1, 0, *label)?;
        summary.write_number(row as u32 + 1, 1, *value)?;
    }

    for s in 0..sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(format!("Projection {}", s + 1))?;
        for (col, header) in ["Year", "Revenue", "EBITDA", "Capex", "FCF"].iter().enumerate() {
            worksheet.write_string(0, col as u16, *header)?;
        }
        for row in 1..=rows {
            worksheet.write_number(row, 0, 2000.0 + row as f64)?;
            for col in 1..5u16 {
                worksheet.write_number(row, col, row as f64 * col as f64 * 3.5)?;
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn raw_file(bytes: &[u8]) -> RawFile {
    RawFile::new("model.xlsx", XLSX_MIME_TYPE, bytes.to_vec())
}

/// 段階ごとの処理時間
fn benchmark_stages(c: &mut Criterion) {
    let data = match generate_model(4, 200) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Warning: Failed to generate workbook: {}. Skipping benchmark.", e);
            return;
        }
    };
    let policy = SecurityPolicy::default();
    let theme = Theme::default();
    let workbook = parse_workbook(&raw_file(&data), &policy).unwrap();
    let metrics = extract(&workbook);

    let mut group = c.benchmark_group("stages");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("parse_workbook", |b| {
        b.iter(|| parse_workbook(black_box(&raw_file(&data)), &policy).unwrap());
    });

    group.bench_function("extract", |b| {
        b.iter(|| extract(black_box(&workbook)));
    });

    group.bench_function("synthesize", |b| {
        b.iter(|| {
            synthesize(black_box(&workbook), black_box(&metrics), &theme, &NoProgress).unwrap()
        });
    });

    group.finish();
}

/// パイプライン全体の処理時間（シート数ごと）
fn benchmark_pipeline(c: &mut Criterion) {
    let processor = ProcessorBuilder::new().build().unwrap();

    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);

    for sheets in [1usize, 5, 15] {
        let data = match generate_model(sheets, 100) {
            Ok(d) => d,
            Err(e) => {
                eprintln!("Warning: Failed to generate workbook: {}. Skipping.", e);
                continue;
            }
        };
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(sheets), &data, |b, data| {
            b.iter(|| {
                let outcome = processor.process(raw_file(data), None, &NoProgress);
                assert!(outcome.is_completed());
                black_box(outcome)
            });
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(std::time::Duration::from_secs(10))
        .warm_up_time(std::time::Duration::from_secs(2));
    targets = benchmark_stages, benchmark_pipeline
}

criterion_main!(benches);
