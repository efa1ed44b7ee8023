//! Security Tests
//!
//! セキュリティ対策のテストケースを実装します。
//! アップロード前のゲート（MIMEタイプ・サイズ・ファイル名）、ZIP bomb攻撃、
//! パストラバーサル攻撃、マクロを含むワークブックへの対策を検証します。

use rust_xlsxwriter::Workbook;
use std::io::{Cursor, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use xlsxdeck::{
    parse_workbook, validate_file, ContainerParser, NoProgress, ParseFailure, ParsedWorkbook,
    PipelineError, ProcessingOutcome, ProcessorBuilder, RawFile, SecurityPolicy,
    SecurityViolation, StepId, StepStatus, WorkbookParser, XLSX_MIME_TYPE, XLS_MIME_TYPE,
};
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

/// 呼び出し回数を数えるパーサー
#[derive(Default)]
struct CountingParser {
    calls: AtomicUsize,
}

impl ContainerParser for CountingParser {
    fn parse(&self, file: &RawFile, policy: &SecurityPolicy) -> Result<ParsedWorkbook, ParseFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        WorkbookParser.parse(file, policy)
    }
}

/// 指定したエントリを持つZIPアーカイブを作成
fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip_data = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut zip_data));
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }
    zip_data
}

/// 1シートのワークブックを作成
fn simple_workbook() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("DCF").unwrap();
    worksheet.write_string(0, 0, "Year").unwrap();
    worksheet.write_string(0, 1, "Cash Flow").unwrap();
    worksheet.write_number(1, 0, 2024.0).unwrap();
    worksheet.write_number(1, 1, 42.0).unwrap();
    workbook.save_to_buffer().unwrap()
}

/// 既存のアーカイブにエントリを追加して再圧縮
fn with_extra_entry(source: &[u8], name: &str, data: &[u8]) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(Cursor::new(source)).unwrap();
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        entries.push((entry.name().to_string(), content));
    }
    entries.push((name.to_string(), data.to_vec()));

    let borrowed: Vec<(&str, &[u8])> = entries
        .iter()
        .map(|(name, data)| (name.as_str(), data.as_slice()))
        .collect();
    build_zip(&borrowed)
}

fn parse_error(bytes: Vec<u8>, policy: &SecurityPolicy) -> ParseFailure {
    match parse_workbook(&RawFile::new("model.xlsx", XLSX_MIME_TYPE, bytes), policy) {
        Err(e) => e,
        Ok(_) => panic!("Expected the container to be rejected"),
    }
}

/// 許可されていないMIMEタイプはパーサーに到達する前に拒否される
#[test]
fn test_invalid_type_never_reaches_parser() {
    let parser = Arc::new(CountingParser::default());
    let processor = ProcessorBuilder::new()
        .with_container_parser(parser.clone())
        .build()
        .unwrap();

    let file = RawFile::new("notes.txt", "text/plain", b"hello".to_vec());
    let outcome = processor.process(file, None, &NoProgress);

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.step, StepId::Validation);
    assert_eq!(failure.error.code(), "INVALID_FILE_TYPE");
    assert!(failure.error.is_policy_violation());
    assert!(failure
        .message
        .starts_with("Security validation failed: Invalid file type. Allowed types:"));
    assert_eq!(parser.calls.load(Ordering::SeqCst), 0);

    let steps = processor.steps();
    assert_eq!(steps[0].status, StepStatus::Completed);
    assert_eq!(steps[1].status, StepStatus::Error);
    assert_eq!(steps[2].status, StepStatus::Pending);
    assert!(!processor.is_processing());
}

/// 正しいMIMEタイプのファイルはパーサーに渡される
#[test]
fn test_valid_type_reaches_parser_once() {
    let parser = Arc::new(CountingParser::default());
    let processor = ProcessorBuilder::new()
        .with_container_parser(parser.clone())
        .build()
        .unwrap();

    let file = RawFile::new("model.xlsx", XLSX_MIME_TYPE, simple_workbook());
    assert!(processor.process(file, None, &NoProgress).is_completed());
    assert_eq!(parser.calls.load(Ordering::SeqCst), 1);
}

/// 100MBを超えるファイルは拒否される
#[test]
fn test_file_too_large() {
    let file = RawFile::new("model.xlsx", XLSX_MIME_TYPE, vec![0u8; 100 * 1024 * 1024 + 1]);
    let result = validate_file(&file, &SecurityPolicy::default());
    match result {
        Err(violation @ SecurityViolation::TooLarge { .. }) => {
            assert_eq!(violation.to_string(), "File too large. Maximum size: 100MB");
            assert_eq!(violation.code(), "FILE_TOO_LARGE");
        }
        other => panic!("Expected TooLarge, got {:?}", other),
    }
}

/// 上限ちょうどのサイズは許可される
#[test]
fn test_file_size_limit_is_inclusive() {
    let policy = SecurityPolicy {
        max_file_size: 1024,
        ..SecurityPolicy::default()
    };
    let at_limit = RawFile::new("model.xlsx", XLSX_MIME_TYPE, vec![0u8; 1024]);
    assert!(validate_file(&at_limit, &policy).is_ok());

    let over_limit = RawFile::new("model.xlsx", XLSX_MIME_TYPE, vec![0u8; 1025]);
    assert!(matches!(
        validate_file(&over_limit, &policy),
        Err(SecurityViolation::TooLarge { size: 1025, limit: 1024 })
    ));
}

/// パス区切りや`..`を含むファイル名は拒否される
#[test]
fn test_invalid_file_names() {
    for name in ["../x.xlsx", "a/b.xlsx", "a\\b.xlsx", "..xlsx"] {
        let file = RawFile::new(name, XLSX_MIME_TYPE, vec![0u8; 16]);
        match validate_file(&file, &SecurityPolicy::default()) {
            Err(violation @ SecurityViolation::InvalidName { .. }) => {
                assert_eq!(violation.to_string(), "Invalid file name detected");
            }
            other => panic!("Expected InvalidName for {:?}, got {:?}", name, other),
        }
    }
}

/// 旧形式のMIMEタイプはゲートを通過する（解読はパーサー側で失敗する）
#[test]
fn test_legacy_mime_type_passes_gate() {
    let file = RawFile::new("model.xls", XLS_MIME_TYPE, vec![0xD0, 0xCF, 0x11, 0xE0]);
    assert!(validate_file(&file, &SecurityPolicy::default()).is_ok());
    assert!(matches!(
        parse_workbook(&file, &SecurityPolicy::default()),
        Err(ParseFailure::MalformedContainer(_))
    ));
}

/// ZIP bomb攻撃のテスト: 大量のファイルを含むZIPアーカイブ
#[test]
fn test_zip_bomb_too_many_files() {
    // 10,001個のファイルを含むZIPアーカイブを作成（上限: 10,000）
    let names: Vec<String> = (0..10_001).map(|i| format!("xl/file{}.xml", i)).collect();
    let entries: Vec<(&str, &[u8])> = names
        .iter()
        .map(|name| (name.as_str(), b"test".as_slice()))
        .collect();

    match parse_error(build_zip(&entries), &SecurityPolicy::default()) {
        ParseFailure::MalformedContainer(msg) => assert!(msg.contains("too many entries")),
        e => panic!("Unexpected error: {:?}", e),
    }
}

/// ZIP bomb攻撃のテスト: 展開後の合計サイズが上限を超える
#[test]
fn test_zip_bomb_decompressed_size() {
    let policy = SecurityPolicy {
        max_decompressed_size: 1000,
        ..SecurityPolicy::default()
    };
    let chunk = vec![b'a'; 600];
    let zip_data = build_zip(&[("xl/a.xml", chunk.as_slice()), ("xl/b.xml", chunk.as_slice())]);

    match parse_error(zip_data, &policy) {
        ParseFailure::MalformedContainer(msg) => {
            assert!(msg.contains("Total decompressed size exceeds maximum"))
        }
        e => panic!("Unexpected error: {:?}", e),
    }
}

/// 単一エントリのサイズ上限
#[test]
fn test_zip_entry_too_large() {
    let policy = SecurityPolicy {
        max_entry_size: 1024,
        ..SecurityPolicy::default()
    };
    let chunk = vec![b'a'; 2048];
    let zip_data = build_zip(&[("xl/sharedStrings.xml", chunk.as_slice())]);

    match parse_error(zip_data, &policy) {
        ParseFailure::MalformedContainer(msg) => assert!(msg.contains("exceeds maximum size")),
        e => panic!("Unexpected error: {:?}", e),
    }
}

/// パストラバーサル攻撃のテスト: `..`を含むパス
#[test]
fn test_path_traversal_dotdot() {
    let zip_data = build_zip(&[("../../evil.xml", b"<evil/>".as_slice())]);
    match parse_error(zip_data, &SecurityPolicy::default()) {
        ParseFailure::MalformedContainer(msg) => assert!(msg.contains("Path traversal")),
        e => panic!("Unexpected error: {:?}", e),
    }
}

/// パストラバーサル攻撃のテスト: 絶対パス
#[test]
fn test_path_traversal_absolute() {
    let zip_data = build_zip(&[("/etc/passwd", b"root".as_slice())]);
    match parse_error(zip_data, &SecurityPolicy::default()) {
        ParseFailure::MalformedContainer(msg) => assert!(msg.contains("Absolute entry path")),
        e => panic!("Unexpected error: {:?}", e),
    }
}

/// ZIPではないデータは解析失敗として報告される
#[test]
fn test_not_a_zip_archive() {
    let processor = ProcessorBuilder::new().build().unwrap();
    let file = RawFile::new("model.xlsx", XLSX_MIME_TYPE, b"definitely not a zip".to_vec());

    match processor.process(file, None, &NoProgress) {
        ProcessingOutcome::Failed(failure) => {
            assert_eq!(failure.step, StepId::Validation);
            assert!(matches!(
                failure.error,
                PipelineError::Parse(ParseFailure::MalformedContainer(_))
            ));
            assert!(!failure.error.is_policy_violation());
            assert!(failure.message.starts_with("File validation failed: "));
        }
        other => panic!("Expected a failure, got {:?}", other),
    }
}

/// マクロを含むワークブックはマクロを破棄して解析される
#[test]
fn test_macros_are_stripped() {
    let bytes = with_extra_entry(&simple_workbook(), "xl/vbaProject.bin", b"\x00VBA");
    let file = RawFile::new("model.xlsx", XLSX_MIME_TYPE, bytes);

    let workbook = parse_workbook(&file, &SecurityPolicy::default()).unwrap();
    assert!(workbook.validation.macros_stripped);
    assert!(workbook
        .validation
        .warnings
        .contains(&"Embedded macros were discarded".to_string()));

    let processor = ProcessorBuilder::new().build().unwrap();
    let outcome = processor.process(file, None, &NoProgress);
    assert!(outcome.is_completed());
    assert_eq!(
        processor.steps()[1].message.as_deref(),
        Some("Validated 1 sheets, macros stripped")
    );
}

/// マクロを含まないワークブックではフラグが立たない
#[test]
fn test_plain_workbook_has_no_macro_flag() {
    let file = RawFile::new("model.xlsx", XLSX_MIME_TYPE, simple_workbook());
    let workbook = parse_workbook(&file, &SecurityPolicy::default()).unwrap();
    assert!(!workbook.validation.macros_stripped);
}
