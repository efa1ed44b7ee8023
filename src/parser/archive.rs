//! Archive Inspection Module
//!
//! calamineでデコードする前に、XLSXコンテナ（ZIPアーカイブ）を検査するモジュール。
//! ZIP bomb対策（エントリ数・展開サイズの上限）、パストラバーサル対策、
//! およびマクロを含むパーツの検出を行います。
//!
//! マクロパーツの内容は一切読み込みません。

use std::io::{Read, Seek};
use zip::ZipArchive;

use crate::api::SecurityPolicy;
use crate::error::ParseFailure;
use crate::security::validate_zip_path;

/// マクロやActiveXを格納するパーツのプレフィックス
const MACRO_PART_PREFIXES: [&str; 3] = ["xl/vbaProject", "xl/macrosheets/", "xl/activeX/"];

/// `[Content_Types].xml`の最大読み込みサイズ（バイト）
const MAX_CONTENT_TYPES_SIZE: u64 = 1024 * 1024;

/// アーカイブ検査の結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ArchiveReport {
    /// エントリ数
    pub entry_count: usize,
    /// 宣言された展開後の合計サイズ（バイト）
    pub decompressed_size: u64,
    /// 検出されたマクロ関連パーツ
    pub macro_parts: Vec<String>,
}

impl ArchiveReport {
    /// マクロが含まれていたかどうか
    pub fn has_macros(&self) -> bool {
        !self.macro_parts.is_empty()
    }
}

/// ZIPアーカイブを検査
///
/// # 引数
///
/// * `reader` - XLSXファイルを読み込むためのリーダー
/// * `policy` - アーカイブ制限を含むセキュリティポリシー
///
/// # 戻り値
///
/// * `Ok(ArchiveReport)` - 検査を通過した場合
/// * `Err(ParseFailure::MalformedContainer)` - ZIPとして読めない、または制限を超えた場合
pub(crate) fn inspect<R: Read + Seek>(
    reader: R,
    policy: &SecurityPolicy,
) -> Result<ArchiveReport, ParseFailure> {
    let mut archive = ZipArchive::new(reader)?;

    // セキュリティチェック: エントリ数の上限
    if archive.len() > policy.max_archive_entries {
        return Err(ParseFailure::MalformedContainer(format!(
            "ZIP archive contains too many entries: {} (max: {})",
            archive.len(),
            policy.max_archive_entries
        )));
    }

    let mut report = ArchiveReport {
        entry_count: archive.len(),
        ..ArchiveReport::default()
    };

    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        let entry_name = entry.name().to_string();

        validate_zip_path(&entry_name).map_err(|e| {
            ParseFailure::MalformedContainer(format!("Invalid ZIP entry path: {}", e))
        })?;

        let entry_size = entry.size();
        if entry_size > policy.max_entry_size {
            return Err(ParseFailure::MalformedContainer(format!(
                "Entry '{}' exceeds maximum size: {} bytes (max: {} bytes)",
                entry_name, entry_size, policy.max_entry_size
            )));
        }

        report.decompressed_size = report
            .decompressed_size
            .checked_add(entry_size)
            .ok_or_else(|| {
                ParseFailure::MalformedContainer(
                    "Total decompressed size calculation overflow".to_string(),
                )
            })?;
        if report.decompressed_size > policy.max_decompressed_size {
            return Err(ParseFailure::MalformedContainer(format!(
                "Total decompressed size exceeds maximum: {} bytes (max: {} bytes)",
                report.decompressed_size, policy.max_decompressed_size
            )));
        }

        if is_macro_part(&entry_name) {
            report.macro_parts.push(entry_name);
        }
    }

    for part in macro_content_type_parts(&mut archive)? {
        if !report.macro_parts.contains(&part) {
            report.macro_parts.push(part);
        }
    }

    Ok(report)
}

/// パーツ名がマクロ関連かどうかを判定
fn is_macro_part(name: &str) -> bool {
    MACRO_PART_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// `[Content_Types].xml`からマクロ有効なコンテンツタイプを持つパーツを探す
///
/// `<Override PartName="/xl/workbook.xml" ContentType="...macroEnabled...">`のような
/// 宣言を検出します。`Default`要素は拡張子単位の宣言なので`*.{ext}`として報告します。
fn macro_content_type_parts<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Vec<String>, ParseFailure> {
    let mut content_types = match archive.by_name("[Content_Types].xml") {
        Ok(file) => file,
        // calamine側で改めて検出されるため、ここでは何もしない
        Err(_) => return Ok(Vec::new()),
    };

    let mut xml_content = Vec::new();
    content_types
        .by_ref()
        .take(MAX_CONTENT_TYPES_SIZE)
        .read_to_end(&mut xml_content)
        .map_err(|e| ParseFailure::MalformedContainer(format!("Failed to read content types: {}", e)))?;

    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_reader(xml_content.as_slice());
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut parts = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let element = e.local_name().as_ref().to_vec();
                if element != b"Override" && element != b"Default" {
                    buf.clear();
                    continue;
                }

                let mut target = None;
                let mut content_type = String::new();
                for attr in e.attributes() {
                    let attr = attr.map_err(|e| {
                        ParseFailure::MalformedContainer(format!("XML attribute error: {}", e))
                    })?;
                    let value = String::from_utf8_lossy(&attr.value).into_owned();
                    match attr.key.as_ref() {
                        b"PartName" => target = Some(value.trim_start_matches('/').to_string()),
                        b"Extension" => target = Some(format!("*.{}", value)),
                        b"ContentType" => content_type = value,
                        _ => {}
                    }
                }

                if is_macro_content_type(&content_type) {
                    if let Some(target) = target {
                        parts.push(target);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ParseFailure::MalformedContainer(format!(
                    "XML parse error in content types: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(parts)
}

fn is_macro_content_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    lower.contains("macroenabled") || lower.contains("vbaproject") || lower.contains("activex")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_inspect_plain_archive() {
        let bytes = build_zip(&[
            ("[Content_Types].xml", br#"<Types><Default Extension="xml" ContentType="application/xml"/></Types>"#),
            ("xl/workbook.xml", b"<workbook/>"),
        ]);
        let report = inspect(Cursor::new(bytes), &SecurityPolicy::default()).unwrap();
        assert_eq!(report.entry_count, 2);
        assert!(!report.has_macros());
    }

    #[test]
    fn test_inspect_detects_macro_parts() {
        let bytes = build_zip(&[
            (
                "[Content_Types].xml",
                br#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="bin" ContentType="application/vnd.ms-office.vbaProject"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.ms-excel.sheet.macroEnabled.main+xml"/></Types>"#,
            ),
            ("xl/workbook.xml", b"<workbook/>"),
            ("xl/vbaProject.bin", b"\x00\x01"),
        ]);
        let report = inspect(Cursor::new(bytes), &SecurityPolicy::default()).unwrap();
        assert!(report.has_macros());
        assert!(report.macro_parts.contains(&"xl/vbaProject.bin".to_string()));
        assert!(report.macro_parts.contains(&"xl/workbook.xml".to_string()));
        assert!(report.macro_parts.contains(&"*.bin".to_string()));
    }

    #[test]
    fn test_inspect_rejects_traversal_entry() {
        let bytes = build_zip(&[("../../evil.xml", b"<x/>")]);
        let result = inspect(Cursor::new(bytes), &SecurityPolicy::default());
        match result {
            Err(ParseFailure::MalformedContainer(msg)) => assert!(msg.contains("Path traversal")),
            other => panic!("Expected MalformedContainer, got {:?}", other),
        }
    }

    #[test]
    fn test_inspect_enforces_entry_count() {
        let bytes = build_zip(&[("a.xml", b"1"), ("b.xml", b"2"), ("c.xml", b"3")]);
        let policy = SecurityPolicy {
            max_archive_entries: 2,
            ..SecurityPolicy::default()
        };
        let result = inspect(Cursor::new(bytes), &policy);
        assert!(matches!(result, Err(ParseFailure::MalformedContainer(msg)) if msg.contains("too many entries")));
    }

    #[test]
    fn test_inspect_enforces_decompressed_size() {
        let big = vec![b'a'; 64];
        let bytes = build_zip(&[("a.xml", &big), ("b.xml", &big)]);
        let policy = SecurityPolicy {
            max_entry_size: 100,
            max_decompressed_size: 100,
            ..SecurityPolicy::default()
        };
        let result = inspect(Cursor::new(bytes), &policy);
        assert!(matches!(result, Err(ParseFailure::MalformedContainer(msg)) if msg.contains("Total decompressed size")));
    }

    #[test]
    fn test_inspect_rejects_non_zip() {
        let result = inspect(Cursor::new(b"not a zip".to_vec()), &SecurityPolicy::default());
        assert!(matches!(result, Err(ParseFailure::MalformedContainer(_))));
    }
}
