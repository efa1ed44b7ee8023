//! Package Module
//!
//! プレゼンテーションのパーツをZIPコンテナにまとめ、自己検証するモジュール。
//!
//! 圧縮付きのシリアライズが失敗するか時間がかかりすぎた場合は、
//! 一度だけ非圧縮で再試行します。

use chrono::Utc;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fmt::{self, Write as _};
use std::io::{Cursor, Read, Write};
use std::time::Duration;
use zip::result::ZipResult;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::template::{
    relationships, REL_APP_PROPS, REL_CORE_PROPS, REL_OFFICE_DOCUMENT, REL_PRES_PROPS,
    REL_SLIDE, REL_SLIDE_MASTER, REL_TABLE_STYLES, REL_THEME, REL_VIEW_PROPS,
};
use super::template::{NS_A, NS_P, NS_R};
use super::slides::{SLIDE_HEIGHT, SLIDE_WIDTH};
use crate::error::GenerationFailure;
use crate::progress::ProgressSink;

pub(crate) const CONTENT_TYPES_PATH: &str = "[Content_Types].xml";
pub(crate) const PRESENTATION_PATH: &str = "ppt/presentation.xml";

const PRESENTATION_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml";

/// 自己検証時に読み込むパーツの最大サイズ（バイト）
const MAX_VERIFIED_PART_SIZE: u64 = 16 * 1024 * 1024;

/// コンテナに格納する1パーツ
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PackagePart {
    pub path: String,
    pub data: Vec<u8>,
}

impl PackagePart {
    pub(crate) fn new(path: impl Into<String>, xml: String) -> Self {
        Self {
            path: path.into(),
            data: xml.into_bytes(),
        }
    }
}

/// `[Content_Types].xml`
pub(crate) fn content_types_xml(slide_count: usize, chart_count: usize) -> Result<String, fmt::Error> {
    let mut xml = String::with_capacity(2048 + slide_count * 160 + chart_count * 140);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
    xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);

    write_override(&mut xml, PRESENTATION_PATH, PRESENTATION_CONTENT_TYPE)?;
    write_override(
        &mut xml,
        "ppt/slideMasters/slideMaster1.xml",
        "application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml",
    )?;
    write_override(
        &mut xml,
        "ppt/slideLayouts/slideLayout1.xml",
        "application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml",
    )?;
    write_override(
        &mut xml,
        "ppt/theme/theme1.xml",
        "application/vnd.openxmlformats-officedocument.theme+xml",
    )?;
    write_override(
        &mut xml,
        "ppt/presProps.xml",
        "application/vnd.openxmlformats-officedocument.presentationml.presProps+xml",
    )?;
    write_override(
        &mut xml,
        "ppt/viewProps.xml",
        "application/vnd.openxmlformats-officedocument.presentationml.viewProps+xml",
    )?;
    write_override(
        &mut xml,
        "ppt/tableStyles.xml",
        "application/vnd.openxmlformats-officedocument.presentationml.tableStyles+xml",
    )?;
    for number in 1..=slide_count {
        write_override(
            &mut xml,
            &format!("ppt/slides/slide{}.xml", number),
            "application/vnd.openxmlformats-officedocument.presentationml.slide+xml",
        )?;
    }
    for number in 1..=chart_count {
        write_override(
            &mut xml,
            &format!("ppt/charts/chart{}.xml", number),
            "application/vnd.openxmlformats-officedocument.drawingml.chart+xml",
        )?;
    }
    write_override(
        &mut xml,
        "docProps/core.xml",
        "application/vnd.openxmlformats-package.core-properties+xml",
    )?;
    write_override(
        &mut xml,
        "docProps/app.xml",
        "application/vnd.openxmlformats-officedocument.extended-properties+xml",
    )?;

    xml.push_str("</Types>");
    Ok(xml)
}

fn write_override(xml: &mut String, part: &str, content_type: &str) -> fmt::Result {
    write!(
        xml,
        r#"<Override PartName="/{}" ContentType="{}"/>"#,
        part, content_type
    )
}

/// `ppt/presentation.xml`
///
/// スライドIDは256から、リレーションシップIDは`rId2`から（`rId1`はマスター）割り当てます。
pub(crate) fn presentation_xml(slide_count: usize) -> Result<String, fmt::Error> {
    let mut xml = String::with_capacity(1024 + slide_count * 48);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    write!(
        xml,
        r#"<p:presentation xmlns:a="{}" xmlns:r="{}" xmlns:p="{}" saveSubsetFonts="1">"#,
        NS_A, NS_R, NS_P
    )?;
    xml.push_str(r#"<p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>"#);
    xml.push_str("<p:sldIdLst>");
    for index in 0..slide_count {
        write!(
            xml,
            r#"<p:sldId id="{}" r:id="rId{}"/>"#,
            256 + index,
            index + 2
        )?;
    }
    xml.push_str("</p:sldIdLst>");
    write!(
        xml,
        r#"<p:sldSz cx="{}" cy="{}"/><p:notesSz cx="{}" cy="{}"/>"#,
        SLIDE_WIDTH, SLIDE_HEIGHT, SLIDE_HEIGHT, SLIDE_WIDTH
    )?;
    xml.push_str("<p:defaultTextStyle/></p:presentation>");
    Ok(xml)
}

/// `ppt/_rels/presentation.xml.rels`
pub(crate) fn presentation_rels(slide_count: usize) -> String {
    let slide_entries: Vec<(String, String)> = (1..=slide_count)
        .map(|number| {
            (
                format!("rId{}", number + 1),
                format!("slides/slide{}.xml", number),
            )
        })
        .collect();
    let tail = [
        (format!("rId{}", slide_count + 2), REL_THEME, "theme/theme1.xml"),
        (format!("rId{}", slide_count + 3), REL_PRES_PROPS, "presProps.xml"),
        (format!("rId{}", slide_count + 4), REL_VIEW_PROPS, "viewProps.xml"),
        (format!("rId{}", slide_count + 5), REL_TABLE_STYLES, "tableStyles.xml"),
    ];

    let mut entries: Vec<(&str, &str, &str)> = Vec::with_capacity(slide_count + 5);
    entries.push(("rId1", REL_SLIDE_MASTER, "slideMasters/slideMaster1.xml"));
    entries.extend(
        slide_entries
            .iter()
            .map(|(id, target)| (id.as_str(), REL_SLIDE, target.as_str())),
    );
    entries.extend(tail.iter().map(|(id, rel, target)| (id.as_str(), *rel, *target)));
    relationships(&entries)
}

/// `_rels/.rels`
pub(crate) fn root_rels() -> String {
    relationships(&[
        ("rId1", REL_OFFICE_DOCUMENT, PRESENTATION_PATH),
        ("rId2", REL_CORE_PROPS, "docProps/core.xml"),
        ("rId3", REL_APP_PROPS, "docProps/app.xml"),
    ])
}

/// パーツをZIPコンテナに書き出す
pub(crate) fn write_package(parts: &[PackagePart], method: CompressionMethod) -> ZipResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(method);

    for part in parts {
        zip.start_file(part.path.as_str(), options)?;
        zip.write_all(&part.data)?;
    }

    Ok(zip.finish()?.into_inner())
}

/// 圧縮フォールバック付きでシリアライズ
///
/// # 引数
///
/// * `parts` - 格納するパーツ（先頭は`[Content_Types].xml`）
/// * `timeout` - 圧縮付きシリアライズの許容時間
/// * `progress` - フォールバックを通知する進捗シンク
/// * `percent` - 通知時の進捗率
pub(crate) fn serialize(
    parts: &[PackagePart],
    timeout: Duration,
    progress: &dyn ProgressSink,
    percent: f64,
) -> Result<Vec<u8>, GenerationFailure> {
    serialize_with(parts, timeout, progress, percent, write_package)
}

fn serialize_with<F>(
    parts: &[PackagePart],
    timeout: Duration,
    progress: &dyn ProgressSink,
    percent: f64,
    write: F,
) -> Result<Vec<u8>, GenerationFailure>
where
    F: Fn(&[PackagePart], CompressionMethod) -> ZipResult<Vec<u8>>,
{
    let started = Utc::now();
    let fallback_reason = match write(parts, CompressionMethod::Deflated) {
        Ok(bytes) => {
            let elapsed_ms = Utc::now().signed_duration_since(started).num_milliseconds();
            let limit_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
            if elapsed_ms <= limit_ms {
                return Ok(bytes);
            }
            format!("Compression took {} ms", elapsed_ms)
        }
        Err(e) => format!("Compression failed: {}", e),
    };

    log::warn!("{}; retrying without compression", fallback_reason);
    progress.report(
        percent,
        &format!("{}, saving without compression", fallback_reason),
    );

    write(parts, CompressionMethod::Stored)
        .map_err(|e| GenerationFailure::SerializationFailure(e.to_string()))
}

/// 生成されたコンテナを再度開いて構造を検証
///
/// 少なくとも以下を確認します。
///
/// - ZIPアーカイブとして開けること
/// - `[Content_Types].xml`が存在し、XMLとして読めて、`/ppt/presentation.xml`を宣言していること
/// - `ppt/presentation.xml`が存在し、XMLとして読めること
///
/// # 戻り値
///
/// * `Ok(())` - 検証に成功した場合
/// * `Err(GenerationFailure::CorruptOutput)` - いずれかの確認に失敗した場合
pub fn verify_container(bytes: &[u8]) -> Result<(), GenerationFailure> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| corrupt(format!("output is not a ZIP archive: {}", e)))?;

    let content_types = read_part(&mut archive, CONTENT_TYPES_PATH)?;
    let overrides = override_part_names(&content_types)?;
    let presentation_part = format!("/{}", PRESENTATION_PATH);
    if !overrides.iter().any(|name| *name == presentation_part) {
        return Err(corrupt(format!(
            "{} does not declare {}",
            CONTENT_TYPES_PATH, presentation_part
        )));
    }

    let presentation = read_part(&mut archive, PRESENTATION_PATH)?;
    check_well_formed(PRESENTATION_PATH, &presentation)?;

    Ok(())
}

fn corrupt(message: String) -> GenerationFailure {
    GenerationFailure::CorruptOutput(message)
}

fn read_part<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<Vec<u8>, GenerationFailure> {
    let mut file = archive
        .by_name(path)
        .map_err(|_| corrupt(format!("missing entry {}", path)))?;
    let mut data = Vec::new();
    file.by_ref()
        .take(MAX_VERIFIED_PART_SIZE)
        .read_to_end(&mut data)
        .map_err(|e| corrupt(format!("failed to read {}: {}", path, e)))?;
    Ok(data)
}

/// `Override`要素の`PartName`を列挙（同時に整形式であることを確認）
fn override_part_names(xml: &[u8]) -> Result<Vec<String>, GenerationFailure> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut names = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"Override" {
                    for attr in e.attributes() {
                        let attr = attr.map_err(|e| {
                            corrupt(format!("{}: {}", CONTENT_TYPES_PATH, e))
                        })?;
                        if attr.key.as_ref() == b"PartName" {
                            names.push(String::from_utf8_lossy(&attr.value).into_owned());
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(corrupt(format!("{}: {}", CONTENT_TYPES_PATH, e))),
            _ => {}
        }
        buf.clear();
    }

    if names.is_empty() {
        return Err(corrupt(format!("{} has no overrides", CONTENT_TYPES_PATH)));
    }
    Ok(names)
}

fn check_well_formed(path: &str, xml: &[u8]) -> Result<(), GenerationFailure> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);
    reader.check_end_names(true);

    let mut buf = Vec::new();
    let mut elements = 0usize;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(_)) | Ok(Event::Empty(_)) => elements += 1,
            Ok(Event::Eof) => break,
            Err(e) => return Err(corrupt(format!("{}: {}", path, e))),
            _ => {}
        }
        buf.clear();
    }

    if elements == 0 {
        return Err(corrupt(format!("{} is empty", path)));
    }
    Ok(())
}
