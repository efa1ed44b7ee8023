//! Slide Part Module
//!
//! スライドパーツ（`ppt/slides/slideN.xml`）のXMLを生成するモジュール。
//!
//! 座標はすべてEMU（English Metric Unit）で、16:9のワイドスクリーンを前提とします。
//! ヘッダー帯・フッター帯はマスタースライド側で描画されるため、
//! ここではタイトル、本文、スライド番号のみを配置します。

use std::fmt::{self, Write};
use unicode_width::UnicodeWidthStr;

use super::chart::ChartKind;
use super::classify::ChartData;
use super::template::{
    relationships, write_group_properties, write_slide_number_xfrm, write_xfrm, NS_A, NS_P, NS_R,
    REL_CHART, REL_SLIDE_LAYOUT,
};
use super::xml_text;
use crate::api::Theme;
use crate::error::group_thousands;
use crate::types::{
    format_number, CellValue, MetricKey, MetricsMap, Row, Slide, ValidationReport,
    WorkbookMetadata,
};

pub(crate) const SLIDE_WIDTH: i64 = 12_192_000;
pub(crate) const SLIDE_HEIGHT: i64 = 6_858_000;
pub(crate) const HEADER_HEIGHT: i64 = 685_800;
pub(crate) const FOOTER_TOP: i64 = 6_400_800;
pub(crate) const MARGIN: i64 = 457_200;

const CONTENT_TOP: i64 = HEADER_HEIGHT + 228_600;
const CONTENT_WIDTH: i64 = SLIDE_WIDTH - 2 * MARGIN;
const CONTENT_HEIGHT: i64 = FOOTER_TOP - CONTENT_TOP - 228_600;

const BORDER_COLOR: &str = "BFBFBF";
const BAND_COLOR: &str = "F2F2F2";
const BODY_COLOR: &str = "262626";

/// 表の列幅を決める際の最小・最大文字幅
const MIN_COLUMN_CHARS: usize = 4;
const MAX_COLUMN_CHARS: usize = 40;

/// スライドの本文
#[derive(Debug, Clone)]
pub(crate) enum SlideContent<'a> {
    /// 表紙
    Title { subtitle: String },
    /// 箇条書き
    Bullets { lines: Vec<String> },
    /// 罫線付きの表（先頭行はヘッダー）
    Table { rows: &'a [Row] },
    /// グラフ
    Chart { kind: ChartKind, data: ChartData },
}

impl SlideContent<'_> {
    pub(crate) fn chart(&self) -> Option<(ChartKind, &ChartData)> {
        match self {
            SlideContent::Chart { kind, data } => Some((*kind, data)),
            _ => None,
        }
    }
}

/// スライドパーツのXMLを生成
///
/// # 引数
///
/// * `slide` - スライドの概要（番号とタイトル）
/// * `content` - 本文
/// * `theme` - 配色とフォント
pub(crate) fn slide_xml(
    slide: &Slide,
    content: &SlideContent<'_>,
    theme: &Theme,
) -> Result<String, fmt::Error> {
    let mut xml = String::with_capacity(8192);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    write!(xml, r#"<p:sld xmlns:a="{}" xmlns:r="{}" xmlns:p="{}">"#, NS_A, NS_R, NS_P)?;
    xml.push_str("<p:cSld><p:spTree>");
    write_group_properties(&mut xml);

    match content {
        SlideContent::Title { subtitle } => write_title_page(&mut xml, &slide.title, subtitle, theme)?,
        SlideContent::Bullets { lines } => {
            write_header_title(&mut xml, &slide.title, theme)?;
            write_bullets(&mut xml, lines, theme)?;
        }
        SlideContent::Table { rows } => {
            write_header_title(&mut xml, &slide.title, theme)?;
            write_table(&mut xml, rows, theme)?;
        }
        SlideContent::Chart { .. } => {
            write_header_title(&mut xml, &slide.title, theme)?;
            write_chart_frame(&mut xml)?;
        }
    }
    write_slide_number(&mut xml, slide.id)?;

    xml.push_str("</p:spTree></p:cSld>");
    xml.push_str("<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>");
    Ok(xml)
}

/// スライドのリレーションシップ（`rId1`: レイアウト, `rId2`: グラフ）
pub(crate) fn slide_rels(chart_number: Option<usize>) -> String {
    match chart_number {
        Some(number) => {
            let target = format!("../charts/chart{}.xml", number);
            relationships(&[
                ("rId1", REL_SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml"),
                ("rId2", REL_CHART, &target),
            ])
        }
        None => relationships(&[("rId1", REL_SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml")]),
    }
}

/// エグゼクティブサマリーの箇条書きを生成
///
/// シート数、行数、解析時間、検証結果に続けて、抽出できた指標を列挙します。
pub(crate) fn summary_lines(
    metadata: &WorkbookMetadata,
    validation: &ValidationReport,
    metrics: &MetricsMap,
) -> Vec<String> {
    let mut lines = vec![
        format!("Sheets analyzed: {}", metadata.sheet_count),
        format!(
            "Total rows: {}",
            group_thousands(metadata.total_row_count as u64)
        ),
        format!("Parse time: {} ms", metadata.parse_duration_ms),
        format!(
            "Validation: {}",
            if validation.is_valid { "Passed" } else { "Failed" }
        ),
    ];
    lines.extend(
        metrics
            .iter()
            .map(|(key, value)| format!("{}: {}", key.label(), format_metric(key, value))),
    );
    lines
}

/// サマリースライドのプレビュー文字列
///
/// 企業価値・株式価値が取れていればそれを、なければ規模を表示します。
pub(crate) fn summary_preview(metadata: &WorkbookMetadata, metrics: &MetricsMap) -> String {
    let headline: Vec<String> = [
        (MetricKey::EnterpriseValue, "EV"),
        (MetricKey::EquityValue, "Equity Value"),
    ]
    .iter()
    .filter_map(|(key, label)| {
        metrics
            .get(*key)
            .map(|value| format!("{}: {}", label, compact_currency(value)))
    })
    .collect();

    if headline.is_empty() {
        format!(
            "{} sheets, {} rows analyzed",
            metadata.sheet_count,
            group_thousands(metadata.total_row_count as u64)
        )
    } else {
        headline.join(", ")
    }
}

fn format_metric(key: MetricKey, value: f64) -> String {
    match key {
        MetricKey::Irr => format!("{:.1}%", value * 100.0),
        MetricKey::Multiple => format!("{:.2}x", value),
        MetricKey::EnterpriseValue | MetricKey::EquityValue => format_amount(value),
    }
}

fn format_amount(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let whole = value.abs().round();
    if whole < u64::MAX as f64 {
        format!("{}{}", sign, group_thousands(whole as u64))
    } else {
        format_number(value)
    }
}

fn compact_currency(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let abs = value.abs();
    let (scaled, suffix) = if abs >= 1e9 {
        (abs / 1e9, "B")
    } else if abs >= 1e6 {
        (abs / 1e6, "M")
    } else if abs >= 1e3 {
        (abs / 1e3, "K")
    } else {
        (abs, "")
    };
    format!("{}${}{}", sign, format_number((scaled * 10.0).round() / 10.0), suffix)
}

/// ヘッダー帯の上に白抜きのスライドタイトルを配置
fn write_header_title(xml: &mut String, title: &str, theme: &Theme) -> fmt::Result {
    xml.push_str("<p:sp><p:nvSpPr>");
    xml.push_str(r#"<p:cNvPr id="2" name="Title"/><p:cNvSpPr txBox="1"/><p:nvPr/>"#);
    xml.push_str("</p:nvSpPr><p:spPr>");
    write_xfrm(xml, MARGIN, 0, CONTENT_WIDTH, HEADER_HEIGHT)?;
    xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr>"#);
    xml.push_str(r#"<p:txBody><a:bodyPr lIns="0" anchor="ctr"><a:normAutofit/></a:bodyPr><a:lstStyle/><a:p>"#);
    write_run(xml, title, 2400, true, "FFFFFF", theme)?;
    xml.push_str("</a:p></p:txBody></p:sp>");
    Ok(())
}

fn write_title_page(xml: &mut String, title: &str, subtitle: &str, theme: &Theme) -> fmt::Result {
    let top = SLIDE_HEIGHT / 2 - 1_143_000;

    xml.push_str("<p:sp><p:nvSpPr>");
    xml.push_str(r#"<p:cNvPr id="2" name="Title"/><p:cNvSpPr txBox="1"/><p:nvPr/>"#);
    xml.push_str("</p:nvSpPr><p:spPr>");
    write_xfrm(xml, MARGIN, top, CONTENT_WIDTH, 1_143_000)?;
    xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr>"#);
    xml.push_str(r#"<p:txBody><a:bodyPr anchor="b"><a:normAutofit/></a:bodyPr><a:lstStyle/><a:p><a:pPr algn="ctr"/>"#);
    write_run(xml, title, 4000, true, &theme.primary_color, theme)?;
    xml.push_str("</a:p></p:txBody></p:sp>");

    // タイトル下のアクセントライン
    xml.push_str("<p:cxnSp><p:nvCxnSpPr>");
    xml.push_str(r#"<p:cNvPr id="3" name="Accent Line"/><p:cNvCxnSpPr/><p:nvPr/>"#);
    xml.push_str("</p:nvCxnSpPr><p:spPr>");
    write_xfrm(xml, SLIDE_WIDTH / 2 - 1_371_600, top + 1_219_200, 2_743_200, 0)?;
    xml.push_str(r#"<a:prstGeom prst="line"><a:avLst/></a:prstGeom>"#);
    write!(
        xml,
        r#"<a:ln w="38100"><a:solidFill><a:srgbClr val="{}"/></a:solidFill></a:ln>"#,
        theme.accent_color
    )?;
    xml.push_str("</p:spPr></p:cxnSp>");

    xml.push_str("<p:sp><p:nvSpPr>");
    xml.push_str(r#"<p:cNvPr id="4" name="Subtitle"/><p:cNvSpPr txBox="1"/><p:nvPr/>"#);
    xml.push_str("</p:nvSpPr><p:spPr>");
    write_xfrm(xml, MARGIN, top + 1_371_600, CONTENT_WIDTH, 685_800)?;
    xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr>"#);
    xml.push_str(r#"<p:txBody><a:bodyPr anchor="t"><a:normAutofit/></a:bodyPr><a:lstStyle/><a:p><a:pPr algn="ctr"/>"#);
    write_run(xml, subtitle, 2000, false, &theme.secondary_color, theme)?;
    xml.push_str("</a:p></p:txBody></p:sp>");
    Ok(())
}

fn write_bullets(xml: &mut String, lines: &[String], theme: &Theme) -> fmt::Result {
    xml.push_str("<p:sp><p:nvSpPr>");
    xml.push_str(r#"<p:cNvPr id="3" name="Body"/><p:cNvSpPr txBox="1"/><p:nvPr/>"#);
    xml.push_str("</p:nvSpPr><p:spPr>");
    write_xfrm(xml, MARGIN, CONTENT_TOP, CONTENT_WIDTH, CONTENT_HEIGHT)?;
    xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr>"#);
    xml.push_str(r#"<p:txBody><a:bodyPr wrap="square"><a:normAutofit/></a:bodyPr><a:lstStyle/>"#);
    for line in lines {
        xml.push_str(r#"<a:p><a:pPr marL="342900" indent="-342900">"#);
        write!(
            xml,
            r#"<a:buClr><a:srgbClr val="{}"/></a:buClr><a:buFont typeface="Arial"/><a:buChar char="&#8226;"/>"#,
            theme.accent_color
        )?;
        xml.push_str(r#"<a:spcBef><a:spcPts val="600"/></a:spcBef></a:pPr>"#);
        write_run(xml, line, 2000, false, BODY_COLOR, theme)?;
        xml.push_str("</a:p>");
    }
    xml.push_str("</p:txBody></p:sp>");
    Ok(())
}

/// 罫線付きの表を出力
///
/// 列数は最も長い行に合わせ、足りないセルは空セルとして埋めます。
/// ヘッダー行はプライマリカラーの塗りに白抜き太字、データ行は1行おきに網掛けします。
fn write_table(xml: &mut String, rows: &[Row], theme: &Theme) -> fmt::Result {
    let column_count = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
    let widths = column_widths(rows, column_count);
    let (font_size, row_height) = table_metrics(rows.len());

    xml.push_str("<p:graphicFrame><p:nvGraphicFramePr>");
    xml.push_str(r#"<p:cNvPr id="3" name="Table"/><p:cNvGraphicFramePr><a:graphicFrameLocks noGrp="1"/></p:cNvGraphicFramePr><p:nvPr/>"#);
    xml.push_str("</p:nvGraphicFramePr>");
    write!(
        xml,
        r#"<p:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></p:xfrm>"#,
        MARGIN,
        CONTENT_TOP,
        CONTENT_WIDTH,
        row_height * rows.len() as i64
    )?;
    xml.push_str(r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table">"#);
    xml.push_str(r#"<a:tbl><a:tblPr firstRow="1" bandRow="1"/><a:tblGrid>"#);
    for width in &widths {
        write!(xml, r#"<a:gridCol w="{}"/>"#, width)?;
    }
    xml.push_str("</a:tblGrid>");

    for (index, row) in rows.iter().enumerate() {
        let is_header = index == 0;
        let (fill, color) = if is_header {
            (theme.primary_color.as_str(), "FFFFFF")
        } else if index % 2 == 0 {
            (BAND_COLOR, BODY_COLOR)
        } else {
            ("FFFFFF", BODY_COLOR)
        };

        write!(xml, r#"<a:tr h="{}">"#, row_height)?;
        for col in 0..column_count {
            let text = row.get(col).map(ToString::to_string).unwrap_or_default();
            let numeric = matches!(row.get(col), Some(CellValue::Number(_)));

            xml.push_str(r#"<a:tc><a:txBody><a:bodyPr/><a:lstStyle/><a:p>"#);
            if numeric && !is_header {
                xml.push_str(r#"<a:pPr algn="r"/>"#);
            }
            if text.is_empty() {
                write!(xml, r#"<a:endParaRPr lang="en-US" sz="{}"/>"#, font_size)?;
            } else {
                write_run(xml, &text, font_size, is_header, color, theme)?;
            }
            xml.push_str(r#"</a:p></a:txBody><a:tcPr marL="68580" marR="68580" marT="34290" marB="34290" anchor="ctr">"#);
            for edge in ["lnL", "lnR", "lnT", "lnB"] {
                write!(
                    xml,
                    r#"<a:{0} w="6350"><a:solidFill><a:srgbClr val="{1}"/></a:solidFill></a:{0}>"#,
                    edge, BORDER_COLOR
                )?;
            }
            write!(xml, r#"<a:solidFill><a:srgbClr val="{}"/></a:solidFill>"#, fill)?;
            xml.push_str("</a:tcPr></a:tc>");
        }
        xml.push_str("</a:tr>");
    }

    xml.push_str("</a:tbl></a:graphicData></a:graphic></p:graphicFrame>");
    Ok(())
}

/// 各列の表示幅に比例した列幅（EMU）を計算
///
/// 合計は常に本文領域の幅と一致します。
fn column_widths(rows: &[Row], column_count: usize) -> Vec<i64> {
    let chars: Vec<usize> = (0..column_count)
        .map(|col| {
            rows.iter()
                .filter_map(|row| row.get(col))
                .map(|cell| cell.to_string().width())
                .max()
                .unwrap_or(0)
                .clamp(MIN_COLUMN_CHARS, MAX_COLUMN_CHARS)
        })
        .collect();
    let total_chars: i64 = chars.iter().map(|c| *c as i64).sum();

    let mut widths: Vec<i64> = chars
        .iter()
        .map(|c| CONTENT_WIDTH * *c as i64 / total_chars)
        .collect();
    let assigned: i64 = widths.iter().sum();
    if let Some(last) = widths.last_mut() {
        *last += CONTENT_WIDTH - assigned;
    }
    widths
}

/// 行数に応じたフォントサイズ（1/100pt）と行の高さ（EMU）
fn table_metrics(row_count: usize) -> (u32, i64) {
    match row_count {
        0..=10 => (1200, 370_840),
        11..=25 => (1000, 320_040),
        _ => (800, 228_600),
    }
}

fn write_chart_frame(xml: &mut String) -> fmt::Result {
    xml.push_str("<p:graphicFrame><p:nvGraphicFramePr>");
    xml.push_str(r#"<p:cNvPr id="3" name="Chart"/><p:cNvGraphicFramePr/><p:nvPr/>"#);
    xml.push_str("</p:nvGraphicFramePr>");
    write!(
        xml,
        r#"<p:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></p:xfrm>"#,
        MARGIN, CONTENT_TOP, CONTENT_WIDTH, CONTENT_HEIGHT
    )?;
    xml.push_str(r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/chart">"#);
    xml.push_str(r#"<c:chart xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart" r:id="rId2"/>"#);
    xml.push_str("</a:graphicData></a:graphic></p:graphicFrame>");
    Ok(())
}

fn write_slide_number(xml: &mut String, number: u32) -> fmt::Result {
    xml.push_str("<p:sp><p:nvSpPr>");
    xml.push_str(r#"<p:cNvPr id="9" name="Slide Number"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr>"#);
    xml.push_str(r#"<p:nvPr><p:ph type="sldNum" sz="quarter" idx="12"/></p:nvPr>"#);
    xml.push_str("</p:nvSpPr><p:spPr>");
    write_slide_number_xfrm(xml)?;
    xml.push_str("</p:spPr><p:txBody><a:bodyPr/><a:lstStyle/><a:p>");
    xml.push_str(r#"<a:fld id="{B6F15528-21DE-4FAA-801E-634DDDAF4B2B}" type="slidenum"><a:rPr lang="en-US"/>"#);
    write!(xml, "<a:t>{}</a:t>", number)?;
    xml.push_str("</a:fld></a:p></p:txBody></p:sp>");
    Ok(())
}

fn write_run(
    xml: &mut String,
    text: &str,
    size: u32,
    bold: bool,
    color: &str,
    theme: &Theme,
) -> fmt::Result {
    write!(
        xml,
        r#"<a:r><a:rPr lang="en-US" sz="{}" b="{}" dirty="0">"#,
        size,
        if bold { 1 } else { 0 }
    )?;
    write!(xml, r#"<a:solidFill><a:srgbClr val="{}"/></a:solidFill>"#, color)?;
    write!(xml, r#"<a:latin typeface="{}"/>"#, xml_text(&theme.font_family))?;
    write!(xml, "</a:rPr><a:t>{}</a:t></a:r>", xml_text(text))
}
