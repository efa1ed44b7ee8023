//! Template Module
//!
//! テーマから導出されるマスター、レイアウト、テーマパーツと、
//! 文書プロパティ（`docProps/*`）のXMLを生成するモジュール。
//!
//! マスタースライドにはヘッダー帯・フッター帯（プライマリカラー）、
//! フッター文字列、スライド番号プレースホルダーが含まれ、すべてのスライドに適用されます。

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::{self, Write};

use super::slides::{FOOTER_TOP, HEADER_HEIGHT, MARGIN, SLIDE_HEIGHT, SLIDE_WIDTH};
use super::xml_text;
use crate::api::Theme;

pub(crate) const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub(crate) const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub(crate) const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// フッター文字列
pub(crate) fn footer_text(theme: &Theme) -> String {
    format!("{} | Confidential & Proprietary", theme.company_name)
}

/// `ppt/theme/theme1.xml`
pub(crate) fn theme_xml(theme: &Theme) -> Result<String, fmt::Error> {
    let mut xml = String::with_capacity(4096);
    xml.push_str(XML_DECLARATION);
    write!(xml, r#"<a:theme xmlns:a="{}" name="{}">"#, NS_A, xml_text(&theme.company_name))?;
    xml.push_str("<a:themeElements>");

    xml.push_str(r#"<a:clrScheme name="Deck">"#);
    xml.push_str(r#"<a:dk1><a:srgbClr val="000000"/></a:dk1><a:lt1><a:srgbClr val="FFFFFF"/></a:lt1>"#);
    write!(xml, r#"<a:dk2><a:srgbClr val="{}"/></a:dk2>"#, theme.primary_color)?;
    xml.push_str(r#"<a:lt2><a:srgbClr val="F2F2F2"/></a:lt2>"#);
    write!(xml, r#"<a:accent1><a:srgbClr val="{}"/></a:accent1>"#, theme.primary_color)?;
    write!(xml, r#"<a:accent2><a:srgbClr val="{}"/></a:accent2>"#, theme.secondary_color)?;
    write!(xml, r#"<a:accent3><a:srgbClr val="{}"/></a:accent3>"#, theme.accent_color)?;
    xml.push_str(r#"<a:accent4><a:srgbClr val="7F7F7F"/></a:accent4>"#);
    xml.push_str(r#"<a:accent5><a:srgbClr val="A5A5A5"/></a:accent5>"#);
    xml.push_str(r#"<a:accent6><a:srgbClr val="70AD47"/></a:accent6>"#);
    write!(xml, r#"<a:hlink><a:srgbClr val="{}"/></a:hlink>"#, theme.secondary_color)?;
    xml.push_str(r#"<a:folHlink><a:srgbClr val="954F72"/></a:folHlink>"#);
    xml.push_str("</a:clrScheme>");

    let font = xml_text(&theme.font_family);
    xml.push_str(r#"<a:fontScheme name="Deck">"#);
    write!(
        xml,
        r#"<a:majorFont><a:latin typeface="{0}"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont>"#,
        font
    )?;
    write!(
        xml,
        r#"<a:minorFont><a:latin typeface="{0}"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont>"#,
        font
    )?;
    xml.push_str("</a:fontScheme>");

    let solid = r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#;
    xml.push_str(r#"<a:fmtScheme name="Deck">"#);
    xml.push_str("<a:fillStyleLst>");
    for _ in 0..3 {
        xml.push_str(solid);
    }
    xml.push_str("</a:fillStyleLst><a:lnStyleLst>");
    for width in [6350, 12700, 19050] {
        write!(xml, r#"<a:ln w="{}">{}</a:ln>"#, width, solid)?;
    }
    xml.push_str("</a:lnStyleLst><a:effectStyleLst>");
    for _ in 0..3 {
        xml.push_str("<a:effectStyle><a:effectLst/></a:effectStyle>");
    }
    xml.push_str("</a:effectStyleLst><a:bgFillStyleLst>");
    for _ in 0..3 {
        xml.push_str(solid);
    }
    xml.push_str("</a:bgFillStyleLst></a:fmtScheme>");

    xml.push_str("</a:themeElements><a:objectDefaults/><a:extraClrSchemeLst/></a:theme>");
    Ok(xml)
}

/// `ppt/slideMasters/slideMaster1.xml`
pub(crate) fn slide_master_xml(theme: &Theme) -> Result<String, fmt::Error> {
    let mut xml = String::with_capacity(4096);
    xml.push_str(XML_DECLARATION);
    write!(xml, r#"<p:sldMaster xmlns:a="{}" xmlns:r="{}" xmlns:p="{}">"#, NS_A, NS_R, NS_P)?;
    xml.push_str("<p:cSld>");
    xml.push_str(r#"<p:bg><p:bgPr><a:solidFill><a:srgbClr val="FFFFFF"/></a:solidFill><a:effectLst/></p:bgPr></p:bg>"#);
    xml.push_str("<p:spTree>");
    write_group_properties(&mut xml);

    // ヘッダー帯・フッター帯
    write_band(&mut xml, 2, "Header Band", 0, HEADER_HEIGHT, &theme.primary_color)?;
    write_band(
        &mut xml,
        3,
        "Footer Band",
        FOOTER_TOP,
        SLIDE_HEIGHT - FOOTER_TOP,
        &theme.primary_color,
    )?;

    // フッター文字列
    xml.push_str("<p:sp><p:nvSpPr>");
    xml.push_str(r#"<p:cNvPr id="4" name="Footer Text"/><p:cNvSpPr txBox="1"/><p:nvPr userDrawn="1"/>"#);
    xml.push_str("</p:nvSpPr><p:spPr>");
    write_xfrm(&mut xml, MARGIN, FOOTER_TOP, SLIDE_WIDTH / 2, SLIDE_HEIGHT - FOOTER_TOP)?;
    xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr>"#);
    xml.push_str(r#"<p:txBody><a:bodyPr wrap="none" lIns="0" anchor="ctr"/><a:lstStyle/><a:p><a:r>"#);
    write!(
        xml,
        r#"<a:rPr lang="en-US" sz="1000"><a:solidFill><a:srgbClr val="FFFFFF"/></a:solidFill><a:latin typeface="{}"/></a:rPr>"#,
        xml_text(&theme.font_family)
    )?;
    write!(xml, "<a:t>{}</a:t>", xml_text(&footer_text(theme)))?;
    xml.push_str("</a:r></a:p></p:txBody></p:sp>");

    // スライド番号プレースホルダー
    xml.push_str("<p:sp><p:nvSpPr>");
    xml.push_str(r#"<p:cNvPr id="5" name="Slide Number Placeholder"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr>"#);
    xml.push_str(r#"<p:nvPr><p:ph type="sldNum" sz="quarter" idx="12"/></p:nvPr>"#);
    xml.push_str("</p:nvSpPr><p:spPr>");
    write_slide_number_xfrm(&mut xml)?;
    xml.push_str("</p:spPr>");
    xml.push_str(r#"<p:txBody><a:bodyPr anchor="ctr"/><a:lstStyle><a:lvl1pPr algn="r">"#);
    xml.push_str(r#"<a:defRPr sz="1000"><a:solidFill><a:srgbClr val="FFFFFF"/></a:solidFill></a:defRPr>"#);
    xml.push_str(r#"</a:lvl1pPr></a:lstStyle><a:p><a:fld id="{B6F15528-21DE-4FAA-801E-634DDDAF4B2B}" type="slidenum">"#);
    xml.push_str(r#"<a:rPr lang="en-US"/><a:t>‹#›</a:t></a:fld><a:endParaRPr lang="en-US"/></a:p></p:txBody></p:sp>"#);

    xml.push_str("</p:spTree></p:cSld>");
    xml.push_str(r#"<p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" "#);
    xml.push_str(r#"accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/>"#);
    xml.push_str(r#"<p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst>"#);

    let font = xml_text(&theme.font_family);
    xml.push_str("<p:txStyles>");
    write!(
        xml,
        r#"<p:titleStyle><a:lvl1pPr><a:defRPr sz="2800" b="1"><a:solidFill><a:srgbClr val="{}"/></a:solidFill><a:latin typeface="{}"/></a:defRPr></a:lvl1pPr></p:titleStyle>"#,
        theme.primary_color, font
    )?;
    write!(
        xml,
        r#"<p:bodyStyle><a:lvl1pPr><a:defRPr sz="1800"><a:solidFill><a:srgbClr val="262626"/></a:solidFill><a:latin typeface="{}"/></a:defRPr></a:lvl1pPr></p:bodyStyle>"#,
        font
    )?;
    write!(
        xml,
        r#"<p:otherStyle><a:lvl1pPr><a:defRPr sz="1200"><a:latin typeface="{}"/></a:defRPr></a:lvl1pPr></p:otherStyle>"#,
        font
    )?;
    xml.push_str("</p:txStyles></p:sldMaster>");
    Ok(xml)
}

/// `ppt/slideMasters/_rels/slideMaster1.xml.rels`
pub(crate) fn slide_master_rels() -> String {
    relationships(&[
        ("rId1", REL_SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml"),
        ("rId2", REL_THEME, "../theme/theme1.xml"),
    ])
}

/// `ppt/slideLayouts/slideLayout1.xml`（白紙レイアウト）
pub(crate) fn slide_layout_xml() -> Result<String, fmt::Error> {
    let mut xml = String::with_capacity(1024);
    xml.push_str(XML_DECLARATION);
    write!(
        xml,
        r#"<p:sldLayout xmlns:a="{}" xmlns:r="{}" xmlns:p="{}" type="blank" preserve="1">"#,
        NS_A, NS_R, NS_P
    )?;
    xml.push_str(r#"<p:cSld name="Blank"><p:spTree>"#);
    write_group_properties(&mut xml);
    xml.push_str("</p:spTree></p:cSld>");
    xml.push_str("<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>");
    Ok(xml)
}

/// `ppt/slideLayouts/_rels/slideLayout1.xml.rels`
pub(crate) fn slide_layout_rels() -> String {
    relationships(&[("rId1", REL_SLIDE_MASTER, "../slideMasters/slideMaster1.xml")])
}

/// `ppt/presProps.xml`
pub(crate) fn pres_props_xml() -> String {
    format!(
        r#"{}<p:presentationPr xmlns:a="{}" xmlns:r="{}" xmlns:p="{}"/>"#,
        XML_DECLARATION, NS_A, NS_R, NS_P
    )
}

/// `ppt/viewProps.xml`
pub(crate) fn view_props_xml() -> String {
    format!(
        r#"{}<p:viewPr xmlns:a="{}" xmlns:r="{}" xmlns:p="{}"><p:gridSpacing cx="76200" cy="76200"/></p:viewPr>"#,
        XML_DECLARATION, NS_A, NS_R, NS_P
    )
}

/// `ppt/tableStyles.xml`
pub(crate) fn table_styles_xml() -> String {
    format!(
        r#"{}<a:tblStyleLst xmlns:a="{}" def="{{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}}"/>"#,
        XML_DECLARATION, NS_A
    )
}

/// `docProps/core.xml`
///
/// 作成日時は出力バイト列の中で唯一、実行ごとに変化する値です。
pub(crate) fn core_props_xml(theme: &Theme, created: DateTime<Utc>) -> Result<String, fmt::Error> {
    let timestamp = created.to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut xml = String::with_capacity(1024);
    xml.push_str(XML_DECLARATION);
    xml.push_str(r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" "#);
    xml.push_str(r#"xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" "#);
    xml.push_str(r#"xmlns:dcmitype="http://purl.org/dc/dcmitype/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#);
    write!(xml, "<dc:title>{}</dc:title>", xml_text(&theme.company_name))?;
    write!(xml, "<dc:creator>{}</dc:creator>", xml_text(&theme.company_name))?;
    write!(xml, r#"<dcterms:created xsi:type="dcterms:W3CDTF">{}</dcterms:created>"#, timestamp)?;
    write!(xml, r#"<dcterms:modified xsi:type="dcterms:W3CDTF">{}</dcterms:modified>"#, timestamp)?;
    xml.push_str("</cp:coreProperties>");
    Ok(xml)
}

/// `docProps/app.xml`
pub(crate) fn app_props_xml(slide_count: usize) -> Result<String, fmt::Error> {
    let mut xml = String::with_capacity(512);
    xml.push_str(XML_DECLARATION);
    xml.push_str(r#"<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties" "#);
    xml.push_str(r#"xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes">"#);
    write!(xml, "<Application>xlsxdeck</Application><Slides>{}</Slides>", slide_count)?;
    xml.push_str("<PresentationFormat>Widescreen</PresentationFormat></Properties>");
    Ok(xml)
}

pub(crate) const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub(crate) const REL_CORE_PROPS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
pub(crate) const REL_APP_PROPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties";
pub(crate) const REL_SLIDE_MASTER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";
pub(crate) const REL_SLIDE_LAYOUT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
pub(crate) const REL_SLIDE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
pub(crate) const REL_THEME: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme";
pub(crate) const REL_CHART: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/chart";
pub(crate) const REL_PRES_PROPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/presProps";
pub(crate) const REL_VIEW_PROPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/viewProps";
pub(crate) const REL_TABLE_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/tableStyles";

/// リレーションシップパーツ（`*.rels`）を生成
///
/// # 引数
///
/// * `entries` - `(Id, Type, Target)`の組
pub(crate) fn relationships(entries: &[(&str, &str, &str)]) -> String {
    let mut xml = String::with_capacity(256 + entries.len() * 160);
    xml.push_str(XML_DECLARATION);
    xml.push_str(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#);
    for (id, rel_type, target) in entries {
        xml.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
            id, rel_type, target
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

/// グループシェイプの必須プロパティ
pub(crate) fn write_group_properties(xml: &mut String) {
    xml.push_str(r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#);
    xml.push_str("<p:grpSpPr><a:xfrm>");
    xml.push_str(r#"<a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/>"#);
    xml.push_str("</a:xfrm></p:grpSpPr>");
}

pub(crate) fn write_xfrm(xml: &mut String, x: i64, y: i64, cx: i64, cy: i64) -> fmt::Result {
    write!(
        xml,
        r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
        x, y, cx, cy
    )
}

/// スライド番号の位置（フッター帯の右端）
pub(crate) fn write_slide_number_xfrm(xml: &mut String) -> fmt::Result {
    let width = 1_828_800;
    write_xfrm(
        xml,
        SLIDE_WIDTH - MARGIN - width,
        FOOTER_TOP,
        width,
        SLIDE_HEIGHT - FOOTER_TOP,
    )
}

fn write_band(xml: &mut String, id: u32, name: &str, y: i64, height: i64, color: &str) -> fmt::Result {
    xml.push_str("<p:sp><p:nvSpPr>");
    write!(xml, r#"<p:cNvPr id="{}" name="{}"/><p:cNvSpPr/><p:nvPr userDrawn="1"/>"#, id, name)?;
    xml.push_str("</p:nvSpPr><p:spPr>");
    write_xfrm(xml, 0, y, SLIDE_WIDTH, height)?;
    xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom>"#);
    write!(xml, r#"<a:solidFill><a:srgbClr val="{}"/></a:solidFill><a:ln><a:noFill/></a:ln>"#, color)?;
    xml.push_str("</p:spPr></p:sp>");
    Ok(())
}
