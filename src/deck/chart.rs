//! Chart Part Module
//!
//! グラフパーツ（`ppt/charts/chartN.xml`）のXMLを生成するモジュール。
//! データは外部ワークブックを参照せず、リテラル（`c:strLit` / `c:numLit`）として埋め込みます。

use std::fmt::{self, Write};

use super::classify::{ChartData, ChartSeries};
use super::xml_text;
use crate::api::Theme;

/// グラフの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChartKind {
    /// 集合縦棒グラフ
    Bar,
    /// 面グラフ + 折れ線の複合グラフ
    Combo,
    /// ドーナツグラフ
    Doughnut,
}

const CATEGORY_AXIS_ID: u32 = 50_010;
const VALUE_AXIS_ID: u32 = 50_020;

/// グラフパーツのXMLを生成
pub(crate) fn chart_xml(kind: ChartKind, data: &ChartData, theme: &Theme) -> Result<String, fmt::Error> {
    let mut xml = String::with_capacity(4096);

    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(r#"<c:chartSpace xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart" "#);
    xml.push_str(r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#);
    xml.push_str(r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#);
    xml.push_str(r#"<c:date1904 val="0"/><c:lang val="en-US"/><c:roundedCorners val="0"/>"#);

    xml.push_str("<c:chart>");
    xml.push_str(r#"<c:autoTitleDeleted val="1"/>"#);
    xml.push_str("<c:plotArea><c:layout/>");

    let palette = palette(theme);
    match kind {
        ChartKind::Bar => {
            xml.push_str("<c:barChart>");
            xml.push_str(r#"<c:barDir val="col"/><c:grouping val="clustered"/><c:varyColors val="0"/>"#);
            for (index, series) in data.series.iter().enumerate() {
                let color = palette[index % palette.len()];
                write_series(&mut xml, index, series, &data.categories, |xml| {
                    write_solid_fill(xml, color)?;
                    xml.push_str(r#"<c:invertIfNegative val="0"/>"#);
                    Ok(())
                })?;
            }
            xml.push_str(r#"<c:gapWidth val="80"/>"#);
            write_axis_ids(&mut xml)?;
            xml.push_str("</c:barChart>");
            write_axes(&mut xml)?;
        }
        ChartKind::Combo => {
            xml.push_str("<c:areaChart>");
            xml.push_str(r#"<c:grouping val="standard"/><c:varyColors val="0"/>"#);
            for (index, series) in data.series.iter().take(1).enumerate() {
                write_series(&mut xml, index, series, &data.categories, |xml| {
                    write!(
                        xml,
                        r#"<c:spPr><a:solidFill><a:srgbClr val="{}"><a:alpha val="40000"/></a:srgbClr></a:solidFill></c:spPr>"#,
                        theme.secondary_color
                    )
                })?;
            }
            write_axis_ids(&mut xml)?;
            xml.push_str("</c:areaChart>");

            xml.push_str("<c:lineChart>");
            xml.push_str(r#"<c:grouping val="standard"/><c:varyColors val="0"/>"#);
            for (index, series) in data.series.iter().take(1).enumerate() {
                write_series(&mut xml, index + 1, series, &data.categories, |xml| {
                    write!(
                        xml,
                        r#"<c:spPr><a:ln w="28575"><a:solidFill><a:srgbClr val="{}"/></a:solidFill></a:ln></c:spPr>"#,
                        theme.primary_color
                    )?;
                    xml.push_str(r#"<c:marker><c:symbol val="circle"/></c:marker>"#);
                    Ok(())
                })?;
            }
            xml.push_str(r#"<c:marker val="1"/>"#);
            write_axis_ids(&mut xml)?;
            xml.push_str("</c:lineChart>");
            write_axes(&mut xml)?;
        }
        ChartKind::Doughnut => {
            xml.push_str("<c:doughnutChart>");
            xml.push_str(r#"<c:varyColors val="1"/>"#);
            for (index, series) in data.series.iter().take(1).enumerate() {
                write_series(&mut xml, index, series, &data.categories, |xml| {
                    for point in 0..series.values.len() {
                        write!(
                            xml,
                            r#"<c:dPt><c:idx val="{}"/><c:bubble3D val="0"/>"#,
                            point
                        )?;
                        write_solid_fill(xml, palette[point % palette.len()])?;
                        xml.push_str("</c:dPt>");
                    }
                    Ok(())
                })?;
            }
            xml.push_str(r#"<c:firstSliceAng val="0"/><c:holeSize val="55"/>"#);
            xml.push_str("</c:doughnutChart>");
        }
    }

    xml.push_str("</c:plotArea>");
    xml.push_str(r#"<c:legend><c:legendPos val="b"/><c:overlay val="0"/></c:legend>"#);
    xml.push_str(r#"<c:plotVisOnly val="1"/><c:dispBlanksAs val="gap"/>"#);
    xml.push_str("</c:chart>");
    write!(
        xml,
        r#"<c:txPr><a:bodyPr/><a:lstStyle/><a:p><a:pPr><a:defRPr sz="1200"><a:latin typeface="{}"/></a:defRPr></a:pPr><a:endParaRPr lang="en-US"/></a:p></c:txPr>"#,
        xml_text(&theme.font_family)
    )?;
    xml.push_str("</c:chartSpace>");

    Ok(xml)
}

/// テーマから系列の配色を生成
fn palette(theme: &Theme) -> [&str; 4] {
    [
        theme.primary_color.as_str(),
        theme.secondary_color.as_str(),
        theme.accent_color.as_str(),
        "7F7F7F",
    ]
}

/// 系列を出力
///
/// `style`は`c:tx`の直後（`c:spPr`やマーカー、データポイントの位置）に書き込まれます。
fn write_series<F>(
    xml: &mut String,
    index: usize,
    series: &ChartSeries,
    categories: &[String],
    style: F,
) -> fmt::Result
where
    F: FnOnce(&mut String) -> fmt::Result,
{
    xml.push_str("<c:ser>");
    write!(xml, r#"<c:idx val="{}"/><c:order val="{}"/>"#, index, index)?;
    write!(xml, "<c:tx><c:v>{}</c:v></c:tx>", xml_text(&series.name))?;
    style(xml)?;

    xml.push_str("<c:cat><c:strLit>");
    write!(xml, r#"<c:ptCount val="{}"/>"#, categories.len())?;
    for (i, category) in categories.iter().enumerate() {
        write!(xml, r#"<c:pt idx="{}"><c:v>{}</c:v></c:pt>"#, i, xml_text(category))?;
    }
    xml.push_str("</c:strLit></c:cat>");

    xml.push_str("<c:val><c:numLit><c:formatCode>General</c:formatCode>");
    write!(xml, r#"<c:ptCount val="{}"/>"#, series.values.len())?;
    for (i, value) in series.values.iter().enumerate() {
        write!(xml, r#"<c:pt idx="{}"><c:v>{}</c:v></c:pt>"#, i, value)?;
    }
    xml.push_str("</c:numLit></c:val>");

    xml.push_str("</c:ser>");
    Ok(())
}

fn write_solid_fill(xml: &mut String, color: &str) -> fmt::Result {
    write!(xml, r#"<c:spPr><a:solidFill><a:srgbClr val="{}"/></a:solidFill></c:spPr>"#, color)
}

fn write_axis_ids(xml: &mut String) -> fmt::Result {
    write!(
        xml,
        r#"<c:axId val="{}"/><c:axId val="{}"/>"#,
        CATEGORY_AXIS_ID, VALUE_AXIS_ID
    )
}

fn write_axes(xml: &mut String) -> fmt::Result {
    xml.push_str("<c:catAx>");
    write!(xml, r#"<c:axId val="{}"/>"#, CATEGORY_AXIS_ID)?;
    xml.push_str(r#"<c:scaling><c:orientation val="minMax"/></c:scaling><c:delete val="0"/><c:axPos val="b"/>"#);
    xml.push_str(r#"<c:majorTickMark val="none"/><c:minorTickMark val="none"/><c:tickLblPos val="nextTo"/>"#);
    write!(xml, r#"<c:crossAx val="{}"/><c:crosses val="autoZero"/>"#, VALUE_AXIS_ID)?;
    xml.push_str(r#"<c:auto val="1"/><c:lblAlgn val="ctr"/><c:lblOffset val="100"/><c:noMultiLvlLbl val="0"/>"#);
    xml.push_str("</c:catAx>");

    xml.push_str("<c:valAx>");
    write!(xml, r#"<c:axId val="{}"/>"#, VALUE_AXIS_ID)?;
    xml.push_str(r#"<c:scaling><c:orientation val="minMax"/></c:scaling><c:delete val="0"/><c:axPos val="l"/>"#);
    xml.push_str(r#"<c:majorGridlines><c:spPr><a:ln w="6350"><a:solidFill><a:srgbClr val="D9D9D9"/></a:solidFill></a:ln></c:spPr></c:majorGridlines>"#);
    xml.push_str(r##"<c:numFmt formatCode="#,##0" sourceLinked="0"/>"##);
    xml.push_str(r#"<c:majorTickMark val="none"/><c:minorTickMark val="none"/><c:tickLblPos val="nextTo"/>"#);
    write!(xml, r#"<c:crossAx val="{}"/><c:crosses val="autoZero"/>"#, CATEGORY_AXIS_ID)?;
    xml.push_str(r#"<c:crossBetween val="between"/>"#);
    xml.push_str("</c:valAx>");
    Ok(())
}
