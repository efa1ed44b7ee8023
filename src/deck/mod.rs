//! Deck Synthesis Module
//!
//! 解析済みワークブックからスライドを計画し、PPTXコンテナとして組み立てるモジュール。
//!
//! 処理は以下の順に進みます。
//!
//! 1. 計画: 表紙、エグゼクティブサマリー、シートごとの表・グラフスライドを決定
//! 2. 描画: 各スライドとグラフのXMLを並列に生成
//! 3. 組み立て: テーマ由来のマスター・レイアウトと合わせてZIPに格納
//! 4. 自己検証: 出力を再度開いて構造を確認

mod chart;
mod classify;
mod package;
mod slides;
mod template;

use chrono::Utc;
use rayon::prelude::*;
use std::borrow::Cow;
use std::fmt;

pub use classify::{ChartData, ChartSeries, HeaderHeuristic, SheetClassifier, SheetShape};
pub use package::verify_container;

use crate::api::{SynthesisOptions, Theme};
use crate::error::GenerationFailure;
use crate::progress::{CancellationToken, ProgressSink};
use crate::types::{MetricsMap, ParsedWorkbook, Slide, SlideKind};
use chart::ChartKind;
use package::PackagePart;
use slides::SlideContent;

/// 表紙のタイトル
pub const TITLE_SLIDE_TITLE: &str = "Financial Model Analysis";

/// サマリースライドのタイトル
pub const SUMMARY_SLIDE_TITLE: &str = "Executive Summary";

static DEFAULT_CLASSIFIER: HeaderHeuristic = HeaderHeuristic;

/// 生成されたデッキ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedDeck {
    /// PPTXコンテナのバイト列（自己検証済み）
    pub document: Vec<u8>,
    /// スライドの概要（デッキ順、`id`は1から連番）
    pub slides: Vec<Slide>,
}

/// 既定のオプションでデッキを生成
///
/// # 引数
///
/// * `workbook` - 解析済みワークブック
/// * `metrics` - 抽出済みの財務指標（サマリースライドに表示）
/// * `theme` - デッキのテーマ
/// * `progress` - 0〜100の進捗を受け取るシンク
///
/// # 戻り値
///
/// * `Ok(SynthesizedDeck)` - 自己検証済みのデッキ
/// * `Err(GenerationFailure)` - スライド化できるシートがない、シリアライズや自己検証に失敗した場合
///
/// # 例
///
/// ```rust,no_run
/// use xlsxdeck::{extract, parse_workbook, synthesize, NoProgress, RawFile, SecurityPolicy, Theme, XLSX_MIME_TYPE};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("model.xlsx")?;
/// let file = RawFile::new("model.xlsx", XLSX_MIME_TYPE, bytes);
/// let workbook = parse_workbook(&file, &SecurityPolicy::default())?;
/// let metrics = extract(&workbook);
/// let deck = synthesize(&workbook, &metrics, &Theme::default(), &NoProgress)?;
/// std::fs::write("model.pptx", &deck.document)?;
/// # Ok(())
/// # }
/// ```
pub fn synthesize(
    workbook: &ParsedWorkbook,
    metrics: &MetricsMap,
    theme: &Theme,
    progress: &dyn ProgressSink,
) -> Result<SynthesizedDeck, GenerationFailure> {
    Synthesizer::new(theme).synthesize(workbook, metrics, progress, &CancellationToken::new())
}

/// スライドシンセサイザー
///
/// テーマ、オプション、シート分類の判定戦略を保持します。
pub struct Synthesizer<'a> {
    theme: &'a Theme,
    options: SynthesisOptions,
    classifier: &'a dyn SheetClassifier,
}

/// 計画済みのスライド
struct PlannedSlide<'w> {
    slide: Slide,
    content: SlideContent<'w>,
    /// グラフパーツの番号（`chartN.xml`）
    chart_number: Option<usize>,
}

/// 描画済みのスライド
struct RenderedSlide {
    xml: String,
    rels: String,
    chart: Option<(usize, String)>,
}

impl<'a> Synthesizer<'a> {
    /// 既定のオプションと判定戦略でシンセサイザーを生成
    pub fn new(theme: &'a Theme) -> Self {
        Self {
            theme,
            options: SynthesisOptions::default(),
            classifier: &DEFAULT_CLASSIFIER,
        }
    }

    pub fn with_options(mut self, options: SynthesisOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_classifier(mut self, classifier: &'a dyn SheetClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// デッキを生成
    ///
    /// 各シートの処理前、描画後、パッケージング前後でキャンセルを確認し、
    /// 観測した場合は`GenerationFailure::Cancelled`を返します。
    ///
    /// # 引数
    ///
    /// * `workbook` - 解析済みワークブック
    /// * `metrics` - 抽出済みの財務指標
    /// * `progress` - 0〜100の進捗を受け取るシンク
    /// * `cancel` - キャンセルトークン
    pub fn synthesize(
        &self,
        workbook: &ParsedWorkbook,
        metrics: &MetricsMap,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<SynthesizedDeck, GenerationFailure> {
        let theme = self
            .theme
            .normalized()
            .map_err(GenerationFailure::SerializationFailure)?;

        progress.report(0.0, "Planning slides");
        let planned = self.plan(workbook, metrics, &theme, progress, cancel)?;

        progress.report(60.0, &format!("Rendering {} slides", planned.len()));
        let rendered = planned
            .par_iter()
            .map(|planned| render(planned, &theme))
            .collect::<Result<Vec<_>, fmt::Error>>()
            .map_err(|_| render_failure("slide"))?;
        check_cancelled(cancel)?;

        progress.report(80.0, "Packaging presentation");
        let parts = assemble(&rendered, &theme)?;
        let document = package::serialize(&parts, self.options.compression_timeout, progress, 80.0)?;
        check_cancelled(cancel)?;

        progress.report(90.0, "Verifying presentation");
        verify_container(&document)?;

        let slides: Vec<Slide> = planned.into_iter().map(|planned| planned.slide).collect();
        log::debug!(
            "Synthesized {} slides ({} bytes)",
            slides.len(),
            document.len()
        );
        progress.report(100.0, &format!("Generated {} slides", slides.len()));

        Ok(SynthesizedDeck { document, slides })
    }

    fn plan<'w>(
        &self,
        workbook: &'w ParsedWorkbook,
        metrics: &MetricsMap,
        theme: &Theme,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Vec<PlannedSlide<'w>>, GenerationFailure> {
        let mut plan = DeckPlan::default();

        plan.push(
            TITLE_SLIDE_TITLE,
            SlideKind::Title,
            format!("{} | {}", theme.company_name, workbook.metadata.file_name),
            SlideContent::Title {
                subtitle: format!("{} | {}", theme.company_name, workbook.metadata.file_name),
            },
        );
        plan.push(
            SUMMARY_SLIDE_TITLE,
            SlideKind::Summary,
            slides::summary_preview(&workbook.metadata, metrics),
            SlideContent::Bullets {
                lines: slides::summary_lines(&workbook.metadata, &workbook.validation, metrics),
            },
        );

        let sheet_count = workbook.sheets.len().max(1);
        for (index, sheet) in workbook.sheets.iter().enumerate() {
            check_cancelled(cancel)?;

            if sheet.rows.len() < 2 {
                log::debug!("Skipping sheet '{}': fewer than 2 rows", sheet.name);
                continue;
            }

            let rows = classify::truncate(&sheet.rows, self.options.max_rows_per_slide);
            let shape = self.classifier.classify(rows);
            if shape.is_skipped() {
                log::debug!("Skipping sheet '{}': neither tabular nor chartable", sheet.name);
            }

            if shape.tabular {
                let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
                plan.push(
                    &sheet.name,
                    SlideKind::Table,
                    table_preview(rows.len(), sheet.rows.len(), columns),
                    SlideContent::Table { rows },
                );
            }

            if shape.chartable {
                let bar = classify::bar_chart_data(rows, self.options.max_chart_series);
                if !bar.is_empty() {
                    let combo = classify::combo_chart_data(&bar);
                    plan.push(
                        &format!("{} - Overview", sheet.name),
                        SlideKind::Chart,
                        series_preview(&bar),
                        SlideContent::Chart {
                            kind: ChartKind::Bar,
                            data: bar,
                        },
                    );
                    if self.options.include_combo_charts {
                        plan.push(
                            &format!("{} - Trend", sheet.name),
                            SlideKind::Combo,
                            series_preview(&combo),
                            SlideContent::Chart {
                                kind: ChartKind::Combo,
                                data: combo,
                            },
                        );
                    }
                } else {
                    log::debug!("Sheet '{}' has no non-zero series", sheet.name);
                }

                if self.options.include_pie_charts {
                    let pie = classify::pie_chart_data(rows);
                    if !pie.is_empty() {
                        let segments = pie.categories.len();
                        plan.push(
                            &format!("{} - Composition", sheet.name),
                            SlideKind::Pie,
                            format!("{} segments", segments),
                            SlideContent::Chart {
                                kind: ChartKind::Doughnut,
                                data: pie,
                            },
                        );
                    }
                }
            }

            let percent = 10.0 + 50.0 * (index + 1) as f64 / sheet_count as f64;
            progress.report(percent, &format!("Analyzed sheet '{}'", sheet.name));
        }

        if plan.slides.len() <= 2 {
            return Err(GenerationFailure::EmptyInput);
        }
        Ok(plan.slides)
    }
}

/// スライド番号とグラフ番号を採番しながら計画を積み上げる
#[derive(Default)]
struct DeckPlan<'w> {
    slides: Vec<PlannedSlide<'w>>,
    charts: usize,
}

impl<'w> DeckPlan<'w> {
    fn push(&mut self, title: &str, kind: SlideKind, preview: String, content: SlideContent<'w>) {
        let chart_number = content.chart().map(|_| {
            self.charts += 1;
            self.charts
        });
        let id = self.slides.len() as u32 + 1;
        self.slides.push(PlannedSlide {
            slide: Slide {
                id,
                title: title.to_string(),
                kind,
                preview,
            },
            content,
            chart_number,
        });
    }
}

fn table_preview(shown: usize, total: usize, columns: usize) -> String {
    if shown < total {
        format!("{} of {} rows x {} columns", shown, total, columns)
    } else {
        format!("{} rows x {} columns", shown, columns)
    }
}

fn series_preview(data: &ChartData) -> String {
    let names: Vec<&str> = data.series.iter().map(|s| s.name.as_str()).collect();
    format!("{} series: {}", names.len(), names.join(", "))
}

fn render(planned: &PlannedSlide<'_>, theme: &Theme) -> Result<RenderedSlide, fmt::Error> {
    let xml = slides::slide_xml(&planned.slide, &planned.content, theme)?;
    let rels = slides::slide_rels(planned.chart_number);
    let chart = match (planned.chart_number, planned.content.chart()) {
        (Some(number), Some((kind, data))) => Some((number, chart::chart_xml(kind, data, theme)?)),
        _ => None,
    };
    Ok(RenderedSlide { xml, rels, chart })
}

/// コンテナに格納するパーツを組み立てる（先頭は`[Content_Types].xml`）
fn assemble(rendered: &[RenderedSlide], theme: &Theme) -> Result<Vec<PackagePart>, GenerationFailure> {
    let slide_count = rendered.len();
    let chart_count = rendered.iter().filter(|slide| slide.chart.is_some()).count();

    let mut parts = Vec::with_capacity(16 + slide_count * 2 + chart_count);
    parts.push(PackagePart::new(
        package::CONTENT_TYPES_PATH,
        package::content_types_xml(slide_count, chart_count)
            .map_err(|_| render_failure("content types"))?,
    ));
    parts.push(PackagePart::new("_rels/.rels", package::root_rels()));
    parts.push(PackagePart::new(
        "docProps/core.xml",
        template::core_props_xml(theme, Utc::now()).map_err(|_| render_failure("document properties"))?,
    ));
    parts.push(PackagePart::new(
        "docProps/app.xml",
        template::app_props_xml(slide_count).map_err(|_| render_failure("document properties"))?,
    ));
    parts.push(PackagePart::new(
        package::PRESENTATION_PATH,
        package::presentation_xml(slide_count).map_err(|_| render_failure("presentation"))?,
    ));
    parts.push(PackagePart::new(
        "ppt/_rels/presentation.xml.rels",
        package::presentation_rels(slide_count),
    ));
    parts.push(PackagePart::new(
        "ppt/slideMasters/slideMaster1.xml",
        template::slide_master_xml(theme).map_err(|_| render_failure("slide master"))?,
    ));
    parts.push(PackagePart::new(
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        template::slide_master_rels(),
    ));
    parts.push(PackagePart::new(
        "ppt/slideLayouts/slideLayout1.xml",
        template::slide_layout_xml().map_err(|_| render_failure("slide layout"))?,
    ));
    parts.push(PackagePart::new(
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
        template::slide_layout_rels(),
    ));
    parts.push(PackagePart::new(
        "ppt/theme/theme1.xml",
        template::theme_xml(theme).map_err(|_| render_failure("theme"))?,
    ));
    parts.push(PackagePart::new("ppt/presProps.xml", template::pres_props_xml()));
    parts.push(PackagePart::new("ppt/viewProps.xml", template::view_props_xml()));
    parts.push(PackagePart::new("ppt/tableStyles.xml", template::table_styles_xml()));

    for (index, slide) in rendered.iter().enumerate() {
        let number = index + 1;
        parts.push(PackagePart::new(
            format!("ppt/slides/slide{}.xml", number),
            slide.xml.clone(),
        ));
        parts.push(PackagePart::new(
            format!("ppt/slides/_rels/slide{}.xml.rels", number),
            slide.rels.clone(),
        ));
    }
    for (number, xml) in rendered.iter().filter_map(|slide| slide.chart.as_ref()) {
        parts.push(PackagePart::new(
            format!("ppt/charts/chart{}.xml", number),
            xml.clone(),
        ));
    }

    Ok(parts)
}

fn render_failure(part: &str) -> GenerationFailure {
    GenerationFailure::SerializationFailure(format!("failed to render {} XML", part))
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), GenerationFailure> {
    if cancel.is_cancelled() {
        Err(GenerationFailure::Cancelled)
    } else {
        Ok(())
    }
}

/// XMLのテキスト・属性値として安全な文字列に変換
///
/// XML 1.0で使用できない制御文字（タブ、改行、復帰を除く）を除去してからエスケープします。
pub(crate) fn xml_text(text: &str) -> String {
    let cleaned: Cow<'_, str> = if text.chars().any(is_invalid_xml_char) {
        Cow::Owned(text.chars().filter(|c| !is_invalid_xml_char(*c)).collect())
    } else {
        Cow::Borrowed(text)
    };
    quick_xml::escape::escape(&cleaned).into_owned()
}

fn is_invalid_xml_char(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CellValue, MetricKey, Row, Sheet, ValidationReport, WorkbookMetadata};
    use std::collections::BTreeMap;
    use std::io::{Cursor, Read};
    use std::sync::Mutex;

    fn s(value: &str) -> CellValue {
        CellValue::String(value.to_string())
    }

    fn n(value: f64) -> CellValue {
        CellValue::Number(value)
    }

    fn workbook(sheets: Vec<Sheet>) -> ParsedWorkbook {
        ParsedWorkbook {
            metadata: WorkbookMetadata {
                file_name: "model.xlsx".to_string(),
                file_size: 2048,
                sheet_count: sheets.len(),
                total_row_count: sheets.iter().map(|sheet| sheet.rows.len()).sum(),
                parse_duration_ms: 3,
            },
            sheets,
            named_ranges: BTreeMap::new(),
            validation: ValidationReport {
                is_valid: true,
                ..ValidationReport::default()
            },
        }
    }

    fn scenario_a() -> ParsedWorkbook {
        workbook(vec![
            Sheet::new(
                "DCF_Summary",
                vec![
                    vec![s("Metric"), s("Value")],
                    vec![s("Enterprise Value"), n(125_000_000.0)],
                    vec![s("Equity Value"), n(98_000_000.0)],
                ],
            ),
            Sheet::new(
                "Revenue",
                vec![
                    vec![s("Year"), s("Revenue"), s("EBITDA")],
                    vec![n(2023.0), n(100.0), n(20.0)],
                    vec![n(2024.0), n(120.0), n(26.0)],
                ],
            ),
        ])
    }

    fn entry_names(document: &[u8]) -> Vec<String> {
        let archive = zip::ZipArchive::new(Cursor::new(document)).unwrap();
        archive.file_names().map(str::to_string).collect()
    }

    #[test]
    fn test_synthesize_scenario_a() {
        let mut metrics = MetricsMap::new();
        metrics.insert(MetricKey::EnterpriseValue, 125_000_000.0);

        let deck = synthesize(&scenario_a(), &metrics, &Theme::default(), &crate::NoProgress).unwrap();
        let kinds: Vec<SlideKind> = deck.slides.iter().map(|slide| slide.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SlideKind::Title,
                SlideKind::Summary,
                SlideKind::Table,
                SlideKind::Chart,
                SlideKind::Table,
                SlideKind::Chart,
            ]
        );
        let ids: Vec<u32> = deck.slides.iter().map(|slide| slide.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(deck.slides[2].title, "DCF_Summary");
        assert_eq!(deck.slides[5].title, "Revenue - Overview");
        assert_eq!(deck.slides[5].preview, "2 series: Revenue, EBITDA");
        assert_eq!(deck.slides[1].preview, "EV: $125M");

        let names = entry_names(&deck.document);
        assert!(names.contains(&"ppt/slides/slide6.xml".to_string()));
        assert!(names.contains(&"ppt/charts/chart2.xml".to_string()));
        assert!(!names.contains(&"ppt/charts/chart3.xml".to_string()));
    }

    #[test]
    fn test_synthesize_optional_charts() {
        let theme = Theme::default();
        let options = SynthesisOptions {
            include_combo_charts: true,
            include_pie_charts: true,
            ..SynthesisOptions::default()
        };
        let wb = workbook(vec![scenario_a().sheets.remove(1)]);
        let deck = Synthesizer::new(&theme)
            .with_options(options)
            .synthesize(&wb, &MetricsMap::new(), &crate::NoProgress, &CancellationToken::new())
            .unwrap();

        let titles: Vec<&str> = deck.slides.iter().map(|slide| slide.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                TITLE_SLIDE_TITLE,
                SUMMARY_SLIDE_TITLE,
                "Revenue",
                "Revenue - Overview",
                "Revenue - Trend",
                "Revenue - Composition",
            ]
        );
        assert_eq!(deck.slides[5].kind, SlideKind::Pie);
    }

    #[test]
    fn test_synthesize_empty_input() {
        let wb = workbook(vec![
            Sheet::new("Blank", Vec::new()),
            Sheet::new("One", vec![vec![s("Only header")]]),
        ]);
        let result = synthesize(&wb, &MetricsMap::new(), &Theme::default(), &crate::NoProgress);
        assert_eq!(result, Err(GenerationFailure::EmptyInput));
    }

    #[test]
    fn test_synthesize_truncates_table_rows() {
        let mut rows: Vec<Row> = vec![vec![s("Period"), s("Cash")]];
        rows.extend((0..120).map(|i| vec![n(i as f64), n(1.0)]));
        let wb = workbook(vec![Sheet::new("Cash Flow", rows)]);

        let deck = synthesize(&wb, &MetricsMap::new(), &Theme::default(), &crate::NoProgress).unwrap();
        assert_eq!(deck.slides[2].preview, "51 of 121 rows x 2 columns");

        let mut archive = zip::ZipArchive::new(Cursor::new(deck.document)).unwrap();
        let mut xml = String::new();
        archive
            .by_name("ppt/slides/slide3.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        assert_eq!(xml.matches("<a:tr ").count(), 51);
    }

    #[test]
    fn test_synthesize_observes_cancellation() {
        let theme = Theme::default();
        let token = CancellationToken::new();
        token.cancel();
        let result = Synthesizer::new(&theme).synthesize(
            &scenario_a(),
            &MetricsMap::new(),
            &crate::NoProgress,
            &token,
        );
        assert_eq!(result, Err(GenerationFailure::Cancelled));
    }

    #[test]
    fn test_synthesize_progress_is_monotonic() {
        let seen = Mutex::new(Vec::new());
        let sink = |percent: f64, _: &str| seen.lock().unwrap().push(percent);
        synthesize(&scenario_a(), &MetricsMap::new(), &Theme::default(), &sink).unwrap();

        let seen = seen.into_inner().unwrap();
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(seen.last(), Some(&100.0));
    }

    #[test]
    fn test_synthesize_with_custom_classifier() {
        struct ChartsOnly;
        impl SheetClassifier for ChartsOnly {
            fn classify(&self, _rows: &[Row]) -> SheetShape {
                SheetShape {
                    tabular: false,
                    chartable: true,
                }
            }
        }

        let theme = Theme::default();
        let deck = Synthesizer::new(&theme)
            .with_classifier(&ChartsOnly)
            .synthesize(&scenario_a(), &MetricsMap::new(), &crate::NoProgress, &CancellationToken::new())
            .unwrap();
        assert!(deck.slides[2..].iter().all(|slide| slide.kind == SlideKind::Chart));
    }

    #[test]
    fn test_synthesize_rejects_invalid_theme() {
        let theme = Theme {
            primary_color: "\"/><evil".to_string(),
            ..Theme::default()
        };
        let result = synthesize(&scenario_a(), &MetricsMap::new(), &theme, &crate::NoProgress);
        assert!(matches!(result, Err(GenerationFailure::SerializationFailure(_))));
    }

    #[test]
    fn test_xml_text() {
        assert_eq!(xml_text("P&L <FY24>"), "P&amp;L &lt;FY24&gt;");
        assert_eq!(xml_text("a\u{1}b\tc"), "ab\tc");
        assert_eq!(xml_text("plain"), "plain");
    }
}
