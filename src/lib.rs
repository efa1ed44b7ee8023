//! xlsxdeck - Pure-Rust financial model to slide deck converter
//!
//! This crate turns an uploaded spreadsheet workbook (a financial model in XLSX
//! format) into a formatted PPTX slide deck without any server round-trip: the
//! workbook bytes are validated, decoded, sanitized, mined for headline metrics
//! and rendered into title, summary, table and chart slides entirely in memory.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use xlsxdeck::{ProcessingOutcome, ProcessorBuilder, RawFile, XLSX_MIME_TYPE};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create a processor with default settings
//!     let processor = ProcessorBuilder::new().build()?;
//!
//!     // The pipeline never reads from disk itself: hand it the bytes
//!     let bytes = std::fs::read("model.xlsx")?;
//!     let file = RawFile::new("model.xlsx", XLSX_MIME_TYPE, bytes);
//!
//!     let progress = |percent: f64, message: &str| println!("{:>3.0}% {}", percent, message);
//!     match processor.process(file, None, &progress) {
//!         ProcessingOutcome::Completed(report) => {
//!             std::fs::write("model.pptx", &report.document)?;
//!             for slide in &report.slides {
//!                 println!("{:>2}. {} ({})", slide.id, slide.title, slide.preview);
//!             }
//!         }
//!         ProcessingOutcome::Failed(failure) => eprintln!("{}", failure.message),
//!         ProcessingOutcome::Cancelled => eprintln!("cancelled"),
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Custom Theme
//!
//! ```rust,no_run
//! use xlsxdeck::{ProcessorBuilder, SecurityPolicy, ThemeOverrides};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let processor = ProcessorBuilder::new()
//!         .with_security_policy(SecurityPolicy {
//!             max_file_size: 20 * 1024 * 1024,
//!             ..SecurityPolicy::default()
//!         })
//!         .with_theme_overrides(ThemeOverrides {
//!             company_name: Some("Acme Capital".to_string()),
//!             primary_color: Some("#0B3D2E".to_string()),
//!             ..ThemeOverrides::default()
//!         })
//!         .build()?;
//!     # let _ = processor;
//!     Ok(())
//! }
//! ```
//!
//! # Individual Stages
//!
//! Each stage is also usable on its own:
//!
//! ```rust,no_run
//! use xlsxdeck::{extract, parse_workbook, synthesize, NoProgress, RawFile, SecurityPolicy, Theme, XLSX_MIME_TYPE};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let file = RawFile::new("model.xlsx", XLSX_MIME_TYPE, std::fs::read("model.xlsx")?);
//!     let workbook = parse_workbook(&file, &SecurityPolicy::default())?;
//!     let metrics = extract(&workbook);
//!     let deck = synthesize(&workbook, &metrics, &Theme::default(), &NoProgress)?;
//!     println!("{} slides, {} bytes", deck.slides.len(), deck.document.len());
//!     Ok(())
//! }
//! ```

mod api;
mod builder;
mod deck;
mod error;
mod metrics;
mod parser;
mod pipeline;
mod progress;
mod sanitize;
mod security;
mod types;

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
mod wasm;

// 公開API
pub use api::{
    SecurityPolicy, SynthesisOptions, Theme, ThemeOverrides, XLSX_MIME_TYPE, XLS_MIME_TYPE,
};
pub use builder::ProcessorBuilder;
pub use deck::{
    synthesize, verify_container, ChartData, ChartSeries, HeaderHeuristic, SheetClassifier,
    SheetShape, SynthesizedDeck, Synthesizer, SUMMARY_SLIDE_TITLE, TITLE_SLIDE_TITLE,
};
pub use error::{GenerationFailure, ParseFailure, PipelineError, SecurityViolation};
pub use metrics::{extract, extract_with, KeywordHeuristic, MetricHeuristic};
pub use parser::{parse_with, parse_workbook, ContainerParser, WorkbookParser};
pub use pipeline::{
    CancelHandle, ProcessingFailure, ProcessingOutcome, ProcessingReport, ProcessingSession,
    ProcessingStep, Processor, StepId, StepStatus,
};
pub use progress::{CancellationToken, NoProgress, ProgressSink};
pub use security::validate as validate_file;
pub use types::{
    CellValue, MetricKey, MetricsMap, ParsedWorkbook, RawFile, Row, Sheet, Slide, SlideKind,
    ValidationReport, WorkbookMetadata,
};
