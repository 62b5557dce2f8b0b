//! Report generation: CSV + mapping → XML report on disk.
//!
//! ```text
//! Init → ConfigLoaded → Reading → Mapped → Built → (Validated) → Done
//!                          └──────────┴────────┴──────────┴──→ Failed
//! ```
//!
//! Every row is mapped, the document serialized and (optionally) validated
//! in memory before anything touches the output path. The report is then
//! written to a temporary file next to the destination and renamed over it,
//! so a failed run never leaves a partial or stale-looking report.
//!
//! # Example
//!
//! ```rust,ignore
//! use mifid_txgen::{GeneratorOptions, ReportGenerator, RunContext};
//! use std::path::Path;
//!
//! let mut generator = ReportGenerator::from_path("config/mapping.json", GeneratorOptions::default())?;
//! let report = generator.generate(
//!     Path::new("samples/trades.csv"),
//!     Path::new("out/report.xml"),
//!     &RunContext::from_process(),
//! )?;
//! println!("{} records written to {}", report.records, report.output.display());
//! ```

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::context::RunContext;
use crate::error::{CsvResult, GeneratorError, GeneratorResult};
use crate::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::mapping::{FieldMapper, MappingConfig};
use crate::parser::TabularReader;
use crate::validation::{SchemaValidator, ValidationReport, XsdValidator};
use crate::xml::build;

/// Pipeline stage of a [`ReportGenerator`].
///
/// A stage is entered when its step starts, so [`Stage::Failed`] names the
/// step that failed: `reading` for input errors, `mapped` for row mapping,
/// `built` for document assembly and `validated` for schema checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Init,
    ConfigLoaded,
    Reading,
    Mapped,
    Built,
    Validated,
    Done,
    /// The run stopped while in `stage`.
    Failed { stage: &'static str, reason: String },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::ConfigLoaded => "config-loaded",
            Stage::Reading => "reading",
            Stage::Mapped => "mapped",
            Stage::Built => "built",
            Stage::Validated => "validated",
            Stage::Done => "done",
            Stage::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Failed { stage, reason } => write!(f, "failed during {stage}: {reason}"),
            other => f.write_str(other.name()),
        }
    }
}

/// What to do with an input that has no data rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyInputPolicy {
    /// Emit a report without records.
    Allow,
    /// Fail with [`GeneratorError::EmptyInput`].
    #[default]
    RequireRecords,
}

/// XSD validation to run on the serialized report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRequest {
    pub xsd_dir: PathBuf,
    /// Entry schema; chosen from `xsd_dir` when absent.
    pub main_xsd: Option<PathBuf>,
}

/// Options for a generation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Input delimiter; detected when absent.
    pub delimiter: Option<char>,
    pub empty_input: EmptyInputPolicy,
    pub validation: Option<ValidationRequest>,
}

/// A report rendered in memory.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub xml: String,
    pub records: usize,
    pub validation: Option<ValidationReport>,
}

/// Result of a run that wrote its report.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub output: PathBuf,
    pub records: usize,
    pub bytes: usize,
    pub validation: Option<ValidationReport>,
}

/// Drives one mapping over input files.
pub struct ReportGenerator {
    config: MappingConfig,
    options: GeneratorOptions,
    validator: Box<dyn SchemaValidator>,
    stage: Stage,
}

impl fmt::Debug for ReportGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportGenerator")
            .field("config", &self.config)
            .field("options", &self.options)
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

impl ReportGenerator {
    pub fn new(config: MappingConfig, options: GeneratorOptions) -> Self {
        Self {
            config,
            options,
            validator: Box::new(XsdValidator),
            stage: Stage::ConfigLoaded,
        }
    }

    /// Load the mapping at `path`.
    pub fn from_path(path: impl AsRef<Path>, options: GeneratorOptions) -> GeneratorResult<Self> {
        let path = path.as_ref();
        log_info(format!("Loading mapping {}", path.display()));
        let config = MappingConfig::load(path).map_err(|e| {
            log_error(format!("{} failed: {e}", Stage::Init.name()));
            GeneratorError::from(e)
        })?;
        log_success(format!(
            "Mapping loaded: {} namespace(s), {} field rule(s)",
            config.namespaces.len(),
            config.fields.len()
        ));
        Ok(Self::new(config, options))
    }

    /// Use another schema validator.
    pub fn with_validator(mut self, validator: impl SchemaValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Render the report for a CSV file without writing it.
    pub fn render(&mut self, csv: &Path, ctx: &RunContext) -> GeneratorResult<Rendered> {
        self.stage = Stage::Reading;
        log_info(format!("Reading {}", csv.display()));
        let reader = open_input(csv, self.options.delimiter);
        let reader = self.track(reader)?;
        self.render_reader(&reader, ctx)
    }

    /// Render the report for already opened input.
    pub fn render_reader(&mut self, reader: &TabularReader, ctx: &RunContext) -> GeneratorResult<Rendered> {
        self.stage = Stage::Reading;
        let result = run(
            &self.config,
            &self.options,
            self.validator.as_ref(),
            reader,
            ctx,
            &mut self.stage,
        );
        self.track(result)
    }

    /// Render the report and write it to `out`.
    ///
    /// `out` is only created or replaced when every step succeeded.
    pub fn generate(&mut self, csv: &Path, out: &Path, ctx: &RunContext) -> GeneratorResult<GenerationReport> {
        let rendered = self.render(csv, ctx)?;
        let written = write_atomic(out, &rendered.xml);
        self.track(written)?;
        self.stage = Stage::Done;
        log_success(format!(
            "Generated {} ({} record(s))",
            out.display(),
            rendered.records
        ));
        Ok(GenerationReport {
            output: out.to_path_buf(),
            records: rendered.records,
            bytes: rendered.xml.len(),
            validation: rendered.validation,
        })
    }

    /// Record a failure at the current stage.
    fn track<T, E: Into<GeneratorError>>(&mut self, result: Result<T, E>) -> GeneratorResult<T> {
        result.map_err(|e| {
            let err = e.into();
            let stage = self.stage.name();
            log_error(format!("{stage} failed: {err}"));
            self.stage = Stage::Failed {
                stage,
                reason: err.to_string(),
            };
            err
        })
    }
}

fn open_input(csv: &Path, delimiter: Option<char>) -> GeneratorResult<TabularReader> {
    let reader = TabularReader::open(csv)?;
    let reader = match delimiter {
        Some(delimiter) => reader.with_delimiter(delimiter)?,
        None => reader,
    };
    log_success(format!("Detected encoding: {}", reader.encoding()));
    log_success(format!("Separator: '{}'", format_delimiter(reader.delimiter())));
    Ok(reader)
}

fn run(
    config: &MappingConfig,
    options: &GeneratorOptions,
    validator: &dyn SchemaValidator,
    reader: &TabularReader,
    ctx: &RunContext,
    stage: &mut Stage,
) -> GeneratorResult<Rendered> {
    for column in config.missing_columns(reader.headers()) {
        log_warning(format!("Mapped column '{column}' is not in the input header"));
    }

    let records = reader.records().collect::<CsvResult<Vec<_>>>()?;

    *stage = Stage::Mapped;
    let mapper = FieldMapper::new(config, ctx);
    let nodes = records
        .iter()
        .map(|record| mapper.map_record(record))
        .collect::<Result<Vec<_>, _>>()?;
    log_success(format!("Mapped {} record(s)", nodes.len()));

    if nodes.is_empty() {
        match options.empty_input {
            EmptyInputPolicy::RequireRecords => return Err(GeneratorError::EmptyInput),
            EmptyInputPolicy::Allow => log_warning("Input has no records, writing an empty report"),
        }
    }

    let count = nodes.len();
    *stage = Stage::Built;
    let xml = build(config, ctx, nodes)?.to_xml()?;

    let validation = match &options.validation {
        Some(request) => {
            *stage = Stage::Validated;
            log_info(format!("Validating against {}", request.xsd_dir.display()));
            let report = validator
                .validate(&xml, &request.xsd_dir, request.main_xsd.as_deref())?
                .into_result()?;
            log_info_indent(format!("schema: {}", report.schema.display()), 1);
            log_success("Validation OK");
            Some(report)
        }
        None => None,
    };

    Ok(Rendered {
        xml,
        records: count,
        validation,
    })
}

/// Write through a temporary file in the destination directory.
fn write_atomic(path: &Path, contents: &str) -> GeneratorResult<()> {
    let output_error = |source| GeneratorError::Output {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(output_error)?;
    let mut file = NamedTempFile::new_in(dir).map_err(output_error)?;
    file.write_all(contents.as_bytes()).map_err(output_error)?;
    file.flush().map_err(output_error)?;
    file.persist(path).map_err(|e| output_error(e.error))?;
    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}
