//! mifid-txgen CLI - Generate MiFID transaction reports from CSV
//!
//! # Main Commands
//!
//! ```bash
//! mifid-txgen generate --csv trades.csv --config mapping.json --out report.xml
//! mifid-txgen generate ... --validate --xsd-dir xsd/   # validate before writing
//! mifid-txgen validate report.xml --xsd-dir xsd/        # validate an existing report
//! ```
//!
//! # Helper Commands
//!
//! ```bash
//! mifid-txgen check-config mapping.json   # Load a mapping and summarise it
//! mifid-txgen transforms                  # Show available field transforms
//! mifid-txgen check-lei 5493001KJTIIGC8Y1R12
//! ```

use clap::{Args, Parser, Subcommand};
use mifid_txgen::logs::{log_info_indent, log_success, LogFormat, LOGGER};
use mifid_txgen::{
    transforms_description, EmptyInputPolicy, GeneratorOptions, Lei, MappingConfig, ReportGenerator,
    RunContext, SchemaValidator, TabularReader, ValidationRequest, XsdValidator,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "mifid-txgen")]
#[command(about = "Generate ESMA MiFID transaction report XML from CSV trades", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Load environment variables from this file instead of ./.env
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a report: CSV → mapped records → XML
    Generate(GenerateArgs),

    /// Validate an existing XML report against XSDs
    Validate {
        /// Report to validate
        input: PathBuf,

        /// XSD directory
        #[arg(long)]
        xsd_dir: PathBuf,

        /// Main XSD file (otherwise auto-chosen)
        #[arg(long)]
        xsd_main: Option<PathBuf>,
    },

    /// Load a mapping file and print a summary
    CheckConfig {
        /// Mapping JSON
        config: PathBuf,

        /// Also check the mapped columns against this CSV header
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Show available field transforms
    Transforms,

    /// Check a Legal Entity Identifier
    CheckLei {
        /// Value to check
        value: String,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// Input trades CSV
    #[arg(long)]
    csv: PathBuf,

    /// Mapping JSON
    #[arg(long)]
    config: PathBuf,

    /// Output XML path
    #[arg(long)]
    out: PathBuf,

    /// XSD directory
    #[arg(long)]
    xsd_dir: Option<PathBuf>,

    /// Validate output against XSDs before writing it
    #[arg(long)]
    validate: bool,

    /// Main XSD file (optional; otherwise auto-chosen)
    #[arg(long)]
    xsd_main: Option<PathBuf>,

    /// CSV delimiter (auto-detect if not specified)
    #[arg(short, long)]
    delimiter: Option<char>,

    /// Write a report even when the input has no records
    #[arg(long)]
    allow_empty: bool,
}

impl GenerateArgs {
    fn options(&self) -> Result<GeneratorOptions, Box<dyn std::error::Error>> {
        let validation = match (self.validate, &self.xsd_dir) {
            (true, Some(xsd_dir)) => Some(ValidationRequest {
                xsd_dir: xsd_dir.clone(),
                main_xsd: self.xsd_main.clone(),
            }),
            (true, None) => return Err("--validate requires --xsd-dir".into()),
            (false, _) => None,
        };
        Ok(GeneratorOptions {
            delimiter: self.delimiter,
            empty_input: if self.allow_empty {
                EmptyInputPolicy::Allow
            } else {
                EmptyInputPolicy::RequireRecords
            },
            validation,
        })
    }
}

fn main() {
    let cli = Cli::parse();

    LOGGER.set_format(cli.log_format);
    LOGGER.set_quiet(cli.quiet);

    let result = load_env(cli.env_file.as_deref()).and_then(|()| match cli.command {
        Commands::Generate(args) => cmd_generate(&args),
        Commands::Validate {
            input,
            xsd_dir,
            xsd_main,
        } => cmd_validate(&input, &xsd_dir, xsd_main.as_deref()),
        Commands::CheckConfig { config, csv } => cmd_check_config(&config, csv.as_deref()),
        Commands::Transforms => cmd_transforms(),
        Commands::CheckLei { value } => cmd_check_lei(&value),
    });

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Load `.env` (if present) or an explicit env file (must exist).
fn load_env(env_file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .map_err(|e| format!("Cannot load env file '{}': {}", path.display(), e))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    Ok(())
}

fn cmd_generate(args: &GenerateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let options = args.options()?;
    let mut generator = ReportGenerator::from_path(&args.config, options)?;
    let ctx = RunContext::from_process();

    let report = generator.generate(&args.csv, &args.out, &ctx)?;
    println!("Generated XML: {}", report.output.display());
    if report.validation.is_some() {
        println!("Validation: OK");
    }
    Ok(())
}

fn cmd_validate(input: &Path, xsd_dir: &Path, xsd_main: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let report = XsdValidator.validate_file(input, xsd_dir, xsd_main)?.into_result()?;
    log_info_indent(format!("schema: {}", report.schema.display()), 1);
    println!("Validation: OK");
    Ok(())
}

fn cmd_check_config(path: &Path, csv: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = MappingConfig::load(path)?;
    log_success(format!("Mapping {} is valid", path.display()));

    println!("Root:     {}", config.root.name);
    if let Some(container) = &config.record_container {
        println!("Records:  {} / {}", container, config.record_element);
    } else {
        println!("Records:  {}", config.record_element);
    }
    println!("Envelope: {}", if config.envelope.is_some() { "ISO 20022 BizData" } else { "none" });
    println!("\nNamespaces:");
    for ns in &config.namespaces {
        println!("  {:<10} {}", ns.prefix, ns.uri);
    }
    println!("\nField rules ({}):", config.fields.len());
    for rule in &config.fields {
        let transforms: Vec<&str> = rule.transforms.iter().map(|t| t.name()).collect();
        println!(
            "  {:<20} → {}{}",
            rule.from.as_deref().unwrap_or("(const)"),
            rule.target.raw(),
            if transforms.is_empty() { String::new() } else { format!("  [{}]", transforms.join(" → ")) }
        );
    }

    if let Some(csv) = csv {
        let reader = TabularReader::open(csv)?;
        let missing = config.missing_columns(reader.headers());
        if !missing.is_empty() {
            return Err(format!("Columns missing from {}: {}", csv.display(), missing.join(", ")).into());
        }
        log_success(format!("All mapped columns present in {}", csv.display()));
    }
    Ok(())
}

fn cmd_transforms() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", transforms_description());
    Ok(())
}

fn cmd_check_lei(value: &str) -> Result<(), Box<dyn std::error::Error>> {
    let lei = Lei::parse(value.trim()).map_err(|e| format!("'{}' is not a valid LEI: {}", value, e))?;
    println!("{} is a valid LEI", lei);
    Ok(())
}
