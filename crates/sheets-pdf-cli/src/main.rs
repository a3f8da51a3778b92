//! sheets-pdf CLI - render CSV spreadsheets to PDF with LibreOffice

mod csv_input;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use sheets_pdf::{
    default_registry, ConversionBackend, ConvertConfiguration, OptionMap, OptionValue, Workbook,
};
use sheets_pdf_libreoffice::{
    pdf_exporter, LibreOfficeBackend, LibreOfficeConfig, LibreOfficePdfExporter,
};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::csv_input::CsvOptions;

#[derive(Parser)]
#[command(name = "sheets-pdf")]
#[command(author, version, about = "Convert spreadsheets to PDF through LibreOffice")]
struct Cli {
    /// More logging (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a CSV file to PDF
    Convert(ConvertArgs),

    /// List the document formats the converter knows
    Formats,
}

#[derive(Args)]
struct ConvertArgs {
    /// Input CSV file
    input: PathBuf,

    /// Output PDF file
    output: PathBuf,

    /// Field delimiter (default: comma)
    #[arg(short, long, default_value = ",")]
    delimiter: char,

    /// Name of the generated worksheet
    #[arg(long, default_value = "Sheet1")]
    sheet_name: String,

    /// Keep every field as text
    #[arg(long)]
    no_type_detection: bool,

    /// Password required to open the PDF
    #[arg(long)]
    password: Option<String>,

    /// Password required to change permissions
    #[arg(long)]
    permission_password: Option<String>,

    /// Restrict printing and editing according to --printing and --changes
    #[arg(long)]
    restrict_permissions: bool,

    /// Allowed printing level (0 none, 1 low resolution, 2 full)
    #[arg(long)]
    printing: Option<i32>,

    /// Allowed changes level (0 none .. 4 anything except extracting pages)
    #[arg(long)]
    changes: Option<i32>,

    /// Extra export option as NAME=VALUE (repeatable)
    #[arg(short = 'o', long = "option", value_parser = parse_option)]
    options: Vec<(String, OptionValue)>,

    /// JSON object with export options
    #[arg(long)]
    options_file: Option<PathBuf>,

    /// URP port of LibreOffice
    #[arg(short, long, env = "SHEETS_PDF_PORT", default_value_t = sheets_pdf::DEFAULT_PORT)]
    port: u16,

    /// Host LibreOffice listens on
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Path to the soffice executable
    #[arg(long, env = "SHEETS_PDF_SOFFICE")]
    soffice: Option<PathBuf>,

    /// Use a LibreOffice already listening on --host/--port instead of starting one
    #[arg(long, env = "SHEETS_PDF_CONNECT")]
    connect: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Convert(args) => convert(args).await,
        Commands::Formats => {
            list_formats();
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `NAME=VALUE`; the value becomes a bool, integer, double or string,
/// whichever parses first.
fn parse_option(raw: &str) -> std::result::Result<(String, OptionValue), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing option name in '{raw}'"));
    }
    let value = match value {
        "true" => OptionValue::Bool(true),
        "false" => OptionValue::Bool(false),
        v => v
            .parse::<i32>()
            .map(OptionValue::Int)
            .or_else(|_| v.parse::<f64>().map(OptionValue::Double))
            .unwrap_or_else(|_| OptionValue::String(v.to_string())),
    };
    Ok((name.to_string(), value))
}

fn build_configuration(args: &ConvertArgs) -> Result<ConvertConfiguration> {
    let mut config = ConvertConfiguration::new(sheets_pdf::FORMAT_TYPE);

    if let Some(path) = &args.options_file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read '{}'", path.display()))?;
        let options: OptionMap = serde_json::from_str(&text)
            .with_context(|| format!("'{}' is not a JSON object of options", path.display()))?;
        for (name, value) in options {
            config.set_option(name, value);
        }
    }

    if let Some(password) = &args.password {
        config.set_option("EncryptFile", true);
        config.set_option("DocumentOpenPassword", password.as_str());
    }
    if let Some(password) = &args.permission_password {
        config.set_option("PermissionPassword", password.as_str());
    }
    if args.restrict_permissions {
        config.set_option("RestrictPermissions", true);
    }
    if let Some(level) = args.printing {
        config.set_option("Printing", level);
    }
    if let Some(level) = args.changes {
        config.set_option("Changes", level);
    }
    for (name, value) in &args.options {
        config.set_option(name.as_str(), value.clone());
    }

    Ok(config)
}

async fn convert(args: ConvertArgs) -> Result<()> {
    if !args.delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character");
    }
    let csv_options = CsvOptions {
        delimiter: args.delimiter as u8,
        sheet_name: args.sheet_name.clone(),
        detect_types: !args.no_type_detection,
    };
    let workbook = csv_input::read_csv_file(&args.input, &csv_options)?;
    let configuration = build_configuration(&args)?;

    let office = LibreOfficeConfig {
        soffice_path: args.soffice.clone(),
        host: args.host.clone(),
        port: args.port,
        ..LibreOfficeConfig::default()
    };
    let exporter = pdf_exporter(office);

    if args.connect {
        let backend = LibreOfficeBackend::connect(&args.host, args.port)
            .await
            .with_context(|| {
                format!("Failed to connect to LibreOffice on {}:{}", args.host, args.port)
            })?;
        let handle = Arc::new(Mutex::new(backend));
        let exporter = exporter.with_backend(Arc::clone(&handle));
        let result = export(&exporter, &workbook, &configuration, &args.output).await;
        handle.lock().await.stop().await?;
        result
    } else {
        export(&exporter, &workbook, &configuration, &args.output).await
    }
}

async fn export(
    exporter: &LibreOfficePdfExporter,
    workbook: &Workbook,
    configuration: &ConvertConfiguration,
    output: &Path,
) -> Result<()> {
    exporter
        .export(workbook, configuration, output)
        .await
        .with_context(|| format!("Failed to export '{}'", output.display()))?;
    eprintln!("Wrote {}", output.display());
    Ok(())
}

fn list_formats() {
    let registry = default_registry();
    println!("{:<6} {:<28} {:<14} STORES", "EXT", "NAME", "LOADS AS");
    for format in registry.formats() {
        let loads = format
            .input_family
            .map(|f| f.to_string())
            .unwrap_or_else(|| "-".to_string());
        let mut stores: Vec<String> = format
            .store_properties
            .keys()
            .map(|family| family.to_string())
            .collect();
        stores.sort();
        println!(
            "{:<6} {:<28} {:<14} {}",
            format.extension,
            format.name,
            loads,
            stores.join(", ")
        );
    }
}
