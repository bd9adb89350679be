//! CLI Application logic
//!
//! Contains the command-line interface implementation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use htmldocx_dom::{parse_html, Node};
use htmldocx_ooxml::{DocumentOptions, DocxWriter, HttpFetcher};

#[derive(Parser)]
#[command(name = "htmldocx")]
#[command(author, version, about = "HTML to WordprocessingML converter", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an HTML file (or a JSON element tree) to DOCX
    Convert {
        /// Input file (.html, .xhtml or .json)
        input: PathBuf,

        /// Output DOCX file (defaults to the input name with .docx)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Markup for the page header
        #[arg(long)]
        header: Option<PathBuf>,

        /// Markup for the page footer
        #[arg(long)]
        footer: Option<PathBuf>,

        /// Options file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Skip remote images instead of downloading them
        #[arg(long)]
        offline: bool,
    },

    /// Print the default options as TOML
    InitConfig {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Arguments of the convert command
#[derive(Debug, Clone, Default)]
pub struct ConvertArgs {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub header: Option<PathBuf>,
    pub footer: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub offline: bool,
}

/// Run the CLI application
///
/// Parses arguments, sets up logging and dispatches to the command.
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Convert {
            input,
            output,
            header,
            footer,
            config,
            offline,
        } => {
            let args = ConvertArgs {
                input,
                output,
                header,
                footer,
                config,
                offline,
            };
            let written = convert_command(&args)?;
            println!("Created: {}", written.display());
        }
        Commands::InitConfig { output } => {
            init_config_command(output.as_deref())?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    // RUST_LOG still overrides the flag
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

/// Execute the convert command, returning the written path
pub fn convert_command(args: &ConvertArgs) -> Result<PathBuf> {
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let options = match &args.config {
        Some(path) => load_options(path)?,
        None => DocumentOptions::default(),
    };
    let body = load_nodes(&args.input)?;
    let header = args.header.as_deref().map(load_nodes).transpose()?;
    let footer = args.footer.as_deref().map(load_nodes).transpose()?;

    let mut writer = DocxWriter::new(options);
    if !args.offline {
        let fetcher = HttpFetcher::new().context("Failed to set up remote image fetching")?;
        writer = writer.with_fetcher(Box::new(fetcher));
    }
    let bytes = writer
        .generate(&body, header.as_deref(), footer.as_deref())
        .with_context(|| format!("Failed to convert {}", args.input.display()))?;

    let output_path = match &args.output {
        Some(p) => p.clone(),
        None => args.input.with_extension("docx"),
    };
    fs::write(&output_path, bytes)
        .with_context(|| format!("Failed to write DOCX file: {}", output_path.display()))?;
    log::info!("Wrote {}", output_path.display());
    Ok(output_path)
}

/// Execute the init-config command
pub fn init_config_command(output: Option<&Path>) -> Result<()> {
    let toml = DocumentOptions::default()
        .to_toml()
        .context("Failed to serialize default options")?;
    match output {
        Some(path) => {
            fs::write(path, &toml)
                .with_context(|| format!("Failed to write config file: {}", path.display()))?;
            println!("Created: {}", path.display());
        }
        None => print!("{}", toml),
    }
    Ok(())
}

/// Read options from a TOML file
pub fn load_options(path: &Path) -> Result<DocumentOptions> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    DocumentOptions::from_toml(&content)
        .with_context(|| format!("Invalid config file: {}", path.display()))
}

/// Read an element tree from markup or from its JSON form
pub fn load_nodes(path: &Path) -> Result<Vec<Node>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid element tree JSON: {}", path.display()))
    } else {
        parse_html(&content).with_context(|| format!("Failed to parse markup: {}", path.display()))
    }
}
