use std::fs::File;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{error, info};
use simplelog::{Config, LevelFilter, WriteLogger};

use pdf_reader::{BackendKind, RenderConfig, RenderService};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendArg {
    Native,
    Subprocess,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Native => BackendKind::Native,
            BackendArg::Subprocess => BackendKind::Subprocess,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "pdf-reader", version, about = "Render a PDF page to PNG and text")]
struct Cli {
    /// PDF document to open
    file: PathBuf,

    /// Page to render (1-based)
    #[arg(short, long, default_value_t = 1)]
    page: usize,

    /// Zoom factor applied to the 300 DPI render
    #[arg(short, long, default_value_t = 1.0)]
    zoom: f32,

    /// Renderer backend (overrides the config file)
    #[arg(short, long, value_enum)]
    backend: Option<BackendArg>,

    /// Config file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the rendered page to this PNG file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the page text
    #[arg(short, long)]
    text: bool,

    /// Log file
    #[arg(long, default_value = "pdf-reader.log")]
    log_file: PathBuf,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    WriteLogger::init(
        level,
        Config::default(),
        File::create(&cli.log_file)
            .with_context(|| format!("Failed to create log file {:?}", cli.log_file))?,
    )?;

    info!("Starting pdf-reader");

    let res = run(&cli);
    if let Err(err) = &res {
        error!("Application error: {err:?}");
    }
    res
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => RenderConfig::load_from_path(path),
        None => RenderConfig::load(),
    };
    if let Some(backend) = cli.backend {
        config.backend = backend.into();
    }
    info!("Using {} backend", config.backend.as_str());

    let service = RenderService::new(&config).context("Failed to set up renderer")?;
    service
        .load_document(&cli.file)
        .with_context(|| format!("Failed to open {:?}", cli.file))?;

    println!(
        "{}: {} pages ({} backend)",
        cli.file.display(),
        service.page_count(),
        service.backend_name()
    );

    let started = Instant::now();
    let page = service
        .get_page(cli.page, cli.zoom)
        .with_context(|| format!("Failed to render page {}", cli.page))?;
    info!("Rendered page {} in {:?}", cli.page, started.elapsed());

    println!(
        "page {} at zoom {}: {}x{} px",
        page.page, page.zoom, page.width, page.height
    );

    if let Some(output) = &cli.output {
        page.image
            .save_with_format(output, image::ImageFormat::Png)
            .with_context(|| format!("Failed to write {output:?}"))?;
        println!("wrote {}", output.display());
    }

    if cli.text {
        println!("{}", page.text);
    }

    service.close();
    Ok(())
}
