use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use paper_qa::config::Settings;
use paper_qa::grobid::{FulltextOptions, GrobidClient};
use paper_qa::pipeline::{self, Pipeline};
use paper_qa::{output, pdf, HttpTransport, TextUnit};

const DEFAULT_INPUT: &str = ".data/2403.03507.pdf";
const DEFAULT_QA_OUTPUT: &str = ".data/galore_qa.json";
const DEFAULT_BLOCKS_OUTPUT: &str = ".data/galore.jsonl";
const GROBID_CONFIG_FILE: &str = "grobid_config.json";

#[derive(Parser)]
#[command(name = "paper_qa", about = "Question/answer training data from scholarly PDFs")]
struct Cli {
    /// Settings file (toml, json or yaml); defaults to ./paper_qa.* when present
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate Q/A records through the completion endpoint
    Qa {
        #[arg(short, long, default_value = DEFAULT_INPUT)]
        input: PathBuf,
        #[arg(short, long, default_value = DEFAULT_QA_OUTPUT)]
        output: PathBuf,
        /// Use sentences instead of paragraphs as passages
        #[arg(long)]
        sentences: bool,
        /// Keep GROBID page coordinates on passages
        #[arg(long)]
        coordinates: bool,
        /// Window the raw page text instead of asking GROBID for passages
        #[arg(long)]
        from_pages: bool,
    },
    /// Write overlapping text windows as records to annotate by hand
    Blocks {
        #[arg(short, long, default_value = DEFAULT_INPUT)]
        input: PathBuf,
        #[arg(short, long, default_value = DEFAULT_BLOCKS_OUTPUT)]
        output: PathBuf,
        /// Window size in characters (overrides settings)
        #[arg(short, long)]
        window: Option<usize>,
    },
    /// Write the GROBID side configuration file
    GrobidConfig {
        #[arg(short, long, default_value = GROBID_CONFIG_FILE)]
        output: PathBuf,
    },
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .try_init();
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

fn main() -> Result<()> {
    init_tracing();
    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    info!(settings_loaded = ?settings, msg = "Starting paper_qa");

    match cli.command {
        Commands::Qa {
            input,
            output: out,
            sentences,
            coordinates,
            from_pages,
        } => {
            if sentences {
                settings.passages.use_paragraphs = false;
            }
            if coordinates {
                settings.passages.capture_coordinates = true;
            }
            run_qa(&settings, &input, &out, from_pages)?;
        }
        Commands::Blocks {
            input,
            output: out,
            window,
        } => {
            if let Some(w) = window {
                settings.segmenter.window_size = w;
            }
            settings.validate()?;
            run_blocks(&settings, &input, &out)?;
        }
        Commands::GrobidConfig { output: out } => {
            settings.grobid.write_to(&out)?;
            println!("Wrote {}", out.display());
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }
    Ok(())
}

fn load_units(settings: &Settings, input: &Path, from_pages: bool) -> Result<Vec<TextUnit>> {
    if from_pages {
        let pages = pdf::page_texts(input)?;
        println!("Loaded {} pages from {}", pages.len(), input.display());
        return Ok(pipeline::window_units(&pages, settings.segmenter.window_size)?.collect());
    }

    settings
        .grobid
        .write_to(Path::new(GROBID_CONFIG_FILE))
        .context("writing GROBID side configuration")?;
    let client = GrobidClient::new(&settings.grobid)?;
    if !client.is_alive() {
        warn!(server = %settings.grobid.grobid_server, "GROBID did not answer the health check");
    }
    let tei = client.process_fulltext(
        input,
        FulltextOptions {
            segment_sentences: !settings.passages.use_paragraphs,
            tei_coordinates: settings.passages.capture_coordinates,
        },
    )?;
    Ok(pipeline::passage_units(&tei, &settings.passages)?)
}

fn run_qa(settings: &Settings, input: &Path, out: &Path, from_pages: bool) -> Result<()> {
    println!("paper_qa: Q/A generation");
    println!("=========================\n");

    let runner = Pipeline::from_settings(settings, HttpTransport::new(&settings.endpoint)?)?;
    let units = load_units(settings, input, from_pages)?;
    println!("Processing {} units...", units.len());

    let pb = progress_bar(units.len());
    let summary = runner.run(units, &pb);

    output::write_json_array(out, &summary.records)
        .with_context(|| format!("writing {}", out.display()))?;
    println!(
        "Saved {} records from {} units ({} failed, {} blank, {} malformed pairs skipped) to {}",
        summary.records.len(),
        summary.units,
        summary.failed_units,
        summary.blank_units,
        summary.skipped_segments,
        out.display()
    );
    Ok(())
}

fn run_blocks(settings: &Settings, input: &Path, out: &Path) -> Result<()> {
    let normalizer = settings.normalizer.build()?;
    let pages = pdf::page_texts(input)?;
    println!("Loaded {} pages from {}", pages.len(), input.display());

    let pb = ProgressBar::new_spinner();
    let units = pipeline::window_units(&pages, settings.segmenter.window_size)?.inspect(|_| pb.inc(1));
    let written = output::write_jsonl(out, pipeline::annotation_records(units, &normalizer))
        .with_context(|| format!("writing {}", out.display()))?;
    pb.finish_and_clear();
    println!("Wrote {} blocks to {}", written, out.display());
    Ok(())
}
