use crate::{
    config::{Config, ImageMode},
    context::{self, MarkerOptions},
    engine::{Engine, python::PythonEngine},
    pipeline::Pipeline,
    placement::{self, PlacementOptions, Table},
    relink,
    util::{absolute_parent, ensure_dir, looks_like_url},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "markbridge")]
#[command(about = "Convert PDFs and images to Markdown with Docling, placing table images inline")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./markbridge.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Report the Python/Docling environment.
    Doctor {},
    /// Convert a document to Markdown.
    Convert {
        #[arg(long)]
        input: PathBuf,
        /// Markdown file to write; images go to a sibling folder named after it.
        #[arg(long)]
        output: PathBuf,
        #[arg(long, value_enum)]
        image_mode: Option<ImageMode>,
        #[arg(long, conflicts_with = "force_ocr")]
        no_ocr: bool,
        #[arg(long)]
        force_ocr: bool,
    },
    /// Place table images into an existing Markdown file.
    Place {
        #[arg(long)]
        markdown: PathBuf,
        /// JSON array of {index, image, context_marker}.
        #[arg(long)]
        tables: PathBuf,
        /// Docling JSON export used to fill in missing context markers.
        #[arg(long)]
        document: Option<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Rewrite absolute image paths as relative, escaped links.
    Relink {
        #[arg(long)]
        markdown: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg).as_deref())?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Convert {
            input,
            output,
            image_mode,
            no_ocr,
            force_ocr,
        } => {
            let mut cfg = cfg;
            if let Some(mode) = image_mode {
                cfg.output.image_mode = *mode;
            }
            if *no_ocr {
                // Without OCR Docling cannot read table cells, so tables come
                // back as images only.
                cfg.docling.pipeline.do_ocr = false;
                cfg.docling.pipeline.do_table_structure = false;
            }
            if *force_ocr {
                cfg.docling.ocr.force_full_page_ocr = true;
            }
            convert(&cfg, input, output)
        }
        Command::Place {
            markdown,
            tables,
            document,
            out,
        } => place(&cfg, markdown, tables, document.as_deref(), out.as_deref()),
        Command::Relink { markdown, out } => relink_file(&cfg, markdown, out.as_deref()),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from("markbridge.toml");
    default.exists().then_some(default)
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output; logs go to stderr.
    let console_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from(&cfg.paths.work_dir).join("markbridge.log"))
}

fn doctor(cfg: &Config) -> Result<()> {
    let engine = PythonEngine::new(cfg)?;
    let diag = engine.doctor()?;
    println!("{}", serde_json::to_string_pretty(&diag)?);
    Ok(())
}

fn convert(cfg: &Config, input: &Path, output: &Path) -> Result<()> {
    validate_input(cfg, input)?;

    if cfg.debug.dump_effective_config {
        let raw = toml::to_string(cfg).unwrap_or_default();
        std::fs::write(output.with_extension("config.toml"), raw)?;
    }

    let engine = PythonEngine::new(cfg)?;
    let pipeline = Pipeline::new(cfg, engine);
    let result = pipeline.run_job(input, output)?;

    std::fs::write(output, &result.markdown)
        .with_context(|| format!("writing markdown: {}", output.display()))?;
    info!("wrote {}", output.display());

    if cfg.output.write_report_json {
        std::fs::write(
            output.with_extension("report.json"),
            serde_json::to_string_pretty(&result.report)?,
        )?;
    }

    if cfg.output.write_document_json {
        std::fs::write(
            output.with_extension("docling.json"),
            serde_json::to_string_pretty(&result.document)?,
        )?;
    }

    if cfg.global.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "job_id": result.report.job_id,
                "output": output,
                "tables": result.report.tables_detected,
                "placement": result.report.placement.as_ref().map(|p| &p.summary),
                "status": "ok"
            }))?
        );
    }

    Ok(())
}

fn place(
    cfg: &Config,
    markdown: &Path,
    tables_path: &Path,
    document: Option<&Path>,
    out: Option<&Path>,
) -> Result<()> {
    let md = std::fs::read_to_string(markdown)
        .with_context(|| format!("reading markdown: {}", markdown.display()))?;
    let raw = std::fs::read_to_string(tables_path)
        .with_context(|| format!("reading tables: {}", tables_path.display()))?;
    let mut tables: Vec<Table> =
        serde_json::from_str(&raw).with_context(|| "parsing tables JSON")?;

    if let Some(doc_path) = document {
        let raw = std::fs::read_to_string(doc_path)
            .with_context(|| format!("reading docling document: {}", doc_path.display()))?;
        let value: serde_json::Value =
            serde_json::from_str(&raw).with_context(|| "parsing docling document JSON")?;
        let markers = context::markers_from_json(&value, MarkerOptions::from(&cfg.placement));
        for t in tables.iter_mut().filter(|t| t.context_marker.is_none()) {
            t.context_marker = markers.get(&t.index).cloned();
        }
    }

    let placed = placement::place(&md, &tables, &PlacementOptions::from(&cfg.placement));
    match out {
        Some(path) => {
            std::fs::write(path, &placed.markdown)
                .with_context(|| format!("writing markdown: {}", path.display()))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "summary": placed.summary(),
                    "records": placed.records,
                }))?
            );
        }
        None => print!("{}", placed.markdown),
    }
    Ok(())
}

fn relink_file(cfg: &Config, markdown: &Path, out: Option<&Path>) -> Result<()> {
    let md = std::fs::read_to_string(markdown)
        .with_context(|| format!("reading markdown: {}", markdown.display()))?;
    let md_dir = absolute_parent(markdown)?;
    let (text, n) = relink::relativize_image_links(&md, &md_dir, cfg.images.require_existing);
    info!("relinked {n} image references");
    match out {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("writing markdown: {}", path.display()))?,
        None => print!("{text}"),
    }
    Ok(())
}

fn validate_input(cfg: &Config, input: &Path) -> Result<()> {
    let input_str = input.display().to_string();

    if cfg.security.reject_url_inputs && looks_like_url(&input_str) {
        return Err(anyhow!("URL inputs are disabled: {input_str}"));
    }

    if !input.exists() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }

    if input.extension().is_none() {
        warn!("input has no extension; letting docling detect the format: {}", input.display());
    }

    Ok(())
}
