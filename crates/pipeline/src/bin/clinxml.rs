//! CLI entry point: parses one EMIS clinical-search export and prints either
//! a summary or the `ui_rows` as JSON.

use std::path::PathBuf;

use clap::Parser;
use clinxml_pipeline::{init_logging, parse, PipelineConfig};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "clinxml", about = "Parses an EMIS clinical-search XML export")]
struct Cli {
    /// Path to the export file. Reads stdin when omitted.
    file: Option<PathBuf>,

    /// Print `ui_rows` as a JSON array instead of a summary.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    config: PipelineConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.config.log_level);

    let bytes = match &cli.file {
        Some(path) => {
            info!(path = %path.display(), "reading export");
            std::fs::read(path)?
        }
        None => {
            use std::io::Read;
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };

    let result = parse(&bytes, &cli.config);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result.ui_rows)?);
        return Ok(());
    }

    info!(
        status = ?result.status,
        entities = result.entities.len(),
        folders = result.folders.len(),
        codes = result.code_store.len(),
        ui_rows = result.ui_rows.len(),
        warnings = result.warnings.len(),
        "parse complete"
    );
    println!("status: {:?}", result.status);
    println!("entities: {}", result.entities.len());
    println!("folders: {}", result.folders.len());
    println!("distinct codes: {}", result.code_store.len());
    println!("ui rows: {}", result.ui_rows.len());
    println!(
        "categorised: clinical={} medication={} refsets={} pseudo_refsets={} pseudo_members={} emis_internal={} library={}",
        result.categorised.clinical,
        result.categorised.medication,
        result.categorised.refsets,
        result.categorised.pseudo_refsets,
        result.categorised.pseudo_members,
        result.categorised.emis_internal,
        result.categorised.library,
    );
    if let Some(stats) = &result.lookup_statistics {
        println!(
            "lookup: clinical={} medication={} other={} source={:?}",
            stats.clinical_count, stats.medication_count, stats.other_count, stats.load_source
        );
    }
    for warning in &result.warnings {
        eprintln!("warning [{}] {}: {}", warning.stage, warning.path, warning.message);
    }

    if result.status == clinxml_model::PipelineStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}
