// Rust ETL Pipeline Engine - Main executable
// Author: Gabriel Demetrios Lafis

use std::fs;
use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Arg, ArgMatches, Command};
use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;

use rust_etl_pipeline_engine::{
    api::PipelineService,
    data::{read_csv_records, read_json_records},
    pipeline::{validate_pipeline, PipelineInput, RunOptions, RunStatus, TransformStepInput},
    storage::RecordStore,
    utils::{init_logging, Config},
};

fn seed_arg() -> Arg<'static> {
    Arg::new("seed")
        .long("seed")
        .value_name("NAME=FILE")
        .help("Loads a JSON or CSV file into a collection before executing")
        .takes_value(true)
        .multiple_occurrences(true)
}

fn cli() -> Command<'static> {
    Command::new("Rust ETL Pipeline Engine")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Gabriel Demetrios Lafis")
        .about("Runs and validates ETL pipeline definitions")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Sets a custom config file")
                .takes_value(true),
        )
        .subcommand(
            Command::new("validate")
                .about("Validate a pipeline definition")
                .arg(Arg::new("pipeline").required(true).value_name("PIPELINE")),
        )
        .subcommand(
            Command::new("run")
                .about("Run a pipeline definition")
                .arg(Arg::new("pipeline").required(true).value_name("PIPELINE"))
                .arg(seed_arg())
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .help("Executes without writing step outputs"),
                )
                .arg(
                    Arg::new("continue-on-error")
                        .long("continue-on-error")
                        .help("Keeps running steps independent of a failure"),
                )
                .arg(
                    Arg::new("cleanup")
                        .long("cleanup")
                        .help("Removes temporary collections when the run ends"),
                ),
        )
        .subcommand(
            Command::new("preview")
                .about("Preview the output of a single step")
                .arg(Arg::new("step").required(true).value_name("STEP"))
                .arg(seed_arg())
                .arg(
                    Arg::new("limit")
                        .short('l')
                        .long("limit")
                        .value_name("N")
                        .help("Sets the maximum number of rows shown")
                        .takes_value(true),
                ),
        )
}

/// Read a JSON or YAML document
fn load_document<T: DeserializeOwned>(path: &str) -> Result<T> {
    let contents = fs::read_to_string(path).with_context(|| format!("reading {}", path))?;

    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase);

    let document = match extension.as_deref() {
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(&contents).with_context(|| format!("parsing {}", path))?
        }
        _ => serde_json::from_str(&contents).with_context(|| format!("parsing {}", path))?,
    };

    Ok(document)
}

/// Load every `--seed NAME=FILE` into the record store
fn seed_collections(store: &dyn RecordStore, matches: &ArgMatches) -> Result<()> {
    for seed in matches.values_of("seed").into_iter().flatten() {
        let Some((name, path)) = seed.split_once('=') else {
            bail!("invalid --seed '{}', expected NAME=FILE", seed);
        };

        let records = if path.to_lowercase().ends_with(".csv") {
            read_csv_records(path)
        } else {
            read_json_records(path, None)
        }
        .with_context(|| format!("reading seed file {}", path))?;

        store.create_collection(name)?;
        store.clear(name)?;
        store.create_many(name, &records)?;
        info!("Seeded '{}' with {} record(s) from {}", name, records.len(), path);
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let matches = cli().get_matches();

    // Load configuration
    let config = match matches.value_of("config") {
        Some(path) => Config::from_file(path).with_context(|| format!("loading config {}", path))?,
        None => Config::default(),
    };

    // Initialize logging
    if let Err(err) = init_logging(config.log_level_filter()) {
        eprintln!("Error initializing logger: {}", err);
    }

    let store: Arc<dyn RecordStore> = config.storage.open().context("opening record store")?;

    match matches.subcommand() {
        Some(("validate", sub)) => {
            let input: PipelineInput = load_document(sub.value_of("pipeline").unwrap_or_default())?;
            let result = validate_pipeline(&input);
            print_json(&result)?;

            if !result.valid {
                process::exit(1);
            }
        }
        Some(("run", sub)) => {
            seed_collections(store.as_ref(), sub)?;

            let input: PipelineInput = load_document(sub.value_of("pipeline").unwrap_or_default())?;
            let service = PipelineService::new(store, config.engine.clone());
            let pipeline = service.create_pipeline(input)?;

            let mut options = RunOptions::from_config(&config.engine);
            options.dry_run = sub.is_present("dry-run");
            options.continue_on_error |= sub.is_present("continue-on-error");
            options.cleanup_temp_collections |= sub.is_present("cleanup");
            options.triggered_by = Some("cli".to_string());

            let run = service.run_pipeline(&pipeline.id, options)?;
            print_json(&run)?;

            if run.status != RunStatus::Completed {
                process::exit(1);
            }
        }
        Some(("preview", sub)) => {
            seed_collections(store.as_ref(), sub)?;

            let step: TransformStepInput = load_document(sub.value_of("step").unwrap_or_default())?;
            let limit = sub
                .value_of("limit")
                .map(|l| l.parse::<usize>().with_context(|| format!("invalid --limit '{}'", l)))
                .transpose()?;

            let service = PipelineService::new(store, config.engine.clone());
            print_json(&service.preview_step(step, limit)?)?;
        }
        _ => {
            println!("No subcommand specified. Use --help for usage information.");
        }
    }

    Ok(())
}
