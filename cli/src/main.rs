use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use json_subschema_core::{Comparator, Decision, GraphResolver, SemanticResolver, SubtypeError};
use serde::Deserialize;
use serde_json::Value;
use tracing::level_filters::LevelFilter;

// Exit codes: 0 the relation holds, 1 it does not, 2 input error,
// 3 unsupported construct.
const EXIT_HOLDS: u8 = 0;
const EXIT_FAILS: u8 = 1;
const EXIT_INPUT_ERROR: u8 = 2;
const EXIT_UNSUPPORTED: u8 = 3;

#[derive(Parser)]
#[command(name = "json-subschema")]
#[command(about = "Check subtype, meet, and join relations between JSON Schemas")]
#[command(version)]
struct Cli {
    /// Left schema file (the candidate subtype)
    schema1: PathBuf,

    /// Right schema file (the candidate supertype)
    schema2: PathBuf,

    /// Operation to perform
    #[arg(long, value_enum, default_value_t = OpArg::Subtype)]
    op: OpArg,

    /// Ontology description file (JSON: id, prefixes, broader edges)
    #[arg(long)]
    ontology: Option<PathBuf>,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum OpArg {
    /// Does schema1 accept only values schema2 accepts?
    Subtype,
    /// Are the two schemas equivalent (mutual subtype)?
    Equivalent,
    /// Print the greatest schema accepted by both
    Meet,
    /// Print the least schema accepting either
    Join,
}

/// On-disk ontology description loaded at the boundary; the core only ever
/// sees the resolver built from it.
#[derive(Deserialize)]
struct OntologyFile {
    id: String,
    #[serde(default)]
    prefixes: std::collections::BTreeMap<String, String>,
    /// Directed edges: each entry is `[child, parent]`.
    #[serde(default)]
    broader: Vec<(String, String)>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for JSON output.
    let log_level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            let code = err
                .downcast_ref::<SubtypeError>()
                .map_or(EXIT_INPUT_ERROR, exit_code_for);
            ExitCode::from(code)
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let s1 = read_schema(&cli.schema1)?;
    let s2 = read_schema(&cli.schema2)?;

    match &cli.ontology {
        Some(path) => {
            let resolver = load_ontology(path)?;
            execute(&Comparator::with_resolver(resolver), cli.op, &s1, &s2)
        }
        None => execute(&Comparator::new(), cli.op, &s1, &s2),
    }
}

fn execute<R: SemanticResolver>(
    comparator: &Comparator<R>,
    op: OpArg,
    s1: &Value,
    s2: &Value,
) -> Result<ExitCode> {
    match op {
        OpArg::Subtype => {
            let decision = comparator.check_subschema(s1, s2)?;
            if decision == Decision::Unknown {
                eprintln!("undecidable within the supported dialect; reporting not-subtype");
            }
            Ok(ExitCode::from(if decision.holds() {
                EXIT_HOLDS
            } else {
                EXIT_FAILS
            }))
        }
        OpArg::Equivalent => {
            let holds = comparator.is_equivalent(s1, s2)?;
            Ok(ExitCode::from(if holds { EXIT_HOLDS } else { EXIT_FAILS }))
        }
        OpArg::Meet => {
            let result = comparator.meet(s1, s2)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::from(EXIT_HOLDS))
        }
        OpArg::Join => {
            let result = comparator.join(s1, s2)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::from(EXIT_HOLDS))
        }
    }
}

fn read_schema(path: &Path) -> Result<Value> {
    let file =
        File::open(path).with_context(|| format!("failed to open schema {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse {} as JSON", path.display()))
}

fn load_ontology(path: &Path) -> Result<GraphResolver> {
    let file =
        File::open(path).with_context(|| format!("failed to open ontology {}", path.display()))?;
    let desc: OntologyFile = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse ontology {}", path.display()))?;

    let mut builder = GraphResolver::builder(desc.id);
    for (prefix, base) in desc.prefixes {
        builder = builder.prefix(prefix, base);
    }
    for (child, parent) in desc.broader {
        builder = builder.broader(child, parent);
    }
    builder
        .build()
        .with_context(|| format!("invalid ontology description {}", path.display()))
}

fn exit_code_for(err: &SubtypeError) -> u8 {
    match err {
        SubtypeError::Unsupported { .. } => EXIT_UNSUPPORTED,
        _ => EXIT_INPUT_ERROR,
    }
}
