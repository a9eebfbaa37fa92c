use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dblpflat_core::{
    parse_pages, run_passes, Disposition, EntityKind, StreamWalker, WalkOutcome, WalkerOptions,
};
use dblpflat_store::{JsonLinesSink, Sink, SqliteSink};
use indicatif::{HumanBytes, HumanCount, ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

mod config;
mod output;

use config::{OutputFormat, Overrides};
use output::ColorMode;

/// Records between spinner updates during validation.
const VALIDATE_REPORT_INTERVAL: u64 = 50_000;

/// Flatten the DBLP XML dump into SQLite or JSON lines tables
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log progress details (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the configured tables from a DBLP XML file
    Extract {
        /// Config file (default: ./.dblpflat.toml over the platform config)
        #[arg(long)]
        config: Option<PathBuf>,

        /// DBLP XML file, optionally gzip-compressed
        #[arg(long)]
        source: Option<PathBuf>,

        /// DTD to validate against instead of the DOCTYPE's
        #[arg(long)]
        schema: Option<PathBuf>,

        /// SQLite database or JSON lines file ("-" for stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,

        /// How multi-valued cells are stored: first or json
        #[arg(long)]
        cells: Option<String>,

        /// Rows per write transaction
        #[arg(long)]
        batch_size: Option<usize>,

        /// Stop each pass after this many records
        #[arg(long)]
        max_elements: Option<u64>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Validate a DBLP XML file against its DTD without extracting
    Validate {
        /// DBLP XML file, optionally gzip-compressed
        path: PathBuf,

        /// DTD to validate against instead of the DOCTYPE's
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Print the page count for each page range
    Pages {
        /// Page ranges such as "23-43" or "AG83-AG120"
        #[arg(required = true)]
        ranges: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Extract {
            config,
            source,
            schema,
            output,
            format,
            cells,
            batch_size,
            max_elements,
            no_color,
        } => {
            let flags = Overrides {
                source,
                schema,
                output,
                format,
                cells,
                batch_size,
                max_elements,
            };
            extract(config.as_deref(), flags, no_color)
        }
        Command::Validate {
            path,
            schema,
            no_color,
        } => validate(&path, schema, no_color),
        Command::Pages { ranges } => pages(&ranges),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn spinner() -> anyhow::Result<ProgressBar> {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner:.green} {msg} ({elapsed})")?);
    bar.enable_steady_tick(Duration::from_millis(120));
    Ok(bar)
}

fn extract(config_path: Option<&Path>, flags: Overrides, no_color: bool) -> anyhow::Result<()> {
    // Resolve configuration: CLI flags > env vars > config file > defaults
    let file = match config_path {
        Some(path) => config::read_config(path)?,
        None => config::load_config(),
    };
    let settings = config::resolve(flags, |key| std::env::var(key).ok(), file)?;

    if !settings.source.exists() {
        anyhow::bail!("Source document not found at {}", settings.source.display());
    }

    let to_stdout = settings.writes_to_stdout();
    let color = ColorMode(!no_color && !to_stdout);
    // Keep stdout clean for JSON lines
    let mut report: Box<dyn Write> = if to_stdout {
        Box::new(std::io::stderr())
    } else {
        Box::new(std::io::stdout())
    };

    let mut sink: Box<dyn Sink> = match settings.format {
        OutputFormat::Sqlite => Box::new(
            SqliteSink::open(&settings.output, settings.cells)
                .with_context(|| format!("cannot open {}", settings.output.display()))?,
        ),
        OutputFormat::Jsonl if to_stdout => Box::new(JsonLinesSink::new(
            BufWriter::new(std::io::stdout()),
            settings.cells,
        )),
        OutputFormat::Jsonl => {
            let file = File::create(&settings.output)
                .with_context(|| format!("cannot create {}", settings.output.display()))?;
            Box::new(JsonLinesSink::new(BufWriter::new(file), settings.cells))
        }
    };

    let options = WalkerOptions {
        schema_path: settings.schema.clone(),
        ..WalkerOptions::default()
    };
    let bar = spinner()?;

    run_passes::<anyhow::Error>(
        &settings.source,
        &options,
        &settings.passes,
        |table, progress| {
            bar.set_message(format!(
                "{table}: {} records, {} rows, {} read",
                HumanCount(progress.elements_seen),
                HumanCount(progress.rows),
                HumanBytes(progress.bytes_read),
            ));
        },
        |pass, extraction| {
            bar.set_message(format!(
                "{}: writing {} rows",
                pass.table,
                HumanCount(extraction.table.len() as u64)
            ));
            let written = sink
                .write_table(&pass.table, &extraction.table, settings.batch_size)
                .with_context(|| format!("cannot write table {}", pass.table))?;
            bar.suspend(|| {
                output::print_pass_summary(&mut report, &pass.table, &extraction, written, color)
            })?;
            Ok(())
        },
    )?;

    bar.finish_and_clear();
    if !to_stdout {
        let canonical = std::fs::canonicalize(&settings.output)
            .unwrap_or_else(|_| settings.output.clone());
        println!("Tables saved to: {}", canonical.display());
    }
    Ok(())
}

fn validate(path: &Path, schema: Option<PathBuf>, no_color: bool) -> anyhow::Result<()> {
    let options = WalkerOptions {
        schema_path: schema,
        ..WalkerOptions::default()
    };
    let mut walker = StreamWalker::open(path, options)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let bar = spinner()?;

    let mut records: u64 = 0;
    loop {
        let outcome = walker.walk(|element| {
            if EntityKind::from_tag(element.tag()).is_none() {
                return Disposition::Retain;
            }
            records += 1;
            if records % VALIDATE_REPORT_INTERVAL == 0 {
                Disposition::Stop
            } else {
                Disposition::Release
            }
        })?;
        bar.set_message(format!(
            "{} records validated, {} read",
            HumanCount(records),
            HumanBytes(walker.bytes_read())
        ));
        if outcome == WalkOutcome::Completed {
            break;
        }
    }
    bar.finish_and_clear();

    let mut stdout = std::io::stdout();
    output::print_validation_summary(
        &mut stdout,
        &path.display().to_string(),
        records,
        walker.stats(),
        ColorMode(!no_color),
    )?;
    Ok(())
}

fn pages(ranges: &[String]) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    for raw in ranges {
        writeln!(stdout, "{}\t{}", raw, parse_pages(raw))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_extract_flags() {
        let cli = Cli::try_parse_from([
            "dblpflat",
            "-v",
            "extract",
            "--source",
            "dblp.xml.gz",
            "--format",
            "jsonl",
            "-o",
            "-",
            "--max-elements",
            "18",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Extract {
                source,
                format,
                output,
                max_elements,
                ..
            } => {
                assert_eq!(source, Some(PathBuf::from("dblp.xml.gz")));
                assert_eq!(format, Some(OutputFormat::Jsonl));
                assert_eq!(output, Some(PathBuf::from("-")));
                assert_eq!(max_elements, Some(18));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn pages_requires_an_argument() {
        assert!(Cli::try_parse_from(["dblpflat", "pages"]).is_err());
    }
}
