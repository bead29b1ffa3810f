use std::io::{self, BufRead, BufWriter, Read, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use stream_align::citation::{collapse_citations, CitationMapping, SearchDoc};
use stream_align::config::{load_config, EngineConfig};
use stream_align::error::AlignError;
use stream_align::observability::init_tracing;
use stream_align::snippet::SnippetLocator;
use stream_align::stream::{Delta, DeltaChunk, ThinkTokenRedirector};

#[derive(Debug, Parser)]
#[command(name = "stream-align")]
#[command(about = "Align streamed LLM output with its sources")]
struct Cli {
    /// YAML engine config; built-in defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
enum Command {
    /// Read JSON-lines deltas on stdin and redirect the think tool into reasoning
    Redirect,
    /// Locate SNIPPET inside CONTENT_FILE and print the match as JSON
    Locate {
        content_file: PathBuf,
        snippet: String,
    },
    /// Read {"text", "existing", "incoming"} on stdin and print the collapsed result
    Collapse,
}

#[derive(Debug, Deserialize)]
struct CollapseRequest {
    text: String,
    #[serde(default)]
    existing: CitationMapping<SearchDoc>,
    #[serde(default)]
    incoming: CitationMapping<SearchDoc>,
}

fn main() {
    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => load_config(path).unwrap_or_else(|e| exit_with(&AlignError::from(e))),
        None => EngineConfig::default(),
    };
    init_tracing(&config.log_level);

    if let Err(e) = run(&config, cli.command) {
        exit_with(&e);
    }
}

fn exit_with(err: &AlignError) -> ! {
    eprintln!("stream-align: {err}");
    std::process::exit(err.exit_code());
}

fn run(config: &EngineConfig, command: Command) -> Result<(), AlignError> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match command {
        Command::Redirect => redirect(config, io::stdin().lock(), &mut out)?,
        Command::Locate {
            content_file,
            snippet,
        } => {
            let content = std::fs::read_to_string(&content_file)?;
            let result = SnippetLocator::new(&config.snippet).locate(&content, &snippet);
            serde_json::to_writer(&mut out, &result)?;
            out.write_all(b"\n")?;
        }
        Command::Collapse => {
            let mut input = String::new();
            io::stdin().lock().read_to_string(&mut input)?;
            let request: CollapseRequest = serde_json::from_str(&input)?;
            let result = collapse_citations(&request.text, &request.existing, &request.incoming);
            serde_json::to_writer(&mut out, &result)?;
            out.write_all(b"\n")?;
        }
    }

    out.flush()?;
    Ok(())
}

/// Run JSON-lines deltas through the redirector, flushing at end of input.
fn redirect(
    config: &EngineConfig,
    input: impl BufRead,
    out: &mut impl Write,
) -> Result<(), AlignError> {
    let mut redirector = ThinkTokenRedirector::new(&config.think);

    for (line_no, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let chunk: DeltaChunk = serde_json::from_str(&line).map_err(|e| {
            AlignError::InvalidInput(format!("line {}: {e}", line_no + 1))
        })?;
        for delta in chunk.into_deltas() {
            if let Some(forward) = redirector.process(Some(delta)) {
                write_delta(out, forward)?;
            }
        }
    }

    if let Some(last) = redirector.process(None) {
        write_delta(out, last)?;
    }
    Ok(())
}

fn write_delta(out: &mut impl Write, delta: Delta) -> Result<(), AlignError> {
    serde_json::to_writer(&mut *out, &DeltaChunk::from(delta))?;
    out.write_all(b"\n")?;
    Ok(())
}
