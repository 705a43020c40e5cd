//! tilestyle CLI
//!
//! A thin wrapper around the tilestyle library.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tilestyle::CompileOptions;

#[derive(Parser)]
#[command(name = "tilestyle")]
#[command(about = "Compile a map stylesheet to style JSON")]
#[command(after_help = "\
EXAMPLES:
    # Compile to stdout
    tilestyle style.style

    # Write a minified document
    tilestyle --compact -o style.json style.style

    # Collapse identical layers into `ref` layers
    tilestyle --dedupe-refs style.style
")]
struct Args {
    /// Stylesheet source file; includes resolve relative to its directory
    input: PathBuf,

    /// Write the document here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Replace layers that share type, source, filter, zoom and layout with
    /// a `ref` to the first such layer
    #[arg(long)]
    dedupe_refs: bool,

    /// Single-line JSON instead of pretty output
    #[arg(long)]
    compact: bool,

    /// Log layer derivation and dropped layers
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let options = CompileOptions {
        dedupe_refs: args.dedupe_refs,
    };
    let doc = tilestyle::compile_file(&args.input, &options)
        .with_context(|| format!("failed to compile {}", args.input.display()))?;

    let mut rendered = if args.compact {
        serde_json::to_string(&doc)?
    } else {
        serde_json::to_string_pretty(&doc)?
    };
    rendered.push('\n');

    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            log::info!("wrote {}", path.display());
        }
        None => std::io::stdout().lock().write_all(rendered.as_bytes())?,
    }
    Ok(())
}
