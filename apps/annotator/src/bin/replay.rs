use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use imgnote_annotator::Script;

#[derive(Parser, Debug)]
#[command(
    name = "imgnote-replay",
    version,
    about = "Replay a scripted annotation session and print the resulting annotations"
)]
struct Cli {
    /// Session script (JSON). Reads stdin when omitted.
    script: Option<PathBuf>,

    /// Print only the annotations, without the event trace
    #[arg(long)]
    annotations_only: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let json = match &cli.script {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read script from stdin")?;
            buf
        }
    };

    let script = Script::from_json(&json).context("invalid session script")?;
    log::info!("Replaying {} step(s)", script.steps.len());
    let replay = script.run().context("session failed")?;

    let output = if cli.annotations_only {
        serde_json::to_string_pretty(&replay.annotations)?
    } else {
        serde_json::to_string_pretty(&replay)?
    };
    println!("{output}");
    Ok(())
}
