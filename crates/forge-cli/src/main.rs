//! `schemaforge` binary

use anyhow::Result;
use forge_cli::{cli, normalize_file, parse_file, render_outcome, render_summary, RunOptions};
use forge_content::{normalize::Normalizer, ContentVariant};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let json = matches.get_flag("json");
    init_tracing(json);

    match matches.subcommand() {
        Some(("run", args)) => {
            let options = RunOptions::from_matches(args);
            let snapshot = forge_cli::run_session(&options, |line| {
                if !json {
                    println!("{line}");
                }
            })
            .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                println!();
                print!("{}", render_summary(&snapshot));
            }
        }
        Some(("normalize", args)) => {
            let Some(path) = args.get_one::<PathBuf>("file") else {
                anyhow::bail!("missing file");
            };
            let clean = normalize_file(path, &Normalizer::default())?;
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "path": path, "clean": clean })
                );
            } else {
                println!("{clean}");
            }
        }
        Some(("parse", args)) => {
            let (Some(path), Some(variant)) = (
                args.get_one::<PathBuf>("file"),
                args.get_one::<ContentVariant>("variant"),
            ) else {
                anyhow::bail!("missing file or variant");
            };
            let outcome = parse_file(path, *variant)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", render_outcome(&outcome));
            }
        }
        _ => {}
    }
    Ok(())
}
