//! `comanda process <files...>` — run one or more workflow documents
//! against the local config store, printing each step's STDOUT output as
//! it runs.

use anyhow::{Context, Result};
use comanda_core::{workflow, Config};

pub async fn run(files: &[String], verbose: bool) -> Result<()> {
    if files.is_empty() {
        anyhow::bail!("no workflow files given");
    }

    let config = Config::load(&Config::default_path(), None).context("loading config store")?;
    let server_settings = config.server.clone();

    for file in files {
        let yaml = std::fs::read_to_string(file).with_context(|| format!("reading {file}"))?;
        let document = workflow::parse(&yaml).with_context(|| format!("parsing {file}"))?;

        let mut engine = workflow::new_engine(document, config.clone(), server_settings.clone(), verbose, None);

        let (tx, mut rx) = workflow::progress::channel(64);
        engine.set_progress_writer(tx);

        let run = tokio::spawn(async move {
            let result = engine.run().await;
            (engine, result)
        });

        while let Some(update) = rx.recv().await {
            print_update(update, verbose);
        }

        let (_, result) = run.await.context("workflow task panicked")?;
        result.with_context(|| format!("running {file}"))?;
    }

    Ok(())
}

fn print_update(update: workflow::ProgressUpdate, verbose: bool) {
    use workflow::ProgressUpdate::*;
    match update {
        Spinner(text) => {
            if verbose {
                eprintln!("… {text}");
            }
        }
        Step(name) => eprintln!("==> {name}"),
        Complete(name) => eprintln!("done: {name}"),
        Error(message) => eprintln!("error: {message}"),
        Output(content) => println!("{content}"),
    }
}
