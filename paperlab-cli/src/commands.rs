//! CLI subcommand handlers.

use crate::Commands;
use crate::render::{self, OutputFormat};
use crate::research::ResearchApp;
use crate::server;
use paperlab_core::PaperLabConfig;
use std::sync::Arc;

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, config: PaperLabConfig) -> anyhow::Result<()> {
    let app = ResearchApp::from_config(&config)?;
    let default_max = config.search.max_papers;
    match command {
        Commands::Search {
            question,
            criteria,
            max_papers,
        } => handle_search(&app, &question, &criteria, max_papers.unwrap_or(default_max)).await,
        Commands::Run {
            question,
            criteria,
            max_papers,
            no_fulltext,
            format,
        } => {
            handle_run(
                &app,
                &question,
                &criteria,
                max_papers.unwrap_or(default_max),
                !no_fulltext,
                format,
            )
            .await
        }
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or(config.server.bind);
            println!("PaperLab API listening on http://{}", bind);
            server::run(Arc::new(app), &bind).await
        }
    }
}

async fn handle_search(
    app: &ResearchApp,
    question: &str,
    criteria: &str,
    max_papers: usize,
) -> anyhow::Result<()> {
    let result = app.discover(question, criteria, max_papers).await?;
    print!("{}", render::discovery(&result));
    Ok(())
}

async fn handle_run(
    app: &ResearchApp,
    question: &str,
    criteria: &str,
    max_papers: usize,
    fetch_full_text: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let found = app.discover(question, criteria, max_papers).await?;
    if let Some(error) = &found.error {
        anyhow::bail!("Discovery failed: {}", error);
    }
    if found.papers.is_empty() {
        println!("No papers matched the question and criteria.");
        return Ok(());
    }
    tracing::info!(papers = found.papers.len(), "Starting analysis");

    let run = app.analyze(question, found.papers, fetch_full_text).await?;
    print!("{}", render::analysis_run(&run, format)?);
    Ok(())
}
