use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

use notebook_graph::app::{NotebookApp, NotebookSource};
use notebook_graph::config::ExplorerConfig;
use notebook_graph::graph::NodeKey;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// JSON notebook with entities, attributes and links.
    #[arg(long)]
    notebook: PathBuf,
    /// Restrict to one workspace graph; unscoped records are always included.
    #[arg(long)]
    graph: Option<Uuid>,
    /// Entity to center the neighborhood on.
    #[arg(long)]
    focus: Option<Uuid>,
    #[arg(long)]
    hops: Option<usize>,
    #[arg(long)]
    max_nodes: Option<usize>,
    #[arg(long)]
    max_links: Option<usize>,
    #[arg(long)]
    include_attributes: Option<bool>,
    /// Optional JSON settings file; command line flags win over it.
    #[arg(long)]
    settings: Option<PathBuf>,
}

impl Args {
    fn explorer_config(&self) -> Result<ExplorerConfig> {
        let mut config = match &self.settings {
            Some(path) => ExplorerConfig::from_file(path)?,
            None => ExplorerConfig::default(),
        };

        if let Some(hops) = self.hops {
            config.hops = hops;
        }
        if let Some(max_nodes) = self.max_nodes {
            config.budgets.max_nodes = max_nodes;
        }
        if let Some(max_links) = self.max_links {
            config.budgets.max_links = max_links;
        }
        if let Some(include_attributes) = self.include_attributes {
            config.include_attributes = include_attributes;
        }
        Ok(config.sanitized())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,notebook_graph=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = args
        .explorer_config()
        .context("failed to load explorer settings")?;
    let source = NotebookSource {
        path: args.notebook.clone(),
        scope: args.graph,
        focus: args.focus.map(NodeKey::entity),
        config,
    };
    tracing::info!(notebook = %source.path.display(), "starting viewer");

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "notebook-graph",
        options,
        Box::new(move |cc| Ok(Box::new(NotebookApp::new(cc, source)))),
    )
    .map_err(|error| anyhow!("viewer exited with an error: {error}"))
}
