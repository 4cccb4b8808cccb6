use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use eframe::egui::{self, Context, Vec2};
use tracing::{info, warn};

use crate::config::ExplorerConfig;
use crate::display::count_by_kind;
use crate::explorer::{Explorer, PollOutcome};
use crate::graph::{EdgeKind, GraphScope, NodeKey};
use crate::store::{MemoryStore, NodeSummary};

mod controls;
mod render_utils;
mod view;

/// What the viewer opens: a notebook file plus the initial exploration settings.
#[derive(Clone, Debug)]
pub struct NotebookSource {
    pub path: PathBuf,
    pub scope: GraphScope,
    pub focus: Option<NodeKey>,
    pub config: ExplorerConfig,
}

pub struct NotebookApp {
    source: NotebookSource,
    state: AppState,
}

enum AppState {
    Loading { rx: Receiver<Result<MemoryStore, String>> },
    Ready(Box<ViewModel>),
    Error(String),
}

struct ViewModel {
    explorer: Explorer,
    search: String,
    focus_results: Vec<NodeSummary>,
    drag_target: Option<NodeKey>,
    viewport: Vec2,
    fit_pending: bool,
}

impl NotebookApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, source: NotebookSource) -> Self {
        let state = Self::start_load(&source);
        Self { source, state }
    }

    fn spawn_read(path: PathBuf) -> Receiver<Result<MemoryStore, String>> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result =
                MemoryStore::from_notebook_file(&path).map_err(|error| format!("{error:#}"));
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(source: &NotebookSource) -> AppState {
        AppState::Loading {
            rx: Self::spawn_read(source.path.clone()),
        }
    }

    fn ready(source: &NotebookSource, store: MemoryStore) -> AppState {
        info!(
            entities = store.entity_count(),
            attributes = store.attribute_count(),
            links = store.link_count(),
            "notebook opened"
        );
        let explorer = Explorer::new(Arc::new(store), source.config.clone())
            .with_scope(source.scope)
            .with_focus(source.focus);
        AppState::Ready(Box::new(ViewModel::new(explorer)))
    }
}

impl eframe::App for NotebookApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                match rx.try_recv() {
                    Ok(Ok(store)) => transition = Some(Self::ready(&self.source, store)),
                    Ok(Err(error)) => transition = Some(AppState::Error(error)),
                    Err(TryRecvError::Empty) => ctx.request_repaint(),
                    Err(TryRecvError::Disconnected) => {
                        transition = Some(AppState::Error(
                            "Background notebook reader disconnected".to_owned(),
                        ));
                    }
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Opening notebook...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to open notebook");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        transition = Some(Self::start_load(&self.source));
                    }
                });
            }
            AppState::Ready(model) => {
                model.show(ctx, &self.source);
            }
        }

        if let Some(next_state) = transition {
            self.state = next_state;
        }
    }
}

impl ViewModel {
    fn new(mut explorer: Explorer) -> Self {
        explorer.request_load();
        Self {
            explorer,
            search: String::new(),
            focus_results: Vec::new(),
            drag_target: None,
            viewport: Vec2::new(1024.0, 768.0),
            fit_pending: true,
        }
    }

    fn show(&mut self, ctx: &Context, source: &NotebookSource) {
        if let Some(outcome) = self.explorer.poll() {
            match outcome {
                PollOutcome::Applied { .. } => self.fit_pending = true,
                PollOutcome::Failed { error, .. } => warn!(%error, "load failed"),
                PollOutcome::Discarded(_) => {}
            }
        }

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("notebook-graph");
                    ui.separator();
                    ui.label(format!("notebook: {}", source.path.display()));
                    let snapshot = self.explorer.snapshot();
                    ui.label(format!("nodes: {}", snapshot.node_count()));
                    ui.label(format!("edges: {}", snapshot.edge_count()));
                    if self.explorer.selection().is_some() {
                        let shown = count_by_kind(&self.explorer.displayed_edges().edges);
                        ui.label(format!(
                            "shown: {} links, {} attributes",
                            shown.get(&EdgeKind::Link).copied().unwrap_or(0),
                            shown.get(&EdgeKind::Containment).copied().unwrap_or(0),
                        ));
                    }
                    if snapshot.truncated {
                        ui.label("truncated by budget").on_hover_text(
                            "Lower hops or raise the node/link budgets to see more.",
                        );
                    }
                    if self.explorer.is_loading() {
                        ui.spinner();
                    }
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(340.0)
            .show(ctx, |ui| self.draw_controls(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.draw_graph(ui));

        if self.explorer.is_loading() || self.explorer.is_visible() {
            ctx.request_repaint();
        }
    }
}
