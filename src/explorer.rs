use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use eframe::egui::{Pos2, Vec2};
use tracing::{debug, info, warn};

use crate::camera::{Camera, CameraCommand};
use crate::config::{ExplorerConfig, PhysicsConfig};
use crate::display::{DisplayedEdges, edges_for_display};
use crate::graph::{
    Budgets, ExpandRequest, Expansion, GraphScope, GraphSnapshot, LoadError, LoadRequest, NodeKey,
    NodeKind, expand_neighborhood, load_neighborhood,
};
use crate::layout::{LayoutState, place_satellites, seed};
use crate::lens::{Lens, LensSettings};
use crate::physics::{ForceLayoutSimulator, TickInput};
use crate::store::{GraphStore, NodeSummary};
use crate::util::stable_angle;
use crate::worker::{JobKind, JobOutput, PendingJob, RequestToken};

/// Ticks run per `tick` call at most; the leftover backlog is capped at one interval.
const MAX_CATCH_UP_STEPS: u32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectionDiff {
    pub previous: Option<NodeKey>,
    pub current: Option<NodeKey>,
}

impl SelectionDiff {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PinDiff {
    pub key: NodeKey,
    pub pinned: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PollOutcome {
    Applied { token: RequestToken, kind: JobKind },
    Failed { token: RequestToken, error: LoadError },
    /// Superseded by a later request; the result was dropped.
    Discarded(RequestToken),
}

pub struct Explorer {
    store: Arc<dyn GraphStore>,
    config: ExplorerConfig,
    scope: GraphScope,
    focus: Option<NodeKey>,
    snapshot: GraphSnapshot,
    revision: u64,
    layout: LayoutState,
    pinned: HashSet<NodeKey>,
    dragging: Option<NodeKey>,
    selection: Option<NodeKey>,
    show_all_links: bool,
    simulator: ForceLayoutSimulator,
    camera: Camera,
    latest: RequestToken,
    pending: Option<PendingJob>,
    queued_expansions: VecDeque<NodeKey>,
    tick_accumulator: f32,
    last_error: Option<LoadError>,
    displayed: DisplayedEdges,
    lens: Lens,
    relevant: Option<HashSet<NodeKey>>,
}

impl Explorer {
    /// Creates an engine with an empty snapshot. The view counts as visible,
    /// so the simulator starts running.
    pub fn new(store: Arc<dyn GraphStore>, config: ExplorerConfig) -> Self {
        let config = config.sanitized();
        let mut simulator = ForceLayoutSimulator::new(config.physics);
        simulator.start();

        Self {
            store,
            config,
            scope: None,
            focus: None,
            snapshot: GraphSnapshot::default(),
            revision: 0,
            layout: LayoutState::default(),
            pinned: HashSet::new(),
            dragging: None,
            selection: None,
            show_all_links: false,
            simulator,
            camera: Camera::default(),
            latest: RequestToken::default(),
            pending: None,
            queued_expansions: VecDeque::new(),
            tick_accumulator: 0.0,
            last_error: None,
            displayed: DisplayedEdges::default(),
            lens: Lens::empty(),
            relevant: None,
        }
    }

    pub fn with_scope(mut self, scope: GraphScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_focus(mut self, focus: Option<NodeKey>) -> Self {
        self.focus = focus;
        self
    }

    // Loading.

    /// Loads a fresh neighborhood on the calling thread and replaces the
    /// snapshot. On failure the current snapshot is left untouched.
    pub fn load_graph(
        &mut self,
        focus: Option<NodeKey>,
        hops: usize,
        include_attributes: bool,
    ) -> Result<&GraphSnapshot, LoadError> {
        let invalidate =
            focus != self.focus || include_attributes != self.config.include_attributes;
        self.focus = focus;
        self.config.hops = hops;
        self.config.include_attributes = include_attributes;
        self.queued_expansions.clear();
        self.next_token(invalidate);

        match load_neighborhood(self.store.as_ref(), &self.load_request()) {
            Ok(snapshot) => {
                self.apply_snapshot(snapshot);
                Ok(&self.snapshot)
            }
            Err(error) => {
                warn!(%error, "neighborhood load failed");
                self.last_error = Some(error.clone());
                Err(error)
            }
        }
    }

    pub fn expand(&mut self, around: NodeKey) -> Result<&GraphSnapshot, LoadError> {
        self.next_token(false);

        match expand_neighborhood(self.store.as_ref(), &self.snapshot, &self.expand_request(around))
        {
            Ok(expansion) => {
                self.apply_expansion(around, expansion);
                Ok(&self.snapshot)
            }
            Err(error) => {
                warn!(%error, %around, "expansion failed");
                self.last_error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Starts a background load with the current focus, scope and settings.
    /// Any in-flight job is superseded.
    pub fn request_load(&mut self) -> RequestToken {
        self.queued_expansions.clear();
        let token = self.next_token(false);
        self.pending = Some(PendingJob::spawn_load(
            Arc::clone(&self.store),
            token,
            self.load_request(),
        ));
        debug!(?token, focus = ?self.focus, "load requested");
        token
    }

    /// Starts a background expansion, or queues it behind the running job so
    /// merges apply one at a time. Returns the token when it started now.
    pub fn request_expand(&mut self, around: NodeKey) -> Option<RequestToken> {
        if self.pending.is_some() {
            debug!(%around, "expansion queued");
            self.queued_expansions.push_back(around);
            return None;
        }

        Some(self.start_expand(around))
    }

    /// Applies a finished background job, if any. Results whose token is no
    /// longer current are dropped.
    pub fn poll(&mut self) -> Option<PollOutcome> {
        let result = self.pending.as_ref()?.poll()?;
        let job = self.pending.take()?;

        let outcome = if job.token != self.latest {
            debug!(token = ?job.token, latest = ?self.latest, "discarding stale completion");
            PollOutcome::Discarded(job.token)
        } else {
            match result {
                Ok(JobOutput::Loaded(snapshot)) => {
                    self.apply_snapshot(snapshot);
                    PollOutcome::Applied {
                        token: job.token,
                        kind: job.kind,
                    }
                }
                Ok(JobOutput::Expanded(expansion)) => {
                    if let JobKind::Expand { around } = job.kind {
                        self.apply_expansion(around, expansion);
                    }
                    PollOutcome::Applied {
                        token: job.token,
                        kind: job.kind,
                    }
                }
                Err(error) => {
                    warn!(%error, token = ?job.token, "background load failed");
                    self.last_error = Some(error.clone());
                    self.queued_expansions.clear();
                    PollOutcome::Failed {
                        token: job.token,
                        error,
                    }
                }
            }
        };

        if let Some(around) = self.queued_expansions.pop_front() {
            self.start_expand(around);
        }
        Some(outcome)
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn latest_token(&self) -> RequestToken {
        self.latest
    }

    pub fn last_error(&self) -> Option<&LoadError> {
        self.last_error.as_ref()
    }

    pub fn search_store(&self, prefix: &str, limit: usize) -> Result<Vec<NodeSummary>, LoadError> {
        let prefix = prefix.trim();
        let prefix = (!prefix.is_empty()).then_some(prefix);
        self.store
            .fetch_nodes(self.scope, NodeKind::Entity, limit, prefix)
            .map_err(LoadError::from)
    }

    // Re-scoping. Each of these invalidates in-flight work and reloads.

    pub fn set_focus(&mut self, focus: Option<NodeKey>) -> RequestToken {
        self.focus = focus;
        self.invalidate_and_reload()
    }

    /// Switches workspace. The focus belongs to the old workspace and is cleared.
    pub fn set_scope(&mut self, scope: GraphScope) -> RequestToken {
        self.scope = scope;
        self.focus = None;
        self.invalidate_and_reload()
    }

    pub fn set_include_attributes(&mut self, include_attributes: bool) -> RequestToken {
        self.config.include_attributes = include_attributes;
        self.invalidate_and_reload()
    }

    /// Takes effect on the next load.
    pub fn set_hops(&mut self, hops: usize) {
        self.config.hops = hops;
    }

    /// A snapshot larger than `budgets` is cut down by the next load or expansion.
    pub fn set_budgets(&mut self, budgets: Budgets) {
        self.config.budgets = budgets;
    }

    // Simulation.

    /// Advances the simulation by whole fixed intervals covered by
    /// `delta_seconds` and returns the current positions.
    pub fn tick(&mut self, delta_seconds: f32) -> &HashMap<NodeKey, Pos2> {
        let interval = self.config.tick_interval_secs;
        self.tick_accumulator += delta_seconds.max(0.0);

        let mut fixed = self.pinned.clone();
        fixed.extend(self.dragging);

        let mut steps = 0;
        while self.tick_accumulator >= interval && steps < MAX_CATCH_UP_STEPS {
            self.tick_accumulator -= interval;
            steps += 1;
            self.simulator.step(
                TickInput {
                    nodes: &self.snapshot.nodes,
                    edges: &self.snapshot.edges,
                    fixed: &fixed,
                    relevant: self.relevant.as_ref(),
                },
                &mut self.layout,
                interval,
            );
        }
        if steps == MAX_CATCH_UP_STEPS {
            self.tick_accumulator = self.tick_accumulator.min(interval);
        }

        &self.layout.positions
    }

    /// Stops the simulation while hidden. Velocities are kept, so showing the
    /// view again resumes where it left off.
    pub fn set_visible(&mut self, visible: bool) {
        if visible {
            self.simulator.start();
        } else {
            self.simulator.stop();
            self.tick_accumulator = 0.0;
        }
    }

    pub fn is_visible(&self) -> bool {
        self.simulator.is_running()
    }

    pub fn set_physics(&mut self, physics: PhysicsConfig) {
        self.simulator.set_config(physics);
        self.config.physics = self.simulator.config();
    }

    // Interaction.

    /// Selecting a node outside the snapshot clears the selection.
    pub fn set_selection(&mut self, selection: Option<NodeKey>) -> SelectionDiff {
        let previous = self.selection;
        let current = selection.filter(|key| self.snapshot.contains(key));
        if previous != current {
            self.selection = current;
            self.show_all_links = false;
            self.refresh_derived();
        }
        SelectionDiff { previous, current }
    }

    pub fn toggle_pin(&mut self, key: NodeKey) -> Option<PinDiff> {
        if !self.snapshot.contains(&key) {
            return None;
        }

        let pinned = if self.pinned.remove(&key) {
            false
        } else {
            self.pinned.insert(key);
            self.layout.velocities.insert(key, Vec2::ZERO);
            true
        };
        Some(PinDiff { key, pinned })
    }

    /// Moves a node under the pointer. The node stays fixed until
    /// [`Explorer::end_drag`].
    pub fn set_drag_position(&mut self, key: NodeKey, position: Pos2) -> bool {
        if !self.layout.positions.contains_key(&key) {
            return false;
        }
        self.dragging = Some(key);
        self.layout.place(key, position);
        true
    }

    pub fn end_drag(&mut self) {
        if let Some(key) = self.dragging.take() {
            self.layout.velocities.insert(key, Vec2::ZERO);
        }
    }

    pub fn set_lens_settings(&mut self, settings: LensSettings) {
        self.config.lens = settings;
        self.refresh_derived();
    }

    /// Lifts the degree cap for the current selection until it changes.
    pub fn show_all_links_for_selection(&mut self, show_all: bool) {
        if self.show_all_links != show_all {
            self.show_all_links = show_all;
            self.refresh_derived();
        }
    }

    /// Applies a camera command against a viewport of `viewport` size and
    /// returns the resulting `(scale, pan)`.
    pub fn apply_camera_command(&mut self, command: CameraCommand, viewport: Vec2) -> (f32, Vec2) {
        match command {
            CameraCommand::Reset => self.camera.reset(),
            CameraCommand::Center(key) => {
                if let Some(position) = self.layout.position(&key) {
                    self.camera.center_on(position);
                }
            }
            CameraCommand::FitAll => {
                let visible = self
                    .snapshot
                    .nodes
                    .iter()
                    .filter(|node| !self.lens.is_hidden(&node.key))
                    .filter_map(|node| self.layout.position(&node.key))
                    .collect::<Vec<_>>();
                self.camera.fit(visible, viewport);
            }
        }
        (self.camera.scale, self.camera.pan)
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    // Read access for the renderer.

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn scope(&self) -> GraphScope {
        self.scope
    }

    pub fn focus(&self) -> Option<NodeKey> {
        self.focus
    }

    pub fn snapshot(&self) -> &GraphSnapshot {
        &self.snapshot
    }

    /// Bumped whenever the snapshot is replaced or extended.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn layout(&self) -> &LayoutState {
        &self.layout
    }

    pub fn positions(&self) -> &HashMap<NodeKey, Pos2> {
        &self.layout.positions
    }

    pub fn pinned(&self) -> &HashSet<NodeKey> {
        &self.pinned
    }

    pub fn is_pinned(&self, key: &NodeKey) -> bool {
        self.pinned.contains(key)
    }

    pub fn dragging(&self) -> Option<NodeKey> {
        self.dragging
    }

    pub fn selection(&self) -> Option<NodeKey> {
        self.selection
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn lens(&self) -> &Lens {
        &self.lens
    }

    pub fn displayed_edges(&self) -> &DisplayedEdges {
        &self.displayed
    }

    pub fn is_hidden(&self, key: &NodeKey) -> bool {
        self.lens.is_hidden(key)
    }

    fn load_request(&self) -> LoadRequest {
        LoadRequest {
            scope: self.scope,
            focus: self.focus,
            hops: self.config.hops,
            include_attributes: self.config.include_attributes,
            budgets: self.config.budgets,
        }
    }

    fn expand_request(&self, around: NodeKey) -> ExpandRequest {
        ExpandRequest {
            scope: self.scope,
            around,
            include_attributes: self.config.include_attributes,
            budgets: self.config.budgets,
        }
    }

    fn next_token(&mut self, invalidate: bool) -> RequestToken {
        if invalidate {
            self.latest.generation += 1;
        }
        self.latest.sequence += 1;
        self.latest
    }

    fn invalidate_and_reload(&mut self) -> RequestToken {
        self.next_token(true);
        self.request_load()
    }

    fn start_expand(&mut self, around: NodeKey) -> RequestToken {
        let token = self.next_token(false);
        self.pending = Some(PendingJob::spawn_expand(
            Arc::clone(&self.store),
            token,
            self.snapshot.clone(),
            self.expand_request(around),
        ));
        debug!(?token, %around, "expansion requested");
        token
    }

    fn apply_snapshot(&mut self, snapshot: GraphSnapshot) {
        let present = snapshot.keys();
        self.pinned.retain(|key| present.contains(key));
        self.selection = self.selection.filter(|key| present.contains(key));
        self.dragging = self.dragging.filter(|key| present.contains(key));

        self.layout = seed(
            &snapshot.nodes,
            &snapshot.edges,
            &self.pinned,
            &self.layout.positions,
        );
        info!(
            nodes = snapshot.node_count(),
            edges = snapshot.edge_count(),
            truncated = snapshot.truncated,
            "graph loaded"
        );
        self.snapshot = snapshot;
        self.revision += 1;
        self.last_error = None;
        self.refresh_derived();
    }

    fn apply_expansion(&mut self, around: NodeKey, expansion: Expansion) {
        let Expansion { snapshot, admitted } = expansion;
        let center = self.layout.position(&around).unwrap_or(Pos2::ZERO);

        let fresh = admitted
            .into_iter()
            .filter(|key| !self.layout.positions.contains_key(key))
            .collect::<Vec<_>>();
        let (entities, attributes): (Vec<_>, Vec<_>) =
            fresh.into_iter().partition(NodeKey::is_entity);
        place_satellites(center, stable_angle(&around), &entities, &mut self.layout);

        let mut by_owner: HashMap<NodeKey, Vec<NodeKey>> = HashMap::new();
        for key in attributes {
            let owner = snapshot
                .owner_of(&key)
                .filter(|owner| self.layout.positions.contains_key(owner))
                .unwrap_or(around);
            by_owner.entry(owner).or_default().push(key);
        }
        let mut owners = by_owner.into_iter().collect::<Vec<_>>();
        owners.sort_by_key(|(owner, _)| *owner);
        for (owner, children) in owners {
            let anchor = self.layout.position(&owner).unwrap_or(center);
            place_satellites(anchor, stable_angle(&owner), &children, &mut self.layout);
        }

        for node in &snapshot.nodes {
            if !self.layout.positions.contains_key(&node.key) {
                self.layout.place(node.key, center);
            }
        }
        let present = snapshot.keys();
        self.layout.retain(&present);
        self.pinned.retain(|key| present.contains(key));
        self.selection = self.selection.filter(|key| present.contains(key));
        self.dragging = self.dragging.filter(|key| present.contains(key));

        info!(
            %around,
            nodes = snapshot.node_count(),
            edges = snapshot.edge_count(),
            "graph expanded"
        );
        self.snapshot = snapshot;
        self.revision += 1;
        self.last_error = None;
        self.refresh_derived();
    }

    fn refresh_derived(&mut self) {
        self.displayed = edges_for_display(
            &self.snapshot,
            self.selection.as_ref(),
            self.config.degree_cap,
            self.show_all_links,
        );
        let settings = self.config.lens.effective(self.selection.as_ref());
        self.lens = Lens::build(settings, self.selection.as_ref(), &self.displayed.edges);
        self.relevant = self.lens.relevant();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn explorer_with(build: impl FnOnce(&mut MemoryStore) -> NodeKey) -> (Explorer, NodeKey) {
        let mut store = MemoryStore::new();
        let focus = build(&mut store);
        (Explorer::new(Arc::new(store), ExplorerConfig::default()), focus)
    }

    #[test]
    fn failed_load_keeps_the_previous_snapshot() {
        let store = Arc::new({
            let mut store = MemoryStore::new();
            let a = store.add_entity("A");
            let b = store.add_entity("B");
            store.add_link(a, b);
            store
        });
        let mut explorer = Explorer::new(store.clone(), ExplorerConfig::default());
        explorer.load_graph(None, 2, false).expect("load");
        let before = explorer.snapshot().clone();

        store.set_available(false);
        let error = explorer.load_graph(None, 2, false).expect_err("unavailable");
        assert_eq!(error, LoadError::StoreUnavailable);
        assert_eq!(explorer.snapshot(), &before);
        assert_eq!(explorer.last_error(), Some(&LoadError::StoreUnavailable));
    }

    #[test]
    fn selection_outside_the_snapshot_is_ignored() {
        let (mut explorer, focus) = explorer_with(|store| store.add_entity("A"));
        explorer.load_graph(Some(focus), 1, false).expect("load");

        let diff = explorer.set_selection(Some(focus));
        assert!(diff.changed());
        let stranger = NodeKey::entity(uuid::Uuid::from_u128(99));
        let diff = explorer.set_selection(Some(stranger));
        assert_eq!(diff.current, None);
        assert_eq!(explorer.selection(), None);
    }

    #[test]
    fn pins_survive_reloads_only_while_present() {
        let (mut explorer, focus) = explorer_with(|store| {
            let a = store.add_entity("A");
            let b = store.add_entity("B");
            store.add_link(a, b);
            a
        });
        explorer.load_graph(Some(focus), 1, false).expect("load");
        assert_eq!(
            explorer.toggle_pin(focus),
            Some(PinDiff {
                key: focus,
                pinned: true
            })
        );
        explorer.set_drag_position(focus, Pos2::new(500.0, 500.0));
        explorer.end_drag();

        explorer.load_graph(Some(focus), 2, false).expect("reload");
        assert!(explorer.is_pinned(&focus));
        assert_eq!(explorer.positions()[&focus], Pos2::new(500.0, 500.0));

        assert_eq!(
            explorer.toggle_pin(focus),
            Some(PinDiff {
                key: focus,
                pinned: false
            })
        );
    }

    #[test]
    fn drag_holds_the_node_until_released() {
        let (mut explorer, focus) = explorer_with(|store| {
            let a = store.add_entity("A");
            let b = store.add_entity("B");
            store.add_link(a, b);
            a
        });
        explorer.load_graph(Some(focus), 1, false).expect("load");

        assert!(explorer.set_drag_position(focus, Pos2::new(40.0, 40.0)));
        assert_eq!(explorer.dragging(), Some(focus));
        for _ in 0..30 {
            explorer.tick(1.0 / 60.0);
        }
        assert_eq!(explorer.positions()[&focus], Pos2::new(40.0, 40.0));

        explorer.end_drag();
        assert_eq!(explorer.dragging(), None);
    }

    #[test]
    fn hidden_view_does_not_move_nodes() {
        let (mut explorer, focus) = explorer_with(|store| {
            let a = store.add_entity("A");
            let b = store.add_entity("B");
            store.add_link(a, b);
            a
        });
        explorer.load_graph(Some(focus), 1, false).expect("load");
        explorer.tick(1.0 / 60.0);
        let velocities = explorer.layout().velocities.clone();

        explorer.set_visible(false);
        let before = explorer.positions().clone();
        explorer.tick(1.0);
        assert_eq!(explorer.positions(), &before);

        explorer.set_visible(true);
        assert_eq!(explorer.layout().velocities, velocities);
    }
}
