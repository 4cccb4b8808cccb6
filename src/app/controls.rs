use eframe::egui::{self, Slider, Ui};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::camera::CameraCommand;
use crate::graph::{EdgeKind, NodeKey};
use crate::util::short_label;

use super::ViewModel;

const SEARCH_RESULT_ROWS: usize = 12;
const FOCUS_RESULT_LIMIT: usize = 12;

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_lowercase(), &query.to_lowercase()))
}

impl ViewModel {
    pub(super) fn draw_controls(&mut self, ui: &mut Ui) {
        egui::ScrollArea::vertical().show(ui, |ui| {
            ui.heading("Explorer");
            ui.separator();

            self.draw_search(ui);
            ui.separator();
            self.draw_load_settings(ui);
            ui.separator();
            self.draw_lens_settings(ui);
            ui.separator();
            self.draw_physics_settings(ui);
            ui.separator();
            self.draw_camera_buttons(ui);
            ui.separator();
            self.draw_selection(ui);

            if let Some(error) = self.explorer.last_error().map(ToString::to_string) {
                ui.separator();
                ui.colored_label(egui::Color32::from_rgb(235, 110, 100), error);
                if ui.button("Retry").clicked() {
                    self.explorer.request_load();
                }
            }
        });
    }

    fn draw_search(&mut self, ui: &mut Ui) {
        ui.label("Search")
            .on_hover_text("Fuzzy-match loaded nodes, or look up a new focus in the notebook.");
        ui.text_edit_singleline(&mut self.search);

        let query = self.search.trim().to_owned();
        if query.is_empty() {
            return;
        }

        let matcher = SkimMatcherV2::default();
        let mut matches = self
            .explorer
            .snapshot()
            .nodes
            .iter()
            .filter_map(|node| {
                fuzzy_match_score(&matcher, &node.label, &query)
                    .map(|score| (score, node.key, node.label.clone()))
            })
            .collect::<Vec<_>>();
        matches.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.2.cmp(&b.2)));

        let mut picked = None;
        for (_, key, label) in matches.into_iter().take(SEARCH_RESULT_ROWS) {
            if ui
                .selectable_label(self.explorer.selection() == Some(key), short_label(&label, 36))
                .clicked()
            {
                picked = Some(key);
            }
        }
        if let Some(key) = picked {
            self.explorer.set_selection(Some(key));
            self.explorer
                .apply_camera_command(CameraCommand::Center(key), self.viewport);
        }

        if ui
            .button("Find focus in notebook")
            .on_hover_text("Entities whose name starts with the search text.")
            .clicked()
        {
            match self.explorer.search_store(&query, FOCUS_RESULT_LIMIT) {
                Ok(results) => self.focus_results = results,
                Err(error) => tracing::warn!(%error, "focus search failed"),
            }
        }

        let mut new_focus = None;
        for summary in &self.focus_results {
            if ui.button(short_label(&summary.label, 36)).clicked() {
                new_focus = Some(NodeKey::entity(summary.id));
            }
        }
        if let Some(focus) = new_focus {
            self.focus_results.clear();
            self.explorer.set_focus(Some(focus));
        }
    }

    fn draw_load_settings(&mut self, ui: &mut Ui) {
        ui.label("Neighborhood");
        let config = self.explorer.config().clone();

        let mut hops = config.hops;
        if ui
            .add(Slider::new(&mut hops, 1..=4).text("hops"))
            .on_hover_text("Link hops from the focus node.")
            .changed()
        {
            self.explorer.set_hops(hops);
        }

        let mut budgets = config.budgets;
        let nodes_changed = ui
            .add(Slider::new(&mut budgets.max_nodes, 20..=1_000).text("max nodes"))
            .changed();
        let links_changed = ui
            .add(Slider::new(&mut budgets.max_links, 50..=3_000).text("max links"))
            .changed();
        if nodes_changed || links_changed {
            self.explorer.set_budgets(budgets);
        }

        let mut include_attributes = config.include_attributes;
        if ui
            .checkbox(&mut include_attributes, "Include attributes")
            .changed()
        {
            self.explorer.set_include_attributes(include_attributes);
        }

        ui.horizontal(|ui| {
            let reload = ui.add_enabled(!self.explorer.is_loading(), egui::Button::new("Reload"));
            if reload.clicked() {
                self.explorer.request_load();
            }
            if self.explorer.focus().is_some() && ui.button("Clear focus").clicked() {
                self.explorer.set_focus(None);
            }
        });
    }

    fn draw_lens_settings(&mut self, ui: &mut Ui) {
        ui.label("Spotlight")
            .on_hover_text("Selecting a node always spotlights its direct neighbors.");
        let mut settings = self.explorer.config().lens;
        let mut changed = ui.checkbox(&mut settings.enabled, "Enabled").changed();
        changed |= ui
            .checkbox(&mut settings.hide_non_relevant, "Hide unrelated nodes")
            .changed();
        changed |= ui
            .add(Slider::new(&mut settings.depth, 1..=4).text("depth"))
            .changed();
        if changed {
            self.explorer.set_lens_settings(settings);
        }
    }

    fn draw_physics_settings(&mut self, ui: &mut Ui) {
        ui.label("Layout");
        let mut visible = self.explorer.is_visible();
        if ui.checkbox(&mut visible, "Live physics").changed() {
            self.explorer.set_visible(visible);
        }

        let mut physics = self.explorer.config().physics;
        let mut changed = ui
            .add(Slider::new(&mut physics.repulsion, 0.0..=200_000.0).text("repulsion"))
            .changed();
        changed |= ui
            .add(Slider::new(&mut physics.collision_strength, 0.0..=4.0).text("collision"))
            .on_hover_text("Higher values separate overlapping nodes faster but can jitter.")
            .changed();
        changed |= ui
            .add(Slider::new(&mut physics.link_spring, 0.0..=0.2).text("link spring"))
            .changed();
        changed |= ui
            .add(Slider::new(&mut physics.link_rest_length, 20.0..=400.0).text("link length"))
            .changed();
        changed |= ui
            .add(Slider::new(&mut physics.velocity_damping, 0.5..=0.99).text("damping"))
            .changed();
        if changed {
            self.explorer.set_physics(physics);
        }
    }

    fn draw_camera_buttons(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            if ui.button("Reset view").clicked() {
                self.explorer
                    .apply_camera_command(CameraCommand::Reset, self.viewport);
            }
            if ui.button("Fit all").clicked() {
                self.explorer
                    .apply_camera_command(CameraCommand::FitAll, self.viewport);
            }
            if let Some(key) = self.explorer.selection()
                && ui.button("Center").clicked()
            {
                self.explorer
                    .apply_camera_command(CameraCommand::Center(key), self.viewport);
            }
        });
    }

    fn draw_selection(&mut self, ui: &mut Ui) {
        let Some(selected) = self.explorer.selection() else {
            ui.label("Click a node to see its links.");
            return;
        };

        let snapshot = self.explorer.snapshot();
        let label = snapshot.label_of(&selected).unwrap_or_default().to_owned();
        ui.heading(short_label(&label, 40));
        ui.label(format!("{} {}", selected.kind.label(), selected.id));
        if let Some(owner) = snapshot.owner_of(&selected)
            && let Some(owner_label) = snapshot.label_of(&owner)
        {
            ui.label(format!("belongs to {owner_label}"));
        }

        let mut notes = snapshot
            .notes
            .iter()
            .filter(|(key, _)| key.kind == EdgeKind::Link)
            .filter_map(|(key, note)| {
                if key.source == selected {
                    Some(format!("→ {}: {note}", snapshot.label_of(&key.target)?))
                } else if key.target == selected {
                    Some(format!("← {}: {note}", snapshot.label_of(&key.source)?))
                } else {
                    None
                }
            })
            .collect::<Vec<_>>();
        notes.sort();

        ui.horizontal(|ui| {
            let pin_text = if self.explorer.is_pinned(&selected) {
                "Unpin"
            } else {
                "Pin"
            };
            if ui.button(pin_text).clicked() {
                self.explorer.toggle_pin(selected);
            }
            let expand = ui.add_enabled(!self.explorer.is_loading(), egui::Button::new("Expand"));
            if expand.clicked() {
                self.explorer.request_expand(selected);
            }
            if ui.button("Focus here").clicked() && selected.is_entity() {
                self.explorer.set_focus(Some(selected));
            }
        });

        let displayed = self.explorer.displayed_edges();
        ui.label(format!("{} links", displayed.incident_link_count));
        let hidden = displayed.hidden_link_count;
        if hidden > 0 && ui.button(format!("Show {hidden} more")).clicked() {
            self.explorer.show_all_links_for_selection(true);
        }

        for note in notes {
            ui.label(note);
        }
    }
}
