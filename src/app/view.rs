use eframe::egui::{self, Align2, Color32, FontId, PointerButton, Pos2, Sense, Stroke, Ui};

use crate::camera::{Camera, CameraCommand};
use crate::graph::NodeKey;
use crate::physics::node_radius;
use crate::util::short_label;

use super::ViewModel;
use super::render_utils::{
    circle_visible, draw_background, edge_color, node_color, screen_radius,
};

const LABEL_MAX_CHARS: usize = 28;
const LABEL_MIN_ZOOM: f32 = 0.7;

struct ScreenNode {
    key: NodeKey,
    position: Pos2,
    radius: f32,
    opacity: f32,
}

impl ViewModel {
    pub(super) fn draw_graph(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);
        self.viewport = rect.size();

        if self.fit_pending && !self.explorer.snapshot().is_empty() {
            self.explorer
                .apply_camera_command(CameraCommand::FitAll, self.viewport);
            self.fit_pending = false;
        }

        if response.hovered() {
            let scroll = ui.input(|input| input.raw_scroll_delta.y);
            if scroll.abs() > f32::EPSILON {
                let pointer = ui
                    .input(|input| input.pointer.hover_pos())
                    .unwrap_or_else(|| rect.center());
                self.explorer
                    .camera_mut()
                    .zoom_at(pointer - rect.center(), Camera::wheel_factor(scroll));
            }
        }
        if response.dragged_by(PointerButton::Secondary)
            || response.dragged_by(PointerButton::Middle)
        {
            self.explorer.camera_mut().pan_by(response.drag_delta());
        }

        let delta_seconds = ui
            .ctx()
            .input(|input| input.stable_dt)
            .clamp(1.0 / 240.0, 1.0 / 20.0);
        self.explorer.tick(delta_seconds);

        let camera = *self.explorer.camera();
        draw_background(&painter, rect, camera.pan, camera.scale);

        let screen_nodes = self
            .explorer
            .snapshot()
            .nodes
            .iter()
            .filter(|node| !self.explorer.is_hidden(&node.key))
            .filter_map(|node| {
                let world = self.explorer.layout().position(&node.key)?;
                Some(ScreenNode {
                    key: node.key,
                    position: camera.world_to_screen(rect, world),
                    radius: screen_radius(node_radius(node.key.kind), camera.scale),
                    opacity: self.explorer.lens().node_opacity(&node.key),
                })
            })
            .collect::<Vec<_>>();

        let pointer = ui.input(|input| input.pointer.hover_pos());
        let hovered = pointer.and_then(|pointer| {
            screen_nodes
                .iter()
                .filter(|node| node.position.distance(pointer) <= node.radius)
                .min_by(|a, b| {
                    a.position
                        .distance(pointer)
                        .total_cmp(&b.position.distance(pointer))
                })
                .map(|node| node.key)
        });
        if hovered.is_some() {
            ui.output_mut(|output| {
                output.cursor_icon = egui::CursorIcon::PointingHand;
            });
        }

        self.handle_node_drag(ui, rect, &response, hovered);
        if response.double_clicked_by(PointerButton::Primary) {
            if let Some(key) = hovered {
                self.explorer.request_expand(key);
            }
        } else if response.clicked_by(PointerButton::Primary) {
            self.explorer.set_selection(hovered);
        }

        let lens = self.explorer.lens();
        let zoom_sqrt = camera.scale.sqrt();
        for edge in &self.explorer.displayed_edges().edges {
            let (Some(start), Some(end)) = (
                self.explorer.layout().position(&edge.a()),
                self.explorer.layout().position(&edge.b()),
            ) else {
                continue;
            };
            let opacity = lens.edge_opacity(edge);
            if opacity <= 0.0 {
                continue;
            }

            let color = edge_color(edge.kind()).gamma_multiply(opacity);
            painter.line_segment(
                [
                    camera.world_to_screen(rect, start),
                    camera.world_to_screen(rect, end),
                ],
                Stroke::new((1.6 * zoom_sqrt).clamp(0.8, 3.6), color),
            );
        }

        let selection = self.explorer.selection();
        let show_labels = camera.scale >= LABEL_MIN_ZOOM;
        for node in &screen_nodes {
            if node.opacity <= 0.0 || !circle_visible(rect, node.position, node.radius) {
                continue;
            }

            let is_selected = selection == Some(node.key);
            let is_hovered = hovered == Some(node.key);
            let fill = if is_selected {
                Color32::from_rgb(245, 206, 93)
            } else {
                node_color(node.key.kind)
            };
            painter.circle_filled(node.position, node.radius, fill.gamma_multiply(node.opacity));

            if self.explorer.is_pinned(&node.key) {
                painter.circle_stroke(
                    node.position,
                    node.radius + 3.0,
                    Stroke::new(1.6, Color32::WHITE.gamma_multiply(node.opacity)),
                );
            }
            if is_hovered {
                painter.circle_stroke(
                    node.position,
                    node.radius + 1.5,
                    Stroke::new(1.2, Color32::from_rgb(230, 236, 242)),
                );
            }

            if show_labels || is_selected || is_hovered {
                let label = self
                    .explorer
                    .snapshot()
                    .label_of(&node.key)
                    .unwrap_or_default();
                painter.text(
                    node.position + egui::vec2(0.0, node.radius + 4.0),
                    Align2::CENTER_TOP,
                    short_label(label, LABEL_MAX_CHARS),
                    FontId::proportional(12.0),
                    Color32::from_gray(220).gamma_multiply(node.opacity),
                );
            }
        }

        if self.explorer.snapshot().is_empty() && !self.explorer.is_loading() {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "Nothing to show. Pick a focus or widen the budgets.",
                FontId::proportional(15.0),
                Color32::from_gray(180),
            );
        }
    }

    fn handle_node_drag(
        &mut self,
        ui: &Ui,
        rect: egui::Rect,
        response: &egui::Response,
        hovered: Option<NodeKey>,
    ) {
        if response.drag_started_by(PointerButton::Primary) {
            self.drag_target = hovered;
        }

        if let Some(key) = self.drag_target {
            if response.dragged_by(PointerButton::Primary)
                && let Some(pointer) = ui.input(|input| input.pointer.interact_pos())
            {
                let world = self.explorer.camera().screen_to_world(rect, pointer);
                self.explorer.set_drag_position(key, world);
            }

            if response.drag_stopped() {
                self.explorer.end_drag();
                self.drag_target = None;
            }
        }
    }
}
