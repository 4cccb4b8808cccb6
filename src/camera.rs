use eframe::egui::{Pos2, Rect, Vec2, vec2};

use crate::graph::NodeKey;

pub const MIN_SCALE: f32 = 0.4;
pub const MAX_SCALE: f32 = 3.0;
/// Screen padding kept around the bounding box when fitting.
pub const FIT_MARGIN: f32 = 48.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraCommand {
    Reset,
    Center(NodeKey),
    FitAll,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub scale: f32,
    /// Screen-space offset of the world origin from the viewport center, so
    /// `screen = center + pan + world * scale`.
    pub pan: Vec2,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            scale: 1.0,
            pan: Vec2::ZERO,
        }
    }
}

impl Camera {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Pans so `world` lands on the viewport center at the current scale.
    pub fn center_on(&mut self, world: Pos2) {
        self.pan = -world.to_vec2() * self.scale;
    }

    /// Fits the bounding box of `points` into a viewport of `available` size.
    /// Does nothing when there are no points.
    pub fn fit<I>(&mut self, points: I, available: Vec2)
    where
        I: IntoIterator<Item = Pos2>,
    {
        let mut points = points.into_iter();
        let Some(first) = points.next() else {
            return;
        };
        let bounds = points.fold(Rect::from_min_max(first, first), |bounds, point| {
            bounds.union(Rect::from_min_max(point, point))
        });

        let extent = bounds.size().max(vec2(1.0, 1.0));
        let room = (available - Vec2::splat(FIT_MARGIN * 2.0)).max(vec2(1.0, 1.0));
        self.scale = (room.x / extent.x)
            .min(room.y / extent.y)
            .clamp(MIN_SCALE, MAX_SCALE);
        self.center_on(bounds.center());
    }

    /// Multiplies the scale by `factor`, keeping the world point under
    /// `anchor` (screen offset from the viewport center) fixed on screen.
    pub fn zoom_at(&mut self, anchor: Vec2, factor: f32) {
        let world_before = (anchor - self.pan) / self.scale;
        self.scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        self.pan = anchor - world_before * self.scale;
    }

    /// Wheel zoom step, as a factor for [`Camera::zoom_at`].
    pub fn wheel_factor(scroll: f32) -> f32 {
        (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15)
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    pub fn world_to_screen(&self, viewport: Rect, world: Pos2) -> Pos2 {
        viewport.center() + self.pan + world.to_vec2() * self.scale
    }

    pub fn screen_to_world(&self, viewport: Rect, screen: Pos2) -> Pos2 {
        ((screen - viewport.center() - self.pan) / self.scale).to_pos2()
    }
}
