use std::collections::HashSet;

use crate::components::viewport::ViewportSize;
use crate::config::ForceParams;
use crate::graph::{EgoGraph, Entity};

use super::simulation::SimulationState;

/// Drawn radius of the subject, independent of its weight.
pub const TARGET_RADIUS: f64 = 25.0;
/// Drawn radius of entities without a weight.
pub const DEFAULT_RADIUS: f64 = 4.0;
/// Extra screen-space slack when picking nodes under the pointer.
pub const HIT_SLOP: f64 = 4.0;
/// Pointer travel (screen pixels) that turns a press into a drag.
pub const CLICK_TOLERANCE: f64 = 3.0;

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 10.0;
pub const ZOOM_IN_LEVEL: f64 = 2.0;
pub const ZOOM_OUT_LEVEL: f64 = 0.5;
/// Seconds.
pub const ZOOM_DURATION: f64 = 0.5;
pub const FIT_PADDING: f64 = 50.0;
pub const SETTLE_FIT_DURATION: f64 = 0.4;
pub const SETTLE_FIT_PADDING: f64 = 80.0;

/// Drawn radius of an entity in world units.
pub fn node_radius(entity: &Entity) -> f64 {
	if entity.is_target() {
		TARGET_RADIUS
	} else {
		entity.size.map_or(DEFAULT_RADIUS, |val| val * 0.5)
	}
}

fn ease_out_cubic(t: f64) -> f64 {
	1.0 - (1.0 - t).powi(3)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
	/// No usable viewport yet.
	Idle,
	Simulating,
	Settled,
}

/// Screen = world * k + (x, y).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

impl Default for ViewTransform {
	fn default() -> Self {
		Self { x: 0.0, y: 0.0, k: 1.0 }
	}
}

impl ViewTransform {
	fn lerp(&self, to: &ViewTransform, t: f64) -> ViewTransform {
		ViewTransform {
			x: self.x + (to.x - self.x) * t,
			y: self.y + (to.y - self.y) * t,
			k: self.k + (to.k - self.k) * t,
		}
	}
}

#[derive(Clone, Debug)]
struct ZoomTransition {
	from: ViewTransform,
	to: ViewTransform,
	elapsed: f64,
	duration: f64,
}

#[derive(Clone, Debug, Default)]
pub struct DragState {
	pub active: bool,
	pub node: Option<usize>,
	pub start_x: f64,
	pub start_y: f64,
	pub node_start_x: f64,
	pub node_start_y: f64,
	pub moved: bool,
}

#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub transform_start_x: f64,
	pub transform_start_y: f64,
}

#[derive(Clone, Debug, Default)]
pub struct HoverState {
	pub node: Option<usize>,
	pub neighbors: HashSet<usize>,
}

/// Force layout engine for one ego-graph.
///
/// The engine starts [`Phase::Idle`] and only simulates once it has seen a
/// positive viewport. Every command is safe in every phase.
pub struct ForceGraphState {
	graph: EgoGraph,
	sim: SimulationState,
	params: ForceParams,
	phase: Phase,
	viewport: ViewportSize,
	pub transform: ViewTransform,
	zoom: Option<ZoomTransition>,
	pub drag: DragState,
	pub pan: PanState,
	pub hover: HoverState,
	layout_passes: u32,
	fits: u32,
}

impl ForceGraphState {
	pub fn new(graph: EgoGraph, params: ForceParams) -> Self {
		let sim = SimulationState::new(graph.graph(), &params);
		Self {
			graph,
			sim,
			params,
			phase: Phase::Idle,
			viewport: ViewportSize::ZERO,
			transform: ViewTransform::default(),
			zoom: None,
			drag: DragState::default(),
			pan: PanState::default(),
			hover: HoverState::default(),
			layout_passes: 0,
			fits: 0,
		}
	}

	pub fn graph(&self) -> &EgoGraph {
		&self.graph
	}

	pub fn simulation(&self) -> &SimulationState {
		&self.sim
	}

	pub fn viewport(&self) -> ViewportSize {
		self.viewport
	}

	pub fn is_animating(&self) -> bool {
		self.phase == Phase::Simulating || self.zoom.is_some()
	}

	/// Applies a new container size. Returns whether a layout pass started.
	pub fn resize(&mut self, size: ViewportSize) -> bool {
		if !size.is_positive() || size == self.viewport {
			return false;
		}
		if self.viewport.is_positive() {
			// keep the world point under the old center under the new center
			self.transform.x += (size.width - self.viewport.width) / 2.0;
			self.transform.y += (size.height - self.viewport.height) / 2.0;
		} else {
			let (cx, cy) = size.center();
			self.transform = ViewTransform { x: cx, y: cy, k: 1.0 };
		}
		self.viewport = size;
		self.zoom = None;
		self.sim.reheat();
		self.phase = Phase::Simulating;
		self.layout_passes += 1;
		log::debug!(
			"force layout pass {} at {}x{}",
			self.layout_passes,
			size.width,
			size.height
		);
		true
	}

	/// Restarts the simulation from the current positions.
	pub fn reheat(&mut self) {
		if self.phase == Phase::Idle {
			return;
		}
		self.sim.reheat();
		self.phase = Phase::Simulating;
	}

	/// Advances camera animation and, while simulating, the physics by one
	/// step. `dt` is in seconds.
	pub fn tick(&mut self, dt: f64) {
		self.advance_zoom(dt);
		if self.phase != Phase::Simulating {
			return;
		}
		self.sim.step(self.graph.graph(), &self.params);
		if self.sim.ticks() >= self.params.cooldown_ticks || self.sim.is_converged(&self.params) {
			self.phase = Phase::Settled;
			self.fits += 1;
			log::debug!("force layout settled after {} ticks", self.sim.ticks());
			self.fit(SETTLE_FIT_DURATION, SETTLE_FIT_PADDING);
		}
	}

	pub fn zoom_in(&mut self) {
		self.zoom_to_level(ZOOM_IN_LEVEL);
	}

	pub fn zoom_out(&mut self) {
		self.zoom_to_level(ZOOM_OUT_LEVEL);
	}

	pub fn zoom_to_fit(&mut self) {
		self.fit(ZOOM_DURATION, FIT_PADDING);
	}

	/// Moves the view by a screen-space offset.
	pub fn pan(&mut self, dx: f64, dy: f64) {
		self.settle_zoom();
		self.transform.x += dx;
		self.transform.y += dy;
	}

	/// Transform the view will rest at once any camera animation finishes.
	pub fn target_transform(&self) -> ViewTransform {
		self.zoom.as_ref().map_or(self.transform, |z| z.to)
	}

	fn zoom_to_level(&mut self, k: f64) {
		if !self.viewport.is_positive() {
			return;
		}
		let current = self.target_transform();
		let (cx, cy) = self.viewport.center();
		let (wx, wy) = ((cx - current.x) / current.k, (cy - current.y) / current.k);
		let to = ViewTransform {
			x: cx - wx * k,
			y: cy - wy * k,
			k,
		};
		self.animate_to(to, ZOOM_DURATION);
	}

	fn fit(&mut self, duration: f64, padding: f64) {
		if !self.viewport.is_positive() {
			return;
		}
		let Some((min_x, min_y, max_x, max_y)) = self.bounds() else {
			return;
		};
		let (bw, bh) = ((max_x - min_x).max(1.0), (max_y - min_y).max(1.0));
		let avail_w = (self.viewport.width - 2.0 * padding).max(1.0);
		let avail_h = (self.viewport.height - 2.0 * padding).max(1.0);
		let k = (avail_w / bw).min(avail_h / bh).clamp(MIN_ZOOM, MAX_ZOOM);
		let (cx, cy) = self.viewport.center();
		let to = ViewTransform {
			x: cx - (min_x + max_x) / 2.0 * k,
			y: cy - (min_y + max_y) / 2.0 * k,
			k,
		};
		self.animate_to(to, duration);
	}

	/// World-space bounding box of all drawn circles.
	pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
		self.graph
			.graph()
			.entities()
			.zip(self.sim.nodes())
			.map(|(entity, node)| {
				let r = node_radius(entity);
				(node.x - r, node.y - r, node.x + r, node.y + r)
			})
			.reduce(|a, b| (a.0.min(b.0), a.1.min(b.1), a.2.max(b.2), a.3.max(b.3)))
	}

	fn animate_to(&mut self, to: ViewTransform, duration: f64) {
		if duration <= 0.0 {
			self.transform = to;
			self.zoom = None;
			return;
		}
		self.zoom = Some(ZoomTransition {
			from: self.transform,
			to,
			elapsed: 0.0,
			duration,
		});
	}

	fn advance_zoom(&mut self, dt: f64) {
		let Some(zoom) = self.zoom.as_mut() else {
			return;
		};
		zoom.elapsed += dt;
		let t = zoom.elapsed / zoom.duration;
		if t >= 1.0 {
			self.transform = zoom.to;
			self.zoom = None;
		} else {
			self.transform = zoom.from.lerp(&zoom.to, ease_out_cubic(t));
		}
	}

	/// Jumps to the end of any running camera animation.
	fn settle_zoom(&mut self) {
		if let Some(zoom) = self.zoom.take() {
			self.transform = zoom.to;
		}
	}

	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		(
			(sx - self.transform.x) / self.transform.k,
			(sy - self.transform.y) / self.transform.k,
		)
	}

	/// Topmost node under a screen position.
	pub fn node_at_position(&self, sx: f64, sy: f64) -> Option<usize> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		let slop = HIT_SLOP / self.transform.k;
		self.graph
			.graph()
			.entities()
			.zip(self.sim.nodes())
			.enumerate()
			.filter(|(_, (entity, node))| {
				let (dx, dy) = (node.x - gx, node.y - gy);
				(dx * dx + dy * dy).sqrt() < node_radius(entity) + slop
			})
			.map(|(idx, _)| idx)
			.last()
	}

	pub fn set_hover(&mut self, node: Option<usize>) {
		if self.hover.node == node {
			return;
		}
		self.hover.node = node;
		self.hover.neighbors = node
			.map(|idx| self.graph.graph().neighbors(idx).collect())
			.unwrap_or_default();
	}

	pub fn is_highlighted(&self, idx: usize) -> bool {
		self.hover.node == Some(idx) || self.hover.neighbors.contains(&idx)
	}

	pub fn has_active_highlight(&self) -> bool {
		self.hover.node.is_some()
	}

	pub fn pointer_down(&mut self, x: f64, y: f64) {
		self.settle_zoom();
		if let Some(idx) = self.node_at_position(x, y) {
			let Some(node) = self.sim.node(idx) else {
				return;
			};
			self.drag = DragState {
				active: true,
				node: Some(idx),
				start_x: x,
				start_y: y,
				node_start_x: node.x,
				node_start_y: node.y,
				moved: false,
			};
		} else {
			self.pan = PanState {
				active: true,
				start_x: x,
				start_y: y,
				transform_start_x: self.transform.x,
				transform_start_y: self.transform.y,
			};
		}
	}

	pub fn pointer_move(&mut self, x: f64, y: f64) {
		if !self.drag.active {
			let hovered = self.node_at_position(x, y);
			self.set_hover(hovered);
		}

		if self.drag.active {
			let Some(idx) = self.drag.node else {
				return;
			};
			let (dx, dy) = (x - self.drag.start_x, y - self.drag.start_y);
			if !self.drag.moved && dx.hypot(dy) <= CLICK_TOLERANCE {
				return;
			}
			if !self.drag.moved {
				self.drag.moved = true;
				self.reheat();
			}
			let k = self.transform.k;
			self.sim
				.pin(idx, self.drag.node_start_x + dx / k, self.drag.node_start_y + dy / k);
		} else if self.pan.active {
			self.transform.x = self.pan.transform_start_x + (x - self.pan.start_x);
			self.transform.y = self.pan.transform_start_y + (y - self.pan.start_y);
		}
	}

	/// Ends a drag or pan. Returns the id of a node that was clicked, i.e.
	/// pressed and released without being dragged.
	pub fn pointer_up(&mut self) -> Option<String> {
		let clicked = match (self.drag.active, self.drag.node, self.drag.moved) {
			(true, Some(idx), false) => self.graph.graph().entity(idx).map(|e| e.id.clone()),
			_ => None,
		};
		self.drag = DragState::default();
		self.pan.active = false;
		clicked
	}

	pub fn pointer_leave(&mut self) {
		self.drag = DragState::default();
		self.pan.active = false;
		self.set_hover(None);
	}

	/// Zooms around a screen position, as for a mouse wheel.
	pub fn wheel(&mut self, x: f64, y: f64, delta_y: f64) {
		self.settle_zoom();
		let factor = if delta_y > 0.0 { 0.9 } else { 1.1 };
		let new_k = (self.transform.k * factor).clamp(MIN_ZOOM, MAX_ZOOM);
		let ratio = new_k / self.transform.k;
		self.transform.x = x - (x - self.transform.x) * ratio;
		self.transform.y = y - (y - self.transform.y) * ratio;
		self.transform.k = new_k;
	}
}

#[cfg(test)]
impl ForceGraphState {
	fn phase(&self) -> Phase {
		self.phase
	}

	/// Number of times the layout was (re)started by a graph or size change.
	pub(crate) fn layout_passes(&self) -> u32 {
		self.layout_passes
	}

	/// Number of automatic zoom-to-fits performed on settle.
	fn settle_fits(&self) -> u32 {
		self.fits
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::graph::MAX_NODES;
	use crate::graph::tests::star;

	fn engine(n: usize) -> ForceGraphState {
		ForceGraphState::new(star(n), ForceParams::default())
	}

	fn settle(state: &mut ForceGraphState) -> u32 {
		let mut ticks = 0;
		while state.phase() == Phase::Simulating {
			state.tick(0.016);
			ticks += 1;
			assert!(ticks <= 1000, "simulation never settled");
		}
		ticks
	}

	fn finish_camera(state: &mut ForceGraphState) {
		for _ in 0..100 {
			state.tick(0.016);
		}
	}

	#[test]
	fn idle_until_viewport_is_positive() {
		let mut state = engine(3);
		assert_eq!(state.phase(), Phase::Idle);
		state.tick(0.016);
		state.reheat();
		state.zoom_in();
		state.zoom_to_fit();
		assert_eq!(state.phase(), Phase::Idle);
		assert!(!state.resize(ViewportSize::ZERO));
		assert_eq!(state.layout_passes(), 0);
		assert!(state.resize(ViewportSize::new(800.0, 600.0)));
		assert_eq!(state.phase(), Phase::Simulating);
		assert_eq!(state.transform, ViewTransform { x: 400.0, y: 300.0, k: 1.0 });
	}

	#[test]
	fn same_size_is_not_a_new_pass() {
		let mut state = engine(3);
		assert!(state.resize(ViewportSize::new(800.0, 600.0)));
		assert!(!state.resize(ViewportSize::new(800.0, 600.0)));
		assert_eq!(state.layout_passes(), 1);
		assert!(state.resize(ViewportSize::new(1024.0, 600.0)));
		assert_eq!(state.layout_passes(), 2);
		assert_eq!(state.transform.x, 512.0);
	}

	#[test]
	fn settles_within_cooldown_and_fits_once() {
		for n in [0, 1, 12, 200] {
			let mut state = engine(n);
			state.resize(ViewportSize::new(800.0, 600.0));
			let ticks = settle(&mut state);
			assert_eq!(ticks, 100, "{n} mules");
			assert_eq!(state.phase(), Phase::Settled);
			assert_eq!(state.settle_fits(), 1);
			finish_camera(&mut state);
			assert_eq!(state.settle_fits(), 1);
		}
	}

	#[test]
	fn settles_at_the_node_ceiling() {
		let mut state = ForceGraphState::new(star(MAX_NODES - 1), ForceParams::default());
		assert_eq!(state.graph().graph().len(), MAX_NODES);
		state.resize(ViewportSize::new(1280.0, 800.0));
		assert_eq!(settle(&mut state), 100);
		assert_eq!(state.settle_fits(), 1);
		assert!(
			state
				.simulation()
				.nodes()
				.iter()
				.all(|node| node.x.is_finite() && node.y.is_finite())
		);
		finish_camera(&mut state);
		assert!(state.transform.k.is_finite() && state.transform.k > 0.0);
	}

	#[test]
	fn reheat_resumes_from_current_positions() {
		let mut state = engine(5);
		state.resize(ViewportSize::new(800.0, 600.0));
		settle(&mut state);
		let before = state.simulation().nodes().to_vec();
		state.reheat();
		assert_eq!(state.phase(), Phase::Simulating);
		assert_eq!(state.simulation().nodes(), before.as_slice());
		settle(&mut state);
		assert_eq!(state.settle_fits(), 2);
		assert_eq!(state.layout_passes(), 1);
	}

	#[test]
	fn fit_puts_every_node_on_screen() {
		let mut state = engine(10);
		state.resize(ViewportSize::new(800.0, 600.0));
		settle(&mut state);
		finish_camera(&mut state);
		let t = state.transform;
		for (entity, node) in state.graph().graph().entities().zip(state.simulation().nodes()) {
			let r = node_radius(entity);
			let (sx, sy) = (node.x * t.k + t.x, node.y * t.k + t.y);
			assert!(sx - r * t.k >= 79.0 && sx + r * t.k <= 721.0, "x {sx}");
			assert!(sy - r * t.k >= 79.0 && sy + r * t.k <= 521.0, "y {sy}");
		}
	}

	#[test]
	fn zoom_commands_are_idempotent() {
		let mut state = engine(4);
		state.resize(ViewportSize::new(800.0, 600.0));
		settle(&mut state);
		finish_camera(&mut state);
		state.zoom_in();
		state.zoom_in();
		finish_camera(&mut state);
		assert_eq!(state.transform.k, ZOOM_IN_LEVEL);
		state.zoom_out();
		finish_camera(&mut state);
		assert_eq!(state.transform.k, ZOOM_OUT_LEVEL);

		state.zoom_to_fit();
		finish_camera(&mut state);
		let fitted = state.transform;
		state.zoom_to_fit();
		finish_camera(&mut state);
		assert_eq!(state.transform, fitted);
	}

	#[test]
	fn zoom_keeps_the_view_center() {
		let mut state = engine(2);
		state.resize(ViewportSize::new(800.0, 600.0));
		let center_before = state.screen_to_graph(400.0, 300.0);
		state.zoom_in();
		let target = state.target_transform();
		let center_after = ((400.0 - target.x) / target.k, (300.0 - target.y) / target.k);
		assert!((center_before.0 - center_after.0).abs() < 1e-9);
		assert!((center_before.1 - center_after.1).abs() < 1e-9);
	}

	#[test]
	fn pan_shifts_the_transform() {
		let mut state = engine(2);
		state.resize(ViewportSize::new(800.0, 600.0));
		state.pan(15.0, -5.0);
		assert_eq!((state.transform.x, state.transform.y), (415.0, 295.0));
	}

	#[test]
	fn click_without_drag_reports_the_node() {
		let mut state = engine(3);
		state.resize(ViewportSize::new(800.0, 600.0));
		settle(&mut state);
		finish_camera(&mut state);
		let target = state.simulation().nodes()[0];
		let t = state.transform;
		let (sx, sy) = (target.x * t.k + t.x, target.y * t.k + t.y);
		state.pointer_down(sx, sy);
		assert_eq!(state.pointer_up(), Some("0xTarget".to_string()));
	}

	#[test]
	fn drag_pins_the_node_and_is_not_a_click() {
		let mut state = engine(3);
		state.resize(ViewportSize::new(800.0, 600.0));
		settle(&mut state);
		finish_camera(&mut state);
		let node = state.simulation().nodes()[0];
		let t = state.transform;
		let (sx, sy) = (node.x * t.k + t.x, node.y * t.k + t.y);
		state.pointer_down(sx, sy);
		state.pointer_move(sx + 40.0, sy);
		assert_eq!(state.phase(), Phase::Simulating);
		assert_eq!(state.pointer_up(), None);
		let pinned = state.simulation().nodes()[0].pinned.unwrap();
		assert!((pinned.0 - (node.x + 40.0 / t.k)).abs() < 1e-9);
	}

	#[test]
	fn background_drag_pans() {
		let mut state = engine(1);
		state.resize(ViewportSize::new(800.0, 600.0));
		state.pointer_down(5.0, 5.0);
		state.pointer_move(25.0, 15.0);
		assert_eq!(state.pointer_up(), None);
		assert_eq!((state.transform.x, state.transform.y), (420.0, 310.0));
	}

	#[test]
	fn hover_collects_neighbors() {
		let mut state = engine(3);
		state.set_hover(Some(0));
		assert!(state.is_highlighted(0));
		assert!(state.is_highlighted(3));
		state.set_hover(Some(1));
		assert!(state.is_highlighted(0));
		assert!(!state.is_highlighted(2));
		state.pointer_leave();
		assert!(!state.has_active_highlight());
	}

	#[test]
	fn wheel_zoom_is_clamped() {
		let mut state = engine(1);
		state.resize(ViewportSize::new(800.0, 600.0));
		for _ in 0..100 {
			state.wheel(100.0, 100.0, -1.0);
		}
		assert_eq!(state.transform.k, MAX_ZOOM);
		for _ in 0..200 {
			state.wheel(100.0, 100.0, 1.0);
		}
		assert_eq!(state.transform.k, MIN_ZOOM);
	}
}
