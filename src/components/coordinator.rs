//! Subject selection, data arrival and viewport changes, turned into the
//! lifecycle of the two engines.
//!
//! The coordinator is the only owner of engine instances. It creates an
//! engine once its view is mounted, its data has arrived and the viewport is
//! positive, and drops it when the subject changes or the view unmounts.
//! Fetching itself happens outside; results come back tagged with the
//! [`FetchTicket`] handed out on selection so late answers for an earlier
//! subject can be recognised and dropped.

use crate::api::DataFetchError;
use crate::components::flow_graph::{self, FlowGraphState};
use crate::components::force_graph::{self, ForceGraphState};
use crate::components::viewport::ViewportSize;
use crate::config::{FlowParams, ForceParams};
use crate::draw::DrawCommand;
use crate::graph::{EgoGraph, FlowGraph};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum View {
	Network,
	Flow,
}

impl View {
	pub fn title(self) -> &'static str {
		match self {
			View::Network => "Network",
			View::Flow => "Flow",
		}
	}
}

/// Force view commands. `Pan` moves the camera by screen pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
	ZoomIn,
	ZoomOut,
	ZoomToFit,
	Reheat,
	Pan(f64, f64),
}

/// Issued per subject selection; fetch results must present it back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchTicket {
	generation: u64,
	subject: String,
}

impl FetchTicket {
	pub fn subject(&self) -> &str {
		&self.subject
	}
}

/// What a view should show instead of, or on top of, its canvas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Panel {
	NoSubject,
	Loading,
	Unavailable(String),
	Ready,
}

#[derive(Debug, Default)]
enum Slot<T> {
	#[default]
	Empty,
	Loading,
	Ready(T),
	Failed(String),
}

impl<T> Slot<T> {
	fn ready(&self) -> Option<&T> {
		match self {
			Slot::Ready(data) => Some(data),
			_ => None,
		}
	}

	fn is_failed(&self) -> bool {
		matches!(self, Slot::Failed(_))
	}

	fn panel(&self) -> Panel {
		match self {
			Slot::Empty => Panel::NoSubject,
			Slot::Loading => Panel::Loading,
			Slot::Ready(_) => Panel::Ready,
			Slot::Failed(reason) => Panel::Unavailable(reason.clone()),
		}
	}
}

pub struct RenderCoordinator {
	force_params: ForceParams,
	flow_params: FlowParams,
	subject: Option<String>,
	generation: u64,
	viewport: ViewportSize,
	ego: Slot<EgoGraph>,
	flow: Slot<FlowGraph>,
	network_mounted: bool,
	flow_mounted: bool,
	force_engine: Option<ForceGraphState>,
	flow_engine: Option<FlowGraphState>,
	/// Something changed since the last painted frame.
	dirty: bool,
}

impl Default for RenderCoordinator {
	fn default() -> Self {
		Self::new(ForceParams::default(), FlowParams::default())
	}
}

impl RenderCoordinator {
	pub fn new(force_params: ForceParams, flow_params: FlowParams) -> Self {
		Self {
			force_params,
			flow_params,
			subject: None,
			generation: 0,
			viewport: ViewportSize::ZERO,
			ego: Slot::Empty,
			flow: Slot::Empty,
			network_mounted: false,
			flow_mounted: false,
			force_engine: None,
			flow_engine: None,
			dirty: true,
		}
	}

	/// Mutable access to the force engine for pointer input. Assumes the
	/// caller changes something worth repainting.
	pub fn force_mut(&mut self) -> Option<&mut ForceGraphState> {
		self.dirty = true;
		self.force_engine.as_mut()
	}

	/// Switches to a new subject. Returns `None` when it is already selected
	/// and nothing failed for it, otherwise the ticket both fetches for it
	/// must carry.
	pub fn select_subject(&mut self, subject: &str) -> Option<FetchTicket> {
		let subject = subject.trim();
		if subject.is_empty() {
			return None;
		}
		let failed = self.ego.is_failed() || self.flow.is_failed();
		if self.subject.as_deref() == Some(subject) && !failed {
			return None;
		}
		self.generation += 1;
		log::debug!("subject -> {subject} (generation {})", self.generation);
		self.subject = Some(subject.to_string());
		self.ego = Slot::Loading;
		self.flow = Slot::Loading;
		self.teardown(View::Network);
		self.teardown(View::Flow);
		Some(FetchTicket {
			generation: self.generation,
			subject: subject.to_string(),
		})
	}

	fn is_current(&self, ticket: &FetchTicket, what: &str) -> bool {
		if ticket.generation == self.generation {
			return true;
		}
		log::warn!(
			"discarding stale {what} data for {} (generation {}, current {})",
			ticket.subject,
			ticket.generation,
			self.generation
		);
		false
	}

	/// Delivers the ego-graph fetch. Returns whether it was applied.
	pub fn accept_ego(&mut self, ticket: &FetchTicket, result: Result<EgoGraph, DataFetchError>) -> bool {
		if !self.is_current(ticket, "network") {
			return false;
		}
		self.ego = match result {
			Ok(graph) => {
				log::debug!(
					"network data for {}: {} entities around {}",
					ticket.subject,
					graph.graph().len(),
					graph.target_entity().label
				);
				Slot::Ready(graph)
			}
			Err(err) => {
				log::warn!("network data for {} unavailable: {err}", ticket.subject);
				Slot::Failed(err.to_string())
			}
		};
		self.sync();
		true
	}

	/// Delivers the flow fetch. Returns whether it was applied.
	pub fn accept_flow(&mut self, ticket: &FetchTicket, result: Result<FlowGraph, DataFetchError>) -> bool {
		if !self.is_current(ticket, "flow") {
			return false;
		}
		self.flow = match result {
			Ok(graph) => Slot::Ready(graph),
			Err(err) => {
				log::warn!("flow data for {} unavailable: {err}", ticket.subject);
				Slot::Failed(err.to_string())
			}
		};
		self.sync();
		true
	}

	/// New container size. Mounted engines re-run layout; data is kept.
	pub fn resize(&mut self, size: ViewportSize) -> bool {
		// resizing the canvas wipes what was painted
		self.dirty = true;
		if !size.is_positive() || size == self.viewport {
			return false;
		}
		self.viewport = size;
		if let Some(engine) = self.force_engine.as_mut() {
			engine.resize(size);
		}
		if let Some(engine) = self.flow_engine.as_mut() {
			engine.resize(size);
		}
		self.sync();
		true
	}

	pub fn mount(&mut self, view: View) {
		match view {
			View::Network => self.network_mounted = true,
			View::Flow => self.flow_mounted = true,
		}
		self.sync();
	}

	pub fn unmount(&mut self, view: View) {
		match view {
			View::Network => self.network_mounted = false,
			View::Flow => self.flow_mounted = false,
		}
		self.teardown(view);
	}

	fn teardown(&mut self, view: View) {
		self.dirty = true;
		let dropped = match view {
			View::Network => self.force_engine.take().is_some(),
			View::Flow => self.flow_engine.take().is_some(),
		};
		if dropped {
			log::debug!("{} engine torn down", view.title());
		}
	}

	/// Starts every engine whose view is mounted and whose inputs are ready.
	fn sync(&mut self) {
		self.dirty = true;
		if !self.viewport.is_positive() {
			return;
		}
		if self.network_mounted && self.force_engine.is_none() {
			if let Some(graph) = self.ego.ready() {
				let mut engine = ForceGraphState::new(graph.clone(), self.force_params.clone());
				engine.resize(self.viewport);
				self.force_engine = Some(engine);
			}
		}
		if self.flow_mounted && self.flow_engine.is_none() {
			if let Some(graph) = self.flow.ready() {
				let mut engine = FlowGraphState::new(graph.clone(), self.flow_params.clone());
				engine.resize(self.viewport);
				self.flow_engine = Some(engine);
			}
		}
	}

	/// Advances the force engine. Returns whether the frame needs painting.
	pub fn tick(&mut self, dt: f64) -> bool {
		let moved = match self.force_engine.as_mut() {
			Some(engine) => {
				let was_animating = engine.is_animating();
				engine.tick(dt);
				was_animating || engine.is_animating()
			}
			None => false,
		};
		std::mem::take(&mut self.dirty) || moved
	}

	/// Applies a command to the force view. Ignored while it has no engine.
	pub fn command(&mut self, command: Command) {
		let Some(engine) = self.force_engine.as_mut() else {
			return;
		};
		self.dirty = true;
		match command {
			Command::ZoomIn => engine.zoom_in(),
			Command::ZoomOut => engine.zoom_out(),
			Command::ZoomToFit => engine.zoom_to_fit(),
			Command::Reheat => engine.reheat(),
			Command::Pan(dx, dy) => engine.pan(dx, dy),
		}
	}

	pub fn panel(&self, view: View) -> Panel {
		if self.subject.is_none() {
			return Panel::NoSubject;
		}
		match view {
			View::Network => self.ego.panel(),
			View::Flow => match self.flow_engine.as_ref() {
				// a failed pass with an earlier layout keeps showing that layout
				Some(engine) if engine.layout().is_none() => engine
					.last_error()
					.map_or(Panel::Ready, |err| Panel::Unavailable(format!("layout failed: {err}"))),
				_ => self.flow.panel(),
			},
		}
	}

	pub fn render(&self, view: View) -> Vec<DrawCommand> {
		match view {
			View::Network => self.force_engine.as_ref().map(force_graph::render),
			View::Flow => self.flow_engine.as_ref().map(flow_graph::render),
		}
		.unwrap_or_default()
	}
}

#[cfg(test)]
impl RenderCoordinator {
	fn subject(&self) -> Option<&str> {
		self.subject.as_deref()
	}

	fn viewport(&self) -> ViewportSize {
		self.viewport
	}

	fn force(&self) -> Option<&ForceGraphState> {
		self.force_engine.as_ref()
	}

	fn flow(&self) -> Option<&FlowGraphState> {
		self.flow_engine.as_ref()
	}

	fn is_mounted(&self, view: View) -> bool {
		match view {
			View::Network => self.network_mounted,
			View::Flow => self.flow_mounted,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::flow_graph::sankey::tests::fan;
	use crate::graph::GraphError;
	use crate::graph::tests::star;

	fn mounted() -> RenderCoordinator {
		let mut c = RenderCoordinator::default();
		c.mount(View::Network);
		c.mount(View::Flow);
		c
	}

	fn passes(c: &RenderCoordinator) -> (u32, u32) {
		(
			c.force().map_or(0, ForceGraphState::layout_passes),
			c.flow().map_or(0, FlowGraphState::layout_passes),
		)
	}

	#[test]
	fn engines_wait_for_a_positive_viewport() {
		let mut c = mounted();
		let ticket = c.select_subject("0xTarget").unwrap();
		assert!(c.accept_ego(&ticket, Ok(star(3))));
		assert!(c.accept_flow(&ticket, Ok(fan())));
		assert!(!c.resize(ViewportSize::ZERO));
		assert_eq!(c.viewport(), ViewportSize::ZERO);
		assert!(c.force().is_none() && c.flow().is_none());

		assert!(c.resize(ViewportSize::new(800.0, 600.0)));
		assert_eq!(passes(&c), (1, 1));
		assert!(!c.resize(ViewportSize::new(800.0, 600.0)));
		assert_eq!(passes(&c), (1, 1));
		assert!(c.resize(ViewportSize::new(820.0, 600.0)));
		assert_eq!(passes(&c), (2, 2));
	}

	#[test]
	fn data_after_viewport_starts_one_pass() {
		let mut c = mounted();
		c.resize(ViewportSize::new(800.0, 600.0));
		let ticket = c.select_subject("0xTarget").unwrap();
		assert_eq!(c.panel(View::Network), Panel::Loading);
		c.accept_ego(&ticket, Ok(star(2)));
		c.accept_flow(&ticket, Ok(fan()));
		assert_eq!(passes(&c), (1, 1));
		assert_eq!(c.panel(View::Network), Panel::Ready);
	}

	#[test]
	fn stale_results_are_dropped() {
		let mut c = mounted();
		c.resize(ViewportSize::new(800.0, 600.0));
		let a = c.select_subject("A").unwrap();
		let b = c.select_subject("B").unwrap();
		assert_eq!(b.subject(), "B");

		assert!(!c.accept_ego(&a, Ok(star(7))));
		assert!(!c.accept_flow(&a, Ok(fan())));
		assert!(c.force().is_none() && c.flow().is_none());
		assert_eq!(c.panel(View::Network), Panel::Loading);

		assert!(c.accept_ego(&b, Ok(star(2))));
		assert_eq!(c.force().unwrap().graph().graph().len(), 3);
		// A's answer arriving even later still changes nothing
		assert!(!c.accept_ego(&a, Ok(star(7))));
		assert_eq!(c.force().unwrap().graph().graph().len(), 3);
	}

	#[test]
	fn fetch_failure_shows_a_placeholder() {
		let mut c = mounted();
		c.resize(ViewportSize::new(800.0, 600.0));
		let ticket = c.select_subject("0xdead").unwrap();
		c.accept_ego(&ticket, Err(DataFetchError::Malformed(GraphError::MissingTarget)));
		c.accept_flow(
			&ticket,
			Err(DataFetchError::Status {
				url: "http://localhost:5000/api/flow".into(),
				status: 503,
			}),
		);
		assert!(c.force().is_none() && c.flow().is_none());
		assert!(matches!(c.panel(View::Network), Panel::Unavailable(_)));
		assert_eq!(
			c.panel(View::Flow),
			Panel::Unavailable("http://localhost:5000/api/flow answered HTTP 503".into())
		);
		assert!(c.render(View::Network).is_empty());
	}

	#[test]
	fn subject_switch_and_unmount_tear_engines_down() {
		let mut c = mounted();
		c.resize(ViewportSize::new(800.0, 600.0));
		let ticket = c.select_subject("0xTarget").unwrap();
		c.accept_ego(&ticket, Ok(star(3)));
		c.accept_flow(&ticket, Ok(fan()));
		assert!(c.force().is_some());

		c.unmount(View::Network);
		assert!(!c.is_mounted(View::Network));
		assert!(c.force().is_none());
		// one repaint for the teardown, then nothing moves
		assert!(c.tick(0.016));
		assert!(!c.tick(0.016));
		c.mount(View::Network);
		assert_eq!(c.force().map(ForceGraphState::layout_passes), Some(1));

		assert_eq!(c.select_subject("0xTarget"), None);
		assert!(c.force().is_some());
		c.select_subject("0xOther").unwrap();
		assert_eq!(c.subject(), Some("0xOther"));
		assert!(c.force().is_none() && c.flow().is_none());
	}

	#[test]
	fn unmounted_views_are_not_laid_out() {
		let mut c = RenderCoordinator::default();
		c.mount(View::Flow);
		c.resize(ViewportSize::new(800.0, 600.0));
		let ticket = c.select_subject("0xTarget").unwrap();
		c.accept_ego(&ticket, Ok(star(3)));
		c.accept_flow(&ticket, Ok(fan()));
		assert!(c.force().is_none());
		assert_eq!(c.flow().map(FlowGraphState::layout_passes), Some(1));
		c.resize(ViewportSize::new(640.0, 480.0));
		assert_eq!(c.flow().map(FlowGraphState::layout_passes), Some(2));
	}

	#[test]
	fn commands_drive_the_force_engine() {
		let mut c = mounted();
		c.command(Command::ZoomIn);
		c.resize(ViewportSize::new(800.0, 600.0));
		let ticket = c.select_subject("0xTarget").unwrap();
		c.accept_ego(&ticket, Ok(star(3)));
		while c.force().is_some_and(ForceGraphState::is_animating) {
			c.tick(0.016);
		}
		c.command(Command::Reheat);
		assert!(c.force().is_some_and(ForceGraphState::is_animating));
		let before = c.force().map(|engine| engine.transform.x);
		c.command(Command::Pan(10.0, 0.0));
		assert_eq!(c.force().map(|engine| engine.transform.x), before.map(|x| x + 10.0));
		assert!(c.tick(0.016));
		assert!(!c.render(View::Network).is_empty());
	}

	#[test]
	fn settled_frames_are_not_repainted() {
		let mut c = mounted();
		c.resize(ViewportSize::new(800.0, 600.0));
		let ticket = c.select_subject("0xTarget").unwrap();
		c.accept_ego(&ticket, Ok(star(3)));
		let mut frames = 0;
		while c.tick(0.016) {
			frames += 1;
			assert!(frames < 10_000, "force view never went quiet");
		}
		assert!(!c.tick(0.016));

		c.command(Command::ZoomOut);
		assert!(c.tick(0.016));
		while c.tick(0.016) {}
		if let Some(engine) = c.force_mut() {
			engine.pointer_move(1.0, 1.0);
		}
		assert!(c.tick(0.016));
		assert!(!c.tick(0.016));

		c.unmount(View::Network);
		c.mount(View::Flow);
		assert!(c.tick(0.016));
	}

	#[test]
	fn failed_subject_can_be_retried() {
		let mut c = mounted();
		c.resize(ViewportSize::new(800.0, 600.0));
		let first = c.select_subject("0xA").unwrap();
		c.accept_ego(&first, Err(DataFetchError::Malformed(GraphError::MissingTarget)));
		c.accept_flow(&first, Ok(fan()));
		assert!(matches!(c.panel(View::Network), Panel::Unavailable(_)));

		let retry = c.select_subject("0xA").expect("a failed subject is fetched again");
		assert_ne!(retry, first);
		assert_eq!(c.panel(View::Network), Panel::Loading);
		assert!(!c.accept_ego(&first, Ok(star(2))));
		assert!(c.accept_ego(&retry, Ok(star(2))));
		assert!(c.accept_flow(&retry, Ok(fan())));
		assert_eq!(c.panel(View::Network), Panel::Ready);
		assert_eq!(c.select_subject("0xA"), None);
	}

	#[test]
	fn flow_layout_failure_is_reported() {
		use crate::components::flow_graph::sankey::tests::flow;

		let mut c = mounted();
		c.resize(ViewportSize::new(800.0, 600.0));
		let ticket = c.select_subject("0xTarget").unwrap();
		let circular = flow(&["a", "TARGET", "c"], &[(0, 1, 5.0), (1, 2, 5.0), (2, 0, 5.0)]);
		c.accept_flow(&ticket, Ok(circular));
		assert!(c.flow().is_some());
		assert_eq!(
			c.panel(View::Flow),
			Panel::Unavailable("layout failed: circular link".into())
		);
	}
}
