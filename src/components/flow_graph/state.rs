use crate::components::viewport::ViewportSize;
use crate::config::FlowParams;
use crate::graph::FlowGraph;

use super::sankey::{self, LayoutError, SankeyLayout};

/// Flow layout engine for one subject.
///
/// Layout is synchronous and happens on every accepted viewport change. A
/// failed pass is logged and leaves the last good layout in place.
pub struct FlowGraphState {
	graph: FlowGraph,
	params: FlowParams,
	viewport: ViewportSize,
	layout: Option<SankeyLayout>,
	last_error: Option<LayoutError>,
	layout_passes: u32,
}

impl FlowGraphState {
	pub fn new(graph: FlowGraph, params: FlowParams) -> Self {
		Self {
			graph,
			params,
			viewport: ViewportSize::ZERO,
			layout: None,
			last_error: None,
			layout_passes: 0,
		}
	}

	pub fn graph(&self) -> &FlowGraph {
		&self.graph
	}

	pub fn params(&self) -> &FlowParams {
		&self.params
	}

	pub fn viewport(&self) -> ViewportSize {
		self.viewport
	}

	/// Last successful layout, possibly computed for an earlier size.
	pub fn layout(&self) -> Option<&SankeyLayout> {
		self.layout.as_ref()
	}

	/// Error of the most recent pass, cleared by a successful one.
	pub fn last_error(&self) -> Option<&LayoutError> {
		self.last_error.as_ref()
	}

	/// Applies a new container size. Returns whether a layout pass ran.
	pub fn resize(&mut self, size: ViewportSize) -> bool {
		if !size.is_positive() || size == self.viewport {
			return false;
		}
		self.viewport = size;
		self.relayout();
		true
	}

	fn relayout(&mut self) {
		self.layout_passes += 1;
		match sankey::compute(&self.graph, self.viewport, &self.params) {
			Ok(layout) => {
				log::debug!(
					"flow layout pass {}: {} nodes in {} columns",
					self.layout_passes,
					layout.nodes.len(),
					layout.columns
				);
				self.layout = Some(layout);
				self.last_error = None;
			}
			Err(err) => {
				log::error!("flow layout failed, keeping previous frame: {err}");
				self.last_error = Some(err);
			}
		}
	}
}

#[cfg(test)]
impl FlowGraphState {
	pub(crate) fn layout_passes(&self) -> u32 {
		self.layout_passes
	}
}
