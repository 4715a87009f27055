//! Layered flow layout.
//!
//! Nodes are placed in columns by their depth from the sources, stacked with
//! heights proportional to the flow through them, and then relaxed towards
//! the vertical position of their neighbors for a fixed number of
//! iterations. Link breadths are assigned last so ribbons leave and enter
//! nodes without crossing inside them.

use thiserror::Error;

use crate::components::viewport::ViewportSize;
use crate::config::FlowParams;
use crate::graph::FlowGraph;

/// Why a flow graph could not be laid out.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
	#[error("circular link")]
	CircularLink,
	#[error("subject `{0}` has no flows")]
	DisconnectedSubject(String),
	#[error("{width}x{height} leaves no room for the diagram")]
	ExtentTooSmall { width: f64, height: f64 },
}

/// Geometry of one entity, in chart coordinates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SankeyNode {
	pub x0: f64,
	pub x1: f64,
	pub y0: f64,
	pub y1: f64,
	/// Larger of total inflow and total outflow.
	pub value: f64,
	pub layer: usize,
	source_links: Vec<usize>,
	target_links: Vec<usize>,
}

impl SankeyNode {
	pub fn height(&self) -> f64 {
		self.y1 - self.y0
	}

	pub fn mid_y(&self) -> f64 {
		(self.y0 + self.y1) / 2.0
	}
}

/// Geometry of one relationship. `y0` is the ribbon center where it leaves
/// the source, `y1` where it enters the target.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SankeyLink {
	pub source: usize,
	pub target: usize,
	pub value: f64,
	pub width: f64,
	pub y0: f64,
	pub y1: f64,
}

/// Output of [`compute`]. Nodes and links are indexed like the graph's
/// entities and relationships.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SankeyLayout {
	pub nodes: Vec<SankeyNode>,
	pub links: Vec<SankeyLink>,
	pub columns: usize,
	/// Size of the chart area inside the margins.
	pub chart_width: f64,
	pub chart_height: f64,
}

#[derive(Clone, Copy, Debug)]
struct Extent {
	x0: f64,
	y0: f64,
	x1: f64,
	y1: f64,
}

/// Lays out `graph` inside `viewport` minus the configured margins.
pub fn compute(graph: &FlowGraph, viewport: ViewportSize, params: &FlowParams) -> Result<SankeyLayout, LayoutError> {
	let m = &params.margins;
	let chart_width = viewport.width - m.left - m.right;
	let chart_height = viewport.height - m.top - m.bottom;
	// d3-style inset so strokes at the edges are not clipped
	let extent = Extent {
		x0: 1.0,
		y0: 1.0,
		x1: chart_width - 1.0,
		y1: chart_height - 5.0,
	};
	if extent.x1 - extent.x0 <= params.node_width || extent.y1 <= extent.y0 {
		return Err(LayoutError::ExtentTooSmall {
			width: viewport.width,
			height: viewport.height,
		});
	}

	let tg = graph.graph();
	if let Some(subject) = graph.subject() {
		let linked = tg
			.relationships()
			.any(|r| r.source == subject || r.target == subject);
		if !linked && tg.relationship_count() > 0 {
			let label = tg.entity(subject).map(|e| e.label.clone()).unwrap_or_default();
			return Err(LayoutError::DisconnectedSubject(label));
		}
	}
	if tg.has_cycle() {
		return Err(LayoutError::CircularLink);
	}

	let mut sankey = Sankey::new(graph, extent, params);
	sankey.compute_node_depths();
	sankey.compute_node_layers();
	sankey.compute_node_breadths(params.iterations);
	sankey.compute_link_breadths();

	Ok(SankeyLayout {
		columns: sankey.columns.len(),
		nodes: sankey.nodes,
		links: sankey.links,
		chart_width,
		chart_height,
	})
}

struct Sankey {
	nodes: Vec<SankeyNode>,
	links: Vec<SankeyLink>,
	depth: Vec<usize>,
	columns: Vec<Vec<usize>>,
	extent: Extent,
	node_width: f64,
	node_padding: f64,
	/// Effective padding, shrunk when the tallest column would not fit.
	py: f64,
}

impl Sankey {
	fn new(graph: &FlowGraph, extent: Extent, params: &FlowParams) -> Self {
		let tg = graph.graph();
		let mut nodes = vec![SankeyNode::default(); tg.len()];
		let links = tg
			.relationships()
			.enumerate()
			.map(|(i, rel)| {
				nodes[rel.source].source_links.push(i);
				nodes[rel.target].target_links.push(i);
				SankeyLink {
					source: rel.source,
					target: rel.target,
					value: rel.amount,
					..SankeyLink::default()
				}
			})
			.collect::<Vec<_>>();
		for node in &mut nodes {
			let out: f64 = node.source_links.iter().map(|&l| links[l].value).sum();
			let inflow: f64 = node.target_links.iter().map(|&l| links[l].value).sum();
			node.value = out.max(inflow);
		}
		Self {
			depth: vec![0; nodes.len()],
			nodes,
			links,
			columns: Vec::new(),
			extent,
			node_width: params.node_width,
			node_padding: params.node_padding,
			py: params.node_padding,
		}
	}

	/// Breadth-first from every node at once; a node's depth is the last
	/// round it was reached in. The graph must be acyclic.
	fn compute_node_depths(&mut self) {
		let n = self.nodes.len();
		let mut current: Vec<usize> = (0..n).collect();
		let mut queued = vec![false; n];
		let mut x = 0;
		while !current.is_empty() {
			let mut next = Vec::new();
			for &node in &current {
				self.depth[node] = x;
				for &l in &self.nodes[node].source_links {
					let target = self.links[l].target;
					if !queued[target] {
						queued[target] = true;
						next.push(target);
					}
				}
			}
			x += 1;
			for &node in &next {
				queued[node] = false;
			}
			current = next;
		}
	}

	/// Left alignment: column = depth.
	fn compute_node_layers(&mut self) {
		let Some(&max_depth) = self.depth.iter().max() else {
			return;
		};
		let count = max_depth + 1;
		let kx = if count > 1 {
			(self.extent.x1 - self.extent.x0 - self.node_width) / (count - 1) as f64
		} else {
			0.0
		};
		self.columns = vec![Vec::new(); count];
		for (idx, node) in self.nodes.iter_mut().enumerate() {
			let layer = self.depth[idx];
			node.layer = layer;
			node.x0 = self.extent.x0 + layer as f64 * kx;
			node.x1 = node.x0 + self.node_width;
			self.columns[layer].push(idx);
		}
	}

	fn compute_node_breadths(&mut self, iterations: usize) {
		let tallest = self.columns.iter().map(Vec::len).max().unwrap_or(0);
		self.py = if tallest > 1 {
			self.node_padding
				.min((self.extent.y1 - self.extent.y0) / (tallest - 1) as f64)
		} else {
			self.node_padding
		};
		self.initialize_node_breadths();
		for i in 0..iterations {
			let alpha = 0.99_f64.powi(i as i32);
			let beta = (1.0 - alpha).max((i + 1) as f64 / iterations as f64);
			self.relax_right_to_left(alpha, beta);
			self.relax_left_to_right(alpha, beta);
		}
	}

	fn initialize_node_breadths(&mut self) {
		let Extent { y0, y1, .. } = self.extent;
		let py = self.py;
		let ky = self
			.columns
			.iter()
			.filter_map(|column| {
				let total: f64 = column.iter().map(|&n| self.nodes[n].value).sum();
				(total > 0.0).then(|| (y1 - y0 - (column.len() - 1) as f64 * py) / total)
			})
			.fold(f64::INFINITY, f64::min);
		let ky = if ky.is_finite() { ky } else { 0.0 };

		for c in 0..self.columns.len() {
			let mut y = y0;
			for &n in &self.columns[c] {
				let node = &mut self.nodes[n];
				node.y0 = y;
				node.y1 = y + node.value * ky;
				y = node.y1 + py;
				for &l in &node.source_links {
					self.links[l].width = self.links[l].value * ky;
				}
			}
			// spread the leftover space evenly around the column's nodes
			let column = &self.columns[c];
			let spare = (y1 - y + py) / (column.len() + 1) as f64;
			for (i, &n) in column.iter().enumerate() {
				self.nodes[n].y0 += spare * (i + 1) as f64;
				self.nodes[n].y1 += spare * (i + 1) as f64;
			}
			for i in 0..self.columns[c].len() {
				let n = self.columns[c][i];
				self.sort_source_links(n);
				self.sort_target_links(n);
			}
		}
	}

	/// Moves each node towards the links it receives.
	fn relax_left_to_right(&mut self, alpha: f64, beta: f64) {
		for c in 1..self.columns.len() {
			for i in 0..self.columns[c].len() {
				let target = self.columns[c][i];
				let (mut y, mut w) = (0.0, 0.0);
				for &l in &self.nodes[target].target_links {
					let link = &self.links[l];
					let v = link.value * (self.nodes[target].layer - self.nodes[link.source].layer) as f64;
					y += self.target_top(link.source, target) * v;
					w += v;
				}
				if w <= 0.0 {
					continue;
				}
				let dy = (y / w - self.nodes[target].y0) * alpha;
				self.nodes[target].y0 += dy;
				self.nodes[target].y1 += dy;
				self.reorder_node_links(target);
			}
			self.sort_column(c);
			self.resolve_collisions(c, beta);
		}
	}

	/// Moves each node towards the links it sends.
	fn relax_right_to_left(&mut self, alpha: f64, beta: f64) {
		for c in (0..self.columns.len().saturating_sub(1)).rev() {
			for i in 0..self.columns[c].len() {
				let source = self.columns[c][i];
				let (mut y, mut w) = (0.0, 0.0);
				for &l in &self.nodes[source].source_links {
					let link = &self.links[l];
					let v = link.value * (self.nodes[link.target].layer - self.nodes[source].layer) as f64;
					y += self.source_top(source, link.target) * v;
					w += v;
				}
				if w <= 0.0 {
					continue;
				}
				let dy = (y / w - self.nodes[source].y0) * alpha;
				self.nodes[source].y0 += dy;
				self.nodes[source].y1 += dy;
				self.reorder_node_links(source);
			}
			self.sort_column(c);
			self.resolve_collisions(c, beta);
		}
	}

	fn sort_column(&mut self, c: usize) {
		let nodes = &self.nodes;
		// stable, so ties keep insertion order
		self.columns[c].sort_by(|&a, &b| nodes[a].y0.total_cmp(&nodes[b].y0));
	}

	/// Pushes overlapping nodes apart, working outwards from the middle node
	/// and then back in from the extent edges.
	fn resolve_collisions(&mut self, c: usize, alpha: f64) {
		let len = self.columns[c].len();
		if len == 0 {
			return;
		}
		let mid = len >> 1;
		let subject = &self.nodes[self.columns[c][mid]];
		let (above, below) = (subject.y0 - self.py, subject.y1 + self.py);
		self.collisions_bottom_to_top(c, above, mid as isize - 1, alpha);
		self.collisions_top_to_bottom(c, below, mid + 1, alpha);
		self.collisions_bottom_to_top(c, self.extent.y1, len as isize - 1, alpha);
		self.collisions_top_to_bottom(c, self.extent.y0, 0, alpha);
	}

	fn collisions_top_to_bottom(&mut self, c: usize, mut y: f64, from: usize, alpha: f64) {
		for i in from..self.columns[c].len() {
			let node = &mut self.nodes[self.columns[c][i]];
			let dy = (y - node.y0) * alpha;
			if dy > 1e-6 {
				node.y0 += dy;
				node.y1 += dy;
			}
			y = node.y1 + self.py;
		}
	}

	fn collisions_bottom_to_top(&mut self, c: usize, mut y: f64, from: isize, alpha: f64) {
		let mut i = from;
		while i >= 0 {
			let node = &mut self.nodes[self.columns[c][i as usize]];
			let dy = (node.y1 - y) * alpha;
			if dy > 1e-6 {
				node.y0 -= dy;
				node.y1 -= dy;
			}
			y = node.y0 - self.py;
			i -= 1;
		}
	}

	/// The `target.y0` that would give a straight ribbon from `source`.
	fn target_top(&self, source: usize, target: usize) -> f64 {
		let s = &self.nodes[source];
		let mut y = s.y0 - (s.source_links.len() as f64 - 1.0) * self.py / 2.0;
		for &l in &s.source_links {
			if self.links[l].target == target {
				break;
			}
			y += self.links[l].width + self.py;
		}
		for &l in &self.nodes[target].target_links {
			if self.links[l].source == source {
				break;
			}
			y -= self.links[l].width;
		}
		y
	}

	/// The `source.y0` that would give a straight ribbon into `target`.
	fn source_top(&self, source: usize, target: usize) -> f64 {
		let t = &self.nodes[target];
		let mut y = t.y0 - (t.target_links.len() as f64 - 1.0) * self.py / 2.0;
		for &l in &t.target_links {
			if self.links[l].source == source {
				break;
			}
			y += self.links[l].width + self.py;
		}
		for &l in &self.nodes[source].source_links {
			if self.links[l].target == target {
				break;
			}
			y -= self.links[l].width;
		}
		y
	}

	/// After `node` moved, re-sorts the link lists of its neighbors.
	fn reorder_node_links(&mut self, node: usize) {
		for i in 0..self.nodes[node].target_links.len() {
			let source = self.links[self.nodes[node].target_links[i]].source;
			self.sort_source_links(source);
		}
		for i in 0..self.nodes[node].source_links.len() {
			let target = self.links[self.nodes[node].source_links[i]].target;
			self.sort_target_links(target);
		}
	}

	fn sort_source_links(&mut self, node: usize) {
		let mut order = std::mem::take(&mut self.nodes[node].source_links);
		order.sort_by(|&a, &b| {
			let (ta, tb) = (&self.nodes[self.links[a].target], &self.nodes[self.links[b].target]);
			ta.y0.total_cmp(&tb.y0).then(a.cmp(&b))
		});
		self.nodes[node].source_links = order;
	}

	fn sort_target_links(&mut self, node: usize) {
		let mut order = std::mem::take(&mut self.nodes[node].target_links);
		order.sort_by(|&a, &b| {
			let (sa, sb) = (&self.nodes[self.links[a].source], &self.nodes[self.links[b].source]);
			sa.y0.total_cmp(&sb.y0).then(a.cmp(&b))
		});
		self.nodes[node].target_links = order;
	}

	fn compute_link_breadths(&mut self) {
		for node in &self.nodes {
			let mut y0 = node.y0;
			let mut y1 = node.y0;
			for &l in &node.source_links {
				let link = &mut self.links[l];
				link.y0 = y0 + link.width / 2.0;
				y0 += link.width;
			}
			for &l in &node.target_links {
				let link = &mut self.links[l];
				link.y1 = y1 + link.width / 2.0;
				y1 += link.width;
			}
		}
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::graph::{Entity, Role, TransactionGraph};

	const EPS: f64 = 1e-6;

	pub(crate) fn flow(names: &[&str], links: &[(usize, usize, f64)]) -> FlowGraph {
		let mut graph = TransactionGraph::new();
		for name in names {
			graph
				.add_entity(Entity::new(*name, *name, Role::infer(None, name), None))
				.unwrap();
		}
		for &(s, t, amount) in links {
			graph.connect_indices(s, t, amount).unwrap();
		}
		FlowGraph::new(graph)
	}

	/// Three sources feeding the subject, which pays out to two destinations.
	pub(crate) fn fan() -> FlowGraph {
		flow(
			&[
				"Exchange A",
				"Dark Market B",
				"Mule C",
				"TARGET WALLET",
				"Dest 1",
				"Dest 2",
			],
			&[(0, 3, 50.0), (1, 3, 30.0), (2, 3, 20.0), (3, 4, 95.0), (3, 5, 5.0)],
		)
	}

	fn viewport() -> ViewportSize {
		ViewportSize::new(1000.0, 640.0)
	}

	#[test]
	fn columns_follow_depth_and_subject_is_centered() {
		let layout = compute(&fan(), viewport(), &FlowParams::default()).unwrap();
		assert_eq!(layout.columns, 3);
		let layers: Vec<usize> = layout.nodes.iter().map(|n| n.layer).collect();
		assert_eq!(layers, vec![0, 0, 0, 1, 2, 2]);

		let subject = &layout.nodes[3];
		assert!(((subject.x0 + subject.x1) / 2.0 - layout.chart_width / 2.0).abs() < EPS);
		assert_eq!(subject.x1 - subject.x0, 10.0);
		assert_eq!(layout.nodes[0].x0, 1.0);
		assert!((layout.nodes[5].x1 - (layout.chart_width - 1.0)).abs() < EPS);
	}

	#[test]
	fn subject_stays_centered_with_lopsided_fan_out() {
		let graph = flow(
			&["Src", "TARGET", "D1", "D2", "D3", "D4", "D5", "D6", "D7"],
			&[
				(0, 1, 70.0),
				(1, 2, 10.0),
				(1, 3, 10.0),
				(1, 4, 10.0),
				(1, 5, 10.0),
				(1, 6, 10.0),
				(1, 7, 10.0),
				(1, 8, 10.0),
			],
		);
		let layout = compute(&graph, viewport(), &FlowParams::default()).unwrap();
		let subject = &layout.nodes[1];
		assert!(((subject.x0 + subject.x1) / 2.0 - layout.chart_width / 2.0).abs() < EPS);
	}

	#[test]
	fn node_heights_are_proportional_and_columns_do_not_overlap() {
		let layout = compute(&fan(), viewport(), &FlowParams::default()).unwrap();
		let ratio = layout.nodes[0].height() / layout.nodes[0].value;
		for node in &layout.nodes {
			assert!((node.height() - node.value * ratio).abs() < EPS);
			assert!(node.y0 >= 1.0 - EPS && node.y1 <= layout.chart_height - 5.0 + EPS);
		}
		for layer in 0..layout.columns {
			let mut column: Vec<&SankeyNode> = layout.nodes.iter().filter(|n| n.layer == layer).collect();
			column.sort_by(|a, b| a.y0.total_cmp(&b.y0));
			for pair in column.windows(2) {
				assert!(pair[1].y0 >= pair[0].y1 - EPS, "overlap in column {layer}");
			}
		}
	}

	#[test]
	fn link_breadths_stay_inside_their_nodes() {
		let layout = compute(&fan(), viewport(), &FlowParams::default()).unwrap();
		for link in &layout.links {
			let (s, t) = (&layout.nodes[link.source], &layout.nodes[link.target]);
			assert!(link.width > 0.0);
			assert!(link.y0 - link.width / 2.0 >= s.y0 - EPS && link.y0 + link.width / 2.0 <= s.y1 + EPS);
			assert!(link.y1 - link.width / 2.0 >= t.y0 - EPS && link.y1 + link.width / 2.0 <= t.y1 + EPS);
		}
		// widths share one scale
		let k = layout.links[0].width / layout.links[0].value;
		assert!(layout.links.iter().all(|l| (l.width - l.value * k).abs() < EPS));
	}

	#[test]
	fn relaxation_uncrosses_links() {
		// inserted so that a->d and b->c would cross if left in order
		let graph = flow(&["a", "b", "c", "d"], &[(0, 3, 1.0), (1, 2, 1.0)]);
		let layout = compute(&graph, viewport(), &FlowParams::default()).unwrap();
		let [a, b, c, d] = [0, 1, 2, 3].map(|i| layout.nodes[i].y0);
		assert_eq!(a < b, d < c);
	}

	#[test]
	fn cycles_are_rejected_without_hanging() {
		let graph = flow(&["a", "TARGET", "c"], &[(0, 1, 5.0), (1, 2, 5.0), (2, 0, 5.0)]);
		assert_eq!(
			compute(&graph, viewport(), &FlowParams::default()),
			Err(LayoutError::CircularLink)
		);
	}

	#[test]
	fn disconnected_subject_is_rejected() {
		let graph = flow(&["a", "b", "TARGET"], &[(0, 1, 5.0)]);
		assert_eq!(
			compute(&graph, viewport(), &FlowParams::default()),
			Err(LayoutError::DisconnectedSubject("TARGET".into()))
		);
		// a lone subject is fine
		assert!(compute(&flow(&["TARGET"], &[]), viewport(), &FlowParams::default()).is_ok());
	}

	#[test]
	fn single_column_and_empty_graphs_stay_finite() {
		let layout = compute(&flow(&["x", "y"], &[]), viewport(), &FlowParams::default()).unwrap();
		assert_eq!(layout.columns, 1);
		for node in &layout.nodes {
			assert!(node.x0.is_finite() && node.y0.is_finite() && node.y1.is_finite());
		}
		let empty = compute(&FlowGraph::default(), viewport(), &FlowParams::default()).unwrap();
		assert!(empty.nodes.is_empty());
		assert_eq!(empty.columns, 0);
	}

	#[test]
	fn tiny_viewports_are_rejected() {
		assert!(matches!(
			compute(&fan(), ViewportSize::new(180.0, 640.0), &FlowParams::default()),
			Err(LayoutError::ExtentTooSmall { .. })
		));
	}
}
