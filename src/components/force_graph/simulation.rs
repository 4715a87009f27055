//! Velocity-Verlet force simulation over an ego-graph.
//!
//! Forces are applied in a fixed order each tick: link springs, many-body
//! charge, centering, collision. Positions and velocities live in a vector
//! indexed like the graph's entities.

use std::f64::consts::PI;

use crate::config::ForceParams;
use crate::graph::TransactionGraph;

const INITIAL_RADIUS: f64 = 10.0;
const DISTANCE_MIN2: f64 = 1.0;

/// Position and velocity of one entity.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SimNode {
	pub x: f64,
	pub y: f64,
	pub vx: f64,
	pub vy: f64,
	/// Fixed position set by dragging; overrides integration.
	pub pinned: Option<(f64, f64)>,
}

/// Deterministic source for the tiny offsets used to separate coincident
/// nodes.
#[derive(Clone, Debug)]
struct Jiggle(u64);

impl Jiggle {
	fn next(&mut self) -> f64 {
		// xorshift64
		self.0 ^= self.0 << 13;
		self.0 ^= self.0 >> 7;
		self.0 ^= self.0 << 17;
		((self.0 >> 11) as f64 / (1u64 << 53) as f64 - 0.5) * 1e-6
	}
}

#[derive(Clone, Debug)]
pub struct SimulationState {
	nodes: Vec<SimNode>,
	radii: Vec<f64>,
	link_strength: Vec<f64>,
	link_bias: Vec<f64>,
	alpha: f64,
	ticks: u32,
	jiggle: Jiggle,
}

impl SimulationState {
	/// Places nodes on a phyllotaxis spiral around the origin.
	pub fn new(graph: &TransactionGraph, params: &ForceParams) -> Self {
		let golden_angle = PI * (3.0 - 5.0_f64.sqrt());
		let nodes = (0..graph.len())
			.map(|i| {
				let radius = INITIAL_RADIUS * (0.5 + i as f64).sqrt();
				let angle = i as f64 * golden_angle;
				SimNode {
					x: radius * angle.cos(),
					y: radius * angle.sin(),
					..SimNode::default()
				}
			})
			.collect();
		let radii = graph
			.entities()
			.map(|e| e.weight() * params.collision_factor)
			.collect();

		let mut degree = vec![0usize; graph.len()];
		for rel in graph.relationships() {
			degree[rel.source] += 1;
			degree[rel.target] += 1;
		}
		let (link_strength, link_bias) = graph
			.relationships()
			.map(|rel| {
				let (s, t) = (degree[rel.source] as f64, degree[rel.target] as f64);
				(1.0 / s.min(t), s / (s + t))
			})
			.unzip();

		Self {
			nodes,
			radii,
			link_strength,
			link_bias,
			alpha: 1.0,
			ticks: 0,
			jiggle: Jiggle(0x9e37_79b9_7f4a_7c15),
		}
	}

	pub fn nodes(&self) -> &[SimNode] {
		&self.nodes
	}

	pub fn node(&self, idx: usize) -> Option<&SimNode> {
		self.nodes.get(idx)
	}

	/// Integration steps since the last (re)heat.
	pub fn ticks(&self) -> u32 {
		self.ticks
	}

	pub fn is_converged(&self, params: &ForceParams) -> bool {
		self.alpha < params.alpha_min
	}

	/// Restores full energy; positions are kept.
	pub fn reheat(&mut self) {
		self.alpha = 1.0;
		self.ticks = 0;
	}

	pub fn pin(&mut self, idx: usize, x: f64, y: f64) {
		if let Some(node) = self.nodes.get_mut(idx) {
			node.pinned = Some((x, y));
			node.x = x;
			node.y = y;
			node.vx = 0.0;
			node.vy = 0.0;
		}
	}

	/// One integration step.
	pub fn step(&mut self, graph: &TransactionGraph, params: &ForceParams) {
		self.alpha += (0.0 - self.alpha) * params.alpha_decay;
		self.ticks += 1;

		self.apply_links(graph, params.link_distance);
		self.apply_charge(params.charge_strength);
		self.apply_center(params.center_strength);
		self.apply_collision();

		let retain = 1.0 - params.velocity_decay;
		for node in &mut self.nodes {
			match node.pinned {
				Some((x, y)) => {
					node.x = x;
					node.y = y;
					node.vx = 0.0;
					node.vy = 0.0;
				}
				None => {
					node.vx *= retain;
					node.vy *= retain;
					node.x += node.vx;
					node.y += node.vy;
				}
			}
		}
	}

	fn apply_links(&mut self, graph: &TransactionGraph, distance: f64) {
		for (li, rel) in graph.relationships().enumerate() {
			let (s, t) = (self.nodes[rel.source], self.nodes[rel.target]);
			let mut dx = t.x + t.vx - s.x - s.vx;
			let mut dy = t.y + t.vy - s.y - s.vy;
			if dx == 0.0 {
				dx = self.jiggle.next();
			}
			if dy == 0.0 {
				dy = self.jiggle.next();
			}
			let len = (dx * dx + dy * dy).sqrt();
			let scale = (len - distance) / len * self.alpha * self.link_strength[li];
			dx *= scale;
			dy *= scale;

			let bias = self.link_bias[li];
			let target = &mut self.nodes[rel.target];
			target.vx -= dx * bias;
			target.vy -= dy * bias;
			let source = &mut self.nodes[rel.source];
			source.vx += dx * (1.0 - bias);
			source.vy += dy * (1.0 - bias);
		}
	}

	fn apply_charge(&mut self, strength: f64) {
		let n = self.nodes.len();
		for i in 0..n {
			for j in 0..n {
				if i == j {
					continue;
				}
				let mut dx = self.nodes[j].x - self.nodes[i].x;
				let mut dy = self.nodes[j].y - self.nodes[i].y;
				let mut l = dx * dx + dy * dy;
				if dx == 0.0 {
					dx = self.jiggle.next();
					l += dx * dx;
				}
				if dy == 0.0 {
					dy = self.jiggle.next();
					l += dy * dy;
				}
				if l < DISTANCE_MIN2 {
					l = (DISTANCE_MIN2 * l).sqrt();
				}
				let w = strength * self.alpha / l;
				self.nodes[i].vx += dx * w;
				self.nodes[i].vy += dy * w;
			}
		}
	}

	/// Shifts every node so the centroid moves toward the origin.
	fn apply_center(&mut self, strength: f64) {
		if self.nodes.is_empty() {
			return;
		}
		let n = self.nodes.len() as f64;
		let (sx, sy) = self
			.nodes
			.iter()
			.fold((0.0, 0.0), |(sx, sy), node| (sx + node.x, sy + node.y));
		let (sx, sy) = (sx / n * strength, sy / n * strength);
		for node in &mut self.nodes {
			node.x -= sx;
			node.y -= sy;
		}
	}

	fn apply_collision(&mut self) {
		let n = self.nodes.len();
		for i in 0..n {
			let ri = self.radii[i];
			let ri2 = ri * ri;
			let xi = self.nodes[i].x + self.nodes[i].vx;
			let yi = self.nodes[i].y + self.nodes[i].vy;
			for j in (i + 1)..n {
				let rj = self.radii[j];
				let r = ri + rj;
				let mut dx = xi - self.nodes[j].x - self.nodes[j].vx;
				let mut dy = yi - self.nodes[j].y - self.nodes[j].vy;
				let mut l = dx * dx + dy * dy;
				if l >= r * r {
					continue;
				}
				if dx == 0.0 {
					dx = self.jiggle.next();
					l += dx * dx;
				}
				if dy == 0.0 {
					dy = self.jiggle.next();
					l += dy * dy;
				}
				let l_sqrt = l.sqrt();
				let push = (r - l_sqrt) / l_sqrt;
				dx *= push;
				dy *= push;
				let share = rj * rj / (ri2 + rj * rj);
				self.nodes[i].vx += dx * share;
				self.nodes[i].vy += dy * share;
				self.nodes[j].vx -= dx * (1.0 - share);
				self.nodes[j].vy -= dy * (1.0 - share);
			}
		}
	}
}
