use crate::draw::{Color, DrawCommand, Font, Point, Stroke, TextAlign, TextBaseline};

use super::state::{ForceGraphState, node_radius};

pub const BACKGROUND: Color = "#050505";
pub const LINK_COLOR: Color = "#475569";
pub const LABEL_COLOR: Color = "rgba(255, 255, 255, 0.9)";
pub const AMOUNT_COLOR: Color = "white";
pub const HOVER_RING: Color = "white";

const LINK_WIDTH: f64 = 1.5;
const ARROW_LENGTH: f64 = 6.0;
const NODE_FONT_PX: f64 = 12.0;
const AMOUNT_FONT_PX: f64 = 10.0;
const LABEL_GAP: f64 = 2.0;
const DIMMED: f64 = 0.25;

/// Draw list for the current frame. Empty until the viewport is positive.
pub fn render(state: &ForceGraphState) -> Vec<DrawCommand> {
	let viewport = state.viewport();
	if !viewport.is_positive() {
		return Vec::new();
	}
	let t = state.transform;
	let mut out = vec![
		DrawCommand::Clear {
			width: viewport.width,
			height: viewport.height,
			color: BACKGROUND,
		},
		DrawCommand::PushTransform { x: t.x, y: t.y, k: t.k },
	];
	draw_links(state, &mut out);
	draw_nodes(state, &mut out);
	out.push(DrawCommand::PopTransform);
	out
}

fn draw_links(state: &ForceGraphState, out: &mut Vec<DrawCommand>) {
	let k = state.transform.k;
	let graph = state.graph().graph();
	let nodes = state.simulation().nodes();
	let arrow = ARROW_LENGTH / k;
	let highlight = state.has_active_highlight();
	let radii: Vec<f64> = graph.entities().map(node_radius).collect();

	for rel in graph.relationships() {
		let (s, t) = (&nodes[rel.source], &nodes[rel.target]);
		let (dx, dy) = (t.x - s.x, t.y - s.y);
		let dist = dx.hypot(dy);
		if dist < 0.001 {
			continue;
		}
		let alpha = if !highlight || (state.is_highlighted(rel.source) && state.is_highlighted(rel.target)) {
			1.0
		} else {
			DIMMED
		};
		let (rs, rt) = (radii[rel.source], radii[rel.target]);
		let (ux, uy) = (dx / dist, dy / dist);
		let tip = Point::new(t.x - ux * rt, t.y - uy * rt);
		let back = Point::new(tip.x - ux * arrow, tip.y - uy * arrow);
		let (px, py) = (-uy * arrow * 0.5, ux * arrow * 0.5);

		out.push(DrawCommand::Line {
			from: Point::new(s.x + ux * rs, s.y + uy * rs),
			to: back,
			stroke: Stroke {
				color: LINK_COLOR,
				width: LINK_WIDTH / k,
			},
			alpha,
		});
		out.push(DrawCommand::Polygon {
			points: vec![
				tip,
				Point::new(back.x + px, back.y + py),
				Point::new(back.x - px, back.y - py),
			],
			fill: LINK_COLOR,
			alpha,
		});

		if rel.amount > 0.0 {
			out.push(DrawCommand::Text {
				at: Point::new(s.x + dx * 0.5, s.y + dy * 0.5),
				text: rel.amount.to_string(),
				font: Font {
					size: AMOUNT_FONT_PX / k,
					bold: true,
				},
				color: AMOUNT_COLOR,
				align: TextAlign::Center,
				baseline: TextBaseline::Middle,
			});
		}
	}
}

fn draw_nodes(state: &ForceGraphState, out: &mut Vec<DrawCommand>) {
	let k = state.transform.k;
	let highlight = state.has_active_highlight();
	let entities = state.graph().graph().entities();

	for (idx, (entity, node)) in entities.zip(state.simulation().nodes()).enumerate() {
		let radius = node_radius(entity);
		let alpha = if !highlight || state.is_highlighted(idx) { 1.0 } else { DIMMED };
		let stroke = (state.hover.node == Some(idx)).then_some(Stroke {
			color: HOVER_RING,
			width: LINK_WIDTH / k,
		});
		out.push(DrawCommand::Circle {
			center: Point::new(node.x, node.y),
			radius,
			fill: entity.risk.color,
			alpha,
			stroke,
		});
		out.push(DrawCommand::Text {
			at: Point::new(node.x, node.y + radius + LABEL_GAP),
			text: entity.label.clone(),
			font: Font {
				size: NODE_FONT_PX / k,
				bold: true,
			},
			color: LABEL_COLOR,
			align: TextAlign::Center,
			baseline: TextBaseline::Top,
		});
	}
}
