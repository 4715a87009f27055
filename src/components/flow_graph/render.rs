use crate::draw::{Color, DrawCommand, Font, Point, Stroke, TextAlign, TextBaseline};
use crate::risk::link_color;

use super::state::FlowGraphState;

pub const BACKGROUND: Color = "#050505";
pub const LABEL_COLOR: Color = "#fff";

const LINK_ALPHA: f64 = 0.7;
const LABEL_GAP: f64 = 6.0;
const LABEL_FONT: Font = Font { size: 10.0, bold: true };

/// Draw list for the current layout. Without a layout only the background is
/// cleared; without a positive viewport nothing is drawn at all.
pub fn render(state: &FlowGraphState) -> Vec<DrawCommand> {
	let viewport = state.viewport();
	if !viewport.is_positive() {
		return Vec::new();
	}
	let mut out = vec![DrawCommand::Clear {
		width: viewport.width,
		height: viewport.height,
		color: BACKGROUND,
	}];
	let Some(layout) = state.layout() else {
		return out;
	};
	let entities: Vec<_> = state.graph().graph().entities().collect();
	let margins = &state.params().margins;
	out.push(DrawCommand::PushTransform {
		x: margins.left,
		y: margins.top,
		k: 1.0,
	});

	for link in &layout.links {
		let (source, target) = (&layout.nodes[link.source], &layout.nodes[link.target]);
		out.push(DrawCommand::Ribbon {
			from: Point::new(source.x1, link.y0),
			to: Point::new(target.x0, link.y1),
			stroke: Stroke {
				color: link_color(&entities[link.source].label, link.value),
				width: link.width.max(1.0),
			},
			alpha: LINK_ALPHA,
		});
	}

	for (node, entity) in layout.nodes.iter().zip(&entities) {
		out.push(DrawCommand::Rect {
			origin: Point::new(node.x0, node.y0),
			width: node.x1 - node.x0,
			height: node.height().max(1.0),
			fill: entity.risk.color,
		});
	}

	// left half labels sit left of their node, right half labels to the right
	let half = layout.chart_width / 2.0;
	for (node, entity) in layout.nodes.iter().zip(&entities) {
		let (x, align) = if node.x0 < half {
			(node.x0 - LABEL_GAP, TextAlign::End)
		} else {
			(node.x1 + LABEL_GAP, TextAlign::Start)
		};
		out.push(DrawCommand::Text {
			at: Point::new(x, node.mid_y()),
			text: entity.label.clone(),
			font: LABEL_FONT,
			color: LABEL_COLOR,
			align,
			baseline: TextBaseline::Middle,
		});
	}

	out.push(DrawCommand::PopTransform);
	out
}
