use std::f64::consts::PI;

use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use crate::components::viewport::ViewportSize;
use crate::draw::{DrawCommand, TextAlign, TextBaseline};

/// 2D context of `canvas`, if the browser gives us one.
pub fn context_2d(canvas: &HtmlCanvasElement) -> Option<CanvasRenderingContext2d> {
	canvas
		.get_context("2d")
		.ok()
		.flatten()
		.and_then(|ctx| ctx.dyn_into::<CanvasRenderingContext2d>().ok())
}

/// Matches the backing store to the container size.
pub fn fit_to(canvas: &HtmlCanvasElement, size: ViewportSize) {
	let (w, h) = (size.width.round() as u32, size.height.round() as u32);
	if canvas.width() != w {
		canvas.set_width(w);
	}
	if canvas.height() != h {
		canvas.set_height(h);
	}
}

/// Replays a draw list. An empty list blanks the canvas.
pub fn paint(ctx: &CanvasRenderingContext2d, commands: &[DrawCommand]) {
	if commands.is_empty() {
		if let Some(canvas) = ctx.canvas() {
			let _ = ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);
			ctx.clear_rect(0.0, 0.0, canvas.width() as f64, canvas.height() as f64);
		}
		return;
	}
	for command in commands {
		paint_one(ctx, command);
	}
	ctx.set_global_alpha(1.0);
}

fn paint_one(ctx: &CanvasRenderingContext2d, command: &DrawCommand) {
	match command {
		DrawCommand::Clear { width, height, color } => {
			let _ = ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);
			ctx.set_global_alpha(1.0);
			ctx.set_fill_style_str(color);
			ctx.fill_rect(0.0, 0.0, *width, *height);
		}
		DrawCommand::PushTransform { x, y, k } => {
			ctx.save();
			let _ = ctx.translate(*x, *y);
			let _ = ctx.scale(*k, *k);
		}
		DrawCommand::PopTransform => ctx.restore(),
		DrawCommand::Circle {
			center,
			radius,
			fill,
			alpha,
			stroke,
		} => {
			ctx.set_global_alpha(*alpha);
			ctx.begin_path();
			let _ = ctx.arc(center.x, center.y, *radius, 0.0, 2.0 * PI);
			ctx.set_fill_style_str(fill);
			ctx.fill();
			if let Some(stroke) = stroke {
				ctx.set_stroke_style_str(stroke.color);
				ctx.set_line_width(stroke.width);
				ctx.stroke();
			}
		}
		DrawCommand::Line { from, to, stroke, alpha } => {
			ctx.set_global_alpha(*alpha);
			ctx.set_stroke_style_str(stroke.color);
			ctx.set_line_width(stroke.width);
			ctx.begin_path();
			ctx.move_to(from.x, from.y);
			ctx.line_to(to.x, to.y);
			ctx.stroke();
		}
		DrawCommand::Polygon { points, fill, alpha } => {
			let Some((first, rest)) = points.split_first() else {
				return;
			};
			ctx.set_global_alpha(*alpha);
			ctx.set_fill_style_str(fill);
			ctx.begin_path();
			ctx.move_to(first.x, first.y);
			for p in rest {
				ctx.line_to(p.x, p.y);
			}
			ctx.close_path();
			ctx.fill();
		}
		DrawCommand::Rect {
			origin,
			width,
			height,
			fill,
		} => {
			ctx.set_global_alpha(1.0);
			ctx.set_fill_style_str(fill);
			ctx.fill_rect(origin.x, origin.y, *width, *height);
		}
		DrawCommand::Ribbon { from, to, stroke, alpha } => {
			let mid = (from.x + to.x) / 2.0;
			ctx.set_global_alpha(*alpha);
			ctx.set_stroke_style_str(stroke.color);
			ctx.set_line_width(stroke.width);
			ctx.begin_path();
			ctx.move_to(from.x, from.y);
			ctx.bezier_curve_to(mid, from.y, mid, to.y, to.x, to.y);
			ctx.stroke();
		}
		DrawCommand::Text {
			at,
			text,
			font,
			color,
			align,
			baseline,
		} => {
			ctx.set_global_alpha(1.0);
			ctx.set_font(&font.css());
			ctx.set_fill_style_str(color);
			ctx.set_text_align(match align {
				TextAlign::Start => "start",
				TextAlign::Center => "center",
				TextAlign::End => "end",
			});
			ctx.set_text_baseline(match baseline {
				TextBaseline::Top => "top",
				TextBaseline::Middle => "middle",
			});
			let _ = ctx.fill_text(text, at.x, at.y);
		}
	}
}
