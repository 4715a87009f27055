//! Backend-independent drawing instructions.
//!
//! Both engines render into a `Vec<DrawCommand>`; the browser replays the list
//! on a 2D canvas context and tests inspect it directly.

/// CSS color string.
pub type Color = &'static str;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
	pub x: f64,
	pub y: f64,
}

impl Point {
	pub fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextAlign {
	Start,
	Center,
	End,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextBaseline {
	Top,
	Middle,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Font {
	pub size: f64,
	pub bold: bool,
}

impl Font {
	pub fn css(&self) -> String {
		let weight = if self.bold { "bold " } else { "" };
		format!("{weight}{}px Inter, sans-serif", self.size)
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stroke {
	pub color: Color,
	pub width: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
	/// Fills the whole surface, resetting any transform.
	Clear {
		width: f64,
		height: f64,
		color: Color,
	},
	/// Translate then scale; world coordinates after this are `(p * k) + (x, y)`.
	PushTransform { x: f64, y: f64, k: f64 },
	PopTransform,
	Circle {
		center: Point,
		radius: f64,
		fill: Color,
		alpha: f64,
		stroke: Option<Stroke>,
	},
	Line {
		from: Point,
		to: Point,
		stroke: Stroke,
		alpha: f64,
	},
	Polygon {
		points: Vec<Point>,
		fill: Color,
		alpha: f64,
	},
	Rect {
		origin: Point,
		width: f64,
		height: f64,
		fill: Color,
	},
	/// Horizontal cubic ribbon with both control points at the mid x.
	Ribbon {
		from: Point,
		to: Point,
		stroke: Stroke,
		alpha: f64,
	},
	Text {
		at: Point,
		text: String,
		font: Font,
		color: Color,
		align: TextAlign,
		baseline: TextBaseline,
	},
}
