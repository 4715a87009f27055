//! Runtime configuration and the visual tuning constants of both engines.

/// Backend used when `FORENSICS_API_URL` is not set at build time.
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// Application-level settings resolved once at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
	pub api_base_url: String,
}

impl AppConfig {
	/// Reads the compile-time environment, falling back to [`DEFAULT_API_URL`].
	pub fn from_env() -> Self {
		let api_base_url = option_env!("FORENSICS_API_URL")
			.filter(|url| !url.trim().is_empty())
			.unwrap_or(DEFAULT_API_URL)
			.trim_end_matches('/')
			.to_string();
		Self { api_base_url }
	}
}

impl Default for AppConfig {
	fn default() -> Self {
		Self {
			api_base_url: DEFAULT_API_URL.to_string(),
		}
	}
}

/// Force simulation parameters. Defaults are the tuned values used by the
/// network view.
#[derive(Clone, Debug, PartialEq)]
pub struct ForceParams {
	/// Many-body strength; negative values repel.
	pub charge_strength: f64,
	/// Rest length of every link spring.
	pub link_distance: f64,
	/// Fraction of the centroid offset removed per tick.
	pub center_strength: f64,
	/// Collision radius is `weight * collision_factor`.
	pub collision_factor: f64,
	/// Hard cap on integration steps before the simulation freezes.
	pub cooldown_ticks: u32,
	pub alpha_min: f64,
	pub alpha_decay: f64,
	pub velocity_decay: f64,
}

impl Default for ForceParams {
	fn default() -> Self {
		Self {
			charge_strength: -300.0,
			link_distance: 80.0,
			center_strength: 0.5,
			collision_factor: 2.0,
			cooldown_ticks: 100,
			alpha_min: 0.001,
			// alpha reaches alpha_min after 300 ticks when left alone
			alpha_decay: 1.0 - 0.001_f64.powf(1.0 / 300.0),
			velocity_decay: 0.4,
		}
	}
}

/// Margins around the flow diagram, in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Margins {
	pub top: f64,
	pub right: f64,
	pub bottom: f64,
	pub left: f64,
}

/// Flow (Sankey) layout parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowParams {
	pub node_width: f64,
	pub node_padding: f64,
	pub iterations: usize,
	pub margins: Margins,
}

impl Default for FlowParams {
	fn default() -> Self {
		Self {
			node_width: 10.0,
			node_padding: 30.0,
			iterations: 32,
			margins: Margins {
				top: 20.0,
				right: 100.0,
				bottom: 20.0,
				left: 100.0,
			},
		}
	}
}
