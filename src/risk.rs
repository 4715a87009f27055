//! Label based risk classification shared by both views.
//!
//! Rules are evaluated top-down and the first match wins, so a label such as
//! "Exchange for Dark Market" is classified SAFE.

/// Exchange / known-good counterparties.
pub const SAFE_GREEN: &str = "#22c55e";
/// Dark markets and other high risk sources.
pub const CRITICAL_DARK_RED: &str = "#dc2626";
/// The entity under investigation.
pub const SUBJECT_GOLD: &str = "#facc15";
/// Everything else: mules, leaves, unknown wallets.
pub const SUSPECT_RED: &str = "#ef4444";
/// Flow links that are neither from a recognized source nor peeling.
pub const STANDARD_BLUE: &str = "#3b82f6";

/// Flow amounts strictly below this are treated as peeling.
pub const PEELING_THRESHOLD: f64 = 10.0;

/// Risk tier of an entity or flow endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RiskTier {
	Safe,
	Critical,
	Subject,
	Suspect,
}

impl RiskTier {
	/// Tiers whose links keep their own color in the flow view.
	pub fn is_recognized_source(self) -> bool {
		matches!(self, RiskTier::Safe | RiskTier::Critical)
	}
}

/// Result of [`classify`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
	pub tier: RiskTier,
	pub color: &'static str,
}

struct Rule {
	needle: &'static str,
	tier: RiskTier,
	color: &'static str,
}

impl Rule {
	fn matches(&self, upper_label: &str) -> bool {
		upper_label.contains(self.needle)
	}

	fn classification(&self) -> Classification {
		Classification {
			tier: self.tier,
			color: self.color,
		}
	}
}

const RULES: &[Rule] = &[
	Rule {
		needle: "EXCHANGE",
		tier: RiskTier::Safe,
		color: SAFE_GREEN,
	},
	Rule {
		needle: "DARK MARKET",
		tier: RiskTier::Critical,
		color: CRITICAL_DARK_RED,
	},
	Rule {
		needle: "TARGET",
		tier: RiskTier::Subject,
		color: SUBJECT_GOLD,
	},
];

const FALLBACK: Classification = Classification {
	tier: RiskTier::Suspect,
	color: SUSPECT_RED,
};

/// Classifies a display label. Matching is case-insensitive.
pub fn classify(label: &str) -> Classification {
	let upper = label.to_uppercase();
	RULES
		.iter()
		.find(|rule| rule.matches(&upper))
		.map_or(FALLBACK, Rule::classification)
}

/// Stroke color for a flow link leaving `source_label` carrying `amount`.
pub fn link_color(source_label: &str, amount: f64) -> &'static str {
	let source = classify(source_label);
	if source.tier.is_recognized_source() {
		source.color
	} else if amount < PEELING_THRESHOLD {
		SUSPECT_RED
	} else {
		STANDARD_BLUE
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn documented_labels() {
		assert_eq!(
			classify("Binance Exchange"),
			Classification {
				tier: RiskTier::Safe,
				color: "#22c55e"
			}
		);
		assert_eq!(
			classify("Dark Market Vendor"),
			Classification {
				tier: RiskTier::Critical,
				color: "#dc2626"
			}
		);
		assert_eq!(
			classify("TARGET WALLET"),
			Classification {
				tier: RiskTier::Subject,
				color: "#facc15"
			}
		);
		assert_eq!(
			classify("0xabc123"),
			Classification {
				tier: RiskTier::Suspect,
				color: "#ef4444"
			}
		);
	}

	#[test]
	fn case_insensitive_and_ordered() {
		assert_eq!(classify("dark market b").tier, RiskTier::Critical);
		assert_eq!(classify("target (0x12ab)").tier, RiskTier::Subject);
		// EXCHANGE outranks TARGET
		assert_eq!(classify("Target Exchange").tier, RiskTier::Safe);
		// "DARKMARKET" without the space is not a match
		assert_eq!(classify("darkmarket").tier, RiskTier::Suspect);
	}

	#[test]
	fn empty_label_falls_through() {
		assert_eq!(classify("").tier, RiskTier::Suspect);
		assert_eq!(classify("   ").color, SUSPECT_RED);
	}

	#[test]
	fn classification_is_idempotent() {
		for label in ["Exchange A", "Mule 3 (512)", "", "TARGET (0xabc)"] {
			assert_eq!(classify(label), classify(label));
		}
	}

	#[test]
	fn peeling_boundary_is_exclusive() {
		assert_eq!(link_color("Mule 1 (100)", 9.0), SUSPECT_RED);
		assert_eq!(link_color("Mule 1 (100)", 9.999), SUSPECT_RED);
		assert_eq!(link_color("Mule 1 (100)", 10.0), STANDARD_BLUE);
		assert_eq!(link_color("TARGET (0xabc)", 10.0), STANDARD_BLUE);
		assert_eq!(link_color("TARGET (0xabc)", 3.0), SUSPECT_RED);
	}

	#[test]
	fn recognized_sources_keep_their_color() {
		assert_eq!(link_color("Exchange A", 1.0), SAFE_GREEN);
		assert_eq!(link_color("Dark Market B", 500.0), CRITICAL_DARK_RED);
	}
}
