//! HTTP client for the investigation backend and the JSON shapes it returns.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::graph::{EgoGraph, FlowGraph, GraphError};

/// Why a subject's graph or flow data is unavailable.
#[derive(Debug, Error)]
pub enum DataFetchError {
	#[error("request to {url} failed: {message}")]
	Transport { url: String, message: String },
	#[error("{url} answered HTTP {status}")]
	Status { url: String, status: u16 },
	#[error("could not decode response from {url}: {message}")]
	Decode { url: String, message: String },
	#[error("malformed graph payload: {0}")]
	Malformed(#[from] GraphError),
}

/// Node of the ego-graph payload.
#[derive(Clone, Debug, Deserialize)]
pub struct EgoNodePayload {
	pub id: String,
	#[serde(default)]
	pub label: Option<String>,
	#[serde(default)]
	pub group: Option<String>,
	#[serde(default)]
	pub val: Option<f64>,
}

/// Link of the ego-graph payload.
#[derive(Clone, Debug, Deserialize)]
pub struct EgoLinkPayload {
	pub source: String,
	pub target: String,
	#[serde(default)]
	pub amount: Option<f64>,
}

/// `GET /network/graph?center=<id>`
#[derive(Clone, Debug, Default, Deserialize)]
pub struct EgoGraphPayload {
	#[serde(default)]
	pub nodes: Vec<EgoNodePayload>,
	#[serde(default)]
	pub links: Vec<EgoLinkPayload>,
}

/// Flow link endpoints are either node positions or node names.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NodeRef {
	Index(usize),
	Name(String),
}

#[derive(Clone, Debug, Deserialize)]
pub struct FlowNodePayload {
	pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FlowLinkPayload {
	pub source: NodeRef,
	pub target: NodeRef,
	pub value: f64,
}

/// `GET /flow?center=<id>`
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FlowGraphPayload {
	#[serde(default)]
	pub nodes: Vec<FlowNodePayload>,
	#[serde(default)]
	pub links: Vec<FlowLinkPayload>,
}

/// Entry of the anomaly list used to populate subject selection.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suspect {
	pub address: String,
	#[serde(default)]
	pub risk_level: Option<String>,
	#[serde(default)]
	pub confidence: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct ApiClient {
	base_url: String,
	client: reqwest::Client,
}

impl ApiClient {
	pub fn new(base_url: &str) -> Self {
		Self {
			base_url: base_url.trim_end_matches('/').to_string(),
			client: reqwest::Client::new(),
		}
	}

	pub fn base_url(&self) -> &str {
		&self.base_url
	}

	async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, DataFetchError> {
		let url = format!("{}{}", self.base_url, path);

		let response = self
			.client
			.get(&url)
			.query(query)
			.send()
			.await
			.map_err(|e| DataFetchError::Transport {
				url: url.clone(),
				message: e.to_string(),
			})?;

		if !response.status().is_success() {
			return Err(DataFetchError::Status {
				url,
				status: response.status().as_u16(),
			});
		}

		response.json::<T>().await.map_err(|e| DataFetchError::Decode {
			url,
			message: e.to_string(),
		})
	}

	pub async fn ego_graph(&self, subject: &str) -> Result<EgoGraph, DataFetchError> {
		let payload: EgoGraphPayload = self.get("/network/graph", &[("center", subject)]).await?;
		Ok(EgoGraph::try_from(payload)?)
	}

	pub async fn flow_graph(&self, subject: &str) -> Result<FlowGraph, DataFetchError> {
		let payload: FlowGraphPayload = self.get("/flow", &[("center", subject)]).await?;
		Ok(FlowGraph::try_from(payload)?)
	}

	pub async fn suspects(&self) -> Result<Vec<Suspect>, DataFetchError> {
		self.get("/anomalies", &[]).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn node_refs_accept_indices_and_names() {
		let refs: Vec<NodeRef> = serde_json::from_str(r#"[0, "Exchange A", 12]"#).unwrap();
		assert_eq!(
			refs,
			vec![
				NodeRef::Index(0),
				NodeRef::Name("Exchange A".into()),
				NodeRef::Index(12)
			]
		);
	}

	#[test]
	fn suspects_decode_from_anomaly_list() {
		let suspects: Vec<Suspect> = serde_json::from_str(
			r#"[{"id": 0, "address": "0x1f2e3d", "riskLevel": "critical", "confidence": 0.91,
				"amount": "₿3.2", "metrics": {"role": "Mule"}}]"#,
		)
		.unwrap();
		assert_eq!(suspects[0].address, "0x1f2e3d");
		assert_eq!(suspects[0].risk_level.as_deref(), Some("critical"));
	}

	#[test]
	fn malformed_graphs_surface_as_fetch_errors() {
		let err: DataFetchError = GraphError::MissingTarget.into();
		assert!(matches!(err, DataFetchError::Malformed(GraphError::MissingTarget)));
		assert_eq!(err.to_string(), "malformed graph payload: ego-graph has no target entity");
	}

	#[test]
	fn base_url_drops_trailing_slash() {
		assert_eq!(ApiClient::new("http://localhost:5000/api/").base_url(), "http://localhost:5000/api");
	}
}
