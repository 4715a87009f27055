//! Transaction graph model shared by the network and flow views.
//!
//! Entities live in a petgraph `StableDiGraph` and relationships are reported
//! by node position, so layout state can be kept in parallel vectors indexed
//! the same way.

use std::collections::HashMap;

use petgraph::algo::is_cyclic_directed;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences, IntoNodeReferences};
use thiserror::Error;

use crate::api::{EgoGraphPayload, FlowGraphPayload, NodeRef};
use crate::risk::{Classification, RiskTier, SUBJECT_GOLD, SUSPECT_RED, classify};

/// Largest ego-graph the force view accepts.
pub const MAX_NODES: usize = 1000;

/// Visual weight used when the payload omits `val`.
pub const DEFAULT_WEIGHT: f64 = 5.0;

/// Validation failures while building a graph from a payload.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
	#[error("duplicate entity id `{0}`")]
	DuplicateEntity(String),
	#[error("relationship references unknown entity `{0}`")]
	UnknownEntity(String),
	#[error("relationship references node index {0}, which is out of range")]
	IndexOutOfRange(usize),
	#[error("self-loop on `{0}`")]
	SelfLoop(String),
	#[error("invalid amount {amount} on {from} -> {to}")]
	InvalidAmount { from: String, to: String, amount: f64 },
	#[error("ego-graph has no target entity")]
	MissingTarget,
	#[error("ego-graph has {0} target entities, expected exactly one")]
	MultipleTargets(usize),
	#[error("graph has {0} entities, the limit is {MAX_NODES}")]
	TooManyEntities(usize),
}

/// What an entity is in the investigation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
	Target,
	Exchange,
	DarkMarket,
	Mule,
	Unknown,
}

impl Role {
	/// Derives a role from the backend's `group` tag, falling back to the
	/// label when the group says nothing about the entity.
	pub fn infer(group: Option<&str>, label: &str) -> Self {
		let group = group.map(str::to_ascii_lowercase);
		if matches!(group.as_deref(), Some("center" | "target")) {
			return Role::Target;
		}
		match classify(label).tier {
			RiskTier::Safe => Role::Exchange,
			RiskTier::Critical => Role::DarkMarket,
			// only the group tag can make an ego-graph entity the target
			RiskTier::Subject if group.is_none() => Role::Target,
			_ if matches!(group.as_deref(), Some("mid" | "mule")) => Role::Mule,
			_ if label.to_ascii_uppercase().contains("MULE") => Role::Mule,
			_ => Role::Unknown,
		}
	}
}

/// A wallet or account.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
	pub id: String,
	pub label: String,
	pub role: Role,
	pub risk: Classification,
	pub size: Option<f64>,
}

impl Entity {
	pub fn new(id: impl Into<String>, label: impl Into<String>, role: Role, size: Option<f64>) -> Self {
		let label = label.into();
		let risk = match classify(&label) {
			_ if role == Role::Target => Classification {
				tier: RiskTier::Subject,
				color: SUBJECT_GOLD,
			},
			// gold belongs to the target alone
			Classification {
				tier: RiskTier::Subject,
				..
			} => Classification {
				tier: RiskTier::Suspect,
				color: SUSPECT_RED,
			},
			other => other,
		};
		Self {
			id: id.into(),
			label,
			role,
			risk,
			size: size.filter(|s| s.is_finite() && *s > 0.0),
		}
	}

	pub fn weight(&self) -> f64 {
		self.size.unwrap_or(DEFAULT_WEIGHT)
	}

	pub fn is_target(&self) -> bool {
		self.role == Role::Target
	}
}

/// A directed transfer between two entities of the same graph, by position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Relationship {
	pub source: usize,
	pub target: usize,
	pub amount: f64,
}

/// Entities and transfers in a `StableDiGraph`, with id lookup.
///
/// Nodes are never removed, so a node's `NodeIndex` equals its insertion
/// position and the engines can keep per-node state in plain vectors.
#[derive(Clone, Debug, Default)]
pub struct TransactionGraph {
	g: StableDiGraph<Entity, f64>,
	index: HashMap<String, NodeIndex>,
}

impl TransactionGraph {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_entity(&mut self, entity: Entity) -> Result<usize, GraphError> {
		if self.index.contains_key(&entity.id) {
			return Err(GraphError::DuplicateEntity(entity.id));
		}
		let id = entity.id.clone();
		let idx = self.g.add_node(entity);
		self.index.insert(id, idx);
		Ok(idx.index())
	}

	/// Adds an entity without registering its id, for payloads that only
	/// address nodes by position.
	fn push_entity(&mut self, entity: Entity) {
		self.g.add_node(entity);
	}

	/// Adds a relationship between two existing entity ids.
	pub fn connect(&mut self, source: &str, target: &str, amount: f64) -> Result<(), GraphError> {
		let s = self
			.position(source)
			.ok_or_else(|| GraphError::UnknownEntity(source.to_string()))?;
		let t = self
			.position(target)
			.ok_or_else(|| GraphError::UnknownEntity(target.to_string()))?;
		self.connect_indices(s, t, amount)
	}

	/// Adds a relationship between two entity positions.
	pub fn connect_indices(&mut self, source: usize, target: usize, amount: f64) -> Result<(), GraphError> {
		let (s, t) = (NodeIndex::new(source), NodeIndex::new(target));
		let Some(from) = self.g.node_weight(s) else {
			return Err(GraphError::IndexOutOfRange(source));
		};
		let Some(to) = self.g.node_weight(t) else {
			return Err(GraphError::IndexOutOfRange(target));
		};
		if source == target {
			return Err(GraphError::SelfLoop(from.id.clone()));
		}
		if !amount.is_finite() || amount < 0.0 {
			return Err(GraphError::InvalidAmount {
				from: from.id.clone(),
				to: to.id.clone(),
				amount,
			});
		}
		self.g.add_edge(s, t, amount);
		Ok(())
	}

	/// Entities in insertion order.
	pub fn entities(&self) -> impl Iterator<Item = &Entity> + '_ {
		self.g.node_references().map(|(_, entity)| entity)
	}

	pub fn entity(&self, idx: usize) -> Option<&Entity> {
		self.g.node_weight(NodeIndex::new(idx))
	}

	/// Relationships in insertion order.
	pub fn relationships(&self) -> impl Iterator<Item = Relationship> + '_ {
		self.g.edge_references().map(|e| Relationship {
			source: e.source().index(),
			target: e.target().index(),
			amount: *e.weight(),
		})
	}

	pub fn relationship_count(&self) -> usize {
		self.g.edge_count()
	}

	pub fn position(&self, id: &str) -> Option<usize> {
		self.index.get(id).map(|idx| idx.index())
	}

	pub fn len(&self) -> usize {
		self.g.node_count()
	}

	/// Entities directly connected to `idx`, in either direction.
	pub fn neighbors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
		self.g.neighbors_undirected(NodeIndex::new(idx)).map(|n| n.index())
	}

	/// Whether following transfers forward can return to where it started.
	pub fn has_cycle(&self) -> bool {
		is_cyclic_directed(&self.g)
	}
}

impl PartialEq for TransactionGraph {
	fn eq(&self, other: &Self) -> bool {
		self.entities().eq(other.entities()) && self.relationships().eq(other.relationships())
	}
}

/// Neighborhood of one subject. Exactly one entity has [`Role::Target`].
#[derive(Clone, Debug, PartialEq)]
pub struct EgoGraph {
	graph: TransactionGraph,
	target: usize,
}

impl EgoGraph {
	pub fn new(graph: TransactionGraph) -> Result<Self, GraphError> {
		if graph.len() > MAX_NODES {
			return Err(GraphError::TooManyEntities(graph.len()));
		}
		let mut targets = graph
			.entities()
			.enumerate()
			.filter(|(_, e)| e.is_target())
			.map(|(idx, _)| idx);
		let target = targets.next().ok_or(GraphError::MissingTarget)?;
		let extra = targets.count();
		if extra > 0 {
			return Err(GraphError::MultipleTargets(extra + 1));
		}
		Ok(Self { graph, target })
	}

	pub fn graph(&self) -> &TransactionGraph {
		&self.graph
	}

	pub fn target_entity(&self) -> &Entity {
		&self.graph.g[NodeIndex::new(self.target)]
	}
}

impl TryFrom<EgoGraphPayload> for EgoGraph {
	type Error = GraphError;

	fn try_from(payload: EgoGraphPayload) -> Result<Self, Self::Error> {
		let mut graph = TransactionGraph::new();
		for node in payload.nodes {
			let label = node.label.unwrap_or_else(|| node.id.clone());
			let role = Role::infer(node.group.as_deref(), &label);
			graph.add_entity(Entity::new(node.id, label, role, node.val))?;
		}
		for link in payload.links {
			graph.connect(&link.source, &link.target, link.amount.unwrap_or(0.0))?;
		}
		EgoGraph::new(graph)
	}
}

/// Directed flow into and out of a subject. Acyclicity is not checked here;
/// the flow layout rejects cycles.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlowGraph {
	graph: TransactionGraph,
}

impl FlowGraph {
	pub fn new(graph: TransactionGraph) -> Self {
		Self { graph }
	}

	pub fn graph(&self) -> &TransactionGraph {
		&self.graph
	}

	/// First entity classified as the subject, if any.
	pub fn subject(&self) -> Option<usize> {
		self.graph.entities().position(Entity::is_target)
	}
}

impl TryFrom<FlowGraphPayload> for FlowGraph {
	type Error = GraphError;

	fn try_from(payload: FlowGraphPayload) -> Result<Self, Self::Error> {
		// names only need to be unique when links refer to nodes by name
		let by_position = payload
			.links
			.iter()
			.all(|link| matches!((&link.source, &link.target), (NodeRef::Index(_), NodeRef::Index(_))));
		let mut graph = TransactionGraph::new();
		for node in payload.nodes {
			let role = Role::infer(None, &node.name);
			let entity = Entity::new(node.name.clone(), node.name, role, None);
			if by_position {
				graph.push_entity(entity);
			} else {
				graph.add_entity(entity)?;
			}
		}
		let resolve = |graph: &TransactionGraph, node: &NodeRef| match node {
			NodeRef::Index(idx) if *idx < graph.len() => Ok(*idx),
			NodeRef::Index(idx) => Err(GraphError::IndexOutOfRange(*idx)),
			NodeRef::Name(name) => graph
				.position(name)
				.ok_or_else(|| GraphError::UnknownEntity(name.clone())),
		};
		for link in &payload.links {
			let source = resolve(&graph, &link.source)?;
			let target = resolve(&graph, &link.target)?;
			graph.connect_indices(source, target, link.value)?;
		}
		Ok(FlowGraph::new(graph))
	}
}
