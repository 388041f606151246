use crate::model::KnowledgeGraphData;
use petgraph::{graph::NodeIndex, visit::EdgeRef, Directed, Graph};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub const EMPTY_GRAPH_MESSAGE: &str = "No relationship data available for this article.";

pub type EntityGraph = Graph<Entity, Relationship, Directed>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub group: EntityGroup,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub label: String,
}

/// Entity category. Anything the model invents beyond the three known
/// categories is `Other` and renders in the default colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityGroup {
    Person,
    Organization,
    Location,
    Other,
}

impl EntityGroup {
    pub const LEGEND: [EntityGroup; 3] = [
        EntityGroup::Person,
        EntityGroup::Organization,
        EntityGroup::Location,
    ];

    pub fn from_label(group: &str) -> Self {
        match group.trim().to_ascii_lowercase().as_str() {
            "person" => EntityGroup::Person,
            "organization" => EntityGroup::Organization,
            "location" => EntityGroup::Location,
            _ => EntityGroup::Other,
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            EntityGroup::Person => "#22d3ee",
            EntityGroup::Organization => "#a78bfa",
            EntityGroup::Location => "#facc15",
            EntityGroup::Other => "#64748b",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EntityGroup::Person => "person",
            EntityGroup::Organization => "organization",
            EntityGroup::Location => "location",
            EntityGroup::Other => "other",
        }
    }
}

/// Display opacities for the current hover state.
#[derive(Debug, Clone, PartialEq)]
pub struct Highlight {
    pub node_opacity: Vec<f64>,
    pub link_opacity: Vec<f64>,
    pub label_opacity: Vec<f64>,
}

pub const NODE_OPACITY: f64 = 1.0;
pub const NODE_DIMMED: f64 = 0.2;
pub const LINK_OPACITY: f64 = 0.6;
pub const LINK_HIGHLIGHTED: f64 = 0.8;
pub const LINK_DIMMED: f64 = 0.1;
pub const LABEL_OPACITY: f64 = 1.0;
pub const LABEL_DIMMED: f64 = 0.1;

/// A knowledge graph that is safe to lay out and render: node ids are
/// unique and every link joins two existing nodes.
pub struct KnowledgeGraph {
    graph: EntityGraph,
    node_map: HashMap<String, NodeIndex>,
    connected: HashSet<(NodeIndex, NodeIndex)>,
    dropped_links: usize,
}

impl KnowledgeGraph {
    pub fn from_data(data: &KnowledgeGraphData) -> Self {
        let mut graph = EntityGraph::new();
        let mut node_map = HashMap::new();

        for node in &data.nodes {
            if node_map.contains_key(&node.id) {
                tracing::warn!(id = %node.id, "dropping duplicate entity");
                continue;
            }
            let index = graph.add_node(Entity {
                id: node.id.clone(),
                group: EntityGroup::from_label(&node.group),
            });
            node_map.insert(node.id.clone(), index);
        }

        let mut dropped_links = 0;
        for link in &data.links {
            match (node_map.get(&link.source), node_map.get(&link.target)) {
                (Some(&source), Some(&target)) => {
                    graph.add_edge(
                        source,
                        target,
                        Relationship {
                            label: link.relationship.clone(),
                        },
                    );
                }
                _ => {
                    tracing::warn!(
                        source = %link.source,
                        target = %link.target,
                        "dropping link to an unknown entity"
                    );
                    dropped_links += 1;
                }
            }
        }

        let connected = graph
            .edge_references()
            .map(|edge| (edge.source(), edge.target()))
            .collect();

        Self {
            graph,
            node_map,
            connected,
            dropped_links,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn link_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn dropped_links(&self) -> usize {
        self.dropped_links
    }

    pub fn graph(&self) -> &EntityGraph {
        &self.graph
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.node_map.get(id).copied()
    }

    pub fn entity(&self, index: NodeIndex) -> &Entity {
        &self.graph[index]
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.graph.node_weights()
    }

    /// Links as `(source, target, relationship)` in insertion order.
    pub fn links(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, &Relationship)> {
        self.graph
            .edge_references()
            .map(|edge| (edge.source(), edge.target(), edge.weight()))
    }

    /// `true` when the two entities share a link in either direction, or are the same entity.
    pub fn connected(&self, a: NodeIndex, b: NodeIndex) -> bool {
        a == b || self.connected.contains(&(a, b)) || self.connected.contains(&(b, a))
    }

    /// Ids of every entity sharing a link with `index`, without duplicates.
    pub fn neighbors(&self, index: NodeIndex) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .graph
            .neighbors_undirected(index)
            .filter(|&other| other != index)
            .map(|other| self.graph[other].id.as_str())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Opacities with `hovered` and its direct neighbours emphasised, or the
    /// resting opacities when nothing is hovered.
    pub fn highlight(&self, hovered: Option<NodeIndex>) -> Highlight {
        let Some(hovered) = hovered else {
            return Highlight {
                node_opacity: vec![NODE_OPACITY; self.node_count()],
                link_opacity: vec![LINK_OPACITY; self.link_count()],
                label_opacity: vec![LABEL_OPACITY; self.link_count()],
            };
        };

        let node_opacity = self
            .graph
            .node_indices()
            .map(|other| if self.connected(hovered, other) { NODE_OPACITY } else { NODE_DIMMED })
            .collect();

        let incident: Vec<bool> = self
            .graph
            .edge_references()
            .map(|edge| edge.source() == hovered || edge.target() == hovered)
            .collect();

        Highlight {
            node_opacity,
            link_opacity: incident
                .iter()
                .map(|&hit| if hit { LINK_HIGHLIGHTED } else { LINK_DIMMED })
                .collect(),
            label_opacity: incident
                .iter()
                .map(|&hit| if hit { LABEL_OPACITY } else { LABEL_DIMMED })
                .collect(),
        }
    }

    /// Number of links touching each entity, indexed by node index.
    pub fn degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0; self.node_count()];
        for edge in self.graph.edge_references() {
            degrees[edge.source().index()] += 1;
            degrees[edge.target().index()] += 1;
        }
        degrees
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{KnowledgeGraphLink, KnowledgeGraphNode};
    use pretty_assertions::assert_eq;

    fn node(id: &str, group: &str) -> KnowledgeGraphNode {
        KnowledgeGraphNode {
            id: id.to_string(),
            group: group.to_string(),
        }
    }

    fn link(source: &str, target: &str, relationship: &str) -> KnowledgeGraphLink {
        KnowledgeGraphLink {
            source: source.to_string(),
            target: target.to_string(),
            relationship: relationship.to_string(),
        }
    }

    fn sample() -> KnowledgeGraph {
        KnowledgeGraph::from_data(&KnowledgeGraphData {
            nodes: vec![
                node("QuantumLeap", "organization"),
                node("Dr. Aris Thorne", "person"),
                node("San Francisco", "location"),
                node("MindBridge Inc.", "organization"),
            ],
            links: vec![
                link("Dr. Aris Thorne", "QuantumLeap", "CEO of"),
                link("QuantumLeap", "San Francisco", "based in"),
                link("QuantumLeap", "Global Brain Institute", "partnered with"),
            ],
        })
    }

    #[test]
    fn dangling_links_are_dropped() {
        let graph = sample();
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.link_count(), 2);
        assert_eq!(graph.dropped_links(), 1);
        for (source, target, _) in graph.links() {
            assert!(graph.graph().node_weight(source).is_some());
            assert!(graph.graph().node_weight(target).is_some());
        }
    }

    #[test]
    fn duplicate_ids_keep_the_first_entity() {
        let graph = KnowledgeGraph::from_data(&KnowledgeGraphData {
            nodes: vec![node("A", "person"), node("A", "location")],
            links: vec![],
        });
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.entities().next().unwrap().group, EntityGroup::Person);
    }

    #[test]
    fn connectivity_is_symmetric_and_reflexive() {
        let graph = sample();
        let ceo = graph.index_of("Dr. Aris Thorne").unwrap();
        let company = graph.index_of("QuantumLeap").unwrap();
        let rival = graph.index_of("MindBridge Inc.").unwrap();

        assert!(graph.connected(ceo, company));
        assert!(graph.connected(company, ceo));
        assert!(graph.connected(rival, rival));
        assert!(!graph.connected(ceo, rival));
        assert_eq!(graph.neighbors(company), vec!["Dr. Aris Thorne", "San Francisco"]);
    }

    #[test]
    fn hover_dims_unrelated_entities() {
        let graph = sample();
        let ceo = graph.index_of("Dr. Aris Thorne").unwrap();
        let highlight = graph.highlight(Some(ceo));

        assert_eq!(highlight.node_opacity, vec![1.0, 1.0, 0.2, 0.2]);
        assert_eq!(highlight.link_opacity, vec![0.8, 0.1]);
        assert_eq!(highlight.label_opacity, vec![1.0, 0.1]);

        let resting = graph.highlight(None);
        assert_eq!(resting.node_opacity, vec![1.0; 4]);
        assert_eq!(resting.link_opacity, vec![0.6; 2]);
    }

    #[test]
    fn unknown_groups_fall_back_to_the_default_colour() {
        assert_eq!(EntityGroup::from_label("Organization"), EntityGroup::Organization);
        assert_eq!(EntityGroup::from_label("event").color(), "#64748b");
        assert_eq!(EntityGroup::from_label("").color(), EntityGroup::Other.color());
    }

    #[test]
    fn degrees_count_both_ends() {
        let graph = sample();
        assert_eq!(graph.degrees(), vec![2, 1, 1, 0]);
    }
}
