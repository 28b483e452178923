//! Graph Descriptions
//!
//! Plain serde structures an editor or asset loader can hand to
//! [`ShaderGraph::from_description`]. Connections name nodes by identifier;
//! the sink answers to [`SINK_ID`](crate::sink::SINK_ID) and its input
//! ports are [`SinkSlot`](crate::sink::SinkSlot) indices.
//!
//! ```json
//! {
//!   "nodes": [
//!     { "id": "albedoTex", "storage": "Uniform", "kind": { "type": "TextureSample" } }
//!   ],
//!   "connections": [
//!     { "from": "albedoTex", "from_port": "Rgb", "to": "MaterialOutput", "to_port": 0 }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use matgraph_core::{GraphError, OutputPort, Result, StorageClass};

use crate::graph::ShaderGraph;
use crate::node::{Connection, Node, NodeKind};
use crate::settings::CompilerSettings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    pub id: String,
    #[serde(default)]
    pub storage: StorageClass,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescription {
    pub from: String,
    #[serde(default)]
    pub from_port: OutputPort,
    pub to: String,
    pub to_port: usize,
}

/// A whole material graph, sink excluded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDescription {
    #[serde(default)]
    pub settings: CompilerSettings,
    #[serde(default)]
    pub nodes: Vec<NodeDescription>,
    #[serde(default)]
    pub connections: Vec<ConnectionDescription>,
}

impl GraphDescription {
    pub fn from_json(source: &str) -> Result<Self> {
        serde_json::from_str(source).map_err(|e| GraphError::Json(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| GraphError::Json(e.to_string()))
    }
}

impl ShaderGraph {
    /// Builds a graph, validating every node and connection on the way.
    pub fn from_description(description: &GraphDescription) -> Result<Self> {
        let mut graph = ShaderGraph::with_settings(description.settings.clone());

        for node in &description.nodes {
            graph.add_node(Node::new(node.id.clone(), node.kind.clone(), node.storage))?;
        }

        for connection in &description.connections {
            let producer = graph
                .find(&connection.from)
                .ok_or_else(|| GraphError::NodeNotFound(connection.from.clone()))?;
            let consumer = graph
                .find(&connection.to)
                .ok_or_else(|| GraphError::NodeNotFound(connection.to.clone()))?;
            graph.connect(
                consumer,
                Connection::new(producer, connection.from_port, connection.to_port),
            )?;
        }

        log::debug!(
            "Built shader graph from description: {} nodes, {} connections",
            description.nodes.len(),
            description.connections.len()
        );
        Ok(graph)
    }

    /// Snapshot of the graph: nodes in insertion order, then every
    /// connection grouped by consumer (sink last) in input order.
    #[must_use]
    pub fn to_description(&self) -> GraphDescription {
        let nodes = self
            .handles()
            .filter_map(|handle| self.node(handle))
            .map(|node| NodeDescription {
                id: node.id().to_string(),
                storage: node.storage(),
                kind: node.kind().clone(),
            })
            .collect();

        let mut connections = Vec::new();
        for consumer in self.handles().chain(std::iter::once(self.sink())) {
            let Some(node) = self.node(consumer) else {
                continue;
            };
            for input in 0..node.max_inputs() {
                let Some(connection) = node.input(input) else {
                    continue;
                };
                let Some(producer) = self.node(connection.producer) else {
                    continue;
                };
                connections.push(ConnectionDescription {
                    from: producer.id().to_string(),
                    from_port: connection.output,
                    to: node.id().to_string(),
                    to_port: input,
                });
            }
        }

        GraphDescription {
            settings: self.settings().clone(),
            nodes,
            connections,
        }
    }

    pub fn from_json(source: &str) -> Result<Self> {
        Self::from_description(&GraphDescription::from_json(source)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matgraph_core::{ConstantValue, PrimitiveType};

    use crate::node::UnaryOp;
    use crate::sink::{SINK_ID, SinkSlot};

    const SAMPLE: &str = r#"{
        "nodes": [
            { "id": "albedoTex", "storage": "Uniform", "kind": { "type": "TextureSample" } },
            { "id": "rough", "kind": { "type": "Constant", "value": { "Float": 0.8 } } },
            { "id": "inv", "kind": { "type": "Unary", "op": "OneMinus", "arity": "Float" } }
        ],
        "connections": [
            { "from": "albedoTex", "from_port": "Rgb", "to": "MaterialOutput", "to_port": 0 },
            { "from": "rough", "to": "inv", "to_port": 0 },
            { "from": "inv", "to": "MaterialOutput", "to_port": 3 }
        ]
    }"#;

    #[test]
    fn test_from_json_builds_graph() {
        let graph = ShaderGraph::from_json(SAMPLE).unwrap();
        assert_eq!(graph.len(), 3);

        let sink = graph.node(graph.sink()).unwrap();
        let albedo = sink.input(SinkSlot::Albedo.index()).unwrap();
        assert_eq!(albedo.producer, graph.find("albedoTex").unwrap());
        assert_eq!(albedo.output, OutputPort::Rgb);

        let inv = graph.node(graph.find("inv").unwrap()).unwrap();
        assert_eq!(
            inv.kind(),
            &NodeKind::Unary {
                op: UnaryOp::OneMinus,
                arity: PrimitiveType::Float,
            }
        );
        assert_eq!(
            graph.node(graph.find("rough").unwrap()).unwrap().kind(),
            &NodeKind::Constant {
                value: ConstantValue::Float(0.8)
            }
        );
    }

    #[test]
    fn test_description_round_trip_preserves_output() {
        let graph = ShaderGraph::from_json(SAMPLE).unwrap();
        let json = graph.to_description().to_json().unwrap();
        let rebuilt = ShaderGraph::from_json(&json).unwrap();

        assert_eq!(rebuilt.to_description(), graph.to_description());
        assert_eq!(rebuilt.compile().unwrap(), graph.compile().unwrap());
    }

    #[test]
    fn test_unknown_node_reference() {
        let desc = GraphDescription {
            connections: vec![ConnectionDescription {
                from: "ghost".into(),
                from_port: OutputPort::Value,
                to: SINK_ID.into(),
                to_port: 2,
            }],
            ..Default::default()
        };
        assert_eq!(
            ShaderGraph::from_description(&desc).unwrap_err(),
            GraphError::NodeNotFound("ghost".into())
        );
    }

    #[test]
    fn test_sink_in_description_is_rejected() {
        let desc = GraphDescription {
            nodes: vec![NodeDescription {
                id: "second_sink".into(),
                storage: StorageClass::Local,
                kind: NodeKind::Sink,
            }],
            ..Default::default()
        };
        assert!(matches!(
            ShaderGraph::from_description(&desc),
            Err(GraphError::InvalidNode { .. })
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            GraphDescription::from_json("{ nodes: 3 }"),
            Err(GraphError::Json(_))
        ));
    }
}
