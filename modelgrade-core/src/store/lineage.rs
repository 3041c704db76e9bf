//! Lineage graph between models.
//!
//! Every edge is written twice, once under each endpoint:
//! `pk = NODE#<from>, sk = EDGE#OUT#<to>` and `pk = NODE#<to>, sk = EDGE#IN#<from>`.
//! Walks are breadth-first with a visited set, so cycles terminate.

use super::ArtifactStore;
use crate::error::StoreError;
use chrono::Utc;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use tracing::debug;

pub const EDGE_DERIVED_FROM: &str = "DERIVED_FROM";

pub const MAX_DEPTH: u32 = 5;
pub const DEFAULT_DEPTH: u32 = 2;

/// `config.json` keys that may name a parent model.
const PARENT_KEYS: [&str; 6] = [
    "base_model_name_or_path",
    "model_base",
    "base_model",
    "parent_model",
    "model_name_or_path",
    "_name_or_path",
];

/// Internal node id for a hub model.
pub fn model_node_id(repo_id: &str) -> String {
    format!("hf:model/{}", repo_id.trim_matches('/'))
}

/// Parent model ids named in a `config.json`, excluding local paths and `self_id`.
pub fn parent_models(config: &Value, self_id: &str) -> Vec<String> {
    let mut parents: Vec<String> = Vec::new();
    for key in PARENT_KEYS {
        let Some(raw) = config.get(key).and_then(Value::as_str) else {
            continue;
        };
        let candidate = raw.trim().trim_matches('/');
        if candidate.is_empty()
            || candidate == self_id
            || raw.trim().starts_with('/')
            || candidate.starts_with('.')
            || candidate.starts_with('~')
            || candidate.contains('\\')
            || candidate.split('/').count() > 2
        {
            continue;
        }
        if !parents.iter().any(|p| p == candidate) {
            parents.push(candidate.to_string());
        }
    }
    parents
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Upstream,
    #[default]
    Downstream,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upstream" => Some(Self::Upstream),
            "downstream" => Some(Self::Downstream),
            _ => None,
        }
    }

    /// Row tag followed when walking in this direction.
    fn tag(self) -> &'static str {
        match self {
            Self::Downstream => "OUT",
            Self::Upstream => "IN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageEdge {
    pub from: String,
    pub to: String,
    pub edge_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageNode {
    pub id: String,
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageGraph {
    pub root: String,
    pub direction: Direction,
    pub depth: u32,
    pub nodes: Vec<LineageNode>,
    pub edges: Vec<LineageEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: String,
    pub edge_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Adjacency {
    pub entity_id: String,
    pub upstream: Vec<Neighbor>,
    pub downstream: Vec<Neighbor>,
}

fn edge_rows(conn: &Connection, node: &str, tag: &str) -> Result<Vec<LineageEdge>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT from_id, to_id, edge_type FROM lineage_edges
         WHERE pk = ?1 AND direction = ?2 ORDER BY sk",
    )?;
    let rows = stmt
        .query_map(params![format!("NODE#{node}"), tag], |r| {
            Ok(LineageEdge {
                from: r.get(0)?,
                to: r.get(1)?,
                edge_type: r.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

impl ArtifactStore {
    /// Record `from -> to`. Writing the same edge again is a no-op apart from its timestamp.
    pub async fn put_edge(&self, from: &str, to: &str, edge_type: &str) -> Result<(), StoreError> {
        let (from, to, edge_type) = (from.to_string(), to.to_string(), edge_type.to_string());
        debug!(from = %from, to = %to, edge_type = %edge_type, "Storing lineage edge");
        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction()?;
            let sql = "INSERT OR REPLACE INTO lineage_edges
                       (pk, sk, direction, edge_type, from_id, to_id, created_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";
            tx.execute(
                sql,
                params![
                    format!("NODE#{from}"),
                    format!("EDGE#OUT#{to}"),
                    "OUT",
                    edge_type,
                    from,
                    to,
                    now
                ],
            )?;
            tx.execute(
                sql,
                params![
                    format!("NODE#{to}"),
                    format!("EDGE#IN#{from}"),
                    "IN",
                    edge_type,
                    from,
                    to,
                    now
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Direct neighbors of `entity_id` in both directions.
    pub async fn adjacency(&self, entity_id: &str) -> Result<Adjacency, StoreError> {
        let entity = entity_id.to_string();
        self.with_conn(move |conn| {
            let upstream = edge_rows(conn, &entity, "IN")?
                .into_iter()
                .map(|e| Neighbor {
                    id: e.from,
                    edge_type: e.edge_type,
                })
                .collect();
            let downstream = edge_rows(conn, &entity, "OUT")?
                .into_iter()
                .map(|e| Neighbor {
                    id: e.to,
                    edge_type: e.edge_type,
                })
                .collect();
            Ok(Adjacency {
                entity_id: entity,
                upstream,
                downstream,
            })
        })
        .await
    }

    /// Breadth-first walk from `root`, up to `depth` hops (clamped to `1..=5`).
    pub async fn lineage(
        &self,
        root: &str,
        direction: Direction,
        depth: u32,
    ) -> Result<LineageGraph, StoreError> {
        let depth = depth.clamp(1, MAX_DEPTH);
        let root = root.to_string();
        self.with_conn(move |conn| {
            let mut visited: HashSet<String> = HashSet::from([root.clone()]);
            let mut queue = VecDeque::from([(root.clone(), 0u32)]);
            let mut nodes = vec![LineageNode {
                id: root.clone(),
                level: 0,
            }];
            let mut edges = Vec::new();

            while let Some((node, level)) = queue.pop_front() {
                if level >= depth {
                    continue;
                }
                for edge in edge_rows(conn, &node, direction.tag())? {
                    let next = match direction {
                        Direction::Downstream => edge.to.clone(),
                        Direction::Upstream => edge.from.clone(),
                    };
                    edges.push(edge);
                    if visited.insert(next.clone()) {
                        nodes.push(LineageNode {
                            id: next.clone(),
                            level: level + 1,
                        });
                        queue.push_back((next, level + 1));
                    }
                }
            }

            Ok(LineageGraph {
                root,
                direction,
                depth,
                nodes,
                edges,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parent_models() {
        let config = json!({
            "_name_or_path": "org/finetuned",
            "base_model_name_or_path": "bert-base-uncased",
            "base_model": "bert-base-uncased",
            "model_name_or_path": "/home/me/checkpoints/run1",
            "parent_model": "./local",
        });
        assert_eq!(parent_models(&config, "org/finetuned"), vec!["bert-base-uncased"]);
        assert!(parent_models(&json!({}), "x").is_empty());
        assert!(parent_models(&json!({"base_model": 3}), "x").is_empty());
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!(Direction::parse("UPSTREAM"), Some(Direction::Upstream));
        assert_eq!(Direction::parse("downstream"), Some(Direction::Downstream));
        assert_eq!(Direction::parse("sideways"), None);
        assert_eq!(Direction::default(), Direction::Downstream);
    }

    async fn chain() -> ArtifactStore {
        // a -> b -> c -> d, plus a cycle d -> a
        let store = ArtifactStore::in_memory().unwrap();
        for (from, to) in [("a", "b"), ("b", "c"), ("c", "d"), ("d", "a")] {
            store.put_edge(from, to, EDGE_DERIVED_FROM).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_adjacency_both_directions() {
        let store = chain().await;
        let adj = store.adjacency("b").await.unwrap();
        assert_eq!(adj.entity_id, "b");
        assert_eq!(
            adj.upstream,
            vec![Neighbor {
                id: "a".into(),
                edge_type: EDGE_DERIVED_FROM.into()
            }]
        );
        assert_eq!(adj.downstream.len(), 1);
        assert_eq!(adj.downstream[0].id, "c");
    }

    #[tokio::test]
    async fn test_duplicate_edge_written_once() {
        let store = ArtifactStore::in_memory().unwrap();
        store.put_edge("x", "y", EDGE_DERIVED_FROM).await.unwrap();
        store.put_edge("x", "y", EDGE_DERIVED_FROM).await.unwrap();
        assert_eq!(store.adjacency("x").await.unwrap().downstream.len(), 1);
    }

    #[tokio::test]
    async fn test_bfs_depth_limits() {
        let store = chain().await;
        let graph = store.lineage("a", Direction::Downstream, 2).await.unwrap();
        let ids: Vec<_> = graph.nodes.iter().map(|n| (n.id.as_str(), n.level)).collect();
        assert_eq!(ids, vec![("a", 0), ("b", 1), ("c", 2)]);
        assert_eq!(graph.edges.len(), 2);
    }

    #[tokio::test]
    async fn test_bfs_cycle_terminates() {
        let store = chain().await;
        let graph = store.lineage("a", Direction::Downstream, 10).await.unwrap();
        assert_eq!(graph.depth, MAX_DEPTH);
        assert_eq!(graph.nodes.len(), 4);
        // The closing edge d -> a is reported even though a is already visited.
        assert_eq!(graph.edges.len(), 4);
    }

    #[tokio::test]
    async fn test_bfs_upstream() {
        let store = chain().await;
        let graph = store.lineage("c", Direction::Upstream, 1).await.unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[1].id, "b");
        assert_eq!(
            graph.edges,
            vec![LineageEdge {
                from: "b".into(),
                to: "c".into(),
                edge_type: EDGE_DERIVED_FROM.into()
            }]
        );
    }

    #[tokio::test]
    async fn test_unknown_root_is_lonely() {
        let store = ArtifactStore::in_memory().unwrap();
        let graph = store.lineage("nobody", Direction::Upstream, 0).await.unwrap();
        assert_eq!(graph.depth, 1);
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
    }
}
