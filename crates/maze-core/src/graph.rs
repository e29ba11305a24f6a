//! Immutable directed, weighted maze graph.
//!
//! A [`Graph`] is validated once at construction and never mutated after.
//! Adjacency lists keep edge insertion order because clients render them
//! verbatim.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::errors::MazeError;
use crate::ids::{MazeId, VertexId};

/// Vertex role. Serialized as the integer code used on the wire and in storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum VertexKind {
    Normal,
    Entrance,
    Exit,
}

impl VertexKind {
    pub const fn code(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Entrance => 1,
            Self::Exit => 2,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Normal),
            1 => Some(Self::Entrance),
            2 => Some(Self::Exit),
            _ => None,
        }
    }
}

impl TryFrom<u8> for VertexKind {
    type Error = String;
    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("unknown vertex kind code: {code}"))
    }
}

impl From<VertexKind> for u8 {
    fn from(kind: VertexKind) -> Self {
        kind.code()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    pub kind: VertexKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub origin: VertexId,
    pub dest: VertexId,
    pub weight: u32,
}

#[derive(Clone, Debug)]
pub struct Graph {
    maze_id: MazeId,
    vertices: Vec<Vertex>,
    index: HashMap<VertexId, usize>,
    adjacency: HashMap<VertexId, Vec<(VertexId, u32)>>,
    edge_count: usize,
    entrance: VertexId,
    exits: BTreeSet<VertexId>,
}

impl Graph {
    /// Build a graph, enforcing every structural invariant of a maze.
    pub fn new(maze_id: MazeId, vertices: Vec<Vertex>, edges: Vec<Edge>) -> Result<Self, MazeError> {
        let mut index = HashMap::with_capacity(vertices.len());
        let mut entrance = None;
        let mut exits = BTreeSet::new();

        for (pos, vertex) in vertices.iter().enumerate() {
            if index.insert(vertex.id, pos).is_some() {
                return Err(MazeError::InvalidGraph(format!(
                    "duplicate vertex id {}",
                    vertex.id
                )));
            }
            match vertex.kind {
                VertexKind::Entrance => {
                    if let Some(existing) = entrance.replace(vertex.id) {
                        return Err(MazeError::InvalidGraph(format!(
                            "more than one entrance: {existing} and {}",
                            vertex.id
                        )));
                    }
                }
                VertexKind::Exit => {
                    exits.insert(vertex.id);
                }
                VertexKind::Normal => {}
            }
        }

        let entrance =
            entrance.ok_or_else(|| MazeError::InvalidGraph("no entrance vertex".into()))?;
        if exits.is_empty() {
            return Err(MazeError::InvalidGraph("no exit vertex".into()));
        }

        let mut adjacency: HashMap<VertexId, Vec<(VertexId, u32)>> = HashMap::new();
        let mut seen = HashSet::with_capacity(edges.len());
        for edge in &edges {
            for endpoint in [edge.origin, edge.dest] {
                if !index.contains_key(&endpoint) {
                    return Err(MazeError::InvalidGraph(format!(
                        "edge {} -> {} references unknown vertex {endpoint}",
                        edge.origin, edge.dest
                    )));
                }
            }
            if edge.weight < 1 {
                return Err(MazeError::InvalidGraph(format!(
                    "edge {} -> {} has weight 0",
                    edge.origin, edge.dest
                )));
            }
            if !seen.insert((edge.origin, edge.dest)) {
                return Err(MazeError::InvalidGraph(format!(
                    "duplicate edge {} -> {}",
                    edge.origin, edge.dest
                )));
            }
            adjacency
                .entry(edge.origin)
                .or_default()
                .push((edge.dest, edge.weight));
        }

        Ok(Self {
            maze_id,
            vertices,
            index,
            adjacency,
            edge_count: edges.len(),
            entrance,
            exits,
        })
    }

    pub fn maze_id(&self) -> MazeId {
        self.maze_id
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.index.get(&id).map(|&pos| &self.vertices[pos])
    }

    pub fn contains(&self, id: VertexId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn entrance(&self) -> VertexId {
        self.entrance
    }

    pub fn exits(&self) -> &BTreeSet<VertexId> {
        &self.exits
    }

    pub fn is_exit(&self, id: VertexId) -> bool {
        self.exits.contains(&id)
    }

    /// Outgoing `(destination, weight)` pairs in edge insertion order.
    pub fn adjacent_of(&self, id: VertexId) -> Result<&[(VertexId, u32)], MazeError> {
        if !self.contains(id) {
            return Err(MazeError::VertexNotFound {
                maze: self.maze_id,
                vertex: id,
            });
        }
        Ok(self.adjacency.get(&id).map_or(&[], Vec::as_slice))
    }

    /// All edges, grouped by origin in vertex order. Within one origin the
    /// insertion order is preserved.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.vertices.iter().flat_map(move |v| {
            self.adjacency
                .get(&v.id)
                .into_iter()
                .flatten()
                .map(move |&(dest, weight)| Edge {
                    origin: v.id,
                    dest,
                    weight,
                })
        })
    }

    /// Whether the directed edge `from -> to` exists.
    pub fn has_edge(&self, from: VertexId, to: VertexId) -> bool {
        self.adjacency
            .get(&from)
            .is_some_and(|adj| adj.iter().any(|&(dest, _)| dest == to))
    }

    /// Vertices the entrance cannot reach by following directed edges, in
    /// vertex order.
    pub fn unreachable_from_entrance(&self) -> Vec<VertexId> {
        let mut visited = HashSet::with_capacity(self.vertices.len());
        let mut queue = VecDeque::from([self.entrance]);
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(adj) = self.adjacency.get(&current) {
                queue.extend(adj.iter().map(|&(dest, _)| dest).filter(|d| !visited.contains(d)));
            }
        }
        self.vertices
            .iter()
            .map(|v| v.id)
            .filter(|id| !visited.contains(id))
            .collect()
    }
}
