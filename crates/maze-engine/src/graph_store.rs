//! Read-through cache of immutable maze graphs.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, instrument};

use maze_core::{Graph, GraphSource, MazeError, MazeId, VertexId};

/// Graphs are loaded lazily from a [`GraphSource`] and shared as
/// `Arc<Graph>` until explicitly reloaded.
///
/// A session pins the `Arc<Graph>` it was created with and reads it
/// directly, so a `reload` never changes a traversal in flight. The
/// id-keyed queries serve callers that only hold a maze id.
pub struct GraphStore {
    source: Arc<dyn GraphSource>,
    cache: DashMap<MazeId, Arc<Graph>>,
}

impl GraphStore {
    pub fn new(source: Arc<dyn GraphSource>) -> Self {
        Self {
            source,
            cache: DashMap::new(),
        }
    }

    #[instrument(skip(self), fields(maze_id = %maze_id))]
    pub fn load(&self, maze_id: MazeId) -> Result<Arc<Graph>, MazeError> {
        if let Some(graph) = self.cache.get(&maze_id) {
            return Ok(Arc::clone(graph.value()));
        }
        let graph = Arc::new(self.source.load_graph(maze_id)?);
        debug!(vertices = graph.vertex_count(), "graph cached");
        // A concurrent loader may have won; keep whichever landed first.
        let entry = self.cache.entry(maze_id).or_insert(graph);
        Ok(Arc::clone(entry.value()))
    }

    /// Evict and load again from the source.
    #[instrument(skip(self), fields(maze_id = %maze_id))]
    pub fn reload(&self, maze_id: MazeId) -> Result<Arc<Graph>, MazeError> {
        let _ = self.cache.remove(&maze_id);
        self.load(maze_id)
    }

    pub fn adjacent_of(
        &self,
        maze_id: MazeId,
        vertex: VertexId,
    ) -> Result<Vec<(VertexId, u32)>, MazeError> {
        Ok(self.load(maze_id)?.adjacent_of(vertex)?.to_vec())
    }

    pub fn entrance_of(&self, maze_id: MazeId) -> Result<VertexId, MazeError> {
        Ok(self.load(maze_id)?.entrance())
    }

    pub fn exits_of(&self, maze_id: MazeId) -> Result<BTreeSet<VertexId>, MazeError> {
        Ok(self.load(maze_id)?.exits().clone())
    }

    pub fn total_vertex_count(&self, maze_id: MazeId) -> Result<usize, MazeError> {
        Ok(self.load(maze_id)?.vertex_count())
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use maze_core::{Edge, Vertex, VertexKind};

    use super::*;

    /// In-memory graph source that counts loads.
    #[derive(Default)]
    pub struct MemorySource {
        pub graphs: parking_lot::Mutex<HashMap<MazeId, (Vec<Vertex>, Vec<Edge>)>>,
        pub loads: AtomicUsize,
    }

    impl MemorySource {
        pub fn with(maze: i64, vertices: &[(i64, VertexKind)], edges: &[(i64, i64, u32)]) -> Self {
            let source = Self::default();
            source.insert(maze, vertices, edges);
            source
        }

        pub fn insert(&self, maze: i64, vertices: &[(i64, VertexKind)], edges: &[(i64, i64, u32)]) {
            let vertices = vertices
                .iter()
                .map(|&(id, kind)| Vertex {
                    id: VertexId::new(id),
                    kind,
                })
                .collect();
            let edges = edges
                .iter()
                .map(|&(o, d, w)| Edge {
                    origin: VertexId::new(o),
                    dest: VertexId::new(d),
                    weight: w,
                })
                .collect();
            let _ = self.graphs.lock().insert(MazeId::new(maze), (vertices, edges));
        }

        pub fn load_count(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    impl GraphSource for MemorySource {
        fn load_graph(&self, maze_id: MazeId) -> Result<Graph, MazeError> {
            let _ = self.loads.fetch_add(1, Ordering::SeqCst);
            let graphs = self.graphs.lock();
            let (vertices, edges) = graphs
                .get(&maze_id)
                .ok_or(MazeError::GraphNotFound(maze_id))?;
            Graph::new(maze_id, vertices.clone(), edges.clone())
        }
    }

    /// `{0: Entrance, 1: Normal, 2: Exit}` with `0->1`, `1->2`.
    pub fn line_source() -> MemorySource {
        MemorySource::with(
            1,
            &[
                (0, VertexKind::Entrance),
                (1, VertexKind::Normal),
                (2, VertexKind::Exit),
            ],
            &[(0, 1, 1), (1, 2, 1)],
        )
    }
}
