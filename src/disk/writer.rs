//! Graph serializer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::disk::{UNUSED, record_len};
use crate::error::{IndexError, Result};
use crate::graph::GraphIndex;
use crate::store::VectorStore;

/// Serialize `graph` with its vectors from `store` to `path`.
///
/// Validates the graph invariants while writing: every degree within the
/// cap, every edge target inside the graph.
pub fn write_graph<G, V>(graph: &G, store: &V, path: &Path) -> Result<()>
where
    G: GraphIndex + ?Sized,
    V: VectorStore + ?Sized,
{
    let size = graph.size();
    let dimension = store.dimension();
    let max_degree = graph.max_degree();

    if store.len() < size {
        return Err(IndexError::InvalidParameter(format!(
            "store holds {} vectors but the graph has {size} nodes",
            store.len()
        )));
    }
    if size > i32::MAX as usize || dimension > i32::MAX as usize || max_degree > i32::MAX as usize {
        return Err(IndexError::InvalidParameter(
            "graph too large for the on-disk format".to_string(),
        ));
    }

    let entry = match graph.entry_point() {
        Some(e) if (e as usize) < size => e as i32,
        _ => UNUSED,
    };

    let file = File::create(path)?;
    let mut w = BufWriter::new(file);

    w.write_all(&(size as i32).to_be_bytes())?;
    w.write_all(&(dimension as i32).to_be_bytes())?;
    w.write_all(&entry.to_be_bytes())?;
    w.write_all(&(max_degree as i32).to_be_bytes())?;

    let mut record = Vec::with_capacity(record_len(dimension, max_degree));
    for i in 0..size as u32 {
        record.clear();

        let vector = store.vector(i);
        let vector = vector.as_ref();
        if vector.len() != dimension {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                actual: vector.len(),
            });
        }
        for &x in vector {
            record.extend_from_slice(&x.to_be_bytes());
        }

        let neighbors = graph.neighbors(i)?;
        if neighbors.len() > max_degree {
            return Err(IndexError::InvalidParameter(format!(
                "node {i} has degree {} over the cap {max_degree}",
                neighbors.len()
            )));
        }
        record.extend_from_slice(&(neighbors.len() as i32).to_be_bytes());
        for &n in &neighbors {
            if n as usize >= size || n == i {
                return Err(IndexError::InvalidParameter(format!(
                    "node {i} has an invalid edge to {n}"
                )));
            }
            record.extend_from_slice(&(n as i32).to_be_bytes());
        }
        for _ in neighbors.len()..max_degree {
            record.extend_from_slice(&UNUSED.to_be_bytes());
        }

        w.write_all(&record)?;
    }

    w.flush()?;
    Ok(())
}
