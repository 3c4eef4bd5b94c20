use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use comms::specs::graph::{EdgeTopology, NodeId};

use crate::{Decoder, GraphErr, Result};

/// A node table and the type its rows belong to.
#[derive(Debug, Clone)]
pub struct NodeSource {
    pub path: PathBuf,
    pub node_type: String,
    pub decoder: Decoder,
}

/// An edge table and the types it connects.
#[derive(Debug, Clone)]
pub struct EdgeSource {
    pub path: PathBuf,
    pub topology: EdgeTopology,
    pub decoder: Decoder,
    pub directed: bool,
}

/// The set of tables a graph server loads its partition from.
#[derive(Debug, Clone, Default)]
pub struct TableSource {
    pub(crate) nodes: Vec<NodeSource>,
    pub(crate) edges: Vec<EdgeSource>,
}

impl TableSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node table.
    ///
    /// # Arguments
    /// * `path` - The table file.
    /// * `node_type` - The type every row of the table is registered as.
    /// * `decoder` - The attribute layout of the rows.
    pub fn node(mut self, path: impl Into<PathBuf>, node_type: &str, decoder: Decoder) -> Self {
        self.nodes.push(NodeSource {
            path: path.into(),
            node_type: node_type.to_string(),
            decoder,
        });
        self
    }

    /// Adds an edge table.
    ///
    /// # Arguments
    /// * `path` - The table file.
    /// * `(src_type, dst_type, edge_type)` - The endpoint types and the edge type.
    /// * `decoder` - Whether rows carry a weight column.
    /// * `directed` - Undirected tables also register every edge reversed.
    pub fn edge(
        mut self,
        path: impl Into<PathBuf>,
        (src_type, dst_type, edge_type): (&str, &str, &str),
        decoder: Decoder,
        directed: bool,
    ) -> Self {
        self.edges.push(EdgeSource {
            path: path.into(),
            topology: EdgeTopology {
                edge_type: edge_type.to_string(),
                src_type: src_type.to_string(),
                dst_type: dst_type.to_string(),
            },
            decoder,
            directed,
        });
        self
    }
}

/// A decoded edge row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct EdgeRow {
    pub src: NodeId,
    pub dst: NodeId,
    pub weight: f32,
}

/// Calls `f` with the 1-based line number and the tab separated columns of every data row.
///
/// A first line whose leading column isn't an integer is taken as the header and skipped.
fn for_each_row<F>(path: &Path, mut f: F) -> Result<()>
where
    F: FnMut(usize, &[&str]) -> std::result::Result<(), String>,
{
    let file = File::open(path).map_err(|e| GraphErr::table(path, 0, e.to_string()))?;

    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let line = line.trim_end_matches(['\r', '\n']);

        if line.trim().is_empty() {
            continue;
        }

        let cols: Vec<&str> = line.split('\t').collect();
        if i == 0 && cols[0].trim().parse::<NodeId>().is_err() {
            continue;
        }

        f(i + 1, &cols).map_err(|reason| GraphErr::table(path, i + 1, reason))?;
    }

    Ok(())
}

fn parse_id(col: Option<&&str>, name: &str) -> std::result::Result<NodeId, String> {
    let col = col.ok_or_else(|| format!("missing {name} column"))?;
    col.trim()
        .parse()
        .map_err(|e| format!("bad {name} '{col}': {e}"))
}

/// Reads every row of a node table.
pub(crate) fn read_nodes<F>(source: &NodeSource, mut f: F) -> Result<()>
where
    F: FnMut(NodeId, crate::decoder::Attrs),
{
    for_each_row(&source.path, |_, cols| {
        let id = parse_id(cols.first(), "id")?;
        let attrs = source.decoder.decode_attrs(cols.get(1).copied().unwrap_or(""))?;
        f(id, attrs);
        Ok(())
    })
}

/// Reads every row of an edge table.
pub(crate) fn read_edges<F>(source: &EdgeSource, mut f: F) -> Result<()>
where
    F: FnMut(EdgeRow),
{
    for_each_row(&source.path, |_, cols| {
        let src = parse_id(cols.first(), "src_id")?;
        let dst = parse_id(cols.get(1), "dst_id")?;

        let weight = if source.decoder.is_weighted() {
            let col = cols.get(2).ok_or("missing weight column")?;
            col.trim()
                .parse()
                .map_err(|e| format!("bad weight '{col}': {e}"))?
        } else {
            1.0
        };

        f(EdgeRow { src, dst, weight });
        Ok(())
    })
}
