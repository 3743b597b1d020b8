//! Path solver (component E): builds the global link graph for one
//! content-hash type and runs Dijkstra's algorithm from a source fingerprint
//! to a target fingerprint under a caller-supplied metadata whitelist.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::error::DeltaRepoError;
use crate::mirror::Link;
use crate::Result;

/// Nodes are content-hash strings; edges are [`Link`]s. Built for exactly
/// one `contenthash_type` — links declaring a different type are dropped
/// with a warning during construction.
pub struct Graph {
    contenthash_type: String,
    /// src -> outgoing edges, in first-seen order (duplicate (src,dst)
    /// pairs keep only the first; ties in Dijkstra break toward whichever
    /// predecessor was discovered first, which this ordering guarantees).
    edges: HashMap<String, Vec<Link>>,
}

impl Graph {
    /// Build a graph over `links`, keeping only those whose
    /// `contenthash_type` matches `contenthash_type`.
    pub fn build(links: Vec<Link>, contenthash_type: &str) -> Self {
        let mut edges: HashMap<String, Vec<Link>> = HashMap::new();
        let mut seen_pairs: std::collections::HashSet<(String, String)> = std::collections::HashSet::new();

        for link in links {
            let ty = match link.contenthash_type() {
                Some(t) => t,
                None => {
                    tracing::warn!(href = %link.record.location_href, "link has no contenthash_type; dropping");
                    continue;
                }
            };
            if ty != contenthash_type {
                tracing::warn!(
                    href = %link.record.location_href,
                    expected = contenthash_type,
                    found = ty,
                    "link's contenthash_type does not match solver configuration; dropping"
                );
                continue;
            }
            let (src, dst) = match (link.src(), link.dst()) {
                (Some(s), Some(d)) => (s.to_string(), d.to_string()),
                _ => continue,
            };

            let pair = (src.clone(), dst.clone());
            if !seen_pairs.insert(pair) {
                tracing::warn!(%src, %dst, "duplicate delta link; keeping the first one seen");
                continue;
            }

            edges.entry(src).or_default().push(link);
        }

        Self {
            contenthash_type: contenthash_type.to_string(),
            edges,
        }
    }

    pub fn contenthash_type(&self) -> &str {
        &self.contenthash_type
    }

    fn outgoing(&self, node: &str) -> &[Link] {
        self.edges.get(node).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// A finite ordered sequence of [`Link`]s whose `dst` at step *i* equals
/// `src` at step *i+1*, from `source` to `target`.
pub struct ResolvedPath {
    pub links: Vec<Link>,
}

impl ResolvedPath {
    pub fn total_cost(&self, whitelist: &std::collections::HashSet<String>) -> u64 {
        self.links.iter().map(|l| l.cost(whitelist)).sum()
    }
}

#[derive(PartialEq, Eq)]
struct HeapEntry {
    cost: u64,
    node: String,
    /// Sequence number at which this node was first pushed, used only to
    /// make the BinaryHeap ordering deterministic for equal costs — the
    /// real tie-break (first-discovered predecessor wins) happens in the
    /// relaxation loop below, not here.
    seq: u64,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; we want the smallest cost first.
        other.cost.cmp(&self.cost).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Run Dijkstra's algorithm from `source` to `target` over `graph`, with
/// edge weights computed under `whitelist`. `source == target` is rejected
/// up front: a zero-length path is not a valid update.
///
/// Distances use an explicit `Option<u64>` rather than a numeric sentinel —
/// "infinity" is simply "not yet in the map".
pub fn shortest_path(
    graph: &Graph,
    source: &str,
    target: &str,
    whitelist: &std::collections::HashSet<String>,
) -> Result<ResolvedPath> {
    if source == target {
        return Err(DeltaRepoError::IdenticalEndpoints(source.to_string()));
    }

    let mut dist: HashMap<String, u64> = HashMap::new();
    let mut predecessor: HashMap<String, Link> = HashMap::new();
    let mut visited: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();
    let mut seq: u64 = 0;

    dist.insert(source.to_string(), 0);
    heap.push(HeapEntry {
        cost: 0,
        node: source.to_string(),
        seq,
    });

    while let Some(HeapEntry { cost, node, .. }) = heap.pop() {
        if !visited.insert(node.clone()) {
            continue;
        }
        if node == target {
            break;
        }
        if cost > *dist.get(&node).unwrap_or(&u64::MAX) {
            continue;
        }

        for link in graph.outgoing(&node) {
            let edge_dst = match link.dst() {
                Some(d) => d.to_string(),
                None => continue,
            };
            if visited.contains(&edge_dst) {
                continue;
            }
            let candidate = cost + link.cost(whitelist);
            let better = match dist.get(&edge_dst) {
                Some(existing) => candidate < *existing,
                None => true,
            };
            if better {
                dist.insert(edge_dst.clone(), candidate);
                predecessor.insert(edge_dst.clone(), link.clone());
                seq += 1;
                heap.push(HeapEntry {
                    cost: candidate,
                    node: edge_dst,
                    seq,
                });
            }
        }
    }

    if !dist.contains_key(target) {
        return Err(DeltaRepoError::Unreachable {
            source_hash: source.to_string(),
            target_hash: target.to_string(),
        });
    }

    // walk predecessors back from target to source
    let mut links = Vec::new();
    let mut cursor = target.to_string();
    while cursor != source {
        let link = predecessor
            .remove(&cursor)
            .expect("every reachable non-source node has a predecessor");
        let prev = link
            .src()
            .expect("edges in the graph always carry a src")
            .to_string();
        links.push(link);
        cursor = prev;
    }
    links.reverse();

    Ok(ResolvedPath { links })
}

/// Results cache for repeated solver invocations within one updater
/// instance, keyed by `(src, dst, hash_type)`. The solver is purely
/// functional, so caching the outcome of an identical query is always
/// sound; errors are retained as a string so the cache entry stays `Clone`.
#[derive(Default)]
pub struct PathCache {
    cache: HashMap<(String, String, String), std::result::Result<Vec<Link>, String>>,
}

/// A probed snapshot's identity facts, as needed by [`guess_fingerprint`].
pub struct Fingerprint<'a> {
    pub revision: Option<&'a str>,
    pub timestamp: Option<i64>,
}

/// Since a source snapshot's `repomd.xml` may not advertise a content hash
/// itself, scan all known links for one whose `(revision, timestamp)` at
/// either endpoint matches `probe`, with a matching `contenthash_type`.
/// First hit wins.
pub fn guess_fingerprint(
    links: &[Link],
    probe: &Fingerprint,
    contenthash_type: &str,
) -> Option<String> {
    for link in links {
        if link.contenthash_type() != Some(contenthash_type) {
            continue;
        }
        let src_match = probe.revision.is_some() && link.record.revision_src.as_deref() == probe.revision
            || probe.timestamp.is_some() && link.record.timestamp_src == probe.timestamp;
        if src_match {
            if let Some(hash) = link.src() {
                return Some(hash.to_string());
            }
        }
        let dst_match = probe.revision.is_some() && link.record.revision_dst.as_deref() == probe.revision
            || probe.timestamp.is_some() && link.record.timestamp_dst == probe.timestamp;
        if dst_match {
            if let Some(hash) = link.dst() {
                return Some(hash.to_string());
            }
        }
    }
    None
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `key` identifies the invocation `(src, dst, hash_type)`; `compute`
    /// runs the real solve only on a cache miss. Returns a clone of the
    /// cached outcome so repeated lookups don't re-run Dijkstra.
    pub fn get_or_insert_with<F>(
        &mut self,
        src: &str,
        dst: &str,
        hash_type: &str,
        compute: F,
    ) -> std::result::Result<Vec<Link>, String>
    where
        F: FnOnce() -> Result<ResolvedPath>,
    {
        let key = (src.to_string(), dst.to_string(), hash_type.to_string());
        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }
        let result = compute().map(|p| p.links).map_err(|e| e.to_string());
        self.cache.insert(key, result.clone());
        result
    }
}
