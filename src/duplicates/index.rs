//! Grouping index: fingerprint → members, with perceptual refinement.
//!
//! The index is fed from a single owner (the scan loop) as fingerprints
//! arrive from workers in completion order. Grouping only happens in
//! [`GroupingIndex::finalize`], which orders members and groups by
//! discovery ordinal, so the result does not depend on completion order.
//!
//! Under the perceptual strategy, records whose hashes are equal or within
//! `threshold` Hamming distance are confirmed as near-duplicate pairs, and
//! groups are the connected components of those pairs. Connectivity is not
//! transitivity: the two extreme members of a group may be further apart
//! than `threshold`.

use std::collections::HashMap;

use image_hasher::ImageHash;

use super::DuplicateGroup;
use crate::scanner::{FileRecord, Fingerprint, SimilarityIndex, Strategy};

#[derive(Debug, Clone)]
struct Entry {
    ordinal: usize,
    record: FileRecord,
    fingerprint: Fingerprint,
}

/// Accumulates `(fingerprint, record)` pairs for one scan.
#[derive(Debug)]
pub struct GroupingIndex {
    strategy: Strategy,
    threshold: u32,
    entries: Vec<Entry>,
}

impl GroupingIndex {
    /// Index that groups by fingerprint equality.
    #[must_use]
    pub fn exact() -> Self {
        Self {
            strategy: Strategy::Exact,
            threshold: 0,
            entries: Vec::new(),
        }
    }

    /// Index that groups perceptual fingerprints within `threshold`.
    #[must_use]
    pub fn perceptual(threshold: u32) -> Self {
        Self {
            strategy: Strategy::Perceptual,
            threshold,
            entries: Vec::new(),
        }
    }

    /// Index matching the given strategy.
    #[must_use]
    pub fn for_strategy(strategy: Strategy, threshold: u32) -> Self {
        match strategy {
            Strategy::Exact => Self::exact(),
            Strategy::Perceptual => Self::perceptual(threshold),
        }
    }

    /// Strategy of this index.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Record a fingerprinted candidate.
    ///
    /// `ordinal` is the candidate's discovery position and decides its
    /// place within a group. Fingerprints from the other strategy are
    /// ignored.
    pub fn insert(&mut self, ordinal: usize, record: FileRecord, fingerprint: Fingerprint) {
        if fingerprint.strategy() != self.strategy {
            log::warn!(
                "Ignoring {} fingerprint in {} index: {}",
                fingerprint.strategy(),
                self.strategy,
                record.path.display()
            );
            return;
        }
        self.entries.push(Entry {
            ordinal,
            record,
            fingerprint,
        });
    }

    /// Number of fingerprinted records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Produce the final duplicate groups.
    ///
    /// Members are sorted by discovery ordinal (first member is canonical)
    /// and groups are sorted by their canonical member's ordinal. Groups
    /// with a single member are dropped.
    #[must_use]
    pub fn finalize(self) -> Vec<DuplicateGroup> {
        let clusters = match self.strategy {
            Strategy::Exact => cluster_exact(self.entries),
            Strategy::Perceptual => cluster_perceptual(self.entries, self.threshold),
        };

        let mut clusters: Vec<Vec<Entry>> = clusters
            .into_iter()
            .filter(|members| members.len() > 1)
            .map(|mut members| {
                members.sort_by_key(|e| e.ordinal);
                members
            })
            .collect();
        clusters.sort_by_key(|members| members[0].ordinal);

        clusters
            .into_iter()
            .map(|members| {
                let fingerprint = members[0].fingerprint.clone();
                log::debug!(
                    "Duplicate group {}: {} files, canonical {}",
                    fingerprint,
                    members.len(),
                    members[0].record.path.display()
                );
                DuplicateGroup::new(fingerprint, members.into_iter().map(|e| e.record).collect())
            })
            .collect()
    }
}

fn cluster_exact(entries: Vec<Entry>) -> Vec<Vec<Entry>> {
    let mut by_fingerprint: HashMap<Fingerprint, Vec<Entry>> = HashMap::new();
    for entry in entries {
        by_fingerprint
            .entry(entry.fingerprint.clone())
            .or_default()
            .push(entry);
    }
    by_fingerprint.into_values().collect()
}

fn cluster_perceptual(entries: Vec<Entry>, threshold: u32) -> Vec<Vec<Entry>> {
    // Identical hashes collapse to one node; the BK-tree holds each once.
    let mut node_of: HashMap<ImageHash, usize> = HashMap::new();
    let mut nodes: Vec<ImageHash> = Vec::new();
    let mut entry_node: Vec<usize> = Vec::with_capacity(entries.len());

    for entry in &entries {
        let Fingerprint::Perceptual(hash) = &entry.fingerprint else {
            continue;
        };
        let node = *node_of.entry(hash.clone()).or_insert_with(|| {
            nodes.push(hash.clone());
            nodes.len() - 1
        });
        entry_node.push(node);
    }

    let mut index = SimilarityIndex::new();
    for hash in &nodes {
        index.insert(hash.clone());
    }

    let mut sets = DisjointSet::new(nodes.len());
    for (i, hash) in nodes.iter().enumerate() {
        for (distance, neighbour) in index.find(hash, threshold) {
            if let Some(&j) = node_of.get(neighbour) {
                if i != j {
                    log::trace!("Near-duplicate pair at distance {}", distance);
                    sets.union(i, j);
                }
            }
        }
    }

    let mut components: HashMap<usize, Vec<Entry>> = HashMap::new();
    for (entry, node) in entries.into_iter().zip(entry_node) {
        components.entry(sets.find(node)).or_default().push(entry);
    }
    components.into_values().collect()
}

/// Union-find over node indices, with path compression and union by rank.
#[derive(Debug)]
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = i;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}
