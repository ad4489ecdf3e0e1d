//! Category hierarchy support.
//!
//! Categories are the one self-referencing kind. On the export side a flat,
//! id-indexed arena over the whole table answers path and subtree queries
//! with iterative walks. On the import side the dependency resolver groups
//! inbound snapshots into depth tiers so parents are reconciled before their
//! children.

use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;

use serde_json::Value as JsonValue;

/// One category row as the arena sees it.
#[derive(Debug, Clone)]
pub struct CategoryNode {
    pub id: i32,
    pub name: String,
    pub category_type: String,
    pub parent_id: Option<i32>,
}

/// Flat arena over the category table: all nodes in one id-indexed map with
/// parent pointers, traversed iteratively.
pub struct CategoryArena {
    nodes: HashMap<i32, CategoryNode>,
}

impl CategoryArena {
    pub fn new(rows: impl IntoIterator<Item = CategoryNode>) -> Self {
        Self {
            nodes: rows.into_iter().map(|node| (node.id, node)).collect(),
        }
    }

    /// Ancestor names of `id`, root first, excluding the node itself.
    /// A dangling or cyclic parent chain terminates the walk at the last
    /// resolvable ancestor.
    pub fn full_path(&self, id: i32) -> Vec<String> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(id);

        let mut current = self.nodes.get(&id).and_then(|node| node.parent_id);
        while let Some(parent_id) = current {
            if !seen.insert(parent_id) {
                log::warn!("cycle detected in category hierarchy at id {parent_id}");
                break;
            }
            match self.nodes.get(&parent_id) {
                Some(parent) => {
                    path.push(parent.name.clone());
                    current = parent.parent_id;
                }
                None => break,
            }
        }

        path.reverse();
        path
    }

    /// Number of ancestors above `id`; roots have depth 0.
    pub fn depth(&self, id: i32) -> usize {
        self.full_path(id).len()
    }

    pub fn roots(&self) -> Vec<i32> {
        let mut roots: Vec<i32> = self
            .nodes
            .values()
            .filter(|node| node.parent_id.is_none())
            .map(|node| node.id)
            .collect();
        roots.sort_unstable();
        roots
    }

    /// All ids in the subtree rooted at `id`, excluding `id` itself.
    /// Iterative breadth-first walk over the parent index.
    pub fn descendants(&self, id: i32) -> Vec<i32> {
        let mut children_of: HashMap<i32, Vec<i32>> = HashMap::new();
        for node in self.nodes.values() {
            if let Some(parent_id) = node.parent_id {
                children_of.entry(parent_id).or_default().push(node.id);
            }
        }

        let mut found = Vec::new();
        let mut queue = VecDeque::from([id]);
        let mut seen = HashSet::from([id]);
        while let Some(current) = queue.pop_front() {
            if let Some(children) = children_of.get(&current) {
                for &child in children {
                    if seen.insert(child) {
                        found.push(child);
                        queue.push_back(child);
                    }
                }
            }
        }

        found.sort_unstable();
        found
    }

    /// Deepest depth present in the arena; 0 for a flat or empty table.
    pub fn max_depth(&self) -> usize {
        self.nodes
            .keys()
            .map(|&id| self.depth(id))
            .max()
            .unwrap_or(0)
    }
}

/// Inbound category snapshots grouped by dependency tier.
#[derive(Debug)]
pub struct DependencyTiers {
    /// `tiers[d]` holds the snapshots whose parent chain has length `d`.
    pub tiers: Vec<Vec<JsonValue>>,
    /// Snapshots whose parent reference was structurally unusable. The
    /// orchestrator reports these as per-record errors, never drops them
    /// silently.
    pub malformed: usize,
}

/// Order inbound category snapshots so that by the time a depth-`n` record
/// is reconciled, any depth-`n-1` parent in the same batch has already been
/// committed. Depth is the length of the snapshot's `parent` name chain;
/// a missing `parent` field means a root.
pub fn tier_by_parent_chain(records: &[JsonValue]) -> DependencyTiers {
    let mut tiers: Vec<Vec<JsonValue>> = Vec::new();
    let mut malformed = 0;

    for record in records {
        let depth = match record.get("parent") {
            None | Some(JsonValue::Null) => Some(0),
            Some(JsonValue::Array(chain)) => {
                if chain.iter().all(JsonValue::is_string) {
                    Some(chain.len())
                } else {
                    None
                }
            }
            Some(_) => None,
        };

        match depth {
            Some(depth) => {
                if tiers.len() <= depth {
                    tiers.resize_with(depth + 1, Vec::new);
                }
                tiers[depth].push(record.clone());
            }
            None => {
                log::warn!("category snapshot carries a malformed parent reference");
                malformed += 1;
            }
        }
    }

    DependencyTiers { tiers, malformed }
}
