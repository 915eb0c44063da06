//! Adjacency-list → forest conversion for root-cause hierarchies.
//!
//! The store hands back every cause of a problem as flat rows, sorted by
//! `(level, created_at, id)`. [`build_tree`] groups them by `parent_id` in a
//! single pass and then assembles the nested forest recursively. Nothing here
//! touches I/O.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::root_cause::RootCause;

/// A root cause with its full subtree attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootCauseNode {
  #[serde(flatten)]
  pub cause:    RootCause,
  pub children: Vec<RootCauseNode>,
}

impl RootCauseNode {
  /// Pre-order walk over this node and its descendants.
  pub fn iter(&self) -> impl Iterator<Item = &RootCause> + '_ {
    let mut stack = vec![self];
    std::iter::from_fn(move || {
      let node = stack.pop()?;
      stack.extend(node.children.iter().rev());
      Some(&node.cause)
    })
  }
}

/// Row indices grouped by `parent_id`, each group in input order.
fn group_by_parent(rows: &[RootCause]) -> HashMap<Option<i64>, Vec<usize>> {
  let mut groups: HashMap<Option<i64>, Vec<usize>> = HashMap::new();
  for (idx, row) in rows.iter().enumerate() {
    groups.entry(row.parent_id).or_default().push(idx);
  }
  groups
}

/// Build the forest hanging off `parent_id` (`None` for the top level).
///
/// Siblings keep their relative order from `rows`. Rows that cannot be
/// reached from `parent_id` (orphans whose parent is missing, or rows caught
/// in a parent cycle) are left out; see [`orphaned_rows`].
pub fn build_tree(rows: &[RootCause], parent_id: Option<i64>) -> Vec<RootCauseNode> {
  let groups = group_by_parent(rows);
  let mut visited = HashSet::new();
  assemble(rows, &groups, parent_id, &mut visited)
}

fn assemble(
  rows: &[RootCause],
  groups: &HashMap<Option<i64>, Vec<usize>>,
  parent_id: Option<i64>,
  visited: &mut HashSet<i64>,
) -> Vec<RootCauseNode> {
  let Some(indices) = groups.get(&parent_id) else {
    return Vec::new();
  };

  let mut branch = Vec::with_capacity(indices.len());
  for &idx in indices {
    let cause = &rows[idx];
    if !visited.insert(cause.id) {
      continue;
    }
    let children = assemble(rows, groups, Some(cause.id), visited);
    branch.push(RootCauseNode { cause: cause.clone(), children });
  }
  branch
}

/// Rows that [`build_tree`] would drop from the top-level forest.
pub fn orphaned_rows(rows: &[RootCause]) -> Vec<&RootCause> {
  let groups = group_by_parent(rows);
  let mut reachable = HashSet::new();
  let mut pending = vec![None];
  while let Some(parent) = pending.pop() {
    for &idx in groups.get(&parent).into_iter().flatten() {
      if reachable.insert(rows[idx].id) {
        pending.push(Some(rows[idx].id));
      }
    }
  }
  rows.iter().filter(|row| !reachable.contains(&row.id)).collect()
}

/// Deepest `level` among `rows`, or 0 for an empty set.
pub fn max_depth(rows: &[RootCause]) -> u32 {
  rows.iter().map(|row| row.level).max().unwrap_or(0)
}

/// Pre-order flattening of a forest.
pub fn flatten(forest: &[RootCauseNode]) -> Vec<&RootCause> {
  forest.iter().flat_map(RootCauseNode::iter).collect()
}

// ─── Tree payload ────────────────────────────────────────────────────────────

/// Everything a client needs to render one problem's analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootCauseTree {
  pub problem_id:   i64,
  pub tree:         Vec<RootCauseNode>,
  /// The cause currently flagged as *the* root cause, if any.
  pub root_cause:   Option<RootCause>,
  pub max_depth:    u32,
  /// Number of stored causes, including any left out of `tree`.
  pub total_causes: usize,
}

impl RootCauseTree {
  /// Assemble the payload from all rows of `problem_id`, ordered by
  /// `(level, created_at, id)`.
  pub fn from_rows(problem_id: i64, rows: &[RootCause]) -> Self {
    Self {
      problem_id,
      tree: build_tree(rows, None),
      root_cause: rows.iter().find(|row| row.is_root_cause).cloned(),
      max_depth: max_depth(rows),
      total_causes: rows.len(),
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{DateTime, TimeZone, Utc};

  use super::*;

  fn at(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).unwrap() }

  fn row(id: i64, parent_id: Option<i64>, level: u32) -> RootCause {
    RootCause {
      id,
      problem_id: 1,
      parent_id,
      cause_text: format!("cause {id}"),
      is_root_cause: false,
      action_plan: None,
      level,
      created_at: at(id),
    }
  }

  fn ids(nodes: &[RootCauseNode]) -> Vec<i64> {
    nodes.iter().map(|n| n.cause.id).collect()
  }

  fn sample() -> Vec<RootCause> {
    vec![
      row(1, None, 0),
      row(2, Some(1), 1),
      row(3, Some(1), 1),
      row(4, Some(2), 2),
    ]
  }

  #[test]
  fn empty_input_yields_empty_forest() {
    assert!(build_tree(&[], None).is_empty());
    assert_eq!(max_depth(&[]), 0);
  }

  #[test]
  fn builds_nested_forest_in_order() {
    let forest = build_tree(&sample(), None);
    assert_eq!(ids(&forest), vec![1]);

    let root = &forest[0];
    assert_eq!(ids(&root.children), vec![2, 3]);
    assert_eq!(ids(&root.children[0].children), vec![4]);
    assert!(root.children[1].children.is_empty());
    assert_eq!(max_depth(&sample()), 2);
  }

  #[test]
  fn builds_subtree_from_given_parent() {
    let subtree = build_tree(&sample(), Some(2));
    assert_eq!(ids(&subtree), vec![4]);
  }

  #[test]
  fn flattening_contains_every_row_once() {
    let rows = vec![
      row(1, None, 0),
      row(5, None, 0),
      row(2, Some(1), 1),
      row(3, Some(5), 1),
      row(6, Some(1), 1),
      row(4, Some(2), 2),
      row(7, Some(4), 3),
    ];
    let forest = build_tree(&rows, None);
    let mut flat: Vec<i64> = flatten(&forest).iter().map(|c| c.id).collect();
    assert_eq!(flat, vec![1, 2, 4, 7, 6, 5, 3]);

    flat.sort_unstable();
    assert_eq!(flat, vec![1, 2, 3, 4, 5, 6, 7]);

    for node in &forest {
      for cause in node.iter() {
        let expected: Vec<i64> = rows
          .iter()
          .filter(|r| r.parent_id == Some(cause.id))
          .map(|r| r.id)
          .collect();
        let found = find(&forest, cause.id).unwrap();
        assert_eq!(ids(&found.children), expected);
      }
    }
  }

  fn find(forest: &[RootCauseNode], id: i64) -> Option<&RootCauseNode> {
    for node in forest {
      if node.cause.id == id {
        return Some(node);
      }
      if let Some(hit) = find(&node.children, id) {
        return Some(hit);
      }
    }
    None
  }

  #[test]
  fn orphans_are_left_out_and_reported() {
    let mut rows = sample();
    rows.push(row(9, Some(42), 1));
    rows.push(row(10, Some(9), 2));

    let forest = build_tree(&rows, None);
    assert_eq!(flatten(&forest).len(), 4);

    let orphans: Vec<i64> = orphaned_rows(&rows).iter().map(|r| r.id).collect();
    assert_eq!(orphans, vec![9, 10]);
    assert!(orphaned_rows(&sample()).is_empty());
  }

  #[test]
  fn parent_cycles_do_not_recurse_forever() {
    let rows = vec![row(1, Some(2), 1), row(2, Some(1), 1)];
    assert!(build_tree(&rows, None).is_empty());

    let subtree = build_tree(&rows, Some(1));
    assert_eq!(flatten(&subtree).len(), 2);
    assert_eq!(orphaned_rows(&rows).len(), 2);
  }

  #[test]
  fn payload_summarises_rows() {
    let mut rows = sample();
    rows[2].is_root_cause = true;
    rows[2].action_plan = Some("Fix it".into());

    let payload = RootCauseTree::from_rows(1, &rows);
    assert_eq!(payload.total_causes, 4);
    assert_eq!(payload.max_depth, 2);
    assert_eq!(payload.root_cause.map(|c| c.id), Some(3));
    assert_eq!(ids(&payload.tree), vec![1]);
  }

  #[test]
  fn node_serialises_flat_with_children() {
    let forest = build_tree(&sample(), None);
    let json = serde_json::to_value(&forest[0]).unwrap();
    assert_eq!(json["id"], 1);
    assert_eq!(json["parent_id"], serde_json::Value::Null);
    assert_eq!(json["children"][0]["id"], 2);
    assert_eq!(json["children"][0]["children"][0]["level"], 2);
  }
}
