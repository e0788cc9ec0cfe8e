//! Balanced search tree built on [`TreeIndexAdapter`].
//!
//! Nodes live in an arena. Every leaf sits at the same depth: a full node
//! splits in place and pushes one extra downlink into its parent, and a root
//! split grows the tree by one level.

use crate::index::options::IndexOptions;
use crate::index::tree::{TreeEntry, TreeIndexAdapter};
use crate::index::types::{CallContext, Key, RowId, ScanKey};
use crate::query::range_scan::matches_all;
use crate::query::recheck::Recheck;
use crate::query::stats::{ScanResult, ScanStats};
use crate::query::table::Table;
use anyhow::{Context, Result, bail};
use tracing::{debug, info, trace};

/// Default maximum number of entries per node
pub const DEFAULT_NODE_CAPACITY: usize = 32;

type NodeId = usize;

#[derive(Debug, Clone)]
enum Node {
    Leaf(Vec<(TreeEntry, RowId)>),
    Internal(Vec<(TreeEntry, NodeId)>),
}

impl Node {
    fn len(&self) -> usize {
        match self {
            Node::Leaf(entries) => entries.len(),
            Node::Internal(children) => children.len(),
        }
    }

    fn entries(&self) -> Vec<TreeEntry> {
        match self {
            Node::Leaf(entries) => entries.iter().map(|(e, _)| e.clone()).collect(),
            Node::Internal(children) => children.iter().map(|(e, _)| e.clone()).collect(),
        }
    }

    /// Keep the `left` positions here and return a node holding `right`
    fn split_off(&mut self, left: &[usize], right: &[usize]) -> Node {
        match self {
            Node::Leaf(entries) => {
                let old = std::mem::take(entries);
                *entries = select(&old, left);
                Node::Leaf(select(&old, right))
            }
            Node::Internal(children) => {
                let old = std::mem::take(children);
                *children = select(&old, left);
                Node::Internal(select(&old, right))
            }
        }
    }
}

fn select<T: Clone>(items: &[T], positions: &[usize]) -> Vec<T> {
    positions.iter().map(|&i| items[i].clone()).collect()
}

#[derive(Debug, Clone)]
pub struct TreeIndex {
    adapter: TreeIndexAdapter,
    ctx: CallContext,
    nodes: Vec<Node>,
    root: NodeId,
    capacity: usize,
    len: usize,
}

impl TreeIndex {
    pub fn new(options: IndexOptions, ctx: CallContext, capacity: usize) -> Result<Self> {
        options.validate().context("creating tree index")?;
        if capacity < 2 {
            bail!("node capacity must be at least 2, got {}", capacity);
        }
        Ok(Self {
            adapter: TreeIndexAdapter::new(options),
            ctx,
            nodes: vec![Node::Leaf(Vec::new())],
            root: 0,
            capacity,
            len: 0,
        })
    }

    /// Insert every non-null row of `table`
    pub fn build(
        table: &Table,
        options: IndexOptions,
        ctx: CallContext,
        capacity: usize,
    ) -> Result<Self> {
        let mut index = Self::new(options, ctx, capacity)?;
        for (row, value) in table.rows() {
            if let Some(value) = value {
                index
                    .insert(row, value)
                    .with_context(|| format!("inserting row {}", row))?;
            }
        }
        info!(
            entries = index.len,
            nodes = index.nodes.len(),
            height = index.height(),
            "built tree index"
        );
        Ok(index)
    }

    /// Number of leaf entries
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Levels from root to leaves; 1 for a lone leaf root
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut node = self.root;
        while let Node::Internal(children) = &self.nodes[node] {
            match children.first() {
                Some(&(_, child)) => node = child,
                None => break,
            }
            height += 1;
        }
        height
    }

    pub fn insert(&mut self, row: RowId, value: &Key) -> Result<()> {
        let entry = self.adapter.compress(&TreeEntry::leaf(value.clone()));

        let mut path: Vec<(NodeId, usize)> = Vec::new();
        let mut node = self.root;
        while let Node::Internal(children) = &self.nodes[node] {
            let pos = self.choose_subtree(children, &entry)?;
            path.push((node, pos));
            node = children[pos].1;
        }
        if let Node::Leaf(entries) = &mut self.nodes[node] {
            entries.push((entry, row));
        }
        self.len += 1;

        let mut split = self.split_if_full(node)?;
        while let Some((parent, pos)) = path.pop() {
            let child = node;
            let refreshed = match split.take() {
                Some((left_key, right_key, right)) => {
                    if let Node::Internal(children) = &mut self.nodes[parent] {
                        children[pos] = (left_key, child);
                        children.insert(pos + 1, (right_key, right));
                    }
                    true
                }
                None => self.refresh_downlink(parent, pos, child),
            };
            split = self.split_if_full(parent)?;
            if !refreshed && split.is_none() {
                break;
            }
            node = parent;
        }

        if let Some((left_key, right_key, right)) = split {
            let old_root = self.root;
            self.nodes
                .push(Node::Internal(vec![(left_key, old_root), (right_key, right)]));
            self.root = self.nodes.len() - 1;
            debug!(height = self.height(), "tree root split");
        }
        Ok(())
    }

    /// Rows satisfying every key, rechecked against the table
    pub fn scan(&self, table: &Table, keys: &[ScanKey], recheck: &Recheck) -> Result<ScanResult> {
        let mut stats = ScanStats::default();
        let mut rows = Vec::new();
        self.search(keys, &mut stats, |_, row, lossy| {
            if lossy && !matches_all(recheck, table.get(row), keys)? {
                return Ok(());
            }
            rows.push(row);
            Ok(())
        })?;
        rows.sort_unstable();
        stats.matches = rows.len();
        debug!(?stats, "tree scan finished");
        Ok(ScanResult { rows, stats })
    }

    /// Like `scan`, but answers from the stored keys alone
    pub fn index_only_scan(
        &self,
        keys: &[ScanKey],
        recheck: &Recheck,
    ) -> Result<Vec<(RowId, Key)>> {
        let mut stats = ScanStats::default();
        let mut found = Vec::new();
        self.search(keys, &mut stats, |entry, row, lossy| {
            let fetched = self.adapter.fetch(&self.adapter.decompress(entry.clone()));
            if lossy && !matches_all(recheck, Some(&fetched.key), keys)? {
                return Ok(());
            }
            found.push((row, fetched.key));
            Ok(())
        })?;
        found.sort_unstable_by_key(|(row, _)| *row);
        Ok(found)
    }

    /// Walk every subtree the adapter cannot exclude and hand each
    /// consistent leaf entry to `visit` with its recheck flag
    fn search<F>(&self, keys: &[ScanKey], stats: &mut ScanStats, mut visit: F) -> Result<()>
    where
        F: FnMut(&TreeEntry, RowId, bool) -> Result<()>,
    {
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            stats.entries_visited += 1;
            match &self.nodes[node] {
                Node::Internal(children) => {
                    for (entry, child) in children {
                        if self.consistent_all(entry, keys)?.is_some() {
                            stack.push(*child);
                        }
                    }
                }
                Node::Leaf(entries) => {
                    for (entry, row) in entries {
                        if let Some(lossy) = self.consistent_all(entry, keys)? {
                            stats.candidates += 1;
                            if lossy {
                                stats.rechecked += 1;
                            }
                            visit(entry, *row, lossy)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// `Some(recheck)` when the entry is consistent with every key
    fn consistent_all(&self, entry: &TreeEntry, keys: &[ScanKey]) -> Result<Option<bool>> {
        let mut recheck = false;
        for key in keys {
            let ctx = self.ctx.with_strategy(key.strategy);
            let decision = self
                .adapter
                .consistent(entry, key, &ctx)
                .with_context(|| format!("tree consistent for {:?}", key))?;
            if !decision.result {
                return Ok(None);
            }
            recheck |= decision.recheck;
        }
        Ok(Some(recheck))
    }

    fn choose_subtree(&self, children: &[(TreeEntry, NodeId)], entry: &TreeEntry) -> Result<usize> {
        children
            .iter()
            .enumerate()
            .map(|(pos, (downlink, _))| (pos, self.adapter.penalty(downlink, entry)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(pos, _)| pos)
            .context("internal node has no children")
    }

    /// Recompute the downlink key for `child`. Returns true if it changed.
    fn refresh_downlink(&mut self, parent: NodeId, pos: usize, child: NodeId) -> bool {
        let Some(key) = self.adapter.union(&self.nodes[child].entries(), &self.ctx) else {
            return false;
        };
        let updated = TreeEntry::internal(key);
        let Node::Internal(children) = &mut self.nodes[parent] else {
            return false;
        };
        if self.adapter.same(&children[pos].0, &updated, &self.ctx) {
            return false;
        }
        trace!(old = %children[pos].0.key, new = %updated.key, "refreshing downlink");
        children[pos].0 = updated;
        true
    }

    /// Split `node` if it overflowed. Returns the downlinks for both halves
    /// and the id of the new right node.
    fn split_if_full(&mut self, node: NodeId) -> Result<Option<(TreeEntry, TreeEntry, NodeId)>> {
        let len = self.nodes[node].len();
        if len <= self.capacity {
            return Ok(None);
        }

        let split = self.adapter.picksplit(&self.nodes[node].entries());
        let (Some(left_key), Some(right_key)) = (split.left_key, split.right_key) else {
            bail!("picksplit left one side empty for {} entries", len);
        };
        let right = self.nodes[node].split_off(&split.left, &split.right);
        self.nodes.push(right);
        trace!(
            left = split.left.len(),
            right = split.right.len(),
            "split tree node"
        );
        Ok(Some((
            TreeEntry::internal(left_key),
            TreeEntry::internal(right_key),
            self.nodes.len() - 1,
        )))
    }

    #[cfg(test)]
    fn leaf_depths(&self) -> Vec<usize> {
        let mut depths = Vec::new();
        let mut stack = vec![(self.root, 1)];
        while let Some((node, depth)) = stack.pop() {
            match &self.nodes[node] {
                Node::Leaf(_) => depths.push(depth),
                Node::Internal(children) => {
                    stack.extend(children.iter().map(|&(_, c)| (c, depth + 1)));
                }
            }
        }
        depths
    }
}
