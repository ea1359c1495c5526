//! Span tree assembly for flow -> task -> subtask hierarchies.
//!
//! Records arrive flat (in start order) from a tracer; the tree nests each
//! record under its parent and keeps siblings in start order.

use std::collections::HashMap;

use uuid::Uuid;

use crate::span::{ExecutionSpan, SpanStatus};

/// A nested view over the spans of one trace.
#[derive(Debug, Clone, Default)]
pub struct SpanTree {
    roots: Vec<ExecutionSpan>,
}

impl SpanTree {
    /// Nest flat records by `parent_span_id`.
    ///
    /// A record whose parent is not among the records becomes a root.
    pub fn from_records(mut records: Vec<ExecutionSpan>) -> Self {
        records.sort_by_key(|s| s.started_at);

        let known: Vec<Uuid> = records.iter().map(|s| s.span_id).collect();
        let mut by_parent: HashMap<Uuid, Vec<ExecutionSpan>> = HashMap::new();
        let mut roots = Vec::new();

        for record in records {
            match record.parent_span_id {
                Some(parent) if known.contains(&parent) => {
                    by_parent.entry(parent).or_default().push(record)
                }
                _ => roots.push(record),
            }
        }

        for root in &mut roots {
            attach_children(root, &mut by_parent);
        }

        Self { roots }
    }

    pub fn roots(&self) -> &[ExecutionSpan] {
        &self.roots
    }

    /// Total number of spans in the tree.
    pub fn len(&self) -> usize {
        fn count(span: &ExecutionSpan) -> usize {
            1 + span.children.iter().map(count).sum::<usize>()
        }
        self.roots.iter().map(count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// True when no span in the tree is still running.
    pub fn is_fully_ended(&self) -> bool {
        fn ended(span: &ExecutionSpan) -> bool {
            span.status != SpanStatus::Running && span.children.iter().all(ended)
        }
        self.roots.iter().all(ended)
    }

    /// Depth-first search by span name.
    pub fn find_by_name(&self, name: &str) -> Option<&ExecutionSpan> {
        fn search<'a>(span: &'a ExecutionSpan, name: &str) -> Option<&'a ExecutionSpan> {
            if span.name == name {
                return Some(span);
            }
            span.children.iter().find_map(|c| search(c, name))
        }
        self.roots.iter().find_map(|r| search(r, name))
    }
}

fn attach_children(span: &mut ExecutionSpan, by_parent: &mut HashMap<Uuid, Vec<ExecutionSpan>>) {
    if let Some(mut children) = by_parent.remove(&span.span_id) {
        for child in &mut children {
            attach_children(child, by_parent);
        }
        span.children = children;
    }
}
