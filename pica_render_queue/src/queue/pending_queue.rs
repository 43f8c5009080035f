/// Pending-stage queue - FIFO of targets waiting for a clear or a transfer
///
/// A singly-linked chain through each member's `link` field with only a head
/// pointer. Enqueue walks to the tail: the queue never holds more than one
/// entry per output slot plus the stereo scratch, so the walk stays short.
///
/// The hardware completion signal of a queue can be borrowed by an
/// out-of-band synchronous operation. While borrowed, a newly enqueued head
/// is not started; `release()` hands it back so the caller can start it.

use super::render_target::{QueueNode, Stage};
use super::target_registry::TargetRegistry;
use super::invariant_violation;

/// Clear or transfer queue
#[derive(Debug)]
pub struct PendingQueue {
    stage: Stage,
    head: Option<QueueNode>,
    borrowed: bool,
}

impl PendingQueue {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            head: None,
            borrowed: false,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Entry whose operation is running (or waiting for the borrow to end)
    pub fn head(&self) -> Option<QueueNode> {
        self.head
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Whether an out-of-band operation owns the completion signal
    pub fn is_borrowed(&self) -> bool {
        self.borrowed
    }

    /// Append `node`
    ///
    /// Returns `true` when the node became the head and its operation must be
    /// started now by the caller.
    pub fn enqueue(&mut self, registry: &mut TargetRegistry, node: QueueNode) -> bool {
        let Some(target) = registry.node_mut(node) else {
            invariant_violation("pica::PendingQueue", format!("enqueue of stale node {:?}", node));
        };
        if let Some(stage) = target.stage {
            invariant_violation("pica::PendingQueue",
                format!("{:?} enqueued for {:?} while in {:?} queue", node, self.stage, stage));
        }
        target.link = None;
        target.stage = Some(self.stage);

        let Some(mut cursor) = self.head else {
            self.head = Some(node);
            return !self.borrowed;
        };
        while let Some(next) = registry.node(cursor).and_then(|t| t.link) {
            cursor = next;
        }
        match registry.node_mut(cursor) {
            Some(tail) => tail.link = Some(node),
            None => invariant_violation("pica::PendingQueue",
                format!("{:?} queue chain broken at {:?}", self.stage, cursor)),
        }
        false
    }

    /// Detach the head entry
    pub fn pop(&mut self, registry: &mut TargetRegistry) -> Option<QueueNode> {
        let node = self.head?;
        let target = registry.node_mut(node)?;
        self.head = target.link.take();
        target.stage = None;
        Some(node)
    }

    /// Members from head to tail
    pub fn members(&self, registry: &TargetRegistry) -> Vec<QueueNode> {
        std::iter::successors(self.head, |node| registry.node(*node).and_then(|t| t.link))
            .collect()
    }

    pub fn len(&self, registry: &TargetRegistry) -> usize {
        self.members(registry).len()
    }

    pub fn contains(&self, registry: &TargetRegistry, node: QueueNode) -> bool {
        self.members(registry).contains(&node)
    }

    /// Take the completion signal for an out-of-band operation
    pub fn borrow_signal(&mut self) {
        debug_assert!(!self.borrowed, "completion signal borrowed twice");
        self.borrowed = true;
    }

    /// Give the completion signal back
    ///
    /// Returns the head queued during the borrow, which the caller must start.
    pub fn release_signal(&mut self) -> Option<QueueNode> {
        self.borrowed = false;
        self.head
    }
}

#[cfg(test)]
#[path = "pending_queue_tests.rs"]
mod tests;
