/// Target registry - arena of every live render target
///
/// Targets are stored in a SlotMap for O(1) insert/remove with stable keys,
/// and chained into a doubly-linked list (insertion at tail, removal from
/// anywhere) through their `prev`/`next` fields. The registry also owns the
/// scheduler's stereo scratch slot used to duplicate the left eye.

use slotmap::SlotMap;
use crate::error::{Error, Result};
use super::render_target::{QueueNode, RenderTarget, TargetKey};

/// Registry of live render targets
pub struct TargetRegistry {
    targets: SlotMap<TargetKey, RenderTarget>,
    head: Option<TargetKey>,
    tail: Option<TargetKey>,
    stereo_scratch: RenderTarget,
    capacity: usize,
}

impl TargetRegistry {
    /// Create an empty registry holding at most `capacity` targets
    pub fn new(capacity: usize) -> Self {
        Self {
            targets: SlotMap::with_capacity_and_key(capacity),
            head: None,
            tail: None,
            stereo_scratch: RenderTarget::scratch(),
            capacity,
        }
    }

    /// Link a new target at the tail of the list
    ///
    /// # Errors
    ///
    /// `Error::OutOfMemory` when the registry is full.
    pub fn insert(&mut self, mut target: RenderTarget) -> Result<TargetKey> {
        if self.targets.len() >= self.capacity {
            crate::pica_warn!("pica::TargetRegistry",
                "Registry full ({} targets)", self.capacity);
            return Err(Error::OutOfMemory);
        }

        target.prev = self.tail;
        target.next = None;
        let key = self.targets.insert(target);
        match self.tail.and_then(|tail| self.targets.get_mut(tail)) {
            Some(tail) => tail.next = Some(key),
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        Ok(key)
    }

    /// Unlink a target from the list and take it out of the arena
    pub fn remove(&mut self, key: TargetKey) -> Option<RenderTarget> {
        let target = self.targets.remove(key)?;

        match target.prev.and_then(|prev| self.targets.get_mut(prev)) {
            Some(prev) => prev.next = target.next,
            None => self.head = target.next,
        }
        match target.next.and_then(|next| self.targets.get_mut(next)) {
            Some(next) => next.prev = target.prev,
            None => self.tail = target.prev,
        }
        Some(target)
    }

    pub fn get(&self, key: TargetKey) -> Option<&RenderTarget> {
        self.targets.get(key)
    }

    pub fn get_mut(&mut self, key: TargetKey) -> Option<&mut RenderTarget> {
        self.targets.get_mut(key)
    }

    /// Resolve a pending queue node
    pub fn node(&self, node: QueueNode) -> Option<&RenderTarget> {
        match node {
            QueueNode::Target(key) => self.targets.get(key),
            QueueNode::StereoScratch => Some(&self.stereo_scratch),
        }
    }

    /// Resolve a pending queue node mutably
    pub fn node_mut(&mut self, node: QueueNode) -> Option<&mut RenderTarget> {
        match node {
            QueueNode::Target(key) => self.targets.get_mut(key),
            QueueNode::StereoScratch => Some(&mut self.stereo_scratch),
        }
    }

    pub fn stereo_scratch(&self) -> &RenderTarget {
        &self.stereo_scratch
    }

    pub fn contains(&self, key: TargetKey) -> bool {
        self.targets.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn head(&self) -> Option<TargetKey> {
        self.head
    }

    pub fn tail(&self) -> Option<TargetKey> {
        self.tail
    }

    /// Keys in list order (oldest first)
    pub fn keys(&self) -> impl Iterator<Item = TargetKey> + '_ {
        std::iter::successors(self.head, move |key| {
            self.targets.get(*key).and_then(|t| t.next)
        })
        .take(self.targets.len())
    }

    /// Check the list invariants
    ///
    /// head.prev and tail.next are empty, every link is mirrored by its
    /// neighbour, and a traversal from head visits every live target once.
    pub fn validate(&self) -> Result<()> {
        let broken = |what: String| Err(Error::InvalidState(format!("registry: {}", what)));

        if let Some(head) = self.head {
            match self.targets.get(head) {
                Some(t) if t.prev.is_none() => {}
                _ => return broken("head has a predecessor or is stale".to_string()),
            }
        }
        if let Some(tail) = self.tail {
            match self.targets.get(tail) {
                Some(t) if t.next.is_none() => {}
                _ => return broken("tail has a successor or is stale".to_string()),
            }
        }

        let mut count = 0;
        let mut prev = None;
        let mut cursor = self.head;
        while let Some(key) = cursor {
            let Some(target) = self.targets.get(key) else {
                return broken(format!("dangling link after {} targets", count));
            };
            if target.prev != prev {
                return broken(format!("back link mismatch at position {}", count));
            }
            count += 1;
            if count > self.targets.len() {
                return broken("cycle in target list".to_string());
            }
            prev = Some(key);
            cursor = target.next;
        }

        if prev != self.tail {
            return broken("traversal does not end at tail".to_string());
        }
        if count != self.targets.len() {
            return broken(format!("{} linked, {} live", count, self.targets.len()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "target_registry_tests.rs"]
mod tests;
