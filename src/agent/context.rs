//! Conversation window management
//!
//! Holds the rolling window with a capacity derived from how complex the
//! recent conversation looks. Messages that fall out of the window are
//! buffered so they can be condensed into short summaries.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use crate::core::config::ContextConfig;
use crate::core::{Message, Role};

/// Terms that make a conversation count as technical
const TECHNICAL_TERMS: &[&str] = &[
    "architecture",
    "algorithm",
    "implementation",
    "vulnerability",
    "infrastructure",
];

/// Upper bound of the complexity estimate
pub const MAX_COMPLEXITY: f64 = 3.0;

/// Summaries kept as the "earlier context" preface
const KEPT_SUMMARIES: usize = 3;

/// Manages the conversation window
#[derive(Debug, Clone)]
pub struct ContextManager {
    window: VecDeque<Message>,
    capacity: usize,
    min_capacity: usize,
    max_capacity: usize,
    sample: usize,
    summary_trigger: usize,
    next_seq: u64,
    evicted: Vec<Message>,
    summaries: VecDeque<String>,
}

impl ContextManager {
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            window: VecDeque::new(),
            capacity: config.min_capacity,
            min_capacity: config.min_capacity,
            max_capacity: config.max_capacity,
            sample: config.complexity_sample.max(1),
            summary_trigger: config.summary_trigger.max(1),
            next_seq: 1,
            evicted: Vec::new(),
            summaries: VecDeque::new(),
        }
    }

    /// Append a message, assigning its sequence number and evicting the
    /// oldest messages beyond capacity
    pub fn append(&mut self, mut message: Message) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        message.seq = seq;
        self.window.push_back(message);

        while self.window.len() > self.capacity {
            if let Some(old) = self.window.pop_front() {
                debug!(seq = old.seq, capacity = self.capacity, "evicting message");
                self.evicted.push(old);
            }
        }
        seq
    }

    /// Snapshot of the stored window, oldest first
    pub fn current_window(&self) -> Vec<Message> {
        self.window.iter().cloned().collect()
    }

    /// Complexity of the last few messages, in `[1.0, 3.0]`
    ///
    /// Long messages, technical vocabulary, several distinct speakers and
    /// tool output each push the estimate up.
    pub fn complexity(&self) -> f64 {
        if self.window.is_empty() {
            return 1.0;
        }
        let recent: Vec<&Message> = self.window.iter().rev().take(self.sample).collect();

        let technical = recent
            .iter()
            .filter(|m| {
                let lower = m.content.to_lowercase();
                TECHNICAL_TERMS.iter().any(|t| lower.contains(t))
            })
            .count();
        let avg_len = recent.iter().map(|m| m.content.len()).sum::<usize>() as f64 / recent.len() as f64;
        let speakers: HashSet<Option<&str>> = recent
            .iter()
            .filter(|m| m.role != Role::ToolResult)
            .map(|m| m.agent.as_ref().map(|a| a.as_str()))
            .collect();
        let tool_output = if recent.iter().any(|m| m.role == Role::ToolResult) {
            0.3
        } else {
            0.0
        };

        let complexity = 1.0 + technical as f64 * 0.2 + avg_len / 500.0 + speakers.len() as f64 * 0.1 + tool_output;
        complexity.min(MAX_COMPLEXITY)
    }

    /// Capacity for a complexity value, monotonic and within the configured range
    pub fn capacity_for(&self, complexity: f64) -> usize {
        let scaled = (self.min_capacity as f64 * complexity).floor() as usize;
        scaled.clamp(self.min_capacity, self.max_capacity)
    }

    /// Recompute capacity for the next append cycle; stored messages are untouched
    pub fn resize(&mut self) -> usize {
        let complexity = self.complexity();
        let capacity = self.capacity_for(complexity);
        if capacity != self.capacity {
            debug!(from = self.capacity, to = capacity, complexity, "window resized");
        }
        self.capacity = capacity;
        capacity
    }

    /// Take the evicted messages once enough have accumulated for a summary
    pub fn take_summary_batch(&mut self) -> Option<Vec<Message>> {
        if self.evicted.len() < self.summary_trigger {
            return None;
        }
        Some(std::mem::take(&mut self.evicted))
    }

    pub fn add_summary(&mut self, summary: impl Into<String>) {
        self.summaries.push_back(summary.into());
        while self.summaries.len() > KEPT_SUMMARIES {
            self.summaries.pop_front();
        }
    }

    pub fn summaries(&self) -> Vec<String> {
        self.summaries.iter().cloned().collect()
    }

    /// Clear the window, summaries and eviction buffer and return to the minimum capacity
    ///
    /// Sequence numbers keep increasing across resets.
    pub fn reset(&mut self) {
        self.window.clear();
        self.evicted.clear();
        self.summaries.clear();
        self.capacity = self.min_capacity;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new(&ContextConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AgentId;

    #[test]
    fn test_append_assigns_increasing_seq() {
        let mut ctx = ContextManager::default();
        let a = ctx.append(Message::user("one"));
        let b = ctx.append(Message::user("two"));
        assert!(b > a);
    }

    #[test]
    fn test_eviction_is_fifo() {
        let mut ctx = ContextManager::default();
        for i in 0..12 {
            ctx.append(Message::user(format!("message {}", i)));
        }
        assert_eq!(ctx.len(), ctx.capacity());
        let seqs: Vec<u64> = ctx.current_window().iter().map(|m| m.seq).collect();
        assert_eq!(seqs, vec![8, 9, 10, 11, 12]);
    }

    #[test]
    fn test_resize_does_not_touch_messages() {
        let mut ctx = ContextManager::default();
        for _ in 0..5 {
            ctx.append(Message::agent(AgentId::new("rick"), "x".repeat(900)));
        }
        ctx.append(Message::agent(AgentId::new("judy"), "the infrastructure architecture is wrong"));
        let before = ctx.len();
        let capacity = ctx.resize();
        assert!(capacity > 5);
        assert_eq!(ctx.len(), before);
    }

    #[test]
    fn test_capacity_mapping_is_monotonic_and_bounded() {
        let ctx = ContextManager::default();
        let mut last = 0;
        for step in 0..=40 {
            let capacity = ctx.capacity_for(1.0 + step as f64 * 0.05);
            assert!((5..=15).contains(&capacity));
            assert!(capacity >= last);
            last = capacity;
        }
        assert_eq!(ctx.capacity_for(MAX_COMPLEXITY), 15);
    }

    #[test]
    fn test_shrinking_capacity_evicts_on_next_append() {
        let mut ctx = ContextManager::default();
        for _ in 0..5 {
            ctx.append(Message::user("y".repeat(1500)));
        }
        ctx.resize();
        for _ in 0..10 {
            ctx.append(Message::user("y".repeat(1500)));
        }
        assert!(ctx.len() > 5);
        // Short messages lower the complexity again
        for _ in 0..5 {
            ctx.append(Message::user("ok"));
        }
        ctx.resize();
        let capacity = ctx.capacity();
        ctx.append(Message::user("next"));
        assert_eq!(ctx.len(), capacity);
    }

    #[test]
    fn test_summary_batch_after_trigger() {
        let mut ctx = ContextManager::default();
        for i in 0..14 {
            ctx.append(Message::user(format!("m{}", i)));
        }
        assert!(ctx.take_summary_batch().is_none());
        ctx.append(Message::user("m14"));
        let batch = ctx.take_summary_batch().unwrap();
        assert_eq!(batch.len(), 10);
        assert_eq!(batch[0].seq, 1);
    }

    #[test]
    fn test_reset_restores_minimum() {
        let mut ctx = ContextManager::default();
        for _ in 0..8 {
            ctx.append(Message::user("z".repeat(2000)));
        }
        ctx.resize();
        ctx.add_summary("earlier");
        ctx.reset();
        assert_eq!(ctx.len(), 0);
        assert_eq!(ctx.capacity(), 5);
        assert!(ctx.summaries().is_empty());
        assert!(ctx.append(Message::user("after")) > 8);
    }
}
