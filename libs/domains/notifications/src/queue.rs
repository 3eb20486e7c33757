//! In-memory priority queue of dispatch jobs.

use crate::models::{DispatchJob, EmailPriority, JobId};
use std::collections::VecDeque;

/// Three FIFO lanes drained strictly high, normal, low.
#[derive(Debug, Default)]
pub struct DispatchQueue {
    high: VecDeque<DispatchJob>,
    normal: VecDeque<DispatchJob>,
    low: VecDeque<DispatchJob>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lane_mut(&mut self, priority: EmailPriority) -> &mut VecDeque<DispatchJob> {
        match priority {
            EmailPriority::High => &mut self.high,
            EmailPriority::Normal => &mut self.normal,
            EmailPriority::Low => &mut self.low,
        }
    }

    fn lanes(&self) -> impl Iterator<Item = &DispatchJob> {
        self.high.iter().chain(self.normal.iter()).chain(self.low.iter())
    }

    pub fn enqueue(&mut self, job: DispatchJob) {
        self.lane_mut(job.message.priority).push_back(job);
    }

    pub fn dequeue_next(&mut self) -> Option<DispatchJob> {
        self.high
            .pop_front()
            .or_else(|| self.normal.pop_front())
            .or_else(|| self.low.pop_front())
    }

    /// Take a job out before the drain reaches it.
    pub fn remove(&mut self, id: JobId) -> Option<DispatchJob> {
        for lane in [&mut self.high, &mut self.normal, &mut self.low] {
            if let Some(position) = lane.iter().position(|job| job.id == id) {
                return lane.remove(position);
            }
        }
        None
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.lanes().any(|job| job.id == id)
    }

    /// Job ids in the order they would be dispatched.
    pub fn pending_ids(&self) -> Vec<JobId> {
        self.lanes().map(|job| job.id).collect()
    }

    pub fn len(&self) -> usize {
        self.high.len() + self.normal.len() + self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
