// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Deferred release of resources that may still be in use by the GPU.
//!
//! Every frame gets a [`FrameToken`]. Resources retired during a frame are pushed
//! into a [`RetirementQueue`] tagged with that token. When the host learns that the
//! GPU finished a frame (fence, timeline semaphore...), it reports the token through
//! a [`CompletionSignal`]. [`RetirementQueue::sweep`] then hands back every entry
//! whose token has completed, so it can be freed or recycled.
//!
//! Frames complete in submission order, so a single "last completed" watermark is
//! enough to decide readiness.

use flume::{Receiver, Sender};
use std::collections::VecDeque;

/// Identifies a submitted frame. Tokens increase monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FrameToken(pub u64);

impl FrameToken {
    /// The token following this one.
    #[inline]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// A cloneable handle used to report GPU frame completion.
///
/// It can be moved to whichever thread observes the GPU fences.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    sender: Sender<FrameToken>,
}

impl CompletionSignal {
    /// Reports that every GPU command of `token` (and earlier frames) has completed.
    pub fn signal(&self, token: FrameToken) {
        if self.sender.send(token).is_err() {
            log::trace!("Completion of {:?} reported after the queue was dropped", token);
        }
    }
}

/// A FIFO of resources waiting for their frame to complete.
#[derive(Debug)]
pub struct RetirementQueue<T> {
    pending: VecDeque<(FrameToken, T)>,
    sender: Sender<FrameToken>,
    receiver: Receiver<FrameToken>,
    last_completed: Option<FrameToken>,
}

impl<T> Default for RetirementQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RetirementQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self {
            pending: VecDeque::new(),
            sender,
            receiver,
            last_completed: None,
        }
    }

    /// Returns a handle reporting completions into this queue.
    pub fn completion_signal(&self) -> CompletionSignal {
        CompletionSignal {
            sender: self.sender.clone(),
        }
    }

    /// Hands `item` over to the queue until `token` completes.
    pub fn push(&mut self, token: FrameToken, item: T) {
        debug_assert!(
            self.pending.back().map_or(true, |(last, _)| *last <= token),
            "retired resources must be pushed in frame order"
        );
        self.pending.push_back((token, item));
    }

    /// The newest completed frame observed so far.
    pub fn last_completed(&self) -> Option<FrameToken> {
        self.last_completed
    }

    /// Number of entries still waiting.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drains reported completions and returns every entry whose frame completed.
    pub fn sweep(&mut self) -> Vec<T> {
        for token in self.receiver.try_iter() {
            self.last_completed = Some(self.last_completed.map_or(token, |last| last.max(token)));
        }

        let Some(completed) = self.last_completed else {
            return Vec::new();
        };

        let mut ready = Vec::new();
        while self.pending.front().is_some_and(|(token, _)| *token <= completed) {
            if let Some((_, item)) = self.pending.pop_front() {
                ready.push(item);
            }
        }
        ready
    }

    /// Returns every entry regardless of completion. Only valid once the device is idle.
    pub fn drain_all(&mut self) -> Vec<T> {
        self.pending.drain(..).map(|(_, item)| item).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_without_completion_releases_nothing() {
        let mut queue = RetirementQueue::new();
        queue.push(FrameToken(1), "a");
        assert!(queue.sweep().is_empty());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_sweep_releases_up_to_watermark() {
        let mut queue = RetirementQueue::new();
        let signal = queue.completion_signal();
        queue.push(FrameToken(1), 1);
        queue.push(FrameToken(2), 2);
        queue.push(FrameToken(3), 3);

        signal.signal(FrameToken(2));
        assert_eq!(queue.sweep(), vec![1, 2]);
        assert_eq!(queue.last_completed(), Some(FrameToken(2)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_out_of_order_signals_keep_highest_token() {
        let mut queue = RetirementQueue::new();
        let signal = queue.completion_signal();
        queue.push(FrameToken(4), ());
        signal.signal(FrameToken(5));
        signal.signal(FrameToken(3));
        assert_eq!(queue.sweep().len(), 1);
        assert_eq!(queue.last_completed(), Some(FrameToken(5)));
    }

    #[test]
    fn test_signal_from_another_thread() {
        let mut queue = RetirementQueue::new();
        let signal = queue.completion_signal();
        queue.push(FrameToken(1), 10u32);
        std::thread::spawn(move || signal.signal(FrameToken(1)))
            .join()
            .unwrap();
        assert_eq!(queue.sweep(), vec![10]);
    }

    #[test]
    fn test_drain_all() {
        let mut queue = RetirementQueue::new();
        queue.push(FrameToken(9), 'x');
        assert_eq!(queue.drain_all(), vec!['x']);
        assert!(queue.is_empty());
    }
}
