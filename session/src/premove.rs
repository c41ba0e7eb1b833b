//! Premove queue and the two-click selection gesture.
//!
//! The selection is an explicit state machine (`Idle` / `Selected`) so a
//! half-finished gesture is representable without nullable fields.

use cozy_chess::Square;
use smallvec::SmallVec;

/// A tentative move committed while waiting for the opponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PremoveEntry {
    pub from: Square,
    pub to: Square,
}

/// First-click state of the gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Idle,
    Selected(Square),
}

/// What a click did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureOutcome {
    /// First square of a gesture accepted.
    Selected(Square),
    /// A complete premove was queued.
    Queued(PremoveEntry),
    /// The gesture did not form a queueable move; selection cleared.
    Dropped,
    /// Click was not applicable (not premove context, or empty square).
    Ignored,
}

/// FIFO queue of premoves, mutated only through enqueue/dequeue here.
#[derive(Debug)]
pub struct PremoveQueue {
    selection: Selection,
    entries: SmallVec<[PremoveEntry; 4]>,
}

impl PremoveQueue {
    pub fn new() -> Self {
        Self {
            selection: Selection::Idle,
            entries: SmallVec::new(),
        }
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Advance the gesture with a click. `owns` reports whether a square
    /// holds one of the user's pieces; `is_legal` checks the candidate
    /// against the current actual position.
    pub fn click<O, L>(&mut self, square: Square, owns: O, is_legal: L) -> GestureOutcome
    where
        O: Fn(Square) -> bool,
        L: Fn(PremoveEntry) -> bool,
    {
        match self.selection {
            Selection::Idle => {
                if owns(square) {
                    self.selection = Selection::Selected(square);
                    GestureOutcome::Selected(square)
                } else {
                    GestureOutcome::Ignored
                }
            }
            Selection::Selected(from) => {
                self.selection = Selection::Idle;
                if from == square {
                    return GestureOutcome::Dropped;
                }
                let entry = PremoveEntry { from, to: square };
                if is_legal(entry) {
                    self.entries.push(entry);
                    GestureOutcome::Queued(entry)
                } else {
                    GestureOutcome::Dropped
                }
            }
        }
    }

    /// Cancel gesture: clears the pending selection and the whole queue.
    pub fn cancel(&mut self) {
        self.selection = Selection::Idle;
        self.entries.clear();
    }

    /// Pop the oldest entry for replay. Each entry is consumed exactly once.
    pub fn pop(&mut self) -> Option<PremoveEntry> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PremoveQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::parse_square;

    fn sq(name: &str) -> Square {
        parse_square(name).unwrap()
    }

    #[test]
    fn test_click_empty_square_is_ignored() {
        let mut q = PremoveQueue::new();
        let outcome = q.click(sq("e4"), |_| false, |_| true);
        assert_eq!(outcome, GestureOutcome::Ignored);
        assert_eq!(q.selection(), Selection::Idle);
    }

    #[test]
    fn test_two_clicks_queue_a_legal_move() {
        let mut q = PremoveQueue::new();
        assert_eq!(
            q.click(sq("g1"), |_| true, |_| true),
            GestureOutcome::Selected(sq("g1"))
        );
        let outcome = q.click(sq("f3"), |_| true, |_| true);
        assert_eq!(
            outcome,
            GestureOutcome::Queued(PremoveEntry {
                from: sq("g1"),
                to: sq("f3"),
            })
        );
        assert_eq!(q.len(), 1);
        assert_eq!(q.selection(), Selection::Idle);
    }

    #[test]
    fn test_illegal_second_click_drops_selection() {
        let mut q = PremoveQueue::new();
        q.click(sq("g1"), |_| true, |_| false);
        let outcome = q.click(sq("g3"), |_| true, |_| false);
        assert_eq!(outcome, GestureOutcome::Dropped);
        assert!(q.is_empty());
        assert_eq!(q.selection(), Selection::Idle);
    }

    #[test]
    fn test_clicking_same_square_deselects() {
        let mut q = PremoveQueue::new();
        q.click(sq("g1"), |_| true, |_| true);
        assert_eq!(q.click(sq("g1"), |_| true, |_| true), GestureOutcome::Dropped);
        assert!(q.is_empty());
    }

    #[test]
    fn test_cancel_clears_selection_and_queue() {
        let mut q = PremoveQueue::new();
        q.click(sq("g1"), |_| true, |_| true);
        q.click(sq("f3"), |_| true, |_| true);
        q.click(sq("e2"), |_| true, |_| true);
        assert_eq!(q.len(), 1);
        assert_eq!(q.selection(), Selection::Selected(sq("e2")));

        q.cancel();
        assert!(q.is_empty());
        assert_eq!(q.selection(), Selection::Idle);
    }

    #[test]
    fn test_pop_is_fifo_and_consumes() {
        let mut q = PremoveQueue::new();
        q.click(sq("g1"), |_| true, |_| true);
        q.click(sq("f3"), |_| true, |_| true);
        q.click(sq("e2"), |_| true, |_| true);
        q.click(sq("e4"), |_| true, |_| true);

        let first = q.pop().unwrap();
        assert_eq!(first.from, sq("g1"));
        let second = q.pop().unwrap();
        assert_eq!(second.from, sq("e2"));
        assert!(q.pop().is_none());
    }
}
