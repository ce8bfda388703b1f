//! Label minting.

/// Hands out fresh trajectory labels.
///
/// Labels are issued in increasing order from a start value; `generation`
/// counts how many have been issued so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelArena {
    next: i64,
    generation: u64,
}

impl LabelArena {
    /// Arena whose first label is `start`.
    pub fn new(start: i64) -> Self {
        Self {
            next: start,
            generation: 0,
        }
    }

    /// Arena whose labels never collide with `labels`.
    pub fn after(labels: &[i64]) -> Self {
        let start = labels.iter().max().map_or(0, |max| max + 1);
        Self::new(start)
    }

    /// Issue a new label.
    pub fn fresh(&mut self) -> i64 {
        let label = self.next;
        self.next += 1;
        self.generation += 1;
        label
    }

    /// Number of labels issued so far.
    pub fn issued(&self) -> u64 {
        self.generation
    }
}

impl Default for LabelArena {
    fn default() -> Self {
        Self::new(0)
    }
}
