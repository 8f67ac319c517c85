use crate::field::Mask;

/// Per-batch change statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ChangeStats {
    /// Pixels that flipped class in this batch.
    pub changed: usize,
    /// Flipped pixels that had never flipped before in this run.
    pub novel: usize,
    /// Foreground area of the new mask.
    pub area: usize,
}

impl ChangeStats {
    /// `changed / area * 100`; a collapsed mask counts as fully changed.
    pub fn percent_diff(&self) -> f64 {
        if self.area == 0 {
            if self.changed == 0 {
                0.0
            } else {
                100.0
            }
        } else {
            self.changed as f64 / self.area as f64 * 100.0
        }
    }

    /// Share of this batch's flips that are new, in percent.
    pub fn percent_new_diff(&self) -> f64 {
        self.novel as f64 / (self.changed as f64 + f64::EPSILON) * 100.0
    }
}

/// Cumulative per-pixel flip counter for one run of the controller.
#[derive(Debug, Clone)]
pub(crate) struct ChangeTracker {
    counts: Vec<u32>,
}

impl ChangeTracker {
    pub fn new(len: usize) -> Self {
        Self {
            counts: vec![0; len],
        }
    }

    pub fn update(&mut self, previous: &Mask, current: &Mask) -> ChangeStats {
        let mut changed = 0;
        let mut novel = 0;
        let mut area = 0;
        for ((count, &p), &c) in self
            .counts
            .iter_mut()
            .zip(previous.as_slice())
            .zip(current.as_slice())
        {
            if c {
                area += 1;
            }
            if p != c {
                *count = count.saturating_add(1);
                changed += 1;
                if *count == 1 {
                    novel += 1;
                }
            }
        }
        ChangeStats {
            changed,
            novel,
            area,
        }
    }
}
