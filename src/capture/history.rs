use anyhow::{bail, Result};

use crate::models::CaptureState;

pub const DEFAULT_KEEP_IMAGES: usize = 3;

/// Append-only record of the states captured during one run.
///
/// Entries are never removed or reordered; pruning only releases the image
/// payload of older entries so long runs keep a bounded amount of pixel data.
#[derive(Debug, Default)]
pub struct HistoryBuffer {
    entries: Vec<CaptureState>,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a state. Iteration indices must be strictly increasing.
    pub fn push(&mut self, state: CaptureState) -> Result<()> {
        if let Some(last) = self.entries.last() {
            if state.iteration <= last.iteration {
                bail!(
                    "iteration {} appended after iteration {}",
                    state.iteration,
                    last.iteration
                );
            }
        }
        self.entries.push(state);
        Ok(())
    }

    /// Release images of everything but the newest `keep_last` entries.
    /// A `keep_last` of zero is treated as one. Returns how many images were freed.
    pub fn prune_images(&mut self, keep_last: usize) -> usize {
        let keep_last = keep_last.max(1);
        if self.entries.len() <= keep_last {
            return 0;
        }

        let cutoff = self.entries.len() - keep_last;
        let mut released = 0;
        for state in &mut self.entries[..cutoff] {
            if state.image.take().is_some() {
                released += 1;
            }
        }
        released
    }

    pub fn last(&self) -> Option<&CaptureState> {
        self.entries.last()
    }

    pub fn entries(&self) -> &[CaptureState] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn retained_images(&self) -> usize {
        self.entries.iter().filter(|state| state.has_image()).count()
    }

    pub fn take_entries(&mut self) -> Vec<CaptureState> {
        std::mem::take(&mut self.entries)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
