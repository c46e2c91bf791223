//! Projection of the completed count into per-unit slots.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Complete,
    Incomplete,
}

/// One slot per unit of the daily goal; slot `i` is complete iff `i < completed`.
pub fn progress_slots(completed: u32, total: u32) -> Vec<Slot> {
    (0..total)
        .map(|i| {
            if i < completed {
                Slot::Complete
            } else {
                Slot::Incomplete
            }
        })
        .collect()
}

/// Render slots as rows of `●`/`○`, `per_row` to a line.
pub fn render_slots(slots: &[Slot], per_row: usize) -> String {
    slots
        .chunks(per_row.max(1))
        .map(|row| {
            row.iter()
                .map(|slot| match slot {
                    Slot::Complete => "●",
                    Slot::Incomplete => "○",
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
