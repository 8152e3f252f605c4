//! The four-slot input buffer for the batch being collected.

use serde::{Deserialize, Serialize};

use printqc_core::types::SLOT_COUNT;

/// One fixed input position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub index: usize,
    pub label: String,
    /// `None` while empty, otherwise a normalized numeric string.
    pub value: Option<String>,
}

impl Slot {
    pub fn is_filled(&self) -> bool {
        self.value.is_some()
    }
}

/// Ordered, fixed-size set of slots that is always filled lowest index first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotBuffer {
    slots: [Slot; SLOT_COUNT],
}

impl SlotBuffer {
    /// Create an empty buffer with one label per slot.
    pub fn new(labels: &[String; SLOT_COUNT]) -> Self {
        Self {
            slots: std::array::from_fn(|index| Slot {
                index,
                label: labels[index].clone(),
                value: None,
            }),
        }
    }

    /// Put `value` into the lowest-indexed empty slot.
    ///
    /// Returns the filled index, or `None` without touching anything when the
    /// buffer is already full.
    pub fn fill_next(&mut self, value: impl Into<String>) -> Option<usize> {
        let slot = self.slots.iter_mut().find(|s| s.value.is_none())?;
        slot.value = Some(value.into());
        Some(slot.index)
    }

    /// Empty every slot. Idempotent.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.value = None;
        }
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Slot::is_filled)
    }

    pub fn filled_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_filled()).count()
    }

    /// Index the next fill would target.
    pub fn next_index(&self) -> Option<usize> {
        self.slots.iter().position(|s| !s.is_filled())
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.slots.get(index).map(|s| s.label.as_str())
    }

    /// Copy of all four values, available only once the buffer is complete.
    pub fn values(&self) -> Option<[String; SLOT_COUNT]> {
        if !self.is_complete() {
            return None;
        }
        Some(std::array::from_fn(|i| {
            self.slots[i].value.clone().unwrap_or_default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printqc_core::types::default_labels;

    fn buffer() -> SlotBuffer {
        SlotBuffer::new(&default_labels())
    }

    /// No filled slot may sit after an empty one.
    fn assert_prefix_filled(buf: &SlotBuffer) {
        let filled = buf.filled_count();
        for slot in buf.slots() {
            assert_eq!(slot.is_filled(), slot.index < filled, "slot {}", slot.index);
        }
    }

    #[test]
    fn test_new_buffer_is_empty() {
        let buf = buffer();
        assert_eq!(buf.filled_count(), 0);
        assert!(!buf.is_complete());
        assert_eq!(buf.next_index(), Some(0));
        assert_eq!(buf.label(2), Some("Label 3"));
        assert_eq!(buf.label(4), None);
        assert!(buf.values().is_none());
    }

    #[test]
    fn test_fill_next_goes_lowest_index_first() {
        let mut buf = buffer();
        for (expected, value) in ["12", "25.5", "30", "5.2"].iter().enumerate() {
            assert_eq!(buf.fill_next(*value), Some(expected));
            assert_prefix_filled(&buf);
        }
        assert!(buf.is_complete());
        assert_eq!(buf.next_index(), None);
        assert_eq!(
            buf.values().unwrap(),
            ["12".to_string(), "25.5".into(), "30".into(), "5.2".into()]
        );
    }

    #[test]
    fn test_fill_next_on_full_buffer_is_noop() {
        let mut buf = buffer();
        for v in ["1", "2", "3", "4"] {
            buf.fill_next(v);
        }
        let before = buf.clone();
        assert_eq!(buf.fill_next("99"), None);
        assert_eq!(buf.fill_next("100"), None);
        assert_eq!(buf, before);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut buf = buffer();
        buf.fill_next("1");
        buf.fill_next("2");
        buf.reset();
        assert_eq!(buf.filled_count(), 0);
        buf.reset();
        assert_eq!(buf.filled_count(), 0);
        assert_eq!(buf, buffer());
    }

    #[test]
    fn test_labels_survive_reset() {
        let labels = [
            "Length".to_string(),
            "Width".to_string(),
            "Height".to_string(),
            "Weight".to_string(),
        ];
        let mut buf = SlotBuffer::new(&labels);
        buf.fill_next("1");
        buf.reset();
        assert_eq!(buf.label(0), Some("Length"));
        assert_eq!(buf.label(3), Some("Weight"));
    }

    #[test]
    fn test_interleaved_fills_and_resets_keep_prefix_shape() {
        let mut buf = buffer();
        let script = ["1", "2", "reset", "3", "4", "5", "6", "7", "reset", "8"];
        for step in script {
            if step == "reset" {
                buf.reset();
            } else {
                buf.fill_next(step);
            }
            assert_prefix_filled(&buf);
        }
        assert_eq!(buf.filled_count(), 1);
        assert_eq!(buf.slots()[0].value.as_deref(), Some("8"));
    }
}
