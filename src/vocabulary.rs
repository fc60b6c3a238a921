// src/vocabulary.rs

use std::collections::HashMap;

/// Fixed mapping from PPE violation class label to the numeric violation
/// type used by the notification endpoint. Immutable after construction.
///
/// Id 1 is reserved in the alarm schema and has no label.
pub struct ViolationVocabulary {
    classes: HashMap<&'static str, u8>,
}

impl Default for ViolationVocabulary {
    fn default() -> Self {
        let classes = HashMap::from([
            ("no ppe", 0),
            ("no mask & vest", 2),
            ("no helmet & vest", 3),
            ("no helmet & mask", 4),
            ("no helmet", 5),
            ("no vest", 6),
            ("no mask", 7),
        ]);
        Self { classes }
    }
}

impl ViolationVocabulary {
    /// Whether the label denotes a violation. Non-violation labels
    /// ("all ppe" and anything else the detector emits) are not members.
    pub fn contains(&self, label: &str) -> bool {
        self.classes.contains_key(label)
    }

    pub fn violation_id(&self, label: &str) -> Option<u8> {
        self.classes.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
