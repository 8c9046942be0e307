use std::collections::HashMap;

use crate::detect::RawDetection;
use crate::model::Detection;

/// Reduce one frame's raw detections to at most one record per subject.
///
/// Boxes shorter than `min_height` are dropped first. Among the remaining
/// boxes of a subject the most confident one wins. Subjects for which
/// `counters_for` yields nothing are not surfaced. Output order is the order
/// in which subjects were first accepted.
pub fn dedup_frame<F>(raw: Vec<RawDetection>, min_height: i32, counters_for: F) -> Vec<Detection>
where
    F: Fn(&str) -> Vec<String>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut best: Vec<(f32, Detection)> = Vec::new();

    for det in raw {
        if det.bbox.height() < min_height {
            continue;
        }
        match index.get(&det.label) {
            Some(&slot) => {
                if det.confidence > best[slot].0 {
                    best[slot].0 = det.confidence;
                    best[slot].1.bbox = det.bbox;
                }
            }
            None => {
                let counters = counters_for(&det.label);
                if counters.is_empty() {
                    continue;
                }
                index.insert(det.label.clone(), best.len());
                best.push((det.confidence, Detection::new(det.label, &counters, det.bbox)));
            }
        }
    }

    best.into_iter().map(|(_, det)| det).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, MAX_COUNTERS};

    fn lookup(subject: &str) -> Vec<String> {
        match subject {
            "axe" => ["huskar", "ursa", "lina", "pudge", "zeus"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            "lina" => vec!["axe".to_string()],
            _ => Vec::new(),
        }
    }

    #[test]
    fn keeps_most_confident_box_per_subject() {
        let raw = vec![
            RawDetection::new("axe", 0.4, BoundingBox::new(0, 0, 50, 50)),
            RawDetection::new("lina", 0.7, BoundingBox::new(100, 0, 150, 50)),
            RawDetection::new("axe", 0.8, BoundingBox::new(5, 5, 55, 55)),
            RawDetection::new("axe", 0.6, BoundingBox::new(9, 9, 59, 59)),
        ];
        let frame = dedup_frame(raw, 30, lookup);
        assert_eq!(frame.len(), 2);
        assert_eq!(frame[0].subject_id, "axe");
        assert_eq!(frame[0].bbox, BoundingBox::new(5, 5, 55, 55));
        assert_eq!(frame[0].counters.len(), MAX_COUNTERS);
        assert_eq!(frame[1].subject_id, "lina");
    }

    #[test]
    fn drops_short_boxes_and_subjects_without_counters() {
        let raw = vec![
            RawDetection::new("axe", 0.99, BoundingBox::new(0, 0, 50, 29)),
            RawDetection::new("axe", 0.30, BoundingBox::new(0, 0, 50, 30)),
            RawDetection::new("unknown", 0.95, BoundingBox::new(0, 0, 50, 80)),
        ];
        let frame = dedup_frame(raw, 30, lookup);
        assert_eq!(frame.len(), 1);
        assert_eq!(frame[0].bbox, BoundingBox::new(0, 0, 50, 30));
    }
}
