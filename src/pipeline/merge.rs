use std::collections::HashSet;

use crate::model::Detection;

/// Append the subjects of `frame` that `previous` does not already hold.
///
/// Subjects already recorded keep their stored box and counters. Returns
/// `None` when nothing new was seen, so the caller can skip the write.
pub fn merge_new_subjects(previous: &[Detection], frame: Vec<Detection>) -> Option<Vec<Detection>> {
    let known: HashSet<&str> = previous.iter().map(|d| d.subject_id.as_str()).collect();
    let fresh: Vec<Detection> = frame
        .into_iter()
        .filter(|d| !known.contains(d.subject_id.as_str()))
        .collect();
    if fresh.is_empty() {
        return None;
    }
    let mut merged = previous.to_vec();
    merged.extend(fresh);
    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoundingBox;

    fn det(subject: &str, y: i32) -> Detection {
        Detection::new(subject, &["x".to_string()], BoundingBox::new(0, y, 40, y + 40))
    }

    #[test]
    fn first_detection_is_sticky() {
        let previous = vec![det("axe", 100)];
        assert!(merge_new_subjects(&previous, vec![det("axe", 500)]).is_none());

        let merged = merge_new_subjects(&previous, vec![det("axe", 500), det("lina", 200)])
            .expect("lina is new");
        assert_eq!(merged, vec![det("axe", 100), det("lina", 200)]);
    }

    #[test]
    fn empty_history_takes_whole_frame() {
        let merged = merge_new_subjects(&[], vec![det("axe", 1), det("lina", 2)]).unwrap();
        assert_eq!(merged.len(), 2);
        assert!(merge_new_subjects(&[], Vec::new()).is_none());
    }
}
