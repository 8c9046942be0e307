//! File message bus.
//!
//! The detector and the overlay never talk to each other directly. They
//! exchange whole-file snapshots in a shared directory:
//!
//! - the detection list (`overlay_data.json`), owned by the detector;
//! - the visibility state (`overlay_state.json`), whose `detected` flag is
//!   owned by the detector and whose `enabled` flag is owned by the session
//!   tool.
//!
//! Writers always go through [`publish_atomic`], so a reader can observe the
//! previous snapshot or the next one but never a torn write. Readers go
//! through the `try_read_latest` methods, which never fail: missing, empty or
//! malformed content degrades to an empty/default value.

mod atomic;
mod detections;
mod visibility;

pub use atomic::{publish_atomic, tmp_path_for, ReplacePolicy};
pub use detections::{parse_detection_list, DetectionListFile};
pub use visibility::VisibilityFile;
