use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bus::ReplacePolicy;
use crate::detect::InferenceParams;
use crate::model::BoundingBox;

const DEFAULT_SPOOL_DIR: &str = "tmp_screenshots";
const DEFAULT_DETECTIONS_FILE: &str = "overlay_data.json";
const DEFAULT_VISIBILITY_FILE: &str = "overlay_state.json";
const DEFAULT_COUNTERS_DB: &str = "counters.json";
const DEFAULT_ICONS_DIR: &str = "hero_icons";
const DEFAULT_MODEL_FILE: &str = "best.onnx";
const DEFAULT_LABELS_FILE: &str = "labels.txt";
const DEFAULT_FRAME_OUTPUT: &str = "overlay_frame.png";

const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_MIN_BOX_HEIGHT: i32 = 30;
const DEFAULT_MIN_IMAGE_BYTES: u64 = 5000;
const DEFAULT_STABILITY_ATTEMPTS: u32 = 10;
const DEFAULT_STABILITY_INTERVAL_MS: u64 = 100;
const DEFAULT_IDLE_INTERVAL_MS: u64 = 500;
const DEFAULT_SPOOL_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

const DEFAULT_DATA_INTERVAL_MS: u64 = 500;
const DEFAULT_VISIBILITY_INTERVAL_MS: u64 = 300;
const DEFAULT_ZONE_A: [i32; 4] = [1465, 215, 1540, 715];
const DEFAULT_ZONE_B: [i32; 4] = [1575, 215, 1650, 715];
const DEFAULT_LEFT_COLUMN_X: i32 = 1343;
const DEFAULT_RIGHT_COLUMN_X: i32 = 1720;
const DEFAULT_ICON_WIDTH: u32 = 46;
const DEFAULT_ICON_HEIGHT_RATIO: f32 = 0.45;
const DEFAULT_CELL_PADDING: i32 = 5;
const DEFAULT_MIN_DRAW_HEIGHT: i32 = 40;
const DEFAULT_SCREEN_WIDTH: u32 = 1920;
const DEFAULT_SCREEN_HEIGHT: u32 = 1080;
const DEFAULT_GAME_TITLE: &str = "dota 2";
const DEFAULT_FOCUS_COMMAND: [&str; 3] = ["xdotool", "getactivewindow", "getwindowname"];
const DEFAULT_FONT_SIZE: f32 = 16.0;
const BUNDLED_FONT: &str = "fonts/DejaVuSans.ttf";
const SYSTEM_FONTS: [&str; 7] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Debug, Deserialize, Default)]
struct CounterpickConfigFile {
    base_dir: Option<PathBuf>,
    paths: Option<PathsConfigFile>,
    detector: Option<DetectorConfigFile>,
    overlay: Option<OverlayConfigFile>,
    publish: Option<PublishConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct PathsConfigFile {
    spool_dir: Option<PathBuf>,
    detections: Option<PathBuf>,
    visibility: Option<PathBuf>,
    counters_db: Option<PathBuf>,
    icons_dir: Option<PathBuf>,
    model: Option<PathBuf>,
    labels: Option<PathBuf>,
    lock_dir: Option<PathBuf>,
    frame_output: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    input_size: Option<u32>,
    confidence: Option<f32>,
    iou: Option<f32>,
    min_box_height: Option<i32>,
    min_image_bytes: Option<u64>,
    stability_attempts: Option<u32>,
    stability_interval_ms: Option<u64>,
    idle_interval_ms: Option<u64>,
    extensions: Option<Vec<String>>,
    notify_command: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    data_interval_ms: Option<u64>,
    visibility_interval_ms: Option<u64>,
    zone_a: Option<[i32; 4]>,
    zone_b: Option<[i32; 4]>,
    left_column_x: Option<i32>,
    right_column_x: Option<i32>,
    icon_width: Option<u32>,
    icon_height_ratio: Option<f32>,
    cell_padding: Option<i32>,
    vertical_offset: Option<i32>,
    min_draw_height: Option<i32>,
    screen_width: Option<u32>,
    screen_height: Option<u32>,
    game_title: Option<String>,
    focus_command: Option<Vec<String>>,
    font_path: Option<PathBuf>,
    font_size: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct PublishConfigFile {
    retries: Option<u32>,
    delay_ms: Option<u64>,
}

/// Fully resolved configuration shared by every process of one installation.
#[derive(Debug, Clone)]
pub struct CounterpickConfig {
    pub base_dir: PathBuf,
    pub paths: PathSettings,
    pub detector: DetectorSettings,
    pub overlay: OverlaySettings,
    pub publish: ReplacePolicy,
}

/// Absolute locations of the shared files and assets.
#[derive(Debug, Clone)]
pub struct PathSettings {
    pub spool_dir: PathBuf,
    pub detections: PathBuf,
    pub visibility: PathBuf,
    pub counters_db: PathBuf,
    pub icons_dir: PathBuf,
    pub model: PathBuf,
    pub labels: PathBuf,
    pub lock_dir: PathBuf,
    pub frame_output: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub params: InferenceParams,
    /// Boxes shorter than this are dropped before dedup.
    pub min_box_height: i32,
    /// An image file must reach this size before it is decoded.
    pub min_image_bytes: u64,
    pub stability_attempts: u32,
    pub stability_interval: Duration,
    pub idle_interval: Duration,
    /// Lower-case file extensions treated as pending images.
    pub extensions: Vec<String>,
    /// Program + args run (and waited on) to alert the operator on fatal errors.
    pub notify_command: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct OverlaySettings {
    pub data_interval: Duration,
    pub visibility_interval: Duration,
    pub layout: LayoutSettings,
    pub screen_width: u32,
    pub screen_height: u32,
    pub game_title: String,
    pub focus_command: Vec<String>,
    /// Font for counters without an icon. Defaults to the first of
    /// `<base>/fonts/DejaVuSans.ttf` and a few well-known system fonts that
    /// exists; `None` only when none of them does.
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
}

/// Geometry of the counter grid and the two reference zones.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutSettings {
    /// Zone over the left drafting panel.
    pub zone_a: BoundingBox,
    /// Zone over the right drafting panel.
    pub zone_b: BoundingBox,
    pub left_column_x: i32,
    pub right_column_x: i32,
    pub icon_width: u32,
    pub icon_height_ratio: f32,
    pub cell_padding: i32,
    pub vertical_offset: i32,
    pub min_draw_height: i32,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            zone_a: BoundingBox::from(DEFAULT_ZONE_A),
            zone_b: BoundingBox::from(DEFAULT_ZONE_B),
            left_column_x: DEFAULT_LEFT_COLUMN_X,
            right_column_x: DEFAULT_RIGHT_COLUMN_X,
            icon_width: DEFAULT_ICON_WIDTH,
            icon_height_ratio: DEFAULT_ICON_HEIGHT_RATIO,
            cell_padding: DEFAULT_CELL_PADDING,
            vertical_offset: 0,
            min_draw_height: DEFAULT_MIN_DRAW_HEIGHT,
        }
    }
}

impl CounterpickConfig {
    /// Load from `COUNTERPICK_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("COUNTERPICK_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Load from an explicit file (or defaults when `None`), then apply env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => CounterpickConfigFile::default(),
        };
        let base_dir = env_non_empty("COUNTERPICK_BASE_DIR")
            .map(PathBuf::from)
            .or_else(|| file_cfg.base_dir.clone())
            .unwrap_or_else(executable_dir);
        let mut cfg = Self::from_file(file_cfg, base_dir);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Built-in defaults rooted at `base_dir`. No env or file is consulted.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self::from_file(CounterpickConfigFile::default(), base_dir.into())
    }

    fn from_file(file: CounterpickConfigFile, base_dir: PathBuf) -> Self {
        let resolve = |p: Option<PathBuf>, default: &str| -> PathBuf {
            let p = p.unwrap_or_else(|| PathBuf::from(default));
            if p.is_absolute() {
                p
            } else {
                base_dir.join(p)
            }
        };

        let paths_file = file.paths.unwrap_or_default();
        let paths = PathSettings {
            spool_dir: resolve(paths_file.spool_dir, DEFAULT_SPOOL_DIR),
            detections: resolve(paths_file.detections, DEFAULT_DETECTIONS_FILE),
            visibility: resolve(paths_file.visibility, DEFAULT_VISIBILITY_FILE),
            counters_db: resolve(paths_file.counters_db, DEFAULT_COUNTERS_DB),
            icons_dir: resolve(paths_file.icons_dir, DEFAULT_ICONS_DIR),
            model: resolve(paths_file.model, DEFAULT_MODEL_FILE),
            labels: resolve(paths_file.labels, DEFAULT_LABELS_FILE),
            lock_dir: resolve(paths_file.lock_dir, "."),
            frame_output: resolve(paths_file.frame_output, DEFAULT_FRAME_OUTPUT),
        };

        let det = file.detector.unwrap_or_default();
        let default_params = InferenceParams::default();
        let detector = DetectorSettings {
            backend: det.backend.unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            params: InferenceParams {
                input_size: det.input_size.unwrap_or(default_params.input_size),
                confidence: det.confidence.unwrap_or(default_params.confidence),
                iou: det.iou.unwrap_or(default_params.iou),
            },
            min_box_height: det.min_box_height.unwrap_or(DEFAULT_MIN_BOX_HEIGHT),
            min_image_bytes: det.min_image_bytes.unwrap_or(DEFAULT_MIN_IMAGE_BYTES),
            stability_attempts: det.stability_attempts.unwrap_or(DEFAULT_STABILITY_ATTEMPTS),
            stability_interval: Duration::from_millis(
                det.stability_interval_ms
                    .unwrap_or(DEFAULT_STABILITY_INTERVAL_MS),
            ),
            idle_interval: Duration::from_millis(
                det.idle_interval_ms.unwrap_or(DEFAULT_IDLE_INTERVAL_MS),
            ),
            extensions: det
                .extensions
                .map(|exts| {
                    exts.iter()
                        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                        .filter(|e| !e.is_empty())
                        .collect()
                })
                .unwrap_or_else(|| {
                    DEFAULT_SPOOL_EXTENSIONS
                        .iter()
                        .map(|e| e.to_string())
                        .collect()
                }),
            notify_command: det.notify_command.filter(|cmd| !cmd.is_empty()),
        };

        let ov = file.overlay.unwrap_or_default();
        let layout_default = LayoutSettings::default();
        let overlay = OverlaySettings {
            data_interval: Duration::from_millis(
                ov.data_interval_ms.unwrap_or(DEFAULT_DATA_INTERVAL_MS),
            ),
            visibility_interval: Duration::from_millis(
                ov.visibility_interval_ms
                    .unwrap_or(DEFAULT_VISIBILITY_INTERVAL_MS),
            ),
            layout: LayoutSettings {
                zone_a: ov.zone_a.map(BoundingBox::from).unwrap_or(layout_default.zone_a),
                zone_b: ov.zone_b.map(BoundingBox::from).unwrap_or(layout_default.zone_b),
                left_column_x: ov.left_column_x.unwrap_or(layout_default.left_column_x),
                right_column_x: ov.right_column_x.unwrap_or(layout_default.right_column_x),
                icon_width: ov.icon_width.unwrap_or(layout_default.icon_width),
                icon_height_ratio: ov
                    .icon_height_ratio
                    .unwrap_or(layout_default.icon_height_ratio),
                cell_padding: ov.cell_padding.unwrap_or(layout_default.cell_padding),
                vertical_offset: ov.vertical_offset.unwrap_or(layout_default.vertical_offset),
                min_draw_height: ov.min_draw_height.unwrap_or(layout_default.min_draw_height),
            },
            screen_width: ov.screen_width.unwrap_or(DEFAULT_SCREEN_WIDTH),
            screen_height: ov.screen_height.unwrap_or(DEFAULT_SCREEN_HEIGHT),
            game_title: ov
                .game_title
                .unwrap_or_else(|| DEFAULT_GAME_TITLE.to_string()),
            focus_command: ov.focus_command.unwrap_or_else(|| {
                DEFAULT_FOCUS_COMMAND
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            }),
            font_path: match ov.font_path {
                Some(p) => Some(resolve(Some(p), "")),
                None => default_font(&base_dir),
            },
            font_size: ov.font_size.unwrap_or(DEFAULT_FONT_SIZE),
        };

        let default_policy = ReplacePolicy::default();
        let publish_file = file.publish.unwrap_or_default();
        let publish = ReplacePolicy {
            retries: publish_file.retries.unwrap_or(default_policy.retries),
            delay: publish_file
                .delay_ms
                .map(Duration::from_millis)
                .unwrap_or(default_policy.delay),
        };

        Self {
            base_dir,
            paths,
            detector,
            overlay,
            publish,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(backend) = env_non_empty("COUNTERPICK_BACKEND") {
            self.detector.backend = backend;
        }
        if let Some(model) = env_non_empty("COUNTERPICK_MODEL_PATH") {
            self.paths.model = PathBuf::from(model);
        }
        if let Some(title) = env_non_empty("COUNTERPICK_GAME_TITLE") {
            self.overlay.game_title = title;
        }
        if let Some(conf) = env_non_empty("COUNTERPICK_CONFIDENCE") {
            self.detector.params.confidence = conf
                .parse()
                .map_err(|_| anyhow!("COUNTERPICK_CONFIDENCE must be a number between 0 and 1"))?;
        }
        if let Some(ms) = env_non_empty("COUNTERPICK_DATA_INTERVAL_MS") {
            let ms: u64 = ms.parse().map_err(|_| {
                anyhow!("COUNTERPICK_DATA_INTERVAL_MS must be an integer number of milliseconds")
            })?;
            self.overlay.data_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env_non_empty("COUNTERPICK_VISIBILITY_INTERVAL_MS") {
            let ms: u64 = ms.parse().map_err(|_| {
                anyhow!(
                    "COUNTERPICK_VISIBILITY_INTERVAL_MS must be an integer number of milliseconds"
                )
            })?;
            self.overlay.visibility_interval = Duration::from_millis(ms);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        let params = &self.detector.params;
        if !(0.0..=1.0).contains(&params.confidence) {
            return Err(anyhow!("detector confidence must be within 0..=1"));
        }
        if !(0.0..=1.0).contains(&params.iou) {
            return Err(anyhow!("detector iou must be within 0..=1"));
        }
        if params.input_size == 0 {
            return Err(anyhow!("detector input_size must be greater than zero"));
        }
        if self.detector.stability_attempts == 0 {
            return Err(anyhow!("detector stability_attempts must be greater than zero"));
        }
        if self.detector.extensions.is_empty() {
            return Err(anyhow!("detector extensions must not be empty"));
        }
        if self.overlay.data_interval.is_zero() || self.overlay.visibility_interval.is_zero() {
            return Err(anyhow!("overlay intervals must be greater than zero"));
        }
        let layout = &self.overlay.layout;
        if layout.zone_a.is_degenerate() || layout.zone_b.is_degenerate() {
            return Err(anyhow!("overlay reference zones must have positive area"));
        }
        if layout.icon_width == 0 || layout.icon_height_ratio <= 0.0 {
            return Err(anyhow!("overlay icon size must be positive"));
        }
        self.overlay.game_title = self.overlay.game_title.trim().to_lowercase();
        if self.overlay.game_title.is_empty() {
            return Err(anyhow!("overlay game_title must not be empty"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<CounterpickConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn default_font(base_dir: &Path) -> Option<PathBuf> {
    std::iter::once(base_dir.join(BUNDLED_FONT))
        .chain(SYSTEM_FONTS.iter().map(PathBuf::from))
        .find(|p| p.is_file())
}

fn executable_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
