use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Sub};
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// TimeUs
// ---------------------------------------------------------------------------

/// A point or span on a timeline, in whole microseconds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeUs(pub i64);

impl TimeUs {
    pub const ZERO: Self = Self(0);

    pub fn from_seconds(s: f64) -> Self {
        Self((s * 1_000_000.0).round() as i64)
    }

    pub fn as_seconds(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Multiply by a non-integer factor, rounding to the nearest microsecond.
    pub fn scale(self, factor: f64) -> Self {
        Self((self.0 as f64 * factor).round() as i64)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self((self.0 - rhs.0).max(0))
    }
}

impl Add for TimeUs {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for TimeUs {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for TimeUs {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul<i64> for TimeUs {
    type Output = Self;
    fn mul(self, rhs: i64) -> Self {
        Self(self.0 * rhs)
    }
}

impl Div<i64> for TimeUs {
    type Output = Self;
    fn div(self, rhs: i64) -> Self {
        Self(self.0 / rhs)
    }
}

impl std::iter::Sum for TimeUs {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(TimeUs::ZERO, |acc, t| acc + t)
    }
}

impl fmt::Display for TimeUs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_us = self.0.unsigned_abs();
        let total_ms = total_us / 1_000;
        let ms = total_ms % 1_000;
        let total_secs = total_ms / 1_000;
        let secs = total_secs % 60;
        let total_mins = total_secs / 60;
        let mins = total_mins % 60;
        let hours = total_mins / 60;
        if self.0 < 0 {
            write!(f, "-{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
        } else {
            write!(f, "{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    #[default]
    #[serde(alias = "None")]
    None,
    #[serde(alias = "Fade to Black")]
    FadeToBlack,
    #[serde(alias = "Crossfade")]
    Crossfade,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Transition {
    #[serde(default)]
    pub kind: TransitionKind,
    /// Seconds.
    #[serde(default = "default_transition_duration")]
    pub duration: f64,
}

fn default_transition_duration() -> f64 {
    0.5
}

impl Transition {
    pub fn none() -> Self {
        Self {
            kind: TransitionKind::None,
            duration: 0.0,
        }
    }

    pub fn fade_to_black(duration: f64) -> Self {
        Self {
            kind: TransitionKind::FadeToBlack,
            duration,
        }
    }

    pub fn crossfade(duration: f64) -> Self {
        Self {
            kind: TransitionKind::Crossfade,
            duration,
        }
    }

    /// True when scene boundaries get any effect at all.
    pub fn is_active(&self) -> bool {
        self.kind != TransitionKind::None && self.duration > 0.0
    }

    pub fn is_crossfade(&self) -> bool {
        self.is_active() && self.kind == TransitionKind::Crossfade
    }

    pub fn is_fade_to_black(&self) -> bool {
        self.is_active() && self.kind == TransitionKind::FadeToBlack
    }

    pub fn duration_us(&self) -> TimeUs {
        if self.is_active() {
            TimeUs::from_seconds(self.duration)
        } else {
            TimeUs::ZERO
        }
    }
}

impl Default for Transition {
    fn default() -> Self {
        Self::none()
    }
}

// ---------------------------------------------------------------------------
// FolderSpec
// ---------------------------------------------------------------------------

/// Random-cut sub-segment length bounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ClipBounds {
    pub min: TimeUs,
    pub max: TimeUs,
}

impl ClipBounds {
    pub fn from_seconds(min: f64, max: f64) -> Self {
        Self {
            min: TimeUs::from_seconds(min),
            max: TimeUs::from_seconds(max),
        }
    }

    /// Convert bounds given in output seconds into source seconds.
    pub fn scaled(self, speed: f64) -> Self {
        Self {
            min: self.min.scale(speed),
            max: self.max.scale(speed),
        }
    }
}

/// One weighted source folder of the run configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FolderSpec {
    /// Folder name under the video root, or an absolute path.
    pub folder: PathBuf,
    pub weight: f64,
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Seconds; `clip_min == clip_max == 0` selects sequential playback.
    #[serde(default)]
    pub clip_min: f64,
    #[serde(default)]
    pub clip_max: f64,
}

fn default_speed() -> f64 {
    1.0
}

impl FolderSpec {
    pub fn new(folder: impl Into<PathBuf>, weight: f64) -> Self {
        Self {
            folder: folder.into(),
            weight,
            speed: 1.0,
            clip_min: 0.0,
            clip_max: 0.0,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_random_cuts(mut self, min: f64, max: f64) -> Self {
        self.clip_min = min;
        self.clip_max = max;
        self
    }

    /// Random-cut bounds in output seconds, if random mode is enabled.
    pub fn random_cut(&self) -> Option<ClipBounds> {
        if self.clip_max > 0.0 {
            Some(ClipBounds::from_seconds(self.clip_min.max(0.0), self.clip_max))
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// TimelineBlock
// ---------------------------------------------------------------------------

/// Contiguous span of the master timeline assigned to one folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineBlock {
    pub index: usize,
    pub folder: PathBuf,
    pub speed: f64,
    pub random_cut: Option<ClipBounds>,
    pub start_us: TimeUs,
    pub end_us: TimeUs,
}

impl TimelineBlock {
    pub fn span_us(&self) -> TimeUs {
        self.end_us - self.start_us
    }
}

// ---------------------------------------------------------------------------
// RenderChunk
// ---------------------------------------------------------------------------

/// Memory-bounded slice of a block, rendered independently.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderChunk {
    pub index: usize,
    pub block_index: usize,
    pub total_blocks: usize,
    pub folder: PathBuf,
    pub speed: f64,
    pub random_cut: Option<ClipBounds>,
    pub start_us: TimeUs,
    pub end_us: TimeUs,
    pub duration_us: TimeUs,
    pub is_block_start: bool,
    pub is_block_end: bool,
    /// Chunk opens a block that follows another non-empty block.
    pub transition_in: bool,
    /// Chunk closes a block that precedes another non-empty block.
    pub transition_out: bool,
    pub pad_head_us: TimeUs,
    pub pad_tail_us: TimeUs,
}

impl RenderChunk {
    /// Length of the rendered part, padding included.
    pub fn visual_duration_us(&self) -> TimeUs {
        self.duration_us + self.pad_head_us + self.pad_tail_us
    }

    /// Amount of source material to fetch before the speed change.
    pub fn source_duration_us(&self) -> TimeUs {
        self.visual_duration_us().scale(self.speed)
    }
}

// ---------------------------------------------------------------------------
// SegmentProvenance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SegmentProvenance {
    pub source_file: PathBuf,
    pub source_start_us: TimeUs,
    pub source_end_us: TimeUs,
    pub duration_us: TimeUs,
    pub random_cut: bool,
}

// ---------------------------------------------------------------------------
// PartFile
// ---------------------------------------------------------------------------

/// An encoded intermediate file for one chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartFile {
    pub chunk_index: usize,
    pub block_index: usize,
    pub path: PathBuf,
    /// Rendered length, transition padding included.
    pub duration_us: TimeUs,
    pub pad_head_us: TimeUs,
    pub pad_tail_us: TimeUs,
    pub is_block_start: bool,
    pub is_block_end: bool,
}

// ---------------------------------------------------------------------------
// SubtitleStyle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubtitleStyle {
    #[serde(default = "default_font_name")]
    pub font_name: String,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    /// `#RRGGBB`.
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_one")]
    pub outline: u32,
    #[serde(default = "default_one")]
    pub shadow: u32,
    #[serde(default = "default_margin_v")]
    pub margin_v: u32,
    #[serde(default = "default_bold")]
    pub bold: bool,
}

fn default_font_name() -> String {
    "Noto Sans CJK SC".to_string()
}

fn default_font_size() -> u32 {
    9
}

fn default_color() -> String {
    "#FFFFFF".to_string()
}

fn default_one() -> u32 {
    1
}

fn default_margin_v() -> u32 {
    15
}

fn default_bold() -> bool {
    true
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_name: default_font_name(),
            font_size: default_font_size(),
            color: default_color(),
            outline: 1,
            shadow: 1,
            margin_v: default_margin_v(),
            bold: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_us_add_sub() {
        let a = TimeUs(5_000_000);
        let b = TimeUs(3_000_000);
        assert_eq!(a + b, TimeUs(8_000_000));
        assert_eq!(a - b, TimeUs(2_000_000));
        assert_eq!(b.saturating_sub(a), TimeUs::ZERO);
    }

    #[test]
    fn time_us_from_seconds_rounds() {
        assert_eq!(TimeUs::from_seconds(2.5), TimeUs(2_500_000));
        assert_eq!(TimeUs::from_seconds(2.3), TimeUs(2_300_000));
        assert!((TimeUs(2_500_000).as_seconds() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn time_us_scale() {
        assert_eq!(TimeUs(10_000_000).scale(1.5), TimeUs(15_000_000));
        assert_eq!(TimeUs(10_000_000).scale(0.5), TimeUs(5_000_000));
    }

    #[test]
    fn time_us_display() {
        assert_eq!(TimeUs(0).to_string(), "00:00:00.000");
        assert_eq!(TimeUs(1_500_000).to_string(), "00:00:01.500");
        assert_eq!(TimeUs::from_seconds(3661.5).to_string(), "01:01:01.500");
    }

    #[test]
    fn time_us_sum() {
        let total: TimeUs = [TimeUs(1), TimeUs(2), TimeUs(3)].into_iter().sum();
        assert_eq!(total, TimeUs(6));
    }

    #[test]
    fn transition_none_has_no_duration() {
        assert!(!Transition::none().is_active());
        assert_eq!(Transition::none().duration_us(), TimeUs::ZERO);
        let zero_crossfade = Transition::crossfade(0.0);
        assert!(!zero_crossfade.is_crossfade());
        assert!(Transition::crossfade(0.5).is_crossfade());
        assert!(Transition::fade_to_black(1.0).is_fade_to_black());
    }

    #[test]
    fn transition_kind_accepts_display_names() {
        let t: Transition = serde_json::from_str(r#"{"kind":"Crossfade","duration":1.0}"#).unwrap();
        assert_eq!(t.kind, TransitionKind::Crossfade);
        let t: Transition = serde_json::from_str(r#"{"kind":"fade_to_black"}"#).unwrap();
        assert_eq!(t.kind, TransitionKind::FadeToBlack);
        assert!((t.duration - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn folder_spec_random_cut_requires_max() {
        assert!(FolderSpec::new("a", 1.0).random_cut().is_none());
        let bounds = FolderSpec::new("a", 1.0)
            .with_random_cuts(2.0, 4.0)
            .random_cut()
            .unwrap();
        assert_eq!(bounds.min, TimeUs(2_000_000));
        assert_eq!(bounds.max, TimeUs(4_000_000));
    }

    #[test]
    fn folder_spec_defaults_from_json() {
        let spec: FolderSpec = serde_json::from_str(r#"{"folder":"nature","weight":50}"#).unwrap();
        assert_eq!(spec.speed, 1.0);
        assert!(spec.random_cut().is_none());
    }

    #[test]
    fn chunk_source_duration_scales_with_speed() {
        let chunk = RenderChunk {
            index: 0,
            block_index: 0,
            total_blocks: 1,
            folder: PathBuf::from("a"),
            speed: 2.0,
            random_cut: None,
            start_us: TimeUs::ZERO,
            end_us: TimeUs::from_seconds(10.0),
            duration_us: TimeUs::from_seconds(10.0),
            is_block_start: true,
            is_block_end: true,
            transition_in: false,
            transition_out: true,
            pad_head_us: TimeUs::ZERO,
            pad_tail_us: TimeUs::from_seconds(1.0),
        };
        assert_eq!(chunk.visual_duration_us(), TimeUs::from_seconds(11.0));
        assert_eq!(chunk.source_duration_us(), TimeUs::from_seconds(22.0));
    }

    #[test]
    fn subtitle_style_defaults() {
        let style = SubtitleStyle::default();
        assert_eq!(style.font_name, "Noto Sans CJK SC");
        assert_eq!(style.color, "#FFFFFF");
        assert!(style.bold);
        let parsed: SubtitleStyle = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, style);
    }
}
