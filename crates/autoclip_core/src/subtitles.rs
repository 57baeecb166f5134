use crate::error::{CoreError, Result};
use crate::types::{SubtitleStyle, TimeUs};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Global offset applied to every cue before burn-in. Negative moves cues
/// earlier to cancel the perceived lag of burned subtitles.
pub const SUBTITLE_SHIFT: TimeUs = TimeUs(-500_000);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubtitleEntry {
    pub start_us: TimeUs,
    pub end_us: TimeUs,
    pub text: String,
}

/// Parse SubRip text. Cue numbers are optional and ignored; entries are
/// renumbered on output.
pub fn parse_srt(input: &str) -> Result<Vec<SubtitleEntry>> {
    let input = input.trim_start_matches('\u{feff}');
    let mut entries = Vec::new();
    let mut lines = input.lines().map(|l| l.trim_end_matches('\r')).enumerate().peekable();

    loop {
        while matches!(lines.peek(), Some((_, l)) if l.trim().is_empty()) {
            lines.next();
        }
        let Some((mut line_no, mut line)) = lines.next() else {
            break;
        };

        if !line.contains("-->") {
            // Cue number line.
            match lines.next() {
                Some((n, l)) => {
                    line_no = n;
                    line = l;
                }
                None => {
                    return Err(CoreError::SubtitleParse {
                        line: line_no + 1,
                        reason: "cue without timing line".into(),
                    })
                }
            }
        }

        let (start_us, end_us) = parse_timing(line).ok_or_else(|| CoreError::SubtitleParse {
            line: line_no + 1,
            reason: format!("invalid timing line: {line}"),
        })?;

        let mut text_lines = Vec::new();
        while let Some((_, l)) = lines.peek() {
            if l.trim().is_empty() {
                break;
            }
            text_lines.push(l.to_string());
            lines.next();
        }

        entries.push(SubtitleEntry {
            start_us,
            end_us,
            text: text_lines.join("\n"),
        });
    }

    Ok(entries)
}

fn parse_timing(line: &str) -> Option<(TimeUs, TimeUs)> {
    let (start, end) = line.split_once("-->")?;
    // Trailing cue settings after the end timestamp are dropped.
    let end = end.split_whitespace().next()?;
    Some((parse_timestamp(start.trim())?, parse_timestamp(end)?))
}

/// `HH:MM:SS,mmm` (a `.` separator is accepted too).
fn parse_timestamp(s: &str) -> Option<TimeUs> {
    let (hms, millis) = s.split_once([',', '.']).unwrap_or((s, "0"));
    let parts: Vec<&str> = hms.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: i64 = parts[0].trim().parse().ok()?;
    let mins: i64 = parts[1].parse().ok()?;
    let secs: i64 = parts[2].parse().ok()?;
    let millis: i64 = millis.trim().parse().ok()?;
    if mins >= 60 || secs >= 60 || millis >= 1000 {
        return None;
    }
    Some(TimeUs(((hours * 3600 + mins * 60 + secs) * 1000 + millis) * 1000))
}

fn format_timestamp(t: TimeUs) -> String {
    let total_ms = t.0.max(0) / 1000;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60,
        ms
    )
}

pub fn to_srt(entries: &[SubtitleEntry]) -> String {
    let mut out = String::new();
    for (i, entry) in entries.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_timestamp(entry.start_us),
            format_timestamp(entry.end_us),
            entry.text
        ));
    }
    out
}

pub fn load_srt(path: impl AsRef<Path>) -> Result<Vec<SubtitleEntry>> {
    let data = std::fs::read_to_string(path.as_ref())?;
    parse_srt(&data)
}

pub fn save_srt(path: impl AsRef<Path>, entries: &[SubtitleEntry]) -> Result<()> {
    std::fs::write(path.as_ref(), to_srt(entries))?;
    Ok(())
}

/// Move every cue by `offset`, clamping at zero. Cues that would end at or
/// before zero are dropped.
pub fn shift(entries: &[SubtitleEntry], offset: TimeUs) -> Vec<SubtitleEntry> {
    entries
        .iter()
        .filter_map(|e| {
            let end = e.end_us + offset;
            if end <= TimeUs::ZERO {
                return None;
            }
            Some(SubtitleEntry {
                start_us: (e.start_us + offset).max(TimeUs::ZERO),
                end_us: end,
                text: e.text.clone(),
            })
        })
        .collect()
}

/// `#RRGGBB` to the ASS `&HAABBGGRR` form with opaque alpha.
pub fn hex_to_ass(hex: &str) -> String {
    let c = hex.trim().trim_start_matches('#');
    if c.len() == 6 && c.chars().all(|ch| ch.is_ascii_hexdigit()) {
        let (r, g, b) = (&c[0..2], &c[2..4], &c[4..6]);
        format!("&H00{b}{g}{r}").to_uppercase()
    } else {
        "&H00FFFFFF".to_string()
    }
}

/// The `force_style` value for the encoder's subtitles filter.
pub fn force_style(style: &SubtitleStyle) -> String {
    format!(
        "Fontname={},FontSize={},PrimaryColour={},Outline={},Shadow={},MarginV={},Alignment=2,Bold={}",
        style.font_name,
        style.font_size,
        hex_to_ass(&style.color),
        style.outline,
        style.shadow,
        style.margin_v,
        if style.bold { 1 } else { 0 }
    )
}

/// Escape a path for use inside a quoted filter argument.
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Complete `subtitles=` filter with burn-in style.
pub fn subtitles_filter(path: &Path, style: &SubtitleStyle) -> String {
    format!(
        "subtitles='{}':force_style='{}'",
        escape_filter_path(path),
        force_style(style)
    )
}
