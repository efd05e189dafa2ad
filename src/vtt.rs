//! WebVTT subtitle parsing and transcript windowing.
//!
//! The parser is a streaming line-based state machine: a timestamp-range
//! line flushes the previous caption and starts a new one, tag-stripped text
//! lines accumulate into the current caption, and non-caption lines (the
//! `WEBVTT` header, cue numbers, `NOTE`/`STYLE`/`REGION` blocks) are
//! skipped. The windowing pass merges consecutive captions into
//! fixed-duration windows without ever splitting a caption, so the
//! concatenation of all window texts always reproduces the full transcript.

use crate::models::{Caption, TranscriptWindow};

/// Parse a VTT document into ordered captions. Unparseable cues are skipped;
/// an input with no parseable cues yields an empty list.
pub fn parse_vtt(content: &str) -> Vec<Caption> {
    let mut captions = Vec::new();
    let mut current: Option<Caption> = None;
    let mut in_block_comment = false;

    for line in content.lines() {
        let line = line.trim_end();

        if in_block_comment {
            if line.trim().is_empty() {
                in_block_comment = false;
            }
            continue;
        }

        if line.starts_with("NOTE") || line.starts_with("STYLE") || line.starts_with("REGION") {
            in_block_comment = true;
            continue;
        }

        if let Some((start, end)) = parse_cue_timing(line) {
            if let Some(cap) = current.take() {
                if !cap.text.is_empty() {
                    captions.push(cap);
                }
            }
            current = Some(Caption {
                start_secs: start,
                end_secs: end,
                text: String::new(),
            });
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        // Header, cue identifiers, and anything before the first cue.
        if current.is_none() || trimmed.starts_with("WEBVTT") {
            continue;
        }

        let text = strip_tags(trimmed);
        if text.is_empty() {
            continue;
        }
        if let Some(cap) = current.as_mut() {
            if !cap.text.is_empty() {
                cap.text.push(' ');
            }
            cap.text.push_str(&text);
        }
    }

    if let Some(cap) = current.take() {
        if !cap.text.is_empty() {
            captions.push(cap);
        }
    }

    captions
}

/// Parse a cue timing line: `00:00:05.000 --> 00:00:12.000 [settings]`.
fn parse_cue_timing(line: &str) -> Option<(f64, f64)> {
    let (lhs, rhs) = line.split_once("-->")?;
    let start = parse_timestamp(lhs.trim())?;
    // Cue settings may follow the end timestamp.
    let end_token = rhs.trim().split_whitespace().next()?;
    let end = parse_timestamp(end_token)?;
    if end < start {
        return None;
    }
    Some((start, end))
}

/// Parse `HH:MM:SS.mmm` or `MM:SS.mmm` into seconds.
fn parse_timestamp(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.split(':').collect();
    let (h, m, sec) = match parts.len() {
        3 => (
            parts[0].parse::<f64>().ok()?,
            parts[1].parse::<f64>().ok()?,
            parts[2].parse::<f64>().ok()?,
        ),
        2 => (0.0, parts[0].parse::<f64>().ok()?, parts[1].parse::<f64>().ok()?),
        _ => return None,
    };
    if m >= 60.0 || sec >= 60.0 {
        return None;
    }
    Some(h * 3600.0 + m * 60.0 + sec)
}

/// Remove inline markup (`<c>`, `<00:00:01.000>`, `<i>` ...) from caption
/// text.
fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Total content duration: from the first caption's start to the last
/// caption's end.
pub fn total_duration(captions: &[Caption]) -> f64 {
    match (captions.first(), captions.last()) {
        (Some(first), Some(last)) => last.end_secs - first.start_secs,
        _ => 0.0,
    }
}

/// Merge consecutive captions into fixed-duration windows.
///
/// A caption joins the current window iff its start lies before
/// `window start + window_secs`; otherwise it begins a new window. A caption
/// that starts inside the budget but runs past it is still included whole:
/// windows never split captions, they only stretch.
pub fn window_captions(captions: &[Caption], window_secs: f64) -> Vec<TranscriptWindow> {
    let mut windows: Vec<TranscriptWindow> = Vec::new();

    for cap in captions {
        match windows.last_mut() {
            Some(w) if cap.start_secs < w.start_secs + window_secs => {
                if !w.text.is_empty() {
                    w.text.push(' ');
                }
                w.text.push_str(&cap.text);
                if cap.end_secs > w.end_secs {
                    w.end_secs = cap.end_secs;
                }
            }
            _ => {
                windows.push(TranscriptWindow {
                    start_secs: cap.start_secs,
                    end_secs: cap.end_secs,
                    text: cap.text.clone(),
                });
            }
        }
    }

    windows
}

/// Join caption texts into the full transcript string.
pub fn full_text(captions: &[Caption]) -> String {
    captions
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "WEBVTT\n\
        \n\
        1\n\
        00:00:00.000 --> 00:00:05.000\n\
        hello\n\
        \n\
        2\n\
        00:00:05.000 --> 00:00:12.000\n\
        world\n";

    #[test]
    fn test_parse_basic() {
        let caps = parse_vtt(SAMPLE);
        assert_eq!(caps.len(), 2);
        assert_eq!(caps[0].text, "hello");
        assert_eq!(caps[0].start_secs, 0.0);
        assert_eq!(caps[0].end_secs, 5.0);
        assert_eq!(caps[1].text, "world");
        assert_eq!(caps[1].end_secs, 12.0);
    }

    #[test]
    fn test_parse_strips_tags_and_mm_ss() {
        let vtt = "WEBVTT\n\n00:01.000 --> 00:04.500\n<c.yellow>styled</c> <i>text</i>\n";
        let caps = parse_vtt(vtt);
        assert_eq!(caps.len(), 1);
        assert_eq!(caps[0].text, "styled text");
        assert!((caps[0].start_secs - 1.0).abs() < 1e-9);
        assert!((caps[0].end_secs - 4.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_skips_note_blocks() {
        let vtt = "WEBVTT\n\nNOTE\nthis is a comment\nstill a comment\n\n00:00:00.000 --> 00:00:02.000\nreal caption\n";
        let caps = parse_vtt(vtt);
        assert_eq!(caps.len(), 1);
        assert_eq!(caps[0].text, "real caption");
    }

    #[test]
    fn test_parse_multiline_cue() {
        let vtt = "WEBVTT\n\n00:00:00.000 --> 00:00:03.000\nfirst line\nsecond line\n";
        let caps = parse_vtt(vtt);
        assert_eq!(caps.len(), 1);
        assert_eq!(caps[0].text, "first line second line");
    }

    #[test]
    fn test_parse_no_captions() {
        assert!(parse_vtt("WEBVTT\n\nNOTE nothing here\n").is_empty());
        assert!(parse_vtt("").is_empty());
    }

    #[test]
    fn test_parse_rejects_backward_range() {
        let vtt = "WEBVTT\n\n00:00:10.000 --> 00:00:05.000\nbad\n";
        assert!(parse_vtt(vtt).is_empty());
    }

    // Two captions, 0-5s and 5-12s, 10s windows: "world" starts at 5s,
    // inside the first window's budget, so it joins even though the window
    // then runs to 12s.
    #[test]
    fn test_window_caption_fits_before_boundary() {
        let caps = parse_vtt(SAMPLE);
        assert!(total_duration(&caps) > 10.0);
        let windows = window_captions(&caps, 10.0);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start_secs, 0.0);
        assert_eq!(windows[0].end_secs, 12.0);
        assert_eq!(windows[0].text, "hello world");
    }

    #[test]
    fn test_window_split_at_boundary() {
        let caps = vec![
            Caption { start_secs: 0.0, end_secs: 5.0, text: "hello".into() },
            Caption { start_secs: 5.0, end_secs: 12.0, text: "world".into() },
            Caption { start_secs: 12.0, end_secs: 15.0, text: "again".into() },
        ];
        // Third caption starts at 12s >= 0+10s, so it opens a second window.
        let windows = window_captions(&caps, 10.0);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].text, "hello world");
        assert_eq!(windows[1].text, "again");
        assert_eq!(windows[1].start_secs, 12.0);
        assert_eq!(windows[1].end_secs, 15.0);
    }

    #[test]
    fn test_window_coverage_property() {
        // Concatenating all window texts must reproduce the full transcript.
        let caps: Vec<Caption> = (0..40)
            .map(|i| Caption {
                start_secs: i as f64 * 7.0,
                end_secs: i as f64 * 7.0 + 6.5,
                text: format!("caption{}", i),
            })
            .collect();
        let windows = window_captions(&caps, 30.0);
        assert!(windows.len() > 1);
        let joined = windows
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(joined, full_text(&caps));
    }

    #[test]
    fn test_window_empty_input() {
        assert!(window_captions(&[], 10.0).is_empty());
    }
}
