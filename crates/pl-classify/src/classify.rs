//! Core classification logic.
//!
//! Patterns are tried in a fixed priority order, first match wins:
//! 1. `SxxExx` (optional `-Eyy` range) -> TV
//! 2. `第N季…第M集` (optional second `第K集` for a range) -> TV
//! 3. Bare `E<n>` (optional `-E<m>`), no season marker -> TV, season 1
//! 4. A 4-digit 1900-2099 year token -> Movie
//! 5. Otherwise -> Unknown
//!
//! Every pattern is bounded by non-word characters (or the string edges) so
//! tokens embedded inside words never match.

use once_cell::sync::Lazy;
use regex::Regex;

use pl_core::{MediaDescriptor, MediaKind};

static SEASON_EPISODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|\W)S(\d{1,4})E(\d{1,4})(?:-E(\d{1,4}))?(?:\W|$)").unwrap()
});

static CJK_EPISODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\W)第(\d{1,4})季.*?第(\d{1,4})集(?:.*?第(\d{1,4})集)?(?:\W|$)").unwrap()
});

static EPISODE_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|\W)E(\d{1,4})(?:-E(\d{1,4}))?(?:\W|$)").unwrap());

static YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\W)((?:19|20)\d{2})(?:\W|$)").unwrap());

static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[._\-]+").unwrap());

/// Classify a filename into a [`MediaDescriptor`].
///
/// Deterministic and total: unmatched input degrades to
/// [`MediaKind::Unknown`], never an error.
pub fn classify(filename: &str) -> MediaDescriptor {
    let stem = strip_extension(filename);

    // TV patterns, in priority order.
    if let Some(caps) = SEASON_EPISODE.captures(stem) {
        return tv_descriptor(stem, &caps, group_u32(&caps, 1));
    }
    if let Some(caps) = CJK_EPISODE.captures(stem) {
        return tv_descriptor(stem, &caps, group_u32(&caps, 1));
    }
    if let Some(caps) = EPISODE_ONLY.captures(stem) {
        // Bare episode marker: season defaults to 1, and the capture layout
        // shifts down by one group.
        let episode = group_u32(&caps, 1);
        let end_episode = group_u32(&caps, 2);
        let m = caps.get(0).expect("whole match");
        let year = YEAR.captures(stem);
        let stop = year
            .as_ref()
            .and_then(|c| c.get(0))
            .map_or(m.start(), |y| y.start().min(m.start()));
        return MediaDescriptor {
            kind: MediaKind::Tv,
            title: title_at(stem, stop, MediaKind::Tv),
            season: Some(1),
            episode,
            end_episode,
            year: year.and_then(|c| c.get(1).map(|g| g.as_str().to_string())),
        };
    }

    // Movie: a year token with no episode markers present (episode markers
    // were ruled out above).
    if let Some(caps) = YEAR.captures(stem) {
        let m = caps.get(0).expect("whole match");
        return MediaDescriptor {
            kind: MediaKind::Movie,
            title: title_at(stem, m.start(), MediaKind::Movie),
            season: None,
            episode: None,
            end_episode: None,
            year: caps.get(1).map(|g| g.as_str().to_string()),
        };
    }

    MediaDescriptor::unknown(clean(stem))
}

/// Build a TV descriptor from a season-carrying capture
/// (groups: 1 = season, 2 = episode, 3 = optional end episode).
fn tv_descriptor(stem: &str, caps: &regex::Captures<'_>, season: Option<u32>) -> MediaDescriptor {
    let m = caps.get(0).expect("whole match");
    let year = YEAR.captures(stem);
    let stop = year
        .as_ref()
        .and_then(|c| c.get(0))
        .map_or(m.start(), |y| y.start().min(m.start()));

    MediaDescriptor {
        kind: MediaKind::Tv,
        title: title_at(stem, stop, MediaKind::Tv),
        season,
        episode: group_u32(caps, 2),
        end_episode: group_u32(caps, 3),
        year: year.and_then(|c| c.get(1).map(|g| g.as_str().to_string())),
    }
}

/// Title is the cleaned stem up to the first recognized token. When the
/// token starts the stem, fall back to the cleaned remainder after removing
/// the matched spans.
fn title_at(stem: &str, stop: usize, kind: MediaKind) -> String {
    let title = clean(&stem[..stop]);
    if !title.is_empty() {
        return title;
    }

    let remainder = match kind {
        MediaKind::Tv => {
            let s = SEASON_EPISODE.replace_all(stem, " ").into_owned();
            let s = CJK_EPISODE.replace_all(&s, " ").into_owned();
            EPISODE_ONLY.replace_all(&s, " ").into_owned()
        }
        MediaKind::Movie => YEAR.replace_all(stem, " ").into_owned(),
        MediaKind::Unknown => stem.to_string(),
    };

    let fallback = clean(&remainder);
    if fallback.is_empty() {
        clean(stem)
    } else {
        fallback
    }
}

/// Replace separator characters with spaces, collapse whitespace, trim.
fn clean(raw: &str) -> String {
    SEPARATORS
        .replace_all(raw, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip the final extension from a filename, if any.
fn strip_extension(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => filename,
    }
}

fn group_u32(caps: &regex::Captures<'_>, idx: usize) -> Option<u32> {
    caps.get(idx).and_then(|g| g.as_str().parse().ok())
}
