//! Plex-shaped name formatting.

use pl_core::{MediaDescriptor, MediaKind};

/// Format a descriptor into a Plex-compatible filename.
///
/// - TV: `"{title} - Season {season:02} E{episode:02}[-E{end:02}].{ext}"`
///   (the range suffix appears only when the end episode differs).
/// - Movie: `"{title} ({year}).{ext}"` when the year is known.
/// - Anything else: `"{title}.{ext}"`.
pub fn format_name(desc: &MediaDescriptor, extension: &str) -> String {
    let title = if desc.title.is_empty() {
        "Unknown"
    } else {
        desc.title.as_str()
    };

    let base = match (desc.kind, desc.season, desc.episode) {
        (MediaKind::Tv, Some(season), Some(episode)) => {
            let mut name = format!("{title} - Season {season:02} E{episode:02}");
            if let Some(end) = desc.end_episode {
                if end != episode {
                    name.push_str(&format!("-E{end:02}"));
                }
            }
            name
        }
        (MediaKind::Movie, _, _) => match &desc.year {
            Some(year) => format!("{title} ({year})"),
            None => title.to_string(),
        },
        _ => title.to_string(),
    };

    if extension.is_empty() {
        base
    } else {
        format!("{base}.{extension}")
    }
}

/// Plex season folder name: `"Season NN"`.
pub fn season_dir_name(season: u32) -> String {
    format!("Season {season:02}")
}
