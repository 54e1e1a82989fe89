//! Static music catalog.
//!
//! Tracks are mapped to coarse mood tags; the options endpoint filters on
//! the project's mood prompt.

use serde::{Deserialize, Serialize};

/// A selectable music track.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicTrack {
    pub id: &'static str,
    pub name: &'static str,
    pub url: &'static str,
    pub mood_tag: &'static str,
}

const MUSIC_TRACKS: &[MusicTrack] = &[
    MusicTrack {
        id: "upbeat-1",
        name: "Energetic Upbeat",
        url: "https://www.soundhelix.com/examples/mp3/SoundHelix-Song-1.mp3",
        mood_tag: "upbeat",
    },
    MusicTrack {
        id: "ambient-1",
        name: "Calm Ambient",
        url: "https://www.soundhelix.com/examples/mp3/SoundHelix-Song-2.mp3",
        mood_tag: "ambient",
    },
    MusicTrack {
        id: "dramatic-1",
        name: "Dramatic Cinematic",
        url: "https://www.soundhelix.com/examples/mp3/SoundHelix-Song-3.mp3",
        mood_tag: "dramatic",
    },
];

fn map_mood_to_tag(mood_prompt: Option<&str>) -> &'static str {
    let Some(mood) = mood_prompt else {
        return "ambient";
    };
    let mood = mood.to_lowercase();

    if ["exciting", "energetic", "upbeat", "intense"]
        .iter()
        .any(|kw| mood.contains(kw))
    {
        return "upbeat";
    }
    if ["dramatic", "mysterious"].iter().any(|kw| mood.contains(kw)) {
        return "dramatic";
    }

    // Reflective, dreamy, nostalgic, inspirational all land here.
    "ambient"
}

/// Tracks matching the project mood, or the whole catalog when nothing
/// matches.
pub fn music_catalog(mood_prompt: Option<&str>) -> Vec<MusicTrack> {
    let tag = map_mood_to_tag(mood_prompt);
    let matching: Vec<MusicTrack> = MUSIC_TRACKS
        .iter()
        .filter(|t| t.mood_tag == tag)
        .cloned()
        .collect();

    if matching.is_empty() {
        MUSIC_TRACKS.to_vec()
    } else {
        matching
    }
}

/// Look up a track by ID.
pub fn music_track_by_id(track_id: &str) -> Option<MusicTrack> {
    MUSIC_TRACKS.iter().find(|t| t.id == track_id).cloned()
}
