use std::fmt;

use serde::{Deserialize, Serialize};

/// Length of an embedded video id
const VIDEO_ID_LEN: usize = 11;
const MAX_REF_LEN: usize = 64;

/// URL fragments that introduce a video id
const URL_MARKERS: [&str; 5] = ["youtu.be/", "v/", "embed/", "watch?v=", "&v="];

/// Media reference could not be resolved to a track id
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid media reference: {0}")]
pub struct InvalidReference(pub String);

/// Opaque identifier of an external media track
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TrackId(String);

impl TrackId {
    /// Resolve a user supplied reference.
    ///
    /// Accepts `ref:<id>`, a bare video id, or a video URL
    /// (`watch?v=`, `youtu.be/`, `embed/`, `v/`, `u/<x>/`, `&v=`).
    pub fn parse(reference: &str) -> Result<Self, InvalidReference> {
        let reference = reference.trim();

        if let Some(id) = reference.strip_prefix("ref:") {
            if !id.is_empty() && id.len() <= MAX_REF_LEN && is_id_text(id) {
                return Ok(Self(id.to_string()));
            }
            return Err(InvalidReference(reference.to_string()));
        }

        if reference.len() == VIDEO_ID_LEN && is_id_text(reference) {
            return Ok(Self(reference.to_string()));
        }

        video_id_from_url(reference)
            .map(|id| Self(id.to_string()))
            .ok_or_else(|| InvalidReference(reference.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Resolved id as it appears in a stored document
impl TryFrom<String> for TrackId {
    type Error = InvalidReference;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        if !id.is_empty() && id.len() <= MAX_REF_LEN && is_id_text(&id) {
            Ok(Self(id))
        } else {
            Err(InvalidReference(id))
        }
    }
}

impl From<TrackId> for String {
    fn from(track: TrackId) -> Self {
        track.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_id_text(s: &str) -> bool {
    s.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Extract the id following the last marker in the URL
fn video_id_from_url(url: &str) -> Option<&str> {
    let mut best: Option<(usize, usize)> = None;
    let mut consider = |marker_at: usize, id_at: usize| {
        if best.map_or(true, |(at, _)| marker_at > at) {
            best = Some((marker_at, id_at));
        }
    };

    for marker in URL_MARKERS {
        if let Some(at) = url.rfind(marker) {
            consider(at, at + marker.len());
        }
    }

    // u/<word char>/<id>
    for (at, _) in url.match_indices("u/") {
        let rest = url[at + 2..].as_bytes();
        if rest.len() >= 2 && (rest[0].is_ascii_alphanumeric() || rest[0] == b'_') && rest[1] == b'/'
        {
            consider(at, at + 4);
        }
    }

    let (_, id_at) = best?;
    let tail = &url[id_at..];
    let end = tail.find(['#', '&', '?']).unwrap_or(tail.len());
    let id = &tail[..end];

    (id.len() == VIDEO_ID_LEN && is_id_text(id)).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_scheme() {
        assert_eq!(TrackId::parse("ref:VID123").unwrap().as_str(), "VID123");
        assert!(TrackId::parse("ref:").is_err());
        assert!(TrackId::parse("ref:has space").is_err());
    }

    #[test]
    fn test_watch_url() {
        let id = TrackId::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42").unwrap();
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");
    }

    #[test]
    fn test_short_and_embed_urls() {
        assert_eq!(
            TrackId::parse("https://youtu.be/dQw4w9WgXcQ?si=abc").unwrap().as_str(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            TrackId::parse("https://www.youtube.com/embed/dQw4w9WgXcQ").unwrap().as_str(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            TrackId::parse("https://www.youtube.com/u/x/dQw4w9WgXcQ").unwrap().as_str(),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_playlist_param_wins_when_last() {
        let id = TrackId::parse("https://www.youtube.com/watch?list=PL1&v=dQw4w9WgXcQ").unwrap();
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(TrackId::parse("https://example.com/song.mp3").is_err());
        assert!(TrackId::parse("https://www.youtube.com/watch?v=short").is_err());
        assert!(TrackId::parse("").is_err());
    }

    #[test]
    fn test_deserialize_validates_resolved_id() {
        let track: TrackId = serde_json::from_str("\"VID123\"").unwrap();
        assert_eq!(track.as_str(), "VID123");
        assert_eq!(serde_json::to_string(&track).unwrap(), "\"VID123\"");

        assert!(serde_json::from_str::<TrackId>("\"not a ref !!\"").is_err());
        assert!(serde_json::from_str::<TrackId>("\"\"").is_err());
    }

    #[test]
    fn test_bare_video_id() {
        assert_eq!(TrackId::parse(" dQw4w9WgXcQ ").unwrap().as_str(), "dQw4w9WgXcQ");
    }
}
