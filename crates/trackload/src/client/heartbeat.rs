use super::catalog::Episode;
use chrono::Utc;

/// The fixed part of the heartbeats a client sends for one episode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Heartbeat {
    episode_id: String,
    resource: String,
}

impl Heartbeat {
    pub fn for_episode(episode: &Episode) -> Self {
        Self {
            episode_id: episode.id.clone(),
            resource: resource_path(&episode.series, &episode.media_type),
        }
    }

    pub fn episode_id(&self) -> &str {
        &self.episode_id
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Query string of one heartbeat request, stamped with the current time.
    pub fn query(&self) -> [(&'static str, String); 8] {
        self.query_at(unix_timestamp())
    }

    fn query_at(&self, timestamp: String) -> [(&'static str, String); 8] {
        [
            ("_method", String::from("PUT")),
            ("id", self.episode_id.clone()),
            ("type", String::from("HEARTBEAT")),
            ("in", String::from("0")),
            ("out", String::from("0")),
            ("playing", String::from("true")),
            ("resource", self.resource.clone()),
            ("_", timestamp),
        ]
    }
}

/// `/<s[0..4]>/<s[4..6]>/<s[6..11]>/<media type>` for series id `s`.
///
/// Slices are taken in characters and clamp at the end of the id, so short
/// ids yield empty segments rather than failing.
pub fn resource_path(series: &str, media_type: &str) -> String {
    format!(
        "/{}/{}/{}/{media_type}",
        char_slice(series, 0, 4),
        char_slice(series, 4, 6),
        char_slice(series, 6, 11),
    )
}

fn char_slice(s: &str, start: usize, end: usize) -> &str {
    let byte_at = |n: usize| s.char_indices().nth(n).map_or(s.len(), |(i, _)| i);
    &s[byte_at(start)..byte_at(end)]
}

/// Seconds since the Unix epoch with microsecond precision, e.g.
/// `1718041234.512345`. Doubles as a cache buster.
fn unix_timestamp() -> String {
    let micros = Utc::now().timestamp_micros();
    format!("{}.{:06}", micros.div_euclid(1_000_000), micros.rem_euclid(1_000_000))
}
