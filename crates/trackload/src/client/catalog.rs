//! Episode catalog read from the engage search service.
//!
//! The search endpoint answers with
//! `{"search-results": {"result": ...}}`, where `result` is a single object
//! when exactly one episode matches, an array otherwise, and missing when
//! nothing matches. Episode and series ids come back as strings or as bare
//! numbers. An entry of any other shape is skipped on its own.

use super::config::Credentials;
use rand::Rng;
use reqwest::Url;
use serde::Deserialize;
use trackload_core::{Error, Result};

/// The fields of a published episode a heartbeat needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Episode {
    pub id: String,
    pub series: String,
    pub media_type: String,
}

/// A non-empty list of episodes.
#[derive(Clone, Debug)]
pub struct Catalog {
    episodes: Vec<Episode>,
}

impl Catalog {
    /// # Errors
    ///
    /// Returns [`Error::Catalog`] if `episodes` is empty.
    pub fn new(episodes: Vec<Episode>) -> Result<Self> {
        if episodes.is_empty() {
            return Err(Error::catalog("no playable episodes published"));
        }
        Ok(Self { episodes })
    }

    /// Parses a search response body, skipping episodes that lack an id, a
    /// series or a media type, or that do not parse.
    pub fn from_search_json(body: &[u8]) -> Result<Self> {
        let response: SearchResponse = serde_json::from_slice(body)
            .map_err(|e| Error::catalog(format!("malformed search response: {e}")))?;
        let episodes = response
            .results
            .result
            .into_vec()
            .into_iter()
            .filter_map(|entry| RawEpisode::deserialize(entry).ok()?.into_episode())
            .collect();
        Self::new(episodes)
    }

    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    /// Uniformly random episode.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> &Episode {
        &self.episodes[rng.random_range(0..self.episodes.len())]
    }
}

/// Fetches the `limit` most recently published episodes.
///
/// # Errors
///
/// Returns [`Error::Catalog`] if the request fails, the node answers with an
/// error status, the body cannot be parsed or no usable episode is listed.
#[tracing::instrument(skip(client, credentials), err)]
pub async fn fetch(
    client: &reqwest::Client,
    search_url: Url,
    credentials: Option<&Credentials>,
    limit: usize,
) -> Result<Catalog> {
    let mut request = client
        .get(search_url)
        .query(&[("sort", "DATE_PUBLISHED_DESC")])
        .query(&[("limit", limit)]);
    if let Some(credentials) = credentials {
        request = request.basic_auth(&credentials.user, credentials.password.as_deref());
    }

    let response = request
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| Error::catalog(format!("search request failed: {e}")))?;
    let body = response
        .bytes()
        .await
        .map_err(|e| Error::catalog(format!("failed to read search response: {e}")))?;

    let catalog = Catalog::from_search_json(&body)?;
    tracing::info!("Loaded {} episodes", catalog.len());
    Ok(catalog)
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(rename = "search-results")]
    results: SearchResults,
}

#[derive(Deserialize)]
struct SearchResults {
    #[serde(default)]
    result: OneOrMany<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Many(items) => items,
            Self::One(item) => vec![item],
        }
    }
}

#[derive(Deserialize)]
struct RawEpisode {
    id: Option<TextOrNumber>,
    mediapackage: Option<RawMediaPackage>,
}

#[derive(Deserialize)]
struct RawMediaPackage {
    series: Option<TextOrNumber>,
    #[serde(rename = "type")]
    media_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Number(serde_json::Number),
}

impl From<TextOrNumber> for String {
    fn from(value: TextOrNumber) -> Self {
        match value {
            TextOrNumber::Text(text) => text,
            TextOrNumber::Number(number) => number.to_string(),
        }
    }
}

impl RawEpisode {
    fn into_episode(self) -> Option<Episode> {
        let mediapackage = self.mediapackage?;
        Some(Episode {
            id: self.id?.into(),
            series: mediapackage.series?.into(),
            media_type: mediapackage.media_type?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn episode(id: &str, series: serde_json::Value, media_type: &str) -> serde_json::Value {
        json!({
            "id": id,
            "dcTitle": "Lecture",
            "mediapackage": { "series": series, "type": media_type, "duration": 3_600_000 }
        })
    }

    #[test]
    fn result_may_be_a_single_object() {
        let body = json!({ "search-results": { "total": 1, "result": episode("e1", json!("20140119999"), "L01") } });
        let catalog = Catalog::from_search_json(body.to_string().as_bytes()).unwrap();
        assert_eq!(
            catalog.episodes(),
            &[Episode {
                id: String::from("e1"),
                series: String::from("20140119999"),
                media_type: String::from("L01"),
            }]
        );
    }

    #[test]
    fn numeric_series_ids_are_accepted() {
        let body = json!({ "search-results": { "result": [episode("e1", json!(20140119999_u64), "L01")] } });
        let catalog = Catalog::from_search_json(body.to_string().as_bytes()).unwrap();
        assert_eq!(catalog.episodes()[0].series, "20140119999");
    }

    #[test]
    fn incomplete_episodes_are_skipped() {
        let body = json!({ "search-results": { "result": [
            episode("e1", json!("2014"), "L01"),
            { "id": "no-mediapackage" },
            { "id": "no-series", "mediapackage": { "type": "L02" } },
            { "id": "no-type", "mediapackage": { "series": "2015" } },
            { "mediapackage": { "series": "2015", "type": "L02" } },
        ] } });
        let catalog = Catalog::from_search_json(body.to_string().as_bytes()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.episodes()[0].id, "e1");
    }

    #[test]
    fn oddly_shaped_entries_do_not_sink_the_catalog() {
        let body = json!({ "search-results": { "result": [
            { "id": 17, "mediapackage": { "series": "2014", "type": "L01" } },
            { "id": "object-series", "mediapackage": { "series": { "id": "2015" }, "type": "L02" } },
            { "id": ["list"], "mediapackage": { "series": "2015", "type": "L02" } },
            "not an episode",
            episode("e2", json!("2016"), "L03"),
        ] } });
        let catalog = Catalog::from_search_json(body.to_string().as_bytes()).unwrap();
        let ids: Vec<&str> = catalog.episodes().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["17", "e2"]);
    }

    #[test]
    fn single_malformed_result_is_an_empty_catalog() {
        let body = json!({ "search-results": { "result": { "id": 1, "mediapackage": 5 } } });
        let err = Catalog::from_search_json(body.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Catalog { .. }));
    }

    #[test]
    fn empty_catalog_is_an_error() {
        let body = json!({ "search-results": { "total": 0 } });
        let err = Catalog::from_search_json(body.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Catalog { .. }));
        assert!(matches!(Catalog::new(Vec::new()), Err(Error::Catalog { .. })));
    }

    #[test]
    fn choose_covers_every_episode() {
        let catalog = Catalog::new(
            (0..3)
                .map(|i| Episode {
                    id: format!("e{i}"),
                    series: String::from("2014"),
                    media_type: String::from("L01"),
                })
                .collect(),
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..100 {
            seen.insert(catalog.choose(&mut rng).id.clone());
        }
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn fetch_sends_sort_limit_and_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/episode.json"))
            .and(query_param("sort", "DATE_PUBLISHED_DESC"))
            .and(query_param("limit", "3"))
            .and(header("authorization", "Basic dXNlcjpwYXNz"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "search-results": { "result": [
                    episode("e1", json!("2014"), "L01"),
                    episode("e2", json!("2015"), "L02"),
                ] }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/search/episode.json", server.uri())).unwrap();
        let credentials = Credentials {
            user: String::from("user"),
            password: Some(String::from("pass")),
        };
        let catalog = fetch(&reqwest::Client::new(), url, Some(&credentials), 3)
            .await
            .unwrap();
        assert_eq!(catalog.len(), 2);
    }

    #[tokio::test]
    async fn error_status_is_a_catalog_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/episode.json"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/search/episode.json", server.uri())).unwrap();
        let err = fetch(&reqwest::Client::new(), url, None, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Catalog { .. }));
    }
}
