//! Heartbeat clients.
//!
//! A [`HeartbeatClient`] plays one episode: it sends a heartbeat, sleeps for a
//! random [`Throttle`] delay and repeats, with no queue and no natural end. To
//! look like a stream of distinct viewers it drops its HTTP session (and the
//! cookies the node handed out) every `reqs_per_session` requests.

use super::catalog::Episode;
use super::heartbeat::Heartbeat;
use reqwest::Url;
use reqwest::header::USER_AGENT;
use std::sync::Arc;
use tokio::time::{Instant, sleep};
use trackload_core::{Error, MetricSample, MetricsSink, Result, SyntheticData, Throttle};

/// Name of the timing sample emitted after every delivered heartbeat.
pub const HEARTBEAT_SAMPLE: &str = "heartbeat";

/// Decides when a client starts a fresh session.
///
/// With `per_session = N`, requests `1..=N` use the initial session and a new
/// one begins on request `k * N + 1` for every `k >= 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionRotation {
    per_session: usize,
    in_session: usize,
    sessions: usize,
}

impl SessionRotation {
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `per_session` is zero.
    pub fn new(per_session: usize) -> Result<Self> {
        if per_session == 0 {
            return Err(Error::config("requests per session must be at least 1"));
        }
        Ok(Self {
            per_session,
            in_session: 0,
            sessions: 1,
        })
    }

    /// Accounts for the next request and tells whether it must go out on a
    /// fresh session.
    pub fn next_request(&mut self) -> bool {
        let fresh = self.in_session == self.per_session;
        if fresh {
            self.in_session = 0;
            self.sessions += 1;
        }
        self.in_session += 1;
        fresh
    }

    /// Sessions used so far, including the initial one.
    pub const fn sessions(&self) -> usize {
        self.sessions
    }
}

/// Settings shared by every client of a run.
#[derive(Clone)]
pub struct ClientContext {
    pub endpoint: Url,
    pub throttle: Throttle,
    pub reqs_per_session: usize,
    pub sink: Arc<dyn MetricsSink>,
}

/// Counters of one client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClientReport {
    pub requests: usize,
    pub failures: usize,
    pub sessions: usize,
}

pub struct HeartbeatClient {
    client_id: usize,
    ctx: ClientContext,
    heartbeat: Heartbeat,
    user_agent: String,
    http: reqwest::Client,
    rotation: SessionRotation,
    data: SyntheticData,
    report: ClientReport,
}

impl HeartbeatClient {
    pub fn new(
        client_id: usize,
        ctx: ClientContext,
        episode: &Episode,
        mut data: SyntheticData,
    ) -> Result<Self> {
        let rotation = SessionRotation::new(ctx.reqs_per_session)?;
        Ok(Self {
            client_id,
            heartbeat: Heartbeat::for_episode(episode),
            user_agent: data.user_agent(),
            http: http_session()?,
            rotation,
            data,
            ctx,
            report: ClientReport::default(),
        })
    }

    pub const fn report(&self) -> ClientReport {
        ClientReport {
            sessions: self.rotation.sessions(),
            ..self.report
        }
    }

    /// Sends one heartbeat, rotating the session first when it is due.
    ///
    /// Only transport failures are errors; the response status and body are
    /// ignored.
    pub async fn beat(&mut self) -> Result<()> {
        if self.rotation.next_request() {
            tracing::debug!(
                "Client {} starting session {}",
                self.client_id,
                self.rotation.sessions()
            );
            self.http = http_session()?;
        }

        let started = Instant::now();
        self.http
            .get(self.ctx.endpoint.clone())
            .query(&self.heartbeat.query())
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(Error::connect)?;
        self.ctx
            .sink
            .record(MetricSample::duration(HEARTBEAT_SAMPLE, started.elapsed()));
        tracing::info!(
            "Client {} sent heartbeat for episode {}",
            self.client_id,
            self.heartbeat.episode_id()
        );
        Ok(())
    }

    /// One loop iteration: a heartbeat, then the throttle pause.
    async fn step(&mut self) {
        self.report.requests += 1;
        if let Err(e) = self.beat().await {
            self.report.failures += 1;
            tracing::warn!("Client {} heartbeat failed: {e}", self.client_id);
        }
        let delay = self.ctx.throttle.next_delay(self.data.rng());
        tracing::debug!("Client {} waiting {delay:?}", self.client_id);
        sleep(delay).await;
    }

    /// Runs exactly `requests` iterations.
    pub async fn run_for(&mut self, requests: usize) -> ClientReport {
        for _ in 0..requests {
            self.step().await;
        }
        self.report()
    }

    /// Loops until the task is cancelled.
    pub async fn run(mut self) {
        tracing::info!(
            "Client {} playing episode {} ({})",
            self.client_id,
            self.heartbeat.episode_id(),
            self.heartbeat.resource()
        );
        loop {
            self.step().await;
        }
    }
}

/// A new HTTP session with an empty cookie jar.
fn http_session() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .map_err(Error::connect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::tests::LogCapture;
    use core::time::Duration;
    use trackload_core::NoopSink;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn episode() -> Episode {
        Episode {
            id: String::from("ep-42"),
            series: String::from("20140119999"),
            media_type: String::from("L01"),
        }
    }

    fn context(endpoint: Url, reqs_per_session: usize) -> ClientContext {
        ClientContext {
            endpoint,
            throttle: Throttle::with_unit(2, Duration::from_millis(1)).unwrap(),
            reqs_per_session,
            sink: Arc::new(NoopSink),
        }
    }

    async fn usertracking(server: &MockServer) -> Url {
        Url::parse(&format!("{}/usertracking/", server.uri())).unwrap()
    }

    #[test]
    fn rotation_starts_fresh_sessions_on_schedule() {
        let mut rotation = SessionRotation::new(5).unwrap();
        let fresh: Vec<usize> = (1..=16).filter(|_| rotation.next_request()).collect();
        assert_eq!(fresh, vec![6, 11, 16]);
        assert_eq!(rotation.sessions(), 4);
    }

    #[test]
    fn rotation_every_request() {
        let mut rotation = SessionRotation::new(1).unwrap();
        assert!(!rotation.next_request());
        assert!(rotation.next_request());
        assert!(rotation.next_request());
    }

    #[test]
    fn zero_requests_per_session_is_rejected() {
        assert!(matches!(SessionRotation::new(0), Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn heartbeat_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/usertracking/"))
            .and(query_param("_method", "PUT"))
            .and(query_param("id", "ep-42"))
            .and(query_param("type", "HEARTBEAT"))
            .and(query_param("in", "0"))
            .and(query_param("out", "0"))
            .and(query_param("playing", "true"))
            .and(query_param("resource", "/2014/01/19999/L01"))
            .respond_with(ResponseTemplate::new(204))
            .expect(3)
            .mount(&server)
            .await;

        let mut client = HeartbeatClient::new(
            0,
            context(usertracking(&server).await, 100),
            &episode(),
            SyntheticData::seeded(1),
        )
        .unwrap();
        let report = client.run_for(3).await;
        assert_eq!(
            report,
            ClientReport {
                requests: 3,
                failures: 0,
                sessions: 1
            }
        );

        let requests = server.received_requests().await.unwrap();
        let agents: Vec<_> = requests
            .iter()
            .map(|r| r.headers.get("user-agent").cloned())
            .collect();
        assert!(agents.iter().all(|a| a.is_some() && *a == agents[0]));
        assert!(requests.iter().all(|r| r.url.query_pairs().any(|(k, _)| k == "_")));
    }

    #[tokio::test]
    async fn cookies_are_dropped_with_each_new_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/usertracking/"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("set-cookie", "JSESSIONID=abc; Path=/"),
            )
            .mount(&server)
            .await;

        let mut client = HeartbeatClient::new(
            1,
            context(usertracking(&server).await, 5),
            &episode(),
            SyntheticData::seeded(2),
        )
        .unwrap();
        let report = client.run_for(12).await;
        assert_eq!(report.sessions, 3);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 12);
        let cookieless: Vec<usize> = requests
            .iter()
            .enumerate()
            .filter(|(_, r)| r.headers.get("cookie").is_none())
            .map(|(i, _)| i + 1)
            .collect();
        assert_eq!(cookieless, vec![1, 6, 11]);
    }

    #[tokio::test]
    async fn status_codes_are_not_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut client = HeartbeatClient::new(
            2,
            context(usertracking(&server).await, 10),
            &episode(),
            SyntheticData::seeded(3),
        )
        .unwrap();
        assert_eq!(client.run_for(2).await.failures, 0);
    }

    #[tokio::test]
    async fn transport_failures_are_counted_and_the_loop_continues() {
        // Nothing listens on the discard port.
        let endpoint = Url::parse("http://127.0.0.1:9/usertracking/").unwrap();
        let mut client =
            HeartbeatClient::new(3, context(endpoint, 2), &episode(), SyntheticData::seeded(4))
                .unwrap();
        let report = client.run_for(3).await;
        assert_eq!(report.requests, 3);
        assert_eq!(report.failures, 3);
        assert_eq!(report.sessions, 2);
    }

    #[tokio::test]
    async fn each_heartbeat_is_logged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let (capture, _guard) = LogCapture::install();
        let mut client = HeartbeatClient::new(
            7,
            context(usertracking(&server).await, 10),
            &episode(),
            SyntheticData::seeded(6),
        )
        .unwrap();
        client.run_for(3).await;

        let lines = capture.lines_containing("Client 7 sent heartbeat");
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|line| line.contains("ep-42") && line.contains("INFO")));
    }

    #[tokio::test]
    async fn delivered_heartbeats_are_timed() {
        #[derive(Default)]
        struct Counter(parking_lot::Mutex<usize>);
        impl MetricsSink for Counter {
            fn record(&self, sample: MetricSample) {
                assert_eq!(sample.name, HEARTBEAT_SAMPLE);
                *self.0.lock() += 1;
            }
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", "probe"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let counter = Arc::new(Counter::default());
        let mut ctx = context(usertracking(&server).await, 10);
        ctx.sink = counter.clone();
        let mut client =
            HeartbeatClient::new(4, ctx, &episode(), SyntheticData::seeded(5)).unwrap();
        client.user_agent = String::from("probe");
        client.run_for(4).await;
        assert_eq!(*counter.0.lock(), 4);
    }
}
