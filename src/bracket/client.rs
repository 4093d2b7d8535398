//! HTTP client for the bracket service.
//!
//! Every call is a single round trip bounded by the configured timeout.
//! The API key travels in the query string on GET and DELETE and in the
//! JSON body on POST and PUT. Failures come back as [`BracketError`]; the
//! worker logs them and carries on.

use reqwest::{Method, RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::models::{
    KeyOnly, MatchEnvelope, MatchRecord, MatchUpdate, NewParticipant, ParticipantEnvelope,
    ParticipantRecord, TournamentEnvelope, find_report, parse_body, resolve_open_matches,
};
use crate::config::BracketConfig;
use crate::domain::{Entrant, PendingMatch, PlayerId};
use crate::error::BracketError;

/// Client bound to one tournament.
#[derive(Debug)]
pub struct BracketClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    slug: String,
    tournament_id: Option<i64>,
}

impl BracketClient {
    /// Builds a client; the tournament is looked up by [`BracketClient::load`].
    ///
    /// # Errors
    ///
    /// Returns [`BracketError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: &BracketConfig) -> Result<Self, BracketError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            slug: config.tournament_slug(),
            tournament_id: None,
        })
    }

    /// Returns the loaded tournament id.
    #[must_use]
    pub const fn tournament_id(&self) -> Option<i64> {
        self.tournament_id
    }

    /// Looks the tournament up by slug and remembers its id.
    ///
    /// On failure the id stays empty and every later call returns
    /// [`BracketError::NotLoaded`].
    ///
    /// # Errors
    ///
    /// Returns any [`BracketError`] raised by the lookup.
    pub async fn load(&mut self) -> Result<i64, BracketError> {
        let path = format!("/tournaments/{}.json", self.slug);
        let envelope: TournamentEnvelope = self
            .get(&path, &[("include_participants", "1"), ("include_matches", "1")])
            .await?;
        let id = envelope.tournament.id;
        self.tournament_id = Some(id);
        tracing::info!(slug = %self.slug, tournament_id = id, "bracket tournament loaded");
        Ok(id)
    }

    /// Registers one participant.
    ///
    /// # Errors
    ///
    /// Returns [`BracketError::NotLoaded`] or the failure of the request.
    pub async fn add_participant(&self, entrant: &Entrant) -> Result<(), BracketError> {
        let path = format!("/tournaments/{}/participants.json", self.tournament()?);
        let _: ParticipantEnvelope = self
            .send(Method::POST, &path, &NewParticipant::new(&self.api_key, entrant))
            .await?;
        tracing::debug!(player = %entrant.id, seed = entrant.seed, "participant registered");
        Ok(())
    }

    /// Starts the tournament.
    ///
    /// # Errors
    ///
    /// Returns [`BracketError::NotLoaded`] or the failure of the request.
    pub async fn start(&self) -> Result<(), BracketError> {
        let path = format!("/tournaments/{}/start.json", self.tournament()?);
        let _: serde_json::Value = self.send(Method::POST, &path, &self.key_only()).await?;
        tracing::info!("bracket started");
        Ok(())
    }

    /// Deletes every participant, then resets the bracket.
    ///
    /// A participant that fails to delete is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`BracketError::NotLoaded`], the failure of the participant
    /// listing, or the failure of the reset request.
    pub async fn reset(&self) -> Result<(), BracketError> {
        let id = self.tournament()?;
        for participant in self.participants().await? {
            let path = format!("/tournaments/{id}/participants/{}.json", participant.id);
            if let Err(err) = self.delete(&path).await {
                tracing::warn!(participant_id = participant.id, %err, "participant not deleted");
            }
        }
        let path = format!("/tournaments/{id}/reset.json");
        let _: serde_json::Value = self.send(Method::POST, &path, &self.key_only()).await?;
        tracing::info!("bracket reset");
        Ok(())
    }

    /// Lists registered participants.
    ///
    /// # Errors
    ///
    /// Returns [`BracketError::NotLoaded`] or the failure of the request.
    pub async fn participants(&self) -> Result<Vec<ParticipantRecord>, BracketError> {
        let path = format!("/tournaments/{}/participants.json", self.tournament()?);
        let records: Vec<ParticipantEnvelope> = self.get(&path, &[]).await?;
        Ok(records.into_iter().map(|r| r.participant).collect())
    }

    /// Lists open matches with their player identities resolved.
    ///
    /// # Errors
    ///
    /// Returns [`BracketError::NotLoaded`] or the failure of either listing.
    pub async fn open_matches(&self) -> Result<Vec<PendingMatch>, BracketError> {
        let matches = self.open_match_records().await?;
        let participants = self.participants().await?;
        Ok(resolve_open_matches(&matches, &participants))
    }

    /// Reports `winner` beating `loser` on their open match.
    ///
    /// # Errors
    ///
    /// Returns [`BracketError::UnknownParticipant`] or
    /// [`BracketError::MatchNotFound`] when the pairing cannot be located,
    /// or the failure of any request involved.
    pub async fn report(&self, winner: &PlayerId, loser: &PlayerId) -> Result<(), BracketError> {
        let id = self.tournament()?;
        let matches = self.open_match_records().await?;
        let participants = self.participants().await?;
        let report = find_report(&matches, &participants, winner, loser)?;
        let path = format!("/tournaments/{id}/matches/{}.json", report.match_id);
        let body = MatchUpdate {
            api_key: &self.api_key,
            result: report.fields,
        };
        let _: MatchEnvelope = self.send(Method::PUT, &path, &body).await?;
        tracing::info!(%winner, %loser, match_id = report.match_id, "result reported");
        Ok(())
    }

    async fn open_match_records(&self) -> Result<Vec<MatchRecord>, BracketError> {
        let path = format!("/tournaments/{}/matches.json", self.tournament()?);
        let records: Vec<MatchEnvelope> = self.get(&path, &[("state", "open")]).await?;
        Ok(records.into_iter().map(|r| r.record).collect())
    }

    fn tournament(&self) -> Result<i64, BracketError> {
        self.tournament_id.ok_or(BracketError::NotLoaded)
    }

    fn key_only(&self) -> KeyOnly<'_> {
        KeyOnly {
            api_key: self.api_key.as_str(),
        }
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, BracketError> {
        let base = format!("{}{path}", self.api_url);
        let url = if params.is_empty() {
            Url::parse(&base)
        } else {
            Url::parse_with_params(&base, params)
        };
        url.map_err(|err| BracketError::InvalidUrl(err.to_string()))
    }

    fn keyed_url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, BracketError> {
        let mut query = vec![("api_key", self.api_key.as_str())];
        query.extend_from_slice(params);
        self.url(path, &query)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, BracketError> {
        let body = execute(self.http.get(self.keyed_url(path, params)?)).await?;
        parse_body(&body)
    }

    async fn send<T, B>(&self, method: Method, path: &str, body: &B) -> Result<T, BracketError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self.http.request(method, self.url(path, &[])?).json(body);
        parse_body(&execute(request).await?)
    }

    async fn delete(&self, path: &str) -> Result<(), BracketError> {
        let body = execute(self.http.delete(self.keyed_url(path, &[])?)).await?;
        parse_body::<serde_json::Value>(&body).map(drop)
    }
}

/// Sends a request and returns the body of a successful response.
async fn execute(request: RequestBuilder) -> Result<String, BracketError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(BracketError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;

    use super::*;
    use crate::bracket::mock::{MockBracket, Route};

    const PARTICIPANTS: &str = r#"[
        {"participant":{"id":10,"name":"Alice","misc":"s1"}},
        {"participant":{"id":20,"name":"Bob","misc":"s2"}}
    ]"#;
    const OPEN: &str = r#"[{"match":{"id":7,"player1_id":20,"player2_id":10,"winner_id":null}}]"#;

    fn config(url: &str) -> BracketConfig {
        BracketConfig {
            api_url: url.to_string(),
            api_key: "key".to_string(),
            subdomain: String::new(),
            tournament_url: "spring".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    async fn loaded(mock: &MockBracket) -> BracketClient {
        let Ok(mut client) = BracketClient::new(&config(&mock.url)) else {
            panic!("client builds");
        };
        let Ok(id) = client.load().await else {
            panic!("tournament loads");
        };
        assert_eq!(id, 42);
        client
    }

    fn tournament_route() -> Route {
        Route::ok(Method::GET, "/tournaments/spring.json", r#"{"tournament":{"id":42}}"#)
    }

    #[tokio::test]
    async fn load_sends_key_and_includes() {
        let mock = MockBracket::start(vec![tournament_route()]).await;
        let client = loaded(&mock).await;
        assert_eq!(client.tournament_id(), Some(42));
        let Some(first) = mock.requests().into_iter().next() else {
            panic!("no request recorded");
        };
        assert_eq!(first.method, Method::GET);
        assert!(first.query.contains("api_key=key"));
        assert!(first.query.contains("include_participants=1"));
        assert!(first.query.contains("include_matches=1"));
    }

    #[tokio::test]
    async fn calls_before_load_are_refused() {
        let mock = MockBracket::start(vec![]).await;
        let Ok(client) = BracketClient::new(&config(&mock.url)) else {
            panic!("client builds");
        };
        assert!(matches!(client.start().await, Err(BracketError::NotLoaded)));
        assert!(matches!(client.open_matches().await, Err(BracketError::NotLoaded)));
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn failed_load_leaves_client_unloaded() {
        let mock = MockBracket::start(vec![Route::new(
            Method::GET,
            "/tournaments/spring.json",
            StatusCode::NOT_FOUND,
            r#"{"errors":["Requested tournament not found"]}"#,
        )])
        .await;
        let Ok(mut client) = BracketClient::new(&config(&mock.url)) else {
            panic!("client builds");
        };
        assert!(matches!(
            client.load().await,
            Err(BracketError::Status { status: 404, .. })
        ));
        assert_eq!(client.tournament_id(), None);
    }

    #[tokio::test]
    async fn add_participant_posts_key_in_body() {
        let mock = MockBracket::start(vec![
            tournament_route(),
            Route::ok(
                Method::POST,
                "/tournaments/42/participants.json",
                r#"{"participant":{"id":10,"name":"Alice","misc":"s1"}}"#,
            ),
        ])
        .await;
        let client = loaded(&mock).await;
        let entrant = Entrant {
            id: PlayerId::new("s1"),
            name: "Alice".to_string(),
            seed: 1,
        };
        assert!(client.add_participant(&entrant).await.is_ok());
        let Some(post) = mock.requests().into_iter().nth(1) else {
            panic!("no POST recorded");
        };
        let Ok(body) = serde_json::from_str::<serde_json::Value>(&post.body) else {
            panic!("json body");
        };
        assert_eq!(body.pointer("/api_key").and_then(|v| v.as_str()), Some("key"));
        assert_eq!(
            body.pointer("/participant/misc").and_then(|v| v.as_str()),
            Some("s1")
        );
        assert!(post.query.is_empty());
    }

    #[tokio::test]
    async fn open_matches_resolve_identities() {
        let mock = MockBracket::start(vec![
            tournament_route(),
            Route::ok(Method::GET, "/tournaments/42/matches.json", OPEN),
            Route::ok(Method::GET, "/tournaments/42/participants.json", PARTICIPANTS),
        ])
        .await;
        let client = loaded(&mock).await;
        let Ok(pending) = client.open_matches().await else {
            panic!("listing succeeds");
        };
        assert_eq!(pending.len(), 1);
        let Some(pairing) = pending.first() else {
            panic!("missing pairing");
        };
        assert_eq!(pairing.player1, PlayerId::new("s2"));
        assert_eq!(pairing.player2_name, "Alice");
        assert!(
            mock.requests()
                .iter()
                .any(|r| r.path.ends_with("matches.json") && r.query.contains("state=open"))
        );
    }

    #[tokio::test]
    async fn report_puts_score_for_player_two_win() {
        let mock = MockBracket::start(vec![
            tournament_route(),
            Route::ok(Method::GET, "/tournaments/42/matches.json", OPEN),
            Route::ok(Method::GET, "/tournaments/42/participants.json", PARTICIPANTS),
            Route::ok(
                Method::PUT,
                "/tournaments/42/matches/7.json",
                r#"{"match":{"id":7,"player1_id":20,"player2_id":10,"winner_id":10}}"#,
            ),
        ])
        .await;
        let client = loaded(&mock).await;
        assert!(client.report(&"s1".into(), &"s2".into()).await.is_ok());
        let Some(put) = mock.requests().into_iter().find(|r| r.method == Method::PUT) else {
            panic!("no PUT recorded");
        };
        let Ok(body) = serde_json::from_str::<serde_json::Value>(&put.body) else {
            panic!("json body");
        };
        assert_eq!(
            body.pointer("/match/scores_csv").and_then(|v| v.as_str()),
            Some("0-1")
        );
        assert_eq!(body.pointer("/match/winner_id").and_then(|v| v.as_i64()), Some(10));
    }

    #[tokio::test]
    async fn reset_deletes_participants_then_resets() {
        let mock = MockBracket::start(vec![
            tournament_route(),
            Route::ok(Method::GET, "/tournaments/42/participants.json", PARTICIPANTS),
            Route::ok(
                Method::DELETE,
                "/tournaments/42/participants/10.json",
                r#"{"participant":{"id":10}}"#,
            ),
            Route::ok(
                Method::DELETE,
                "/tournaments/42/participants/20.json",
                r#"{"participant":{"id":20}}"#,
            ),
            Route::ok(Method::POST, "/tournaments/42/reset.json", r#"{"tournament":{"id":42}}"#),
        ])
        .await;
        let client = loaded(&mock).await;
        assert!(client.reset().await.is_ok());
        let calls: Vec<String> = mock
            .requests()
            .iter()
            .skip(1)
            .map(|r| format!("{} {}", r.method, r.path))
            .collect();
        assert_eq!(
            calls,
            vec![
                "GET /tournaments/42/participants.json",
                "DELETE /tournaments/42/participants/10.json",
                "DELETE /tournaments/42/participants/20.json",
                "POST /tournaments/42/reset.json",
            ]
        );
    }

    #[tokio::test]
    async fn short_body_is_a_failure() {
        let mock = MockBracket::start(vec![
            tournament_route(),
            Route::ok(Method::POST, "/tournaments/42/start.json", " "),
        ])
        .await;
        let client = loaded(&mock).await;
        assert!(matches!(client.start().await, Err(BracketError::ShortBody(_))));
    }
}
