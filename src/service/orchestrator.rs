//! Message router: the single owner of relay state.
//!
//! [`Orchestrator`] holds the session registry, the arena allocator, the
//! plugin bridge, the roster and the tournament flag. It runs on one task
//! and applies [`Event`]s in arrival order, so none of that state needs a
//! lock. Inbound frames are dispatched through [`handler_for`], an
//! exhaustive table from [`MessageKind`] to handler.
//!
//! Bracket work is submitted to the [`BracketQueue`] tagged with the
//! current epoch. Replies from an older epoch (a start or stop happened in
//! between) are discarded. Open-match listings are also numbered; only the
//! reply to the newest listing job is allocated from, since an older one
//! can still contain a match whose result was reported after it was taken.

use chrono::{DateTime, Utc};
use serde_json::value::RawValue;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::event::{Event, StatusSnapshot};
use crate::bracket::{BracketJob, BracketQueue, BracketReply};
use crate::domain::{ArenaAllocator, ConnectionId, PendingMatch, Player, PlayerId, seed_entrants};
use crate::error::ManagerError;
use crate::plugin::{BridgeNotice, PluginBridge};
use crate::ws::messages::{
    self, Empty, Envelope, MatchBegan, MatchCancel, MatchDetails, MatchResults, MessageKind,
    ServerHello, UsersInServer, decode_payload,
};
use crate::ws::registry::{Role, SessionRegistry};

/// Signature shared by every inbound message handler.
pub type Handler =
    fn(&mut Orchestrator, ConnectionId, Option<&RawValue>) -> Result<(), ManagerError>;

/// Dispatch table: the handler for each message kind.
#[must_use]
pub fn handler_for(kind: MessageKind) -> Handler {
    match kind {
        MessageKind::ServerHello => Orchestrator::on_server_hello,
        MessageKind::TournamentStart => Orchestrator::on_tournament_start,
        MessageKind::TournamentStop => Orchestrator::on_tournament_stop,
        MessageKind::UsersInServer => Orchestrator::on_users_in_server,
        MessageKind::MatchResults => Orchestrator::on_match_results,
        MessageKind::MatchBegan => Orchestrator::on_match_began,
        MessageKind::MatchDetails => Orchestrator::on_match_details,
        MessageKind::SetMatchScore => Orchestrator::on_set_match_score,
        MessageKind::MatchCancel => Orchestrator::on_match_cancel,
    }
}

/// Tournament flag plus the epoch used to fence bracket replies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TournamentState {
    active: bool,
    epoch: u64,
    started_at: Option<DateTime<Utc>>,
    seeded: bool,
}

impl TournamentState {
    /// Returns `true` while a tournament is running.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Returns the current epoch.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns when the running tournament started.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns `true` once entrants were submitted for the current epoch.
    #[must_use]
    pub const fn is_seeded(&self) -> bool {
        self.seeded
    }

    fn start(&mut self) -> u64 {
        self.active = true;
        self.epoch += 1;
        self.started_at = Some(Utc::now());
        self.seeded = false;
        self.epoch
    }

    fn stop(&mut self) -> u64 {
        self.active = false;
        self.epoch += 1;
        self.started_at = None;
        self.seeded = false;
        self.epoch
    }
}

/// Owner of all relay state; see the module docs.
#[derive(Debug)]
pub struct Orchestrator {
    admin_key: String,
    sessions: SessionRegistry,
    arenas: ArenaAllocator,
    plugin: PluginBridge,
    bracket: BracketQueue,
    players: Vec<Player>,
    tournament: TournamentState,
    listing: u64,
}

impl Orchestrator {
    /// Creates an orchestrator with no sessions and no plugin link.
    #[must_use]
    pub fn new(admin_key: impl Into<String>, arenas: ArenaAllocator, bracket: BracketQueue) -> Self {
        Self {
            admin_key: admin_key.into(),
            sessions: SessionRegistry::new(),
            arenas,
            plugin: PluginBridge::new(),
            bracket,
            players: Vec::new(),
            tournament: TournamentState::default(),
            listing: 0,
        }
    }

    /// Spawns the event loop on the runtime.
    pub fn spawn(self, events: mpsc::UnboundedReceiver<Event>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }

    /// Applies events until every sender is gone.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<Event>) {
        tracing::info!("orchestrator started");
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        tracing::info!("orchestrator stopped");
    }

    /// Applies one event.
    pub fn handle(&mut self, event: Event) {
        match event {
            Event::SessionOpened { id, outbox } => {
                self.sessions.register(id, outbox);
                tracing::debug!(connection_id = %id, sessions = self.sessions.len(), "session registered");
            }
            Event::SessionClosed { id } => {
                if self.sessions.unregister(id) {
                    tracing::debug!(connection_id = %id, "session unregistered");
                }
            }
            Event::SessionFrame { id, text } => self.on_frame(id, &text),
            Event::PluginConnecting => self.plugin.connecting(),
            Event::PluginConnected { outbox } => self.plugin.connected(outbox),
            Event::PluginDisconnected => self.plugin.disconnected(),
            Event::PluginFrame { text } => {
                if let Some(notice) = self.plugin.handle_frame(&text) {
                    self.on_plugin_notice(notice);
                }
            }
            Event::Bracket(reply) => self.on_bracket(reply),
            Event::Status(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    /// Builds the status view.
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            active: self.tournament.is_active(),
            epoch: self.tournament.epoch(),
            started_at: self.tournament.started_at(),
            plugin: self.plugin.state(),
            connections: self.sessions.counts(),
            players: self.players.len(),
            arenas: self.arenas.snapshot(),
        }
    }

    /// Returns the session registry.
    #[must_use]
    pub const fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Returns the arena allocator.
    #[must_use]
    pub const fn arenas(&self) -> &ArenaAllocator {
        &self.arenas
    }

    /// Returns the plugin bridge.
    #[must_use]
    pub const fn plugin(&self) -> &PluginBridge {
        &self.plugin
    }

    /// Returns the current roster, in seed order once seeded.
    #[must_use]
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Returns the tournament state.
    #[must_use]
    pub const fn tournament(&self) -> &TournamentState {
        &self.tournament
    }

    fn on_frame(&mut self, id: ConnectionId, text: &str) {
        let envelope = match Envelope::parse(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(connection_id = %id, %err, "undecodable frame");
                self.reply_error(id, &err);
                return;
            }
        };
        let Some(kind_name) = envelope.kind.as_deref() else {
            tracing::warn!(connection_id = %id, "frame without type ignored");
            return;
        };
        let Some(kind) = MessageKind::from_wire(kind_name) else {
            tracing::warn!(connection_id = %id, kind = kind_name, "unknown message type ignored");
            return;
        };
        tracing::debug!(connection_id = %id, kind = kind.as_str(), "dispatching");
        match handler_for(kind)(self, id, envelope.payload) {
            Ok(()) => {}
            Err(err @ ManagerError::Decode(_)) => {
                tracing::warn!(connection_id = %id, kind = kind.as_str(), %err, "bad payload");
                self.reply_error(id, &err);
            }
            Err(err) => {
                tracing::warn!(connection_id = %id, kind = kind.as_str(), %err, "handler failed");
            }
        }
    }

    fn reply_error(&self, id: ConnectionId, err: &ManagerError) {
        match messages::encode_error(&err.to_string()) {
            Ok(frame) => {
                self.sessions.enqueue(id, frame);
            }
            Err(encode_err) => tracing::error!(%encode_err, "error frame not encoded"),
        }
    }

    fn broadcast_notice(&self, kind: MessageKind) -> Result<(), ManagerError> {
        let frame = messages::encode(kind.as_str(), Empty {})?;
        let reached = self.sessions.broadcast_to_servers(&frame);
        tracing::info!(kind = kind.as_str(), servers = reached, "notice broadcast");
        Ok(())
    }

    fn on_server_hello(
        &mut self,
        id: ConnectionId,
        payload: Option<&RawValue>,
    ) -> Result<(), ManagerError> {
        let hello: ServerHello = decode_payload(payload)?;
        let role = if hello.api_key == self.admin_key {
            Role::Admin
        } else {
            Role::Server
        };
        if self.sessions.classify(id, role) {
            tracing::info!(connection_id = %id, role = ?role, "connection classified");
        }
        Ok(())
    }

    fn on_tournament_start(
        &mut self,
        id: ConnectionId,
        _payload: Option<&RawValue>,
    ) -> Result<(), ManagerError> {
        let epoch = self.tournament.start();
        tracing::info!(connection_id = %id, epoch, "tournament started");
        self.bracket.submit(BracketJob::Reset { epoch });
        if let Err(err) = self.plugin.request_players() {
            tracing::warn!(%err, "roster request not sent; waiting for plugin");
        }
        self.broadcast_notice(MessageKind::TournamentStart)
    }

    fn on_tournament_stop(
        &mut self,
        id: ConnectionId,
        _payload: Option<&RawValue>,
    ) -> Result<(), ManagerError> {
        let epoch = self.tournament.stop();
        self.arenas.release_all();
        tracing::info!(connection_id = %id, epoch, "tournament stopped");
        self.broadcast_notice(MessageKind::TournamentStop)
    }

    fn on_users_in_server(
        &mut self,
        id: ConnectionId,
        payload: Option<&RawValue>,
    ) -> Result<(), ManagerError> {
        let message: UsersInServer = decode_payload(payload)?;
        let Some(roster) = message.players else {
            tracing::debug!(connection_id = %id, "roster push without players");
            return Ok(());
        };
        self.players = roster.into_iter().map(Player::from).collect();
        tracing::info!(connection_id = %id, players = self.players.len(), "server roster received");
        self.submit_seed();
        Ok(())
    }

    fn on_match_results(
        &mut self,
        id: ConnectionId,
        payload: Option<&RawValue>,
    ) -> Result<(), ManagerError> {
        let result: MatchResults = decode_payload(payload)?;
        tracing::info!(
            connection_id = %id,
            winner = %result.winner,
            loser = %result.loser,
            arena = result.arena,
            "match result reported"
        );
        let listing = self.next_listing();
        self.bracket.submit(BracketJob::Report {
            epoch: self.tournament.epoch(),
            listing,
            winner: PlayerId::new(result.winner),
            loser: PlayerId::new(result.loser),
        });
        self.release(result.arena);
        Ok(())
    }

    fn on_match_began(
        &mut self,
        id: ConnectionId,
        payload: Option<&RawValue>,
    ) -> Result<(), ManagerError> {
        let began: MatchBegan = decode_payload(payload)?;
        tracing::info!(
            connection_id = %id,
            player1 = began.player1(),
            player2 = began.player2(),
            "match began"
        );
        Ok(())
    }

    fn on_match_details(
        &mut self,
        id: ConnectionId,
        payload: Option<&RawValue>,
    ) -> Result<(), ManagerError> {
        let details: MatchDetails = decode_payload(payload)?;
        let Some(slot) = self.arenas.slot_for_arena(details.arena_id) else {
            tracing::warn!(connection_id = %id, arena = details.arena_id, "match details for unknown arena");
            return Ok(());
        };
        self.arenas.record(
            slot,
            PlayerId::new(details.p1_id),
            PlayerId::new(details.p2_id),
        )?;
        let frame = messages::encode_raw(MessageKind::MatchDetails, payload)?;
        self.sessions.broadcast_to_servers(&frame);
        Ok(())
    }

    fn on_set_match_score(
        &mut self,
        _id: ConnectionId,
        payload: Option<&RawValue>,
    ) -> Result<(), ManagerError> {
        let frame = messages::encode_raw(MessageKind::SetMatchScore, payload)?;
        self.sessions.broadcast_to_servers(&frame);
        Ok(())
    }

    fn on_match_cancel(
        &mut self,
        id: ConnectionId,
        payload: Option<&RawValue>,
    ) -> Result<(), ManagerError> {
        let cancel: MatchCancel = decode_payload(payload)?;
        tracing::info!(connection_id = %id, arena = cancel.arena, "match cancelled");
        self.release(cancel.arena);
        Ok(())
    }

    fn on_plugin_notice(&mut self, notice: BridgeNotice) {
        match notice {
            BridgeNotice::RosterReplaced(players) => {
                self.players = players;
                if !self.tournament.is_active() || self.players.is_empty() {
                    return;
                }
                if self.tournament.is_seeded() {
                    tracing::debug!(players = self.players.len(), "roster refreshed, already seeded");
                    return;
                }
                self.submit_seed();
            }
            BridgeNotice::MatchEnded {
                winner,
                loser,
                arena,
            } => {
                if !self.tournament.is_active() {
                    tracing::info!(%winner, %loser, arena, "match end outside a tournament ignored");
                    return;
                }
                let listing = self.next_listing();
                self.bracket.submit(BracketJob::Report {
                    epoch: self.tournament.epoch(),
                    listing,
                    winner,
                    loser,
                });
                self.release(arena);
            }
            BridgeNotice::ArenaVacated { arena } => self.release(arena),
        }
    }

    fn on_bracket(&mut self, reply: BracketReply) {
        let current = self.tournament.epoch();
        if reply.epoch() != current {
            tracing::debug!(reply_epoch = reply.epoch(), current, "stale bracket reply discarded");
            return;
        }
        match reply {
            BracketReply::ResetComplete { .. } => tracing::debug!("bracket reset finished"),
            BracketReply::OpenMatches {
                listing, matches, ..
            } => {
                if listing != self.listing {
                    tracing::debug!(listing, newest = self.listing, "superseded listing discarded");
                    return;
                }
                self.allocate(&matches);
            }
        }
    }

    fn next_listing(&mut self) -> u64 {
        self.listing += 1;
        self.listing
    }

    /// Seeds the current roster and queues its registration.
    fn submit_seed(&mut self) {
        let entrants = seed_entrants(&mut self.players);
        let listing = self.next_listing();
        self.tournament.seeded = true;
        self.bracket.submit(BracketJob::Seed {
            epoch: self.tournament.epoch(),
            listing,
            entrants,
        });
    }

    fn release(&mut self, arena: i64) {
        match self.arenas.release_arena(arena) {
            Some(slot) => tracing::debug!(arena, slot, "arena released"),
            None => tracing::warn!(arena, "release of unknown arena ignored"),
        }
    }

    /// Allocation pass: places pairings, then asks the plugin to move the
    /// players when both are mapped to plugin clients.
    fn allocate(&mut self, pending: &[PendingMatch]) {
        let assignments = self.arenas.allocate(pending);
        for assignment in &assignments {
            let arena = assignment.arena_number();
            let pairing = &assignment.pairing;
            tracing::info!(
                arena,
                player1 = %pairing.player1_name,
                player2 = %pairing.player2_name,
                "match assigned"
            );
            let clients = (
                self.plugin.client_for(&pairing.player1),
                self.plugin.client_for(&pairing.player2),
            );
            let (Some(first), Some(second)) = clients else {
                tracing::debug!(arena, "players not mapped to plugin clients");
                continue;
            };
            for client in [first, second] {
                if let Err(err) = self.plugin.move_player(client, arena) {
                    tracing::warn!(client, arena, %err, "player move not sent");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::Outbox;
    use crate::plugin::LinkState;
    use crate::service::OrchestratorHandle;

    const ROSTER: &str = r#"{"type":"response","command":"get_players","players":[
        {"id":1,"name":"Alice","elo":1200},{"id":2,"name":"Bob","elo":1800}]}"#;

    fn orchestrator() -> (Orchestrator, mpsc::UnboundedReceiver<BracketJob>) {
        let (queue, jobs) = BracketQueue::channel();
        (
            Orchestrator::new("secret", ArenaAllocator::default(), queue),
            jobs,
        )
    }

    fn open(orch: &mut Orchestrator) -> (ConnectionId, Arc<Outbox>) {
        let id = ConnectionId::new();
        let outbox = Arc::new(Outbox::new());
        orch.handle(Event::SessionOpened {
            id,
            outbox: Arc::clone(&outbox),
        });
        (id, outbox)
    }

    fn send(orch: &mut Orchestrator, id: ConnectionId, text: &str) {
        orch.handle(Event::SessionFrame {
            id,
            text: text.to_string(),
        });
    }

    fn server(orch: &mut Orchestrator) -> (ConnectionId, Arc<Outbox>) {
        let (id, outbox) = open(orch);
        send(orch, id, r#"{"type":"ServerHello","payload":{"apiKey":"server"}}"#);
        (id, outbox)
    }

    fn admin(orch: &mut Orchestrator) -> (ConnectionId, Arc<Outbox>) {
        let (id, outbox) = open(orch);
        send(orch, id, r#"{"type":"ServerHello","payload":{"apiKey":"secret"}}"#);
        (id, outbox)
    }

    fn connect_plugin(orch: &mut Orchestrator) -> Arc<Outbox> {
        let outbox = Arc::new(Outbox::new());
        orch.handle(Event::PluginConnecting);
        orch.handle(Event::PluginConnected {
            outbox: Arc::clone(&outbox),
        });
        outbox
    }

    fn plugin_frame(orch: &mut Orchestrator, text: &str) {
        orch.handle(Event::PluginFrame {
            text: text.to_string(),
        });
    }

    fn drain(outbox: &Outbox) -> Vec<String> {
        std::iter::from_fn(|| outbox.pop()).collect()
    }

    fn jobs_of(jobs: &mut mpsc::UnboundedReceiver<BracketJob>) -> Vec<BracketJob> {
        std::iter::from_fn(|| jobs.try_recv().ok()).collect()
    }

    fn pairing(a: &str, b: &str) -> PendingMatch {
        PendingMatch {
            player1: PlayerId::new(a),
            player1_name: a.to_uppercase(),
            player2: PlayerId::new(b),
            player2_name: b.to_uppercase(),
        }
    }

    fn start(orch: &mut Orchestrator, admin_id: ConnectionId) {
        send(orch, admin_id, r#"{"type":"TournamentStart","payload":{}}"#);
    }

    #[test]
    fn dispatch_table_covers_every_kind() {
        for kind in MessageKind::ALL {
            let _handler: Handler = handler_for(kind);
        }
    }

    #[test]
    fn hello_classifies_by_key() {
        let (mut orch, _jobs) = orchestrator();
        let (srv, _) = server(&mut orch);
        let (adm, _) = admin(&mut orch);
        assert_eq!(orch.sessions().role(srv), Some(Role::Server));
        assert_eq!(orch.sessions().role(adm), Some(Role::Admin));
        assert_eq!(orch.sessions().admin(), Some(adm));
    }

    #[test]
    fn second_admin_replaces_first() {
        let (mut orch, _jobs) = orchestrator();
        let (first, _) = admin(&mut orch);
        let (second, _) = admin(&mut orch);
        assert_eq!(orch.sessions().admin(), Some(second));
        assert_eq!(orch.sessions().role(first), Some(Role::Unclassified));
        assert_eq!(orch.sessions().len(), 2);
    }

    #[test]
    fn closing_admin_clears_pointer() {
        let (mut orch, _jobs) = orchestrator();
        let (adm, _) = admin(&mut orch);
        orch.handle(Event::SessionClosed { id: adm });
        orch.handle(Event::SessionClosed { id: adm });
        assert_eq!(orch.sessions().admin(), None);
        assert!(orch.sessions().is_empty());
    }

    #[test]
    fn match_details_rebroadcast_verbatim_to_servers_only() {
        let (mut orch, _jobs) = orchestrator();
        let (_, server_a) = server(&mut orch);
        let (_, server_b) = server(&mut orch);
        let (_, admin_box) = admin(&mut orch);
        let (sender, sender_box) = open(&mut orch);

        let payload = r#"{"arenaId":3, "p1Id":"a","p2Id":"b","rounds":[1,2],"extra":{"k":null}}"#;
        send(
            &mut orch,
            sender,
            &format!(r#"{{"type":"MatchDetails","payload":{payload}}}"#),
        );

        let expected = format!(r#"{{"type":"MatchDetails","payload":{payload}}}"#);
        assert_eq!(drain(&server_a), vec![expected.clone()]);
        assert_eq!(drain(&server_b), vec![expected]);
        assert!(drain(&admin_box).is_empty());
        assert!(drain(&sender_box).is_empty());

        let Some(slot) = orch.arenas().slot(2) else {
            panic!("slot exists");
        };
        assert!(slot.has_player(&PlayerId::new("a")));
        assert!(slot.has_player(&PlayerId::new("b")));
    }

    #[test]
    fn match_details_for_unknown_arena_is_not_forwarded() {
        let (mut orch, _jobs) = orchestrator();
        let (srv, server_box) = server(&mut orch);
        send(
            &mut orch,
            srv,
            r#"{"type":"MatchDetails","payload":{"arenaId":17,"p1Id":"a","p2Id":"b"}}"#,
        );
        assert!(drain(&server_box).is_empty());
        assert_eq!(orch.arenas().occupied_count(), 0);
    }

    #[test]
    fn set_match_score_is_pure_rebroadcast() {
        let (mut orch, _jobs) = orchestrator();
        let (srv, server_box) = server(&mut orch);
        send(
            &mut orch,
            srv,
            r#"{"type":"SetMatchScore","payload":{"arena":2,"p1Score":3}}"#,
        );
        assert_eq!(
            drain(&server_box),
            vec![r#"{"type":"SetMatchScore","payload":{"arena":2,"p1Score":3}}"#.to_string()]
        );
        assert_eq!(orch.arenas().occupied_count(), 0);
    }

    #[test]
    fn decode_errors_reply_to_sender_only() {
        let (mut orch, _jobs) = orchestrator();
        let (srv, server_box) = server(&mut orch);
        let (bad, bad_box) = open(&mut orch);

        send(&mut orch, bad, "not json");
        send(
            &mut orch,
            bad,
            r#"{"type":"MatchResults","payload":{"winner":"a","loser":"b","arena":"five"}}"#,
        );

        let replies = drain(&bad_box);
        assert_eq!(replies.len(), 2);
        assert!(replies.iter().all(|r| r.starts_with(r#"{"type":"Error","payload":{"message":"#)));
        assert!(drain(&server_box).is_empty());
        assert_eq!(orch.sessions().role(srv), Some(Role::Server));
    }

    #[test]
    fn frames_without_known_type_are_ignored() {
        let (mut orch, mut jobs) = orchestrator();
        let (id, outbox) = open(&mut orch);
        send(&mut orch, id, r#"{"payload":{}}"#);
        send(&mut orch, id, r#"{"type":"Teleport","payload":{}}"#);
        assert!(drain(&outbox).is_empty());
        assert!(jobs_of(&mut jobs).is_empty());
    }

    #[test]
    fn start_resets_requests_roster_and_notifies_servers() {
        let (mut orch, mut jobs) = orchestrator();
        let plugin = connect_plugin(&mut orch);
        let (_, server_box) = server(&mut orch);
        let (adm, admin_box) = admin(&mut orch);

        start(&mut orch, adm);

        assert!(orch.tournament().is_active());
        assert_eq!(orch.tournament().epoch(), 1);
        assert!(orch.tournament().started_at().is_some());
        assert_eq!(jobs_of(&mut jobs), vec![BracketJob::Reset { epoch: 1 }]);
        assert_eq!(drain(&plugin), vec![r#"{"command":"get_players"}"#.to_string()]);
        assert_eq!(
            drain(&server_box),
            vec![r#"{"type":"TournamentStart","payload":{}}"#.to_string()]
        );
        assert!(drain(&admin_box).is_empty());
    }

    #[test]
    fn start_without_plugin_still_starts() {
        let (mut orch, mut jobs) = orchestrator();
        let (adm, _) = admin(&mut orch);
        start(&mut orch, adm);
        assert!(orch.tournament().is_active());
        assert_eq!(jobs_of(&mut jobs).len(), 1);
    }

    #[test]
    fn stop_releases_every_arena_and_notifies_servers() {
        let (mut orch, _jobs) = orchestrator();
        let (srv, server_box) = server(&mut orch);
        send(
            &mut orch,
            srv,
            r#"{"type":"MatchDetails","payload":{"arenaId":1,"p1Id":"a","p2Id":"b"}}"#,
        );
        send(
            &mut orch,
            srv,
            r#"{"type":"MatchDetails","payload":{"arenaId":9,"p1Id":"c","p2Id":"d"}}"#,
        );
        assert_eq!(orch.arenas().occupied_count(), 2);
        drain(&server_box);

        send(&mut orch, srv, r#"{"type":"TournamentStop","payload":{}}"#);
        assert_eq!(orch.arenas().occupied_count(), 0);
        assert!(!orch.tournament().is_active());
        assert_eq!(
            drain(&server_box),
            vec![r#"{"type":"TournamentStop","payload":{}}"#.to_string()]
        );
    }

    #[test]
    fn users_in_server_seeds_by_rating() {
        let (mut orch, mut jobs) = orchestrator();
        let (srv, _) = server(&mut orch);
        send(
            &mut orch,
            srv,
            r#"{"type":"UsersInServer","payload":{"players":[
                {"steamId":"s1","name":"Low","elo":900},
                {"steamId":"s2","name":"High","elo":2000},
                {"steamId":"s3","name":"Plain"}]}}"#,
        );
        let jobs = jobs_of(&mut jobs);
        let Some(BracketJob::Seed { entrants, .. }) = jobs.first() else {
            panic!("expected seed job");
        };
        let order: Vec<(&str, u32)> = entrants.iter().map(|e| (e.id.as_str(), e.seed)).collect();
        assert_eq!(order, vec![("s2", 1), ("s3", 2), ("s1", 3)]);
        assert_eq!(orch.players().len(), 3);
    }

    #[test]
    fn users_in_server_without_players_is_a_no_op() {
        let (mut orch, mut jobs) = orchestrator();
        let (srv, srv_box) = server(&mut orch);
        send(&mut orch, srv, r#"{"type":"UsersInServer","payload":{}}"#);
        assert!(jobs_of(&mut jobs).is_empty());
        assert!(drain(&srv_box).is_empty());
    }

    #[test]
    fn plugin_roster_seeds_only_during_tournament() {
        let (mut orch, mut jobs) = orchestrator();
        connect_plugin(&mut orch);
        plugin_frame(&mut orch, ROSTER);
        assert!(jobs_of(&mut jobs).is_empty());
        assert_eq!(orch.players().len(), 2);

        let (adm, _) = admin(&mut orch);
        start(&mut orch, adm);
        plugin_frame(&mut orch, ROSTER);
        let jobs = jobs_of(&mut jobs);
        let Some(BracketJob::Seed { epoch, entrants, .. }) = jobs.get(1) else {
            panic!("expected seed after reset");
        };
        assert_eq!(*epoch, 1);
        let ids: Vec<&str> = entrants.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["client:2", "client:1"]);
    }

    #[test]
    fn empty_plugin_roster_does_not_seed() {
        let (mut orch, mut jobs) = orchestrator();
        connect_plugin(&mut orch);
        let (adm, _) = admin(&mut orch);
        start(&mut orch, adm);
        plugin_frame(
            &mut orch,
            r#"{"type":"response","command":"get_players","players":[]}"#,
        );
        assert_eq!(jobs_of(&mut jobs), vec![BracketJob::Reset { epoch: 1 }]);
    }

    #[test]
    fn open_matches_fill_priority_arena_and_move_players() {
        let (mut orch, _jobs) = orchestrator();
        let plugin = connect_plugin(&mut orch);
        plugin_frame(&mut orch, ROSTER);
        drain(&plugin);

        orch.handle(Event::Bracket(BracketReply::OpenMatches {
            epoch: 0,
            listing: 0,
            matches: vec![pairing("client:1", "client:2")],
        }));

        let Some(slot) = orch.arenas().slot(4) else {
            panic!("slot exists");
        };
        assert!(slot.has_player(&PlayerId::new("client:1")));
        assert_eq!(
            drain(&plugin),
            vec![
                r#"{"command":"add_player_to_arena","player_id":1,"arena_id":5}"#.to_string(),
                r#"{"command":"add_player_to_arena","player_id":2,"arena_id":5}"#.to_string(),
            ]
        );
    }

    #[test]
    fn allocation_proceeds_without_plugin() {
        let (mut orch, _jobs) = orchestrator();
        orch.handle(Event::Bracket(BracketReply::OpenMatches {
            epoch: 0,
            listing: 0,
            matches: vec![pairing("s1", "s2"), pairing("s3", "s4")],
        }));
        assert_eq!(orch.arenas().occupied_count(), 2);
        assert_eq!(orch.plugin().state(), LinkState::Disconnected);
    }

    #[test]
    fn one_open_slot_takes_exactly_one_pairing() {
        let (queue, _jobs) = BracketQueue::channel();
        let mut arenas = ArenaAllocator::default();
        for slot in 0..15 {
            let a = PlayerId::new(format!("busy{slot}a"));
            let b = PlayerId::new(format!("busy{slot}b"));
            assert!(arenas.assign(slot, a, b).is_ok());
        }
        let mut orch = Orchestrator::new("secret", arenas, queue);

        orch.handle(Event::Bracket(BracketReply::OpenMatches {
            epoch: 0,
            listing: 0,
            matches: vec![pairing("x1", "x2"), pairing("y1", "y2")],
        }));

        assert_eq!(orch.arenas().occupied_count(), 16);
        let Some(last) = orch.arenas().slot(15) else {
            panic!("slot exists");
        };
        assert!(last.has_player(&PlayerId::new("x1")));
        assert!(!orch.arenas().is_player_busy(&PlayerId::new("y1")));
    }

    #[test]
    fn stale_bracket_replies_are_discarded() {
        let (mut orch, _jobs) = orchestrator();
        let (adm, _) = admin(&mut orch);
        start(&mut orch, adm);
        send(&mut orch, adm, r#"{"type":"TournamentStop","payload":{}}"#);

        orch.handle(Event::Bracket(BracketReply::OpenMatches {
            epoch: 1,
            listing: 0,
            matches: vec![pairing("a", "b")],
        }));
        assert_eq!(orch.arenas().occupied_count(), 0);
    }

    #[test]
    fn only_newest_listing_is_allocated() {
        let (mut orch, mut jobs) = orchestrator();
        let (srv, _) = server(&mut orch);
        orch.handle(Event::Bracket(BracketReply::OpenMatches {
            epoch: 0,
            listing: 0,
            matches: vec![pairing("a1", "a2"), pairing("b1", "b2")],
        }));
        assert_eq!(orch.arenas().occupied_count(), 2);

        send(
            &mut orch,
            srv,
            r#"{"type":"MatchResults","payload":{"winner":"a1","loser":"a2","arena":5}}"#,
        );
        send(
            &mut orch,
            srv,
            r#"{"type":"MatchResults","payload":{"winner":"b1","loser":"b2","arena":6}}"#,
        );
        let listings: Vec<u64> = jobs_of(&mut jobs)
            .iter()
            .filter_map(|job| match job {
                BracketJob::Report { listing, .. } => Some(*listing),
                _ => None,
            })
            .collect();
        assert_eq!(listings, vec![1, 2]);
        assert_eq!(orch.arenas().occupied_count(), 0);

        // Taken after the first report but before the second.
        orch.handle(Event::Bracket(BracketReply::OpenMatches {
            epoch: 0,
            listing: 1,
            matches: vec![pairing("b1", "b2")],
        }));
        assert_eq!(orch.arenas().occupied_count(), 0);
        assert!(!orch.arenas().is_player_busy(&PlayerId::new("b1")));

        orch.handle(Event::Bracket(BracketReply::OpenMatches {
            epoch: 0,
            listing: 2,
            matches: vec![pairing("a1", "b1")],
        }));
        assert_eq!(orch.arenas().occupied_count(), 1);
        let Some(slot) = orch.arenas().slot(4) else {
            panic!("slot exists");
        };
        assert!(slot.has_player(&PlayerId::new("a1")));
        assert!(slot.has_player(&PlayerId::new("b1")));
    }

    #[test]
    fn plugin_roster_seeds_once_per_start() {
        let (mut orch, mut jobs) = orchestrator();
        connect_plugin(&mut orch);
        let (adm, _) = admin(&mut orch);
        start(&mut orch, adm);
        plugin_frame(&mut orch, ROSTER);
        plugin_frame(&mut orch, ROSTER);

        orch.handle(Event::PluginDisconnected);
        connect_plugin(&mut orch);
        plugin_frame(&mut orch, r#"{"type":"welcome"}"#);
        plugin_frame(&mut orch, ROSTER);

        let seeds = |submitted: &[BracketJob]| {
            submitted
                .iter()
                .filter(|job| matches!(job, BracketJob::Seed { .. }))
                .count()
        };
        assert_eq!(seeds(&jobs_of(&mut jobs)), 1);
        assert!(orch.tournament().is_seeded());
        assert_eq!(orch.plugin().mapped_count(), 2);

        send(&mut orch, adm, r#"{"type":"TournamentStop","payload":{}}"#);
        assert!(!orch.tournament().is_seeded());
        start(&mut orch, adm);
        plugin_frame(&mut orch, ROSTER);
        let restarted = jobs_of(&mut jobs);
        assert_eq!(seeds(&restarted), 1);
        assert!(
            restarted
                .iter()
                .any(|job| matches!(job, BracketJob::Seed { epoch: 3, .. }))
        );
    }

    #[test]
    fn match_end_for_unknown_clients_changes_nothing() {
        let (mut orch, mut jobs) = orchestrator();
        connect_plugin(&mut orch);
        let (adm, _) = admin(&mut orch);
        start(&mut orch, adm);
        plugin_frame(&mut orch, ROSTER);
        send(
            &mut orch,
            adm,
            r#"{"type":"MatchDetails","payload":{"arenaId":5,"p1Id":"client:1","p2Id":"client:2"}}"#,
        );
        jobs_of(&mut jobs);

        plugin_frame(
            &mut orch,
            r#"{"type":"event","event":"match_end_1v1","winner_id":7,"loser_id":8,"arena_id":5}"#,
        );

        assert!(jobs_of(&mut jobs).is_empty());
        assert_eq!(orch.arenas().occupied_count(), 1);
    }

    #[test]
    fn match_end_reports_and_releases() {
        let (mut orch, mut jobs) = orchestrator();
        connect_plugin(&mut orch);
        let (adm, _) = admin(&mut orch);
        start(&mut orch, adm);
        plugin_frame(&mut orch, ROSTER);
        send(
            &mut orch,
            adm,
            r#"{"type":"MatchDetails","payload":{"arenaId":5,"p1Id":"client:1","p2Id":"client:2"}}"#,
        );
        jobs_of(&mut jobs);

        plugin_frame(
            &mut orch,
            r#"{"type":"event","event":"match_end_1v1","winner_id":2,"loser_id":1,"arena_id":5}"#,
        );

        assert_eq!(
            jobs_of(&mut jobs),
            vec![BracketJob::Report {
                epoch: 1,
                listing: 2,
                winner: PlayerId::from_client_id(2),
                loser: PlayerId::from_client_id(1),
            }]
        );
        assert_eq!(orch.arenas().occupied_count(), 0);
    }

    #[test]
    fn match_end_outside_tournament_is_ignored() {
        let (mut orch, mut jobs) = orchestrator();
        connect_plugin(&mut orch);
        plugin_frame(&mut orch, ROSTER);
        plugin_frame(
            &mut orch,
            r#"{"type":"event","event":"match_end_1v1","winner_id":2,"loser_id":1,"arena_id":5}"#,
        );
        assert!(jobs_of(&mut jobs).is_empty());
    }

    #[test]
    fn arena_removed_clears_slot_without_report() {
        let (mut orch, mut jobs) = orchestrator();
        connect_plugin(&mut orch);
        plugin_frame(&mut orch, ROSTER);
        let (srv, _) = server(&mut orch);
        send(
            &mut orch,
            srv,
            r#"{"type":"MatchDetails","payload":{"arenaId":2,"p1Id":"client:1","p2Id":"client:2"}}"#,
        );
        plugin_frame(
            &mut orch,
            r#"{"type":"event","event":"player_arena_removed","player_id":1,"arena_id":2}"#,
        );
        assert_eq!(orch.arenas().occupied_count(), 0);
        assert!(jobs_of(&mut jobs).is_empty());
    }

    #[test]
    fn server_results_report_and_release() {
        let (mut orch, mut jobs) = orchestrator();
        let (srv, _) = server(&mut orch);
        send(
            &mut orch,
            srv,
            r#"{"type":"MatchDetails","payload":{"arenaId":4,"p1Id":"s1","p2Id":"s2"}}"#,
        );
        send(
            &mut orch,
            srv,
            r#"{"type":"MatchResults","payload":{"winner":"s1","loser":"s2","arena":4}}"#,
        );
        assert_eq!(
            jobs_of(&mut jobs),
            vec![BracketJob::Report {
                epoch: 0,
                listing: 1,
                winner: PlayerId::new("s1"),
                loser: PlayerId::new("s2"),
            }]
        );
        assert_eq!(orch.arenas().occupied_count(), 0);
    }

    #[test]
    fn cancel_releases_named_arena() {
        let (mut orch, _jobs) = orchestrator();
        let (srv, _) = server(&mut orch);
        send(
            &mut orch,
            srv,
            r#"{"type":"MatchDetails","payload":{"arenaId":4,"p1Id":"s1","p2Id":"s2"}}"#,
        );
        send(&mut orch, srv, r#"{"type":"MatchCancel","payload":{"arena":99}}"#);
        assert_eq!(orch.arenas().occupied_count(), 1);
        send(&mut orch, srv, r#"{"type":"MatchCancel","payload":{"arena":4}}"#);
        assert_eq!(orch.arenas().occupied_count(), 0);
    }

    #[test]
    fn plugin_disconnect_drops_mappings() {
        let (mut orch, _jobs) = orchestrator();
        connect_plugin(&mut orch);
        plugin_frame(&mut orch, ROSTER);
        assert_eq!(orch.plugin().mapped_count(), 2);
        orch.handle(Event::PluginDisconnected);
        assert_eq!(orch.plugin().mapped_count(), 0);
        assert_eq!(orch.plugin().state(), LinkState::Disconnected);
    }

    #[tokio::test]
    async fn run_loop_answers_status() {
        let (queue, _jobs) = BracketQueue::channel();
        let (handle, events) = OrchestratorHandle::channel();
        let task = Orchestrator::new("secret", ArenaAllocator::default(), queue).spawn(events);

        let id = ConnectionId::new();
        assert!(handle.open_session(id, Arc::new(Outbox::new())).is_ok());
        assert!(
            handle
                .deliver(id, r#"{"type":"ServerHello","payload":{"apiKey":"x"}}"#.to_string())
                .is_ok()
        );
        let Ok(status) = handle.status().await else {
            panic!("status answered");
        };
        assert_eq!(status.connections.servers, 1);
        assert!(!status.active);
        assert_eq!(status.arenas.len(), 16);
        assert_eq!(status.plugin, LinkState::Disconnected);

        drop(handle);
        assert!(task.await.is_ok());
    }
}
