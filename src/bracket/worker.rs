//! Bracket job queue and the task that works through it.
//!
//! The orchestrator never waits on the bracket service. It submits a
//! [`BracketJob`] tagged with the current tournament epoch and carries on;
//! the worker runs jobs strictly in submission order and answers each with
//! a [`BracketReply`] event carrying the same epoch. Failures inside a job
//! are logged and turn into an empty result.
//!
//! Jobs that end in an open-match listing also carry a listing sequence
//! number, echoed in the reply, so the orchestrator can tell the newest
//! listing apart from one taken before a later result was reported.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::client::BracketClient;
use crate::domain::{Entrant, PendingMatch, PlayerId};
use crate::service::OrchestratorHandle;

/// Work item for the bracket worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BracketJob {
    /// Delete all participants and reset the bracket.
    Reset {
        /// Tournament epoch at submission.
        epoch: u64,
    },
    /// Register the entrants, start the bracket and list open matches.
    Seed {
        /// Tournament epoch at submission.
        epoch: u64,
        /// Listing sequence number.
        listing: u64,
        /// Entrants in seed order.
        entrants: Vec<Entrant>,
    },
    /// Report a result and list open matches.
    Report {
        /// Tournament epoch at submission.
        epoch: u64,
        /// Listing sequence number.
        listing: u64,
        /// Winner identity.
        winner: PlayerId,
        /// Loser identity.
        loser: PlayerId,
    },
}

impl BracketJob {
    /// Tournament epoch the job was submitted under.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        match self {
            Self::Reset { epoch } | Self::Seed { epoch, .. } | Self::Report { epoch, .. } => *epoch,
        }
    }
}

/// Outcome of a [`BracketJob`], sent back to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BracketReply {
    /// A reset job finished (successfully or not).
    ResetComplete {
        /// Epoch of the originating job.
        epoch: u64,
    },
    /// Open pairings after a seed or report job; empty on failure.
    OpenMatches {
        /// Epoch of the originating job.
        epoch: u64,
        /// Listing sequence number of the originating job.
        listing: u64,
        /// Pairings in service order.
        matches: Vec<PendingMatch>,
    },
}

impl BracketReply {
    /// Epoch of the job this reply answers.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        match self {
            Self::ResetComplete { epoch } | Self::OpenMatches { epoch, .. } => *epoch,
        }
    }
}

/// Submission side of the job queue.
#[derive(Debug, Clone)]
pub struct BracketQueue {
    tx: mpsc::UnboundedSender<BracketJob>,
}

impl BracketQueue {
    /// Creates a queue and the receiver the worker consumes.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BracketJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueues a job. A stopped worker is logged, not reported.
    pub fn submit(&self, job: BracketJob) {
        if self.tx.send(job).is_err() {
            tracing::warn!("bracket worker stopped, job dropped");
        }
    }
}

/// Spawns the worker. It loads the tournament first, then serves jobs
/// until the queue closes or the orchestrator stops.
pub fn spawn(
    client: BracketClient,
    jobs: mpsc::UnboundedReceiver<BracketJob>,
    orchestrator: OrchestratorHandle,
) -> JoinHandle<()> {
    tokio::spawn(run(client, jobs, orchestrator))
}

async fn run(
    mut client: BracketClient,
    mut jobs: mpsc::UnboundedReceiver<BracketJob>,
    orchestrator: OrchestratorHandle,
) {
    if let Err(err) = client.load().await {
        tracing::error!(%err, "bracket tournament not loaded, bracket calls disabled");
    }
    while let Some(job) = jobs.recv().await {
        let reply = execute(&client, job).await;
        if orchestrator.bracket(reply).is_err() {
            break;
        }
    }
    tracing::debug!("bracket worker stopped");
}

/// Runs one job to completion.
pub async fn execute(client: &BracketClient, job: BracketJob) -> BracketReply {
    match job {
        BracketJob::Reset { epoch } => {
            if let Err(err) = client.reset().await {
                tracing::warn!(%err, "bracket reset failed");
            }
            BracketReply::ResetComplete { epoch }
        }
        BracketJob::Seed {
            epoch,
            listing,
            entrants,
        } => {
            for entrant in &entrants {
                if let Err(err) = client.add_participant(entrant).await {
                    tracing::warn!(player = %entrant.id, %err, "participant registration failed");
                }
            }
            if let Err(err) = client.start().await {
                tracing::warn!(%err, "bracket start failed");
            }
            BracketReply::OpenMatches {
                epoch,
                listing,
                matches: open_matches(client).await,
            }
        }
        BracketJob::Report {
            epoch,
            listing,
            winner,
            loser,
        } => {
            if let Err(err) = client.report(&winner, &loser).await {
                tracing::warn!(%winner, %loser, %err, "result report failed");
            }
            BracketReply::OpenMatches {
                epoch,
                listing,
                matches: open_matches(client).await,
            }
        }
    }
}

async fn open_matches(client: &BracketClient) -> Vec<PendingMatch> {
    client.open_matches().await.unwrap_or_else(|err| {
        tracing::warn!(%err, "open match listing failed");
        Vec::new()
    })
}
