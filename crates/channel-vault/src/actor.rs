//! Per-owner worker task.
//!
//! Each owner gets one task that owns its [`Vault`] and consumes a bounded
//! mailbox. Commands are handled strictly one at a time, which is what
//! makes the dedup check-then-insert inside a sync race-free.
//!
//! Embedding jobs are spawned onto a [`JoinSet`] after the sync reply has
//! been sent, so the caller never waits on the embedding provider or the
//! vector index. Finished jobs are reaped between commands; shutdown and
//! [`OwnerHandle::drain`] wait for all of them.

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use channel_vault_core::models::{
    ChannelInput, ChannelPage, RecordInput, RecordPage, SearchResponse, Stats,
};
use channel_vault_core::pipeline::PipelineReport;
use channel_vault_core::query::{ChannelListParams, RecordListParams};
use channel_vault_core::search::SearchParams;
use channel_vault_core::vault::SyncedRecords;
use channel_vault_core::Vault;

use crate::error::{Error, Result};
use crate::sqlite_store::SqliteStore;

type Reply<T> = oneshot::Sender<channel_vault_core::Result<T>>;

enum Command {
    Stats {
        reply: Reply<Stats>,
    },
    ListChannels {
        params: ChannelListParams,
        reply: Reply<ChannelPage>,
    },
    ListRecords {
        channel_id: String,
        params: RecordListParams,
        reply: Reply<RecordPage>,
    },
    Search {
        params: SearchParams,
        reply: Reply<SearchResponse>,
    },
    SyncChannels {
        items: Vec<ChannelInput>,
        reply: Reply<u64>,
    },
    SyncRecords {
        channel_id: String,
        items: Vec<RecordInput>,
        batch_size: Option<usize>,
        reply: Reply<u64>,
    },
    Drain {
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable client for one owner's actor.
#[derive(Clone)]
pub struct OwnerHandle {
    owner_id: String,
    tx: mpsc::Sender<Command>,
}

impl OwnerHandle {
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// True once the actor has stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| Error::ActorStopped(self.owner_id.clone()))?;
        let result = rx
            .await
            .map_err(|_| Error::ActorStopped(self.owner_id.clone()))?;
        Ok(result?)
    }

    pub async fn get_stats(&self) -> Result<Stats> {
        self.request(|reply| Command::Stats { reply }).await
    }

    pub async fn list_channels(&self, params: ChannelListParams) -> Result<ChannelPage> {
        self.request(|reply| Command::ListChannels { params, reply })
            .await
    }

    pub async fn list_records(
        &self,
        channel_id: impl Into<String>,
        params: RecordListParams,
    ) -> Result<RecordPage> {
        let channel_id = channel_id.into();
        self.request(|reply| Command::ListRecords {
            channel_id,
            params,
            reply,
        })
        .await
    }

    pub async fn search_records(&self, params: SearchParams) -> Result<SearchResponse> {
        self.request(|reply| Command::Search { params, reply }).await
    }

    /// Returns the number of channels processed successfully.
    pub async fn sync_channels(&self, items: Vec<ChannelInput>) -> Result<u64> {
        self.request(|reply| Command::SyncChannels { items, reply })
            .await
    }

    /// Returns the number of records inserted. Embedding runs afterwards in
    /// the background.
    pub async fn sync_records(
        &self,
        channel_id: impl Into<String>,
        items: Vec<RecordInput>,
        batch_size: Option<usize>,
    ) -> Result<u64> {
        let channel_id = channel_id.into();
        self.request(|reply| Command::SyncRecords {
            channel_id,
            items,
            batch_size,
            reply,
        })
        .await
    }

    /// Wait until every embedding job started so far has finished.
    pub async fn drain(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Drain { reply })
            .await
            .map_err(|_| Error::ActorStopped(self.owner_id.clone()))?;
        rx.await
            .map_err(|_| Error::ActorStopped(self.owner_id.clone()))
    }

    /// Stop the actor after its queued commands and embedding jobs finish.
    /// Stopping an actor that is already gone is a no-op.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown { reply }).await.is_err() {
            return;
        }
        let _ = rx.await;
    }
}

struct OwnerActor {
    owner_id: String,
    vault: Vault<SqliteStore>,
    rx: mpsc::Receiver<Command>,
    pipelines: JoinSet<PipelineReport>,
}

/// Spawn the actor task for one owner and return its handle.
pub fn spawn(owner_id: &str, vault: Vault<SqliteStore>, mailbox_capacity: usize) -> OwnerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity.max(1));
    let actor = OwnerActor {
        owner_id: owner_id.to_string(),
        vault,
        rx,
        pipelines: JoinSet::new(),
    };
    tokio::spawn(actor.run());
    OwnerHandle {
        owner_id: owner_id.to_string(),
        tx,
    }
}

impl OwnerActor {
    async fn run(mut self) {
        debug!(owner_id = %self.owner_id, namespace = %self.vault.namespace(), "owner actor running");

        loop {
            tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    Some(Command::Shutdown { reply }) => {
                        self.stop().await;
                        let _ = reply.send(());
                        return;
                    }
                    Some(cmd) => self.handle(cmd).await,
                    None => {
                        self.stop().await;
                        return;
                    }
                },
                Some(joined) = self.pipelines.join_next(), if !self.pipelines.is_empty() => {
                    self.reap(joined);
                }
            }
        }
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Stats { reply } => {
                let _ = reply.send(self.vault.get_stats().await);
            }
            Command::ListChannels { params, reply } => {
                let _ = reply.send(self.vault.list_channels(params).await);
            }
            Command::ListRecords {
                channel_id,
                params,
                reply,
            } => {
                let _ = reply.send(self.vault.list_records(&channel_id, params).await);
            }
            Command::Search { params, reply } => {
                let _ = reply.send(self.vault.search_records(params).await);
            }
            Command::SyncChannels { items, reply } => {
                let _ = reply.send(self.vault.sync_channels(&items).await);
            }
            Command::SyncRecords {
                channel_id,
                items,
                batch_size,
                reply,
            } => match self.vault.sync_records(&channel_id, &items, batch_size).await {
                Ok(SyncedRecords { inserted, job }) => {
                    let _ = reply.send(Ok(inserted));
                    if let Some(job) = job {
                        debug!(
                            owner_id = %self.owner_id,
                            channel_id = %channel_id,
                            pending = job.len(),
                            "starting embedding job"
                        );
                        self.pipelines.spawn(job.run());
                    }
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Command::Drain { reply } => {
                self.drain().await;
                let _ = reply.send(());
            }
            // Handled by the run loop.
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn reap(&self, joined: std::result::Result<PipelineReport, JoinError>) {
        match joined {
            Ok(report) if report.failed > 0 => {
                warn!(
                    owner_id = %self.owner_id,
                    embedded = report.embedded,
                    failed = report.failed,
                    "embedding job finished with failures"
                );
            }
            Ok(report) => {
                debug!(owner_id = %self.owner_id, embedded = report.embedded, "embedding job finished");
            }
            Err(e) => {
                warn!(owner_id = %self.owner_id, error = %e, "embedding job panicked or was cancelled");
            }
        }
    }

    async fn drain(&mut self) {
        while let Some(joined) = self.pipelines.join_next().await {
            self.reap(joined);
        }
    }

    async fn stop(&mut self) {
        self.rx.close();
        // Commands already queued still get an answer.
        while let Ok(cmd) = self.rx.try_recv() {
            match cmd {
                Command::Shutdown { reply } => {
                    let _ = reply.send(());
                }
                cmd => self.handle(cmd).await,
            }
        }
        self.drain().await;
        self.vault.store().close().await;
        info!(owner_id = %self.owner_id, "owner actor stopped");
    }
}
