//! A member owned by its own tokio task.
//!
//! The task processes one command at a time, so a round never interleaves
//! with a message delivery. Handles are cheap to clone and the task ends,
//! returning its [`MemberState`], once the last handle is dropped.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::{MemberState, Outgoing, RumorPhase, Statistics};
use crate::{Message, MemberId, NetworkConfig, Round, RumorError, RumorId, RumorResult};

/// Commands buffered per member before senders have to wait.
const COMMAND_BUFFER: usize = 64;

#[derive(Debug)]
enum MemberCommand {
    AddRumor {
        rumor_id: RumorId,
        respond: oneshot::Sender<bool>,
    },
    Received {
        message: Message,
        from: MemberId,
        respond: oneshot::Sender<Outgoing>,
    },
    AdvanceRound {
        respond: oneshot::Sender<RumorResult<Option<Outgoing>>>,
    },
    IsOld {
        rumor_id: RumorId,
        respond: oneshot::Sender<bool>,
    },
    RumorPhase {
        rumor_id: RumorId,
        respond: oneshot::Sender<Option<(RumorPhase, Round)>>,
    },
    Statistics {
        respond: oneshot::Sender<Statistics>,
    },
}

pub struct MemberActor {
    state: MemberState,
    commands: mpsc::Receiver<MemberCommand>,
}

impl MemberActor {
    /// Move `state` onto a new task. Must be called within a tokio runtime.
    pub fn spawn(state: MemberState) -> (MemberHandle, JoinHandle<MemberState>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let handle = MemberHandle {
            id: state.id(),
            config: *state.network_config(),
            peers: state.peers().to_vec(),
            commands: tx,
        };
        let actor = Self {
            state,
            commands: rx,
        };
        (handle, tokio::spawn(actor.run()))
    }

    async fn run(mut self) -> MemberState {
        tracing::debug!(member = %self.state.id(), "member actor started");
        while let Some(command) = self.commands.recv().await {
            self.handle(command);
        }
        tracing::debug!(member = %self.state.id(), "member actor stopped");
        self.state
    }

    fn handle(&mut self, command: MemberCommand) {
        // a caller that gave up on the answer is not our problem
        match command {
            MemberCommand::AddRumor { rumor_id, respond } => {
                let _ = respond.send(self.state.add_rumor(rumor_id));
            }
            MemberCommand::Received {
                message,
                from,
                respond,
            } => {
                let _ = respond.send(self.state.received_message(message, from));
            }
            MemberCommand::AdvanceRound { respond } => {
                let _ = respond.send(self.state.advance_round());
            }
            MemberCommand::IsOld { rumor_id, respond } => {
                let _ = respond.send(self.state.is_old(rumor_id));
            }
            MemberCommand::RumorPhase { rumor_id, respond } => {
                let found = self
                    .state
                    .rumor_phase(rumor_id)
                    .zip(self.state.rumor_round(rumor_id));
                let _ = respond.send(found);
            }
            MemberCommand::Statistics { respond } => {
                let _ = respond.send(self.state.statistics().clone());
            }
        }
    }
}

/// Talks to a [`MemberActor`].
#[derive(Debug, Clone)]
pub struct MemberHandle {
    id: MemberId,
    config: NetworkConfig,
    peers: Vec<MemberId>,
    commands: mpsc::Sender<MemberCommand>,
}

impl MemberHandle {
    pub fn id(&self) -> MemberId {
        self.id
    }

    pub fn network_config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn peers(&self) -> &[MemberId] {
        &self.peers
    }

    pub async fn add_rumor(&self, rumor_id: RumorId) -> RumorResult<bool> {
        self.request(|respond| MemberCommand::AddRumor { rumor_id, respond })
            .await
    }

    pub async fn received_message(&self, message: Message, from: MemberId) -> RumorResult<Outgoing> {
        self.request(|respond| MemberCommand::Received {
            message,
            from,
            respond,
        })
        .await
    }

    pub async fn advance_round(&self) -> RumorResult<Option<Outgoing>> {
        self.request(|respond| MemberCommand::AdvanceRound { respond })
            .await?
    }

    pub async fn is_old(&self, rumor_id: RumorId) -> RumorResult<bool> {
        self.request(|respond| MemberCommand::IsOld { rumor_id, respond })
            .await
    }

    /// Phase and round of a tracked rumor.
    pub async fn rumor_phase(&self, rumor_id: RumorId) -> RumorResult<Option<(RumorPhase, Round)>> {
        self.request(|respond| MemberCommand::RumorPhase { rumor_id, respond })
            .await
    }

    pub async fn statistics(&self) -> RumorResult<Statistics> {
        self.request(|respond| MemberCommand::Statistics { respond })
            .await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> MemberCommand,
    ) -> RumorResult<T> {
        let closed = RumorError::ActorClosed { member: self.id };
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| closed.clone())?;
        rx.await.map_err(|_| closed)
    }
}
