use std::time::Duration;

use chrono::{DateTime, Utc};
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::ChronikosError;
use crate::service::dispatch::{DispatchReport, Dispatcher};

/// Messages handled by the dispatcher actor. One run at a time.
#[derive(Debug)]
pub enum DispatcherMessage {
    /// Run a dispatch for the given instant and reply with its report.
    Run(
        DateTime<Utc>,
        RpcReplyPort<Result<DispatchReport, ChronikosError>>,
    ),
    /// Periodic trigger from the internal ticker.
    Tick,
}

/// Handle for triggering dispatch runs.
#[derive(Clone)]
pub struct DispatcherHandle {
    actor: ActorRef<DispatcherMessage>,
}

impl DispatcherHandle {
    /// Run a dispatch and wait for its report. Queued behind any run in progress.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<DispatchReport, ChronikosError> {
        ractor::call!(self.actor, DispatcherMessage::Run, now)
            .map_err(|e| ChronikosError::RactorError(format!("Run RPC failed: {e}")))?
    }
}

pub struct DispatcherArgs {
    pub dispatcher: Dispatcher,
    /// `None` leaves runs to explicit `Run` requests.
    pub tick_interval: Option<Duration>,
}

struct DispatcherState {
    dispatcher: Dispatcher,
    ticker: Option<JoinHandle<()>>,
}

struct DispatcherActor;

#[ractor::async_trait]
impl Actor for DispatcherActor {
    type Msg = DispatcherMessage;
    type State = DispatcherState;
    type Arguments = DispatcherArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let ticker = args.tick_interval.map(|period| {
            info!("Dispatcher ticking every {} secs", period.as_secs());
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                // first tick completes immediately
                interval.tick().await;
                loop {
                    interval.tick().await;
                    if myself.cast(DispatcherMessage::Tick).is_err() {
                        break;
                    }
                }
            })
        });

        Ok(DispatcherState {
            dispatcher: args.dispatcher,
            ticker,
        })
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
        Ok(())
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            DispatcherMessage::Run(now, reply_port) => {
                let result = state.dispatcher.run(now).await;
                let _ = reply_port.send(result);
            }
            DispatcherMessage::Tick => {
                if let Err(e) = state.dispatcher.run(Utc::now()).await {
                    warn!(error = %e, "scheduled dispatch tick failed");
                }
            }
        }
        Ok(())
    }
}

/// Spawn the dispatcher actor and return a handle.
pub async fn spawn(args: DispatcherArgs) -> Result<DispatcherHandle, ChronikosError> {
    let (actor, _jh) = Actor::spawn(None, DispatcherActor, args)
        .await
        .map_err(|e| ChronikosError::RactorError(format!("failed to spawn dispatcher: {e}")))?;
    Ok(DispatcherHandle { actor })
}
