//! Worker control operations
//!
//! The dashboard never talks to the worker directly. It goes through the
//! [`ScrapeController`] trait, so the transport (HTTP client, IPC, a test
//! double) is owned by whoever builds the dashboard.

use tokio::sync::{mpsc, oneshot};

use scrapemon_core::prelude::*;

use crate::session::RemoteStatus;

/// Control requests the worker understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
    Stop,
    Pause,
    Resume,
    Status,
}

impl ControlCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlCommand::Start => "start",
            ControlCommand::Stop => "stop",
            ControlCommand::Pause => "pause",
            ControlCommand::Resume => "resume",
            ControlCommand::Status => "query status of",
        }
    }
}

/// Worker answer to a [`ControlCommand`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlReply {
    Ack,
    Status(RemoteStatus),
}

/// Worker control operations
///
/// Each call is a request/response round-trip. `Ok` commits the local
/// transition, `Err` rolls it back.
#[trait_variant::make(ScrapeController: Send)]
pub trait LocalScrapeController {
    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn resume(&self) -> Result<()>;

    /// Query the worker's own view of the run
    async fn status(&self) -> Result<RemoteStatus>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Channel-backed controller
// ─────────────────────────────────────────────────────────────────────────────

/// One request in flight to the transport task
#[derive(Debug)]
pub struct ControlRequest {
    pub command: ControlCommand,
    pub reply: oneshot::Sender<Result<ControlReply>>,
}

/// Controller that hands each request to a transport task over a channel
///
/// The task on the other end performs the real call and answers through the
/// request's oneshot. A dropped reply sender surfaces as
/// [`Error::ChannelClosed`].
#[derive(Debug, Clone)]
pub struct ChannelScrapeController {
    request_tx: mpsc::Sender<ControlRequest>,
}

impl ChannelScrapeController {
    pub fn new(request_tx: mpsc::Sender<ControlRequest>) -> Self {
        Self { request_tx }
    }

    /// Controller plus the receiving end for the transport task
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<ControlRequest>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx), rx)
    }

    async fn request(&self, command: ControlCommand) -> Result<ControlReply> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.request_tx
            .send(ControlRequest {
                command,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::channel_send(format!("{} command", command.as_str())))?;

        reply_rx.await.map_err(|_| Error::ChannelClosed)?
    }

    async fn acknowledge(&self, command: ControlCommand) -> Result<()> {
        match self.request(command).await? {
            ControlReply::Ack => Ok(()),
            ControlReply::Status(_) => Err(Error::control(
                command.as_str(),
                "unexpected status reply",
            )),
        }
    }
}

impl ScrapeController for ChannelScrapeController {
    async fn start(&self) -> Result<()> {
        self.acknowledge(ControlCommand::Start).await
    }

    async fn stop(&self) -> Result<()> {
        self.acknowledge(ControlCommand::Stop).await
    }

    async fn pause(&self) -> Result<()> {
        self.acknowledge(ControlCommand::Pause).await
    }

    async fn resume(&self) -> Result<()> {
        self.acknowledge(ControlCommand::Resume).await
    }

    async fn status(&self) -> Result<RemoteStatus> {
        match self.request(ControlCommand::Status).await? {
            ControlReply::Status(status) => Ok(status),
            ControlReply::Ack => Err(Error::control(
                ControlCommand::Status.as_str(),
                "missing status in reply",
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Offline controller
// ─────────────────────────────────────────────────────────────────────────────

/// Controller with no worker behind it
///
/// Every action succeeds and the status is always idle. Used when replaying
/// captured streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineController;

impl ScrapeController for OfflineController {
    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        Ok(())
    }

    async fn status(&self) -> Result<RemoteStatus> {
        Ok(RemoteStatus::default())
    }
}

#[cfg(test)]
mod tests {
    // Explicit imports: globbing both trait variants makes method calls ambiguous
    use super::{
        ChannelScrapeController, ControlCommand, ControlReply, OfflineController, ScrapeController,
    };
    use crate::session::{RemoteScrapeStatus, RemoteStatus};
    use scrapemon_core::Error;

    #[tokio::test]
    async fn test_channel_controller_round_trip() {
        let (controller, mut requests) = ChannelScrapeController::channel(4);

        let transport = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(request) = requests.recv().await {
                seen.push(request.command);
                let reply = match request.command {
                    ControlCommand::Status => Ok(ControlReply::Status(RemoteStatus {
                        status: RemoteScrapeStatus::Scraping,
                        current: 2,
                        total: 4,
                        ..Default::default()
                    })),
                    ControlCommand::Pause => Err(Error::control("pause", "worker busy")),
                    _ => Ok(ControlReply::Ack),
                };
                let _ = request.reply.send(reply);
            }
            seen
        });

        controller.start().await.unwrap();
        let err = controller.pause().await.unwrap_err();
        assert!(err.to_string().contains("worker busy"));
        let status = controller.status().await.unwrap();
        assert_eq!(status.status, RemoteScrapeStatus::Scraping);
        assert_eq!(status.current, 2);

        drop(controller);
        let seen = transport.await.unwrap();
        assert_eq!(
            seen,
            vec![
                ControlCommand::Start,
                ControlCommand::Pause,
                ControlCommand::Status
            ]
        );
    }

    #[tokio::test]
    async fn test_channel_controller_receiver_gone() {
        let (controller, requests) = ChannelScrapeController::channel(1);
        drop(requests);
        let err = controller.stop().await.unwrap_err();
        assert!(matches!(err, Error::ChannelSend { .. }));
    }

    #[tokio::test]
    async fn test_channel_controller_reply_dropped() {
        let (controller, mut requests) = ChannelScrapeController::channel(1);
        tokio::spawn(async move {
            // Drop the reply sender without answering
            let _ = requests.recv().await;
        });
        let err = controller.resume().await.unwrap_err();
        assert!(matches!(err, Error::ChannelClosed));
    }

    #[tokio::test]
    async fn test_offline_controller_always_idle() {
        let controller = OfflineController;
        controller.start().await.unwrap();
        controller.stop().await.unwrap();
        assert_eq!(controller.status().await.unwrap(), RemoteStatus::default());
    }
}
