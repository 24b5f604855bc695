//! Parent/unit message protocol.
//!
//! Every concurrently running unit (the feed parser, each indexing worker)
//! talks to its parent over a private duplex channel: the parent sends a
//! single initial command, the unit answers with any number of `State`
//! messages followed by exactly one `Done` or `Error`.

use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::errors::PipelineError;

/// Message sent from a unit to its parent.
#[derive(Debug)]
pub enum UnitEvent<S, E> {
    /// Opaque progress payload.
    State(S),
    /// The unit exhausted its assignment.
    Done,
    /// The unit failed; no further messages follow.
    Error(E),
}

/// Parent side of a unit channel.
pub struct UnitHandle<C, S, E> {
    command: Option<oneshot::Sender<C>>,
    events: mpsc::UnboundedReceiver<UnitEvent<S, E>>,
}

/// Unit side of a unit channel.
pub struct UnitEnd<C, S, E> {
    command: Option<oneshot::Receiver<C>>,
    events: mpsc::UnboundedSender<UnitEvent<S, E>>,
}

/// Create a connected parent/unit pair.
pub fn unit_channel<C, S, E>() -> (UnitHandle<C, S, E>, UnitEnd<C, S, E>) {
    let (command_tx, command_rx) = oneshot::channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    (
        UnitHandle {
            command: Some(command_tx),
            events: events_rx,
        },
        UnitEnd {
            command: Some(command_rx),
            events: events_tx,
        },
    )
}

impl<C, S, E> UnitHandle<C, S, E> {
    /// Send the initial command. Only the first call is delivered.
    pub fn send_command(&mut self, command: C) -> Result<(), PipelineError> {
        let sender = self
            .command
            .take()
            .ok_or_else(|| PipelineError::channel("command already sent"))?;

        sender
            .send(command)
            .map_err(|_| PipelineError::channel("unit exited before receiving its command"))
    }

    /// Receive the next event. `None` once the unit has dropped its end.
    pub async fn recv(&mut self) -> Option<UnitEvent<S, E>> {
        self.events.recv().await
    }

    /// Turn the event side into a stream, e.g. to merge several units.
    pub fn into_stream(self) -> UnboundedReceiverStream<UnitEvent<S, E>> {
        UnboundedReceiverStream::new(self.events)
    }
}

impl<C, S, E> UnitEnd<C, S, E> {
    /// Wait for the initial command. `None` if the parent went away.
    pub async fn command(&mut self) -> Option<C> {
        self.command.take()?.await.ok()
    }

    /// Report progress.
    pub fn state(&self, state: S) {
        self.send(UnitEvent::State(state));
    }

    /// Report completion.
    pub fn done(&self) {
        self.send(UnitEvent::Done);
    }

    /// Report failure.
    pub fn error(&self, error: E) {
        self.send(UnitEvent::Error(error));
    }

    // A parent that stopped listening has already decided the outcome.
    fn send(&self, event: UnitEvent<S, E>) {
        let _ = self.events.send(event);
    }
}
