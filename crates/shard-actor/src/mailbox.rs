//! Per-actor message queue.
//!
//! A mailbox is a tokio mpsc channel, bounded when the actor system is
//! configured with a capacity and unbounded otherwise. The actor task owns the
//! receiver; every [`ActorRef`](crate::ActorRef) clone owns a sender.

use crate::message::Envelope;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Why an envelope could not be enqueued. The envelope is handed back so a
/// pending ask can be failed explicitly.
#[derive(Debug)]
pub(crate) enum Rejected {
    Full(Envelope),
    Closed(Envelope),
}

#[derive(Debug, Clone)]
pub(crate) enum MailboxSender {
    Bounded(mpsc::Sender<Envelope>),
    Unbounded(mpsc::UnboundedSender<Envelope>),
}

#[derive(Debug)]
pub(crate) enum MailboxReceiver {
    Bounded(mpsc::Receiver<Envelope>),
    Unbounded(mpsc::UnboundedReceiver<Envelope>),
}

/// Creates a mailbox. `None` or `Some(0)` yields an unbounded queue.
pub(crate) fn mailbox(capacity: Option<usize>) -> (MailboxSender, MailboxReceiver) {
    match capacity.filter(|c| *c > 0) {
        Some(capacity) => {
            let (sender, receiver) = mpsc::channel(capacity);
            (
                MailboxSender::Bounded(sender),
                MailboxReceiver::Bounded(receiver),
            )
        }
        None => {
            let (sender, receiver) = mpsc::unbounded_channel();
            (
                MailboxSender::Unbounded(sender),
                MailboxReceiver::Unbounded(receiver),
            )
        }
    }
}

impl MailboxSender {
    /// Enqueues without waiting.
    pub(crate) fn try_send(&self, envelope: Envelope) -> Result<(), Rejected> {
        match self {
            MailboxSender::Bounded(sender) => sender.try_send(envelope).map_err(|e| match e {
                TrySendError::Full(envelope) => Rejected::Full(envelope),
                TrySendError::Closed(envelope) => Rejected::Closed(envelope),
            }),
            MailboxSender::Unbounded(sender) => sender
                .send(envelope)
                .map_err(|e| Rejected::Closed(e.0)),
        }
    }

    /// Enqueues, waiting for room on a bounded mailbox.
    pub(crate) async fn send(&self, envelope: Envelope) -> Result<(), Envelope> {
        match self {
            MailboxSender::Bounded(sender) => sender.send(envelope).await.map_err(|e| e.0),
            MailboxSender::Unbounded(sender) => sender.send(envelope).map_err(|e| e.0),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        match self {
            MailboxSender::Bounded(sender) => sender.is_closed(),
            MailboxSender::Unbounded(sender) => sender.is_closed(),
        }
    }
}

impl MailboxReceiver {
    pub(crate) async fn recv(&mut self) -> Option<Envelope> {
        match self {
            MailboxReceiver::Bounded(receiver) => receiver.recv().await,
            MailboxReceiver::Unbounded(receiver) => receiver.recv().await,
        }
    }

    /// Returns an envelope that is already queued, if any.
    #[cfg(test)]
    pub(crate) fn try_recv(&mut self) -> Option<Envelope> {
        match self {
            MailboxReceiver::Bounded(receiver) => receiver.try_recv().ok(),
            MailboxReceiver::Unbounded(receiver) => receiver.try_recv().ok(),
        }
    }

    /// Refuses new envelopes. Envelopes queued before the call stay receivable.
    pub(crate) fn close(&mut self) {
        match self {
            MailboxReceiver::Bounded(receiver) => receiver.close(),
            MailboxReceiver::Unbounded(receiver) => receiver.close(),
        }
    }
}
