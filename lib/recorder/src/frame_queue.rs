use crate::RecorderError;
use crossbeam::channel::{Receiver, Sender, bounded};
use screen_capture::Frame;

/// A captured frame tagged with its position in the output file.
#[derive(Debug, Clone)]
pub struct QueuedFrame {
    /// Session-wide index, starts at 0 and continues across pause/resume
    pub index: u64,
    pub frame: Frame,
}

#[derive(Debug)]
pub enum QueueMessage {
    Frame(QueuedFrame),

    /// No more frames will follow in this session
    Terminator,
}

/// Create the bounded frame queue of a recording session.
///
/// The recorder keeps the [`FrameSender`] for the whole session and hands a
/// clone to every capture worker, so pause/resume keeps feeding the same
/// queue. The encode worker owns the only [`FrameReceiver`].
pub fn channel(capacity: usize) -> (FrameSender, FrameReceiver) {
    let (sender, receiver) = bounded(capacity.max(1));
    (FrameSender { sender }, FrameReceiver { receiver })
}

#[derive(Debug, Clone)]
pub struct FrameSender {
    sender: Sender<QueueMessage>,
}

impl FrameSender {
    /// Enqueue a frame, blocking while the queue is full.
    pub fn push(&self, frame: QueuedFrame) -> Result<(), RecorderError> {
        self.sender
            .send(QueueMessage::Frame(frame))
            .map_err(|e| RecorderError::QueueError(format!("push frame failed: {e}")))
    }

    pub fn push_terminator(&self) -> Result<(), RecorderError> {
        self.sender
            .send(QueueMessage::Terminator)
            .map_err(|e| RecorderError::QueueError(format!("push terminator failed: {e}")))
    }

    pub fn remained(&self) -> usize {
        self.sender.capacity().unwrap_or_default() - self.sender.len()
    }
}

#[derive(Debug)]
pub struct FrameReceiver {
    receiver: Receiver<QueueMessage>,
}

impl FrameReceiver {
    /// Block until a message arrives. `None` once every sender is gone.
    pub fn pop(&self) -> Option<QueueMessage> {
        self.receiver.recv().ok()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
