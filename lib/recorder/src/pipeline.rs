use crate::{
    RecorderError, RecorderEvent,
    frame_queue::FrameSender,
    run_state::{RunState, SharedRunState},
};
use crossbeam::channel::Sender;
use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
};

/// State shared between a recorder and the workers of its current session.
#[derive(Debug, Default)]
pub(crate) struct Pipeline {
    pub run_state: SharedRunState,
    pub frames_captured: AtomicU64,
    pub frames_encoded: AtomicU64,
    pub capture_workers: AtomicUsize,
    terminator_sent: AtomicBool,
    error: Mutex<Option<RecorderError>>,
    last_error: Mutex<Option<String>>,
    events: Mutex<Option<Sender<RecorderEvent>>>,
}

impl Pipeline {
    /// Prepare counters for a new session.
    pub fn reset(&self) {
        self.frames_captured.store(0, Ordering::Relaxed);
        self.frames_encoded.store(0, Ordering::Relaxed);
        self.terminator_sent.store(false, Ordering::Relaxed);
        self.error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn set_event_sender(&self, sender: Option<Sender<RecorderEvent>>) {
        *self.events.lock().unwrap_or_else(PoisonError::into_inner) = sender;
    }

    /// Drop-on-full delivery, a slow listener never stalls a worker.
    pub fn emit(&self, event: RecorderEvent) {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = events.as_ref()
            && let Err(e) = sender.try_send(event)
        {
            log::warn!("drop recorder event: {e}");
        }
    }

    /// Record a worker failure and stop the session.
    ///
    /// Only the first error of a session is kept. Returns true if this call stored it.
    pub fn fail(&self, err: RecorderError) -> bool {
        let mut slot = self.error.lock().unwrap_or_else(PoisonError::into_inner);
        let first = slot.is_none();

        if first {
            log::warn!("recording pipeline failed: {err}");
            let message = err.to_string();
            *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) =
                Some(message.clone());
            *slot = Some(err);
            drop(slot);

            self.run_state.fail();
            self.emit(RecorderEvent::Failed(message));
        } else {
            log::debug!("ignore follow-up pipeline error: {err}");
        }

        first
    }

    pub fn take_error(&self) -> Option<RecorderError> {
        self.error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.run_state.load() == RunState::Stopped
    }

    /// Push the end-of-session marker, at most once per session.
    pub fn send_terminator(&self, sender: &FrameSender) {
        if self.terminator_sent.swap(true, Ordering::AcqRel) {
            return;
        }

        match sender.push_terminator() {
            Ok(_) => log::debug!("frame queue terminator sent"),
            Err(e) => log::warn!("{e}"),
        }
    }

    /// Count a capture worker as active until the guard drops.
    pub fn capture_worker_guard(self: &Arc<Self>) -> CaptureWorkerGuard {
        self.capture_workers.fetch_add(1, Ordering::AcqRel);
        CaptureWorkerGuard(self.clone())
    }
}

pub(crate) struct CaptureWorkerGuard(Arc<Pipeline>);

impl Drop for CaptureWorkerGuard {
    fn drop(&mut self) {
        self.0.capture_workers.fetch_sub(1, Ordering::AcqRel);
    }
}
