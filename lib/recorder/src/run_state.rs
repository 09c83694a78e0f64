use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a [`ScreenRecorder`](crate::ScreenRecorder).
///
/// `Stopped` is transient: it is held while a session is torn down, or after
/// a worker failed until the next lifecycle call reaps the session.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Idle = 0,
    Running = 1,
    Paused = 2,
    Stopped = 3,
}

impl From<u8> for RunState {
    fn from(value: u8) -> Self {
        match value {
            1 => RunState::Running,
            2 => RunState::Paused,
            3 => RunState::Stopped,
            _ => RunState::Idle,
        }
    }
}

/// The one run state a recorder and its workers share.
///
/// Only the recorder's lifecycle calls store arbitrary states. Workers read it
/// every iteration and may only move an active session to `Stopped`.
#[derive(Debug, Default)]
pub struct SharedRunState(AtomicU8);

impl SharedRunState {
    pub fn load(&self) -> RunState {
        self.0.load(Ordering::Acquire).into()
    }

    pub fn is_running(&self) -> bool {
        self.load() == RunState::Running
    }

    pub(crate) fn store(&self, state: RunState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Store `to` only if the current state is `from`.
    pub(crate) fn transition(&self, from: RunState, to: RunState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Move `Running` or `Paused` to `Stopped`. Returns false when idle.
    pub(crate) fn fail(&self) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                match RunState::from(v) {
                    RunState::Running | RunState::Paused => Some(RunState::Stopped as u8),
                    _ => None,
                }
            })
            .is_ok()
    }
}
