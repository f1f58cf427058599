use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{RecordStatus, TimeRecord};

/// The running stopwatch. Persisted so a restart keeps counting from `started_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSession {
    pub category: String,
    pub task: String,
    pub started_at: DateTime<Utc>,
}

impl TimerSession {
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        (now - self.started_at).max(Duration::zero())
    }

    pub fn is_for(&self, target: &TaskRef) -> bool {
        self.category == target.category && self.task == target.task
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TimerState {
    #[default]
    Idle,
    Selecting,
    Running(TimerSession),
}

impl TimerState {
    pub fn label(&self) -> &'static str {
        match self {
            TimerState::Idle => "Idle",
            TimerState::Selecting => "Selecting task",
            TimerState::Running(_) => "Running",
        }
    }

    pub fn session(&self) -> Option<&TimerSession> {
        match self {
            TimerState::Running(session) => Some(session),
            TimerState::Idle | TimerState::Selecting => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskRef {
    pub category: String,
    pub task: String,
}

impl TaskRef {
    pub fn new(category: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            task: task.into(),
        }
    }
}

/// First press on an exception task's delete control; a second press on the
/// same target commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingDeletion {
    pub target: usize,
    pub armed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    pub timer: TimerState,
    pub pending_deletion: Option<PendingDeletion>,
    pub edit_mode: bool,
    pub expanded: Option<TaskRef>,
}

impl AppState {
    pub fn restored(session: Option<TimerSession>) -> Self {
        Self {
            timer: session.map(TimerState::Running).unwrap_or_default(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StartPressed,
    TaskPressed(TaskRef),
    PausePressed,
    CompletePressed,
    ToggleEditMode,
    DeletePressed { index: usize },
    AddExceptionTask(String),
    Tick,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    AppendRecord {
        category: String,
        task: String,
        record: TimeRecord,
    },
    SaveSession(TimerSession),
    ClearSession,
    AddExceptionTask(String),
    RemoveExceptionTask(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: AppState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn unchanged(state: AppState) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }
}

pub fn update(mut state: AppState, event: Event, now: DateTime<Utc>) -> Transition {
    if event == Event::Tick {
        return Transition::unchanged(state);
    }

    // Every click other than the confirming one disarms a pending delete.
    let pending = state.pending_deletion.take();

    match event {
        Event::StartPressed => match state.timer {
            TimerState::Idle => {
                state.timer = TimerState::Selecting;
                state.expanded = None;
                Transition::unchanged(state)
            }
            TimerState::Selecting => {
                state.timer = TimerState::Idle;
                Transition::unchanged(state)
            }
            TimerState::Running(_) => {
                debug!("start ignored while a session is running");
                Transition::unchanged(state)
            }
        },
        Event::TaskPressed(target) => {
            if state.timer == TimerState::Selecting {
                let session = TimerSession {
                    category: target.category,
                    task: target.task,
                    started_at: now,
                };
                state.timer = TimerState::Running(session.clone());
                return Transition {
                    state,
                    effects: vec![Effect::SaveSession(session)],
                };
            }

            if state.expanded.as_ref() == Some(&target) {
                state.expanded = None;
            } else {
                state.expanded = Some(target);
            }
            Transition::unchanged(state)
        }
        Event::PausePressed => end_session(state, RecordStatus::Paused, now),
        Event::CompletePressed => end_session(state, RecordStatus::Completed, now),
        Event::ToggleEditMode => {
            state.edit_mode = !state.edit_mode;
            Transition::unchanged(state)
        }
        Event::DeletePressed { index } => {
            if !state.edit_mode {
                debug!(index, "delete ignored outside edit mode");
                return Transition::unchanged(state);
            }

            match pending {
                Some(armed) if armed.target == index => Transition {
                    state,
                    effects: vec![Effect::RemoveExceptionTask(index)],
                },
                _ => {
                    state.pending_deletion = Some(PendingDeletion {
                        target: index,
                        armed_at: now,
                    });
                    Transition::unchanged(state)
                }
            }
        }
        Event::AddExceptionTask(text) => {
            let value = text.trim();
            if value.is_empty() {
                return Transition::unchanged(state);
            }
            Transition {
                state,
                effects: vec![Effect::AddExceptionTask(value.to_string())],
            }
        }
        Event::Tick => Transition::unchanged(state),
    }
}

fn end_session(mut state: AppState, status: RecordStatus, now: DateTime<Utc>) -> Transition {
    let session = match std::mem::take(&mut state.timer) {
        TimerState::Running(session) => session,
        other => {
            debug!(status = status.label(), "stop ignored without a running session");
            state.timer = other;
            return Transition::unchanged(state);
        }
    };

    let record = TimeRecord::new(session.started_at, now, status);
    Transition {
        state,
        effects: vec![
            Effect::AppendRecord {
                category: session.category,
                task: session.task,
                record,
            },
            Effect::ClearSession,
        ],
    }
}
