use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::analysis::{AnalysisBar, rank_categories};
use crate::config::Settings;
use crate::domain::{RecordLog, TimeRecord, day_window};
use crate::errors::AppError;
use crate::schedule::{ScheduleStore, load_configuration};
use crate::storage::Storage;
use crate::timer::{AppState, Effect, Event, TaskRef, TimerSession, TimerState, update};

/// Owns every piece of application state and applies reducer effects to it.
#[derive(Debug)]
pub struct Controller {
    state: AppState,
    store: ScheduleStore,
    log: RecordLog,
    storage: Storage,
    settings: Settings,
}

impl Controller {
    pub fn open(state_dir: &Path, settings: Settings) -> Result<Self, AppError> {
        let storage = Storage::new(state_dir);
        let exception_tasks = storage.load_exception_tasks()?;
        let schedule_dir = settings.schedule_dir(state_dir);
        let store = load_configuration(&schedule_dir, &settings, exception_tasks);
        let log = storage.load_records()?;
        let session = storage.load_session()?;

        if let Some(session) = &session {
            info!(
                category = %session.category,
                task = %session.task,
                started_at = %session.started_at,
                "restored running session"
            );
        }
        info!(
            categories = store.categories().len(),
            records = log.len(),
            "schedule loaded"
        );

        Ok(Self::new(store, log, storage, settings, session))
    }

    pub fn new(
        store: ScheduleStore,
        log: RecordLog,
        storage: Storage,
        settings: Settings,
        session: Option<TimerSession>,
    ) -> Self {
        Self {
            state: AppState::restored(session),
            store,
            log,
            storage,
            settings,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn store(&self) -> &ScheduleStore {
        &self.store
    }

    pub fn log(&self) -> &RecordLog {
        &self.log
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn dispatch(&mut self, event: Event, now: DateTime<Utc>) -> Result<(), AppError> {
        if let Event::TaskPressed(target) = &event {
            if !self.store.contains(&target.category, &target.task) {
                return Err(AppError::UnknownTask {
                    category: target.category.clone(),
                    task: target.task.clone(),
                });
            }
        }

        let transition = update(std::mem::take(&mut self.state), event, now);
        self.state = transition.state;

        // The reducer has already moved on, so every effect runs even after one
        // fails. The first error is returned.
        let mut first_error = None;
        for effect in transition.effects {
            if let Err(err) = self.apply(effect) {
                warn!(error = %err, "effect failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Idle -> Selecting -> Running in one step, for non-interactive callers.
    pub fn start(&mut self, target: TaskRef, now: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(session) = self.state.timer.session() {
            return Err(AppError::AlreadyRunning {
                category: session.category.clone(),
                task: session.task.clone(),
            });
        }
        if self.state.timer == TimerState::Idle {
            self.dispatch(Event::StartPressed, now)?;
        }

        let result = self.dispatch(Event::TaskPressed(target), now);
        if result.is_err() && self.state.timer == TimerState::Selecting {
            self.dispatch(Event::StartPressed, now)?;
        }
        result
    }

    /// Ends the running session with `event` (pause or complete) and returns the new record.
    pub fn stop(&mut self, event: Event, now: DateTime<Utc>) -> Result<TimeRecord, AppError> {
        let Some(session) = self.state.timer.session().cloned() else {
            return Err(AppError::NotRunning);
        };

        self.dispatch(event, now)?;
        self.log
            .records(&session.category, &session.task)
            .last()
            .cloned()
            .ok_or(AppError::NotRunning)
    }

    pub fn remove_exception_task(&mut self, index: usize) -> Result<String, AppError> {
        let removed = self
            .store
            .remove_exception_task(index)
            .ok_or(AppError::NoSuchExceptionTask(index))?;
        self.storage.save_exception_tasks(self.store.exception_tasks())?;
        info!(task = %removed, "removed exception task");
        Ok(removed)
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.state.timer.session().map(|session| session.elapsed(now))
    }

    pub fn today_window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        day_window(now, self.settings.day_start_hour)
    }

    pub fn analysis(&self, now: DateTime<Utc>) -> Vec<AnalysisBar> {
        let (day_start, day_end) = self.today_window(now);
        let totals = self.log.daily_totals(day_start, day_end);
        rank_categories(self.store.categories(), &totals)
    }

    fn apply(&mut self, effect: Effect) -> Result<(), AppError> {
        match effect {
            Effect::AppendRecord {
                category,
                task,
                record,
            } => {
                info!(
                    %category,
                    %task,
                    status = record.status.label(),
                    duration_ms = record.duration_ms,
                    "recorded session"
                );
                self.log.append_record(&category, &task, record);
                self.persist_records()?;
            }
            Effect::SaveSession(session) => {
                info!(category = %session.category, task = %session.task, "session started");
                self.storage.save_session(&session)?;
            }
            Effect::ClearSession => {
                self.storage.clear_session()?;
            }
            Effect::AddExceptionTask(text) => {
                if self.store.add_exception_task(&text) {
                    self.storage.save_exception_tasks(self.store.exception_tasks())?;
                    info!(task = %text, "added exception task");
                }
            }
            Effect::RemoveExceptionTask(index) => {
                self.remove_exception_task(index)?;
            }
        }
        Ok(())
    }

    /// Folds in records another process wrote since we loaded, then saves the union.
    /// A record that fails to save stays in memory and goes out with the next save.
    fn persist_records(&mut self) -> Result<(), AppError> {
        let on_disk = self.storage.load_records()?;
        self.log.merge(on_disk);
        self.storage.save_records(&self.log)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::fs;
    use std::path::PathBuf;

    use crate::config::Settings;
    use crate::domain::RecordStatus;
    use crate::errors::AppError;
    use crate::timer::{Event, TaskRef, TimerState};

    use super::Controller;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 20, 12, 0, 0).unwrap()
    }

    fn prepare(name: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let schedule = dir.join("schedule");
        fs::create_dir_all(&schedule).expect("schedule dir");
        fs::write(schedule.join("categories.txt"), "Math\nEnglish\n").expect("categories");
        fs::write(schedule.join("Math.txt"), "Concepts\nDrills\n").expect("math");
        fs::write(schedule.join("English.txt"), "Listening\nReading\n").expect("english");
        dir
    }

    #[test]
    fn records_survive_reopen_and_feed_analysis() {
        let dir = prepare("schedule_timer_controller_records");
        let mut controller = Controller::open(&dir, Settings::default()).expect("open");
        let (day_start, _) = controller.today_window(noon());

        controller
            .start(TaskRef::new("English", "Reading"), day_start + Duration::hours(1))
            .expect("start");
        let record = controller
            .stop(Event::CompletePressed, day_start + Duration::hours(2))
            .expect("stop");
        assert_eq!(record.status, RecordStatus::Completed);
        assert_eq!(record.duration(), Duration::hours(1));

        let reopened = Controller::open(&dir, Settings::default()).expect("reopen");
        assert_eq!(reopened.log().len(), 1);
        assert_eq!(reopened.state().timer, TimerState::Idle);

        let bars = reopened.analysis(day_start + Duration::hours(3));
        assert_eq!(bars[0].category, "English");
        assert_eq!(bars[0].ratio, 1.0);
        assert_eq!(
            bars.iter().map(|bar| bar.category.as_str()).collect::<Vec<_>>(),
            vec!["English", "Exception schedule", "Math"]
        );
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn running_session_survives_reopen() {
        let dir = prepare("schedule_timer_controller_session");
        let mut controller = Controller::open(&dir, Settings::default()).expect("open");
        controller
            .start(TaskRef::new("Math", "Drills"), noon())
            .expect("start");
        drop(controller);

        let mut reopened = Controller::open(&dir, Settings::default()).expect("reopen");
        assert_eq!(
            reopened.elapsed(noon() + Duration::minutes(25)),
            Some(Duration::minutes(25))
        );

        let record = reopened
            .stop(Event::PausePressed, noon() + Duration::minutes(30))
            .expect("stop");
        assert_eq!(record.status, RecordStatus::Paused);
        assert_eq!(record.start, noon());

        let reopened = Controller::open(&dir, Settings::default()).expect("reopen");
        assert_eq!(reopened.elapsed(noon()), None);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn rejects_unknown_tasks_and_double_start() {
        let dir = prepare("schedule_timer_controller_guards");
        let mut controller = Controller::open(&dir, Settings::default()).expect("open");

        let err = controller
            .start(TaskRef::new("Math", "Poetry"), noon())
            .expect_err("unknown task");
        assert!(matches!(err, AppError::UnknownTask { .. }));
        assert_eq!(controller.state().timer, TimerState::Idle);

        assert!(matches!(
            controller.stop(Event::PausePressed, noon()),
            Err(AppError::NotRunning)
        ));

        controller
            .start(TaskRef::new("Math", "Concepts"), noon())
            .expect("start");
        assert!(matches!(
            controller.start(TaskRef::new("English", "Reading"), noon()),
            Err(AppError::AlreadyRunning { .. })
        ));
        assert!(controller.log().is_empty());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn failed_record_save_still_clears_the_session() {
        let dir = prepare("schedule_timer_controller_failed_save");
        let mut controller = Controller::open(&dir, Settings::default()).expect("open");
        controller
            .start(TaskRef::new("Math", "Drills"), noon())
            .expect("start");

        let records_path = dir.join("records.json");
        fs::create_dir_all(&records_path).expect("block records file");
        let err = controller
            .stop(Event::CompletePressed, noon() + Duration::minutes(20))
            .expect_err("records cannot be written");
        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(controller.state().timer, TimerState::Idle);
        assert_eq!(controller.log().len(), 1);
        assert!(!dir.join("session.json").exists());

        let reopened = Controller::open(&dir, Settings::default());
        assert!(reopened.is_err());

        fs::remove_dir_all(&records_path).expect("unblock records file");
        let reopened = Controller::open(&dir, Settings::default()).expect("reopen");
        assert_eq!(reopened.state().timer, TimerState::Idle);

        controller
            .start(TaskRef::new("English", "Reading"), noon() + Duration::hours(1))
            .expect("start again");
        controller
            .stop(Event::PausePressed, noon() + Duration::hours(2))
            .expect("stop again");

        let reopened = Controller::open(&dir, Settings::default()).expect("reopen");
        assert_eq!(reopened.log().len(), 2);
        assert_eq!(reopened.log().records("Math", "Drills").len(), 1);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn records_from_another_process_are_kept() {
        let dir = prepare("schedule_timer_controller_shared_log");
        let mut dashboard = Controller::open(&dir, Settings::default()).expect("dashboard");
        let mut shell = Controller::open(&dir, Settings::default()).expect("shell");

        shell
            .start(TaskRef::new("Math", "Concepts"), noon())
            .expect("shell start");
        shell
            .stop(Event::CompletePressed, noon() + Duration::minutes(30))
            .expect("shell stop");

        dashboard
            .start(TaskRef::new("English", "Listening"), noon() + Duration::hours(1))
            .expect("dashboard start");
        dashboard
            .stop(Event::PausePressed, noon() + Duration::hours(2))
            .expect("dashboard stop");
        assert_eq!(dashboard.log().len(), 2);

        let reopened = Controller::open(&dir, Settings::default()).expect("reopen");
        assert_eq!(reopened.log().records("Math", "Concepts").len(), 1);
        assert_eq!(reopened.log().records("English", "Listening").len(), 1);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn exception_tasks_are_persisted_through_two_step_delete() {
        let dir = prepare("schedule_timer_controller_exceptions");
        let mut controller = Controller::open(&dir, Settings::default()).expect("open");

        controller
            .dispatch(Event::AddExceptionTask("  Dentist ".to_string()), noon())
            .expect("add");
        controller
            .dispatch(Event::AddExceptionTask(String::new()), noon())
            .expect("blank add");
        controller
            .dispatch(Event::AddExceptionTask("Bank".to_string()), noon())
            .expect("add");
        assert_eq!(controller.store().exception_tasks(), ["Dentist", "Bank"]);

        controller.dispatch(Event::ToggleEditMode, noon()).expect("edit");
        controller
            .dispatch(Event::DeletePressed { index: 0 }, noon())
            .expect("arm");
        assert_eq!(controller.store().exception_tasks().len(), 2);
        controller
            .dispatch(Event::DeletePressed { index: 0 }, noon())
            .expect("confirm");

        let reopened = Controller::open(&dir, Settings::default()).expect("reopen");
        assert_eq!(reopened.store().exception_tasks(), ["Bank"]);
        assert_eq!(reopened.store().categories()[0], "Exception schedule");
        let _ = fs::remove_dir_all(dir);
    }
}
