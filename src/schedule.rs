use std::collections::HashMap;
use std::fs;
use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::Settings;

pub const CATEGORY_LIST_FILE: &str = "categories.txt";

/// Categories and their task lists, with the exception schedule pinned in place.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleStore {
    order: Vec<String>,
    tasks: HashMap<String, Vec<String>>,
    exception_category: String,
}

impl ScheduleStore {
    pub fn new(
        configured: Vec<(String, Vec<String>)>,
        exception_category: impl Into<String>,
        exception_position: usize,
        exception_tasks: Vec<String>,
    ) -> Self {
        let exception_category = exception_category.into();
        let mut order = Vec::new();
        let mut tasks = HashMap::new();

        for (category, category_tasks) in configured {
            if category == exception_category || tasks.contains_key(&category) {
                continue;
            }
            order.push(category.clone());
            tasks.insert(category, category_tasks);
        }

        let position = exception_position.min(order.len());
        order.insert(position, exception_category.clone());
        tasks.insert(exception_category.clone(), exception_tasks);

        Self {
            order,
            tasks,
            exception_category,
        }
    }

    pub fn categories(&self) -> &[String] {
        &self.order
    }

    pub fn tasks(&self, category: &str) -> &[String] {
        self.tasks
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, category: &str, task: &str) -> bool {
        self.tasks(category).iter().any(|entry| entry == task)
    }

    pub fn exception_category(&self) -> &str {
        &self.exception_category
    }

    pub fn is_exception_category(&self, category: &str) -> bool {
        category == self.exception_category
    }

    pub fn exception_tasks(&self) -> &[String] {
        self.tasks(&self.exception_category)
    }

    /// Appends a trimmed task; blank input leaves the list untouched.
    pub fn add_exception_task(&mut self, text: &str) -> bool {
        let value = text.trim();
        if value.is_empty() {
            return false;
        }

        self.tasks
            .entry(self.exception_category.clone())
            .or_default()
            .push(value.to_string());
        true
    }

    pub fn remove_exception_task(&mut self, index: usize) -> Option<String> {
        let tasks = self.tasks.get_mut(&self.exception_category)?;
        if index >= tasks.len() {
            return None;
        }
        Some(tasks.remove(index))
    }
}

/// Reads the category list and every category's task file from `dir`.
///
/// A failure on one category leaves that category empty; a failure on the
/// category list leaves only the exception schedule.
pub fn load_configuration(
    dir: &Path,
    settings: &Settings,
    exception_tasks: Vec<String>,
) -> ScheduleStore {
    let categories = match read_resource(&dir.join(CATEGORY_LIST_FILE)) {
        Ok(raw) => parse_lines(&raw),
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "category list unavailable");
            Vec::new()
        }
    };

    let mut configured = Vec::with_capacity(categories.len());
    for category in categories {
        if category == settings.exception_category {
            debug!(%category, "skipping exception category in category list");
            continue;
        }

        let tasks = match category_path(dir, &category).and_then(|path| read_resource(&path)) {
            Ok(raw) => parse_lines(&raw),
            Err(err) => {
                warn!(%category, error = %err, "task list unavailable, using empty list");
                Vec::new()
            }
        };
        configured.push((category, tasks));
    }

    ScheduleStore::new(
        configured,
        settings.exception_category.clone(),
        settings.exception_position,
        exception_tasks,
    )
}

/// Splits on line breaks, trims, drops blank lines, keeps order.
pub fn parse_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn category_path(dir: &Path, category: &str) -> Result<PathBuf, Error> {
    if category.contains(['/', '\\']) || category == "." || category == ".." {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            format!("category name is not a valid file name: {category}"),
        ));
    }
    Ok(dir.join(format!("{category}.txt")))
}

fn read_resource(path: &Path) -> Result<String, Error> {
    fs::read_to_string(path)
}
