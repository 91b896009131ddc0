use std::collections::VecDeque;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use log::{debug, warn};

use crate::builtins::Context;
use crate::error::{ErrorKind, ShellError, ShellResult};
use crate::repl::{ShellState, run_line};

/// Bounded command history persisted to a file.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<String>,
    capacity: usize,
    path: Option<PathBuf>,
}

impl History {
    pub fn new(capacity: usize, path: Option<PathBuf>) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            path,
        }
    }

    pub fn load(&mut self) -> io::Result<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err),
        };
        self.entries.clear();
        for line in content.lines() {
            self.record(line);
        }
        debug!(
            "history event=load path={} count={}",
            path.display(),
            self.entries.len()
        );
        Ok(())
    }

    pub fn save(&self) -> io::Result<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        let mut file = fs::File::create(path)?;
        for entry in &self.entries {
            writeln!(file, "{entry}")?;
        }
        debug!(
            "history event=save path={} count={}",
            path.display(),
            self.entries.len()
        );
        Ok(())
    }

    /// Add a command. Commands starting with the word `log` and repeats of
    /// the newest entry are skipped. Returns whether it was stored.
    pub fn record(&mut self, command: &str) -> bool {
        let command = command.trim();
        if command.is_empty() || command.split_whitespace().next() == Some("log") {
            return false;
        }
        if self.entries.back().is_some_and(|last| last == command) {
            return false;
        }
        if self.capacity == 0 {
            return false;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(command.to_string());
        true
    }

    pub fn purge(&mut self) {
        self.entries.clear();
    }

    /// Entry `index` counted from the newest (1 = newest).
    pub fn nth_newest(&self, index: usize) -> Option<&str> {
        if index == 0 || index > self.entries.len() {
            return None;
        }
        self.entries
            .get(self.entries.len() - index)
            .map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

fn log_syntax() -> ShellError {
    ShellError::new(ErrorKind::Syntax, "log: Invalid Syntax!")
}

pub(crate) fn handle_log(
    state: &mut ShellState,
    args: &[String],
    context: Context,
) -> ShellResult<i32> {
    match (args.get(1).map(String::as_str), args.get(2), args.len()) {
        (None, _, _) => {
            let mut out = io::stdout().lock();
            for entry in state.history.entries() {
                writeln!(out, "{entry}")?;
            }
            Ok(0)
        }
        (Some("purge"), None, 2) => {
            state.history.purge();
            if let Err(err) = state.history.save() {
                warn!("history event=purge-save error={}", err);
            }
            Ok(0)
        }
        (Some("execute"), Some(index), 3) => {
            let index = index.parse::<usize>().map_err(|_| log_syntax())?;
            let line = state
                .history
                .nth_newest(index)
                .map(str::to_string)
                .ok_or_else(log_syntax)?;
            if context == Context::Child {
                return Err(ShellError::resource(
                    "log: job control is unavailable in a pipeline or background job",
                ));
            }
            debug!("history event=execute index={} line={}", index, line);
            Ok(run_line(state, &line, false))
        }
        _ => Err(log_syntax()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn record_skips_log_and_repeats() {
        let mut history = History::new(15, None);
        assert!(history.record("ls"));
        assert!(!history.record("ls"));
        assert!(!history.record("log"));
        assert!(!history.record("log execute 1"));
        assert!(history.record("logger x"));
        assert!(history.record("echo hi"));
        assert!(history.record("ls"));
        let entries: Vec<&str> = history.entries().collect();
        assert_eq!(entries, vec!["ls", "logger x", "echo hi", "ls"]);
    }

    #[test]
    fn oldest_entry_dropped_on_overflow() {
        let mut history = History::new(3, None);
        for cmd in ["a", "b", "c", "d"] {
            history.record(cmd);
        }
        let entries: Vec<&str> = history.entries().collect();
        assert_eq!(entries, vec!["b", "c", "d"]);
        assert_eq!(history.nth_newest(1), Some("d"));
        assert_eq!(history.nth_newest(3), Some("b"));
        assert_eq!(history.nth_newest(4), None);
        assert_eq!(history.nth_newest(0), None);
    }

    #[test]
    fn save_and_load_round_trip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history");
        let mut history = History::new(15, Some(path.clone()));
        history.record("echo one");
        history.record("sleep 1 &");
        history.save().unwrap();

        let mut loaded = History::new(15, Some(path));
        loaded.load().unwrap();
        let entries: Vec<&str> = loaded.entries().collect();
        assert_eq!(entries, vec!["echo one", "sleep 1 &"]);

        loaded.record("pwd");
        loaded.save().unwrap();
        let mut reloaded = History::new(2, loaded.path.clone());
        reloaded.load().unwrap();
        let entries: Vec<&str> = reloaded.entries().collect();
        assert_eq!(entries, vec!["sleep 1 &", "pwd"]);
    }

    #[test]
    fn purge_clears_entries() {
        let mut history = History::new(15, None);
        history.record("pwd");
        history.purge();
        assert_eq!(history.entries().count(), 0);
    }
}
