use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{ErrorKind, ShellError, ShellResult};

/// Directory bookkeeping shared by `hop` and `reveal`.
#[derive(Debug, Clone)]
pub struct DirState {
    /// Directory the shell was started in.
    pub home: PathBuf,
    pub previous: Option<PathBuf>,
}

impl DirState {
    pub fn new(home: PathBuf) -> Self {
        Self {
            home,
            previous: None,
        }
    }

    pub fn resolve(&self, arg: &str) -> ShellResult<PathBuf> {
        match arg {
            "~" => Ok(self.home.clone()),
            "-" => self.previous.clone().ok_or_else(no_such_directory),
            _ => match arg.strip_prefix("~/") {
                Some(rest) => Ok(self.home.join(rest)),
                None => Ok(PathBuf::from(arg)),
            },
        }
    }
}

fn no_such_directory() -> ShellError {
    ShellError::lookup("No such directory!")
}

pub(crate) fn handle_hop(dirs: &mut DirState, args: &[String]) -> ShellResult<i32> {
    let target = match args.get(1) {
        None => dirs.home.clone(),
        Some(arg) => dirs.resolve(arg)?,
    };
    let before = env::current_dir()?;
    env::set_current_dir(&target).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => no_such_directory(),
        _ => ShellError::resource(format!("hop: {err}")),
    })?;
    debug!(
        "dir event=hop from={} to={}",
        before.display(),
        target.display()
    );
    dirs.previous = Some(before);
    Ok(0)
}

#[derive(Debug, Default, Eq, PartialEq)]
struct RevealOptions {
    show_all: bool,
    line_by_line: bool,
    path: Option<String>,
}

fn reveal_syntax() -> ShellError {
    ShellError::new(ErrorKind::Syntax, "reveal: Invalid Syntax!")
}

fn parse_reveal_args(args: &[String]) -> ShellResult<RevealOptions> {
    let mut options = RevealOptions::default();
    let mut rest = args.iter().skip(1).peekable();
    while let Some(flags) = rest.next_if(|arg| arg.len() > 1 && arg.starts_with('-')) {
        for flag in flags.chars().skip(1) {
            match flag {
                'a' => options.show_all = true,
                'l' => options.line_by_line = true,
                _ => return Err(reveal_syntax()),
            }
        }
    }
    options.path = rest.next().cloned();
    if rest.next().is_some() {
        return Err(reveal_syntax());
    }
    Ok(options)
}

pub(crate) fn list_entries(dir: &Path, show_all: bool) -> ShellResult<Vec<String>> {
    let reader = fs::read_dir(dir).map_err(|_| no_such_directory())?;
    let mut names: Vec<String> = reader
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| show_all || !name.starts_with('.'))
        .collect();
    if show_all {
        names.push(".".to_string());
        names.push("..".to_string());
    }
    names.sort();
    Ok(names)
}

pub(crate) fn handle_reveal(dirs: &DirState, args: &[String]) -> ShellResult<i32> {
    let options = parse_reveal_args(args)?;
    let target = match options.path {
        Some(ref path) => dirs.resolve(path)?,
        None => PathBuf::from("."),
    };
    let names = list_entries(&target, options.show_all)?;
    let mut out = io::stdout().lock();
    if options.line_by_line {
        for name in &names {
            writeln!(out, "{name}")?;
        }
    } else if !names.is_empty() {
        writeln!(out, "{}", names.join(" "))?;
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn reveal_flags_combine_and_reject_unknown() {
        let options = parse_reveal_args(&args("reveal -al dir")).unwrap();
        assert_eq!(
            options,
            RevealOptions {
                show_all: true,
                line_by_line: true,
                path: Some("dir".to_string()),
            }
        );
        assert!(parse_reveal_args(&args("reveal -x")).is_err());
        let err = parse_reveal_args(&args("reveal a b")).unwrap_err();
        assert_eq!(err.message, "reveal: Invalid Syntax!");
    }

    #[test]
    fn reveal_dash_alone_is_a_path() {
        let options = parse_reveal_args(&args("reveal -")).unwrap();
        assert_eq!(options.path.as_deref(), Some("-"));
    }

    #[test]
    fn hidden_entries_need_show_all() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b"), "").unwrap();
        fs::write(dir.path().join("a"), "").unwrap();
        fs::write(dir.path().join(".hidden"), "").unwrap();
        assert_eq!(list_entries(dir.path(), false).unwrap(), vec!["a", "b"]);
        assert_eq!(
            list_entries(dir.path(), true).unwrap(),
            vec![".", "..", ".hidden", "a", "b"]
        );
    }

    #[test]
    fn missing_directory_is_reported() {
        let dir = tempdir().unwrap();
        let err = list_entries(&dir.path().join("nope"), false).unwrap_err();
        assert_eq!(err.message, "No such directory!");
    }

    #[test]
    fn resolve_handles_home_and_previous() {
        let mut dirs = DirState::new(PathBuf::from("/start"));
        assert_eq!(dirs.resolve("~").unwrap(), PathBuf::from("/start"));
        assert_eq!(dirs.resolve("~/src").unwrap(), PathBuf::from("/start/src"));
        assert!(dirs.resolve("-").is_err());
        dirs.previous = Some(PathBuf::from("/tmp"));
        assert_eq!(dirs.resolve("-").unwrap(), PathBuf::from("/tmp"));
    }
}
