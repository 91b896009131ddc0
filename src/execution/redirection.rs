use std::fs::{self, File};
use std::io::{self, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;

use log::{debug, warn};
use nix::unistd::{dup, dup2};

use crate::error::{ErrorKind, ShellError, ShellResult};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct OutputTarget {
    pub path: String,
    pub append: bool,
}

/// One job group with its redirections pulled out and its stages split on `|`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct GroupPlan {
    pub stages: Vec<Vec<String>>,
    pub input: Option<String>,
    pub output: Option<OutputTarget>,
}

/// Opened redirection files for one group.
#[derive(Default)]
pub struct Redirections {
    pub input: Option<File>,
    pub output: Option<File>,
}

fn invalid_syntax() -> ShellError {
    ShellError::new(ErrorKind::Syntax, "Invalid Syntax!")
}

/// Strip redirections out of a group. When a direction is redirected more
/// than once, the last one wins.
pub fn plan_group(words: &[String]) -> ShellResult<GroupPlan> {
    let mut stages = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut input = None;
    let mut output = None;
    let mut iter = words.iter();
    while let Some(word) = iter.next() {
        match word.as_str() {
            "<" | ">" | ">>" => {
                let Some(path) = iter.next() else {
                    return Err(invalid_syntax());
                };
                if word == "<" {
                    input = Some(path.clone());
                } else {
                    output = Some(OutputTarget {
                        path: path.clone(),
                        append: word == ">>",
                    });
                }
            }
            "|" => {
                if current.is_empty() {
                    return Err(invalid_syntax());
                }
                stages.push(std::mem::take(&mut current));
            }
            _ => current.push(word.clone()),
        }
    }
    if current.is_empty() {
        return Err(invalid_syntax());
    }
    stages.push(current);
    Ok(GroupPlan {
        stages,
        input,
        output,
    })
}

/// Open the group's input and output files. Nothing is spawned if this fails.
pub fn open_redirections(plan: &GroupPlan) -> ShellResult<Redirections> {
    let input = match plan.input {
        Some(ref path) => Some(fs::File::open(path).map_err(|err| {
            debug!("redirect event=open-input path={} error={}", path, err);
            ShellError::resource("No such file or directory")
        })?),
        None => None,
    };
    let output = match plan.output {
        Some(ref target) => {
            let mut opts = fs::OpenOptions::new();
            opts.write(true).create(true).mode(0o644);
            if target.append {
                opts.append(true);
            } else {
                opts.truncate(true);
            }
            Some(opts.open(&target.path).map_err(|err| {
                debug!(
                    "redirect event=open-output path={} error={}",
                    target.path, err
                );
                ShellError::resource("Unable to create file for writing")
            })?)
        }
        None => None,
    };
    Ok(Redirections { input, output })
}

/// Points the shell's own stdin/stdout at redirection files for an
/// in-process builtin and puts the originals back on drop.
pub struct StdioGuard {
    saved: Vec<(RawFd, OwnedFd)>,
}

impl StdioGuard {
    pub fn redirect(redirections: Redirections) -> ShellResult<Self> {
        let mut guard = StdioGuard { saved: Vec::new() };
        let _ = io::stdout().flush();
        for (file, target) in [
            (redirections.input, libc::STDIN_FILENO),
            (redirections.output, libc::STDOUT_FILENO),
        ] {
            let Some(file) = file else { continue };
            let saved = dup(target).map_err(|err| ShellError::resource(format!("dup: {err}")))?;
            guard
                .saved
                .push((target, unsafe { OwnedFd::from_raw_fd(saved) }));
            dup2(file.as_raw_fd(), target)
                .map_err(|err| ShellError::resource(format!("dup2: {err}")))?;
        }
        Ok(guard)
    }
}

impl Drop for StdioGuard {
    fn drop(&mut self) {
        let _ = io::stdout().flush();
        for (target, saved) in self.saved.drain(..).rev() {
            if let Err(err) = dup2(saved.as_raw_fd(), target) {
                warn!("redirect event=restore fd={} error={}", target, err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn words(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn plan_takes_last_redirection_of_each_direction() {
        let plan = plan_group(&words("sort < a.txt < b.txt > c.txt >> d.txt")).unwrap();
        assert_eq!(plan.stages, vec![words("sort")]);
        assert_eq!(plan.input.as_deref(), Some("b.txt"));
        assert_eq!(
            plan.output,
            Some(OutputTarget {
                path: "d.txt".to_string(),
                append: true
            })
        );
    }

    #[test]
    fn plan_splits_stages_and_strips_filenames() {
        let plan = plan_group(&words("cat < in | grep x | wc -l > out")).unwrap();
        assert_eq!(
            plan.stages,
            vec![words("cat"), words("grep x"), words("wc -l")]
        );
        assert_eq!(plan.input.as_deref(), Some("in"));
        assert_eq!(plan.output.map(|o| o.append), Some(false));
    }

    #[test]
    fn missing_input_file_is_reported() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        let plan = GroupPlan {
            stages: vec![words("cat")],
            input: Some(missing.display().to_string()),
            output: None,
        };
        let err = open_redirections(&plan).err().unwrap();
        assert_eq!(err.message, "No such file or directory");
    }

    #[test]
    fn output_truncates_or_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        fs::write(&path, "old\n").unwrap();
        let mut plan = GroupPlan {
            stages: vec![words("echo")],
            input: None,
            output: Some(OutputTarget {
                path: path.display().to_string(),
                append: true,
            }),
        };
        let mut file = open_redirections(&plan).unwrap().output.unwrap();
        file.write_all(b"new\n").unwrap();
        drop(file);
        assert_eq!(fs::read_to_string(&path).unwrap(), "old\nnew\n");

        plan.output.as_mut().unwrap().append = false;
        drop(open_redirections(&plan).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn output_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let plan = GroupPlan {
            stages: vec![words("echo")],
            input: None,
            output: Some(OutputTarget {
                path: dir.path().join("nope/out.txt").display().to_string(),
                append: false,
            }),
        };
        let err = open_redirections(&plan).err().unwrap();
        assert_eq!(err.message, "Unable to create file for writing");
    }
}
