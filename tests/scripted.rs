#![cfg(target_os = "linux")]

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn run_script_in(dir: &Path, script: &str) -> (String, String, i32) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_jobsh"))
        .current_dir(dir)
        .env("JOBSH_RC", dir.join("missing-rc"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn shell");
    {
        let stdin = child.stdin.as_mut().expect("stdin");
        stdin.write_all(script.as_bytes()).expect("write");
    }
    let output = child.wait_with_output().expect("wait");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(1);
    (stdout, stderr, code)
}

fn run_script(script: &str) -> (String, String, i32) {
    let dir = TempDir::new().expect("tempdir");
    run_script_in(dir.path(), script)
}

/// Pids announced as `[n] <pid>` when background jobs start.
fn announced_pids(out: &str) -> Vec<u32> {
    out.lines()
        .filter_map(|line| {
            let rest = line.strip_prefix('[')?;
            let (_, pid) = rest.split_once("] ")?;
            pid.trim().parse::<u32>().ok()
        })
        .collect()
}

#[test]
fn scripted_pipeline_through_sort() {
    let (out, err, code) = run_script("printf b\\na\\n | sort\n");
    assert!(err.is_empty(), "stderr: {err}");
    assert!(out.starts_with("a\nb\n"), "stdout: {out}");
    assert_eq!(code, 0);
}

#[test]
fn scripted_truncate_append_and_input_redirection() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("out.txt"), "stale\n").unwrap();
    let script = "echo one > out.txt\necho two >> out.txt\ncat < out.txt | wc -l\ncat < out.txt\n";
    let (out, err, code) = run_script_in(dir.path(), script);
    assert!(err.is_empty(), "stderr: {err}");
    assert!(out.contains("2\none\ntwo\n"), "stdout: {out}");
    assert_eq!(code, 0);
}

#[test]
fn scripted_last_redirection_wins() {
    let dir = TempDir::new().expect("tempdir");
    let (_, err, _) = run_script_in(dir.path(), "echo hi > first.txt > second.txt\n");
    assert!(err.is_empty(), "stderr: {err}");
    assert!(!dir.path().join("first.txt").exists());
    assert_eq!(
        fs::read_to_string(dir.path().join("second.txt")).unwrap(),
        "hi\n"
    );
}

#[test]
fn scripted_syntax_error_keeps_shell_running() {
    let (out, err, code) = run_script("ls | | wc\necho after\n");
    assert!(err.contains("Invalid Syntax!"), "stderr: {err}");
    assert!(out.contains("after"));
    assert_eq!(code, 0);
}

#[test]
fn scripted_missing_input_and_unknown_command() {
    let (out, err, _) = run_script("cat < missing.txt\nno-such-command-xyz\necho still\n");
    assert!(err.contains("No such file or directory"), "stderr: {err}");
    assert!(err.contains("no-such-command-xyz: command not found"), "stderr: {err}");
    assert!(out.contains("still"));
}

#[test]
fn scripted_and_runs_only_after_success() {
    let (out, err, _) = run_script("false && echo no\ntrue && echo yes\n");
    assert!(err.is_empty(), "stderr: {err}");
    assert!(out.lines().any(|line| line == "yes"));
    assert!(!out.lines().any(|line| line == "no"));
}

#[test]
fn scripted_background_jobs_listed_and_killed_at_eof() {
    let (out, err, code) = run_script("sleep 5 &\nsleep 3 &\nactivities\n");
    assert!(err.is_empty(), "stderr: {err}");
    let pids = announced_pids(&out);
    assert_eq!(pids.len(), 2, "stdout: {out}");
    assert!(out.contains(&format!("[1] {}", pids[0])));
    assert!(out.contains(&format!("[2] {}", pids[1])));

    let three = out
        .find(&format!("[{}] : sleep 3 - Running", pids[1]))
        .expect("sleep 3 listed");
    let five = out
        .find(&format!("[{}] : sleep 5 - Running", pids[0]))
        .expect("sleep 5 listed");
    assert!(three < five, "activities not sorted: {out}");
    assert!(out.trim_end().ends_with("logout"));

    for pid in pids {
        assert!(
            !Path::new(&format!("/proc/{pid}")).exists(),
            "background pid {pid} survived the shell"
        );
    }
    assert_eq!(code, 0);
}

#[test]
fn scripted_background_completion_is_reported() {
    let (out, err, _) = run_script("sleep 0.1 &\nsleep 0.5\necho done\n");
    assert!(err.is_empty(), "stderr: {err}");
    let pids = announced_pids(&out);
    assert_eq!(pids.len(), 1, "stdout: {out}");
    assert!(
        out.contains(&format!("sleep 0.1 with pid {} exited normally", pids[0])),
        "stdout: {out}"
    );
}

#[test]
fn scripted_history_log_and_execute() {
    let dir = TempDir::new().expect("tempdir");
    let script = "echo a\necho b\necho b\nlog\nlog execute 2\n";
    let (out, err, _) = run_script_in(dir.path(), script);
    assert!(err.is_empty(), "stderr: {err}");
    assert!(out.contains("a\nb\nb\necho a\necho b\na\n"), "stdout: {out}");
    let saved = fs::read_to_string(dir.path().join(".jobsh_history")).unwrap();
    assert_eq!(saved, "echo a\necho b\n");

    let (out, _, _) = run_script_in(dir.path(), "log purge\nlog\nlog bogus\n");
    assert!(out.trim_end().ends_with("logout"));
    assert!(!out.contains("echo a"));
}

#[test]
fn scripted_hop_and_reveal() {
    let dir = TempDir::new().expect("tempdir");
    let sub = dir.path().join("sub");
    fs::create_dir(&sub).unwrap();
    fs::write(sub.join("y"), "").unwrap();
    fs::write(sub.join("x"), "").unwrap();
    fs::write(sub.join(".h"), "").unwrap();
    let script = "hop sub\nreveal\nhop ~\nreveal -l sub\nhop -\nreveal -a\nhop nowhere\nreveal -q\n";
    let (out, err, _) = run_script_in(dir.path(), script);
    assert!(out.contains("x y\nx\ny\n. .. .h x y\n"), "stdout: {out}");
    assert!(err.contains("No such directory!"), "stderr: {err}");
    assert!(err.contains("reveal: Invalid Syntax!"), "stderr: {err}");
}

#[test]
fn scripted_ping_reports_errors() {
    let (_, err, _) = run_script("ping 1 0\nping 999999999 9\n");
    assert!(err.contains("Invalid syntax!"), "stderr: {err}");
    assert!(err.contains("No such process found"), "stderr: {err}");
}

#[test]
fn scripted_builtins_inside_pipelines() {
    let (out, err, _) = run_script("activities | wc -l\nfg | cat\n");
    assert!(out.lines().any(|line| line.trim() == "0"), "stdout: {out}");
    assert!(err.contains("fg: job control is unavailable"), "stderr: {err}");
}

#[test]
fn scripted_fg_without_jobs() {
    let (_, err, _) = run_script("fg\nbg 4\nfg x\n");
    assert!(err.contains("fg: no such job"), "stderr: {err}");
    assert!(err.contains("bg: no such job"), "stderr: {err}");
    assert!(err.contains("fg: job id must be a number"), "stderr: {err}");
}
