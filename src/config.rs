use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

use log::debug;

use crate::error::{ErrorKind, ShellError};

pub const DEFAULT_HISTORY_SIZE: usize = 15;
pub const DEFAULT_MAX_JOBS: usize = 100;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ShellConfig {
    /// Prompt template with `{user}`, `{host}` and `{cwd}` placeholders.
    pub prompt: Option<String>,
    pub history_size: usize,
    /// Defaults to a file in the shell's home directory when unset.
    pub history_file: Option<PathBuf>,
    pub max_jobs: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: None,
            history_size: DEFAULT_HISTORY_SIZE,
            history_file: None,
            max_jobs: DEFAULT_MAX_JOBS,
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("JOBSH_RC") {
        return Some(PathBuf::from(path));
    }
    env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".jobshrc"))
}

pub fn load_config() -> io::Result<ShellConfig> {
    let Some(path) = config_path() else {
        return Ok(ShellConfig::default());
    };
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(ShellConfig::default()),
        Err(err) => return Err(err),
    };
    debug!("config event=load path={}", path.display());
    let (config, errors) = parse_config(&content);
    for err in errors {
        eprintln!("{err}");
    }
    Ok(config)
}

/// Parse rc file content. Bad lines are skipped and returned as errors.
pub fn parse_config(content: &str) -> (ShellConfig, Vec<ShellError>) {
    let mut config = ShellConfig::default();
    let mut errors = Vec::new();
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let result = if let Some(rest) = line.strip_prefix("export ") {
            parse_export(rest)
        } else if let Some((key, value)) = line.split_once('=') {
            apply_setting(&mut config, key.trim(), strip_quotes(value.trim()))
        } else {
            Err("unrecognized directive".to_string())
        };
        if let Err(msg) = result {
            errors.push(ShellError::new(
                ErrorKind::Config,
                format!("config:{}: {msg}", idx + 1),
            ));
        }
    }
    (config, errors)
}

fn apply_setting(config: &mut ShellConfig, key: &str, value: &str) -> Result<(), String> {
    match key {
        "prompt" => config.prompt = Some(value.to_string()),
        "history_size" => config.history_size = parse_count(key, value)?,
        "history_file" => config.history_file = Some(PathBuf::from(value)),
        "max_jobs" => config.max_jobs = parse_count(key, value)?,
        _ => return Err(format!("unknown setting '{key}'")),
    }
    Ok(())
}

fn parse_count(key: &str, value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) | Err(_) => Err(format!("{key} must be a positive number")),
        Ok(n) => Ok(n),
    }
}

fn parse_export(input: &str) -> Result<(), String> {
    let (name, value) = input
        .trim()
        .split_once('=')
        .ok_or_else(|| "export missing '='".to_string())?;
    let name = name.trim();
    if !is_valid_var_name(name) {
        return Err(format!("invalid variable name '{name}'"));
    }
    env::set_var(name, strip_quotes(value.trim()));
    Ok(())
}

fn is_valid_var_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

fn strip_quotes(input: &str) -> &str {
    let bytes = input.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &input[1..bytes.len() - 1];
        }
    }
    input
}
