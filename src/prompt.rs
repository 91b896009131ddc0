use std::env;
use std::path::Path;

/// Show paths under the shell home as `~/...`.
pub fn display_path(cwd: &Path, home: &Path) -> String {
    match cwd.strip_prefix(home) {
        Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Ok(rest) => format!("~/{}", rest.display()),
        Err(_) => cwd.display().to_string(),
    }
}

pub fn current_user() -> String {
    env::var("USER")
        .or_else(|_| env::var("LOGNAME"))
        .unwrap_or_else(|_| "user".to_string())
}

pub fn current_host() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

pub fn render_prompt_template(template: &str, user: &str, host: &str, cwd: &str) -> String {
    template
        .replace("{user}", user)
        .replace("{host}", host)
        .replace("{cwd}", cwd)
}

pub fn build_prompt(
    interactive: bool,
    template: Option<&str>,
    cwd: &Path,
    home: &Path,
) -> String {
    if !interactive {
        return String::new();
    }
    let user = current_user();
    let host = current_host();
    let path = display_path(cwd, home);
    match template {
        Some(template) => render_prompt_template(template, &user, &host, &path),
        None => format!("<{user}@{host}:{path}> "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_is_abbreviated() {
        let home = Path::new("/work/shell");
        assert_eq!(display_path(Path::new("/work/shell"), home), "~");
        assert_eq!(display_path(Path::new("/work/shell/src"), home), "~/src");
        assert_eq!(display_path(Path::new("/etc"), home), "/etc");
    }

    #[test]
    fn template_placeholders_are_filled() {
        assert_eq!(
            render_prompt_template("{user}@{host} {cwd} $ ", "ann", "box", "~"),
            "ann@box ~ $ "
        );
    }

    #[test]
    fn prompt_is_empty_when_not_interactive() {
        assert_eq!(build_prompt(false, None, Path::new("/"), Path::new("/")), "");
    }

    #[test]
    fn default_prompt_shape() {
        let prompt = build_prompt(true, None, Path::new("/tmp"), Path::new("/home/x"));
        assert!(prompt.starts_with('<'));
        assert!(prompt.ends_with(":/tmp> "));
    }
}
