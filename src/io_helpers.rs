use std::env;
use std::io;

use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor, EditMode};

pub fn build_editor() -> io::Result<DefaultEditor> {
    let edit_mode = match env::var("JOBSH_EDITMODE").ok().as_deref() {
        Some("vi") | Some("VI") => EditMode::Vi,
        _ => EditMode::Emacs,
    };
    let config = Config::builder()
        .auto_add_history(true)
        .edit_mode(edit_mode)
        .build();
    DefaultEditor::with_config(config).map_err(io::Error::other)
}

/// Read one line; `None` means end of input. Ctrl-C at the prompt yields an
/// empty line.
pub fn read_input_line(
    editor: &mut DefaultEditor,
    interactive: bool,
    prompt: &str,
) -> io::Result<Option<String>> {
    if interactive {
        let line = match editor.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => return Ok(Some(String::new())),
            Err(ReadlineError::Eof) => return Ok(None),
            Err(err) => return Err(io::Error::other(err)),
        };
        Ok(Some(line))
    } else {
        let mut line = String::new();
        let bytes = io::stdin().read_line(&mut line)?;
        if bytes == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}
