//! JSON input from `--input <file>` or piped stdin.

use serde::de::DeserializeOwned;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

type InputResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Where a command's JSON document comes from.
enum Source {
    File(PathBuf),
    Stdin,
}

impl Source {
    fn describe(&self) -> String {
        match self {
            Source::File(path) => format!("'{}'", path.display()),
            Source::Stdin => "stdin".to_string(),
        }
    }

    /// Raw document text, or None when nothing was provided.
    fn read(&self) -> InputResult<Option<String>> {
        match self {
            Source::File(path) => {
                if !path.is_file() {
                    return Err(format!("Not a readable file: {}", path.display()).into());
                }
                let text = fs::read_to_string(path)
                    .map_err(|e| format!("Failed to read {}: {}", self.describe(), e))?;
                Ok(Some(text))
            }
            Source::Stdin => {
                // Interactive terminal: nothing is being piped in.
                if atty::is(atty::Stream::Stdin) {
                    return Ok(None);
                }
                let mut text = String::new();
                io::stdin().read_to_string(&mut text)?;
                Ok((!text.trim().is_empty()).then_some(text))
            }
        }
    }
}

/// Read typed input from `path`, falling back to stdin when no path is given.
pub fn read_input<T: DeserializeOwned>(path: Option<&str>) -> InputResult<Option<T>> {
    let source = match path {
        Some(p) => Source::File(std::env::current_dir()?.join(p)),
        None => Source::Stdin,
    };
    let Some(text) = source.read()? else {
        return Ok(None);
    };
    let value = serde_json::from_str(&text)
        .map_err(|e| format!("Failed to parse {}: {}", source.describe(), e))?;
    Ok(Some(value))
}
