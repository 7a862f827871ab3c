use std::path::PathBuf;

use docsync_core::DocumentId;
use thiserror::Error;

pub const COMMANDS_HELP: &str = "\
Commands:
  list                    show all documents (clears the search filter)
  refresh                 reload the current view
  search [query]          filter by filename or OCR text
  upload [path]           upload a single file
  rename <id> <new name>  rename a document
  delete <id>             delete a document (asks for confirmation)
  download <id>           save a document to the download directory
  ocr <id>                show the recognized text of a document
  help                    show this help
  quit                    end the session";

/// A user request, independent of how it was entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Refresh,
    Search { query: String },
    Upload { path: Option<PathBuf> },
    Rename { id: DocumentId, new_name: String },
    Delete { id: DocumentId },
    Download { id: DocumentId },
    ViewOcr { id: DocumentId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Intent(Intent),
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command: {0} (try `help`)")]
    UnknownCommand(String),
    #[error("`{command}` needs a document id")]
    MissingId { command: &'static str },
}

/// Parses one input line; blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "list" | "ls" => Command::Intent(Intent::Search {
            query: String::new(),
        }),
        "refresh" => Command::Intent(Intent::Refresh),
        "search" | "find" => Command::Intent(Intent::Search {
            query: rest.to_string(),
        }),
        "upload" => Command::Intent(Intent::Upload {
            path: (!rest.is_empty()).then(|| PathBuf::from(rest)),
        }),
        "rename" => {
            let (id, new_name) = match rest.split_once(char::is_whitespace) {
                Some((id, name)) => (id, name.trim()),
                None => (rest, ""),
            };
            Command::Intent(Intent::Rename {
                id: require_id(id, "rename")?,
                new_name: new_name.to_string(),
            })
        }
        "delete" | "rm" => Command::Intent(Intent::Delete {
            id: require_id(rest, "delete")?,
        }),
        "download" | "get" => Command::Intent(Intent::Download {
            id: require_id(rest, "download")?,
        }),
        "ocr" | "view" => Command::Intent(Intent::ViewOcr {
            id: require_id(rest, "ocr")?,
        }),
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(ParseError::UnknownCommand(other.to_string())),
    };
    Ok(Some(command))
}

fn require_id(raw: &str, command: &'static str) -> Result<DocumentId, ParseError> {
    let id = raw.split_whitespace().next().unwrap_or_default();
    if id.is_empty() {
        return Err(ParseError::MissingId { command });
    }
    Ok(DocumentId::from(id))
}
