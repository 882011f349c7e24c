//! Local action file: `name: command` entries, one per line.

use crate::utils::errors::{CtlError, Result};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionEntry {
    pub name: String,
    pub command: String,
}

/// Actions in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ActionFile {
    entries: Vec<ActionEntry>,
}

impl ActionFile {
    /// Parse the file body. Lines that are not `name: command` are ignored,
    /// as are later duplicates of an already declared name.
    pub fn parse(content: &str) -> Self {
        let mut entries: Vec<ActionEntry> = Vec::new();

        for line in content.lines() {
            let Some(entry) = parse_line(line) else {
                continue;
            };
            if entries.iter().any(|e| e.name == entry.name) {
                continue;
            }
            entries.push(entry);
        }

        Self { entries }
    }

    /// Load the action file; a missing file has no actions.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Self::parse(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(CtlError::io("reading", path)(e)),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ActionEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

fn parse_line(line: &str) -> Option<ActionEntry> {
    if line.starts_with(char::is_whitespace) || line.trim_start().starts_with('#') {
        return None;
    }

    let (name, command) = line.split_once(':')?;
    let name = name.trim_end();
    let command = command.trim();

    let valid_name = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid_name || command.is_empty() {
        return None;
    }

    Some(ActionEntry {
        name: name.to_string(),
        command: command.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preserves_order_and_skips_noise() {
        let file = ActionFile::parse(
            "# define actions here\n\
             update: git pull origin master\n\
             \n\
             not an action\n\
             \tindented: ignored\n\
             build: cargo build --release\n\
             empty:\n\
             test: cargo test -- --nocapture\n",
        );
        assert_eq!(file.names(), vec!["update", "build", "test"]);
        assert_eq!(file.get("test").unwrap().command, "cargo test -- --nocapture");
        assert!(file.get("empty").is_none());
    }

    #[test]
    fn test_first_declaration_wins() {
        let file = ActionFile::parse("deploy: echo one\ndeploy: echo two\n");
        assert_eq!(file.names(), vec!["deploy"]);
        assert_eq!(file.get("deploy").unwrap().command, "echo one");
    }

    #[test]
    fn test_command_may_contain_colons() {
        let file = ActionFile::parse("fetch: curl http://localhost:8080/x\n");
        assert_eq!(file.get("fetch").unwrap().command, "curl http://localhost:8080/x");
    }

    #[test]
    fn test_missing_file_has_no_actions() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = ActionFile::load(&dir.path().join("Actionfile")).unwrap();
        assert!(file.names().is_empty());
    }
}
