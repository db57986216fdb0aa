use std::sync::Mutex;

use colored::Colorize;

/// Sink for the advisory text an upgrade emits: paths being processed, progress, and the
/// post-swap reminder. Nothing here is load-bearing.
pub trait Reporter: Send + Sync {
    fn note(&self, message: &str);

    fn progress(&self, entries: u64) {
        self.note(&format!("{entries} entries done"));
    }

    /// Something the operator must not miss.
    fn banner(&self, lines: &[String]) {
        for line in lines {
            self.note(line);
        }
    }
}

/// Writes to stderr, the way the CLI narrates.
#[derive(Debug, Default)]
pub struct StderrReporter;

impl Reporter for StderrReporter {
    fn note(&self, message: &str) {
        eprintln!("{} {message}", "upgrade".cyan().bold());
    }

    fn banner(&self, lines: &[String]) {
        eprintln!();
        eprintln!("{}", "v".repeat(47).yellow().bold());
        for line in lines {
            eprintln!("{}", line.yellow().bold());
        }
        eprintln!("{}", "^".repeat(47).yellow().bold());
    }
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct Transcript {
    lines: Mutex<Vec<String>>,
}

impl Transcript {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl Reporter for Transcript {
    fn note(&self, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(message.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_records_notes_progress_and_banners() {
        let transcript = Transcript::default();
        transcript.note("Upgrading store at /repo/badgerds");
        transcript.progress(1000);
        transcript.banner(&["REMOVE '/repo/badger-backup-x'".to_string()]);

        assert_eq!(
            transcript.lines(),
            vec![
                "Upgrading store at /repo/badgerds",
                "1000 entries done",
                "REMOVE '/repo/badger-backup-x'",
            ]
        );
        assert!(transcript.contains("badger-backup-x"));
        assert!(!transcript.contains("nothing like this"));
    }
}
