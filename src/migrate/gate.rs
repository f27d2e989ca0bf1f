// ABOUTME: Confirmation gate between the local and remote halves of a migration.
// ABOUTME: Decides to proceed, suspend behind a resume token, or cancel.

use super::error::MigrateError;
use async_trait::async_trait;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// What the operator chose at the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    Suspend,
    Cancel,
}

/// Facts shown to the operator before anything changes on the remote host.
#[derive(Debug, Clone)]
pub struct ConfirmationSummary<'a> {
    pub container: &'a str,
    pub destination: String,
    pub image: String,
    pub volumes: Vec<String>,
    pub networks: Vec<String>,
    pub checkpoint: &'a Path,
}

impl std::fmt::Display for ConfirmationSummary<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Ready to recreate '{}' on {}", self.container, self.destination)?;
        writeln!(f, "  image:    {}", self.image)?;
        writeln!(f, "  volumes:  {}", list_or_none(&self.volumes))?;
        writeln!(f, "  networks: {}", list_or_none(&self.networks))?;
        write!(f, "  resume:   ferry resume {}", self.checkpoint.display())
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

#[async_trait]
pub trait ConfirmationGate: Send + Sync {
    async fn decide(&self, summary: &ConfirmationSummary<'_>) -> Result<GateDecision, MigrateError>;
}

/// Always proceeds (`--yes`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

#[async_trait]
impl ConfirmationGate for AssumeYes {
    async fn decide(&self, _: &ConfirmationSummary<'_>) -> Result<GateDecision, MigrateError> {
        Ok(GateDecision::Proceed)
    }
}

/// Always suspends (`--suspend`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SuspendGate;

#[async_trait]
impl ConfirmationGate for SuspendGate {
    async fn decide(&self, _: &ConfirmationSummary<'_>) -> Result<GateDecision, MigrateError> {
        Ok(GateDecision::Suspend)
    }
}

/// Asks on stderr and reads the answer from stdin. EOF cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptGate;

#[async_trait]
impl ConfirmationGate for PromptGate {
    async fn decide(&self, summary: &ConfirmationSummary<'_>) -> Result<GateDecision, MigrateError> {
        let mut stderr = tokio::io::stderr();
        let prompt = format!("{summary}\nProceed? [y]es / [N]o / [s]uspend: ");
        let shown = async {
            stderr.write_all(prompt.as_bytes()).await?;
            stderr.flush().await
        };
        shown
            .await
            .map_err(|e| MigrateError::Usage(format!("cannot prompt: {e}")))?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .map_err(|e| MigrateError::Usage(format!("cannot read answer: {e}")))?;
        Ok(parse_answer(&line))
    }
}

fn parse_answer(line: &str) -> GateDecision {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => GateDecision::Proceed,
        "s" | "suspend" => GateDecision::Suspend,
        _ => GateDecision::Cancel,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers() {
        assert_eq!(parse_answer("y\n"), GateDecision::Proceed);
        assert_eq!(parse_answer(" YES "), GateDecision::Proceed);
        assert_eq!(parse_answer("s"), GateDecision::Suspend);
        assert_eq!(parse_answer(""), GateDecision::Cancel);
        assert_eq!(parse_answer("no"), GateDecision::Cancel);
    }

    #[test]
    fn summary_lists_resources() {
        let path = Path::new("/tmp/stage/web.checkpoint.json");
        let summary = ConfirmationSummary {
            container: "web",
            destination: "deploy@db1:22".into(),
            image: "web:latest".into(),
            volumes: vec!["web-data".into()],
            networks: vec![],
            checkpoint: path,
        };
        let text = summary.to_string();
        assert!(text.contains("volumes:  web-data"));
        assert!(text.contains("networks: (none)"));
        assert!(text.contains("ferry resume /tmp/stage/web.checkpoint.json"));
    }
}
