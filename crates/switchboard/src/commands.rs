// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `switchboard sessions` and `switchboard config`.

use std::fmt::Write as _;

use switchboard_config::SwitchboardConfig;
use switchboard_core::{MetadataStore, SessionMetadata, SwitchboardError};
use switchboard_storage::FsStore;

/// Prints every session with persisted metadata.
pub async fn list_sessions(config: &SwitchboardConfig, json: bool) -> Result<(), SwitchboardError> {
    let store = FsStore::open(&config.storage).await?;
    let records = store.list().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        print!("{}", render_table(&records));
    }
    Ok(())
}

fn render_table(records: &[SessionMetadata]) -> String {
    if records.is_empty() {
        return "no persisted sessions\n".to_string();
    }
    let width = records
        .iter()
        .map(|r| r.session_id.as_str().len())
        .max()
        .unwrap_or(0)
        .max("SESSION".len());

    let mut out = String::new();
    let _ = writeln!(out, "{:<width$}  {:<25}  WEBHOOK", "SESSION", "CREATED");
    for record in records {
        let _ = writeln!(
            out,
            "{:<width$}  {:<25}  {}",
            record.session_id.as_str(),
            record.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            record.webhook_url.as_deref().unwrap_or("-"),
        );
    }
    out
}

/// Prints the effective configuration as TOML, secrets redacted.
pub fn print_config(config: &SwitchboardConfig) -> Result<(), SwitchboardError> {
    print!("{}", render_config(config)?);
    Ok(())
}

fn render_config(config: &SwitchboardConfig) -> Result<String, SwitchboardError> {
    let mut shown = config.clone();
    if shown.server.bearer_token.is_some() {
        shown.server.bearer_token = Some("[redacted]".to_string());
    }
    toml::to_string_pretty(&shown).map_err(|e| SwitchboardError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::SessionId;

    #[test]
    fn table_lists_every_record() {
        let records = vec![
            SessionMetadata::new(SessionId::parse("shop1").unwrap(), None),
            SessionMetadata::new(
                SessionId::parse("a-much-longer-session").unwrap(),
                Some("https://hooks.example/in".into()),
            ),
        ];
        let table = render_table(&records);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("SESSION"));
        assert!(lines[1].starts_with("shop1 "));
        assert!(lines[1].ends_with(" -"));
        assert!(lines[2].ends_with("https://hooks.example/in"));
    }

    #[test]
    fn empty_table_says_so() {
        assert_eq!(render_table(&[]), "no persisted sessions\n");
    }

    #[test]
    fn config_output_redacts_token() {
        let mut config = SwitchboardConfig::default();
        config.server.bearer_token = Some("hunter2".into());
        let rendered = render_config(&config).unwrap();
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[redacted]"));
        assert!(rendered.contains("[rate_limit]"));
    }
}
