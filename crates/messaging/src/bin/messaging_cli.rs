use std::sync::Arc;

use crm_api::CrmClient;
use messaging::{MessagingSurface, SessionConfig, SurfaceCommand};
use realtime::ChannelHandle;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Map one line of terminal input to surface commands.
///
/// `/open <id>`, `/back`, `/refresh` and `/width <px>` are commands; any
/// other text is sent to the open conversation.
fn parse_line(line: &str) -> Vec<SurfaceCommand> {
    let line = line.trim();
    let mut words = line.split_whitespace();
    match words.next() {
        Some("/open") => words
            .next()
            .map(|id| vec![SurfaceCommand::Open(id.to_string())])
            .unwrap_or_default(),
        Some("/back") => vec![SurfaceCommand::Back],
        Some("/refresh") => vec![SurfaceCommand::Refresh],
        Some("/width") => words
            .next()
            .and_then(|w| w.parse().ok())
            .map(|w| vec![SurfaceCommand::Resize(w)])
            .unwrap_or_default(),
        Some(_) => vec![
            SurfaceCommand::Draft(line.to_string()),
            SurfaceCommand::Send,
        ],
        None => Vec::new(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let session = SessionConfig::from_env()?;
    info!(
        "Signed in as {} ({})",
        session.identity.id, session.identity.role
    );

    let channel = ChannelHandle::sse(session.channel.clone())?;
    let api = Arc::new(CrmClient::new(session.api.clone())?);
    let mut surface = MessagingSurface::new(session.surface_config(), api, channel.clone());

    if let Err(e) = channel
        .connect(&session.api.credential, &session.identity)
        .await
    {
        // History stays readable without the live channel.
        warn!("Realtime channel unavailable: {}", e);
    }

    surface.start().await?;
    for summary in surface.directory().summaries() {
        info!(
            "{} [{}] unread={}",
            summary.partner_name, summary.partner_id, summary.unread_count
        );
    }

    let (commands, rx) = mpsc::channel(32);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            for command in parse_line(&line) {
                if commands.send(command).await.is_err() {
                    return;
                }
            }
        }
    });

    let result = surface
        .run_with_shutdown(rx, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    channel.teardown();
    info!("Channel closed");
    result.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_line("/open 42"), vec![SurfaceCommand::Open("42".to_string())]);
        assert_eq!(parse_line("/open"), Vec::new());
        assert_eq!(parse_line("/width 600"), vec![SurfaceCommand::Resize(600)]);
        assert_eq!(parse_line("   "), Vec::new());
    }

    #[test]
    fn test_plain_text_is_sent() {
        assert_eq!(
            parse_line(" see you at 5 "),
            vec![
                SurfaceCommand::Draft("see you at 5".to_string()),
                SurfaceCommand::Send
            ]
        );
    }
}
