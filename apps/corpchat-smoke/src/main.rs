use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use client_core::FocusPoller;
use client_platform::JsonFileSessionStore;
use client_rest::ChatClient;
use tracing::info;

mod logging;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const SMOKE_POLL_WINDOW: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let api_url =
        env::var("CORPCHAT_API_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_owned());
    let session_file = env::var("CORPCHAT_SESSION_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.corpchat-session.json"));

    let store = Arc::new(JsonFileSessionStore::new(session_file));
    let client = ChatClient::new(api_url, store).context("failed to build chat client")?;

    let session = match client.bootstrap().context("failed to read session store")? {
        Some(session) => {
            info!(user = %session.user.email, "restored persisted session");
            session
        }
        None => {
            let email = env::var("CORPCHAT_EMAIL")
                .context("no stored session; set CORPCHAT_EMAIL and CORPCHAT_PASSWORD")?;
            let password = env::var("CORPCHAT_PASSWORD")
                .context("no stored session; set CORPCHAT_EMAIL and CORPCHAT_PASSWORD")?;
            let session = client
                .login(&email, &password)
                .await
                .context("login failed")?;
            info!(user = %session.user.email, "logged in");
            session
        }
    };

    let Ok(peer_id) = env::var("CORPCHAT_PEER") else {
        println!("Session ready for {}.", session.user.email);
        println!("Set CORPCHAT_PEER to exercise a conversation.");
        return Ok(());
    };

    let conversation = client
        .open_conversation(peer_id.clone())
        .context("failed to open conversation")?;
    conversation
        .load_history()
        .await
        .context("failed to load history")?;

    let snapshot = conversation.snapshot();
    println!("Loaded {} messages with {peer_id}.", snapshot.messages.len());
    for message in snapshot.messages.iter().take(5) {
        println!("  [{}] {}: {}", message.created_at, message.sender_id, message.text);
    }

    if let Ok(text) = env::var("CORPCHAT_TEXT") {
        let created = conversation
            .send(&text, Vec::new())
            .await
            .context("send failed")?;
        if created.is_empty() {
            bail!("nothing was created; is CORPCHAT_TEXT empty?");
        }
        println!("Sent message {}.", created[0].id);
    }

    let poller = FocusPoller::new(POLL_INTERVAL);
    poller.start(conversation.clone());
    info!(window = ?SMOKE_POLL_WINDOW, "polling for incoming messages");
    tokio::time::sleep(SMOKE_POLL_WINDOW).await;
    poller.stop();

    let settled = conversation.snapshot();
    println!("Conversation settled at {} messages.", settled.messages.len());

    let counts = client
        .chat()
        .unread_counts(&[peer_id.clone()])
        .await
        .context("failed to fetch unread counts")?;
    println!(
        "Unread from {peer_id}: {}",
        counts.get(&peer_id).copied().unwrap_or(0)
    );

    let peer = client
        .users()
        .profile(&peer_id)
        .await
        .context("failed to fetch peer profile")?;
    println!("Peer: {} <{}>", peer.display_name, peer.email);

    Ok(())
}
