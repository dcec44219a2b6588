//! `pairlink demo`: a host and a guest in one process.
//!
//! Runs the full token exchange over the loopback transport, trades the
//! given messages, then hangs up. Tokens are passed between the two
//! coordinators exactly as a user would paste them.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::Write;

use anyhow::Context;
use tracing::info;

use pairlink_core::{
    Config, HandshakeCoordinator, HandshakeError, LoopbackNetwork, Message, SessionEvent,
    invite_link,
};

type Peer = HandshakeCoordinator<LoopbackNetwork>;

/// Run the demo and report each step to `out`.
pub async fn run(config: &Config, messages: &[String], out: &mut impl Write) -> anyhow::Result<()> {
    let network = LoopbackNetwork::new();
    let settings = config.handshake.settings();
    let mut host = HandshakeCoordinator::new(network.clone(), settings.clone());
    let mut guest = HandshakeCoordinator::new(network, settings);

    let invite = host.start_host().await.context("Host could not create an invite")?;
    let link = invite_link(&config.link.base_url, &invite)?;
    writeln!(out, "host   invite link ({} chars)", link.len())?;
    writeln!(out, "       {link}")?;

    let response = guest
        .load_invite(&link)
        .await
        .context("Guest could not load the invite")?;
    writeln!(out, "guest  response token ({} chars)", response.len())?;

    host.accept_response(&response)
        .context("Host could not accept the response")?;
    host.wait_connected().await?;
    guest.wait_connected().await?;
    writeln!(out, "both   connected")?;

    for text in messages {
        host.send(text)?;
        let received = expect_message(&mut guest).await?;
        writeln!(out, "guest  <- {}", received.text)?;

        guest.send(&format!("echo: {}", received.text))?;
        let echoed = expect_message(&mut host).await?;
        writeln!(out, "host   <- {}", echoed.text)?;
    }

    host.terminate();
    match guest.next_event().await {
        Some(SessionEvent::Failed(HandshakeError::ConnectivityLost)) => {
            writeln!(out, "guest  peer hung up")?;
        }
        other => anyhow::bail!("Guest expected the host to hang up, got {other:?}"),
    }
    guest.terminate();
    info!(messages = messages.len(), "Demo finished");
    Ok(())
}

async fn expect_message(peer: &mut Peer) -> anyhow::Result<Message> {
    match peer.next_event().await {
        Some(SessionEvent::Message(message)) => Ok(message),
        Some(SessionEvent::Failed(e)) => Err(e.into()),
        other => anyhow::bail!("Expected a message, got {other:?}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_exchanges_messages_and_hangs_up() {
        let mut out = Vec::new();
        let messages = vec!["hello".to_string(), "second".to_string()];
        run(&Config::default(), &messages, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("https://pairlink.dev/join#"));
        assert!(text.contains("both   connected"));
        assert!(text.contains("guest  <- hello"));
        assert!(text.contains("host   <- echo: second"));
        assert!(text.ends_with("guest  peer hung up\n"));
    }

    #[tokio::test]
    async fn demo_with_no_messages_still_connects() {
        let mut out = Vec::new();
        run(&Config::default(), &[], &mut out).await.unwrap();
        assert!(String::from_utf8(out).unwrap().contains("both   connected"));
    }
}
