//! Simple IRC client example
//!
//! Connects to a server, joins a channel and answers `!ping` and `!who`
//! until interrupted with Ctrl-C.
//!
//! ```text
//! RUST_LOG=slirc_client=debug cargo run --example simple_client -- irc.libera.chat "#slirc"
//! ```

use slirc_client::{AutoJoin, ChannelView, Client, ClientConfig, Event, UserView};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "irc.libera.chat".to_string());
    let channel = args.next().unwrap_or_else(|| "#slirc".to_string());

    let mut config = ClientConfig::new(&host, 6667, "slirc_example");
    config.auto_nick_change = true;
    config.auto_join = vec![AutoJoin::new(&channel)];

    let (client, mut events) = Client::connect(config).await?;

    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                client.quit(Some("interrupted")).await?;
                continue;
            }
        };
        let Some(event) = event else {
            break;
        };

        match event {
            Event::Connect => println!("✓ registered as {:?}", client.nick()),
            Event::Join { channel, user } => {
                println!("→ {} joined {}", user.nick(), channel.name())
            }
            Event::Part { channel, user, .. } => {
                println!("← {} left {}", user.nick(), channel.name())
            }
            Event::Message {
                channel,
                user,
                message,
            } => {
                println!("[{}] <{}> {}", channel.name(), user.nick(), message);
                match message.as_str() {
                    "!ping" => client.send_privmsg(channel.name(), "pong")?,
                    "!who" => {
                        let snapshot = client.snapshot();
                        let nicks: Vec<&str> = snapshot
                            .users_of(channel.name())
                            .iter()
                            .map(|u| u.nick())
                            .collect();
                        client.send_privmsg(channel.name(), &nicks.join(" "))?;
                    }
                    _ => {}
                }
            }
            Event::Disconnect { error } => {
                println!("✗ disconnected: {:?}", error);
                break;
            }
            _ => {}
        }
    }

    Ok(())
}
