//! vaidya-chat - terminal client for the chat relay.
//!
//! Reads one prompt per line from stdin and prints the reply as it streams in.
//! `/clear` forgets the conversation, `/history` reloads it from the server.

use std::io::Write;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use vaidya_api::chat::consumer::{ChatConsumer, ConsumerError};

#[derive(Parser)]
#[command(name = "vaidya-chat")]
#[command(about = "Chat with the VAIDYA health assistant")]
struct Args {
    /// Relay base URL
    #[arg(long, default_value = "http://localhost:8080")]
    base_url: String,

    /// Signed-in user id; the relay refuses anonymous turns
    #[arg(long)]
    user_id: Option<Uuid>,

    /// Attach the conversation to a consultation
    #[arg(long)]
    consultation_id: Option<Uuid>,
}

/// Echoes a growing reply, writing only the part not yet printed.
/// The first write error closes the echo; the reply still streams in.
struct ReplyEcho<W: Write> {
    out: W,
    printed: usize,
    open: bool,
}

impl<W: Write> ReplyEcho<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            printed: 0,
            open: true,
        }
    }

    fn update(&mut self, content: &str) {
        if !self.open {
            return;
        }
        let unseen = content.get(self.printed..).unwrap_or_default();
        let written = self
            .out
            .write_all(unseen.as_bytes())
            .and_then(|()| self.out.flush());
        match written {
            Ok(()) => self.printed = content.len(),
            Err(e) => {
                debug!("Output closed, no longer echoing the reply: {e}");
                self.open = false;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut consumer = ChatConsumer::new(args.base_url, args.user_id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let prompt = line.trim();
        match prompt {
            "" => continue,
            "/clear" => {
                consumer.clear();
                continue;
            }
            "/history" => {
                if let Err(e) = consumer.load_history(args.consultation_id).await {
                    eprintln!("{e}");
                }
                for message in consumer.messages() {
                    println!("[{}] {}", message.role.as_str(), message.content);
                }
                continue;
            }
            _ => {}
        }

        let mut echo = ReplyEcho::new(std::io::stdout());
        let result = consumer
            .send_message(prompt, args.consultation_id, |message| {
                echo.update(&message.content)
            })
            .await;
        println!();

        match result {
            Ok(()) => {}
            Err(ConsumerError::Unauthenticated) => {
                eprintln!("{}", ConsumerError::Unauthenticated);
                break;
            }
            Err(e) => eprintln!("{e}"),
        }
    }

    Ok(())
}
