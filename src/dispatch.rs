//! Inbound update routing
//!
//! `/start` gets the fixed greeting, other commands are ignored, and any
//! non-blank text starts its own delivery session.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::pipeline::{Pipeline, Request};
use crate::session::{DeliverySession, Outcome};
use crate::telegram::{Command, Update};
use crate::transport::{ChatTransport, MessageRef};

/// Reply to /start
pub const GREETING: &str = "Hi! I'm an infographic generator bot.\n\
Send me the text of a news item and I'll turn it into a visualization with Gemini.";

/// What an update was routed to
#[derive(Debug)]
pub enum Dispatched {
    /// Greeting reply in flight
    Greeting(JoinHandle<()>),
    /// Delivery session in flight
    Session(JoinHandle<Outcome>),
    /// Nothing to do
    Ignored,
}

/// Routes updates to spawned handlers
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn ChatTransport>,
    pipeline: Arc<Pipeline>,
    slot_dir: PathBuf,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn ChatTransport>, pipeline: Arc<Pipeline>, slot_dir: PathBuf) -> Self {
        Self {
            transport,
            pipeline,
            slot_dir,
        }
    }

    /// Route one update to its handler on a separate task
    pub fn dispatch(&self, update: Update) -> Dispatched {
        let Some(message) = update.message else {
            return Dispatched::Ignored;
        };
        let Some(text) = message.text else {
            return Dispatched::Ignored;
        };
        let source = MessageRef {
            chat_id: message.chat.id,
            message_id: message.message_id,
        };

        match Command::parse(&text) {
            Some(Command::Start) => {
                let transport = self.transport.clone();
                Dispatched::Greeting(tokio::spawn(async move {
                    if let Err(e) = transport.reply_text(source, GREETING).await {
                        warn!("Failed to send greeting: {}", e);
                    }
                }))
            }
            Some(Command::Other(name)) => {
                debug!("Ignoring unknown command /{}", name);
                Dispatched::Ignored
            }
            None => {
                let Some(request) = Request::new(text) else {
                    return Dispatched::Ignored;
                };
                let session = DeliverySession::new(
                    self.transport.clone(),
                    self.pipeline.clone(),
                    self.slot_dir.clone(),
                    source,
                );
                Dispatched::Session(tokio::spawn(session.run(request)))
            }
        }
    }
}
