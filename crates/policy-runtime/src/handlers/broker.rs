//! # Request Broker
//!
//! Intake queue for [`EngineMessage`]-wrapped requests. Each request is
//! served on its own task so a long settlement does not hold up other
//! users; the reply envelope carries the request's correlation id.

use crate::handlers::requests::RequestHandler;
use chrono::Utc;
use shared_types::envelope::EngineMessage;
use shared_types::ipc::{EngineRequest, EngineResponse, ErrorCode};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

pub type RequestMessage = EngineMessage<EngineRequest>;
pub type ResponseMessage = EngineMessage<EngineResponse>;

struct Envelope {
    message: RequestMessage,
    reply: oneshot::Sender<ResponseMessage>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("broker is not running")]
    Closed,

    #[error("broker dropped the request")]
    Dropped,
}

/// Caller side of the broker.
#[derive(Clone)]
pub struct BrokerHandle {
    sender: mpsc::Sender<Envelope>,
    name: String,
}

impl BrokerHandle {
    /// Send an envelope and wait for its reply.
    pub async fn send(&self, message: RequestMessage) -> Result<ResponseMessage, BrokerError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Envelope { message, reply })
            .await
            .map_err(|_| BrokerError::Closed)?;
        response.await.map_err(|_| BrokerError::Dropped)
    }

    /// Wrap `request` in a fresh envelope and return the reply payload.
    pub async fn request(&self, request: EngineRequest) -> Result<EngineResponse, BrokerError> {
        let reply = self.send(EngineMessage::new(self.name.clone(), request)).await?;
        Ok(reply.payload)
    }
}

pub struct RequestBroker {
    handler: Arc<RequestHandler>,
    receiver: mpsc::Receiver<Envelope>,
    service_name: String,
}

impl RequestBroker {
    pub fn new(handler: Arc<RequestHandler>, capacity: usize, service_name: impl Into<String>) -> (Self, BrokerHandle) {
        let (sender, receiver) = mpsc::channel(capacity);
        let service_name = service_name.into();
        let handle = BrokerHandle {
            sender,
            name: format!("{service_name}-client"),
        };
        (
            Self {
                handler,
                receiver,
                service_name,
            },
            handle,
        )
    }

    /// Serve until every [`BrokerHandle`] is dropped.
    pub async fn run(mut self) {
        info!("[runtime] request broker started");
        while let Some(Envelope { message, reply }) = self.receiver.recv().await {
            let handler = Arc::clone(&self.handler);
            let sender = self.service_name.clone();
            tokio::spawn(async move {
                let response = match refusal(&message) {
                    Some(refused) => refused,
                    None => handler.handle(message.payload.clone()).await,
                };
                if reply.send(message.reply(sender, response)).is_err() {
                    warn!(
                        correlation_id = %message.correlation_id,
                        "[runtime] caller went away before the reply"
                    );
                }
            });
        }
        info!("[runtime] request broker stopped");
    }
}

/// Response for envelopes that must not be processed.
fn refusal(message: &RequestMessage) -> Option<EngineResponse> {
    if !message.is_supported_version() {
        return Some(EngineResponse::error(
            ErrorCode::BadRequest,
            format!("Unsupported protocol version {}", message.version),
        ));
    }
    if message.is_stale(Utc::now().timestamp()) {
        return Some(EngineResponse::error(ErrorCode::BadRequest, "Request expired"));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{EngineConfig, ServiceContainer};
    use shared_types::ipc::EngineRequest;

    fn request() -> RequestMessage {
        EngineMessage::new(
            "gateway",
            EngineRequest::BlockByTag {
                policy_id: "p1".into(),
                tag: "t".into(),
            },
        )
    }

    #[test]
    fn test_fresh_envelopes_pass() {
        assert!(refusal(&request()).is_none());
    }

    #[test]
    fn test_stale_and_foreign_envelopes_are_refused() {
        let mut stale = request();
        stale.timestamp -= RequestMessage::MAX_AGE + 5;
        let refused = refusal(&stale).unwrap();
        assert_eq!(refused.error.unwrap().message, "Request expired");

        let mut foreign = request();
        foreign.version = 9;
        let refused = refusal(&foreign).unwrap();
        assert_eq!(refused.error.unwrap().code, ErrorCode::BadRequest);
    }

    #[test]
    fn test_handle_reports_stopped_broker() {
        let container = ServiceContainer::new(EngineConfig::default()).unwrap();
        let (broker, handle) = RequestBroker::new(container.handler.clone(), 4, "policy-engine");
        drop(broker);

        let result = tokio_test::block_on(handle.request(EngineRequest::BlockByTag {
            policy_id: "p1".into(),
            tag: "t".into(),
        }));
        assert_eq!(result.unwrap_err(), BrokerError::Closed);
    }
}
