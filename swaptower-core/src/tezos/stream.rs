//! TzKT real-time events.
//!
//! TzKT pushes events through a SignalR hub. The JSON hub protocol is
//! small enough to speak directly over a WebSocket: every record is a JSON
//! object terminated by `0x1e`, the client opens with a handshake record,
//! subscribes by invoking hub methods and receives invocations of the
//! `bigmaps` and `operations` client methods.

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use swaptower_sdk::objects::tzkt::{
    BigMapUpdate, MessageBody, MessageChannel, MessageKind, StreamMessage,
};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

/// Buffer between the socket reader and the watcher loop.
pub const STREAM_BUFFER: usize = 1024;

const RECORD_SEPARATOR: char = '\u{1e}';
const HANDSHAKE: &str = "{\"protocol\":\"json\",\"version\":1}\u{1e}";

/// Errors of the real-time transport.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("stream is not connected")]
    NotConnected,
}

/// A subscribable source of indexer notifications.
#[async_trait]
pub trait EventStream: Send + Sync {
    /// Open the transport. Messages are delivered on the returned receiver,
    /// which yields `None` once the transport is gone.
    async fn connect(&self) -> Result<mpsc::Receiver<StreamMessage>, StreamError>;

    /// Subscribe to diffs of one storage map.
    async fn subscribe_to_big_maps(&self, ptr: u64, contract: &str) -> Result<(), StreamError>;

    /// Subscribe to transactions of one account or contract.
    async fn subscribe_to_operations(&self, address: &str) -> Result<(), StreamError>;

    /// Close the transport.
    async fn close(&self) -> Result<(), StreamError>;
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type PendingInvocations = Arc<Mutex<HashMap<String, MessageChannel>>>;

/// [`EventStream`] speaking to TzKT's `/v1/ws` hub.
pub struct TzktEvents {
    url: Url,
    sink: Mutex<Option<WsSink>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    pending: PendingInvocations,
    invocation_id: AtomicU64,
}

impl TzktEvents {
    /// Create a stream for the TzKT instance at `base_url`; the WebSocket
    /// scheme is derived from the HTTP one.
    pub fn new(base_url: &Url) -> Result<Self, StreamError> {
        let mut url = base_url.join("v1/ws")?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| StreamError::Handshake(format!("cannot use {url} as a websocket url")))?;
        Ok(Self {
            url,
            sink: Mutex::new(None),
            reader: Mutex::new(None),
            pending: Arc::new(Mutex::new(HashMap::new())),
            invocation_id: AtomicU64::new(0),
        })
    }

    async fn invoke(
        &self,
        target: &str,
        argument: serde_json::Value,
        channel: MessageChannel,
    ) -> Result<(), StreamError> {
        let id = self.invocation_id.fetch_add(1, Ordering::Relaxed).to_string();
        let record = serde_json::json!({
            "type": 1,
            "invocationId": id,
            "target": target,
            "arguments": [argument],
        });
        self.pending.lock().await.insert(id, channel);

        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(StreamError::NotConnected)?;
        sink.send(Message::Text(format!("{record}{RECORD_SEPARATOR}")))
            .await?;
        debug!(target, "Sent hub invocation");
        Ok(())
    }
}

#[async_trait]
impl EventStream for TzktEvents {
    async fn connect(&self) -> Result<mpsc::Receiver<StreamMessage>, StreamError> {
        info!(url = %self.url, "Connecting to indexer events");
        let (socket, _) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        let (mut sink, mut source) = socket.split();

        sink.send(Message::Text(HANDSHAKE.to_string())).await?;
        match source.next().await {
            Some(Ok(Message::Text(text))) => {
                let answer = text.trim_end_matches(RECORD_SEPARATOR);
                let answer: serde_json::Value = serde_json::from_str(answer)?;
                if let Some(e) = answer.get("error") {
                    return Err(StreamError::Handshake(e.to_string()));
                }
            }
            Some(Ok(other)) => {
                return Err(StreamError::Handshake(format!("unexpected frame: {other:?}")));
            }
            Some(Err(e)) => return Err(e.into()),
            None => return Err(StreamError::Handshake("connection closed".to_string())),
        }

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let pending = Arc::clone(&self.pending);
        let reader = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        error!(error = %e, "Indexer events transport failed");
                        break;
                    }
                };
                for record in text.split(RECORD_SEPARATOR).filter(|r| !r.is_empty()) {
                    let message = match parse_record(record) {
                        Ok(Some(HubRecord::Message(message))) => message,
                        Ok(Some(HubRecord::Completion { invocation_id, error })) => {
                            let channel = pending.lock().await.remove(&invocation_id);
                            if let Some(e) = error {
                                error!(invocation_id, error = %e, "Subscription rejected");
                                continue;
                            }
                            let Some(channel) = channel else { continue };
                            StreamMessage {
                                kind: MessageKind::Subscribed,
                                channel,
                                state: 0,
                                body: MessageBody::Empty,
                            }
                        }
                        Ok(Some(HubRecord::Close)) => {
                            warn!("Indexer closed the hub connection");
                            return;
                        }
                        Ok(None) => continue,
                        Err(e) => {
                            warn!(error = %e, "Failed to parse indexer message");
                            continue;
                        }
                    };
                    if tx.send(message).await.is_err() {
                        return;
                    }
                }
            }
            info!("Indexer events reader stopped");
        });

        *self.sink.lock().await = Some(sink);
        if let Some(previous) = self.reader.lock().await.replace(reader) {
            previous.abort();
        }
        Ok(rx)
    }

    async fn subscribe_to_big_maps(&self, ptr: u64, contract: &str) -> Result<(), StreamError> {
        self.invoke(
            "SubscribeToBigMaps",
            serde_json::json!({ "ptr": ptr, "contract": contract }),
            MessageChannel::BigMaps,
        )
        .await
    }

    async fn subscribe_to_operations(&self, address: &str) -> Result<(), StreamError> {
        self.invoke(
            "SubscribeToOperations",
            serde_json::json!({ "address": address, "types": "transaction" }),
            MessageChannel::Operations,
        )
        .await
    }

    async fn close(&self) -> Result<(), StreamError> {
        if let Some(mut sink) = self.sink.lock().await.take() {
            sink.close().await?;
        }
        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }
        Ok(())
    }
}

/// A parsed hub record.
#[derive(Debug, PartialEq)]
enum HubRecord {
    Message(StreamMessage),
    Completion {
        invocation_id: String,
        error: Option<String>,
    },
    Close,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    arguments: Vec<RawPayload>,
    #[serde(default)]
    invocation_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct RawPayload {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    state: u64,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// Parse one hub record; `None` for records that carry nothing for the
/// watcher (pings, unknown targets).
fn parse_record(record: &str) -> Result<Option<HubRecord>, StreamError> {
    let raw: RawRecord = serde_json::from_str(record)?;
    match raw.kind {
        // invocation
        1 => {
            let channel = match raw.target.as_deref() {
                Some("bigmaps") => MessageChannel::BigMaps,
                Some("operations") => MessageChannel::Operations,
                _ => return Ok(None),
            };
            let Some(payload) = raw.arguments.into_iter().next() else {
                return Ok(None);
            };
            let kind = match payload.kind {
                0 => MessageKind::State,
                1 => MessageKind::Data,
                2 => MessageKind::Reorg,
                _ => return Ok(None),
            };
            let body = match (channel, payload.data) {
                (_, None) | (_, Some(serde_json::Value::Null)) => MessageBody::Empty,
                (MessageChannel::BigMaps, Some(data)) => {
                    MessageBody::BigMaps(serde_json::from_value::<Vec<BigMapUpdate>>(data)?)
                }
                (MessageChannel::Operations, Some(data)) => {
                    MessageBody::Operations(serde_json::from_value(data)?)
                }
            };
            Ok(Some(HubRecord::Message(StreamMessage {
                kind,
                channel,
                state: payload.state,
                body,
            })))
        }
        // completion
        3 => Ok(raw.invocation_id.map(|invocation_id| HubRecord::Completion {
            invocation_id,
            error: raw.error,
        })),
        // close
        7 => Ok(Some(HubRecord::Close)),
        // ping and anything else
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swaptower_sdk::objects::tzkt::BigMapAction;

    #[test]
    fn big_map_data_record() {
        let record = r#"{"type":1,"target":"bigmaps","arguments":[{"type":1,"state":100,"data":[
            {"id":1,"level":100,"bigmap":42,"contract":{"address":"KT1Swap"},"action":"remove_key",
             "content":{"hash":"expr","key":"aa","value":{}}}
        ]}]}"#;
        let Some(HubRecord::Message(message)) = parse_record(record).unwrap() else {
            panic!("expected a message");
        };
        assert_eq!(message.kind, MessageKind::Data);
        assert_eq!(message.channel, MessageChannel::BigMaps);
        assert_eq!(message.state, 100);
        let MessageBody::BigMaps(updates) = message.body else {
            panic!("expected big map updates");
        };
        assert_eq!(updates[0].action, BigMapAction::RemoveKey);
    }

    #[test]
    fn reorg_record_without_data() {
        let record = r#"{"type":1,"target":"operations","arguments":[{"type":2,"state":95}]}"#;
        let Some(HubRecord::Message(message)) = parse_record(record).unwrap() else {
            panic!("expected a message");
        };
        assert_eq!(message.kind, MessageKind::Reorg);
        assert_eq!(message.state, 95);
        assert_eq!(message.body, MessageBody::Empty);
    }

    #[test]
    fn completion_and_ping() {
        assert_eq!(
            parse_record(r#"{"type":3,"invocationId":"0","result":100}"#).unwrap(),
            Some(HubRecord::Completion {
                invocation_id: "0".to_string(),
                error: None
            })
        );
        assert_eq!(parse_record(r#"{"type":6}"#).unwrap(), None);
        assert_eq!(parse_record(r#"{"type":7}"#).unwrap(), Some(HubRecord::Close));
    }

    #[test]
    fn websocket_url_is_derived_from_http() {
        let events = TzktEvents::new(&Url::parse("https://api.tzkt.io/").unwrap()).unwrap();
        assert_eq!(events.url.as_str(), "wss://api.tzkt.io/v1/ws");
    }
}
