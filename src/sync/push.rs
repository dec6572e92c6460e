// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Galene-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Galene and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Push delivery: one long-lived WebSocket per editor client.
//!
//! Each connection gets a client id and an outbound queue; the registry is
//! plain data inside [`SyncState`](super::SyncState) so it can be exercised
//! without sockets. Clients whose heartbeat goes quiet past the liveness
//! timeout are dropped by the sweep, which closes their queue and thereby
//! their connection.

use std::collections::BTreeMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tokio::sync::mpsc;

use crate::model::{ClientId, DocumentId};

use super::{
    envelope, message_kind, now_millis, ChangesReportPayload, ConnectionAckPayload, Envelope,
    OperationResultPayload, SubscribePayload, SyncHandle, UpdateCause,
};

#[derive(Debug)]
pub struct ClientHandle {
    client_id: ClientId,
    sender: mpsc::UnboundedSender<Envelope>,
    subscription: Option<DocumentId>,
    last_seen_millis: u64,
}

impl ClientHandle {
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn subscription(&self) -> Option<&DocumentId> {
        self.subscription.as_ref()
    }

    pub fn last_seen_millis(&self) -> u64 {
        self.last_seen_millis
    }
}

/// Connected push clients and their subscriptions.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: BTreeMap<ClientId, ClientHandle>,
    next_client: u64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn register(
        &mut self,
        sender: mpsc::UnboundedSender<Envelope>,
        now_millis: u64,
    ) -> ClientId {
        let client_id = loop {
            self.next_client += 1;
            let candidate = format!("client-{}", self.next_client);
            if let Ok(client_id) = ClientId::new(candidate) {
                if !self.clients.contains_key(&client_id) {
                    break client_id;
                }
            }
        };
        self.clients.insert(
            client_id.clone(),
            ClientHandle {
                client_id: client_id.clone(),
                sender,
                subscription: None,
                last_seen_millis: now_millis,
            },
        );
        client_id
    }

    pub fn remove(&mut self, client_id: &ClientId) -> bool {
        self.clients.remove(client_id).is_some()
    }

    pub fn touch(&mut self, client_id: &ClientId, now_millis: u64) {
        if let Some(client) = self.clients.get_mut(client_id) {
            client.last_seen_millis = now_millis;
        }
    }

    /// Scope future document-updates for this client to one document.
    pub fn subscribe(&mut self, client_id: &ClientId, document_id: DocumentId, now_millis: u64) {
        if let Some(client) = self.clients.get_mut(client_id) {
            client.subscription = Some(document_id);
            client.last_seen_millis = now_millis;
        }
    }

    pub fn send_to(&self, client_id: &ClientId, message: Envelope) -> bool {
        self.clients
            .get(client_id)
            .map(|client| client.sender.send(message).is_ok())
            .unwrap_or(false)
    }

    /// Deliver to every client subscribed to the document; returns how many
    /// queues accepted the message.
    pub fn broadcast_to_document(
        &self,
        document_id: &DocumentId,
        message: &Envelope,
        exclude: Option<&ClientId>,
    ) -> usize {
        self.clients
            .values()
            .filter(|client| client.subscription.as_ref() == Some(document_id))
            .filter(|client| Some(&client.client_id) != exclude)
            .filter(|client| client.sender.send(message.clone()).is_ok())
            .count()
    }

    /// Drop clients with no ping inside the liveness window. Dropping the
    /// sender closes the connection's outbound queue, which terminates it.
    pub fn sweep_stale(&mut self, now_millis: u64, timeout_millis: u64) -> Vec<ClientId> {
        let cutoff = now_millis.saturating_sub(timeout_millis);
        let stale = self
            .clients
            .values()
            .filter(|client| client.last_seen_millis < cutoff)
            .map(|client| client.client_id.clone())
            .collect::<Vec<_>>();
        for client_id in &stale {
            self.clients.remove(client_id);
        }
        stale
    }
}

/// `GET /ws`: upgrade and run the client loop until either side closes.
pub async fn ws_handler(State(handle): State<SyncHandle>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| client_loop(handle, socket))
}

enum Turn {
    Outbound(Option<Envelope>),
    Inbound(Option<Result<Message, axum::Error>>),
}

async fn client_loop(handle: SyncHandle, mut socket: WebSocket) {
    let (sender, mut outbound) = mpsc::unbounded_channel();
    let client_id = handle
        .lock()
        .await
        .clients_mut()
        .register(sender, now_millis());

    let ack = envelope(
        message_kind::CONNECTION_ACK,
        ConnectionAckPayload {
            client_id: client_id.as_str().to_owned(),
        },
    );
    if send_envelope(&mut socket, &ack).await.is_err() {
        handle.lock().await.clients_mut().remove(&client_id);
        return;
    }

    loop {
        let turn = tokio::select! {
            message = outbound.recv() => Turn::Outbound(message),
            message = socket.recv() => Turn::Inbound(message),
        };
        match turn {
            Turn::Outbound(Some(message)) => {
                if send_envelope(&mut socket, &message).await.is_err() {
                    break;
                }
            }
            // Queue closed: the sweep evicted this client.
            Turn::Outbound(None) => break,
            Turn::Inbound(Some(Ok(Message::Text(text)))) => {
                handle_client_message(&handle, &client_id, text.as_str()).await;
            }
            Turn::Inbound(Some(Ok(Message::Close(_)))) | Turn::Inbound(None) => break,
            Turn::Inbound(Some(Ok(_))) => {}
            Turn::Inbound(Some(Err(_))) => break,
        }
    }

    handle.lock().await.clients_mut().remove(&client_id);
}

async fn send_envelope(socket: &mut WebSocket, message: &Envelope) -> Result<(), axum::Error> {
    let raw = serde_json::to_string(message).unwrap_or_default();
    socket.send(Message::Text(raw.into())).await
}

/// Dispatch one inbound client message. Malformed envelopes and unknown
/// message kinds are logged and ignored, never fatal.
pub async fn handle_client_message(handle: &SyncHandle, client_id: &ClientId, raw: &str) {
    let message: Envelope = match serde_json::from_str(raw) {
        Ok(message) => message,
        Err(err) => {
            eprintln!("galene: ignoring malformed message from '{client_id}': {err}");
            return;
        }
    };

    match message.kind.as_str() {
        message_kind::HEARTBEAT_PING => {
            let mut state = handle.lock().await;
            state.clients_mut().touch(client_id, now_millis());
            let reply = envelope(message_kind::HEARTBEAT_REPLY, serde_json::json!({}));
            state.clients().send_to(client_id, reply);
        }
        message_kind::SUBSCRIBE => {
            let Ok(payload) = serde_json::from_value::<SubscribePayload>(message.payload) else {
                eprintln!("galene: ignoring malformed subscribe from '{client_id}'");
                return;
            };
            let Ok(document_id) = crate::model::DocumentId::new(payload.document_id) else {
                return;
            };
            let mut state = handle.lock().await;
            state.ensure_session(&document_id, None);
            state
                .clients_mut()
                .subscribe(client_id, document_id.clone(), now_millis());
            // Catch the late joiner up with the current content.
            let document = state
                .session(&document_id)
                .map(|session| session.document().to_owned())
                .unwrap_or_default();
            if !document.is_empty() {
                let update = envelope(
                    message_kind::DOCUMENT_UPDATE,
                    super::DocumentUpdatePayload {
                        document_id: document_id.as_str().to_owned(),
                        document,
                        cause: UpdateCause::Display,
                    },
                );
                state.clients().send_to(client_id, update);
            }
        }
        message_kind::CHANGES_REPORT => {
            match serde_json::from_value::<ChangesReportPayload>(message.payload) {
                Ok(payload) => {
                    handle
                        .lock()
                        .await
                        .clients_mut()
                        .touch(client_id, now_millis());
                    if let Err(err) = handle.record_changes_report(&payload).await {
                        eprintln!("galene: rejected changes-report from '{client_id}': {err}");
                    }
                }
                Err(err) => {
                    eprintln!("galene: ignoring malformed changes-report from '{client_id}': {err}");
                }
            }
        }
        message_kind::OPERATION_RESULT => {
            match serde_json::from_value::<OperationResultPayload>(message.payload) {
                Ok(payload) => {
                    handle.record_client_result(payload, Some(client_id)).await;
                }
                Err(err) => {
                    eprintln!(
                        "galene: ignoring malformed operation-result from '{client_id}': {err}"
                    );
                }
            }
        }
        other => {
            eprintln!("galene: ignoring unknown message type '{other}' from '{client_id}'");
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::ClientRegistry;
    use crate::model::DocumentId;
    use crate::sync::{envelope, message_kind, Envelope};

    fn did(value: &str) -> DocumentId {
        DocumentId::new(value).expect("document id")
    }

    fn channel() -> (
        mpsc::UnboundedSender<Envelope>,
        mpsc::UnboundedReceiver<Envelope>,
    ) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn registry_assigns_distinct_ids() {
        let mut registry = ClientRegistry::new();
        let (tx_a, _rx_a) = channel();
        let (tx_b, _rx_b) = channel();

        let a = registry.register(tx_a, 1_000);
        let b = registry.register(tx_b, 1_000);
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn broadcast_reaches_only_subscribers_of_the_document() {
        let mut registry = ClientRegistry::new();
        let (tx_a, mut rx_a) = channel();
        let (tx_b, mut rx_b) = channel();
        let (tx_c, mut rx_c) = channel();
        let a = registry.register(tx_a, 1_000);
        let b = registry.register(tx_b, 1_000);
        let _c = registry.register(tx_c, 1_000);

        registry.subscribe(&a, did("d1"), 1_000);
        registry.subscribe(&b, did("d2"), 1_000);

        let message = envelope(message_kind::HEARTBEAT_REPLY, serde_json::json!({}));
        let delivered = registry.broadcast_to_document(&did("d1"), &message, None);

        assert_eq!(delivered, 1);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
        assert!(rx_c.try_recv().is_err());
    }

    #[test]
    fn broadcast_can_exclude_the_reporter() {
        let mut registry = ClientRegistry::new();
        let (tx_a, mut rx_a) = channel();
        let (tx_b, mut rx_b) = channel();
        let a = registry.register(tx_a, 1_000);
        let b = registry.register(tx_b, 1_000);
        registry.subscribe(&a, did("d1"), 1_000);
        registry.subscribe(&b, did("d1"), 1_000);

        let message = envelope(message_kind::HEARTBEAT_REPLY, serde_json::json!({}));
        let delivered = registry.broadcast_to_document(&did("d1"), &message, Some(&a));

        assert_eq!(delivered, 1);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn dispatch_handles_subscribe_heartbeat_and_unknown_kinds() {
        let handle = crate::sync::SyncHandle::new(crate::sync::SyncOptions::default());
        handle
            .display_document(
                Some("d1"),
                None,
                r#"<mxGraphModel><root><mxCell id="0"/><mxCell id="1" parent="0"/></root></mxGraphModel>"#,
                crate::checkpoint::CheckpointOrigin::Agent,
            )
            .await
            .expect("display");

        let (sender, mut inbox) = mpsc::unbounded_channel();
        let client_id = handle
            .lock()
            .await
            .clients_mut()
            .register(sender, super::now_millis());

        let subscribe = serde_json::to_string(&envelope(
            message_kind::SUBSCRIBE,
            crate::sync::SubscribePayload {
                document_id: "d1".to_owned(),
            },
        ))
        .expect("serialize subscribe");
        super::handle_client_message(&handle, &client_id, &subscribe).await;

        // Late joiner got the current content.
        let update = inbox.try_recv().expect("document-update");
        assert_eq!(update.kind, message_kind::DOCUMENT_UPDATE);
        assert_eq!(update.payload["document_id"], "d1");
        {
            let state = handle.lock().await;
            let delivered = state.clients().broadcast_to_document(
                &did("d1"),
                &envelope(message_kind::HEARTBEAT_REPLY, serde_json::json!({})),
                None,
            );
            assert_eq!(delivered, 1);
            let _ = inbox.try_recv();
        }

        let ping = serde_json::to_string(&envelope(
            message_kind::HEARTBEAT_PING,
            serde_json::json!({}),
        ))
        .expect("serialize ping");
        super::handle_client_message(&handle, &client_id, &ping).await;
        let reply = inbox.try_recv().expect("heartbeat-reply");
        assert_eq!(reply.kind, message_kind::HEARTBEAT_REPLY);

        // Unknown kinds and malformed envelopes are ignored, never fatal.
        super::handle_client_message(
            &handle,
            &client_id,
            r#"{"type":"mystery","timestamp":1,"payload":{}}"#,
        )
        .await;
        super::handle_client_message(&handle, &client_id, "not json").await;
        assert!(inbox.try_recv().is_err());
    }

    #[test]
    fn sweep_drops_only_quiet_clients() {
        let mut registry = ClientRegistry::new();
        let (tx_a, _rx_a) = channel();
        let (tx_b, _rx_b) = channel();
        let a = registry.register(tx_a, 1_000);
        let b = registry.register(tx_b, 1_000);

        // Nobody is stale inside the window.
        assert!(registry.sweep_stale(10_000, 60_000).is_empty());

        // Only the client that kept pinging survives the window.
        registry.touch(&b, 95_000);
        let dropped = registry.sweep_stale(100_000, 30_000);

        assert_eq!(dropped, vec![a.clone()]);
        assert_eq!(registry.len(), 1);
        let message = envelope(message_kind::HEARTBEAT_REPLY, serde_json::json!({}));
        assert!(!registry.send_to(&a, message));
    }
}
