//! Loopback transport for push messages.
//!
//! A running instance listens on `127.0.0.1:<notification_port>` for
//! newline-delimited JSON [`RemoteMessage`]s; `pokedextui notify` is the
//! sending side.

use std::net::{Ipv4Addr, SocketAddr};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::notify::NotifyError;
use crate::notify::message::RemoteMessage;

pub struct NotificationListener {
    listener: TcpListener,
}

impl NotificationListener {
    /// Bind the loopback port. Port 0 picks a free one.
    pub async fn bind(port: u16) -> Result<Self, NotifyError> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
            .await
            .map_err(|source| NotifyError::PermissionDenied { port, source })?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NotifyError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until cancelled, forwarding every parsed message.
    pub async fn run(self, tx: mpsc::UnboundedSender<RemoteMessage>, cancel: CancellationToken) {
        if let Ok(addr) = self.local_addr() {
            tracing::info!(%addr, "notification listener started");
        }
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tx.closed() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(%peer, "notification connection");
                        let tx = tx.clone();
                        tokio::spawn(read_messages(stream, tx));
                    }
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                },
            }
        }
        tracing::debug!("notification listener stopped");
    }
}

async fn read_messages(stream: TcpStream, tx: mpsc::UnboundedSender<RemoteMessage>) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match serde_json::from_str::<RemoteMessage>(&line) {
                Ok(message) => {
                    if tx.send(message).is_err() {
                        return;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "dropping malformed message"),
            },
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "notification connection error");
                return;
            }
        }
    }
}

/// Deliver one message to the instance listening on `port`.
pub async fn send_notification(port: u16, message: &RemoteMessage) -> Result<(), NotifyError> {
    let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).await?;
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    stream.write_all(&line).await?;
    stream.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::message::MessageKind;

    #[tokio::test]
    async fn delivers_messages_from_sender() {
        let listener = NotificationListener::bind(0).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(listener.run(tx, cancel.clone()));

        let msg = RemoteMessage::to_screen(MessageKind::Opened, "Team", None, None);
        send_notification(port, &msg).await.unwrap();

        assert_eq!(rx.recv().await, Some(msg));
        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn skips_malformed_lines() {
        let listener = NotificationListener::bind(0).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tokio::spawn(listener.run(tx, cancel.clone()));

        let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).await.unwrap();
        stream
            .write_all(b"not json\n\n{\"kind\":\"foreground\",\"data\":{\"Screen\":\"Home\"}}\n")
            .await
            .unwrap();
        stream.shutdown().await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, MessageKind::Foreground);
        assert_eq!(received.data.get("Screen").map(String::as_str), Some("Home"));
        cancel.cancel();
    }

    #[tokio::test]
    async fn occupied_port_is_permission_denied() {
        let first = NotificationListener::bind(0).await.unwrap();
        let port = first.local_addr().unwrap().port();

        let second = NotificationListener::bind(port).await;
        assert!(matches!(
            second,
            Err(NotifyError::PermissionDenied { port: p, .. }) if p == port
        ));
    }

    #[tokio::test]
    async fn sending_without_listener_fails() {
        let probe = NotificationListener::bind(0).await.unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let msg = RemoteMessage::to_screen(MessageKind::Opened, "Team", None, None);
        assert!(matches!(
            send_notification(port, &msg).await,
            Err(NotifyError::Io(_))
        ));
    }
}
