//! TCP client for talking to a booking server

use std::net::SocketAddr;

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Request, Response};

enum ClientCommand {
    Call {
        request: Request,
        reply: oneshot::Sender<Result<Response>>,
    },
    Disconnect,
}

/// Client handle. Calls are answered in the order they are made.
pub struct Client {
    cmd_tx: mpsc::Sender<ClientCommand>,
}

impl Client {
    /// Connect to a booking server
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        info!(addr = %addr, "Connecting to server");

        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = tokio::io::split(stream);

        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        tokio::spawn(connection_task(reader, writer, cmd_rx));

        Ok(Client { cmd_tx })
    }

    /// Send a request and wait for its response
    pub async fn call(&mut self, request: Request) -> Result<Response> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(ClientCommand::Call { request, reply })
            .await
            .map_err(|_| Error::NotConnected)?;
        rx.await.map_err(|_| Error::NotConnected)?
    }

    /// Disconnect from the server
    pub async fn disconnect(&self) {
        let _ = self.cmd_tx.send(ClientCommand::Disconnect).await;
    }
}

/// Owns the socket; one request in flight at a time
async fn connection_task(
    mut reader: ReadHalf<TcpStream>,
    mut writer: WriteHalf<TcpStream>,
    mut cmd_rx: mpsc::Receiver<ClientCommand>,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            ClientCommand::Call { request, reply } => {
                let op = request.op();
                let result = match write_frame(&mut writer, &request).await {
                    Ok(()) => read_frame::<Response, _>(&mut reader).await,
                    Err(e) => Err(e),
                };
                let broken = matches!(
                    result,
                    Err(Error::ConnectionClosed | Error::Io(_) | Error::Protocol(_))
                );
                if let Err(e) = &result {
                    warn!(op, error = %e, "Call failed");
                }
                let _ = reply.send(result);
                if broken {
                    break;
                }
            }
            ClientCommand::Disconnect => {
                debug!("Disconnect requested");
                break;
            }
        }
    }
    info!("Disconnected from server");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{Server, Services};
    use boxoffice_core::{BookingPolicy, Database, MockPaymentGateway, SharedStore, SystemClock};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_client_connect() {
        let (services, _worker) = Services::new(
            SharedStore::new(Database::open_in_memory().unwrap()),
            Arc::new(MockPaymentGateway::instant()),
            Arc::new(SystemClock),
            BookingPolicy::default(),
            4,
        );
        let server = Server::start(0, Arc::new(services)).await.unwrap();
        let addr = SocketAddr::from(([127, 0, 0, 1], server.addr().port()));

        let mut client = Client::connect(addr).await.unwrap();
        let response = client.call(Request::Ping).await.unwrap();
        assert!(response.success);

        let categories = client.call(Request::EventCategories).await.unwrap();
        assert_eq!(categories.data, Some(serde_json::json!([])));

        client.disconnect().await;
        assert!(matches!(
            client.call(Request::Ping).await,
            Err(Error::NotConnected)
        ));
        server.shutdown();
    }
}
