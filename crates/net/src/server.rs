//! TCP server exposing the booking service
//!
//! Each connection carries a sequence of request frames. Requests on one
//! connection are handled in order; connections run concurrently and share
//! the services behind an `Arc`.

use std::net::SocketAddr;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::io::WriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use boxoffice_core::{
    BookingPolicy, BookingService, Clock, ErrorKind, EventCatalog, PaymentGateway, RefundQueue,
    Reports, SharedStore, User, UserRepository, UserRole,
};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Request, Response};

/// Everything a request can be dispatched to
pub struct Services {
    pub bookings: BookingService,
    pub catalog: EventCatalog,
    pub reports: Reports,
    store: SharedStore,
}

impl Services {
    /// Wire the services over one store. Also starts the refund worker.
    pub fn new(
        store: SharedStore,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        policy: BookingPolicy,
        refund_capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (refunds, worker) = RefundQueue::spawn(
            store.clone(),
            Arc::clone(&gateway),
            Arc::clone(&clock),
            refund_capacity,
        );
        let services = Self {
            bookings: BookingService::new(
                store.clone(),
                gateway,
                Arc::clone(&clock),
                refunds,
                policy,
            ),
            catalog: EventCatalog::new(store.clone(), Arc::clone(&clock)),
            reports: Reports::new(store.clone(), clock),
            store,
        };
        (services, worker)
    }

    fn register_user(&self, name: String, email: String, role: UserRole) -> boxoffice_core::Result<User> {
        let user = User::new(name.trim().to_string(), email.trim().to_lowercase(), role);
        user.validate()?;
        self.store.with(|db| db.create_user(&user))?;
        info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(user)
    }

    /// Run one request to completion
    pub async fn dispatch(&self, request: Request) -> Response {
        let op = request.op();
        debug!(op, "Dispatching request");

        match request {
            Request::Ping => Response::ok(Value::from("pong")),
            Request::RegisterUser { name, email, role } => {
                respond(op, self.register_user(name, email, role))
            }

            Request::CreateBooking { actor, booking } => {
                respond(op, self.bookings.create_booking(actor, booking).await)
            }
            Request::CancelBooking { actor, booking_id } => {
                respond(op, self.bookings.cancel_booking(actor, booking_id).await)
            }
            Request::GetBooking { actor, booking_id } => {
                respond(op, self.bookings.get_booking(actor, booking_id))
            }
            Request::ListUserBookings {
                actor,
                status,
                paging,
            } => respond(
                op,
                self.bookings
                    .list_user_bookings(actor, status, paging.request()),
            ),
            Request::ListAllBookings {
                actor,
                filter,
                paging,
            } => respond(
                op,
                self.bookings
                    .list_all_bookings(actor, filter, paging.request()),
            ),
            Request::EventBookingStats {
                actor,
                event_id,
                status,
                paging,
            } => respond(
                op,
                self.bookings
                    .event_booking_stats(actor, event_id, status, paging.request()),
            ),

            Request::CreateEvent { actor, event } => {
                respond(op, self.catalog.create_event(actor, event))
            }
            Request::GetEvent { event_id } => respond(op, self.catalog.get_event(event_id)),
            Request::UpdateEvent {
                actor,
                event_id,
                update,
            } => respond(op, self.catalog.update_event(actor, event_id, update)),
            Request::DeleteEvent { actor, event_id } => respond(
                op,
                self.catalog
                    .delete_event(actor, event_id)
                    .map(|()| serde_json::json!({ "deleted": event_id })),
            ),
            Request::ListEvents {
                filter,
                sort,
                order,
                paging,
            } => respond(
                op,
                self.catalog
                    .list_events(&filter, sort, order, paging.request()),
            ),
            Request::EventCategories => respond(op, self.catalog.categories()),
            Request::EventLocations => respond(op, self.catalog.locations()),

            Request::DashboardOverview { actor } => respond(op, self.reports.overview(actor)),
            Request::Dashboard { actor } => respond(op, self.reports.dashboard(actor)),
            Request::RevenueSeries { actor, period } => {
                respond(op, self.reports.revenue_series(actor, period))
            }
        }
    }
}

/// Build the response, logging internal failures before they are masked
fn respond<T: Serialize>(op: &str, result: boxoffice_core::Result<T>) -> Response {
    if let Err(e) = &result {
        match e.kind() {
            ErrorKind::Internal => error!(op, error = %e, "Request failed"),
            kind => debug!(op, kind = %kind, "Request rejected"),
        }
    }
    Response::from_result(result)
}

/// Booking server handle
pub struct Server {
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Start a new server on the given port
    pub async fn start(port: u16, services: Arc<Services>) -> Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, "Server started");

        let (shutdown_tx, _) = broadcast::channel(1);

        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(accept_loop(
            listener,
            services,
            shutdown_tx.clone(),
            shutdown_rx,
        ));

        Ok(Server {
            addr: bound_addr,
            shutdown_tx,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and close open ones
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("Server shutdown initiated");
    }
}

/// Accept incoming connections
async fn accept_loop(
    listener: TcpListener,
    services: Arc<Services>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        let services = Arc::clone(&services);
                        let shutdown_rx = shutdown_tx.subscribe();
                        tokio::spawn(handle_connection(stream, addr, services, shutdown_rx));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Handle a single client connection
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    services: Arc<Services>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let (mut reader, writer) = tokio::io::split(stream);

    let (resp_tx, resp_rx) = mpsc::channel(16);
    let writer_handle = tokio::spawn(writer_task(writer, resp_rx));

    loop {
        let request = tokio::select! {
            result = read_frame::<Request, _>(&mut reader) => result,
            _ = shutdown_rx.recv() => {
                debug!(addr = %addr, "Closing connection for shutdown");
                break;
            }
        };

        let response = match request {
            Ok(request) => services.dispatch(request).await,
            Err(Error::Malformed(reason)) => {
                warn!(addr = %addr, reason = %reason, "Malformed request");
                Response::error(ErrorKind::InvalidInput, format!("Malformed request: {}", reason))
            }
            Err(Error::ConnectionClosed) => {
                debug!(addr = %addr, "Connection closed");
                break;
            }
            Err(e) => {
                warn!(addr = %addr, error = %e, "Read error");
                break;
            }
        };

        if resp_tx.send(response).await.is_err() {
            break;
        }
    }

    // Let queued responses drain before the socket closes
    drop(resp_tx);
    let _ = writer_handle.await;
    debug!(addr = %addr, "Connection finished");
}

/// Writer task - sends responses to the client
async fn writer_task(mut writer: WriteHalf<TcpStream>, mut rx: mpsc::Receiver<Response>) {
    while let Some(response) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &response).await {
            debug!(error = %e, "Write failed");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use boxoffice_core::{Database, FixedClock, MockPaymentGateway};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tokio::io::AsyncWriteExt;

    async fn start_server() -> (Server, SocketAddr) {
        let store = SharedStore::new(Database::open_in_memory().unwrap());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap(),
        ));
        let (services, _worker) = Services::new(
            store,
            Arc::new(MockPaymentGateway::instant()),
            clock,
            BookingPolicy::default(),
            16,
        );
        let server = Server::start(0, Arc::new(services)).await.unwrap();
        let addr = SocketAddr::from(([127, 0, 0, 1], server.addr().port()));
        (server, addr)
    }

    fn request(value: Value) -> Request {
        serde_json::from_value(value).unwrap()
    }

    async fn register(client: &mut Client, name: &str, role: &str) -> Value {
        let response = client
            .call(request(json!({
                "op": "register_user",
                "name": name,
                "email": format!("{}@example.com", name),
                "role": role,
            })))
            .await
            .unwrap();
        assert!(response.success, "{:?}", response.error);
        let user = response.data.unwrap();
        json!({ "user_id": user["id"], "role": user["role"] })
    }

    fn new_event(seats: u32) -> Value {
        json!({
            "title": "Jazz Night",
            "description": "Live music",
            "category": "concert",
            "location": "Berlin",
            "venue": "Main Hall",
            "date": "2026-09-01",
            "time": "19:00",
            "price": 2500,
            "total_seats": seats,
        })
    }

    fn new_booking(event_id: &Value, seats: u32) -> Value {
        json!({
            "event_id": event_id,
            "seats": seats,
            "details": {
                "full_name": "Ada Lovelace",
                "email": "ada@example.com",
                "phone": "+44 20 7946 0958",
                "emergency_contact": "Charles Babbage",
                "emergency_phone": "+44 20 7946 0000",
            },
        })
    }

    #[tokio::test]
    async fn test_booking_roundtrip_over_tcp() {
        let (server, addr) = start_server().await;
        let mut client = Client::connect(addr).await.unwrap();

        let pong = client.call(Request::Ping).await.unwrap();
        assert_eq!(pong.data, Some(json!("pong")));

        let admin = register(&mut client, "org", "admin").await;
        let user = register(&mut client, "ada", "user").await;

        let created = client
            .call(request(json!({
                "op": "create_event",
                "actor": admin,
                "event": new_event(3),
            })))
            .await
            .unwrap();
        assert!(created.success, "{:?}", created.error);
        let event_id = created.data.unwrap()["id"].clone();

        let booked = client
            .call(request(json!({
                "op": "create_booking",
                "actor": user,
                "booking": new_booking(&event_id, 2),
            })))
            .await
            .unwrap();
        assert!(booked.success, "{:?}", booked.error);
        let confirmation = booked.data.unwrap();
        assert_eq!(confirmation["booking"]["status"], "confirmed");
        assert_eq!(confirmation["payment"]["amount"], 5000);

        let too_many = client
            .call(request(json!({
                "op": "create_booking",
                "actor": admin,
                "booking": new_booking(&event_id, 2),
            })))
            .await
            .unwrap();
        assert_eq!(too_many.error_kind(), Some(ErrorKind::InsufficientCapacity));

        let event = client
            .call(request(json!({ "op": "get_event", "event_id": event_id })))
            .await
            .unwrap();
        assert_eq!(event.data.unwrap()["available_seats"], 1);

        let overview = client
            .call(request(json!({ "op": "dashboard_overview", "actor": admin })))
            .await
            .unwrap();
        let overview = overview.data.unwrap();
        assert_eq!(overview["total_bookings"], 1);
        assert_eq!(overview["total_revenue"], 5000);

        server.shutdown();
    }

    #[tokio::test]
    async fn test_errors_are_tagged() {
        let (server, addr) = start_server().await;
        let mut client = Client::connect(addr).await.unwrap();
        let user = register(&mut client, "ada", "user").await;

        let forbidden = client
            .call(request(json!({ "op": "dashboard", "actor": user })))
            .await
            .unwrap();
        assert!(!forbidden.success);
        assert_eq!(forbidden.error_kind(), Some(ErrorKind::Forbidden));

        let missing = client
            .call(request(json!({
                "op": "get_event",
                "event_id": uuid::Uuid::new_v4(),
            })))
            .await
            .unwrap();
        assert_eq!(missing.error_kind(), Some(ErrorKind::NotFound));

        let duplicate = client
            .call(request(json!({
                "op": "register_user",
                "name": "ada again",
                "email": "ADA@example.com",
            })))
            .await
            .unwrap();
        assert_eq!(duplicate.error_kind(), Some(ErrorKind::Conflict));

        server.shutdown();
    }

    #[tokio::test]
    async fn test_malformed_request_keeps_connection() {
        let (server, addr) = start_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let payload = br#"{"op":"teleport"}"#;
        stream
            .write_all(&(payload.len() as u32).to_be_bytes())
            .await
            .unwrap();
        stream.write_all(payload).await.unwrap();
        let response: Response = read_frame(&mut stream).await.unwrap();
        assert_eq!(response.error_kind(), Some(ErrorKind::InvalidInput));

        write_frame(&mut stream, &Request::Ping).await.unwrap();
        let response: Response = read_frame(&mut stream).await.unwrap();
        assert!(response.success);

        server.shutdown();
    }
}
