//! Blocking socket driver for one `Subscription`.
//!
//! Each client runs on its own worker thread which owns the socket and the
//! single pending timer. Frames are applied in delivery order, one view lock
//! per frame. `ClientHandle::shutdown` (also run on drop) tears the
//! subscription down and joins the worker before returning. A handshake in
//! progress is aborted by shutting down its TCP stream from the owner side.

use anyhow::{anyhow, Context, Result};
use std::collections::VecDeque;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};
use url::Url;

use crate::session::{Action, ConnectionPolicy, Subscription};
use crate::state::StreamHandler;

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// TCP stream of a handshake in flight. Empty once the socket is open.
type Handshake = Arc<Mutex<Option<TcpStream>>>;

/// Upper bound on TCP connect and handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Read timeout on an open socket; bounds how late a shutdown is noticed.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct LiveClient;

impl LiveClient {
    /// Start the subscription on a dedicated worker thread.
    pub fn spawn<P, H>(subscription: Subscription<P, H>) -> Result<ClientHandle<H>>
    where
        P: ConnectionPolicy + 'static,
        H: StreamHandler + 'static,
    {
        let view = subscription.view();
        let shutdown = Arc::new(AtomicBool::new(false));
        let handshake: Handshake = Arc::new(Mutex::new(None));
        let name = subscription.policy().name();
        let driver = Driver {
            subscription,
            shutdown: Arc::clone(&shutdown),
            handshake: Arc::clone(&handshake),
            socket: None,
            timer: None,
        };
        let thread = std::thread::Builder::new()
            .name(format!("zentinel-{}", name))
            .spawn(move || driver.run())
            .with_context(|| format!("failed to spawn {} stream worker", name))?;
        Ok(ClientHandle {
            view,
            shutdown,
            handshake,
            thread: Some(thread),
        })
    }
}

/// Owner-side handle. Dropping it tears the client down.
pub struct ClientHandle<H> {
    view: Arc<Mutex<H>>,
    shutdown: Arc<AtomicBool>,
    handshake: Handshake,
    thread: Option<JoinHandle<()>>,
}

impl<H> ClientHandle<H> {
    /// Run `f` against a consistent snapshot of the view.
    pub fn read<R>(&self, f: impl FnOnce(&H) -> R) -> R {
        let view = lock(&self.view);
        f(&view)
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }

    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(stream) = lock(&self.handshake).as_ref() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            if thread.join().is_err() {
                log::error!("stream worker panicked");
            }
        }
    }
}

impl<H> Drop for ClientHandle<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Driver<P, H> {
    subscription: Subscription<P, H>,
    shutdown: Arc<AtomicBool>,
    handshake: Handshake,
    socket: Option<Socket>,
    timer: Option<Instant>,
}

impl<P: ConnectionPolicy, H: StreamHandler> Driver<P, H> {
    fn run(mut self) {
        let actions = self.subscription.start();
        self.execute(actions);

        while !self.stopping() {
            if self.socket.is_some() {
                self.poll_socket();
            } else {
                std::thread::park_timeout(self.idle_wait());
            }
            self.fire_timer_if_due();
        }

        let actions = self.subscription.teardown();
        self.execute(actions);
        log::debug!("{} stream worker stopped", self.subscription.policy().name());
    }

    fn stopping(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn idle_wait(&self) -> Duration {
        match self.timer {
            Some(deadline) => deadline
                .saturating_duration_since(Instant::now())
                .min(POLL_INTERVAL),
            None => POLL_INTERVAL,
        }
    }

    fn execute(&mut self, actions: Vec<Action>) {
        let mut queue: VecDeque<Action> = actions.into();
        while let Some(action) = queue.pop_front() {
            match action {
                Action::Connect { url } => {
                    self.close_socket();
                    if self.stopping() {
                        continue;
                    }
                    queue.extend(self.connect(&url));
                }
                Action::Close => self.close_socket(),
                Action::Schedule { delay } => self.timer = Some(Instant::now() + delay),
                Action::CancelTimer => self.timer = None,
            }
        }
    }

    /// A failed connect surfaces as error followed by close.
    fn connect(&mut self, url: &str) -> Vec<Action> {
        log::info!("Attempting WebSocket connection to: {}", url);
        match open_socket(url, &self.handshake, &self.shutdown) {
            Ok(socket) => {
                self.socket = Some(socket);
                self.subscription.opened()
            }
            Err(e) if self.stopping() => {
                log::debug!("connect abandoned on shutdown: {:#}", e);
                Vec::new()
            }
            Err(e) => {
                log::error!("WebSocket error: {:#}", e);
                self.lost()
            }
        }
    }

    fn poll_socket(&mut self) {
        let Some(socket) = self.socket.as_mut() else {
            return;
        };
        match socket.read() {
            Ok(Message::Text(text)) => {
                if self.stopping() {
                    return;
                }
                self.subscription.deliver(&text, crate::now_ms());
            }
            Ok(Message::Close(frame)) => {
                log::debug!("close frame: {:?}", frame);
                // Sends the queued close reply.
                let _ = socket.flush();
                self.socket = None;
                let actions = self.subscription.closed();
                self.execute(actions);
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) => {}
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                self.socket = None;
                let actions = self.subscription.closed();
                self.execute(actions);
            }
            Err(e) => {
                log::error!("WebSocket error: {}", e);
                self.socket = None;
                let actions = self.lost();
                self.execute(actions);
            }
        }
    }

    fn lost(&mut self) -> Vec<Action> {
        let mut actions = self.subscription.errored();
        actions.extend(self.subscription.closed());
        actions
    }

    fn fire_timer_if_due(&mut self) {
        let due = matches!(self.timer, Some(deadline) if Instant::now() >= deadline);
        if due && !self.stopping() {
            self.timer = None;
            let actions = self.subscription.timer_fired();
            self.execute(actions);
        }
    }

    fn close_socket(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None);
            let _ = socket.flush();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

fn open_socket(
    url: &str,
    handshake: &Mutex<Option<TcpStream>>,
    shutdown: &AtomicBool,
) -> Result<Socket> {
    let parsed = Url::parse(url).with_context(|| format!("invalid stream URL '{}'", url))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("stream URL '{}' has no host", url))?;
    let port = parsed
        .port_or_known_default()
        .ok_or_else(|| anyhow!("stream URL '{}' has no port", url))?;
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .with_context(|| format!("failed to resolve {}:{}", host, port))?
        .collect();

    let stream = connect_any(&addrs, CONNECT_TIMEOUT)
        .with_context(|| format!("failed to connect to {}:{}", host, port))?;
    stream.set_read_timeout(Some(CONNECT_TIMEOUT))?;
    stream.set_write_timeout(Some(CONNECT_TIMEOUT))?;
    // Socket options live on the descriptor, so this clone retunes the
    // stream after tungstenite takes ownership of it.
    let tuning = stream.try_clone()?;

    *lock(handshake) = Some(stream.try_clone()?);
    if shutdown.load(Ordering::SeqCst) {
        lock(handshake).take();
        return Err(anyhow!("shutdown before handshake with {}", url));
    }
    let result = tungstenite::client_tls(url, stream);
    lock(handshake).take();

    let (socket, _response) =
        result.map_err(|e| anyhow!("handshake with {} failed: {}", url, e))?;
    tuning.set_read_timeout(Some(POLL_INTERVAL))?;
    Ok(socket)
}

/// Try each address in order; the first that accepts wins.
fn connect_any(addrs: &[SocketAddr], timeout: Duration) -> Result<TcpStream> {
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                log::debug!("connect to {} failed: {}", addr, e);
                last_err = Some(anyhow::Error::new(e).context(format!("connect to {}", addr)));
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow!("no address resolved")))
}
