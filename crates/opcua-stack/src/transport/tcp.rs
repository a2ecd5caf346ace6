// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCP listener loop.
//!
//! Drives a [`Server`] from a single `mio` event loop: accepts connections,
//! feeds received bytes to the server, writes whatever it queued and runs
//! scheduled jobs when they fall due.
//!
//! ```text
//! +-----------------------------------------------------+
//! |                  TcpListenerLoop                    |
//! |  mio::Poll                                          |
//! |   - listener   -> accept, Server::open_connection   |
//! |   - streams    -> read,   Server::process_binary_.. |
//! |   - waker      -> stop / worker results ready       |
//! |                                                     |
//! |  after every wakeup:                                |
//! |   Server::run_jobs, then flush Server::take_outbound|
//! +-----------------------------------------------------+
//! ```

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token, Waker};

use crate::error::{Error, Result};
use crate::server::Server;

// ============================================================================
// Constants
// ============================================================================

const LISTENER_TOKEN: Token = Token(0);

const WAKER_TOKEN: Token = Token(1);

const CONNECTION_TOKEN_START: usize = 2;

/// Upper bound on one poll when no job is due sooner.
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

const MAX_EVENTS: usize = 128;

const READ_BUFFER_SIZE: usize = 64 * 1024;

// ============================================================================
// Stop handle
// ============================================================================

/// Stops a running [`TcpListenerLoop`] from another thread.
#[derive(Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        if let Err(e) = self.waker.wake() {
            log::warn!("[tcp] failed to wake listener loop: {}", e);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

// ============================================================================
// Listener loop
// ============================================================================

struct TcpConnection {
    stream: TcpStream,
    connection_id: u64,
    remote_addr: SocketAddr,
    send_queue: Vec<u8>,
    send_offset: usize,
}

impl TcpConnection {
    fn has_pending_writes(&self) -> bool {
        self.send_offset < self.send_queue.len()
    }

    /// Write as much of the queue as the socket takes.
    fn flush(&mut self) -> io::Result<()> {
        while self.has_pending_writes() {
            match self.stream.write(&self.send_queue[self.send_offset..]) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => self.send_offset += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        self.send_queue.clear();
        self.send_offset = 0;
        Ok(())
    }
}

/// Single-threaded `mio` event loop serving one [`Server`].
pub struct TcpListenerLoop {
    server: Server,
    poll: Poll,
    listener: TcpListener,
    waker: Arc<Waker>,
    running: Arc<AtomicBool>,
    connections: HashMap<Token, TcpConnection>,
    next_token: usize,
    read_buffer: Vec<u8>,
}

impl TcpListenerLoop {
    /// Bind to the server's configured address and port.
    pub fn bind(server: Server) -> Result<Self> {
        let config = server.config();
        let target = format!("{}:{}", config.bind_address, config.port);
        let addr = target
            .to_socket_addrs()
            .map_err(|e| Error::BindFailed(format!("{}: {}", target, e)))?
            .next()
            .ok_or_else(|| Error::BindFailed(format!("{}: no address", target)))?;
        Self::bind_addr(server, addr)
    }

    /// Bind to an explicit address (port 0 picks a free one).
    pub fn bind_addr(server: Server, addr: SocketAddr) -> Result<Self> {
        let poll = Poll::new()?;
        let mut listener =
            TcpListener::bind(addr).map_err(|e| Error::BindFailed(format!("{}: {}", addr, e)))?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER_TOKEN)?);

        let notify_waker = Arc::clone(&waker);
        server.set_worker_notify(Arc::new(move || {
            let _ = notify_waker.wake();
        }));

        log::info!("[tcp] listening on {}", listener.local_addr()?);
        Ok(Self {
            server,
            poll,
            listener,
            waker,
            running: Arc::new(AtomicBool::new(true)),
            connections: HashMap::new(),
            next_token: CONNECTION_TOKEN_START,
            read_buffer: vec![0; READ_BUFFER_SIZE],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
            waker: Arc::clone(&self.waker),
        }
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn server_mut(&mut self) -> &mut Server {
        &mut self.server
    }

    /// Run on a dedicated thread. The server is handed back when it stops.
    pub fn spawn(self) -> Result<(StopHandle, JoinHandle<Result<Server>>)> {
        let stop = self.stop_handle();
        let handle = thread::Builder::new()
            .name("opcua-tcp".to_string())
            .spawn(move || {
                let mut this = self;
                this.run()?;
                Ok(this.into_server())
            })?;
        Ok((stop, handle))
    }

    /// Close every connection and return the server.
    pub fn into_server(mut self) -> Server {
        let tokens: Vec<Token> = self.connections.keys().copied().collect();
        for token in tokens {
            self.close_connection(token, "listener stopped");
        }
        self.server
    }

    /// Serve until [`StopHandle::stop`] is called.
    pub fn run(&mut self) -> Result<()> {
        let mut events = Events::with_capacity(MAX_EVENTS);
        while self.running.load(Ordering::Acquire) {
            self.run_once(&mut events)?;
        }
        log::info!("[tcp] listener loop stopped");
        Ok(())
    }

    fn poll_timeout(&self) -> Duration {
        match self.server.next_job_deadline() {
            Some(deadline) => deadline
                .saturating_duration_since(Instant::now())
                .min(DEFAULT_POLL_TIMEOUT),
            None => DEFAULT_POLL_TIMEOUT,
        }
    }

    fn run_once(&mut self, events: &mut Events) -> Result<()> {
        let timeout = self.poll_timeout();
        if let Err(e) = self.poll.poll(events, Some(timeout)) {
            if e.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(e.into());
        }

        for event in events.iter() {
            match event.token() {
                LISTENER_TOKEN => self.handle_accept(),
                WAKER_TOKEN => self.server.poll_workers(),
                token => {
                    if event.is_readable() || event.is_read_closed() {
                        self.handle_readable(token);
                    }
                    if event.is_writable() {
                        self.handle_writable(token);
                    }
                }
            }
        }

        self.server.run_jobs(Instant::now());
        self.flush_all();
        Ok(())
    }

    fn handle_accept(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, remote_addr)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    if let Err(e) = self.poll.registry().register(
                        &mut stream,
                        token,
                        Interest::READABLE | Interest::WRITABLE,
                    ) {
                        log::warn!("[tcp] cannot register {}: {}", remote_addr, e);
                        continue;
                    }
                    let _ = stream.set_nodelay(true);
                    let connection_id = self.server.open_connection();
                    log::debug!(
                        "[tcp] accepted {} as connection {}",
                        remote_addr,
                        connection_id
                    );
                    self.connections.insert(
                        token,
                        TcpConnection {
                            stream,
                            connection_id,
                            remote_addr,
                            send_queue: Vec::new(),
                            send_offset: 0,
                        },
                    );
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    log::warn!("[tcp] accept failed: {}", e);
                    return;
                }
            }
        }
    }

    fn handle_readable(&mut self, token: Token) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };
        loop {
            match conn.stream.read(&mut self.read_buffer) {
                Ok(0) => {
                    self.close_connection(token, "closed by peer");
                    return;
                }
                Ok(n) => {
                    self.server
                        .process_binary_message(conn.connection_id, &self.read_buffer[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    let reason = format!("read error: {}", e);
                    self.close_connection(token, &reason);
                    return;
                }
            }
        }
    }

    fn handle_writable(&mut self, token: Token) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };
        if let Err(e) = conn.flush() {
            let reason = format!("write error: {}", e);
            self.close_connection(token, &reason);
        }
    }

    /// Move queued server output to the sockets and reap finished connections.
    fn flush_all(&mut self) {
        let mut finished = Vec::new();
        for (token, conn) in self.connections.iter_mut() {
            for chunk in self.server.take_outbound(conn.connection_id) {
                conn.send_queue.extend_from_slice(&chunk);
            }
            if let Err(e) = conn.flush() {
                finished.push((*token, format!("write error: {}", e)));
                continue;
            }
            if self.server.should_close(conn.connection_id) && !conn.has_pending_writes() {
                finished.push((*token, "closed by server".to_string()));
            }
        }
        for (token, reason) in finished {
            self.close_connection(token, &reason);
        }
    }

    fn close_connection(&mut self, token: Token, reason: &str) {
        let Some(mut conn) = self.connections.remove(&token) else {
            return;
        };
        let _ = self.poll.registry().deregister(&mut conn.stream);
        self.server.close_connection(conn.connection_id);
        log::debug!(
            "[tcp] connection {} ({}) closed: {}",
            conn.connection_id,
            conn.remote_addr,
            reason
        );
    }
}
