//! Listener ownership and connection acceptance
//!
//! Accepts viewer TCP connections either from a dedicated accept thread
//! or from explicit polls on the caller's own thread. Accepted streams
//! park in a pending queue until the server commits them at a frame
//! boundary, so a joiner never observes a half-built scene.

use crate::error::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, warn};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How accepted connections reach the pending queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorMode {
    /// Caller polls `monitor_connections()` itself
    Synchronous,
    /// A named background thread owns the accept loop
    Asynchronous,
}

pub struct ConnectionMonitor {
    mode: MonitorMode,
    local_addr: SocketAddr,
    // Present only in synchronous mode; the accept thread owns it otherwise.
    listener: Option<TcpListener>,
    pending_rx: Receiver<TcpStream>,
    pending_tx: Sender<TcpStream>,
    accept_thread: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl ConnectionMonitor {
    /// Bind `address` and start accepting in the requested mode
    pub fn start(address: &str, mode: MonitorMode) -> Result<Self> {
        let listener = TcpListener::bind(address)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        info!("listening for viewers on {}", local_addr);

        let (pending_tx, pending_rx) = unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));

        let (listener, accept_thread) = match mode {
            MonitorMode::Synchronous => (Some(listener), None),
            MonitorMode::Asynchronous => {
                let tx = pending_tx.clone();
                let shutdown = Arc::clone(&shutdown);
                let handle = thread::Builder::new()
                    .name("connection-monitor".to_string())
                    .spawn(move || Self::accept_loop(listener, tx, shutdown))?;
                (None, Some(handle))
            }
        };

        Ok(Self {
            mode,
            local_addr,
            listener,
            pending_rx,
            pending_tx,
            accept_thread,
            shutdown,
        })
    }

    /// Accept thread main loop - owns the TCP listener
    ///
    /// Polls the nonblocking listener with a short sleep instead of parking
    /// in a blocking `accept`. `stop` only has to flip the shutdown flag;
    /// the thread notices within one poll interval and `join` never needs
    /// to interrupt a blocked syscall.
    fn accept_loop(listener: TcpListener, tx: Sender<TcpStream>, shutdown: Arc<AtomicBool>) {
        while !shutdown.load(Ordering::Relaxed) {
            match listener.accept() {
                Ok((stream, addr)) => {
                    info!("new viewer connected: {}", addr);
                    if tx.send(stream).is_err() {
                        // Receiver gone, the server is shutting down.
                        break;
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(10));
                }
                Err(e) => {
                    error!("error accepting viewer connection: {}", e);
                    thread::sleep(Duration::from_millis(10));
                }
            }
        }
        debug!("accept loop exiting");
    }

    /// Poll the listener once (synchronous mode only)
    ///
    /// Drains every connection currently waiting in the OS backlog into
    /// the pending queue. A no-op in asynchronous mode.
    pub fn monitor_connections(&mut self) -> Result<usize> {
        let Some(listener) = self.listener.as_ref() else {
            return Ok(0);
        };
        let mut accepted = 0;
        loop {
            match listener.accept() {
                Ok((stream, addr)) => {
                    info!("new viewer connected: {}", addr);
                    if self.pending_tx.send(stream).is_err() {
                        break;
                    }
                    accepted += 1;
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("error accepting viewer connection: {}", e);
                    break;
                }
            }
        }
        Ok(accepted)
    }

    /// Take every pending connection for activation
    pub fn commit_connections(&mut self) -> Vec<TcpStream> {
        self.pending_rx.try_iter().collect()
    }

    /// Actual bound address (reports the assigned port when bound to 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn mode(&self) -> MonitorMode {
        self.mode
    }

    /// Request the accept thread to stop
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Stop and wait for the accept thread to finish
    pub fn join(&mut self) {
        self.stop();
        if let Some(thread) = self.accept_thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ConnectionMonitor {
    fn drop(&mut self) {
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpStream;

    #[test]
    fn test_synchronous_accept() {
        let mut monitor =
            ConnectionMonitor::start("127.0.0.1:0", MonitorMode::Synchronous).unwrap();
        let addr = monitor.local_addr();
        let _client = TcpStream::connect(addr).unwrap();

        // The backlog entry may take a moment to become visible.
        let mut accepted = 0;
        for _ in 0..100 {
            accepted += monitor.monitor_connections().unwrap();
            if accepted > 0 {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(accepted, 1);
        assert_eq!(monitor.commit_connections().len(), 1);
        assert!(monitor.commit_connections().is_empty());
    }

    #[test]
    fn test_asynchronous_accept_and_join() {
        let mut monitor =
            ConnectionMonitor::start("127.0.0.1:0", MonitorMode::Asynchronous).unwrap();
        let addr = monitor.local_addr();
        let _client = TcpStream::connect(addr).unwrap();

        let mut committed = Vec::new();
        for _ in 0..200 {
            committed.extend(monitor.commit_connections());
            if !committed.is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(committed.len(), 1);

        monitor.join();
        // monitor_connections is a no-op in asynchronous mode.
        assert_eq!(monitor.monitor_connections().unwrap(), 0);
    }
}
