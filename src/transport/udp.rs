// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP transport: fire-and-forget sink plus a two-task receiver.
//!
//! # Architecture
//!
//! ```text
//! reader thread: recv_from() (blocking) -> bounded crossbeam channel
//! consumer task: channel.recv_timeout() -> PacketSource::recv_packet()
//! ```
//!
//! The reader thread owns the socket and does nothing but block on
//! `recv_from` and push into the channel; the only state shared across
//! threads is the channel itself. Everything else — heap assembly,
//! item decoding — stays on the consumer's thread.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use socket2::{Domain, Protocol, Socket, Type};

use crate::error::{Error, Result};

use super::{PacketSink, PacketSource};

/// Default channel capacity between the reader thread and the consumer.
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// Sends packets as individual UDP datagrams. No acknowledgement, no
/// retransmission: a dropped datagram is a dropped packet.
pub struct UdpSink {
    socket: UdpSocket,
    dest: SocketAddr,
}

impl UdpSink {
    pub fn connect(dest: SocketAddr) -> Result<Self> {
        let domain = if dest.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
        let socket2 = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket2.set_reuse_address(true)?;
        let bind_addr: SocketAddr = if dest.is_ipv6() {
            "[::]:0".parse().unwrap()
        } else {
            "0.0.0.0:0".parse().unwrap()
        };
        socket2.bind(&bind_addr.into())?;
        let socket: UdpSocket = socket2.into();
        log::debug!("[udp] sink bound local={:?} dest={}", socket.local_addr(), dest);
        Ok(UdpSink { socket, dest })
    }
}

impl PacketSink for UdpSink {
    fn send(&mut self, packet: &[u8]) -> Result<()> {
        self.socket.send_to(packet, self.dest)?;
        Ok(())
    }
}

/// Receives packets over UDP via a dedicated reader thread feeding a
/// bounded queue. The consumer polls [`UdpSource::recv_packet`], which
/// never blocks the reader thread and never touches the socket.
pub struct UdpSource {
    local_addr: SocketAddr,
    rx: Receiver<Vec<u8>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    poll_timeout: Duration,
    stopped: bool,
}

impl UdpSource {
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        Self::bind_with_depth(addr, DEFAULT_QUEUE_DEPTH)
    }

    pub fn bind_with_depth(addr: SocketAddr, queue_depth: usize) -> Result<Self> {
        let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
        let socket2 = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket2.set_reuse_address(true)?;
        socket2.bind(&addr.into())?;
        let socket: UdpSocket = socket2.into();
        // recv_from must return periodically so the reader thread can
        // observe `running` going false after the socket is told to stop.
        socket.set_read_timeout(Some(Duration::from_millis(200)))?;
        let local_addr = socket.local_addr()?;
        log::debug!("[udp] source bound local={}", local_addr);

        let (tx, rx): (Sender<Vec<u8>>, Receiver<Vec<u8>>) = channel::bounded(queue_depth);
        let running = Arc::new(AtomicBool::new(true));
        let handle = spawn_reader(socket, tx, Arc::clone(&running));

        Ok(UdpSource {
            local_addr,
            rx,
            running,
            handle: Some(handle),
            poll_timeout: Duration::from_millis(200),
            stopped: false,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signals the reader thread to stop and waits for it to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for UdpSource {
    fn drop(&mut self) {
        self.stop();
    }
}

impl PacketSource for UdpSource {
    fn recv_packet(&mut self) -> Result<Option<Vec<u8>>> {
        if self.stopped {
            return Ok(None);
        }
        loop {
            if !self.running.load(Ordering::SeqCst) {
                match self.rx.try_recv() {
                    Ok(packet) => return Ok(Some(packet)),
                    Err(_) => {
                        self.stopped = true;
                        return Ok(None);
                    }
                }
            }
            match self.rx.recv_timeout(self.poll_timeout) {
                Ok(packet) => return Ok(Some(packet)),
                Err(channel::RecvTimeoutError::Timeout) => continue,
                Err(channel::RecvTimeoutError::Disconnected) => {
                    self.stopped = true;
                    return Ok(None);
                }
            }
        }
    }
}

fn spawn_reader(socket: UdpSocket, tx: Sender<Vec<u8>>, running: Arc<AtomicBool>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut buf = vec![0u8; 65536];
        while running.load(Ordering::SeqCst) {
            match socket.recv_from(&mut buf) {
                Ok((len, from)) => {
                    log::trace!("[udp] recv {} bytes from {}", len, from);
                    if tx.send(buf[..len].to_vec()).is_err() {
                        break;
                    }
                }
                Err(err)
                    if matches!(err.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) =>
                {
                    continue;
                }
                Err(err) => {
                    log::debug!("[udp] reader thread exiting: {}", Error::from(err));
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::packet::{pack_packet, ItemEntry};
    use crate::dialect::{reserved, Dialect};
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn sends_and_receives_one_packet_over_loopback() {
        let dialect = Dialect::default();
        let bind_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        let mut source = UdpSource::bind(bind_addr).unwrap();

        let mut sink = UdpSink::connect(source.local_addr()).unwrap();
        let packet = pack_packet(
            dialect,
            &[
                ItemEntry::immediate(reserved::HEAP_CNT, 1),
                ItemEntry::immediate(reserved::PAYLOAD_LENGTH, 1),
            ],
            &[42],
        );
        sink.send(&packet).unwrap();

        let received = source.recv_packet().unwrap();
        assert_eq!(received, Some(packet));
        source.stop();
    }
}
