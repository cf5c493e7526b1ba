//! Fault injection: a UDP relay that drops selected datagrams between a
//! sender and a receiver.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio::net::UdpSocket;

use camlink_core::wire::Datagram;

/// Decides whether a datagram is forwarded. Sees every datagram in order.
pub type DropRule = Box<dyn FnMut(&Datagram<'_>) -> bool + Send>;

pub struct Relay {
    /// Where senders should aim.
    pub addr: SocketAddr,
    dropped: Arc<Mutex<u64>>,
}

impl Relay {
    pub fn dropped(&self) -> u64 {
        *self.dropped.lock().unwrap()
    }
}

/// Forward datagrams arriving at the relay to `target`, dropping those for
/// which `rule` returns true.
pub async fn relay(target: SocketAddr, mut rule: DropRule) -> Result<Relay> {
    let socket = UdpSocket::bind(crate::LOOPBACK).await?;
    let addr = socket.local_addr()?;
    let dropped = Arc::new(Mutex::new(0u64));
    let counter = dropped.clone();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 65_536];
        loop {
            let Ok((len, _)) = socket.recv_from(&mut buf).await else {
                return;
            };
            let discard = match Datagram::decode(&buf[..len]) {
                Ok(datagram) => rule(&datagram),
                Err(_) => false,
            };
            if discard {
                *counter.lock().unwrap() += 1;
                continue;
            }
            if socket.send_to(&buf[..len], target).await.is_err() {
                return;
            }
        }
    });

    Ok(Relay { addr, dropped })
}

/// Drop one specific fragment of one specific frame.
pub fn drop_fragment(frame_id: u32, index: u16) -> DropRule {
    Box::new(move |datagram| {
        matches!(datagram, Datagram::Fragment { header, .. }
            if header.frame_id() == frame_id && header.fragment_index() == index)
    })
}

/// Drop every fragment whose index is a multiple of `n`, for every frame.
pub fn drop_every_nth_fragment(n: u16) -> DropRule {
    Box::new(move |datagram| {
        matches!(datagram, Datagram::Fragment { header, .. } if header.fragment_index() % n == 0)
    })
}
