// src/transport/session.rs
//
// Receive side of an OD4 session: UDP multicast on 225.0.0.<cid>, one
// envelope per datagram, handlers registered per data type.

use super::envelope::{decode_datagram, Envelope};
use crate::run_flag::RunFlag;
use anyhow::{bail, Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

pub const OD4_PORT: u16 = 12175;
const MAX_DATAGRAM: usize = 65_535;
const RECV_POLL: Duration = Duration::from_millis(200);

type Handler = Box<dyn Fn(Envelope) + Send + Sync>;

pub fn multicast_group(cid: u16) -> Result<Ipv4Addr> {
    if cid == 0 || cid > 254 {
        bail!("session id must be in 1..=254, got {}", cid);
    }
    Ok(Ipv4Addr::new(225, 0, 0, cid as u8))
}

fn shared_multicast_socket(group: Ipv4Addr, port: u16) -> Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .context("creating UDP socket")?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    socket
        .bind(&addr.into())
        .with_context(|| format!("binding UDP port {}", port))?;
    socket
        .join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)
        .with_context(|| format!("joining multicast group {}", group))?;
    Ok(socket)
}

pub struct Od4Session {
    cid: u16,
    socket: UdpSocket,
    triggers: HashMap<i32, Handler>,
}

impl Od4Session {
    /// Join the multicast group for `cid` on `port`. The port is shared
    /// with every other participant of the session on this host.
    pub async fn join(cid: u16, port: u16) -> Result<Self> {
        let group = multicast_group(cid)?;
        let socket = shared_multicast_socket(group, port)?;
        let socket = UdpSocket::from_std(socket.into())
            .context("registering multicast socket with the runtime")?;

        info!("Joined OD4 session {} ({}:{})", cid, group, port);
        Ok(Self {
            cid,
            socket,
            triggers: HashMap::new(),
        })
    }

    /// Listen on a plain unicast address, no group membership.
    pub async fn bind(cid: u16, addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .with_context(|| format!("binding {}", addr))?;
        Ok(Self {
            cid,
            socket,
            triggers: HashMap::new(),
        })
    }

    pub fn cid(&self) -> u16 {
        self.cid
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Call `handler` for every envelope of `data_type`. A later
    /// registration for the same type replaces the earlier one.
    pub fn data_trigger<F>(&mut self, data_type: i32, handler: F)
    where
        F: Fn(Envelope) + Send + Sync + 'static,
    {
        self.triggers.insert(data_type, Box::new(handler));
    }

    /// Decode one datagram and hand it to its handler. Returns whether a
    /// handler ran.
    pub fn dispatch(&self, datagram: &[u8]) -> bool {
        let envelope = match decode_datagram(datagram) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!("Dropping malformed datagram: {:#}", e);
                return false;
            }
        };

        match self.triggers.get(&envelope.data_type) {
            Some(handler) => {
                handler(envelope);
                true
            }
            None => false,
        }
    }

    /// Receive until `running` is cleared.
    pub async fn run(self, running: RunFlag) -> Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let mut dispatched: u64 = 0;

        while running.is_running() {
            match tokio::time::timeout(RECV_POLL, self.socket.recv_from(&mut buf)).await {
                Err(_) => continue,
                Ok(Ok((len, _from))) => {
                    if self.dispatch(&buf[..len]) {
                        dispatched += 1;
                    }
                }
                Ok(Err(e)) => {
                    warn!("OD4 session {} receive failed: {}", self.cid, e);
                    return Err(e).context("receiving from OD4 session");
                }
            }
        }

        info!(
            "OD4 session {} stopped after {} dispatched message(s)",
            self.cid, dispatched
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::envelope::tests::{envelope_datagram, steering_datagram};
    use crate::transport::envelope::{GroundSteeringRequest, TimeStamp};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_multicast_group_from_cid() {
        assert_eq!(multicast_group(253).unwrap(), Ipv4Addr::new(225, 0, 0, 253));
        assert!(multicast_group(0).is_err());
        assert!(multicast_group(255).is_err());
    }

    #[tokio::test]
    async fn test_two_participants_share_session_port() {
        let first = Od4Session::join(253, 42_175).await.unwrap();
        let second = Od4Session::join(253, 42_175).await.unwrap();
        assert_eq!(first.local_addr().unwrap().port(), 42_175);
        assert_eq!(second.local_addr().unwrap().port(), 42_175);
        assert_eq!(first.cid(), second.cid());
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_data_type() {
        let mut session = Od4Session::bind(111, "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        session.data_trigger(GroundSteeringRequest::ID, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(session.dispatch(&steering_datagram(0.1, TimeStamp::default())));
        assert!(!session.dispatch(&envelope_datagram(19, &[], TimeStamp::default())));
        assert!(!session.dispatch(&[0x00, 0x01, 0x02]));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_receives_until_stopped() {
        let mut session = Od4Session::bind(111, "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = session.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        session.data_trigger(GroundSteeringRequest::ID, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let running = RunFlag::new();
        let task = tokio::spawn(session.run(running.clone()));

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(&steering_datagram(0.2, TimeStamp::default()), addr)
            .await
            .unwrap();

        for _ in 0..100 {
            if hits.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        running.stop();
        task.await.unwrap().unwrap();
    }
}
