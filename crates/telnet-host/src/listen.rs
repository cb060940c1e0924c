// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The acceptor and per-connection read loops. One OS thread per
//! connection, reading `\n`-delimited UTF-8 lines synchronously; every
//! reply goes back out through the session's sink with a trailing newline.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{info, warn};

use morel_common::SessionSink;
use morel_kernel::World;

use crate::config::Config;
use crate::ops::OpChannel;

/// Write half of a connection, shared between the session and the world.
struct TcpSink {
    stream: Mutex<TcpStream>,
}

impl SessionSink for TcpSink {
    fn send_line(&self, line: &str) -> io::Result<()> {
        let mut stream = self.stream.lock().expect("sink poisoned");
        stream.write_all(line.as_bytes())?;
        stream.write_all(b"\n")
    }

    fn shutdown_read(&self) {
        if let Ok(stream) = self.stream.lock() {
            let _ = stream.shutdown(Shutdown::Read);
        }
    }

    fn shutdown_write(&self) {
        if let Ok(stream) = self.stream.lock() {
            let _ = stream.shutdown(Shutdown::Write);
        }
    }
}

fn bind_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let domain = Domain::for_address(addr);
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(128)?;
    // the accept loop polls so it can notice the kill switch
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

/// Accept connections until the kill switch flips. Blocks the caller.
pub fn serve(world: World, config: Arc<Config>, kill: Arc<AtomicBool>) -> io::Result<()> {
    let address = if config.listen_address.is_empty() {
        "0.0.0.0".to_string()
    } else {
        config.listen_address.clone()
    };
    let addr: SocketAddr = format!("{}:{}", address, config.listen_port)
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let listener = bind_listener(addr)?;
    info!(%addr, "listening");

    while !kill.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                let world = world.clone();
                let config = config.clone();
                let kill = kill.clone();
                std::thread::Builder::new()
                    .name(format!("morel-conn-{peer}"))
                    .spawn(move || {
                        if let Err(e) = handle_connection(world, config, kill, stream, peer) {
                            warn!(%peer, "connection error: {e}");
                        }
                    })
                    .expect("Failed to spawn connection thread");
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn handle_connection(
    world: World,
    config: Arc<Config>,
    kill: Arc<AtomicBool>,
    stream: TcpStream,
    peer: SocketAddr,
) -> io::Result<()> {
    info!(%peer, "new client");
    // the listener is nonblocking for the kill switch; this stream is not
    stream.set_nonblocking(false)?;
    let reader = BufReader::new(stream.try_clone()?);
    let sink = Arc::new(TcpSink {
        stream: Mutex::new(stream),
    });

    // message of the day, or a plain greeting
    match std::fs::read_to_string(&config.motd_file) {
        Ok(motd) => {
            for line in motd.lines() {
                let _ = sink.send_line(line);
            }
        }
        Err(_) => {
            let _ = sink.send_line("Welcome!");
        }
    }

    let session = world.sessions.attach(sink, &peer.ip().to_string());
    let mut ops = OpChannel::new();

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(%peer, "read error: {e}");
                break;
            }
        };
        if !ops.handle(&world, &config, &session, &kill, &line) {
            session.handle_line(&world, &line);
        }
    }

    info!(%peer, "client disconnected");
    session.on_disconnect();
    world.sessions.detach(&session);
    if !session.is_silent() {
        world.sessions.broadcast(&format!("{} has quit.", session.name()));
    }
    Ok(())
}
