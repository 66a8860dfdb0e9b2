//! TCP accept loop, per-connection handlers, and the fixed-tick driver

use crate::game::World;
use log::{debug, error, info, warn};
use shared::Command;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Largest delta time a single simulation step is allowed to see.
const MAX_DELTA_TIME: f32 = 1.0 / 20.0;

/// Authoritative arena server.
///
/// The accept loop, every connection handler, and the simulation tick run
/// as separate tasks sharing one locked [`World`]; a stalled client can
/// therefore never hold up the tick or another connection.
pub struct Server {
    listener: Arc<TcpListener>,
    world: Arc<RwLock<World>>,
    tick_duration: Duration,
    max_clients: usize,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_clients: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = Arc::new(TcpListener::bind(addr).await?);
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            world: Arc::new(RwLock::new(World::new())),
            tick_duration,
            max_clients,
        })
    }

    /// Address the listener actually bound to. Tests bind port 0 and need
    /// the assigned port back.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Spawns the task that accepts connections and hands each one to its
    /// own handler task.
    fn spawn_acceptor(&self) {
        let listener = Arc::clone(&self.listener);
        let world = Arc::clone(&self.world);
        let max_clients = self.max_clients;

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((socket, addr)) => {
                        let at_capacity = world.read().await.player_count() >= max_clients;
                        if at_capacity {
                            warn!("Rejecting connection from {}: server full", addr);
                            continue;
                        }

                        let world = Arc::clone(&world);
                        tokio::spawn(async move {
                            handle_connection(world, socket, addr).await;
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                    }
                }
            }
        });
    }

    /// Runs the server: the acceptor task plus the tick loop. Does not
    /// return under normal operation.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_acceptor();

        let mut ticker = interval(self.tick_duration);
        // A slow step skips forward; missed ticks are not replayed.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // The first tick completes immediately.
        ticker.tick().await;
        let mut last_tick = Instant::now();
        let mut tick: u64 = 0;

        info!("Server started successfully");

        loop {
            ticker.tick().await;

            let now = Instant::now();
            let mut dt = now.duration_since(last_tick).as_secs_f32();
            last_tick = now;

            if dt > MAX_DELTA_TIME {
                warn!(
                    "Large delta time detected ({:.3}s), capping to {:.3}s",
                    dt, MAX_DELTA_TIME
                );
                dt = MAX_DELTA_TIME;
            }

            self.step(dt).await;

            tick += 1;
            if tick % 60 == 0 {
                let world = self.world.read().await;
                debug!(
                    "Tick {}: {} players, {} projectiles, {:.1}Hz",
                    tick,
                    world.player_count(),
                    world.projectile_count(),
                    1.0 / dt
                );
            }
        }
    }

    /// One simulation step: advance the world under the write lock, then
    /// fan the snapshot line out without holding it.
    async fn step(&self, dt: f32) {
        let (line, recipients) = {
            let mut world = self.world.write().await;
            world.advance(dt);
            (world.snapshot().to_string(), world.outbound_channels())
        };

        for (id, outbound) in recipients {
            if outbound.send(line.clone()).is_err() {
                debug!("Skipping broadcast to gone player {}", id);
            }
        }
    }
}

/// Owns one client connection from accept to teardown.
///
/// Inbound lines become commands applied to the world; the outbound
/// channel carries snapshot lines queued by the broadcaster. Either side
/// failing tears down only this connection.
async fn handle_connection(world: Arc<RwLock<World>>, socket: TcpStream, addr: SocketAddr) {
    let (reader, mut writer) = socket.into_split();
    let mut lines = BufReader::new(reader).lines();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();

    let id = {
        let mut state = world.write().await;
        let id = state.add_player(outbound_tx.clone());
        // A late joiner sees the in-progress game before the next tick's
        // broadcast reaches it.
        let _ = outbound_tx.send(state.snapshot().to_string());
        id
    };
    info!("Client {} connected from {}", id, addr);

    // The world now holds the only sender; the channel closing below means
    // the simulation removed this player.
    drop(outbound_tx);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let commands = Command::parse_line(&line);
                        if !commands.is_empty() {
                            let mut state = world.write().await;
                            for command in commands {
                                state.apply_command(id, command);
                            }
                        }
                    }
                    Ok(None) => {
                        info!("Client {} disconnected", id);
                        break;
                    }
                    Err(e) => {
                        warn!("Read error from client {}: {}", id, e);
                        break;
                    }
                }
            }
            message = outbound_rx.recv() => {
                match message {
                    Some(mut line) => {
                        line.push('\n');
                        if let Err(e) = writer.write_all(line.as_bytes()).await {
                            warn!("Write error to client {}: {}", id, e);
                            break;
                        }
                    }
                    // Eliminated by the simulation; close the socket.
                    None => break,
                }
            }
        }
    }

    world.write().await.remove_player(id);
}
