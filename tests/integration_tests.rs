//! Integration tests for the arena server and its wire protocol
//!
//! These tests validate cross-component interactions and real network
//! behavior: every client-server test below runs an actual server on an
//! ephemeral port and talks to it over TCP.

use server::network::Server;
use shared::{PlayerMarker, ProjectileMarker, Snapshot, ARENA_WIDTH};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};

/// WIRE PROTOCOL TESTS
mod protocol_tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{Command, ProjectileKind};

    /// Tests the snapshot line round-trip used by server broadcast and
    /// client rendering
    #[test]
    fn snapshot_line_round_trip() {
        let snapshot = Snapshot {
            players: vec![PlayerMarker {
                glyph: 'R',
                label: 1,
                x: 2.0,
                y: 3.0,
            }],
            projectiles: vec![ProjectileMarker {
                glyph: 'R',
                x: 5.0,
                y: 5.0,
            }],
        };

        let line = snapshot.to_string();
        assert_eq!(line, "R1,2,3;|R,5,5;");

        let parsed = Snapshot::parse(&line).expect("snapshot line should parse");
        assert_eq!(parsed.players.len(), 1);
        assert_eq!(parsed.players[0].label, 1);
        assert_approx_eq!(parsed.players[0].x, 2.0, 0.0001);
        assert_approx_eq!(parsed.players[0].y, 3.0, 0.0001);
        assert_eq!(parsed.projectiles.len(), 1);
        assert_eq!(parsed.projectiles[0].glyph, 'R');
    }

    /// Tests that a full command line parses the way handlers consume it
    #[test]
    fn command_line_grammar() {
        let commands = Command::parse_line("move:0.5,-1 shoot:Scissors,7,7");
        assert_eq!(commands.len(), 2);

        match commands[0] {
            Command::Move(v) => {
                assert_approx_eq!(v.x, 0.5, 0.0001);
                assert_approx_eq!(v.y, -1.0, 0.0001);
            }
            _ => panic!("Expected a move command"),
        }
        match commands[1] {
            Command::Shoot(kind) => assert_eq!(kind, ProjectileKind::Scissors),
            _ => panic!("Expected a shoot command"),
        }
    }
}

/// CLIENT-SERVER TESTS
mod client_server_tests {
    use super::*;

    /// Tests that a connection is greeted with a snapshot before any tick
    /// broadcast, and that a late joiner sees the in-progress game
    #[tokio::test]
    async fn initial_snapshot_on_connect() {
        let addr = start_server().await;

        let mut first = TestClient::connect(addr).await;
        let greeting = first.next_snapshot().await;
        assert_eq!(greeting.players.len(), 1);
        assert_eq!(greeting.players[0].label, 1);
        assert_eq!(greeting.players[0].x, 0.0);
        assert_eq!(greeting.players[0].y, 0.0);

        // Move the first player away from the origin before anyone joins.
        first.send("move:1,0").await;
        first
            .wait_for(|s| s.players.first().map_or(false, |p| p.x > 1.0))
            .await;

        let mut second = TestClient::connect(addr).await;
        let greeting = second.next_snapshot().await;
        assert_eq!(greeting.players.len(), 2);
        assert!(greeting.players.iter().any(|p| p.label == 1 && p.x > 0.0));
        assert!(greeting.players.iter().any(|p| p.label == 2 && p.x == 0.0));
    }

    /// Tests that movement commands replace velocity rather than
    /// accumulate
    #[tokio::test]
    async fn movement_replaces_velocity() {
        let addr = start_server().await;
        let mut client = TestClient::connect(addr).await;
        client.next_snapshot().await;

        client.send("move:1,0").await;
        let moving = client
            .wait_for(|s| s.players.first().map_or(false, |p| p.x > 1.0))
            .await;
        let mut prev = moving.players[0].x;

        client.send("move:0,0").await;

        // Once the stop is applied the position freezes entirely.
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut stable = 0;
        while stable < 3 {
            assert!(
                Instant::now() < deadline,
                "player never came to rest after move:0,0"
            );
            let snapshot = client.next_snapshot().await;
            let x = snapshot.players[0].x;
            if x == prev {
                stable += 1;
            } else {
                stable = 0;
                prev = x;
            }
        }

        assert!(prev > 1.0);
        assert!(prev < ARENA_WIDTH, "player should have stopped mid-arena");
    }

    /// Tests elimination end to end: a projectile fired on top of another
    /// player removes the player and is itself consumed
    #[tokio::test]
    async fn projectile_eliminates_player() {
        let addr = start_server().await;

        let mut shooter = TestClient::connect(addr).await;
        shooter.next_snapshot().await;
        let victim = TestClient::connect(addr).await;
        shooter.wait_for(|s| s.players.len() == 2).await;

        // No prior movement, so the projectile sits at the shared spawn
        // point and the other player is inside the hit radius.
        shooter.send("shoot:Rock,0,0").await;

        let after = shooter.wait_for(|s| s.players.len() == 1).await;
        assert_eq!(after.players[0].label, 1);
        assert!(
            after.projectiles.is_empty(),
            "the projectile should be consumed by the hit"
        );

        // The eliminated client gets its socket closed, not more state.
        victim.expect_disconnect().await;
    }

    /// Tests that one client disconnecting leaves the rest of the game
    /// untouched
    #[tokio::test]
    async fn disconnect_is_isolated() {
        let addr = start_server().await;

        let mut stayer = TestClient::connect(addr).await;
        stayer.next_snapshot().await;
        let leaver = TestClient::connect(addr).await;
        stayer.wait_for(|s| s.players.len() == 2).await;

        drop(leaver);

        let after = stayer.wait_for(|s| s.players.len() == 1).await;
        assert_eq!(after.players[0].label, 1);

        // The simulation keeps ticking and broadcasting afterwards.
        for _ in 0..5 {
            let snapshot = stayer.next_snapshot().await;
            assert_eq!(snapshot.players.len(), 1);
            assert_eq!(snapshot.players[0].label, 1);
        }
    }

    /// Tests that malformed commands are ignored without dropping the
    /// connection
    #[tokio::test]
    async fn malformed_commands_are_ignored() {
        let addr = start_server().await;
        let mut client = TestClient::connect(addr).await;
        client.next_snapshot().await;

        client
            .send("fly:1,2 move:abc,def shoot:rock,0,0 shoot:Rock,nope,1")
            .await;

        // The connection is still live and a valid command still works.
        client.send("move:1,0").await;
        let snapshot = client
            .wait_for(|s| s.players.first().map_or(false, |p| p.x > 0.5))
            .await;
        assert_eq!(snapshot.players.len(), 1);
        assert!(
            snapshot.projectiles.is_empty(),
            "no malformed shoot should have spawned a projectile"
        );
    }

    /// Tests the client capacity limit at accept time
    #[tokio::test]
    async fn server_full_drops_new_connections() {
        let mut server = Server::new("127.0.0.1:0", Duration::from_millis(16), 1)
            .await
            .expect("Failed to start server");
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let mut admitted = TestClient::connect(addr).await;
        admitted.next_snapshot().await;

        let rejected = TestClient::connect(addr).await;
        rejected.expect_disconnect().await;

        // The admitted client is unaffected.
        let snapshot = admitted.next_snapshot().await;
        assert_eq!(snapshot.players.len(), 1);
    }
}

// HELPER FUNCTIONS

/// Starts a server on an ephemeral port and leaves it running in the
/// background for the duration of the test.
async fn start_server() -> SocketAddr {
    let mut server = Server::new("127.0.0.1:0", Duration::from_millis(16), 32)
        .await
        .expect("Failed to start server");
    let addr = server.local_addr().expect("Failed to read listener address");

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    addr
}

/// A minimal line-protocol client for exercising the server.
struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> TestClient {
        let stream = timeout(Duration::from_secs(2), TcpStream::connect(addr))
            .await
            .expect("timed out connecting")
            .expect("Failed to connect");
        let (reader, writer) = stream.into_split();

        TestClient {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(line.as_bytes())
            .await
            .expect("Failed to send command");
        self.writer
            .write_all(b"\n")
            .await
            .expect("Failed to send command");
    }

    async fn next_snapshot(&mut self) -> Snapshot {
        let line = timeout(Duration::from_secs(2), self.lines.next_line())
            .await
            .expect("timed out waiting for a snapshot")
            .expect("Failed to read from server")
            .expect("Server closed the connection unexpectedly");

        Snapshot::parse(&line).unwrap_or_else(|| panic!("Unparseable snapshot line: {}", line))
    }

    /// Reads broadcasts until one satisfies the predicate.
    async fn wait_for(&mut self, mut predicate: impl FnMut(&Snapshot) -> bool) -> Snapshot {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            assert!(
                Instant::now() < deadline,
                "server never broadcast the expected state"
            );
            let snapshot = self.next_snapshot().await;
            if predicate(&snapshot) {
                return snapshot;
            }
        }
    }

    /// Consumes the connection, asserting the server closes it.
    async fn expect_disconnect(mut self) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            assert!(
                Instant::now() < deadline,
                "server never closed the connection"
            );
            match timeout(Duration::from_secs(5), self.lines.next_line()).await {
                Ok(Ok(Some(_))) => continue,
                Ok(Ok(None)) | Ok(Err(_)) => return,
                Err(_) => panic!("timed out waiting for the server to close the connection"),
            }
        }
    }
}
