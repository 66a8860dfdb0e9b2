use clap::Parser;
use shared::Snapshot;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration, Instant};

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address to connect to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port
    #[clap(short, long, default_value = "8080")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let stream = TcpStream::connect((args.host.as_str(), args.port)).await?;
    println!("Connected to {}", stream.peer_addr()?);
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    // The server greets every connection with a snapshot of the world.
    if let Ok(Ok(Some(line))) = timeout(Duration::from_secs(2), lines.next_line()).await {
        print_snapshot("Joined", &line);
    }

    writer.write_all(b"move:0,0\n").await?;

    // Walk a small route and fire each projectile kind along the way.
    let script = [
        "move:1,0",
        "shoot:Rock,0,0",
        "move:0,1",
        "shoot:Paper,0,0",
        "move:-1,-1",
        "shoot:Scissors,0,0",
        "move:0,0",
    ];

    for command in script {
        writer.write_all(command.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        println!("Sent {}", command);

        // Watch the broadcasts for a moment and report the latest one.
        let deadline = Instant::now() + Duration::from_millis(400);
        let mut latest = None;
        while Instant::now() < deadline {
            match timeout(Duration::from_millis(50), lines.next_line()).await {
                Ok(Ok(Some(line))) => latest = Some(line),
                Ok(Ok(None)) => {
                    println!("Server closed the connection");
                    return Ok(());
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {}
            }
        }
        if let Some(line) = latest {
            print_snapshot("State", &line);
        }
    }

    println!("Test client finished");
    Ok(())
}

fn print_snapshot(prefix: &str, line: &str) {
    match Snapshot::parse(line) {
        Some(snapshot) => {
            println!(
                "{}: {} players, {} projectiles",
                prefix,
                snapshot.players.len(),
                snapshot.projectiles.len()
            );
            for player in &snapshot.players {
                println!(
                    "  Player {}{} at ({}, {})",
                    player.glyph, player.label, player.x, player.y
                );
            }
            for projectile in &snapshot.projectiles {
                println!(
                    "  Projectile {} at ({}, {})",
                    projectile.glyph, projectile.x, projectile.y
                );
            }
        }
        None => println!("{}: unparseable snapshot line: {}", prefix, line),
    }
}
