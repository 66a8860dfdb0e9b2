use clap::Parser;
use server::network::Server;
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Address to bind the listener to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// Port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Simulation rate (ticks per second)
    #[clap(short, long, default_value = "60")]
    tick_rate: u32,
    /// Maximum number of simultaneous clients
    #[clap(short, long, default_value = "32")]
    max_clients: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let address = format!("{}:{}", args.host, args.port);
    let tick_duration = Duration::from_secs_f32(1.0 / args.tick_rate as f32);

    let mut server = Server::new(&address, tick_duration, args.max_clients).await?;

    // Run until the process is told to stop.
    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            println!("Received Ctrl+C, shutting down gracefully...");
            Ok(())
        }
    }
}
