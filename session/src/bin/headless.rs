//! Dedicated server: hosts a session without an attached game client.

use clap::Parser;
use log::info;
use session::{NetworkSession, SessionConfig, SessionError};
use shared::DEFAULT_PORT;
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// UDP port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Pack name advertised to server browsers
    #[arg(long, default_value = "")]
    pak: String,

    /// Pack version advertised alongside the pack name
    #[arg(long, default_value = "")]
    pak_version: String,

    /// Server display name advertised to server browsers
    #[arg(long, default_value = "Headless Server")]
    name: String,

    /// Update pump rate in ticks per second
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,
}

fn main() -> Result<(), SessionError> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = SessionConfig {
        server_name: args.name,
        ..SessionConfig::default()
    };
    let mut server = NetworkSession::with_config(config);
    server.set_on_player_joined(|id, name| info!("player {} (\"{}\") joined", id, name));
    server.set_on_player_left(|id| info!("player {} left", id));

    server.start_server(args.port)?;
    server.set_hosted_pak_name(&args.pak);
    server.set_hosted_pak_version(&args.pak_version);

    let tick = Duration::from_secs_f32(1.0 / args.tick_rate.max(1) as f32);
    loop {
        server.update();
        thread::sleep(tick);
    }
}
