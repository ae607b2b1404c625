use clap::Parser;
use client::bot::{nearest_target, Bot};
use client::{Client, ClientError, ClientEvent};
use log::{error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{Snapshot, HEARTBEAT_INTERVAL_SECS};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:7777")]
    server: String,

    /// Display name sent with CONNECT
    #[arg(short, long)]
    name: Option<String>,

    /// Walking speed in units per second
    #[arg(long, default_value = "100")]
    speed: f32,

    /// Milliseconds between shots at the nearest target
    #[arg(long, default_value = "750")]
    shoot_interval_ms: u64,
}

/// Movement intent is refreshed this often.
const INPUT_INTERVAL: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    info!("Connecting to: {}", args.server);

    let mut client = Client::new(&args.server).await?;
    let mut bot = Bot::new(StdRng::from_entropy(), args.speed, 2.0);
    let mut latest: Option<Snapshot> = None;

    let mut input_timer = interval(INPUT_INTERVAL);
    let mut shoot_timer = interval(Duration::from_millis(args.shoot_interval_ms.max(1)));
    let mut heartbeat_timer = interval(Duration::from_secs_f32(HEARTBEAT_INTERVAL_SECS));
    for timer in [&mut input_timer, &mut shoot_timer, &mut heartbeat_timer] {
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    }

    loop {
        tokio::select! {
            event = client.recv() => {
                match event {
                    Ok(ClientEvent::Connected { .. }) => {}
                    Ok(ClientEvent::Snapshot { snapshot, .. }) => latest = Some(snapshot),
                    Ok(ClientEvent::Disconnected) => {
                        info!("Server closed the session");
                        break;
                    }
                    Err(e) => error!("Error receiving packet: {}", e),
                }
            },

            _ = input_timer.tick() => {
                if client.is_connected() {
                    let velocity = bot.wander(INPUT_INTERVAL.as_secs_f32());
                    if let Err(e) = client.send_input(velocity).await {
                        error!("Error sending input: {}", e);
                    }
                }
            },

            _ = shoot_timer.tick() => {
                let target = client
                    .player_id()
                    .zip(latest.as_ref())
                    .and_then(|(id, snapshot)| nearest_target(snapshot, id));
                if let Some(target) = target {
                    if let Err(e) = client.shoot(target).await {
                        error!("Error sending shot: {}", e);
                    }
                }
            },

            _ = heartbeat_timer.tick() => {
                // CONNECT doubles as a retry until the ack arrives.
                let result = if client.is_connected() {
                    client.heartbeat().await
                } else {
                    client.connect(None, args.name.clone()).await
                };
                if let Err(e) = result {
                    error!("Error sending keepalive: {}", e);
                }
            },

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, disconnecting...");
                if client.is_connected() {
                    client.disconnect().await?;
                }
                break;
            },
        }
    }

    Ok(())
}
