//! Headless client that joins a relay server and behaves like a browser
//! client: it reports its state every 100ms while circling its spawn point
//! and slowly losing vitality.

use clap::Parser;
use env_logger::Env;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::{PeerInfo, ServerMessage, StateUpdate};
use std::time::Duration;
use tokio::time::interval;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// WebSocket URL of the relay server
    #[clap(short, long, default_value = "ws://127.0.0.1:8090")]
    url: String,
    /// Vitality lost per second
    #[clap(short, long, default_value = "0.5")]
    decay: f32,
    /// Radius of the circle flown around the spawn point
    #[clap(short, long, default_value = "150.0")]
    orbit: f32,
}

const REPORT_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let (ws_stream, _) = connect_async(args.url.as_str()).await?;
    info!("Connected to {}", args.url);
    let (mut write, mut read) = ws_stream.split();

    // Wait for the server to tell us who we are
    let me: PeerInfo = loop {
        match read.next().await {
            Some(Ok(Message::Binary(data))) => match ServerMessage::decode(&data) {
                Ok(ServerMessage::InitSelf(info)) => break info,
                Ok(other) => debug!("Before init: {:?}", other),
                Err(e) => warn!("Undecodable frame: {}", e),
            },
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
            None => return Err("server closed the connection before InitSelf".into()),
        }
    };
    info!(
        "Joined as {:?} (id {}) at ({:.1}, {:.1}) with vitality {}",
        me.name, me.id, me.x, me.y, me.vitality
    );

    let centre = me.position();
    let step = REPORT_INTERVAL.as_secs_f32();
    let mut vitality = me.vitality;
    let mut angle = 0.0f32;
    let mut ticker = interval(REPORT_INTERVAL);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                vitality -= args.decay * step;
                angle += step;
                let update = StateUpdate {
                    id: me.id,
                    vitality,
                    x: centre.x + args.orbit * (angle.cos() - 1.0),
                    y: centre.y + args.orbit * angle.sin(),
                };
                write.send(Message::binary(update.encode())).await?;
            }

            message = read.next() => match message {
                Some(Ok(Message::Binary(data))) => match ServerMessage::decode(&data) {
                    Ok(ServerMessage::PeerEaten(gained)) => {
                        vitality += gained;
                        info!("Ate a peer worth {}, vitality now {:.1}", gained, vitality);
                    }
                    Ok(ServerMessage::StateUpdate(state)) => debug!("Peer state: {:?}", state),
                    Ok(message) => info!("{:?}", message),
                    Err(e) => warn!("Undecodable frame: {}", e),
                },
                Some(Ok(Message::Close(_))) | None => {
                    info!("Connection closed by server");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    Ok(())
}
