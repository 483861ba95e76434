//! Mock debuggee for integration testing
//!
//! Listens on a local socket, answers the connector handshake, reports
//! initialization, waits to be resumed and exits with a chosen code. This
//! lets the harness be exercised without a real debug target.

use std::time::Duration;

use attach_harness::connector::protocol::{ClientMessage, TargetMessage};
use attach_harness::connector::transport;
use clap::Parser;
use interprocess::local_socket::traits::tokio::Listener as ListenerTrait;

#[derive(Parser)]
#[command(name = "mock-debuggee", about = "Connector-speaking target for harness tests")]
struct Args {
    /// Endpoint to listen on
    #[arg(long)]
    address: String,

    /// Exit code after being resumed
    #[arg(long, default_value_t = 95)]
    exit_code: i32,

    /// Wait this long before listening
    #[arg(long, default_value_t = 0)]
    startup_delay_ms: u64,

    /// Never report initialization
    #[arg(long)]
    skip_init: bool,
}

async fn serve(args: &Args) -> std::io::Result<()> {
    if args.startup_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(args.startup_delay_ms)).await;
    }

    let listener = transport::create_listener(&args.address).await?;
    println!("listening at: {}", args.address);

    let stream = listener.accept().await?;
    let (mut reader, mut writer) = tokio::io::split(stream);

    match transport::recv_message::<_, ClientMessage>(&mut reader).await? {
        Ok(ClientMessage::Handshake { .. }) => {}
        other => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("expected handshake, got {:?}", other),
            ))
        }
    }

    let hello = TargetMessage::Handshake {
        name: "mock-debuggee".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Mock target for attach harness tests".to_string(),
    };
    transport::send_message(&mut writer, &hello).await?;
    transport::send_message(
        &mut writer,
        &TargetMessage::Output {
            text: format!("pid {}", std::process::id()),
        },
    )
    .await?;

    if !args.skip_init {
        transport::send_message(&mut writer, &TargetMessage::VmInit).await?;
    }

    loop {
        match transport::recv_message::<_, ClientMessage>(&mut reader).await? {
            Ok(ClientMessage::Resume) => break,
            Ok(ClientMessage::Dispose) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionAborted,
                    "disposed before resume",
                ))
            }
            Ok(ClientMessage::Handshake { .. }) | Err(_) => continue,
        }
    }

    println!("resumed, exiting with {}", args.exit_code);
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let result = serve(&args).await;
    let _ = attach_harness::common::paths::remove_endpoint(&args.address);

    match result {
        Ok(()) => std::process::exit(args.exit_code),
        Err(e) => {
            eprintln!("mock-debuggee: {e}");
            std::process::exit(1);
        }
    }
}
