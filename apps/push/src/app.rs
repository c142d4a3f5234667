//! Push workflow: connect, submit every file, report the outcomes.

use gantry_client::WsClient;
use gantry_uploader::{ManagerConfig, UploadEvent, UploadManager};

use crate::bridge::ClientBridge;
use crate::cli::Cli;
use crate::format::{format_bytes, format_speed};

/// Uploads every file named on the command line.
///
/// Returns the number of transfers that did not complete.
pub(crate) async fn run(cli: Cli) -> anyhow::Result<usize> {
    let client = WsClient::connect(&cli.gateway).await?;
    tracing::info!(gateway = %cli.gateway, "connected");

    let config = ManagerConfig {
        queue_capacity: cli.files.len().max(1),
    };
    let mut manager = UploadManager::new(ClientBridge::new(client), config);

    let mut events = manager
        .take_events()
        .ok_or_else(|| anyhow::anyhow!("event stream already taken"))?;
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
        }
    });

    let mut failed = 0usize;
    let mut tickets = Vec::new();
    for path in &cli.files {
        match manager.submit(path).await {
            Ok(ticket) => {
                let d = &ticket.descriptor;
                println!(
                    "[{}] {} queued ({}, {} chunks)",
                    short(&d.hash),
                    d.name,
                    format_bytes(d.total_size),
                    d.chunk_count,
                );
                tickets.push(ticket);
            }
            Err(e) => {
                eprintln!("Error: {e} ({})", path.display());
                failed += 1;
            }
        }
    }

    for ticket in tickets {
        if ticket.wait().await.is_err() {
            failed += 1;
        }
    }

    manager.shutdown().await;
    drop(manager);
    let _ = printer.await;

    Ok(failed)
}

fn print_event(event: &UploadEvent) {
    match event {
        // The submit loop prints its own queue line.
        UploadEvent::Queued { .. } => {}
        UploadEvent::Progress {
            hash,
            completed,
            total,
            fraction,
            bytes_per_second,
        } => {
            println!(
                "[{}] {completed}/{total} chunks ({:.1}%, {})",
                short(hash),
                fraction * 100.0,
                format_speed(*bytes_per_second),
            );
        }
        UploadEvent::Merging { hash } => {
            println!("[{}] merging", short(hash));
        }
        UploadEvent::Completed {
            descriptor,
            artifact,
        } => match artifact {
            Some(name) => println!(
                "[{}] {} uploaded as {name}",
                short(&descriptor.hash),
                descriptor.name,
            ),
            None => println!(
                "[{}] {} already on gateway",
                short(&descriptor.hash),
                descriptor.name,
            ),
        },
        UploadEvent::Failed { hash, error } => {
            println!("[{}] failed: {error}", short(hash));
        }
    }
}

fn short(hash: &str) -> &str {
    &hash[..hash.len().min(8)]
}
