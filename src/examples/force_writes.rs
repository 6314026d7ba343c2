//! Force Write Example
//!
//! Shows last-write-wins updates: `force` looks up the current revision
//! right before each write, so callers never track `_rev` themselves.
//!
//! Run with: cargo run --example force_writes -- http://localhost:5984/example

use couchlet_rs::{Client, ClientError, Document, WriteOptions};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:5984/example".to_string());
    let client = Client::new(&url)?;
    client.ensure_db().await?;

    let mut counter = Document::new();
    counter.insert("hits", 0);

    for hit in 1..=3 {
        counter.insert("hits", hit);
        client.save(Some("counter"), &mut counter, WriteOptions::force()).await?;
        println!("✅ hits={} rev={}", hit, counter.rev().unwrap_or("?"));
    }

    // A stale revision without force is rejected by the service
    let mut stale = Document::new();
    stale.set_rev("1-stale");
    stale.insert("hits", -1);
    match client.save(Some("counter"), &mut stale, WriteOptions::default()).await {
        Err(e @ ClientError::Service { .. }) if e.is_conflict() => {
            println!("⚠️  Conflict as expected: {}", e)
        }
        Err(e) => return Err(e.into()),
        Ok(_) => println!("Unexpected success"),
    }

    client.delete("counter", None, WriteOptions::force()).await?;
    println!("🗑️  Deleted counter");

    Ok(())
}
