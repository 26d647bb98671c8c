//! Plurality Demo Application
//!
//! Three people name each other over a shared in-memory log:
//! - Point queries from different viewers
//! - A live stream of the resolved name while new assertions arrive
//! - Retractions falling back to the next most recent name

use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Value};

use plurality_core::FeedId;
use plurality_index::{init_tracing, IndexConfig, SocialIndex};
use plurality_source::MemoryLog;

fn about(dest: &FeedId, fields: Value) -> Value {
    let mut content = json!({ "type": "about", "about": dest.as_str() });
    if let (Some(content), Value::Object(fields)) = (content.as_object_mut(), fields) {
        content.extend(fields);
    }
    content
}

fn show(value: &Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "(none)".to_owned(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("info");

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║           Plurality Demo - Social Names                    ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();

    let alice = FeedId::from_public_key(&[1u8; 32]);
    let bob = FeedId::from_public_key(&[2u8; 32]);
    let carol = FeedId::from_public_key(&[3u8; 32]);

    let log = MemoryLog::new();
    log.append(&alice, about(&alice, json!({ "name": "Alice" })))?;
    log.append(&bob, about(&alice, json!({ "name": "Alicia" })))?;
    log.append(&carol, about(&alice, json!({ "name": "Al", "description": "knows rust" })))?;

    let as_carol = SocialIndex::new(IndexConfig::default(), carol.clone(), log.clone())?;
    let as_dave = SocialIndex::new(
        IndexConfig::default(),
        FeedId::from_public_key(&[4u8; 32]),
        log.clone(),
    )?;

    println!("Manifest: {}", serde_json::to_string(&as_dave.manifest())?);
    println!();

    println!("Everyone's name for {alice}:");
    for (author, value) in &as_dave.social_values("name", alice.as_str()).await? {
        println!("  {author:?} says {value}");
    }
    println!();

    let carol_sees = as_carol.social_value("name", alice.as_str()).await?;
    let dave_sees = as_dave.social_value("name", alice.as_str()).await?;
    println!("Carol sees: {}", show(&carol_sees));
    println!("Dave sees:  {}", show(&dave_sees));

    let latest = as_dave
        .latest_values(&["name", "description"], alice.as_str())
        .await?;
    println!("Latest: {}", serde_json::to_string(&latest)?);
    println!();

    println!("Following Dave's view of Bob's name live...");
    let mut names = as_dave.social_value_stream("name", bob.as_str());
    println!("  now: {}", show(&names.next().await.transpose()?.flatten()));

    let writer = {
        let log = log.clone();
        let (alice, bob, carol) = (alice.clone(), bob.clone(), carol.clone());
        tokio::spawn(async move {
            let script = [
                (&alice, json!({ "name": "Bobby" })),
                (&carol, json!({ "name": "Robert" })),
                (&carol, json!({ "name": "Bobby" })),
                (&bob, json!({ "name": "Bob" })),
                (&bob, json!({ "name": { "remove": true } })),
            ];
            for (author, fields) in script {
                tokio::time::sleep(Duration::from_millis(50)).await;
                if let Err(err) = log.append(author, about(&bob, fields)) {
                    tracing::warn!(error = %err, "append failed");
                    return;
                }
            }
        })
    };

    for _ in 0..5 {
        match names.next().await {
            Some(Ok(value)) => println!("  now: {}", show(&value)),
            Some(Err(err)) => return Err(err.into()),
            None => break,
        }
    }

    writer.await?;
    drop(names);
    println!();
    println!("Live subscriptions left: {}", log.subscriber_count());

    Ok(())
}
