//! Basic usage examples for value-map.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::json;
use value_map::{Blob, Key, SerializationError, SharedValueMap, ValueMap};

fn main() -> Result<(), SerializationError> {
    env_logger::init();

    example_value_map()?;
    example_instants()?;
    example_shared()?;
    Ok(())
}

fn example_value_map() -> Result<(), SerializationError> {
    println!("=== ValueMap ===\n");

    let mut map: ValueMap<&str> = ValueMap::new();
    map.set(json!({"neat": "cool", "number": 100}), "object")?
        .set(json!(["cat", "dog"]), "array")?
        .set(Blob(b"raw".to_vec()), "blob")?;

    // A different object with the same fields finds the same entry.
    let lookup = Key::from(json!({"number": 100, "neat": "cool"}));
    println!("object lookup = {:?}", map.get(&lookup)?);
    println!("reversed array = {:?}", map.get(&Key::from(json!(["dog", "cat"])))?);

    for (key, value) in &map {
        println!("{:>8} <- {}", value, map.fingerprint(key)?);
    }

    // Closures have no canonical form.
    match map.set(Key::custom(|| ()), "closure") {
        Err(e) => println!("rejected: {e}\n"),
        Ok(_) => unreachable!("closures are not valid keys"),
    }
    Ok(())
}

fn example_instants() -> Result<(), SerializationError> {
    println!("=== Instants ===\n");

    let when = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single();
    let mut map: ValueMap<u32> = ValueMap::new();
    map.set(when, 1)?;
    map.set("2024-05-01T12:00:00.000Z", 2)?;

    // Two entries: the instant and the look-alike string stay distinct.
    map.for_each(|value, key, _| {
        let kind = if key.as_instant().is_some() { "instant" } else { "string" };
        println!("{kind:>8}: {value}");
    });
    println!();
    Ok(())
}

fn example_shared() -> Result<(), SerializationError> {
    println!("=== SharedValueMap ===\n");

    let shared: Arc<SharedValueMap<usize>> = Arc::new(SharedValueMap::new());
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || shared.insert(json!({"worker": t}), t))
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked")?;
    }

    println!("Count: {}", shared.len());
    Ok(())
}
