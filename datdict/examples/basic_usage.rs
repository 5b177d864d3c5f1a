//! Basic usage examples for datdict.

use datdict::{Dict, SharedDict, Traversal};
use tracing_subscriber::EnvFilter;

fn main() -> datdict::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    example_dict()?;
    example_nodes()?;
    example_persistence()?;
    example_shared()?;
    Ok(())
}

fn numbers() -> datdict::Result<Dict> {
    let mut d = Dict::new();
    d.set("nineteen", 19)?;
    d.set("twenty", 20)?;
    d.set("twenty one", 21)?;
    d.set("twenty two", 22)?;
    d.set("twenty three", 23)?;
    d.set("twenty four", 24)?;
    Ok(d)
}

fn show(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}

fn example_dict() -> datdict::Result<()> {
    println!("=== Dict ===\n");

    let mut d = numbers()?;
    println!("len = {}", d.len());
    for (k, v) in d.items() {
        println!("  {} = {}", show(&k), v);
    }

    println!("twenty four = {}", d.get("twenty four")?);
    d.remove("twenty four")?;
    match d.get("twenty four") {
        Ok(v) => println!("twenty four = {v}"),
        Err(e) => println!("twenty four: {e}"),
    }
    println!("get_or(twenty four, -1) = {}", d.get_or("twenty four", -1));

    println!("\nPrefixes of 'twenty t':");
    for (k, v) in d.find("twenty t") {
        println!("  {} = {}", show(&k), v);
    }
    println!();
    Ok(())
}

fn example_nodes() -> datdict::Result<()> {
    println!("=== Nodes ===\n");

    let d = numbers()?;
    if let Some(n) = d.get_node("twenty") {
        println!("{n:?} key={:?} value={:?}", n.key().map(|k| show(&k)), n.value());
        for child in n.find_nodes(b" t") {
            println!("  extends to {:?}", child.key().map(|k| show(&k)));
        }
    }

    match d.trie().root().traverse(b"twenty fix") {
        Traversal::Value(n, v) => println!("found {} = {v}", show(&n.path())),
        Traversal::NoValue(n) => println!("path {} has no value", show(&n.path())),
        Traversal::NoPath { node, consumed } => {
            println!("stopped at {:?} after {consumed} bytes", show(&node.path()))
        }
    }
    println!();
    Ok(())
}

fn example_persistence() -> datdict::Result<()> {
    println!("=== Persistence ===\n");

    let dir = std::env::temp_dir().join("datdict-example");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("test.dat");

    numbers()?.save(&path)?;

    let mut d2 = Dict::new();
    println!("setdefault(eighteen, 18) = {}", d2.setdefault("eighteen", 18)?);
    d2.load(&path)?;
    println!("after load: {} keys", d2.len());
    println!("setdefault(eighteen, 18) = {}", d2.setdefault("eighteen", 18)?);
    println!("now: {} keys\n", d2.len());

    std::fs::remove_file(&path)?;
    Ok(())
}

fn example_shared() -> datdict::Result<()> {
    println!("=== SharedDict ===\n");

    let shared = SharedDict::new(numbers()?);
    std::thread::scope(|s| {
        for t in 0..4 {
            let shared = &shared;
            s.spawn(move || {
                for _ in 0..100 {
                    let _ = shared.add(format!("hits{t}"), 1);
                }
            });
        }
    });
    let snap = shared.snapshot()?;
    for (k, v) in snap.trie().predict(b"hits") {
        println!("  {} = {}", show(&k), v);
    }
    Ok(())
}
