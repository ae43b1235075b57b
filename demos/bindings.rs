//! Binding pipeline over in-memory text
//!
//! A binder records every "the <word>" as X1, X2, ...; a tee copies the
//! stream to a trace sink; a binding replacer resolves ${id} references
//! against the same table. Whether a forward reference resolves depends on
//! thread scheduling, so repeated runs may print different output.
//!
//! Usage: cargo run --example bindings

use std::sync::Arc;
use text_pipeline::{binder, binding_replacer, tee, BindingTable, Pipeline, Source, StringSink, StringSource};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let table = Arc::new(BindingTable::new());
    table.insert_if_absent("Z1", "dog");

    let input = "the boy threw the stick at the boy\n\
                 a ${X1} threw a ${X2} at a window\n\
                 the ${X1}'s ${Z1} chased the ${X2}\n";

    let mut reader = StringSource::new(input);
    let mut bind = binder("binder", "the ([A-Za-z0-9]+)", "X", Arc::clone(&table))?;
    let mut split = tee("tee");
    let mut replace = binding_replacer("replacer", Arc::clone(&table));
    let mut trace = StringSink::new().with_name("trace");
    let mut writer = StringSink::new().with_name("writer");

    reader.attach(&mut bind)?;
    bind.attach(&mut split)?;
    split.attach(&mut trace)?;
    split.attach(&mut replace)?;
    replace.attach(&mut writer)?;
    let trace_out = trace.output();
    let output = writer.output();

    Pipeline::new()
        .with(reader)
        .with(bind)
        .with(split)
        .with(replace)
        .with(trace)
        .with(writer)
        .start()?
        .wait()?;

    println!("input:\n{input}");
    println!("intermediate:\n{}", trace_out.contents());
    println!("output:\n{}", output.contents());
    println!("bindings[");
    for (id, value) in table.snapshot() {
        println!("{id} -> {value}");
    }
    println!("]");

    Ok(())
}
