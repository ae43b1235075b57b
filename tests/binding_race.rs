//! The binder and the binding-replacer run on separate threads. Line 2
//! references `${X4}`, which only line 3 binds, so the output of line 2
//! depends on which stage gets there first. Gates force each ordering.

mod common;

use common::{Gate, GateControl};
use std::sync::Arc;
use text_pipeline::{
    binder, binding_replacer, BindingTable, Pipeline, RunningPipeline, SinkOutput, Source,
    StringSink, StringSource,
};

const INPUT: &str = "the boy threw the stick for the dog to catch\n\
                     a ${X1} broke a ${X4} with a ${X2}\n\
                     the boy threw the stick at the window\n";

struct RaceRig {
    table: Arc<BindingTable>,
    binder: GateControl,
    replacer: GateControl,
    output: SinkOutput,
    running: RunningPipeline,
}

/// Binder held before line 3, replacer held before line 2
fn start_rig() -> RaceRig {
    common::init_tracing();
    let table = Arc::new(BindingTable::new());
    let (binder_gate, binder_control) = Gate::at_line(3);
    let (replacer_gate, replacer_control) = Gate::at_line(2);

    let mut source = StringSource::new(INPUT);
    let mut bind = binder("binder", "the ([A-Za-z]+)", "X", Arc::clone(&table))
        .unwrap()
        .with_hook(Arc::new(binder_gate));
    let mut replace = binding_replacer("replacer", Arc::clone(&table)).with_hook(Arc::new(replacer_gate));
    let mut sink = StringSink::new();
    source.attach(&mut bind).unwrap();
    bind.attach(&mut replace).unwrap();
    replace.attach(&mut sink).unwrap();
    let output = sink.output();

    let running = Pipeline::new()
        .with(source)
        .with(bind)
        .with(replace)
        .with(sink)
        .start()
        .unwrap();

    RaceRig {
        table,
        binder: binder_control,
        replacer: replacer_control,
        output,
        running,
    }
}

#[test]
fn test_binder_first_resolves_forward_reference() {
    let rig = start_rig();

    rig.binder.pass();
    assert_eq!(rig.table.lookup("X4").as_deref(), Some("window"));
    rig.replacer.pass();

    let report = rig.running.wait().unwrap();
    assert!(report.all_completed());
    assert_eq!(
        rig.output.contents(),
        "the boy threw the stick for the dog to catch\n\
         a boy broke a window with a stick\n\
         the boy threw the stick at the window\n"
    );
}

#[test]
fn test_replacer_first_leaves_reference_unresolved() {
    let rig = start_rig();

    rig.replacer.pass();
    assert_eq!(rig.table.lookup("X4"), None);
    rig.binder.pass();
    assert_eq!(rig.table.lookup("X4").as_deref(), Some("window"));

    let report = rig.running.wait().unwrap();
    assert!(report.all_completed());
    assert_eq!(
        rig.output.contents(),
        "the boy threw the stick for the dog to catch\n\
         a boy broke a ${X4} with a stick\n\
         the boy threw the stick at the window\n"
    );
}

#[test]
fn test_bindings_identical_in_both_orderings() {
    let first = start_rig();
    first.binder.pass();
    first.replacer.pass();
    first.running.wait().unwrap();

    let second = start_rig();
    second.replacer.pass();
    second.binder.pass();
    second.running.wait().unwrap();

    let expected = vec![
        ("X1".to_string(), "boy".to_string()),
        ("X2".to_string(), "stick".to_string()),
        ("X3".to_string(), "dog".to_string()),
        ("X4".to_string(), "window".to_string()),
    ];
    assert_eq!(first.table.snapshot(), expected);
    assert_eq!(second.table.snapshot(), expected);
}
