mod common;

use std::thread;
use text_pipeline::{
    pattern_replace, tee, ChannelReader, Pipeline, PipelineError, Result as PipelineResult, Sink,
    Source, StageState, StringSink, StringSource,
};

/// Sink that closes its input as soon as it is connected
struct Refusing;

impl Sink for Refusing {
    fn set_input(&mut self, input: ChannelReader) -> PipelineResult<()> {
        input.close();
        Ok(())
    }
}

/// Sink whose reader is handed to the test
#[derive(Default)]
struct Raw(Option<ChannelReader>);

impl Sink for Raw {
    fn set_input(&mut self, input: ChannelReader) -> PipelineResult<()> {
        if self.0.is_some() {
            return Err(PipelineError::AlreadyConnected("input"));
        }
        self.0 = Some(input);
        Ok(())
    }
}

#[test]
fn test_every_sink_gets_identical_lines() {
    common::init_tracing();
    let input = common::repeat_lines("fan me out", 50);

    let mut source = StringSource::new(input.clone());
    let mut fan = tee("tee").with_capacity(4);
    let mut sinks: Vec<StringSink> = (0..3)
        .map(|i| StringSink::new().with_name(format!("sink{i}")))
        .collect();
    source.attach(&mut fan).unwrap();
    for sink in &mut sinks {
        fan.attach(sink).unwrap();
    }
    assert_eq!(fan.output_count(), 3);
    let outputs: Vec<_> = sinks.iter().map(StringSink::output).collect();

    let mut pipeline = Pipeline::new().with(source).with(fan);
    for sink in sinks {
        pipeline.add(sink);
    }
    let report = pipeline.start().unwrap().wait().unwrap();

    assert!(report.all_completed());
    for output in outputs {
        assert_eq!(output.contents(), input);
    }
    assert_eq!(report.stage("tee").unwrap().metrics.lines_written, 150);
}

#[test]
fn test_failed_sink_does_not_stall_siblings() {
    common::init_tracing();
    let input = common::repeat_lines("still flowing", 20);

    let mut source = StringSource::new(input.clone());
    let mut fan = tee("tee");
    let mut first = StringSink::new();
    let mut second = StringSink::new();
    source.attach(&mut fan).unwrap();
    fan.attach(&mut first).unwrap();
    fan.attach(&mut Refusing).unwrap();
    fan.attach(&mut second).unwrap();
    let first_out = first.output();
    let second_out = second.output();

    let report = Pipeline::new()
        .with(source)
        .with(fan)
        .with(first)
        .with(second)
        .start()
        .unwrap()
        .wait()
        .unwrap();

    let tee_report = report.stage("tee").unwrap();
    assert_eq!(tee_report.state, StageState::Completed);
    assert_eq!(tee_report.metrics.write_failures, 1);
    assert_eq!(first_out.contents(), input);
    assert_eq!(second_out.contents(), input);
}

#[test]
fn test_sink_closing_midway_keeps_its_prefix() {
    common::init_tracing();
    let input = common::repeat_lines("numbered", 100);

    let mut source = StringSource::new(input.clone());
    let mut fan = tee("tee").with_capacity(8);
    let mut full = StringSink::new();
    let mut short = Raw::default();
    source.attach(&mut fan).unwrap();
    fan.attach(&mut short).unwrap();
    fan.attach(&mut full).unwrap();
    let full_out = full.output();

    let reader = short.0.take().unwrap();
    let short_reader = thread::spawn(move || {
        let mut received = String::new();
        let mut lines = 0;
        for c in reader.chars() {
            received.push(c);
            if c == '\n' {
                lines += 1;
                if lines == 10 {
                    break;
                }
            }
        }
        received
    });

    let report = Pipeline::new()
        .with(source)
        .with(fan)
        .with(full)
        .start()
        .unwrap()
        .wait()
        .unwrap();

    assert!(report.all_completed());
    assert_eq!(full_out.contents(), input);
    assert_eq!(short_reader.join().unwrap(), common::repeat_lines("numbered", 10));
    assert_eq!(report.stage("tee").unwrap().metrics.write_failures, 1);
}

#[test]
fn test_all_sinks_gone_fails_tee_and_closes_upstream() {
    common::init_tracing();
    let input = common::repeat_lines("nobody listens", 100);

    let mut source = StringSource::new(input).with_name("source").with_capacity(4);
    let mut fan = tee("tee");
    source.attach(&mut fan).unwrap();
    fan.attach(&mut Refusing).unwrap();
    fan.attach(&mut Refusing).unwrap();

    let report = Pipeline::new()
        .with(source)
        .with(fan)
        .start()
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(report.stage("tee").unwrap().state, StageState::Failed);
    assert_eq!(report.stage("source").unwrap().state, StageState::Failed);
}

#[test]
fn test_tee_between_transforms() {
    common::init_tracing();
    let mut source = StringSource::new("adinn wrote this\nandrew checked it\n");
    let mut login = pattern_replace("login", "adinn", "msmith").unwrap();
    let mut fan = tee("tee");
    let mut name = pattern_replace("name", "[Aa]ndrew", "Michael").unwrap();
    let mut trace = StringSink::new();
    let mut result = StringSink::new();
    source.attach(&mut login).unwrap();
    login.attach(&mut fan).unwrap();
    fan.attach(&mut trace).unwrap();
    fan.attach(&mut name).unwrap();
    name.attach(&mut result).unwrap();
    let trace_out = trace.output();
    let result_out = result.output();

    Pipeline::new()
        .with(source)
        .with(login)
        .with(fan)
        .with(name)
        .with(trace)
        .with(result)
        .start()
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(trace_out.contents(), "msmith wrote this\nandrew checked it\n");
    assert_eq!(result_out.contents(), "msmith wrote this\nMichael checked it\n");
}
