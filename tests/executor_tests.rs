mod common;

use std::time::{Duration, Instant};

use common::{compile_text, fast_config, FakeModule};
use torso::binding::Binding;
use torso::config::RunConfig;
use torso::executor::StepExecutor;
use torso::interrupt::InterruptFlag;
use torso::TorsoError;

#[test]
fn repeat_stops_at_first_failure() {
    let fake = FakeModule::new().results("1__C__I__A", &[0, 1, 1, 1]);
    let binding = Binding::attach(fake.boxed()).unwrap();
    let mut steps = compile_text("1__C__I__A,,3\n");
    let config = fast_config();

    let outcome = StepExecutor::new(&config)
        .execute(&mut steps[0], binding.table().unwrap())
        .unwrap();

    assert!(!outcome.passed);
    assert!(outcome.fault.is_none());
    assert_eq!(steps[0].attempts, 1);
    assert_eq!(fake.count("execute"), 1);
    assert_eq!(fake.count("release"), 1);
}

#[test]
fn every_repetition_runs_and_releases_when_passing() {
    let fake = FakeModule::new();
    let binding = Binding::attach(fake.boxed()).unwrap();
    let mut steps = compile_text("1__Core__I__A,,2\n");
    let config = fast_config();

    let outcome = StepExecutor::new(&config)
        .execute(&mut steps[0], binding.table().unwrap())
        .unwrap();

    assert!(outcome.passed);
    assert!(steps[0].passed);
    assert_eq!(steps[0].attempts, 3);
    assert_eq!(fake.count("execute 1__Core__I__A"), 3);
    assert_eq!(fake.count("release Core"), 3);
}

#[test]
fn unknown_test_fails_the_step_without_executing() {
    let fake = FakeModule::new().unknown("1__C__I__Missing");
    let binding = Binding::attach(fake.boxed()).unwrap();
    let mut steps = compile_text("1__C__I__Missing,\n");
    let config = fast_config();

    let outcome = StepExecutor::new(&config)
        .execute(&mut steps[0], binding.table().unwrap())
        .unwrap();

    assert!(!outcome.passed);
    assert!(matches!(outcome.fault, Some(TorsoError::UnknownTest { .. })));
    assert_eq!(fake.count("get_handler"), 0);
    assert_eq!(fake.count("execute"), 0);
}

#[test]
fn null_handler_is_not_executable() {
    let fake = FakeModule::new().null_handler("Ghost");
    let binding = Binding::attach(fake.boxed()).unwrap();
    let mut steps = compile_text("1__Ghost__I__A,\n");
    let config = fast_config();

    let outcome = StepExecutor::new(&config)
        .execute(&mut steps[0], binding.table().unwrap())
        .unwrap();

    assert!(matches!(outcome.fault, Some(TorsoError::NotExecutable { .. })));
    assert_eq!(fake.count("execute"), 0);
}

#[test]
fn refused_handler_is_not_executable() {
    let fake = FakeModule::new().refuse("1__C__I__A");
    let binding = Binding::attach(fake.boxed()).unwrap();
    let mut steps = compile_text("1__C__I__A,\n");
    let config = fast_config();

    let outcome = StepExecutor::new(&config)
        .execute(&mut steps[0], binding.table().unwrap())
        .unwrap();

    assert!(matches!(outcome.fault, Some(TorsoError::NotExecutable { .. })));
}

#[test]
fn long_running_step_uses_the_polled_path() {
    let fake = FakeModule::new().results("1__C__I__SaveTillDone", &[5]);
    let binding = Binding::attach(fake.boxed()).unwrap();
    let mut steps = compile_text("1__C__I__SaveTillDone,\n");
    let config = fast_config();

    let outcome = StepExecutor::new(&config)
        .execute(&mut steps[0], binding.table().unwrap())
        .unwrap();

    assert!(outcome.passed);
    assert_eq!(fake.count("start 1__C__I__SaveTillDone"), 1);
    assert_eq!(fake.count("execute"), 0);
}

#[test]
fn long_running_step_times_out() {
    let fake = FakeModule::new().hang_async();
    let binding = Binding::attach(fake.boxed()).unwrap();
    let mut steps = compile_text("1__C__I__SaveTillDone,\n");
    let config = RunConfig {
        timeout_secs: 1,
        poll_interval_ms: 50,
        ..fast_config()
    };

    let started = Instant::now();
    let outcome = StepExecutor::new(&config)
        .execute(&mut steps[0], binding.table().unwrap())
        .unwrap();
    let waited = started.elapsed();

    assert!(!outcome.passed);
    assert!(matches!(outcome.fault, Some(TorsoError::Timeout { .. })));
    assert!(waited >= Duration::from_secs(1));
    assert!(waited < Duration::from_secs(5), "waited {:?}", waited);
    assert_eq!(fake.count("release"), 1);
}

#[test]
fn raised_interrupt_is_fatal() {
    let fake = FakeModule::new();
    let binding = Binding::attach(fake.boxed()).unwrap();
    let mut steps = compile_text("1__C__I__A,\n");
    let config = fast_config();
    let interrupt = InterruptFlag::new();
    interrupt.raise();

    let err = StepExecutor::new(&config)
        .with_interrupt(interrupt)
        .execute(&mut steps[0], binding.table().unwrap())
        .unwrap_err();

    assert!(matches!(err, TorsoError::Interrupted { .. }));
    assert_eq!(fake.count("execute"), 0);
    assert_eq!(fake.count("get_handler"), fake.count("release"));
}

#[test]
fn config_path_is_passed_through() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = common::write_file(dir.path(), "a.xml", "<cfg/>");
    let fake = FakeModule::new();
    let binding = Binding::attach(fake.boxed()).unwrap();
    let mut steps = compile_text(&format!("1__C__I__A,{}\n", cfg.display()));
    let config = fast_config();

    StepExecutor::new(&config)
        .execute(&mut steps[0], binding.table().unwrap())
        .unwrap();

    let expected = format!("execute 1__C__I__A [{}]", cfg.display());
    assert!(fake.calls().contains(&expected), "{:?}", fake.calls());
}
