use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use autopush_daemon::config::SyncConfig;
use autopush_daemon::git::cycle::{CycleOutcome, SyncCycle};
use autopush_daemon::git::worker::{CommandExecutor, CommandResult, GitWorker};
use autopush_daemon::store::counter::CounterStore;
use proptest::collection::vec;
use proptest::prelude::*;
use tempfile::TempDir;

/// How a single cycle plays out against git.
#[derive(Debug, Clone, Copy)]
enum Scenario {
    Clean,
    CommitRejected,
    PushRejected,
    GitMissing,
    Pushed,
    StagingWarnsThenPushed,
}

fn scenario() -> impl Strategy<Value = Scenario> {
    prop_oneof![
        Just(Scenario::Clean),
        Just(Scenario::CommitRejected),
        Just(Scenario::PushRejected),
        Just(Scenario::GitMissing),
        Just(Scenario::Pushed),
        Just(Scenario::StagingWarnsThenPushed),
    ]
}

type Response = Result<CommandResult, std::io::ErrorKind>;

#[derive(Clone, Default)]
struct ScriptedExecutor {
    responses: Arc<Mutex<VecDeque<Response>>>,
}

impl ScriptedExecutor {
    fn script(&self, scenario: Scenario) {
        let responses: Vec<Response> = match scenario {
            Scenario::Clean => vec![ok(""), ok("")],
            Scenario::CommitRejected => {
                vec![ok(""), ok("M\ta.md\n"), fail(128, "fatal: unable to auto-detect email\n")]
            }
            Scenario::PushRejected => vec![
                ok(""),
                ok("M\ta.md\n"),
                ok(""),
                ok(""),
                fail(1, "! [rejected] main -> main (fetch first)\n"),
            ],
            Scenario::GitMissing => vec![
                Err(std::io::ErrorKind::NotFound),
                Err(std::io::ErrorKind::NotFound),
                Err(std::io::ErrorKind::NotFound),
            ],
            Scenario::Pushed => vec![ok(""), ok("A\ta.md\n"), ok(""), ok(""), ok("")],
            Scenario::StagingWarnsThenPushed => vec![
                fail(1, "warning: some files ignored\n"),
                ok("A\ta.md\n"),
                ok(""),
                ok(""),
                ok(""),
            ],
        };
        self.responses.lock().expect("responses lock").extend(responses);
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(
        &self,
        _program: &str,
        _args: &[String],
        _cwd: &Path,
        _timeout: Option<Duration>,
    ) -> Result<CommandResult, std::io::Error> {
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .expect("scenario should script every call")
            .map_err(|kind| std::io::Error::new(kind, "scripted failure"))
    }
}

fn ok(stdout: &str) -> Response {
    Ok(CommandResult { success: true, code: Some(0), stdout: stdout.into(), stderr: String::new() })
}

fn fail(code: i32, stderr: &str) -> Response {
    Ok(CommandResult {
        success: false,
        code: Some(code),
        stdout: String::new(),
        stderr: stderr.into(),
    })
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn counter_advances_by_one_only_on_push(
        initial in prop_oneof![Just(None), (0u64..1_000).prop_map(Some)],
        scenarios in vec(scenario(), 1..40),
    ) {
        let tmp = TempDir::new().expect("tempdir");
        let executor = ScriptedExecutor::default();
        let counter = CounterStore::new(tmp.path().join("count"));
        if let Some(value) = initial {
            counter.write(value).expect("seed counter");
        }
        let cycle = SyncCycle::new(
            GitWorker::with_executor(tmp.path(), executor.clone()),
            counter,
            &SyncConfig::default(),
        );

        let mut previous = cycle.counter().read();
        prop_assert_eq!(previous, initial.unwrap_or(0));

        for scenario in scenarios {
            executor.script(scenario);
            let outcome = cycle.run_cycle();
            let now = cycle.counter().read();

            match outcome {
                CycleOutcome::Pushed { counter } => {
                    prop_assert_eq!(now, previous + 1);
                    prop_assert_eq!(counter, now);
                }
                _ => prop_assert_eq!(now, previous),
            }
            prop_assert!(executor.responses.lock().expect("responses lock").is_empty());
            previous = now;
        }
    }
}

#[test]
fn corrupt_record_recovers_to_one_on_next_push() {
    let tmp = TempDir::new().expect("tempdir");
    let path = tmp.path().join("count");
    std::fs::write(&path, "garbage\n").expect("write corrupt record");

    let executor = ScriptedExecutor::default();
    let cycle = SyncCycle::new(
        GitWorker::with_executor(tmp.path(), executor.clone()),
        CounterStore::new(&path),
        &SyncConfig::default(),
    );
    assert_eq!(cycle.counter().read(), 0);

    executor.script(Scenario::Pushed);
    assert_eq!(cycle.run_cycle(), CycleOutcome::Pushed { counter: 1 });
    assert_eq!(std::fs::read_to_string(&path).expect("read record"), "1");
}
