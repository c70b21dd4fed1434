//! End-to-end engine behaviour driven through an in-memory input queue.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use concli_engine::builtin::{HELP_HEADER, HelpCommand};
use concli_engine::{
    CaptureBuffer, CliEngine, Command, CommandOutput, Console, EngineConfig, InputFactory,
    InputFeeder, InputSource, LifecycleHook, QueueInput, Registry, Result, ShutdownOutcome,
};

// ---------------------------------------------------------------------------
// Test host
// ---------------------------------------------------------------------------

struct Host {
    label: String,
    stopped: AtomicBool,
    hook: OnceLock<LifecycleHook<Host>>,
}

impl Host {
    fn new(label: &str) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            stopped: AtomicBool::new(false),
            hook: OnceLock::new(),
        })
    }

    fn stop(self: &Arc<Self>) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(hook) = self.hook.get() {
            hook.on_stopped(self);
        }
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

struct Quit;

impl Command<Host> for Quit {
    fn code(&self) -> &str {
        "q"
    }
    fn name(&self) -> &str {
        "Quit"
    }
    fn describe(&self, code: &str, owner: &Host) -> String {
        format!("Type [{code}] to stop {}", owner.label)
    }
    fn execute(&self, owner: &Arc<Host>, _registry: &Registry<Host>) -> Result<CommandOutput> {
        owner.stop();
        Ok(CommandOutput::None)
    }
}

fn quit() -> Arc<dyn Command<Host>> {
    Arc::new(Quit)
}

fn help() -> Arc<dyn Command<Host>> {
    Arc::new(HelpCommand::default())
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    engine: Arc<CliEngine<Host>>,
    feeder: InputFeeder,
    output: CaptureBuffer,
    scans: Arc<AtomicUsize>,
}

fn harness() -> Harness {
    let (feeder, input) = QueueInput::pair();
    let scans = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&scans);
    let factory: InputFactory = Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Box::new(input.clone()) as Box<dyn InputSource>
    });
    let config = EngineConfig {
        poll_interval_ms: 5,
        shutdown_timeout_ms: 2_000,
        worker_keep_alive_ms: 1_000,
        ..EngineConfig::default()
    };
    let (console, output) = Console::capture();
    let engine = Arc::new(CliEngine::with_io(config, factory, console).unwrap());
    Harness {
        engine,
        feeder,
        output,
        scans,
    }
}

fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if check() {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("timed out waiting for {what}");
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn help_lists_all_commands_and_unknown_token_hints_help() {
    let h = harness();
    let host = Host::new("alpha");
    h.engine.attach(&host, &[quit(), help()]).unwrap();

    h.feeder.push_line("h");
    eventually("help output", || h.output.contents().contains("Quit [q]:"));
    let text = h.output.contents();
    assert!(text.contains(HELP_HEADER));
    assert!(text.contains("Help [h]:\n  Type [h] to list the available commands"));
    assert!(text.contains("Quit [q]:\n  Type [q] to stop alpha"));

    h.feeder.push_line("zzz");
    eventually("unknown command line", || {
        h.output
            .lines()
            .iter()
            .any(|l| l == "Unknown command [zzz]. Type [h] for help.")
    });
    assert!(!host.is_stopped());
}

#[test]
fn second_instance_gets_namespaced_codes() {
    let h = harness();
    let first = Host::new("first");
    let second = Host::new("second");
    assert_eq!(h.engine.attach(&first, &[quit()]).unwrap(), 0);
    assert_eq!(h.engine.attach(&second, &[quit()]).unwrap(), 1);

    let registry = h.engine.registry_snapshot();
    assert_eq!(registry.len(), 2);
    assert!(registry["q"].is_bound_to(&first));
    assert!(registry["q1"].is_bound_to(&second));

    h.feeder.push_line("q1");
    eventually("second instance stop", || second.is_stopped());
    assert!(!first.is_stopped());
}

#[test]
fn ordinals_restart_after_full_teardown() {
    let h = harness();
    let host = Host::new("solo");
    let cmds = [quit(), help()];
    let ordinal = h.engine.attach(&host, &cmds).unwrap();
    assert!(h.engine.is_active());

    let pending = h.engine.detach(&host, ordinal, &cmds).expect("last detach");
    assert!(!h.engine.is_active());
    assert!(pending.wait(Duration::from_secs(5)).is_ok());

    let again = Host::new("again");
    assert_eq!(h.engine.attach(&again, &cmds).unwrap(), 0);
    assert!(h.engine.registry_snapshot()["q"].is_bound_to(&again));
}

#[test]
fn activity_tracks_attach_count() {
    let h = harness();
    let hosts: Vec<_> = (0..3).map(|i| Host::new(&format!("h{i}"))).collect();
    let cmds = [quit()];
    assert!(!h.engine.is_active());

    let ordinals: Vec<usize> = hosts
        .iter()
        .map(|host| h.engine.attach(host, &cmds).unwrap())
        .collect();
    assert_eq!(ordinals, vec![0, 1, 2]);
    assert_eq!(h.engine.active_instances(), 3);

    assert!(h.engine.detach(&hosts[1], 1, &cmds).is_none());
    assert!(h.engine.is_active());
    assert!(h.engine.detach(&hosts[0], 0, &cmds).is_none());
    assert!(h.engine.is_active());
    let pending = h.engine.detach(&hosts[2], 2, &cmds);
    assert!(pending.is_some());
    assert!(!h.engine.is_active());
}

#[test]
fn one_scan_loop_per_activation() {
    let h = harness();
    let cmds = [quit()];
    let a = Host::new("a");
    let b = Host::new("b");
    let c = Host::new("c");
    h.engine.attach(&a, &cmds).unwrap();
    h.engine.attach(&b, &cmds).unwrap();
    h.engine.attach(&c, &cmds).unwrap();
    assert_eq!(h.scans.load(Ordering::SeqCst), 1);

    h.engine.detach(&a, 0, &cmds);
    h.engine.detach(&b, 1, &cmds);
    let pending = h.engine.detach(&c, 2, &cmds).expect("last detach");
    pending.wait(Duration::from_secs(5)).unwrap();

    h.engine.attach(&a, &cmds).unwrap();
    assert_eq!(h.scans.load(Ordering::SeqCst), 2);
}

#[test]
fn teardown_cancels_idle_scanner_promptly() {
    let h = harness();
    let host = Host::new("idle");
    let cmds = [help()];
    h.engine.attach(&host, &cmds).unwrap();
    // Let the scan loop settle into polling with no input.
    std::thread::sleep(Duration::from_millis(30));

    let started = Instant::now();
    let pending = h.engine.detach(&host, 0, &cmds).expect("last detach");
    let outcome = pending.wait(Duration::from_secs(5)).unwrap();
    assert_eq!(outcome, ShutdownOutcome::Drained);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn quit_from_console_tears_engine_down() {
    let h = harness();
    let host = Host::new("hooked");
    let hook = LifecycleHook::new(Arc::clone(&h.engine), vec![quit(), help()]);
    assert!(host.hook.set(hook).is_ok());
    let ordinal = host.hook.get().map(|hook| hook.on_starting(&host));
    assert_eq!(ordinal.transpose().unwrap(), Some(0));

    h.feeder.push_line("q");
    eventually("host stop", || host.is_stopped());
    eventually("engine teardown", || !h.engine.is_active());
    assert!(h.engine.registry_snapshot().is_empty());
}

#[test]
fn commands_see_registry_snapshot() {
    struct Count(Arc<Mutex<Vec<usize>>>);

    impl Command<Host> for Count {
        fn code(&self) -> &str {
            "c"
        }
        fn name(&self) -> &str {
            "Count"
        }
        fn describe(&self, _code: &str, _owner: &Host) -> String {
            String::new()
        }
        fn execute(&self, _owner: &Arc<Host>, registry: &Registry<Host>) -> Result<CommandOutput> {
            self.0.lock().unwrap().push(registry.len());
            Ok(CommandOutput::None)
        }
    }

    let h = harness();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let count: Arc<dyn Command<Host>> = Arc::new(Count(Arc::clone(&seen)));
    let first = Host::new("first");
    let second = Host::new("second");
    h.engine.attach(&first, &[Arc::clone(&count), quit()]).unwrap();
    h.engine.attach(&second, &[quit()]).unwrap();

    h.engine.dispatch("c");
    eventually("count command", || !seen.lock().unwrap().is_empty());
    assert_eq!(seen.lock().unwrap()[0], 3);
    assert_eq!(h.engine.registry_snapshot().len(), 3);
}
