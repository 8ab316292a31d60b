// Driver-level integration tests: the Idle/Running state machine, the
// background execution task, and the hardware bus as seen by a host.

use botscript::hardware::{echo, pins, MICROS_PER_CM, TURN_LEFT};
use botscript::{Config, Interpreter, Value};
use std::sync::Once;
use std::time::{Duration, Instant};

/// Opt into log output with e.g. `RUST_LOG=botscript=debug`.
fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Poll `cond` for up to two seconds.
fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

fn test_config() -> Config {
    init_tracing();
    Config {
        turn_hold: Duration::from_millis(1),
        ..Config::default()
    }
}

#[test]
fn test_stop_is_bounded_despite_infinite_loop() {
    let mut interp = Interpreter::with_config(test_config());
    interp.load(
        "void setup() { }\n\
         void loop() { while (true) { } }",
    );
    interp.start();
    assert!(interp.is_running());
    std::thread::sleep(Duration::from_millis(50));

    let begin = Instant::now();
    interp.stop();
    assert!(!interp.is_running());
    assert!(begin.elapsed() < Duration::from_secs(2), "stop took too long");
}

#[test]
fn test_stop_is_safe_mid_delay() {
    let mut interp = Interpreter::with_config(test_config());
    interp.load("void loop() { delay(10000); }");
    interp.start();
    std::thread::sleep(Duration::from_millis(50));

    let begin = Instant::now();
    interp.stop();
    assert!(begin.elapsed() < Duration::from_secs(1), "stop blocked on delay");
}

#[test]
fn test_start_is_idempotent() {
    let mut interp = Interpreter::with_config(test_config());
    interp.load("void loop() { }");
    interp.start();
    interp.start();
    assert!(interp.is_running());

    // Exactly one task exists; one stop joins it and returns.
    interp.stop();
    assert!(!interp.is_running());
}

#[test]
fn test_pin_round_trip_through_script() {
    let mut interp = Interpreter::with_config(test_config());
    interp.load("void setup() { digitalWrite(5, 255); digitalWrite(6, 0); }");
    interp.start();
    assert!(wait_for(|| interp.get_pin_value(5) == 255));
    assert_eq!(interp.get_pin_value(6), 0);
    interp.stop();
}

#[test]
fn test_sensor_to_pulse_conversion() {
    let mut interp = Interpreter::with_config(test_config());
    interp.load(
        "float pulse;\n\
         void loop() { pulse = readUltrasonic(2, 3); }",
    );
    interp.set_sensor_value(echo::FRONT, 10.0);
    interp.start();
    std::thread::sleep(Duration::from_millis(50));
    interp.stop();

    assert_eq!(
        interp.global_value("pulse"),
        Some(Value::Float(10.0 * MICROS_PER_CM))
    );
}

#[test]
fn test_set_variable_reaches_declared_global() {
    let mut interp = Interpreter::with_config(test_config());
    interp.load(
        "float fdist;\n\
         float out;\n\
         void loop() { out = fdist; }",
    );
    interp.start();
    interp.set_variable("fdist", 42.0);
    interp.set_variable("missing", 1.0);
    std::thread::sleep(Duration::from_millis(100));
    interp.stop();

    assert_eq!(interp.global_value("out"), Some(Value::Float(42.0)));
    assert_eq!(interp.global_value("missing"), None);
}

#[test]
fn test_set_variable_while_idle() {
    let mut interp = Interpreter::with_config(test_config());
    interp.load("float fdist;");
    interp.set_variable("fdist", 7.5);
    assert_eq!(interp.global_value("fdist"), Some(Value::Float(7.5)));
}

#[test]
fn test_movement_pattern_visible_to_host() {
    let mut interp = Interpreter::with_config(test_config());
    interp.load("void setup() { forward(); }");
    interp.start();
    assert!(wait_for(|| interp.get_pin_value(pins::LEFT_FORWARD) == 255));
    assert_eq!(interp.get_pin_value(pins::LEFT_BACKWARD), 0);
    assert!(wait_for(|| interp.get_pin_value(pins::RIGHT_FORWARD) == 255));
    assert_eq!(interp.get_pin_value(pins::RIGHT_BACKWARD), 0);
    interp.stop();
}

#[test]
fn test_load_resets_pins_and_globals() {
    let mut interp = Interpreter::with_config(test_config());
    interp.load("int n = 1;\nvoid setup() { digitalWrite(5, 255); }");
    interp.start();
    assert!(wait_for(|| interp.get_pin_value(5) == 255));
    interp.stop();

    interp.load("void loop() { }");
    assert_eq!(interp.get_pin_value(5), 0);
    assert_eq!(interp.global_value("n"), None);
}

#[test]
fn test_load_stops_active_run() {
    let mut interp = Interpreter::with_config(test_config());
    interp.load("void loop() { while (true) { } }");
    interp.start();
    assert!(interp.is_running());
    interp.load("void loop() { }");
    assert!(!interp.is_running());
}

#[test]
fn test_stop_start_resumes_environment() {
    let mut interp = Interpreter::with_config(test_config());
    interp.load(
        "int n = 0;\n\
         void loop() { n = n + 1; }",
    );
    interp.start();
    std::thread::sleep(Duration::from_millis(50));
    interp.stop();
    let first = match interp.global_value("n") {
        Some(Value::Int(n)) => n,
        other => panic!("expected int counter, got {other:?}"),
    };
    assert!(first > 0, "loop never ran");

    interp.start();
    std::thread::sleep(Duration::from_millis(50));
    interp.stop();
    let second = match interp.global_value("n") {
        Some(Value::Int(n)) => n,
        other => panic!("expected int counter, got {other:?}"),
    };
    assert!(second > first, "environment was not resumed");
}

#[test]
fn test_start_without_load_is_harmless() {
    let mut interp = Interpreter::with_config(test_config());
    interp.start();
    assert!(interp.is_running());
    interp.stop();
    assert!(!interp.is_running());
}

#[test]
fn test_hostile_source_still_loads_and_runs() {
    let mut interp = Interpreter::with_config(test_config());
    interp.load("??? int = { struct enum while;;; @");
    assert!(!interp.diagnostics().is_empty());
    interp.start();
    std::thread::sleep(Duration::from_millis(20));
    interp.stop();
}

#[test]
fn test_turn_writes_command_pin() {
    let mut interp = Interpreter::with_config(test_config());
    interp.load("void setup() { left(); }");
    interp.start();
    assert!(wait_for(|| interp.get_pin_value(pins::TURN_COMMAND) == TURN_LEFT));
    interp.stop();
}

#[test]
fn test_drop_while_running_joins_task() {
    let mut interp = Interpreter::with_config(test_config());
    interp.load("void loop() { delay(50); }");
    interp.start();
    drop(interp);
}
