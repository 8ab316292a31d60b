//! Built-in intrinsics.
//!
//! The fixed catalogue the scripting surface freezes; resolved before
//! user-defined functions, so a script cannot shadow an intrinsic.
//!
//! | name | effect |
//! |---|---|
//! | `pinMode(pin, mode)` | accepted, no-op |
//! | `digitalWrite(pin, v)` / `analogWrite(pin, v)` | write the pin store |
//! | `delay(ms)` / `delayMicroseconds(us)` | suspend the execution task |
//! | `readUltrasonic(trig, echo)` | injected distance → pulse duration |
//! | `push(&s, v)` / `pop(&s)` | LIFO stack through a reference |
//! | `forward()` / `backward()` / `stop()` | motor pin patterns |
//! | `left()` / `right()` | turn-command pin, then a calibrated hold |

use crate::hardware::{
    self, pins, BACKWARD_PATTERN, FORWARD_PATTERN, STOP_PATTERN, TURN_LEFT, TURN_RIGHT,
};
use crate::interpreter::engine::Machine;
use crate::memory::value::Value;
use crate::parser::ast::Expr;
use std::time::Duration;

/// Dispatch an intrinsic call. Returns `None` when `name` is not in the
/// catalogue, so user-defined functions can be tried next.
pub(crate) fn dispatch(machine: &mut Machine, name: &str, args: &[Expr]) -> Option<Value> {
    let value = match name {
        // Initialization-style calls are accepted for sketch
        // compatibility; arguments still evaluate for their side effects.
        "pinMode" => {
            machine.eval_args(args);
            Value::Void
        }

        "digitalWrite" | "analogWrite" => {
            let pin = machine.arg_i64(args, 0);
            let value = machine.arg_i64(args, 1);
            machine.bus().write_pin(pin, value);
            Value::Void
        }

        "delay" => {
            let ms = machine.arg_i64(args, 0).max(0) as u64;
            machine.suspend(Duration::from_millis(ms));
            Value::Void
        }

        "delayMicroseconds" => {
            let us = machine.arg_i64(args, 0).max(0) as u64;
            machine.suspend(Duration::from_micros(us));
            Value::Void
        }

        // The sonar read: the host injects a distance in centimeters on
        // the echo channel; the script receives the round-trip pulse
        // duration in microseconds. The trig argument exists for signature
        // compatibility; a single-argument call names the echo channel
        // directly.
        "readUltrasonic" => {
            let echo = if args.len() > 1 {
                machine.arg_i64(args, 1)
            } else {
                machine.arg_i64(args, 0)
            };
            let distance = machine.bus().sensor(echo);
            Value::Float(distance * hardware::MICROS_PER_CM)
        }

        "push" => {
            let value = machine.arg_i64(args, 1);
            machine.stack_op(args.first(), |pile| pile.push(value));
            Value::Void
        }

        "pop" => {
            let mut popped = 0;
            machine.stack_op(args.first(), |pile| popped = pile.pop().unwrap_or(0));
            Value::Int(popped)
        }

        "forward" => {
            machine.bus().drive(&FORWARD_PATTERN);
            Value::Void
        }

        "backward" => {
            machine.bus().drive(&BACKWARD_PATTERN);
            Value::Void
        }

        "stop" => {
            machine.bus().drive(&STOP_PATTERN);
            Value::Void
        }

        // Snap turns: write the command pin the simulation consumes, then
        // hold the execution task for the calibrated turn interval.
        "left" => {
            machine.bus().write_pin(pins::TURN_COMMAND, TURN_LEFT);
            machine.suspend(machine.turn_hold());
            Value::Void
        }

        "right" => {
            machine.bus().write_pin(pins::TURN_COMMAND, TURN_RIGHT);
            machine.suspend(machine.turn_hold());
            Value::Void
        }

        _ => return None,
    };

    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::hardware::HardwareBus;
    use crate::parser;
    use std::sync::Arc;

    fn machine_for(source: &str) -> (Machine, Arc<HardwareBus>) {
        let (program, diagnostics) = parser::parse(source);
        assert!(diagnostics.is_empty(), "parse diagnostics: {diagnostics:?}");
        let bus = Arc::new(HardwareBus::new());
        let config = Config {
            turn_hold: Duration::from_millis(1),
            ..Config::default()
        };
        (Machine::boot(&program, Arc::clone(&bus), config), bus)
    }

    fn run_setup(source: &str) -> (Machine, Arc<HardwareBus>) {
        let (mut machine, bus) = machine_for(source);
        machine.call("setup", &[]);
        (machine, bus)
    }

    #[test]
    fn test_digital_write_round_trip() {
        let (_, bus) = run_setup("void setup() { digitalWrite(5, 255); digitalWrite(6, 0); }");
        assert_eq!(bus.pin(5), 255);
        assert_eq!(bus.pin(6), 0);
    }

    #[test]
    fn test_stack_push_pop_order() {
        let (machine, _) = run_setup(
            "stack s;\nint a;\nint b;\nint c;\n\
             void setup() {\n\
               push(&s, 1); push(&s, 2);\n\
               a = pop(&s); b = pop(&s); c = pop(&s);\n\
             }",
        );
        assert_eq!(machine.global_value("a"), Some(Value::Int(2)));
        assert_eq!(machine.global_value("b"), Some(Value::Int(1)));
        // Popping an empty stack yields 0 and does not fail.
        assert_eq!(machine.global_value("c"), Some(Value::Int(0)));
    }

    #[test]
    fn test_push_without_reference_to_stack_is_ignored() {
        let (mut machine, _) = machine_for(
            "int x;\nvoid setup() { push(&x, 1); push(5, 1); }",
        );
        machine.call("setup", &[]);
        assert!(!machine.diagnostics().is_empty());
        assert_eq!(machine.global_value("x"), Some(Value::Int(0)));
    }

    #[test]
    fn test_ultrasonic_pulse_conversion() {
        let (mut machine, bus) = machine_for(
            "float pulse;\nvoid setup() { pulse = readUltrasonic(2, 3); }",
        );
        bus.set_sensor(3, 10.0);
        machine.call("setup", &[]);
        assert_eq!(
            machine.global_value("pulse"),
            Some(Value::Float(10.0 * hardware::MICROS_PER_CM))
        );
    }

    #[test]
    fn test_movement_patterns() {
        let (_, bus) = run_setup("void setup() { forward(); }");
        assert_eq!(bus.pin(pins::LEFT_FORWARD), 255);
        assert_eq!(bus.pin(pins::LEFT_BACKWARD), 0);
        assert_eq!(bus.pin(pins::RIGHT_FORWARD), 255);
        assert_eq!(bus.pin(pins::RIGHT_BACKWARD), 0);

        let (_, bus) = run_setup("void setup() { backward(); stop(); }");
        assert_eq!(bus.pin(pins::LEFT_FORWARD), 0);
        assert_eq!(bus.pin(pins::LEFT_BACKWARD), 0);
        assert_eq!(bus.pin(pins::RIGHT_FORWARD), 0);
        assert_eq!(bus.pin(pins::RIGHT_BACKWARD), 0);
    }

    #[test]
    fn test_turns_write_command_pin() {
        let (_, bus) = run_setup("void setup() { left(); }");
        assert_eq!(bus.pin(pins::TURN_COMMAND), TURN_LEFT);

        let (_, bus) = run_setup("void setup() { right(); }");
        assert_eq!(bus.pin(pins::TURN_COMMAND), TURN_RIGHT);
    }

    #[test]
    fn test_pin_mode_is_noop() {
        let (machine, bus) = run_setup("void setup() { pinMode(5, 1); }");
        assert_eq!(bus.pin(5), 0);
        assert!(machine.diagnostics().is_empty());
    }

    #[test]
    fn test_intrinsics_win_over_user_functions() {
        // A script-defined `forward` does not shadow the intrinsic.
        let (machine, bus) = run_setup(
            "int called = 0;\n\
             void forward() { called = 1; }\n\
             void setup() { forward(); }",
        );
        assert_eq!(bus.pin(pins::LEFT_FORWARD), 255);
        assert_eq!(machine.global_value("called"), Some(Value::Int(0)));
    }
}
