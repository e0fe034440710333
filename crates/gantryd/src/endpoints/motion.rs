//! Simulated three-axis gantry motion endpoint.
//!
//! The simulated controller completes every move instantly, so `in_motion`
//! reports false between calls; coordinate and speed-limit state persist the
//! way the physical controller's do.

use serde_json::{Value, json};

use crate::dispatch::DiagnosticRelay;

use super::{CallArgs, Endpoint, EndpointError, config_dummy_flag};

const MOTION_SOURCE: &str = "gantry";

/// Travel limit per axis in millimetres.
const MAX_TRAVEL_MM: f64 = 345.0;
/// Default speed limit per axis in mm/s.
const DEFAULT_SPEED_LIMIT: f64 = 120.0;

const TELEMETRY: &[&str] = &["get_coord", "get_speed", "in_motion"];
const OPERATIONS: &[&str] = &[
    "reset_devices",
    "move_to",
    "set_speed_limit",
    "send_home",
    "enable_stepper",
    "disable_stepper",
    "run_gcode",
];

/// Gantry motion controller endpoint.
pub struct MotionEndpoint {
    initialized: bool,
    dummy: bool,
    coord: [f64; 3],
    speed_limit: [f64; 3],
    steppers_enabled: [bool; 3],
}

impl MotionEndpoint {
    /// Creates an unconfigured controller; `reset_devices` brings it up.
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: false,
            dummy: false,
            coord: [0.0; 3],
            speed_limit: [DEFAULT_SPEED_LIMIT; 3],
            steppers_enabled: [true; 3],
        }
    }

    fn reset(&mut self, config: &Value, relay: &DiagnosticRelay) {
        self.dummy = config_dummy_flag(config);
        self.coord = [0.0; 3];
        self.speed_limit = [DEFAULT_SPEED_LIMIT; 3];
        self.steppers_enabled = [true; 3];
        self.initialized = true;
        relay.info(MOTION_SOURCE, "motion controller reset to origin");
    }

    fn move_to(&mut self, call: &CallArgs<'_>, relay: &DiagnosticRelay) -> Result<Value, EndpointError> {
        let target = axis_values(call)?;
        for (axis, value) in AXES.iter().zip(target) {
            if !(0.0..=MAX_TRAVEL_MM).contains(&value) {
                return Err(EndpointError::invalid_argument(
                    *axis,
                    format!("target {value} is outside travel range 0..={MAX_TRAVEL_MM} mm"),
                ));
            }
        }
        if let Some(index) = (0..3).find(|index| !self.steppers_enabled[*index]) {
            return Err(EndpointError::driver(format!(
                "cannot move: stepper {} is disabled",
                AXES[index]
            )));
        }
        relay.info(
            MOTION_SOURCE,
            format!(
                "moving from ({:.2}, {:.2}, {:.2}) to ({:.2}, {:.2}, {:.2})",
                self.coord[0], self.coord[1], self.coord[2], target[0], target[1], target[2]
            ),
        );
        self.coord = target;
        Ok(Value::Null)
    }

    fn set_speed_limit(&mut self, call: &CallArgs<'_>) -> Result<Value, EndpointError> {
        let limits = axis_values(call)?;
        for (axis, value) in AXES.iter().zip(limits) {
            if value <= 0.0 {
                return Err(EndpointError::invalid_argument(
                    *axis,
                    "speed limit must be positive",
                ));
            }
        }
        self.speed_limit = limits;
        Ok(Value::Null)
    }

    fn send_home(&mut self, call: &CallArgs<'_>, relay: &DiagnosticRelay) -> Result<Value, EndpointError> {
        let selected = axis_flags(call)?;
        for (index, homed) in selected.iter().enumerate() {
            if *homed {
                self.coord[index] = 0.0;
            }
        }
        relay.info(
            MOTION_SOURCE,
            format!(
                "homed axes x={} y={} z={}",
                selected[0], selected[1], selected[2]
            ),
        );
        Ok(Value::Null)
    }

    fn set_steppers(&mut self, call: &CallArgs<'_>, enabled: bool) -> Result<Value, EndpointError> {
        let selected = axis_flags(call)?;
        for (index, flagged) in selected.iter().enumerate() {
            if *flagged {
                self.steppers_enabled[index] = enabled;
            }
        }
        Ok(Value::Null)
    }

    fn run_gcode(&mut self, call: &CallArgs<'_>, relay: &DiagnosticRelay) -> Result<Value, EndpointError> {
        let gcode = call.str(0, "gcode")?;
        if gcode.trim().is_empty() {
            return Err(EndpointError::invalid_argument(
                "gcode",
                "gcode line is empty",
            ));
        }
        relay.info(MOTION_SOURCE, format!("executed gcode [{}]", gcode.trim()));
        // The simulated printer board acknowledges every line.
        Ok(json!("ok"))
    }
}

const AXES: [&str; 3] = ["x", "y", "z"];

fn axis_values(call: &CallArgs<'_>) -> Result<[f64; 3], EndpointError> {
    Ok([call.f64(0, "x")?, call.f64(1, "y")?, call.f64(2, "z")?])
}

fn axis_flags(call: &CallArgs<'_>) -> Result<[bool; 3], EndpointError> {
    Ok([
        call.opt_bool(0, "x")?.unwrap_or(false),
        call.opt_bool(1, "y")?.unwrap_or(false),
        call.opt_bool(2, "z")?.unwrap_or(false),
    ])
}

impl Default for MotionEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl Endpoint for MotionEndpoint {
    fn name(&self) -> &str {
        "gantry"
    }

    fn telemetry_methods(&self) -> &'static [&'static str] {
        TELEMETRY
    }

    fn operation_methods(&self) -> &'static [&'static str] {
        OPERATIONS
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn is_dummy(&self) -> bool {
        self.dummy
    }

    fn supports(&self, method: &str) -> bool {
        TELEMETRY.contains(&method) || OPERATIONS.contains(&method)
    }

    fn invoke(
        &mut self,
        method: &str,
        call: &CallArgs<'_>,
        relay: &DiagnosticRelay,
    ) -> Result<Value, EndpointError> {
        match method {
            "get_coord" => Ok(json!(self.coord)),
            "get_speed" => Ok(json!(self.speed_limit)),
            "in_motion" => Ok(Value::Bool(false)),
            "reset_devices" => {
                let config = call.value(0, "config").cloned().unwrap_or(json!({}));
                self.reset(&config, relay);
                Ok(Value::Null)
            }
            "move_to" => self.move_to(call, relay),
            "set_speed_limit" => self.set_speed_limit(call),
            "send_home" => self.send_home(call, relay),
            "enable_stepper" => self.set_steppers(call, true),
            "disable_stepper" => self.set_steppers(call, false),
            "run_gcode" => self.run_gcode(call, relay),
            other => Err(EndpointError::driver(format!(
                "gantry cannot route method <{other}>"
            ))),
        }
    }
}
