//! Simulated high-voltage / low-voltage supply board.
//!
//! The simulated board models the control loop the physical one exposes: a
//! control millivoltage drives the HV output through a fixed gain when the HV
//! rail is enabled, the LV rail follows its setpoint directly, and VDD is a
//! fixed reference.

use serde_json::{Value, json};

use crate::dispatch::DiagnosticRelay;

use super::{CallArgs, Endpoint, EndpointError, config_dummy_flag};

const HVLV_SOURCE: &str = "hvlv";

/// HV output per control millivolt.
const HV_GAIN: f64 = 80.0;
const MAX_HV_CONTROL_MV: f64 = 4000.0;
const MAX_LV_MV: f64 = 5000.0;
const VDD_MV: f64 = 3300.0;

const TELEMETRY: &[&str] = &[
    "get_hv_status",
    "get_hv_mv",
    "get_hv_control_mv",
    "get_lv_mv",
    "get_vdd_mv",
];
const OPERATIONS: &[&str] = &[
    "reset_devices",
    "hv_enable",
    "hv_disable",
    "set_hv_control_mv",
    "set_lv_mv",
];

/// HV/LV board endpoint.
pub struct HvlvEndpoint {
    initialized: bool,
    dummy: bool,
    hv_enabled: bool,
    hv_control_mv: f64,
    lv_mv: f64,
}

impl HvlvEndpoint {
    /// Creates an unconfigured board; `reset_devices` brings it up.
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: false,
            dummy: false,
            hv_enabled: false,
            hv_control_mv: 0.0,
            lv_mv: 0.0,
        }
    }

    fn reset(&mut self, config: &Value, relay: &DiagnosticRelay) {
        self.dummy = config_dummy_flag(config);
        self.hv_enabled = false;
        self.hv_control_mv = 0.0;
        self.lv_mv = 0.0;
        self.initialized = true;
        relay.info(HVLV_SOURCE, "board reset; HV disabled, rails at zero");
    }

    fn hv_mv(&self) -> f64 {
        if self.hv_enabled {
            self.hv_control_mv * HV_GAIN
        } else {
            0.0
        }
    }

    fn set_hv_control_mv(&mut self, call: &CallArgs<'_>) -> Result<Value, EndpointError> {
        let mv = call.f64(0, "mv")?;
        if !(0.0..=MAX_HV_CONTROL_MV).contains(&mv) {
            return Err(EndpointError::invalid_argument(
                "mv",
                format!("control voltage must be within 0..={MAX_HV_CONTROL_MV} mV"),
            ));
        }
        self.hv_control_mv = mv;
        Ok(Value::Null)
    }

    fn set_lv_mv(&mut self, call: &CallArgs<'_>) -> Result<Value, EndpointError> {
        let mv = call.f64(0, "mv")?;
        if !(0.0..=MAX_LV_MV).contains(&mv) {
            return Err(EndpointError::invalid_argument(
                "mv",
                format!("LV rail must be within 0..={MAX_LV_MV} mV"),
            ));
        }
        self.lv_mv = mv;
        Ok(Value::Null)
    }
}

impl Default for HvlvEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl Endpoint for HvlvEndpoint {
    fn name(&self) -> &str {
        "hvlv"
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
            "get_hv_status" => Ok(Value::Bool(self.hv_enabled)),
            "get_hv_mv" => Ok(json!(self.hv_mv())),
            "get_hv_control_mv" => Ok(json!(self.hv_control_mv)),
            "get_lv_mv" => Ok(json!(self.lv_mv)),
            "get_vdd_mv" => Ok(json!(VDD_MV)),
            "reset_devices" => {
                let config = call.value(0, "config").cloned().unwrap_or(json!({}));
                self.reset(&config, relay);
                Ok(Value::Null)
            }
            "hv_enable" => {
                self.hv_enabled = true;
                relay.warn(HVLV_SOURCE, "high voltage rail enabled");
                Ok(Value::Null)
            }
            "hv_disable" => {
                self.hv_enabled = false;
                relay.info(HVLV_SOURCE, "high voltage rail disabled");
                Ok(Value::Null)
            }
            "set_hv_control_mv" => self.set_hv_control_mv(call),
            "set_lv_mv" => self.set_lv_mv(call),
            other => Err(EndpointError::driver(format!(
                "hvlv cannot route method <{other}>"
            ))),
        }
    }
}
