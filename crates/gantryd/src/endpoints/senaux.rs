//! Simulated auxiliary sensor board: pulser outputs, photodiode power, and a
//! small ADC with selectable bias resistors.

use serde_json::{Value, json};

use crate::dispatch::DiagnosticRelay;

use super::{CallArgs, Endpoint, EndpointError, config_dummy_flag};

const SENAUX_SOURCE: &str = "senaux";

const ADC_CHANNELS: i64 = 4;
/// Bias resistor per ADC channel in ohms, matching the board silkscreen.
const BIAS_RESISTOR_OHM: [f64; 4] = [10_000.0, 10_000.0, 51_000.0, 51_000.0];
/// Idle reading of the simulated ADC in millivolts.
const ADC_IDLE_MV: f64 = 1650.0;

const TELEMETRY: &[&str] = &["status_pd1", "status_pd2", "adc_readmv", "adc_biasresistor"];
const OPERATIONS: &[&str] = &[
    "reset_devices",
    "enable_pd1",
    "disable_pd1",
    "enable_pd2",
    "disable_pd2",
    "pulse_f1",
    "pulse_f2",
];

/// Auxiliary sensor board endpoint.
pub struct SenAuxEndpoint {
    initialized: bool,
    dummy: bool,
    pd1_enabled: bool,
    pd2_enabled: bool,
}

impl SenAuxEndpoint {
    /// Creates an unconfigured board; `reset_devices` brings it up.
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: false,
            dummy: false,
            pd1_enabled: false,
            pd2_enabled: false,
        }
    }

    fn reset(&mut self, config: &Value, relay: &DiagnosticRelay) {
        self.dummy = config_dummy_flag(config);
        self.pd1_enabled = false;
        self.pd2_enabled = false;
        self.initialized = true;
        relay.info(SENAUX_SOURCE, "auxiliary board reset; photodiodes off");
    }

    fn adc_channel(call: &CallArgs<'_>) -> Result<usize, EndpointError> {
        let channel = call.i64(0, "channel")?;
        if !(0..ADC_CHANNELS).contains(&channel) {
            return Err(EndpointError::invalid_argument(
                "channel",
                format!("ADC channel must be within 0..{ADC_CHANNELS}"),
            ));
        }
        Ok(usize::try_from(channel).unwrap_or_default())
    }

    fn adc_readmv(&self, call: &CallArgs<'_>) -> Result<Value, EndpointError> {
        let channel = Self::adc_channel(call)?;
        // Deterministic per-channel spread so readings are distinguishable.
        #[allow(clippy::cast_precision_loss)]
        let reading = ADC_IDLE_MV + (channel as f64) * 10.0;
        Ok(json!(reading))
    }

    fn pulse(
        &self,
        output: usize,
        call: &CallArgs<'_>,
        relay: &DiagnosticRelay,
    ) -> Result<Value, EndpointError> {
        let count = call.i64(0, "n")?;
        if count <= 0 {
            return Err(EndpointError::invalid_argument(
                "n",
                "pulse count must be positive",
            ));
        }
        relay.info(
            SENAUX_SOURCE,
            format!("sent {count} pulses on output f{}", output + 1),
        );
        Ok(Value::Null)
    }
}

impl Default for SenAuxEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl Endpoint for SenAuxEndpoint {
    fn name(&self) -> &str {
        "senaux"
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
            "status_pd1" => Ok(Value::Bool(self.pd1_enabled)),
            "status_pd2" => Ok(Value::Bool(self.pd2_enabled)),
            "adc_readmv" => self.adc_readmv(call),
            "adc_biasresistor" => {
                let channel = Self::adc_channel(call)?;
                Ok(json!(BIAS_RESISTOR_OHM[channel]))
            }
            "reset_devices" => {
                let config = call.value(0, "config").cloned().unwrap_or(json!({}));
                self.reset(&config, relay);
                Ok(Value::Null)
            }
            "enable_pd1" => {
                self.pd1_enabled = true;
                Ok(Value::Null)
            }
            "disable_pd1" => {
                self.pd1_enabled = false;
                Ok(Value::Null)
            }
            "enable_pd2" => {
                self.pd2_enabled = true;
                Ok(Value::Null)
            }
            "disable_pd2" => {
                self.pd2_enabled = false;
                Ok(Value::Null)
            }
            "pulse_f1" => self.pulse(0, call, relay),
            "pulse_f2" => self.pulse(1, call, relay),
            other => Err(EndpointError::driver(format!(
                "senaux cannot route method <{other}>"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;

    fn board() -> SenAuxEndpoint {
        let mut endpoint = SenAuxEndpoint::new();
        invoke(&mut endpoint, "reset_devices", vec![json!({"dummy": true})]).expect("reset");
        endpoint
    }

    fn invoke(
        endpoint: &mut SenAuxEndpoint,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, EndpointError> {
        let kwargs = Map::new();
        let relay = DiagnosticRelay::new();
        let call = CallArgs::new(&args, &kwargs);
        endpoint.invoke(method, &call, &relay)
    }

    #[test]
    fn photodiode_power_toggles_per_channel() {
        let mut endpoint = board();
        invoke(&mut endpoint, "enable_pd1", Vec::new()).expect("enable pd1");

        assert_eq!(
            invoke(&mut endpoint, "status_pd1", Vec::new()).expect("pd1"),
            json!(true)
        );
        assert_eq!(
            invoke(&mut endpoint, "status_pd2", Vec::new()).expect("pd2"),
            json!(false)
        );

        invoke(&mut endpoint, "disable_pd1", Vec::new()).expect("disable pd1");
        assert_eq!(
            invoke(&mut endpoint, "status_pd1", Vec::new()).expect("pd1"),
            json!(false)
        );
    }

    #[test]
    fn adc_rejects_out_of_range_channels() {
        let mut endpoint = board();
        let error = invoke(&mut endpoint, "adc_readmv", vec![json!(4)])
            .expect_err("should reject channel 4");
        assert!(matches!(error, EndpointError::InvalidArgument { .. }));

        let reading = invoke(&mut endpoint, "adc_readmv", vec![json!(2)]).expect("read");
        assert_eq!(reading, json!(ADC_IDLE_MV + 20.0));
    }

    #[test]
    fn bias_resistors_match_the_board_layout() {
        let mut endpoint = board();
        let resistor = invoke(&mut endpoint, "adc_biasresistor", vec![json!(3)]).expect("read");
        assert_eq!(resistor, json!(51_000.0));
    }

    #[test]
    fn pulses_require_a_positive_count() {
        let mut endpoint = board();
        invoke(&mut endpoint, "pulse_f1", vec![json!(16)]).expect("pulse");
        let error =
            invoke(&mut endpoint, "pulse_f2", vec![json!(0)]).expect_err("should reject zero");
        assert!(matches!(error, EndpointError::InvalidArgument { .. }));
    }
}
