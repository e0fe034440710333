//! Simulated bench power supply.
//!
//! Three-channel supply in the style of the bench unit the stand uses:
//! channel 1 feeds the SiPM bias, channel 2 the trigger-board LED, channel 3
//! is general purpose. Voltages are setpoints; the simulated unit regulates
//! perfectly, so readback equals setpoint.

use serde_json::{Value, json};

use crate::dispatch::DiagnosticRelay;

use super::{CallArgs, Endpoint, EndpointError, config_dummy_flag};

const PSU_SOURCE: &str = "psu";

const CHANNELS: i64 = 3;
const MAX_VOLTAGE: f64 = 30.0;
const SIPM_CHANNEL: usize = 0;
const TB_LED_CHANNEL: usize = 1;

const TELEMETRY: &[&str] = &["get_voltage", "get_sipm", "get_tb_led"];
const OPERATIONS: &[&str] = &[
    "reset_devices",
    "set_voltage",
    "set_sipm",
    "set_tb_led",
    "reset",
];

/// Bench power supply endpoint.
pub struct PowerSupplyEndpoint {
    initialized: bool,
    dummy: bool,
    voltage: [f64; 3],
}

impl PowerSupplyEndpoint {
    /// Creates an unconfigured supply; `reset_devices` brings it up.
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: false,
            dummy: false,
            voltage: [0.0; 3],
        }
    }

    fn reset_devices(&mut self, config: &Value, relay: &DiagnosticRelay) {
        self.dummy = config_dummy_flag(config);
        self.voltage = [0.0; 3];
        self.initialized = true;
        relay.info(PSU_SOURCE, "power supply reset; all channels at zero");
    }

    fn channel(call: &CallArgs<'_>) -> Result<usize, EndpointError> {
        let channel = call.i64(0, "channel")?;
        if !(1..=CHANNELS).contains(&channel) {
            return Err(EndpointError::invalid_argument(
                "channel",
                format!("channel must be within 1..={CHANNELS}"),
            ));
        }
        Ok(usize::try_from(channel - 1).unwrap_or_default())
    }

    fn checked_voltage(value: f64) -> Result<f64, EndpointError> {
        if !(0.0..=MAX_VOLTAGE).contains(&value) {
            return Err(EndpointError::invalid_argument(
                "value",
                format!("voltage must be within 0..={MAX_VOLTAGE} V"),
            ));
        }
        Ok(value)
    }

    fn set_voltage(&mut self, call: &CallArgs<'_>, relay: &DiagnosticRelay) -> Result<Value, EndpointError> {
        let channel = Self::channel(call)?;
        let value = Self::checked_voltage(call.f64(1, "value")?)?;
        self.voltage[channel] = value;
        relay.info(
            PSU_SOURCE,
            format!("channel {} set to {value:.3} V", channel + 1),
        );
        Ok(Value::Null)
    }

    fn set_named(
        &mut self,
        channel: usize,
        call: &CallArgs<'_>,
        relay: &DiagnosticRelay,
        label: &str,
    ) -> Result<Value, EndpointError> {
        let value = Self::checked_voltage(call.f64(0, "value")?)?;
        self.voltage[channel] = value;
        relay.info(PSU_SOURCE, format!("{label} set to {value:.3} V"));
        Ok(Value::Null)
    }
}

impl Default for PowerSupplyEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl Endpoint for PowerSupplyEndpoint {
    fn name(&self) -> &str {
        "psu"
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
            "get_voltage" => {
                let channel = Self::channel(call)?;
                Ok(json!(self.voltage[channel]))
            }
            "get_sipm" => Ok(json!(self.voltage[SIPM_CHANNEL])),
            "get_tb_led" => Ok(json!(self.voltage[TB_LED_CHANNEL])),
            "reset_devices" => {
                let config = call.value(0, "config").cloned().unwrap_or(json!({}));
                self.reset_devices(&config, relay);
                Ok(Value::Null)
            }
            "set_voltage" => self.set_voltage(call, relay),
            "set_sipm" => self.set_named(SIPM_CHANNEL, call, relay, "SiPM bias"),
            "set_tb_led" => self.set_named(TB_LED_CHANNEL, call, relay, "trigger-board LED"),
            "reset" => {
                self.voltage = [0.0; 3];
                relay.info(PSU_SOURCE, "all channels reset to zero");
                Ok(Value::Null)
            }
            other => Err(EndpointError::driver(format!(
                "psu cannot route method <{other}>"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;

    fn supply() -> PowerSupplyEndpoint {
        let mut endpoint = PowerSupplyEndpoint::new();
        invoke(&mut endpoint, "reset_devices", vec![json!({"dummy": true})]).expect("reset");
        endpoint
    }

    fn invoke(
        endpoint: &mut PowerSupplyEndpoint,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, EndpointError> {
        let kwargs = Map::new();
        let relay = DiagnosticRelay::new();
        let call = CallArgs::new(&args, &kwargs);
        endpoint.invoke(method, &call, &relay)
    }

    #[test]
    fn readback_follows_the_setpoint() {
        let mut endpoint = supply();
        invoke(&mut endpoint, "set_voltage", vec![json!(1), json!(12.0)]).expect("set");

        let readback =
            invoke(&mut endpoint, "get_voltage", vec![json!(1)]).expect("readback");
        assert_eq!(readback, json!(12.0));
        // Other channels stay untouched.
        assert_eq!(
            invoke(&mut endpoint, "get_voltage", vec![json!(2)]).expect("readback"),
            json!(0.0)
        );
    }

    #[test]
    fn channel_and_voltage_ranges_are_enforced() {
        let mut endpoint = supply();
        let error = invoke(&mut endpoint, "set_voltage", vec![json!(4), json!(1.0)])
            .expect_err("channel 4 should be rejected");
        assert!(matches!(error, EndpointError::InvalidArgument { .. }));

        let error = invoke(&mut endpoint, "set_voltage", vec![json!(1), json!(99.0)])
            .expect_err("99 V should be rejected");
        assert!(matches!(error, EndpointError::InvalidArgument { .. }));

        assert_eq!(
            invoke(&mut endpoint, "get_voltage", vec![json!(1)]).expect("readback"),
            json!(0.0)
        );
    }

    #[test]
    fn named_rails_alias_their_channels() {
        let mut endpoint = supply();
        invoke(&mut endpoint, "set_sipm", vec![json!(27.5)]).expect("set sipm");
        invoke(&mut endpoint, "set_tb_led", vec![json!(3.3)]).expect("set led");

        assert_eq!(
            invoke(&mut endpoint, "get_sipm", Vec::new()).expect("sipm"),
            json!(27.5)
        );
        assert_eq!(
            invoke(&mut endpoint, "get_voltage", vec![json!(2)]).expect("channel 2"),
            json!(3.3)
        );
    }

    #[test]
    fn reset_zeroes_every_channel() {
        let mut endpoint = supply();
        invoke(&mut endpoint, "set_voltage", vec![json!(3), json!(5.0)]).expect("set");
        invoke(&mut endpoint, "reset", Vec::new()).expect("reset");
        assert_eq!(
            invoke(&mut endpoint, "get_voltage", vec![json!(3)]).expect("readback"),
            json!(0.0)
        );
    }
}
