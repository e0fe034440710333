//! Simulated DRS4 waveform digitizer.
//!
//! Four readout channels plus an external trigger input. Collections are
//! single-shot: arming the board captures one event, and reading a waveform
//! flushes it. The simulated board regulates its sampling rate perfectly, and
//! calibration restores the factory default rate.

use serde_json::{Value, json};

use crate::dispatch::DiagnosticRelay;

use super::{CallArgs, Endpoint, EndpointError, config_dummy_flag};

const DRS_SOURCE: &str = "drs";

const READOUT_CHANNELS: i64 = 4;
/// Trigger channel index meaning the external trigger input.
const EXTERNAL_TRIGGER: i64 = 4;
const MAX_SAMPLES: i64 = 2048;
const DEFAULT_SAMPLES: i64 = 1024;
/// Factory sampling rate in GS/s; calibration restores it.
const DEFAULT_RATE_GSPS: f64 = 2.0;
const MIN_RATE_GSPS: f64 = 0.1;
const MAX_RATE_GSPS: f64 = 5.0;
const DEFAULT_TRIGGER_LEVEL_V: f64 = 0.05;
const RISING_EDGE: i64 = 0;
const FALLING_EDGE: i64 = 1;
/// Half-width in samples of the synthetic pulse placed in each waveform.
const PULSE_HALF_WIDTH: usize = 8;

const TELEMETRY: &[&str] = &[
    "get_waveform",
    "get_time_slice",
    "get_trigger_channel",
    "get_trigger_direction",
    "get_trigger_level",
    "get_trigger_delay",
    "get_samples",
    "get_rate",
    "is_available",
    "is_ready",
];
const OPERATIONS: &[&str] = &[
    "reset_devices",
    "start_collection",
    "force_stop",
    "run_calibration",
    "set_trigger",
    "set_samples",
    "set_rate",
    "reset",
];

/// Waveform digitizer endpoint.
pub struct DrsEndpoint {
    initialized: bool,
    dummy: bool,
    trigger_channel: i64,
    trigger_level: f64,
    trigger_direction: i64,
    trigger_delay: i64,
    samples: i64,
    rate: f64,
    collecting: bool,
}

impl DrsEndpoint {
    /// Creates an unconfigured digitizer; `reset_devices` brings it up.
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: false,
            dummy: false,
            trigger_channel: EXTERNAL_TRIGGER,
            trigger_level: DEFAULT_TRIGGER_LEVEL_V,
            trigger_direction: RISING_EDGE,
            trigger_delay: 0,
            samples: DEFAULT_SAMPLES,
            rate: DEFAULT_RATE_GSPS,
            collecting: false,
        }
    }

    fn reset_devices(&mut self, config: &Value, relay: &DiagnosticRelay) {
        self.dummy = config_dummy_flag(config);
        self.apply_defaults();
        self.initialized = true;
        relay.info(
            DRS_SOURCE,
            format!("digitizer reset; external trigger, {DEFAULT_RATE_GSPS} GS/s"),
        );
    }

    fn apply_defaults(&mut self) {
        self.trigger_channel = EXTERNAL_TRIGGER;
        self.trigger_level = DEFAULT_TRIGGER_LEVEL_V;
        self.trigger_direction = RISING_EDGE;
        self.trigger_delay = 0;
        self.samples = DEFAULT_SAMPLES;
        self.rate = DEFAULT_RATE_GSPS;
        self.collecting = false;
    }

    fn readout_channel(call: &CallArgs<'_>) -> Result<usize, EndpointError> {
        let channel = call.i64(0, "channel")?;
        if !(0..READOUT_CHANNELS).contains(&channel) {
            return Err(EndpointError::invalid_argument(
                "channel",
                format!("readout channel must be within 0..{READOUT_CHANNELS}"),
            ));
        }
        Ok(usize::try_from(channel).unwrap_or_default())
    }

    fn set_trigger(
        &mut self,
        call: &CallArgs<'_>,
        relay: &DiagnosticRelay,
    ) -> Result<Value, EndpointError> {
        let channel = call.i64(0, "channel")?;
        if !(0..=EXTERNAL_TRIGGER).contains(&channel) {
            return Err(EndpointError::invalid_argument(
                "channel",
                format!("trigger channel must be within 0..={EXTERNAL_TRIGGER}"),
            ));
        }
        let level = call.f64(1, "level")?;
        let direction = call.i64(2, "direction")?;
        if direction != RISING_EDGE && direction != FALLING_EDGE {
            return Err(EndpointError::invalid_argument(
                "direction",
                "trigger direction must be 0 (rising) or 1 (falling)",
            ));
        }
        let delay = call.i64(3, "delay")?;
        if delay < 0 {
            return Err(EndpointError::invalid_argument(
                "delay",
                "trigger delay must be non-negative nanoseconds",
            ));
        }

        self.trigger_channel = channel;
        // The external input has a fixed comparator; level and edge only
        // apply to the readout channels.
        if channel < EXTERNAL_TRIGGER {
            self.trigger_level = level;
            self.trigger_direction = direction;
        }
        self.trigger_delay = delay;
        relay.info(
            DRS_SOURCE,
            format!("trigger moved to channel {channel}, delay {delay} ns"),
        );
        Ok(Value::Null)
    }

    fn set_samples(&mut self, call: &CallArgs<'_>) -> Result<Value, EndpointError> {
        let samples = call.i64(0, "samples")?;
        if samples <= 0 {
            return Err(EndpointError::invalid_argument(
                "samples",
                "sample count must be positive",
            ));
        }
        // The capture depth is bounded by the sampling cell array.
        self.samples = samples.min(MAX_SAMPLES);
        Ok(Value::Null)
    }

    fn set_rate(&mut self, call: &CallArgs<'_>) -> Result<Value, EndpointError> {
        let rate = call.f64(0, "rate")?;
        if !(MIN_RATE_GSPS..=MAX_RATE_GSPS).contains(&rate) {
            return Err(EndpointError::invalid_argument(
                "rate",
                format!("sampling rate must be within {MIN_RATE_GSPS}..={MAX_RATE_GSPS} GS/s"),
            ));
        }
        self.rate = rate;
        Ok(Value::Null)
    }

    fn run_calibration(&mut self, relay: &DiagnosticRelay) -> Result<Value, EndpointError> {
        if self.collecting {
            return Err(EndpointError::driver(
                "cannot calibrate while a collection is armed",
            ));
        }
        // Calibration runs at the factory rate and leaves it applied.
        self.rate = DEFAULT_RATE_GSPS;
        relay.info(
            DRS_SOURCE,
            format!("calibration complete; sampling rate at {DEFAULT_RATE_GSPS} GS/s"),
        );
        Ok(Value::Null)
    }

    /// Synthetic capture: a triangular pulse near the start of the window,
    /// scaled per channel so traces are distinguishable.
    #[allow(clippy::cast_precision_loss)]
    fn waveform(&self, channel: usize) -> Vec<f64> {
        let samples = usize::try_from(self.samples).unwrap_or_default();
        let peak = DEFAULT_TRIGGER_LEVEL_V * ((channel + 1) as f64);
        let centre = samples / 4;
        (0..samples)
            .map(|index| {
                let distance = index.abs_diff(centre);
                if distance < PULSE_HALF_WIDTH {
                    peak * (1.0 - (distance as f64) / (PULSE_HALF_WIDTH as f64))
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Sample timestamps in nanoseconds at the configured rate.
    #[allow(clippy::cast_precision_loss)]
    fn time_slice(&self) -> Vec<f64> {
        let samples = usize::try_from(self.samples).unwrap_or_default();
        let step = 1.0 / self.rate;
        (0..samples).map(|index| (index as f64) * step).collect()
    }
}

impl Default for DrsEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl Endpoint for DrsEndpoint {
    fn name(&self) -> &str {
        "drs"
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
            "get_waveform" => {
                let channel = Self::readout_channel(call)?;
                // Reading flushes the single-shot capture.
                self.collecting = false;
                Ok(json!(self.waveform(channel)))
            }
            "get_time_slice" => Ok(json!(self.time_slice())),
            "get_trigger_channel" => Ok(json!(self.trigger_channel)),
            "get_trigger_direction" => Ok(json!(self.trigger_direction)),
            "get_trigger_level" => Ok(json!(self.trigger_level)),
            "get_trigger_delay" => Ok(json!(self.trigger_delay)),
            "get_samples" => Ok(json!(self.samples)),
            "get_rate" => Ok(json!(self.rate)),
            "is_available" => Ok(Value::Bool(true)),
            "is_ready" => Ok(Value::Bool(!self.collecting)),
            "reset_devices" => {
                let config = call.value(0, "config").cloned().unwrap_or(json!({}));
                self.reset_devices(&config, relay);
                Ok(Value::Null)
            }
            "start_collection" => {
                if self.collecting {
                    return Err(EndpointError::driver("a collection is already armed"));
                }
                self.collecting = true;
                Ok(Value::Null)
            }
            "force_stop" => {
                self.collecting = false;
                relay.info(DRS_SOURCE, "collection stopped by soft trigger");
                Ok(Value::Null)
            }
            "run_calibration" => self.run_calibration(relay),
            "set_trigger" => self.set_trigger(call, relay),
            "set_samples" => self.set_samples(call),
            "set_rate" => self.set_rate(call),
            "reset" => {
                self.apply_defaults();
                relay.info(DRS_SOURCE, "digitizer returned to default settings");
                Ok(Value::Null)
            }
            other => Err(EndpointError::driver(format!(
                "drs cannot route method <{other}>"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;

    fn digitizer() -> DrsEndpoint {
        let mut endpoint = DrsEndpoint::new();
        invoke(&mut endpoint, "reset_devices", vec![json!({"dummy": true})]).expect("reset");
        endpoint
    }

    fn invoke(
        endpoint: &mut DrsEndpoint,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, EndpointError> {
        let kwargs = Map::new();
        let relay = DiagnosticRelay::new();
        let call = CallArgs::new(&args, &kwargs);
        endpoint.invoke(method, &call, &relay)
    }

    #[test]
    fn fresh_board_reports_the_default_trigger() {
        let mut endpoint = digitizer();
        assert_eq!(
            invoke(&mut endpoint, "get_trigger_channel", Vec::new()).expect("channel"),
            json!(EXTERNAL_TRIGGER)
        );
        assert_eq!(
            invoke(&mut endpoint, "get_trigger_level", Vec::new()).expect("level"),
            json!(DEFAULT_TRIGGER_LEVEL_V)
        );
        assert_eq!(
            invoke(&mut endpoint, "get_samples", Vec::new()).expect("samples"),
            json!(DEFAULT_SAMPLES)
        );
        assert_eq!(
            invoke(&mut endpoint, "get_rate", Vec::new()).expect("rate"),
            json!(DEFAULT_RATE_GSPS)
        );
    }

    #[test]
    fn set_trigger_validates_channel_and_direction() {
        let mut endpoint = digitizer();
        let error = invoke(
            &mut endpoint,
            "set_trigger",
            vec![json!(5), json!(0.1), json!(0), json!(0)],
        )
        .expect_err("channel 5 should be rejected");
        assert!(matches!(error, EndpointError::InvalidArgument { .. }));

        let error = invoke(
            &mut endpoint,
            "set_trigger",
            vec![json!(1), json!(0.1), json!(2), json!(0)],
        )
        .expect_err("direction 2 should be rejected");
        assert!(matches!(error, EndpointError::InvalidArgument { .. }));
    }

    #[test]
    fn external_trigger_keeps_the_stored_level() {
        let mut endpoint = digitizer();
        invoke(
            &mut endpoint,
            "set_trigger",
            vec![json!(1), json!(0.25), json!(1), json!(40)],
        )
        .expect("trigger on channel 1");

        invoke(
            &mut endpoint,
            "set_trigger",
            vec![json!(4), json!(0.9), json!(0), json!(80)],
        )
        .expect("trigger on external input");

        assert_eq!(
            invoke(&mut endpoint, "get_trigger_channel", Vec::new()).expect("channel"),
            json!(4)
        );
        // Level and edge belong to the readout comparators only.
        assert_eq!(
            invoke(&mut endpoint, "get_trigger_level", Vec::new()).expect("level"),
            json!(0.25)
        );
        assert_eq!(
            invoke(&mut endpoint, "get_trigger_direction", Vec::new()).expect("direction"),
            json!(1)
        );
        assert_eq!(
            invoke(&mut endpoint, "get_trigger_delay", Vec::new()).expect("delay"),
            json!(80)
        );
    }

    #[test]
    fn collection_is_single_shot() {
        let mut endpoint = digitizer();
        invoke(&mut endpoint, "start_collection", Vec::new()).expect("arm");
        assert_eq!(
            invoke(&mut endpoint, "is_ready", Vec::new()).expect("ready"),
            json!(false)
        );

        let error = invoke(&mut endpoint, "start_collection", Vec::new())
            .expect_err("double arm should be rejected");
        assert!(matches!(error, EndpointError::Driver(_)));

        let waveform = invoke(&mut endpoint, "get_waveform", vec![json!(0)]).expect("read");
        let samples = waveform.as_array().expect("array").len();
        assert_eq!(samples, usize::try_from(DEFAULT_SAMPLES).expect("depth"));
        assert_eq!(
            invoke(&mut endpoint, "is_ready", Vec::new()).expect("ready"),
            json!(true)
        );
    }

    #[test]
    fn force_stop_clears_an_armed_collection() {
        let mut endpoint = digitizer();
        invoke(&mut endpoint, "start_collection", Vec::new()).expect("arm");
        invoke(&mut endpoint, "force_stop", Vec::new()).expect("stop");
        assert_eq!(
            invoke(&mut endpoint, "is_ready", Vec::new()).expect("ready"),
            json!(true)
        );
    }

    #[test]
    fn sample_depth_is_capped() {
        let mut endpoint = digitizer();
        invoke(&mut endpoint, "set_samples", vec![json!(100_000)]).expect("set");
        assert_eq!(
            invoke(&mut endpoint, "get_samples", Vec::new()).expect("samples"),
            json!(MAX_SAMPLES)
        );

        invoke(&mut endpoint, "set_samples", vec![json!(256)]).expect("set");
        let waveform = invoke(&mut endpoint, "get_waveform", vec![json!(2)]).expect("read");
        assert_eq!(waveform.as_array().expect("array").len(), 256);

        let error = invoke(&mut endpoint, "set_samples", vec![json!(0)])
            .expect_err("zero depth should be rejected");
        assert!(matches!(error, EndpointError::InvalidArgument { .. }));
    }

    #[test]
    fn calibration_restores_the_default_rate() {
        let mut endpoint = digitizer();
        invoke(&mut endpoint, "set_rate", vec![json!(4.0)]).expect("set rate");
        invoke(&mut endpoint, "run_calibration", Vec::new()).expect("calibrate");
        assert_eq!(
            invoke(&mut endpoint, "get_rate", Vec::new()).expect("rate"),
            json!(DEFAULT_RATE_GSPS)
        );

        invoke(&mut endpoint, "start_collection", Vec::new()).expect("arm");
        let error = invoke(&mut endpoint, "run_calibration", Vec::new())
            .expect_err("calibrating an armed board should fail");
        assert!(matches!(error, EndpointError::Driver(_)));
    }

    #[test]
    fn time_slice_follows_the_sampling_rate() {
        let mut endpoint = digitizer();
        invoke(&mut endpoint, "set_samples", vec![json!(4)]).expect("set samples");
        invoke(&mut endpoint, "set_rate", vec![json!(0.5)]).expect("set rate");
        assert_eq!(
            invoke(&mut endpoint, "get_time_slice", Vec::new()).expect("slice"),
            json!([0.0, 2.0, 4.0, 6.0])
        );
    }
}
