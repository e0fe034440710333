//! Typed request stubs, one per daemon endpoint.
//!
//! Every stub method names its wire method explicitly; nothing is derived
//! from the Rust method name, so renaming a stub never changes the protocol.
//! Stubs borrow the session mutably for the duration of a call, which keeps
//! request/response pairing trivially correct.

use serde_json::{Value, json};

use crate::errors::ClientError;
use crate::session::GantryClient;

impl GantryClient {
    /// Stub for the frame-capture endpoint.
    pub fn camera(&mut self) -> Camera<'_> {
        Camera { client: self }
    }

    /// Stub for the motion controller endpoint.
    pub fn gantry(&mut self) -> Gantry<'_> {
        Gantry { client: self }
    }

    /// Stub for the HV/LV board endpoint.
    pub fn hvlv(&mut self) -> Hvlv<'_> {
        Hvlv { client: self }
    }

    /// Stub for the auxiliary sensor board endpoint.
    pub fn senaux(&mut self) -> SenAux<'_> {
        SenAux { client: self }
    }

    /// Stub for the bench power supply endpoint.
    pub fn psu(&mut self) -> PowerSupply<'_> {
        PowerSupply { client: self }
    }

    /// Stub for the waveform digitizer endpoint.
    pub fn drs(&mut self) -> Drs<'_> {
        Drs { client: self }
    }

    /// True once the named endpoint has been initialised.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn is_initialized(&mut self, endpoint: &str) -> Result<bool, ClientError> {
        as_bool("is_initialized", &self.call_args(endpoint, "is_initialized", Vec::new())?)
    }

    /// True when the named endpoint runs a simulated driver.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn is_dummy(&mut self, endpoint: &str) -> Result<bool, ClientError> {
        as_bool("is_dummy", &self.call_args(endpoint, "is_dummy", Vec::new())?)
    }
}

fn as_bool(method: &str, value: &Value) -> Result<bool, ClientError> {
    value.as_bool().ok_or_else(|| ClientError::Shape {
        method: method.to_string(),
    })
}

fn as_f64(method: &str, value: &Value) -> Result<f64, ClientError> {
    value.as_f64().ok_or_else(|| ClientError::Shape {
        method: method.to_string(),
    })
}

fn as_i64(method: &str, value: &Value) -> Result<i64, ClientError> {
    value.as_i64().ok_or_else(|| ClientError::Shape {
        method: method.to_string(),
    })
}

fn as_f64_vec(method: &str, value: &Value) -> Result<Vec<f64>, ClientError> {
    let shape = || ClientError::Shape {
        method: method.to_string(),
    };
    value
        .as_array()
        .ok_or_else(shape)?
        .iter()
        .map(|item| item.as_f64().ok_or_else(shape))
        .collect()
}

fn as_str(method: &str, value: &Value) -> Result<String, ClientError> {
    value
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| ClientError::Shape {
            method: method.to_string(),
        })
}

fn as_triple(method: &str, value: &Value) -> Result<[f64; 3], ClientError> {
    let shape = || ClientError::Shape {
        method: method.to_string(),
    };
    let items = value.as_array().ok_or_else(shape)?;
    if items.len() != 3 {
        return Err(shape());
    }
    Ok([
        items[0].as_f64().ok_or_else(shape)?,
        items[1].as_f64().ok_or_else(shape)?,
        items[2].as_f64().ok_or_else(shape)?,
    ])
}

/// Frame-capture endpoint stub.
pub struct Camera<'a> {
    client: &'a mut GantryClient,
}

impl Camera<'_> {
    /// Captures one frame descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn get_frame(&mut self) -> Result<Value, ClientError> {
        self.client.call_args("camera", "get_frame", Vec::new())
    }

    /// Reinitialises the camera driver from a configuration object.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn reset_devices(&mut self, config: Value) -> Result<(), ClientError> {
        self.client
            .call_args("camera", "reset_devices", vec![config])
            .map(|_| ())
    }
}

/// Motion controller endpoint stub.
pub struct Gantry<'a> {
    client: &'a mut GantryClient,
}

impl Gantry<'_> {
    /// Current coordinate in millimetres.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn get_coord(&mut self) -> Result<[f64; 3], ClientError> {
        as_triple("get_coord", &self.client.call_args("gantry", "get_coord", Vec::new())?)
    }

    /// Configured speed limits in mm/s.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn get_speed(&mut self) -> Result<[f64; 3], ClientError> {
        as_triple("get_speed", &self.client.call_args("gantry", "get_speed", Vec::new())?)
    }

    /// True while a move is still executing.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn in_motion(&mut self) -> Result<bool, ClientError> {
        as_bool("in_motion", &self.client.call_args("gantry", "in_motion", Vec::new())?)
    }

    /// Moves to an absolute coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn move_to(&mut self, x: f64, y: f64, z: f64) -> Result<(), ClientError> {
        self.client
            .call_args("gantry", "move_to", vec![json!(x), json!(y), json!(z)])
            .map(|_| ())
    }

    /// Sets per-axis speed limits.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn set_speed_limit(&mut self, x: f64, y: f64, z: f64) -> Result<(), ClientError> {
        self.client
            .call_args("gantry", "set_speed_limit", vec![json!(x), json!(y), json!(z)])
            .map(|_| ())
    }

    /// Homes the selected axes.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn send_home(&mut self, x: bool, y: bool, z: bool) -> Result<(), ClientError> {
        self.client
            .call_args("gantry", "send_home", vec![json!(x), json!(y), json!(z)])
            .map(|_| ())
    }

    /// Powers the selected stepper drivers.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn enable_stepper(&mut self, x: bool, y: bool, z: bool) -> Result<(), ClientError> {
        self.client
            .call_args("gantry", "enable_stepper", vec![json!(x), json!(y), json!(z)])
            .map(|_| ())
    }

    /// Unpowers the selected stepper drivers.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn disable_stepper(&mut self, x: bool, y: bool, z: bool) -> Result<(), ClientError> {
        self.client
            .call_args("gantry", "disable_stepper", vec![json!(x), json!(y), json!(z)])
            .map(|_| ())
    }

    /// Runs one raw gcode line and returns the controller's reply.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn run_gcode(&mut self, gcode: &str) -> Result<String, ClientError> {
        as_str(
            "run_gcode",
            &self.client.call_args("gantry", "run_gcode", vec![json!(gcode)])?,
        )
    }

    /// Reinitialises the motion driver from a configuration object.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn reset_devices(&mut self, config: Value) -> Result<(), ClientError> {
        self.client
            .call_args("gantry", "reset_devices", vec![config])
            .map(|_| ())
    }
}

/// HV/LV board endpoint stub.
pub struct Hvlv<'a> {
    client: &'a mut GantryClient,
}

impl Hvlv<'_> {
    /// True while the HV rail is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn get_hv_status(&mut self) -> Result<bool, ClientError> {
        as_bool("get_hv_status", &self.client.call_args("hvlv", "get_hv_status", Vec::new())?)
    }

    /// Measured HV output in millivolts.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn get_hv_mv(&mut self) -> Result<f64, ClientError> {
        as_f64("get_hv_mv", &self.client.call_args("hvlv", "get_hv_mv", Vec::new())?)
    }

    /// HV control setpoint in millivolts.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn get_hv_control_mv(&mut self) -> Result<f64, ClientError> {
        as_f64(
            "get_hv_control_mv",
            &self.client.call_args("hvlv", "get_hv_control_mv", Vec::new())?,
        )
    }

    /// LV rail level in millivolts.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn get_lv_mv(&mut self) -> Result<f64, ClientError> {
        as_f64("get_lv_mv", &self.client.call_args("hvlv", "get_lv_mv", Vec::new())?)
    }

    /// VDD reference level in millivolts.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn get_vdd_mv(&mut self) -> Result<f64, ClientError> {
        as_f64("get_vdd_mv", &self.client.call_args("hvlv", "get_vdd_mv", Vec::new())?)
    }

    /// Enables the HV rail.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn hv_enable(&mut self) -> Result<(), ClientError> {
        self.client.call_args("hvlv", "hv_enable", Vec::new()).map(|_| ())
    }

    /// Disables the HV rail.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn hv_disable(&mut self) -> Result<(), ClientError> {
        self.client.call_args("hvlv", "hv_disable", Vec::new()).map(|_| ())
    }

    /// Sets the HV control setpoint in millivolts.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn set_hv_control_mv(&mut self, mv: f64) -> Result<(), ClientError> {
        self.client
            .call_args("hvlv", "set_hv_control_mv", vec![json!(mv)])
            .map(|_| ())
    }

    /// Sets the LV rail in millivolts.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn set_lv_mv(&mut self, mv: f64) -> Result<(), ClientError> {
        self.client.call_args("hvlv", "set_lv_mv", vec![json!(mv)]).map(|_| ())
    }

    /// Reinitialises the board driver from a configuration object.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn reset_devices(&mut self, config: Value) -> Result<(), ClientError> {
        self.client
            .call_args("hvlv", "reset_devices", vec![config])
            .map(|_| ())
    }
}

/// Auxiliary sensor board endpoint stub.
pub struct SenAux<'a> {
    client: &'a mut GantryClient,
}

impl SenAux<'_> {
    /// Power state of photodiode 1.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn status_pd1(&mut self) -> Result<bool, ClientError> {
        as_bool("status_pd1", &self.client.call_args("senaux", "status_pd1", Vec::new())?)
    }

    /// Power state of photodiode 2.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn status_pd2(&mut self) -> Result<bool, ClientError> {
        as_bool("status_pd2", &self.client.call_args("senaux", "status_pd2", Vec::new())?)
    }

    /// ADC reading for a channel in millivolts.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn adc_readmv(&mut self, channel: i64) -> Result<f64, ClientError> {
        as_f64(
            "adc_readmv",
            &self.client.call_args("senaux", "adc_readmv", vec![json!(channel)])?,
        )
    }

    /// Bias resistor for a channel in ohms.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn adc_biasresistor(&mut self, channel: i64) -> Result<f64, ClientError> {
        as_f64(
            "adc_biasresistor",
            &self
                .client
                .call_args("senaux", "adc_biasresistor", vec![json!(channel)])?,
        )
    }

    /// Powers photodiode 1.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn enable_pd1(&mut self) -> Result<(), ClientError> {
        self.client.call_args("senaux", "enable_pd1", Vec::new()).map(|_| ())
    }

    /// Unpowers photodiode 1.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn disable_pd1(&mut self) -> Result<(), ClientError> {
        self.client.call_args("senaux", "disable_pd1", Vec::new()).map(|_| ())
    }

    /// Powers photodiode 2.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn enable_pd2(&mut self) -> Result<(), ClientError> {
        self.client.call_args("senaux", "enable_pd2", Vec::new()).map(|_| ())
    }

    /// Unpowers photodiode 2.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn disable_pd2(&mut self) -> Result<(), ClientError> {
        self.client.call_args("senaux", "disable_pd2", Vec::new()).map(|_| ())
    }

    /// Sends `n` pulses on output f1.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn pulse_f1(&mut self, n: i64) -> Result<(), ClientError> {
        self.client.call_args("senaux", "pulse_f1", vec![json!(n)]).map(|_| ())
    }

    /// Sends `n` pulses on output f2.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn pulse_f2(&mut self, n: i64) -> Result<(), ClientError> {
        self.client.call_args("senaux", "pulse_f2", vec![json!(n)]).map(|_| ())
    }

    /// Reinitialises the board driver from a configuration object.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn reset_devices(&mut self, config: Value) -> Result<(), ClientError> {
        self.client
            .call_args("senaux", "reset_devices", vec![config])
            .map(|_| ())
    }
}

/// Bench power supply endpoint stub.
pub struct PowerSupply<'a> {
    client: &'a mut GantryClient,
}

impl PowerSupply<'_> {
    /// Voltage setpoint of a channel (1-based).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn get_voltage(&mut self, channel: i64) -> Result<f64, ClientError> {
        as_f64(
            "get_voltage",
            &self.client.call_args("psu", "get_voltage", vec![json!(channel)])?,
        )
    }

    /// SiPM bias voltage.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn get_sipm(&mut self) -> Result<f64, ClientError> {
        as_f64("get_sipm", &self.client.call_args("psu", "get_sipm", Vec::new())?)
    }

    /// Trigger-board LED voltage.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn get_tb_led(&mut self) -> Result<f64, ClientError> {
        as_f64("get_tb_led", &self.client.call_args("psu", "get_tb_led", Vec::new())?)
    }

    /// Sets the voltage of a channel (1-based).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn set_voltage(&mut self, channel: i64, value: f64) -> Result<(), ClientError> {
        self.client
            .call_args("psu", "set_voltage", vec![json!(channel), json!(value)])
            .map(|_| ())
    }

    /// Sets the SiPM bias voltage.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn set_sipm(&mut self, value: f64) -> Result<(), ClientError> {
        self.client.call_args("psu", "set_sipm", vec![json!(value)]).map(|_| ())
    }

    /// Sets the trigger-board LED voltage.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn set_tb_led(&mut self, value: f64) -> Result<(), ClientError> {
        self.client.call_args("psu", "set_tb_led", vec![json!(value)]).map(|_| ())
    }

    /// Zeroes every channel.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn reset(&mut self) -> Result<(), ClientError> {
        self.client.call_args("psu", "reset", Vec::new()).map(|_| ())
    }

    /// Reinitialises the supply driver from a configuration object.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn reset_devices(&mut self, config: Value) -> Result<(), ClientError> {
        self.client
            .call_args("psu", "reset_devices", vec![config])
            .map(|_| ())
    }
}

/// Waveform digitizer endpoint stub.
pub struct Drs<'a> {
    client: &'a mut GantryClient,
}

impl Drs<'_> {
    /// Captured waveform of a readout channel in volts.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn get_waveform(&mut self, channel: i64) -> Result<Vec<f64>, ClientError> {
        as_f64_vec(
            "get_waveform",
            &self.client.call_args("drs", "get_waveform", vec![json!(channel)])?,
        )
    }

    /// Sample timestamps in nanoseconds at the configured rate.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn get_time_slice(&mut self) -> Result<Vec<f64>, ClientError> {
        as_f64_vec(
            "get_time_slice",
            &self.client.call_args("drs", "get_time_slice", Vec::new())?,
        )
    }

    /// Active trigger channel; 4 means the external input.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn get_trigger_channel(&mut self) -> Result<i64, ClientError> {
        as_i64(
            "get_trigger_channel",
            &self.client.call_args("drs", "get_trigger_channel", Vec::new())?,
        )
    }

    /// Trigger edge: 0 rising, 1 falling.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn get_trigger_direction(&mut self) -> Result<i64, ClientError> {
        as_i64(
            "get_trigger_direction",
            &self.client.call_args("drs", "get_trigger_direction", Vec::new())?,
        )
    }

    /// Trigger comparator level in volts.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn get_trigger_level(&mut self) -> Result<f64, ClientError> {
        as_f64(
            "get_trigger_level",
            &self.client.call_args("drs", "get_trigger_level", Vec::new())?,
        )
    }

    /// Trigger delay in nanoseconds.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn get_trigger_delay(&mut self) -> Result<i64, ClientError> {
        as_i64(
            "get_trigger_delay",
            &self.client.call_args("drs", "get_trigger_delay", Vec::new())?,
        )
    }

    /// Configured capture depth in samples.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn get_samples(&mut self) -> Result<i64, ClientError> {
        as_i64("get_samples", &self.client.call_args("drs", "get_samples", Vec::new())?)
    }

    /// Sampling rate in GS/s.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn get_rate(&mut self) -> Result<f64, ClientError> {
        as_f64("get_rate", &self.client.call_args("drs", "get_rate", Vec::new())?)
    }

    /// True when a digitizer board answers.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn is_available(&mut self) -> Result<bool, ClientError> {
        as_bool("is_available", &self.client.call_args("drs", "is_available", Vec::new())?)
    }

    /// True when no collection is armed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn is_ready(&mut self) -> Result<bool, ClientError> {
        as_bool("is_ready", &self.client.call_args("drs", "is_ready", Vec::new())?)
    }

    /// Arms a single-shot collection.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn start_collection(&mut self) -> Result<(), ClientError> {
        self.client
            .call_args("drs", "start_collection", Vec::new())
            .map(|_| ())
    }

    /// Stops an armed collection with a soft trigger.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn force_stop(&mut self) -> Result<(), ClientError> {
        self.client.call_args("drs", "force_stop", Vec::new()).map(|_| ())
    }

    /// Runs a calibration pass; the sampling rate comes back at the default.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn run_calibration(&mut self) -> Result<(), ClientError> {
        self.client
            .call_args("drs", "run_calibration", Vec::new())
            .map(|_| ())
    }

    /// Configures the trigger source, level, edge, and delay.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn set_trigger(
        &mut self,
        channel: i64,
        level: f64,
        direction: i64,
        delay: i64,
    ) -> Result<(), ClientError> {
        self.client
            .call_args(
                "drs",
                "set_trigger",
                vec![json!(channel), json!(level), json!(direction), json!(delay)],
            )
            .map(|_| ())
    }

    /// Sets the capture depth in samples.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn set_samples(&mut self, samples: i64) -> Result<(), ClientError> {
        self.client
            .call_args("drs", "set_samples", vec![json!(samples)])
            .map(|_| ())
    }

    /// Sets the sampling rate in GS/s.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn set_rate(&mut self, rate: f64) -> Result<(), ClientError> {
        self.client.call_args("drs", "set_rate", vec![json!(rate)]).map(|_| ())
    }

    /// Returns the digitizer to its default settings.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn reset(&mut self) -> Result<(), ClientError> {
        self.client.call_args("drs", "reset", Vec::new()).map(|_| ())
    }

    /// Reinitialises the digitizer driver from a configuration object.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn reset_devices(&mut self, config: Value) -> Result<(), ClientError> {
        self.client
            .call_args("drs", "reset_devices", vec![config])
            .map(|_| ())
    }
}
