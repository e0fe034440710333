//! Simulated frame-capture endpoint.

use serde_json::{Value, json};

use crate::dispatch::DiagnosticRelay;

use super::{CallArgs, Endpoint, EndpointError, config_dummy_flag};

/// Visual-inspection camera over the test stand.
pub struct CameraEndpoint {
    initialized: bool,
    dummy: bool,
    device: String,
    frames_served: u64,
}

impl CameraEndpoint {
    /// Creates an unconfigured camera; `reset_devices` brings it up.
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: false,
            dummy: false,
            device: String::new(),
            frames_served: 0,
        }
    }

    fn reset(&mut self, config: &Value, relay: &DiagnosticRelay) {
        self.dummy = config_dummy_flag(config);
        self.device = config
            .get("device")
            .and_then(Value::as_str)
            .unwrap_or("/dev/video0")
            .to_string();
        self.frames_served = 0;
        self.initialized = true;
        relay.info(
            "camera",
            format!("camera ready on device [{}]", self.device),
        );
    }

    fn get_frame(&mut self) -> Value {
        self.frames_served += 1;
        json!({
            "device": self.device,
            "index": self.frames_served,
            "width": 1280,
            "height": 720,
        })
    }
}

impl Default for CameraEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl Endpoint for CameraEndpoint {
    fn name(&self) -> &str {
        "camera"
    }

    fn telemetry_methods(&self) -> &'static [&'static str] {
        &["get_frame"]
    }

    fn operation_methods(&self) -> &'static [&'static str] {
        &["reset_devices"]
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn is_dummy(&self) -> bool {
        self.dummy
    }

    fn supports(&self, method: &str) -> bool {
        matches!(method, "get_frame" | "reset_devices")
    }

    fn invoke(
        &mut self,
        method: &str,
        call: &CallArgs<'_>,
        relay: &DiagnosticRelay,
    ) -> Result<Value, EndpointError> {
        match method {
            "get_frame" => Ok(self.get_frame()),
            "reset_devices" => {
                let config = call.value(0, "config").cloned().unwrap_or(json!({}));
                self.reset(&config, relay);
                Ok(Value::Null)
            }
            other => Err(EndpointError::driver(format!(
                "camera cannot route method <{other}>"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;

    fn invoke(
        camera: &mut CameraEndpoint,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, EndpointError> {
        let kwargs = Map::new();
        let relay = DiagnosticRelay::new();
        let call = CallArgs::new(&args, &kwargs);
        camera.invoke(method, &call, &relay)
    }

    #[test]
    fn starts_uninitialized_until_reset() {
        let mut camera = CameraEndpoint::new();
        assert!(!camera.is_initialized());

        invoke(&mut camera, "reset_devices", vec![json!({"dummy": true})]).expect("reset");
        assert!(camera.is_initialized());
        assert!(camera.is_dummy());
    }

    #[test]
    fn frames_carry_an_increasing_index() {
        let mut camera = CameraEndpoint::new();
        invoke(
            &mut camera,
            "reset_devices",
            vec![json!({"device": "/dev/video2"})],
        )
        .expect("reset");

        let first = invoke(&mut camera, "get_frame", Vec::new()).expect("frame");
        let second = invoke(&mut camera, "get_frame", Vec::new()).expect("frame");
        assert_eq!(first["index"], json!(1));
        assert_eq!(second["index"], json!(2));
        assert_eq!(first["device"], json!("/dev/video2"));
    }
}
