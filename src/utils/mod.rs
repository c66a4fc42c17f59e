//utils: telemetry shared by the controller, the demo binary and the benches.
pub mod telemetry;
