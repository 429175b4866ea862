//! Controller harness over a virtual serial device

use super::{read_timeout, test_timeout};
use serialplot_rs::transport::{VirtualDevice, VirtualPort};
use serialplot_rs::{PipelineConfig, PipelineController, PipelineEvent, SerialSettings};
use std::time::{Duration, Instant};

/// Settings for the virtual port
pub fn virtual_settings() -> SerialSettings {
    SerialSettings::new("virtual0", 115200).with_timeout(read_timeout())
}

/// A controller wired to a virtual device
pub fn virtual_controller(config: PipelineConfig) -> (PipelineController, VirtualDevice) {
    let (port, device) = VirtualPort::pair();
    let controller =
        PipelineController::new(config, Box::new(port)).expect("Failed to create controller");
    (controller, device)
}

/// Poll until an event matches `pred`, returning every event seen
pub fn wait_for_event(
    controller: &mut PipelineController,
    pred: impl Fn(&PipelineEvent) -> bool,
) -> Vec<PipelineEvent> {
    let deadline = Instant::now() + test_timeout();
    let mut seen = Vec::new();
    while Instant::now() < deadline {
        let events = controller.poll_events();
        let found = events.iter().any(&pred);
        seen.extend(events);
        if found {
            return seen;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("Timed out waiting for event, saw {:?}", seen);
}

/// Spin until `cond` holds
pub fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + test_timeout();
    while !cond() {
        assert!(Instant::now() < deadline, "Timed out waiting for condition");
        std::thread::sleep(Duration::from_millis(5));
    }
}

pub fn is_connected(event: &PipelineEvent) -> bool {
    matches!(
        event,
        PipelineEvent::ConnectionStatus { success: true, state, .. } if state.is_connected()
    )
}

/// Start recording and wait for the connection to open
pub fn start_and_wait(controller: &mut PipelineController, settings: SerialSettings) {
    controller
        .start_recording(settings)
        .expect("Failed to start recording");
    wait_for_event(controller, is_connected);
}
