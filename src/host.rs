//! Host-side collaborators: the stimulus actuator and the display.
//!
//! The agent decides what to show and when to vibrate; rendering and the
//! motor itself belong to the host.

/// Fire-and-forget stimulus hardware.
pub trait StimulusActuator {
    fn fire(&mut self, pattern: &str);
}

/// Label setters of the watch face.
pub trait UiSink {
    fn set_mode_label(&mut self, text: &str);
    fn set_heart_rate_label(&mut self, text: &str);
    /// Transient message; an empty string clears it.
    fn set_message(&mut self, text: &str);
    fn set_time_label(&mut self, text: &str);
}

/// Actuator that only logs each pulse.
#[derive(Debug, Default)]
pub struct LogActuator {
    pulses: u64,
}

impl LogActuator {
    pub fn pulses(&self) -> u64 {
        self.pulses
    }
}

impl StimulusActuator for LogActuator {
    fn fire(&mut self, pattern: &str) {
        self.pulses += 1;
        tracing::info!(pattern, pulses = self.pulses, "vibration");
    }
}

/// Terminal rendering of the watch face.
///
/// A label is printed only when its text changes.
#[derive(Debug, Default)]
pub struct ConsoleUi {
    mode: String,
    heart_rate: String,
    message: String,
    time: String,
}

impl ConsoleUi {
    fn show(slot: &mut String, name: &str, text: &str) {
        if slot.as_str() != text {
            *slot = text.to_string();
            if text.is_empty() {
                println!("[{name}] (cleared)");
            } else {
                println!("[{name}] {text}");
            }
        }
    }
}

impl UiSink for ConsoleUi {
    fn set_mode_label(&mut self, text: &str) {
        Self::show(&mut self.mode, "mode", text);
    }

    fn set_heart_rate_label(&mut self, text: &str) {
        Self::show(&mut self.heart_rate, "hrm", text);
    }

    fn set_message(&mut self, text: &str) {
        Self::show(&mut self.message, "rc", text);
    }

    fn set_time_label(&mut self, text: &str) {
        Self::show(&mut self.time, "time", text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_ui_tracks_last_text() {
        let mut ui = ConsoleUi::default();
        ui.set_mode_label("Mode: Night");
        ui.set_mode_label("Mode: Night");
        assert_eq!(ui.mode, "Mode: Night");

        ui.set_message("Are you dreaming?");
        ui.set_message("");
        assert!(ui.message.is_empty());
    }

    #[test]
    fn test_log_actuator_counts() {
        let mut actuator = LogActuator::default();
        actuator.fire("ping");
        actuator.fire("ping");
        assert_eq!(actuator.pulses(), 2);
    }
}
