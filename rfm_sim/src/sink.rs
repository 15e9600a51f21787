//! Response sink implementations.
//!
//! - `TracingSink` - Logs every event through `tracing`
//! - `JsonLineSink` - One JSON object per line on any writer
//! - `RecordingSink` - Shared in-memory buffer for tests and embedding

use rfm::matcher::sink::{ResponseSink, SimError};
use rfm::matcher::types::{AmsEvent, SimEvent};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Logs events: AMS transitions at INFO, streams and status at DEBUG.
#[derive(Debug, Default)]
pub struct TracingSink;

impl ResponseSink for TracingSink {
    fn send(&mut self, event: &SimEvent) {
        match event {
            SimEvent::InputImpedance(z) => debug!(
                "ZI R={:.4} X={:.4} V={:.2} I={:.3} phase={:.2}",
                z.r, z.x, z.v, z.i, z.phase_deg
            ),
            SimEvent::OutputImpedance(z) => debug!(
                "ZO R={:.4} X={:.4} V={:.2} I={:.3} phase={:.2}",
                z.r, z.x, z.v, z.i, z.phase_deg
            ),
            SimEvent::MotorPositions(motors) => {
                for m in motors {
                    debug!(
                        "MP {} pos={} target={} {:.1}% {:.2}pF",
                        m.name, m.position, m.target, m.percent, m.cap_pf
                    );
                }
            }
            SimEvent::Ams(ams @ (AmsEvent::Status { .. } | AmsEvent::Run { .. })) => {
                debug!("AMS {}: {:?}", ams.label(), ams)
            }
            SimEvent::Ams(ams) => info!("AMS {}: {:?}", ams.label(), ams),
        }
    }
}

/// Writes each event as a JSON line.
pub struct JsonLineSink<W: Write + Send> {
    writer: W,
    failures: u64,
}

impl<W: Write + Send> JsonLineSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            failures: 0,
        }
    }

    /// Events that could not be written.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_event(&mut self, event: &SimEvent) -> Result<(), SimError> {
        serde_json::to_writer(&mut self.writer, event)
            .map_err(|e| SimError::SinkError(format!("Failed to encode event: {}", e)))?;
        self.writer
            .write_all(b"\n")
            .map_err(|e| SimError::SinkError(format!("Failed to write event: {}", e)))
    }
}

impl<W: Write + Send> ResponseSink for JsonLineSink<W> {
    fn send(&mut self, event: &SimEvent) {
        if let Err(e) = self.write_event(event) {
            self.failures += 1;
            if self.failures <= 10 || self.failures % 1000 == 0 {
                warn!("JSON sink failure #{}: {}", self.failures, e);
            }
        }
    }

    fn flush(&mut self) -> Result<(), SimError> {
        self.writer
            .flush()
            .map_err(|e| SimError::SinkError(format!("Failed to flush: {}", e)))
    }
}

/// Collects events into a buffer shared by every clone.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<SimEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn events(&self) -> Vec<SimEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn clear(&self) {
        match self.events.lock() {
            Ok(mut events) => events.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl ResponseSink for RecordingSink {
    fn send(&mut self, event: &SimEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfm::matcher::types::SensorReading;

    #[test]
    fn test_json_lines() {
        let mut sink = JsonLineSink::new(Vec::new());
        sink.send(&SimEvent::Ams(AmsEvent::Matched { vswr: 1.01 }));
        sink.send(&SimEvent::InputImpedance(SensorReading {
            r: 50.0,
            ..Default::default()
        }));
        assert!(sink.flush().is_ok());
        assert_eq!(sink.failures(), 0);

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["type"], "ams");
        assert_eq!(first["data"]["event"], "matched");

        let second: SimEvent = serde_json::from_str(lines[1]).unwrap();
        assert!(matches!(second, SimEvent::InputImpedance(z) if z.r == 50.0));
    }

    #[test]
    fn test_recording_sink_shares_buffer() {
        let sink = RecordingSink::new();
        let mut writer = sink.clone();
        writer.send(&SimEvent::Ams(AmsEvent::Stopped));
        assert_eq!(sink.events(), vec![SimEvent::Ams(AmsEvent::Stopped)]);
        sink.clear();
        assert!(writer.events().is_empty());
    }

    #[test]
    fn test_tracing_sink_accepts_every_event() {
        let mut sink = TracingSink;
        sink.send(&SimEvent::MotorPositions(Vec::new()));
        sink.send(&SimEvent::Ams(AmsEvent::Stopped));
        assert!(sink.flush().is_ok());
    }
}
