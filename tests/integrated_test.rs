use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bdaqctrl_backend::*;

/// Port that fails every other write but records every attempt.
#[derive(Clone)]
struct FlakyPort {
    attempts: Arc<AtomicUsize>,
}

impl DoPort for FlakyPort {
    fn write(&mut self, _start_port: usize, _buf: &[u8]) -> BioStatus {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt % 2 == 0 {
            BioStatus(-1)
        } else {
            BioStatus::SUCCESS
        }
    }
}

#[test]
fn manual_byte_reaches_the_port() {
    let port = LoopbackPort::new(1, 0);
    let streamer = DoStreamer::new(Box::new(port.clone()));

    streamer.set_manual_value(0b1010_0101).unwrap();
    streamer.set_frequency(10).unwrap();
    streamer.start().unwrap();

    let byte = streamer
        .monitor()
        .recv_timeout(Duration::from_secs(2))
        .expect("no manual byte written");
    assert_eq!(byte, 0b1010_0101);
    assert_eq!(port.digital_value(0), 0b1010_0101);
}

#[test]
fn waveform_bytes_carry_the_configured_frequency() {
    let port = LoopbackPort::new(1, 1);
    let streamer = DoStreamer::new(Box::new(port.clone()));
    let sampler = DiSampler::new(Box::new(port));
    let samples = sampler.samples();

    streamer.set_waveform(true, 1.0, 1.0, 5.0).unwrap();
    sampler.start_reading();

    let sample = samples
        .recv_timeout(Duration::from_secs(2))
        .expect("no loopback sample");
    let packet = PortPacket::decode(sample.value);
    assert!(packet.enable);
    assert_eq!(packet.frequency, 5);
    assert!(packet.level <= 3);
}

#[test]
fn frequency_change_shows_up_in_the_stream() {
    let streamer = DoStreamer::new(Box::new(LoopbackPort::new(1, 0)));
    let monitor = streamer.monitor();

    streamer.set_waveform(true, 1.0, 1.0, 5.0).unwrap();
    let first = monitor.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(PortPacket::decode(first).frequency, 5);

    let starts_before = streamer.start_count();
    streamer.set_frequency(9).unwrap();
    assert_eq!(streamer.start_count(), starts_before + 1);

    // Parameter updates are atomic with a tick: once a byte with the new
    // frequency appears, no later byte may carry the old one.
    let mut seen_new = false;
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while std::time::Instant::now() < deadline {
        let Ok(byte) = monitor.recv_timeout(Duration::from_millis(500)) else {
            break;
        };
        let frequency = PortPacket::decode(byte).frequency;
        if seen_new {
            assert_eq!(frequency, 9, "stale frequency after restart");
        } else if frequency == 9 {
            seen_new = true;
        }
    }
    assert!(seen_new, "new frequency never reached the port");
}

#[test]
fn failed_writes_do_not_stop_the_loop() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let streamer = DoStreamer::new(Box::new(FlakyPort {
        attempts: Arc::clone(&attempts),
    }));

    streamer.set_frequency(20).unwrap();
    streamer.start().unwrap();
    std::thread::sleep(Duration::from_millis(400));

    // Every other write fails, yet attempts keep accumulating at the
    // normal cadence and the state machine stays in the running stage.
    assert!(attempts.load(Ordering::SeqCst) >= 4);
    assert_eq!(streamer.stage(), OutputStage::ManualRunning);
}

#[test]
fn disabling_waveform_leaves_the_enable_bit_latched() {
    let streamer = DoStreamer::new(Box::new(LoopbackPort::new(1, 0)));
    streamer.set_waveform(true, 1.0, 1.0, 5.0).unwrap();
    let _ = streamer
        .monitor()
        .recv_timeout(Duration::from_secs(2))
        .expect("no waveform byte written");

    streamer.set_waveform(false, 0.0, 0.0, 0.0).unwrap();
    // The waveform fields are zeroed, but the last packed byte (enable bit
    // included) stays latched as the manual output value.
    assert_eq!(streamer.frequency(), 0);
    assert_eq!(streamer.amplitude(), 0.0);
    assert_eq!(streamer.offset(), 0.0);
    assert_eq!(streamer.stage(), OutputStage::ManualRunning);
    assert_ne!(streamer.current_value() & 0b1000_0000, 0);
}

#[test]
fn session_switches_between_loopback_tasks() {
    let port = LoopbackPort::new(1, 8);
    let streamer = DoStreamer::new(Box::new(port.clone()));
    let sampler = DiSampler::new(Box::new(port.clone()));
    let capture = AiSampler::new(Box::new(port.clone()), 8, 100);
    streamer.set_frequency(10).unwrap();
    streamer.start().unwrap();

    let mut session = Session::new("USB-4704,BID#0".parse().unwrap());
    session.add_task("DO", Box::new(streamer));
    session.add_task("DI", Box::new(sampler));
    session.add_task("AI", Box::new(capture));

    session.activate("DI").unwrap();
    assert!(!session.task("DO").is_running());
    assert!(session.task("DI").is_running());
    assert!(!session.task("AI").is_running());

    // Switching back resumes the DO loop with its state intact.
    session.activate("DO").unwrap();
    assert!(session.task("DO").is_running());
    assert!(!session.task("DI").is_running());
}

#[test]
fn ai_capture_follows_the_analog_output() {
    let port = LoopbackPort::new(0, 8);
    let table = SignalTable::from_values(vec![2.5]).unwrap();
    let generator = AoGenerator::new(Box::new(port.clone()), table, 100);
    let capture = AiSampler::new(Box::new(port.clone()), 8, 200);
    let frames = capture.frames();

    generator.start().unwrap();
    capture.start_reading();

    // Wait for a frame that has seen the generator's write land.
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    loop {
        let frame = frames
            .recv_timeout(Duration::from_secs(2))
            .expect("no capture frame");
        assert_eq!(frame.values.len(), 8);
        if frame.values[0] == 2.5 {
            break;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "generator output never reached the capture loop"
        );
    }
}

#[test]
fn generator_streams_into_the_analog_latch() {
    let port = LoopbackPort::new(0, 1);
    let table = SignalTable::from_spec(&WaveSpec::new_ramp(4, Some(1.0), Some(1.0))).unwrap();
    let generator = AoGenerator::new(Box::new(port.clone()), table, 100);
    generator.set_cycle_limit(Some(1.0));
    generator.start().unwrap();

    let monitor = generator.monitor();
    let mut emitted = Vec::new();
    while let Ok(value) = monitor.recv_timeout(Duration::from_millis(500)) {
        emitted.push(value);
    }
    assert_eq!(emitted, vec![1.0, 1.25, 1.5, 1.75]);
    assert!(!generator.is_running());
    assert_eq!(port.analog_value(0), 1.75);
}
