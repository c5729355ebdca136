use std::thread;
use std::time::Duration;

use bdaqctrl_backend::*;

// Demo run against the software loopback: the DO streamer synthesizes a
// quantized sine into the packed port byte while the DI sampler reads it
// back, like a DO-to-DI wire on the terminal block.
fn main() {
    env_logger::init();

    let descr: DeviceDescription = "USB-4704,BID#0".parse().unwrap();
    let port = LoopbackPort::new(1, 1);

    let streamer = DoStreamer::new(Box::new(port.clone()));
    let sampler = DiSampler::new(Box::new(port.clone()));
    let samples = sampler.samples();

    // Waveform output: offset 1 V, amplitude 1 V, 5 Hz.
    streamer.set_waveform(true, 1.0, 1.0, 5.0).unwrap();
    sampler.start_reading();
    thread::sleep(Duration::from_millis(500));

    for sample in samples.try_iter().take(8) {
        let packet = PortPacket::decode(sample.value);
        println!(
            "DI {:08b} | enable: {} | level: {} V | freq: {} Hz | t: {:.3}",
            sample.value, packet.enable, packet.level, packet.frequency, sample.time
        );
    }

    // Analog side: one 1 V sine period of 100 samples, streamed at 100 S/s,
    // with the capture loop reading the latched voltage back.
    let generator = AoGenerator::new(
        Box::new(port.clone()),
        SignalTable::from_spec(&WaveSpec::new_sine(100, Some(1.0), Some(1.0))).unwrap(),
        100,
    );
    let capture = AiSampler::new(Box::new(port.clone()), 1, 100);
    let frames = capture.frames();
    generator.start().unwrap();
    capture.start_reading();
    thread::sleep(Duration::from_millis(300));
    println!(
        "AO cycles: {} | last sample: {:.3} V",
        generator.cycles(),
        port.analog_value(0)
    );
    for frame in frames.try_iter().take(4) {
        println!("AI ch0: {:.3} V | t: {:.3}", frame.values[0], frame.time);
    }

    // Tab-switch semantics: activating DI pauses the other tasks but keeps
    // their state and device handles alive.
    let mut session = Session::new(descr);
    session.add_task("DO", Box::new(streamer));
    session.add_task("DI", Box::new(sampler));
    session.add_task("AI", Box::new(capture));
    session.add_task("AO", Box::new(generator));
    session.activate("DI").unwrap();
    for name in session.task_names() {
        println!("task {}: running={}", name, session.task(name).is_running());
    }
}
