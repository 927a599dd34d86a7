//! Blink example: an LED on D13 through a resistor, toggled by firmware.

use breadboard::prelude::*;

struct Blink {
    period_ms: u64,
}

impl Firmware for Blink {
    fn setup(&mut self, io: &mut McuIo<'_>) {
        io.pin_mode(13, PinMode::Output);
    }

    fn tick(&mut self, io: &mut McuIo<'_>) {
        let on = (io.millis() / self.period_ms) % 2 == 1;
        io.digital_write(13, on);
    }
}

fn main() -> Result<(), SimError> {
    let mut engine = Engine::with_seed(42);
    engine.add_component("uno", ComponentKind::Microcontroller)?;
    engine.add_component("r1", ComponentKind::Resistor)?;
    engine.add_component("led1", ComponentKind::Led)?;
    engine.connect("uno:D13", "r1:a")?;
    engine.connect("r1:b", "led1:anode")?;
    engine.connect("led1:cathode", "uno:GND")?;
    engine.install_firmware("uno", Box::new(Blink { period_ms: 500 }))?;

    for _ in 0..8 {
        engine.run_ticks(250);
        let on = matches!(engine.output("led1", "on"), Some(Reading::Bool(true)));
        println!(
            "t={:>5} ms  D13={:<5} led1={}",
            engine.now_ms(),
            engine.level_at("uno", "D13"),
            if on { "on" } else { "off" }
        );
    }

    let stats = breadboard::diagnostics::stats_for(engine.warnings());
    println!("\nWarnings in last tick: {}", stats.total());
    Ok(())
}
