//! Button interrupt example: count debounced presses with a FALLING interrupt.

use breadboard::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct PressCounter {
    presses: Arc<AtomicUsize>,
}

impl Firmware for PressCounter {
    fn setup(&mut self, io: &mut McuIo<'_>) {
        io.pin_mode(2, PinMode::InputPullup);
        io.pin_mode(13, PinMode::Output);
        io.attach_interrupt(2, EdgeMode::Falling);
    }

    fn tick(&mut self, io: &mut McuIo<'_>) {
        let odd = self.presses.load(Ordering::SeqCst) % 2 == 1;
        io.digital_write(13, odd);
    }

    fn on_interrupt(&mut self, pin: u8, edge: Edge, io: &mut McuIo<'_>) {
        let count = self.presses.fetch_add(1, Ordering::SeqCst) + 1;
        println!("  interrupt on pin {} ({:?}) at {} ms, press #{}", pin, edge, io.millis(), count);
    }
}

fn main() -> Result<(), SimError> {
    let mut engine = Engine::with_seed(7);
    engine.add_component("uno", ComponentKind::Microcontroller)?;
    engine.add_component("btn", ComponentKind::PushButton)?;
    engine.connect("btn:1a", "uno:D2")?;
    engine.connect("btn:2a", "uno:GND")?;

    let presses = Arc::new(AtomicUsize::new(0));
    engine.install_firmware(
        "uno",
        Box::new(PressCounter {
            presses: presses.clone(),
        }),
    )?;
    engine.run_ticks(10);

    println!("Quick tap shorter than the bounce window:");
    engine.press("btn")?;
    engine.run_ticks(2);
    engine.release("btn")?;
    engine.run_ticks(20);

    println!("Two real presses:");
    for _ in 0..2 {
        engine.press("btn")?;
        engine.run_ticks(40);
        engine.release("btn")?;
        engine.run_ticks(40);
    }

    println!(
        "\n{} presses counted, D13 is {}",
        presses.load(Ordering::SeqCst),
        if engine.level_at("uno", "D13") { "HIGH" } else { "LOW" }
    );
    Ok(())
}
