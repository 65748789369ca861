//! Booting cartridges end to end: code blob through the pipeline,
//! sprites and SFX adopted by the VM, pixels on the screen.

use pi_vm::prelude::*;

fn cart_with(code: &str) -> Cartridge {
    let mut cart = Cartridge::from_source(code);
    cart.sprites.push(SpriteData {
        width: 2,
        height: 2,
        pixels: vec![1, 2, 3, 4],
    });
    cart
}

#[test]
fn spec_scenario_pixel_and_present() {
    // Magic PX1, version 1, one 2x2 sprite, no sounds, drawing code.
    let cart = cart_with("pixel(0, 0, 1); present()");

    let mut bytes = Vec::new();
    cart.encode(&mut bytes).expect("encode");
    assert_eq!(&bytes[..3], b"PX1");
    let reloaded = Cartridge::decode(bytes.as_slice()).expect("decode");

    let mut console = MemoryConsole::new();
    let state = console.run_cartridge(&reloaded).expect("run");
    assert!(matches!(state, ProgramState::Completed(_)));

    assert_eq!(console.screen().last_frame()[0], 1);
    assert_eq!(console.screen().frames_presented(), 1);
}

#[test]
fn cartridge_sprites_are_script_visible() {
    let cart = cart_with("sprite(0, 10, 10); present()");
    let mut console = MemoryConsole::new();
    console.run_cartridge(&cart).expect("run");

    let screen = console.screen();
    assert_eq!(screen.pixel(10, 10), Some(1));
    assert_eq!(screen.pixel(11, 10), Some(2));
    assert_eq!(screen.pixel(10, 11), Some(3));
    assert_eq!(screen.pixel(11, 11), Some(4));
}

#[test]
fn missing_sprite_faults() {
    let cart = Cartridge::from_source("sprite(3, 0, 0)");
    let mut console = MemoryConsole::new();
    let err = console.run_cartridge(&cart).unwrap_err();
    assert!(matches!(err, InterpreterError::Runtime(_)));
}

#[test]
fn cartridge_sfx_reaches_the_mixer() {
    let mut cart = Cartridge::from_source("play(0)");
    let mut sfx = SfxData {
        speed: 6,
        length: 2,
        ..SfxData::default()
    };
    sfx.notes[0] = Note {
        frequency: 440,
        volume: 200,
        waveform: Waveform::Square,
    };
    sfx.notes[1] = Note {
        frequency: 660,
        volume: 180,
        waveform: Waveform::Triangle,
    };
    cart.sfx.push(sfx);

    let mut console = MemoryConsole::new();
    console.run_cartridge(&cart).expect("run");

    let tones: Vec<Tone> = console.mixer().queued().copied().collect();
    assert_eq!(tones.len(), 2);
    assert_eq!(tones[0].frequency, 440.0);
    assert_eq!(tones[0].waveform, Waveform::Square);
    assert_eq!(tones[1].frequency, 660.0);
    // Two ticks-per-note entries at 60 ticks a second.
    assert_eq!(tones[0].duration_ms, 100);
}

#[test]
fn tone_builtin_uses_wave_constants() {
    let mut console = MemoryConsole::new();
    console
        .run_source("tone(440, 50, WAVE_SQUARE)")
        .expect("run");
    let tone = console.mixer().pop().expect("queued tone");
    assert_eq!(tone.frequency, 440.0);
    assert_eq!(tone.duration_ms, 50);
    assert_eq!(tone.waveform, Waveform::Square);
}

#[test]
fn drawing_builtins_touch_the_framebuffer() {
    let mut console = MemoryConsole::new();
    console
        .run_source("clear(0); line(0, 5, 9, 5, 7); rect(20, 20, 3, 3, 4, true)")
        .expect("run");
    let screen = console.screen();
    for x in 0..=9 {
        assert_eq!(screen.pixel(x, 5), Some(7));
    }
    assert_eq!(screen.pixel(21, 21), Some(4));
    assert_eq!(screen.pixel(24, 21), Some(0));
}

#[test]
fn corrupt_cartridges_do_not_reach_the_vm() {
    let cart = cart_with("pixel(0, 0, 1)");
    let mut bytes = Vec::new();
    cart.encode(&mut bytes).expect("encode");
    bytes.truncate(10);

    let mut console = MemoryConsole::new();
    let cart = Cartridge::decode(bytes.as_slice());
    assert!(cart.is_err());
    // The console surface reports the same failure for files.
    let err = console.run_cartridge_file("/nonexistent/cart.px");
    assert!(matches!(err, Err(InterpreterError::Cartridge(_))));
}

#[test]
fn compile_errors_from_cart_code_surface() {
    let cart = Cartridge::from_source("let = broken");
    let mut console = MemoryConsole::new();
    assert!(matches!(
        console.run_cartridge(&cart),
        Err(InterpreterError::Compile(_))
    ));
}
