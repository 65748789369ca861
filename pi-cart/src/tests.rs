use rstest::rstest;
use strum::IntoEnumIterator;

use super::*;

fn sample_cart() -> Cartridge {
    let mut notes = [Note::default(); NOTE_COUNT];
    notes[0] = Note {
        frequency: 440,
        volume: 200,
        waveform: Waveform::Square,
    };
    notes[1] = Note {
        frequency: 880,
        volume: 128,
        waveform: Waveform::Noise,
    };

    Cartridge {
        version: CART_VERSION,
        flags: CartFlags::empty(),
        sprites: vec![
            SpriteData {
                width: 2,
                height: 2,
                pixels: vec![1, 2, 3, 4],
            },
            SpriteData {
                width: 1,
                height: 3,
                pixels: vec![7, 0, 7],
            },
        ],
        sfx: vec![SfxData {
            speed: 4,
            length: 2,
            notes,
        }],
        code: b"pixel(0, 0, 1)".to_vec(),
    }
}

#[test]
fn roundtrip_is_byte_identical() {
    let cart = sample_cart();

    let mut first = Vec::new();
    cart.encode(&mut first).expect("encode");

    let decoded = Cartridge::decode(first.as_slice()).expect("decode");
    assert_eq!(decoded, cart);

    let mut second = Vec::new();
    decoded.encode(&mut second).expect("re-encode");
    assert_eq!(first, second);
}

#[test]
fn empty_cart_roundtrips() {
    let cart = Cartridge::from_source("");
    let mut bytes = Vec::new();
    cart.encode(&mut bytes).expect("encode");
    // Header only: magic + 4 u16 fields + u32 code size.
    assert_eq!(bytes.len(), 3 + 8 + 4);
    assert_eq!(Cartridge::decode(bytes.as_slice()).expect("decode"), cart);
}

#[test]
fn bad_magic_is_rejected() {
    let mut bytes = Vec::new();
    sample_cart().encode(&mut bytes).expect("encode");
    bytes[0] = b'Q';

    match Cartridge::decode(bytes.as_slice()) {
        Err(CartError::BadMagic(magic)) => assert_eq!(&magic, b"QX1"),
        other => panic!("expected BadMagic, got {other:?}"),
    }
}

#[test]
fn unsupported_version_is_rejected() {
    let mut bytes = Vec::new();
    sample_cart().encode(&mut bytes).expect("encode");
    bytes[3] = 9;

    assert!(matches!(
        Cartridge::decode(bytes.as_slice()),
        Err(CartError::UnsupportedVersion(9))
    ));
}

#[rstest]
#[case(12, "header")]
#[case(20, "sprite")]
fn truncation_names_the_section(#[case] keep: usize, #[case] section: &str) {
    let mut bytes = Vec::new();
    sample_cart().encode(&mut bytes).expect("encode");
    bytes.truncate(keep);

    match Cartridge::decode(bytes.as_slice()) {
        Err(CartError::Truncated(s)) => assert_eq!(s, section),
        other => panic!("expected Truncated({section}), got {other:?}"),
    }
}

#[test]
fn invalid_waveform_is_rejected() {
    let mut bytes = Vec::new();
    sample_cart().encode(&mut bytes).expect("encode");
    // First note's waveform byte: header(15) + two sprites (4+4 and 4+3)
    // + sfx speed/length (4) + frequency (2) + volume (1).
    let offset = 15 + 8 + 7 + 4 + 3;
    bytes[offset] = 250;

    assert!(matches!(
        Cartridge::decode(bytes.as_slice()),
        Err(CartError::InvalidWaveform(250))
    ));
}

#[test]
fn waveform_bytes_roundtrip() {
    for wave in Waveform::iter() {
        assert_eq!(Waveform::try_from(wave as u8).unwrap(), wave);
    }
    assert!(Waveform::try_from(5).is_err());
}

#[test]
fn source_is_fed_back_as_text() {
    let cart = Cartridge::from_source("let x = 1");
    assert_eq!(cart.source(), "let x = 1");
}
