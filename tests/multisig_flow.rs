//! End-to-end multisig backup: a wallet scanned in two fragments, cosigner
//! review, share seed entry and the start of a two-sided plate.

mod common;

use platesmith::config::Config;
use platesmith::input::Button;
use platesmith::multipart::{self, PayloadKind};
use platesmith::testing::TestPlatform;
use platesmith::wallet::mnemonic::{label_for, Mnemonic};
use platesmith::wallet::{Descriptor, KeyDescriptor, ScriptType};

/// A 2-of-3 wallet whose first cosigner is the given mnemonic.
fn wallet_with_share() -> (Descriptor, Mnemonic) {
    let mut m = Mnemonic::empty(12);
    for i in 0..12 {
        m.set(i, (i as u16 * 7) % 128);
    }
    m.fix_checksum();

    let path = ScriptType::P2wsh.standard_path();
    let mut keys = vec![KeyDescriptor::from_seed(&m.seed(""), &path)];
    for i in 1..3u8 {
        keys.push(KeyDescriptor::from_seed(&[i; 32], &path));
    }
    let desc = Descriptor {
        title: "Family Vault".to_string(),
        script: ScriptType::P2wsh,
        threshold: 2,
        keys,
    };
    (desc, m)
}

fn scan_fragment(h: &mut common::Harness, fragment: &str) {
    h.platform.push_scan(vec![fragment.as_bytes().to_vec()]);
    h.platform.deliver_frame(TestPlatform::frame(384, 384));
}

#[test]
fn scanned_wallet_to_share_plate() {
    let config = Config::default();
    let mut h = common::harness(&config);
    h.frame();

    // Multisig page, then into the wallet scanner.
    h.click(Button::Right);
    assert!(h.shows("Backup Multisig"));
    h.click(Button::Button3);
    h.wait_camera();
    h.wait_shows("Scan wallet", 5);

    let (desc, m) = wallet_with_share();
    let fragments = multipart::encode(PayloadKind::Descriptor, &desc.encode(), 2);

    // One fragment is not enough; the scanner stays up.
    scan_fragment(&mut h, &fragments[0]);
    h.frame();
    assert!(h.shows("Scan wallet"));

    // The second fragment completes the payload and the camera stops.
    scan_fragment(&mut h, &fragments[1]);
    h.wait_shows("Family Vault", 50);
    assert!(h.shows("2-of-3"));
    assert!(!h.platform.camera_running());

    // Cosigner pages.
    h.click(Button::Button2);
    assert!(h.shows("Cosigner 1 of 3"));
    h.click(Button::Right);
    assert!(h.shows("Cosigner 2 of 3"));
    h.click(Button::Button1);
    assert!(h.shows("2-of-3"));

    // Enter the share seed on the keyboard.
    h.click(Button::Button3);
    assert!(h.shows("Input seed"));
    h.click(Button::Button3);
    h.click(Button::Button3);
    for word in m.words() {
        h.type_word(label_for(word));
    }
    assert!(h.shows("Recovery phrase"));
    h.click(Button::Button3);

    // The engrave flow knows which share this is.
    h.wait_shows("Share 1 of 3", 5);

    // Backing out at the first step returns to the wallet overview, and
    // from there to the main screen.
    h.click(Button::Button1);
    h.wait_shows("2-of-3", 5);
    h.click(Button::Button1);
    h.wait_shows("Backup Multisig", 5);
}

#[test]
fn seed_code_is_not_accepted_as_a_wallet() {
    let config = Config::default();
    let mut h = common::harness(&config);
    h.frame();
    h.click(Button::Right);
    h.click(Button::Button3);
    h.wait_camera();

    // A bare seed scan must not open the wallet flow.
    h.platform
        .push_scan(vec![b"000001002003004005006007008009010011".to_vec()]);
    h.platform.deliver_frame(TestPlatform::frame(384, 384));
    h.wait_shows("Invalid Code", 50);
    assert!(!h.platform.camera_running());

    // Dismissing lands back on the main screen.
    h.click(Button::Button3);
    h.wait_shows("Backup Multisig", 5);
}

#[test]
fn camera_failure_is_reported_on_screen() {
    let config = Config::default();
    let mut h = common::harness(&config);
    h.frame();
    h.platform.set_camera_error("no video device");
    h.click(Button::Right);
    h.click(Button::Button3);
    h.wait_shows("Camera unavailable", 50);

    h.click(Button::Button1);
    h.wait_shows("Backup Multisig", 5);
}
