#![no_main]

use libfuzzer_sys::fuzz_target;
use smimesign::{Cert, SignedMessage, TrustRoots};
use smimesign::ber::ber_to_der;

fuzz_target!(|data: &[u8]| {
    let (which, data) = match data.split_first() {
        Some((first, data)) => (*first, data),
        None => return,
    };

    match which % 3 {
        0 => { let _ = ber_to_der(data); },
        1 => { let _ = Cert::decode(data); },
        2 => {
            if let Ok(msg) = SignedMessage::parse(data) {
                let _ = msg.to_der();
                let _ = msg.get_certificates();
                let _ = msg.verify(&TrustRoots::UnsafeNoVerify);
            }
        },
        _ => panic!("what?"),
    }
});
