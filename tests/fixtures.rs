//! Verifying signatures produced by other tools.

use smimesign::{SignedMessage, TrustRoots, verify, verify_detached};


#[test]
fn gpgsm() {
    let leaves = verify(
        include_bytes!("../test-data/gpgsm-attached.p7s"),
        &TrustRoots::UnsafeNoVerify
    ).unwrap();
    assert_eq!(leaves.len(), 1);
    assert_eq!(
        leaves[0].subject().common_name().as_deref(), Some("Ben Toews")
    );

    let detached = include_bytes!("../test-data/gpgsm-detached.p7s");
    assert!(verify_detached(
        detached, b"hello, world!\n", &TrustRoots::UnsafeNoVerify
    ).is_ok());
    assert!(verify_detached(
        detached, b"hello, world?\n", &TrustRoots::UnsafeNoVerify
    ).is_err());
}

#[test]
fn gpgsm_without_certificates() {
    let mut msg = SignedMessage::parse(
        include_bytes!("../test-data/gpgsm-nocerts.p7s")
    ).unwrap();
    assert!(msg.get_certificates().unwrap().is_empty());
    assert!(
        msg.verify_detached(b"hello, world!\n", &TrustRoots::UnsafeNoVerify)
            .is_err()
    );

    // The detached signature was made with the same key.
    let certs = SignedMessage::parse(
        include_bytes!("../test-data/gpgsm-detached.p7s")
    ).unwrap().get_certificates().unwrap();
    msg.set_certificates(&certs);
    let msg = SignedMessage::parse(&msg.to_der()).unwrap();
    let leaves = msg.verify_detached(
        b"hello, world!\n", &TrustRoots::UnsafeNoVerify
    ).unwrap();
    assert_eq!(leaves, &certs[..1]);
}

#[test]
fn openssl() {
    let attached = SignedMessage::parse(
        include_bytes!("../test-data/openssl-attached.p7s")
    ).unwrap();
    assert_eq!(
        attached.get_data().unwrap().unwrap().as_ref(), b"hello, world!"
    );
    assert!(attached.verify(&TrustRoots::UnsafeNoVerify).is_ok());

    assert!(verify_detached(
        include_bytes!("../test-data/openssl-detached.p7s"),
        b"hello, world!",
        &TrustRoots::UnsafeNoVerify
    ).is_ok());
}

#[test]
fn outlook() {
    let leaves = verify_detached(
        include_bytes!("../test-data/outlook-detached.p7s"),
        include_bytes!("../test-data/outlook-detached.eml"),
        &TrustRoots::UnsafeNoVerify
    ).unwrap();
    assert_eq!(
        leaves[0].subject().common_name().as_deref(), Some("Oren Novotny")
    );
}

#[test]
fn ber_and_pem() {
    // Uses indefinite lengths and a key too small to check.
    let msg = SignedMessage::parse(
        include_bytes!("../test-data/signature-one.p7s")
    ).unwrap();
    let der = msg.to_der();
    let pem = msg.to_pem();
    let reparsed = SignedMessage::parse(pem.as_bytes()).unwrap();
    assert_eq!(reparsed.to_der(), der);
    assert_eq!(SignedMessage::parse(&der).unwrap().to_der(), der);
}
