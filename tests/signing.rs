//! Creating and checking signatures with keys in memory.
#![cfg(feature = "softkeys")]

use bytes::Bytes;
use smimesign::{
    Cert, CertPool, IncludeCerts, SignedMessage, TrustRoots, VerifyOptions,
    sign, sign_detached,
};
use smimesign::crypto::softsigner::OpenSslSigner;
use smimesign::identity::SoftIdentity;
use smimesign::x509::Time;

const ROOT: &[u8] = include_bytes!("../test-data/chain/root.cer");
const INTERMEDIATE: &[u8] = include_bytes!(
    "../test-data/chain/intermediate.cer"
);
const LEAF: &[u8] = include_bytes!("../test-data/chain/leaf.cer");
const LEAF_KEY: &[u8] = include_bytes!("../test-data/chain/leaf.key");
const OTHER_ROOT: &[u8] = include_bytes!("../test-data/chain/other-root.cer");

fn cert(data: &'static [u8]) -> Cert {
    Cert::decode(Bytes::from_static(data)).unwrap()
}

fn roots(data: &'static [u8]) -> TrustRoots {
    TrustRoots::Pool(CertPool::from_iter([cert(data)]))
}

fn options() -> VerifyOptions {
    VerifyOptions::new().with_time(Time::utc(2030, 6, 1, 0, 0, 0).unwrap())
}

#[test]
fn hello_world() {
    let signer = OpenSslSigner::from_pem(LEAF_KEY).unwrap();
    let chain = [cert(LEAF), cert(INTERMEDIATE)];
    let der = sign(b"hello, world!", &chain, &signer).unwrap();

    let msg = SignedMessage::parse(&der).unwrap();
    let leaves = msg.verify_with(&roots(ROOT), &options()).unwrap();
    assert_eq!(leaves, [cert(LEAF)]);

    let err = msg.verify_with(&roots(OTHER_ROOT), &options()).unwrap_err();
    assert_eq!(err.to_string(), "certificate signed by unknown authority");
    assert_eq!(err.leaves(), [cert(LEAF)]);
}

#[test]
fn tampering() {
    let signer = OpenSslSigner::from_pem(LEAF_KEY).unwrap();
    let chain = [cert(LEAF), cert(INTERMEDIATE)];
    let der = sign(b"hello, world!", &chain, &signer).unwrap();

    // Flip a bit in the content.
    let pos = der.windows(13).position(|w| w == b"hello, world!").unwrap();
    let mut tampered = der.to_vec();
    tampered[pos] ^= 0x01;
    let msg = SignedMessage::parse(&tampered).unwrap();
    assert!(msg.verify(&TrustRoots::UnsafeNoVerify).is_err());

    // Flip a bit in the signature at the very end.
    let mut tampered = der.to_vec();
    let last = tampered.len() - 1;
    tampered[last] ^= 0x01;
    let msg = SignedMessage::parse(&tampered).unwrap();
    assert!(msg.verify(&TrustRoots::UnsafeNoVerify).is_err());
}

#[test]
fn detached() {
    let signer = OpenSslSigner::from_pem(LEAF_KEY).unwrap();
    let chain = [cert(LEAF), cert(INTERMEDIATE)];
    let der = sign_detached(b"hello, world!", &chain, &signer).unwrap();
    let msg = SignedMessage::parse(&der).unwrap();
    assert!(msg.is_detached());
    assert_eq!(
        msg.verify_detached_with(b"hello, world!", &roots(ROOT), &options())
            .unwrap(),
        [cert(LEAF)]
    );
    assert!(msg.verify_detached(b"hello, world", &roots(ROOT)).is_err());
}

#[test]
fn identity_without_certificates() {
    let ident = SoftIdentity::from_pem_key(
        LEAF_KEY, &[LEAF, INTERMEDIATE, ROOT]
    ).unwrap();
    let mut msg = SignedMessage::new(&b"hello, world!"[..]);
    msg.sign_identity(&ident, IncludeCerts::First(0)).unwrap();
    msg.detach();

    let mut msg = SignedMessage::parse(msg.to_pem().as_bytes()).unwrap();
    assert!(msg.get_certificates().unwrap().is_empty());

    msg.set_certificates(&[cert(LEAF), cert(INTERMEDIATE)]);
    let msg = SignedMessage::parse(&msg.to_der()).unwrap();
    assert_eq!(
        msg.verify_detached_with(b"hello, world!", &roots(ROOT), &options())
            .unwrap(),
        [cert(LEAF)]
    );
}
