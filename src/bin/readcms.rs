//! Reads a CMS signed message and prints its signers.
//!
//! Usage: readcms [--detached <message>] [--root <cert>]... <path>
//!
//! Without any `--root` options, signatures are checked but signer
//! certificates are not.

use std::{env, fs, process};
use bytes::Bytes;
use smimesign::{Cert, CertPool, SignedMessage, TrustRoots};


fn usage() -> ! {
    eprintln!(
        "Usage: readcms [--detached <message>] [--root <cert>]... <path>"
    );
    process::exit(2)
}

fn read(path: &str) -> Vec<u8> {
    match fs::read(path) {
        Ok(data) => data,
        Err(err) => {
            eprintln!("Can’t read file {}: {}", path, err);
            process::exit(1)
        }
    }
}

fn main() {
    let mut detached = None;
    let mut roots = CertPool::new();
    let mut path = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--detached" => {
                match args.next() {
                    Some(message) => detached = Some(read(&message)),
                    None => usage()
                }
            }
            "--root" => {
                let cert_path = match args.next() {
                    Some(cert_path) => cert_path,
                    None => usage()
                };
                match Cert::decode(Bytes::from(read(&cert_path))) {
                    Ok(cert) => roots.add(cert),
                    Err(err) => {
                        eprintln!(
                            "Can’t decode cert {}: {}", cert_path, err
                        );
                        process::exit(1)
                    }
                }
            }
            _ if path.is_none() => path = Some(arg),
            _ => usage()
        }
    }
    let path = match path {
        Some(path) => path,
        None => usage()
    };

    let msg = match SignedMessage::parse(&read(&path)) {
        Ok(msg) => msg,
        Err(err) => {
            eprintln!("Can’t decode signed message: {}", err);
            process::exit(1)
        }
    };

    match msg.get_data() {
        Ok(Some(data)) => println!("Content: {} octets", data.len()),
        Ok(None) => println!("Content: detached"),
        Err(err) => println!("Content: {}", err),
    }
    match msg.get_certificates() {
        Ok(certs) => {
            println!("Certificates: {}", certs.len());
            for cert in certs {
                println!("  {}", cert.subject());
            }
        }
        Err(err) => println!("Certificates: {}", err),
    }

    let certs = msg.get_certificates().unwrap_or_default();
    for (i, info) in msg.signed_data().signer_infos().iter().enumerate() {
        println!("Signer {}:", i);
        match info.find_certificate(&certs) {
            Ok(cert) => println!("  Subject: {}", cert.subject()),
            Err(err) => println!("  Subject: {}", err),
        }
        println!("  Algorithm: {}", info.x509_signature_algorithm());
        if let Ok(time) = info.signing_time() {
            println!("  Signing time: {}", time);
        }
    }

    let roots = if roots.is_empty() {
        TrustRoots::UnsafeNoVerify
    }
    else {
        TrustRoots::Pool(roots)
    };
    let res = match detached {
        Some(message) => msg.verify_detached(&message, &roots),
        None => msg.verify(&roots),
    };
    match res {
        Ok(_) => println!("Good signature."),
        Err(err) => {
            println!("Bad signature: {}", err);
            process::exit(1)
        }
    }
}
