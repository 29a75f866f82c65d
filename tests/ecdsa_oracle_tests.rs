//! Cross-checks against libsecp256k1
//!
//! Public keys, DER signatures and verification results must agree byte for
//! byte with the reference library, which also derives nonces per RFC 6979 and
//! normalizes to low-s.

use anyhow::Result;
use num_bigint::BigUint;
use proptest::prelude::*;
use script_proof::hash::hash256;
use script_proof::s256::N;
use script_proof::{PrivateKey, S256Point, Signature};
use secp256k1::{ecdsa, Message, PublicKey, Secp256k1, SecretKey};

fn key_pair(secret: &[u8; 32]) -> Result<(PrivateKey, SecretKey)> {
    Ok((PrivateKey::from_bytes(secret)?, SecretKey::from_slice(secret)?))
}

fn valid_secret(bytes: &[u8; 32]) -> bool {
    let value = BigUint::from_bytes_be(bytes);
    value > BigUint::from(0u32) && value < *N
}

#[test]
fn test_public_keys_match() -> Result<()> {
    let secp = Secp256k1::new();
    for seed in [1u8, 2, 0x7f, 0xfe] {
        let secret = [seed; 32];
        let (ours, theirs) = key_pair(&secret)?;
        let public = PublicKey::from_secret_key(&secp, &theirs);
        assert_eq!(ours.point().sec(true), public.serialize().to_vec());
        assert_eq!(ours.point().sec(false), public.serialize_uncompressed().to_vec());
    }
    Ok(())
}

#[test]
fn test_book_signature_matches() -> Result<()> {
    let secp = Secp256k1::new();
    let mut secret = [0u8; 32];
    secret[30] = 0x30;
    secret[31] = 0x39;
    let (ours, theirs) = key_pair(&secret)?;
    let digest = hash256(b"Programming Bitcoin!");

    let der = ours.sign(&BigUint::from_bytes_be(&digest))?.der();
    let reference = secp.sign_ecdsa(&Message::from_digest_slice(&digest)?, &theirs);
    assert_eq!(der, reference.serialize_der().to_vec());
    assert_eq!(
        hex::encode(&der),
        "30450221008eeacac05e4c29e793b5287ed044637132ce9ead7fded533e7441d87a8dc9c23022036674f81f10c7fb347c1224bd546813ea24ada6f642c02f2248516e3aa8cb303"
    );
    Ok(())
}

#[test]
fn test_reference_signature_verifies() -> Result<()> {
    let secp = Secp256k1::new();
    let secret = [0x42u8; 32];
    let (ours, theirs) = key_pair(&secret)?;
    let digest = hash256(b"reference signature");
    let reference = secp.sign_ecdsa(&Message::from_digest_slice(&digest)?, &theirs);

    let parsed = Signature::parse(&reference.serialize_der())?;
    let point = S256Point::parse(&PublicKey::from_secret_key(&secp, &theirs).serialize())?;
    assert_eq!(&point, ours.point());
    assert!(point.verify(&BigUint::from_bytes_be(&digest), &parsed));
    Ok(())
}

#[test]
fn test_tampered_signature_rejected_by_both() -> Result<()> {
    let secp = Secp256k1::new();
    let secret = [0x09u8; 32];
    let (ours, theirs) = key_pair(&secret)?;
    let digest = hash256(b"tamper");
    let signature = ours.sign(&BigUint::from_bytes_be(&digest))?;
    let forged = Signature::new(signature.r().clone(), signature.s() + 1u32)?;

    let public = PublicKey::from_secret_key(&secp, &theirs);
    let msg = Message::from_digest_slice(&digest)?;
    assert!(!ours.point().verify(&BigUint::from_bytes_be(&digest), &forged));
    let reference = ecdsa::Signature::from_der(&forged.der())?;
    assert!(secp.verify_ecdsa(&msg, &reference, &public).is_err());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_signatures_match_reference(secret in any::<[u8; 32]>(), digest in any::<[u8; 32]>()) {
        prop_assume!(valid_secret(&secret));
        let secp = Secp256k1::new();
        let (ours, theirs) = key_pair(&secret).unwrap();

        let der = ours.sign(&BigUint::from_bytes_be(&digest)).unwrap().der();
        let msg = Message::from_digest_slice(&digest).unwrap();
        let reference = secp.sign_ecdsa(&msg, &theirs);
        prop_assert_eq!(&der, &reference.serialize_der().to_vec());

        let public = PublicKey::from_secret_key(&secp, &theirs);
        let ours_as_reference = ecdsa::Signature::from_der(&der).unwrap();
        prop_assert!(secp.verify_ecdsa(&msg, &ours_as_reference, &public).is_ok());
    }
}
