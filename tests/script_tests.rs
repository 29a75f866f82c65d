//! Script evaluation with real signatures

use anyhow::Result;
use num_bigint::BigUint;
use script_proof::hash::{hash160, hash256};
use script_proof::opcodes::Opcode;
use script_proof::*;

fn signed(key: &PrivateKey, z: &BigUint) -> Result<Vec<u8>> {
    let mut sig = key.sign(z)?.der();
    sig.push(SIGHASH_ALL as u8);
    Ok(sig)
}

fn digest(label: &str) -> BigUint {
    BigUint::from_bytes_be(&hash256(label.as_bytes()))
}

#[test]
fn test_p2pkh_pair() -> Result<()> {
    let key = PrivateKey::new(BigUint::from(0x1234_5678u32))?;
    let z = digest("p2pkh");
    let locking = Script::p2pkh(&key.point().hash160(true));
    let unlocking = Script::new(vec![
        Command::Push(signed(&key, &z)?),
        Command::Push(key.point().sec(true)),
    ]);
    assert!((unlocking.clone() + locking.clone()).evaluate(&z, SCRIPT_VERIFY_NONE));

    // The uncompressed key hashes differently
    let uncompressed = Script::new(vec![
        Command::Push(signed(&key, &z)?),
        Command::Push(key.point().sec(false)),
    ]);
    assert!(!(uncompressed + locking.clone()).evaluate(&z, SCRIPT_VERIFY_NONE));

    // Right key, wrong digest
    assert!(!(unlocking + locking).evaluate(&digest("other"), SCRIPT_VERIFY_NONE));
    Ok(())
}

#[test]
fn test_two_of_two_multisig() -> Result<()> {
    let mut rng = rand::thread_rng();
    let first = PrivateKey::generate(&mut rng)?;
    let second = PrivateKey::generate(&mut rng)?;
    let z = digest("two of two");

    let locking = Script::multisig(2, &[first.point().clone(), second.point().clone()])?;
    let sig_first = signed(&first, &z)?;
    let sig_second = signed(&second, &z)?;
    let unlocking = |a: Vec<u8>, b: Vec<u8>| {
        Script::new(vec![Command::Op(Opcode::Op0), Command::Push(a), Command::Push(b)])
    };

    let valid = unlocking(sig_first.clone(), sig_second.clone()) + locking.clone();
    assert!(valid.evaluate(&z, SCRIPT_VERIFY_NONE));
    assert!(valid.evaluate(&z, SCRIPT_VERIFY_ORDERED_MULTISIG));

    // Tag, length, r, s and the last DER byte
    let der_len = sig_first.len() - 1;
    for position in [0, 1, 5, der_len - 10, der_len - 1] {
        let mut tampered = sig_first.clone();
        tampered[position] ^= 0x01;
        let script = unlocking(tampered, sig_second.clone()) + locking.clone();
        assert!(!script.evaluate(&z, SCRIPT_VERIFY_NONE), "flipped byte {}", position);
    }

    // One signature twice does not satisfy two keys
    let doubled = unlocking(sig_first.clone(), sig_first) + locking;
    assert!(!doubled.evaluate(&z, SCRIPT_VERIFY_NONE));
    Ok(())
}

#[test]
fn test_multisig_signature_order() -> Result<()> {
    let keys: Vec<PrivateKey> = (1u32..=3)
        .map(|k| PrivateKey::new(BigUint::from(k * 1009)))
        .collect::<script_proof::Result<_>>()?;
    let points: Vec<S256Point> = keys.iter().map(|k| k.point().clone()).collect();
    let z = digest("order");
    let locking = Script::multisig(2, &points)?;

    // Signatures listed against key order
    let unlocking = Script::new(vec![
        Command::Op(Opcode::Op0),
        Command::Push(signed(&keys[2], &z)?),
        Command::Push(signed(&keys[0], &z)?),
    ]);
    let script = unlocking + locking;
    assert!(script.evaluate(&z, SCRIPT_VERIFY_NONE));
    assert!(!script.evaluate(&z, SCRIPT_VERIFY_ORDERED_MULTISIG));
    Ok(())
}

#[test]
fn test_checksigverify_chain() -> Result<()> {
    let key = PrivateKey::new(BigUint::from(99u32))?;
    let z = digest("verify chain");
    let script = Script::new(vec![
        Command::Push(signed(&key, &z)?),
        Command::Push(key.point().sec(true)),
        Command::Op(Opcode::OpCheckSigVerify),
        Command::Op(Opcode::Op1),
    ]);
    assert!(script.evaluate(&z, SCRIPT_VERIFY_NONE));
    assert!(!script.evaluate(&digest("elsewhere"), SCRIPT_VERIFY_NONE));
    Ok(())
}

#[test]
fn test_p2sh_redeem_splice() -> Result<()> {
    // Redeem script: OP_2 OP_ADD OP_5 OP_EQUAL, satisfied by pushing 3
    let redeem = Script::new(vec![
        Command::Op(Opcode::Op2),
        Command::Op(Opcode::OpAdd),
        Command::Op(Opcode::Op5),
        Command::Op(Opcode::OpEqual),
    ]);
    let raw = redeem.raw_serialize();
    let locking = Script::p2sh(&hash160(&raw));
    let z = BigUint::from(0u32);

    let good = Script::new(vec![Command::Op(Opcode::Op3), Command::Push(raw.clone())]);
    assert!((good + locking.clone()).evaluate(&z, SCRIPT_VERIFY_NONE));

    let bad = Script::new(vec![Command::Op(Opcode::Op4), Command::Push(raw)]);
    assert!(!(bad + locking).evaluate(&z, SCRIPT_VERIFY_NONE));
    Ok(())
}

#[test]
fn test_script_bytes_round_trip_through_parser() -> Result<()> {
    let key = PrivateKey::new(BigUint::from(2024u32))?;
    let script = Script::p2pkh(&key.point().hash160(true));
    let bytes = script.serialize();
    let parsed = Script::parse(&mut std::io::Cursor::new(&bytes))?;
    assert_eq!(parsed, script);
    assert_eq!(
        parsed.address_payload(Network::Mainnet).map(|p| p[0]),
        Some(0x00)
    );
    Ok(())
}
