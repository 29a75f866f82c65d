//! Script opcodes, numeric stack encoding and opcode handlers
//!
//! Every handler reports failure as `false`; the evaluator stops at the first
//! failing opcode. Malformed keys and signatures inside the signature-check
//! opcodes push a false result instead of failing the script outright.

use crate::constants::*;
use crate::hash::{hash160, hash256, ripemd160, sha256};
use crate::s256::S256Point;
use crate::script::Command;
use crate::signature::Signature;
use crate::types::StackElement;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

macro_rules! opcodes {
    ($($variant:ident = $byte:literal => $name:literal,)*) => {
        /// Opcodes understood by the evaluator
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Opcode {
            $($variant,)*
        }

        impl Opcode {
            /// Opcode for a script byte, `None` for pushes and unassigned bytes
            pub fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $($byte => Some(Opcode::$variant),)*
                    _ => None,
                }
            }

            pub fn to_byte(self) -> u8 {
                match self {
                    $(Opcode::$variant => $byte,)*
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(Opcode::$variant => $name,)*
                }
            }
        }
    };
}

opcodes! {
    Op0 = 0x00 => "OP_0",
    Op1Negate = 0x4f => "OP_1NEGATE",
    Op1 = 0x51 => "OP_1",
    Op2 = 0x52 => "OP_2",
    Op3 = 0x53 => "OP_3",
    Op4 = 0x54 => "OP_4",
    Op5 = 0x55 => "OP_5",
    Op6 = 0x56 => "OP_6",
    Op7 = 0x57 => "OP_7",
    Op8 = 0x58 => "OP_8",
    Op9 = 0x59 => "OP_9",
    Op10 = 0x5a => "OP_10",
    Op11 = 0x5b => "OP_11",
    Op12 = 0x5c => "OP_12",
    Op13 = 0x5d => "OP_13",
    Op14 = 0x5e => "OP_14",
    Op15 = 0x5f => "OP_15",
    Op16 = 0x60 => "OP_16",
    OpNop = 0x61 => "OP_NOP",
    OpIf = 0x63 => "OP_IF",
    OpNotIf = 0x64 => "OP_NOTIF",
    OpElse = 0x67 => "OP_ELSE",
    OpEndIf = 0x68 => "OP_ENDIF",
    OpVerify = 0x69 => "OP_VERIFY",
    OpReturn = 0x6a => "OP_RETURN",
    OpToAltStack = 0x6b => "OP_TOALTSTACK",
    OpFromAltStack = 0x6c => "OP_FROMALTSTACK",
    Op2Drop = 0x6d => "OP_2DROP",
    Op2Dup = 0x6e => "OP_2DUP",
    Op3Dup = 0x6f => "OP_3DUP",
    Op2Over = 0x70 => "OP_2OVER",
    Op2Rot = 0x71 => "OP_2ROT",
    Op2Swap = 0x72 => "OP_2SWAP",
    OpIfDup = 0x73 => "OP_IFDUP",
    OpDepth = 0x74 => "OP_DEPTH",
    OpDrop = 0x75 => "OP_DROP",
    OpDup = 0x76 => "OP_DUP",
    OpNip = 0x77 => "OP_NIP",
    OpOver = 0x78 => "OP_OVER",
    OpPick = 0x79 => "OP_PICK",
    OpRoll = 0x7a => "OP_ROLL",
    OpRot = 0x7b => "OP_ROT",
    OpSwap = 0x7c => "OP_SWAP",
    OpTuck = 0x7d => "OP_TUCK",
    OpSize = 0x82 => "OP_SIZE",
    OpEqual = 0x87 => "OP_EQUAL",
    OpEqualVerify = 0x88 => "OP_EQUALVERIFY",
    Op1Add = 0x8b => "OP_1ADD",
    Op1Sub = 0x8c => "OP_1SUB",
    OpNegate = 0x8f => "OP_NEGATE",
    OpAbs = 0x90 => "OP_ABS",
    OpNot = 0x91 => "OP_NOT",
    Op0NotEqual = 0x92 => "OP_0NOTEQUAL",
    OpAdd = 0x93 => "OP_ADD",
    OpSub = 0x94 => "OP_SUB",
    OpBoolAnd = 0x9a => "OP_BOOLAND",
    OpBoolOr = 0x9b => "OP_BOOLOR",
    OpNumEqual = 0x9c => "OP_NUMEQUAL",
    OpNumEqualVerify = 0x9d => "OP_NUMEQUALVERIFY",
    OpNumNotEqual = 0x9e => "OP_NUMNOTEQUAL",
    OpLessThan = 0x9f => "OP_LESSTHAN",
    OpGreaterThan = 0xa0 => "OP_GREATERTHAN",
    OpLessThanOrEqual = 0xa1 => "OP_LESSTHANOREQUAL",
    OpGreaterThanOrEqual = 0xa2 => "OP_GREATERTHANOREQUAL",
    OpMin = 0xa3 => "OP_MIN",
    OpMax = 0xa4 => "OP_MAX",
    OpWithin = 0xa5 => "OP_WITHIN",
    OpRipemd160 = 0xa6 => "OP_RIPEMD160",
    OpSha256 = 0xa8 => "OP_SHA256",
    OpHash160 = 0xa9 => "OP_HASH160",
    OpHash256 = 0xaa => "OP_HASH256",
    OpCheckSig = 0xac => "OP_CHECKSIG",
    OpCheckSigVerify = 0xad => "OP_CHECKSIGVERIFY",
    OpCheckMultiSig = 0xae => "OP_CHECKMULTISIG",
    OpCheckMultiSigVerify = 0xaf => "OP_CHECKMULTISIGVERIFY",
}

impl Opcode {
    /// OP_1..OP_16 for 1..=16, OP_0 for 0
    pub fn small_int(n: u8) -> Option<Self> {
        match n {
            0 => Some(Opcode::Op0),
            1..=16 => Self::from_byte(0x50 + n),
            _ => None,
        }
    }

    /// Value pushed by OP_0, OP_1NEGATE and OP_1..OP_16
    pub fn small_int_value(self) -> Option<i64> {
        match self.to_byte() {
            0x00 => Some(0),
            0x4f => Some(-1),
            byte @ 0x51..=0x60 => Some(i64::from(byte - 0x50)),
            _ => None,
        }
    }
}

/// Minimal little-endian sign-magnitude encoding; zero is the empty string.
pub fn encode_num(num: i64) -> StackElement {
    if num == 0 {
        return Vec::new();
    }
    let negative = num < 0;
    let mut abs = num.unsigned_abs();
    let mut result = Vec::with_capacity(9);
    while abs > 0 {
        result.push((abs & 0xff) as u8);
        abs >>= 8;
    }
    let last = result.len() - 1;
    if result[last] & 0x80 != 0 {
        result.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        result[last] |= 0x80;
    }
    result
}

/// Inverse of [`encode_num`]; `None` for elements longer than eight bytes.
pub fn decode_num(element: &[u8]) -> Option<i64> {
    if element.len() > 8 {
        return None;
    }
    let (last, rest) = match element.split_last() {
        Some(split) => split,
        None => return Some(0),
    };
    let negative = last & 0x80 != 0;
    let mut result = i64::from(last & 0x7f);
    for byte in rest.iter().rev() {
        result = (result << 8) | i64::from(*byte);
    }
    Some(if negative { -result } else { result })
}

/// Boolean reading of a stack element: false for any encoding of zero,
/// including negative zero.
pub fn is_true(element: &[u8]) -> bool {
    match element.split_last() {
        None => false,
        Some((last, rest)) => rest.iter().any(|b| *b != 0) || (last & 0x7f) != 0,
    }
}

fn push_bool(stack: &mut Vec<StackElement>, value: bool) {
    stack.push(encode_num(i64::from(value)));
}

/// Pop an arithmetic operand, limited to MAX_NUM_SIZE bytes.
fn pop_num(stack: &mut Vec<StackElement>) -> Option<i64> {
    let element = stack.pop()?;
    if element.len() > MAX_NUM_SIZE {
        return None;
    }
    decode_num(&element)
}

fn unary_num(stack: &mut Vec<StackElement>, f: impl Fn(i64) -> i64) -> bool {
    match pop_num(stack) {
        Some(a) => {
            stack.push(encode_num(f(a)));
            true
        }
        None => false,
    }
}

fn binary_num(stack: &mut Vec<StackElement>, f: impl Fn(i64, i64) -> i64) -> bool {
    if stack.len() < 2 {
        return false;
    }
    match (pop_num(stack), pop_num(stack)) {
        (Some(b), Some(a)) => {
            stack.push(encode_num(f(a, b)));
            true
        }
        _ => false,
    }
}

fn hash_top(stack: &mut Vec<StackElement>, f: impl Fn(&[u8]) -> Vec<u8>) -> bool {
    match stack.pop() {
        Some(element) => {
            stack.push(f(&element));
            true
        }
        None => false,
    }
}

/// Copy the `count` elements starting `depth` below the top onto the top.
fn copy_from_depth(stack: &mut Vec<StackElement>, depth: usize, count: usize) -> bool {
    if stack.len() < depth + count {
        return false;
    }
    let start = stack.len() - depth - count;
    let copied: Vec<StackElement> = stack[start..start + count].to_vec();
    stack.extend(copied);
    true
}

/// Move the `count` elements starting `depth` below the top onto the top.
fn move_from_depth(stack: &mut Vec<StackElement>, depth: usize, count: usize) -> bool {
    if stack.len() < depth + count {
        return false;
    }
    let start = stack.len() - depth - count;
    let moved: Vec<StackElement> = stack.drain(start..start + count).collect();
    stack.extend(moved);
    true
}

fn op_verify(stack: &mut Vec<StackElement>) -> bool {
    match stack.pop() {
        Some(element) => is_true(&element),
        None => false,
    }
}

fn op_equal(stack: &mut Vec<StackElement>) -> bool {
    if stack.len() < 2 {
        return false;
    }
    let b = stack.pop();
    let a = stack.pop();
    push_bool(stack, a == b);
    true
}

/// Split the branch bodies off the command queue and keep the chosen one.
///
/// Consumes commands up to the matching OP_ENDIF, tracking nested conditionals.
fn op_if(stack: &mut Vec<StackElement>, commands: &mut VecDeque<Command>, negate: bool) -> bool {
    if stack.is_empty() {
        return false;
    }
    let mut true_branch = Vec::new();
    let mut false_branch = Vec::new();
    let mut in_else = false;
    let mut depth = 1usize;
    let mut found = false;

    while let Some(command) = commands.pop_front() {
        let target = if in_else { &mut false_branch } else { &mut true_branch };
        match command {
            Command::Op(Opcode::OpIf | Opcode::OpNotIf) => {
                depth += 1;
                target.push(command);
            }
            Command::Op(Opcode::OpElse) if depth == 1 => in_else = true,
            Command::Op(Opcode::OpEndIf) => {
                if depth == 1 {
                    found = true;
                    break;
                }
                depth -= 1;
                target.push(command);
            }
            _ => target.push(command),
        }
    }
    if !found {
        return false;
    }

    let condition = match stack.pop() {
        Some(element) => is_true(&element) != negate,
        None => return false,
    };
    let chosen = if condition { true_branch } else { false_branch };
    for command in chosen.into_iter().rev() {
        commands.push_front(command);
    }
    true
}

fn op_pick_or_roll(stack: &mut Vec<StackElement>, roll: bool) -> bool {
    let depth = match pop_num(stack) {
        Some(n) if n >= 0 && (n as usize) < stack.len() => n as usize,
        _ => return false,
    };
    if roll {
        move_from_depth(stack, depth, 1)
    } else {
        copy_from_depth(stack, depth, 1)
    }
}

/// Strip the trailing sighash-type byte from a pushed signature.
fn strip_hash_type(element: &[u8]) -> &[u8] {
    element.split_last().map_or(element, |(_, der)| der)
}

fn op_checksig(stack: &mut Vec<StackElement>, z: &BigUint) -> bool {
    if stack.len() < 2 {
        return false;
    }
    let (sec, sig) = match (stack.pop(), stack.pop()) {
        (Some(sec), Some(sig)) => (sec, sig),
        _ => return false,
    };
    let valid = match (
        S256Point::parse(&sec),
        Signature::parse(strip_hash_type(&sig)),
    ) {
        (Ok(point), Ok(signature)) => point.verify(z, &signature),
        _ => false,
    };
    push_bool(stack, valid);
    true
}

fn pop_count(stack: &mut Vec<StackElement>, max: i64) -> Option<usize> {
    match pop_num(stack) {
        Some(n) if (0..=max).contains(&n) => Some(n as usize),
        _ => None,
    }
}

/// Pop `count` elements, returning them in push order.
fn pop_many(stack: &mut Vec<StackElement>, count: usize) -> Option<Vec<StackElement>> {
    if stack.len() < count {
        return None;
    }
    Some(stack.split_off(stack.len() - count))
}

fn match_signatures(keys: &[StackElement], signatures: &[Signature], z: &BigUint, ordered: bool) -> bool {
    let mut remaining: Vec<Option<S256Point>> = keys
        .iter()
        .map(|sec| S256Point::parse(sec).ok())
        .collect();
    let mut cursor = 0usize;

    for signature in signatures {
        let start = if ordered { cursor } else { 0 };
        let hit = (start..remaining.len()).find(|&i| {
            remaining[i]
                .as_ref()
                .map_or(false, |point| point.verify(z, signature))
        });
        match hit {
            Some(i) => {
                remaining[i] = None;
                cursor = i + 1;
            }
            None => return false,
        }
    }
    true
}

fn op_checkmultisig(stack: &mut Vec<StackElement>, z: &BigUint, flags: u32) -> bool {
    let n = match pop_count(stack, MAX_PUBKEYS_PER_MULTISIG) {
        Some(n) => n,
        None => return false,
    };
    let keys = match pop_many(stack, n) {
        Some(keys) => keys,
        None => return false,
    };
    let m = match pop_count(stack, n as i64) {
        Some(m) => m,
        None => return false,
    };
    let raw_signatures = match pop_many(stack, m) {
        Some(sigs) => sigs,
        None => return false,
    };
    // Extra element consumed by the original CHECKMULTISIG
    if stack.pop().is_none() {
        return false;
    }

    let signatures: Option<Vec<Signature>> = raw_signatures
        .iter()
        .map(|sig| Signature::parse(strip_hash_type(sig)).ok())
        .collect();
    let valid = match signatures {
        Some(signatures) => {
            let ordered = flags & SCRIPT_VERIFY_ORDERED_MULTISIG != 0;
            match_signatures(&keys, &signatures, z, ordered)
        }
        None => false,
    };
    push_bool(stack, valid);
    true
}

/// Run one opcode against the machine state.
pub(crate) fn execute(
    op: Opcode,
    stack: &mut Vec<StackElement>,
    altstack: &mut Vec<StackElement>,
    commands: &mut VecDeque<Command>,
    z: &BigUint,
    flags: u32,
) -> bool {
    use Opcode::*;

    match op {
        // Constants
        Op0 | Op1Negate | Op1 | Op2 | Op3 | Op4 | Op5 | Op6 | Op7 | Op8 | Op9 | Op10 | Op11
        | Op12 | Op13 | Op14 | Op15 | Op16 => match op.small_int_value() {
            Some(value) => {
                stack.push(encode_num(value));
                true
            }
            None => false,
        },

        // Flow control
        OpNop => true,
        OpIf => op_if(stack, commands, false),
        OpNotIf => op_if(stack, commands, true),
        // A bare ELSE/ENDIF was not consumed by an IF
        OpElse | OpEndIf => false,
        OpVerify => op_verify(stack),
        OpReturn => false,

        // Alt stack
        OpToAltStack => match stack.pop() {
            Some(element) => {
                altstack.push(element);
                true
            }
            None => false,
        },
        OpFromAltStack => match altstack.pop() {
            Some(element) => {
                stack.push(element);
                true
            }
            None => false,
        },

        // Stack shuffles
        Op2Drop => {
            if stack.len() < 2 {
                return false;
            }
            stack.truncate(stack.len() - 2);
            true
        }
        Op2Dup => copy_from_depth(stack, 0, 2),
        Op3Dup => copy_from_depth(stack, 0, 3),
        Op2Over => copy_from_depth(stack, 2, 2),
        Op2Rot => move_from_depth(stack, 4, 2),
        Op2Swap => move_from_depth(stack, 2, 2),
        OpIfDup => match stack.last().cloned() {
            Some(top) => {
                if is_true(&top) {
                    stack.push(top);
                }
                true
            }
            None => false,
        },
        OpDepth => {
            let depth = stack.len() as i64;
            stack.push(encode_num(depth));
            true
        }
        OpDrop => stack.pop().is_some(),
        OpDup => copy_from_depth(stack, 0, 1),
        OpNip => {
            if stack.len() < 2 {
                return false;
            }
            let index = stack.len() - 2;
            stack.remove(index);
            true
        }
        OpOver => copy_from_depth(stack, 1, 1),
        OpPick => op_pick_or_roll(stack, false),
        OpRoll => op_pick_or_roll(stack, true),
        OpRot => move_from_depth(stack, 2, 1),
        OpSwap => move_from_depth(stack, 1, 1),
        OpTuck => {
            if stack.len() < 2 {
                return false;
            }
            let top = stack[stack.len() - 1].clone();
            let index = stack.len() - 2;
            stack.insert(index, top);
            true
        }
        OpSize => match stack.last() {
            Some(top) => {
                let size = top.len() as i64;
                stack.push(encode_num(size));
                true
            }
            None => false,
        },

        // Equality
        OpEqual => op_equal(stack),
        OpEqualVerify => op_equal(stack) && op_verify(stack),

        // Arithmetic
        Op1Add => unary_num(stack, |a| a + 1),
        Op1Sub => unary_num(stack, |a| a - 1),
        OpNegate => unary_num(stack, |a| -a),
        OpAbs => unary_num(stack, |a| a.abs()),
        OpNot => unary_num(stack, |a| i64::from(a == 0)),
        Op0NotEqual => unary_num(stack, |a| i64::from(a != 0)),
        OpAdd => binary_num(stack, |a, b| a + b),
        OpSub => binary_num(stack, |a, b| a - b),
        OpBoolAnd => binary_num(stack, |a, b| i64::from(a != 0 && b != 0)),
        OpBoolOr => binary_num(stack, |a, b| i64::from(a != 0 || b != 0)),
        OpNumEqual => binary_num(stack, |a, b| i64::from(a == b)),
        OpNumEqualVerify => binary_num(stack, |a, b| i64::from(a == b)) && op_verify(stack),
        OpNumNotEqual => binary_num(stack, |a, b| i64::from(a != b)),
        OpLessThan => binary_num(stack, |a, b| i64::from(a < b)),
        OpGreaterThan => binary_num(stack, |a, b| i64::from(a > b)),
        OpLessThanOrEqual => binary_num(stack, |a, b| i64::from(a <= b)),
        OpGreaterThanOrEqual => binary_num(stack, |a, b| i64::from(a >= b)),
        OpMin => binary_num(stack, |a, b| a.min(b)),
        OpMax => binary_num(stack, |a, b| a.max(b)),
        OpWithin => {
            if stack.len() < 3 {
                return false;
            }
            match (pop_num(stack), pop_num(stack), pop_num(stack)) {
                (Some(max), Some(min), Some(x)) => {
                    push_bool(stack, min <= x && x < max);
                    true
                }
                _ => false,
            }
        }

        // Crypto
        OpRipemd160 => hash_top(stack, |data| ripemd160(data).to_vec()),
        OpSha256 => hash_top(stack, |data| sha256(data).to_vec()),
        OpHash160 => hash_top(stack, |data| hash160(data).to_vec()),
        OpHash256 => hash_top(stack, |data| hash256(data).to_vec()),
        OpCheckSig => op_checksig(stack, z),
        OpCheckSigVerify => op_checksig(stack, z) && op_verify(stack),
        OpCheckMultiSig => op_checkmultisig(stack, z, flags),
        OpCheckMultiSigVerify => op_checkmultisig(stack, z, flags) && op_verify(stack),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::private_key::PrivateKey;

    fn run(op: Opcode, stack: &mut Vec<StackElement>) -> bool {
        let mut altstack = Vec::new();
        let mut commands = VecDeque::new();
        execute(op, stack, &mut altstack, &mut commands, &BigUint::from(0u32), SCRIPT_VERIFY_NONE)
    }

    fn nums(values: &[i64]) -> Vec<StackElement> {
        values.iter().map(|v| encode_num(*v)).collect()
    }

    #[test]
    fn test_opcode_bytes() {
        assert_eq!(Opcode::from_byte(0x76), Some(Opcode::OpDup));
        assert_eq!(Opcode::OpCheckMultiSig.to_byte(), 0xae);
        assert_eq!(Opcode::OpHash160.name(), "OP_HASH160");
        assert_eq!(Opcode::from_byte(0x4c), None);
        assert_eq!(Opcode::from_byte(0xba), None);
        assert_eq!(Opcode::small_int(16), Some(Opcode::Op16));
        assert_eq!(Opcode::Op16.small_int_value(), Some(16));
        assert_eq!(Opcode::Op1Negate.small_int_value(), Some(-1));
        assert_eq!(Opcode::OpDup.small_int_value(), None);
    }

    #[test]
    fn test_encode_num() {
        assert_eq!(encode_num(0), Vec::<u8>::new());
        assert_eq!(encode_num(1), vec![0x01]);
        assert_eq!(encode_num(-1), vec![0x81]);
        assert_eq!(encode_num(127), vec![0x7f]);
        assert_eq!(encode_num(128), vec![0x80, 0x00]);
        assert_eq!(encode_num(-128), vec![0x80, 0x80]);
        assert_eq!(encode_num(255), vec![0xff, 0x00]);
        assert_eq!(encode_num(256), vec![0x00, 0x01]);
        assert_eq!(encode_num(-256), vec![0x00, 0x81]);
    }

    #[test]
    fn test_decode_num() {
        for value in [0, 1, -1, 127, 128, -128, 255, 256, -256, 0x7fff_ffff, -0x7fff_ffff] {
            assert_eq!(decode_num(&encode_num(value)), Some(value));
        }
        assert_eq!(decode_num(&[0x00, 0x80]), Some(0));
        assert_eq!(decode_num(&[0u8; 9]), None);
    }

    #[test]
    fn test_is_true() {
        assert!(!is_true(&[]));
        assert!(!is_true(&[0x00]));
        assert!(!is_true(&[0x00, 0x80]));
        assert!(is_true(&[0x01]));
        assert!(is_true(&[0x00, 0x01]));
        assert!(is_true(&[0x81]));
    }

    #[test]
    fn test_dup_requires_element() {
        let mut stack = Vec::new();
        assert!(!run(Opcode::OpDup, &mut stack));
        let mut stack = nums(&[5]);
        assert!(run(Opcode::OpDup, &mut stack));
        assert_eq!(stack, nums(&[5, 5]));
    }

    #[test]
    fn test_shuffles() {
        let mut stack = nums(&[1, 2, 3]);
        assert!(run(Opcode::OpRot, &mut stack));
        assert_eq!(stack, nums(&[2, 3, 1]));

        let mut stack = nums(&[1, 2]);
        assert!(run(Opcode::OpSwap, &mut stack));
        assert_eq!(stack, nums(&[2, 1]));

        let mut stack = nums(&[1, 2]);
        assert!(run(Opcode::OpTuck, &mut stack));
        assert_eq!(stack, nums(&[2, 1, 2]));

        let mut stack = nums(&[1, 2, 3, 4]);
        assert!(run(Opcode::Op2Swap, &mut stack));
        assert_eq!(stack, nums(&[3, 4, 1, 2]));

        let mut stack = nums(&[1, 2, 3, 4, 5, 6]);
        assert!(run(Opcode::Op2Rot, &mut stack));
        assert_eq!(stack, nums(&[3, 4, 5, 6, 1, 2]));

        let mut stack = nums(&[1, 2, 3, 4]);
        assert!(run(Opcode::Op2Over, &mut stack));
        assert_eq!(stack, nums(&[1, 2, 3, 4, 1, 2]));

        let mut stack = nums(&[1, 2]);
        assert!(run(Opcode::OpNip, &mut stack));
        assert_eq!(stack, nums(&[2]));
    }

    #[test]
    fn test_pick_and_roll() {
        let mut stack = nums(&[7, 8, 9, 2]);
        assert!(run(Opcode::OpPick, &mut stack));
        assert_eq!(stack, nums(&[7, 8, 9, 7]));

        let mut stack = nums(&[7, 8, 9, 2]);
        assert!(run(Opcode::OpRoll, &mut stack));
        assert_eq!(stack, nums(&[8, 9, 7]));

        let mut stack = nums(&[7, 3]);
        assert!(!run(Opcode::OpPick, &mut stack));
    }

    #[test]
    fn test_arithmetic() {
        let mut stack = nums(&[5, 3]);
        assert!(run(Opcode::OpSub, &mut stack));
        assert_eq!(stack, nums(&[2]));

        let mut stack = nums(&[2, 3]);
        assert!(run(Opcode::OpLessThan, &mut stack));
        assert_eq!(stack, nums(&[1]));

        let mut stack = nums(&[4, 1, 5]);
        assert!(run(Opcode::OpWithin, &mut stack));
        assert_eq!(stack, nums(&[1]));

        let mut stack = nums(&[-6]);
        assert!(run(Opcode::OpAbs, &mut stack));
        assert_eq!(stack, nums(&[6]));
    }

    #[test]
    fn test_arithmetic_rejects_wide_operand() {
        let mut stack = vec![vec![0x01, 0x00, 0x00, 0x00, 0x01], encode_num(1)];
        assert!(!run(Opcode::OpAdd, &mut stack));
    }

    #[test]
    fn test_equalverify() {
        let mut stack = vec![b"abc".to_vec(), b"abc".to_vec()];
        assert!(run(Opcode::OpEqualVerify, &mut stack));
        assert!(stack.is_empty());
        let mut stack = vec![b"abc".to_vec(), b"abd".to_vec()];
        assert!(!run(Opcode::OpEqualVerify, &mut stack));
    }

    #[test]
    fn test_hash160_op() {
        let mut stack = vec![b"hello world".to_vec()];
        assert!(run(Opcode::OpHash160, &mut stack));
        assert_eq!(
            hex::encode(&stack[0]),
            "d7d5ee7824ff93f94c3055af9382c86c68b5ca92"
        );
    }

    #[test]
    fn test_if_branches() {
        let mut stack = nums(&[0]);
        let mut altstack = Vec::new();
        let mut commands: VecDeque<Command> = vec![
            Command::Op(Opcode::Op2),
            Command::Op(Opcode::OpElse),
            Command::Op(Opcode::Op3),
            Command::Op(Opcode::OpEndIf),
            Command::Op(Opcode::OpDrop),
        ]
        .into();
        assert!(execute(Opcode::OpIf, &mut stack, &mut altstack, &mut commands, &BigUint::from(0u32), 0));
        assert!(stack.is_empty());
        let remaining: Vec<Command> = commands.into_iter().collect();
        assert_eq!(
            remaining,
            vec![Command::Op(Opcode::Op3), Command::Op(Opcode::OpDrop)]
        );
    }

    #[test]
    fn test_if_requires_endif() {
        let mut stack = nums(&[1]);
        let mut altstack = Vec::new();
        let mut commands: VecDeque<Command> = vec![Command::Op(Opcode::Op2)].into();
        assert!(!execute(Opcode::OpIf, &mut stack, &mut altstack, &mut commands, &BigUint::from(0u32), 0));
    }

    #[test]
    fn test_altstack() {
        let mut stack = nums(&[9]);
        let mut altstack = Vec::new();
        let mut commands = VecDeque::new();
        let z = BigUint::from(0u32);
        assert!(execute(Opcode::OpToAltStack, &mut stack, &mut altstack, &mut commands, &z, 0));
        assert!(stack.is_empty());
        assert!(execute(Opcode::OpFromAltStack, &mut stack, &mut altstack, &mut commands, &z, 0));
        assert_eq!(stack, nums(&[9]));
        assert!(!execute(Opcode::OpFromAltStack, &mut stack, &mut altstack, &mut commands, &z, 0));
    }

    #[test]
    fn test_checksig() {
        let key = PrivateKey::new(BigUint::from(8675309u32)).unwrap();
        let z = BigUint::from(0xabcdefu32);
        let mut sig = key.sign(&z).unwrap().der();
        sig.push(SIGHASH_ALL as u8);
        let sec = key.point().sec(true);

        let mut stack = vec![sig.clone(), sec.clone()];
        let mut altstack = Vec::new();
        let mut commands = VecDeque::new();
        assert!(execute(Opcode::OpCheckSig, &mut stack, &mut altstack, &mut commands, &z, 0));
        assert_eq!(stack, nums(&[1]));

        // Wrong digest: false result, not a failure
        let mut stack = vec![sig, sec.clone()];
        let other = BigUint::from(1u32);
        assert!(execute(Opcode::OpCheckSig, &mut stack, &mut altstack, &mut commands, &other, 0));
        assert_eq!(stack, nums(&[0]));

        // Unparseable signature
        let mut stack = vec![vec![0x30, 0x01], sec];
        assert!(execute(Opcode::OpCheckSig, &mut stack, &mut altstack, &mut commands, &z, 0));
        assert_eq!(stack, nums(&[0]));
    }

    fn multisig_stack(sigs: &[Vec<u8>], keys: &[Vec<u8>]) -> Vec<StackElement> {
        let mut stack = vec![Vec::new()];
        stack.extend(sigs.iter().cloned());
        stack.push(encode_num(sigs.len() as i64));
        stack.extend(keys.iter().cloned());
        stack.push(encode_num(keys.len() as i64));
        stack
    }

    #[test]
    fn test_checkmultisig_ordering() {
        let z = BigUint::from(0x5eedu32);
        let keys: Vec<PrivateKey> = [11u32, 22, 33]
            .iter()
            .map(|s| PrivateKey::new(BigUint::from(*s)).unwrap())
            .collect();
        let secs: Vec<Vec<u8>> = keys.iter().map(|k| k.point().sec(true)).collect();
        let sig = |k: &PrivateKey| {
            let mut der = k.sign(&z).unwrap().der();
            der.push(SIGHASH_ALL as u8);
            der
        };
        // Signatures in reverse key order
        let sigs = vec![sig(&keys[2]), sig(&keys[0])];
        let mut altstack = Vec::new();
        let mut commands = VecDeque::new();

        let mut stack = multisig_stack(&sigs, &secs);
        assert!(execute(Opcode::OpCheckMultiSig, &mut stack, &mut altstack, &mut commands, &z, SCRIPT_VERIFY_NONE));
        assert_eq!(stack, nums(&[1]));

        let mut stack = multisig_stack(&sigs, &secs);
        assert!(execute(
            Opcode::OpCheckMultiSig,
            &mut stack,
            &mut altstack,
            &mut commands,
            &z,
            SCRIPT_VERIFY_ORDERED_MULTISIG
        ));
        assert_eq!(stack, nums(&[0]));

        let ordered = vec![sig(&keys[0]), sig(&keys[2])];
        let mut stack = multisig_stack(&ordered, &secs);
        assert!(execute(
            Opcode::OpCheckMultiSig,
            &mut stack,
            &mut altstack,
            &mut commands,
            &z,
            SCRIPT_VERIFY_ORDERED_MULTISIG
        ));
        assert_eq!(stack, nums(&[1]));
    }

    #[test]
    fn test_checkmultisig_key_used_once() {
        let z = BigUint::from(77u32);
        let key = PrivateKey::new(BigUint::from(5u32)).unwrap();
        let other = PrivateKey::new(BigUint::from(6u32)).unwrap();
        let mut der = key.sign(&z).unwrap().der();
        der.push(SIGHASH_ALL as u8);
        let secs = vec![key.point().sec(true), other.point().sec(true)];
        let mut stack = multisig_stack(&[der.clone(), der], &secs);
        let mut altstack = Vec::new();
        let mut commands = VecDeque::new();
        assert!(execute(Opcode::OpCheckMultiSig, &mut stack, &mut altstack, &mut commands, &z, 0));
        assert_eq!(stack, nums(&[0]));
    }

    #[test]
    fn test_checkmultisig_requires_dummy() {
        let z = BigUint::from(77u32);
        let key = PrivateKey::new(BigUint::from(5u32)).unwrap();
        let mut der = key.sign(&z).unwrap().der();
        der.push(SIGHASH_ALL as u8);
        let mut stack = multisig_stack(&[der], &[key.point().sec(true)]);
        stack.remove(0);
        let mut altstack = Vec::new();
        let mut commands = VecDeque::new();
        assert!(!execute(Opcode::OpCheckMultiSig, &mut stack, &mut altstack, &mut commands, &z, 0));
    }
}
