//! Property-style decode coverage: random instruction words generated
//! from family bit-pattern templates must land on the right decode-table
//! entries.

mod common;

use a32jit::frontend::a32::decoder;
use common::{InstructionGenerator, XorShift};

fn always(_inst: u32) -> bool {
    true
}

fn no_r15_in_dp(inst: u32) -> bool {
    // R15 as Rd or Rn takes the PC-write paths; keep the family pure.
    (inst >> 12) & 0xF != 0xF && (inst >> 16) & 0xF != 0xF
}

#[test]
fn data_processing_imm_family_decodes() {
    let gen = InstructionGenerator::new("cccc0010100Snnnnddddrrrrvvvvvvvv", no_r15_in_dp);
    let mut rng = XorShift(0x1234_5678_9ABC_DEF0);
    for _ in 0..500 {
        let word = gen.generate(&mut rng);
        let matcher = decoder::decode_arm(word).expect("ADD (imm) word failed to decode");
        assert_eq!(matcher.name, "ADD (imm)", "word {word:#010x}");
    }
}

#[test]
fn data_processing_reg_family_decodes() {
    let gen = InstructionGenerator::new("cccc0000100Snnnnddddvvvvvtt0mmmm", no_r15_in_dp);
    let mut rng = XorShift(0xDEAD_BEEF_CAFE_F00D);
    for _ in 0..500 {
        let word = gen.generate(&mut rng);
        let matcher = decoder::decode_arm(word).expect("ADD (reg) word failed to decode");
        assert_eq!(matcher.name, "ADD (reg)", "word {word:#010x}");
    }
}

#[test]
fn parallel_family_decodes() {
    let gen = InstructionGenerator::new("cccc01100101nnnndddd11110011mmmm", always);
    let mut rng = XorShift(0x0123_4567_89AB_CDEF);
    for _ in 0..200 {
        let word = gen.generate(&mut rng);
        let matcher = decoder::decode_arm(word).expect("UASX word failed to decode");
        assert_eq!(matcher.name, "UADD/USUB parallel", "word {word:#010x}");
    }
}

#[test]
fn load_store_imm_family_decodes() {
    let gen = InstructionGenerator::new("cccc0101u001nnnnttttvvvvvvvvvvvv", always);
    let mut rng = XorShift(0xFEED_FACE_0BAD_F00D);
    for _ in 0..200 {
        let word = gen.generate(&mut rng);
        let matcher = decoder::decode_arm(word).expect("LDR (imm) word failed to decode");
        assert_eq!(matcher.name, "LDR (imm)", "word {word:#010x}");
    }
}

#[test]
fn multiply_family_decodes() {
    let gen = InstructionGenerator::new("cccc0000100Shhhhllllmmmm1001nnnn", always);
    let mut rng = XorShift(0x5555_AAAA_5555_AAAA);
    for _ in 0..200 {
        let word = gen.generate(&mut rng);
        let matcher = decoder::decode_arm(word).expect("UMULL word failed to decode");
        assert_eq!(matcher.name, "UMULL", "word {word:#010x}");
    }
}
