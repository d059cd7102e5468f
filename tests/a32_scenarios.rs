//! Directed execution scenarios: whole-pipeline tests that run real
//! guest programs through the recompiler and check final register,
//! flag and tick state.

mod common;

use common::{make_jit, run_ticks};

#[test]
fn basic_arithmetic() {
    let (mut jit, env) = make_jit(&[
        0xE3A0_0005, // mov r0, #5
        0xE3A0_100D, // mov r1, #13
        0xE081_2000, // add r2, r1, r0
        0xEAFF_FFFE, // b +#0
    ]);
    jit.set_cpsr(0x0000_01D0); // User mode.

    run_ticks(&mut jit, &env, 4);

    assert_eq!(jit.regs()[0], 5);
    assert_eq!(jit.regs()[1], 13);
    assert_eq!(jit.regs()[2], 18);
    assert_eq!(jit.regs()[15], 0x0000_000C);
    assert_eq!(jit.cpsr(), 0x0000_01D0);
    assert_eq!(env.borrow().ticks_left, 0);
}

#[test]
fn flags_forwarded_into_adc() {
    // A flag-setting op whose carry feeds a later ADC: the flag writes
    // must not clobber the carry value they share with the addition.
    let (mut jit, env) = make_jit(&[
        0xE35F_0CD9, // cmp pc, #55552
        0xE11C_0474, // tst r12, r4, ror r4
        0xE1A0_06A7, // mov r0, r7, lsr #13
        0xE351_07FA, // cmp r1, #0x3E80000
        0xE2A5_4C8A, // adc r4, r5, #35328
        0xEAFF_FFFE, // b +#0
    ]);
    *jit.regs_mut() = [
        0x6973_B6BB, 0x267E_A626, 0x69DE_BF49, 0x8F97_6895, 0x4ECD_2D0D, 0xCF89_B8C7, 0xB671_3F85,
        0x015E_2AA5, 0xCD14_336A, 0xAFCA_0F3E, 0xACE2_EFD9, 0x68FB_82CD, 0x7754_47C0, 0xC9E1_F8CD,
        0xEBE0_E626, 0x0,
    ];
    jit.set_cpsr(0x0000_01D0);

    run_ticks(&mut jit, &env, 6);

    assert_eq!(jit.regs()[0], 0x0000_0AF1);
    assert_eq!(jit.regs()[1], 0x267E_A626);
    assert_eq!(jit.regs()[2], 0x69DE_BF49);
    assert_eq!(jit.regs()[3], 0x8F97_6895);
    assert_eq!(jit.regs()[4], 0xCF8A_42C8);
    assert_eq!(jit.regs()[5], 0xCF89_B8C7);
    assert_eq!(jit.regs()[6], 0xB671_3F85);
    assert_eq!(jit.regs()[7], 0x015E_2AA5);
    assert_eq!(jit.regs()[8], 0xCD14_336A);
    assert_eq!(jit.regs()[9], 0xAFCA_0F3E);
    assert_eq!(jit.regs()[10], 0xACE2_EFD9);
    assert_eq!(jit.regs()[11], 0x68FB_82CD);
    assert_eq!(jit.regs()[12], 0x7754_47C0);
    assert_eq!(jit.regs()[13], 0xC9E1_F8CD);
    assert_eq!(jit.regs()[14], 0xEBE0_E626);
    assert_eq!(jit.regs()[15], 0x0000_0014);
    assert_eq!(jit.cpsr(), 0x2000_01D0);
}

#[test]
fn shsax_halfword_edge() {
    // One of the subtracted halfwords is 0x8000: its two's complement is
    // itself, which breaks naive negate-and-add implementations.
    let (mut jit, env) = make_jit(&[
        0xE63D_BF59, // shsax r11, sp, r9
        0xEAFF_FFFE, // b +#0
    ]);
    *jit.regs_mut() = [
        0x3A3B_8B18, 0x9615_6555, 0xFFEF_039F, 0xAFB9_46F2, 0x2030_A69A, 0xAFE0_9B2A, 0x8968_23C8,
        0xABDE_0DED, 0x9825_D6A6, 0x1749_8000, 0x999D_2C95, 0x8B81_2A59, 0x209B_DB58, 0x2F7F_B1D4,
        0x0F37_8107, 0x0000_0000,
    ];
    jit.set_cpsr(0x0000_01D0);

    run_ticks(&mut jit, &env, 2);

    assert_eq!(jit.regs()[9], 0x1749_8000);
    assert_eq!(jit.regs()[11], 0x57BF_E48E);
    assert_eq!(jit.regs()[13], 0x2F7F_B1D4);
    assert_eq!(jit.regs()[15], 0x0000_0004);
    assert_eq!(jit.cpsr(), 0x0000_01D0);
}

#[test]
fn uasx_zero_halfword_ge() {
    // Rm<31:16> == 0: the difference lane's GE bits need a true >= 0
    // test, not an addition-overflow check.
    let (mut jit, env) = make_jit(&[
        0xE654_9F35, // uasx r9, r4, r5
        0xEAFF_FFFE, // b +#0
    ]);
    jit.regs_mut()[4] = 0x8ED3_8F4C;
    jit.regs_mut()[5] = 0x0000_261D;
    jit.set_cpsr(0x0000_01D0);

    run_ticks(&mut jit, &env, 2);

    assert_eq!(jit.regs()[4], 0x8ED3_8F4C);
    assert_eq!(jit.regs()[5], 0x0000_261D);
    assert_eq!(jit.regs()[9], 0xB4F0_8F4C);
    assert_eq!(jit.regs()[15], 0x0000_0004);
    assert_eq!(jit.cpsr(), 0x0003_01D0);
}

#[test]
fn smuad_saturating_q() {
    // 0x8000 * 0x8000 + 0x8000 * 0x8000 overflows the signed addition
    // and must set Q.
    let (mut jit, env) = make_jit(&[
        0xE700_F211, // smuad r0, r1, r2
        0xEAFF_FFFE, // b +#0
    ]);
    jit.regs_mut()[1] = 0x8000_8000;
    jit.regs_mut()[2] = 0x8000_8000;
    jit.set_cpsr(0x0000_01D0);

    run_ticks(&mut jit, &env, 2);

    assert_eq!(jit.regs()[0], 0x8000_0000);
    assert_eq!(jit.regs()[15], 0x0000_0004);
    assert_eq!(jit.cpsr(), 0x0800_01D0);
}

#[test]
fn memory_load_store_roundtrip() {
    let (mut jit, env) = make_jit(&[
        0xE3A0_1A01, // mov r1, #0x1000
        0xE3A0_0C7B, // mov r0, #0x7B00
        0xE581_0004, // str r0, [r1, #4]
        0xE591_2004, // ldr r2, [r1, #4]
        0xE5D1_3004, // ldrb r3, [r1, #4]
        0xEAFF_FFFE, // b +#0
    ]);
    jit.set_cpsr(0x0000_01D0);

    run_ticks(&mut jit, &env, 6);

    assert_eq!(jit.regs()[2], 0x7B00);
    assert_eq!(jit.regs()[3], 0x00);
    assert_eq!(env.borrow().writes.get(&0x1005), Some(&0x7B));
    assert_eq!(jit.regs()[15], 0x14);
}

#[test]
fn conditional_block_skips_body() {
    // Z is clear, so the EQ-guarded pair must be skipped wholesale while
    // still consuming its ticks.
    let (mut jit, env) = make_jit(&[
        0xE3A0_0001, // mov r0, #1
        0xE350_0000, // cmp r0, #0  (Z clear)
        0x03A0_1005, // moveq r1, #5
        0x03A0_2006, // moveq r2, #6
        0xEAFF_FFFE, // b +#0
    ]);
    jit.set_cpsr(0x0000_01D0);

    run_ticks(&mut jit, &env, 5);

    assert_eq!(jit.regs()[0], 1);
    assert_eq!(jit.regs()[1], 0);
    assert_eq!(jit.regs()[2], 0);
    assert_eq!(jit.regs()[15], 0x10);
    assert_eq!(jit.cpsr(), 0x2000_01D0); // C set by the compare
}

#[test]
fn conditional_block_executes_body() {
    let (mut jit, env) = make_jit(&[
        0xE3A0_0000, // mov r0, #0
        0xE350_0000, // cmp r0, #0  (Z set)
        0x03A0_1005, // moveq r1, #5
        0x03A0_2006, // moveq r2, #6
        0xEAFF_FFFE, // b +#0
    ]);
    jit.set_cpsr(0x0000_01D0);

    run_ticks(&mut jit, &env, 5);

    assert_eq!(jit.regs()[1], 5);
    assert_eq!(jit.regs()[2], 6);
    assert_eq!(jit.cpsr(), 0x6000_01D0); // Z and C from the compare
}

#[test]
fn branch_and_link_returns_through_rsb() {
    let (mut jit, env) = make_jit(&[
        0xEB00_0001, // bl +#4  (to 0xC)
        0xE3A0_2007, // mov r2, #7    (return target)
        0xEAFF_FFFE, // b +#0
        0xE3A0_1003, // 0xC: mov r1, #3
        0xE12F_FF1E, // bx lr
    ]);
    jit.set_cpsr(0x0000_01D0);

    run_ticks(&mut jit, &env, 6);

    assert_eq!(jit.regs()[14], 0x4);
    assert_eq!(jit.regs()[1], 3);
    assert_eq!(jit.regs()[2], 7);
    assert_eq!(jit.regs()[15], 0x8);
}

#[test]
fn undefined_instruction_reports_exception() {
    let (mut jit, env) = make_jit(&[
        0xE7F0_00F0, // udf #0
        0xEAFF_FFFE,
    ]);
    jit.set_cpsr(0x0000_01D0);

    run_ticks(&mut jit, &env, 2);

    let state = env.borrow();
    assert!(!state.exceptions.is_empty());
    assert_eq!(state.exceptions[0].0, 0);
}

#[test]
fn svc_invokes_callback_and_continues() {
    let (mut jit, env) = make_jit(&[
        0xEF00_0021, // svc #0x21
        0xE3A0_0004, // mov r0, #4
        0xEAFF_FFFE,
    ]);
    jit.set_cpsr(0x0000_01D0);

    run_ticks(&mut jit, &env, 3);

    assert_eq!(env.borrow().svc_calls, vec![0x21]);
    assert_eq!(jit.regs()[0], 4);
    assert_eq!(jit.regs()[15], 0x8);
}

#[test]
fn thumb_basic_arithmetic() {
    // movs r0, #5; movs r1, #13; adds r2, r0, r1; b .
    let (mut jit, env) = make_jit(&[0x210D_2005, 0xE7FE_1842]);
    jit.set_cpsr(0x0000_01F0); // User mode, Thumb state.

    run_ticks(&mut jit, &env, 4);

    assert_eq!(jit.regs()[0], 5);
    assert_eq!(jit.regs()[1], 13);
    assert_eq!(jit.regs()[2], 18);
    assert_eq!(jit.regs()[15], 0x6);
    assert_eq!(jit.cpsr(), 0x0000_01F0);
}

#[test]
fn vfp_scalar_add() {
    let (mut jit, env) = make_jit(&[
        0xEE32_1A03, // vadd.f32 s2, s4, s6
        0xEAFF_FFFE, // b +#0
    ]);
    jit.set_cpsr(0x0000_01D0);
    jit.ext_regs_mut()[4] = 1.5f32.to_bits();
    jit.ext_regs_mut()[6] = 2.25f32.to_bits();

    run_ticks(&mut jit, &env, 2);

    assert_eq!(jit.ext_regs()[2], 3.75f32.to_bits());
    assert_eq!(jit.regs()[15], 4);
    assert_eq!(jit.cpsr(), 0x0000_01D0);
}

#[test]
fn vfp_compare_transfers_flags() {
    let (mut jit, env) = make_jit(&[
        0xEEB4_0A46, // vcmp.f32 s0, s12
        0xEEF1_FA10, // vmrs apsr_nzcv, fpscr
        0xEAFF_FFFE, // b +#0
    ]);
    jit.set_cpsr(0x0000_01D0);
    jit.ext_regs_mut()[0] = 1.0f32.to_bits();
    jit.ext_regs_mut()[12] = 2.0f32.to_bits();

    run_ticks(&mut jit, &env, 3);

    // 1.0 < 2.0: N set.
    assert_eq!(jit.cpsr() & 0xF000_0000, 0x8000_0000);
}
