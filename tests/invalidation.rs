//! Cache coherency: range and full invalidation, and context
//! save/restore across invalidation generations.

mod common;

use common::{make_jit, run_ticks};

#[test]
fn invalidate_cache_range_retranslates() {
    let (mut jit, env) = make_jit(&[
        0xE3A0_0005, // mov r0, #5
        0xE3A0_100D, // mov r1, #13
        0xE081_2000, // add r2, r1, r0
        0xEAFF_FFFE, // b +#0
    ]);
    jit.set_cpsr(0x0000_01D0);

    run_ticks(&mut jit, &env, 4);

    assert_eq!(jit.regs()[0], 5);
    assert_eq!(jit.regs()[1], 13);
    assert_eq!(jit.regs()[2], 18);
    assert_eq!(jit.regs()[15], 0x0000_000C);
    assert_eq!(jit.cpsr(), 0x0000_01D0);

    // Rewrite one instruction and invalidate just its word.
    env.borrow_mut().code_mem[1] = 0xE3A0_1007; // mov r1, #7
    jit.invalidate_cache_range(4, 4);

    jit.regs_mut()[15] = 0;
    run_ticks(&mut jit, &env, 4);

    assert_eq!(jit.regs()[0], 5);
    assert_eq!(jit.regs()[1], 7);
    assert_eq!(jit.regs()[2], 12);
    assert_eq!(jit.regs()[15], 0x0000_000C);
    assert_eq!(jit.cpsr(), 0x0000_01D0);
}

#[test]
fn invalidate_range_outside_block_keeps_translation() {
    let (mut jit, env) = make_jit(&[
        0xE3A0_0001, // mov r0, #1
        0xEAFF_FFFE, // b +#0
    ]);
    jit.set_cpsr(0x0000_01D0);
    run_ticks(&mut jit, &env, 2);
    assert_eq!(jit.regs()[0], 1);

    // A disjoint range; the cached block stays valid even though the
    // backing word changed (the embedder said nothing about it).
    jit.invalidate_cache_range(0x4000, 16);

    jit.regs_mut()[15] = 0;
    run_ticks(&mut jit, &env, 2);
    assert_eq!(jit.regs()[0], 1);
}

#[test]
fn clear_cache_discards_everything() {
    let (mut jit, env) = make_jit(&[
        0xE3A0_0005, // mov r0, #5
        0xEAFF_FFFE, // b +#0
    ]);
    jit.set_cpsr(0x0000_01D0);
    run_ticks(&mut jit, &env, 2);
    assert_eq!(jit.regs()[0], 5);

    env.borrow_mut().code_mem[0] = 0xE3A0_0009; // mov r0, #9
    jit.clear_cache();

    jit.regs_mut()[15] = 0;
    run_ticks(&mut jit, &env, 2);
    assert_eq!(jit.regs()[0], 9);
}

#[test]
fn context_round_trip_is_identity() {
    let (mut jit, env) = make_jit(&[
        0xE3A0_0005, // mov r0, #5
        0xEAFF_FFFE, // b +#0
    ]);
    jit.set_cpsr(0x0000_01D0);
    jit.regs_mut()[3] = 0xDEAD_BEEF;
    jit.ext_regs_mut()[7] = 0x3F80_0000;
    jit.set_fpscr(0x0300_0000);
    run_ticks(&mut jit, &env, 2);

    let ctx = jit.save_context();
    let regs = *jit.regs();
    let ext = *jit.ext_regs();
    let cpsr = jit.cpsr();
    let fpscr = jit.fpscr();

    jit.regs_mut()[0] = 0;
    jit.set_cpsr(0xF000_01D0);
    jit.load_context(&ctx);

    assert_eq!(*jit.regs(), regs);
    assert_eq!(*jit.ext_regs(), ext);
    assert_eq!(jit.cpsr(), cpsr);
    assert_eq!(jit.fpscr(), fpscr);
}

#[test]
fn stale_context_does_not_resurrect_code_pointers() {
    let (mut jit, env) = make_jit(&[
        0xEB00_0000, // bl +#0 (to 0x8; pushes an RSB entry)
        0xEAFF_FFFE, // b +#0
        0xE12F_FF1E, // 0x8: bx lr
    ]);
    jit.set_cpsr(0x0000_01D0);
    run_ticks(&mut jit, &env, 4);

    // Snapshot with a warm RSB, then wipe the cache (bumping the
    // invalidation generation) and restore.
    let ctx = jit.save_context();
    jit.clear_cache();
    jit.load_context(&ctx);

    // Restored state must execute correctly from scratch.
    jit.regs_mut()[15] = 0;
    run_ticks(&mut jit, &env, 4);
    assert_eq!(jit.regs()[15], 0x4);
}
