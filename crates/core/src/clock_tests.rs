// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_is_monotonic_enough() {
    let clock = SystemClock;
    let a = clock.now_ms();
    let b = clock.now_ms();
    assert!(b >= a);
}

#[test]
fn fake_clock_advances() {
    let clock = FakeClock::new();
    let start = clock.now_ms();
    clock.advance(Duration::from_secs(90));
    assert_eq!(clock.now_ms(), start + 90_000);
}

#[test]
fn fake_clock_set_ms() {
    let clock = FakeClock::new();
    clock.set_ms(42);
    assert_eq!(clock.now_ms(), 42);
}

#[test]
fn fake_clock_clones_share_time() {
    let clock = FakeClock::new();
    let other = clock.clone();
    clock.advance(Duration::from_millis(7));
    assert_eq!(clock.now_ms(), other.now_ms());
}
