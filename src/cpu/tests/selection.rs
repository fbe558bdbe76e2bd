use std::sync::Arc;

use super::{TestStrip, compile, run};
use crate::clock::mock::MockClock;
use crate::signal::TerminationSignal;

const THREE_WAY: &str = "\
do-for-n 60
select-one
set 0 0xFF0000
set 1 0x00FF00
set 2 0x0000FF
select-one-end
do-for-n-end
";

#[test]
fn select_one_executes_exactly_one_member_per_pass() {
    let script = compile("select-one\nset 0 0xFF0000\nset 1 0x00FF00\nset 2 0x0000FF\nselect-one-end\n");
    let mut strip = TestStrip::new(4);
    let clock = MockClock::new();
    let signal = Arc::new(TerminationSignal::new());

    assert!(run(&script, &mut strip, &clock, &signal));
    assert_eq!(strip.set_calls.len(), 1);
}

#[test]
fn select_one_visits_every_member_over_many_passes() {
    let script = compile(THREE_WAY);
    let mut strip = TestStrip::new(4);
    let clock = MockClock::new();
    let signal = Arc::new(TerminationSignal::new());

    assert!(run(&script, &mut strip, &clock, &signal));
    assert_eq!(strip.set_calls.len(), 60);
    for member in 0..3 {
        assert!(
            strip.set_calls.iter().any(|&(index, _)| index == member),
            "member {} was never selected",
            member
        );
    }
}

#[test]
fn seeded_selection_is_reproducible() {
    let script = compile(THREE_WAY);
    let clock = MockClock::new();

    let mut first = TestStrip::new(4);
    let signal = Arc::new(TerminationSignal::new());
    assert!(run(&script, &mut first, &clock, &signal));

    let mut second = TestStrip::new(4);
    let signal = Arc::new(TerminationSignal::new());
    assert!(run(&script, &mut second, &clock, &signal));

    assert_eq!(first.set_calls, second.set_calls);
}
