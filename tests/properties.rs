//! Property tests for conversions and selection rules

use proptest::prelude::*;
use showrunner::config::TransitionConfig;
use showrunner::models::{same_apparatus, Segment, SegmentType, TransitionSpec};
use showrunner::scheduler::select_transition;
use showrunner::utils::volume_to_db;

fn segment_type() -> impl Strategy<Value = SegmentType> {
    prop_oneof![
        Just(SegmentType::Static),
        Just(SegmentType::Live),
        Just(SegmentType::Multi),
        Just(SegmentType::Hold),
        Just(SegmentType::Break),
        Just(SegmentType::Video),
        Just(SegmentType::Graphic),
    ]
}

fn apparatus() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[A-Z]{2}", 0..6)
}

fn transitions() -> TransitionConfig {
    TransitionConfig {
        default: Some(TransitionSpec::new("Fade", 500)),
        into_break: Some(TransitionSpec::new("Stinger", 1200)),
        out_of_break: Some(TransitionSpec::new("Swipe", 800)),
    }
}

proptest! {
    /// Property: any input volume maps into the switcher's dB range
    #[test]
    fn volume_stays_in_range(volume in -10.0f64..10.0) {
        let db = volume_to_db(volume);
        prop_assert!((-100.0..=0.0).contains(&db), "{} dB out of range for {}", db, volume);
    }

    /// Property: louder linear volume never yields a quieter dB value
    #[test]
    fn volume_is_monotonic(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(volume_to_db(low) <= volume_to_db(high));
    }

    /// Property: apparatus comparison ignores order
    #[test]
    fn apparatus_order_is_ignored(codes in apparatus()) {
        let mut reversed = codes.clone();
        reversed.reverse();
        prop_assert!(same_apparatus(&codes, &reversed));
    }

    /// Property: apparatus comparison is symmetric
    #[test]
    fn apparatus_comparison_is_symmetric(a in apparatus(), b in apparatus()) {
        prop_assert_eq!(same_apparatus(&a, &b), same_apparatus(&b, &a));
    }

    /// Property: a segment's own transition beats every show-level rule
    #[test]
    fn own_transition_always_wins(
        incoming in segment_type(),
        outgoing in prop::option::of(segment_type()),
        duration_ms in 0u32..5000,
    ) {
        let own = TransitionSpec::new("Luma", duration_ms);
        let next = Segment::new("next", "Next", incoming).with_transition(own.clone());
        let prev = outgoing.map(|t| Segment::new("prev", "Prev", t));

        let picked = select_transition(&next, prev.as_ref(), Some(&transitions()));
        prop_assert_eq!(picked, own);
    }

    /// Property: without any configuration every change is a cut
    #[test]
    fn unconfigured_changes_are_cuts(
        incoming in segment_type(),
        outgoing in prop::option::of(segment_type()),
    ) {
        let next = Segment::new("next", "Next", incoming);
        let prev = outgoing.map(|t| Segment::new("prev", "Prev", t));

        prop_assert_eq!(select_transition(&next, prev.as_ref(), None), TransitionSpec::cut());
    }
}
