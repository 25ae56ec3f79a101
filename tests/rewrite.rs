use fraction::Fraction;
use metrum::{GroupInfo, GroupKind, Meter, MeterRewriter};

fn eighth() -> Fraction {
    Fraction::new(1u64, 8u64)
}
fn quarter() -> Fraction {
    Fraction::new(1u64, 4u64)
}
fn dotted_quarter() -> Fraction {
    Fraction::new(3u64, 8u64)
}

#[test]
fn test_conformant_voice_untouched() {
    let mut groups = vec![
        GroupInfo::note(quarter(), 60),
        GroupInfo::note(quarter(), 62),
        GroupInfo::note(Fraction::new(1u64, 2u64), 64),
    ];
    let expected = groups.clone();
    MeterRewriter::new(Meter::new(4, 4)).rewrite(&mut groups);
    assert_eq!(groups, expected);
}

#[test]
fn test_six_eight_beat_boundary() {
    // three quarters against 6/8: the middle one straddles the big beat
    let mut groups = vec![
        GroupInfo::note(quarter(), 60),
        GroupInfo::note(quarter(), 60),
        GroupInfo::note(quarter(), 60),
    ];
    let mut rewriter = MeterRewriter::new(Meter::new(6, 8));
    rewriter.set_boundary_depth(1);
    rewriter.rewrite(&mut groups);
    assert_eq!(
        groups,
        vec![
            GroupInfo::note(quarter(), 60),
            GroupInfo::tied_note(eighth(), 60),
            GroupInfo::note(eighth(), 60),
            GroupInfo::note(quarter(), 60),
        ]
    );
}

#[test]
fn test_four_four_beat_boundary() {
    let mut groups = vec![
        GroupInfo::note(dotted_quarter(), 60),
        GroupInfo::note(quarter(), 62),
        GroupInfo::note(dotted_quarter(), 64),
    ];
    let mut rewriter = MeterRewriter::new(Meter::new(4, 4));
    rewriter.set_boundary_depth(1);
    rewriter.rewrite(&mut groups);
    assert_eq!(
        groups,
        vec![
            GroupInfo::tied_note(quarter(), 60),
            GroupInfo::note(eighth(), 60),
            GroupInfo::tied_note(eighth(), 62),
            GroupInfo::note(eighth(), 62),
            GroupInfo::tied_note(eighth(), 64),
            GroupInfo::note(quarter(), 64),
        ]
    );
}

#[test]
fn test_rewriting_is_idempotent() {
    let mut groups = vec![
        GroupInfo::note(dotted_quarter(), 60),
        GroupInfo::note(quarter(), 62),
        GroupInfo::note(dotted_quarter(), 64),
    ];
    let mut rewriter = MeterRewriter::new(Meter::new(4, 4));
    rewriter.set_boundary_depth(1);
    rewriter.rewrite(&mut groups);
    let once = groups.clone();
    rewriter.rewrite(&mut groups);
    assert_eq!(groups, once);
}

#[test]
fn test_split_fuses_back_without_boundary() {
    // ties left over from an earlier boundary rewrite merge back into
    // plain written durations when no boundary is forced; the rest run
    // still splits, as five eighths do not fit one written rest
    let mut groups = vec![
        GroupInfo::tied_note(quarter(), 60),
        GroupInfo::note(eighth(), 60),
        GroupInfo::rest(eighth()),
        GroupInfo::rest(Fraction::new(1u64, 2u64)),
    ];
    MeterRewriter::new(Meter::new(4, 4)).rewrite(&mut groups);
    assert_eq!(
        groups,
        vec![
            GroupInfo::note(dotted_quarter(), 60),
            GroupInfo::rest(eighth()),
            GroupInfo::rest(Fraction::new(1u64, 2u64)),
        ]
    );
}

#[test]
fn test_maximum_dot_count_splits_double_dots() {
    let mut groups = vec![
        GroupInfo::note(Fraction::new(7u64, 8u64), 60),
        GroupInfo::rest(eighth()),
    ];
    // without a cap the double-dotted half stays whole
    let mut untouched = groups.clone();
    MeterRewriter::new(Meter::new(4, 4)).rewrite(&mut untouched);
    assert_eq!(untouched, groups);

    let mut rewriter = MeterRewriter::new(Meter::new(4, 4));
    rewriter.set_maximum_dot_count(1);
    rewriter.rewrite(&mut groups);
    assert_eq!(
        groups,
        vec![
            GroupInfo::tied_note(Fraction::new(3u64, 4u64), 60),
            GroupInfo::note(eighth(), 60),
            GroupInfo::rest(eighth()),
        ]
    );
}

#[test]
fn test_initial_offset_shifts_the_grid() {
    let mut groups = vec![GroupInfo::note(quarter(), 60)];
    let mut rewriter = MeterRewriter::new(Meter::new(4, 4));
    rewriter.set_initial_offset(eighth());
    rewriter.rewrite(&mut groups);
    assert_eq!(
        groups,
        vec![
            GroupInfo::tied_note(eighth(), 60),
            GroupInfo::note(eighth(), 60),
        ]
    );
}

#[test]
fn test_prolation_scales_the_grid() {
    // a voice sitting inside a 2/3 tuplet of a 2/4 meter
    let mut groups = vec![
        GroupInfo::note(eighth(), 60),
        GroupInfo::note(quarter(), 60),
        GroupInfo::note(eighth(), 60),
    ];
    let mut rewriter = MeterRewriter::new(Meter::new(2, 4));
    rewriter.set_prolation(Fraction::new(2u64, 3u64));
    rewriter.rewrite(&mut groups);
    assert_eq!(
        groups,
        vec![
            GroupInfo::note(eighth(), 60),
            GroupInfo::tied_note(eighth(), 60),
            GroupInfo::note(eighth(), 60),
            GroupInfo::note(eighth(), 60),
        ]
    );
}

#[test]
fn test_nested_span_rewrites_against_sub_meter() {
    let inner = vec![
        GroupInfo::note(dotted_quarter(), 60),
        GroupInfo::note(dotted_quarter(), 60),
    ];
    let mut groups = vec![
        GroupInfo::note(quarter(), 60),
        GroupInfo::nested(Fraction::new(2u64, 3u64), inner),
        GroupInfo::note(quarter(), 60),
    ];
    let mut rewriter = MeterRewriter::new(Meter::new(4, 4));
    rewriter.set_boundary_depth(1);
    rewriter.rewrite(&mut groups);
    assert_eq!(groups.len(), 3);
    assert_eq!(groups[0], GroupInfo::note(quarter(), 60));
    assert_eq!(groups[2], GroupInfo::note(quarter(), 60));
    // the inner voice got its own sub-meter (3/4) with one forced
    // boundary level
    match &groups[1].kind {
        GroupKind::Nested(nested) => {
            assert_eq!(nested.multiplier, Fraction::new(2u64, 3u64));
            assert_eq!(
                nested.groups,
                vec![
                    GroupInfo::tied_note(quarter(), 60),
                    GroupInfo::note(eighth(), 60),
                    GroupInfo::tied_note(eighth(), 60),
                    GroupInfo::note(quarter(), 60),
                ]
            );
        }
        other => panic!("nested span should stay nested, got {other:?}"),
    }
}

#[test]
fn test_nested_span_left_alone_when_disabled() {
    let inner = vec![
        GroupInfo::note(dotted_quarter(), 60),
        GroupInfo::note(dotted_quarter(), 60),
    ];
    let mut groups = vec![GroupInfo::nested(Fraction::new(2u64, 3u64), inner.clone())];
    let mut rewriter = MeterRewriter::new(Meter::new(2, 4));
    rewriter.set_boundary_depth(1).set_rewrite_nested(false);
    rewriter.rewrite(&mut groups);
    assert_eq!(groups, vec![GroupInfo::nested(Fraction::new(2u64, 3u64), inner)]);
}
