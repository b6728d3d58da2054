// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use numbers_server_rs::server::validate::{LineValidator, Verdict};

#[test]
fn test_classify_number_lines() {
    let v = LineValidator::new("terminate", 9);

    assert_eq!(v.classify(b"314159265"), Verdict::Number(314_159_265));
    assert_eq!(v.classify(b"007007009"), Verdict::Number(7_007_009));
    assert_eq!(v.classify(b"000000000"), Verdict::Number(0));
    assert_eq!(v.classify(b"999999999"), Verdict::Number(999_999_999));
}

#[test]
fn test_classify_rejects_malformed_lines() {
    let v = LineValidator::new("terminate", 9);

    let cases: &[&[u8]] = &[
        b"",
        b"00700700",    // one digit short
        b"1234567890",  // one digit long
        b"12345678a",   // trailing letter
        b"123 45678",   // interior space
        b"-12345678",   // sign is not a digit
        b"testing",
        b"terminate ",  // padded keyword
        b" terminate",
        b"\tterminate",
        b"TERMINATE",   // keyword match is case sensitive
    ];
    for case in cases {
        assert_eq!(v.classify(case), Verdict::Reject, "case {case:?}");
    }
}

#[test]
fn test_keyword_matches_byte_for_byte() {
    let v = LineValidator::new("terminate", 9);

    assert_eq!(v.classify(b"terminate"), Verdict::Terminate);
    assert_eq!(v.classify(b"terminat"), Verdict::Reject);
    assert_eq!(v.classify(b"terminatee"), Verdict::Reject);
}

#[test]
fn test_custom_keyword_and_width() {
    let v = LineValidator::new("stop", 4);

    assert_eq!(v.classify(b"stop"), Verdict::Terminate);
    assert_eq!(v.classify(b"0042"), Verdict::Number(42));
    assert_eq!(v.classify(b"042"), Verdict::Reject);
    assert_eq!(v.classify(b"00042"), Verdict::Reject);
}

#[test]
fn test_all_digit_keyword_takes_precedence() {
    // A keyword that happens to look like a number line still terminates:
    // the keyword comparison runs first.
    let v = LineValidator::new("123456789", 9);

    assert_eq!(v.classify(b"123456789"), Verdict::Terminate);
    assert_eq!(v.classify(b"123456780"), Verdict::Number(123_456_780));
}
