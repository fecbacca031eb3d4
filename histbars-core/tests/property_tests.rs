//! Property tests for request normalization and bar processing.
//!
//! Uses proptest to verify:
//! 1. Symbols are trimmed and upper-cased; blank symbols are rejected
//! 2. Option rights normalize case-insensitively to C, P, CALL or PUT
//! 3. Strike and expiry validation accept exactly the well-formed values
//! 4. Processors carry the bar date through and derive fields consistently
//! 5. Enum values parse back from their wire value and their name

use proptest::prelude::*;

use histbars_core::transport::wire::{encode_fields, read_frame, split_fields};
use histbars_core::{
    BarData, BarProcessor, BarSize, BidAskProcessor, ClientError, DataType, Duration,
    FieldValue, HistoricalDataRequest, MidpointProcessor, TradesProcessor,
};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_symbol() -> impl Strategy<Value = String> {
    "[ ]{0,3}[a-zA-Z][a-zA-Z0-9.]{0,7}[ ]{0,3}"
}

fn arb_price() -> impl Strategy<Value = f64> {
    (1.0..5000.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_bar() -> impl Strategy<Value = BarData> {
    (arb_price(), arb_price(), arb_price(), arb_price(), 0u32..10_000_000).prop_map(
        |(open, high, low, close, volume)| BarData {
            date: "20240115 09:30:00".into(),
            open,
            high,
            low,
            close,
            volume: f64::from(volume),
            wap: (open + close) / 2.0,
            bar_count: 1,
        },
    )
}

fn arb_right() -> impl Strategy<Value = String> {
    prop_oneof![Just("c"), Just("p"), Just("call"), Just("put")].prop_flat_map(|base| {
        proptest::collection::vec(any::<bool>(), base.len()).prop_map(move |upper| {
            base.chars()
                .zip(upper)
                .map(|(ch, up)| if up { ch.to_ascii_uppercase() } else { ch })
                .collect()
        })
    })
}

// ── 1. Symbols ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn symbol_is_trimmed_and_uppercased(raw in arb_symbol()) {
        let request = HistoricalDataRequest::builder(raw.as_str()).build().unwrap();
        prop_assert_eq!(request.symbol(), raw.trim().to_uppercase());
    }

    #[test]
    fn blank_symbol_is_rejected(raw in "[ \t]{0,6}") {
        let err = HistoricalDataRequest::builder(raw).build().unwrap_err();
        prop_assert_eq!(err, ClientError::Validation("symbol cannot be empty".into()));
    }
}

// ── 2. Option rights ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn right_normalizes_to_uppercase(right in arb_right()) {
        let request = HistoricalDataRequest::builder("AAPL")
            .right(right.as_str())
            .build()
            .unwrap();
        let expected = right.to_uppercase();
        prop_assert_eq!(request.right(), Some(expected.as_str()));
    }

    #[test]
    fn unknown_right_is_rejected(right in "[a-zA-Z]{2,6}") {
        prop_assume!(!matches!(right.to_uppercase().as_str(), "CALL" | "PUT"));
        let result = HistoricalDataRequest::builder("AAPL").right(right).build();
        prop_assert!(matches!(result, Err(ClientError::Validation(_))));
    }
}

// ── 3. Strike and expiry ─────────────────────────────────────────────

proptest! {
    #[test]
    fn positive_strike_accepted(strike in 0.01..100_000.0_f64) {
        let request = HistoricalDataRequest::builder("SPY").strike(strike).build().unwrap();
        prop_assert_eq!(request.strike(), Some(strike));
    }

    #[test]
    fn non_positive_strike_rejected(strike in -100_000.0..=0.0_f64) {
        let result = HistoricalDataRequest::builder("SPY").strike(strike).build();
        prop_assert!(matches!(result, Err(ClientError::Validation(_))));
    }

    #[test]
    fn expiry_must_have_eight_characters(expiry in "[0-9]{0,12}") {
        let result = HistoricalDataRequest::builder("SPY").expiry(expiry.as_str()).build();
        prop_assert_eq!(result.is_ok(), expiry.len() == 8);
    }
}

// ── 4. Processors ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn trades_copies_ohlcv(bar in arb_bar()) {
        let record = TradesProcessor.process(&bar);
        prop_assert_eq!(record.len(), 6);
        prop_assert_eq!(record.get("date"), Some(&FieldValue::Text(bar.date.clone())));
        prop_assert_eq!(record.get("open").and_then(FieldValue::as_f64), Some(bar.open));
        prop_assert_eq!(record.get("close").and_then(FieldValue::as_f64), Some(bar.close));
        prop_assert_eq!(record.get("volume").and_then(FieldValue::as_i64), Some(bar.volume as i64));
    }

    #[test]
    fn midpoint_lies_between_open_and_high(bar in arb_bar()) {
        let record = MidpointProcessor.process(&bar);
        let mid = record.get("midpoint").and_then(FieldValue::as_f64).unwrap();
        prop_assert!(mid >= bar.open.min(bar.high));
        prop_assert!(mid <= bar.open.max(bar.high));
    }

    #[test]
    fn bid_ask_sizes_are_whole(bar in arb_bar()) {
        let record = BidAskProcessor.process(&bar);
        prop_assert_eq!(record.get("bid_size"), Some(&FieldValue::Int(bar.low.trunc() as i64)));
        prop_assert_eq!(record.get("ask_size"), Some(&FieldValue::Int(bar.close.trunc() as i64)));
        prop_assert_eq!(record.get("bid_price").and_then(FieldValue::as_f64), Some(bar.open));
    }
}

// ── 5. Enums and framing ─────────────────────────────────────────────

proptest! {
    #[test]
    fn bar_size_parses_from_wire_value_or_name(idx in 0..BarSize::ALL.len()) {
        let size = BarSize::ALL[idx];
        prop_assert_eq!(size.as_str().parse::<BarSize>().unwrap(), size);
        prop_assert_eq!(size.name().to_lowercase().parse::<BarSize>().unwrap(), size);
    }

    #[test]
    fn duration_and_data_type_parse_from_name(
        d in 0..Duration::ALL.len(),
        t in 0..DataType::ALL.len(),
    ) {
        let duration = Duration::ALL[d];
        let data_type = DataType::ALL[t];
        prop_assert_eq!(duration.name().parse::<Duration>().unwrap(), duration);
        prop_assert_eq!(data_type.name().parse::<DataType>().unwrap(), data_type);
    }

    #[test]
    fn framed_fields_split_back(fields in proptest::collection::vec("[ -~]{0,12}", 1..10)) {
        let bytes = encode_fields(&fields);
        let payload = read_frame(&mut bytes.as_slice()).unwrap();
        let split = split_fields(&payload);
        // A lone empty field frames as a single NUL and splits to nothing.
        if fields == vec![String::new()] {
            prop_assert!(split.is_empty());
        } else {
            prop_assert_eq!(split, fields);
        }
    }
}
