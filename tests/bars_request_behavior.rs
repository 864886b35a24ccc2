//! Request validation and interval negotiation, exercised through the public API.

use finvestor_core::{
    parse_duration, parse_symbols, DurationParseError, IntervalChoice,
    IntervalValidityTable, Period, TimeFrame, ValidationError, Window,
};
use finvestor_tests::*;

fn now() -> UtcDateTime {
    at("2024-03-15T16:00:00Z")
}

fn days(value: &str) -> TimeFrame {
    TimeFrame::parse(value).expect("valid duration")
}

// =============================================================================
// Request shape
// =============================================================================

#[test]
fn when_neither_period_nor_start_is_given_then_request_is_rejected() {
    let result = BarsRequest::builder(symbol("AAPL")).build_at(now());

    assert_eq!(result.unwrap_err(), ValidationError::MissingPeriodOrStart);
}

#[test]
fn when_period_and_start_are_combined_then_request_is_rejected() {
    let result = BarsRequest::builder(symbol("AAPL"))
        .period(SymbolicPeriod::FiveDays)
        .start(at("2024-03-10T00:00:00Z"))
        .build_at(now());

    assert_eq!(result.unwrap_err(), ValidationError::PeriodAndRange);
}

#[test]
fn when_start_is_in_the_future_then_request_is_rejected() {
    let result = BarsRequest::builder(symbol("AAPL"))
        .start(at("2024-03-16T00:00:00Z"))
        .build_at(now());

    assert!(matches!(
        result.unwrap_err(),
        ValidationError::StartNotInPast { .. }
    ));
}

#[test]
fn when_end_precedes_start_then_request_is_rejected() {
    let result = BarsRequest::builder(symbol("AAPL"))
        .start(at("2024-03-14T00:00:00Z"))
        .end(at("2024-03-13T00:00:00Z"))
        .build_at(now());

    assert!(matches!(
        result.unwrap_err(),
        ValidationError::StartNotBeforeEnd { .. }
    ));
}

#[test]
fn when_interval_is_not_shorter_than_period_then_request_is_rejected() {
    // Given: a single day of daily bars
    let result = BarsRequest::builder(symbol("AAPL"))
        .period(SymbolicPeriod::OneDay)
        .interval(Interval::OneDay)
        .build_at(now());

    // Then
    assert!(matches!(
        result.unwrap_err(),
        ValidationError::IntervalExceedsPeriod { .. }
    ));
}

#[test]
fn when_interval_is_wider_than_the_range_then_request_is_rejected() {
    let result = BarsRequest::builder(symbol("AAPL"))
        .start(at("2024-03-15T10:00:00Z"))
        .end(at("2024-03-15T10:30:00Z"))
        .interval(Interval::OneHour)
        .build_at(now());

    assert!(matches!(
        result.unwrap_err(),
        ValidationError::IntervalExceedsWindow { .. }
    ));
}

#[test]
fn when_only_start_and_interval_are_given_then_end_is_one_interval_later() {
    // Given
    let start = at("2024-03-15T10:00:00Z");

    // When
    let request = BarsRequest::builder(symbol("AAPL"))
        .start(start)
        .interval(Interval::FifteenMinutes)
        .build_at(now())
        .expect("valid request");

    // Then
    assert_eq!(
        request.window(),
        Window::Range {
            start,
            end: Some(at("2024-03-15T10:15:00Z")),
        }
    );
}

#[test]
fn when_start_is_given_with_auto_interval_then_end_follows_the_attempted_interval() {
    let request = BarsRequest::builder(symbol("AAPL"))
        .start(at("2024-03-15T10:00:00Z"))
        .build_at(now())
        .expect("valid request");

    assert_eq!(request.interval(), IntervalChoice::Auto);
    assert_eq!(
        request.end_for(Interval::OneHour),
        Some(at("2024-03-15T11:00:00Z"))
    );
    assert_eq!(
        request.end_for(Interval::FiveMinutes),
        Some(at("2024-03-15T10:05:00Z"))
    );
}

#[test]
fn when_request_is_copied_for_another_symbol_then_the_window_is_shared() {
    let request = BarsRequest::builder(symbol("AAPL"))
        .period(SymbolicPeriod::OneMonth)
        .build_at(now())
        .expect("valid request");

    let copy = request.with_symbol(symbol("MSFT"));

    assert_eq!(copy.symbol().as_str(), "MSFT");
    assert_eq!(copy.window(), request.window());
    assert_eq!(copy.issued_at(), request.issued_at());
}

// =============================================================================
// Inputs: durations, periods, intervals, symbols
// =============================================================================

#[test]
fn when_durations_use_mixed_notations_then_they_agree() {
    assert_eq!(
        parse_duration("1h30m").expect("tokens"),
        parse_duration("PT1H30M").expect("iso8601")
    );
    assert_eq!(
        parse_duration("01:30:00").expect("clock"),
        parse_duration("90m").expect("minutes")
    );
}

#[test]
fn when_duration_is_blank_then_it_is_rejected() {
    assert!(matches!(parse_duration("   "), Err(DurationParseError::Empty)));
}

#[test]
fn when_period_is_not_symbolic_then_it_is_parsed_as_a_span() {
    let period: Period = "10d".parse().expect("span");

    assert_eq!(period, Period::Span(days("10d")));
    assert_eq!(
        "ytd".parse::<Period>().expect("symbolic"),
        Period::Symbolic(SymbolicPeriod::YearToDate)
    );
}

#[test]
fn when_interval_is_written_as_a_duration_then_it_maps_to_a_supported_interval() {
    assert_eq!("60m".parse::<Interval>().expect("interval"), Interval::OneHour);
    assert_eq!(
        "auto".parse::<IntervalChoice>().expect("auto"),
        IntervalChoice::Auto
    );
    assert!("7m".parse::<Interval>().is_err());
}

#[test]
fn when_ticker_list_repeats_symbols_then_they_are_deduplicated_in_order() {
    let symbols = parse_symbols(" msft, AAPL ,MSFT,,btc-usd").expect("symbols");

    let names: Vec<&str> = symbols.iter().map(Symbol::as_str).collect();
    assert_eq!(names, vec!["MSFT", "AAPL", "BTC-USD"]);
    assert!(symbols[2].is_crypto_pair());
}

#[test]
fn when_ticker_list_is_empty_then_it_is_rejected() {
    assert_eq!(parse_symbols(" , ").unwrap_err(), ValidationError::EmptySymbol);
    assert!(matches!(
        parse_symbols("AAPL,$X").unwrap_err(),
        ValidationError::SymbolInvalidStart { ch: '$' }
    ));
}

// =============================================================================
// Interval negotiation
// =============================================================================

#[test]
fn when_lookback_is_within_a_week_then_yahoo_offers_one_minute_bars_first() {
    let table = IntervalValidityTable::yahoo();

    let candidates = table.candidates(IntervalChoice::Auto, days("5d"));

    assert_eq!(candidates.first(), Some(&Interval::OneMinute));
    assert_eq!(candidates.last(), Some(&Interval::ThreeMonths));
}

#[test]
fn when_exact_interval_is_too_fine_for_the_lookback_then_every_valid_interval_is_offered() {
    // Given: 1m bars are only kept for a week
    let table = IntervalValidityTable::yahoo();

    // When
    let candidates = table.candidates(IntervalChoice::Exact(Interval::OneMinute), days("30d"));

    // Then
    assert_eq!(candidates.first(), Some(&Interval::TwoMinutes));
}

#[test]
fn when_lookback_exceeds_two_years_then_only_daily_and_coarser_remain() {
    let table = IntervalValidityTable::yahoo();

    let candidates = table.candidates(IntervalChoice::Exact(Interval::OneHour), days("800d"));

    assert_eq!(
        candidates,
        vec![
            Interval::OneDay,
            Interval::FiveDays,
            Interval::OneMonth,
            Interval::ThreeMonths
        ]
    );
}

#[test]
fn when_alpaca_table_is_asked_for_five_day_bars_then_it_does_not_support_them() {
    let table = IntervalValidityTable::alpaca();

    assert!(table.supports(Interval::OneDay));
    assert!(!table.supports(Interval::FiveDays));
    assert_eq!(
        table.candidates(IntervalChoice::Exact(Interval::OneHour), days("3650d")),
        vec![Interval::OneHour, Interval::OneDay]
    );
}
