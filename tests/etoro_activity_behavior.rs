//! Account activity exports and statement workbooks read from disk.

use std::io::Write;

use finvestor_core::{
    load_account_statement, to_yahoo_ticker, AccountActivity, ActivityError, ActivityKind,
    TradeSide,
};
use finvestor_tests::at;
use rust_xlsxwriter::Workbook;
use tempfile::NamedTempFile;

const HEADER: &str =
    "Date,Type,Details,Amount,Units,Realized Equity Change,Realized Equity,Balance,Position ID,NWA";

fn export(rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    writeln!(file, "{HEADER}").expect("header");
    for row in rows {
        writeln!(file, "{row}").expect("row");
    }
    file.flush().expect("flush");
    file
}

// =============================================================================
// Partitioning
// =============================================================================

#[test]
fn when_export_mixes_cash_and_trades_then_each_table_gets_its_rows() {
    // Given: a year of activity for a small crypto and stock account
    let file = export(&[
        "01/02/2022 08:00:00,Deposit,,2000.00,-,2000.00,2000.00,2000.00,-,0.00",
        "01/02/2022 09:30:00,Open Position,BTC/USD,800.00,0.021,0.00,2000.00,1200.00,900001,0.00",
        "01/02/2022 09:31:00,Open Position,BBRY/USD,200.00,25,0.00,2000.00,1000.00,900002,0.00",
        "02/02/2022 00:00:00,Rollover Fee,BTC/USD,-0.40,-,-0.40,1999.60,999.60,900001,0.00",
        "10/03/2022 15:00:00,Profit/Loss of Trade,BTC/USD,860.00,0.021,60.00,2059.60,1859.60,\
         900001,0.00",
        "11/03/2022 12:00:00,Withdraw Request,,-500.00,-,-500.00,1559.60,1359.60,-,0.00",
        "11/03/2022 12:00:00,Withdraw Request Cancelled,,500.00,-,500.00,2059.60,1859.60,-,0.00",
    ]);

    // When
    let activity = AccountActivity::from_path(file.path()).expect("activity");
    let tables = activity.partition();

    // Then
    assert_eq!(activity.len(), 7);
    assert_eq!(tables.deposits.len(), 1);
    assert_eq!(tables.fees.len(), 1);
    assert_eq!(tables.withdrawals.len(), 2);
    assert_eq!(tables.opened.len(), 2);
    assert_eq!(tables.closed.len(), 1);

    let closed = &tables.closed[0];
    assert_eq!(closed.ticker, "BTC");
    assert_eq!(closed.currency.as_deref(), Some("USD"));
    assert_eq!(closed.position_id, Some(900_001));
    assert_eq!(closed.realized_equity_change, 60.0);
    assert_eq!(closed.date, at("2022-03-10T15:00:00Z"));
    assert_eq!(closed.yahoo_ticker(), "BTC-USD");

    let tickers: Vec<&str> = tables.opened.iter().map(|event| event.yahoo_ticker()).collect();
    assert_eq!(tickers, vec!["BTC-USD", "BB"]);
}

#[test]
fn when_export_has_only_a_header_then_activity_is_empty() {
    let file = export(&[]);

    let activity = AccountActivity::from_path(file.path()).expect("activity");

    assert!(activity.is_empty());
    assert_eq!(activity.partition(), Default::default());
}

// =============================================================================
// Rejections
// =============================================================================

#[test]
fn when_a_row_has_an_unknown_type_then_its_line_is_reported() {
    let file = export(&[
        "01/02/2022 08:00:00,Deposit,,2000.00,-,2000.00,2000.00,2000.00,-,0.00",
        "02/02/2022 08:00:00,Dividend,AAPL/USD,1.20,-,1.20,2001.20,2001.20,-,0.00",
    ]);

    let error = AccountActivity::from_path(file.path()).expect_err("unknown type");

    match error {
        ActivityError::UnknownKind { row, value } => {
            assert_eq!(row, 3);
            assert_eq!(value, "Dividend");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn when_dates_use_iso_format_then_the_row_is_rejected() {
    let file = export(&["2022-02-01 08:00:00,Deposit,,2000.00,-,2000.00,2000.00,2000.00,-,0.00"]);

    let error = AccountActivity::from_path(file.path()).expect_err("bad date");

    assert!(matches!(error, ActivityError::InvalidDate { row: 2, .. }));
}

#[test]
fn when_file_is_missing_then_an_io_error_is_returned() {
    let dir = tempfile::tempdir().expect("temp dir");

    let error = AccountActivity::from_path(dir.path().join("missing.csv")).expect_err("missing");

    assert!(matches!(error, ActivityError::Io(_)));
}

// =============================================================================
// Statement workbooks
// =============================================================================

const SUMMARY: &[[&str; 2]] = &[
    ["Details", ""],
    ["Name", "Totals"],
    ["Name", "Jane Doe"],
    ["Username", "jdoe"],
    ["Currency", "USD"],
    ["Date Created", "01/01/2022 10:28:13"],
    ["Start Date", "01/02/2022 00:00:00"],
    ["End Date", "31/03/2022 23:59:59"],
    ["", ""],
    ["Account Summary (USD)", "Totals"],
    ["Beginning Realized Equity", "0.00"],
    ["Deposits", "2000.00"],
    ["Refunds", "0.00"],
    ["Credits", "0.00"],
    ["Adjustments", "0.00"],
    ["Profit or Loss (Closed positions only)", "60.00"],
    ["Rollover Fees", "0.40"],
    ["Withdrawals", "0.00"],
    ["Withdrawal Fees", "0.00"],
    ["Ending Realized Equity", "2059.60"],
    ["", ""],
    ["Unrealized Account Summary*", "Totals"],
    ["Beginning Unrealized Equity", "0.00"],
    ["Ending Unrealized Equity", "2100.00"],
];

const FINANCIAL: &[[&str; 3]] = &[
    ["Name", "Amount\nin USD", "Tax\nRate"],
    ["CFDs (Profit or Loss)", "0", "0"],
    ["Crypto (Profit or Loss)", "60", "0"],
    ["Stocks (Profit or Loss)", "0", "0"],
    ["ETFs (Profit or Loss)", "0", "0"],
    ["Stock Dividends (Profit)", "0", "0"],
    ["CFD Dividends (Profit or Loss)", "0", "0"],
    ["Income from Refunds", "0", "0"],
    ["Commissions (spread) on CFDs", "0", "0"],
    ["Commissions (spread) on Crypto", "1.25", "0"],
    ["Commissions (spread) on ETFs", "0", "0"],
    ["Fees", "0.4", "0"],
];

const CLOSED_HEADER: [&str; 17] = [
    "Position ID",
    "Action",
    "Amount",
    "Units",
    "Open Rate",
    "Close Rate",
    "Spread",
    "Profit",
    "Open Date",
    "Close Date",
    "Take Profit Rate",
    "Stop Lose Rate",
    "Rollover Fees And Dividends",
    "Copied From",
    "Type",
    "ISIN",
    "Notes",
];

const BTC_CLOSED: [&str; 17] = [
    "900001",
    "Buy Bitcoin",
    "800.00",
    "0.021",
    "38095.24",
    "40952.38",
    "0.00",
    "60.00",
    "01/02/2022 09:30:00",
    "10/03/2022 15:00:00",
    "0",
    "0",
    "-0.40",
    "-",
    "Crypto",
    "",
    "",
];

const ACTIVITY_HEADER: [&str; 10] = [
    "Date",
    "Type",
    "Details",
    "Amount",
    "Units",
    "Realized Equity Change",
    "Realized Equity",
    "Balance",
    "Position ID",
    "NWA",
];

const ACTIVITY: &[[&str; 10]] = &[
    [
        "01/02/2022 08:00:00",
        "Deposit",
        "",
        "2000.00",
        "-",
        "2000.00",
        "2000.00",
        "2000.00",
        "-",
        "0",
    ],
    [
        "01/02/2022 09:30:00",
        "Open Position",
        "BTC/USD",
        "800.00",
        "0.021",
        "0.00",
        "2000.00",
        "1200.00",
        "900001",
        "0",
    ],
    [
        "01/02/2022 09:31:00",
        "Open Position",
        "BBRY/USD",
        "200.00",
        "25",
        "0.00",
        "2000.00",
        "1000.00",
        "900002",
        "0",
    ],
    [
        "02/02/2022 00:00:00",
        "Rollover Fee",
        "BTC/USD",
        "-0.40",
        "-",
        "-0.40",
        "1999.60",
        "999.60",
        "900001",
        "0",
    ],
    [
        "10/03/2022 15:00:00",
        "Profit/Loss of Trade",
        "BTC/USD",
        "860.00",
        "0.021",
        "60.00",
        "2059.60",
        "1859.60",
        "900001",
        "0",
    ],
];

/// Writes one sheet; cells that read as numbers are stored as numbers.
fn write_sheet<R: AsRef<[&'static str]>>(workbook: &mut Workbook, name: &str, rows: &[R]) {
    let sheet = workbook.add_worksheet();
    sheet.set_name(name).expect("sheet name");
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.as_ref().iter().enumerate() {
            let (r, c) = (r as u32, c as u16);
            if value.is_empty() {
                continue;
            }
            if let Ok(number) = value.parse::<f64>() {
                sheet.write_number(r, c, number).expect("number cell");
            } else {
                sheet.write_string(r, c, *value).expect("text cell");
            }
        }
    }
}

fn statement(closed: &[[&'static str; 17]], skip_sheet: Option<&str>) -> NamedTempFile {
    let mut closed_rows = vec![CLOSED_HEADER];
    closed_rows.extend_from_slice(closed);
    let mut activity_rows = vec![ACTIVITY_HEADER];
    activity_rows.extend_from_slice(ACTIVITY);

    let mut workbook = Workbook::new();
    if skip_sheet != Some("Account Summary") {
        write_sheet(&mut workbook, "Account Summary", SUMMARY);
    }
    if skip_sheet != Some("Financial Summary") {
        write_sheet(&mut workbook, "Financial Summary", FINANCIAL);
    }
    write_sheet(&mut workbook, "Closed Positions", &closed_rows);
    write_sheet(&mut workbook, "Account Activity", &activity_rows);

    let file = tempfile::Builder::new()
        .suffix(".xlsx")
        .tempfile()
        .expect("temp workbook");
    workbook.save(file.path()).expect("save workbook");
    file
}

#[test]
fn when_statement_is_loaded_then_opened_positions_are_joined_with_their_closes() {
    // Given: one closed BTC trade and one BBRY position still open
    let file = statement(&[BTC_CLOSED], None);

    // When
    let statement = load_account_statement(file.path()).expect("statement");

    // Then: summaries are keyed by their labels
    assert_eq!(statement.account_summary.name, "Jane Doe");
    assert_eq!(statement.account_summary.created_at, at("2022-01-01T10:28:13Z"));
    assert_eq!(statement.account_summary.final_realised_equity, 2059.6);
    assert_eq!(statement.financial_summary.crypto_profit_loss, 60.0);
    assert_eq!(statement.financial_summary.crypto_commissions, 1.25);

    // Then: cash rows keep their own tables
    assert_eq!(statement.deposits.len(), 1);
    assert_eq!(statement.fees.len(), 1);
    assert!(statement.withdrawals.is_empty());

    // Then: one transaction per opened position
    assert_eq!(statement.transactions.len(), 2);
    let btc = &statement.transactions[0];
    assert_eq!(btc.ticker, "BTC");
    assert_eq!(btc.currency.as_deref(), Some("USD"));
    assert_eq!(btc.position_id, 900_001);
    assert_eq!(btc.invested, 800.0);
    assert_eq!(btc.open_date, at("2022-02-01T09:30:00Z"));
    assert_eq!(btc.yahoo_ticker(), "BTC-USD");

    let close = btc.close.as_ref().expect("btc was closed");
    assert_eq!(close.side, TradeSide::Buy);
    assert_eq!(close.name, "Bitcoin");
    assert_eq!(close.profit, Some(60.0));
    assert_eq!(close.stop_loss_rate, Some(0.0));
    assert_eq!(close.close_date, at("2022-03-10T15:00:00Z"));
    assert_eq!(close.realized_equity_change, 60.0);
    assert_eq!(close.isin, None);

    let bbry = &statement.transactions[1];
    assert!(bbry.is_open());
    assert_eq!(bbry.yahoo_ticker(), "BB");
}

#[test]
fn when_closed_positions_outnumber_closing_trades_then_data_is_corrupt() {
    // Given: the closed positions sheet lists a trade the activity never closed
    let mut eth = BTC_CLOSED;
    eth[0] = "900003";
    eth[1] = "Buy Ethereum";
    let file = statement(&[BTC_CLOSED, eth], None);

    // When
    let error = load_account_statement(file.path()).expect_err("mismatch");

    // Then
    assert!(error.to_string().starts_with("invalid or corrupt data"));
    assert!(matches!(
        error,
        ActivityError::CorruptData {
            closed_positions: 2,
            closing_trades: 1,
        }
    ));
}

#[test]
fn when_a_sheet_is_missing_then_it_is_named() {
    let file = statement(&[BTC_CLOSED], Some("Financial Summary"));

    let error = load_account_statement(file.path()).expect_err("missing sheet");

    assert!(matches!(error, ActivityError::MissingSheet("Financial Summary")));
}

// =============================================================================
// Ticker mapping
// =============================================================================

#[test]
fn when_ticker_has_no_yahoo_alias_then_it_is_kept() {
    assert_eq!(to_yahoo_ticker("ETH"), "ETH-USD");
    assert_eq!(to_yahoo_ticker("MSFT"), "MSFT");
    assert_eq!("open position".parse::<ActivityKind>(), Ok(ActivityKind::OpenPosition));
}
