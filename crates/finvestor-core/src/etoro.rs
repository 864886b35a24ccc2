//! eToro account exports: the "Account Activity" CSV and the full account
//! statement workbook (see [`workbook`]).
//!
//! | Column | Field | Notes |
//! |--------|-------|-------|
//! | `Date` | [`ActivityRecord::date`] | `DD/MM/YYYY HH:MM:SS`, UTC |
//! | `Type` | [`ActivityRecord::kind`] | see [`ActivityKind`] |
//! | `Details` | [`ActivityRecord::details`] | `TICKER/CUR` for positions |
//! | `Units`, `Position ID` | optional | `-` or blank when absent |
//! | `NWA` | ignored | |

use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::macros::format_description;
use time::PrimitiveDateTime;

use crate::UtcDateTime;

pub mod workbook;

pub use workbook::{
    load_account_statement, merge_transactions, parse_account_statement,
    parse_account_summary, parse_activity_sheet, parse_closed_positions,
    parse_financial_summary, ClosedPosition, EtoroAccountStatement, EtoroAccountSummary,
    EtoroFinancialSummary, StatementSheets, TradeSide, Transaction, TransactionClose,
};

#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("failed to open account activity: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read account activity: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to read account statement: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("account statement has no '{0}' sheet")]
    MissingSheet(&'static str),

    #[error("sheet '{sheet}' has no '{column}' column")]
    MissingColumn {
        sheet: &'static str,
        column: &'static str,
    },

    #[error("sheet '{sheet}' has no '{field}' entry")]
    MissingField {
        sheet: &'static str,
        field: &'static str,
    },

    #[error("sheet '{sheet}': invalid value '{value}' for '{field}'")]
    InvalidField {
        sheet: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("row {row}: unknown position action '{value}', expected Buy or Sell")]
    UnknownAction { row: usize, value: String },

    #[error("opened position on '{details}' has no position id")]
    MissingPositionId { details: String },

    #[error(
        "invalid or corrupt data: {closed_positions} closed positions but \
         {closing_trades} closing trades in account activity"
    )]
    CorruptData {
        closed_positions: usize,
        closing_trades: usize,
    },

    #[error("row {row}: unknown activity type '{value}'")]
    UnknownKind { row: usize, value: String },

    #[error("row {row}: invalid date '{value}', expected DD/MM/YYYY HH:MM:SS")]
    InvalidDate { row: usize, value: String },

    #[error("row {row}: invalid {column} '{value}'")]
    InvalidNumber {
        row: usize,
        column: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Adjustment,
    RolloverFee,
    Deposit,
    WithdrawFee,
    WithdrawRequest,
    WithdrawFeeCancelled,
    WithdrawRequestCancelled,
    OpenPosition,
    ProfitLossOfTrade,
}

impl ActivityKind {
    pub const ALL: [Self; 9] = [
        Self::Adjustment,
        Self::RolloverFee,
        Self::Deposit,
        Self::WithdrawFee,
        Self::WithdrawRequest,
        Self::WithdrawFeeCancelled,
        Self::WithdrawRequestCancelled,
        Self::OpenPosition,
        Self::ProfitLossOfTrade,
    ];

    /// Label used in the export's `Type` column.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Adjustment => "Adjustment",
            Self::RolloverFee => "Rollover Fee",
            Self::Deposit => "Deposit",
            Self::WithdrawFee => "Withdraw Fee",
            Self::WithdrawRequest => "Withdraw Request",
            Self::WithdrawFeeCancelled => "Withdraw Fee Cancelled",
            Self::WithdrawRequestCancelled => "Withdraw Request Cancelled",
            Self::OpenPosition => "Open Position",
            Self::ProfitLossOfTrade => "Profit/Loss of Trade",
        }
    }

    pub const fn is_fee(self) -> bool {
        matches!(self, Self::Adjustment | Self::RolloverFee)
    }

    pub const fn is_withdrawal(self) -> bool {
        matches!(
            self,
            Self::WithdrawFee
                | Self::WithdrawRequest
                | Self::WithdrawFeeCancelled
                | Self::WithdrawRequestCancelled
        )
    }
}

impl Display for ActivityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ActivityKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| trimmed.to_owned())
    }
}

/// One parsed activity row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRecord {
    pub date: UtcDateTime,
    pub kind: ActivityKind,
    pub details: String,
    pub amount: f64,
    pub units: Option<f64>,
    pub realized_equity_change: f64,
    pub realized_equity: f64,
    pub balance: f64,
    pub position_id: Option<u64>,
}

/// Position row with `Details` split into ticker and currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionEvent {
    pub ticker: String,
    pub currency: Option<String>,
    pub position_id: Option<u64>,
    pub date: UtcDateTime,
    pub amount: f64,
    pub units: Option<f64>,
    pub realized_equity_change: f64,
    pub realized_equity: f64,
    pub balance: f64,
}

impl PositionEvent {
    fn from_record(record: &ActivityRecord) -> Self {
        let (ticker, currency) = split_details(&record.details);
        Self {
            ticker: ticker.to_owned(),
            currency: currency.map(str::to_owned),
            position_id: record.position_id,
            date: record.date,
            amount: record.amount,
            units: record.units,
            realized_equity_change: record.realized_equity_change,
            realized_equity: record.realized_equity,
            balance: record.balance,
        }
    }

    pub fn yahoo_ticker(&self) -> &str {
        to_yahoo_ticker(&self.ticker)
    }
}

/// Activity rows split by what they record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivityTables {
    pub fees: Vec<ActivityRecord>,
    pub deposits: Vec<ActivityRecord>,
    pub withdrawals: Vec<ActivityRecord>,
    pub opened: Vec<PositionEvent>,
    pub closed: Vec<PositionEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccountActivity {
    records: Vec<ActivityRecord>,
}

impl AccountActivity {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ActivityError> {
        parse_account_activity(File::open(path)?)
    }

    pub fn records(&self) -> &[ActivityRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn partition(&self) -> ActivityTables {
        let mut tables = ActivityTables::default();
        for record in &self.records {
            match record.kind {
                kind if kind.is_fee() => tables.fees.push(record.clone()),
                kind if kind.is_withdrawal() => tables.withdrawals.push(record.clone()),
                ActivityKind::Deposit => tables.deposits.push(record.clone()),
                ActivityKind::OpenPosition => {
                    tables.opened.push(PositionEvent::from_record(record))
                }
                ActivityKind::ProfitLossOfTrade => {
                    tables.closed.push(PositionEvent::from_record(record))
                }
                _ => {}
            }
        }
        tables
    }
}

#[derive(Debug, Deserialize)]
struct ActivityRow {
    date: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    details: String,
    amount: f64,
    #[serde(default)]
    units: String,
    realized_equity_change: f64,
    realized_equity: f64,
    balance: f64,
    #[serde(default)]
    position_id: String,
}

/// Parses an "Account Activity" CSV export.
///
/// Headers are matched case-insensitively with spaces read as `_`; unknown
/// columns such as `NWA` are ignored.
pub fn parse_account_activity<R: Read>(reader: R) -> Result<AccountActivity, ActivityError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: csv::StringRecord = reader
        .headers()?
        .iter()
        .map(normalize_header)
        .collect();
    reader.set_headers(headers);

    let mut records = Vec::new();
    for (index, row) in reader.deserialize::<ActivityRow>().enumerate() {
        // Header is line 1.
        let line = index + 2;
        records.push(into_record(row?, line)?);
    }

    tracing::debug!(rows = records.len(), "parsed account activity");
    Ok(AccountActivity { records })
}

/// Yahoo Finance ticker for an eToro ticker.
pub fn to_yahoo_ticker(ticker: &str) -> &str {
    match ticker {
        "BTC" => "BTC-USD",
        "ETH" => "ETH-USD",
        "ADA" => "ADA-USD",
        "BBRY" => "BB",
        other => other,
    }
}

/// `Amount\nin USD` and `Amount in USD` both become `amount_in_usd`.
fn normalize_header(header: &str) -> String {
    header
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

fn split_details(details: &str) -> (&str, Option<&str>) {
    match details.split_once('/') {
        Some((ticker, currency)) => (ticker, Some(currency)),
        None => (details, None),
    }
}

fn into_record(row: ActivityRow, line: usize) -> Result<ActivityRecord, ActivityError> {
    let kind = row
        .kind
        .parse::<ActivityKind>()
        .map_err(|value| ActivityError::UnknownKind { row: line, value })?;

    Ok(ActivityRecord {
        date: parse_activity_date(&row.date, line)?,
        kind,
        details: row.details,
        amount: row.amount,
        units: parse_optional(&row.units, "units", line)?,
        realized_equity_change: row.realized_equity_change,
        realized_equity: row.realized_equity,
        balance: row.balance,
        position_id: parse_optional(&row.position_id, "position_id", line)?,
    })
}

fn parse_activity_date(value: &str, line: usize) -> Result<UtcDateTime, ActivityError> {
    let format = format_description!("[day]/[month]/[year] [hour]:[minute]:[second]");
    PrimitiveDateTime::parse(value, format)
        .map(|parsed| UtcDateTime::from_offset_datetime(parsed.assume_utc()))
        .map_err(|_| ActivityError::InvalidDate {
            row: line,
            value: value.to_owned(),
        })
}

fn parse_optional<T: FromStr>(
    value: &str,
    column: &'static str,
    line: usize,
) -> Result<Option<T>, ActivityError> {
    match value {
        "" | "-" => Ok(None),
        raw => raw
            .parse()
            .map(Some)
            .map_err(|_| ActivityError::InvalidNumber {
                row: line,
                column,
                value: raw.to_owned(),
            }),
    }
}
