//! eToro account statement workbooks.
//!
//! A statement export carries four sheets:
//!
//! | Sheet | Parsed into |
//! |-------|-------------|
//! | `Account Summary` | [`EtoroAccountSummary`] |
//! | `Financial Summary` | [`EtoroFinancialSummary`] |
//! | `Closed Positions` | [`ClosedPosition`] rows |
//! | `Account Activity` | [`AccountActivity`], same columns as the CSV export |
//!
//! Opened positions from the activity sheet are joined with their closing
//! trade and closed-position row into [`Transaction`]s.

use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use serde::Serialize;
use time::macros::format_description;

use super::{
    into_record, normalize_header, parse_activity_date, parse_optional, to_yahoo_ticker,
    AccountActivity, ActivityError, ActivityRecord, ActivityRow, ActivityTables, PositionEvent,
};
use crate::UtcDateTime;

pub const ACCOUNT_SUMMARY_SHEET: &str = "Account Summary";
pub const FINANCIAL_SUMMARY_SHEET: &str = "Financial Summary";
pub const CLOSED_POSITIONS_SHEET: &str = "Closed Positions";
pub const ACCOUNT_ACTIVITY_SHEET: &str = "Account Activity";

/// Value written next to section headings in the summary sheet.
const SECTION_MARKER: &str = "Totals";

/// Days between the Excel epoch (1899-12-30) and the Unix epoch.
const EXCEL_UNIX_EPOCH_DAYS: f64 = 25_569.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EtoroAccountSummary {
    pub name: String,
    pub username: String,
    pub currency: String,
    pub created_at: UtcDateTime,
    pub start_date: UtcDateTime,
    pub end_date: UtcDateTime,
    pub initial_realised_equity: f64,
    pub initial_unrealised_equity: f64,
    pub deposits: f64,
    pub refunds: f64,
    pub credits: f64,
    pub adjustments: f64,
    pub withdrawals: f64,
    /// Profit or loss on closed positions only.
    pub realised_profit_loss: f64,
    pub rollover_fees: f64,
    pub withdrawal_fees: f64,
    pub final_realised_equity: f64,
    pub final_unrealised_equity: f64,
}

/// Amounts in USD from the `Financial Summary` sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EtoroFinancialSummary {
    pub cfd_profit_loss: f64,
    pub crypto_profit_loss: f64,
    pub stocks_profit_loss: f64,
    pub etf_profit_loss: f64,
    pub stock_dividends_profit: f64,
    pub cfd_dividends_profit_loss: f64,
    pub refunds: f64,
    pub cfd_commissions: f64,
    pub crypto_commissions: f64,
    pub etf_commissions: f64,
    pub fees: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            _ => None,
        }
    }
}

/// One row of the `Closed Positions` sheet.
///
/// `Action` (`Buy Apple`) is split into [`side`](Self::side) and
/// [`name`](Self::name); `Copied From`, `Type` and `Notes` are dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosedPosition {
    pub position_id: u64,
    pub side: TradeSide,
    pub name: String,
    pub invested: f64,
    pub units: Option<f64>,
    pub open_rate: Option<f64>,
    pub close_rate: Option<f64>,
    pub spread: Option<f64>,
    pub profit: Option<f64>,
    pub open_date: UtcDateTime,
    pub close_date: UtcDateTime,
    pub take_profit_rate: Option<f64>,
    pub stop_loss_rate: Option<f64>,
    pub rollover_fees_and_dividends: Option<f64>,
    #[serde(rename = "ISIN")]
    pub isin: Option<String>,
}

/// Closing side of a [`Transaction`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionClose {
    pub side: TradeSide,
    pub name: String,
    #[serde(rename = "ISIN")]
    pub isin: Option<String>,
    pub units: Option<f64>,
    pub open_rate: Option<f64>,
    pub close_rate: Option<f64>,
    pub spread: Option<f64>,
    pub profit: Option<f64>,
    pub close_date: UtcDateTime,
    pub take_profit_rate: Option<f64>,
    pub stop_loss_rate: Option<f64>,
    pub rollover_fees_and_dividends: Option<f64>,
    pub realized_equity_change: f64,
    pub balance: f64,
}

/// An opened position, with its close when the position was closed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub ticker: String,
    pub currency: Option<String>,
    pub position_id: u64,
    pub open_date: UtcDateTime,
    pub invested: f64,
    pub units: Option<f64>,
    pub realized_equity: f64,
    pub balance: f64,
    pub close: Option<TransactionClose>,
}

impl Transaction {
    pub fn is_open(&self) -> bool {
        self.close.is_none()
    }

    pub fn yahoo_ticker(&self) -> &str {
        to_yahoo_ticker(&self.ticker)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EtoroAccountStatement {
    pub account_summary: EtoroAccountSummary,
    pub financial_summary: EtoroFinancialSummary,
    pub transactions: Vec<Transaction>,
    pub fees: Vec<ActivityRecord>,
    pub deposits: Vec<ActivityRecord>,
    pub withdrawals: Vec<ActivityRecord>,
}

impl EtoroAccountStatement {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ActivityError> {
        load_account_statement(path)
    }
}

/// The four statement sheets, already read from the workbook.
#[derive(Debug, Clone)]
pub struct StatementSheets {
    pub account_summary: Range<Data>,
    pub financial_summary: Range<Data>,
    pub closed_positions: Range<Data>,
    pub account_activity: Range<Data>,
}

/// Reads an account statement workbook (`.xlsx`, `.xls`, `.ods`).
///
/// # Errors
///
/// `Workbook` when the file cannot be opened, `MissingSheet` when one of
/// the four sheets is absent, plus every error of [`parse_account_statement`].
pub fn load_account_statement(
    path: impl AsRef<Path>,
) -> Result<EtoroAccountStatement, ActivityError> {
    let path = path.as_ref();
    let mut workbook = open_workbook_auto(path)?;

    let sheets = StatementSheets {
        account_summary: read_sheet(&mut workbook, ACCOUNT_SUMMARY_SHEET)?,
        financial_summary: read_sheet(&mut workbook, FINANCIAL_SUMMARY_SHEET)?,
        closed_positions: read_sheet(&mut workbook, CLOSED_POSITIONS_SHEET)?,
        account_activity: read_sheet(&mut workbook, ACCOUNT_ACTIVITY_SHEET)?,
    };

    tracing::debug!(path = %path.display(), "read account statement workbook");
    parse_account_statement(&sheets)
}

fn read_sheet<RS: Read + Seek>(
    workbook: &mut Sheets<RS>,
    name: &'static str,
) -> Result<Range<Data>, ActivityError> {
    if !workbook.sheet_names().iter().any(|sheet| sheet == name) {
        return Err(ActivityError::MissingSheet(name));
    }
    Ok(workbook.worksheet_range(name)?)
}

/// Builds the statement from its sheets.
///
/// # Errors
///
/// `CorruptData` when the closed positions sheet and the activity sheet's
/// closing trades disagree in count.
pub fn parse_account_statement(
    sheets: &StatementSheets,
) -> Result<EtoroAccountStatement, ActivityError> {
    let closed_positions = parse_closed_positions(&sheets.closed_positions)?;
    let tables = parse_activity_sheet(&sheets.account_activity)?.partition();
    let transactions = merge_transactions(&closed_positions, &tables)?;

    tracing::debug!(
        transactions = transactions.len(),
        closed = closed_positions.len(),
        "parsed account statement"
    );

    Ok(EtoroAccountStatement {
        account_summary: parse_account_summary(&sheets.account_summary)?,
        financial_summary: parse_financial_summary(&sheets.financial_summary)?,
        transactions,
        fees: tables.fees,
        deposits: tables.deposits,
        withdrawals: tables.withdrawals,
    })
}

// ============================================================================
// Summary sheets
// ============================================================================

/// `Details` → value pairs; section headings (valued `Totals`) are skipped.
pub fn parse_account_summary(range: &Range<Data>) -> Result<EtoroAccountSummary, ActivityError> {
    let sheet = Sheet::new(ACCOUNT_SUMMARY_SHEET, range);
    let details = sheet.column("details")?;

    let mut entries = HashMap::new();
    for row in &sheet.rows {
        let Some(label) = row.text(details) else {
            continue;
        };
        let value = row
            .cells
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != details)
            .find_map(|(_, cell)| cell_text(cell));
        match value {
            Some(value) if value != SECTION_MARKER => {
                entries.entry(label.to_lowercase()).or_insert(value);
            }
            _ => {}
        }
    }

    let fields = Fields {
        sheet: ACCOUNT_SUMMARY_SHEET,
        entries,
    };
    Ok(EtoroAccountSummary {
        name: fields.text("Name")?,
        username: fields.text("Username")?,
        currency: fields.text("Currency")?,
        created_at: fields.date("Date Created")?,
        start_date: fields.date("Start Date")?,
        end_date: fields.date("End Date")?,
        initial_realised_equity: fields.number("Beginning Realized Equity")?,
        initial_unrealised_equity: fields.number("Beginning Unrealized Equity")?,
        deposits: fields.number("Deposits")?,
        refunds: fields.number("Refunds")?,
        credits: fields.number("Credits")?,
        adjustments: fields.number("Adjustments")?,
        withdrawals: fields.number("Withdrawals")?,
        realised_profit_loss: fields.number("Profit or Loss (Closed positions only)")?,
        rollover_fees: fields.number("Rollover Fees")?,
        withdrawal_fees: fields.number("Withdrawal Fees")?,
        final_realised_equity: fields.number("Ending Realized Equity")?,
        final_unrealised_equity: fields.number("Ending Unrealized Equity")?,
    })
}

/// `Name` → `Amount in USD` pairs. `Tax Rate` and incomplete rows are ignored.
pub fn parse_financial_summary(
    range: &Range<Data>,
) -> Result<EtoroFinancialSummary, ActivityError> {
    let sheet = Sheet::new(FINANCIAL_SUMMARY_SHEET, range);
    let name = sheet.column("name")?;
    let amount = sheet.column("amount_in_usd")?;

    let entries = sheet
        .rows
        .iter()
        .filter_map(|row| Some((row.text(name)?.to_lowercase(), row.text(amount)?)))
        .collect();
    let fields = Fields {
        sheet: FINANCIAL_SUMMARY_SHEET,
        entries,
    };

    let stock_dividends_profit = fields.number("Stock Dividends (Profit)")?;
    if stock_dividends_profit < 0.0 {
        return Err(ActivityError::InvalidField {
            sheet: FINANCIAL_SUMMARY_SHEET,
            field: "Stock Dividends (Profit)",
            value: stock_dividends_profit.to_string(),
        });
    }

    Ok(EtoroFinancialSummary {
        cfd_profit_loss: fields.number("CFDs (Profit or Loss)")?,
        crypto_profit_loss: fields.number("Crypto (Profit or Loss)")?,
        stocks_profit_loss: fields.number("Stocks (Profit or Loss)")?,
        etf_profit_loss: fields.number("ETFs (Profit or Loss)")?,
        stock_dividends_profit,
        cfd_dividends_profit_loss: fields.number("CFD Dividends (Profit or Loss)")?,
        refunds: fields.number("Income from Refunds")?,
        cfd_commissions: fields.number("Commissions (spread) on CFDs")?,
        crypto_commissions: fields.number("Commissions (spread) on Crypto")?,
        etf_commissions: fields.number("Commissions (spread) on ETFs")?,
        fees: fields.number("Fees")?,
    })
}

struct Fields {
    sheet: &'static str,
    entries: HashMap<String, String>,
}

impl Fields {
    fn text(&self, field: &'static str) -> Result<String, ActivityError> {
        self.entries
            .get(&field.to_lowercase())
            .cloned()
            .ok_or(ActivityError::MissingField {
                sheet: self.sheet,
                field,
            })
    }

    fn number(&self, field: &'static str) -> Result<f64, ActivityError> {
        let value = self.text(field)?;
        value.parse().map_err(|_| self.invalid(field, value))
    }

    fn date(&self, field: &'static str) -> Result<UtcDateTime, ActivityError> {
        let value = self.text(field)?;
        parse_activity_date(&value, 0).map_err(|_| self.invalid(field, value))
    }

    fn invalid(&self, field: &'static str, value: String) -> ActivityError {
        ActivityError::InvalidField {
            sheet: self.sheet,
            field,
            value,
        }
    }
}

// ============================================================================
// Position sheets
// ============================================================================

pub fn parse_closed_positions(range: &Range<Data>) -> Result<Vec<ClosedPosition>, ActivityError> {
    let sheet = Sheet::new(CLOSED_POSITIONS_SHEET, range);
    let position_id = sheet.column("position_id")?;
    let action = sheet.column("action")?;
    let amount = sheet.column("amount")?;
    let open_date = sheet.column("open_date")?;
    let close_date = sheet.column("close_date")?;
    let optional = |names: &[&str]| names.iter().find_map(|name| sheet.optional_column(name));
    let units = optional(&["units"]);
    let open_rate = optional(&["open_rate"]);
    let close_rate = optional(&["close_rate"]);
    let spread = optional(&["spread"]);
    let profit = optional(&["profit"]);
    let take_profit_rate = optional(&["take_profit_rate"]);
    // The export spells it "Stop Lose Rate".
    let stop_loss_rate = optional(&["stop_lose_rate", "stop_loss_rate"]);
    let rollover = optional(&["rollover_fees_and_dividends"]);
    let isin = optional(&["isin"]);

    let mut positions = Vec::with_capacity(sheet.rows.len());
    for row in &sheet.rows {
        let raw_action = row.text(action).unwrap_or_default();
        let (side, name) = raw_action
            .split_once(' ')
            .map_or((raw_action.as_str(), ""), |(side, name)| (side, name.trim()));
        let side = TradeSide::parse(side).ok_or_else(|| ActivityError::UnknownAction {
            row: row.line,
            value: raw_action.clone(),
        })?;

        positions.push(ClosedPosition {
            position_id: row.required(position_id, "position_id")?,
            side,
            name: name.to_owned(),
            invested: row.required(amount, "amount")?,
            units: row.optional(units, "units")?,
            open_rate: row.optional(open_rate, "open_rate")?,
            close_rate: row.optional(close_rate, "close_rate")?,
            spread: row.optional(spread, "spread")?,
            profit: row.optional(profit, "profit")?,
            open_date: row.date(open_date)?,
            close_date: row.date(close_date)?,
            take_profit_rate: row.optional(take_profit_rate, "take_profit_rate")?,
            stop_loss_rate: row.optional(stop_loss_rate, "stop_loss_rate")?,
            rollover_fees_and_dividends: row.optional(rollover, "rollover_fees_and_dividends")?,
            isin: isin.and_then(|column| row.text(column)).filter(|value| value != "-"),
        });
    }
    Ok(positions)
}

/// The `Account Activity` sheet, read with the CSV export's rules.
pub fn parse_activity_sheet(range: &Range<Data>) -> Result<AccountActivity, ActivityError> {
    let sheet = Sheet::new(ACCOUNT_ACTIVITY_SHEET, range);
    let date = sheet.column("date")?;
    let kind = sheet.column("type")?;
    let amount = sheet.column("amount")?;
    let realized_equity_change = sheet.column("realized_equity_change")?;
    let realized_equity = sheet.column("realized_equity")?;
    let balance = sheet.column("balance")?;
    let details = sheet.optional_column("details");
    let units = sheet.optional_column("units");
    let position_id = sheet.optional_column("position_id");

    let text = |row: &SheetRow<'_>, column: Option<usize>| {
        column.and_then(|column| row.text(column)).unwrap_or_default()
    };

    let mut records = Vec::with_capacity(sheet.rows.len());
    for row in &sheet.rows {
        let parsed = ActivityRow {
            date: text(row, Some(date)),
            kind: text(row, Some(kind)),
            details: text(row, details),
            amount: row.required(amount, "amount")?,
            units: text(row, units),
            realized_equity_change: row.required(realized_equity_change, "realized_equity_change")?,
            realized_equity: row.required(realized_equity, "realized_equity")?,
            balance: row.required(balance, "balance")?,
            position_id: text(row, position_id),
        };
        records.push(into_record(parsed, row.line)?);
    }

    tracing::debug!(rows = records.len(), "parsed account activity sheet");
    Ok(AccountActivity { records })
}

/// Joins opened positions with their closes.
///
/// Closed positions are matched to closing trades on position id, then
/// each opened position picks up the close with the same id and details.
/// Positions without a close stay open.
///
/// # Errors
///
/// `CorruptData` when the two closed-position sources differ in length,
/// `MissingPositionId` when an opened position has no id.
pub fn merge_transactions(
    closed_positions: &[ClosedPosition],
    tables: &ActivityTables,
) -> Result<Vec<Transaction>, ActivityError> {
    if closed_positions.len() != tables.closed.len() {
        return Err(ActivityError::CorruptData {
            closed_positions: closed_positions.len(),
            closing_trades: tables.closed.len(),
        });
    }

    let by_id: HashMap<u64, &ClosedPosition> = closed_positions
        .iter()
        .map(|position| (position.position_id, position))
        .collect();

    let mut closes = HashMap::new();
    for trade in &tables.closed {
        let Some(position) = trade.position_id.and_then(|id| by_id.get(&id)) else {
            continue;
        };
        closes.insert(
            (position.position_id, trade.ticker.as_str(), trade.currency.as_deref()),
            close_of(position, trade),
        );
    }

    tables
        .opened
        .iter()
        .map(|opened| {
            let position_id = opened.position_id.ok_or_else(|| ActivityError::MissingPositionId {
                details: details_of(opened),
            })?;
            let key = (position_id, opened.ticker.as_str(), opened.currency.as_deref());
            Ok(Transaction {
                ticker: opened.ticker.clone(),
                currency: opened.currency.clone(),
                position_id,
                open_date: opened.date,
                invested: opened.amount,
                units: opened.units,
                realized_equity: opened.realized_equity,
                balance: opened.balance,
                close: closes.get(&key).cloned(),
            })
        })
        .collect()
}

fn close_of(position: &ClosedPosition, trade: &PositionEvent) -> TransactionClose {
    TransactionClose {
        side: position.side,
        name: position.name.clone(),
        isin: position.isin.clone(),
        units: position.units.or(trade.units),
        open_rate: position.open_rate,
        close_rate: position.close_rate,
        spread: position.spread,
        profit: position.profit,
        close_date: position.close_date,
        take_profit_rate: position.take_profit_rate,
        stop_loss_rate: position.stop_loss_rate,
        rollover_fees_and_dividends: position.rollover_fees_and_dividends,
        realized_equity_change: trade.realized_equity_change,
        balance: trade.balance,
    }
}

fn details_of(event: &PositionEvent) -> String {
    match &event.currency {
        Some(currency) => format!("{}/{currency}", event.ticker),
        None => event.ticker.clone(),
    }
}

// ============================================================================
// Cell access
// ============================================================================

/// A sheet whose first row holds the headers. Blank rows are dropped.
struct Sheet<'a> {
    name: &'static str,
    columns: HashMap<String, usize>,
    rows: Vec<SheetRow<'a>>,
}

struct SheetRow<'a> {
    /// 1-based row number in the spreadsheet.
    line: usize,
    cells: &'a [Data],
}

impl<'a> Sheet<'a> {
    fn new(name: &'static str, range: &'a Range<Data>) -> Self {
        let header_line = range.start().map_or(1, |(row, _)| row as usize + 1);
        let mut rows = range.rows();

        let columns = rows
            .next()
            .map(|header| {
                header
                    .iter()
                    .enumerate()
                    .filter_map(|(index, cell)| Some((normalize_header(&cell_text(cell)?), index)))
                    .collect()
            })
            .unwrap_or_default();

        let rows = rows
            .enumerate()
            .map(|(index, cells)| SheetRow {
                line: header_line + 1 + index,
                cells,
            })
            .filter(|row| row.cells.iter().any(|cell| cell_text(cell).is_some()))
            .collect();

        Self {
            name,
            columns,
            rows,
        }
    }

    fn column(&self, column: &'static str) -> Result<usize, ActivityError> {
        self.optional_column(column)
            .ok_or(ActivityError::MissingColumn {
                sheet: self.name,
                column,
            })
    }

    fn optional_column(&self, column: &str) -> Option<usize> {
        self.columns.get(column).copied()
    }
}

impl SheetRow<'_> {
    fn text(&self, column: usize) -> Option<String> {
        self.cells.get(column).and_then(cell_text)
    }

    fn optional<T: std::str::FromStr>(
        &self,
        column: Option<usize>,
        name: &'static str,
    ) -> Result<Option<T>, ActivityError> {
        let value = column.and_then(|column| self.text(column)).unwrap_or_default();
        parse_optional(&value, name, self.line)
    }

    fn required<T: std::str::FromStr>(
        &self,
        column: usize,
        name: &'static str,
    ) -> Result<T, ActivityError> {
        self.optional(Some(column), name)?
            .ok_or_else(|| ActivityError::InvalidNumber {
                row: self.line,
                column: name,
                value: String::new(),
            })
    }

    fn date(&self, column: usize) -> Result<UtcDateTime, ActivityError> {
        parse_activity_date(&self.text(column).unwrap_or_default(), self.line)
    }
}

/// Cell contents as the text the CSV export would carry; `None` when blank.
fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::String(text) | Data::DateTimeIso(text) | Data::DurationIso(text) => {
            text.trim().to_owned()
        }
        Data::Float(value) => render_number(*value),
        Data::Int(value) => value.to_string(),
        Data::Bool(value) => value.to_string(),
        Data::DateTime(value) => render_excel_datetime(value.as_f64())?,
        _ => return None,
    };
    Some(text).filter(|text| !text.is_empty())
}

/// Whole floats print without a fraction so position ids parse as integers.
fn render_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn render_excel_datetime(serial: f64) -> Option<String> {
    let seconds = ((serial - EXCEL_UNIX_EPOCH_DAYS) * 86_400.0).round() as i64;
    let instant = UtcDateTime::from_unix_timestamp(seconds).ok()?;
    let format = format_description!("[day]/[month]/[year] [hour]:[minute]:[second]");
    instant.into_inner().format(format).ok()
}
