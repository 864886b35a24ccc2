use std::path::Path;

use finvestor_core::{AccountActivity, EtoroAccountStatement};

use crate::cli::ActivityArgs;
use crate::error::CliError;

use super::CommandResult;

const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

pub fn run(args: &ActivityArgs) -> Result<CommandResult, CliError> {
    let path = args.path.as_path();
    let data = if is_workbook(path) {
        let statement = EtoroAccountStatement::from_path(path)?;
        tracing::info!(
            transactions = statement.transactions.len(),
            path = %path.display(),
            "parsed account statement"
        );
        serde_json::to_value(statement)?
    } else {
        let activity = AccountActivity::from_path(path)?;
        tracing::info!(rows = activity.len(), path = %path.display(), "parsed account activity");
        serde_json::to_value(activity.partition())?
    };
    Ok(CommandResult::ok(data))
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            WORKBOOK_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(extension))
        })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use finvestor_core::ActivityError;

    use super::*;

    #[test]
    fn prints_partitioned_tables() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "Date,Type,Details,Amount,Units,Realized Equity Change,Realized Equity,Balance,\
             Position ID,NWA\n\
             02/01/2021 10:15:00,Deposit,,1000.00,-,1000.00,1000.00,1000.00,-,0.00\n\
             04/01/2021 14:30:12,Open Position,BTC/USD,500.00,0.02,0.00,1000.00,500.00,42,0.00"
        )
        .expect("write csv");

        let result = run(&ActivityArgs {
            path: file.path().to_path_buf(),
        })
        .expect("activity");

        assert_eq!(result.data["deposits"].as_array().map(Vec::len), Some(1));
        assert_eq!(result.data["opened"][0]["ticker"], "BTC");
        assert_eq!(result.data["opened"][0]["position_id"], 42);
        assert!(result.meta.source_chain.is_empty());
    }

    #[test]
    fn spreadsheet_extensions_select_the_statement_parser() {
        assert!(is_workbook(Path::new("statement.XLSX")));
        assert!(is_workbook(Path::new("statement.ods")));
        assert!(!is_workbook(Path::new("activity.csv")));
        assert!(!is_workbook(Path::new("activity")));
    }

    #[test]
    fn missing_workbook_is_reported_as_an_activity_error() {
        let dir = tempfile::tempdir().expect("temp dir");

        let error = run(&ActivityArgs {
            path: dir.path().join("missing.xlsx"),
        })
        .err()
        .expect("missing workbook");

        assert!(matches!(error, CliError::Activity(ActivityError::Workbook(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("temp dir");

        let error = run(&ActivityArgs {
            path: dir.path().join("missing.csv"),
        })
        .err()
        .expect("missing file");

        assert!(matches!(error, CliError::Activity(ActivityError::Io(_))));
        assert_eq!(error.exit_code(), 10);
    }
}
