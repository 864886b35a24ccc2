use std::io::Write;

use serde::Serialize;
use serde_json::Value;

use crate::commands::{CommandResult, Meta};
use crate::error::CliError;

#[derive(Serialize)]
struct Document<'a> {
    data: &'a Value,
    meta: &'a Meta,
}

pub fn render(result: &CommandResult, pretty: bool) -> Result<(), CliError> {
    let text = to_json(result, pretty)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}")?;
    Ok(())
}

fn to_json(result: &CommandResult, pretty: bool) -> Result<String, CliError> {
    let document = Document {
        data: &result.data,
        meta: &result.meta,
    };
    let text = if pretty {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };
    Ok(text)
}

#[cfg(test)]
mod tests {
    use finvestor_core::{FallbackReason, ProviderId};
    use serde_json::json;

    use super::*;

    #[test]
    fn wraps_data_with_meta() {
        let mut result = CommandResult::ok(json!({ "close": 1.5 }));
        result.meta.source_chain = vec![ProviderId::Alpaca, ProviderId::Yahoo];
        result.meta.fallback = Some(FallbackReason::HistoricalDelay);

        let text = to_json(&result, false).expect("json");

        assert_eq!(
            text,
            concat!(
                r#"{"data":{"close":1.5},"#,
                r#""meta":{"source_chain":["alpaca","yahoo"],"#,
                r#""fallback":"historical_delay","latency_ms":0}}"#,
            )
        );
    }

    #[test]
    fn pretty_output_is_indented() {
        let text = to_json(&CommandResult::ok(json!([])), true).expect("json");
        assert!(text.contains("\n  \"meta\""));
    }
}
