use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context as _;

use crate::foundation::error::{ReelError, ReelResult};

/// `EVENT` value that marks a graph update.
pub const GRAPH_EVENT: &str = "GRAPH";

/// One parsed line of the game log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogRecord {
    /// New graph description (Graphviz source).
    Graph(String),
    /// New caption text.
    Caption(String),
}

#[derive(serde::Deserialize)]
struct RawRecord {
    #[serde(rename = "EVENT")]
    event: Option<String>,
    #[serde(rename = "GRAPH")]
    graph: Option<String>,
    msg: Option<String>,
}

impl LogRecord {
    /// Parse a single JSON log line.
    ///
    /// Records with `EVENT == "GRAPH"` are graph updates and must carry `GRAPH`; every other
    /// record is a caption update and must carry `msg`. Unrelated fields are ignored.
    pub fn parse(line: &str) -> ReelResult<Self> {
        let raw: RawRecord =
            serde_json::from_str(line).map_err(|e| ReelError::log(format!("invalid JSON: {e}")))?;

        if raw.event.as_deref() == Some(GRAPH_EVENT) {
            let graph = raw
                .graph
                .ok_or_else(|| ReelError::log("GRAPH event without a \"GRAPH\" field"))?;
            return Ok(Self::Graph(graph));
        }

        raw.msg
            .map(Self::Caption)
            .ok_or_else(|| ReelError::log("record has neither a GRAPH event nor a \"msg\" field"))
    }
}

/// Iterator over the records of a newline-delimited JSON log.
///
/// Yields `(line_no, record)` with 1-based line numbers. Blank lines are skipped.
pub struct LogReader<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
}

impl LogReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> ReelResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open log '{}'", path.display()))?;
        Ok(Self::new(BufReader::new(f)))
    }
}

impl<R: BufRead> LogReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> Iterator for LogReader<R> {
    type Item = ReelResult<(usize, LogRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    return Some(Err(ReelError::log(format!(
                        "line {}: read failed: {e}",
                        self.line_no
                    ))));
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let line_no = self.line_no;
            return Some(
                LogRecord::parse(&line)
                    .map(|r| (line_no, r))
                    .map_err(|e| match e {
                        ReelError::Log(msg) => ReelError::log(format!("line {line_no}: {msg}")),
                        other => other,
                    }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_zap_graph_record() {
        let line = r#"{"level":"info","ts":1.5,"msg":"Logging Graph","EVENT":"GRAPH","GRAPH":"graph G {a -- b}"}"#;
        assert_eq!(
            LogRecord::parse(line).unwrap(),
            LogRecord::Graph("graph G {a -- b}".to_string())
        );
    }

    #[test]
    fn parses_caption_record() {
        let line = r#"{"level":"info","msg":"Player 1 drew 2 cards"}"#;
        assert_eq!(
            LogRecord::parse(line).unwrap(),
            LogRecord::Caption("Player 1 drew 2 cards".to_string())
        );
    }

    #[test]
    fn other_events_are_captions() {
        let line = r#"{"EVENT":"TURN","msg":"turn 3"}"#;
        assert_eq!(
            LogRecord::parse(line).unwrap(),
            LogRecord::Caption("turn 3".to_string())
        );
    }

    #[test]
    fn missing_fields_are_errors() {
        assert!(LogRecord::parse(r#"{"EVENT":"GRAPH","msg":"x"}"#).is_err());
        assert!(LogRecord::parse(r#"{"level":"info"}"#).is_err());
        assert!(LogRecord::parse(r#"{"msg": 3}"#).is_err());
        assert!(LogRecord::parse("[1, 2]").is_err());
        assert!(LogRecord::parse("{not json").is_err());
    }

    #[test]
    fn reader_skips_blank_lines_and_numbers_from_one() {
        let text = "{\"msg\":\"a\"}\n\n   \n{\"EVENT\":\"GRAPH\",\"GRAPH\":\"g\"}\n";
        let records = LogReader::new(text.as_bytes())
            .collect::<ReelResult<Vec<_>>>()
            .unwrap();
        assert_eq!(
            records,
            vec![
                (1, LogRecord::Caption("a".to_string())),
                (4, LogRecord::Graph("g".to_string())),
            ]
        );
    }

    #[test]
    fn reader_reports_line_of_malformed_record() {
        let text = "{\"msg\":\"a\"}\n{\"msg\":\n";
        let mut reader = LogReader::new(text.as_bytes());
        assert!(reader.next().unwrap().is_ok());
        let err = reader.next().unwrap().unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert!(reader.next().is_none());
    }
}
