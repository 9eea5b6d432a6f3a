//! Transport line parsing.
//!
//! The scanner firmware reports colon-separated integers, one reading per
//! line:
//!
//! | Line | Meaning |
//! |---|---|
//! | `index:raw` | calibration point (while calibrating) |
//! | `angle:raw` | single-sensor measurement |
//! | `angle:tof:light` | combined ranging + light measurement |
//!
//! Parsing only checks shape; whether a line makes sense in the current
//! session state is decided by [`ScanSession`][crate::session::ScanSession].

use std::str::FromStr;

use sweep_types::SweepError;

/// One well-formed transport line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanLine {
    Pair(i64, i64),
    Triple(i64, i64, i64),
}

/// Parse a transport line.
///
/// ```rust
/// use sweep_runtime::parse::{parse_line, ScanLine};
///
/// assert_eq!(parse_line(" 90:2320 "), Ok(ScanLine::Pair(90, 2320)));
/// assert_eq!(parse_line("90:2320:417"), Ok(ScanLine::Triple(90, 2320, 417)));
/// assert!(parse_line("90:abc").is_err());
/// ```
pub fn parse_line(line: &str) -> Result<ScanLine, SweepError> {
    let mut fields = [0i64; 3];
    let mut count = 0;
    for field in line.trim().split(':') {
        if count == fields.len() {
            return Err(SweepError::Parse(format!("too many fields in '{}'", line.trim())));
        }
        fields[count] = field
            .trim()
            .parse()
            .map_err(|_| SweepError::Parse(format!("non-integer field '{}'", field.trim())))?;
        count += 1;
    }
    match count {
        2 => Ok(ScanLine::Pair(fields[0], fields[1])),
        3 => Ok(ScanLine::Triple(fields[0], fields[1], fields[2])),
        _ => Err(SweepError::Parse(format!("expected 2 or 3 fields in '{}'", line.trim()))),
    }
}

impl FromStr for ScanLine {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_line(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs_and_triples() {
        assert_eq!(parse_line("3:250"), Ok(ScanLine::Pair(3, 250)));
        assert_eq!(parse_line("0:-5"), Ok(ScanLine::Pair(0, -5)));
        assert_eq!(parse_line("179:1:2"), Ok(ScanLine::Triple(179, 1, 2)));
    }

    #[test]
    fn trims_line_and_fields() {
        assert_eq!(parse_line("\t 12 : 34 \r"), Ok(ScanLine::Pair(12, 34)));
        assert_eq!("7: 8 :9".parse::<ScanLine>(), Ok(ScanLine::Triple(7, 8, 9)));
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(matches!(parse_line("42"), Err(SweepError::Parse(_))));
        assert!(matches!(parse_line("1:2:3:4"), Err(SweepError::Parse(_))));
        assert!(matches!(parse_line(""), Err(SweepError::Parse(_))));
    }

    #[test]
    fn rejects_non_integer_fields() {
        assert!(matches!(parse_line("1.5:20"), Err(SweepError::Parse(_))));
        assert!(matches!(parse_line("10:"), Err(SweepError::Parse(_))));
        assert!(matches!(parse_line("Calibrating..."), Err(SweepError::Parse(_))));
    }
}
