use std::fmt::Formatter;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct A1Notation(pub String);

impl std::fmt::Display for A1Notation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<A1Notation> for String {
    fn from(a1_notation: A1Notation) -> Self {
        a1_notation.0
    }
}

impl AsRef<str> for A1Notation {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for A1Notation {
    fn from(s: String) -> Self {
        A1Notation(s)
    }
}

impl From<&str> for A1Notation {
    fn from(s: &str) -> Self {
        A1Notation(s.to_owned())
    }
}

pub trait ToA1Notation {
    fn to_a1_notation(&self, sheet_title: Option<&str>) -> A1Notation;
}

/// Quotes a sheet title for use as an A1 prefix (`'My Tab'!`).
pub fn quote_sheet_title(sheet_title: &str) -> String {
    let unquoted = sheet_title
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .map(|s| s.replace("''", "'"))
        .unwrap_or_else(|| sheet_title.to_owned());
    format!("'{}'", unquoted.replace('\'', "''"))
}

pub struct A1NotationParts {
    pub start: String,
    pub end: Option<String>,
    pub sheet_title: Option<String>,
}

pub fn generic_a1_notation_split(a1_notation: &A1Notation) -> A1NotationParts {
    let (sheet_title, local_a1_notation) = match a1_notation.0.rfind('!') {
        Some(index) => {
            let (sheet_title, local_a1_notation) = a1_notation.0.split_at(index);
            let sheet_title = sheet_title
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .map(|s| s.replace("''", "'"))
                .unwrap_or_else(|| sheet_title.to_owned());
            (
                Some(sheet_title),
                local_a1_notation.trim_start_matches('!').to_owned(),
            )
        }
        None => (None, a1_notation.0.clone()),
    };

    let (start, end) = match local_a1_notation.find(':') {
        Some(index) => {
            let (start, end) = local_a1_notation.split_at(index);
            (start.trim().to_owned(), Some(end[1..].trim().to_owned()))
        }
        None => (local_a1_notation.trim().to_owned(), None),
    };

    A1NotationParts {
        sheet_title,
        start,
        end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_range() {
        let parts = generic_a1_notation_split(&"A:AC".into());
        assert_eq!(parts.sheet_title, None);
        assert_eq!(parts.start, "A");
        assert_eq!(parts.end.as_deref(), Some("AC"));
    }

    #[test]
    fn test_split_single_cell() {
        let parts = generic_a1_notation_split(&"B5".into());
        assert_eq!(parts.start, "B5");
        assert_eq!(parts.end, None);
    }

    #[test]
    fn test_split_quoted_sheet_title() {
        let parts = generic_a1_notation_split(&"'New Joining'!A1:U".into());
        assert_eq!(parts.sheet_title.as_deref(), Some("New Joining"));
        assert_eq!(parts.start, "A1");
        assert_eq!(parts.end.as_deref(), Some("U"));
    }

    #[test]
    fn test_quote_sheet_title() {
        assert_eq!(quote_sheet_title("Raw Data"), "'Raw Data'");
        assert_eq!(quote_sheet_title("'Raw Data'"), "'Raw Data'");
        assert_eq!(quote_sheet_title("Partner's"), "'Partner''s'");
    }
}
