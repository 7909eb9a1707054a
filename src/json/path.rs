use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::SystemError;

static JSON_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$(\.\*|\.[A-Za-z_][A-Za-z0-9_]*(\[(\d+|\*)\])*|\[(\d+|\*)\])*$").unwrap()
});

/// A parsed JSONPath expression, or the concrete position of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Path<'a> {
    Root,
    Keys(Vec<Key<'a>>),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Key<'a> {
    Idx(usize),
    Wildcard,
    WildcardArray,
    Field(&'a str),
}

// FromStr cannot be implemented for Path because the borrowed keys tie the
// result to the input lifetime.
pub(crate) trait JsonPath {
    fn jsonpath(&self) -> Result<Path<'_>, SystemError>;
}

impl JsonPath for str {
    fn jsonpath(&self) -> Result<Path<'_>, SystemError> {
        Path::from_jsonpath(self)
    }
}

impl<'a> fmt::Display for Key<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Key::Idx(idx) => write!(f, "[{}]", idx),
            Key::Field(key) => write!(f, ".{}", key),
            Key::Wildcard => write!(f, ".*"),
            Key::WildcardArray => write!(f, "[*]"),
        }
    }
}

impl<'a> Path<'a> {
    /// True when this expression selects `other` or a node above it, which
    /// makes `other` part of the selected subtree.
    pub(crate) fn prefixes(&self, other: &Path) -> bool {
        match (self, other) {
            (Path::Root, _) => true,
            (Path::Keys(_), Path::Root) => false,
            (Path::Keys(own), Path::Keys(other)) => {
                if own.len() > other.len() {
                    return false;
                }

                own.iter().zip(other.iter()).all(|(own, other)| {
                    if own == other {
                        return true;
                    }

                    matches!(
                        (own, other),
                        (Key::Wildcard, Key::Field(_)) | (Key::WildcardArray, Key::Idx(_))
                    )
                })
            }
        }
    }

    pub(crate) fn from_jsonpath(jsonpath: &'a str) -> Result<Self, SystemError> {
        if !JSON_PATH_RE.is_match(jsonpath) {
            return Err(SystemError::InvalidPathExpression {
                expression: jsonpath.to_string(),
                reason: "not a JSONPath".to_string(),
            });
        }

        if jsonpath == "$" {
            return Ok(Path::Root);
        }

        let mut keys = Vec::new();
        for segment in jsonpath
            .trim_matches('$')
            .split(|c| c == '.' || c == '[')
            .skip(1)
        {
            keys.push(Self::parse_token(segment));
        }

        Ok(Path::Keys(keys))
    }

    fn parse_token(token: &'a str) -> Key<'a> {
        let mut token = token;
        let mut from_array = false;

        if let Some(stripped) = token.strip_suffix(']') {
            from_array = true;
            token = stripped;
        }

        if token == "*" {
            return match from_array {
                true => Key::WildcardArray,
                false => Key::Wildcard,
            };
        }

        match token.parse::<usize>() {
            Ok(idx) => Key::Idx(idx),
            Err(_) => Key::Field(token),
        }
    }
}

impl<'a> fmt::Display for Path<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Path::Root => write!(f, "$"),
            Path::Keys(keys) => {
                write!(f, "$")?;
                for key in keys {
                    write!(f, "{}", key)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_jsonpath() {
        let path: Path = "$.a.b.c".jsonpath().unwrap();
        assert_eq!(
            path,
            Path::Keys(vec![Key::Field("a"), Key::Field("b"), Key::Field("c")])
        );

        let path = "$.a[0].b[1].c".jsonpath().unwrap();
        assert_eq!(
            path,
            Path::Keys(vec![
                Key::Field("a"),
                Key::Idx(0),
                Key::Field("b"),
                Key::Idx(1),
                Key::Field("c"),
            ])
        );

        let path: Path = "$.a.b[*].*.c".jsonpath().unwrap();
        assert_eq!(
            path,
            Path::Keys(vec![
                Key::Field("a"),
                Key::Field("b"),
                Key::WildcardArray,
                Key::Wildcard,
                Key::Field("c"),
            ])
        );

        let path: Path = "$[*].a".jsonpath().unwrap();
        assert_eq!(path, Path::Keys(vec![Key::WildcardArray, Key::Field("a")]));

        assert_eq!("$".jsonpath().unwrap(), Path::Root);
    }

    #[test]
    fn test_parse_rejects_invalid_expressions() {
        assert!(".a.b".jsonpath().is_err());
        assert!("$.a.b[".jsonpath().is_err());
        assert!("$.a.b[]".jsonpath().is_err());
        assert!("id".jsonpath().is_err());
        assert!("".jsonpath().is_err());
    }

    #[test]
    fn test_prefixes() {
        let expr = "$.a.b.c".jsonpath().unwrap();
        assert!(expr.prefixes(&"$.a.b.c".jsonpath().unwrap()));

        let expr = "$.a.b".jsonpath().unwrap();
        assert!(expr.prefixes(&"$.a.b.c".jsonpath().unwrap()));

        let expr = "$.a.b.c".jsonpath().unwrap();
        assert!(!expr.prefixes(&"$.a.b.d".jsonpath().unwrap()));

        let expr = "$.a.*.c".jsonpath().unwrap();
        assert!(expr.prefixes(&"$.a.b.c".jsonpath().unwrap()));

        let expr = "$.a[*].c".jsonpath().unwrap();
        assert!(expr.prefixes(&"$.a[2].c".jsonpath().unwrap()));

        let expr = "$.a.*.c".jsonpath().unwrap();
        assert!(!expr.prefixes(&"$.a[1].c".jsonpath().unwrap()));

        assert!("$".jsonpath().unwrap().prefixes(&"$.a".jsonpath().unwrap()));
    }
}
