//! SPARQL term and property-path rendering.

use sema_config::PathStep;

/// Render an IRI reference.
pub fn iri_ref(iri: &str) -> String {
    format!("<{iri}>")
}

/// Escape a literal lexical form for embedding in double quotes.
pub fn escape_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// Render a literal with lexical, language, and datatype preservation.
pub fn quoted_literal(value: &str, lang: Option<&str>, datatype: Option<&str>) -> String {
    let quoted = format!("\"{}\"", escape_literal(value));
    match (lang, datatype) {
        (Some(lang), _) => format!("{quoted}@{lang}"),
        (None, Some(dt)) => format!("{quoted}^^<{dt}>"),
        (None, None) => quoted,
    }
}

/// Render a delta/result term as a SPARQL term.
///
/// IRIs become references; literals preserve their language tag or
/// datatype.
pub fn sparql_term(value: &str, is_uri: bool, lang: Option<&str>, datatype: Option<&str>) -> String {
    if is_uri {
        iri_ref(value)
    } else {
        quoted_literal(value, lang, datatype)
    }
}

/// Render a property path as a SPARQL 1.1 path expression.
///
/// Steps join with `/`; inverse steps render as `^<iri>`.
pub fn path_to_sparql(steps: &[PathStep]) -> String {
    steps
        .iter()
        .map(|step| match step {
            PathStep::Forward(iri) => iri_ref(iri),
            PathStep::Inverse(iri) => format!("^{}", iri_ref(iri)),
        })
        .collect::<Vec<_>>()
        .join("/")
}
