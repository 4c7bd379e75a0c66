//! SPARQL JSON results model and typed literal coercion.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use sema_vocab::xsd;

/// One bound term in a results row.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BindingTerm {
    /// `uri`, `literal`, `typed-literal`, or `bnode`
    #[serde(rename = "type")]
    pub kind: String,

    /// Lexical value
    pub value: String,

    /// Datatype IRI, literals only
    #[serde(default)]
    pub datatype: Option<String>,

    /// Language tag, literals only
    #[serde(rename = "xml:lang", default)]
    pub lang: Option<String>,
}

impl BindingTerm {
    pub fn is_uri(&self) -> bool {
        self.kind == "uri"
    }
}

/// Decoded `SELECT` results: the projected variables and one map per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparqlResults {
    pub vars: Vec<String>,
    pub bindings: Vec<BTreeMap<String, BindingTerm>>,
}

impl SparqlResults {
    /// Decode the `application/sparql-results+json` wire form.
    pub fn from_json(value: JsonValue) -> serde_json::Result<Self> {
        #[derive(Deserialize)]
        struct Head {
            #[serde(default)]
            vars: Vec<String>,
        }
        #[derive(Deserialize)]
        struct Body {
            #[serde(default)]
            bindings: Vec<BTreeMap<String, BindingTerm>>,
        }
        #[derive(Deserialize)]
        struct Wire {
            head: Head,
            results: Body,
        }

        let wire: Wire = serde_json::from_value(value)?;
        Ok(Self {
            vars: wire.head.vars,
            bindings: wire.results.bindings,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// All bound values of one variable, in row order.
    pub fn column<'a>(&'a self, var: &'a str) -> impl Iterator<Item = &'a BindingTerm> + 'a {
        self.bindings.iter().filter_map(move |row| row.get(var))
    }
}

/// A typed literal built from a results binding.
///
/// Literal coercion is driven by the XSD datatype: integers, decimals, and
/// booleans become native values, date/time types keep their ISO-8601
/// lexical form, and everything else (including IRIs) becomes a string.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    String {
        lexical: String,
        lang: Option<String>,
        datatype: Option<String>,
    },
}

impl Literal {
    /// Coerce a binding term by its RDF datatype.
    ///
    /// Unparseable numeric or boolean lexicals fall back to the string
    /// variant rather than failing the whole document.
    pub fn from_binding(term: &BindingTerm) -> Self {
        if term.kind == "uri" {
            return Literal::String {
                lexical: term.value.clone(),
                lang: None,
                datatype: None,
            };
        }

        match term.datatype.as_deref() {
            Some(xsd::INTEGER) | Some(xsd::LONG) | Some(xsd::INT) | Some(xsd::SHORT) => {
                match term.value.parse::<i64>() {
                    Ok(n) => Literal::Int(n),
                    Err(_) => Self::fallback(term),
                }
            }
            Some(xsd::DECIMAL) | Some(xsd::DOUBLE) | Some(xsd::FLOAT) => {
                match term.value.parse::<f64>() {
                    Ok(f) => Literal::Float(f),
                    Err(_) => Self::fallback(term),
                }
            }
            Some(xsd::BOOLEAN) => match term.value.as_str() {
                "true" | "1" => Literal::Bool(true),
                "false" | "0" => Literal::Bool(false),
                _ => Self::fallback(term),
            },
            // Date and time types keep their ISO-8601 lexical form.
            _ => Self::fallback(term),
        }
    }

    fn fallback(term: &BindingTerm) -> Self {
        Literal::String {
            lexical: term.value.clone(),
            lang: term.lang.clone(),
            datatype: term.datatype.clone(),
        }
    }

    /// Render as a JSON document value.
    pub fn into_json(self) -> JsonValue {
        match self {
            Literal::Int(n) => JsonValue::from(n),
            Literal::Float(f) => serde_json::Number::from_f64(f)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(f.to_string())),
            Literal::Bool(b) => JsonValue::Bool(b),
            Literal::String { lexical, .. } => JsonValue::String(lexical),
        }
    }
}
