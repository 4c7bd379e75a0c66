//! Shared test support: a scripted triplestore and results helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use sema_sparql::{AuthScope, BindingTerm, SparqlError, SparqlResults, Triplestore};

/// One recorded gateway call.
#[derive(Debug, Clone)]
pub struct RecordedQuery {
    pub query: String,
    pub sudo: bool,
}

#[derive(Debug, Clone)]
enum Response {
    Select(SparqlResults),
    Ask(bool),
    Fail,
}

#[derive(Debug, Clone)]
struct Rule {
    substrings: Vec<String>,
    response: Response,
}

/// Triplestore whose answers are scripted per query substring.
///
/// Rules are checked in insertion order; the first rule whose substrings
/// all occur in the query wins. Unmatched SELECTs return empty results,
/// unmatched ASKs return false, and updates always succeed. Every call is
/// recorded for assertions.
#[derive(Debug, Default)]
pub struct ScriptedStore {
    rules: Mutex<Vec<Rule>>,
    selects: Mutex<Vec<RecordedQuery>>,
    asks: Mutex<Vec<RecordedQuery>>,
    updates: Mutex<Vec<RecordedQuery>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_select(&self, substrings: &[&str], results: SparqlResults) {
        self.rules.lock().unwrap().push(Rule {
            substrings: substrings.iter().map(|s| s.to_string()).collect(),
            response: Response::Select(results),
        });
    }

    pub fn on_ask(&self, substrings: &[&str], answer: bool) {
        self.rules.lock().unwrap().push(Rule {
            substrings: substrings.iter().map(|s| s.to_string()).collect(),
            response: Response::Ask(answer),
        });
    }

    /// Make matching SELECT/ASK calls fail with a query error.
    pub fn on_fail(&self, substrings: &[&str]) {
        self.rules.lock().unwrap().push(Rule {
            substrings: substrings.iter().map(|s| s.to_string()).collect(),
            response: Response::Fail,
        });
    }

    /// Drop all scripted rules (recorded calls are kept).
    pub fn reset_rules(&self) {
        self.rules.lock().unwrap().clear();
    }

    pub fn recorded_selects(&self) -> Vec<RecordedQuery> {
        self.selects.lock().unwrap().clone()
    }

    pub fn recorded_updates(&self) -> Vec<RecordedQuery> {
        self.updates.lock().unwrap().clone()
    }

    /// First rule matching the query among rules of the right kind, so an
    /// ASK rule never shadows a SELECT rule for overlapping query text.
    fn matching(&self, query: &str, kind_ok: impl Fn(&Response) -> bool) -> Option<Response> {
        self.rules
            .lock()
            .unwrap()
            .iter()
            .find(|rule| {
                kind_ok(&rule.response)
                    && rule.substrings.iter().all(|s| query.contains(s.as_str()))
            })
            .map(|rule| rule.response.clone())
    }

    fn record(target: &Mutex<Vec<RecordedQuery>>, query: &str, scope: &AuthScope) {
        target.lock().unwrap().push(RecordedQuery {
            query: query.to_string(),
            sudo: matches!(scope, AuthScope::Sudo),
        });
    }

    fn fail(query: &str) -> SparqlError {
        SparqlError::Query {
            status: 500,
            body: format!("scripted failure for: {query}"),
        }
    }
}

#[async_trait]
impl Triplestore for ScriptedStore {
    async fn select(
        &self,
        query: &str,
        scope: &AuthScope,
    ) -> sema_sparql::Result<SparqlResults> {
        Self::record(&self.selects, query, scope);
        match self.matching(query, |r| matches!(r, Response::Select(_) | Response::Fail)) {
            Some(Response::Select(results)) => Ok(results),
            Some(Response::Fail) => Err(Self::fail(query)),
            _ => Ok(SparqlResults::default()),
        }
    }

    async fn ask(&self, query: &str, scope: &AuthScope) -> sema_sparql::Result<bool> {
        Self::record(&self.asks, query, scope);
        match self.matching(query, |r| matches!(r, Response::Ask(_) | Response::Fail)) {
            Some(Response::Ask(answer)) => Ok(answer),
            Some(Response::Fail) => Err(Self::fail(query)),
            _ => Ok(false),
        }
    }

    async fn update(&self, query: &str, scope: &AuthScope) -> sema_sparql::Result<()> {
        Self::record(&self.updates, query, scope);
        match self.matching(query, |r| matches!(r, Response::Fail)) {
            Some(Response::Fail) => Err(Self::fail(query)),
            _ => Ok(()),
        }
    }
}

// --- results construction helpers --------------------------------------

pub fn term_uri(value: &str) -> BindingTerm {
    BindingTerm {
        kind: "uri".to_string(),
        value: value.to_string(),
        datatype: None,
        lang: None,
    }
}

pub fn term_literal(value: &str) -> BindingTerm {
    BindingTerm {
        kind: "literal".to_string(),
        value: value.to_string(),
        datatype: None,
        lang: None,
    }
}

pub fn term_typed(value: &str, datatype: &str) -> BindingTerm {
    BindingTerm {
        kind: "literal".to_string(),
        value: value.to_string(),
        datatype: Some(datatype.to_string()),
        lang: None,
    }
}

pub fn term_lang(value: &str, lang: &str) -> BindingTerm {
    BindingTerm {
        kind: "literal".to_string(),
        value: value.to_string(),
        datatype: None,
        lang: Some(lang.to_string()),
    }
}

/// Build results from `(var, term)` rows.
pub fn results(rows: Vec<Vec<(&str, BindingTerm)>>) -> SparqlResults {
    let mut vars: Vec<String> = Vec::new();
    let bindings = rows
        .into_iter()
        .map(|row| {
            let mut map = BTreeMap::new();
            for (var, term) in row {
                if !vars.iter().any(|v| v == var) {
                    vars.push(var.to_string());
                }
                map.insert(var.to_string(), term);
            }
            map
        })
        .collect();
    SparqlResults { vars, bindings }
}

/// Single-variable results of IRIs.
pub fn uri_results(var: &str, uris: &[&str]) -> SparqlResults {
    results(uris.iter().map(|u| vec![(var, term_uri(u))]).collect())
}
