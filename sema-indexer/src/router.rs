//! Delta router: maps triple-level changes to update jobs.

use std::collections::BTreeSet;
use std::sync::Arc;

use sema_config::TypeConfig;
use sema_delta::{dedup_triples, DeltaMessage, Term, Triple};
use sema_sparql::{iri_ref, path_to_sparql, sparql_term, AuthScope, Triplestore};
use sema_vocab::rdf;

use crate::error::Result;
use crate::queue::UpdateJob;

/// Routes delta messages to `(subject, type)` update jobs.
///
/// Root-subject resolution runs sudo: deciding which resources a triple
/// touches needs full visibility. Authorization is enforced later, when
/// each document is fetched under its index's groups.
pub struct DeltaRouter {
    config: Arc<TypeConfig>,
    store: Arc<dyn Triplestore>,
}

impl DeltaRouter {
    pub fn new(config: Arc<TypeConfig>, store: Arc<dyn Triplestore>) -> Self {
        Self { config, store }
    }

    /// Compute the update jobs for one delta message.
    ///
    /// Changesets are processed in order, inserts before deletes, each list
    /// deduplicated. Resolution failures for one config never abort the
    /// rest of the message.
    pub async fn route(&self, delta: &DeltaMessage) -> Result<Vec<UpdateJob>> {
        let mut jobs = Vec::new();
        for changeset in &delta.changesets {
            for triple in dedup_triples(&changeset.inserts) {
                self.route_triple(triple, true, &mut jobs).await;
            }
            for triple in dedup_triples(&changeset.deletes) {
                self.route_triple(triple, false, &mut jobs).await;
            }
        }
        Ok(jobs)
    }

    async fn route_triple(&self, triple: &Triple, is_insert: bool, jobs: &mut Vec<UpdateJob>) {
        if !triple.predicate.is_uri() || !triple.subject.is_uri() {
            return;
        }
        let predicate = triple.predicate.value.as_str();

        if predicate == rdf::TYPE {
            if !triple.object.is_uri() {
                return;
            }
            for type_name in self.config.type_names() {
                if !self.config.matches_type(type_name, &triple.object.value) {
                    continue;
                }
                // A type insertion (re)indexes the resource itself; a type
                // removal means it ceases to be of this type, no path
                // resolution needed.
                let job = if is_insert {
                    UpdateJob::update(&triple.subject.value, type_name)
                } else {
                    UpdateJob::delete(&triple.subject.value, type_name)
                };
                jobs.push(job);
            }
            return;
        }

        let matching: Vec<&str> = self
            .config
            .type_names()
            .filter(|type_name| self.config.matches_property(type_name, predicate))
            .collect();
        for type_name in matching {
            let subjects = self.resolve_root_subjects(type_name, triple, is_insert).await;
            for subject in subjects {
                jobs.push(UpdateJob::update(subject, type_name));
            }
        }
    }

    /// Find the root subjects whose documents the triple reaches, for every
    /// occurrence of the predicate in every flattened path of the type.
    async fn resolve_root_subjects(
        &self,
        type_name: &str,
        triple: &Triple,
        is_insert: bool,
    ) -> BTreeSet<String> {
        let predicate = triple.predicate.value.as_str();
        let mut subjects = BTreeSet::new();

        for path in self.config.full_property_paths_for(type_name, predicate) {
            for position in path.positions_of(predicate) {
                let step = &path.steps()[position];
                let at_tail = position + 1 == path.len();

                // A literal object cannot be traversed further, so a
                // forward occurrence before the tail is inconsistent.
                if !at_tail && !step.is_inverse() && triple.object.is_literal() {
                    continue;
                }

                let query = self.root_subject_query(
                    type_name,
                    path.prefix(position),
                    path.suffix(position),
                    step.is_inverse(),
                    triple,
                    is_insert,
                );

                match self.store.select(&query, &AuthScope::Sudo).await {
                    Ok(results) => {
                        subjects.extend(
                            results
                                .column("s")
                                .filter(|term| term.is_uri())
                                .map(|term| term.value.clone()),
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            type_name,
                            predicate,
                            "root subject resolution failed, skipping path"
                        );
                    }
                }
            }
        }
        subjects
    }

    fn root_subject_query(
        &self,
        type_name: &str,
        prefix: &[sema_config::PathStep],
        suffix: &[sema_config::PathStep],
        inverse: bool,
        triple: &Triple,
        is_insert: bool,
    ) -> String {
        // On an inverse step the triple's object sits on the root side.
        let (anchor_subject, anchor_object) = if inverse {
            (&triple.object, &triple.subject)
        } else {
            (&triple.subject, &triple.object)
        };

        let types = self
            .config
            .related_rdf_types(type_name)
            .iter()
            .map(|t| iri_ref(t))
            .collect::<Vec<_>>()
            .join(", ");

        let mut clauses = Vec::new();
        if prefix.is_empty() {
            clauses.push(format!("VALUES ?s {{ {} }}", delta_term(anchor_subject)));
        } else {
            clauses.push(format!(
                "?s {} {}",
                path_to_sparql(prefix),
                delta_term(anchor_subject)
            ));
        }
        clauses.push("?s a ?type".to_string());
        clauses.push(format!("FILTER(?type IN ({types}))"));

        // On deletes the triple is already gone from the store; only the
        // prefix anchor can still be matched.
        if is_insert {
            clauses.push(format!(
                "{} {} {}",
                delta_term(&triple.subject),
                delta_term(&triple.predicate),
                delta_term(&triple.object)
            ));
            if !suffix.is_empty() {
                clauses.push(format!(
                    "{} {} ?foo",
                    delta_term(anchor_object),
                    path_to_sparql(suffix)
                ));
            }
        }

        format!("SELECT DISTINCT ?s WHERE {{ {} }}", clauses.join(" . "))
    }
}

impl std::fmt::Debug for DeltaRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeltaRouter")
            .field("types", &self.config.type_names().count())
            .finish()
    }
}

/// Render a delta term as a SPARQL term with lexical, language, and
/// datatype preservation.
fn delta_term(term: &Term) -> String {
    sparql_term(
        &term.value,
        term.is_uri(),
        term.lang.as_deref(),
        term.datatype.as_deref(),
    )
}
