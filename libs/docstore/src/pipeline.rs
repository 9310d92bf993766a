//! Aggregation pipeline stages and their in-memory execution.

use std::collections::HashMap;

use query_core::{Filter, Order};
use serde_json::Value as Json;

use crate::eval::{matches_filter, sort_documents};
use crate::Document;

#[derive(Clone, Debug)]
pub enum Stage {
    Match(Filter),
    Sort(Order),
    Skip(u64),
    Limit(u64),
    Group(Group),
    /// `(output name, source field)` pairs; only the listed fields survive.
    Project(Vec<(String, String)>),
}

#[derive(Clone, Debug)]
pub enum Accumulator {
    /// Number of documents in the group.
    Count,
    /// Value of the field in the first document of the group (input order).
    First(String),
    /// Integer sum of the field; non-numeric values are ignored.
    Sum(String),
}

/// Groups documents by the values of `by`. Each output document carries the
/// `by` fields plus one field per accumulator. Groups are emitted in the order
/// their first member was seen.
#[derive(Clone, Debug, Default)]
pub struct Group {
    pub by: Vec<String>,
    pub fields: Vec<(String, Accumulator)>,
}

impl Group {
    pub fn by<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            by: fields.into_iter().map(Into::into).collect(),
            fields: Vec::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, acc: Accumulator) -> Self {
        self.fields.push((name.into(), acc));
        self
    }
}

impl Stage {
    pub fn project<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        Stage::Project(
            pairs
                .into_iter()
                .map(|(a, b)| (a.into(), b.into()))
                .collect(),
        )
    }
}

pub fn run(mut docs: Vec<Document>, stages: &[Stage]) -> Vec<Document> {
    for stage in stages {
        docs = match stage {
            Stage::Match(filter) => docs
                .into_iter()
                .filter(|d| matches_filter(filter, d))
                .collect(),
            Stage::Sort(order) => {
                sort_documents(&mut docs, order);
                docs
            }
            Stage::Skip(n) => docs.into_iter().skip(to_usize(*n)).collect(),
            Stage::Limit(n) => docs.into_iter().take(to_usize(*n)).collect(),
            Stage::Group(group) => run_group(docs, group),
            Stage::Project(pairs) => docs.into_iter().map(|d| project(&d, pairs)).collect(),
        };
    }
    docs
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

fn project(doc: &Document, pairs: &[(String, String)]) -> Document {
    let mut out = Document::new();
    for (name, source) in pairs {
        if let Some(v) = doc.get(source) {
            out.insert(name.clone(), v.clone());
        }
    }
    out
}

struct GroupState {
    key: Vec<Json>,
    count: i64,
    values: Vec<Option<Json>>,
}

fn run_group(docs: Vec<Document>, group: &Group) -> Vec<Document> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut states: Vec<GroupState> = Vec::new();

    for doc in &docs {
        let key: Vec<Json> = group
            .by
            .iter()
            .map(|f| doc.get(f).cloned().unwrap_or(Json::Null))
            .collect();
        let key_str = Json::Array(key.clone()).to_string();

        let slot = *index.entry(key_str).or_insert_with(|| {
            states.push(GroupState {
                key,
                count: 0,
                values: vec![None; group.fields.len()],
            });
            states.len() - 1
        });
        let state = &mut states[slot];
        state.count += 1;

        for (i, (_, acc)) in group.fields.iter().enumerate() {
            match acc {
                Accumulator::Count => {}
                Accumulator::First(field) => {
                    if state.count == 1 {
                        state.values[i] = Some(doc.get(field).cloned().unwrap_or(Json::Null));
                    }
                }
                Accumulator::Sum(field) => {
                    let add = doc.get(field).and_then(Json::as_i64).unwrap_or(0);
                    let prev = state.values[i].as_ref().and_then(Json::as_i64).unwrap_or(0);
                    state.values[i] = Some(Json::from(prev + add));
                }
            }
        }
    }

    states
        .into_iter()
        .map(|state| {
            let mut out = Document::new();
            for (field, value) in group.by.iter().zip(state.key) {
                out.insert(field.clone(), value);
            }
            for ((name, acc), value) in group.fields.iter().zip(state.values) {
                let v = match acc {
                    Accumulator::Count => Json::from(state.count),
                    _ => value.unwrap_or(Json::from(0)),
                };
                out.insert(name.clone(), v);
            }
            out
        })
        .collect()
}
