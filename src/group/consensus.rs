//! Majority-vote consensus over a group's members.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::compare::Address;
use crate::record::Record;
use crate::term::{normalize_key, SourceId};

/// Best-guess combined view of a multi-member group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsensusRecord {
    /// Most common display name.
    pub name: Option<String>,
    /// Most common email.
    pub email: Option<String>,
    /// Most common primary address.
    pub primary_address: Option<Address>,
    /// Every distinct source among the members, in first-seen order.
    pub sources: Vec<SourceId>,
}

/// Tallies votes keyed by a normalized form, remembering the first original value.
struct Ballot<T> {
    tallies: HashMap<String, (usize, usize, T)>,
    seen: usize,
}

impl<T> Ballot<T> {
    fn new() -> Self {
        Self {
            tallies: HashMap::new(),
            seen: 0,
        }
    }

    fn cast(&mut self, key: String, value: T) {
        if key.is_empty() {
            return;
        }
        let order = self.seen;
        self.seen += 1;
        self.tallies.entry(key).or_insert((0, order, value)).0 += 1;
    }

    /// Most frequent value; ties go to the value cast first.
    fn winner(self) -> Option<T> {
        self.tallies
            .into_values()
            .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
            .map(|(_, _, value)| value)
    }
}

fn address_key(address: &Address) -> String {
    let parts = [
        &address.street_number,
        &address.street_name,
        &address.unit_type,
        &address.unit_number,
        &address.city,
        &address.state,
        &address.fire_number,
    ];
    let mut text: Vec<&str> = parts.iter().filter_map(|p| p.as_deref()).collect();
    let postal = address.postal5();
    if let Some(code) = postal.as_deref() {
        text.push(code);
    }
    normalize_key(&text.join(" "))
}

/// Builds the consensus of `members`, given in founder-first order.
#[must_use]
pub fn consensus<'a>(members: impl IntoIterator<Item = &'a Record>) -> ConsensusRecord {
    let mut names = Ballot::new();
    let mut emails = Ballot::new();
    let mut addresses = Ballot::new();
    let mut sources: Vec<SourceId> = Vec::new();

    for record in members {
        let name = record.display_name();
        names.cast(normalize_key(&name), name);

        let contact = record.contact();
        if let Some(email) = contact.normalized_email() {
            emails.cast(email.clone(), email);
        }
        if let Some(address) = contact.primary.as_ref().filter(|a| !a.is_empty()) {
            addresses.cast(address_key(address), address.clone());
        }
        if !sources.contains(record.source()) {
            sources.push(record.source().clone());
        }
    }

    ConsensusRecord {
        name: names.winner(),
        email: emails.winner(),
        primary_address: addresses.winner(),
        sources,
    }
}
