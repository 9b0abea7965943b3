use std::collections::{HashMap, HashSet};
use std::fmt;

use serde_derive::{Deserialize, Serialize};

/// The wire representation of an election, as replicated by the leader in
/// every heartbeat and as sent by clients registering a new election.
///
/// Field names match the original `vote_system` wire format exactly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub election_id: String,
    pub candidates: Vec<String>,
    pub authorized_users: Vec<String>,
    pub votes: HashMap<String, u64>,
    pub seen_users: Vec<String>,
}

/// The outcome of a `register_vote` call, carrying the exact human-readable
/// text the request router echoes back to the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VoteOutcome {
    Accepted { voter: String, candidate: String },
    UnauthorizedVoter(String),
    UnknownCandidate(String),
    DuplicateVote(String),
}

impl VoteOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, VoteOutcome::Accepted { .. })
    }
}

impl fmt::Display for VoteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteOutcome::Accepted { voter, candidate } => write!(
                f,
                "Vote for '{}' by user '{}' has been registered.",
                candidate, voter
            ),
            VoteOutcome::UnauthorizedVoter(voter) => {
                write!(f, "Error: User '{}' is not authorized to vote.", voter)
            }
            VoteOutcome::UnknownCandidate(candidate) => write!(
                f,
                "Error: Candidate '{}' is not a valid candidate.",
                candidate
            ),
            VoteOutcome::DuplicateVote(voter) => {
                write!(f, "Error: User '{}' has already voted.", voter)
            }
        }
    }
}

/// A single in-progress election: a fixed slate of candidates, a fixed roll
/// of authorized voters, and a running tally.
///
/// Invariants maintained at every observable point:
/// - `tally.keys() == candidates` (as a set)
/// - `voters_seen ⊆ authorized_voters`
/// - `sum(tally.values()) == voters_seen.len()`
#[derive(Clone, Debug, PartialEq)]
pub struct Election {
    pub id: String,
    pub candidates: Vec<String>,
    pub authorized_voters: HashSet<String>,
    pub voters_seen: HashSet<String>,
    pub tally: HashMap<String, u64>,
}

impl Election {
    pub fn new(id: String, candidates: Vec<String>, authorized_voters: Vec<String>) -> Self {
        let tally = candidates.iter().cloned().map(|c| (c, 0u64)).collect();
        Election {
            id,
            candidates,
            authorized_voters: authorized_voters.into_iter().collect(),
            voters_seen: HashSet::new(),
            tally,
        }
    }

    /// Registers a single vote, enforcing §4.5's preconditions in order.
    pub fn register_vote(&mut self, voter: &str, candidate: &str) -> VoteOutcome {
        if !self.authorized_voters.contains(voter) {
            return VoteOutcome::UnauthorizedVoter(voter.to_string());
        }
        if !self.candidates.iter().any(|c| c == candidate) {
            return VoteOutcome::UnknownCandidate(candidate.to_string());
        }
        if self.voters_seen.contains(voter) {
            return VoteOutcome::DuplicateVote(voter.to_string());
        }
        *self.tally.entry(candidate.to_string()).or_insert(0) += 1;
        self.voters_seen.insert(voter.to_string());
        VoteOutcome::Accepted {
            voter: voter.to_string(),
            candidate: candidate.to_string(),
        }
    }

    /// Returns the candidate with the highest tally, breaking ties by
    /// declaration order. An election with zero votes still returns the
    /// first declared candidate.
    pub fn winner(&self) -> Option<&str> {
        let mut best: Option<(&str, u64)> = None;
        for candidate in &self.candidates {
            let votes = *self.tally.get(candidate).unwrap_or(&0);
            match best {
                Some((_, best_votes)) if votes <= best_votes => {}
                _ => best = Some((candidate.as_str(), votes)),
            }
        }
        best.map(|(c, _)| c)
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            election_id: self.id.clone(),
            candidates: self.candidates.clone(),
            authorized_users: self.authorized_voters.iter().cloned().collect(),
            votes: self.tally.clone(),
            seen_users: self.voters_seen.iter().cloned().collect(),
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Election {
            id: snapshot.election_id,
            candidates: snapshot.candidates,
            authorized_voters: snapshot.authorized_users.into_iter().collect(),
            voters_seen: snapshot.seen_users.into_iter().collect(),
            tally: snapshot.votes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Election {
        Election::new(
            "E1".into(),
            vec!["A".into(), "B".into()],
            vec!["u1".into(), "u2".into()],
        )
    }

    #[test]
    fn accepts_an_authorized_first_vote() {
        let mut e = sample();
        let outcome = e.register_vote("u1", "A");
        assert!(outcome.is_accepted());
        assert_eq!(e.tally["A"], 1);
        assert!(e.voters_seen.contains("u1"));
    }

    #[test]
    fn refuses_unauthorized_voter() {
        let mut e = sample();
        let outcome = e.register_vote("u3", "A");
        assert_eq!(outcome, VoteOutcome::UnauthorizedVoter("u3".into()));
        assert_eq!(e.tally["A"], 0);
    }

    #[test]
    fn refuses_unknown_candidate() {
        let mut e = sample();
        let outcome = e.register_vote("u1", "Z");
        assert_eq!(outcome, VoteOutcome::UnknownCandidate("Z".into()));
    }

    #[test]
    fn refuses_duplicate_vote_and_is_idempotent_on_retry() {
        let mut e = sample();
        e.register_vote("u1", "A");
        let retry = e.register_vote("u1", "B");
        assert_eq!(retry, VoteOutcome::DuplicateVote("u1".into()));
        assert_eq!(e.tally["A"], 1);
        assert_eq!(e.tally["B"], 0);
        // retrying again yields the exact same refusal, unchanged
        let retry_again = e.register_vote("u1", "A");
        assert_eq!(retry_again, VoteOutcome::DuplicateVote("u1".into()));
    }

    #[test]
    fn tie_is_broken_by_declaration_order() {
        let mut e = Election::new(
            "E2".into(),
            vec!["X".into(), "Y".into()],
            vec!["u1".into(), "u2".into()],
        );
        e.register_vote("u1", "X");
        e.register_vote("u2", "Y");
        assert_eq!(e.winner(), Some("X"));
    }

    #[test]
    fn empty_tally_still_returns_first_candidate() {
        let e = sample();
        assert_eq!(e.winner(), Some("A"));
    }

    #[test]
    fn round_trips_through_snapshot() {
        let mut e = sample();
        e.register_vote("u1", "A");
        let snapshot = e.to_snapshot();
        let restored = Election::from_snapshot(snapshot);
        assert_eq!(restored.tally["A"], 1);
        assert!(restored.voters_seen.contains("u1"));
        assert_eq!(restored.winner(), Some("A"));
    }

    #[test]
    fn invariants_hold_after_a_sequence_of_votes() {
        let mut e = Election::new(
            "E3".into(),
            vec!["A".into(), "B".into(), "C".into()],
            vec!["u1".into(), "u2".into(), "u3".into(), "u4".into()],
        );
        for (voter, candidate) in [("u1", "A"), ("u2", "A"), ("u3", "B"), ("u4", "Z")] {
            e.register_vote(voter, candidate);
        }
        let total: u64 = e.tally.values().sum();
        assert_eq!(total as usize, e.voters_seen.len());
        let candidate_set: HashSet<_> = e.candidates.iter().cloned().collect();
        let tally_keys: HashSet<_> = e.tally.keys().cloned().collect();
        assert_eq!(candidate_set, tally_keys);
        assert!(e.voters_seen.is_subset(&e.authorized_voters));
    }
}
