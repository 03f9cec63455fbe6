//! Chain data model consumed by the detectors.
//!
//! These mirror the JSON served by a Tezos node RPC, trimmed to the fields the
//! governance pipeline reads. Everything here is read-only to the core.

use serde::{Deserialize, Serialize};

// ─── BlockRef ─────────────────────────────────────────────────────────────────

/// An opaque block identifier: a block hash, a level, or an alias like `head`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockRef(pub String);

impl BlockRef {
    /// The chain's current head.
    pub fn head() -> Self {
        Self("head".into())
    }

    /// Reference a block by level.
    pub fn level(level: u64) -> Self {
        Self(level.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for BlockRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for BlockRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for BlockRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── Block ────────────────────────────────────────────────────────────────────

/// A full block as returned by `/chains/<chain>/blocks/<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Block hash (`BL…`).
    pub hash: String,
    #[serde(default)]
    pub chain_id: String,
    /// Protocol hash the block was validated with (`Ps…`).
    pub protocol: String,
    pub header: BlockHeader,
    /// Operation groups by validation pass.
    #[serde(default)]
    pub operations: Vec<Vec<Operation>>,
}

impl Block {
    pub fn level(&self) -> u64 {
        self.header.level
    }

    /// Every ballot operation in the block, in validation-pass order.
    pub fn ballot_ops(&self) -> Vec<&BallotOp> {
        self.contents()
            .filter_map(|c| match c {
                OperationContent::Ballot(op) => Some(op),
                _ => None,
            })
            .collect()
    }

    /// Every proposals operation in the block, in validation-pass order.
    pub fn proposal_ops(&self) -> Vec<&ProposalsOp> {
        self.contents()
            .filter_map(|c| match c {
                OperationContent::Proposals(op) => Some(op),
                _ => None,
            })
            .collect()
    }

    fn contents(&self) -> impl Iterator<Item = &OperationContent> {
        self.operations
            .iter()
            .flatten()
            .flat_map(|op| op.contents.iter())
    }
}

/// The subset of the block header the pipeline needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub level: u64,
    /// Hash of the parent block.
    pub predecessor: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// A signed operation and its contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub contents: Vec<OperationContent>,
}

/// One content entry of an operation, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationContent {
    Ballot(BallotOp),
    Proposals(ProposalsOp),
    /// Transactions, endorsements and everything else the bot ignores.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallotOp {
    /// The delegate casting the ballot.
    pub source: String,
    pub period: u32,
    pub proposal: String,
    pub ballot: Vote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalsOp {
    /// The delegate submitting or upvoting.
    pub source: String,
    pub period: u32,
    pub proposals: Vec<String>,
}

/// A ballot value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Yay,
    Nay,
    Pass,
}

impl std::fmt::Display for Vote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yay => write!(f, "yay"),
            Self::Nay => write!(f, "nay"),
            Self::Pass => write!(f, "pass"),
        }
    }
}

// ─── Voting data ──────────────────────────────────────────────────────────────

/// Aggregate ballot counts for the current voting period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotTally {
    pub yay: i64,
    pub nay: i64,
    pub pass: i64,
}

/// A delegate and its voting weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotListing {
    #[serde(alias = "delegate")]
    pub pkh: String,
    #[serde(alias = "voting_power")]
    pub rolls: i64,
}

/// A proposal and its supporter count. The node serves these as `[hash, count]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, i64)", into = "(String, i64)")]
pub struct ProposalSupport {
    pub proposal_hash: String,
    pub supporter_count: i64,
}

impl From<(String, i64)> for ProposalSupport {
    fn from((proposal_hash, supporter_count): (String, i64)) -> Self {
        Self {
            proposal_hash,
            supporter_count,
        }
    }
}

impl From<ProposalSupport> for (String, i64) {
    fn from(p: ProposalSupport) -> Self {
        (p.proposal_hash, p.supporter_count)
    }
}

// ─── PeriodKind ───────────────────────────────────────────────────────────────

/// The governance phase a block belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PeriodKind {
    /// Delegates inject and upvote proposals.
    Proposal,
    /// First ballot (`testing_vote` before Babylon 2).
    Exploration,
    /// Second ballot (`promotion_vote` before Babylon 2).
    Promotion,
    /// Adoption, cooldown, testing, or a kind this build does not know.
    Other(String),
}

impl PeriodKind {
    /// Returns `true` during the two ballot phases.
    pub fn is_ballot_phase(&self) -> bool {
        matches!(self, Self::Exploration | Self::Promotion)
    }

    pub fn is_exploration(&self) -> bool {
        matches!(self, Self::Exploration)
    }
}

impl From<String> for PeriodKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "proposal" => Self::Proposal,
            "testing_vote" | "exploration" => Self::Exploration,
            "promotion_vote" | "promotion" => Self::Promotion,
            _ => Self::Other(s),
        }
    }
}

impl From<PeriodKind> for String {
    fn from(kind: PeriodKind) -> Self {
        kind.to_string()
    }
}

impl From<&str> for PeriodKind {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl std::fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Proposal => write!(f, "proposal"),
            Self::Exploration => write!(f, "exploration"),
            Self::Promotion => write!(f, "promotion"),
            Self::Other(kind) => write!(f, "{kind}"),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK_JSON: &str = r#"{
        "protocol": "PsBabyM1eUXZseaJdmXFApDSBqj8YBfwELoxZHHW77EMcAbbwAS",
        "chain_id": "NetXdQprcVkpaWU",
        "hash": "BLockHash1",
        "header": {
            "level": 655361,
            "proto": 5,
            "predecessor": "BLockHash0",
            "timestamp": "2019-10-17T00:00:00Z",
            "fitness": ["00", "0000000000"]
        },
        "metadata": {},
        "operations": [
            [],
            [],
            [
                {
                    "hash": "ooBallot",
                    "branch": "BLockHash0",
                    "contents": [
                        {"kind": "ballot", "source": "tz1voter", "period": 20,
                         "proposal": "PtBabylon", "ballot": "yay"}
                    ]
                },
                {
                    "hash": "ooProposals",
                    "contents": [
                        {"kind": "proposals", "source": "tz1baker", "period": 20,
                         "proposals": ["PtA", "PtB"]}
                    ]
                }
            ],
            [
                {
                    "hash": "ooTransfer",
                    "contents": [
                        {"kind": "transaction", "source": "tz1x", "amount": "1"}
                    ]
                }
            ]
        ]
    }"#;

    #[test]
    fn decode_block_with_governance_ops() {
        let block: Block = serde_json::from_str(BLOCK_JSON).unwrap();
        assert_eq!(block.level(), 655361);
        assert_eq!(block.header.predecessor, "BLockHash0");

        let ballots = block.ballot_ops();
        assert_eq!(ballots.len(), 1);
        assert_eq!(ballots[0].source, "tz1voter");
        assert_eq!(ballots[0].ballot, Vote::Yay);

        let proposals = block.proposal_ops();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].proposals, vec!["PtA", "PtB"]);
    }

    #[test]
    fn unknown_operation_kinds_are_ignored() {
        let block: Block = serde_json::from_str(BLOCK_JSON).unwrap();
        assert_eq!(block.operations[3][0].contents, vec![OperationContent::Other]);
    }

    #[test]
    fn proposals_decode_from_pairs() {
        let raw = r#"[["PtA", 12], ["PtB", 3]]"#;
        let props: Vec<ProposalSupport> = serde_json::from_str(raw).unwrap();
        assert_eq!(props[0].proposal_hash, "PtA");
        assert_eq!(props[0].supporter_count, 12);
        assert_eq!(props[1].supporter_count, 3);
    }

    #[test]
    fn listings_accept_newer_field_names() {
        let raw = r#"[{"pkh": "tz1a", "rolls": 10}, {"delegate": "tz1b", "voting_power": 7}]"#;
        let listings: Vec<BallotListing> = serde_json::from_str(raw).unwrap();
        assert_eq!(listings[1].pkh, "tz1b");
        assert_eq!(listings[1].rolls, 7);
    }

    #[test]
    fn period_kind_from_node_strings() {
        assert_eq!(PeriodKind::from("proposal"), PeriodKind::Proposal);
        assert_eq!(PeriodKind::from("testing_vote"), PeriodKind::Exploration);
        assert_eq!(PeriodKind::from("exploration"), PeriodKind::Exploration);
        assert_eq!(PeriodKind::from("promotion_vote"), PeriodKind::Promotion);
        assert_eq!(PeriodKind::from("adoption"), PeriodKind::Other("adoption".into()));
        assert!(!PeriodKind::from("testing").is_ballot_phase());

        let kind: PeriodKind = serde_json::from_str(r#""promotion""#).unwrap();
        assert!(kind.is_ballot_phase());
    }
}
