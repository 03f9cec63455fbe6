//! Governance detectors.
//!
//! Each detector inspects one block and returns the events it found, in the
//! order they should be dispatched. Detectors never touch shared state; the
//! only state one needs (the previously processed block, for protocol
//! changes) is passed in by the listener.
//!
//! | Detector  | Runs when                              |
//! |-----------|----------------------------------------|
//! | ballot    | `monitor_vote`, exploration/promotion  |
//! | protocol  | `monitor_protocol`, any phase          |
//! | proposal  | `monitor_proposal`, proposal phase     |
//! | summary   | `monitor_proposal`, proposal phase, at every cycle boundary  |
//! | winner    | `monitor_proposal`, proposal phase, at every period boundary |

pub mod ballot;
pub mod proposal;
pub mod protocol;
pub mod summary;

pub use ballot::detect_ballots;
pub use proposal::detect_proposals;
pub use protocol::detect_protocol_change;
pub use summary::{detect_proposal_summary, detect_winning_proposal, top_proposals};
