//! # vouch-oracle — Verification Oracle Client
//!
//! Gets a proof verified by the external oracle and its signed attestation
//! recorded on the ledger.
//!
//! - [`oracle`]: the HTTP contract as a trait plus wire types, and
//!   normalization of byte-array or base58 attestations.
//! - [`http`]: `reqwest` implementation of the contract.
//! - [`local`]: in-process signing oracle for tests and the simulator.
//! - [`retry`]: bounded exponential backoff with jitter, cancellable.
//! - [`submit`]: the health, verify, build, sign and confirm sequence.
//!
//! ## Failure taxonomy
//!
//! | Error                  | Retryable                                  |
//! |------------------------|--------------------------------------------|
//! | `OracleUnavailable`    | yes                                        |
//! | `VerificationRejected` | no                                         |
//! | `NullifierAlreadyUsed` | no                                         |
//! | `TransactionFailed`    | stale blockhash only, after a rebuild      |
//! | `SignatureDecodeError` | no                                         |

pub mod config;
pub mod error;
pub mod http;
pub mod local;
pub mod oracle;
pub mod retry;
pub mod submit;

pub use config::{OracleConfig, DEFAULT_ORACLE_URL, DEFAULT_TIMEOUT_SECS};
pub use error::OracleError;
pub use http::HttpOracle;
pub use local::LocalOracle;
pub use oracle::{
    normalize_attestation, ByteBlob, CircuitsLoaded, HealthStatus, SignedAttestation,
    VerificationOracle, VerifyRequest, VerifyResponse, WireAttestation,
};
pub use retry::{retry, RetryPolicy};
pub use submit::{AttestationSubmitter, RecordedAttestation, Submission, SubmitRequest};
