//! # In-Memory Ledger
//!
//! A reference model of the Vouch ledger program and the runtime around
//! it, used by integration tests and the CLI simulator.
//!
//! ## Execution model
//!
//! - Signatures of every required signer are checked first, then the
//!   blockhash, then the fee.
//! - Instructions run in order against a scratch copy of the state. The
//!   copy replaces the live state only if every instruction succeeds.
//! - The fee is charged whenever the transaction reaches execution, even
//!   if an instruction fails.
//!
//! ## Security Invariant
//!
//! `record_attestation` only succeeds when the instruction immediately
//! before it is a native Ed25519 verify instruction that
//!
//! - was signed by the verifier whose record is passed in,
//! - carries the same signature as the record instruction, and
//! - signs a v2 message with the same nullifier, proof type and
//!   attestation hash.
//!
//! Creating a record that already exists is a hard error regardless of
//! any client-side existence check.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use vouch_attestation::{
    config_address, decode_ed25519_verify, decode_message_v2, nullifier_record_address,
    rate_limit_address, verifier_address, AccountMeta, Address, AddressError, Instruction,
    VouchInstruction,
};
use vouch_core::{AttestationHash, Clock, Nullifier, ProofType};
use vouch_crypto::{sha256_concat, verify_with_public_key, Ed25519PublicKey, Ed25519Signature};

use crate::client::LedgerClient;
use crate::error::{LedgerError, ProgramError, TransactionFailure};
use crate::params::{LedgerParams, SECONDS_PER_DAY};
use crate::transaction::{Blockhash, CommitmentLevel, SignedTransaction, Transaction, TxSignature};

// ─── Records ─────────────────────────────────────────────────────────

/// Global program configuration, at `PDA("config")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigRecord {
    /// Admin authority.
    pub admin: Address,
    /// Whether submissions and verifier changes are halted.
    pub is_paused: bool,
    /// Accepted submissions per recipient per day.
    pub max_proofs_per_day: u32,
    /// Minimum seconds between submissions per recipient.
    pub cooldown_seconds: i64,
    /// Active verifiers.
    pub verifier_count: u32,
    /// Attestations recorded since genesis.
    pub total_proofs_verified: u64,
}

/// Authorized verifier, at `PDA("verifier", pubkey)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifierRecord {
    /// Verifier signing key.
    pub verifier: Ed25519PublicKey,
    /// Deactivated verifiers keep their record.
    pub is_active: bool,
    /// Unix seconds when added.
    pub added_at: i64,
    /// Attestations recorded under this verifier.
    pub attestation_count: u64,
}

/// Replay guard, at `PDA("nullifier", nullifier)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NullifierRecord {
    /// Nullifier.
    pub nullifier: Nullifier,
    /// Set by `record_attestation`; never cleared.
    pub is_used: bool,
    /// Unix seconds when used, 0 until then.
    pub used_at: i64,
    /// Credential type recorded, `None` until used.
    pub proof_type: Option<ProofType>,
}

/// Per-recipient throttle, at `PDA("rate_limit", recipient)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitRecord {
    /// Recipient wallet.
    pub wallet: Address,
    /// Accepted submissions in the current window.
    pub proofs_today: u32,
    /// Unix seconds when the current window opened.
    pub day_start: i64,
    /// Unix seconds of the last accepted submission, 0 if none.
    pub last_proof_at: i64,
    /// Accepted submissions overall.
    pub total_proofs: u64,
}

#[derive(Debug, Clone)]
struct State {
    config: ConfigRecord,
    verifiers: HashMap<Address, VerifierRecord>,
    nullifiers: HashMap<Address, NullifierRecord>,
    rate_limits: HashMap<Address, RateLimitRecord>,
    balances: HashMap<Address, u64>,
}

impl State {
    fn has_record(&self, address: &Address) -> bool {
        self.verifiers.contains_key(address)
            || self.nullifiers.contains_key(address)
            || self.rate_limits.contains_key(address)
    }

    fn debit(&mut self, payer: &Address, amount: u64) -> Result<(), TransactionFailure> {
        let available = self.balances.get(payer).copied().unwrap_or(0);
        if available < amount {
            return Err(TransactionFailure::InsufficientFunds {
                needed: amount,
                available,
            });
        }
        self.balances.insert(*payer, available - amount);
        Ok(())
    }
}

#[derive(Debug)]
struct Chain {
    state: State,
    blockhashes: HashMap<Blockhash, u64>,
    latest: Option<Blockhash>,
    minted: u64,
    confirmed: HashSet<TxSignature>,
    injected: VecDeque<LedgerError>,
}

/// Cooldown, then window reset, then daily cap.
fn check_and_update_rate_limit(
    record: &mut RateLimitRecord,
    max_proofs_per_day: u32,
    cooldown_seconds: i64,
    now: i64,
) -> Result<(), ProgramError> {
    if now.saturating_sub(record.last_proof_at) < cooldown_seconds {
        return Err(ProgramError::RateLimitCooldown);
    }
    if now.saturating_sub(record.day_start) >= SECONDS_PER_DAY {
        record.day_start = now;
        record.proofs_today = 0;
    }
    if record.proofs_today >= max_proofs_per_day {
        return Err(ProgramError::DailyRateLimitExceeded);
    }
    record.proofs_today = record
        .proofs_today
        .checked_add(1)
        .ok_or(ProgramError::Overflow)?;
    record.last_proof_at = now;
    record.total_proofs = record
        .total_proofs
        .checked_add(1)
        .ok_or(ProgramError::Overflow)?;
    Ok(())
}

fn program_err(index: usize) -> impl Fn(ProgramError) -> TransactionFailure {
    move |error| TransactionFailure::Program { index, error }
}

fn invalid(index: usize, reason: impl ToString) -> TransactionFailure {
    TransactionFailure::InvalidInstruction {
        index,
        reason: reason.to_string(),
    }
}

fn account(ix: &Instruction, index: usize, position: usize) -> Result<&AccountMeta, TransactionFailure> {
    ix.accounts
        .get(position)
        .ok_or_else(|| invalid(index, format!("missing account #{position}")))
}

fn seeds_err(index: usize) -> impl Fn(AddressError) -> TransactionFailure {
    move |e| invalid(index, e)
}

fn record_rejection(failure: &TransactionFailure) {
    metrics::counter!("vouch_ledger_rejections_total", "reason" => failure.reason()).increment(1);
}

// ─── Ledger ──────────────────────────────────────────────────────────

/// In-memory model of the ledger and the Vouch program.
pub struct InMemoryLedger {
    program_id: Address,
    config_address: Address,
    params: LedgerParams,
    clock: Arc<dyn Clock>,
    confirm_delay: Option<Duration>,
    chain: Mutex<Chain>,
}

impl std::fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLedger")
            .field("program_id", &self.program_id)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl InMemoryLedger {
    /// Ledger with the program initialized under `admin`.
    pub fn new(
        program_id: Address,
        admin: Address,
        params: LedgerParams,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AddressError> {
        let config = ConfigRecord {
            admin,
            is_paused: false,
            max_proofs_per_day: params.max_proofs_per_day,
            cooldown_seconds: params.cooldown_seconds,
            verifier_count: 0,
            total_proofs_verified: 0,
        };
        Ok(Self {
            config_address: config_address(&program_id)?,
            program_id,
            params,
            clock,
            confirm_delay: None,
            chain: Mutex::new(Chain {
                state: State {
                    config,
                    verifiers: HashMap::new(),
                    nullifiers: HashMap::new(),
                    rate_limits: HashMap::new(),
                    balances: HashMap::new(),
                },
                blockhashes: HashMap::new(),
                latest: None,
                minted: 0,
                confirmed: HashSet::new(),
                injected: VecDeque::new(),
            }),
        })
    }

    /// Delay every confirmation, to exercise cancellation.
    pub fn with_confirm_delay(mut self, delay: Duration) -> Self {
        self.confirm_delay = Some(delay);
        self
    }

    /// Program id the model executes.
    pub fn program_id(&self) -> Address {
        self.program_id
    }

    /// Model parameters.
    pub fn params(&self) -> &LedgerParams {
        &self.params
    }

    /// Credit `lamports` to `address`.
    pub fn airdrop(&self, address: &Address, lamports: u64) {
        let mut chain = self.chain.lock();
        let balance = chain.state.balances.entry(*address).or_insert(0);
        *balance = balance.saturating_add(lamports);
    }

    /// Lamports held by `address`.
    pub fn balance(&self, address: &Address) -> u64 {
        self.chain.lock().state.balances.get(address).copied().unwrap_or(0)
    }

    /// Fail the next `send_and_confirm` with `err` instead of executing.
    pub fn inject_failure(&self, err: LedgerError) {
        self.chain.lock().injected.push_back(err);
    }

    /// Current program configuration.
    pub fn config(&self) -> ConfigRecord {
        self.chain.lock().state.config.clone()
    }

    /// Verifier record for `verifier`.
    pub fn verifier_record(&self, verifier: &Ed25519PublicKey) -> Option<VerifierRecord> {
        let address = verifier_address(&self.program_id, verifier).ok()?;
        self.chain.lock().state.verifiers.get(&address).cloned()
    }

    /// Nullifier record for `nullifier`.
    pub fn nullifier_record(&self, nullifier: &Nullifier) -> Option<NullifierRecord> {
        let address = nullifier_record_address(&self.program_id, nullifier).ok()?;
        self.chain.lock().state.nullifiers.get(&address).cloned()
    }

    /// Rate-limit record for `recipient`.
    pub fn rate_limit_record(&self, recipient: &Address) -> Option<RateLimitRecord> {
        let address = rate_limit_address(&self.program_id, recipient).ok()?;
        self.chain.lock().state.rate_limits.get(&address).cloned()
    }

    /// Number of nullifier records, used or not.
    pub fn nullifier_count(&self) -> usize {
        self.chain.lock().state.nullifiers.len()
    }

    // ─── Admin ───────────────────────────────────────────────────────

    fn admin_op<F>(&self, admin: &Address, op: &'static str, f: F) -> Result<(), TransactionFailure>
    where
        F: FnOnce(&mut State, i64) -> Result<(), TransactionFailure>,
    {
        let now = self.clock.now_secs();
        let mut chain = self.chain.lock();
        let result = if chain.state.config.admin != *admin {
            Err(program_err(0)(ProgramError::Unauthorized))
        } else {
            let mut scratch = chain.state.clone();
            f(&mut scratch, now).map(|()| chain.state = scratch)
        };
        match &result {
            Ok(()) => tracing::info!(op, %admin, "admin operation applied"),
            Err(failure) => {
                record_rejection(failure);
                tracing::warn!(op, %admin, error = %failure, "admin operation rejected");
            }
        }
        result
    }

    /// Authorize `verifier`. Fails while paused or if a record exists.
    pub fn add_verifier(
        &self,
        admin: &Address,
        verifier: Ed25519PublicKey,
    ) -> Result<(), TransactionFailure> {
        let address = verifier_address(&self.program_id, &verifier).map_err(seeds_err(0))?;
        self.admin_op(admin, "add_verifier", |state, now| {
            if state.config.is_paused {
                return Err(program_err(0)(ProgramError::ProtocolPaused));
            }
            if state.has_record(&address) {
                return Err(TransactionFailure::AccountAlreadyInUse { address });
            }
            state.verifiers.insert(
                address,
                VerifierRecord {
                    verifier,
                    is_active: true,
                    added_at: now,
                    attestation_count: 0,
                },
            );
            state.config.verifier_count = state
                .config
                .verifier_count
                .checked_add(1)
                .ok_or(program_err(0)(ProgramError::Overflow))?;
            Ok(())
        })
    }

    /// Deactivate `verifier`. The record is kept.
    pub fn remove_verifier(
        &self,
        admin: &Address,
        verifier: &Ed25519PublicKey,
    ) -> Result<(), TransactionFailure> {
        let address = verifier_address(&self.program_id, verifier).map_err(seeds_err(0))?;
        self.admin_op(admin, "remove_verifier", |state, _| {
            if state.config.is_paused {
                return Err(program_err(0)(ProgramError::ProtocolPaused));
            }
            let record = state
                .verifiers
                .get_mut(&address)
                .ok_or(program_err(0)(ProgramError::AccountNotInitialized))?;
            record.is_active = false;
            state.config.verifier_count = state.config.verifier_count.saturating_sub(1);
            Ok(())
        })
    }

    /// Halt submissions.
    pub fn pause(&self, admin: &Address) -> Result<(), TransactionFailure> {
        self.admin_op(admin, "pause", |state, _| {
            if state.config.is_paused {
                return Err(program_err(0)(ProgramError::AlreadyPaused));
            }
            state.config.is_paused = true;
            Ok(())
        })
    }

    /// Resume submissions.
    pub fn unpause(&self, admin: &Address) -> Result<(), TransactionFailure> {
        self.admin_op(admin, "unpause", |state, _| {
            if !state.config.is_paused {
                return Err(program_err(0)(ProgramError::NotPaused));
            }
            state.config.is_paused = false;
            Ok(())
        })
    }

    /// Change the per-recipient throttle.
    pub fn update_rate_limits(
        &self,
        admin: &Address,
        max_proofs_per_day: u32,
        cooldown_seconds: i64,
    ) -> Result<(), TransactionFailure> {
        self.admin_op(admin, "update_rate_limits", |state, _| {
            if max_proofs_per_day == 0 || cooldown_seconds < 0 {
                return Err(program_err(0)(ProgramError::InvalidRateLimit));
            }
            state.config.max_proofs_per_day = max_proofs_per_day;
            state.config.cooldown_seconds = cooldown_seconds;
            Ok(())
        })
    }

    /// Hand the admin authority to `new_admin`.
    pub fn transfer_admin(&self, admin: &Address, new_admin: Address) -> Result<(), TransactionFailure> {
        self.admin_op(admin, "transfer_admin", |state, _| {
            state.config.admin = new_admin;
            Ok(())
        })
    }

    // ─── Blockhashes ─────────────────────────────────────────────────

    fn blockhash_fresh(&self, issued_at_ms: u64, now_ms: u64) -> bool {
        now_ms.saturating_sub(issued_at_ms) <= self.params.blockhash_validity_ms
    }

    fn current_blockhash(&self, chain: &mut Chain) -> Blockhash {
        let now_ms = self.clock.now_ms();
        if let Some(latest) = chain.latest {
            let issued = chain.blockhashes.get(&latest).copied().unwrap_or(0);
            // Hand out a new hash halfway through the old one's validity.
            if now_ms.saturating_sub(issued) <= self.params.blockhash_validity_ms / 2 {
                return latest;
            }
        }
        chain.minted += 1;
        let hash = Blockhash(sha256_concat(&[
            b"vouch-ledger-blockhash",
            &chain.minted.to_be_bytes(),
            &now_ms.to_be_bytes(),
        ]));
        chain.blockhashes.insert(hash, now_ms);
        chain.latest = Some(hash);
        hash
    }

    // ─── Execution ───────────────────────────────────────────────────

    fn process(&self, chain: &mut Chain, signed: &SignedTransaction) -> Result<TxSignature, TransactionFailure> {
        let tx = &signed.transaction;
        if let Some(signer) = signed.first_invalid_signer() {
            return Err(TransactionFailure::SignatureFailure { signer });
        }
        let id = signed
            .id()
            .ok_or(TransactionFailure::SignatureFailure { signer: tx.payer })?;

        let now_ms = self.clock.now_ms();
        let fresh = chain
            .blockhashes
            .get(&tx.recent_blockhash)
            .is_some_and(|issued| self.blockhash_fresh(*issued, now_ms));
        if !fresh {
            return Err(TransactionFailure::BlockhashNotFound);
        }

        let fee = self
            .params
            .fee_per_signature
            .saturating_mul(signed.signatures.len() as u64);
        chain.state.debit(&tx.payer, fee)?;

        let now = self.clock.now_secs();
        let mut scratch = chain.state.clone();
        for index in 0..tx.instructions.len() {
            self.execute(&mut scratch, tx, index, now)?;
        }
        chain.state = scratch;
        Ok(id)
    }

    fn execute(
        &self,
        state: &mut State,
        tx: &Transaction,
        index: usize,
        now: i64,
    ) -> Result<(), TransactionFailure> {
        let ix = &tx.instructions[index];
        if ix.program_id == Address::ED25519_PROGRAM {
            let payload = decode_ed25519_verify(&ix.data).map_err(|e| invalid(index, e))?;
            return verify_with_public_key(&payload.message, &payload.signature, &payload.public_key)
                .map_err(|_| program_err(index)(ProgramError::InvalidSignature));
        }
        if ix.program_id != self.program_id {
            return Err(TransactionFailure::UnsupportedProgram {
                index,
                program_id: ix.program_id,
            });
        }
        match VouchInstruction::unpack(&ix.data).map_err(|e| invalid(index, e))? {
            VouchInstruction::InitNullifier { nullifier } => {
                self.init_nullifier(state, ix, index, nullifier)
            }
            VouchInstruction::InitRateLimit => self.init_rate_limit(state, ix, index, now),
            VouchInstruction::RecordAttestation {
                attestation_hash,
                proof_type,
                nullifier,
                signature,
            } => self.record_attestation(
                state,
                tx,
                index,
                now,
                Attested {
                    attestation_hash,
                    proof_type,
                    nullifier,
                    signature,
                },
            ),
        }
    }

    fn init_nullifier(
        &self,
        state: &mut State,
        ix: &Instruction,
        index: usize,
        nullifier: Nullifier,
    ) -> Result<(), TransactionFailure> {
        let record = account(ix, index, 0)?.pubkey;
        let payer = account(ix, index, 1)?;
        if !payer.is_signer {
            return Err(invalid(index, "payer must sign"));
        }
        let expected = nullifier_record_address(&self.program_id, &nullifier).map_err(seeds_err(index))?;
        if record != expected {
            return Err(program_err(index)(ProgramError::ConstraintSeeds));
        }
        if state.has_record(&record) {
            return Err(TransactionFailure::AccountAlreadyInUse { address: record });
        }
        state.debit(&payer.pubkey, self.params.record_rent)?;
        state.nullifiers.insert(
            record,
            NullifierRecord {
                nullifier,
                is_used: false,
                used_at: 0,
                proof_type: None,
            },
        );
        Ok(())
    }

    fn init_rate_limit(
        &self,
        state: &mut State,
        ix: &Instruction,
        index: usize,
        now: i64,
    ) -> Result<(), TransactionFailure> {
        let record = account(ix, index, 0)?.pubkey;
        let wallet = account(ix, index, 1)?.pubkey;
        let payer = account(ix, index, 2)?;
        if !payer.is_signer {
            return Err(invalid(index, "payer must sign"));
        }
        let expected = rate_limit_address(&self.program_id, &wallet).map_err(seeds_err(index))?;
        if record != expected {
            return Err(program_err(index)(ProgramError::ConstraintSeeds));
        }
        if state.has_record(&record) {
            return Err(TransactionFailure::AccountAlreadyInUse { address: record });
        }
        state.debit(&payer.pubkey, self.params.record_rent)?;
        state.rate_limits.insert(
            record,
            RateLimitRecord {
                wallet,
                proofs_today: 0,
                day_start: now,
                last_proof_at: 0,
                total_proofs: 0,
            },
        );
        Ok(())
    }

    fn record_attestation(
        &self,
        state: &mut State,
        tx: &Transaction,
        index: usize,
        now: i64,
        attested: Attested,
    ) -> Result<(), TransactionFailure> {
        let ix = &tx.instructions[index];
        let fail = program_err(index);

        if account(ix, index, 0)?.pubkey != self.config_address {
            return Err(fail(ProgramError::ConstraintSeeds));
        }
        if state.config.is_paused {
            return Err(fail(ProgramError::ProtocolPaused));
        }

        let verifier_key = account(ix, index, 1)?.pubkey;
        let verifier = state
            .verifiers
            .get(&verifier_key)
            .ok_or(fail(ProgramError::AccountNotInitialized))?;
        if !verifier.is_active {
            return Err(fail(ProgramError::VerifierNotAuthorized));
        }
        let verifier_pubkey = verifier.verifier;

        let recipient = account(ix, index, 4)?.pubkey;
        let rate_key = account(ix, index, 3)?.pubkey;
        if rate_key != rate_limit_address(&self.program_id, &recipient).map_err(seeds_err(index))? {
            return Err(fail(ProgramError::ConstraintSeeds));
        }
        let (max, cooldown) = (state.config.max_proofs_per_day, state.config.cooldown_seconds);
        let rate_limit = state
            .rate_limits
            .get_mut(&rate_key)
            .ok_or(fail(ProgramError::AccountNotInitialized))?;
        check_and_update_rate_limit(rate_limit, max, cooldown, now).map_err(&fail)?;

        check_signature_proof(tx, index, &verifier_pubkey, &attested).map_err(&fail)?;

        let nullifier_key = account(ix, index, 2)?.pubkey;
        if nullifier_key
            != nullifier_record_address(&self.program_id, &attested.nullifier)
                .map_err(seeds_err(index))?
        {
            return Err(fail(ProgramError::ConstraintSeeds));
        }
        let record = state
            .nullifiers
            .get_mut(&nullifier_key)
            .ok_or(fail(ProgramError::AccountNotInitialized))?;
        if record.is_used {
            return Err(fail(ProgramError::NullifierAlreadyUsed));
        }
        record.is_used = true;
        record.used_at = now;
        record.proof_type = Some(attested.proof_type);

        if let Some(verifier) = state.verifiers.get_mut(&verifier_key) {
            verifier.attestation_count = verifier
                .attestation_count
                .checked_add(1)
                .ok_or(fail(ProgramError::Overflow))?;
        }
        state.config.total_proofs_verified = state
            .config
            .total_proofs_verified
            .checked_add(1)
            .ok_or(fail(ProgramError::Overflow))?;

        tracing::info!(
            nullifier = %attested.nullifier.short(),
            proof_type = %attested.proof_type,
            %recipient,
            "attestation recorded"
        );
        Ok(())
    }
}

/// Fields of a `record_attestation` instruction.
struct Attested {
    attestation_hash: AttestationHash,
    proof_type: ProofType,
    nullifier: Nullifier,
    signature: Ed25519Signature,
}

/// Instruction introspection: the preceding instruction must be the
/// verifier's Ed25519 proof over a matching v2 message.
fn check_signature_proof(
    tx: &Transaction,
    index: usize,
    verifier: &Ed25519PublicKey,
    attested: &Attested,
) -> Result<(), ProgramError> {
    let previous = index
        .checked_sub(1)
        .and_then(|i| tx.instructions.get(i))
        .filter(|ix| ix.program_id == Address::ED25519_PROGRAM)
        .ok_or(ProgramError::InvalidSignature)?;
    let payload =
        decode_ed25519_verify(&previous.data).map_err(|_| ProgramError::InvalidSignature)?;
    if payload.public_key != *verifier || payload.signature != attested.signature {
        return Err(ProgramError::InvalidSignature);
    }
    let message =
        decode_message_v2(&payload.message).map_err(|_| ProgramError::InvalidSignature)?;
    if message.nullifier != attested.nullifier
        || message.proof_type != attested.proof_type
        || message.attestation_hash != attested.attestation_hash
    {
        return Err(ProgramError::InvalidSignature);
    }
    Ok(())
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn account_exists(&self, address: &Address) -> Result<bool, LedgerError> {
        let chain = self.chain.lock();
        Ok(*address == self.config_address
            || chain.state.has_record(address)
            || chain.state.balances.contains_key(address))
    }

    async fn latest_blockhash(&self) -> Result<Blockhash, LedgerError> {
        let mut chain = self.chain.lock();
        Ok(self.current_blockhash(&mut chain))
    }

    async fn send_and_confirm(
        &self,
        transaction: &SignedTransaction,
        commitment: CommitmentLevel,
        cancel: &CancellationToken,
    ) -> Result<TxSignature, LedgerError> {
        if cancel.is_cancelled() {
            return Err(LedgerError::Cancelled);
        }
        if let Some(delay) = self.confirm_delay {
            tokio::select! {
                () = cancel.cancelled() => return Err(LedgerError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }

        let mut chain = self.chain.lock();
        if let Some(err) = chain.injected.pop_front() {
            return Err(err);
        }
        match self.process(&mut chain, transaction) {
            Ok(id) => {
                chain.confirmed.insert(id);
                tracing::debug!(%id, %commitment, instructions = transaction.transaction.instructions.len(), "transaction confirmed");
                Ok(id)
            }
            Err(failure) => {
                record_rejection(&failure);
                tracing::warn!(error = %failure, "transaction rejected");
                Err(LedgerError::TransactionFailed(failure))
            }
        }
    }

    async fn is_confirmed(&self, signature: &TxSignature) -> Result<bool, LedgerError> {
        Ok(self.chain.lock().confirmed.contains(signature))
    }
}
