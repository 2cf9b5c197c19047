//! Fake collaborators
//!
//! In-memory keyring, signer, popup, icon and settings used by tests and by hosts running the
//! engine without a real wallet. The popup and icon only record what they were asked to do.

#![warn(missing_docs)]

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::hashes::{sha256, Hash};
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::{rand, All, Message, PublicKey, Secp256k1, SecretKey};
use confirm_common::parking_lot::Mutex;
use confirm_common::{IconUpdater, KeyringGate, PopupController, SettingsProvider, Signer};
use error::Error;
use tokio::sync::{Notify, Semaphore};

pub mod error;

#[derive(Debug, Default)]
struct KeyringState {
    locked: bool,
    lock_count: usize,
    unlocked: Vec<String>,
    fail_lock: bool,
}

/// Keyring that only tracks its lock state
#[derive(Debug, Default)]
pub struct FakeKeyring {
    state: Mutex<KeyringState>,
}

impl FakeKeyring {
    /// Keyring starting unlocked
    pub fn unlocked() -> Self {
        Self::default()
    }

    /// Keyring starting locked
    pub fn locked() -> Self {
        Self {
            state: Mutex::new(KeyringState {
                locked: true,
                ..Default::default()
            }),
        }
    }

    /// Make every following `lock` call fail
    pub fn fail_lock(&self, fail: bool) {
        self.state.lock().fail_lock = fail;
    }

    /// Current lock state
    pub fn is_locked_now(&self) -> bool {
        self.state.lock().locked
    }

    /// How many times the keyring was locked
    pub fn lock_count(&self) -> usize {
        self.state.lock().lock_count
    }

    /// Addresses the keyring was unlocked for, oldest first
    pub fn unlocked_addresses(&self) -> Vec<String> {
        self.state.lock().unlocked.clone()
    }
}

#[async_trait]
impl KeyringGate for FakeKeyring {
    async fn lock(&self) -> Result<(), confirm_common::Error> {
        let mut state = self.state.lock();
        if state.fail_lock {
            return Err(Error::KeyringUnavailable.into());
        }
        state.locked = true;
        state.lock_count += 1;
        Ok(())
    }

    async fn is_locked(&self) -> Result<bool, confirm_common::Error> {
        Ok(self.state.lock().locked)
    }

    async fn unlock(&self, address: &str) -> Result<(), confirm_common::Error> {
        let mut state = self.state.lock();
        state.locked = false;
        state.unlocked.push(address.to_owned());
        Ok(())
    }
}

/// Holds signatures of a gated [`FakeSigner`] until released
#[derive(Debug)]
pub struct SignGate {
    entered: Notify,
    release: Semaphore,
}

impl SignGate {
    fn new() -> Self {
        Self {
            entered: Notify::new(),
            release: Semaphore::new(0),
        }
    }

    /// Wait until a signature is parked at the gate
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let one parked signature through
    pub fn release(&self) {
        self.release.add_permits(1);
    }

    async fn pass(&self) {
        self.entered.notify_one();
        if let Ok(permit) = self.release.acquire().await {
            permit.forget();
        }
    }
}

/// Secp256k1 ECDSA signer over the sha256 of the payload
pub struct FakeSigner {
    secp: Secp256k1<All>,
    secret_key: SecretKey,
    disabled: bool,
    gate: Option<Arc<SignGate>>,
}

impl std::fmt::Debug for FakeSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeSigner")
            .field("public_key", &self.public_key())
            .field("disabled", &self.disabled)
            .field("gated", &self.gate.is_some())
            .finish()
    }
}

impl FakeSigner {
    /// Signer with the given key
    pub fn new(secret_key: SecretKey) -> Self {
        Self {
            secp: Secp256k1::new(),
            secret_key,
            disabled: false,
            gate: None,
        }
    }

    /// Signer with a fresh random key
    pub fn random() -> Self {
        Self::new(SecretKey::new(&mut rand::thread_rng()))
    }

    /// Signer with a hex encoded key
    pub fn from_hex(secret_key: &str) -> Result<Self, Error> {
        let secret_key = SecretKey::from_str(secret_key)
            .map_err(|err| Error::InvalidSecretKey(err.to_string()))?;
        Ok(Self::new(secret_key))
    }

    /// Signer refusing every payload
    pub fn failing() -> Self {
        Self {
            disabled: true,
            ..Self::random()
        }
    }

    /// Signer parking every signature until its gate releases it
    pub fn gated() -> (Self, Arc<SignGate>) {
        let gate = Arc::new(SignGate::new());
        let signer = Self {
            gate: Some(gate.clone()),
            ..Self::random()
        };
        (signer, gate)
    }

    /// Public key matching the signatures
    pub fn public_key(&self) -> PublicKey {
        self.secret_key.public_key(&self.secp)
    }

    /// Check a compact signature produced by this signer
    pub fn verify(&self, payload: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::from_compact(signature) else {
            return false;
        };
        self.secp
            .verify_ecdsa(&digest(payload), &signature, &self.public_key())
            .is_ok()
    }
}

fn digest(payload: &[u8]) -> Message {
    Message::from_digest(sha256::Hash::hash(payload).to_byte_array())
}

#[async_trait]
impl Signer for FakeSigner {
    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, confirm_common::Error> {
        if self.disabled {
            return Err(Error::SignerDisabled.into());
        }

        if let Some(gate) = &self.gate {
            gate.pass().await;
        }

        let signature = self.secp.sign_ecdsa(&digest(payload), &self.secret_key);
        tracing::debug!("Signed {} bytes", payload.len());
        Ok(signature.serialize_compact().to_vec())
    }
}

/// Side effect requested from the popup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupEvent {
    /// A new window was opened
    Open,
    /// The open window was focused
    Focus,
    /// The window was closed
    Close,
}

/// Popup recording every call
#[derive(Debug, Default)]
pub struct RecordingPopup {
    events: Mutex<Vec<PopupEvent>>,
    fail_focus: AtomicBool,
}

impl RecordingPopup {
    /// Create a new popup
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `focus_existing` fail, as when the user closed the window by hand
    pub fn fail_focus(&self, fail: bool) {
        self.fail_focus.store(fail, Ordering::SeqCst);
    }

    /// Calls received so far
    pub fn events(&self) -> Vec<PopupEvent> {
        self.events.lock().clone()
    }

    /// Number of calls of one kind
    pub fn count(&self, event: PopupEvent) -> usize {
        self.events.lock().iter().filter(|e| **e == event).count()
    }
}

#[async_trait]
impl PopupController for RecordingPopup {
    async fn open(&self) -> Result<(), confirm_common::Error> {
        self.events.lock().push(PopupEvent::Open);
        Ok(())
    }

    async fn focus_existing(&self) -> Result<(), confirm_common::Error> {
        if self.fail_focus.load(Ordering::SeqCst) {
            return Err(Error::PopupUnavailable.into());
        }
        self.events.lock().push(PopupEvent::Focus);
        Ok(())
    }

    async fn close(&self) -> Result<(), confirm_common::Error> {
        self.events.lock().push(PopupEvent::Close);
        Ok(())
    }
}

/// Icon recording every badge count
#[derive(Debug, Default)]
pub struct RecordingIcon {
    updates: Mutex<Vec<usize>>,
}

impl RecordingIcon {
    /// Create a new icon
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts pushed so far
    pub fn updates(&self) -> Vec<usize> {
        self.updates.lock().clone()
    }

    /// Last count pushed
    pub fn last(&self) -> Option<usize> {
        self.updates.lock().last().copied()
    }
}

#[async_trait]
impl IconUpdater for RecordingIcon {
    async fn update(&self, pending: usize) -> Result<(), confirm_common::Error> {
        self.updates.lock().push(pending);
        Ok(())
    }
}

/// Settings with a fixed "always require password" flag
#[derive(Debug, Default)]
pub struct StaticSettings {
    always_require_password: AtomicBool,
    yielding: bool,
}

impl StaticSettings {
    /// Create settings
    pub fn new(always_require_password: bool) -> Self {
        Self {
            always_require_password: AtomicBool::new(always_require_password),
            yielding: false,
        }
    }

    /// Yield to the scheduler before every answer, letting concurrent callers interleave
    pub fn yielding(mut self) -> Self {
        self.yielding = true;
        self
    }

    /// Change the flag
    pub fn set_always_require_password(&self, value: bool) {
        self.always_require_password.store(value, Ordering::SeqCst);
    }
}

#[async_trait]
impl SettingsProvider for StaticSettings {
    async fn is_always_require_password(&self) -> Result<bool, confirm_common::Error> {
        if self.yielding {
            tokio::task::yield_now().await;
        }
        Ok(self.always_require_password.load(Ordering::SeqCst))
    }
}
