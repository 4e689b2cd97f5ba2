//! Signing key and funding address.
//!
//! Both are injected from the environment by the host process. The engine
//! only checks that they are present; whether the key actually controls
//! the funding address is the transaction library's concern.

use std::fmt;

use payout_types::Address;
use zeroize::Zeroizing;

/// The funding wallet's signing secret. Zeroed on drop, never printed.
#[derive(Clone)]
pub struct SigningKey(Zeroizing<String>);

impl SigningKey {
    /// Wrap a secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    /// Expose the secret to a signer.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    /// Whether the secret is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Secret configuration required to pay out.
#[derive(Clone, Debug, Default)]
pub struct Secrets {
    /// Key that signs the funding inputs.
    pub signing_key: Option<SigningKey>,
    /// Address the payout is funded from.
    pub funding_address: Option<Address>,
}

impl Secrets {
    /// The signing key, if configured and non-blank.
    pub fn signing_key(&self) -> Option<&SigningKey> {
        self.signing_key.as_ref().filter(|k| !k.is_blank())
    }

    /// The funding address, if configured and non-blank.
    pub fn funding_address(&self) -> Option<&Address> {
        self.funding_address.as_ref().filter(|a| !a.is_blank())
    }
}
