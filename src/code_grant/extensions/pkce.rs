use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::primitives::grant::{ChallengeMethod, CodeChallenge};

/// Proof Key for Code Exchange by OAuth Public Clients
///
/// > Auth 2.0 public clients utilizing the Authorization Code Grant are
/// susceptible to the authorization code interception attack.  This
/// specification describes the attack as well as a technique to mitigate
/// against the threat through the use of Proof Key for Code Exchange
/// (PKCE, pronounced "pixy").
///
/// (from the respective [RFC 7636])
///
/// In short, public clients send a challenge derived from a secret verifier when requesting their
/// authorization code. When they trade this code for an access token, they present the verifier
/// itself. For such codes the verifier replaces client authentication entirely.
///
/// The simple `plain` method only prevents attackers unable to snoop on the connection from
/// impersonating the client, while the `S256` method, which uses one-way hash functions, makes
/// any attack short of reading the victim client's memory infeasible.
///
/// Support for the `plain` method is OPTIONAL and must be turned on explicitely.
///
/// [RFC 7636]: https://tools.ietf.org/html/rfc7636
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PkceVerifier {
    allow_plain: bool,
}

impl PkceVerifier {
    /// Only accept the `S256` method.
    pub fn s256_only() -> PkceVerifier {
        PkceVerifier { allow_plain: false }
    }

    /// Also accept the less secure `plain` method. This method is NOT secure against an
    /// eavesdropping attacker such as rogue processes capturing a devices requests.
    pub fn allow_plain() -> PkceVerifier {
        PkceVerifier { allow_plain: true }
    }

    /// Compute the challenge for a verifier.
    pub fn challenge(code_verifier: &str, method: ChallengeMethod) -> String {
        match method {
            ChallengeMethod::Plain => code_verifier.to_string(),
            ChallengeMethod::Sha256 => URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes())),
        }
    }

    /// Check a verifier against the stored challenge.
    ///
    /// A `plain` challenge never verifies unless explicitely allowed.
    pub fn verify(&self, code_verifier: &str, challenge: &str, method: ChallengeMethod) -> bool {
        if method == ChallengeMethod::Plain && !self.allow_plain {
            return false;
        }

        let recomputed = PkceVerifier::challenge(code_verifier, method);
        recomputed.as_bytes().ct_eq(challenge.as_bytes()).into()
    }

    /// Check a verifier against a challenge as stored with an authorization code.
    pub fn verify_challenge(&self, code_verifier: &str, stored: &CodeChallenge) -> bool {
        self.verify(code_verifier, &stored.challenge, stored.method)
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        PkceVerifier::s256_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc_example() {
        // Appendix B of RFC 7636.
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let challenge = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";
        assert_eq!(PkceVerifier::challenge(verifier, ChallengeMethod::Sha256), challenge);
        assert!(PkceVerifier::s256_only().verify(verifier, challenge, ChallengeMethod::Sha256));
    }

    #[test]
    fn wrong_verifier_fails() {
        let pkce = PkceVerifier::s256_only();
        let challenge = PkceVerifier::challenge("first verifier", ChallengeMethod::Sha256);
        assert!(!pkce.verify("second verifier", &challenge, ChallengeMethod::Sha256));
        assert!(!pkce.verify("", &challenge, ChallengeMethod::Sha256));
    }

    #[test]
    fn plain_requires_opt_in() {
        let verifier = "plain-verifier";
        assert!(!PkceVerifier::s256_only().verify(verifier, verifier, ChallengeMethod::Plain));
        assert!(PkceVerifier::allow_plain().verify(verifier, verifier, ChallengeMethod::Plain));
        assert!(!PkceVerifier::allow_plain().verify("other", verifier, ChallengeMethod::Plain));
    }

    #[test]
    fn stored_challenge() {
        let stored = CodeChallenge {
            challenge: PkceVerifier::challenge("verifier", ChallengeMethod::Sha256),
            method: ChallengeMethod::Sha256,
        };
        assert!(PkceVerifier::default().verify_challenge("verifier", &stored));
        assert!(!PkceVerifier::default().verify_challenge("verifieR", &stored));
    }
}
