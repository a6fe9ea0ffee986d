//! Identity tokens returned by the provider's `/identify` endpoint.
//!
//! The token is a compact JWS (`header.payload.signature`, each part base64url
//! encoded) signed with HMAC, keyed by the consumer secret. Decoding checks,
//! in order: the token shape, the base64 and JSON of each part, the signing
//! algorithm, the signature, and finally the claims (issuer, audience,
//! lifetime and nonce).

use base64::{
    Engine as _,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, general_purpose},
};
use bon::Builder;
use hmac::{Hmac, Mac as _};
use secrecy::ExposeSecret as _;
use serde::{Deserialize, Deserializer};
use snafu::prelude::*;
use subtle::ConstantTimeEq as _;

use crate::{
    credentials::Consumer,
    platform::{Duration, unix_now},
};

/// base64url, accepting input with or without padding.
const URL_SAFE_INDIFFERENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    general_purpose::NO_PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// The HMAC algorithms accepted for identity tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HmacAlgorithm {
    /// HS256 algorithm
    Hs256,
    /// HS384 algorithm
    Hs384,
    /// HS512 algorithm
    Hs512,
}

impl HmacAlgorithm {
    fn from_jws_name(alg: &str) -> Option<Self> {
        match alg {
            "HS256" => Some(Self::Hs256),
            "HS384" => Some(Self::Hs384),
            "HS512" => Some(Self::Hs512),
            _ => None,
        }
    }

    fn sign(self, key: &[u8], input: &[u8]) -> Vec<u8> {
        match self {
            HmacAlgorithm::Hs256 => {
                let mut mac: Hmac<sha2::Sha256> =
                    Hmac::new_from_slice(key).expect("Should not fail with HMAC-SHA");
                mac.update(input);
                mac.finalize().into_bytes().to_vec()
            }
            HmacAlgorithm::Hs384 => {
                let mut mac: Hmac<sha2::Sha384> =
                    Hmac::new_from_slice(key).expect("Should not fail with HMAC-SHA");
                mac.update(input);
                mac.finalize().into_bytes().to_vec()
            }
            HmacAlgorithm::Hs512 => {
                let mut mac: Hmac<sha2::Sha512> =
                    Hmac::new_from_slice(key).expect("Should not fail with HMAC-SHA");
                mac.update(input);
                mac.finalize().into_bytes().to_vec()
            }
        }
    }
}

impl AsRef<str> for HmacAlgorithm {
    fn as_ref(&self) -> &str {
        match self {
            HmacAlgorithm::Hs256 => "HS256",
            HmacAlgorithm::Hs384 => "HS384",
            HmacAlgorithm::Hs512 => "HS512",
        }
    }
}

/// The claims of a verified identity token.
///
/// Besides the registered JWT claims, providers report details about the
/// user's account. Claims not listed here are kept in [`Identity::extra`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Identity {
    /// The canonical server URL of the provider.
    pub iss: String,
    /// The provider's identifier for the user.
    #[serde(deserialize_with = "deserialize_string_or_number")]
    pub sub: String,
    /// The consumer key(s) the token was issued to.
    #[serde(deserialize_with = "deserialize_string_or_vec")]
    pub aud: Vec<String>,
    /// Expiry, in Unix seconds.
    #[serde(deserialize_with = "deserialize_whole_or_fractional")]
    pub exp: u64,
    /// Issue time, in Unix seconds.
    #[serde(deserialize_with = "deserialize_whole_or_fractional")]
    pub iat: u64,
    /// The nonce of the identify request this token answers.
    pub nonce: String,
    /// The user's name.
    pub username: Option<String>,
    /// The number of edits the user has made.
    pub editcount: Option<u64>,
    /// Whether the user has confirmed an email address.
    pub confirmed_email: Option<bool>,
    /// Whether the user is currently blocked.
    pub blocked: Option<bool>,
    /// The account's registration time, as reported by the provider.
    pub registered: Option<String>,
    /// The user's groups.
    #[serde(default)]
    pub groups: Vec<String>,
    /// The user's rights.
    #[serde(default)]
    pub rights: Vec<String>,
    /// The grants the user gave this consumer.
    #[serde(default)]
    pub grants: Vec<String>,
    /// Any other claims.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct IdentityHeader {
    alg: String,
}

/// The checks applied to an identity token.
#[derive(Debug, Clone, Builder)]
pub struct IdentityValidation<'a> {
    /// The consumer the token was issued to. Its secret is the HMAC key and
    /// its key must appear in `aud`.
    consumer: &'a Consumer,
    /// The expected `iss`: the provider's canonical server URL.
    issuer: &'a str,
    /// The expected `nonce`.
    nonce: &'a str,
    /// Allowed clock skew when checking `iat` and `exp`.
    #[builder(default)]
    leeway: Duration,
    /// The current Unix time; defaults to the system clock.
    #[builder(default = unix_now())]
    now: u64,
}

impl IdentityValidation<'_> {
    /// Decodes `token`, verifies its signature and checks its claims.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first check that failed.
    pub fn verify(&self, token: &str) -> Result<Identity, IdentityError> {
        let identity = decode(token, self.consumer)?;
        self.check_claims(&identity)?;
        Ok(identity)
    }

    fn check_claims(&self, identity: &Identity) -> Result<(), IdentityError> {
        ensure!(
            identity.iss == self.issuer,
            IssuerMismatchSnafu {
                expected: self.issuer,
                actual: identity.iss.as_str(),
            }
        );
        ensure!(
            identity.aud.iter().any(|aud| aud == self.consumer.key()),
            AudienceMismatchSnafu {
                expected: self.consumer.key(),
            }
        );

        let leeway = self.leeway.as_secs();
        ensure!(
            identity.iat <= self.now.saturating_add(leeway),
            NotYetValidSnafu { iat: identity.iat }
        );
        ensure!(
            identity.exp.saturating_add(leeway) >= self.now,
            ExpiredSnafu { exp: identity.exp }
        );

        ensure!(
            bool::from(identity.nonce.as_bytes().ct_eq(self.nonce.as_bytes())),
            NonceMismatchSnafu
        );
        Ok(())
    }
}

/// Decodes a token and verifies its signature, without checking claims.
///
/// # Errors
///
/// Returns an error if the token is malformed, uses an unsupported algorithm,
/// or is not signed with the consumer secret.
pub fn decode(token: &str, consumer: &Consumer) -> Result<Identity, IdentityError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return MalformedTokenSnafu { received: token }.fail();
    };

    let header_json = base64url_decode(header_b64)?;
    let payload_json = base64url_decode(payload_b64)?;
    let signature = base64url_decode(signature_b64)?;

    let header: IdentityHeader =
        serde_json::from_slice(&header_json).context(InvalidJsonSnafu { part: "header" })?;
    let algorithm = HmacAlgorithm::from_jws_name(&header.alg)
        .context(UnsupportedAlgorithmSnafu { alg: header.alg })?;

    let signing_input = &token[..header_b64.len() + 1 + payload_b64.len()];
    let expected = algorithm.sign(
        consumer.secret().expose_secret().as_bytes(),
        signing_input.as_bytes(),
    );
    ensure!(
        bool::from(expected.as_slice().ct_eq(signature.as_slice())),
        SignatureMismatchSnafu {
            algorithm: algorithm.as_ref().to_owned()
        }
    );

    serde_json::from_slice(&payload_json).context(InvalidJsonSnafu { part: "payload" })
}

fn base64url_decode(value: &str) -> Result<Vec<u8>, IdentityError> {
    URL_SAFE_INDIFFERENT
        .decode(value)
        .ok()
        .context(InvalidBase64Snafu { value })
}

/// Errors that occur when decoding or validating an identity token.
#[derive(Debug, Snafu)]
pub enum IdentityError {
    /// The token does not have exactly three `.`-separated parts.
    #[snafu(display("JWT has incorrect format. Received: {received}"))]
    MalformedToken {
        /// The rejected token.
        received: String,
    },
    /// A part of the token is not valid base64url.
    #[snafu(display("Unable to decode base64 value: {value}"))]
    InvalidBase64 {
        /// The rejected value.
        value: String,
    },
    /// A part of the token is not the expected JSON.
    #[snafu(display("Invalid JSON in identity token {part}"))]
    InvalidJson {
        /// Which part failed to parse.
        part: &'static str,
        /// The underlying JSON error.
        source: serde_json::Error,
    },
    /// The token is signed with an algorithm other than HMAC-SHA2.
    #[snafu(display("Unsupported identity token algorithm '{alg}'"))]
    UnsupportedAlgorithm {
        /// The `alg` header value.
        alg: String,
    },
    /// The token signature is not valid for the consumer secret.
    #[snafu(display("Identity token {algorithm} signature validation failed"))]
    SignatureMismatch {
        /// The algorithm that was checked.
        algorithm: String,
    },
    /// The token was issued by another server.
    #[snafu(display("Identity token issuer '{actual}' does not match '{expected}'"))]
    IssuerMismatch {
        /// The canonical server URL.
        expected: String,
        /// The `iss` claim.
        actual: String,
    },
    /// The token was issued to another consumer.
    #[snafu(display("Identity token was not issued to consumer '{expected}'"))]
    AudienceMismatch {
        /// The consumer key.
        expected: String,
    },
    /// The token's issue time is in the future.
    #[snafu(display("Identity token issued in the future (iat {iat})"))]
    NotYetValid {
        /// The `iat` claim.
        iat: u64,
    },
    /// The token has expired.
    #[snafu(display("Identity token expired (exp {exp})"))]
    Expired {
        /// The `exp` claim.
        exp: u64,
    },
    /// The token answers a different identify request.
    #[snafu(display("Identity token nonce does not match the request"))]
    NonceMismatch,
}

impl crate::Error for IdentityError {
    fn is_retryable(&self) -> bool {
        false
    }
}

fn deserialize_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(serde_json::Number),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}

fn deserialize_string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de;

    struct StringOrVec;

    impl<'de> de::Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or array of strings")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![v.to_owned()])
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            let mut vec = Vec::with_capacity(seq.size_hint().unwrap_or(1));
            while let Some(value) = seq.next_element::<String>()? {
                vec.push(value);
            }
            Ok(vec)
        }
    }

    deserializer.deserialize_any(StringOrVec)
}

fn deserialize_whole_or_fractional<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de;

    struct WholeOrFractional;

    impl de::Visitor<'_> for WholeOrFractional {
        type Value = u64;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a positive numeric value")
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(v)
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            u64::try_from(v).map_err(|_| E::custom("cannot have a negative value"))
        }

        #[allow(clippy::cast_possible_truncation)]
        #[allow(clippy::cast_precision_loss)]
        #[allow(clippy::cast_sign_loss)]
        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() {
                return Err(E::custom("cannot be NaN"));
            }

            if v < 0.0 || v > u64::MAX as f64 {
                return Err(E::custom("outside u64 range"));
            }

            Ok(v as u64)
        }
    }

    deserializer.deserialize_any(WholeOrFractional)
}

/// Builds a signed identity token, for tests.
#[cfg(test)]
pub(crate) fn sign_token(alg: &str, claims: &serde_json::Value, secret: &str) -> String {
    use base64::prelude::BASE64_URL_SAFE_NO_PAD;

    let header =
        BASE64_URL_SAFE_NO_PAD.encode(serde_json::json!({ "alg": alg, "typ": "JWT" }).to_string());
    let payload = BASE64_URL_SAFE_NO_PAD.encode(claims.to_string());
    let signing_input = format!("{header}.{payload}");
    let signature = HmacAlgorithm::from_jws_name(alg)
        .map(|a| a.sign(secret.as_bytes(), signing_input.as_bytes()))
        .unwrap_or_default();
    format!("{signing_input}.{}", BASE64_URL_SAFE_NO_PAD.encode(signature))
}

#[cfg(test)]
mod tests {
    use base64::{Engine as _, prelude::BASE64_URL_SAFE_NO_PAD};
    use serde_json::json;

    use super::*;

    const NOW: u64 = 1_700_000_000;

    fn consumer() -> Consumer {
        Consumer::new("ckey", "csecret")
    }

    fn claims() -> serde_json::Value {
        json!({
            "iss": "https://example.org",
            "sub": 12345,
            "aud": "ckey",
            "exp": NOW + 100,
            "iat": NOW - 5,
            "nonce": "abc123",
            "username": "Example",
            "editcount": 42,
            "confirmed_email": true,
            "blocked": false,
            "registered": "20150101000000",
            "groups": ["*", "user"],
            "rights": ["read", "edit"],
            "grants": ["mwoauth-authonly"],
            "realname": "Ex Ample",
        })
    }

    fn verify(consumer: &Consumer, token: &str) -> Result<Identity, IdentityError> {
        IdentityValidation::builder()
            .consumer(consumer)
            .issuer("https://example.org")
            .nonce("abc123")
            .now(NOW)
            .build()
            .verify(token)
    }

    #[test]
    fn test_verifies_valid_token() {
        let consumer = consumer();
        let token = sign_token("HS256", &claims(), "csecret");

        let identity = verify(&consumer, &token).unwrap();
        assert_eq!(identity.sub, "12345");
        assert_eq!(identity.aud, ["ckey"]);
        assert_eq!(identity.username.as_deref(), Some("Example"));
        assert_eq!(identity.editcount, Some(42));
        assert_eq!(identity.confirmed_email, Some(true));
        assert_eq!(identity.groups, ["*", "user"]);
        assert_eq!(identity.grants, ["mwoauth-authonly"]);
        assert_eq!(identity.extra.get("realname"), Some(&json!("Ex Ample")));
    }

    #[test]
    fn test_accepts_other_hmac_algorithms() {
        let consumer = consumer();
        for alg in ["HS384", "HS512"] {
            let token = sign_token(alg, &claims(), "csecret");
            assert!(verify(&consumer, &token).is_ok(), "{alg}");
        }
    }

    #[test]
    fn test_accepts_padded_base64() {
        let consumer = consumer();
        let token = sign_token("HS256", &claims(), "csecret");
        let parts: Vec<&str> = token.split('.').collect();
        let pad = |s: &str| format!("{s}{}", "=".repeat((4 - s.len() % 4) % 4));

        let padded = format!("{}.{}.{}", parts[0], parts[1], pad(parts[2]));
        assert!(verify(&consumer, &padded).is_ok());
    }

    #[test]
    fn test_decode_jwt_invalid() {
        let err = decode("incorrect-jwt-string", &consumer()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "JWT has incorrect format. Received: incorrect-jwt-string"
        );
        assert!(matches!(
            decode("a.b.c.d", &consumer()),
            Err(IdentityError::MalformedToken { .. })
        ));
    }

    #[test]
    fn test_urlsafe_b64_decode() {
        let err = base64url_decode("#non base64#").unwrap_err();
        assert_eq!(err.to_string(), "Unable to decode base64 value: #non base64#");

        let err = decode("#non base64#.e30.e30", &consumer()).unwrap_err();
        assert!(matches!(err, IdentityError::InvalidBase64 { value } if value == "#non base64#"));
    }

    #[test]
    fn test_rejects_invalid_json() {
        let not_json = BASE64_URL_SAFE_NO_PAD.encode("not json");
        let token = format!("{not_json}.e30.e30");
        assert!(matches!(
            decode(&token, &consumer()),
            Err(IdentityError::InvalidJson { part: "header", .. })
        ));
    }

    #[test]
    fn test_rejects_unsupported_algorithm() {
        let token = sign_token("none", &claims(), "csecret");
        assert!(matches!(
            decode(&token, &consumer()),
            Err(IdentityError::UnsupportedAlgorithm { alg }) if alg == "none"
        ));
    }

    #[test]
    fn test_rejects_wrong_secret() {
        let token = sign_token("HS256", &claims(), "other-secret");
        assert!(matches!(
            verify(&consumer(), &token),
            Err(IdentityError::SignatureMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_tampered_payload() {
        let token = sign_token("HS256", &claims(), "csecret");
        let mut tampered = claims();
        tampered["username"] = json!("Mallory");
        let forged_payload = BASE64_URL_SAFE_NO_PAD.encode(tampered.to_string());

        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
        assert!(matches!(
            verify(&consumer(), &forged),
            Err(IdentityError::SignatureMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_wrong_issuer() {
        let mut claims = claims();
        claims["iss"] = json!("https://evil.example");
        let token = sign_token("HS256", &claims, "csecret");
        assert!(matches!(
            verify(&consumer(), &token),
            Err(IdentityError::IssuerMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_wrong_audience() {
        let mut claims = claims();
        claims["aud"] = json!(["someone-else"]);
        let token = sign_token("HS256", &claims, "csecret");
        assert!(matches!(
            verify(&consumer(), &token),
            Err(IdentityError::AudienceMismatch { .. })
        ));
    }

    #[test]
    fn test_checks_lifetime() {
        let mut future = claims();
        future["iat"] = json!(NOW + 10);
        let token = sign_token("HS256", &future, "csecret");
        assert!(matches!(
            verify(&consumer(), &token),
            Err(IdentityError::NotYetValid { .. })
        ));

        let mut expired = claims();
        expired["exp"] = json!(NOW - 1);
        let token = sign_token("HS256", &expired, "csecret");
        assert!(matches!(verify(&consumer(), &token), Err(IdentityError::Expired { .. })));

        let consumer = consumer();
        let lenient = IdentityValidation::builder()
            .consumer(&consumer)
            .issuer("https://example.org")
            .nonce("abc123")
            .now(NOW)
            .leeway(Duration::from_secs(30))
            .build();
        assert!(lenient.verify(&token).is_ok());
    }

    #[test]
    fn test_rejects_wrong_nonce() {
        let mut claims = claims();
        claims["nonce"] = json!("replayed");
        let token = sign_token("HS256", &claims, "csecret");
        assert!(matches!(verify(&consumer(), &token), Err(IdentityError::NonceMismatch)));
    }

    #[test]
    fn test_fractional_timestamps() {
        let mut claims = claims();
        claims["iat"] = json!(NOW as f64 - 0.5);
        let token = sign_token("HS256", &claims, "csecret");
        assert_eq!(verify(&consumer(), &token).unwrap().iat, NOW - 1);
    }
}
