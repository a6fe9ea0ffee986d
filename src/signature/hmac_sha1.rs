use base64::prelude::*;
use hmac::{Hmac, Mac as _};
use secrecy::ExposeSecret as _;
use sha1::Sha1;

use crate::{
    credentials::{Consumer, Token},
    signature::{SignatureMethod, signing_key},
};

/// The `HMAC-SHA1` method (RFC 5849 §3.4.2).
///
/// The signature is the base64 encoded HMAC-SHA1 of the base string, keyed
/// with the consumer and token secrets.
#[derive(Debug, Clone, Copy, Default)]
pub struct HmacSha1;

impl SignatureMethod for HmacSha1 {
    fn name(&self) -> &'static str {
        "HMAC-SHA1"
    }

    fn sign(&self, base_string: &str, consumer: &Consumer, token: Option<&Token>) -> String {
        let key = signing_key(consumer, token);
        let mut mac: Hmac<Sha1> = Hmac::new_from_slice(key.expose_secret().as_bytes())
            .expect("Should not fail with HMAC-SHA");
        mac.update(base_string.as_bytes());
        BASE64_STANDARD.encode(mac.finalize().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHOTOS_BASE_STRING: &str =
        "GET&http%3A%2F%2Fphotos.example.net%2Fphotos&file%3Dvacation.jpg%26\
        oauth_consumer_key%3Ddpf43f3p2l4k3l03%26\
        oauth_nonce%3Dkllo9940pd9333jh%26\
        oauth_signature_method%3DHMAC-SHA1%26\
        oauth_timestamp%3D1191242096%26\
        oauth_token%3Dnnch734d00sl2jdk%26\
        oauth_version%3D1.0%26size%3Doriginal";

    #[test]
    fn test_identifies_as_hmac_sha1() {
        assert_eq!(HmacSha1.name(), "HMAC-SHA1");
    }

    #[test]
    fn test_build_signature() {
        let consumer = Consumer::new("__unused__", "cs");
        assert_eq!(
            HmacSha1.sign("bs", &consumer, None),
            "egQqG5AJep5sJ7anhXju1unge2I="
        );

        let token = Token::new("__unused__", "ts");
        assert_eq!(
            HmacSha1.sign("bs", &consumer, Some(&token)),
            "VZVjXceV7JgPq/dOTnNmEfO0Fv8="
        );

        let consumer = Consumer::new("__unused__", "kd94hf93k423kf44");
        let token = Token::new("__unused__", "pfkkdhi9sl3r4s00");
        assert_eq!(
            HmacSha1.sign(PHOTOS_BASE_STRING, &consumer, Some(&token)),
            "tR3+Ty81lMeYAr/Fid0kMTYa/WM="
        );
    }

    #[test]
    fn test_verify_signature() {
        let consumer = Consumer::new("__unused__", "cs");
        assert!(HmacSha1.verify("bs", &consumer, None, "egQqG5AJep5sJ7anhXju1unge2I="));

        let token = Token::new("__unused__", "ts");
        assert!(HmacSha1.verify(
            "bs",
            &consumer,
            Some(&token),
            "VZVjXceV7JgPq/dOTnNmEfO0Fv8="
        ));

        let consumer = Consumer::new("__unused__", "kd94hf93k423kf44");
        let token = Token::new("__unused__", "pfkkdhi9sl3r4s00");
        assert!(HmacSha1.verify(
            PHOTOS_BASE_STRING,
            &consumer,
            Some(&token),
            "tR3+Ty81lMeYAr/Fid0kMTYa/WM="
        ));
    }

    #[test]
    fn test_rejects_signature_for_other_key() {
        let consumer = Consumer::new("__unused__", "cs");
        let token = Token::new("__unused__", "ts");
        assert!(!HmacSha1.verify("bs", &consumer, Some(&token), "egQqG5AJep5sJ7anhXju1unge2I="));
        assert!(!HmacSha1.verify("bs2", &consumer, None, "egQqG5AJep5sJ7anhXju1unge2I="));
    }
}
