use jsonwebtoken::{jwk, jwk::AlgorithmParameters, DecodingKey};
use std::collections::HashMap;

use super::OpenIdError;

pub type Keys = HashMap<String, DecodingKey>;

pub async fn decoding_keys(client: &reqwest::Client, jwks_uri: &str) -> Result<Keys, OpenIdError> {
    let jwks = client
        .get(jwks_uri)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|_| OpenIdError::InvalidJwksUri(jwks_uri.to_owned()))?
        .json::<jwk::JwkSet>()
        .await
        .map_err(|_| OpenIdError::MissingJwksSet(jwks_uri.to_owned()))?;
    Ok(jwks_to_decoding_keys(&jwks))
}

/// Only RSA keys carrying a `kid` are usable; everything else is skipped.
fn jwks_to_decoding_keys(jwks: &jwk::JwkSet) -> Keys {
    let mut hm = HashMap::new();
    for jwk in &jwks.keys {
        if let AlgorithmParameters::RSA(ref rsa) = jwk.algorithm {
            if let Ok(decoding_key) = DecodingKey::from_rsa_components(&rsa.n, &rsa.e) {
                if let Some(kid) = jwk.common.key_id.clone() {
                    hm.insert(kid, decoding_key);
                }
            }
        }
    }
    hm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_rsa_keys_with_kid() {
        let jwks: jwk::JwkSet = serde_json::from_str(include_str!("../../tests/fixtures/jwks.json")).unwrap();
        let keys = jwks_to_decoding_keys(&jwks);
        assert_eq!(keys.len(), 1);
        assert!(keys.contains_key("test-key"));
    }

    #[test]
    fn skips_keys_without_kid() {
        let mut jwks: jwk::JwkSet = serde_json::from_str(include_str!("../../tests/fixtures/jwks.json")).unwrap();
        jwks.keys[0].common.key_id = None;
        assert!(jwks_to_decoding_keys(&jwks).is_empty());
    }

    #[test]
    fn skips_symmetric_keys() {
        let jwks: jwk::JwkSet = serde_json::from_value(serde_json::json!({
            "keys": [{ "kty": "oct", "kid": "hmac", "k": "c2VjcmV0" }]
        }))
        .unwrap();
        assert!(jwks_to_decoding_keys(&jwks).is_empty());
    }
}
