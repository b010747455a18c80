use base64::{engine::general_purpose::STANDARD, Engine};
use rand::Rng;
use ring::hmac;
use serde::Deserialize;
use url::Url;

use crate::error::{ExportError, Result};
use crate::http::FormParams;

/// Application keys, loaded once by the caller and never persisted here.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub token: String,
    pub token_secret: String,
}

/// Per-request nonce and timestamp.
#[derive(Debug, Clone)]
pub struct RequestStamp {
    pub nonce: String,
    pub timestamp: i64,
}

impl RequestStamp {
    /// 8 random decimal digits and the current unix time.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let nonce: String = (0..8)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect();

        Self {
            nonce,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// RFC 3986 encoding: everything but `A-Z a-z 0-9 - _ . ~` is escaped and
/// spaces become `%20`, never `+`.
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// `scheme://host[:port]/path`, query and fragment dropped.
pub fn signable_url(raw: &str) -> Result<String> {
    let url = Url::parse(raw).map_err(|e| ExportError::Protocol(format!("invalid URL {}: {}", raw, e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| ExportError::Protocol(format!("URL without host: {}", raw)))?;

    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    })
}

/// Encoded `name=value` pairs sorted by name, then by value, joined by `&`.
pub fn normalize_params(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn base_string(method: &str, url: &str, params: &[(String, String)]) -> Result<String> {
    Ok(format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(&signable_url(url)?),
        percent_encode(&normalize_params(params))
    ))
}

pub fn signing_key(consumer_secret: &str, token_secret: &str) -> String {
    format!("{}&{}", percent_encode(consumer_secret), token_secret)
}

/// base64(HMAC-SHA1(key, base_string))
pub fn signature(key: &str, base_string: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, key.as_bytes());
    let tag = hmac::sign(&key, base_string.as_bytes());
    STANDARD.encode(tag.as_ref())
}

/// Adds the standard OAuth1 parameters and `oauth_signature` to `params`.
///
/// `token` is sent as `oauth_token` when present; `token_secret` is appended
/// to the signing key as-is.
pub fn sign_request(
    credentials: &Credentials,
    method: &str,
    url: &str,
    mut params: FormParams,
    token: Option<&str>,
    token_secret: &str,
    stamp: &RequestStamp,
) -> Result<FormParams> {
    params.push(("oauth_consumer_key".into(), credentials.consumer_key.clone()));
    params.push(("oauth_nonce".into(), stamp.nonce.clone()));
    params.push(("oauth_signature_method".into(), "HMAC-SHA1".into()));
    params.push(("oauth_timestamp".into(), stamp.timestamp.to_string()));
    if let Some(token) = token {
        params.push(("oauth_token".into(), token.to_string()));
    }
    params.push(("oauth_version".into(), "1.0".into()));

    let base = base_string(method, url, &params)?;
    tracing::debug!("OAuth signature base string: {}", base);

    let key = signing_key(&credentials.consumer_secret, token_secret);
    params.push(("oauth_signature".into(), signature(&key, &base)));
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> FormParams {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn encoding_is_rfc3986() {
        assert_eq!(percent_encode("a b"), "a%20b");
        assert_eq!(percent_encode("a+b"), "a%2Bb");
        assert_eq!(percent_encode("~-._"), "~-._");
        assert_eq!(percent_encode("a=b&c"), "a%3Db%26c");
    }

    #[test]
    fn url_is_stripped_of_query() {
        assert_eq!(
            signable_url("https://Example.com/x/y?foo=bar#frag").unwrap(),
            "https://example.com/x/y"
        );
        assert_eq!(
            signable_url("http://example.com:8080/x").unwrap(),
            "http://example.com:8080/x"
        );
        assert!(signable_url("not a url").is_err());
    }

    #[test]
    fn params_sort_by_name_then_value() {
        let params = pairs(&[("b", "2"), ("a", "1"), ("a", "0")]);
        assert_eq!(normalize_params(&params), "a=0&a=1&b=2");
    }

    #[test]
    fn base_string_is_deterministic() {
        let params = pairs(&[("b", "2"), ("a", "1")]);
        let first = base_string("POST", "https://example.com/x", &params).unwrap();
        let second = base_string("POST", "https://example.com/x", &params).unwrap();

        assert_eq!(first, "POST&https%3A%2F%2Fexample.com%2Fx&a%3D1%26b%3D2");
        assert_eq!(first, second);
    }

    #[test]
    fn signature_matches_published_vector() {
        let params = pairs(&[
            ("file", "vacation.jpg"),
            ("size", "original"),
            ("oauth_consumer_key", "dpf43f3p2l4k3l03"),
            ("oauth_token", "nnch734d00sl2jdk"),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", "1191242096"),
            ("oauth_nonce", "kllo9940pd9333jh"),
            ("oauth_version", "1.0"),
        ]);
        let base = base_string(
            "GET",
            "http://photos.example.net/photos?file=vacation.jpg&size=original",
            &params,
        )
        .unwrap();
        assert_eq!(
            base,
            "GET&http%3A%2F%2Fphotos.example.net%2Fphotos&file%3Dvacation.jpg%26\
             oauth_consumer_key%3Ddpf43f3p2l4k3l03%26oauth_nonce%3Dkllo9940pd9333jh%26\
             oauth_signature_method%3DHMAC-SHA1%26oauth_timestamp%3D1191242096%26\
             oauth_token%3Dnnch734d00sl2jdk%26oauth_version%3D1.0%26size%3Doriginal"
        );

        let key = signing_key("kd94hf93k423kf44", "pfkkdhi9sl3r4s00");
        assert_eq!(signature(&key, &base), "tR3+Ty81lMeYAr/Fid0kMTYa/WM=");
    }

    #[test]
    fn signed_request_carries_oauth_params() {
        let creds = Credentials {
            consumer_key: "ck".into(),
            consumer_secret: "cs".into(),
        };
        let stamp = RequestStamp {
            nonce: "12345678".into(),
            timestamp: 1_700_000_000,
        };

        let signed = sign_request(&creds, "POST", "https://example.com/x", pairs(&[("a", "1")]), None, "", &stamp)
            .unwrap();
        let again = sign_request(&creds, "POST", "https://example.com/x", pairs(&[("a", "1")]), None, "", &stamp)
            .unwrap();
        assert_eq!(signed, again);

        let names: Vec<&str> = signed.iter().map(|(k, _)| k.as_str()).collect();
        assert!(names.contains(&"oauth_consumer_key"));
        assert!(names.contains(&"oauth_signature"));
        assert!(!names.contains(&"oauth_token"));

        let with_token =
            sign_request(&creds, "POST", "https://example.com/x", pairs(&[]), Some("tok"), "sec", &stamp).unwrap();
        assert!(with_token.contains(&("oauth_token".to_string(), "tok".to_string())));
    }

    #[test]
    fn nonce_is_eight_digits() {
        let stamp = RequestStamp::generate();
        assert_eq!(stamp.nonce.len(), 8);
        assert!(stamp.nonce.chars().all(|c| c.is_ascii_digit()));
        assert!(stamp.timestamp > 0);
    }
}
