//! HTTP Digest authentication (RFC 2617, MD5) as used by AMT firmware.

use std::collections::HashMap;

/// A parsed `WWW-Authenticate: Digest ...` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    /// Protection realm
    pub realm: String,
    /// Server nonce
    pub nonce: String,
    /// Opaque value echoed back to the server
    pub opaque: Option<String>,
    /// Algorithm as the server spelled it; always MD5 when present
    pub algorithm: Option<String>,
    /// Whether the server offered `qop=auth`
    pub qop_auth: bool,
}

impl DigestChallenge {
    /// Parse a `WWW-Authenticate` header value. Returns `None` for non-digest
    /// challenges, when `realm`/`nonce` are missing, or when the algorithm is
    /// anything but MD5.
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = header.split_once(char::is_whitespace)?;
        if !scheme.eq_ignore_ascii_case("digest") {
            return None;
        }

        let params = parse_params(params);
        let algorithm = params.get("algorithm").cloned();
        if algorithm
            .as_deref()
            .is_some_and(|name| !name.eq_ignore_ascii_case("md5"))
        {
            return None;
        }

        let qop_auth = params
            .get("qop")
            .map(|qop| qop.split(',').any(|q| q.trim().eq_ignore_ascii_case("auth")))
            .unwrap_or(false);

        Some(Self {
            realm: params.get("realm")?.clone(),
            nonce: params.get("nonce")?.clone(),
            opaque: params.get("opaque").cloned(),
            algorithm,
            qop_auth,
        })
    }

    /// Compute the `Authorization` header value for one request.
    pub fn authorization(
        &self,
        username: &str,
        password: &str,
        method: &str,
        uri: &str,
        nonce_count: u32,
        cnonce: &str,
    ) -> String {
        let ha1 = md5_hex(&format!("{}:{}:{}", username, self.realm, password));
        let ha2 = md5_hex(&format!("{}:{}", method, uri));
        let nc = format!("{:08x}", nonce_count);

        let response = if self.qop_auth {
            md5_hex(&format!(
                "{}:{}:{}:{}:auth:{}",
                ha1, self.nonce, nc, cnonce, ha2
            ))
        } else {
            md5_hex(&format!("{}:{}:{}", ha1, self.nonce, ha2))
        };

        let mut header = format!(
            r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", response="{}""#,
            username, self.realm, self.nonce, uri, response
        );
        if self.qop_auth {
            header.push_str(&format!(r#", qop=auth, nc={}, cnonce="{}""#, nc, cnonce));
        }
        if let Some(opaque) = &self.opaque {
            header.push_str(&format!(r#", opaque="{}""#, opaque));
        }
        if let Some(algorithm) = &self.algorithm {
            header.push_str(&format!(", algorithm={}", algorithm));
        }
        header
    }
}

/// Whether a `WWW-Authenticate` header offers Basic authentication.
pub fn is_basic_challenge(header: &str) -> bool {
    header
        .trim()
        .split(char::is_whitespace)
        .next()
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("basic"))
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// Split `key=value, key="quoted, value"` pairs.
fn parse_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut rest = input.trim();

    while !rest.is_empty() {
        let Some((key, after)) = rest.split_once('=') else {
            break;
        };
        let key = key.trim().trim_start_matches(',').trim().to_ascii_lowercase();
        let after = after.trim_start();

        let (value, remaining) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            }
        } else {
            match after.find(',') {
                Some(end) => (after[..end].trim(), &after[end..]),
                None => (after.trim(), ""),
            }
        };

        params.insert(key, value.to_string());
        rest = remaining.trim_start().trim_start_matches(',').trim_start();
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amt_challenge() {
        let header = r#"Digest realm="Digest:A3829B3E", nonce="8f0ZN4kIAAAAAAAA", stale="false", qop="auth""#;
        let challenge = DigestChallenge::parse(header).unwrap();

        assert_eq!(challenge.realm, "Digest:A3829B3E");
        assert_eq!(challenge.nonce, "8f0ZN4kIAAAAAAAA");
        assert!(challenge.qop_auth);
        assert!(challenge.opaque.is_none());
    }

    #[test]
    fn test_parse_algorithm_support() {
        let md5 =
            DigestChallenge::parse(r#"Digest realm="r", nonce="n", algorithm=md5"#).unwrap();
        assert_eq!(md5.algorithm.as_deref(), Some("md5"));
        assert!(md5
            .authorization("u", "p", "POST", "/wsman", 1, "c")
            .ends_with(", algorithm=md5"));

        let sess = r#"Digest realm="r", nonce="n", qop="auth", algorithm=MD5-sess"#;
        assert!(DigestChallenge::parse(sess).is_none());
        let sha = r#"Digest realm="r", nonce="n", algorithm="SHA-256""#;
        assert!(DigestChallenge::parse(sha).is_none());
    }

    #[test]
    fn test_parse_rejects_other_schemes() {
        assert!(DigestChallenge::parse(r#"Basic realm="x""#).is_none());
        assert!(DigestChallenge::parse(r#"Digest realm="x""#).is_none());
        assert!(is_basic_challenge(r#"Basic realm="x""#));
        assert!(!is_basic_challenge(r#"Digest realm="x""#));
    }

    #[test]
    fn test_quoted_commas() {
        let header = r#"Digest realm="a, b", nonce=abc, qop="auth,auth-int", opaque="xyz""#;
        let challenge = DigestChallenge::parse(header).unwrap();

        assert_eq!(challenge.realm, "a, b");
        assert_eq!(challenge.nonce, "abc");
        assert_eq!(challenge.opaque.as_deref(), Some("xyz"));
        assert!(challenge.qop_auth);
    }

    #[test]
    fn test_rfc2617_example_response() {
        // Worked example from RFC 2617 section 3.5.
        let challenge = DigestChallenge {
            realm: "testrealm@host.com".to_string(),
            nonce: "dcd98b7102dd2f0e8b11d0f600bfb0c093".to_string(),
            opaque: Some("5ccc069c403ebaf9f0171e9517f40e41".to_string()),
            algorithm: None,
            qop_auth: true,
        };

        let header = challenge.authorization(
            "Mufasa",
            "Circle Of Life",
            "GET",
            "/dir/index.html",
            1,
            "0a4f113b",
        );

        assert!(header.contains(r#"response="6629fae49393a05397450978507c4ef1""#));
        assert!(header.contains("nc=00000001"));
        assert!(header.contains(r#"opaque="5ccc069c403ebaf9f0171e9517f40e41""#));
    }
}
