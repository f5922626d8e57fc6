use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors from checking an outbound URL against the [`UrlPolicy`].
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    #[error("Localhost not allowed")]
    Localhost,
}

/// Which hosts the pipeline may contact.
///
/// Feed URLs come from configuration, but article and image links come from
/// third-party feed content, so every outbound request goes through
/// [`UrlPolicy::validate`] first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UrlPolicy {
    /// Permit localhost and private/link-local addresses (local testing)
    pub allow_private_hosts: bool,
}

impl UrlPolicy {
    pub const PUBLIC_ONLY: Self = Self {
        allow_private_hosts: false,
    };

    /// Parse `url_str` and check it against the policy.
    ///
    /// Always rejects non-HTTP(S) schemes and host-less URLs. Unless
    /// `allow_private_hosts` is set, also rejects `localhost`, loopback and
    /// private ranges (RFC 1918, link-local, unique local IPv6).
    ///
    /// Hostnames are not resolved; only literal IPs are range-checked.
    pub fn validate(&self, url_str: &str) -> Result<Url, UrlValidationError> {
        let url = Url::parse(url_str.trim())?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
        }

        let host = url.host_str().ok_or(UrlValidationError::MissingHost)?;
        if self.allow_private_hosts {
            return Ok(url);
        }

        if host.eq_ignore_ascii_case("localhost") || host.ends_with(".localhost") {
            return Err(UrlValidationError::Localhost);
        }

        // IPv6 hosts come bracketed from host_str()
        let bare = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if let Ok(ip) = bare.parse::<IpAddr>() {
            if ip.is_loopback() {
                return Err(UrlValidationError::Localhost);
            }
            if is_private_ip(&ip) {
                return Err(UrlValidationError::PrivateIp(ip.to_string()));
            }
        }

        Ok(url)
    }
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if let Some(mapped) = ipv6.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(mapped));
            }
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            let segments = ipv6.segments();
            // fc00::/7
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // fe80::/10
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRICT: UrlPolicy = UrlPolicy::PUBLIC_ONLY;
    const LOCAL: UrlPolicy = UrlPolicy {
        allow_private_hosts: true,
    };

    #[test]
    fn test_public_article_links_pass() {
        let url = STRICT.validate(" https://news.example.com/2024/06/post?id=1 ").unwrap();
        assert_eq!(url.host_str(), Some("news.example.com"));
        assert!(STRICT.validate("http://blog.example.org:8080/a").is_ok());
    }

    #[test]
    fn test_schemes_rejected_under_every_policy() {
        for policy in [STRICT, LOCAL] {
            assert!(matches!(
                policy.validate("javascript:alert(1)"),
                Err(UrlValidationError::UnsupportedScheme(_))
            ));
            assert!(policy.validate("file:///etc/passwd").is_err());
            assert!(policy.validate("mailto:editor@example.com").is_err());
        }
    }

    #[test]
    fn test_loopback_and_localhost() {
        assert!(matches!(
            STRICT.validate("http://localhost:3000/feed"),
            Err(UrlValidationError::Localhost)
        ));
        assert!(STRICT.validate("http://api.localhost/feed").is_err());
        assert!(STRICT.validate("http://127.0.0.1/feed").is_err());
        assert!(STRICT.validate("http://[::1]/feed").is_err());
    }

    #[test]
    fn test_private_ranges() {
        for url in [
            "http://10.1.2.3/a",
            "http://172.16.0.1/a",
            "http://192.168.0.10:8080/a",
            "http://169.254.169.254/latest/meta-data",
            "http://0.0.0.0/a",
            "http://[fd00::1]/a",
            "http://[fe80::1]/a",
            "http://[::ffff:192.168.1.1]/a",
        ] {
            assert!(STRICT.validate(url).is_err(), "{url} should be rejected");
        }
    }

    #[test]
    fn test_allow_private_hosts_permits_local_servers() {
        assert!(LOCAL.validate("http://127.0.0.1:54321/feed.xml").is_ok());
        assert!(LOCAL.validate("http://localhost/feed").is_ok());
    }
}
