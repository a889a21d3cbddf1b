/// Last two dot-separated labels of `host`. Hosts with fewer labels are
/// returned unchanged.
///
/// ```
/// use inapp_browser::navigation::base_domain;
/// assert_eq!(base_domain("m.shop.example.com"), "example.com");
/// assert_eq!(base_domain("localhost"), "localhost");
/// ```
pub fn base_domain(host: &str) -> &str {
    let host = host.trim_end_matches('.');
    match host.rmatch_indices('.').nth(1) {
        Some((idx, _)) => &host[idx + 1..],
        None => host,
    }
}

/// Hosts are the same site when equal or when their base domains match.
pub fn same_site(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || base_domain(a).eq_ignore_ascii_case(base_domain(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_domain_keeps_last_two_labels() {
        assert_eq!(base_domain("a.b.c.example.com"), "example.com");
        assert_eq!(base_domain("example.com"), "example.com");
        assert_eq!(base_domain("www.example.com."), "example.com");
        assert_eq!(base_domain(""), "");
    }

    #[test]
    fn same_site_matches_subdomains() {
        assert!(same_site("m.shop.com", "checkout.shop.com"));
        assert!(same_site("SHOP.com", "shop.com"));
        assert!(!same_site("shop.com", "other.com"));
    }
}
