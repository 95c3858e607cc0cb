#[cfg(test)]
mod tests {
    use tracing::Span;

    use crate::http::header::{Hdr, HeaderCollection, ModHeaders};

    fn rules(set: &[(&str, &str)], drop: &[&str]) -> ModHeaders {
        ModHeaders::new(
            set.iter().map(|(n, v)| Hdr::new(*n, *v)).collect(),
            drop.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn headers(pairs: &[(&str, &str)]) -> HeaderCollection {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_has_any() {
        assert!(!ModHeaders::default().has_any());
        assert!(rules(&[("X-A", "1")], &[]).has_any());
        assert!(rules(&[], &["X-A"]).has_any());
        assert!(rules(&[("X-A", "1")], &["X-B"]).has_any());
    }

    #[test]
    fn test_drop_removes_all_values_case_insensitively() {
        let mut h = headers(&[("Set-Cookie", "a=1"), ("set-cookie", "b=2"), ("Server", "origin")]);
        rules(&[], &["SET-COOKIE"]).apply(&mut h, &Span::none());

        assert!(!h.contains("set-cookie"));
        assert_eq!(h.get("server"), Some("origin"));
    }

    #[test]
    fn test_drop_absent_name_is_silent() {
        let mut h = headers(&[("Server", "origin")]);
        rules(&[], &["X-Missing"]).apply(&mut h, &Span::none());
        assert_eq!(h, headers(&[("Server", "origin")]));
    }

    #[test]
    fn test_set_replaces_rather_than_appends() {
        let mut h = headers(&[("Cache-Control", "no-cache"), ("cache-control", "private")]);
        rules(&[("cache-control", "max-age=300")], &[]).apply(&mut h, &Span::none());

        assert_eq!(h.get_all("Cache-Control"), &["max-age=300"]);
    }

    #[test]
    fn test_set_wins_over_drop_for_same_name() {
        let mut h = headers(&[("X-Cache", "MISS"), ("Age", "3")]);
        rules(&[("X-Cache", "HIT")], &["x-cache"]).apply(&mut h, &Span::none());

        assert_eq!(h.get_all("X-Cache"), &["HIT"]);
        assert_eq!(h.get("age"), Some("3"));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let r = rules(&[("X-Cache", "HIT"), ("Via", "edge")], &["Server", "Via"]);
        let mut once = headers(&[("Server", "origin"), ("Via", "1.1 a"), ("Via", "1.1 b"), ("Age", "1")]);
        r.apply(&mut once, &Span::none());
        let mut twice = once.clone();
        r.apply(&mut twice, &Span::none());

        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_collection_without_sets_stays_empty() {
        let mut h = HeaderCollection::new();
        rules(&[], &["Content-Type"]).apply(&mut h, &Span::none());
        assert!(h.is_empty());
    }

    #[test]
    fn test_empty_collection_gets_exactly_the_set_entries() {
        let mut h = HeaderCollection::new();
        rules(&[("X-Cache", "HIT"), ("Via", "edge")], &["X-Cache"]).apply(&mut h, &Span::none());

        assert_eq!(h.len(), 2);
        assert_eq!(h.get_all("X-Cache"), &["HIT"]);
        assert_eq!(h.get_all("Via"), &["edge"]);
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let yaml = r#"
set:
  - name: X-Cache
    value: HIT
drop:
  - Content-Type
"#;
        let r: ModHeaders = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(r, rules(&[("X-Cache", "HIT")], &["Content-Type"]));

        let empty: ModHeaders = serde_yaml::from_str("{}").unwrap();
        assert!(!empty.has_any());
    }
}
