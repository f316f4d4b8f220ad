//! 제외 목록(신뢰 도메인) 모델.
//!
//! 목록에 있는 도메인 또는 그 하위 도메인의 서피스는 캡처하지 않는다.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 신뢰 도메인 집합
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionList {
    domains: BTreeSet<String>,
}

/// 도메인 항목 정규화: 소문자, 앞뒤 공백/끝 점 제거, `*.`/`.` 접두어 제거
pub fn normalize_domain(domain: &str) -> String {
    let trimmed = domain.trim().trim_end_matches('.').to_lowercase();
    let trimmed = trimmed.strip_prefix("*.").unwrap_or(&trimmed);
    trimmed.trim_start_matches('.').to_string()
}

impl ExclusionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// 도메인 목록으로 생성 (빈 항목 무시)
    pub fn from_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::new();
        for d in domains {
            list.insert(d.as_ref());
        }
        list
    }

    /// 도메인 추가. 새로 추가되면 true
    pub fn insert(&mut self, domain: &str) -> bool {
        let normalized = normalize_domain(domain);
        if normalized.is_empty() {
            return false;
        }
        self.domains.insert(normalized)
    }

    /// 도메인 제거. 존재했으면 true
    pub fn remove(&mut self, domain: &str) -> bool {
        self.domains.remove(&normalize_domain(domain))
    }

    /// 호스트가 목록의 도메인과 정확히 일치하거나 그 하위 도메인이면 true
    pub fn matches(&self, host: &str) -> bool {
        let host = normalize_domain(host);
        if host.is_empty() {
            return false;
        }
        self.domains.iter().any(|domain| {
            host == *domain
                || (host.len() > domain.len()
                    && host.ends_with(domain.as_str())
                    && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
        })
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_subdomain_match() {
        let list = ExclusionList::from_domains(["khanacademy.org"]);
        assert!(list.matches("khanacademy.org"));
        assert!(list.matches("www.khanacademy.org"));
        assert!(list.matches("a.b.khanacademy.org"));
    }

    #[test]
    fn suffix_without_dot_boundary_does_not_match() {
        let list = ExclusionList::from_domains(["example.com"]);
        assert!(!list.matches("badexample.com"));
        assert!(!list.matches("example.com.evil.net"));
        assert!(!list.matches("com"));
    }

    #[test]
    fn case_and_trailing_dot_insensitive() {
        let list = ExclusionList::from_domains(["Example.COM."]);
        assert!(list.matches("WWW.example.com"));
        assert!(list.matches("example.com."));
    }

    #[test]
    fn wildcard_prefix_is_stripped() {
        let list = ExclusionList::from_domains(["*.wikipedia.org", ".mozilla.org"]);
        assert!(list.matches("en.wikipedia.org"));
        assert!(list.matches("wikipedia.org"));
        assert!(list.matches("developer.mozilla.org"));
    }

    #[test]
    fn insert_remove_and_empty_entries() {
        let mut list = ExclusionList::new();
        assert!(list.insert("school.edu"));
        assert!(!list.insert("SCHOOL.edu"));
        assert!(!list.insert("   "));
        assert_eq!(list.len(), 1);
        assert!(list.remove("school.edu"));
        assert!(list.is_empty());
        assert!(!list.matches(""));
    }

    #[test]
    fn serde_as_plain_array() {
        let list = ExclusionList::from_domains(["b.org", "a.org"]);
        let json = serde_json::to_string(&list).unwrap();
        assert_eq!(json, r#"["a.org","b.org"]"#);
        let back: ExclusionList = serde_json::from_str(&json).unwrap();
        assert_eq!(back, list);
    }
}
