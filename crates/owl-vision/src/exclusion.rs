//! 고정 제외 목록 제공자.
//!
//! 설정 파일 없이 실행하는 경우(테스트, 오프라인 실행)에 사용한다.
//! 일반 실행에서는 `ConfigManager`가 같은 포트를 구현한다.

use owl_core::models::exclusion::ExclusionList;
use owl_core::ports::capture::ExclusionListProvider;
use parking_lot::RwLock;

pub use owl_core::models::exclusion::normalize_domain;

/// 메모리 내 제외 목록
#[derive(Debug, Default)]
pub struct StaticExclusionList {
    list: RwLock<ExclusionList>,
}

impl StaticExclusionList {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            list: RwLock::new(ExclusionList::from_domains(domains)),
        }
    }

    /// 도메인 추가 (다음 캡처부터 반영)
    pub fn trust(&self, domain: &str) -> bool {
        self.list.write().insert(domain)
    }

    pub fn untrust(&self, domain: &str) -> bool {
        self.list.write().remove(domain)
    }
}

impl ExclusionListProvider for StaticExclusionList {
    fn exclusion_list(&self) -> ExclusionList {
        self.list.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_exact_and_subdomain() {
        let provider = StaticExclusionList::new(["example.com"]);
        let list = provider.exclusion_list();
        assert!(list.matches("example.com"));
        assert!(list.matches("a.b.example.com"));
        assert!(!list.matches("badexample.com"));
    }

    #[test]
    fn edits_visible_on_next_lookup() {
        let provider = StaticExclusionList::default();
        assert!(!provider.exclusion_list().matches("school.edu"));

        assert!(provider.trust("*.School.edu."));
        assert!(provider.exclusion_list().matches("www.school.edu"));

        assert!(provider.untrust("school.edu"));
        assert!(provider.exclusion_list().is_empty());
    }

    #[test]
    fn normalize_reexport() {
        assert_eq!(normalize_domain(" .Example.COM. "), "example.com");
    }
}
