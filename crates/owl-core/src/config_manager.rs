//! 설정 파일 관리.
//!
//! 플랫폼별 설정 디렉토리에 JSON 파일로 설정을 저장/로드한다.
//! 신뢰 도메인 목록은 매 캡처 직전에 이 관리자에서 읽으므로
//! 재시작 없이 반영된다.

use crate::config::AppConfig;
use crate::error::CoreError;
use crate::models::exclusion::ExclusionList;
use crate::ports::capture::ExclusionListProvider;
use directories::ProjectDirs;
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// 설정 파일 이름
const CONFIG_FILE_NAME: &str = "config.json";

/// 이력 DB 파일 이름
const HISTORY_DB_NAME: &str = "history.db";

/// 설정 관리자
///
/// 설정 파일의 로드/저장 및 런타임 설정 변경을 관리한다.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
    config_path: PathBuf,
}

impl ConfigManager {
    /// 플랫폼 기본 경로로 설정 관리자 생성
    ///
    /// 설정 파일이 없으면 기본 설정을 생성하고 저장한다.
    pub fn new() -> Result<Self, CoreError> {
        let config_path = Self::config_dir()?.join(CONFIG_FILE_NAME);
        Self::with_path(config_path)
    }

    /// 지정된 경로로 설정 관리자 생성
    pub fn with_path(config_path: PathBuf) -> Result<Self, CoreError> {
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    CoreError::Config(format!(
                        "설정 디렉토리 생성 실패: {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
                info!("설정 디렉토리 생성: {}", parent.display());
            }
        }

        let config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            let default_config = AppConfig::default();
            Self::save_to_file(&config_path, &default_config)?;
            info!("기본 설정 파일 생성: {}", config_path.display());
            default_config
        };

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
        })
    }

    /// 현재 설정 반환 (복제본)
    pub fn get(&self) -> AppConfig {
        self.config.read().clone()
    }

    /// 설정 교체 및 파일 저장
    pub fn update(&self, new_config: AppConfig) -> Result<(), CoreError> {
        Self::save_to_file(&self.config_path, &new_config)?;
        *self.config.write() = new_config;
        debug!("설정 저장 완료: {}", self.config_path.display());
        Ok(())
    }

    /// 특정 필드만 업데이트
    pub fn update_with<F>(&self, updater: F) -> Result<AppConfig, CoreError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.get();
        updater(&mut config);
        self.update(config.clone())?;
        Ok(config)
    }

    /// 신뢰 도메인 추가. 이미 있으면 false
    pub fn trust_domain(&self, domain: &str) -> Result<bool, CoreError> {
        let mut list = self.exclusion_list();
        if !list.insert(domain) {
            return Ok(false);
        }
        self.update_with(|c| c.exclusion.trusted_domains = list.iter().map(String::from).collect())?;
        info!(domain, "신뢰 도메인 추가");
        Ok(true)
    }

    /// 신뢰 도메인 제거. 없으면 false
    pub fn untrust_domain(&self, domain: &str) -> Result<bool, CoreError> {
        let mut list = self.exclusion_list();
        if !list.remove(domain) {
            return Ok(false);
        }
        self.update_with(|c| c.exclusion.trusted_domains = list.iter().map(String::from).collect())?;
        info!(domain, "신뢰 도메인 제거");
        Ok(true)
    }

    /// 설정 파일 경로 반환
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// 설정 다시 로드
    pub fn reload(&self) -> Result<(), CoreError> {
        let config = Self::load_from_file(&self.config_path)?;
        *self.config.write() = config;
        info!("설정 다시 로드 완료");
        Ok(())
    }

    /// 이력 DB 경로. 설정값이 없으면 플랫폼 데이터 디렉토리
    pub fn history_db_path(&self) -> Result<PathBuf, CoreError> {
        match self.config.read().history.db_path.clone() {
            Some(path) => Ok(path),
            None => Ok(Self::data_dir()?.join(HISTORY_DB_NAME)),
        }
    }

    /// 플랫폼별 설정 디렉토리
    ///
    /// Linux `~/.config/owl`, macOS `~/Library/Application Support/app.owl.owl`,
    /// Windows `%APPDATA%\owl\owl\config`.
    pub fn config_dir() -> Result<PathBuf, CoreError> {
        Ok(Self::project_dirs()?.config_dir().to_path_buf())
    }

    /// 플랫폼별 데이터 디렉토리 (이력 DB)
    pub fn data_dir() -> Result<PathBuf, CoreError> {
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    fn project_dirs() -> Result<ProjectDirs, CoreError> {
        ProjectDirs::from("app", "owl", "owl")
            .ok_or_else(|| CoreError::Config("홈 디렉토리를 찾을 수 없습니다".to_string()))
    }

    fn load_from_file(path: &Path) -> Result<AppConfig, CoreError> {
        let content = fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("설정 파일 읽기 실패: {}: {}", path.display(), e))
        })?;

        let mut config: AppConfig = serde_json::from_str(&content).map_err(|e| {
            CoreError::Config(format!("설정 파일 파싱 실패: {}: {}", path.display(), e))
        })?;
        config.sampler = config.sampler.sanitized();

        debug!("설정 파일 로드 완료: {}", path.display());
        Ok(config)
    }

    fn save_to_file(path: &Path, config: &AppConfig) -> Result<(), CoreError> {
        let content = serde_json::to_string_pretty(config)
            .map_err(|e| CoreError::Config(format!("설정 직렬화 실패: {}", e)))?;

        fs::write(path, content).map_err(|e| {
            CoreError::Config(format!("설정 파일 저장 실패: {}: {}", path.display(), e))
        })?;

        Ok(())
    }
}

impl ExclusionListProvider for ConfigManager {
    fn exclusion_list(&self) -> ExclusionList {
        ExclusionList::from_domains(&self.config.read().exclusion.trusted_domains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn create_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let manager = ConfigManager::with_path(config_path.clone()).unwrap();
        assert!(config_path.exists());
        assert_eq!(manager.get().sampler.interval_ms, 2000);
    }

    #[test]
    fn update_and_persist_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let manager = ConfigManager::with_path(config_path.clone()).unwrap();
        manager
            .update_with(|c| {
                c.sampler.interval_ms = 750;
                c.history.max_entries = 5;
            })
            .unwrap();

        let reopened = ConfigManager::with_path(config_path).unwrap().get();
        assert_eq!(reopened.sampler.interval_ms, 750);
        assert_eq!(reopened.history.max_entries, 5);
    }

    #[test]
    fn reload_picks_up_external_edit() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let manager = ConfigManager::with_path(config_path.clone()).unwrap();

        let mut config = manager.get();
        config.sampler.change_threshold = 0.2;
        fs::write(&config_path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        manager.reload().unwrap();
        assert!((manager.get().sampler.change_threshold - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn malformed_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        fs::write(&config_path, "{ not json").unwrap();

        let err = ConfigManager::with_path(config_path).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn trusted_domains_feed_exclusion_list() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("config.json")).unwrap();

        assert!(manager.trust_domain("Example.COM").unwrap());
        assert!(!manager.trust_domain("example.com").unwrap());

        let list = manager.exclusion_list();
        assert!(list.matches("example.com"));
        assert!(list.matches("shop.example.com"));
        assert!(!list.matches("notexample.com"));

        assert!(manager.untrust_domain("example.com").unwrap());
        assert!(!manager.untrust_domain("example.com").unwrap());
        assert!(manager.exclusion_list().is_empty());
    }

    #[test]
    fn history_db_path_prefers_config() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("config.json")).unwrap();
        let db = temp_dir.path().join("custom.db");
        manager
            .update_with(|c| c.history.db_path = Some(db.clone()))
            .unwrap();
        assert_eq!(manager.history_db_path().unwrap(), db);
    }
}
