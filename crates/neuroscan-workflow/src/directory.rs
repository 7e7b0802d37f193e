//! 患者目录
//!
//! 将账户解析到对应的患者病历记录。解析分两步：
//! 先按账户上的显式关联，再按邮箱回退。

use std::sync::Arc;

use neuroscan_core::{Account, Patient};
use neuroscan_store::PatientStore;

/// 账户到病历的解析器
#[derive(Clone)]
pub struct PatientDirectory {
    patients: Arc<dyn PatientStore>,
}

impl PatientDirectory {
    pub fn new(patients: Arc<dyn PatientStore>) -> Self {
        Self { patients }
    }

    /// 按账户的显式patient_id关联解析
    pub async fn resolve_by_link(&self, account: &Account) -> Option<Patient> {
        let patient_id = account.patient_id.as_deref()?;
        self.patients.find_by_id(patient_id).await
    }

    /// 按账户邮箱匹配解析
    ///
    /// 历史遗留的兼容行为：早期患者账户没有显式关联。
    /// 邮箱被复用或病历先于账户存在时可能匹配到错误的记录，
    /// 在产品侧确认前保持原样。
    pub async fn resolve_by_email(&self, account: &Account) -> Option<Patient> {
        self.patients.find_by_email(&account.email).await
    }

    /// 完整解析：显式关联优先，邮箱回退兜底
    pub async fn resolve(&self, account: &Account) -> Option<Patient> {
        if let Some(patient) = self.resolve_by_link(account).await {
            return Some(patient);
        }
        self.resolve_by_email(account).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use neuroscan_core::{Gender, Role};
    use neuroscan_store::Datastore;

    fn patient(id: &str, email: &str) -> Patient {
        Patient {
            id: id.to_string(),
            patient_code: "P-2025-0001".to_string(),
            first_name: "John".to_string(),
            last_name: "Smith".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1965, 3, 15).unwrap(),
            gender: Gender::Male,
            contact_number: None,
            email: email.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn account(email: &str, patient_id: Option<&str>) -> Account {
        Account {
            id: "usr_test".to_string(),
            email: email.to_string(),
            password_hash: String::new(),
            first_name: "John".to_string(),
            last_name: "Smith".to_string(),
            role: Role::Patient,
            department: None,
            specialization: None,
            patient_id: patient_id.map(|s| s.to_string()),
            created_at: Utc::now(),
            last_login: None,
        }
    }

    #[tokio::test]
    async fn test_resolve_by_link_wins() {
        let store = Datastore::in_memory();
        // 同一邮箱存在另一条病历，显式关联仍然优先
        store
            .patients
            .insert(patient("pat_linked", "other@email.com"))
            .await
            .unwrap();
        store
            .patients
            .insert(patient("pat_by_mail", "john@email.com"))
            .await
            .unwrap();

        let directory = PatientDirectory::new(store.patients.clone());
        let resolved = directory
            .resolve(&account("john@email.com", Some("pat_linked")))
            .await
            .unwrap();
        assert_eq!(resolved.id, "pat_linked");
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_email() {
        let store = Datastore::in_memory();
        store
            .patients
            .insert(patient("pat_by_mail", "john@email.com"))
            .await
            .unwrap();

        let directory = PatientDirectory::new(store.patients.clone());

        // 无显式关联时回退到邮箱匹配
        let resolved = directory
            .resolve(&account("john@email.com", None))
            .await
            .unwrap();
        assert_eq!(resolved.id, "pat_by_mail");

        // 关联指向不存在的病历时同样回退
        let resolved = directory
            .resolve(&account("john@email.com", Some("pat_gone")))
            .await
            .unwrap();
        assert_eq!(resolved.id, "pat_by_mail");
    }

    #[tokio::test]
    async fn test_resolve_none() {
        let store = Datastore::in_memory();
        let directory = PatientDirectory::new(store.patients.clone());

        assert!(directory
            .resolve(&account("nobody@email.com", None))
            .await
            .is_none());
    }
}
