//! Request policy for one entity: identifier disambiguation, pre-checks, and the single
//! boundary where store failures become HTTP errors.

mod code;
mod identifier;
mod validation;

pub use code::CodeGenerator;
pub use identifier::{is_numeric, parse_id, Identifier};
pub use validation::BodyValidator;

use crate::config::EntityName;
use crate::error::{AppError, StoreError};
use crate::repository::Repository;
use crate::store::{record_id, Record, CODE_FIELD};
use serde_json::Value;
use std::sync::Arc;

pub struct EntityController {
    repository: Arc<dyn Repository>,
    codes: CodeGenerator,
}

impl EntityController {
    pub fn new(repository: Arc<dyn Repository>, codes: CodeGenerator) -> Self {
        EntityController { repository, codes }
    }

    pub fn entity(&self) -> &EntityName {
        self.repository.entity()
    }

    fn storage(&self, operation: &'static str) -> impl FnOnce(StoreError) -> AppError + '_ {
        move |e| AppError::storage(self.entity().as_str(), operation, e)
    }

    fn not_found_id(&self, id: i64) -> AppError {
        AppError::NotFound(format!("{} {} not found", self.entity(), id))
    }

    pub async fn list_all(&self) -> Result<Vec<Record>, AppError> {
        self.repository
            .find_all()
            .await
            .map_err(self.storage("find_all"))
    }

    /// Single entry point for `GET /:token`. Exactly one lookup runs, picked by the token's shape.
    pub async fn get_by_token(&self, token: &str) -> Result<Record, AppError> {
        match Identifier::classify(token)? {
            Identifier::Id(id) => {
                tracing::debug!(entity = %self.entity(), id, "lookup by id");
                self.repository
                    .find_by_id(id)
                    .await
                    .map_err(self.storage("find_by_id"))?
                    .ok_or_else(|| self.not_found_id(id))
            }
            Identifier::Code(code) => {
                tracing::debug!(entity = %self.entity(), code = %code, "lookup by code");
                self.repository
                    .find_by_code(&code)
                    .await
                    .map_err(self.storage("find_by_code"))?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("{} with code '{}' not found", self.entity(), code))
                    })
            }
        }
    }

    pub async fn list_by_field(&self, field: &str, value: &str) -> Result<Vec<Record>, AppError> {
        self.repository
            .find_by_field(field, value)
            .await
            .map_err(self.storage("find_by_field"))
    }

    pub async fn create(&self, body: Value) -> Result<Record, AppError> {
        let mut record = BodyValidator::new_record(body)?;
        match BodyValidator::code(&record)? {
            Some(code) => {
                let existing = self
                    .repository
                    .find_by_code(&code)
                    .await
                    .map_err(self.storage("find_by_code"))?;
                if existing.is_some() {
                    return Err(AppError::Validation(format!("code '{}' already registered", code)));
                }
            }
            None => {
                record.remove(CODE_FIELD);
                if self.repository.has_code().map_err(self.storage("create"))? {
                    record.insert(CODE_FIELD.to_string(), Value::String(self.codes.generate()));
                }
            }
        }
        let created = self
            .repository
            .create(record)
            .await
            .map_err(self.storage("create"))?;
        tracing::info!(entity = %self.entity(), id = ?record_id(&created), "record created");
        Ok(created)
    }

    /// `PUT` and `PATCH` both merge the body into the stored record.
    pub async fn update(&self, token: &str, body: Value) -> Result<Record, AppError> {
        let id = parse_id(token)?;
        let mut patch = BodyValidator::patch(body, id)?;

        let existing = self
            .repository
            .find_by_id(id)
            .await
            .map_err(self.storage("find_by_id"))?;
        if existing.is_none() {
            return Err(self.not_found_id(id));
        }

        match BodyValidator::code(&patch)? {
            Some(code) => {
                let owner = self
                    .repository
                    .find_by_code(&code)
                    .await
                    .map_err(self.storage("find_by_code"))?;
                if owner.map(|r| record_id(&r) != Some(id)).unwrap_or(false) {
                    return Err(AppError::Validation(format!("code '{}' already registered", code)));
                }
            }
            None => {
                patch.remove(CODE_FIELD);
            }
        }

        let updated = match self.repository.update(id, patch).await {
            Ok(r) => r,
            Err(StoreError::NotFound { .. }) => return Err(self.not_found_id(id)),
            Err(e) => return Err(AppError::storage(self.entity().as_str(), "update", e)),
        };
        tracing::info!(entity = %self.entity(), id, "record updated");
        Ok(updated)
    }

    pub async fn delete(&self, token: &str) -> Result<(), AppError> {
        let id = parse_id(token)?;
        match self.repository.delete(id).await {
            Ok(()) => {
                tracing::info!(entity = %self.entity(), id, "record deleted");
                Ok(())
            }
            Err(StoreError::NotFound { .. }) => Err(self.not_found_id(id)),
            Err(e) => Err(AppError::storage(self.entity().as_str(), "delete", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validate_entity_name;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records which lookups ran; every record it returns has id 1 and code "AB3x9".
    struct RecordingRepository {
        entity: EntityName,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingRepository {
        fn new() -> Self {
            RecordingRepository {
                entity: validate_entity_name("product").unwrap(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn stored() -> Record {
        let mut r = Record::new();
        r.insert("id".into(), Value::from(1));
        r.insert("code".into(), Value::from("AB3x9"));
        r
    }

    #[async_trait]
    impl Repository for RecordingRepository {
        fn entity(&self) -> &EntityName {
            &self.entity
        }

        async fn find_all(&self) -> Result<Vec<Record>, StoreError> {
            self.record("find_all".into());
            Ok(vec![stored()])
        }

        async fn find_by_field(&self, field: &str, value: &str) -> Result<Vec<Record>, StoreError> {
            self.record(format!("find_by_field:{field}={value}"));
            Ok(Vec::new())
        }

        async fn find_by_code(&self, code: &str) -> Result<Option<Record>, StoreError> {
            self.record(format!("find_by_code:{code}"));
            Ok((code == "AB3x9").then(stored))
        }

        async fn find_by_id(&self, id: i64) -> Result<Option<Record>, StoreError> {
            self.record(format!("find_by_id:{id}"));
            Ok((id == 1).then(stored))
        }

        async fn create(&self, data: Record) -> Result<Record, StoreError> {
            self.record("create".into());
            Ok(data)
        }

        async fn update(&self, id: i64, _patch: Record) -> Result<Record, StoreError> {
            self.record(format!("update:{id}"));
            Ok(stored())
        }

        async fn delete(&self, id: i64) -> Result<(), StoreError> {
            self.record(format!("delete:{id}"));
            Err(StoreError::NotFound {
                entity: "product".into(),
                id,
            })
        }

        fn has_code(&self) -> Result<bool, StoreError> {
            Ok(true)
        }
    }

    fn controller() -> (Arc<RecordingRepository>, EntityController) {
        let recorder = Arc::new(RecordingRepository::new());
        let controller = EntityController::new(recorder.clone(), CodeGenerator::default());
        (recorder, controller)
    }

    #[tokio::test]
    async fn numeric_tokens_only_hit_the_id_lookup() {
        let (recorder, controller) = controller();
        controller.get_by_token("1").await.unwrap();
        assert_eq!(recorder.calls(), vec!["find_by_id:1"]);
    }

    #[tokio::test]
    async fn other_tokens_only_hit_the_code_lookup() {
        let (recorder, controller) = controller();
        controller.get_by_token("AB3x9").await.unwrap();
        assert!(matches!(
            controller.get_by_token("ZZZZZ").await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(recorder.calls(), vec!["find_by_code:AB3x9", "find_by_code:ZZZZZ"]);
    }

    #[tokio::test]
    async fn malformed_tokens_never_reach_the_repository() {
        let (recorder, controller) = controller();
        assert!(matches!(
            controller.get_by_token("0").await,
            Err(AppError::Validation(_))
        ));
        assert!(recorder.calls().is_empty());
    }

    #[tokio::test]
    async fn create_generates_a_code_when_none_is_given() {
        let (recorder, controller) = controller();
        let created = controller
            .create(serde_json::json!({ "name": "X", "price": 10 }))
            .await
            .unwrap();
        let code = created["code"].as_str().unwrap();
        assert_eq!(code.len(), 5);
        assert_eq!(recorder.calls(), vec!["create"]);
    }

    #[tokio::test]
    async fn create_rejects_taken_codes_before_inserting() {
        let (recorder, controller) = controller();
        let err = controller
            .create(serde_json::json!({ "name": "X", "code": "AB3x9" }))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(recorder.calls(), vec!["find_by_code:AB3x9"]);
    }

    #[tokio::test]
    async fn update_of_missing_record_skips_the_write() {
        let (recorder, controller) = controller();
        let err = controller
            .update("999", serde_json::json!({ "name": "Y" }))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(recorder.calls(), vec!["find_by_id:999"]);
    }

    #[tokio::test]
    async fn update_of_missing_record_is_not_found_even_with_a_taken_code() {
        let (recorder, controller) = controller();
        let err = controller
            .update("999", serde_json::json!({ "code": "AB3x9" }))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(recorder.calls(), vec!["find_by_id:999"]);
    }

    #[tokio::test]
    async fn update_checks_code_ownership_after_existence() {
        let (recorder, controller) = controller();
        controller
            .update("1", serde_json::json!({ "code": "AB3x9" }))
            .await
            .unwrap();
        assert_eq!(
            recorder.calls(),
            vec!["find_by_id:1", "find_by_code:AB3x9", "update:1"]
        );
    }

    #[tokio::test]
    async fn delete_translates_missing_rows() {
        let (_, controller) = controller();
        assert!(matches!(
            controller.delete("5").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            controller.delete("AB3x9").await,
            Err(AppError::Validation(_))
        ));
    }
}
