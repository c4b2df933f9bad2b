// Form template, instance and storage endpoints.
//
// Payloads are passed through as JSON values; the gateway only cares about
// their status codes.

use serde_json::Value;

use crate::client::FormSyncClient;
use crate::gateway::{ApiRequest, FilePart, Result};

impl FormSyncClient {
    pub async fn form_templates(&self) -> Result<Vec<Value>> {
        self.gateway().get_json("/form-templates").await
    }

    pub async fn form_template(&self, template_id: u64) -> Result<Value> {
        self.gateway()
            .get_json(&format!("/form-templates/{}", template_id))
            .await
    }

    pub async fn create_form_template(&self, template: &Value) -> Result<Value> {
        self.gateway().post_json("/form-templates", template).await
    }

    /// Replace the field structure of a template
    pub async fn update_template_structure(&self, template_id: u64, fields: &Value) -> Result<Value> {
        let body = serde_json::json!({ "structureDefinition": fields });
        self.gateway()
            .patch_json(&format!("/form-templates/{}/structure", template_id), &body)
            .await
    }

    pub async fn my_form_instances(&self) -> Result<Vec<Value>> {
        self.gateway().get_json("/form-instances/my").await
    }

    pub async fn form_instance(&self, instance_id: u64) -> Result<Value> {
        self.gateway()
            .get_json(&format!("/form-instances/{}", instance_id))
            .await
    }

    pub async fn create_form_instance(&self, instance: &Value) -> Result<Value> {
        self.gateway().post_json("/form-instances", instance).await
    }

    pub async fn update_form_instance(&self, instance_id: u64, changes: &Value) -> Result<Value> {
        self.gateway()
            .patch_json(&format!("/form-instances/{}", instance_id), changes)
            .await
    }

    /// Upload one file to local storage.
    ///
    /// Returns the stored file description (`storageKey`, `filename`,
    /// `mimeType`, `size`).
    pub async fn upload_file(&self, file: FilePart) -> Result<Value> {
        let request = ApiRequest::post("/storage/upload-local").file(file);
        self.gateway().send_json(request).await
    }

    /// Download a stored file by id, returning the raw bytes
    pub async fn download_file(&self, file_id: u64) -> Result<Vec<u8>> {
        let request = ApiRequest::get(format!("/storage/download-local/file/{}", file_id));
        let response = self.gateway().send(request).await?;
        let bytes = crate::gateway::Gateway::check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
