use mixdesk_types::api::{CreateOutputRequest, OutputUpdate};
use mixdesk_types::{EntityId, Output};
use tracing::info;

use super::*;

impl ApiClient {
    /// List all outputs.
    pub async fn list_outputs(&self) -> ApiResult<Vec<Output>> {
        let outputs: Vec<Output> = self.get_json("/audio/output", "listing outputs").await?;
        info!("Loaded {} outputs", outputs.len());
        Ok(outputs)
    }

    /// Playback devices the backend could open as outputs.
    pub async fn list_output_devices(&self) -> ApiResult<Vec<String>> {
        self.get_json("/audio/output/devices", "listing output devices")
            .await
    }

    /// Create an output. The backend answers with the created outputs.
    pub async fn create_output(&self, request: &CreateOutputRequest) -> ApiResult<Vec<Output>> {
        info!(
            "Creating {} output: {}",
            request.kind.title(),
            request.display_name
        );
        let created: Vec<Output> = self
            .post_json("/audio/output", request, "creating output")
            .await?;
        info!("Created {} output(s)", created.len());
        Ok(created)
    }

    /// Rename an output or change its routed source.
    pub async fn update_output(&self, id: &EntityId, update: &OutputUpdate) -> ApiResult<()> {
        self.put_json(&format!("/audio/output/{}", id), update, "updating output")
            .await
    }

    pub async fn delete_output(&self, id: &EntityId) -> ApiResult<()> {
        info!("Deleting output: {}", id);
        self.delete_path(&format!("/audio/output/{}", id), "deleting output")
            .await
    }
}
