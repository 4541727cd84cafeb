use mixdesk_types::api::{CreateInputRequest, InputUpdate};
use mixdesk_types::{EntityId, Input};
use tracing::info;

use super::*;

impl ApiClient {
    /// List all opened inputs.
    pub async fn list_inputs(&self) -> ApiResult<Vec<Input>> {
        let inputs: Vec<Input> = self.get_json("/audio/input", "listing inputs").await?;
        info!("Loaded {} inputs", inputs.len());
        Ok(inputs)
    }

    /// Capture devices the backend could open as inputs.
    pub async fn list_input_devices(&self) -> ApiResult<Vec<String>> {
        self.get_json("/audio/input/devices", "listing input devices")
            .await
    }

    /// Open an input. The backend answers with the created inputs.
    pub async fn create_input(&self, request: &CreateInputRequest) -> ApiResult<Vec<Input>> {
        info!("Creating input: {}", request.display_name);
        let created: Vec<Input> = self
            .post_json("/audio/input", request, "creating input")
            .await?;
        info!("Created {} input(s)", created.len());
        Ok(created)
    }

    pub async fn update_input(&self, id: &EntityId, update: &InputUpdate) -> ApiResult<()> {
        self.put_json(&format!("/audio/input/{}", id), update, "updating input")
            .await
    }

    pub async fn delete_input(&self, id: &EntityId) -> ApiResult<()> {
        info!("Deleting input: {}", id);
        self.delete_path(&format!("/audio/input/{}", id), "deleting input")
            .await
    }
}
