use std::collections::BTreeMap;

use serde::Serialize;

/// Data handed to the theme when rendering the welcome page.
///
/// Field names serialize in camelCase; templates refer to them that way
/// (`${adminUrl}`, `${properties.logo}`).
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    pub bootstrap: bool,
    pub admin_console_enabled: bool,
    pub properties: BTreeMap<String, String>,
    pub admin_url: String,
    pub base_url: String,
    pub product_name: String,
    pub resources_path: String,
    pub local_user: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_admin_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_user_creation_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_checker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}
