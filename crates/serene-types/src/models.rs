use serde::{Deserialize, Serialize};

/// Public view of a registered user. The password hash lives only in the
/// database row type and has no field here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub phone: String,
}
