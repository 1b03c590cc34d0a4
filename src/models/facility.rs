use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Facility {
    pub id: Uuid,
    pub name: String,
    pub location: String,
    pub department: String,
    pub resources: Option<String>,
    pub resource_quantity: u32,
    pub resource_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthEducationResource {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub link: Option<String>,
}
