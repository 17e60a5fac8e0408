use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::profiles;

/// Learner profile owned by Supabase auth. Read-only for billing.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable, PartialEq, Eq)]
#[diesel(table_name = profiles)]
pub struct ProfileEntity {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
}
