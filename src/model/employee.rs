use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Employee identity as exposed by the directory. Payroll only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_code": "EMP-001",
        "first_name": "John",
        "last_name": "Doe",
        "department": "Engineering",
        "designation": "Software Engineer",
        "hire_date": "2024-01-01",
        "status": "active"
    })
)]
pub struct EmployeeIdentity {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "EMP-001")]
    pub employee_code: String,

    #[schema(example = "John")]
    pub first_name: String,

    #[schema(example = "Doe")]
    pub last_name: String,

    #[schema(example = "Engineering", nullable = true)]
    pub department: Option<String>,

    #[schema(example = "Software Engineer", nullable = true)]
    pub designation: Option<String>,

    #[schema(
        example = "2024-01-01",
        value_type = String,
        format = "date"
    )]
    pub hire_date: NaiveDate,

    #[schema(example = "active")]
    pub status: String,
}

impl EmployeeIdentity {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }
}
