use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A student account as stored. Only the service layer ever sees `password`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Student {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub year: String,
    pub roll_no: String,
    pub dept: String,
    pub gender: String,
    pub student_type: String,
    pub degree_type: String,
    pub password: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// The student as the API exposes it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StudentResponse {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub roll_no: String,
    #[serde(default)]
    pub dept: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub student_type: String,
    #[serde(default)]
    pub degree_type: String,
}

impl StudentResponse {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn initials(&self) -> String {
        let first = self.first_name.chars().next();
        let last = self.last_name.chars().next();
        first
            .into_iter()
            .chain(last)
            .flat_map(char::to_uppercase)
            .collect()
    }
}

impl From<&Student> for StudentResponse {
    fn from(student: &Student) -> Self {
        Self {
            id: student.id.map(|oid| oid.to_hex()).unwrap_or_default(),
            email: student.email.clone(),
            first_name: student.first_name.clone(),
            last_name: student.last_name.clone(),
            phone_number: student.phone_number.clone(),
            year: student.year.clone(),
            roll_no: student.roll_no.clone(),
            dept: student.dept.clone(),
            gender: student.gender.clone(),
            student_type: student.student_type.clone(),
            degree_type: student.degree_type.clone(),
        }
    }
}
