use std::io::Write;

use chrono::{DateTime, Utc};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use serde::{Deserialize, Serialize};

use crate::bmi::{BmiReport, Verdict};
use crate::schema::{doctors, patients, sql_types};

/// Patient gender as stored in the `gender` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = sql_types::Gender)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Others,
}

impl ToSql<sql_types::Gender, Pg> for Gender {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        match *self {
            Gender::Male => out.write_all(b"male")?,
            Gender::Female => out.write_all(b"female")?,
            Gender::Others => out.write_all(b"others")?,
        }
        Ok(IsNull::No)
    }
}

impl FromSql<sql_types::Gender, Pg> for Gender {
    fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
        match value.as_bytes() {
            b"male" => Ok(Gender::Male),
            b"female" => Ok(Gender::Female),
            b"others" => Ok(Gender::Others),
            other => Err(format!("unrecognized gender variant: {:?}", other).into()),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = doctors)]
#[diesel(check_for_backend(Pg))]
pub struct Doctor {
    pub id: i32,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = doctors)]
pub struct NewDoctor {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = patients)]
#[diesel(check_for_backend(Pg))]
pub struct Patient {
    pub id: i32,
    pub name: String,
    pub city: String,
    pub age: i32,
    pub gender: Gender,
    pub height: f64,
    pub weight: f64,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields accepted when creating a patient. `bmi`/`verdict` are derived on
/// the way out and never accepted as input.
#[derive(Debug, Clone, Insertable, Deserialize)]
#[diesel(table_name = patients)]
pub struct NewPatient {
    pub name: String,
    pub city: String,
    pub age: i32,
    pub gender: Gender,
    pub height: f64,
    pub weight: f64,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
}

/// Partial update: absent fields are left unchanged.
#[derive(Debug, Clone, Default, AsChangeset, Deserialize)]
#[diesel(table_name = patients)]
pub struct PatientUpdate {
    pub name: Option<String>,
    pub city: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
}

impl PatientUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.city.is_none()
            && self.age.is_none()
            && self.gender.is_none()
            && self.height.is_none()
            && self.weight.is_none()
            && self.diagnosis.is_none()
            && self.prescription.is_none()
    }
}

// Request/response bodies for the auth endpoints.

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Doctor as returned to clients, without the password hash.
#[derive(Debug, Serialize)]
pub struct DoctorResponse {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<Doctor> for DoctorResponse {
    fn from(doctor: Doctor) -> Self {
        Self {
            id: doctor.id,
            name: doctor.name,
            email: doctor.email,
            created_at: doctor.created_at,
        }
    }
}

/// Patient record enriched with its derived BMI figures.
#[derive(Debug, Serialize)]
pub struct PatientWithBmi {
    pub id: i32,
    pub name: String,
    pub city: String,
    pub age: i32,
    pub gender: Gender,
    pub height: f64,
    pub weight: f64,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub created_at: DateTime<Utc>,
    pub bmi: f64,
    pub verdict: Verdict,
}

impl PatientWithBmi {
    pub fn new(record: Patient, report: BmiReport) -> Self {
        Self {
            id: record.id,
            name: record.name,
            city: record.city,
            age: record.age,
            gender: record.gender,
            height: record.height,
            weight: record.weight,
            diagnosis: record.diagnosis,
            prescription: record.prescription,
            created_at: record.created_at,
            bmi: report.bmi,
            verdict: report.verdict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_uses_lowercase_wire_names() {
        assert_eq!(serde_json::to_value(Gender::Male).unwrap(), "male");
        assert_eq!(serde_json::to_value(Gender::Others).unwrap(), "others");
        let parsed: Gender = serde_json::from_str("\"female\"").unwrap();
        assert_eq!(parsed, Gender::Female);
        assert!(serde_json::from_str::<Gender>("\"unknown\"").is_err());
    }

    #[test]
    fn empty_update_is_detected() {
        assert!(PatientUpdate::default().is_empty());

        let update = PatientUpdate {
            weight: Some(72.5),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
