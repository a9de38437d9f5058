use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::result::DatabaseErrorKind;
use thiserror::Error;

use crate::DbPool;
use crate::models::{Doctor, NewDoctor, NewPatient, Patient, PatientUpdate};
use crate::schema::{doctors, patients};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("record not found")]
    NotFound,
    #[error("unique constraint violated")]
    Conflict,
    #[error("storage unavailable")]
    Unavailable(#[source] anyhow::Error),
}

impl From<diesel::result::Error> for RepoError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => RepoError::NotFound,
            diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                RepoError::Conflict
            }
            other => RepoError::Unavailable(anyhow::Error::new(other)),
        }
    }
}

/// Persistence contract for patient records. Each operation is atomic at the
/// single-record level; there are no cross-record transactions.
pub trait PatientRepository {
    fn create(&self, patient: NewPatient) -> Result<Patient, RepoError>;
    fn get(&self, id: i32) -> Result<Patient, RepoError>;
    fn list(&self) -> Result<Vec<Patient>, RepoError>;
    fn update(&self, id: i32, changes: PatientUpdate) -> Result<Patient, RepoError>;
    fn delete(&self, id: i32) -> Result<(), RepoError>;
}

#[derive(Clone)]
pub struct DieselPatientRepository {
    pool: DbPool,
}

impl DieselPatientRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<PooledConnection<ConnectionManager<PgConnection>>, RepoError> {
        self.pool
            .get()
            .map_err(|e| RepoError::Unavailable(anyhow::Error::new(e)))
    }
}

impl PatientRepository for DieselPatientRepository {
    fn create(&self, patient: NewPatient) -> Result<Patient, RepoError> {
        let mut conn = self.conn()?;
        diesel::insert_into(patients::table)
            .values(&patient)
            .returning(Patient::as_returning())
            .get_result(&mut conn)
            .map_err(RepoError::from)
    }

    fn get(&self, id: i32) -> Result<Patient, RepoError> {
        let mut conn = self.conn()?;
        patients::table
            .find(id)
            .select(Patient::as_select())
            .first(&mut conn)
            .map_err(RepoError::from)
    }

    fn list(&self) -> Result<Vec<Patient>, RepoError> {
        let mut conn = self.conn()?;
        patients::table
            .order(patients::id.asc())
            .select(Patient::as_select())
            .load(&mut conn)
            .map_err(RepoError::from)
    }

    fn update(&self, id: i32, changes: PatientUpdate) -> Result<Patient, RepoError> {
        let mut conn = self.conn()?;
        diesel::update(patients::table.find(id))
            .set(&changes)
            .returning(Patient::as_returning())
            .get_result(&mut conn)
            .map_err(RepoError::from)
    }

    fn delete(&self, id: i32) -> Result<(), RepoError> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(patients::table.find(id)).execute(&mut conn)?;
        if deleted == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

pub fn insert_doctor(pool: &DbPool, doctor: NewDoctor) -> Result<Doctor, RepoError> {
    let mut conn = pool
        .get()
        .map_err(|e| RepoError::Unavailable(anyhow::Error::new(e)))?;
    diesel::insert_into(doctors::table)
        .values(&doctor)
        .returning(Doctor::as_returning())
        .get_result(&mut conn)
        .map_err(RepoError::from)
}

pub fn find_doctor_by_email(pool: &DbPool, email: &str) -> Result<Option<Doctor>, RepoError> {
    let mut conn = pool
        .get()
        .map_err(|e| RepoError::Unavailable(anyhow::Error::new(e)))?;
    doctors::table
        .filter(doctors::email.eq(email))
        .select(Doctor::as_select())
        .first(&mut conn)
        .optional()
        .map_err(RepoError::from)
}
