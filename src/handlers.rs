use actix_web::{HttpResponse, web};
use serde_json::json;

use crate::DbPool;
use crate::auth::{self, AuthSettings, AuthedDoctor};
use crate::errors::{ApiError, FieldError};
use crate::models::{
    DoctorResponse, LoginRequest, NewDoctor, NewPatient, PatientUpdate, RegisterRequest,
    TokenResponse,
};
use crate::repository;
use crate::service::AppPatientService;

pub async fn index() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "Patient Management System API",
        "status": "online",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// Handler to register a new doctor account
pub async fn register_doctor(
    pool: web::Data<DbPool>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let input = body.into_inner();
    validate_registration(&input)?;

    let password_hash = auth::hash_password(&input.password)?;
    let doctor = web::block(move || {
        repository::insert_doctor(
            &pool,
            NewDoctor {
                name: input.name,
                email: input.email,
                password_hash,
            },
        )
    })
    .await??;

    Ok(HttpResponse::Created().json(DoctorResponse::from(doctor)))
}

// Handler to log a doctor in and issue a bearer token
pub async fn login_doctor(
    pool: web::Data<DbPool>,
    settings: web::Data<AuthSettings>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let input = body.into_inner();
    let email = input.email.clone();
    let doctor = web::block(move || repository::find_doctor_by_email(&pool, &email)).await??;

    let doctor = doctor
        .filter(|d| auth::verify_password(&input.password, &d.password_hash))
        .ok_or(ApiError::InvalidCredentials)?;

    let token = settings.issue_token(&doctor.email)?;
    Ok(HttpResponse::Ok().json(TokenResponse {
        access_token: token,
        token_type: "bearer".into(),
    }))
}

// Handler to return the doctor behind the presented token
pub async fn current_doctor(
    pool: web::Data<DbPool>,
    identity: AuthedDoctor,
) -> Result<HttpResponse, ApiError> {
    let doctor = web::block(move || repository::find_doctor_by_email(&pool, &identity.email))
        .await??
        // A token can outlive its account.
        .ok_or(ApiError::Unauthenticated)?;

    Ok(HttpResponse::Ok().json(DoctorResponse::from(doctor)))
}

// Handler to create a new patient
pub async fn create_patient(
    service: web::Data<AppPatientService>,
    _identity: AuthedDoctor,
    body: web::Json<NewPatient>,
) -> Result<HttpResponse, ApiError> {
    let input = body.into_inner();
    let created = web::block(move || service.create(input)).await??;
    Ok(HttpResponse::Created().json(created))
}

// Handler to list all patients
pub async fn list_patients(
    service: web::Data<AppPatientService>,
    _identity: AuthedDoctor,
) -> Result<HttpResponse, ApiError> {
    let patients = web::block(move || service.list()).await??;
    Ok(HttpResponse::Ok().json(patients))
}

// Handler to get a patient by ID
pub async fn get_patient(
    service: web::Data<AppPatientService>,
    _identity: AuthedDoctor,
    patient_id: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let id = patient_id.into_inner();
    let patient = web::block(move || service.get(id)).await??;
    Ok(HttpResponse::Ok().json(patient))
}

// Handler to apply a partial update to a patient
pub async fn update_patient(
    service: web::Data<AppPatientService>,
    _identity: AuthedDoctor,
    patient_id: web::Path<i32>,
    body: web::Json<PatientUpdate>,
) -> Result<HttpResponse, ApiError> {
    let id = patient_id.into_inner();
    let changes = body.into_inner();
    let patient = web::block(move || service.update(id, changes)).await??;
    Ok(HttpResponse::Ok().json(patient))
}

// Handler to delete a patient
pub async fn delete_patient(
    service: web::Data<AppPatientService>,
    _identity: AuthedDoctor,
    patient_id: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let id = patient_id.into_inner();
    web::block(move || service.delete(id)).await??;
    Ok(HttpResponse::Ok().json(json!({ "message": "Patient deleted successfully" })))
}

fn validate_registration(input: &RegisterRequest) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    if input.name.trim().is_empty() {
        errors.push(FieldError::new("name", "must not be blank"));
    }
    // Full address validation is the mail server's problem.
    if !input.email.contains('@') || input.email.trim().is_empty() {
        errors.push(FieldError::new("email", "must be an email address"));
    }
    if input.password.len() < 6 {
        errors.push(FieldError::new("password", "must be at least 6 characters"));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}
