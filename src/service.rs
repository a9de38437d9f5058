use crate::bmi;
use crate::errors::{ApiError, FieldError};
use crate::models::{NewPatient, Patient, PatientUpdate, PatientWithBmi};
use crate::repository::{DieselPatientRepository, PatientRepository, RepoError};

pub type AppPatientService = PatientService<DieselPatientRepository>;

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => ApiError::NotFound("patient"),
            RepoError::Conflict => ApiError::EmailTaken,
            RepoError::Unavailable(source) => ApiError::StorageUnavailable(source),
        }
    }
}

/// Validates incoming patient fields, delegates persistence to the
/// repository, and attaches the derived BMI figures to every record that
/// leaves the service.
#[derive(Clone)]
pub struct PatientService<R> {
    repo: R,
}

impl<R: PatientRepository> PatientService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create(&self, input: NewPatient) -> Result<PatientWithBmi, ApiError> {
        validate_fields(
            Some(&input.name),
            Some(&input.city),
            Some(input.age),
            Some(input.height),
            Some(input.weight),
        )?;
        let record = self.repo.create(input)?;
        self.with_bmi(record)
    }

    pub fn get(&self, id: i32) -> Result<PatientWithBmi, ApiError> {
        let record = self.repo.get(id)?;
        self.with_bmi(record)
    }

    pub fn list(&self) -> Result<Vec<PatientWithBmi>, ApiError> {
        self.repo
            .list()?
            .into_iter()
            .map(|record| self.with_bmi(record))
            .collect()
    }

    pub fn update(&self, id: i32, changes: PatientUpdate) -> Result<PatientWithBmi, ApiError> {
        validate_fields(
            changes.name.as_deref(),
            changes.city.as_deref(),
            changes.age,
            changes.height,
            changes.weight,
        )?;
        // An update carrying no fields degenerates to a read; diesel rejects
        // an empty changeset.
        let record = if changes.is_empty() {
            self.repo.get(id)?
        } else {
            self.repo.update(id, changes)?
        };
        self.with_bmi(record)
    }

    pub fn delete(&self, id: i32) -> Result<(), ApiError> {
        self.repo.delete(id).map_err(ApiError::from)
    }

    fn with_bmi(&self, record: Patient) -> Result<PatientWithBmi, ApiError> {
        // Stored records passed validation, so this only fails if the row
        // was tampered with outside the service.
        let report = bmi::assess(record.height, record.weight)
            .map_err(|e| ApiError::Internal(anyhow::Error::new(e)))?;
        Ok(PatientWithBmi::new(record, report))
    }
}

fn validate_fields(
    name: Option<&str>,
    city: Option<&str>,
    age: Option<i32>,
    height: Option<f64>,
    weight: Option<f64>,
) -> Result<(), ApiError> {
    let mut errors = Vec::new();

    if let Some(name) = name {
        if name.trim().is_empty() {
            errors.push(FieldError::new("name", "must not be blank"));
        }
    }
    if let Some(city) = city {
        if city.trim().is_empty() {
            errors.push(FieldError::new("city", "must not be blank"));
        }
    }
    if let Some(age) = age {
        if !(1..=119).contains(&age) {
            errors.push(FieldError::new("age", format!("{age} out of range [1, 119]")));
        }
    }
    if let Some(height) = height {
        if !height.is_finite() || height <= 0.0 {
            errors.push(FieldError::new("height", "must be a positive number of meters"));
        }
    }
    if let Some(weight) = weight {
        if !weight.is_finite() || weight <= 0.0 {
            errors.push(FieldError::new("weight", "must be a positive number of kilograms"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;
    use crate::bmi::Verdict;
    use crate::models::Gender;

    /// Map-backed repository standing in for the diesel one.
    #[derive(Default)]
    struct InMemoryRepository {
        state: Mutex<(i32, BTreeMap<i32, Patient>)>,
    }

    impl InMemoryRepository {
        fn count(&self) -> usize {
            self.state.lock().unwrap().1.len()
        }
    }

    impl PatientRepository for &InMemoryRepository {
        fn create(&self, patient: NewPatient) -> Result<Patient, RepoError> {
            let mut state = self.state.lock().unwrap();
            state.0 += 1;
            let record = Patient {
                id: state.0,
                name: patient.name,
                city: patient.city,
                age: patient.age,
                gender: patient.gender,
                height: patient.height,
                weight: patient.weight,
                diagnosis: patient.diagnosis,
                prescription: patient.prescription,
                created_at: Utc::now(),
            };
            state.1.insert(record.id, record.clone());
            Ok(record)
        }

        fn get(&self, id: i32) -> Result<Patient, RepoError> {
            let state = self.state.lock().unwrap();
            state.1.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        fn list(&self) -> Result<Vec<Patient>, RepoError> {
            let state = self.state.lock().unwrap();
            Ok(state.1.values().cloned().collect())
        }

        fn update(&self, id: i32, changes: PatientUpdate) -> Result<Patient, RepoError> {
            let mut state = self.state.lock().unwrap();
            let record = state.1.get_mut(&id).ok_or(RepoError::NotFound)?;
            if let Some(name) = changes.name {
                record.name = name;
            }
            if let Some(city) = changes.city {
                record.city = city;
            }
            if let Some(age) = changes.age {
                record.age = age;
            }
            if let Some(gender) = changes.gender {
                record.gender = gender;
            }
            if let Some(height) = changes.height {
                record.height = height;
            }
            if let Some(weight) = changes.weight {
                record.weight = weight;
            }
            if let Some(diagnosis) = changes.diagnosis {
                record.diagnosis = Some(diagnosis);
            }
            if let Some(prescription) = changes.prescription {
                record.prescription = Some(prescription);
            }
            Ok(record.clone())
        }

        fn delete(&self, id: i32) -> Result<(), RepoError> {
            let mut state = self.state.lock().unwrap();
            state.1.remove(&id).map(|_| ()).ok_or(RepoError::NotFound)
        }
    }

    fn sample_patient() -> NewPatient {
        NewPatient {
            name: "Asha Rao".into(),
            city: "Pune".into(),
            age: 34,
            gender: Gender::Female,
            height: 1.75,
            weight: 70.0,
            diagnosis: Some("seasonal allergy".into()),
            prescription: None,
        }
    }

    #[test]
    fn create_then_get_returns_the_stored_record_with_bmi() {
        let repo = InMemoryRepository::default();
        let service = PatientService::new(&repo);

        let created = service.create(sample_patient()).unwrap();
        assert!((created.bmi - 22.86).abs() < 1e-9);
        assert_eq!(created.verdict, Verdict::Normal);

        let fetched = service.get(created.id).unwrap();
        assert_eq!(fetched.name, "Asha Rao");
        assert_eq!(fetched.city, "Pune");
        assert_eq!(fetched.age, 34);
        assert_eq!(fetched.gender, Gender::Female);
        assert_eq!(fetched.diagnosis.as_deref(), Some("seasonal allergy"));
        assert_eq!(fetched.prescription, None);
        assert!((fetched.bmi - created.bmi).abs() < 1e-9);
        assert_eq!(fetched.verdict, created.verdict);
    }

    #[test]
    fn list_enriches_every_record() {
        let repo = InMemoryRepository::default();
        let service = PatientService::new(&repo);

        service.create(sample_patient()).unwrap();
        let mut heavy = sample_patient();
        heavy.name = "Boris Ivanov".into();
        heavy.height = 1.80;
        heavy.weight = 100.0;
        service.create(heavy).unwrap();

        let all = service.list().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].verdict, Verdict::Normal);
        assert_eq!(all[1].verdict, Verdict::Obese);
        assert!((all[1].bmi - 30.86).abs() < 1e-9);
    }

    #[test]
    fn updating_weight_touches_only_weight_and_derived_fields() {
        let repo = InMemoryRepository::default();
        let service = PatientService::new(&repo);
        let created = service.create(sample_patient()).unwrap();

        let updated = service
            .update(
                created.id,
                PatientUpdate {
                    weight: Some(45.0),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.name, created.name);
        assert_eq!(updated.city, created.city);
        assert_eq!(updated.age, created.age);
        assert_eq!(updated.height, created.height);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.weight, 45.0);
        assert_eq!(updated.verdict, Verdict::Underweight);
        assert!((updated.bmi - 14.69).abs() < 1e-9);
    }

    #[test]
    fn empty_update_returns_the_record_unchanged() {
        let repo = InMemoryRepository::default();
        let service = PatientService::new(&repo);
        let created = service.create(sample_patient()).unwrap();

        let unchanged = service.update(created.id, PatientUpdate::default()).unwrap();
        assert_eq!(unchanged.weight, created.weight);
        assert_eq!(unchanged.verdict, created.verdict);
    }

    #[test]
    fn delete_then_get_is_not_found() {
        let repo = InMemoryRepository::default();
        let service = PatientService::new(&repo);
        let created = service.create(sample_patient()).unwrap();

        service.delete(created.id).unwrap();
        assert!(matches!(
            service.get(created.id),
            Err(ApiError::NotFound("patient"))
        ));
        assert!(matches!(
            service.delete(created.id),
            Err(ApiError::NotFound("patient"))
        ));
    }

    #[test]
    fn out_of_range_age_is_rejected_without_a_write() {
        let repo = InMemoryRepository::default();
        let service = PatientService::new(&repo);

        for age in [0, 120] {
            let mut input = sample_patient();
            input.age = age;
            match service.create(input) {
                Err(ApiError::Validation(errors)) => {
                    assert_eq!(errors.len(), 1);
                    assert_eq!(errors[0].field, "age");
                }
                other => panic!("expected validation failure, got {other:?}"),
            }
        }
        assert_eq!(repo.count(), 0);
    }

    #[test]
    fn every_offending_field_is_reported() {
        let repo = InMemoryRepository::default();
        let service = PatientService::new(&repo);

        let input = NewPatient {
            name: "  ".into(),
            city: String::new(),
            age: 0,
            gender: Gender::Male,
            height: 0.0,
            weight: -3.0,
            diagnosis: None,
            prescription: None,
        };
        match service.create(input) {
            Err(ApiError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
                assert_eq!(fields, ["name", "city", "age", "height", "weight"]);
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
        assert_eq!(repo.count(), 0);
    }

    #[test]
    fn invalid_update_fields_are_rejected_without_a_write() {
        let repo = InMemoryRepository::default();
        let service = PatientService::new(&repo);
        let created = service.create(sample_patient()).unwrap();

        let result = service.update(
            created.id,
            PatientUpdate {
                height: Some(f64::NAN),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(ApiError::Validation(_))));

        let stored = service.get(created.id).unwrap();
        assert_eq!(stored.height, created.height);
    }
}
