#[cfg(test)]
mod tests {
    use crate::client::{SlotClient, SlotStats};
    use crate::error::SlotError;
    use crate::seed::DirectorySeed;
    use crate::types::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    // =========================================================================
    // Helpers
    // =========================================================================
    fn seed() -> DirectorySeed {
        DirectorySeed {
            clinics: vec![
                Clinic { id: "C1".into(), name: "Smile Dental Care".into() },
                Clinic { id: "C2".into(), name: "Bright Smiles Clinic".into() },
            ],
            doctors: (1..=4)
                .map(|i| Doctor {
                    id: format!("D{}", i),
                    name: format!("Dr. Number {}", i),
                    specialty: None,
                })
                .collect(),
            patients: vec![
                Patient { id: "P1".into(), name: "Ada".into(), clinic_id: "C1".into() },
                Patient { id: "P2".into(), name: "Grace".into(), clinic_id: "C2".into() },
            ],
        }
    }

    fn client() -> SlotClient {
        let client = SlotClient::new();
        seed().apply(client.directory()).unwrap();
        client
    }

    fn create_request(date: &str) -> NewAppointment {
        NewAppointment {
            clinic_id: "C1".into(),
            patient_id: "P1".into(),
            date: date.into(),
            notes: None,
        }
    }

    fn assert_invariant(client: &SlotClient, clinic: &Identity) {
        for a in client.list_by_clinic(clinic).unwrap() {
            assert!(a.is_consistent(), "status/doctor mismatch on {:?}", a);
        }
    }

    fn run_end_to_end(client: &SlotClient) {
        let c1 = Identity::clinic("C1");
        let d1 = Identity::doctor("D1");
        let d2 = Identity::doctor("D2");

        let a1 = client.create(&c1, &create_request("2024-06-01T10:00:00Z")).unwrap();
        assert_eq!(a1.status, AppointmentStatus::Open);
        assert_eq!(a1.doctor_id, None);
        assert_invariant(client, &c1);

        let claimed = client.claim(&d1, &a1.id).unwrap();
        assert!(matches!(claimed, ClaimOutcome::Claimed { .. }));
        assert_eq!(claimed.appointment().status, AppointmentStatus::Booked);
        assert_eq!(claimed.appointment().doctor_id.as_deref(), Some("D1"));
        assert_invariant(client, &c1);

        assert_eq!(
            client.claim(&d2, &a1.id).unwrap_err(),
            SlotError::Conflict { appointment_id: a1.id.clone() }
        );
        assert_invariant(client, &c1);

        let released = client.release(&d1, &a1.id).unwrap();
        assert!(matches!(released, ReleaseOutcome::Released { .. }));
        assert_eq!(released.appointment().status, AppointmentStatus::Open);
        assert_eq!(released.appointment().doctor_id, None);
        assert_invariant(client, &c1);

        let reclaimed = client.claim(&d2, &a1.id).unwrap();
        assert!(matches!(reclaimed, ClaimOutcome::Claimed { .. }));
        assert_eq!(client.get(&a1.id).unwrap().doctor_id.as_deref(), Some("D2"));
        assert_invariant(client, &c1);
    }

    // =========================================================================
    // Scenario
    // =========================================================================

    #[test]
    fn end_to_end_claim_conflict_release_reclaim() {
        run_end_to_end(&client());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn end_to_end_on_sqlite() {
        let client = SlotClient::with_sqlite(":memory:").unwrap();
        seed().apply(client.directory()).unwrap();
        run_end_to_end(&client);
    }

    // =========================================================================
    // Role gates and ownership
    // =========================================================================

    #[test]
    fn doctors_cannot_use_clinic_operations() {
        let client = client();
        let d1 = Identity::doctor("D1");
        assert!(matches!(
            client.create(&d1, &create_request("2024-06-01T10:00:00Z")),
            Err(SlotError::Unauthorized(_))
        ));
        assert!(matches!(client.list_by_clinic(&d1), Err(SlotError::Unauthorized(_))));
        assert!(matches!(client.doctor_network(&d1), Err(SlotError::Unauthorized(_))));
        assert!(matches!(client.add_patient(&d1, "Eve"), Err(SlotError::Unauthorized(_))));

        let a = client
            .create(&Identity::clinic("C1"), &create_request("2024-06-01T10:00:00Z"))
            .unwrap();
        assert!(matches!(client.assign(&d1, &a.id, "D1"), Err(SlotError::Unauthorized(_))));
        assert_eq!(client.get(&a.id).unwrap().status, AppointmentStatus::Open);
    }

    #[test]
    fn clinics_cannot_claim_or_release() {
        let client = client();
        let c1 = Identity::clinic("C1");
        let a = client.create(&c1, &create_request("2024-06-01T10:00:00Z")).unwrap();
        assert!(matches!(client.claim(&c1, &a.id), Err(SlotError::Unauthorized(_))));
        assert!(matches!(client.release(&c1, &a.id), Err(SlotError::Unauthorized(_))));
        assert!(matches!(client.list_open(&c1), Err(SlotError::Unauthorized(_))));
    }

    #[test]
    fn clinic_cannot_create_for_another_clinic() {
        let client = client();
        let err = client
            .create(&Identity::clinic("C2"), &create_request("2024-06-01T10:00:00Z"))
            .unwrap_err();
        assert!(matches!(err, SlotError::Unauthorized(_)));
    }

    #[test]
    fn create_requires_a_patient_of_the_clinic() {
        let client = client();
        let c1 = Identity::clinic("C1");

        let mut req = create_request("2024-06-01T10:00:00Z");
        req.patient_id = "P2".into();
        assert!(matches!(client.create(&c1, &req), Err(SlotError::Validation(_))));

        req.patient_id = "P404".into();
        assert!(matches!(client.create(&c1, &req), Err(SlotError::Validation(_))));
    }

    #[test]
    fn create_rejects_naive_dates() {
        let client = client();
        let err = client
            .create(&Identity::clinic("C1"), &create_request("2024-06-01T10:00"))
            .unwrap_err();
        assert!(matches!(err, SlotError::Validation(_)));
    }

    #[test]
    fn release_by_other_doctor_keeps_booking() {
        let client = client();
        let c1 = Identity::clinic("C1");
        let a = client.create(&c1, &create_request("2024-06-01T10:00:00Z")).unwrap();
        client.claim(&Identity::doctor("D1"), &a.id).unwrap();

        let err = client.release(&Identity::doctor("D2"), &a.id).unwrap_err();
        assert!(matches!(err, SlotError::Unauthorized(_)));

        let stored = client.get(&a.id).unwrap();
        assert_eq!(stored.status, AppointmentStatus::Booked);
        assert_eq!(stored.doctor_id.as_deref(), Some("D1"));
    }

    #[test]
    fn release_twice_is_a_no_op_the_second_time() {
        let client = client();
        let d1 = Identity::doctor("D1");
        let a = client
            .create(&Identity::clinic("C1"), &create_request("2024-06-01T10:00:00Z"))
            .unwrap();
        client.claim(&d1, &a.id).unwrap();

        assert!(matches!(client.release(&d1, &a.id), Ok(ReleaseOutcome::Released { .. })));
        assert!(matches!(client.release(&d1, &a.id), Ok(ReleaseOutcome::AlreadyOpen { .. })));
    }

    // =========================================================================
    // Clinic assignment
    // =========================================================================

    #[test]
    fn clinic_assigns_doctor_to_its_open_slot() {
        let client = client();
        let c1 = Identity::clinic("C1");
        let a = client.create(&c1, &create_request("2024-06-01T10:00:00Z")).unwrap();

        let outcome = client.assign(&c1, &a.id, "D3").unwrap();
        assert!(matches!(outcome, ClaimOutcome::Claimed { .. }));
        assert_eq!(outcome.appointment().doctor_id.as_deref(), Some("D3"));

        // Same assignment again is idempotent, a different doctor conflicts.
        assert!(matches!(
            client.assign(&c1, &a.id, "D3"),
            Ok(ClaimOutcome::AlreadyHeld { .. })
        ));
        assert!(matches!(
            client.assign(&c1, &a.id, "D4"),
            Err(SlotError::Conflict { .. })
        ));

        // The assigned doctor owns it and can release it.
        assert!(matches!(
            client.release(&Identity::doctor("D3"), &a.id),
            Ok(ReleaseOutcome::Released { .. })
        ));
    }

    #[test]
    fn assign_rejects_unknown_doctor_and_foreign_clinic() {
        let client = client();
        let c1 = Identity::clinic("C1");
        let a = client.create(&c1, &create_request("2024-06-01T10:00:00Z")).unwrap();

        assert!(matches!(client.assign(&c1, &a.id, "D99"), Err(SlotError::Validation(_))));
        assert!(matches!(
            client.assign(&Identity::clinic("C2"), &a.id, "D1"),
            Err(SlotError::Unauthorized(_))
        ));
        assert!(matches!(
            client.assign(&c1, "missing", "D1"),
            Err(SlotError::NotFound(_))
        ));
        assert_eq!(client.get(&a.id).unwrap().status, AppointmentStatus::Open);
    }

    // =========================================================================
    // Listings and derived views
    // =========================================================================

    #[test]
    fn listings_are_scoped_and_ordered_by_date() {
        let client = client();
        let c1 = Identity::clinic("C1");
        let d1 = Identity::doctor("D1");

        let late = client.create(&c1, &create_request("2024-06-02T09:00:00Z")).unwrap();
        let early = client.create(&c1, &create_request("2024-06-01T09:00:00Z")).unwrap();
        let middle = client.create(&c1, &create_request("2024-06-01T15:00:00+02:00")).unwrap();

        client.claim(&d1, &middle.id).unwrap();

        let open: Vec<String> = client.list_open(&d1).unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(open, vec![early.id.clone(), late.id.clone()]);

        let mine: Vec<String> =
            client.list_by_doctor(&d1).unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(mine, vec![middle.id.clone()]);

        let all: Vec<String> =
            client.list_by_clinic(&c1).unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(all, vec![early.id, middle.id, late.id]);

        assert!(client.list_by_clinic(&Identity::clinic("C2")).unwrap().is_empty());
        assert_eq!(client.stats().unwrap(), SlotStats { open: 2, booked: 1 });
    }

    #[test]
    fn network_follows_current_bookings() {
        let client = client();
        let c1 = Identity::clinic("C1");
        let d2 = Identity::doctor("D2");
        let a = client.create(&c1, &create_request("2024-06-01T10:00:00Z")).unwrap();

        assert!(client.doctor_network(&c1).unwrap().in_network.is_empty());

        client.claim(&d2, &a.id).unwrap();
        let network = client.doctor_network(&c1).unwrap();
        assert_eq!(network.in_network.len(), 1);
        assert_eq!(network.in_network[0].id, "D2");
        assert_eq!(network.out_of_network.len(), 3);

        client.release(&d2, &a.id).unwrap();
        assert!(client.doctor_network(&c1).unwrap().in_network.is_empty());
    }

    #[test]
    fn notes_can_be_edited_by_the_owning_clinic_only() {
        let client = client();
        let c1 = Identity::clinic("C1");
        let a = client.create(&c1, &create_request("2024-06-01T10:00:00Z")).unwrap();
        client.claim(&Identity::doctor("D1"), &a.id).unwrap();

        let updated = client.update_notes(&c1, &a.id, Some("fasting required")).unwrap();
        assert_eq!(updated.notes.as_deref(), Some("fasting required"));
        assert_eq!(updated.status, AppointmentStatus::Booked);
        assert_eq!(updated.doctor_id.as_deref(), Some("D1"));

        let cleared = client.update_notes(&c1, &a.id, Some("   ")).unwrap();
        assert_eq!(cleared.notes, None);

        assert!(matches!(
            client.update_notes(&Identity::clinic("C2"), &a.id, Some("x")),
            Err(SlotError::Unauthorized(_))
        ));
        assert!(matches!(
            client.update_notes(&c1, "missing", None),
            Err(SlotError::NotFound(_))
        ));
    }

    #[test]
    fn patients_are_listed_and_added_per_clinic() {
        let client = client();
        let c1 = Identity::clinic("C1");

        let added = client.add_patient(&c1, "  Barbara  ").unwrap();
        assert_eq!(added.name, "Barbara");
        assert_eq!(added.clinic_id, "C1");

        let names: Vec<String> = client.patients(&c1).unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Ada", "Barbara"]);

        assert!(matches!(client.add_patient(&c1, " "), Err(SlotError::Validation(_))));
        assert!(matches!(
            client.add_patient(&Identity::clinic("C9"), "Zed"),
            Err(SlotError::Unauthorized(_))
        ));

        // The new patient can be booked straight away.
        let mut req = create_request("2024-06-01T10:00:00Z");
        req.patient_id = added.id;
        assert!(client.create(&c1, &req).is_ok());
    }

    #[test]
    fn login_resolves_names_to_identities() {
        let client = client();
        assert_eq!(client.login("dr. number 1").unwrap(), Identity::doctor("D1"));
        assert_eq!(client.login("Smile Dental Care").unwrap(), Identity::clinic("C1"));
        assert!(matches!(client.login("stranger"), Err(SlotError::Unauthorized(_))));
        assert!(matches!(client.login(""), Err(SlotError::Validation(_))));
    }

    // =========================================================================
    // Concurrency through the shared client
    // =========================================================================

    fn race_four_doctors(client: Arc<SlotClient>) {
        let a = client
            .create(&Identity::clinic("C1"), &create_request("2024-06-01T10:00:00Z"))
            .unwrap();
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (1..=4)
            .map(|i| {
                let client = Arc::clone(&client);
                let barrier = Arc::clone(&barrier);
                let id = a.id.clone();
                thread::spawn(move || {
                    let caller = Identity::doctor(format!("D{}", i));
                    barrier.wait();
                    client.claim(&caller, &id)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let won = results.iter().filter(|r| r.is_ok()).count();
        let lost = results
            .iter()
            .filter(|r| matches!(r, Err(SlotError::Conflict { .. })))
            .count();
        assert_eq!((won, lost), (1, 3));

        let winner = results
            .into_iter()
            .find_map(|r| r.ok())
            .map(ClaimOutcome::into_appointment)
            .and_then(|a| a.doctor_id);
        assert_eq!(client.get(&a.id).unwrap().doctor_id, winner);
        assert_invariant(&client, &Identity::clinic("C1"));
    }

    #[test]
    fn racing_doctors_through_shared_client_produce_one_booking() {
        race_four_doctors(Arc::new(client()));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn racing_doctors_on_sqlite_file_produce_one_booking() {
        let path = std::env::temp_dir().join(format!("slotline-client-{}.db", nanoid::nanoid!()));
        {
            let client = SlotClient::with_sqlite(&path.to_string_lossy()).unwrap();
            seed().apply(client.directory()).unwrap();
            race_four_doctors(Arc::new(client));
        }
        for suffix in ["", "-wal", "-shm"] {
            let mut file = path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}
