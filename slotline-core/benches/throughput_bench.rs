use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use chrono::{TimeZone, Utc};
use slotline_core::client::SlotClient;
use slotline_core::coordinator::SlotCoordinator;
use slotline_core::infrastructure::{AppointmentFilter, AppointmentStore, NewRow};
use slotline_core::infrastructure_in_memory::InMemoryAppointmentStore;
use slotline_core::seed::DirectorySeed;
use slotline_core::types::*;

fn new_row(i: usize) -> NewRow {
    NewRow {
        clinic_id: "clinic_1".to_string(),
        patient_id: format!("patient_{}", i),
        date: Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap(),
        notes: None,
    }
}

fn bench_claim_release_cycle(c: &mut Criterion) {
    let client = SlotClient::new();
    DirectorySeed::demo().apply(client.directory()).unwrap();
    let clinic = Identity::clinic("clinic-smile");
    let doctor = Identity::doctor("doctor-smith");
    let request = NewAppointment {
        clinic_id: "clinic-smile".to_string(),
        patient_id: "patient-ada".to_string(),
        date: "2024-06-01T10:00:00Z".to_string(),
        notes: None,
    };
    let slot = client.create(&clinic, &request).unwrap();

    c.bench_function("claim_release_cycle", |b| {
        b.iter(|| {
            let _ = client.claim(&doctor, &slot.id);
            let _ = client.release(&doctor, &slot.id);
        })
    });
}

fn bench_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("claim_throughput");

    for doctor_count in [10, 50, 100] {
        group.bench_with_input(
            BenchmarkId::new("doctors", doctor_count),
            &doctor_count,
            |b, &count| {
                b.iter(|| {
                    let store = InMemoryAppointmentStore::new();

                    // Each doctor claims a different slot
                    for i in 0..count {
                        let slot = store.insert(new_row(i)).unwrap();
                        let _ = SlotCoordinator::try_claim(
                            &store,
                            &slot.id,
                            &format!("doctor_{}", i),
                            None,
                        );
                    }

                    black_box(store.list(&AppointmentFilter::default()).unwrap().len())
                })
            },
        );
    }

    group.finish();
}

fn bench_contended_slot(c: &mut Criterion) {
    c.bench_function("contended_claims_1000", |b| {
        b.iter(|| {
            let store = InMemoryAppointmentStore::new();
            let slot = store.insert(new_row(0)).unwrap();

            // Every doctor after the first loses
            let conflicts = (0..1000)
                .filter(|i| {
                    SlotCoordinator::try_claim(&store, &slot.id, &format!("d{}", i), None).is_err()
                })
                .count();
            black_box(conflicts)
        })
    });
}

criterion_group!(benches, bench_claim_release_cycle, bench_throughput, bench_contended_slot);
criterion_main!(benches);
